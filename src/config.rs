// src/config.rs
//! Recon configuration: targets, feeds, and every rule table the pipeline
//! evaluates. The pipeline carries no domain knowledge of its own; all of it
//! lives here as data.
//!
//! Resolution order for `ReconConfig::load`:
//! 1) explicit path (CLI `--config`)
//! 2) `$RECON_CONFIG_PATH`
//! 3) `config/recon.toml`
//! 4) `config/recon.json`
//! 5) built-in `default_seed()`

use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use crate::types::{FeedSource, Target};

pub const ENV_CONFIG_PATH: &str = "RECON_CONFIG_PATH";
pub const DEFAULT_TOML_PATH: &str = "config/recon.toml";
pub const DEFAULT_JSON_PATH: &str = "config/recon.json";
pub const DEFAULT_STORE_PATH: &str = ".recon-intel.json";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ReconConfig {
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub fetch: FetchConfig,
    #[serde(default)]
    pub pipeline: PipelineConfig,
    #[serde(default)]
    pub domains: Vec<DomainConfig>,
    #[serde(default)]
    pub signals: Vec<SignalRuleConfig>,
    #[serde(default)]
    pub boosts: Vec<BoostRuleConfig>,
    #[serde(default)]
    pub contradictions: Vec<ContradictionRuleConfig>,
    #[serde(default)]
    pub angles: AngleConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct StoreConfig {
    pub path: PathBuf,
    pub max_items: usize,
    pub max_age_hours: u32,
    pub max_cross_refs: usize,
    pub min_juiciness: u8,
    /// A run lock older than this is assumed abandoned by a killed run.
    pub stale_lock_minutes: u64,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from(DEFAULT_STORE_PATH),
            max_items: 250,
            max_age_hours: 72,
            max_cross_refs: 100,
            min_juiciness: 5,
            stale_lock_minutes: 30,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct FetchConfig {
    pub timeout_secs: u64,
    pub user_agent: String,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            timeout_secs: 15,
            user_agent: crate::ingest::fetch::DEFAULT_USER_AGENT.to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct PipelineConfig {
    /// Run scan modules concurrently instead of one after another.
    pub concurrent_modules: bool,
}

fn default_recency_hours() -> u32 {
    48
}

/// One topic domain: what to read, whom to look for, and what counts as relevant.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DomainConfig {
    pub name: String,
    /// `category` stamped on every Finding of this domain.
    pub category: String,
    #[serde(default = "default_recency_hours")]
    pub recency_hours: u32,
    #[serde(default)]
    pub targets: Vec<Target>,
    #[serde(default)]
    pub feeds: Vec<FeedSource>,
    /// JSON record APIs scanned alongside (or instead of) the feeds.
    #[serde(default)]
    pub records: Vec<RecordSourceConfig>,
    /// Signals that alone make an item relevant. `"*"` accepts any signal.
    #[serde(default)]
    pub relevance_signals: Vec<String>,
    /// Last-resort keyword regex for the relevance gate.
    #[serde(default)]
    pub fallback_pattern: Option<String>,
    /// Entity recorded when the gate passed without a target match.
    #[serde(default)]
    pub fallback_entity: Option<String>,
    /// Per-domain fetch timeout; falls back to `[fetch].timeout_secs`.
    #[serde(default)]
    pub timeout_secs: Option<u64>,
}

fn default_max_records() -> usize {
    20
}

/// A JSON record endpoint and how its records map onto Findings.
///
/// Templates take `{field}` or `{a/b}` (JSON pointer path), `{x,y}` for the
/// first non-empty of several fields, `{x|usd}` to render a number as
/// dollars, and `{@today}` for the run's UTC date.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RecordSourceConfig {
    pub name: String,
    pub url: String,
    /// JSON pointer to the record array; empty means the document root.
    /// An object there is a single record.
    #[serde(default)]
    pub records_at: String,
    #[serde(default = "default_max_records")]
    pub max_records: usize,
    pub headline: String,
    #[serde(default)]
    pub summary: String,
    #[serde(default)]
    pub link: String,
    /// Fingerprint key template; the headline when absent.
    #[serde(default)]
    pub key: Option<String>,
    /// Record field holding the timestamp. Undated sources are stamped with
    /// the start of the run's UTC day.
    #[serde(default)]
    pub date_field: Option<String>,
    /// Overrides the classifier's label.
    #[serde(default)]
    pub subcategory: Option<String>,
    /// Signals every record of this source carries.
    #[serde(default)]
    pub signals: Vec<String>,
    #[serde(default)]
    pub entities: Vec<String>,
    /// Fields whose values are entities (e.g. an applicant name).
    #[serde(default)]
    pub entity_fields: Vec<String>,
    /// Numeric fields recorded as dollar amounts.
    #[serde(default)]
    pub money_fields: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SignalRuleConfig {
    pub name: String,
    pub pattern: String,
    /// Topical label this signal implies; rule order is precedence.
    #[serde(default)]
    pub category: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BoostRuleConfig {
    pub pattern: String,
    pub points: i32,
    pub tag: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ContradictionRuleConfig {
    pub kind: String,
    /// Matched against the new item's space-joined signals.
    pub new_pattern: String,
    /// Matched against the stored item's space-joined signals.
    pub old_pattern: String,
    /// Placeholders: `{entity}`, `{new}`, `{old}`.
    #[serde(default)]
    pub angle: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct AngleConfig {
    /// Tag walk order; the first tag present on an item picks its template set.
    pub priority: Vec<String>,
    /// tag → templates. `{entity}` is replaced by the item's primary entity.
    pub templates: HashMap<String, Vec<String>>,
    pub default: Vec<String>,
    pub attribution: Vec<String>,
    /// Stand-in when an item has no entity at all.
    pub fallback_entity: String,
}

impl Default for AngleConfig {
    fn default() -> Self {
        Self {
            priority: Vec::new(),
            templates: HashMap::new(),
            default: vec!["{entity} otra vez en las noticias.".to_string()],
            attribution: vec!["Fuente: lo que {entity} no quiere que leas.".to_string()],
            fallback_entity: "el gobierno".to_string(),
        }
    }
}

impl ReconConfig {
    /// Load from an explicit path. Supports TOML or JSON by extension.
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("reading recon config from {}", path.display()))?;
        let ext = path
            .extension()
            .and_then(|s| s.to_str())
            .unwrap_or_default()
            .to_ascii_lowercase();
        let cfg: ReconConfig = match ext.as_str() {
            "json" => serde_json::from_str(&content)
                .with_context(|| format!("parsing JSON config {}", path.display()))?,
            _ => toml::from_str(&content)
                .with_context(|| format!("parsing TOML config {}", path.display()))?,
        };
        Ok(cfg)
    }

    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        if let Some(p) = explicit {
            return Self::load_from(p);
        }
        if let Ok(p) = std::env::var(ENV_CONFIG_PATH) {
            let pb = PathBuf::from(p);
            if pb.exists() {
                return Self::load_from(&pb);
            }
            return Err(anyhow!("{ENV_CONFIG_PATH} points to non-existent path"));
        }
        for candidate in [DEFAULT_TOML_PATH, DEFAULT_JSON_PATH] {
            let pb = PathBuf::from(candidate);
            if pb.exists() {
                return Self::load_from(&pb);
            }
        }
        Ok(Self::default_seed())
    }

    pub fn fetch_timeout_for(&self, domain: &DomainConfig) -> std::time::Duration {
        std::time::Duration::from_secs(domain.timeout_secs.unwrap_or(self.fetch.timeout_secs))
    }

    /// Built-in Puerto Rico watch list and rule tables.
    pub fn default_seed() -> Self {
        let politicians = vec![
            Target::new("Jenniffer González", "gobernadora", &["jenniffer", "gonzález colón", "gonzalez colon", "gobernadora"]),
            Target::new("Pedro Pierluisi", "exgobernador", &["pierluisi"]),
            Target::new("Thomas Rivera Schatz", "senador", &["rivera schatz", "thomas rivera"]),
            Target::new("Juan Dalmau", "político", &["dalmau"]),
            Target::new("Alexandra Lúgaro", "política", &["lúgaro", "lugaro"]),
            Target::new("Nydia Velázquez", "congresista", &["velázquez", "velazquez"]),
            Target::new("Carmen Yulín", "exalcaldesa", &["yulín", "yulin"]),
            Target::new("Wanda Vázquez", "exgobernadora", &["wanda vázquez", "wanda vazquez"]),
            Target::new("Ricardo Rosselló", "exgobernador", &["rosselló", "rossello"]),
            Target::new("Legislatura PR", "legislatura", &["senado", "cámara de representantes", "legislatura"]),
            Target::new("FOMB", "junta fiscal", &["junta de control fiscal", "fiscal oversight", "junta fiscal", "oversight board"]),
        ];
        let energy = vec![
            Target::new("LUMA Energy", "distribuidora", &["luma"]),
            Target::new("AEE", "utilidad pública", &["autoridad de energía eléctrica", "aee"]),
            Target::new("Genera PR", "generación", &["genera pr", "genera puerto rico"]),
            Target::new("NEPR", "regulador", &["negociado de energía", "energy bureau"]),
            Target::new("FEMA", "agencia federal", &["fema"]),
        ];
        let federal = vec![
            Target::new("ICE", "agencia federal", &["immigration and customs", "agentes de ice", "ice agents"]),
            Target::new("CBP", "agencia federal", &["customs and border", "border patrol"]),
            Target::new("FEMA", "agencia federal", &["fema", "federal emergency"]),
            Target::new("HUD", "agencia federal", &["housing and urban", "vivienda federal"]),
            Target::new("FBI", "agencia federal", &["fbi", "federal bureau"]),
            Target::new("Trump Admin", "ejecutivo federal", &["trump", "white house", "casa blanca"]),
            Target::new("DOJ", "agencia federal", &["department of justice", "departamento de justicia federal"]),
            Target::new("Jones Act", "ley federal", &["jones act", "ley jones", "cabotaje"]),
            Target::new("Congress", "congreso", &["congreso", "congress", "capitol hill"]),
        ];
        let records_targets = federal.clone();
        let mut general_targets = politicians.clone();
        general_targets.extend(energy.iter().cloned());

        let domains = vec![
            DomainConfig {
                name: "politicians".into(),
                category: "politicians".into(),
                recency_hours: 48,
                targets: politicians,
                feeds: vec![
                    FeedSource::new("El Nuevo Día - Gobierno", "https://www.elnuevodia.com/rss/gobierno/"),
                    FeedSource::new("Metro PR - Gobierno", "https://www.metro.pr/feed/gobierno/"),
                    FeedSource::new("NotiCel", "https://www.noticel.com/feed/"),
                    FeedSource::new("El Vocero - Gobierno", "https://www.elvocero.com/gobierno/rss/"),
                    FeedSource::new("Primera Hora - Gobierno", "https://www.primerahora.com/rss/gobierno/"),
                ],
                records: Vec::new(),
                relevance_signals: vec!["scandal".into(), "corruption".into()],
                fallback_pattern: Some(r"(?i)pol[ií]tic|gobierno|legisl|senado|c[aá]mara|gobernador|alcalde".into()),
                fallback_entity: Some("PR Government".into()),
                timeout_secs: None,
            },
            DomainConfig {
                name: "energy".into(),
                category: "energy".into(),
                recency_hours: 48,
                targets: energy,
                feeds: vec![
                    FeedSource::new("El Nuevo Día - Infraestructura", "https://www.elnuevodia.com/rss/infraestructura/"),
                    FeedSource::new("Metro PR - Economía", "https://www.metro.pr/feed/economia/"),
                    FeedSource::new("NEPR Updates", "https://energia.pr.gov/feed/"),
                    FeedSource::new("NotiCel Economía", "https://www.noticel.com/economia/feed/"),
                ],
                records: Vec::new(),
                relevance_signals: vec!["outage".into()],
                fallback_pattern: Some(r"(?i)\bluma\b|energ|apag|blackout|\bluz\b|tarifa|factura|kilovatio|kwh|power grid|\baee\b|\bprepa\b".into()),
                fallback_entity: Some("LUMA Energy".into()),
                timeout_secs: Some(20),
            },
            DomainConfig {
                name: "federal".into(),
                category: "federal".into(),
                recency_hours: 72,
                targets: federal,
                feeds: vec![
                    FeedSource::new("AP News - Puerto Rico", "https://rsshub.app/apnews/topics/puerto-rico"),
                    FeedSource::new("Reuters - US Politics", "https://rsshub.app/reuters/world/us"),
                    FeedSource::new("El Nuevo Día - EEUU", "https://www.elnuevodia.com/rss/eeuu/"),
                    FeedSource::new("Caribbean Business", "https://caribbeanbusiness.com/feed/"),
                ],
                records: Vec::new(),
                relevance_signals: Vec::new(),
                fallback_pattern: Some(r"(?i)puerto rico|boricua|territorial|jones act|\bfema\b|\bhud\b|\bfbi\b|\bice\b|\bcbp\b|deport".into()),
                fallback_entity: Some("Federal Gov".into()),
                timeout_secs: Some(25),
            },
            DomainConfig {
                name: "general".into(),
                category: "general_news".into(),
                recency_hours: 48,
                targets: general_targets,
                feeds: vec![
                    FeedSource::new("El Nuevo Día - Noticias", "https://www.elnuevodia.com/rss/noticias/"),
                    FeedSource::new("Primera Hora", "https://www.primerahora.com/rss/"),
                    FeedSource::new("Metro PR", "https://www.metro.pr/feed/"),
                    FeedSource::new("El Vocero", "https://www.elvocero.com/rss/"),
                ],
                records: Vec::new(),
                relevance_signals: vec!["*".into()],
                fallback_pattern: Some(r"(?i)puerto rico|boricua|\bisla\b|san juan|bayam[oó]n|ponce|mayag[uü]ez|carolina".into()),
                fallback_entity: None,
                timeout_secs: Some(10),
            },
            DomainConfig {
                name: "gov_records".into(),
                category: "government_records".into(),
                recency_hours: 72,
                targets: records_targets,
                feeds: Vec::new(),
                records: seed_record_sources(),
                relevance_signals: Vec::new(),
                fallback_pattern: None,
                fallback_entity: None,
                timeout_secs: Some(20),
            },
        ];

        let signals = [
            ("scandal", r"(?i)esc[aá]ndalo|scandal|investig|fraude|acusad|acusan|indict|arrest|arres", Some("scandal")),
            ("corruption", r"(?i)corrup|malvers|soborno|desv[ií]o de fondos|kickback|bribe|embezzl", Some("scandal")),
            ("outage", r"(?i)apag[oó]n|apagones|blackout|sin luz|power outage|interrupci[oó]n|relevo de carga", Some("crisis")),
            ("disaster", r"(?i)hurac[aá]n|hurricane|terremoto|earthquake|inundaci[oó]n|flood|emergencia|emergency", Some("crisis")),
            ("violence", r"(?i)asesinat|murder|balacera|shooting|violen|homicid|crimen|crime", Some("crisis")),
            ("failure", r"(?i)fall[oó]|fallas?\b|fracas|incumpl|no cumpl|colaps|retras|fail|delay|broke down", Some("crisis")),
            ("protest", r"(?i)protest|manifest|marcha|huelga|strike|rally|demonstr", Some("unrest")),
            ("price_hike", r"(?i)aument|subi[oó]|tarifa|factura|rate hike|surcharge|cargo adicional", Some("economic")),
            ("funding", r"(?i)fondos|funding|presupuesto|budget|asignaci[oó]n|grant|\bfema\b|\bhud\b", Some("economic")),
            ("deportation", r"(?i)deport|\bice\b|redada|raid|immigration|inmigra", Some("federal")),
            ("resignation", r"(?i)renunci|resign|dimisi|fired|despid|destituid", Some("political")),
            ("promise", r"(?i)promet|promesa|promise|pledge|vow|se compromet|garantiz", Some("political")),
            ("energy", r"(?i)energ|\bluz\b|electric|\bluma\b|genera pr|kwh|power grid", None),
            ("federal", r"(?i)federal|congreso|congress|washington|casa blanca|white house", None),
        ]
        .into_iter()
        .map(|(name, pattern, category)| SignalRuleConfig {
            name: name.into(),
            pattern: pattern.into(),
            category: category.map(str::to_string),
        })
        .collect();

        let boosts = [
            (r"(?i)corrup|malvers|soborno|kickback|bribe|embezzl", 3, "corruption"),
            (r"(?i)esc[aá]ndalo|scandal|acusad|indict|arrest|arres", 3, "scandal"),
            (r"(?i)promet|promesa|promise|incumpl", 2, "broken_promise"),
            (r"(?i)apag[oó]n|apagones|blackout|sin luz|power outage", 2, "blackout"),
            (r"(?i)\bluma\b", 2, "luma"),
            (r"(?i)junta de control fiscal|junta fiscal|\bfomb\b|oversight board", 2, "fomb"),
            (r"(?i)renunci|resign|dimisi|destituid", 2, "resignation"),
            (r"(?i)deport|redada|\bice\b", 1, "federal"),
            (r"(?i)tarifa|aumento en la factura|rate hike|surcharge", 1, "price_hike"),
            (r"(?i)protest|manifestaci|huelga", 1, "protest"),
            (r"(?i)\$[\d,.]+|millones|million|billion", 1, "money"),
        ]
        .into_iter()
        .map(|(pattern, points, tag)| BoostRuleConfig {
            pattern: pattern.into(),
            points,
            tag: tag.into(),
        })
        .collect();

        let contradictions = [
            ("broken_promise", r"\bfailure\b|\boutage\b", r"\bpromise\b", "{entity} prometió \"{old}\" y ahora: \"{new}\""),
            ("paid_for_failure", r"\boutage\b|\bfailure\b", r"\bfunding\b|\bprice_hike\b", "Pagamos por \"{old}\" y {entity} nos da \"{new}\""),
            ("scandal_after_promise", r"\bscandal\b", r"\bpromise\b", "{entity}: de \"{old}\" a \"{new}\""),
        ]
        .into_iter()
        .map(|(kind, new_pattern, old_pattern, angle)| ContradictionRuleConfig {
            kind: kind.into(),
            new_pattern: new_pattern.into(),
            old_pattern: old_pattern.into(),
            angle: Some(angle.into()),
        })
        .collect();

        Self {
            store: StoreConfig::default(),
            fetch: FetchConfig::default(),
            pipeline: PipelineConfig::default(),
            domains,
            signals,
            boosts,
            contradictions,
            angles: default_angles(),
        }
    }
}

fn seed_record_sources() -> Vec<RecordSourceConfig> {
    vec![
        RecordSourceConfig {
            name: "OpenFEMA - Declaraciones".into(),
            url: "https://www.fema.gov/api/open/v2/DisasterDeclarationsSummaries?$filter=state%20eq%20%27PR%27&$orderby=declarationDate%20desc&$top=20".into(),
            records_at: "/DisasterDeclarationsSummaries".into(),
            max_records: 20,
            headline: "FEMA {declarationType}: {declarationTitle,incidentType}".into(),
            summary: "Disaster #{disasterNumber}, {incidentType} in PR. Declared: {declarationDate}.".into(),
            link: "https://www.fema.gov/disaster/{disasterNumber}".into(),
            key: Some("fema-{disasterNumber}".into()),
            date_field: Some("declarationDate".into()),
            subcategory: Some("fema_disaster".into()),
            signals: vec!["funding".into(), "disaster".into()],
            entities: vec!["FEMA".into(), "PR Government".into()],
            entity_fields: Vec::new(),
            money_fields: Vec::new(),
        },
        RecordSourceConfig {
            name: "OpenFEMA - Asistencia Pública".into(),
            url: "https://www.fema.gov/api/open/v2/PublicAssistanceGrantAwardActivities?$filter=state%20eq%20%27Puerto%20Rico%27&$orderby=obligationDate%20desc&$top=15".into(),
            records_at: "/PublicAssistanceGrantAwardActivities".into(),
            max_records: 15,
            headline: "FEMA Grant: {federalShareObligated|usd} to {applicantName}".into(),
            summary: "Project: {projectTitle} | Disaster #{disasterNumber} ({incidentType})".into(),
            link: "https://www.fema.gov/disaster/{disasterNumber}".into(),
            key: Some("fema-pa-{disasterNumber}-{applicantName}-{obligationDate}".into()),
            date_field: Some("obligationDate".into()),
            subcategory: Some("fema_grant".into()),
            signals: vec!["funding".into()],
            entities: vec!["FEMA".into()],
            entity_fields: vec!["applicantName".into()],
            money_fields: vec!["federalShareObligated".into()],
        },
        RecordSourceConfig {
            name: "USAspending - Puerto Rico".into(),
            url: "https://api.usaspending.gov/api/v2/recipient/state/PR/".into(),
            records_at: String::new(),
            max_records: 1,
            headline: "Total Federal Spending in PR: {total_prime_amount|usd} awarded".into(),
            summary: "Prime awards {total_prime_amount|usd}. Loan face value {total_face_value_loan_amount|usd}. Population {population}.".into(),
            link: "https://www.usaspending.gov/state/puerto-rico/72".into(),
            key: Some("usaspending-pr-total-{@today}".into()),
            date_field: None,
            subcategory: Some("federal_spending".into()),
            signals: vec!["funding".into()],
            entities: vec!["Federal Gov".into(), "PR Government".into()],
            entity_fields: Vec::new(),
            money_fields: vec!["total_prime_amount".into(), "total_face_value_loan_amount".into()],
        },
    ]
}

fn default_angles() -> AngleConfig {
    let mut templates: HashMap<String, Vec<String>> = HashMap::new();
    let mut put = |tag: &str, lines: &[&str]| {
        templates.insert(tag.to_string(), lines.iter().map(|s| s.to_string()).collect());
    };
    put("corruption", &[
        "{entity} con las manos en la masa otra vez.",
        "Sigan el dinero: {entity} sabe dónde está.",
    ]);
    put("scandal", &[
        "Otro escándalo de {entity}, ya ni sorprende.",
        "{entity} en el ojo del huracán, y no es el del clima.",
    ]);
    put("broken_promise", &[
        "{entity} prometió y, como siempre, no cumplió.",
        "Las promesas de {entity} duran menos que la luz.",
    ]);
    put("blackout", &[
        "Se fue la luz y {entity} se fue con ella.",
        "{entity}: expertos en apagar la isla.",
    ]);
    put("luma", &[
        "{entity} cobrando como si la luz llegara.",
    ]);
    put("fomb", &[
        "{entity} decidiendo por nosotros, como siempre.",
    ]);
    put("recurring_issue", &[
        "{entity} otra vez con lo mismo. Ya es costumbre.",
    ]);
    put("federal", &[
        "Washington se acuerda de la isla cuando {entity} quiere algo.",
    ]);
    put("price_hike", &[
        "{entity} sube el precio y baja el servicio.",
    ]);

    AngleConfig {
        priority: [
            "corruption",
            "scandal",
            "broken_promise",
            "blackout",
            "luma",
            "fomb",
            "recurring_issue",
            "federal",
            "price_hike",
        ]
        .iter()
        .map(|s| s.to_string())
        .collect(),
        templates,
        default: vec![
            "{entity} dando de qué hablar.".to_string(),
            "Ojo con {entity}, que algo se trae.".to_string(),
        ],
        attribution: vec![
            "Y {entity} haciéndose el loco, como siempre.".to_string(),
            "Pregúntenle a {entity}, a ver qué inventa ahora.".to_string(),
        ],
        fallback_entity: "el gobierno".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::{env, fs};

    #[test]
    fn seed_has_five_domains_and_rule_tables() {
        let cfg = ReconConfig::default_seed();
        let names: Vec<_> = cfg.domains.iter().map(|d| d.name.as_str()).collect();
        assert_eq!(names, vec!["politicians", "energy", "federal", "general", "gov_records"]);
        let records = &cfg.domains[4];
        assert!(records.feeds.is_empty());
        assert_eq!(records.records.len(), 3);
        assert_eq!(records.records[0].records_at, "/DisasterDeclarationsSummaries");
        assert!(!cfg.signals.is_empty());
        assert!(!cfg.boosts.is_empty());
        assert!(!cfg.contradictions.is_empty());
        assert_eq!(cfg.store.max_items, 250);
        assert_eq!(cfg.store.max_age_hours, 72);
        assert_eq!(cfg.store.max_cross_refs, 100);
    }

    #[test]
    fn toml_round_trip_keeps_rules() {
        let cfg = ReconConfig::default_seed();
        let s = toml::to_string(&cfg).unwrap();
        let back: ReconConfig = toml::from_str(&s).unwrap();
        assert_eq!(back, cfg);
    }

    #[test]
    fn minimal_toml_fills_defaults() {
        let s = r#"
[[domains]]
name = "energy"
category = "energy"

[[domains.feeds]]
name = "Test"
url = "https://feed.test/rss"
"#;
        let cfg: ReconConfig = toml::from_str(s).unwrap();
        assert_eq!(cfg.domains[0].recency_hours, 48);
        assert_eq!(cfg.store.max_items, 250);
        assert_eq!(cfg.fetch.timeout_secs, 15);
        assert_eq!(
            cfg.fetch_timeout_for(&cfg.domains[0]),
            std::time::Duration::from_secs(15)
        );
    }

    #[serial_test::serial]
    #[test]
    fn load_prefers_explicit_then_env_then_seed() {
        let old = env::current_dir().unwrap();
        let tmp = tempfile::tempdir().unwrap();
        env::set_current_dir(tmp.path()).unwrap();
        env::remove_var(ENV_CONFIG_PATH);

        // nothing on disk → seed
        let seeded = ReconConfig::load(None).unwrap();
        assert_eq!(seeded.domains.len(), 5);

        let p = tmp.path().join("custom.json");
        fs::write(&p, r#"{"store": {"max_items": 10}}"#).unwrap();
        env::set_var(ENV_CONFIG_PATH, p.display().to_string());
        let from_env = ReconConfig::load(None).unwrap();
        assert_eq!(from_env.store.max_items, 10);
        assert!(from_env.domains.is_empty());

        env::set_var(ENV_CONFIG_PATH, tmp.path().join("missing.toml").display().to_string());
        assert!(ReconConfig::load(None).is_err());
        env::remove_var(ENV_CONFIG_PATH);

        env::set_current_dir(&old).unwrap();
    }
}
