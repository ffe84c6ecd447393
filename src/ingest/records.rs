// src/ingest/records.rs
//! JSON record APIs (disaster declarations, grant awards, spending totals).
//! Each source is mapped onto Findings by its `RecordSourceConfig` templates.

use chrono::{DateTime, NaiveDate, Utc};
use metrics::counter;
use once_cell::sync::OnceCell;
use regex::{Captures, Regex};
use serde_json::Value;
use std::collections::HashSet;
use std::sync::Arc;

use crate::analyze::{extract_entities, extract_money};
use crate::config::RecordSourceConfig;
use crate::ingest::fetch::{FeedFetcher, FetchOutcome};
use crate::ingest::{DomainScanner, SUMMARY_CHARS};
use crate::text::{fingerprint, is_within, parse_pub_date, sanitize, truncate_chars};
use crate::types::Finding;

const MAX_MONEY: usize = 5;

fn re_placeholder() -> &'static Regex {
    static RE: OnceCell<Regex> = OnceCell::new();
    RE.get_or_init(|| Regex::new(r"\{([^{}]+)\}").unwrap())
}

/// Records selected by `records_at`, capped at `max_records`.
pub fn select_records(body: &str, source: &RecordSourceConfig) -> serde_json::Result<Vec<Value>> {
    let doc: Value = serde_json::from_str(body)?;
    let at = if source.records_at.is_empty() {
        Some(&doc)
    } else {
        doc.pointer(&source.records_at)
    };
    Ok(match at {
        Some(Value::Array(items)) => items.iter().take(source.max_records).cloned().collect(),
        Some(obj @ Value::Object(_)) => vec![obj.clone()],
        _ => Vec::new(),
    })
}

/// Scalar at `path` (a field name or slash-separated pointer) as text.
pub fn field(record: &Value, path: &str) -> Option<String> {
    let pointer = format!("/{}", path.trim().trim_start_matches('/'));
    match record.pointer(&pointer)? {
        Value::String(s) => Some(s.trim().to_string()).filter(|s| !s.is_empty()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

/// `$1,234,567` from a number or numeric string; cents dropped.
pub fn format_usd(raw: &str) -> Option<String> {
    let v: f64 = raw.trim().parse().ok()?;
    let digits = format!("{:.0}", v.abs());
    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(c);
    }
    let sign = if v < 0.0 { "-" } else { "" };
    Some(format!("{sign}${grouped}"))
}

/// Fill a template from one record. Unresolved placeholders render empty.
pub fn render(template: &str, record: &Value, now: DateTime<Utc>) -> String {
    re_placeholder()
        .replace_all(template, |caps: &Captures| {
            let spec = &caps[1];
            let (paths, filter) = match spec.split_once('|') {
                Some((p, f)) => (p, Some(f.trim())),
                None => (spec, None),
            };
            let value = paths.split(',').find_map(|p| match p.trim() {
                "@today" => Some(now.format("%Y-%m-%d").to_string()),
                p => field(record, p),
            });
            match (value, filter) {
                (Some(v), Some("usd")) => format_usd(&v).unwrap_or(v),
                (Some(v), _) => v,
                (None, _) => String::new(),
            }
        })
        .into_owned()
}

/// Dated records accept RFC 3339, RFC 2822 or a bare `YYYY-MM-DD`.
fn record_timestamp(record: &Value, source: &RecordSourceConfig, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
    let Some(date_field) = source.date_field.as_deref() else {
        return now.date_naive().and_hms_opt(0, 0, 0).map(|d| d.and_utc());
    };
    let raw = field(record, date_field)?;
    parse_pub_date(&raw).or_else(|| {
        NaiveDate::parse_from_str(raw.get(..10).unwrap_or(raw.as_str()), "%Y-%m-%d")
            .ok()
            .and_then(|d| d.and_hms_opt(0, 0, 0))
            .map(|d| d.and_utc())
    })
}

fn push_unique(out: &mut Vec<String>, value: String) {
    if !value.is_empty() && !out.contains(&value) {
        out.push(value);
    }
}

impl DomainScanner {
    /// Map one record onto a Finding. Records skip the relevance gate;
    /// `None` only for records that are undated, stale or have no headline.
    pub(crate) fn record_to_finding(
        &self,
        source: &RecordSourceConfig,
        record: &Value,
        now: DateTime<Utc>,
    ) -> Option<Finding> {
        let ts = record_timestamp(record, source, now)?;
        if !is_within(ts, self.recency_hours, now) {
            return None;
        }

        let headline = sanitize(&render(&source.headline, record, now));
        if headline.is_empty() {
            return None;
        }
        let key = source
            .key
            .as_deref()
            .map(|k| render(k, record, now))
            .unwrap_or_else(|| headline.clone());
        let fp = fingerprint(&key);
        if fp.is_empty() {
            return None;
        }

        let summary = truncate_chars(&sanitize(&render(&source.summary, record, now)), SUMMARY_CHARS);
        let text = format!("{headline} {summary}");
        let class = self.classifier.classify_text(&text);

        let mut signals = Vec::new();
        for s in source.signals.iter().chain(class.signals.iter()) {
            push_unique(&mut signals, s.clone());
        }

        let mut entities = Vec::new();
        for e in &source.entities {
            push_unique(&mut entities, e.clone());
        }
        for f in &source.entity_fields {
            if let Some(v) = field(record, f) {
                push_unique(&mut entities, sanitize(&v));
            }
        }
        for e in extract_entities(&text, &self.targets) {
            push_unique(&mut entities, e);
        }

        let mut money = Vec::new();
        for f in &source.money_fields {
            if let Some(v) = field(record, f).and_then(|v| format_usd(&v)) {
                push_unique(&mut money, v);
            }
        }
        for m in extract_money(&text) {
            push_unique(&mut money, m);
        }
        money.truncate(MAX_MONEY);

        Some(Finding {
            category: self.category.clone(),
            subcategory: source.subcategory.clone().unwrap_or(class.category),
            signals,
            headline,
            summary,
            source: source.name.clone(),
            source_url: render(&source.link, record, now).trim().to_string(),
            entities,
            money_mentioned: money,
            timestamp: ts,
            fingerprint: fp,
        })
    }
}

/// Fetch and map one record source. Unavailable or malformed payloads give
/// zero findings.
async fn scan_record_source(
    fetcher: &dyn FeedFetcher,
    domain: &DomainScanner,
    idx: usize,
    now: DateTime<Utc>,
) -> Vec<Finding> {
    let source = &domain.records[idx];
    let body = match fetcher.fetch_json(&source.url, domain.timeout).await {
        FetchOutcome::Body(b) => b,
        FetchOutcome::Unavailable { reason } => {
            tracing::warn!(target: "scan", domain = %domain.name, source = %source.name, reason = %reason, "record source unavailable; skipped");
            counter!("recon_source_unavailable_total", "domain" => domain.name.clone()).increment(1);
            return Vec::new();
        }
    };

    let records = match select_records(&body, source) {
        Ok(r) => r,
        Err(e) => {
            tracing::warn!(target: "scan", domain = %domain.name, source = %source.name, error = %e, "record payload malformed; skipped");
            counter!("recon_source_unavailable_total", "domain" => domain.name.clone()).increment(1);
            return Vec::new();
        }
    };
    counter!("recon_records_total", "domain" => domain.name.clone()).increment(records.len() as u64);

    let findings: Vec<Finding> = records
        .iter()
        .filter_map(|r| domain.record_to_finding(source, r, now))
        .collect();
    tracing::debug!(
        target: "scan",
        domain = %domain.name,
        source = %source.name,
        records = records.len(),
        findings = findings.len(),
        "record source scanned"
    );
    findings
}

/// Every record source of `domain`, each as its own task, awaited together
/// in configured order. A crashed source counts as zero findings.
pub async fn scan_records(
    fetcher: Arc<dyn FeedFetcher>,
    domain: Arc<DomainScanner>,
    now: DateTime<Utc>,
) -> Vec<Finding> {
    let handles: Vec<_> = (0..domain.records.len())
        .map(|idx| {
            let fetcher = fetcher.clone();
            let domain = domain.clone();
            tokio::spawn(async move { scan_record_source(fetcher.as_ref(), &domain, idx, now).await })
        })
        .collect();

    let mut seen = HashSet::new();
    let mut findings = Vec::new();
    for (idx, handle) in handles.into_iter().enumerate() {
        match handle.await {
            Ok(found) => findings.extend(found.into_iter().filter(|f| seen.insert(f.fingerprint.clone()))),
            Err(e) => {
                tracing::error!(target: "scan", domain = %domain.name, source = %domain.records[idx].name, error = %e, "record source crashed; counting zero findings");
                counter!("recon_source_unavailable_total", "domain" => domain.name.clone()).increment(1);
            }
        }
    }
    findings
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analyze::Classifier;
    use crate::config::ReconConfig;
    use crate::ingest::fetch::StaticFetcher;
    use async_trait::async_trait;
    use chrono::TimeZone;
    use std::time::Duration;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 10, 16, 12, 0, 0).unwrap()
    }

    fn domain(urls: &[&str]) -> DomainScanner {
        let cfg = ReconConfig::default_seed();
        let mut d = cfg.domains.iter().find(|d| d.name == "gov_records").unwrap().clone();
        for (src, url) in d.records.iter_mut().zip(urls) {
            src.url = url.to_string();
        }
        d.records.truncate(urls.len());
        let classifier = Arc::new(Classifier::from_config(&cfg.signals).unwrap());
        DomainScanner::from_config(&d, Duration::from_secs(1), classifier).unwrap()
    }

    const DECLARATIONS: &str = r#"{
        "DisasterDeclarationsSummaries": [
            {"disasterNumber": 4871, "declarationType": "DR", "declarationTitle": "TROPICAL STORM ERNESTO",
             "incidentType": "Hurricane", "declarationDate": "2026-10-15T00:00:00.000Z"},
            {"disasterNumber": 4870, "declarationType": "EM", "declarationTitle": "",
             "incidentType": "Flood", "declarationDate": "2026-10-14T18:00:00.000Z"},
            {"disasterNumber": 4339, "declarationType": "DR", "declarationTitle": "HURRICANE MARIA",
             "incidentType": "Hurricane", "declarationDate": "2017-09-20T00:00:00.000Z"}
        ]
    }"#;

    const GRANTS: &str = r#"{"PublicAssistanceGrantAwardActivities": [
        {"disasterNumber": 4871, "applicantName": "Municipio de Ponce", "projectTitle": "Reparación de puentes",
         "federalShareObligated": 2500000, "obligationDate": "2026-10-16", "incidentType": "Hurricane"},
        {"disasterNumber": 4871, "applicantName": "AAA", "projectTitle": "Planta de filtros",
         "federalShareObligated": 830000.75, "obligationDate": "2026-10-15T00:00:00.000Z", "incidentType": "Hurricane"}
    ]}"#;

    #[test]
    fn templates_resolve_paths_alternatives_and_dollars() {
        let rec: Value = serde_json::json!({
            "name": "Municipio de Ponce",
            "amount": 1234567.89,
            "nested": {"id": 7},
            "title": ""
        });
        assert_eq!(
            render("{title,name} #{nested/id}: {amount|usd} ({missing}) {@today}", &rec, now()),
            "Municipio de Ponce #7: $1,234,568 () 2026-10-16"
        );
        assert_eq!(format_usd("999").as_deref(), Some("$999"));
        assert_eq!(format_usd("45000000").as_deref(), Some("$45,000,000"));
        assert_eq!(format_usd("n/a"), None);
    }

    #[test]
    fn object_root_is_a_single_record() {
        let d = domain(&["https://a.test", "https://b.test", "https://c.test"]);
        let spending = &d.records[2];
        let recs = select_records(r#"{"total_prime_amount": 9100000000}"#, spending).unwrap();
        assert_eq!(recs.len(), 1);
        assert!(select_records("[oops", spending).is_err());
    }

    #[tokio::test]
    async fn declarations_map_onto_findings() {
        let fetcher: Arc<dyn FeedFetcher> = Arc::new(StaticFetcher::new().with("https://fema.test/decl", DECLARATIONS));
        let out = scan_records(fetcher, Arc::new(domain(&["https://fema.test/decl"])), now()).await;

        // 2017 declaration is outside the window
        assert_eq!(out.len(), 2);
        let storm = &out[0];
        assert_eq!(storm.headline, "FEMA DR: TROPICAL STORM ERNESTO");
        assert_eq!(storm.category, "government_records");
        assert_eq!(storm.subcategory, "fema_disaster");
        assert_eq!(storm.source, "OpenFEMA - Declaraciones");
        assert_eq!(storm.source_url, "https://www.fema.gov/disaster/4871");
        assert_eq!(storm.signals[..2], ["funding".to_string(), "disaster".to_string()]);
        assert_eq!(storm.entities[..2], ["FEMA".to_string(), "PR Government".to_string()]);
        assert_eq!(storm.fingerprint, fingerprint("fema-4871"));
        assert_eq!(storm.timestamp, Utc.with_ymd_and_hms(2026, 10, 15, 0, 0, 0).unwrap());
        // empty title falls through to the incident type
        assert_eq!(out[1].headline, "FEMA EM: Flood");
    }

    #[tokio::test]
    async fn grant_amount_and_applicant_become_money_and_entity() {
        let fetcher: Arc<dyn FeedFetcher> = Arc::new(
            StaticFetcher::new()
                .with("https://fema.test/decl", "{}")
                .with("https://fema.test/pa", GRANTS),
        );
        let out = scan_records(
            fetcher,
            Arc::new(domain(&["https://fema.test/decl", "https://fema.test/pa"])),
            now(),
        )
        .await;

        assert_eq!(out.len(), 2);
        let g = &out[0];
        assert_eq!(g.headline, "FEMA Grant: $2,500,000 to Municipio de Ponce");
        assert_eq!(g.money_mentioned[0], "$2,500,000");
        assert!(g.entities.contains(&"Municipio de Ponce".to_string()));
        assert_eq!(g.timestamp, Utc.with_ymd_and_hms(2026, 10, 16, 0, 0, 0).unwrap());
        assert_eq!(out[1].headline, "FEMA Grant: $830,001 to AAA");
    }

    #[tokio::test]
    async fn undated_source_is_stamped_with_run_day() {
        let fetcher: Arc<dyn FeedFetcher> = Arc::new(
            StaticFetcher::new().with("https://usa.test/pr", r#"{"total_prime_amount": 9100000000, "population": 3200000}"#),
        );
        let mut d = domain(&["https://a.test", "https://b.test", "https://usa.test/pr"]);
        d.records.drain(..2);
        let out = scan_records(fetcher, Arc::new(d), now()).await;

        assert_eq!(out.len(), 1);
        assert_eq!(out[0].headline, "Total Federal Spending in PR: $9,100,000,000 awarded");
        assert_eq!(out[0].timestamp, Utc.with_ymd_and_hms(2026, 10, 16, 0, 0, 0).unwrap());
        assert_eq!(out[0].fingerprint, fingerprint("usaspending-pr-total-2026-10-16"));
    }

    /// Panics for one URL, serves the rest from fixtures.
    struct CrashingFetcher {
        crash_url: &'static str,
        inner: StaticFetcher,
    }

    #[async_trait]
    impl FeedFetcher for CrashingFetcher {
        async fn fetch(&self, url: &str, timeout: Duration) -> FetchOutcome {
            if url == self.crash_url {
                panic!("record source crashed");
            }
            self.inner.fetch(url, timeout).await
        }
    }

    #[tokio::test]
    async fn failing_source_does_not_sink_its_sibling() {
        let urls = ["https://fema.test/decl", "https://fema.test/pa"];

        // second source unavailable
        let fetcher: Arc<dyn FeedFetcher> = Arc::new(StaticFetcher::new().with(urls[0], DECLARATIONS));
        let out = scan_records(fetcher, Arc::new(domain(&urls)), now()).await;
        assert_eq!(out.len(), 2);

        // second source malformed
        let fetcher: Arc<dyn FeedFetcher> =
            Arc::new(StaticFetcher::new().with(urls[0], DECLARATIONS).with(urls[1], "<html>"));
        let out = scan_records(fetcher, Arc::new(domain(&urls)), now()).await;
        assert_eq!(out.len(), 2);

        // first source crashes
        let fetcher: Arc<dyn FeedFetcher> = Arc::new(CrashingFetcher {
            crash_url: urls[0],
            inner: StaticFetcher::new().with(urls[1], GRANTS),
        });
        let out = scan_records(fetcher, Arc::new(domain(&urls)), now()).await;
        assert!(out.iter().all(|f| f.source == "OpenFEMA - Asistencia Pública"));
        assert_eq!(out.len(), 2);
    }
}
