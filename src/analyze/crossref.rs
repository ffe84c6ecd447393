//! Cross-reference engine: pairs new items with stored ones that share an
//! entity and flags contradictions and recurring issues.

use chrono::Duration;
use regex::Regex;
use std::collections::{BTreeSet, HashSet};

use super::compile_rule;
use crate::config::ContradictionRuleConfig;
use crate::error::Result;
use crate::text::{fingerprint, truncate_chars};
use crate::types::{
    CrossRefNewItem, CrossRefOldItem, CrossReference, Finding, IntelItem, Sentiment,
    CROSS_REFERENCE_CATEGORY,
};

pub const CONTRADICTION_JUICINESS: u8 = 9;
pub const RECURRING_JUICINESS: u8 = 7;
pub const RECURRING_KIND: &str = "recurring_issue";
pub const RECURRING_MIN_DAYS: i64 = 2;
pub const RECURRING_MAX_DAYS: i64 = 30;

/// Chars of the new headline that go into the dedup key.
const KEY_HEADLINE_CHARS: usize = 50;
/// Chars of each headline quoted in an angle.
const QUOTE_CHARS: usize = 90;

const DEFAULT_CONTRADICTION_ANGLE: &str = "{entity}: antes \"{old}\", ahora \"{new}\"";
const RECURRING_ANGLE: &str = "{entity} otra vez: \"{new}\" (ya pasó: \"{old}\")";

#[derive(Debug, Clone)]
struct ContradictionRule {
    kind: String,
    new_re: Regex,
    old_re: Regex,
    angle: String,
}

#[derive(Debug, Clone)]
pub struct CrossRefEngine {
    rules: Vec<ContradictionRule>,
}

/// Composite identity of a cross-reference: type, sorted shared entities,
/// truncated new headline.
pub fn dedup_key(kind: &str, entities: &[String], new_headline: &str) -> String {
    let mut sorted: Vec<&str> = entities.iter().map(String::as_str).collect();
    sorted.sort_unstable();
    format!(
        "{}|{}|{}",
        kind,
        sorted.join(","),
        truncate_chars(new_headline, KEY_HEADLINE_CHARS)
    )
}

impl CrossReference {
    pub fn dedup_key(&self) -> String {
        dedup_key(&self.kind, &self.entities, &self.new_item.headline)
    }
}

/// Case-insensitive intersection, reported with the new item's spelling, sorted.
fn shared_entities(new: &[String], old: &[String]) -> Vec<String> {
    let old_lc: HashSet<String> = old.iter().map(|e| e.to_lowercase()).collect();
    new.iter()
        .filter(|e| old_lc.contains(&e.to_lowercase()))
        .cloned()
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

fn render_angle(template: &str, entities: &[String], new: &str, old: &str) -> String {
    let entity = entities.first().map(String::as_str).unwrap_or_default();
    template
        .replace("{entity}", entity)
        .replace("{new}", &truncate_chars(new, QUOTE_CHARS))
        .replace("{old}", &truncate_chars(old, QUOTE_CHARS))
}

impl CrossRefEngine {
    pub fn from_config(rules: &[ContradictionRuleConfig]) -> Result<Self> {
        let rules = rules
            .iter()
            .map(|r| {
                let what = format!("contradiction '{}'", r.kind);
                Ok(ContradictionRule {
                    kind: r.kind.clone(),
                    new_re: compile_rule(&r.new_pattern, &what)?,
                    old_re: compile_rule(&r.old_pattern, &what)?,
                    angle: r
                        .angle
                        .clone()
                        .unwrap_or_else(|| DEFAULT_CONTRADICTION_ANGLE.to_string()),
                })
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { rules })
    }

    /// Correlate every (new, old) pair. Cross-reference items on either side
    /// are ignored. Results already present in `known` (by dedup key) are not
    /// emitted again.
    pub fn detect(
        &self,
        batch: &[IntelItem],
        existing: &[IntelItem],
        known: &[CrossReference],
    ) -> Vec<CrossReference> {
        let mut seen: HashSet<String> = known.iter().map(CrossReference::dedup_key).collect();
        let mut out = Vec::new();

        for new in batch.iter().filter(|i| !i.is_cross_reference()) {
            let new_f = &new.finding;
            if new_f.entities.is_empty() {
                continue;
            }
            let new_signals = new_f.signals.join(" ");

            for old in existing.iter().filter(|i| !i.is_cross_reference()) {
                let old_f = &old.finding;
                if old_f.entities.is_empty() || old_f.fingerprint == new_f.fingerprint {
                    continue;
                }
                let shared = shared_entities(&new_f.entities, &old_f.entities);
                if shared.is_empty() {
                    continue;
                }
                let old_signals = old_f.signals.join(" ");

                for rule in &self.rules {
                    if rule.new_re.is_match(&new_signals) && rule.old_re.is_match(&old_signals) {
                        let angle = render_angle(&rule.angle, &shared, &new_f.headline, &old_f.headline);
                        push_unique(
                            &mut out,
                            &mut seen,
                            build(&rule.kind, &shared, new_f, old_f, CONTRADICTION_JUICINESS, angle),
                        );
                    }
                }

                if new_f.subcategory == old_f.subcategory && is_recurring_gap(new_f, old_f) {
                    let angle = render_angle(RECURRING_ANGLE, &shared, &new_f.headline, &old_f.headline);
                    push_unique(
                        &mut out,
                        &mut seen,
                        build(RECURRING_KIND, &shared, new_f, old_f, RECURRING_JUICINESS, angle),
                    );
                }
            }
        }

        if !out.is_empty() {
            tracing::debug!(target: "pipeline", found = out.len(), "cross-references detected");
        }
        out
    }
}

fn is_recurring_gap(a: &Finding, b: &Finding) -> bool {
    let gap = (a.timestamp - b.timestamp).abs();
    gap >= Duration::days(RECURRING_MIN_DAYS) && gap <= Duration::days(RECURRING_MAX_DAYS)
}

fn build(
    kind: &str,
    shared: &[String],
    new: &Finding,
    old: &Finding,
    juiciness: u8,
    angle: String,
) -> CrossReference {
    CrossReference {
        kind: kind.to_string(),
        entities: shared.to_vec(),
        new_item: CrossRefNewItem {
            headline: new.headline.clone(),
            date: new.timestamp,
            category: new.category.clone(),
        },
        old_item: CrossRefOldItem {
            headline: old.headline.clone(),
            date: old.timestamp,
        },
        juiciness,
        angle,
    }
}

fn push_unique(out: &mut Vec<CrossReference>, seen: &mut HashSet<String>, cr: CrossReference) {
    if seen.insert(cr.dedup_key()) {
        out.push(cr);
    }
}

/// The storable form of a cross-reference. Angles are left empty for the
/// caller to fill.
pub fn to_intel_item(cr: &CrossReference) -> IntelItem {
    IntelItem {
        finding: Finding {
            category: CROSS_REFERENCE_CATEGORY.to_string(),
            subcategory: cr.kind.clone(),
            signals: Vec::new(),
            headline: cr.angle.clone(),
            summary: format!("{} | {}", cr.new_item.headline, cr.old_item.headline),
            source: CROSS_REFERENCE_CATEGORY.to_string(),
            source_url: String::new(),
            entities: cr.entities.clone(),
            money_mentioned: Vec::new(),
            timestamp: cr.new_item.date,
            fingerprint: fingerprint(&cr.dedup_key()),
        },
        juiciness: cr.juiciness,
        tags: vec![cr.kind.clone()],
        angles: Vec::new(),
        sentiment: Sentiment::Negative,
        used: false,
        used_count: 0,
        last_used: None,
    }
}
