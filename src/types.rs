// src/types.rs
//! Records that flow through the recon pipeline and the persisted store shape.
//!
//! Field names serialize in camelCase so the store file stays readable by the
//! downstream picker (`sourceUrl`, `usedCount`, `crossRefs`, ...).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Current on-disk schema version.
pub const STORE_VERSION: &str = "3.0.0";

/// Category assigned to items synthesized from cross-references.
pub const CROSS_REFERENCE_CATEGORY: &str = "cross-reference";

/// An entity of interest plus the literal substrings used to spot it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Target {
    pub name: String,
    #[serde(default)]
    pub role: String,
    #[serde(default)]
    pub keywords: Vec<String>,
}

impl Target {
    pub fn new(name: &str, role: &str, keywords: &[&str]) -> Self {
        Self {
            name: name.to_string(),
            role: role.to_string(),
            keywords: keywords.iter().map(|k| k.to_string()).collect(),
        }
    }
}

/// A syndication feed belonging to one topic domain.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct FeedSource {
    pub name: String,
    pub url: String,
}

impl FeedSource {
    pub fn new(name: &str, url: &str) -> Self {
        Self {
            name: name.to_string(),
            url: url.to_string(),
        }
    }
}

/// Coarse polarity of a piece of text.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Sentiment {
    Negative,
    #[default]
    Neutral,
    Positive,
}

/// One normalized candidate event pulled from a feed item.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Finding {
    pub category: String,
    pub subcategory: String,
    #[serde(default)]
    pub signals: Vec<String>,
    pub headline: String,
    #[serde(default)]
    pub summary: String,
    #[serde(default)]
    pub source: String,
    #[serde(default)]
    pub source_url: String,
    #[serde(default)]
    pub entities: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub money_mentioned: Vec<String>,
    pub timestamp: DateTime<Utc>,
    pub fingerprint: String,
}

impl Finding {
    /// Headline and summary joined, the text every rule table is matched against.
    pub fn combined_text(&self) -> String {
        if self.summary.is_empty() {
            self.headline.clone()
        } else {
            format!("{} {}", self.headline, self.summary)
        }
    }
}

/// A scored Finding as persisted in the store.
///
/// `used`, `used_count` and `last_used` belong to the downstream consumer.
/// The pipeline only carries them forward.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct IntelItem {
    #[serde(flatten)]
    pub finding: Finding,
    pub juiciness: u8,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default, rename = "gillito_angles")]
    pub angles: Vec<String>,
    #[serde(default)]
    pub sentiment: Sentiment,
    #[serde(default)]
    pub used: bool,
    #[serde(default)]
    pub used_count: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_used: Option<DateTime<Utc>>,
}

impl IntelItem {
    pub fn fingerprint(&self) -> &str {
        &self.finding.fingerprint
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        self.finding.timestamp
    }

    pub fn is_cross_reference(&self) -> bool {
        self.finding.category == CROSS_REFERENCE_CATEGORY
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct CrossRefNewItem {
    pub headline: String,
    pub date: DateTime<Utc>,
    pub category: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct CrossRefOldItem {
    pub headline: String,
    pub date: DateTime<Utc>,
}

/// A detected relationship between a new item and a stored one.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct CrossReference {
    #[serde(rename = "type")]
    pub kind: String,
    pub entities: Vec<String>,
    pub new_item: CrossRefNewItem,
    pub old_item: CrossRefOldItem,
    pub juiciness: u8,
    pub angle: String,
}

/// Aggregates rebuilt from scratch on every run (except `lifetime_findings`).
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct IntelStats {
    pub total_items: usize,
    pub unused_items: usize,
    pub cross_ref_count: usize,
    pub avg_juiciness: f64,
    pub by_category: BTreeMap<String, usize>,
    pub by_entity: BTreeMap<String, usize>,
    pub by_signal: BTreeMap<String, usize>,
    pub last_run_findings: usize,
    pub last_run_new_items: usize,
    /// Monotonic across runs.
    pub lifetime_findings: u64,
}

/// Root of the persisted store file.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct IntelDatabase {
    pub version: String,
    #[serde(default)]
    pub last_run: Option<DateTime<Utc>>,
    #[serde(default)]
    pub run_count: u64,
    #[serde(default)]
    pub intel: Vec<IntelItem>,
    #[serde(default)]
    pub cross_refs: Vec<CrossReference>,
    #[serde(default)]
    pub stats: IntelStats,
}

impl Default for IntelDatabase {
    fn default() -> Self {
        Self {
            version: STORE_VERSION.to_string(),
            last_run: None,
            run_count: 0,
            intel: Vec::new(),
            cross_refs: Vec::new(),
            stats: IntelStats::default(),
        }
    }
}
