// src/ingest/mod.rs
//! Generic scan module: one `DomainScanner` per configured topic domain,
//! all driven by the same `scan_domain` routine over feeds and record APIs.
pub mod fetch;
pub mod records;
pub mod rss;

use chrono::{DateTime, Utc};
use metrics::{counter, describe_counter, describe_gauge, describe_histogram};
use once_cell::sync::OnceCell;
use regex::Regex;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use crate::analyze::{compile_rule, extract_entities, extract_money, Classifier};
use crate::config::{DomainConfig, ReconConfig, RecordSourceConfig};
use crate::error::Result;
use crate::ingest::fetch::{FeedFetcher, FetchOutcome};
use crate::ingest::records::scan_records;
use crate::ingest::rss::{parse_rss, FeedItem};
use crate::text::{fingerprint, is_recent, parse_pub_date, sanitize, truncate_chars};
use crate::types::{FeedSource, Finding, Target};

/// Chars kept from the sanitized description.
pub const SUMMARY_CHARS: usize = 400;

/// Relevance signal that accepts any matched signal.
const ANY_SIGNAL: &str = "*";

/// One-time metrics registration (so series show up on /metrics).
pub fn ensure_metrics_described() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(|| {
        describe_counter!("recon_feed_items_total", "Items parsed from feeds.");
        describe_counter!("recon_records_total", "Records read from record APIs.");
        describe_counter!(
            "recon_findings_total",
            "Findings emitted by scan modules after the relevance gate."
        );
        describe_counter!(
            "recon_source_unavailable_total",
            "Source fetches that failed, timed out, returned non-2xx or could not be read."
        );
        describe_counter!(
            "recon_module_failures_total",
            "Scan modules that crashed and were counted as zero findings."
        );
        describe_counter!("recon_crossrefs_total", "Cross-references detected.");
        describe_gauge!("recon_store_items", "Items in the intel store after the last run.");
        describe_histogram!("recon_parse_ms", "Feed parse time in milliseconds.");
    });
}

/// Compiled, immutable form of a `[[domains]]` entry.
#[derive(Debug, Clone)]
pub struct DomainScanner {
    pub name: String,
    pub category: String,
    pub recency_hours: u32,
    pub timeout: Duration,
    pub targets: Vec<Target>,
    pub feeds: Vec<FeedSource>,
    pub records: Vec<RecordSourceConfig>,
    relevance_signals: Vec<String>,
    fallback: Option<Regex>,
    fallback_entity: Option<String>,
    classifier: Arc<Classifier>,
}

impl DomainScanner {
    pub fn from_config(
        domain: &DomainConfig,
        timeout: Duration,
        classifier: Arc<Classifier>,
    ) -> Result<Self> {
        let fallback = domain
            .fallback_pattern
            .as_deref()
            .filter(|p| !p.trim().is_empty())
            .map(|p| compile_rule(p, &format!("domain '{}' fallback", domain.name)))
            .transpose()?;
        Ok(Self {
            name: domain.name.clone(),
            category: domain.category.clone(),
            recency_hours: domain.recency_hours,
            timeout,
            targets: domain.targets.clone(),
            feeds: domain.feeds.clone(),
            records: domain.records.clone(),
            relevance_signals: domain.relevance_signals.clone(),
            fallback,
            fallback_entity: domain.fallback_entity.clone(),
            classifier,
        })
    }

    /// Every domain of `cfg`, in configured order.
    pub fn all_from_config(cfg: &ReconConfig, classifier: Arc<Classifier>) -> Result<Vec<Self>> {
        cfg.domains
            .iter()
            .map(|d| Self::from_config(d, cfg.fetch_timeout_for(d), classifier.clone()))
            .collect()
    }

    /// Keep if any entity matched, a domain signal fired, or the fallback
    /// keyword regex matches.
    fn is_relevant(&self, entities: &[String], signals: &[String], text: &str) -> bool {
        if !entities.is_empty() {
            return true;
        }
        let by_signal = self.relevance_signals.iter().any(|want| {
            (want == ANY_SIGNAL && !signals.is_empty()) || signals.iter().any(|s| s == want)
        });
        by_signal || self.fallback.as_ref().is_some_and(|re| re.is_match(text))
    }

    /// Turn one parsed item into a Finding, or `None` when it is gated out.
    /// Recency and fingerprint checks happen in the caller.
    fn to_finding(
        &self,
        item: &FeedItem,
        feed: &FeedSource,
        ts: DateTime<Utc>,
        fp: String,
    ) -> Option<Finding> {
        let headline = sanitize(&item.title);
        let summary = truncate_chars(&sanitize(&item.description), SUMMARY_CHARS);
        let text = format!("{headline} {summary}");

        let mut entities = extract_entities(&text, &self.targets);
        let class = self.classifier.classify_text(&text);
        if !self.is_relevant(&entities, &class.signals, &text) {
            return None;
        }
        if entities.is_empty() {
            if let Some(fallback) = &self.fallback_entity {
                entities.push(fallback.clone());
            }
        }

        Some(Finding {
            category: self.category.clone(),
            subcategory: class.category,
            signals: class.signals,
            headline,
            summary,
            source: item
                .source
                .as_deref()
                .map(sanitize)
                .filter(|s| !s.is_empty())
                .unwrap_or_else(|| feed.name.clone()),
            source_url: item.link.trim().to_string(),
            entities,
            money_mentioned: extract_money(&text),
            timestamp: ts,
            fingerprint: fp,
        })
    }
}

/// Scan every feed of one domain. Feeds are read one at a time; an
/// unavailable feed is skipped, never fatal.
pub async fn scan_feeds(
    fetcher: &dyn FeedFetcher,
    domain: &DomainScanner,
    now: DateTime<Utc>,
) -> Vec<Finding> {
    let mut seen: HashSet<String> = HashSet::new();
    let mut findings = Vec::new();
    let (mut stale, mut dupes, mut gated) = (0usize, 0usize, 0usize);

    for feed in &domain.feeds {
        let body = match fetcher.fetch(&feed.url, domain.timeout).await {
            FetchOutcome::Body(b) => b,
            FetchOutcome::Unavailable { reason } => {
                tracing::warn!(target: "scan", domain = %domain.name, feed = %feed.name, reason = %reason, "source unavailable; skipped");
                counter!("recon_source_unavailable_total", "domain" => domain.name.clone())
                    .increment(1);
                continue;
            }
        };

        let items = parse_rss(&body);
        if items.is_empty() {
            tracing::debug!(target: "scan", domain = %domain.name, feed = %feed.name, "no items in feed");
        }

        for item in &items {
            if item.title.trim().is_empty() {
                continue;
            }
            if !is_recent(item.pub_date.as_deref(), domain.recency_hours, now) {
                stale += 1;
                continue;
            }
            let Some(ts) = item.pub_date.as_deref().and_then(parse_pub_date) else {
                stale += 1;
                continue;
            };
            let fp = fingerprint(&sanitize(&item.title));
            if fp.is_empty() || !seen.insert(fp.clone()) {
                dupes += 1;
                continue;
            }
            match domain.to_finding(item, feed, ts, fp) {
                Some(f) => findings.push(f),
                None => gated += 1,
            }
        }
    }

    tracing::debug!(
        target: "scan",
        domain = %domain.name,
        findings = findings.len(),
        stale,
        dupes,
        gated,
        "feeds scanned"
    );
    findings
}

/// One scan module: the domain's feeds, then its record sources (issued
/// together), merged with fingerprint dedup.
pub async fn scan_domain(
    fetcher: Arc<dyn FeedFetcher>,
    domain: Arc<DomainScanner>,
    now: DateTime<Utc>,
) -> Vec<Finding> {
    ensure_metrics_described();

    let mut findings = scan_feeds(fetcher.as_ref(), &domain, now).await;
    if !domain.records.is_empty() {
        let mut seen: HashSet<String> = findings.iter().map(|f| f.fingerprint.clone()).collect();
        let from_records = scan_records(fetcher, domain.clone(), now).await;
        findings.extend(from_records.into_iter().filter(|f| seen.insert(f.fingerprint.clone())));
    }

    counter!("recon_findings_total", "domain" => domain.name.clone())
        .increment(findings.len() as u64);
    tracing::info!(target: "scan", domain = %domain.name, findings = findings.len(), "domain scanned");
    findings
}
