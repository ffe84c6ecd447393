// tests/common/mod.rs
#![allow(dead_code)]

use chrono::{DateTime, TimeZone, Utc};
use recon_intel::analyze::SequenceChooser;
use recon_intel::{IntelStore, Pipeline, ReconConfig, StaticFetcher, StoreLimits};
use std::path::Path;
use std::sync::Arc;

pub const ENERGY_URL: &str = "https://fixtures.test/energy.xml";
pub const FEDERAL_URL: &str = "https://fixtures.test/federal.xml";
pub const POLITICS_URL: &str = "https://fixtures.test/politics.xml";

pub const ENERGY_RSS: &str = include_str!("../fixtures/energy_rss.xml");
pub const FEDERAL_ATOM: &str = include_str!("../fixtures/federal_atom.xml");
pub const LUMA_PROMISE_RSS: &str = include_str!("../fixtures/luma_promise_rss.xml");
pub const LUMA_FAILURE_RSS: &str = include_str!("../fixtures/luma_failure_rss.xml");

/// Fixed "now" every fixture date is relative to (Friday).
pub fn now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 10, 16, 12, 0, 0).unwrap()
}

/// Seed rules with every domain pointed at fixture URLs. Politics has no
/// fixture, so it is always unavailable; general re-reads the energy feed.
pub fn config(store: &Path) -> ReconConfig {
    let mut cfg = ReconConfig::default_seed();
    cfg.store.path = store.to_path_buf();
    for d in cfg.domains.iter_mut() {
        let url = match d.name.as_str() {
            "energy" | "general" => ENERGY_URL,
            "federal" => FEDERAL_URL,
            _ => POLITICS_URL,
        };
        d.feeds = vec![recon_intel::types::FeedSource::new(&format!("{} fixture", d.name), url)];
    }
    cfg
}

pub fn default_fetcher() -> StaticFetcher {
    StaticFetcher::new()
        .with(ENERGY_URL, ENERGY_RSS)
        .with(FEDERAL_URL, FEDERAL_ATOM)
}

/// Pipeline with deterministic angle picks.
pub fn pipeline(cfg: ReconConfig, fetcher: StaticFetcher) -> Pipeline {
    let store = IntelStore::new(cfg.store.path.clone(), StoreLimits::from(&cfg.store));
    Pipeline::new(cfg, Arc::new(fetcher))
        .unwrap()
        .with_store(store)
        .with_chooser(Box::new(SequenceChooser::new(vec![0, 1])))
}
