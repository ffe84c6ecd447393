// src/pipeline.rs
//! Orchestrator: scan every domain, score, correlate, fold into the store,
//! maintain it and persist. One call to `run_once` is one run.

use chrono::{DateTime, Utc};
use metrics::{counter, gauge};
use serde::Serialize;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Instant;

use crate::analyze::crossref::to_intel_item;
use crate::analyze::{Analyzers, Chooser, RandomChooser};
use crate::config::ReconConfig;
use crate::error::Result;
use crate::ingest::fetch::FeedFetcher;
use crate::ingest::{ensure_metrics_described, scan_domain, DomainScanner};
use crate::sentiment::quick_sentiment;
use crate::store::{self, IntelStore, PhaseTracker, RunPhase};
use crate::types::{Finding, IntelDatabase, IntelItem};

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct ModuleReport {
    pub name: String,
    pub findings: usize,
    pub failed: bool,
}

/// Summary of one run. `database` is the post-run state (persisted or not).
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub started_at: DateTime<Utc>,
    pub duration_ms: u128,
    pub modules: Vec<ModuleReport>,
    /// Findings after cross-module dedup.
    pub findings: usize,
    /// Findings that cleared the juiciness floor.
    pub scored: usize,
    pub below_floor: usize,
    /// Items whose fingerprint was not in the store before this run.
    pub new_items: usize,
    pub cross_refs: usize,
    pub purged: usize,
    pub trimmed: usize,
    pub stored_items: usize,
    pub run_count: u64,
    pub persisted: bool,
    #[serde(skip)]
    pub database: IntelDatabase,
}

impl RunReport {
    pub fn failed_modules(&self) -> impl Iterator<Item = &str> {
        self.modules.iter().filter(|m| m.failed).map(|m| m.name.as_str())
    }
}

pub struct Pipeline {
    config: ReconConfig,
    analyzers: Analyzers,
    domains: Vec<Arc<DomainScanner>>,
    fetcher: Arc<dyn FeedFetcher>,
    store: IntelStore,
    chooser: Box<dyn Chooser>,
}

impl Pipeline {
    /// Compile every rule table of `config`. Invalid patterns fail here,
    /// before anything is fetched.
    pub fn new(config: ReconConfig, fetcher: Arc<dyn FeedFetcher>) -> Result<Self> {
        let analyzers = Analyzers::from_config(&config)?;
        let domains = DomainScanner::all_from_config(&config, analyzers.classifier.clone())?
            .into_iter()
            .map(Arc::new)
            .collect();
        let store = IntelStore::from_config(&config.store);
        Ok(Self {
            config,
            analyzers,
            domains,
            fetcher,
            store,
            chooser: Box::new(RandomChooser::from_entropy()),
        })
    }

    pub fn with_store(mut self, store: IntelStore) -> Self {
        self.store = store;
        self
    }

    pub fn with_chooser(mut self, chooser: Box<dyn Chooser>) -> Self {
        self.chooser = chooser;
        self
    }

    pub fn store(&self) -> &IntelStore {
        &self.store
    }

    /// Run every scan module. Each module runs as its own task so a panic in
    /// one is contained; it then counts as zero findings.
    pub async fn scan_all(&self, now: DateTime<Utc>) -> (Vec<Finding>, Vec<ModuleReport>) {
        let spawn = |domain: &Arc<DomainScanner>| {
            let fetcher = self.fetcher.clone();
            let domain = domain.clone();
            tokio::spawn(scan_domain(fetcher, domain, now))
        };

        let mut joined = Vec::with_capacity(self.domains.len());
        if self.config.pipeline.concurrent_modules {
            let handles: Vec<_> = self.domains.iter().map(|d| (d.name.clone(), spawn(d))).collect();
            for (name, handle) in handles {
                joined.push((name, handle.await));
            }
        } else {
            for d in &self.domains {
                let res = spawn(d).await;
                joined.push((d.name.clone(), res));
            }
        }

        let mut findings = Vec::new();
        let mut reports = Vec::with_capacity(joined.len());
        for (name, res) in joined {
            match res {
                Ok(found) => {
                    reports.push(ModuleReport {
                        name,
                        findings: found.len(),
                        failed: false,
                    });
                    findings.extend(found);
                }
                Err(e) => {
                    tracing::error!(target: "pipeline", module = %name, error = %e, "scan module failed; counting zero findings");
                    counter!("recon_module_failures_total", "module" => name.clone()).increment(1);
                    reports.push(ModuleReport {
                        name,
                        findings: 0,
                        failed: true,
                    });
                }
            }
        }

        // Modules overlap (general news re-reads the same outlets).
        let mut seen = HashSet::new();
        findings.retain(|f| seen.insert(f.fingerprint.clone()));
        (findings, reports)
    }

    /// One full run. With `persist == false` the store is neither locked nor
    /// written; the would-be result is still returned.
    pub async fn run_once(&mut self, now: DateTime<Utc>, persist: bool) -> Result<RunReport> {
        ensure_metrics_described();
        let t0 = Instant::now();
        let _lock = if persist { Some(self.store.lock(now)?) } else { None };

        let mut db = self.store.load();
        let mut phase = PhaseTracker::new();
        let limits = self.store.limits;

        let (findings, modules) = self.scan_all(now).await;
        let found = findings.len();

        // Scored
        let floor = self.config.store.min_juiciness;
        let mut batch: Vec<IntelItem> = Vec::with_capacity(found);
        for f in findings {
            let sentiment = quick_sentiment(&f.combined_text());
            let score = self.analyzers.scorer.score(&f, sentiment);
            if score.juiciness < floor {
                continue;
            }
            batch.push(IntelItem {
                finding: f,
                juiciness: score.juiciness,
                tags: score.tags,
                angles: Vec::new(),
                sentiment,
                used: false,
                used_count: 0,
                last_used: None,
            });
        }
        let scored = batch.len();
        phase.advance(RunPhase::Scored)?;

        // Correlated: only items the store has not seen are compared.
        let stored_angles: HashMap<&str, &Vec<String>> = db
            .intel
            .iter()
            .filter(|i| !i.angles.is_empty())
            .map(|i| (i.fingerprint(), &i.angles))
            .collect();
        let stored_fps: HashSet<&str> = db.intel.iter().map(IntelItem::fingerprint).collect();

        let fresh: Vec<IntelItem> = batch
            .iter()
            .filter(|i| !stored_fps.contains(i.fingerprint()))
            .cloned()
            .collect();
        let cross_refs = self
            .analyzers
            .crossref
            .detect(&fresh, &db.intel, &db.cross_refs);
        counter!("recon_crossrefs_total").increment(cross_refs.len() as u64);
        batch.extend(cross_refs.iter().map(to_intel_item));

        let mut new_items = 0usize;
        for item in batch.iter_mut() {
            match stored_angles.get(item.fingerprint()) {
                Some(angles) => item.angles = (*angles).clone(),
                None => {
                    item.angles = self.analyzers.angles.generate(
                        &item.tags,
                        &item.finding.entities,
                        self.chooser.as_mut(),
                    )
                }
            }
            if !stored_fps.contains(item.fingerprint()) {
                new_items += 1;
            }
        }
        phase.advance(RunPhase::Correlated)?;

        let existing = std::mem::take(&mut db.intel);
        let mut intel = store::merge(batch, existing);
        phase.advance(RunPhase::Merged)?;

        intel = store::dedup(intel);
        phase.advance(RunPhase::Deduplicated)?;

        let purged = store::purge(&mut intel, now, limits.max_age_hours);
        phase.advance(RunPhase::Purged)?;

        let trimmed = store::trim(&mut intel, limits.max_items);
        phase.advance(RunPhase::Trimmed)?;

        let new_refs = cross_refs.len();
        db.cross_refs = store::merge_cross_refs(
            cross_refs,
            std::mem::take(&mut db.cross_refs),
            limits.max_cross_refs,
        );
        db.stats = store::compute_stats(&intel, &db.cross_refs, found, new_items, &db.stats);
        db.intel = intel;
        db.last_run = Some(now);
        db.run_count += 1;
        phase.advance(RunPhase::StatsRefreshed)?;

        if persist {
            self.store.save(&db)?;
            phase.advance(RunPhase::Persisted)?;
        }
        gauge!("recon_store_items").set(db.intel.len() as f64);

        let report = RunReport {
            started_at: now,
            duration_ms: t0.elapsed().as_millis(),
            modules,
            findings: found,
            scored,
            below_floor: found - scored,
            new_items,
            cross_refs: new_refs,
            purged,
            trimmed,
            stored_items: db.intel.len(),
            run_count: db.run_count,
            persisted: persist,
            database: db,
        };
        tracing::info!(
            target: "pipeline",
            findings = report.findings,
            scored = report.scored,
            new_items = report.new_items,
            cross_refs = report.cross_refs,
            purged = report.purged,
            trimmed = report.trimmed,
            stored = report.stored_items,
            run_count = report.run_count,
            duration_ms = report.duration_ms as u64,
            "run complete"
        );
        Ok(report)
    }
}
