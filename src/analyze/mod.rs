// src/analyze/mod.rs
//! Rule engines over Findings: classification, entity extraction, juiciness
//! scoring, angle phrasing and cross-referencing. Every table comes from
//! `ReconConfig`; nothing in here knows about a particular region.

pub mod angles;
pub mod classify;
pub mod crossref;
pub mod entities;
pub mod scoring;

use regex::{Regex, RegexBuilder};
use std::sync::Arc;

use crate::config::ReconConfig;
use crate::error::{ReconError, Result};

// Re-export convenient types.
pub use crate::analyze::angles::{AngleGenerator, Chooser, RandomChooser, SequenceChooser};
pub use crate::analyze::classify::{Classification, Classifier};
pub use crate::analyze::crossref::CrossRefEngine;
pub use crate::analyze::entities::{extract_entities, extract_money};
pub use crate::analyze::scoring::{Score, Scorer};

/// Rule patterns are always case-insensitive; `what` names the rule in errors.
pub(crate) fn compile_rule(pattern: &str, what: &str) -> Result<Regex> {
    RegexBuilder::new(pattern)
        .case_insensitive(true)
        .build()
        .map_err(|e| ReconError::config(format!("invalid pattern in {what}: {e}")))
}

/// All rule tables compiled once per run.
#[derive(Debug, Clone)]
pub struct Analyzers {
    pub classifier: Arc<Classifier>,
    pub scorer: Scorer,
    pub angles: AngleGenerator,
    pub crossref: CrossRefEngine,
}

impl Analyzers {
    pub fn from_config(cfg: &ReconConfig) -> Result<Self> {
        Ok(Self {
            classifier: Arc::new(Classifier::from_config(&cfg.signals)?),
            scorer: Scorer::from_config(&cfg.boosts)?,
            angles: AngleGenerator::from_config(&cfg.angles),
            crossref: CrossRefEngine::from_config(&cfg.contradictions)?,
        })
    }
}
