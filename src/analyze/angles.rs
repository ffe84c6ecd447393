//! Angle phrasing: pick one template for the item's highest-priority tag, then
//! append one attribution line. Randomness goes through a `Chooser` so tests
//! can pin the picks.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::collections::HashMap;

use crate::config::AngleConfig;

/// Placeholder replaced by the item's primary entity.
pub const ENTITY_PLACEHOLDER: &str = "{entity}";

/// Source of template picks.
pub trait Chooser: Send {
    /// Index in `0..len`. Never called with `len == 0`.
    fn pick(&mut self, len: usize) -> usize;
}

/// Production chooser backed by `StdRng`.
#[derive(Debug)]
pub struct RandomChooser(StdRng);

impl RandomChooser {
    pub fn from_entropy() -> Self {
        Self(StdRng::from_os_rng())
    }

    pub fn seeded(seed: u64) -> Self {
        Self(StdRng::seed_from_u64(seed))
    }
}

impl Chooser for RandomChooser {
    fn pick(&mut self, len: usize) -> usize {
        self.0.random_range(0..len)
    }
}

/// Replays a fixed index sequence (cycled, reduced modulo `len`).
#[derive(Debug, Clone)]
pub struct SequenceChooser {
    seq: Vec<usize>,
    pos: usize,
}

impl SequenceChooser {
    pub fn new(seq: Vec<usize>) -> Self {
        Self { seq, pos: 0 }
    }
}

impl Chooser for SequenceChooser {
    fn pick(&mut self, len: usize) -> usize {
        if self.seq.is_empty() {
            return 0;
        }
        let v = self.seq[self.pos % self.seq.len()];
        self.pos += 1;
        v % len
    }
}

#[derive(Debug, Clone)]
pub struct AngleGenerator {
    priority: Vec<String>,
    templates: HashMap<String, Vec<String>>,
    default: Vec<String>,
    attribution: Vec<String>,
    fallback_entity: String,
}

impl AngleGenerator {
    pub fn from_config(cfg: &AngleConfig) -> Self {
        Self {
            priority: cfg.priority.clone(),
            templates: cfg.templates.clone(),
            default: cfg.default.clone(),
            attribution: cfg.attribution.clone(),
            fallback_entity: cfg.fallback_entity.clone(),
        }
    }

    /// Exactly two phrasings: the thematic one, then the attribution line.
    pub fn generate(
        &self,
        tags: &[String],
        entities: &[String],
        chooser: &mut dyn Chooser,
    ) -> Vec<String> {
        let entity = entities
            .first()
            .map(String::as_str)
            .unwrap_or(self.fallback_entity.as_str());

        let themed = self
            .priority
            .iter()
            .filter(|p| tags.iter().any(|t| t == *p))
            .find_map(|p| self.templates.get(p).filter(|v| !v.is_empty()))
            .unwrap_or(&self.default);

        vec![
            Self::render(themed, entity, chooser),
            Self::render(&self.attribution, entity, chooser),
        ]
    }

    fn render(set: &[String], entity: &str, chooser: &mut dyn Chooser) -> String {
        if set.is_empty() {
            return entity.to_string();
        }
        let idx = chooser.pick(set.len()).min(set.len() - 1);
        set[idx].replace(ENTITY_PLACEHOLDER, entity)
    }
}
