//! Juiciness: a 1..=10 newsworthiness heuristic over a Finding.
//!
//! score = 5
//!       + Σ points of every boost rule matching headline + summary
//!       + 1 if sentiment is negative
//!       + 1 if more than one entity
//!       + 1 if more than two signals
//! clamped to [1, 10]. No randomness: same item + same table, same score.

use regex::Regex;

use super::compile_rule;
use crate::config::BoostRuleConfig;
use crate::error::Result;
use crate::types::{Finding, Sentiment};

pub const BASE_SCORE: i32 = 5;
pub const MIN_SCORE: u8 = 1;
pub const MAX_SCORE: u8 = 10;

#[derive(Debug, Clone)]
struct BoostRule {
    re: Regex,
    points: i32,
    tag: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Score {
    pub juiciness: u8,
    /// One tag per matched rule, table order.
    pub tags: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct Scorer {
    rules: Vec<BoostRule>,
}

impl Scorer {
    pub fn from_config(rules: &[BoostRuleConfig]) -> Result<Self> {
        let rules = rules
            .iter()
            .map(|r| {
                Ok(BoostRule {
                    re: compile_rule(&r.pattern, &format!("boost '{}'", r.tag))?,
                    points: r.points,
                    tag: r.tag.clone(),
                })
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { rules })
    }

    pub fn score(&self, finding: &Finding, sentiment: Sentiment) -> Score {
        let text = finding.combined_text();
        let mut raw = BASE_SCORE;
        let mut tags = Vec::new();

        for rule in &self.rules {
            if rule.re.is_match(&text) {
                raw += rule.points;
                tags.push(rule.tag.clone());
            }
        }

        if sentiment == Sentiment::Negative {
            raw += 1;
        }
        if finding.entities.len() > 1 {
            raw += 1;
        }
        if finding.signals.len() > 2 {
            raw += 1;
        }

        Score {
            juiciness: raw.clamp(MIN_SCORE as i32, MAX_SCORE as i32) as u8,
            tags,
        }
    }
}
