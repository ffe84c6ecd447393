//! Topic label + signal tags from an ordered regex table.

use regex::Regex;

use super::compile_rule;
use crate::config::SignalRuleConfig;
use crate::error::Result;

/// Label used when no categorized signal fires.
pub const GENERIC_CATEGORY: &str = "general";

#[derive(Debug, Clone)]
struct SignalRule {
    name: String,
    category: Option<String>,
    re: Regex,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Classification {
    pub category: String,
    pub signals: Vec<String>,
}

/// Compiled `[[signals]]` table. Rule order is precedence for the category.
#[derive(Debug, Clone)]
pub struct Classifier {
    rules: Vec<SignalRule>,
}

impl Classifier {
    pub fn from_config(rules: &[SignalRuleConfig]) -> Result<Self> {
        let rules = rules
            .iter()
            .map(|r| {
                Ok(SignalRule {
                    name: r.name.clone(),
                    category: r.category.clone(),
                    re: compile_rule(&r.pattern, &format!("signal '{}'", r.name))?,
                })
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { rules })
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Every rule is tested independently; the first categorized match picks
    /// the label. Unmatched text gives no signals and the generic label.
    pub fn classify_text(&self, text: &str) -> Classification {
        let mut category: Option<&str> = None;
        let mut signals: Vec<String> = Vec::new();

        for rule in &self.rules {
            if !rule.re.is_match(text) {
                continue;
            }
            if category.is_none() {
                category = rule.category.as_deref();
            }
            if !signals.iter().any(|s| s == &rule.name) {
                signals.push(rule.name.clone());
            }
        }

        Classification {
            category: category.unwrap_or(GENERIC_CATEGORY).to_string(),
            signals,
        }
    }
}
