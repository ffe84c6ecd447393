//! Lexicon-based polarity for PR-Spanish / English headlines.

use once_cell::sync::Lazy;
use std::collections::HashMap;

use crate::types::Sentiment;

static LEXICON: Lazy<HashMap<String, i32>> = Lazy::new(|| {
    let raw = include_str!("../sentiment_lexicon.json");
    serde_json::from_str::<HashMap<String, i32>>(raw).expect("valid sentiment lexicon")
});

#[derive(Debug, Clone, Default)]
pub struct SentimentAnalyzer;

impl SentimentAnalyzer {
    pub fn new() -> Self {
        Self
    }

    #[inline]
    fn word_score(&self, w: &str) -> i32 {
        *LEXICON.get(w).unwrap_or(&0)
    }

    /// Returns (score, token count).
    /// A negator within the previous 1..=2 tokens flips the sign of a lexicon hit.
    pub fn score_text(&self, text: &str) -> (i32, usize) {
        let tokens: Vec<String> = tokenize(text).collect();
        let mut score: i32 = 0;

        for i in 0..tokens.len() {
            let base = self.word_score(tokens[i].as_str());
            if base == 0 {
                continue;
            }
            let negated = (1..=2).any(|k| i >= k && is_negator(tokens[i - k].as_str()));
            score += if negated { -base } else { base };
        }

        (score, tokens.len())
    }

    pub fn classify(&self, text: &str) -> Sentiment {
        match self.score_text(text).0 {
            s if s < 0 => Sentiment::Negative,
            s if s > 0 => Sentiment::Positive,
            _ => Sentiment::Neutral,
        }
    }
}

/// Negative-charge vs positive-charge lexicon scan; ties are neutral.
pub fn quick_sentiment(text: &str) -> Sentiment {
    SentimentAnalyzer::new().classify(text)
}

fn tokenize(s: &str) -> impl Iterator<Item = String> + '_ {
    s.split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(|t| t.to_lowercase())
}

fn is_negator(tok: &str) -> bool {
    // "sin" is left out on purpose: "sin luz" is itself the bad news.
    matches!(
        tok,
        "no" | "nunca" | "jamás" | "not" | "never" | "without" | "cannot"
    )
}
