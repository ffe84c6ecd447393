//! Target mention detection and money amount extraction.

use once_cell::sync::OnceCell;
use regex::Regex;

use crate::types::Target;

/// Max amounts recorded per Finding.
pub const MAX_MONEY_MENTIONS: usize = 5;

/// Names of targets whose keywords occur in `text` (case-insensitive
/// substring). The name itself also counts, but only as a whole word, so
/// short names like "ICE" do not fire inside "police".
/// Each name at most once, in target order.
pub fn extract_entities(text: &str, targets: &[Target]) -> Vec<String> {
    let haystack = text.to_lowercase();
    let mut out: Vec<String> = Vec::new();

    for t in targets {
        if out.iter().any(|n| n == &t.name) {
            continue;
        }
        let by_keyword = t
            .keywords
            .iter()
            .map(|k| k.trim().to_lowercase())
            .any(|k| !k.is_empty() && haystack.contains(&k));
        if by_keyword || contains_word(&haystack, &t.name.trim().to_lowercase()) {
            out.push(t.name.clone());
        }
    }
    out
}

fn contains_word(haystack: &str, needle: &str) -> bool {
    if needle.is_empty() {
        return false;
    }
    haystack.match_indices(needle).any(|(i, m)| {
        let before = haystack[..i].chars().next_back();
        let after = haystack[i + m.len()..].chars().next();
        !before.is_some_and(char::is_alphanumeric) && !after.is_some_and(char::is_alphanumeric)
    })
}

fn re_money() -> &'static Regex {
    static RE: OnceCell<Regex> = OnceCell::new();
    RE.get_or_init(|| {
        Regex::new(
            r"(?i)\$\s?\d[\d,]*(?:\.\d+)?(?:\s?(?:mil millones|millones|mill[oó]n|millions?|billions?|[mbk]\b))?|\d[\d,]*(?:\.\d+)?\s(?:mil millones|millones|mill[oó]n|millions?|billions?)(?:\s(?:de d[oó]lares|dollars))?",
        )
        .unwrap()
    })
}

/// Dollar figures and "N millones"-style amounts, unique, first-seen order.
pub fn extract_money(text: &str) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    for m in re_money().find_iter(text) {
        let s = m.as_str().trim().to_string();
        if !out.contains(&s) {
            out.push(s);
        }
        if out.len() >= MAX_MONEY_MENTIONS {
            break;
        }
    }
    out
}
