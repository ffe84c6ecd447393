// src/text.rs
//! Text helpers shared by every scan domain: sanitization, recency, fingerprints.

use chrono::{DateTime, Duration, Utc};
use once_cell::sync::OnceCell;
use regex::Regex;
use sha2::{Digest, Sha256};
use time::format_description::well_known::{Rfc2822, Rfc3339};
use time::OffsetDateTime;

/// Storage bound for any sanitized field.
pub const MAX_SANITIZED_CHARS: usize = 1000;

/// Hex characters kept from the fingerprint digest.
const FINGERPRINT_HEX_LEN: usize = 12;

/// How far ahead of `now` a timestamp may lie and still count. Covers feeds
/// that stamp local time as UTC; anything further out is misdated.
pub const MAX_FUTURE_SKEW_HOURS: i64 = 6;

fn re_tags() -> &'static Regex {
    static RE: OnceCell<Regex> = OnceCell::new();
    RE.get_or_init(|| Regex::new(r"(?is)<script.*?</script>|<style.*?</style>|</?[^>]+>").unwrap())
}

fn re_ws() -> &'static Regex {
    static RE: OnceCell<Regex> = OnceCell::new();
    RE.get_or_init(|| Regex::new(r"\s+").unwrap())
}

/// Strip markup and control characters, collapse whitespace, bound the length.
/// Never fails; empty input gives an empty string.
pub fn sanitize(text: &str) -> String {
    if text.is_empty() {
        return String::new();
    }

    // Tags first so entity-encoded markup ("&lt;b&gt;") survives as literal text.
    let stripped = re_tags().replace_all(text, " ");
    let decoded = html_escape::decode_html_entities(&stripped);

    let no_ctrl: String = decoded
        .chars()
        .map(|c| if c.is_control() { ' ' } else { c })
        .collect();

    let collapsed = re_ws().replace_all(&no_ctrl, " ");
    truncate_chars(collapsed.trim(), MAX_SANITIZED_CHARS)
}

/// Char-boundary-safe truncation.
pub fn truncate_chars(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        s.chars().take(max).collect()
    }
}

/// Parse an RSS (RFC 2822) or Atom (RFC 3339) date.
pub fn parse_pub_date(raw: &str) -> Option<DateTime<Utc>> {
    let s = raw.trim();
    if s.is_empty() {
        return None;
    }

    let unix = OffsetDateTime::parse(s, &Rfc2822)
        .or_else(|_| OffsetDateTime::parse(s, &Rfc3339))
        .ok()
        .map(|dt| dt.unix_timestamp());
    if let Some(ts) = unix {
        return DateTime::from_timestamp(ts, 0);
    }

    // chrono accepts the obsolete zone names ("EST", "GMT") feeds still emit.
    DateTime::parse_from_rfc2822(s)
        .or_else(|_| DateTime::parse_from_rfc3339(s))
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

/// True iff `pub_date` parses and lies no more than `hours_window` hours before `now`.
/// Missing or unparsable dates are not recent; future dates only within the skew margin.
pub fn is_recent(pub_date: Option<&str>, hours_window: u32, now: DateTime<Utc>) -> bool {
    match pub_date.and_then(parse_pub_date) {
        Some(ts) => is_within(ts, hours_window, now),
        None => false,
    }
}

/// Same window check on an already-parsed instant.
pub fn is_within(ts: DateTime<Utc>, hours_window: u32, now: DateTime<Utc>) -> bool {
    let age = now.signed_duration_since(ts);
    age <= Duration::hours(i64::from(hours_window)) && age >= -Duration::hours(MAX_FUTURE_SKEW_HOURS)
}

/// Case-fold, drop punctuation, collapse whitespace.
pub fn normalize_title(title: &str) -> String {
    let folded: String = title
        .to_lowercase()
        .chars()
        .map(|c| if c.is_alphanumeric() || c.is_whitespace() { c } else { ' ' })
        .collect();
    folded.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Short stable digest of the normalized title; empty for titles with no words.
pub fn fingerprint(title: &str) -> String {
    let normalized = normalize_title(title);
    if normalized.is_empty() {
        return String::new();
    }
    let digest = Sha256::digest(normalized.as_bytes());
    let mut out = String::with_capacity(FINGERPRINT_HEX_LEN);
    for b in digest.iter().take(FINGERPRINT_HEX_LEN / 2) {
        use std::fmt::Write as _;
        let _ = write!(&mut out, "{:02x}", b);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 10, 16, 12, 0, 0).unwrap()
    }

    #[test]
    fn sanitize_strips_markup_and_collapses_ws() {
        let s = "  <p>Hola&nbsp;&nbsp;<b>mundo</b></p>\u{0007}\n\n fin ";
        assert_eq!(sanitize(s), "Hola mundo fin");
        assert_eq!(sanitize(""), "");
    }

    #[test]
    fn sanitize_bounds_length() {
        let long = "á".repeat(MAX_SANITIZED_CHARS + 50);
        assert_eq!(sanitize(&long).chars().count(), MAX_SANITIZED_CHARS);
    }

    #[test]
    fn fingerprint_ignores_case_and_spacing() {
        let a = fingerprint("LUMA anuncia apagón");
        let b = fingerprint("  luma   anuncia apagón  ");
        let c = fingerprint("LUMA anuncia apagones");
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(a.len(), FINGERPRINT_HEX_LEN);
    }

    #[test]
    fn fingerprint_ignores_punctuation() {
        assert_eq!(
            fingerprint("¡LUMA anuncia apagón!"),
            fingerprint("LUMA anuncia apagón")
        );
        assert_eq!(fingerprint("  ?! "), "");
    }

    #[test]
    fn recency_accepts_rss_and_atom_dates() {
        assert!(is_recent(Some("Fri, 16 Oct 2026 08:00:00 +0000"), 48, now()));
        assert!(is_recent(Some("2026-10-15T20:00:00Z"), 48, now()));
        assert!(is_recent(Some("Thu, 15 Oct 2026 10:00:00 GMT"), 48, now()));
        assert!(!is_recent(Some("Mon, 12 Oct 2026 08:00:00 +0000"), 48, now()));
    }

    #[test]
    fn unknown_dates_are_not_recent() {
        assert!(!is_recent(None, 48, now()));
        assert!(!is_recent(Some(""), 48, now()));
        assert!(!is_recent(Some("ayer por la tarde"), 48, now()));
    }

    #[test]
    fn window_boundary_is_inclusive() {
        let edge = now() - Duration::hours(72);
        assert!(is_within(edge, 72, now()));
        assert!(!is_within(edge - Duration::seconds(1), 72, now()));
    }

    #[test]
    fn slight_future_is_recent_far_future_is_not() {
        let skew = Duration::hours(MAX_FUTURE_SKEW_HOURS);
        assert!(is_within(now() + Duration::hours(2), 72, now()));
        assert!(is_within(now() + skew, 72, now()));
        assert!(!is_within(now() + skew + Duration::seconds(1), 72, now()));
        assert!(!is_recent(Some("Fri, 16 Oct 2099 08:00:00 +0000"), 48, now()));
    }
}
