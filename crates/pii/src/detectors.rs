//! Ordered PII detectors.
//!
//! Every detector runs over the original text and spans are resolved by
//! priority: existing tokens first, then email, user id, IP, other, phone.
//! A lower-priority match that overlaps an accepted span is dropped.

use crate::types::PiiCategory;
use regex::Regex;
use std::sync::OnceLock;

/// A detected PII span, byte offsets into the scanned text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Detection {
    pub start: usize,
    pub end: usize,
    pub category: PiiCategory,
}

fn email_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)\b[a-z0-9._%+\-]+@[a-z0-9.\-]+\.[a-z]{2,}\b").expect("email regex must compile")
    })
}

fn user_id_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            r#"(?i)\b(?:user_?id|uid|customer_?id|account_?id|member_?id)\s*[=:]\s*"?([A-Za-z0-9][A-Za-z0-9_.\-]*)"#,
        )
        .expect("user id regex must compile")
    })
}

fn ip_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"\b(?:(?:25[0-5]|2[0-4]\d|1\d\d|[1-9]?\d)\.){3}(?:25[0-5]|2[0-4]\d|1\d\d|[1-9]?\d)\b")
            .expect("ip regex must compile")
    })
}

fn national_id_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\b\d{3}-\d{2}-\d{4}\b").expect("national id regex must compile"))
}

fn phone_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?:\+\d{1,3}[-.\s]?)?(?:\(\d{3}\)\s?|\b\d{3}[-.\s]?)\d{3}[-.\s]?\d{4}\b")
            .expect("phone regex must compile")
    })
}

/// Shape of every token minted by the engine.
pub fn token_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"\[(?:EMAIL|PHONE|IP|USER_ID|OTHER)_[0-9a-f]{16}\]").expect("token regex must compile")
    })
}

fn overlaps(taken: &[(usize, usize)], start: usize, end: usize) -> bool {
    taken.iter().any(|&(s, e)| start < e && s < end)
}

fn accept(
    taken: &mut Vec<(usize, usize)>,
    found: &mut Vec<Detection>,
    start: usize,
    end: usize,
    category: PiiCategory,
) {
    if start < end && !overlaps(taken, start, end) {
        taken.push((start, end));
        found.push(Detection { start, end, category });
    }
}

/// Run the detector set over `text`; returns non-overlapping spans sorted by
/// start offset. Tokens already present in the text are never re-detected.
pub fn detect(text: &str) -> Vec<Detection> {
    let mut taken: Vec<(usize, usize)> = token_re()
        .find_iter(text)
        .map(|m| (m.start(), m.end()))
        .collect();
    let mut found = Vec::new();

    for m in email_re().find_iter(text) {
        accept(&mut taken, &mut found, m.start(), m.end(), PiiCategory::Email);
    }
    for caps in user_id_re().captures_iter(text) {
        if let Some(value) = caps.get(1) {
            accept(&mut taken, &mut found, value.start(), value.end(), PiiCategory::UserId);
        }
    }
    for m in ip_re().find_iter(text) {
        accept(&mut taken, &mut found, m.start(), m.end(), PiiCategory::Ip);
    }
    for m in national_id_re().find_iter(text) {
        accept(&mut taken, &mut found, m.start(), m.end(), PiiCategory::Other);
    }
    for m in phone_re().find_iter(text) {
        accept(&mut taken, &mut found, m.start(), m.end(), PiiCategory::Phone);
    }

    found.sort_by_key(|d| d.start);
    found
}

/// Cheap check run before a full tokenization pass.
pub fn has_match(text: &str) -> bool {
    !detect(text).is_empty()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn categories(text: &str) -> Vec<(PiiCategory, String)> {
        detect(text)
            .into_iter()
            .map(|d| (d.category, text[d.start..d.end].to_string()))
            .collect()
    }

    #[test]
    fn test_detects_each_category() {
        assert_eq!(categories("mail a@b.com"), vec![(PiiCategory::Email, "a@b.com".into())]);
        assert_eq!(categories("call 555-123-4567"), vec![(PiiCategory::Phone, "555-123-4567".into())]);
        assert_eq!(categories("from 10.0.0.12 today"), vec![(PiiCategory::Ip, "10.0.0.12".into())]);
        assert_eq!(categories("user_id=u-991"), vec![(PiiCategory::UserId, "u-991".into())]);
        assert_eq!(categories("ssn 123-45-6789"), vec![(PiiCategory::Other, "123-45-6789".into())]);
    }

    #[test]
    fn test_spans_sorted_and_disjoint() {
        let text = "555-123-4567 then a@b.com then 192.168.1.1";
        let found = detect(text);
        assert_eq!(found.len(), 3);
        assert!(found.windows(2).all(|w| w[0].end <= w[1].start));
        assert_eq!(found[0].category, PiiCategory::Phone);
        assert_eq!(found[1].category, PiiCategory::Email);
        assert_eq!(found[2].category, PiiCategory::Ip);
    }

    #[test]
    fn test_email_wins_over_user_id_value() {
        let found = categories("customerId: jane@example.org");
        assert_eq!(found, vec![(PiiCategory::Email, "jane@example.org".into())]);
    }

    #[test]
    fn test_existing_tokens_are_ignored() {
        assert!(detect("[PHONE_0123456789abcdef]").is_empty());
        assert!(!has_match("user_id=[EMAIL_0011223344556677]"));
    }

    #[test]
    fn test_plain_text_has_no_match() {
        assert!(!has_match("list all open invoices for march"));
        assert!(!has_match(""));
    }
}
