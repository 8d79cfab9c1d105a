//! String utilities for the domain layer.

/// Shorten `s` to at most `max_chars` characters, marking the cut with `...`.
///
/// Counts characters rather than bytes so multi-byte text never splits a
/// code point. The result, ellipsis included, never exceeds `max_chars`.
pub fn ellipsize(s: &str, max_chars: usize) -> String {
    if s.chars().count() <= max_chars {
        return s.to_string();
    }
    let keep = max_chars.saturating_sub(3);
    let mut out: String = s.chars().take(keep).collect();
    out.push_str("...");
    out
}

/// The first `max_chars` characters of `s`.
pub fn prefix_chars(s: &str, max_chars: usize) -> &str {
    match s.char_indices().nth(max_chars) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ellipsize_short_text_unchanged() {
        assert_eq!(ellipsize("hello", 10), "hello");
    }

    #[test]
    fn test_ellipsize_respects_limit() {
        let long = "a".repeat(150);
        let out = ellipsize(&long, 100);
        assert_eq!(out.chars().count(), 100);
        assert!(out.ends_with("..."));
    }

    #[test]
    fn test_ellipsize_multibyte() {
        assert_eq!(ellipsize("日本語テキスト", 5), "日本...");
    }

    #[test]
    fn test_prefix_chars() {
        assert_eq!(prefix_chars("abcdef", 3), "abc");
        assert_eq!(prefix_chars("ab", 3), "ab");
        assert_eq!(prefix_chars("日本語", 2), "日本");
    }
}
