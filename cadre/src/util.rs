//! Small shared helpers: ID minting and string truncation.

use uuid::Uuid;

/// Mint an opaque, collision-resistant ID of the form `PREFIX-0a1b2c3d4e5f`.
#[must_use]
pub fn new_id(prefix: &str) -> String {
    let hex = Uuid::new_v4().simple().to_string();
    format!("{prefix}-{}", &hex[..12])
}

/// Truncate a string to at most `max_chars` characters, appending a marker
/// when content was dropped. Safe on multi-byte input.
#[must_use]
pub fn truncate_chars(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    let mut out: String = text.chars().take(max_chars).collect();
    out.push_str("… [truncated]");
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn id_has_prefix_and_fixed_width() {
        let id = new_id("TRC");
        assert!(id.starts_with("TRC-"));
        assert_eq!(id.len(), "TRC-".len() + 12);
    }

    #[test]
    fn ids_are_unique() {
        assert_ne!(new_id("X"), new_id("X"));
    }

    #[test]
    fn truncate_leaves_short_text_alone() {
        assert_eq!(truncate_chars("hello", 10), "hello");
    }

    #[test]
    fn truncate_marks_dropped_content() {
        let out = truncate_chars("hello world", 5);
        assert!(out.starts_with("hello"));
        assert!(out.contains("[truncated]"));
    }
}
