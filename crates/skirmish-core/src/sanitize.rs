//! Input sanitization for display names and chat text.

use crate::constants::{CHAT_MAX_CHARS, NAME_MAX_CHARS};

/// Escape `& < > " '` for safe embedding in HTML text.
pub fn escape_html(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for c in input.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&#34;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

/// Normalize a requested display name: trim, cut at 12 characters, default
/// to "Player" when empty. The cut happens before escaping, so an escaped
/// name can store wider than 12 units.
pub fn sanitize_name(raw: &str) -> String {
    let cut: String = raw.trim().chars().take(NAME_MAX_CHARS).collect();
    if cut.is_empty() {
        return "Player".to_string();
    }
    escape_html(&cut)
}

/// Normalize a chat line: trim, cut at 200 characters, escape. `None` when
/// nothing remains.
pub fn sanitize_chat(raw: &str) -> Option<String> {
    let cut: String = raw.trim().chars().take(CHAT_MAX_CHARS).collect();
    if cut.is_empty() {
        return None;
    }
    Some(escape_html(&cut))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn escapes_the_five_entities() {
        assert_eq!(escape_html("<b>&\"'</b>"), "&lt;b&gt;&amp;&#34;&#39;&lt;/b&gt;");
        assert_eq!(escape_html("plain"), "plain");
    }

    #[test]
    fn name_is_trimmed_and_cut() {
        assert_eq!(sanitize_name("  Alice  "), "Alice");
        assert_eq!(sanitize_name("ABCDEFGHIJKLMNOP"), "ABCDEFGHIJKL");
    }

    #[test]
    fn empty_name_defaults_to_player() {
        assert_eq!(sanitize_name(""), "Player");
        assert_eq!(sanitize_name("   "), "Player");
    }

    #[test]
    fn name_cut_is_codepoint_safe() {
        let raw = "ééééééééééééé"; // 13 two-byte codepoints
        let name = sanitize_name(raw);
        assert_eq!(name.chars().count(), 12);
    }

    #[test]
    fn name_escaped_after_cut_may_widen() {
        // Twelve '<' survive the cut, then each expands to four chars.
        let name = sanitize_name("<<<<<<<<<<<<<<<<");
        assert_eq!(name, "&lt;".repeat(12));
    }

    #[test]
    fn chat_is_trimmed_cut_and_escaped() {
        assert_eq!(sanitize_chat("  hi <all>  ").as_deref(), Some("hi &lt;all&gt;"));
        let long = "x".repeat(250);
        assert_eq!(sanitize_chat(&long).unwrap().len(), 200);
    }

    #[test]
    fn empty_chat_is_dropped() {
        assert_eq!(sanitize_chat(""), None);
        assert_eq!(sanitize_chat("   \t "), None);
    }
}
