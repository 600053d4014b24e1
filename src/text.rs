//! Conversation text normalization
//!
//! `clean` must be idempotent and total: cleaning twice changes nothing and no
//! input makes it fail.

use regex::Regex;
use std::sync::OnceLock;

pub trait TextNormalizer: Send + Sync {
    fn clean(&self, text: &str) -> String;
}

/// Quote canonicalization, symbol stripping, whitespace collapse, terminal punctuation
#[derive(Debug, Default, Clone, Copy)]
pub struct DefaultNormalizer;

fn disallowed_chars() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r#"[^\w\s.,!?;:'"-]"#).expect("static regex"))
}

fn whitespace_runs() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\s+").expect("static regex"))
}

impl TextNormalizer for DefaultNormalizer {
    fn clean(&self, text: &str) -> String {
        let quoted: String = text
            .chars()
            .map(|c| match c {
                '\u{201C}' | '\u{201D}' | '\u{201E}' => '"',
                '\u{2018}' | '\u{2019}' | '\u{201A}' => '\'',
                other => other,
            })
            .collect();

        // Strip before collapsing so removed symbols cannot leave double spaces behind
        let stripped = disallowed_chars().replace_all(&quoted, "");
        let mut cleaned = whitespace_runs()
            .replace_all(stripped.trim(), " ")
            .into_owned();

        if !cleaned.is_empty() && !cleaned.ends_with(['.', '!', '?']) {
            cleaned.push('.');
        }
        cleaned
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clean_basic() {
        let n = DefaultNormalizer;
        assert_eq!(n.clean("  hello   there  "), "hello there.");
        assert_eq!(n.clean("Is it ok?"), "Is it ok?");
        assert_eq!(n.clean("\u{201C}Hi\u{201D} she said"), "\"Hi\" she said.");
        assert_eq!(n.clean("price @ 5 # today"), "price 5 today.");
    }

    #[test]
    fn test_clean_empty_and_symbols_only() {
        let n = DefaultNormalizer;
        assert_eq!(n.clean(""), "");
        assert_eq!(n.clean("   "), "");
        assert_eq!(n.clean("@@ ##"), "");
    }

    #[test]
    fn test_clean_idempotent() {
        let n = DefaultNormalizer;
        for input in [
            "hello   world",
            "wait:",
            "a @ b # c",
            "  \u{2018}quoted\u{2019}  text!  ",
            "tabs\tand\nnewlines",
            "ends with dash -",
            "",
        ] {
            let once = n.clean(input);
            assert_eq!(n.clean(&once), once, "not idempotent for {:?}", input);
        }
    }
}
