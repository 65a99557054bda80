//! Unicode normalization shared by the config loader, resolver and normalizer.
//!
//! All comparisons in the engine run on NFKC-normalized text, so full-width
//! digits, full-width spaces and half-width katakana compare equal to their
//! canonical forms.

use unicode_normalization::UnicodeNormalization;

const BOM: char = '\u{feff}';

/// NFKC-normalize and trim surrounding whitespace (including U+3000 and BOM).
pub fn normalize(raw: &str) -> String {
    let composed: String = raw.nfkc().collect();
    trim(&composed).to_string()
}

/// Trim surrounding whitespace and BOM, leaving the characters untouched.
pub fn trim(raw: &str) -> &str {
    raw.trim_matches(|c: char| c.is_whitespace() || c == BOM)
}

/// Comparison key for headers and aliases: normalized and case-folded.
pub fn fold_key(raw: &str) -> String {
    normalize(raw).to_lowercase()
}

/// Remove every whitespace character, ordinary or full-width.
pub fn strip_all_whitespace(raw: &str) -> String {
    raw.chars().filter(|c| !c.is_whitespace()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_trim_keeps_width() {
        assert_eq!(trim("\u{feff}\u{3000}ＨＯＲＳＥ \u{3000}"), "ＨＯＲＳＥ");
    }

    #[test]
    fn test_normalize_full_width() {
        assert_eq!(normalize("\u{3000}１２Ｒ\u{3000}"), "12R");
        assert_eq!(normalize("ｶﾀｲ"), "カタイ");
    }

    #[test]
    fn test_normalize_strips_bom() {
        assert_eq!(normalize("\u{feff}馬番"), "馬番");
    }

    #[test]
    fn test_fold_key_case() {
        assert_eq!(fold_key("  Ｄｉｒｔ "), "dirt");
    }

    #[test]
    fn test_strip_all_whitespace() {
        assert_eq!(strip_all_whitespace("新 \u{3000}01R"), "新01R");
    }
}
