//! Text normalization for comparing titles and author names across providers.
//!
//! Providers disagree about punctuation, separators and accents. Everything
//! the matcher compares goes through [`comparable`], which is
//! [`normalize`] (punctuation table + whitespace collapse) followed by
//! [`unaccented`] (diacritic folding). The non-folded [`normalize`] form is
//! kept for display and logging.

use unicode_normalization::char::is_combining_mark;
use unicode_normalization::UnicodeNormalization;

/// Normalize punctuation and whitespace. Case is preserved.
///
/// Idempotent: none of the replacement outputs contain a character that the
/// table would replace again.
pub fn normalize(text: &str) -> String {
    let text = text.replace("...", "");
    let mut out = String::with_capacity(text.len());

    for c in text.chars() {
        match c {
            '.' | '=' | ',' | ';' | '-' | '_' | '+' => out.push(' '),
            '&' => out.push_str(" and "),
            '$' => out.push('s'),
            '?' | '*' | '#' | ':' | '!' | '(' | ')' | '[' | ']' | '{' | '}' => {}
            '"' | '\'' | '`' | '\u{2018}' | '\u{2019}' | '\u{201a}' | '\u{201b}'
            | '\u{201c}' | '\u{201d}' | '\u{201e}' | '\u{201f}' | '\u{00ab}' | '\u{00bb}'
            | '\u{2039}' | '\u{203a}' => {}
            c => out.push(c),
        }
    }

    collapse_whitespace(&out)
}

/// Fold accented characters to their closest ASCII form.
///
/// Letters that NFKD does not decompose (ligatures, stroked letters) are
/// mapped explicitly. Returns the input unchanged if folding would leave
/// nothing behind.
pub fn unaccented(text: &str) -> String {
    let mut out = String::with_capacity(text.len());

    for c in text.nfkd().filter(|c| !is_combining_mark(*c)) {
        match c {
            '\u{00c6}' => out.push_str("AE"),
            '\u{00e6}' => out.push_str("ae"),
            '\u{0152}' => out.push_str("OE"),
            '\u{0153}' => out.push_str("oe"),
            '\u{00d8}' => out.push('O'),
            '\u{00f8}' => out.push('o'),
            '\u{00d0}' => out.push('D'),
            '\u{00f0}' => out.push('d'),
            '\u{00de}' => out.push_str("Th"),
            '\u{00fe}' => out.push_str("th"),
            '\u{00df}' => out.push_str("ss"),
            '\u{0141}' => out.push('L'),
            '\u{0142}' => out.push('l'),
            c => out.push(c),
        }
    }

    let trimmed = out.trim();
    if trimmed.is_empty() {
        text.to_string()
    } else {
        trimmed.to_string()
    }
}

/// The form used for every comparison: punctuation-normalized, then folded.
pub fn comparable(text: &str) -> String {
    unaccented(&normalize(text))
}

/// Split into lowercase words on whitespace, commas and plus signs.
pub fn word_list(text: &str) -> Vec<String> {
    text.to_lowercase()
        .replace([',', '+'], " ")
        .split_whitespace()
        .map(str::to_string)
        .collect()
}

/// Number of words as split by [`word_list`].
pub fn word_count(text: &str) -> usize {
    word_list(text).len()
}

/// Drop a trailing `[...]` group, as RSS feeds append keywords and genres
/// there.
pub fn strip_trailing_tags(title: &str) -> &str {
    match title.rfind('[') {
        Some(idx) if idx > 0 => title[..idx].trim_end(),
        _ => title,
    }
}

/// Title with any parenthesised series or edition details removed.
pub fn short_title(title: &str) -> &str {
    match title.find('(') {
        Some(idx) => title[..idx].trim(),
        None => title.trim(),
    }
}

/// True if the text has no letters or digits at all.
pub fn only_punctuation(text: &str) -> bool {
    !text.chars().any(char::is_alphanumeric)
}

fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_punctuation_table() {
        assert_eq!(normalize("Tom Holt - Blonde Bombshell"), "Tom Holt Blonde Bombshell");
        assert_eq!(normalize("Pride & Prejudice"), "Pride and Prejudice");
        assert_eq!(normalize("Who's Afraid?"), "Whos Afraid");
        assert_eq!(normalize("Wait... What!"), "Wait What");
        assert_eq!(normalize("J.R.R. Tolkien"), "J R R Tolkien");
        assert_eq!(normalize("Ca$h"), "Cash");
        assert_eq!(normalize("Book (Series #3) [EPUB]"), "Book Series 3 EPUB");
        assert_eq!(normalize("ePUB+MOBI"), "ePUB MOBI");
    }

    #[test]
    fn test_normalize_preserves_case() {
        assert_eq!(normalize("The HOBBIT"), "The HOBBIT");
    }

    #[test]
    fn test_normalize_collapses_whitespace() {
        assert_eq!(normalize("  a   b \t c  "), "a b c");
        assert_eq!(normalize(""), "");
    }

    #[test]
    fn test_normalize_idempotent() {
        let samples = [
            "Tom Holt - Blonde Bombshell (Dystop; SFX; Humour) ePUB+MOBI",
            "Wait... What?! & then $$$",
            "a.b.c...d",
            "\u{201c}Quoted\u{201d} \u{2018}single\u{2019}",
            "Émile Zola : L'Assommoir",
            "....",
            "&&&",
        ];
        for s in samples {
            let once = normalize(s);
            assert_eq!(normalize(&once), once, "not idempotent for {:?}", s);
        }
    }

    #[test]
    fn test_unaccented() {
        assert_eq!(unaccented("Émile Zola"), "Emile Zola");
        assert_eq!(unaccented("Jo Nesbø"), "Jo Nesbo");
        assert_eq!(unaccented("Straße"), "Strasse");
        assert_eq!(unaccented("Æsop"), "AEsop");
        assert_eq!(unaccented("Stanisław Lem"), "Stanislaw Lem");
    }

    #[test]
    fn test_unaccented_falls_back_when_empty() {
        assert_eq!(unaccented("\u{0301}"), "\u{0301}");
    }

    #[test]
    fn test_comparable() {
        assert_eq!(comparable("Gabriel García Márquez"), "Gabriel Garcia Marquez");
    }

    #[test]
    fn test_word_list() {
        assert_eq!(word_list("ePUB+MOBI, pdf"), vec!["epub", "mobi", "pdf"]);
        assert_eq!(word_count("Tom Holt Blonde Bombshell"), 4);
        assert!(word_list("   ").is_empty());
    }

    #[test]
    fn test_strip_trailing_tags() {
        assert_eq!(strip_trailing_tags("Some Book [fantasy, epub]"), "Some Book");
        assert_eq!(strip_trailing_tags("Some Book"), "Some Book");
        assert_eq!(strip_trailing_tags("[only tags]"), "[only tags]");
    }

    #[test]
    fn test_short_title() {
        assert_eq!(short_title("Guards! Guards! (Discworld, #8)"), "Guards! Guards!");
        assert_eq!(short_title("No Series"), "No Series");
    }

    #[test]
    fn test_only_punctuation() {
        assert!(only_punctuation(" - : "));
        assert!(!only_punctuation("- a -"));
    }
}
