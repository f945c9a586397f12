//! Field cleanup shared by the order and roster loaders.

/// U+3000 IDEOGRAPHIC SPACE, the "full-width" space Japanese IMEs insert.
pub const FULL_WIDTH_SPACE: char = '\u{3000}';

/// Clean a student name: keep only the text before the first `(`, trim ASCII
/// whitespace, then drop every full-width space.
///
/// Idempotent; empty or whitespace-only input yields an empty string.
pub fn normalize_name(raw: &str) -> String {
    let head = match raw.split_once('(') {
        Some((head, _)) => head,
        None => raw,
    };
    clean_whitespace(head)
}

/// Trim ASCII whitespace and drop every full-width space. Unlike
/// [`normalize_name`] this keeps parenthesised text.
pub fn clean_whitespace(raw: &str) -> String {
    raw.trim_matches(|c: char| c.is_ascii_whitespace())
        .chars()
        .filter(|&c| c != FULL_WIDTH_SPACE)
        .collect::<String>()
        // Removing U+3000 can expose ASCII whitespace at either end.
        .trim_matches(|c: char| c.is_ascii_whitespace())
        .to_string()
}

/// Map full-width digits to ASCII so numeric cells typed on a Japanese IME
/// parse as numbers.
pub fn ascii_digits(raw: &str) -> String {
    raw.chars()
        .map(|c| match c {
            '０'..='９' => char::from(b'0' + (c as u32 - '０' as u32) as u8),
            _ => c,
        })
        .collect()
}
