//! Fixed-width text helpers
//!
//! Receipt printers use a monospaced font, so layout is measured in
//! characters. Strings are truncated by `char` count so multi-byte UTF-8
//! text never gets split mid-character.

/// Truncate a string to at most `max_width` columns
pub fn truncate(s: &str, max_width: usize) -> &str {
    match s.char_indices().nth(max_width) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}
