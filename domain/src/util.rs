//! Shared utility functions.

/// Longest prefix of `s` that fits in `max_bytes` and ends on a char
/// boundary. Used to keep questions and answers short in log lines.
pub fn truncate_str(s: &str, max_bytes: usize) -> &str {
    if s.len() <= max_bytes {
        return s;
    }
    let end = s
        .char_indices()
        .map(|(i, c)| i + c.len_utf8())
        .take_while(|&end| end <= max_bytes)
        .last()
        .unwrap_or(0);
    &s[..end]
}
