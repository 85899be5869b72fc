//! String helpers shared by the fetcher and the schema validator.
//!
//! - Log-friendly truncation
//! - XML whitespace normalization (`replace` and `collapse` in XSD terms)

/// Truncate a string for logging purposes.
///
/// Long strings are truncated to at most `max` bytes (backing off to a
/// character boundary) with an ellipsis and byte count indicator appended.
///
/// # Arguments
///
/// * `s` - The string to potentially truncate
/// * `max` - Maximum number of bytes to keep
///
/// # Returns
///
/// The original string if not longer than `max`, otherwise a truncated
/// version with `"…(+N bytes)"` appended.
///
/// # Examples
///
/// ```ignore
/// assert_eq!(truncate_for_log("short", 100), "short");
/// assert_eq!(truncate_for_log(&"a".repeat(500), 10), "aaaaaaaaaa…(+490 bytes)");
/// ```
pub fn truncate_for_log(s: &str, max: usize) -> String {
    if s.len() <= max {
        return s.to_string();
    }
    let mut end = max;
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}…(+{} bytes)", &s[..end], s.len() - end)
}

/// Collapse every run of whitespace into one space and trim both ends.
///
/// This is the XSD `collapse` whitespace rule, also used to tidy text
/// scraped from HTML.
pub fn collapse_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Replace tab, newline, and carriage return with a space.
///
/// This is the XSD `replace` whitespace rule.
pub fn replace_whitespace(s: &str) -> String {
    s.chars()
        .map(|c| if matches!(c, '\t' | '\n' | '\r') { ' ' } else { c })
        .collect()
}
