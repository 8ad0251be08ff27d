//! Helpers for slugs, article HTML and log output.
//!
//! - Slug → article id extraction
//! - HTML clean-up applied to article bodies before display
//! - Date formatting for the "Posted:" line
//! - String truncation for logging response bodies

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use once_cell::sync::Lazy;
use regex::Regex;
use tracing::debug;

static EMPTY_PARAGRAPH: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)<p>\s*</p>").expect("valid regex"));
static P_BEFORE_HEADING: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)<p>\s*(<h[1-6])").expect("valid regex"));
static P_BEFORE_BLOCK: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)<p>\s*(<(?:div|table|ul|ol|blockquote))").expect("valid regex"));
static CLOSE_P_AFTER_BLOCK: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)(</(?:div|table|ul|ol|blockquote)>)\s*</p>").expect("valid regex")
});

/// Article id from a URL slug: everything after the last `-`.
///
/// `"some-headline-abc123"` → `"abc123"`. A slug without `-` is its own id.
/// Returns `None` when the id would be empty.
pub fn extract_id_from_slug(slug: &str) -> Option<&str> {
    let id = slug.trim().rsplit('-').next()?.trim();
    (!id.is_empty()).then_some(id)
}

/// Clean up article HTML before it is rendered.
///
/// Removes empty paragraphs, unwraps `<p>` around headings and block
/// elements, drops dangling `</p>` after block closers, then trims.
pub fn normalize_html_content(html: &str) -> String {
    let out = EMPTY_PARAGRAPH.replace_all(html, "");
    let out = P_BEFORE_HEADING.replace_all(&out, "$1");
    let out = P_BEFORE_BLOCK.replace_all(&out, "$1");
    let out = CLOSE_P_AFTER_BLOCK.replace_all(&out, "$1");
    let out = out.trim().to_string();
    debug!(before = html.len(), after = out.len(), "Normalized article HTML");
    out
}

/// `YYYY-MM-DD` for the "Posted:" line. Empty when the timestamp can't be parsed.
pub fn format_posted_date(date_time_start: &str) -> String {
    let s = date_time_start.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return dt.date_naive().to_string();
    }
    for fmt in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"] {
        if let Ok(dt) = NaiveDateTime::parse_from_str(s, fmt) {
            return dt.date().to_string();
        }
    }
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .map(|d| d.to_string())
        .unwrap_or_default()
}

/// Truncate a string for logging purposes.
///
/// Long strings are cut to `max` bytes (on a char boundary) with
/// `"…(+N bytes)"` appended.
pub fn truncate_for_log(s: &str, max: usize) -> String {
    if s.len() <= max {
        return s.to_string();
    }
    let mut cut = max;
    while !s.is_char_boundary(cut) {
        cut -= 1;
    }
    format!("{}…(+{} bytes)", &s[..cut], s.len() - cut)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_id_from_slug() {
        assert_eq!(extract_id_from_slug("big-news-today-abc123"), Some("abc123"));
        assert_eq!(extract_id_from_slug("abc123"), Some("abc123"));
        assert_eq!(extract_id_from_slug("trailing-"), None);
        assert_eq!(extract_id_from_slug(""), None);
    }

    #[test]
    fn test_empty_paragraph_before_heading() {
        assert_eq!(normalize_html_content("<p></p><h2>Title</h2>"), "<h2>Title</h2>");
    }

    #[test]
    fn test_unwraps_paragraph_around_blocks() {
        assert_eq!(normalize_html_content("<p><h2>Title</h2></p>"), "<h2>Title</h2></p>");
        assert_eq!(
            normalize_html_content("<P> <div id=\"qctaboo-mid\"></div></p>"),
            "<div id=\"qctaboo-mid\"></div>"
        );
        assert_eq!(
            normalize_html_content("  <p>\n</p><ul><li>a</li></ul> </p>\n"),
            "<ul><li>a</li></ul>"
        );
    }

    #[test]
    fn test_keeps_ordinary_paragraphs() {
        let html = "<p>One</p><p>Two</p>";
        assert_eq!(normalize_html_content(html), html);
    }

    #[test]
    fn test_format_posted_date() {
        assert_eq!(format_posted_date("2024-05-01T10:20:30"), "2024-05-01");
        assert_eq!(format_posted_date("2024-05-01T10:20:30.123"), "2024-05-01");
        assert_eq!(format_posted_date("2024-05-01T10:20:30+07:00"), "2024-05-01");
        assert_eq!(format_posted_date("2024-05-01"), "2024-05-01");
        assert_eq!(format_posted_date("yesterday"), "");
    }

    #[test]
    fn test_truncate_for_log_short_string() {
        assert_eq!(truncate_for_log("Hello, world!", 100), "Hello, world!");
    }

    #[test]
    fn test_truncate_for_log_long_string() {
        let s = "a".repeat(500);
        let result = truncate_for_log(&s, 100);
        assert!(result.starts_with(&"a".repeat(100)));
        assert!(result.contains("…(+400 bytes)"));
    }

    #[test]
    fn test_truncate_for_log_char_boundary() {
        assert_eq!(truncate_for_log("ééé", 3), "é…(+4 bytes)");
    }
}
