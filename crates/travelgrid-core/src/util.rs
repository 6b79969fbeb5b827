//! Shared utility functions used across multiple modules.

use chrono::{DateTime, Utc};

/// Normalize optional text by trimming whitespace and removing empties.
///
/// Returns `None` when the input is `None` or the trimmed value is empty.
pub fn normalize_text_option(value: Option<String>) -> Option<String> {
    let value = value?;
    let value = value.trim();
    if value.is_empty() {
        None
    } else {
        Some(value.to_string())
    }
}

/// Check if a string starts with `http://` or `https://`.
pub fn is_http_url(value: &str) -> bool {
    value.starts_with("http://") || value.starts_with("https://")
}

/// Truncate text to at most 180 characters for error messages.
pub fn compact_text(value: &str) -> String {
    value.trim().chars().take(180).collect()
}

/// Render a "last synced" label relative to `now`.
///
/// Mirrors the sync status indicator: `Never`, `Just now`, then minutes,
/// hours and days.
pub fn format_last_sync(last_sync: Option<DateTime<Utc>>, now: DateTime<Utc>) -> String {
    let Some(last_sync) = last_sync else {
        return "Never".to_string();
    };

    let minutes = now.signed_duration_since(last_sync).num_minutes();
    if minutes < 1 {
        "Just now".to_string()
    } else if minutes < 60 {
        format!("{minutes}m ago")
    } else if minutes < 60 * 24 {
        format!("{}h ago", minutes / 60)
    } else {
        format!("{}d ago", minutes / (60 * 24))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn normalize_text_option_rejects_empty() {
        assert_eq!(normalize_text_option(None), None);
        assert_eq!(normalize_text_option(Some("   ".to_string())), None);
    }

    #[test]
    fn normalize_text_option_trims_value() {
        assert_eq!(
            normalize_text_option(Some(" https://example.com ".to_string())),
            Some("https://example.com".to_string())
        );
    }

    #[test]
    fn is_http_url_accepts_valid_schemes() {
        assert!(is_http_url("http://localhost"));
        assert!(is_http_url("https://example.com"));
        assert!(!is_http_url("ftp://example.com"));
        assert!(!is_http_url("example.com"));
    }

    #[test]
    fn format_last_sync_units() {
        let now = Utc::now();
        assert_eq!(format_last_sync(None, now), "Never");
        assert_eq!(
            format_last_sync(Some(now - Duration::seconds(20)), now),
            "Just now"
        );
        assert_eq!(
            format_last_sync(Some(now - Duration::minutes(5)), now),
            "5m ago"
        );
        assert_eq!(format_last_sync(Some(now - Duration::hours(3)), now), "3h ago");
        assert_eq!(format_last_sync(Some(now - Duration::days(2)), now), "2d ago");
    }
}
