//! Display formatting helpers shared by the pages.

use chrono::NaiveDate;

/// Formats an ISO `YYYY-MM-DD` date (optionally followed by a time part)
/// as `DD/MM/YYYY`. Anything unparseable is returned unchanged.
#[must_use]
pub fn display_date(raw: &str) -> String {
    let trimmed = raw.trim();
    let date_part = trimmed.get(..10).unwrap_or(trimmed);
    NaiveDate::parse_from_str(date_part, "%Y-%m-%d")
        .map_or_else(|_| trimmed.to_string(), |date| date.format("%d/%m/%Y").to_string())
}

/// Escapes text for inclusion in popup HTML.
#[must_use]
pub fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

/// Returns the display label for a street-search metric.
#[must_use]
pub fn metric_label(metric: &str) -> &'static str {
    match metric {
        "injuries" => "Injuries",
        "vehicles" => "Vehicles",
        _ => "Crashes",
    }
}
