//! Search-and-zoom helpers: query gating and result list construction.

use crash_stats_dashboard_models::{CrashSearchResult, StreetResult};

use crate::chart::UNKNOWN_LABEL;
use crate::format::{display_date, metric_label};
use crate::surface::{ResultItem, ZoomTarget};

/// Message shown when a street search matched nothing.
pub const NO_STREETS_MESSAGE: &str = "No streets found.";

/// Message shown when a crash search matched nothing.
pub const NO_CRASHES_MESSAGE: &str = "No crashes found.";

/// Returns the trimmed query if it is long enough to search for.
///
/// Shorter input means the results should be cleared without issuing a
/// request.
#[must_use]
pub fn searchable_query(raw: &str, min_chars: usize) -> Option<&str> {
    let query = raw.trim();
    (query.chars().count() >= min_chars && !query.is_empty()).then_some(query)
}

/// Ranks street results by count, descending, and keeps the first
/// `limit`. Ties keep their response order.
#[must_use]
pub fn rank_streets(mut streets: Vec<StreetResult>, limit: usize) -> Vec<StreetResult> {
    streets.sort_by(|a, b| b.crash_count.cmp(&a.crash_count));
    streets.truncate(limit);
    streets
}

/// Builds a selectable result for a street. Selecting it zooms the map to
/// the street.
#[must_use]
pub fn street_item(street: &StreetResult, metric: &str) -> ResultItem {
    ResultItem {
        title: street.name.clone(),
        detail: format!("{} {}", street.crash_count, metric_label(metric)),
        target: Some(ZoomTarget {
            name: street.name.clone(),
            position: street.position(),
        }),
    }
}

/// Builds a result entry for a crash record. Crash records carry no
/// coordinates, so the entry does not move the map.
#[must_use]
pub fn crash_item(crash: &CrashSearchResult) -> ResultItem {
    let reason = crash
        .reason
        .as_deref()
        .filter(|reason| !reason.trim().is_empty())
        .unwrap_or(UNKNOWN_LABEL);
    let injuries = crash
        .injuries
        .map_or_else(|| "injuries not recorded".to_string(), |n| format!("{n} injuries"));

    ResultItem {
        title: format!("{} · {reason}", display_date(&crash.date)),
        detail: format!("#{} · {injuries} · {} vehicles", crash.id, crash.vehicles),
        target: None,
    }
}
