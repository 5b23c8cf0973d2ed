#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! API response types and filter definitions for the `CrashStats`
//! dashboard.
//!
//! These types mirror the JSON returned by the dashboard backend's REST
//! endpoints. They are consumed read-only by the refresh pipeline in
//! `crash_stats_dashboard`, which turns them into chart and map inputs.

use std::collections::BTreeMap;

use serde::{Deserialize, Deserializer, Serialize};
use strum_macros::{Display, EnumString};

/// A filter the dashboard is allowed to send to the backend.
///
/// The set is closed: a filter name that is not listed here cannot be
/// represented and therefore can never end up in a query string.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum FilterName {
    /// Crash month (`1`-`12`).
    Month,
    /// Weather condition.
    Weather,
    /// Posted speed limit.
    Speed,
    /// Lighting condition.
    Lighting,
    /// Police beat of occurrence.
    Beat,
    /// Inclusive start date (`YYYY-MM-DD`).
    StartDate,
    /// Inclusive end date (`YYYY-MM-DD`).
    EndDate,
    /// Region name.
    Region,
    /// Free-text search query.
    #[serde(rename = "q")]
    #[strum(serialize = "q")]
    Query,
    /// Metric used to rank street search results.
    Metric,
}

impl FilterName {
    /// Returns the query-string parameter name for this filter.
    #[must_use]
    pub const fn param(self) -> &'static str {
        match self {
            Self::Month => "month",
            Self::Weather => "weather",
            Self::Speed => "speed",
            Self::Lighting => "lighting",
            Self::Beat => "beat",
            Self::StartDate => "start_date",
            Self::EndDate => "end_date",
            Self::Region => "region",
            Self::Query => "q",
            Self::Metric => "metric",
        }
    }
}

/// The sentinel option value meaning "no constraint".
pub const ANY_VALUE: &str = "All";

/// Label substituted for categories the backend left blank.
pub const UNKNOWN_LABEL: &str = "Unknown";

/// Returns `true` if `value` places no constraint on the query (empty or
/// any casing of `"All"`).
#[must_use]
pub fn is_unconstrained(value: &str) -> bool {
    let value = value.trim();
    value.is_empty() || value.eq_ignore_ascii_case(ANY_VALUE)
}

/// A normalized set of filter values.
///
/// Each filter maps to at most one value. Unconstrained values are never
/// stored, so they are never sent to the backend.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct FilterSet {
    values: BTreeMap<FilterName, String>,
}

impl FilterSet {
    /// Creates an empty filter set.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            values: BTreeMap::new(),
        }
    }

    /// Builder-style variant of [`Self::insert`].
    #[must_use]
    pub fn with(mut self, name: FilterName, value: impl Into<String>) -> Self {
        self.insert(name, value);
        self
    }

    /// Sets `name` to `value`, replacing any previous value.
    ///
    /// An unconstrained value removes the filter instead. Returns whether
    /// the filter is present afterwards.
    pub fn insert(&mut self, name: FilterName, value: impl Into<String>) -> bool {
        let value = value.into();
        if is_unconstrained(&value) {
            self.values.remove(&name);
            return false;
        }
        self.values.insert(name, value.trim().to_string());
        true
    }

    /// Returns the value for `name`, if constrained.
    #[must_use]
    pub fn get(&self, name: FilterName) -> Option<&str> {
        self.values.get(&name).map(String::as_str)
    }

    /// Number of constrained filters.
    #[must_use]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Returns `true` if no filter is constrained.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Returns a copy holding only the filters listed in `names`.
    ///
    /// Endpoints accept different filter subsets; this keeps each request
    /// limited to the parameters its endpoint understands.
    #[must_use]
    pub fn subset(&self, names: &[FilterName]) -> Self {
        Self {
            values: self
                .values
                .iter()
                .filter(|(name, _)| names.contains(name))
                .map(|(name, value)| (*name, value.clone()))
                .collect(),
        }
    }

    /// Returns the filters as query-string pairs.
    #[must_use]
    pub fn to_query(&self) -> Vec<(&'static str, &str)> {
        self.values
            .iter()
            .map(|(name, value)| (name.param(), value.as_str()))
            .collect()
    }

    /// Iterates over the constrained filters.
    pub fn iter(&self) -> impl Iterator<Item = (FilterName, &str)> {
        self.values.iter().map(|(name, value)| (*name, value.as_str()))
    }
}

/// A WGS84 coordinate pair.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LatLng {
    /// Latitude.
    pub lat: f64,
    /// Longitude.
    pub lng: f64,
}

impl LatLng {
    /// Creates a coordinate pair.
    #[must_use]
    pub const fn new(lat: f64, lng: f64) -> Self {
        Self { lat, lng }
    }
}

/// Chart kinds supported by the chart renderer.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum ChartKind {
    /// Vertical or horizontal bar chart.
    Bar,
    /// Line chart.
    Line,
    /// Doughnut chart.
    Doughnut,
    /// Pie chart.
    Pie,
    /// Sankey flow diagram.
    Sankey,
}

impl ChartKind {
    /// Returns `true` for the circular kinds (doughnut and pie), which
    /// use one color per slice, show a legend, and have no axes.
    #[must_use]
    pub const fn is_radial(self) -> bool {
        matches!(self, Self::Doughnut | Self::Pie)
    }
}

/// A labelled count for bar, line, doughnut, and pie charts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DataPoint {
    /// Category label. Missing labels are rendered as a placeholder.
    #[serde(default)]
    pub label: Option<String>,
    /// Number of crashes in this category.
    #[serde(default, deserialize_with = "null_as_default")]
    pub count: u64,
}

impl DataPoint {
    /// Creates a data point with a label.
    #[must_use]
    pub fn new(label: impl Into<String>, count: u64) -> Self {
        Self {
            label: Some(label.into()),
            count,
        }
    }
}

/// A primary-cause count from the offense endpoints.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CauseCount {
    /// Primary contributory cause.
    #[serde(default)]
    pub cause: Option<String>,
    /// Number of crashes with this cause.
    #[serde(default, deserialize_with = "null_as_default")]
    pub count: u64,
}

impl From<CauseCount> for DataPoint {
    fn from(value: CauseCount) -> Self {
        Self {
            label: value.cause,
            count: value.count,
        }
    }
}

/// Dropdown options from `/environment/api/filters`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilterOptions {
    /// Distinct weather conditions.
    #[serde(default, deserialize_with = "option_values")]
    pub weather: Vec<String>,
    /// Distinct posted speed limits.
    #[serde(default, deserialize_with = "option_values")]
    pub speed: Vec<String>,
    /// Distinct lighting conditions.
    #[serde(default, deserialize_with = "option_values")]
    pub lighting: Vec<String>,
}

/// Response from `/environment/api/data`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnvironmentData {
    /// Headline metrics.
    pub metrics: EnvironmentMetrics,
    /// Chart series.
    pub charts: EnvironmentCharts,
}

/// Headline metrics for the environment page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnvironmentMetrics {
    /// Total crashes matching the filters.
    #[serde(default, deserialize_with = "null_as_default")]
    pub total: u64,
    /// Street with the most crashes (`"-"` when none).
    #[serde(default)]
    pub common_street: String,
    /// Crash count on [`Self::common_street`].
    #[serde(default, deserialize_with = "null_as_default")]
    pub common_street_count: u64,
    /// Crashes with fatal or incapacitating injuries.
    #[serde(default, deserialize_with = "null_as_default")]
    pub severe: u64,
}

/// Chart series for the environment page.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnvironmentCharts {
    /// Crashes per posted speed limit.
    #[serde(default)]
    pub speed: Vec<DataPoint>,
    /// Crashes per weather condition.
    #[serde(default)]
    pub weather: Vec<DataPoint>,
    /// Crashes per lighting condition.
    #[serde(default)]
    pub lighting: Vec<DataPoint>,
}

/// Response from `/environment/heatmap`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HeatmapFrame {
    /// Path to a pre-rendered heatmap document, or `None` when no crash
    /// matched the filters.
    #[serde(default)]
    pub map_path: Option<String>,
}

/// A street match from `/location/api/streets`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StreetResult {
    /// Street name.
    pub name: String,
    /// Representative coordinate as `[lat, lng]`.
    pub coords: [f64; 2],
    /// Value of the requested metric for this street.
    #[serde(default, deserialize_with = "null_as_default")]
    pub crash_count: u64,
}

impl StreetResult {
    /// Returns the street's representative coordinate.
    #[must_use]
    pub const fn position(&self) -> LatLng {
        LatLng::new(self.coords[0], self.coords[1])
    }
}

/// Identifier of a crash record. The backend emits either numbers or
/// strings depending on the source table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RecordId {
    /// Numeric identifier.
    Number(i64),
    /// Textual identifier.
    Text(String),
}

impl std::fmt::Display for RecordId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Number(n) => write!(f, "{n}"),
            Self::Text(s) => f.write_str(s),
        }
    }
}

/// A crash record match from `/location/api/search`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CrashSearchResult {
    /// Crash record identifier.
    pub id: RecordId,
    /// Crash date (`YYYY-MM-DD`).
    pub date: String,
    /// Primary contributory cause.
    #[serde(default)]
    pub reason: Option<String>,
    /// Total injuries, when recorded.
    #[serde(default)]
    pub injuries: Option<u64>,
    /// Number of vehicles involved.
    #[serde(default, deserialize_with = "null_as_default")]
    pub vehicles: u64,
}

/// A weighted heatmap point.
///
/// Deserialized from `[lat, lng]` or `[lat, lng, weight]`; a missing
/// weight defaults to `1.0`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Vec<f64>")]
pub struct HeatPoint {
    /// Latitude.
    pub lat: f64,
    /// Longitude.
    pub lng: f64,
    /// Relative intensity.
    pub weight: f64,
}

impl TryFrom<Vec<f64>> for HeatPoint {
    type Error = String;

    fn try_from(value: Vec<f64>) -> Result<Self, Self::Error> {
        match value.as_slice() {
            [lat, lng] => Ok(Self {
                lat: *lat,
                lng: *lng,
                weight: 1.0,
            }),
            [lat, lng, weight] => Ok(Self {
                lat: *lat,
                lng: *lng,
                weight: *weight,
            }),
            other => Err(format!(
                "heatmap point must have 2 or 3 elements, got {}",
                other.len()
            )),
        }
    }
}

/// A `(cause, severity, count)` row from `/offense/api/cause-severity`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SankeyRow {
    /// Primary contributory cause, `"Unknown"` when the backend has none.
    #[serde(default = "unknown_label", deserialize_with = "label_or_unknown")]
    pub cause: String,
    /// Injury severity bucket, `"Unknown"` when the backend has none.
    #[serde(default = "unknown_label", deserialize_with = "label_or_unknown")]
    pub severity: String,
    /// Number of crashes in this cell.
    #[serde(default, deserialize_with = "null_as_default")]
    pub count: u64,
}

impl SankeyRow {
    /// Creates a row.
    #[must_use]
    pub fn new(cause: impl Into<String>, severity: impl Into<String>, count: u64) -> Self {
        Self {
            cause: cause.into(),
            severity: severity.into(),
            count,
        }
    }
}

/// Response from `/offense/api/most-hit-and-run-beat`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MostHitBeat {
    /// Beat with the most hit-and-run crashes, `None` when there are none.
    #[serde(default)]
    pub beat: Option<RecordId>,
    /// Hit-and-run count for that beat.
    #[serde(default, deserialize_with = "null_as_default")]
    pub count: u64,
}

/// Deserializes `null` as the type's default value.
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

fn unknown_label() -> String {
    UNKNOWN_LABEL.to_string()
}

/// Deserializes a label, mapping `null` and blank strings to
/// [`UNKNOWN_LABEL`].
fn label_or_unknown<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<String>::deserialize(deserializer)?
        .filter(|label| !label.trim().is_empty())
        .unwrap_or_else(unknown_label))
}

/// Deserializes a list of dropdown options that may mix strings and
/// numbers (speed limits arrive as integers).
fn option_values<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let values = Option::<Vec<serde_json::Value>>::deserialize(deserializer)?.unwrap_or_default();
    Ok(values
        .into_iter()
        .filter_map(|value| match value {
            serde_json::Value::String(s) => Some(s),
            serde_json::Value::Number(n) => Some(n.to_string()),
            serde_json::Value::Bool(b) => Some(b.to_string()),
            _ => None,
        })
        .collect())
}
