//! Chart rendering.
//!
//! Turns [`DataPoint`] sequences into chart configurations and owns the
//! chart lifecycle: at most one live chart per surface id, and every
//! render destroys the previous instance before creating a new one. The
//! visualization layer cannot reliably update a chart in place when the
//! dataset shape changes, so charts are always replaced, never mutated.

use std::collections::BTreeSet;

use crash_stats_dashboard_models::{ChartKind, DataPoint};
use serde::Serialize;

use crate::orchestrator::SurfaceOutcome;
use crate::sankey::SankeyGraph;
use crate::surface::ChartSurface;

pub use crash_stats_dashboard_models::UNKNOWN_LABEL;

/// Placeholder shown when a request succeeded but returned no rows.
pub const NO_DATA_MESSAGE: &str = "No data available";

/// Placeholder shown when the data could not be fetched.
pub const UNAVAILABLE_MESSAGE: &str = "Data unavailable";

/// Per-surface color palettes.
const PALETTES: &[(&str, &[&str])] = &[
    ("chart-speed", &["#3B82F6", "#60A5FA", "#93C5FD", "#BFDBFE"]),
    (
        "chart-weather",
        &["#16a34a", "#22c55e", "#4ade80", "#86efac", "#bbf7d0"],
    ),
    ("chart-lighting", &["#F59E0B", "#FBBF24", "#FCD34D", "#FDE68A"]),
];

/// Surfaces whose bars run horizontally.
const HORIZONTAL_SURFACES: &[&str] = &["chart-weather", "cause-chart"];

/// Describes a chart to draw.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChartSpec {
    /// DOM id of the target canvas.
    pub surface_id: String,
    /// Chart kind.
    pub kind: ChartKind,
    /// Dataset label.
    pub label: String,
    /// Color used when the surface has no palette of its own.
    pub color: String,
}

impl ChartSpec {
    /// Creates a chart spec.
    #[must_use]
    pub fn new(
        surface_id: impl Into<String>,
        kind: ChartKind,
        label: impl Into<String>,
        color: impl Into<String>,
    ) -> Self {
        Self {
            surface_id: surface_id.into(),
            kind,
            label: label.into(),
            color: color.into(),
        }
    }

    /// Returns the palette for this chart's surface, or a single-color
    /// palette made from [`Self::color`].
    #[must_use]
    pub fn palette(&self) -> Vec<String> {
        PALETTES
            .iter()
            .find(|(id, _)| *id == self.surface_id)
            .map_or_else(
                || vec![self.color.clone()],
                |(_, colors)| colors.iter().map(ToString::to_string).collect(),
            )
    }

    /// Returns the axis the bars/categories run along.
    #[must_use]
    pub fn index_axis(&self) -> IndexAxis {
        if self.kind == ChartKind::Bar && HORIZONTAL_SURFACES.contains(&self.surface_id.as_str()) {
            IndexAxis::Y
        } else {
            IndexAxis::X
        }
    }
}

/// Category axis of a chart.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum IndexAxis {
    /// Categories along the horizontal axis (vertical bars).
    X,
    /// Categories along the vertical axis (horizontal bars).
    Y,
}

/// A complete chart configuration handed to a [`ChartSurface`].
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChartConfig {
    /// Chart kind.
    #[serde(rename = "type")]
    pub kind: ChartKind,
    /// Chart data.
    pub data: ChartData,
    /// Display options.
    pub options: ChartOptions,
}

/// Data of a chart.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ChartData {
    /// Parallel labels and datasets.
    Series {
        /// Category labels.
        labels: Vec<String>,
        /// Datasets, one value per label.
        datasets: Vec<Dataset>,
    },
    /// Sankey nodes and links.
    Sankey(SankeyGraph),
}

/// One dataset of a series chart.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Dataset {
    /// Dataset label.
    pub label: String,
    /// Values, parallel to the chart labels.
    pub data: Vec<u64>,
    /// One color for bars and lines, one color per slice for radial
    /// charts.
    pub background_color: Vec<String>,
}

/// Display options of a chart.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChartOptions {
    /// Category axis.
    pub index_axis: IndexAxis,
    /// Whether the legend is shown (to the right of the chart).
    pub show_legend: bool,
    /// Doughnut cutout, if any.
    pub cutout: Option<String>,
    /// Whether axes and grid lines are drawn.
    pub show_scales: bool,
}

impl ChartOptions {
    fn for_spec(spec: &ChartSpec) -> Self {
        let radial = spec.kind.is_radial();
        Self {
            index_axis: spec.index_axis(),
            show_legend: radial,
            cutout: (spec.kind == ChartKind::Doughnut).then(|| "65%".to_string()),
            show_scales: !radial && spec.kind != ChartKind::Sankey,
        }
    }
}

/// Sorts `points` by count descending and splits them into parallel label
/// and value sequences.
///
/// The sort is stable, so points with equal counts keep their input order.
#[must_use]
pub fn sorted_series(points: &[DataPoint]) -> (Vec<String>, Vec<u64>) {
    let mut sorted: Vec<&DataPoint> = points.iter().collect();
    sorted.sort_by(|a, b| b.count.cmp(&a.count));

    sorted
        .into_iter()
        .map(|point| {
            let label = point
                .label
                .as_deref()
                .filter(|label| !label.trim().is_empty())
                .unwrap_or(UNKNOWN_LABEL)
                .to_string();
            (label, point.count)
        })
        .unzip()
}

/// Builds the chart configuration for `points`, or `None` when there is
/// nothing to draw.
#[must_use]
pub fn build_chart_config(spec: &ChartSpec, points: &[DataPoint]) -> Option<ChartConfig> {
    let (labels, values) = sorted_series(points);
    if labels.is_empty() || values.is_empty() {
        return None;
    }

    let palette = spec.palette();
    let background_color = if spec.kind.is_radial() {
        palette.into_iter().take(values.len()).collect()
    } else {
        palette.into_iter().take(1).collect()
    };

    Some(ChartConfig {
        kind: spec.kind,
        data: ChartData::Series {
            labels,
            datasets: vec![Dataset {
                label: spec.label.clone(),
                data: values,
                background_color,
            }],
        },
        options: ChartOptions::for_spec(spec),
    })
}

/// Builds the configuration for a sankey diagram, or `None` when the graph
/// has no flows.
#[must_use]
pub fn build_sankey_config(surface_id: &str, graph: &SankeyGraph) -> Option<ChartConfig> {
    if graph.links.is_empty() {
        return None;
    }
    let spec = ChartSpec::new(surface_id, ChartKind::Sankey, "", "");
    Some(ChartConfig {
        kind: ChartKind::Sankey,
        data: ChartData::Sankey(graph.clone()),
        options: ChartOptions::for_spec(&spec),
    })
}

/// Owns the chart surface of a page and the set of live chart instances.
pub struct ChartRenderer {
    surface: Box<dyn ChartSurface>,
    live: BTreeSet<String>,
}

impl ChartRenderer {
    /// Wraps a chart surface with no live charts.
    #[must_use]
    pub fn new(surface: Box<dyn ChartSurface>) -> Self {
        Self {
            surface,
            live: BTreeSet::new(),
        }
    }

    /// Renders `points` as described by `spec`.
    ///
    /// Empty input destroys any previous chart and draws the
    /// [`NO_DATA_MESSAGE`] placeholder instead of creating a chart.
    pub fn render(&mut self, spec: &ChartSpec, points: &[DataPoint]) -> SurfaceOutcome {
        let config = build_chart_config(spec, points);
        self.replace(&spec.surface_id, config)
    }

    /// Renders a sankey diagram on `surface_id`.
    pub fn render_sankey(&mut self, surface_id: &str, graph: &SankeyGraph) -> SurfaceOutcome {
        let config = build_sankey_config(surface_id, graph);
        self.replace(surface_id, config)
    }

    /// Destroys any chart on `surface_id` and shows the
    /// [`UNAVAILABLE_MESSAGE`] placeholder.
    pub fn render_unavailable(&mut self, surface_id: &str) -> SurfaceOutcome {
        self.destroy(surface_id);
        self.surface
            .show_placeholder(surface_id, UNAVAILABLE_MESSAGE);
        SurfaceOutcome::Unavailable
    }

    /// Returns `true` if a chart instance is currently bound to
    /// `surface_id`.
    #[must_use]
    pub fn is_live(&self, surface_id: &str) -> bool {
        self.live.contains(surface_id)
    }

    fn replace(&mut self, surface_id: &str, config: Option<ChartConfig>) -> SurfaceOutcome {
        self.destroy(surface_id);

        let Some(config) = config else {
            log::debug!("{surface_id}: no data");
            self.surface.show_placeholder(surface_id, NO_DATA_MESSAGE);
            return SurfaceOutcome::NoData;
        };

        log::debug!("{surface_id}: rendering {} chart", config.kind);
        self.surface.create(surface_id, config);
        self.live.insert(surface_id.to_string());
        SurfaceOutcome::Rendered
    }

    fn destroy(&mut self, surface_id: &str) {
        if self.live.remove(surface_id) {
            self.surface.destroy(surface_id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::headless::HeadlessPage;

    fn points(values: &[(&str, u64)]) -> Vec<DataPoint> {
        values
            .iter()
            .map(|(label, count)| DataPoint::new(*label, *count))
            .collect()
    }

    #[test]
    fn sorts_descending_and_keeps_tie_order() {
        let (labels, values) = sorted_series(&points(&[
            ("a", 2),
            ("b", 5),
            ("c", 2),
            ("d", 9),
            ("e", 2),
        ]));
        assert_eq!(labels, vec!["d", "b", "a", "c", "e"]);
        assert_eq!(values, vec![9, 5, 2, 2, 2]);
    }

    #[test]
    fn missing_labels_become_unknown() {
        let (labels, _) = sorted_series(&[
            DataPoint {
                label: None,
                count: 3,
            },
            DataPoint::new("", 1),
        ]);
        assert_eq!(labels, vec![UNKNOWN_LABEL, UNKNOWN_LABEL]);
    }

    #[test]
    fn palette_lookup_and_fallback() {
        let speed = ChartSpec::new("chart-speed", ChartKind::Bar, "Speed", "blue");
        assert_eq!(speed.palette().len(), 4);
        let other = ChartSpec::new("cause-chart", ChartKind::Bar, "Causes", "#123456");
        assert_eq!(other.palette(), vec!["#123456"]);
    }

    #[test]
    fn orientation_depends_on_surface_and_kind() {
        let weather = ChartSpec::new("chart-weather", ChartKind::Bar, "Weather", "green");
        assert_eq!(weather.index_axis(), IndexAxis::Y);
        let speed = ChartSpec::new("chart-speed", ChartKind::Bar, "Speed", "blue");
        assert_eq!(speed.index_axis(), IndexAxis::X);
    }

    #[test]
    fn doughnut_uses_sliced_palette_and_legend() {
        let spec = ChartSpec::new("chart-lighting", ChartKind::Doughnut, "Lighting", "orange");
        let config =
            build_chart_config(&spec, &points(&[("DAYLIGHT", 40), ("DARKNESS", 10)])).unwrap();
        let ChartData::Series { datasets, .. } = &config.data else {
            panic!("expected series data");
        };
        assert_eq!(datasets[0].background_color, vec!["#F59E0B", "#FBBF24"]);
        assert!(config.options.show_legend);
        assert!(!config.options.show_scales);
        assert_eq!(config.options.cutout.as_deref(), Some("65%"));
    }

    #[test]
    fn bar_uses_first_palette_color_without_legend() {
        let spec = ChartSpec::new("chart-speed", ChartKind::Bar, "Speed", "blue");
        let config = build_chart_config(&spec, &points(&[("30", 4), ("25", 7)])).unwrap();
        let ChartData::Series { labels, datasets } = &config.data else {
            panic!("expected series data");
        };
        assert_eq!(labels, &vec!["25".to_string(), "30".to_string()]);
        assert_eq!(datasets[0].background_color, vec!["#3B82F6"]);
        assert!(!config.options.show_legend);
        assert!(config.options.show_scales);
    }

    #[test]
    fn empty_input_shows_placeholder_once_without_chart() {
        let page = HeadlessPage::new();
        let mut renderer = ChartRenderer::new(Box::new(page.clone()));
        let spec = ChartSpec::new("chart-speed", ChartKind::Bar, "Speed", "blue");

        assert_eq!(renderer.render(&spec, &[]), SurfaceOutcome::NoData);

        let snapshot = page.snapshot();
        assert!(!snapshot.charts.contains_key("chart-speed"));
        assert_eq!(snapshot.chart_stats["chart-speed"].created, 0);
        assert_eq!(snapshot.chart_stats["chart-speed"].placeholders, 1);
        assert_eq!(
            snapshot.placeholders["chart-speed"],
            NO_DATA_MESSAGE.to_string()
        );
        assert!(!renderer.is_live("chart-speed"));
    }

    #[test]
    fn rerender_replaces_instead_of_stacking() {
        let page = HeadlessPage::new();
        let mut renderer = ChartRenderer::new(Box::new(page.clone()));
        let spec = ChartSpec::new("chart-speed", ChartKind::Bar, "Speed", "blue");

        renderer.render(&spec, &points(&[("30", 4)]));
        renderer.render(&spec, &points(&[("25", 7), ("30", 1)]));

        let snapshot = page.snapshot();
        let stats = &snapshot.chart_stats["chart-speed"];
        assert_eq!(stats.created, 2);
        assert_eq!(stats.destroyed, 1);
        assert_eq!(stats.max_live, 1);
        assert!(renderer.is_live("chart-speed"));
    }

    #[test]
    fn empty_rerender_destroys_previous_chart() {
        let page = HeadlessPage::new();
        let mut renderer = ChartRenderer::new(Box::new(page.clone()));
        let spec = ChartSpec::new("chart-weather", ChartKind::Bar, "Weather", "green");

        renderer.render(&spec, &points(&[("CLEAR", 4)]));
        renderer.render(&spec, &[]);

        let snapshot = page.snapshot();
        assert!(!snapshot.charts.contains_key("chart-weather"));
        assert_eq!(snapshot.chart_stats["chart-weather"].destroyed, 1);
        assert!(!renderer.is_live("chart-weather"));
    }
}
