//! Environment page: crashes by speed limit, weather, and lighting.
//!
//! The heatmap on this page is a document rendered by the backend; the
//! page only points the map frame at it.

use crash_stats_dashboard_models::{
    ANY_VALUE, ChartKind, EnvironmentData, FilterName, FilterOptions, FilterSet, HeatmapFrame,
};

use crate::DashboardError;
use crate::chart::ChartSpec;
use crate::fetch::{DataSource, fetch_typed};
use crate::filters::FilterReader;
use crate::map::{FrameSubject, NO_MAP_DATA_MESSAGE};
use crate::orchestrator::{CycleReport, Page, PageContext, SurfaceOutcome};

const FILTERS_ENDPOINT: &str = "/environment/api/filters";
const DATA_ENDPOINT: &str = "/environment/api/data";
const HEATMAP_ENDPOINT: &str = "/environment/heatmap";

/// Month select.
pub const MONTH_CONTROL: &str = "month-filter";
/// Weather condition select.
pub const WEATHER_CONTROL: &str = "weather-filter";
/// Posted speed limit select.
pub const SPEED_CONTROL: &str = "speed-filter";
/// Lighting condition select.
pub const LIGHTING_CONTROL: &str = "lighting-filter";

/// Metric elements, in the order they are written.
const METRIC_ELEMENTS: [&str; 4] = [
    "metric-total",
    "metric-street",
    "metric-street-count",
    "metric-severe",
];

/// Report id for the metric panel.
const METRICS_SURFACE: &str = "metrics";
/// Report id for the heatmap frame.
const HEATMAP_SURFACE: &str = "heatmap-frame";

/// Text shown in every metric element when the data request fails.
const METRIC_UNAVAILABLE: &str = "-";
const HEATMAP_UNAVAILABLE: &str = "Heatmap unavailable";

/// The environment page.
pub struct EnvironmentPage {
    filters: FilterReader,
}

impl Default for EnvironmentPage {
    fn default() -> Self {
        Self::new()
    }
}

impl EnvironmentPage {
    /// Creates the page with its standard control bindings.
    #[must_use]
    pub fn new() -> Self {
        Self {
            filters: FilterReader::new()
                .bind(FilterName::Month, MONTH_CONTROL)
                .bind(FilterName::Weather, WEATHER_CONTROL)
                .bind(FilterName::Speed, SPEED_CONTROL)
                .bind(FilterName::Lighting, LIGHTING_CONTROL),
        }
    }

    fn chart_specs() -> [ChartSpec; 3] {
        [
            ChartSpec::new(
                "chart-speed",
                ChartKind::Bar,
                "Crashes by Speed Limit",
                "#3B82F6",
            ),
            ChartSpec::new(
                "chart-weather",
                ChartKind::Bar,
                "Crashes by Weather",
                "#16a34a",
            ),
            ChartSpec::new(
                "chart-lighting",
                ChartKind::Doughnut,
                "Crashes by Lighting",
                "#F59E0B",
            ),
        ]
    }

    /// Fetches metrics and chart series in one request and renders them.
    async fn data_cycle(
        source: &dyn DataSource,
        ctx: &PageContext,
        filters: &FilterSet,
    ) -> CycleReport {
        let specs = Self::chart_specs();
        let metrics_generation = ctx.begin(METRICS_SURFACE);
        let chart_generations: Vec<_> = specs.iter().map(|spec| ctx.begin(&spec.surface_id)).collect();

        let fetched = fetch_typed::<EnvironmentData>(source, DATA_ENDPOINT, filters).await;
        if let Err(e) = &fetched {
            log::error!("Failed to load environment data: {e}");
        }

        let mut report = CycleReport::new();

        let outcome = ctx.commit(&metrics_generation, |ctx| {
            ctx.with_document(|document| match &fetched {
                Ok(data) => {
                    let metrics = &data.metrics;
                    let values = [
                        metrics.total.to_string(),
                        metrics.common_street.clone(),
                        format!("{} crashes", metrics.common_street_count),
                        metrics.severe.to_string(),
                    ];
                    for (element, value) in METRIC_ELEMENTS.iter().zip(&values) {
                        document.set_text(element, value);
                    }
                    SurfaceOutcome::Rendered
                }
                Err(_) => {
                    for element in METRIC_ELEMENTS {
                        document.set_text(element, METRIC_UNAVAILABLE);
                    }
                    SurfaceOutcome::Unavailable
                }
            })
        });
        report.push(METRICS_SURFACE, outcome);

        for (spec, generation) in specs.iter().zip(&chart_generations) {
            let outcome = ctx.commit(generation, |ctx| {
                ctx.with_charts(|charts| match &fetched {
                    Ok(data) => {
                        let points = match spec.surface_id.as_str() {
                            "chart-speed" => &data.charts.speed,
                            "chart-weather" => &data.charts.weather,
                            _ => &data.charts.lighting,
                        };
                        charts.render(spec, points)
                    }
                    Err(_) => charts.render_unavailable(&spec.surface_id),
                })
            });
            report.push(spec.surface_id.clone(), outcome);
        }

        report
    }

    /// Points the heatmap frame at the rendered document for `filters`.
    async fn heatmap_cycle(
        source: &dyn DataSource,
        ctx: &PageContext,
        filters: &FilterSet,
    ) -> CycleReport {
        let generation = ctx.begin(HEATMAP_SURFACE);
        let fetched = fetch_typed::<HeatmapFrame>(source, HEATMAP_ENDPOINT, filters).await;

        let outcome = ctx.commit(&generation, |ctx| {
            ctx.with_map(|map| match fetched {
                Ok(HeatmapFrame {
                    map_path: Some(path),
                }) if !path.trim().is_empty() => {
                    map.show_document(&path);
                    SurfaceOutcome::Rendered
                }
                Ok(_) => {
                    map.show_message(FrameSubject::Document, NO_MAP_DATA_MESSAGE);
                    SurfaceOutcome::NoData
                }
                Err(e) => {
                    log::error!("Failed to load environment heatmap: {e}");
                    map.show_error(FrameSubject::Document, HEATMAP_UNAVAILABLE)
                }
            })
        });

        let mut report = CycleReport::new();
        report.push(HEATMAP_SURFACE, outcome);
        report
    }
}

#[async_trait::async_trait]
impl Page for EnvironmentPage {
    fn name(&self) -> &'static str {
        "environment"
    }

    fn filters(&self) -> &FilterReader {
        &self.filters
    }

    fn triggers(&self) -> &[&'static str] {
        &[MONTH_CONTROL, WEATHER_CONTROL, SPEED_CONTROL, LIGHTING_CONTROL]
    }

    /// Fills the weather, speed, and lighting selects. A failed request
    /// leaves the selects as they are; the page still works unfiltered.
    async fn prepare(
        &self,
        source: &dyn DataSource,
        ctx: &PageContext,
    ) -> Result<(), DashboardError> {
        let options =
            match fetch_typed::<FilterOptions>(source, FILTERS_ENDPOINT, &FilterSet::new()).await {
                Ok(options) => options,
                Err(e) => {
                    log::error!("Failed to load filter options: {e}");
                    return Ok(());
                }
            };

        ctx.with_document(|document| {
            for (control, values) in [
                (WEATHER_CONTROL, &options.weather),
                (SPEED_CONTROL, &options.speed),
                (LIGHTING_CONTROL, &options.lighting),
            ] {
                let choices: Vec<String> = std::iter::once(ANY_VALUE.to_string())
                    .chain(values.iter().cloned())
                    .collect();
                log::debug!("{control}: {} options", choices.len());
                document.set_options(control, &choices);
            }
        });

        Ok(())
    }

    async fn refresh(
        &self,
        source: &dyn DataSource,
        ctx: &PageContext,
        filters: &FilterSet,
    ) -> CycleReport {
        let (mut report, heatmap) = futures::join!(
            Self::data_cycle(source, ctx, filters),
            Self::heatmap_cycle(source, ctx, filters)
        );
        report.extend(heatmap);
        report
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::chart::{ChartData, UNAVAILABLE_MESSAGE};
    use crate::config::MapOptions;
    use crate::headless::HeadlessPage;
    use crate::orchestrator::Dashboard;
    use crate::surface::FrameContent;
    use crate::test_support::StaticSource;

    fn page() -> HeadlessPage {
        HeadlessPage::new()
            .with_select(MONTH_CONTROL, "All", &["All", "1", "2", "3"])
            .with_control(WEATHER_CONTROL, "All")
            .with_control(SPEED_CONTROL, "All")
            .with_control(LIGHTING_CONTROL, "All")
    }

    fn data() -> serde_json::Value {
        serde_json::json!({
            "metrics": {
                "total": 1200,
                "common_street": "WESTERN AVE",
                "common_street_count": 48,
                "severe": 17
            },
            "charts": {
                "speed": [{"label": "30", "count": 900}, {"label": "35", "count": 200}],
                "weather": [{"label": "CLEAR", "count": 1000}, {"label": "RAIN", "count": 150}],
                "lighting": [{"label": "DAYLIGHT", "count": 800}, {"label": null, "count": 30}]
            }
        })
    }

    fn options() -> serde_json::Value {
        serde_json::json!({
            "weather": ["CLEAR", "RAIN"],
            "speed": [30, 35],
            "lighting": ["DAYLIGHT"]
        })
    }

    fn dashboard(source: StaticSource, page: &HeadlessPage) -> Dashboard<EnvironmentPage> {
        Dashboard::new(
            EnvironmentPage::new(),
            Box::new(source),
            page.context(MapOptions::default()),
        )
    }

    #[tokio::test]
    async fn load_populates_selects_and_renders_everything() {
        let page = page();
        let source = StaticSource::new()
            .json(FILTERS_ENDPOINT, options())
            .json(DATA_ENDPOINT, data())
            .json(
                HEATMAP_ENDPOINT,
                serde_json::json!({"map_path": "/static/maps/heatmap.html"}),
            );

        let report = dashboard(source, &page).load().await.unwrap();

        assert_eq!(report.count(SurfaceOutcome::Rendered), 5);
        let snapshot = page.snapshot();
        assert_eq!(
            snapshot.controls[SPEED_CONTROL].options,
            vec!["All", "30", "35"]
        );
        assert_eq!(snapshot.texts["metric-total"], "1200");
        assert_eq!(snapshot.texts["metric-street"], "WESTERN AVE");
        assert_eq!(snapshot.texts["metric-street-count"], "48 crashes");
        assert_eq!(snapshot.texts["metric-severe"], "17");
        assert_eq!(snapshot.charts.len(), 3);
        assert_eq!(
            snapshot.map.frame,
            FrameContent::Url("/static/maps/heatmap.html".to_string())
        );

        let ChartData::Series { labels, .. } = &snapshot.charts["chart-lighting"].data else {
            panic!("expected series data");
        };
        assert_eq!(labels, &vec!["DAYLIGHT".to_string(), "Unknown".to_string()]);
    }

    #[tokio::test]
    async fn filter_changes_are_sent_and_charts_replaced() {
        let page = page();
        let source = Arc::new(
            StaticSource::new()
                .json(DATA_ENDPOINT, data())
                .json(HEATMAP_ENDPOINT, serde_json::json!({"map_path": "/m.html"})),
        );
        let dashboard = Dashboard::new(
            EnvironmentPage::new(),
            Box::new(source.clone()),
            page.context(MapOptions::default()),
        );

        dashboard.refresh().await.unwrap();
        page.set_control(MONTH_CONTROL, "3");
        page.set_control(WEATHER_CONTROL, "RAIN");
        dashboard.on_change(MONTH_CONTROL).await.unwrap();

        let requests = source.requests_to(DATA_ENDPOINT);
        assert_eq!(requests.len(), 2);
        assert!(requests[0].is_empty());
        assert_eq!(
            requests[1].to_query(),
            vec![("month", "3"), ("weather", "RAIN")]
        );
        let stats = &page.snapshot().chart_stats["chart-speed"];
        assert_eq!((stats.created, stats.destroyed, stats.max_live), (2, 1, 1));
    }

    #[tokio::test]
    async fn server_error_marks_every_data_surface_unavailable() {
        let page = page();
        let source = StaticSource::new()
            .status(DATA_ENDPOINT, 500)
            .json(HEATMAP_ENDPOINT, serde_json::json!({"map_path": "/m.html"}));

        let report = dashboard(source, &page).refresh().await.unwrap();

        assert_eq!(report.count(SurfaceOutcome::Unavailable), 4);
        assert_eq!(report.outcome(HEATMAP_SURFACE), Some(SurfaceOutcome::Rendered));
        let snapshot = page.snapshot();
        assert!(snapshot.charts.is_empty());
        assert_eq!(snapshot.placeholders["chart-weather"], UNAVAILABLE_MESSAGE);
        assert_eq!(snapshot.texts["metric-total"], METRIC_UNAVAILABLE);
    }

    #[tokio::test]
    async fn malformed_json_is_contained() {
        let page = page();
        let source = StaticSource::new()
            .body(DATA_ENDPOINT, 200, "<html>Internal error</html>")
            .body(HEATMAP_ENDPOINT, 200, "not json");

        let report = dashboard(source, &page).refresh().await.unwrap();

        assert_eq!(report.count(SurfaceOutcome::Unavailable), 5);
        assert_eq!(
            page.snapshot().map.frame,
            FrameContent::Message(HEATMAP_UNAVAILABLE.to_string())
        );
    }

    #[tokio::test]
    async fn null_map_path_shows_no_data_message() {
        let page = page();
        let source = StaticSource::new()
            .json(DATA_ENDPOINT, data())
            .json(HEATMAP_ENDPOINT, serde_json::json!({"map_path": null}));

        let report = dashboard(source, &page).refresh().await.unwrap();

        assert_eq!(report.outcome(HEATMAP_SURFACE), Some(SurfaceOutcome::NoData));
        assert_eq!(
            page.snapshot().map.frame,
            FrameContent::Message(NO_MAP_DATA_MESSAGE.to_string())
        );
    }

    #[tokio::test]
    async fn failed_options_request_does_not_block_load() {
        let page = page();
        let source = StaticSource::new()
            .status(FILTERS_ENDPOINT, 503)
            .json(DATA_ENDPOINT, data())
            .json(HEATMAP_ENDPOINT, serde_json::json!({}));

        let report = dashboard(source, &page).load().await.unwrap();

        assert_eq!(report.outcome("chart-speed"), Some(SurfaceOutcome::Rendered));
        assert!(page.snapshot().controls[WEATHER_CONTROL].options.is_empty());
    }
}
