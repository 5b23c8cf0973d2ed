//! Location page: crash heatmap with street and crash-record search.

use crash_stats_dashboard_models::{
    CrashSearchResult, FilterName, FilterSet, HeatPoint, StreetResult,
};

use crate::DashboardError;
use crate::config::SearchConfig;
use crate::fetch::{DataSource, FetchOutcome, fetch_list};
use crate::filters::FilterReader;
use crate::map::{FrameSubject, MapContext};
use crate::map::search::{
    NO_CRASHES_MESSAGE, NO_STREETS_MESSAGE, crash_item, rank_streets, searchable_query,
    street_item,
};
use crate::orchestrator::{CycleReport, Page, PageContext, SurfaceOutcome};
use crate::surface::{ResultItem, ResultsView};

const HEATMAP_ENDPOINT: &str = "/location/api/heatmap";
const STREETS_ENDPOINT: &str = "/location/api/streets";
const CRASHES_ENDPOINT: &str = "/location/api/search";

/// Street search box.
pub const SEARCH_CONTROL: &str = "search";
/// Metric used to rank streets.
pub const METRIC_CONTROL: &str = "metric-select";
/// Crash-record search box.
pub const CRASH_SEARCH_CONTROL: &str = "crash-search";
/// Button restoring the default view.
pub const RESET_CONTROL: &str = "reset-btn";

/// Element listing street results.
pub const STREET_RESULTS: &str = "region-info";
/// Element listing crash-record results.
pub const CRASH_RESULTS: &str = "crash-results";

/// Report id for the heat layer.
const HEAT_SURFACE: &str = "map-heat";
/// Report id for the base map view.
const VIEW_SURFACE: &str = "map";

const DEFAULT_METRIC: &str = "crashes";

const HEATMAP_UNAVAILABLE: &str = "Heatmap unavailable";
const SEARCH_UNAVAILABLE: &str = "Search unavailable";

/// The location page.
pub struct LocationPage {
    filters: FilterReader,
    street_search: FilterReader,
    crash_search: FilterReader,
    search: SearchConfig,
}

impl Default for LocationPage {
    fn default() -> Self {
        Self::new(SearchConfig::default())
    }
}

impl LocationPage {
    /// Creates the page with its standard control bindings.
    #[must_use]
    pub fn new(search: SearchConfig) -> Self {
        Self {
            filters: FilterReader::new(),
            street_search: FilterReader::new()
                .bind(FilterName::Query, SEARCH_CONTROL)
                .bind(FilterName::Metric, METRIC_CONTROL),
            crash_search: FilterReader::new().bind(FilterName::Query, CRASH_SEARCH_CONTROL),
            search,
        }
    }

    /// Applies a selected search result: recenters the map on its target
    /// and places the search marker there.
    ///
    /// Returns `false` if the result has no location.
    pub fn select(&self, ctx: &PageContext, item: &ResultItem) -> bool {
        let Some(target) = &item.target else {
            log::debug!("Result '{}' has no location", item.title);
            return false;
        };
        ctx.with_map(|map| map.focus(target));
        true
    }

    /// Searches streets with the current search box and metric.
    async fn search_streets(
        &self,
        source: &dyn DataSource,
        ctx: &PageContext,
    ) -> Result<CycleReport, DashboardError> {
        let filters = ctx.with_document(|document| self.street_search.read(document))?;
        let generation = ctx.begin(STREET_RESULTS);
        let mut report = CycleReport::new();

        let Some(query) = filters
            .get(FilterName::Query)
            .and_then(|query| searchable_query(query, self.search.min_chars))
        else {
            ctx.with_document(|document| document.set_results(STREET_RESULTS, ResultsView::Cleared));
            ctx.with_map(|map| map.clear_notice(FrameSubject::Search));
            report.push(STREET_RESULTS, SurfaceOutcome::NoData);
            return Ok(report);
        };

        let metric = filters
            .get(FilterName::Metric)
            .unwrap_or(DEFAULT_METRIC)
            .to_string();
        let request = FilterSet::new()
            .with(FilterName::Query, query)
            .with(FilterName::Metric, metric.as_str());
        let fetched = fetch_list::<StreetResult>(source, STREETS_ENDPOINT, &request).await;

        let outcome = ctx.commit(&generation, |ctx| match fetched {
            FetchOutcome::Data(streets) => {
                let items = rank_streets(streets, self.search.street_result_limit)
                    .iter()
                    .map(|street| street_item(street, &metric))
                    .collect();
                ctx.with_document(|document| {
                    document.set_results(STREET_RESULTS, ResultsView::Items(items));
                });
                ctx.with_map(|map| map.clear_notice(FrameSubject::Search));
                SurfaceOutcome::Rendered
            }
            FetchOutcome::Empty => {
                ctx.with_document(|document| {
                    document.set_results(
                        STREET_RESULTS,
                        ResultsView::Message(NO_STREETS_MESSAGE.to_string()),
                    );
                });
                ctx.with_map(|map| map.clear_notice(FrameSubject::Search));
                SurfaceOutcome::NoData
            }
            FetchOutcome::Failed(_) => {
                ctx.with_document(|document| document.set_results(STREET_RESULTS, ResultsView::Cleared));
                ctx.with_map(|map| map.show_error(FrameSubject::Search, SEARCH_UNAVAILABLE))
            }
        });

        report.push(STREET_RESULTS, outcome);
        Ok(report)
    }

    /// Searches crash records with the current crash search box.
    async fn search_crashes(
        &self,
        source: &dyn DataSource,
        ctx: &PageContext,
    ) -> Result<CycleReport, DashboardError> {
        let filters = ctx.with_document(|document| self.crash_search.read(document))?;
        let generation = ctx.begin(CRASH_RESULTS);
        let mut report = CycleReport::new();

        let Some(query) = filters
            .get(FilterName::Query)
            .and_then(|query| searchable_query(query, self.search.min_chars))
        else {
            ctx.with_document(|document| document.set_results(CRASH_RESULTS, ResultsView::Cleared));
            report.push(CRASH_RESULTS, SurfaceOutcome::NoData);
            return Ok(report);
        };

        let request = FilterSet::new().with(FilterName::Query, query);
        let fetched = fetch_list::<CrashSearchResult>(source, CRASHES_ENDPOINT, &request).await;

        let outcome = ctx.commit(&generation, |ctx| {
            let (view, outcome) = match fetched {
                FetchOutcome::Data(crashes) => (
                    ResultsView::Items(crashes.iter().map(crash_item).collect()),
                    SurfaceOutcome::Rendered,
                ),
                FetchOutcome::Empty => (
                    ResultsView::Message(NO_CRASHES_MESSAGE.to_string()),
                    SurfaceOutcome::NoData,
                ),
                FetchOutcome::Failed(_) => (
                    ResultsView::Message(SEARCH_UNAVAILABLE.to_string()),
                    SurfaceOutcome::Unavailable,
                ),
            };
            ctx.with_document(|document| document.set_results(CRASH_RESULTS, view));
            outcome
        });

        report.push(CRASH_RESULTS, outcome);
        Ok(report)
    }

    /// Restores the default view and clears the street search.
    fn reset(ctx: &PageContext) -> CycleReport {
        // Supersede any street search still in flight.
        ctx.begin(STREET_RESULTS);
        ctx.with_map(|map| {
            map.reset_view();
            map.clear_notice(FrameSubject::Search);
        });
        ctx.with_document(|document| {
            document.set_control_value(SEARCH_CONTROL, "");
            document.set_results(STREET_RESULTS, ResultsView::Cleared);
        });

        let mut report = CycleReport::new();
        report.push(VIEW_SURFACE, SurfaceOutcome::Rendered);
        report.push(STREET_RESULTS, SurfaceOutcome::NoData);
        report
    }
}

#[async_trait::async_trait]
impl Page for LocationPage {
    fn name(&self) -> &'static str {
        "location"
    }

    fn filters(&self) -> &FilterReader {
        &self.filters
    }

    fn triggers(&self) -> &[&'static str] {
        &[]
    }

    async fn prepare(
        &self,
        _source: &dyn DataSource,
        ctx: &PageContext,
    ) -> Result<(), DashboardError> {
        ctx.with_map(MapContext::reset_view);
        Ok(())
    }

    /// Renders the overview heat layer.
    async fn refresh(
        &self,
        source: &dyn DataSource,
        ctx: &PageContext,
        filters: &FilterSet,
    ) -> CycleReport {
        let generation = ctx.begin(HEAT_SURFACE);
        let fetched = fetch_list::<HeatPoint>(source, HEATMAP_ENDPOINT, filters).await;

        let outcome = ctx.commit(&generation, |ctx| {
            ctx.with_map(|map| match fetched {
                FetchOutcome::Data(points) => map.render_heatmap(points),
                FetchOutcome::Empty => map.render_heatmap(Vec::new()),
                FetchOutcome::Failed(_) => map.show_error(FrameSubject::Heat, HEATMAP_UNAVAILABLE),
            })
        });

        let mut report = CycleReport::new();
        report.push(HEAT_SURFACE, outcome);
        report
    }

    async fn handle(
        &self,
        control_id: &str,
        source: &dyn DataSource,
        ctx: &PageContext,
    ) -> Result<Option<CycleReport>, DashboardError> {
        match control_id {
            SEARCH_CONTROL | METRIC_CONTROL => self.search_streets(source, ctx).await.map(Some),
            CRASH_SEARCH_CONTROL => self.search_crashes(source, ctx).await.map(Some),
            RESET_CONTROL => Ok(Some(Self::reset(ctx))),
            _ => {
                log::debug!("location: ignoring event on '{control_id}'");
                Ok(None)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use crash_stats_dashboard_models::LatLng;
    use tokio::sync::Notify;

    use super::*;
    use crate::config::MapOptions;
    use crate::headless::HeadlessPage;
    use crate::map::{MapLayer, NO_MAP_DATA_MESSAGE};
    use crate::orchestrator::Dashboard;
    use crate::surface::FrameContent;
    use crate::test_support::StaticSource;

    fn page() -> HeadlessPage {
        HeadlessPage::new()
            .with_control(SEARCH_CONTROL, "")
            .with_select(
                METRIC_CONTROL,
                "crashes",
                &["crashes", "injuries", "vehicles"],
            )
            .with_control(CRASH_SEARCH_CONTROL, "")
    }

    fn streets() -> serde_json::Value {
        serde_json::json!([
            {"name": "A ST", "coords": [41.80, -87.60], "crash_count": 3},
            {"name": "B ST", "coords": [41.81, -87.61], "crash_count": 30},
            {"name": "C ST", "coords": [41.82, -87.62], "crash_count": 12},
            {"name": "D ST", "coords": [41.83, -87.63], "crash_count": 7},
            {"name": "E ST", "coords": [41.84, -87.64], "crash_count": 1},
            {"name": "F ST", "coords": [41.85, -87.65], "crash_count": 19}
        ])
    }

    fn dashboard(source: Arc<StaticSource>, page: &HeadlessPage) -> Dashboard<LocationPage> {
        Dashboard::new(
            LocationPage::default(),
            Box::new(source),
            page.context(MapOptions::default()),
        )
    }

    fn items(page: &HeadlessPage, element: &str) -> Vec<ResultItem> {
        match &page.snapshot().results[element] {
            ResultsView::Items(items) => items.clone(),
            other => panic!("expected items, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn load_renders_heat_layer_at_default_view() {
        let page = page();
        let source = Arc::new(StaticSource::new().json(
            HEATMAP_ENDPOINT,
            serde_json::json!([[41.88, -87.63, 2.0], [41.9, -87.7]]),
        ));

        let report = dashboard(source, &page).load().await.unwrap();

        assert_eq!(report.outcome(HEAT_SURFACE), Some(SurfaceOutcome::Rendered));
        let snapshot = page.snapshot();
        assert_eq!(snapshot.map.zoom, Some(11));
        assert_eq!(snapshot.map.center, Some(LatLng::new(41.8781, -87.6298)));
        let Some(MapLayer::Heat { points, .. }) = snapshot.map.layers.values().next() else {
            panic!("expected heat layer");
        };
        assert_eq!(points.len(), 2);
        assert!((points[1].weight - 1.0).abs() < f64::EPSILON);
    }

    #[tokio::test]
    async fn empty_heatmap_shows_no_data_message() {
        let page = page();
        let source = Arc::new(StaticSource::new().json(HEATMAP_ENDPOINT, serde_json::json!([])));

        let report = dashboard(source, &page).load().await.unwrap();

        assert_eq!(report.outcome(HEAT_SURFACE), Some(SurfaceOutcome::NoData));
        assert_eq!(
            page.snapshot().map.frame,
            FrameContent::Message(NO_MAP_DATA_MESSAGE.to_string())
        );
    }

    #[tokio::test]
    async fn short_query_clears_results_without_request() {
        let page = page();
        let source = Arc::new(StaticSource::new().json(STREETS_ENDPOINT, streets()));
        let dashboard = dashboard(source.clone(), &page);

        page.set_control(SEARCH_CONTROL, "  a ");
        let report = dashboard.on_change(SEARCH_CONTROL).await.unwrap().unwrap();

        assert_eq!(report.outcome(STREET_RESULTS), Some(SurfaceOutcome::NoData));
        assert!(source.requests().is_empty());
        assert_eq!(page.snapshot().results[STREET_RESULTS], ResultsView::Cleared);
    }

    #[tokio::test]
    async fn street_search_lists_top_five_by_count() {
        let page = page();
        let source = Arc::new(StaticSource::new().json(STREETS_ENDPOINT, streets()));
        let dashboard = dashboard(source.clone(), &page);

        page.set_control(SEARCH_CONTROL, "st");
        page.set_control(METRIC_CONTROL, "injuries");
        dashboard.on_change(METRIC_CONTROL).await.unwrap();

        let listed = items(&page, STREET_RESULTS);
        let titles: Vec<&str> = listed.iter().map(|item| item.title.as_str()).collect();
        assert_eq!(titles, vec!["B ST", "F ST", "C ST", "D ST", "A ST"]);
        assert_eq!(listed[0].detail, "30 Injuries");
        assert_eq!(
            source.requests_to(STREETS_ENDPOINT)[0].to_query(),
            vec![("q", "st"), ("metric", "injuries")]
        );
    }

    #[tokio::test]
    async fn empty_street_search_says_so() {
        let page = page();
        let source = Arc::new(StaticSource::new().json(STREETS_ENDPOINT, serde_json::json!([])));
        let dashboard = dashboard(source, &page);

        page.set_control(SEARCH_CONTROL, "zz");
        dashboard.on_change(SEARCH_CONTROL).await.unwrap();

        assert_eq!(
            page.snapshot().results[STREET_RESULTS],
            ResultsView::Message(NO_STREETS_MESSAGE.to_string())
        );
    }

    #[tokio::test]
    async fn failed_search_shows_error_in_map_frame() {
        let page = page();
        let source = Arc::new(StaticSource::new().status(STREETS_ENDPOINT, 500));
        let dashboard = dashboard(source, &page);

        page.set_control(SEARCH_CONTROL, "state");
        let report = dashboard.on_change(SEARCH_CONTROL).await.unwrap().unwrap();

        assert_eq!(
            report.outcome(STREET_RESULTS),
            Some(SurfaceOutcome::Unavailable)
        );
        assert_eq!(
            page.snapshot().map.frame,
            FrameContent::Message(SEARCH_UNAVAILABLE.to_string())
        );
    }

    #[tokio::test]
    async fn search_error_clears_once_the_backend_recovers() {
        let page = page();
        let source = Arc::new(
            StaticSource::new()
                .status(STREETS_ENDPOINT, 500)
                .json(STREETS_ENDPOINT, streets()),
        );
        let dashboard = dashboard(source, &page);
        page.set_control(SEARCH_CONTROL, "state");

        dashboard.on_change(SEARCH_CONTROL).await.unwrap();
        assert_eq!(
            page.snapshot().map.frame,
            FrameContent::Message(SEARCH_UNAVAILABLE.to_string())
        );

        let report = dashboard.on_change(SEARCH_CONTROL).await.unwrap().unwrap();

        assert_eq!(report.outcome(STREET_RESULTS), Some(SurfaceOutcome::Rendered));
        assert_eq!(page.snapshot().map.frame, FrameContent::Blank);
    }

    #[tokio::test]
    async fn reset_clears_search_error_but_not_heat_error() {
        let page = page();
        let source = Arc::new(
            StaticSource::new()
                .status(HEATMAP_ENDPOINT, 500)
                .status(STREETS_ENDPOINT, 500),
        );
        let dashboard = dashboard(source, &page);

        dashboard.load().await.unwrap();
        page.set_control(SEARCH_CONTROL, "state");
        dashboard.on_change(SEARCH_CONTROL).await.unwrap();
        dashboard.on_change(RESET_CONTROL).await.unwrap();

        assert_eq!(
            page.snapshot().map.frame,
            FrameContent::Message(HEATMAP_UNAVAILABLE.to_string())
        );
    }

    #[tokio::test]
    async fn newer_street_search_supersedes_one_in_flight() {
        let slow = Arc::new(Notify::new());
        let fast = Arc::new(Notify::new());
        let page = page();
        let source = Arc::new(
            StaticSource::new()
                .gated_json(
                    STREETS_ENDPOINT,
                    serde_json::json!([{"name": "OLD ST", "coords": [41.8, -87.6], "crash_count": 1}]),
                    slow.clone(),
                )
                .gated_json(
                    STREETS_ENDPOINT,
                    serde_json::json!([{"name": "NEW ST", "coords": [41.9, -87.7], "crash_count": 2}]),
                    fast.clone(),
                ),
        );
        let dashboard = dashboard(source, &page);
        page.set_control(SEARCH_CONTROL, "st");

        let (first, second, ()) = futures::join!(
            dashboard.on_change(SEARCH_CONTROL),
            dashboard.on_change(SEARCH_CONTROL),
            async {
                fast.notify_one();
                slow.notify_one();
            }
        );

        assert_eq!(
            first.unwrap().unwrap().outcome(STREET_RESULTS),
            Some(SurfaceOutcome::Stale)
        );
        assert_eq!(
            second.unwrap().unwrap().outcome(STREET_RESULTS),
            Some(SurfaceOutcome::Rendered)
        );
        let listed = items(&page, STREET_RESULTS);
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].title, "NEW ST");
    }

    #[tokio::test]
    async fn reset_supersedes_search_in_flight() {
        let gate = Arc::new(Notify::new());
        let page = page();
        let source = Arc::new(StaticSource::new().gated_json(
            STREETS_ENDPOINT,
            streets(),
            gate.clone(),
        ));
        let dashboard = dashboard(source, &page);
        page.set_control(SEARCH_CONTROL, "st");

        let (search, reset) = futures::join!(dashboard.on_change(SEARCH_CONTROL), async {
            let reset = dashboard.on_change(RESET_CONTROL).await;
            gate.notify_one();
            reset
        });

        assert_eq!(
            reset.unwrap().unwrap().outcome(STREET_RESULTS),
            Some(SurfaceOutcome::NoData)
        );
        assert_eq!(
            search.unwrap().unwrap().outcome(STREET_RESULTS),
            Some(SurfaceOutcome::Stale)
        );
        let snapshot = page.snapshot();
        assert_eq!(snapshot.results[STREET_RESULTS], ResultsView::Cleared);
        assert_eq!(snapshot.controls[SEARCH_CONTROL].value, "");
    }

    #[tokio::test]
    async fn short_crash_query_clears_results_without_request() {
        let page = page();
        let source = Arc::new(StaticSource::new().json(CRASHES_ENDPOINT, serde_json::json!([])));
        let dashboard = dashboard(source.clone(), &page);

        page.set_control(CRASH_SEARCH_CONTROL, "a");
        let report = dashboard
            .on_change(CRASH_SEARCH_CONTROL)
            .await
            .unwrap()
            .unwrap();

        assert_eq!(report.outcome(CRASH_RESULTS), Some(SurfaceOutcome::NoData));
        assert!(source.requests().is_empty());
        assert_eq!(page.snapshot().results[CRASH_RESULTS], ResultsView::Cleared);
    }

    #[tokio::test]
    async fn selecting_results_keeps_one_marker_and_reset_clears_it() {
        let page = page();
        let source = Arc::new(StaticSource::new().json(STREETS_ENDPOINT, streets()));
        let dashboard = dashboard(source, &page);

        page.set_control(SEARCH_CONTROL, "st");
        dashboard.on_change(SEARCH_CONTROL).await.unwrap();
        let listed = items(&page, STREET_RESULTS);

        assert!(dashboard.page().select(dashboard.context(), &listed[0]));
        assert!(dashboard.page().select(dashboard.context(), &listed[1]));

        let snapshot = page.snapshot();
        assert_eq!(snapshot.map.zoom, Some(15));
        assert_eq!(snapshot.map.center, Some(LatLng::new(41.85, -87.65)));
        assert_eq!(snapshot.map.layers.len(), 1);

        dashboard.on_change(RESET_CONTROL).await.unwrap();

        let snapshot = page.snapshot();
        assert!(snapshot.map.layers.is_empty());
        assert_eq!(snapshot.map.zoom, Some(11));
        assert_eq!(snapshot.controls[SEARCH_CONTROL].value, "");
        assert_eq!(snapshot.results[STREET_RESULTS], ResultsView::Cleared);
    }

    #[tokio::test]
    async fn crash_search_lists_records_without_targets() {
        let page = page();
        let source = Arc::new(StaticSource::new().json(
            CRASHES_ENDPOINT,
            serde_json::json!([
                {"id": 9, "date": "2023-12-24", "reason": "UNABLE TO DETERMINE", "injuries": 0, "vehicles": 2}
            ]),
        ));
        let dashboard = dashboard(source, &page);

        page.set_control(CRASH_SEARCH_CONTROL, "unable");
        dashboard.on_change(CRASH_SEARCH_CONTROL).await.unwrap();

        let listed = items(&page, CRASH_RESULTS);
        assert_eq!(listed[0].title, "24/12/2023 · UNABLE TO DETERMINE");
        assert!(!dashboard.page().select(dashboard.context(), &listed[0]));
    }

    #[tokio::test]
    async fn missing_search_box_is_a_configuration_error() {
        let page = HeadlessPage::new();
        let source = Arc::new(StaticSource::new());
        let dashboard = dashboard(source, &page);

        let err = dashboard.on_change(SEARCH_CONTROL).await.unwrap_err();
        assert!(matches!(err, DashboardError::Configuration(_)));
    }
}
