//! Offense page: contributing causes, hit-and-runs by crash and by beat,
//! and cause → severity flows.

use std::sync::{Mutex, PoisonError};

use crash_stats_dashboard_models::{
    CauseCount, ChartKind, FilterName, FilterSet, MostHitBeat, SankeyRow,
};

use crate::chart::{ChartSpec, UNKNOWN_LABEL};
use crate::config::SankeyConfig;
use crate::fetch::{DataSource, FetchOutcome, fetch_list, fetch_typed};
use crate::filters::FilterReader;
use crate::map::FrameSubject;
use crate::map::choropleth::regions_from_geojson;
use crate::map::cluster::markers_from_geojson;
use crate::orchestrator::{CycleReport, Page, PageContext, SurfaceOutcome};
use crate::pages::{chart_cycle, render_list};
use crate::sankey::{SankeyOptions, build_sankey};

const CAUSE_DISTRIBUTION_ENDPOINT: &str = "/offense/api/cause-distribution";
const PRIMARY_CAUSE_ENDPOINT: &str = "/offense/api/primary-cause";
const HIT_AND_RUN_ENDPOINT: &str = "/offense/api/hit-and-run";
const CAUSE_SEVERITY_ENDPOINT: &str = "/offense/api/cause-severity";
const MOST_HIT_BEAT_ENDPOINT: &str = "/offense/api/most-hit-and-run-beat";
const BEAT_CHOROPLETH_ENDPOINT: &str = "/offense/api/beat-choropleth";

/// Inclusive start date input.
pub const START_DATE_CONTROL: &str = "start-date";
/// Inclusive end date input.
pub const END_DATE_CONTROL: &str = "end-date";
/// Region select.
pub const REGION_CONTROL: &str = "region-select";
/// Police beat select; changing it refreshes the page.
pub const BEAT_CONTROL: &str = "beat-select";
/// Button applying the date and region filters.
pub const APPLY_CONTROL: &str = "apply-filters";

const CAUSE_CHART: &str = "cause-chart";
const CAUSE_TABLE: &str = "cause-table";
const PRIMARY_CAUSE_CHART: &str = "primary-cause-chart";
const SANKEY_CHART: &str = "cause-severity-sankey";
const MOST_HIT_BEAT: &str = "most-hit-beat";
/// Report id for the hit-and-run cluster layer.
const HIT_AND_RUN_SURFACE: &str = "map-clusters";
/// Report id for the beat choropleth layer.
const CHOROPLETH_SURFACE: &str = "map-choropleth";

/// Filters accepted by the cause distribution endpoint.
const DATE_REGION_FILTERS: &[FilterName] =
    &[FilterName::StartDate, FilterName::EndDate, FilterName::Region];
/// Filters accepted by the per-beat endpoints.
const BEAT_FILTERS: &[FilterName] = &[FilterName::Beat];

const HIT_AND_RUN_UNAVAILABLE: &str = "Hit-and-run map unavailable";
const CHOROPLETH_UNAVAILABLE: &str = "Beat map unavailable";

/// The offense page.
pub struct OffensePage {
    filters: FilterReader,
    sankey: SankeyConfig,
    drill_down: Mutex<Option<String>>,
}

impl Default for OffensePage {
    fn default() -> Self {
        Self::new(SankeyConfig::default())
    }
}

impl OffensePage {
    /// Creates the page with its standard control bindings.
    #[must_use]
    pub fn new(sankey: SankeyConfig) -> Self {
        Self {
            filters: FilterReader::new()
                .bind(FilterName::StartDate, START_DATE_CONTROL)
                .bind(FilterName::EndDate, END_DATE_CONTROL)
                .bind(FilterName::Region, REGION_CONTROL)
                .bind(FilterName::Beat, BEAT_CONTROL),
            sankey,
            drill_down: Mutex::new(None),
        }
    }

    /// Restricts the sankey diagram to one cause, or lifts the restriction
    /// with `None`. Takes effect on the next cycle.
    pub fn set_drill_down(&self, cause: Option<String>) {
        log::debug!("Sankey drill-down: {cause:?}");
        *self.drill_down.lock().unwrap_or_else(PoisonError::into_inner) = cause;
    }

    /// Returns the cause the sankey diagram is restricted to.
    #[must_use]
    pub fn drill_down(&self) -> Option<String> {
        self.drill_down
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Cause distribution chart and table, from one response.
    async fn cause_distribution(
        source: &dyn DataSource,
        ctx: &PageContext,
        filters: &FilterSet,
    ) -> CycleReport {
        let spec = ChartSpec::new(CAUSE_CHART, ChartKind::Bar, "Crash Count", "#EF4444");
        let generation = ctx.begin(CAUSE_CHART);
        let fetched = fetch_list::<CauseCount>(
            source,
            CAUSE_DISTRIBUTION_ENDPOINT,
            &filters.subset(DATE_REGION_FILTERS),
        )
        .await;

        let rows: Vec<Vec<String>> = match &fetched {
            FetchOutcome::Data(causes) => causes
                .iter()
                .map(|cause| {
                    vec![
                        cause
                            .cause
                            .clone()
                            .filter(|label| !label.trim().is_empty())
                            .unwrap_or_else(|| UNKNOWN_LABEL.to_string()),
                        cause.count.to_string(),
                    ]
                })
                .collect(),
            FetchOutcome::Empty | FetchOutcome::Failed(_) => Vec::new(),
        };
        let table_outcome = match &fetched {
            FetchOutcome::Data(_) => SurfaceOutcome::Rendered,
            FetchOutcome::Empty => SurfaceOutcome::NoData,
            FetchOutcome::Failed(_) => SurfaceOutcome::Unavailable,
        };

        let mut report = CycleReport::new();
        let chart_outcome = ctx.commit(&generation, |ctx| {
            ctx.with_document(|document| document.set_table_rows(CAUSE_TABLE, &rows));
            ctx.with_charts(|charts| render_list(charts, &spec, fetched))
        });
        report.push(CAUSE_CHART, chart_outcome);
        report.push(
            CAUSE_TABLE,
            if chart_outcome == SurfaceOutcome::Stale {
                SurfaceOutcome::Stale
            } else {
                table_outcome
            },
        );
        report
    }

    /// Primary cause chart for the selected beat.
    async fn primary_cause(
        source: &dyn DataSource,
        ctx: &PageContext,
        filters: &FilterSet,
    ) -> CycleReport {
        let spec = ChartSpec::new(
            PRIMARY_CAUSE_CHART,
            ChartKind::Bar,
            "Crashes by Primary Cause",
            "#6366F1",
        );
        let outcome = chart_cycle::<CauseCount>(
            source,
            ctx,
            spec,
            PRIMARY_CAUSE_ENDPOINT,
            &filters.subset(BEAT_FILTERS),
        )
        .await;

        let mut report = CycleReport::new();
        report.push(PRIMARY_CAUSE_CHART, outcome);
        report
    }

    /// Hit-and-run crashes for the selected beat as a cluster layer.
    async fn hit_and_run(
        source: &dyn DataSource,
        ctx: &PageContext,
        filters: &FilterSet,
    ) -> CycleReport {
        let generation = ctx.begin(HIT_AND_RUN_SURFACE);
        let markers = match source
            .fetch_json(HIT_AND_RUN_ENDPOINT, &filters.subset(BEAT_FILTERS))
            .await
        {
            Ok(value) => markers_from_geojson(value).map_err(|e| e.to_string()),
            Err(e) => Err(e.to_string()),
        };

        let outcome = ctx.commit(&generation, |ctx| {
            ctx.with_map(|map| match markers {
                Ok(markers) => map.render_clusters(markers),
                Err(e) => {
                    log::error!("Failed to load hit-and-run crashes: {e}");
                    map.show_error(FrameSubject::Cluster, HIT_AND_RUN_UNAVAILABLE)
                }
            })
        });

        let mut report = CycleReport::new();
        report.push(HIT_AND_RUN_SURFACE, outcome);
        report
    }

    /// Every beat shaded by its hit-and-run count. The backend counts over
    /// all crashes, so no filters are sent.
    async fn beat_choropleth(source: &dyn DataSource, ctx: &PageContext) -> CycleReport {
        let generation = ctx.begin(CHOROPLETH_SURFACE);
        let regions = match source
            .fetch_json(BEAT_CHOROPLETH_ENDPOINT, &FilterSet::new())
            .await
        {
            Ok(value) => regions_from_geojson(value).map_err(|e| e.to_string()),
            Err(e) => Err(e.to_string()),
        };

        let outcome = ctx.commit(&generation, |ctx| {
            ctx.with_map(|map| match regions {
                Ok(regions) => map.render_choropleth(regions),
                Err(e) => {
                    log::error!("Failed to load beat choropleth: {e}");
                    map.show_error(FrameSubject::Choropleth, CHOROPLETH_UNAVAILABLE)
                }
            })
        });

        let mut report = CycleReport::new();
        report.push(CHOROPLETH_SURFACE, outcome);
        report
    }

    /// Cause → severity sankey for the selected beat.
    async fn cause_severity(
        &self,
        source: &dyn DataSource,
        ctx: &PageContext,
        filters: &FilterSet,
    ) -> CycleReport {
        let options = SankeyOptions {
            top_n: self.sankey.top_n,
            cause: self.drill_down(),
        };
        let generation = ctx.begin(SANKEY_CHART);
        let fetched = fetch_list::<SankeyRow>(
            source,
            CAUSE_SEVERITY_ENDPOINT,
            &filters.subset(BEAT_FILTERS),
        )
        .await;

        let outcome = ctx.commit(&generation, |ctx| {
            ctx.with_charts(|charts| match fetched {
                FetchOutcome::Data(rows) => {
                    let graph = build_sankey(&rows, &options);
                    log::debug!(
                        "Sankey: {} rows, {} causes, {} links",
                        rows.len(),
                        graph.cause_count(),
                        graph.links.len()
                    );
                    charts.render_sankey(SANKEY_CHART, &graph)
                }
                FetchOutcome::Empty => charts.render_sankey(SANKEY_CHART, &build_sankey(&[], &options)),
                FetchOutcome::Failed(_) => charts.render_unavailable(SANKEY_CHART),
            })
        });

        let mut report = CycleReport::new();
        report.push(SANKEY_CHART, outcome);
        report
    }

    /// Summary panel naming the beat with the most hit-and-runs.
    async fn most_hit_beat(source: &dyn DataSource, ctx: &PageContext) -> CycleReport {
        let generation = ctx.begin(MOST_HIT_BEAT);
        let fetched =
            fetch_typed::<MostHitBeat>(source, MOST_HIT_BEAT_ENDPOINT, &FilterSet::new()).await;

        let (text, outcome) = match fetched {
            Ok(MostHitBeat {
                beat: Some(beat),
                count,
            }) if count > 0 => (
                format!("Beat {beat} ({count} hit-and-runs)"),
                SurfaceOutcome::Rendered,
            ),
            Ok(_) => ("No data".to_string(), SurfaceOutcome::NoData),
            Err(e) => {
                log::error!("Failed to load most hit-and-run beat: {e}");
                ("Unavailable".to_string(), SurfaceOutcome::Unavailable)
            }
        };

        let outcome = ctx.commit(&generation, |ctx| {
            ctx.with_document(|document| document.set_text(MOST_HIT_BEAT, &text));
            outcome
        });

        let mut report = CycleReport::new();
        report.push(MOST_HIT_BEAT, outcome);
        report
    }
}

#[async_trait::async_trait]
impl Page for OffensePage {
    fn name(&self) -> &'static str {
        "offense"
    }

    fn filters(&self) -> &FilterReader {
        &self.filters
    }

    fn triggers(&self) -> &[&'static str] {
        &[APPLY_CONTROL, BEAT_CONTROL]
    }

    async fn refresh(
        &self,
        source: &dyn DataSource,
        ctx: &PageContext,
        filters: &FilterSet,
    ) -> CycleReport {
        let (causes, primary, clusters, choropleth, sankey, beat) = futures::join!(
            Self::cause_distribution(source, ctx, filters),
            Self::primary_cause(source, ctx, filters),
            Self::hit_and_run(source, ctx, filters),
            Self::beat_choropleth(source, ctx),
            self.cause_severity(source, ctx, filters),
            Self::most_hit_beat(source, ctx)
        );

        let mut report = causes;
        for part in [primary, clusters, choropleth, sankey, beat] {
            report.extend(part);
        }
        report
    }
}
