//! The dashboard pages.
//!
//! Each page binds its controls, names its trigger events, and implements
//! one refresh cycle over its surfaces. Surfaces of a cycle are fetched
//! concurrently and fail independently.

pub mod environment;
pub mod location;
pub mod offense;

pub use environment::EnvironmentPage;
pub use location::LocationPage;
pub use offense::OffensePage;

use crash_stats_dashboard_models::{DataPoint, FilterSet};
use serde::de::DeserializeOwned;

use crate::chart::{ChartRenderer, ChartSpec};
use crate::fetch::{DataSource, FetchOutcome, fetch_list};
use crate::orchestrator::{PageContext, SurfaceOutcome};

/// Fetches a list from `endpoint` and renders it on the chart described by
/// `spec`, unless a newer request for the same chart started meanwhile.
pub(crate) async fn chart_cycle<T>(
    source: &dyn DataSource,
    ctx: &PageContext,
    spec: ChartSpec,
    endpoint: &str,
    filters: &FilterSet,
) -> SurfaceOutcome
where
    T: DeserializeOwned + Into<DataPoint> + Send,
{
    let generation = ctx.begin(&spec.surface_id);
    let fetched = fetch_list::<T>(source, endpoint, filters).await;

    ctx.commit(&generation, |ctx| {
        ctx.with_charts(|charts| render_list(charts, &spec, fetched))
    })
}

/// Renders a classified list fetch on a chart.
pub(crate) fn render_list<T: Into<DataPoint>>(
    charts: &mut ChartRenderer,
    spec: &ChartSpec,
    fetched: FetchOutcome<T>,
) -> SurfaceOutcome {
    match fetched {
        FetchOutcome::Data(rows) => {
            let points: Vec<DataPoint> = rows.into_iter().map(Into::into).collect();
            charts.render(spec, &points)
        }
        FetchOutcome::Empty => charts.render(spec, &[]),
        FetchOutcome::Failed(_) => charts.render_unavailable(&spec.surface_id),
    }
}
