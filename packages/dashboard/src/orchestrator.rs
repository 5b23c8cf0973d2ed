//! Refresh orchestration.
//!
//! A [`Dashboard`] owns one [`Page`], the data source it reads from, and
//! the [`PageContext`] its surfaces live in. Loading the page and every
//! trigger event run a refresh cycle: read the filters, then let the page
//! fetch and render each of its surfaces. Cycles are never cancelled.
//! Instead, each surface takes a [`Generation`] before fetching and the
//! response is discarded if a newer cycle has started for that surface in
//! the meantime.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, PoisonError};

use crash_stats_dashboard_models::FilterSet;
use serde::Serialize;

use crate::DashboardError;
use crate::chart::ChartRenderer;
use crate::fetch::DataSource;
use crate::filters::FilterReader;
use crate::generation::{Generation, Generations};
use crate::map::MapContext;
use crate::surface::Document;

/// What a render step did to its surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SurfaceOutcome {
    /// New data was drawn.
    Rendered,
    /// The request succeeded with no rows; the no-data state is shown.
    NoData,
    /// The request failed; the unavailable state is shown.
    Unavailable,
    /// The response belonged to a superseded cycle and was dropped.
    Stale,
}

/// Outcome for one surface.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SurfaceReport {
    /// Surface (or element) id.
    pub surface: String,
    /// What happened to it.
    pub outcome: SurfaceOutcome,
}

/// Outcomes of every surface touched by one cycle.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CycleReport {
    /// Per-surface outcomes, in completion order.
    pub surfaces: Vec<SurfaceReport>,
}

impl CycleReport {
    /// Creates an empty report.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            surfaces: Vec::new(),
        }
    }

    /// Records the outcome for `surface`.
    pub fn push(&mut self, surface: impl Into<String>, outcome: SurfaceOutcome) {
        self.surfaces.push(SurfaceReport {
            surface: surface.into(),
            outcome,
        });
    }

    /// Appends every outcome of `other`.
    pub fn extend(&mut self, other: Self) {
        self.surfaces.extend(other.surfaces);
    }

    /// Returns the last outcome recorded for `surface`.
    #[must_use]
    pub fn outcome(&self, surface: &str) -> Option<SurfaceOutcome> {
        self.surfaces
            .iter()
            .rev()
            .find(|report| report.surface == surface)
            .map(|report| report.outcome)
    }

    /// Number of surfaces with the given outcome.
    #[must_use]
    pub fn count(&self, outcome: SurfaceOutcome) -> usize {
        self.surfaces
            .iter()
            .filter(|report| report.outcome == outcome)
            .count()
    }
}

/// Whether a dashboard is currently running a cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RefreshState {
    /// No cycle in progress.
    Idle,
    /// At least one cycle in progress.
    Refreshing,
}

/// The render targets of one page and the generations issued for them.
///
/// Each target sits behind its own lock. Locks are only taken inside the
/// `with_*` closures, which are synchronous, so no lock is ever held
/// across an await point.
pub struct PageContext {
    document: Mutex<Box<dyn Document>>,
    charts: Mutex<ChartRenderer>,
    map: Mutex<MapContext>,
    generations: Generations,
}

impl PageContext {
    /// Creates a context from a page's document, charts, and map.
    #[must_use]
    pub fn new(document: Box<dyn Document>, charts: ChartRenderer, map: MapContext) -> Self {
        Self {
            document: Mutex::new(document),
            charts: Mutex::new(charts),
            map: Mutex::new(map),
            generations: Generations::new(),
        }
    }

    /// Runs `f` with the page document.
    pub fn with_document<R>(&self, f: impl FnOnce(&mut dyn Document) -> R) -> R {
        let mut document = self.document.lock().unwrap_or_else(PoisonError::into_inner);
        f(&mut **document)
    }

    /// Runs `f` with the chart renderer.
    pub fn with_charts<R>(&self, f: impl FnOnce(&mut ChartRenderer) -> R) -> R {
        let mut charts = self.charts.lock().unwrap_or_else(PoisonError::into_inner);
        f(&mut charts)
    }

    /// Runs `f` with the base map.
    pub fn with_map<R>(&self, f: impl FnOnce(&mut MapContext) -> R) -> R {
        let mut map = self.map.lock().unwrap_or_else(PoisonError::into_inner);
        f(&mut map)
    }

    /// Starts a request for `surface`, superseding earlier ones.
    pub fn begin(&self, surface: &str) -> Generation {
        self.generations.issue(surface)
    }

    /// Returns `true` if `generation` is still the newest for its surface.
    #[must_use]
    pub fn is_current(&self, generation: &Generation) -> bool {
        self.generations.is_current(generation)
    }

    /// Runs `render` only if `generation` is still current, otherwise
    /// drops the response and returns [`SurfaceOutcome::Stale`].
    pub fn commit(
        &self,
        generation: &Generation,
        render: impl FnOnce(&Self) -> SurfaceOutcome,
    ) -> SurfaceOutcome {
        if !self.is_current(generation) {
            log::warn!(
                "Discarding stale response for {} (generation {})",
                generation.surface(),
                generation.value()
            );
            return SurfaceOutcome::Stale;
        }
        render(self)
    }
}

/// One dashboard page: its filters, its triggers, and its surfaces.
#[async_trait::async_trait]
pub trait Page: Send + Sync {
    /// Page name used in logs.
    fn name(&self) -> &'static str;

    /// Controls read at the start of every cycle.
    fn filters(&self) -> &FilterReader;

    /// Control ids whose change events re-run the cycle.
    fn triggers(&self) -> &[&'static str];

    /// One-time setup before the first cycle (e.g. populating select
    /// options).
    ///
    /// # Errors
    ///
    /// Returns [`DashboardError`] if setup cannot complete.
    async fn prepare(
        &self,
        _source: &dyn DataSource,
        _ctx: &PageContext,
    ) -> Result<(), DashboardError> {
        Ok(())
    }

    /// Fetches and renders every surface of the page for `filters`.
    ///
    /// Fetch failures are rendered per surface and reported in the
    /// returned [`CycleReport`], never returned as errors.
    async fn refresh(
        &self,
        source: &dyn DataSource,
        ctx: &PageContext,
        filters: &FilterSet,
    ) -> CycleReport;

    /// Handles a change event on a control that is not a trigger.
    ///
    /// # Errors
    ///
    /// Returns [`DashboardError`] if a control the handler reads is
    /// missing.
    async fn handle(
        &self,
        control_id: &str,
        _source: &dyn DataSource,
        _ctx: &PageContext,
    ) -> Result<Option<CycleReport>, DashboardError> {
        log::debug!("{}: ignoring event on '{control_id}'", self.name());
        Ok(None)
    }
}

/// Marks a cycle as in flight for as long as it is alive.
struct InFlight<'a>(&'a AtomicUsize);

impl<'a> InFlight<'a> {
    fn enter(counter: &'a AtomicUsize) -> Self {
        counter.fetch_add(1, Ordering::SeqCst);
        Self(counter)
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Drives a [`Page`] against a [`DataSource`].
pub struct Dashboard<P: Page> {
    page: P,
    source: Box<dyn DataSource>,
    ctx: PageContext,
    in_flight: AtomicUsize,
}

impl<P: Page> Dashboard<P> {
    /// Creates an idle dashboard.
    #[must_use]
    pub fn new(page: P, source: Box<dyn DataSource>, ctx: PageContext) -> Self {
        Self {
            page,
            source,
            ctx,
            in_flight: AtomicUsize::new(0),
        }
    }

    /// Returns the page.
    #[must_use]
    pub const fn page(&self) -> &P {
        &self.page
    }

    /// Returns the page context.
    #[must_use]
    pub const fn context(&self) -> &PageContext {
        &self.ctx
    }

    /// Returns whether a cycle is in progress.
    #[must_use]
    pub fn state(&self) -> RefreshState {
        if self.in_flight.load(Ordering::SeqCst) == 0 {
            RefreshState::Idle
        } else {
            RefreshState::Refreshing
        }
    }

    /// Runs page setup followed by the initial cycle.
    ///
    /// # Errors
    ///
    /// Returns [`DashboardError`] if setup fails or a bound control is
    /// missing.
    pub async fn load(&self) -> Result<CycleReport, DashboardError> {
        let _guard = InFlight::enter(&self.in_flight);
        log::info!("Loading {} page", self.page.name());
        self.page.prepare(self.source.as_ref(), &self.ctx).await?;
        self.refresh().await
    }

    /// Runs one refresh cycle with the current filter values.
    ///
    /// # Errors
    ///
    /// Returns [`DashboardError::Configuration`] if a bound control is
    /// missing. Fetch failures do not fail the cycle.
    pub async fn refresh(&self) -> Result<CycleReport, DashboardError> {
        let _guard = InFlight::enter(&self.in_flight);
        let filters = self
            .ctx
            .with_document(|document| self.page.filters().read(document))?;

        log::info!(
            "Refreshing {} page ({} active filters)",
            self.page.name(),
            filters.len()
        );
        let report = self
            .page
            .refresh(self.source.as_ref(), &self.ctx, &filters)
            .await;
        log::info!(
            "{} cycle finished: {} rendered, {} no data, {} unavailable, {} stale",
            self.page.name(),
            report.count(SurfaceOutcome::Rendered),
            report.count(SurfaceOutcome::NoData),
            report.count(SurfaceOutcome::Unavailable),
            report.count(SurfaceOutcome::Stale)
        );

        Ok(report)
    }

    /// Dispatches a change event on `control_id`.
    ///
    /// Trigger controls re-run the full cycle; anything else goes to
    /// [`Page::handle`].
    ///
    /// # Errors
    ///
    /// Returns [`DashboardError`] if a control the cycle or handler reads
    /// is missing.
    pub async fn on_change(&self, control_id: &str) -> Result<Option<CycleReport>, DashboardError> {
        if self
            .page
            .triggers()
            .iter()
            .any(|trigger| *trigger == control_id)
        {
            return self.refresh().await.map(Some);
        }

        let _guard = InFlight::enter(&self.in_flight);
        self.page
            .handle(control_id, self.source.as_ref(), &self.ctx)
            .await
    }
}
