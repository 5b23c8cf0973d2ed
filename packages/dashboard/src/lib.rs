#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Filter-driven refresh pipeline for the `CrashStats` dashboard.
//!
//! Each page reads its filter controls, fetches aggregated crash
//! statistics from the backend, transforms the JSON into chart and map
//! inputs, and renders them onto abstract surfaces:
//!
//! - [`filters`]: reads control values into a [`FilterSet`].
//! - [`fetch`]: one GET per request, classified into data, empty, or
//!   failure.
//! - [`chart`]: chart configurations and the replace-not-stack chart
//!   lifecycle.
//! - [`map`]: heatmap, cluster, and search/zoom layers on one base map.
//! - [`sankey`]: cause → severity flow graphs with top-N bucketing.
//! - [`orchestrator`]: refresh cycles, trigger dispatch, and stale
//!   response discarding.
//! - [`pages`]: the environment, location, and offense pages.
//!
//! [`headless::HeadlessPage`] implements every surface in memory so the
//! whole pipeline runs without a UI.

pub mod chart;
pub mod config;
pub mod fetch;
pub mod filters;
pub mod format;
pub mod generation;
pub mod headless;
pub mod map;
pub mod orchestrator;
pub mod pages;
pub mod sankey;
pub mod surface;

#[cfg(test)]
mod test_support;

pub use config::{ConfigError, DashboardConfig};
pub use crash_stats_dashboard_models::FilterSet;
pub use fetch::{DataSource, FetchError, HttpDataSource};
pub use filters::{ConfigurationError, FilterReader};
pub use headless::{HeadlessPage, PageSnapshot};
pub use orchestrator::{CycleReport, Dashboard, Page, PageContext, RefreshState, SurfaceOutcome};

use thiserror::Error;

/// Errors that abort a dashboard operation.
///
/// Fetch failures inside a refresh cycle are rendered on the affected
/// surface and never surface here; only failures outside a cycle (and
/// missing controls, which break every cycle) do.
#[derive(Debug, Error)]
pub enum DashboardError {
    /// A bound control is missing from the page.
    #[error("Configuration error: {0}")]
    Configuration(#[from] ConfigurationError),

    /// A request made outside a refresh cycle failed.
    #[error("Fetch error: {0}")]
    Fetch(#[from] FetchError),

    /// The configuration could not be loaded.
    #[error("Config error: {0}")]
    Config(#[from] ConfigError),
}
