#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Runs a `CrashStats` dashboard page headlessly and prints what it drew.
//!
//! ```text
//! crash_stats environment [--month 3] [--weather RAIN] [--speed 30] [--lighting DAYLIGHT]
//! crash_stats location [--search "state st"] [--metric injuries] [--select 0] [--crash-search speeding]
//! crash_stats offense [--start-date 2024-01-01] [--end-date 2024-06-30] [--region North] [--beat 1834] [--cause SPEEDING]
//! ```
//!
//! The page is loaded against the configured backend, every follow-up
//! event is dispatched, and the recorded surfaces are printed as JSON.

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use crash_stats_dashboard::pages::{
    EnvironmentPage, LocationPage, OffensePage, environment, location, offense,
};
use crash_stats_dashboard::surface::ResultsView;
use crash_stats_dashboard::{
    CycleReport, Dashboard, DashboardConfig, HeadlessPage, HttpDataSource, PageSnapshot,
};
use serde::Serialize;

#[derive(Parser)]
#[command(name = "crash_stats", about = "Render CrashStats dashboard pages headlessly")]
struct Cli {
    /// Path to a TOML config file (defaults to the embedded config)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Backend base URL, overriding the config and `CRASH_STATS_API_URL`
    #[arg(long)]
    base_url: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Crashes by speed limit, weather, and lighting
    Environment {
        /// Month (1-12)
        #[arg(long, default_value = "All")]
        month: String,
        /// Weather condition
        #[arg(long, default_value = "All")]
        weather: String,
        /// Posted speed limit
        #[arg(long, default_value = "All")]
        speed: String,
        /// Lighting condition
        #[arg(long, default_value = "All")]
        lighting: String,
    },
    /// Crash heatmap with street and crash-record search
    Location {
        /// Street search query
        #[arg(long)]
        search: Option<String>,
        /// Metric used to rank streets (crashes, injuries, vehicles)
        #[arg(long, default_value = "crashes")]
        metric: String,
        /// Index of the street result to zoom to
        #[arg(long)]
        select: Option<usize>,
        /// Crash-record search query
        #[arg(long)]
        crash_search: Option<String>,
    },
    /// Contributing causes, hit-and-runs, and cause/severity flows
    Offense {
        /// Inclusive start date (YYYY-MM-DD)
        #[arg(long, default_value = "")]
        start_date: String,
        /// Inclusive end date (YYYY-MM-DD)
        #[arg(long, default_value = "")]
        end_date: String,
        /// Region
        #[arg(long, default_value = "All")]
        region: String,
        /// Police beat
        #[arg(long, default_value = "All")]
        beat: String,
        /// Restrict the sankey diagram to one cause
        #[arg(long)]
        cause: Option<String>,
    },
}

/// What gets printed.
#[derive(Serialize)]
struct Output {
    page: &'static str,
    reports: Vec<CycleReport>,
    snapshot: PageSnapshot,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    pretty_env_logger::init_custom_env("RUST_LOG");
    let cli = Cli::parse();

    let mut config = DashboardConfig::load(cli.config.as_deref())?;
    if let Some(base_url) = cli.base_url {
        config.base_url = base_url;
    }
    log::info!("Using backend at {}", config.base_url);

    let source = Box::new(HttpDataSource::new(config.base_url.clone()));

    let output = match cli.command {
        Commands::Environment {
            month,
            weather,
            speed,
            lighting,
        } => {
            let page = HeadlessPage::new()
                .with_control(environment::MONTH_CONTROL, &month)
                .with_control(environment::WEATHER_CONTROL, &weather)
                .with_control(environment::SPEED_CONTROL, &speed)
                .with_control(environment::LIGHTING_CONTROL, &lighting);
            let dashboard = Dashboard::new(EnvironmentPage::new(), source, page.context(config.map));

            let report = dashboard.load().await?;
            Output {
                page: "environment",
                reports: vec![report],
                snapshot: page.snapshot(),
            }
        }
        Commands::Location {
            search,
            metric,
            select,
            crash_search,
        } => {
            let page = HeadlessPage::new()
                .with_control(location::SEARCH_CONTROL, "")
                .with_control(location::METRIC_CONTROL, &metric)
                .with_control(location::CRASH_SEARCH_CONTROL, "");
            let dashboard = Dashboard::new(
                LocationPage::new(config.search),
                source,
                page.context(config.map),
            );

            let mut reports = vec![dashboard.load().await?];
            if let Some(search) = search {
                page.set_control(location::SEARCH_CONTROL, &search);
                reports.extend(dashboard.on_change(location::SEARCH_CONTROL).await?);
            }
            if let Some(index) = select {
                select_street(&dashboard, &page, index);
            }
            if let Some(query) = crash_search {
                page.set_control(location::CRASH_SEARCH_CONTROL, &query);
                reports.extend(dashboard.on_change(location::CRASH_SEARCH_CONTROL).await?);
            }

            Output {
                page: "location",
                reports,
                snapshot: page.snapshot(),
            }
        }
        Commands::Offense {
            start_date,
            end_date,
            region,
            beat,
            cause,
        } => {
            let page = HeadlessPage::new()
                .with_control(offense::START_DATE_CONTROL, &start_date)
                .with_control(offense::END_DATE_CONTROL, &end_date)
                .with_control(offense::REGION_CONTROL, &region)
                .with_control(offense::BEAT_CONTROL, &beat);
            let dashboard = Dashboard::new(
                OffensePage::new(config.sankey),
                source,
                page.context(config.map),
            );
            dashboard.page().set_drill_down(cause);

            let report = dashboard.load().await?;
            Output {
                page: "offense",
                reports: vec![report],
                snapshot: page.snapshot(),
            }
        }
    };

    println!("{}", serde_json::to_string_pretty(&output)?);

    Ok(())
}

/// Zooms to the `index`th listed street, as clicking it would.
fn select_street(dashboard: &Dashboard<LocationPage>, page: &HeadlessPage, index: usize) {
    let snapshot = page.snapshot();
    let Some(ResultsView::Items(items)) = snapshot.results.get(location::STREET_RESULTS) else {
        log::warn!("No street results to select from");
        return;
    };
    match items.get(index) {
        Some(item) => {
            log::info!("Selecting {}", item.title);
            dashboard.page().select(dashboard.context(), item);
        }
        None => log::warn!("Street result {index} out of range ({} listed)", items.len()),
    }
}
