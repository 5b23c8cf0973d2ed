//! Dashboard configuration.
//!
//! Settings are read from TOML. A default file is embedded at compile
//! time so the dashboard runs without any configuration on disk; the
//! backend URL can always be overridden via `CRASH_STATS_API_URL`.

use std::path::Path;

use crash_stats_dashboard_models::LatLng;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Environment variable overriding [`DashboardConfig::base_url`].
pub const API_URL_ENV: &str = "CRASH_STATS_API_URL";

/// Embedded default configuration.
const DEFAULT_CONFIG_TOML: &str = include_str!("../config/default.toml");

/// Errors that can occur while loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The configuration file could not be read.
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    /// The configuration file is not valid TOML for this schema.
    #[error("Invalid config: {0}")]
    Toml(#[from] toml::de::Error),
}

/// Top-level dashboard configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DashboardConfig {
    /// Base URL of the dashboard backend (scheme, host, optional port).
    pub base_url: String,
    /// Sankey diagram settings.
    pub sankey: SankeyConfig,
    /// Search box settings.
    pub search: SearchConfig,
    /// Base map settings.
    pub map: MapOptions,
}

impl Default for DashboardConfig {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:5000".to_string(),
            sankey: SankeyConfig::default(),
            search: SearchConfig::default(),
            map: MapOptions::default(),
        }
    }
}

impl DashboardConfig {
    /// Parses a configuration from TOML. Missing keys take their default
    /// values.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Toml`] if the input is not valid.
    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(s)?)
    }

    /// Loads configuration from `path`, or the embedded default when
    /// `path` is `None`, then applies the [`API_URL_ENV`] override.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if the file cannot be read or parsed.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut config = match path {
            Some(path) => {
                log::info!("Loading dashboard config from {}", path.display());
                Self::from_toml_str(&std::fs::read_to_string(path)?)?
            }
            None => Self::from_toml_str(DEFAULT_CONFIG_TOML)?,
        };

        if let Ok(url) = std::env::var(API_URL_ENV)
            && !url.trim().is_empty()
        {
            log::debug!("Using {API_URL_ENV}={url}");
            config.base_url = url;
        }

        Ok(config)
    }
}

/// Sankey diagram settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SankeyConfig {
    /// Number of causes kept before the rest collapse into "Other".
    pub top_n: usize,
}

impl Default for SankeyConfig {
    fn default() -> Self {
        Self { top_n: 10 }
    }
}

/// Search box settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    /// Minimum trimmed query length before a request is issued.
    pub min_chars: usize,
    /// Maximum number of street results listed.
    pub street_result_limit: usize,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            min_chars: 2,
            street_result_limit: 5,
        }
    }
}

/// Base map settings shared by every map mode.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MapOptions {
    /// Default map center.
    pub center: LatLng,
    /// Default zoom level.
    pub zoom: u8,
    /// Zoom level used when focusing a search result.
    pub focus_zoom: u8,
    /// Heat layer rendering options.
    pub heat: HeatLayerOptions,
}

impl Default for MapOptions {
    fn default() -> Self {
        Self {
            center: LatLng::new(41.8781, -87.6298),
            zoom: 11,
            focus_zoom: 15,
            heat: HeatLayerOptions::default(),
        }
    }
}

/// Heat layer rendering options.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HeatLayerOptions {
    /// Point radius in pixels.
    pub radius: u32,
    /// Blur radius in pixels.
    pub blur: u32,
    /// Minimum layer opacity.
    pub min_opacity: f64,
}

impl Default for HeatLayerOptions {
    fn default() -> Self {
        Self {
            radius: 12,
            blur: 20,
            min_opacity: 0.4,
        }
    }
}
