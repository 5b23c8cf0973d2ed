//! Render-target capabilities.
//!
//! The pipeline never touches a concrete UI. Pages read controls and write
//! output through [`Document`], draw charts through [`ChartSurface`], and
//! manage map layers through [`MapSurface`]. A browser binding, a native
//! UI, or the recording [`crate::headless::HeadlessPage`] can implement
//! them.

use crash_stats_dashboard_models::LatLng;
use serde::Serialize;

use crate::chart::ChartConfig;
use crate::map::MapLayer;

/// Form controls and text output of a page.
pub trait Document: Send {
    /// Returns the current value of the control with DOM id `control_id`,
    /// or `None` if the page has no such control.
    fn control_value(&self, control_id: &str) -> Option<String>;

    /// Sets the value of a control (e.g. clearing a search box).
    fn set_control_value(&mut self, control_id: &str, value: &str);

    /// Replaces the options of a select control.
    fn set_options(&mut self, control_id: &str, options: &[String]);

    /// Replaces the text content of an element.
    fn set_text(&mut self, element_id: &str, text: &str);

    /// Replaces the body rows of a table.
    fn set_table_rows(&mut self, element_id: &str, rows: &[Vec<String>]);

    /// Replaces the content of a search results list.
    fn set_results(&mut self, element_id: &str, results: ResultsView);
}

/// Content of a search results list.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum ResultsView {
    /// Nothing shown.
    Cleared,
    /// A single informational line (e.g. "No streets found.").
    Message(String),
    /// Selectable result entries.
    Items(Vec<ResultItem>),
}

/// A selectable search result.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResultItem {
    /// Primary text.
    pub title: String,
    /// Secondary text.
    pub detail: String,
    /// Where selecting this result moves the map, if anywhere.
    pub target: Option<ZoomTarget>,
}

/// A named location the map can focus on.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ZoomTarget {
    /// Name shown in the marker popup.
    pub name: String,
    /// Marker position.
    pub position: LatLng,
}

/// Chart canvases of a page, addressed by surface id.
pub trait ChartSurface: Send {
    /// Creates a chart instance on `surface_id`.
    fn create(&mut self, surface_id: &str, config: ChartConfig);

    /// Destroys the chart instance on `surface_id`.
    fn destroy(&mut self, surface_id: &str);

    /// Draws a textual placeholder on `surface_id` instead of a chart.
    fn show_placeholder(&mut self, surface_id: &str, message: &str);
}

/// Handle to a layer added to a [`MapSurface`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct LayerId(pub u64);

/// What the map frame shows on top of (or instead of) the base map.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum FrameContent {
    /// No overlay.
    #[default]
    Blank,
    /// An external document loaded into the frame.
    Url(String),
    /// An inline message document.
    Message(String),
}

/// The single base map of a page.
pub trait MapSurface: Send {
    /// Recenters the map.
    fn set_view(&mut self, center: LatLng, zoom: u8);

    /// Adds a layer and returns its handle.
    fn add_layer(&mut self, layer: MapLayer) -> LayerId;

    /// Removes a previously added layer.
    fn remove_layer(&mut self, layer: LayerId);

    /// Replaces the map frame overlay.
    fn show_frame(&mut self, content: FrameContent);
}
