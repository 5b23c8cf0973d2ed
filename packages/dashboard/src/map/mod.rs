//! Map rendering.
//!
//! A page owns one [`MapContext`], which wraps the page's [`MapSurface`]
//! and tracks the layers currently on it: at most one heat layer, one
//! cluster layer, one choropleth layer, and one search marker. Every render
//! removes the layer it replaces before adding the new one, so nothing
//! leaks across refresh cycles.
//!
//! Messages shown in the map frame are notices owned by a
//! [`FrameSubject`]. A notice stays up until the next successful render of
//! the same subject, so one layer recovering never hides another layer's
//! error.

pub mod choropleth;
pub mod cluster;
pub mod search;

use crash_stats_dashboard_models::{HeatPoint, LatLng};
use geojson::{FeatureCollection, GeoJson};
use serde::Serialize;

use crate::config::{HeatLayerOptions, MapOptions};
use crate::format::escape_html;
use crate::orchestrator::SurfaceOutcome;
use crate::surface::{FrameContent, LayerId, MapSurface, ZoomTarget};

pub use choropleth::BeatRegion;

/// Frame message shown when a map request returned no rows.
pub const NO_MAP_DATA_MESSAGE: &str = "No data available for selected filters";

/// Errors reading a `GeoJSON` map response.
#[derive(Debug, thiserror::Error)]
pub enum GeoJsonError {
    /// The document is not valid `GeoJSON`.
    #[error("Invalid GeoJSON: {0}")]
    GeoJson(#[from] geojson::Error),

    /// The document is valid `GeoJSON` but not a `FeatureCollection`.
    #[error("Expected a FeatureCollection")]
    NotACollection,
}

/// Parses `value` as a `GeoJSON` `FeatureCollection`.
pub(crate) fn feature_collection(
    value: serde_json::Value,
) -> Result<FeatureCollection, GeoJsonError> {
    match GeoJson::from_json_value(value)? {
        GeoJson::FeatureCollection(collection) => Ok(collection),
        _ => Err(GeoJsonError::NotACollection),
    }
}

/// A point marker with a popup.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Marker {
    /// Marker position.
    pub position: LatLng,
    /// Popup HTML.
    pub popup: String,
    /// Whether the popup opens immediately.
    pub open_popup: bool,
}

/// A layer that can be added to a [`MapSurface`].
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum MapLayer {
    /// Weighted heatmap.
    Heat {
        /// Heat points.
        points: Vec<HeatPoint>,
        /// Rendering options.
        options: HeatLayerOptions,
    },
    /// Clustered markers.
    Cluster {
        /// Individual markers to cluster.
        markers: Vec<Marker>,
    },
    /// Filled beat polygons shaded by hit-and-run count.
    Choropleth {
        /// One entry per beat.
        regions: Vec<BeatRegion>,
    },
    /// A single marker.
    Marker(Marker),
}

/// Layers currently on the map.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MapLayerState {
    /// Active heat layer.
    pub heat: Option<LayerId>,
    /// Active cluster layer.
    pub cluster: Option<LayerId>,
    /// Active choropleth layer.
    pub choropleth: Option<LayerId>,
    /// Active search marker.
    pub marker: Option<LayerId>,
}

/// What a frame notice is about.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameSubject {
    /// The heat layer.
    Heat,
    /// The cluster layer.
    Cluster,
    /// The choropleth layer.
    Choropleth,
    /// Street search.
    Search,
    /// A backend-rendered map document.
    Document,
}

/// The base map of a page and the layers on it.
pub struct MapContext {
    surface: Box<dyn MapSurface>,
    layers: MapLayerState,
    options: MapOptions,
    /// Notices in the order they were posted; the latest one is shown.
    notices: Vec<(FrameSubject, String)>,
    document: Option<String>,
}

impl MapContext {
    /// Wraps a map surface with no layers.
    #[must_use]
    pub fn new(surface: Box<dyn MapSurface>, options: MapOptions) -> Self {
        Self {
            surface,
            layers: MapLayerState::default(),
            options,
            notices: Vec::new(),
            document: None,
        }
    }

    /// Returns the active layers.
    #[must_use]
    pub const fn layers(&self) -> MapLayerState {
        self.layers
    }

    /// Returns the map options.
    #[must_use]
    pub const fn options(&self) -> &MapOptions {
        &self.options
    }

    /// Restores the default view and removes the search marker.
    pub fn reset_view(&mut self) {
        self.surface
            .set_view(self.options.center, self.options.zoom);
        if let Some(marker) = self.layers.marker.take() {
            self.surface.remove_layer(marker);
        }
    }

    /// Replaces the heat layer with `points`.
    ///
    /// An empty point set removes the layer and shows the no-data message.
    pub fn render_heatmap(&mut self, points: Vec<HeatPoint>) -> SurfaceOutcome {
        if let Some(previous) = self.layers.heat.take() {
            self.surface.remove_layer(previous);
        }

        if points.is_empty() {
            self.show_message(FrameSubject::Heat, NO_MAP_DATA_MESSAGE);
            return SurfaceOutcome::NoData;
        }

        log::debug!("Rendering heat layer with {} points", points.len());
        let layer = self.surface.add_layer(MapLayer::Heat {
            points,
            options: self.options.heat,
        });
        self.layers.heat = Some(layer);
        self.clear_notice(FrameSubject::Heat);
        SurfaceOutcome::Rendered
    }

    /// Replaces the cluster layer with `markers`.
    pub fn render_clusters(&mut self, markers: Vec<Marker>) -> SurfaceOutcome {
        if let Some(previous) = self.layers.cluster.take() {
            self.surface.remove_layer(previous);
        }

        if markers.is_empty() {
            self.show_message(FrameSubject::Cluster, NO_MAP_DATA_MESSAGE);
            return SurfaceOutcome::NoData;
        }

        log::debug!("Rendering cluster layer with {} markers", markers.len());
        let layer = self.surface.add_layer(MapLayer::Cluster { markers });
        self.layers.cluster = Some(layer);
        self.clear_notice(FrameSubject::Cluster);
        SurfaceOutcome::Rendered
    }

    /// Replaces the choropleth layer with `regions`.
    pub fn render_choropleth(&mut self, regions: Vec<BeatRegion>) -> SurfaceOutcome {
        if let Some(previous) = self.layers.choropleth.take() {
            self.surface.remove_layer(previous);
        }

        if regions.is_empty() {
            self.show_message(FrameSubject::Choropleth, NO_MAP_DATA_MESSAGE);
            return SurfaceOutcome::NoData;
        }

        log::debug!("Rendering choropleth layer with {} beats", regions.len());
        let layer = self.surface.add_layer(MapLayer::Choropleth { regions });
        self.layers.choropleth = Some(layer);
        self.clear_notice(FrameSubject::Choropleth);
        SurfaceOutcome::Rendered
    }

    /// Recenters on `target` and replaces the search marker with one at
    /// its position, popup open.
    pub fn focus(&mut self, target: &ZoomTarget) {
        self.surface
            .set_view(target.position, self.options.focus_zoom);
        if let Some(previous) = self.layers.marker.take() {
            self.surface.remove_layer(previous);
        }
        let layer = self.surface.add_layer(MapLayer::Marker(Marker {
            position: target.position,
            popup: format!("<strong>{}</strong>", escape_html(&target.name)),
            open_popup: true,
        }));
        self.layers.marker = Some(layer);
    }

    /// Points the map frame at an externally rendered document.
    pub fn show_document(&mut self, url: &str) {
        self.document = Some(url.to_string());
        self.clear_notice(FrameSubject::Document);
    }

    /// Posts an inline message about `subject` in the map frame, replacing
    /// any earlier notice about the same subject.
    pub fn show_message(&mut self, subject: FrameSubject, message: &str) {
        self.notices.retain(|(owner, _)| *owner != subject);
        self.notices.push((subject, message.to_string()));
        self.update_frame();
    }

    /// Shows an inline error about `subject` in the map frame so the map is
    /// never left blank after a failed request.
    pub fn show_error(&mut self, subject: FrameSubject, message: &str) -> SurfaceOutcome {
        self.show_message(subject, message);
        SurfaceOutcome::Unavailable
    }

    /// Takes down the notice about `subject`, if any.
    pub fn clear_notice(&mut self, subject: FrameSubject) {
        self.notices.retain(|(owner, _)| *owner != subject);
        self.update_frame();
    }

    /// Returns the notice currently posted about `subject`.
    #[must_use]
    pub fn notice(&self, subject: FrameSubject) -> Option<&str> {
        self.notices
            .iter()
            .find(|(owner, _)| *owner == subject)
            .map(|(_, message)| message.as_str())
    }

    fn update_frame(&mut self) {
        let content = match (self.notices.last(), &self.document) {
            (Some((_, message)), _) => FrameContent::Message(message.clone()),
            (None, Some(url)) => FrameContent::Url(url.clone()),
            (None, None) => FrameContent::Blank,
        };
        self.surface.show_frame(content);
    }
}
