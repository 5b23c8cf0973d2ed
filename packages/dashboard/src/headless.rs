//! A recording page with no UI.
//!
//! [`HeadlessPage`] implements every render-target trait by writing into
//! shared in-memory state. Clones share that state, so one page can back
//! the document, the chart surface, and the map of a [`PageContext`] while
//! the caller keeps a handle to inspect it. The CLI prints its
//! [`PageSnapshot`] as JSON.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crash_stats_dashboard_models::LatLng;
use serde::Serialize;

use crate::chart::{ChartConfig, ChartRenderer};
use crate::config::MapOptions;
use crate::map::{MapContext, MapLayer};
use crate::orchestrator::PageContext;
use crate::surface::{
    ChartSurface, Document, FrameContent, LayerId, MapSurface, ResultsView,
};

/// A form control.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ControlSnapshot {
    /// Current value.
    pub value: String,
    /// Options, for select controls.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub options: Vec<String>,
}

/// Lifecycle counters for one chart surface.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ChartStats {
    /// Chart instances created.
    pub created: usize,
    /// Chart instances destroyed.
    pub destroyed: usize,
    /// Placeholders drawn.
    pub placeholders: usize,
    /// Instances currently alive.
    pub live: usize,
    /// Highest number of simultaneously live instances.
    pub max_live: usize,
}

/// State of the base map.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct MapSnapshot {
    /// Last center set, if any.
    pub center: Option<LatLng>,
    /// Last zoom set, if any.
    pub zoom: Option<u8>,
    /// Layers currently on the map.
    pub layers: BTreeMap<LayerId, MapLayer>,
    /// Frame overlay.
    pub frame: FrameContent,
}

/// Everything a [`HeadlessPage`] has recorded.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PageSnapshot {
    /// Form controls by DOM id.
    pub controls: BTreeMap<String, ControlSnapshot>,
    /// Text content by element id.
    pub texts: BTreeMap<String, String>,
    /// Table body rows by element id.
    pub tables: BTreeMap<String, Vec<Vec<String>>>,
    /// Result lists by element id.
    pub results: BTreeMap<String, ResultsView>,
    /// Live chart configurations by surface id.
    pub charts: BTreeMap<String, ChartConfig>,
    /// Placeholder text currently drawn, by surface id.
    pub placeholders: BTreeMap<String, String>,
    /// Chart lifecycle counters by surface id.
    pub chart_stats: BTreeMap<String, ChartStats>,
    /// Base map state.
    pub map: MapSnapshot,
}

#[derive(Debug, Default)]
struct HeadlessState {
    snapshot: PageSnapshot,
    next_layer: u64,
}

/// In-memory page recording every surface mutation.
#[derive(Debug, Clone, Default)]
pub struct HeadlessPage {
    state: Arc<Mutex<HeadlessState>>,
}

impl HeadlessPage {
    /// Creates a page with no controls.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style variant of [`Self::set_control`].
    #[must_use]
    pub fn with_control(self, control_id: &str, value: &str) -> Self {
        self.set_control(control_id, value);
        self
    }

    /// Adds a select control with `options`, selecting `value`.
    #[must_use]
    pub fn with_select(self, control_id: &str, value: &str, options: &[&str]) -> Self {
        {
            let mut state = self.lock();
            let control = state
                .snapshot
                .controls
                .entry(control_id.to_string())
                .or_default();
            control.value = value.to_string();
            control.options = options.iter().map(ToString::to_string).collect();
        }
        self
    }

    /// Creates the control if needed and sets its value, as a user typing
    /// or picking an option would.
    pub fn set_control(&self, control_id: &str, value: &str) {
        self.lock()
            .snapshot
            .controls
            .entry(control_id.to_string())
            .or_default()
            .value = value.to_string();
    }

    /// Builds a [`PageContext`] whose document, charts, and map all record
    /// into this page.
    #[must_use]
    pub fn context(&self, map_options: MapOptions) -> PageContext {
        PageContext::new(
            Box::new(self.clone()),
            ChartRenderer::new(Box::new(self.clone())),
            MapContext::new(Box::new(self.clone()), map_options),
        )
    }

    /// Returns a copy of everything recorded so far.
    #[must_use]
    pub fn snapshot(&self) -> PageSnapshot {
        self.lock().snapshot.clone()
    }

    fn lock(&self) -> MutexGuard<'_, HeadlessState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Document for HeadlessPage {
    fn control_value(&self, control_id: &str) -> Option<String> {
        self.lock()
            .snapshot
            .controls
            .get(control_id)
            .map(|control| control.value.clone())
    }

    fn set_control_value(&mut self, control_id: &str, value: &str) {
        self.set_control(control_id, value);
    }

    fn set_options(&mut self, control_id: &str, options: &[String]) {
        let mut state = self.lock();
        let control = state
            .snapshot
            .controls
            .entry(control_id.to_string())
            .or_default();
        control.options = options.to_vec();
        // A select cannot hold a value it does not offer.
        if !control.options.contains(&control.value) {
            control.value = control.options.first().cloned().unwrap_or_default();
        }
    }

    fn set_text(&mut self, element_id: &str, text: &str) {
        self.lock()
            .snapshot
            .texts
            .insert(element_id.to_string(), text.to_string());
    }

    fn set_table_rows(&mut self, element_id: &str, rows: &[Vec<String>]) {
        self.lock()
            .snapshot
            .tables
            .insert(element_id.to_string(), rows.to_vec());
    }

    fn set_results(&mut self, element_id: &str, results: ResultsView) {
        self.lock()
            .snapshot
            .results
            .insert(element_id.to_string(), results);
    }
}

impl ChartSurface for HeadlessPage {
    fn create(&mut self, surface_id: &str, config: ChartConfig) {
        let mut state = self.lock();
        let snapshot = &mut state.snapshot;
        snapshot.placeholders.remove(surface_id);
        snapshot.charts.insert(surface_id.to_string(), config);

        let stats = snapshot
            .chart_stats
            .entry(surface_id.to_string())
            .or_default();
        stats.created += 1;
        stats.live += 1;
        stats.max_live = stats.max_live.max(stats.live);
    }

    fn destroy(&mut self, surface_id: &str) {
        let mut state = self.lock();
        let snapshot = &mut state.snapshot;
        snapshot.charts.remove(surface_id);

        let stats = snapshot
            .chart_stats
            .entry(surface_id.to_string())
            .or_default();
        stats.destroyed += 1;
        stats.live = stats.live.saturating_sub(1);
    }

    fn show_placeholder(&mut self, surface_id: &str, message: &str) {
        let mut state = self.lock();
        let snapshot = &mut state.snapshot;
        snapshot
            .placeholders
            .insert(surface_id.to_string(), message.to_string());
        snapshot
            .chart_stats
            .entry(surface_id.to_string())
            .or_default()
            .placeholders += 1;
    }
}

impl MapSurface for HeadlessPage {
    fn set_view(&mut self, center: LatLng, zoom: u8) {
        let mut state = self.lock();
        state.snapshot.map.center = Some(center);
        state.snapshot.map.zoom = Some(zoom);
    }

    fn add_layer(&mut self, layer: MapLayer) -> LayerId {
        let mut state = self.lock();
        state.next_layer += 1;
        let id = LayerId(state.next_layer);
        state.snapshot.map.layers.insert(id, layer);
        id
    }

    fn remove_layer(&mut self, layer: LayerId) {
        if self.lock().snapshot.map.layers.remove(&layer).is_none() {
            log::warn!("Removing unknown map layer {}", layer.0);
        }
    }

    fn show_frame(&mut self, content: FrameContent) {
        self.lock().snapshot.map.frame = content;
    }
}
