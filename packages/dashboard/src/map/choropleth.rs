//! `GeoJSON` beat polygons to a shaded choropleth layer.

use crash_stats_dashboard_models::LatLng;
use geojson::Feature;
use serde::Serialize;

use super::{GeoJsonError, feature_collection};
use crate::chart::UNKNOWN_LABEL;
use crate::format::escape_html;

/// Fill colors from no hit-and-runs to the busiest beat.
pub const FILL_RAMP: [&str; 5] = ["#F3F4F6", "#FECACA", "#F87171", "#DC2626", "#7F1D1D"];

/// Highest index into [`FILL_RAMP`].
const TOP_STEP: u64 = 4;

/// One police beat on the choropleth.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BeatRegion {
    /// Beat id.
    pub beat: String,
    /// Hit-and-run crashes in the beat.
    pub hit_and_runs: u64,
    /// Polygons, each a list of rings, each a list of positions.
    pub polygons: Vec<Vec<Vec<LatLng>>>,
    /// Fill color.
    pub fill: String,
    /// Popup HTML.
    pub popup: String,
}

/// Builds one region per polygon feature of a `FeatureCollection`.
///
/// Beats are read from the `beat_id` property (string or number) and
/// counts from `hit_and_run_count`, missing counts being zero. Features
/// without a polygon geometry are skipped. Fills are scaled to the largest
/// count in the collection.
///
/// # Errors
///
/// Returns [`GeoJsonError`] if `value` is not a `GeoJSON`
/// `FeatureCollection`.
pub fn regions_from_geojson(value: serde_json::Value) -> Result<Vec<BeatRegion>, GeoJsonError> {
    let collection = feature_collection(value)?;

    let shapes: Vec<(String, u64, Vec<Vec<Vec<LatLng>>>)> = collection
        .features
        .iter()
        .filter_map(|feature| {
            polygons(feature).map(|polygons| (beat_id(feature), hit_and_runs(feature), polygons))
        })
        .collect();

    if shapes.len() < collection.features.len() {
        log::debug!(
            "Skipped {} features without polygon geometry",
            collection.features.len() - shapes.len()
        );
    }

    let max = shapes.iter().map(|(_, count, _)| *count).max().unwrap_or(0);

    Ok(shapes
        .into_iter()
        .map(|(beat, count, polygons)| BeatRegion {
            popup: format!(
                "<strong>Beat {}</strong><br>{count} hit-and-runs",
                escape_html(&beat)
            ),
            fill: fill_for(count, max).to_string(),
            beat,
            hit_and_runs: count,
            polygons,
        })
        .collect())
}

/// Picks the fill for `count` on a ramp topped by `max`. Any non-zero
/// count gets at least the first shaded step.
#[must_use]
pub fn fill_for(count: u64, max: u64) -> &'static str {
    if count == 0 || max == 0 {
        return FILL_RAMP[0];
    }
    let step = (u128::from(count.min(max)) * u128::from(TOP_STEP)).div_ceil(u128::from(max));
    usize::try_from(step).map_or(FILL_RAMP[FILL_RAMP.len() - 1], |step| {
        FILL_RAMP[step.min(FILL_RAMP.len() - 1)]
    })
}

fn polygons(feature: &Feature) -> Option<Vec<Vec<Vec<LatLng>>>> {
    let geometry = feature.geometry.as_ref()?;
    match &geometry.value {
        geojson::Value::Polygon(rings) => Some(vec![polygon(rings)]),
        geojson::Value::MultiPolygon(polygons) => Some(polygons.iter().map(|p| polygon(p)).collect()),
        _ => None,
    }
}

/// `GeoJSON` orders coordinates as `[lng, lat]`.
fn polygon(rings: &[Vec<Vec<f64>>]) -> Vec<Vec<LatLng>> {
    rings
        .iter()
        .map(|ring| {
            ring.iter()
                .filter(|position| position.len() >= 2)
                .map(|position| LatLng::new(position[1], position[0]))
                .collect()
        })
        .collect()
}

fn beat_id(feature: &Feature) -> String {
    match feature.property("beat_id") {
        Some(serde_json::Value::String(beat)) if !beat.trim().is_empty() => beat.trim().to_string(),
        Some(serde_json::Value::Number(beat)) => beat.to_string(),
        _ => UNKNOWN_LABEL.to_string(),
    }
}

fn hit_and_runs(feature: &Feature) -> u64 {
    feature
        .property("hit_and_run_count")
        .and_then(serde_json::Value::as_u64)
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn square(beat: serde_json::Value, count: Option<u64>) -> serde_json::Value {
        let mut properties = serde_json::json!({"beat_id": beat});
        if let Some(count) = count {
            properties["hit_and_run_count"] = serde_json::json!(count);
        }
        serde_json::json!({
            "type": "Feature",
            "properties": properties,
            "geometry": {
                "type": "Polygon",
                "coordinates": [[[-87.6, 41.8], [-87.5, 41.8], [-87.5, 41.9], [-87.6, 41.8]]]
            }
        })
    }

    #[test]
    fn builds_shaded_regions_from_beat_polygons() {
        let regions = regions_from_geojson(serde_json::json!({
            "type": "FeatureCollection",
            "features": [
                square(serde_json::json!("1834"), Some(20)),
                square(serde_json::json!(111), Some(5)),
                square(serde_json::json!("0222"), None),
                {
                    "type": "Feature",
                    "properties": {"beat_id": "999"},
                    "geometry": {"type": "Point", "coordinates": [-87.6, 41.8]}
                }
            ]
        }))
        .unwrap();

        assert_eq!(regions.len(), 3);
        assert_eq!(regions[0].beat, "1834");
        assert_eq!(regions[0].fill, FILL_RAMP[4]);
        assert_eq!(regions[0].popup, "<strong>Beat 1834</strong><br>20 hit-and-runs");
        assert_eq!(regions[0].polygons[0][0][0], LatLng::new(41.8, -87.6));
        assert_eq!(regions[1].beat, "111");
        assert_eq!(regions[1].fill, FILL_RAMP[1]);
        assert_eq!(regions[2].hit_and_runs, 0);
        assert_eq!(regions[2].fill, FILL_RAMP[0]);
    }

    #[test]
    fn multipolygons_keep_every_part() {
        let regions = regions_from_geojson(serde_json::json!({
            "type": "FeatureCollection",
            "features": [{
                "type": "Feature",
                "properties": {"beat_id": "421", "hit_and_run_count": 3},
                "geometry": {
                    "type": "MultiPolygon",
                    "coordinates": [
                        [[[-87.6, 41.8], [-87.5, 41.8], [-87.5, 41.9], [-87.6, 41.8]]],
                        [[[-87.4, 41.7], [-87.3, 41.7], [-87.3, 41.8], [-87.4, 41.7]]]
                    ]
                }
            }]
        }))
        .unwrap();

        assert_eq!(regions[0].polygons.len(), 2);
        assert_eq!(regions[0].polygons[1][0].len(), 4);
    }

    #[test]
    fn fill_steps_scale_to_the_busiest_beat() {
        assert_eq!(fill_for(0, 10), FILL_RAMP[0]);
        assert_eq!(fill_for(1, 10), FILL_RAMP[1]);
        assert_eq!(fill_for(5, 10), FILL_RAMP[2]);
        assert_eq!(fill_for(7, 10), FILL_RAMP[3]);
        assert_eq!(fill_for(10, 10), FILL_RAMP[4]);
        assert_eq!(fill_for(u64::MAX, u64::MAX), FILL_RAMP[4]);
        assert_eq!(fill_for(3, 0), FILL_RAMP[0]);
    }

    #[test]
    fn rejects_non_collections() {
        assert!(matches!(
            regions_from_geojson(serde_json::json!({"type": "Nope"})),
            Err(GeoJsonError::GeoJson(_))
        ));
    }
}
