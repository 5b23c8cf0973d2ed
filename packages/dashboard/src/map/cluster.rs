//! `GeoJSON` point features to clustered markers.

use crash_stats_dashboard_models::LatLng;
use geojson::Feature;

use super::{GeoJsonError, Marker, feature_collection};
use crate::chart::UNKNOWN_LABEL;
use crate::format::{display_date, escape_html};

/// Builds one marker per point feature of a `FeatureCollection`.
///
/// Features without a point geometry are skipped. Each popup shows the
/// feature's `cause` and `date` properties.
///
/// # Errors
///
/// Returns [`GeoJsonError`] if `value` is not a `GeoJSON`
/// `FeatureCollection`.
pub fn markers_from_geojson(value: serde_json::Value) -> Result<Vec<Marker>, GeoJsonError> {
    let collection = feature_collection(value)?;

    let total = collection.features.len();
    let markers: Vec<Marker> = collection
        .features
        .iter()
        .filter_map(|feature| {
            point_position(feature).map(|position| Marker {
                position,
                popup: popup_html(feature),
                open_popup: false,
            })
        })
        .collect();

    if markers.len() < total {
        log::debug!(
            "Skipped {} features without point geometry",
            total - markers.len()
        );
    }

    Ok(markers)
}

/// Returns the position of a point feature. `GeoJSON` orders coordinates
/// as `[lng, lat]`.
fn point_position(feature: &Feature) -> Option<LatLng> {
    let geometry = feature.geometry.as_ref()?;
    match &geometry.value {
        geojson::Value::Point(coords) if coords.len() >= 2 => {
            Some(LatLng::new(coords[1], coords[0]))
        }
        _ => None,
    }
}

fn popup_html(feature: &Feature) -> String {
    let cause = feature
        .property("cause")
        .and_then(serde_json::Value::as_str)
        .filter(|cause| !cause.trim().is_empty())
        .unwrap_or(UNKNOWN_LABEL);
    let date = feature
        .property("date")
        .and_then(serde_json::Value::as_str)
        .map(display_date);

    match date {
        Some(date) => format!(
            "<strong>{}</strong><br>{}",
            escape_html(cause),
            escape_html(&date)
        ),
        None => format!("<strong>{}</strong>", escape_html(cause)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builds_markers_with_popups() {
        let markers = markers_from_geojson(serde_json::json!({
            "type": "FeatureCollection",
            "features": [
                {
                    "type": "Feature",
                    "properties": {"cause": "FAILING TO YIELD", "date": "2024-06-01"},
                    "geometry": {"type": "Point", "coordinates": [-87.63, 41.88]}
                },
                {
                    "type": "Feature",
                    "properties": {"cause": null},
                    "geometry": {"type": "Point", "coordinates": [-87.6, 41.9]}
                },
                {
                    "type": "Feature",
                    "properties": {},
                    "geometry": null
                }
            ]
        }))
        .unwrap();

        assert_eq!(markers.len(), 2);
        assert_eq!(markers[0].position, LatLng::new(41.88, -87.63));
        assert_eq!(
            markers[0].popup,
            "<strong>FAILING TO YIELD</strong><br>01/06/2024"
        );
        assert_eq!(markers[1].popup, "<strong>Unknown</strong>");
    }

    #[test]
    fn rejects_non_collections() {
        let err = markers_from_geojson(serde_json::json!({
            "type": "Point",
            "coordinates": [-87.63, 41.88]
        }))
        .unwrap_err();
        assert!(matches!(err, GeoJsonError::NotACollection));

        assert!(markers_from_geojson(serde_json::json!([1, 2, 3])).is_err());
    }
}
