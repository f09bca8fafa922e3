#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Great-circle distance and `GeoJSON` helpers.
//!
//! Distances use the haversine formula over the GRS80 mean earth radius
//! (via the `geo` crate). Used by source coverage checks, the aggregator's
//! radius filter, and adapters that receive polygon geometries.

use geo::{Centroid as _, Distance as _, Haversine, Point};
use risk_radar_alert_models::GeoPoint;

fn to_point(p: &GeoPoint) -> Point<f64> {
    Point::new(p.longitude, p.latitude)
}

/// Great-circle distance between two points, in meters.
#[must_use]
pub fn distance_meters(a: &GeoPoint, b: &GeoPoint) -> f64 {
    Haversine.distance(to_point(a), to_point(b))
}

/// Returns `true` if `point` lies within `radius_meters` of `center`.
///
/// The boundary is inclusive: a point exactly `radius_meters` away is
/// inside.
#[must_use]
pub fn within_radius(center: &GeoPoint, point: &GeoPoint, radius_meters: f64) -> bool {
    distance_meters(center, point) <= radius_meters
}

/// Computes the centroid of a `GeoJSON` geometry.
///
/// Returns `None` for empty geometries or geometry types that cannot be
/// converted into `geo` types.
#[must_use]
pub fn geometry_centroid(geometry: &geojson::Geometry) -> Option<GeoPoint> {
    let geo_geom: geo::Geometry<f64> = geometry.clone().try_into().ok()?;
    let centroid = geo_geom.centroid()?;
    Some(GeoPoint::new(centroid.y(), centroid.x()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_distance_for_same_point() {
        let p = GeoPoint::new(47.6062, -122.3321);
        assert!(distance_meters(&p, &p).abs() < f64::EPSILON);
    }

    #[test]
    fn seattle_to_portland_is_roughly_234_km() {
        let seattle = GeoPoint::new(47.6062, -122.3321);
        let portland = GeoPoint::new(45.5152, -122.6784);
        let km = distance_meters(&seattle, &portland) / 1000.0;
        assert!((230.0..240.0).contains(&km), "got {km} km");
    }

    #[test]
    fn radius_boundary_is_inclusive() {
        let center = GeoPoint::new(40.7128, -74.0060);
        let point = GeoPoint::new(40.7228, -74.0060);
        let exact = distance_meters(&center, &point);
        assert!(within_radius(&center, &point, exact));
        assert!(!within_radius(&center, &point, exact - 1.0));
    }

    #[test]
    fn centroid_of_square_polygon() {
        let geometry = geojson::Geometry::new(geojson::Value::Polygon(vec![vec![
            vec![-1.0, -1.0],
            vec![1.0, -1.0],
            vec![1.0, 1.0],
            vec![-1.0, 1.0],
            vec![-1.0, -1.0],
        ]]));
        let c = geometry_centroid(&geometry).unwrap();
        assert!(c.latitude.abs() < 1e-9);
        assert!(c.longitude.abs() < 1e-9);
    }
}
