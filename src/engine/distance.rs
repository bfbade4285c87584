use crate::models::{Coordinates, Location, LocationScope, ZoneDirectory};

/// Earth's radius in miles
const EARTH_RADIUS_MILES: f64 = 3958.8;

/// Miles per degree of latitude
const MILES_PER_DEGREE: f64 = 69.0;

/// Slack on prefilter boxes so edge-of-radius pairs always reach the exact check
const PREFILTER_MARGIN: f64 = 1.1;

/// Geospatial bounding box
#[derive(Debug, Clone, Copy)]
pub struct BoundingBox {
    pub min_lat: f64,
    pub max_lat: f64,
    pub min_lon: f64,
    pub max_lon: f64,
}

/// Calculate the Haversine distance between two points in miles
///
/// # Arguments
/// * `lat1` - Latitude of first point in degrees
/// * `lon1` - Longitude of first point in degrees
/// * `lat2` - Latitude of second point in degrees
/// * `lon2` - Longitude of second point in degrees
#[inline]
pub fn haversine_miles(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    let lat1_rad = lat1.to_radians();
    let lat2_rad = lat2.to_radians();
    let delta_lat = (lat2 - lat1).to_radians();
    let delta_lon = (lon2 - lon1).to_radians();

    let a = (delta_lat / 2.0).sin().powi(2)
        + lat1_rad.cos() * lat2_rad.cos() * (delta_lon / 2.0).sin().powi(2);
    let c = 2.0 * a.sqrt().atan2((1.0 - a).sqrt());

    EARTH_RADIUS_MILES * c
}

#[inline]
pub fn distance_between(a: Coordinates, b: Coordinates) -> f64 {
    haversine_miles(a.latitude, a.longitude, b.latitude, b.longitude)
}

/// Calculate a bounding box around a center point
///
/// Cheaper than Haversine, so hard distance checks reject far-apart pairs with it first.
/// 1° latitude ≈ 69 miles, 1° longitude ≈ 69 miles * cos(latitude)
pub fn calculate_bounding_box(lat: f64, lon: f64, radius_miles: f64) -> BoundingBox {
    let lat_delta = radius_miles / MILES_PER_DEGREE;

    // Near the poles cos() approaches zero; cap the longitude span at the full circle
    let lon_delta = (radius_miles / (MILES_PER_DEGREE * lat.to_radians().cos().abs())).min(180.0);

    BoundingBox {
        min_lat: lat - lat_delta,
        max_lat: lat + lat_delta,
        min_lon: lon - lon_delta,
        max_lon: lon + lon_delta,
    }
}

/// Check if a point is within a bounding box
#[inline]
pub fn is_within_bounding_box(lat: f64, lon: f64, bbox: &BoundingBox) -> bool {
    lat >= bbox.min_lat && lat <= bbox.max_lat && lon >= bbox.min_lon && lon <= bbox.max_lon
}

/// Distance in miles between two member locations
///
/// Returns `None` when either location is unknown, and `Some(f64::INFINITY)`
/// when both are known but no route between them is allowed or listed.
pub fn location_distance(
    a: &Location,
    b: &Location,
    scope: LocationScope,
    zones: &ZoneDirectory,
) -> Option<f64> {
    if !a.is_known() || !b.is_known() {
        return None;
    }

    if let (Some(zone_a), Some(zone_b)) = (&a.zone_id, &b.zone_id) {
        if scope == LocationScope::InsideOnly && zone_a != zone_b {
            return Some(f64::INFINITY);
        }
    }

    if let (Some(pa), Some(pb)) = (a.coordinates, b.coordinates) {
        return Some(distance_between(pa, pb));
    }

    // At least one side is located by zone only
    if let (Some(zone_a), Some(zone_b)) = (&a.zone_id, &b.zone_id) {
        if zone_a == zone_b {
            return Some(0.0);
        }
        if let Some(miles) = zones.neighbor_distance(zone_a, zone_b) {
            return Some(miles);
        }
    }

    let point_a = a
        .coordinates
        .or_else(|| a.zone_id.as_deref().and_then(|z| zones.centroid(z)));
    let point_b = b
        .coordinates
        .or_else(|| b.zone_id.as_deref().and_then(|z| zones.centroid(z)));

    match (point_a, point_b) {
        (Some(pa), Some(pb)) => Some(distance_between(pa, pb)),
        _ => Some(f64::INFINITY),
    }
}

/// Quick rejection for hard distance limits between two point locations
///
/// Only conclusive when both sides carry coordinates; otherwise defers to
/// the full distance computation.
#[inline]
pub fn may_be_within(a: &Location, b: &Location, max_miles: f64) -> bool {
    match (a.coordinates, b.coordinates) {
        (Some(pa), Some(pb)) => {
            let bbox = calculate_bounding_box(pa.latitude, pa.longitude, max_miles * PREFILTER_MARGIN);
            is_within_bounding_box(pb.latitude, pb.longitude, &bbox)
        }
        _ => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_haversine_distance() {
        // London to Paris is roughly 214 miles
        let distance = haversine_miles(51.5074, -0.1278, 48.8566, 2.3522);
        assert!((distance - 214.0).abs() < 6.0, "Distance should be ~214mi, got {}", distance);
    }

    #[test]
    fn test_bounding_box() {
        let bbox = calculate_bounding_box(40.7128, -74.0060, 10.0);

        assert!(bbox.min_lat < 40.7128);
        assert!(bbox.max_lat > 40.7128);
        assert!(bbox.min_lon < -74.0060);
        assert!(bbox.max_lon > -74.0060);

        // 20mi / 69mi per degree = ~0.29 degrees
        let lat_span = bbox.max_lat - bbox.min_lat;
        assert!((lat_span - 0.29).abs() < 0.02, "Lat span should be ~0.29 degrees");
    }

    #[test]
    fn test_point_within_bbox() {
        let bbox = calculate_bounding_box(40.7128, -74.0060, 10.0);

        assert!(is_within_bounding_box(40.7128, -74.0060, &bbox));
        assert!(is_within_bounding_box(40.71, -74.0, &bbox));
        assert!(!is_within_bounding_box(50.0, -80.0, &bbox));
    }

    #[test]
    fn test_same_zone_is_zero_miles() {
        let zones = ZoneDirectory::new();
        let d = location_distance(
            &Location::zone("riverside"),
            &Location::zone("riverside"),
            LocationScope::InsideOnly,
            &zones,
        );
        assert_eq!(d, Some(0.0));
    }

    #[test]
    fn test_inside_only_blocks_other_zones() {
        let zones = ZoneDirectory::new().with_neighbor("riverside", "old-town", 1.0);
        let a = Location::zone("riverside");
        let b = Location::zone("old-town");

        assert_eq!(
            location_distance(&a, &b, LocationScope::InsideOnly, &zones),
            Some(f64::INFINITY)
        );
        assert_eq!(
            location_distance(&a, &b, LocationScope::NearbyOk, &zones),
            Some(1.0)
        );
    }

    #[test]
    fn test_zone_falls_back_to_centroid() {
        let zones = ZoneDirectory::new().with_centroid("riverside", Coordinates::new(40.7128, -74.0060));
        let a = Location::zone("riverside");
        let b = Location::point(40.72, -74.01);

        let d = location_distance(&a, &b, LocationScope::NearbyOk, &zones).unwrap();
        assert!(d > 0.0 && d < 1.5, "Expected under a mile or so, got {}", d);
    }

    #[test]
    fn test_unlisted_zones_are_unreachable() {
        let zones = ZoneDirectory::new();
        let d = location_distance(
            &Location::zone("riverside"),
            &Location::zone("harbor"),
            LocationScope::NearbyOk,
            &zones,
        );
        assert_eq!(d, Some(f64::INFINITY));
    }

    #[test]
    fn test_unknown_location_is_none() {
        let zones = ZoneDirectory::new();
        let d = location_distance(
            &Location::default(),
            &Location::zone("harbor"),
            LocationScope::NearbyOk,
            &zones,
        );
        assert_eq!(d, None);
    }

    #[test]
    fn test_bbox_prefilter() {
        let a = Location::point(40.7128, -74.0060);
        assert!(may_be_within(&a, &Location::point(40.72, -74.01), 5.0));
        assert!(!may_be_within(&a, &Location::point(41.5, -74.0), 5.0));
        assert!(may_be_within(&a, &Location::zone("harbor"), 5.0));
    }
}
