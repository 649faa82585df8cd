//! Geographic math shared by the path model.
//!
//! Distances are great-circle surface distances in meters; elevation is not
//! part of the distance, only of the gradient.

use geo::{Distance, Haversine, Point};

use crate::GeoPoint;

/// Great-circle distance between two points in meters.
pub fn haversine_distance(a: GeoPoint, b: GeoPoint) -> f64 {
    Haversine::distance(Point::new(a.lng, a.lat), Point::new(b.lng, b.lat))
}

/// Signed gradient of a segment as a percentage.
///
/// Treats the elevation difference and the horizontal distance as legs of an
/// incline angle: `sin = diff / distance`, `cos = sqrt(max(0, 1 - sin^2))`,
/// gradient = `sin * cos * 100`. Positive values are ascents, negative values
/// descents. A zero-length segment has gradient 0 by definition.
pub fn gradient_percent(elevation_diff: f64, distance: f64) -> f64 {
    if distance <= 0.0 {
        return 0.0;
    }
    let sin_theta = elevation_diff / distance;
    let cos_theta = (1.0 - sin_theta * sin_theta).max(0.0).sqrt();
    sin_theta * cos_theta * 100.0
}
