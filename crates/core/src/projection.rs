//! Spherical Web Mercator projection.
//!
//! World pixel space at zoom `z` is a square of `TILE_SIZE * 2^z` pixels
//! with the origin at the north-west corner (x = east, y = south).

use std::f64::consts::PI;

use crate::models::{Coordinate, MAX_LATITUDE};

/// Tile edge in pixels, matching the vector-tile engines the map targets.
pub const TILE_SIZE: f64 = 512.0;

/// A position in world or screen pixels.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PixelPoint {
    pub x: f64,
    pub y: f64,
}

impl PixelPoint {
    pub fn new(x: f64, y: f64) -> Self {
        PixelPoint { x, y }
    }

    /// Euclidean distance between two pixel positions.
    pub fn distance(self, other: PixelPoint) -> f64 {
        let dx = other.x - self.x;
        let dy = other.y - self.y;
        (dx * dx + dy * dy).sqrt()
    }
}

/// Width (and height) of the world in pixels at a fractional zoom level.
pub fn world_size(zoom: f64) -> f64 {
    TILE_SIZE * zoom.exp2()
}

/// Convert a coordinate to world pixels at `zoom`.
pub fn project(coord: Coordinate, zoom: f64) -> PixelPoint {
    let size = world_size(zoom);
    let x = (coord.lng + 180.0) / 360.0 * size;
    // Clamp so the poles don't blow up to infinity
    let sin_lat = coord.lat.to_radians().sin().clamp(-0.9999, 0.9999);
    let y = (0.5 - ((1.0 + sin_lat) / (1.0 - sin_lat)).ln() / (4.0 * PI)) * size;
    PixelPoint { x, y }
}

/// Convert world pixels at `zoom` back to a coordinate.
pub fn unproject(point: PixelPoint, zoom: f64) -> Coordinate {
    let size = world_size(zoom);
    let lng = point.x / size * 360.0 - 180.0;
    let n = PI - 2.0 * PI * point.y / size;
    let lat = n.sinh().atan().to_degrees();
    Coordinate {
        lat: lat.clamp(-MAX_LATITUDE, MAX_LATITUDE),
        lng: lng.clamp(-180.0, 180.0),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_origin_projects_to_world_center() {
        let p = project(Coordinate::new(0.0, 0.0), 0.0);
        assert!((p.x - 256.0).abs() < 1e-9);
        assert!((p.y - 256.0).abs() < 1e-9);
    }

    #[test]
    fn test_world_size_doubles_per_zoom() {
        assert!((world_size(1.0) - 1024.0).abs() < 1e-9);
        assert!((world_size(2.5) / world_size(1.5) - 2.0).abs() < 1e-9);
    }

    #[test]
    fn test_longitude_edges() {
        let west = project(Coordinate::new(0.0, -180.0), 0.0);
        let east = project(Coordinate::new(0.0, 180.0), 0.0);
        assert!(west.x.abs() < 1e-9);
        assert!((east.x - TILE_SIZE).abs() < 1e-9);
    }

    #[test]
    fn test_north_is_up() {
        let north = project(Coordinate::new(60.0, 0.0), 3.0);
        let south = project(Coordinate::new(-60.0, 0.0), 3.0);
        assert!(north.y < south.y);
    }

    #[test]
    fn test_unproject_inverts_project() {
        let c = Coordinate::new(40.7128, -74.006);
        let back = unproject(project(c, 7.3), 7.3);
        assert!((back.lat - c.lat).abs() < 1e-9);
        assert!((back.lng - c.lng).abs() < 1e-9);
    }

    #[test]
    fn test_pixel_distance() {
        let a = PixelPoint::new(100.0, 100.0);
        let b = PixelPoint::new(103.0, 104.0);
        assert!((a.distance(b) - 5.0).abs() < 1e-9);
    }
}
