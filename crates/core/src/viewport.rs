use serde::Serialize;

use crate::config::EngineConfig;
use crate::models::{Coordinate, PointEntity, MAX_LATITUDE};
use crate::projection::{self, PixelPoint};

/// Geographic extent, west/south/east/north in degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Bounds {
    pub west: f64,
    pub south: f64,
    pub east: f64,
    pub north: f64,
}

impl Bounds {
    /// Smallest box containing every coordinate, or `None` for an empty slice.
    pub fn around(coords: impl IntoIterator<Item = Coordinate>) -> Option<Bounds> {
        coords.into_iter().fold(None, |acc, c| {
            Some(match acc {
                None => Bounds {
                    west: c.lng,
                    south: c.lat,
                    east: c.lng,
                    north: c.lat,
                },
                Some(b) => Bounds {
                    west: b.west.min(c.lng),
                    south: b.south.min(c.lat),
                    east: b.east.max(c.lng),
                    north: b.north.max(c.lat),
                },
            })
        })
    }

    /// Inside the renderable range with west <= east and south <= north.
    pub fn is_valid(&self) -> bool {
        let lng_ok = |v: f64| v.is_finite() && (-180.0..=180.0).contains(&v);
        let lat_ok = |v: f64| v.is_finite() && (-MAX_LATITUDE..=MAX_LATITUDE).contains(&v);
        lng_ok(self.west)
            && lng_ok(self.east)
            && lat_ok(self.south)
            && lat_ok(self.north)
            && self.west <= self.east
            && self.south <= self.north
    }
}

/// Camera state: what part of the world is on screen.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Viewport {
    pub center: Coordinate,
    /// Fractional zoom; not necessarily an integer.
    pub zoom: f64,
    pub width: f64,
    pub height: f64,
}

impl Viewport {
    pub fn new(center: Coordinate, zoom: f64, (width, height): (f64, f64)) -> Self {
        Viewport {
            center,
            zoom,
            width,
            height,
        }
    }

    /// Wide-area view used before any data is shown or when fitting fails.
    pub fn default_view(config: &EngineConfig) -> Self {
        Viewport::new(config.default_center, config.default_zoom, config.viewport_size())
    }

    /// Screen pixel position of a coordinate, origin at the top-left of the map.
    pub fn to_screen(&self, coord: Coordinate) -> PixelPoint {
        let p = projection::project(coord, self.zoom);
        let c = projection::project(self.center, self.zoom);
        PixelPoint {
            x: p.x - c.x + self.width / 2.0,
            y: p.y - c.y + self.height / 2.0,
        }
    }

    /// Coordinate under a screen pixel.
    pub fn to_coordinate(&self, screen: PixelPoint) -> Coordinate {
        let c = projection::project(self.center, self.zoom);
        projection::unproject(
            PixelPoint {
                x: screen.x - self.width / 2.0 + c.x,
                y: screen.y - self.height / 2.0 + c.y,
            },
            self.zoom,
        )
    }

    pub fn bounds(&self) -> Bounds {
        let nw = self.to_coordinate(PixelPoint::new(0.0, 0.0));
        let se = self.to_coordinate(PixelPoint::new(self.width, self.height));
        Bounds {
            west: nw.lng,
            south: se.lat,
            east: se.lng,
            north: nw.lat,
        }
    }

    pub fn with_zoom(self, zoom: f64) -> Self {
        Viewport { zoom, ..self }
    }

    pub fn with_center(self, center: Coordinate) -> Self {
        Viewport { center, ..self }
    }
}

/// Camera that shows all `points`.
///
/// One point is centered at the single-point zoom. Several points get their
/// bounding box with padding, never zoomed past the fit limit. An unusable
/// bounding box falls back to the default view.
pub fn fit_points(points: &[PointEntity], current: &Viewport, config: &EngineConfig) -> Viewport {
    match points {
        [] => Viewport::default_view(config),
        [only] => current
            .with_center(only.coordinate)
            .with_zoom(config.single_point_zoom),
        _ => {
            let Some(bounds) = Bounds::around(points.iter().map(|p| p.coordinate)) else {
                return Viewport::default_view(config);
            };
            if !bounds.is_valid() {
                tracing::warn!(?bounds, "Invalid bounds, using default view");
                return Viewport::default_view(config);
            }
            fit_bounds(bounds, current, config)
        }
    }
}

fn fit_bounds(bounds: Bounds, current: &Viewport, config: &EngineConfig) -> Viewport {
    // Measure the box at zoom 0, then scale up to fill the padded viewport.
    let nw = projection::project(Coordinate::new(bounds.north, bounds.west), 0.0);
    let se = projection::project(Coordinate::new(bounds.south, bounds.east), 0.0);
    let span_x = (se.x - nw.x).max(1e-9);
    let span_y = (se.y - nw.y).max(1e-9);

    let avail_w = (current.width - 2.0 * config.fit_padding_px).max(1.0);
    let avail_h = (current.height - 2.0 * config.fit_padding_px).max(1.0);
    let zoom = (avail_w / span_x).min(avail_h / span_y).log2();
    let zoom = zoom.clamp(config.min_zoom, config.fit_max_zoom);

    let center = projection::unproject(
        PixelPoint::new((nw.x + se.x) / 2.0, (nw.y + se.y) / 2.0),
        0.0,
    );
    Viewport::new(center, zoom, (current.width, current.height))
}
