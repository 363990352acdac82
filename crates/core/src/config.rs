use std::str::FromStr;
use std::time::Duration;

use serde::Deserialize;

use crate::models::Coordinate;

/// Tuning values for clustering, timing and camera behaviour.
///
/// Every field has a default, so a partial JSON document (or none at all)
/// is a valid configuration.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct EngineConfig {
    pub cluster_radius_px: f64,
    pub cluster_min_points: usize,
    /// Highest zoom at which distinct coordinates are still grouped.
    pub cluster_max_zoom: f64,
    pub recluster_settle_ms: u64,
    pub drag_threshold_px: f64,
    pub photo_timeout_ms: u64,
    pub ready_poll_interval_ms: u64,
    pub ready_poll_attempts: u32,
    pub init_timeout_ms: u64,
    pub pending_grace_ms: u64,
    pub min_zoom: f64,
    pub max_zoom: f64,
    pub expansion_zoom_step: f64,
    pub expansion_zoom_cap: f64,
    pub point_overlay_offset_px: f64,
    pub cluster_overlay_offset_px: f64,
    pub default_center: Coordinate,
    pub default_zoom: f64,
    pub single_point_zoom: f64,
    pub fit_padding_px: f64,
    pub fit_max_zoom: f64,
    pub right_click_window_ms: u64,
    pub viewport_width_px: f64,
    pub viewport_height_px: f64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        EngineConfig {
            cluster_radius_px: 60.0,
            cluster_min_points: 2,
            cluster_max_zoom: 24.0,
            recluster_settle_ms: 50,
            drag_threshold_px: 5.0,
            photo_timeout_ms: 3_000,
            ready_poll_interval_ms: 500,
            ready_poll_attempts: 30,
            init_timeout_ms: 10_000,
            pending_grace_ms: 1_000,
            min_zoom: 1.0,
            max_zoom: 20.0,
            expansion_zoom_step: 3.0,
            expansion_zoom_cap: 18.0,
            point_overlay_offset_px: -110.0,
            cluster_overlay_offset_px: -100.0,
            // Geographic center of the contiguous United States.
            default_center: Coordinate {
                lat: 39.8283,
                lng: -98.5795,
            },
            default_zoom: 3.0,
            single_point_zoom: 10.0,
            fit_padding_px: 50.0,
            fit_max_zoom: 15.0,
            right_click_window_ms: 300,
            viewport_width_px: 1024.0,
            viewport_height_px: 768.0,
        }
    }
}

impl EngineConfig {
    /// Defaults overlaid with any `TEAMMAP_*` environment variables.
    pub fn from_env() -> Self {
        let mut config = EngineConfig::default();
        config.apply_env(|name| std::env::var(name).ok());
        config
    }

    /// Parse a JSON document; missing fields keep their defaults.
    pub fn from_json(json: &str) -> Result<Self, String> {
        serde_json::from_str(json).map_err(|e| format!("Failed to parse engine config: {e}"))
    }

    /// Overlay values from `lookup`. Unparseable values are ignored with a warning.
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        override_from(&lookup, "TEAMMAP_CLUSTER_RADIUS_PX", &mut self.cluster_radius_px);
        override_from(&lookup, "TEAMMAP_CLUSTER_MIN_POINTS", &mut self.cluster_min_points);
        override_from(&lookup, "TEAMMAP_CLUSTER_MAX_ZOOM", &mut self.cluster_max_zoom);
        override_from(&lookup, "TEAMMAP_RECLUSTER_SETTLE_MS", &mut self.recluster_settle_ms);
        override_from(&lookup, "TEAMMAP_DRAG_THRESHOLD_PX", &mut self.drag_threshold_px);
        override_from(&lookup, "TEAMMAP_PHOTO_TIMEOUT_MS", &mut self.photo_timeout_ms);
        override_from(&lookup, "TEAMMAP_READY_POLL_INTERVAL_MS", &mut self.ready_poll_interval_ms);
        override_from(&lookup, "TEAMMAP_READY_POLL_ATTEMPTS", &mut self.ready_poll_attempts);
        override_from(&lookup, "TEAMMAP_INIT_TIMEOUT_MS", &mut self.init_timeout_ms);
        override_from(&lookup, "TEAMMAP_PENDING_GRACE_MS", &mut self.pending_grace_ms);
        override_from(&lookup, "TEAMMAP_VIEWPORT_WIDTH_PX", &mut self.viewport_width_px);
        override_from(&lookup, "TEAMMAP_VIEWPORT_HEIGHT_PX", &mut self.viewport_height_px);
    }

    pub fn recluster_settle(&self) -> Duration {
        Duration::from_millis(self.recluster_settle_ms)
    }

    pub fn photo_timeout(&self) -> Duration {
        Duration::from_millis(self.photo_timeout_ms)
    }

    pub fn ready_poll_interval(&self) -> Duration {
        Duration::from_millis(self.ready_poll_interval_ms)
    }

    pub fn init_timeout(&self) -> Duration {
        Duration::from_millis(self.init_timeout_ms)
    }

    pub fn pending_grace(&self) -> Duration {
        Duration::from_millis(self.pending_grace_ms)
    }

    pub fn right_click_window(&self) -> Duration {
        Duration::from_millis(self.right_click_window_ms)
    }

    pub fn viewport_size(&self) -> (f64, f64) {
        (self.viewport_width_px, self.viewport_height_px)
    }

    /// Clamp a zoom level to the camera's allowed range.
    pub fn clamp_zoom(&self, zoom: f64) -> f64 {
        zoom.clamp(self.min_zoom, self.max_zoom)
    }
}

fn override_from<T: FromStr>(lookup: &impl Fn(&str) -> Option<String>, name: &str, field: &mut T) {
    let Some(raw) = lookup(name) else { return };
    match raw.trim().parse::<T>() {
        Ok(value) => *field = value,
        Err(_) => {
            tracing::warn!(variable = name, value = %raw, "Ignoring unparseable config override")
        }
    }
}
