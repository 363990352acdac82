//! The single detail overlay.
//!
//! At most one overlay is open. Opening another replaces it; a background
//! click (a real click, not a drag) or any zoom change closes it. The overlay
//! is anchored at a fixed offset above its target and never repositions
//! itself. Content is plain data; painting it is up to the host.

use serde::Serialize;
use tracing::debug;

use crate::config::EngineConfig;
use crate::gesture::Gesture;
use crate::models::{AccuracyClass, BorderColor, ClusterGroup, Coordinate, PointEntity};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum OverlayKind {
    None,
    Point,
    Cluster,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PointDetails {
    pub name: String,
    pub title: Option<String>,
    pub department: Option<String>,
    pub email: Option<String>,
    pub address: Option<String>,
    pub accuracy: AccuracyClass,
    pub badge: &'static str,
    pub border: BorderColor,
    pub photo_ref: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MemberLine {
    pub id: String,
    pub name: String,
    /// Email if known, otherwise the job title.
    pub secondary: Option<String>,
    pub photo_ref: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClusterDetails {
    pub header: String,
    pub members: Vec<MemberLine>,
    pub footer: &'static str,
    pub same_location: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum OverlayContent {
    Empty,
    Point(PointDetails),
    Cluster(ClusterDetails),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OverlayState {
    pub kind: OverlayKind,
    pub target_id: Option<String>,
    pub anchor: Option<Coordinate>,
    pub content: OverlayContent,
    /// Screen offset from the anchor, x then y.
    pub pixel_offset: (f64, f64),
}

impl OverlayState {
    pub fn closed() -> Self {
        OverlayState {
            kind: OverlayKind::None,
            target_id: None,
            anchor: None,
            content: OverlayContent::Empty,
            pixel_offset: (0.0, 0.0),
        }
    }

    pub fn is_open(&self) -> bool {
        self.kind != OverlayKind::None
    }
}

/// What a completed pointer sequence landed on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClickTarget {
    Background,
    /// Inside the overlay itself.
    Overlay,
    /// A pin or cluster, by shape id.
    Shape(String),
}

pub const CLUSTER_FOOTER_SAME_LOCATION: &str =
    "Users at identical location - cluster persists at all zoom levels";
pub const CLUSTER_FOOTER_EXPAND: &str = "Click to zoom in and expand";

pub fn badge_text(class: AccuracyClass) -> &'static str {
    match class {
        AccuracyClass::Address => "Address",
        AccuracyClass::Office => "Office Location",
        AccuracyClass::Phone => "Phone Approximation",
        AccuracyClass::Timezone => "Timezone Approximation",
    }
}

pub fn cluster_header(count: usize, same_location: bool) -> String {
    if same_location {
        format!("{count} Team Members (Same Location)")
    } else {
        format!("{count} Team Members")
    }
}

#[derive(Debug)]
pub struct InteractionManager {
    overlay: OverlayState,
    point_offset: f64,
    cluster_offset: f64,
}

impl InteractionManager {
    pub fn new(config: &EngineConfig) -> Self {
        InteractionManager {
            overlay: OverlayState::closed(),
            point_offset: config.point_overlay_offset_px,
            cluster_offset: config.cluster_overlay_offset_px,
        }
    }

    pub fn overlay(&self) -> &OverlayState {
        &self.overlay
    }

    pub fn show_point(&mut self, point: &PointEntity, anchor: Coordinate) -> &OverlayState {
        let details = PointDetails {
            name: point.display_name.clone(),
            title: point.title.clone(),
            department: point.department.clone(),
            email: point.email.clone(),
            address: point.address_text.clone(),
            accuracy: point.accuracy_class,
            badge: badge_text(point.accuracy_class),
            border: point.border,
            photo_ref: point.photo_ref.clone(),
        };
        self.open(OverlayState {
            kind: OverlayKind::Point,
            target_id: Some(point.id.clone()),
            anchor: Some(anchor),
            content: OverlayContent::Point(details),
            pixel_offset: (0.0, self.point_offset),
        })
    }

    /// `members` in cluster order; missing members are skipped.
    pub fn show_cluster(
        &mut self,
        cluster: &ClusterGroup,
        members: &[&PointEntity],
        anchor: Coordinate,
    ) -> &OverlayState {
        let lines = members
            .iter()
            .map(|p| MemberLine {
                id: p.id.clone(),
                name: p.display_name.clone(),
                secondary: p.email.clone().or_else(|| p.title.clone()),
                photo_ref: p.photo_ref.clone(),
            })
            .collect();
        let details = ClusterDetails {
            header: cluster_header(cluster.member_count, cluster.same_location),
            members: lines,
            footer: if cluster.same_location {
                CLUSTER_FOOTER_SAME_LOCATION
            } else {
                CLUSTER_FOOTER_EXPAND
            },
            same_location: cluster.same_location,
        };
        self.open(OverlayState {
            kind: OverlayKind::Cluster,
            target_id: Some(cluster.cluster_id.clone()),
            anchor: Some(anchor),
            content: OverlayContent::Cluster(details),
            pixel_offset: (0.0, self.cluster_offset),
        })
    }

    /// Close whatever is open. Returns whether anything was open.
    pub fn close_overlay(&mut self) -> bool {
        let was_open = self.overlay.is_open();
        if was_open {
            debug!(kind = ?self.overlay.kind, "Closing overlay");
        }
        self.overlay = OverlayState::closed();
        was_open
    }

    /// Dismissal for a completed pointer sequence. Only a click on the bare
    /// map closes the overlay.
    pub fn on_background_click(&mut self, gesture: Gesture, target: &ClickTarget) -> bool {
        match (gesture, target) {
            (Gesture::Click, ClickTarget::Background) => self.close_overlay(),
            _ => false,
        }
    }

    /// Anchors are stale after any zoom change.
    pub fn on_zoom_changed(&mut self) -> bool {
        self.close_overlay()
    }

    fn open(&mut self, state: OverlayState) -> &OverlayState {
        if self.overlay.is_open() {
            debug!(replaced = ?self.overlay.kind, with = ?state.kind, "Replacing overlay");
        }
        self.overlay = state;
        &self.overlay
    }
}

/// Zoom to apply when a cluster is double-activated: the engine's expansion
/// zoom, or the current zoom plus the step, capped, when that query fails.
pub fn expansion_target<E>(
    query: Result<f64, E>,
    current_zoom: f64,
    config: &EngineConfig,
) -> f64 {
    match query {
        Ok(zoom) => config.clamp_zoom(zoom),
        Err(_) => (current_zoom + config.expansion_zoom_step).min(config.expansion_zoom_cap),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::MapError;

    fn person(id: &str, email: Option<&str>) -> PointEntity {
        PointEntity {
            id: id.into(),
            coordinate: Coordinate::new(47.6, -122.3),
            display_name: format!("Person {id}"),
            title: Some("Engineer".into()),
            department: Some("Maps".into()),
            email: email.map(str::to_string),
            address_text: Some("Seattle".into()),
            accuracy_class: AccuracyClass::Phone,
            border: BorderColor::Orange,
            photo_ref: id.into(),
        }
    }

    fn group(ids: &[&str], same_location: bool) -> ClusterGroup {
        ClusterGroup {
            cluster_id: "c-1".into(),
            centroid: Coordinate::new(47.6, -122.3),
            member_count: ids.len(),
            member_point_ids: ids.iter().map(|s| s.to_string()).collect(),
            same_location,
        }
    }

    #[test]
    fn test_cluster_replaces_point_overlay() {
        let mut im = InteractionManager::new(&EngineConfig::default());
        let a = person("a", Some("a@example.com"));
        let b = person("b", None);
        im.show_point(&a, a.coordinate);
        assert_eq!(im.overlay().kind, OverlayKind::Point);

        let g = group(&["a", "b"], true);
        let state = im.show_cluster(&g, &[&a, &b], g.centroid).clone();
        assert_eq!(state.kind, OverlayKind::Cluster);
        assert_eq!(state.target_id.as_deref(), Some("c-1"));
        assert_eq!(state.pixel_offset, (0.0, -100.0));
        assert_eq!(im.overlay(), &state);
    }

    #[test]
    fn test_point_overlay_content() {
        let mut im = InteractionManager::new(&EngineConfig::default());
        let a = person("a", Some("a@example.com"));
        let state = im.show_point(&a, a.coordinate);
        assert_eq!(state.pixel_offset, (0.0, -110.0));
        match &state.content {
            OverlayContent::Point(d) => {
                assert_eq!(d.name, "Person a");
                assert_eq!(d.badge, "Phone Approximation");
                assert_eq!(d.border, BorderColor::Orange);
                assert_eq!(d.address.as_deref(), Some("Seattle"));
            }
            other => panic!("unexpected content {other:?}"),
        }
    }

    #[test]
    fn test_cluster_overlay_content() {
        let mut im = InteractionManager::new(&EngineConfig::default());
        let a = person("a", Some("a@example.com"));
        let b = person("b", None);
        let state = im.show_cluster(&group(&["a", "b"], true), &[&a, &b], a.coordinate);
        match &state.content {
            OverlayContent::Cluster(d) => {
                assert_eq!(d.header, "2 Team Members (Same Location)");
                assert_eq!(d.footer, CLUSTER_FOOTER_SAME_LOCATION);
                assert_eq!(d.members[0].secondary.as_deref(), Some("a@example.com"));
                assert_eq!(d.members[1].secondary.as_deref(), Some("Engineer"));
            }
            other => panic!("unexpected content {other:?}"),
        }
        let state = im.show_cluster(&group(&["a", "b"], false), &[&a, &b], a.coordinate);
        match &state.content {
            OverlayContent::Cluster(d) => {
                assert_eq!(d.header, "2 Team Members");
                assert_eq!(d.footer, CLUSTER_FOOTER_EXPAND);
            }
            other => panic!("unexpected content {other:?}"),
        }
    }

    #[test]
    fn test_drag_never_closes_overlay() {
        let mut im = InteractionManager::new(&EngineConfig::default());
        let a = person("a", None);
        im.show_point(&a, a.coordinate);
        assert!(!im.on_background_click(Gesture::Drag, &ClickTarget::Background));
        assert!(im.overlay().is_open());
        assert!(!im.on_background_click(Gesture::Click, &ClickTarget::Overlay));
        assert!(!im.on_background_click(Gesture::Click, &ClickTarget::Shape("a".into())));
        assert!(im.overlay().is_open());
        assert!(im.on_background_click(Gesture::Click, &ClickTarget::Background));
        assert!(!im.overlay().is_open());
    }

    #[test]
    fn test_zoom_change_closes_overlay() {
        let mut im = InteractionManager::new(&EngineConfig::default());
        let a = person("a", None);
        im.show_point(&a, a.coordinate);
        assert!(im.on_zoom_changed());
        assert_eq!(im.overlay(), &OverlayState::closed());
        assert!(!im.on_zoom_changed());
    }

    #[test]
    fn test_expansion_target_fallback() {
        let config = EngineConfig::default();
        assert!((expansion_target::<MapError>(Ok(9.0), 6.0, &config) - 9.0).abs() < 1e-9);
        let failed: Result<f64, MapError> = Err(MapError::ExpansionUnavailable);
        assert!((expansion_target(failed.clone(), 6.0, &config) - 9.0).abs() < 1e-9);
        assert!((expansion_target(failed, 16.5, &config) - 18.0).abs() < 1e-9);
    }
}
