use serde::Serialize;

use crate::cluster::Clustering;
use crate::icons::{point_key, ClusterBucket};
use crate::models::Coordinate;

/// Scale applied to individual pins.
pub const POINT_ICON_SCALE: f64 = 0.8;

/// Cluster icon scale at (count, scale) stops; linear between, clamped outside.
const CLUSTER_SCALE_STOPS: [(f64, f64); 3] = [(2.0, 0.9), (10.0, 1.3), (20.0, 1.5)];

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ShapeKind {
    Point { label: String },
    Cluster { member_count: usize, same_location: bool },
}

/// One drawable symbol. Icons are referenced by registry key, never by pixels.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Shape {
    /// Point id for pins, cluster id for clusters.
    pub id: String,
    pub coordinate: Coordinate,
    pub icon_key: String,
    pub icon_scale: f64,
    pub kind: ShapeKind,
}

impl Shape {
    pub fn is_cluster(&self) -> bool {
        matches!(self.kind, ShapeKind::Cluster { .. })
    }
}

/// Icon scale for a cluster of `count` members.
pub fn cluster_icon_scale(count: usize) -> f64 {
    let count = count as f64;
    let (first, last) = (CLUSTER_SCALE_STOPS[0], CLUSTER_SCALE_STOPS[2]);
    if count <= first.0 {
        return first.1;
    }
    if count >= last.0 {
        return last.1;
    }
    CLUSTER_SCALE_STOPS
        .windows(2)
        .find(|w| count <= w[1].0)
        .map(|w| {
            let (c0, s0) = w[0];
            let (c1, s1) = w[1];
            s0 + (count - c0) / (c1 - c0) * (s1 - s0)
        })
        .unwrap_or(last.1)
}

/// Shapes for a clustering result: clusters first, then singletons.
pub fn build_shapes(clustering: &Clustering) -> Vec<Shape> {
    let clusters = clustering.clusters.iter().map(|c| Shape {
        id: c.cluster_id.clone(),
        coordinate: c.centroid,
        icon_key: ClusterBucket::for_count(c.member_count).key(),
        icon_scale: cluster_icon_scale(c.member_count),
        kind: ShapeKind::Cluster {
            member_count: c.member_count,
            same_location: c.same_location,
        },
    });
    let points = clustering.singletons.iter().map(|p| Shape {
        id: p.id.clone(),
        coordinate: p.coordinate,
        icon_key: point_key(&p.photo_ref),
        icon_scale: POINT_ICON_SCALE,
        kind: ShapeKind::Point {
            label: p.display_name.clone(),
        },
    });
    clusters.chain(points).collect()
}
