//! Zoom-dependent grouping of points into clusters and singletons.
//!
//! Points are projected to world pixels at the viewport's zoom and bucketed
//! into a grid whose cell edge equals the cluster radius. Only points in the
//! same or adjacent cells can be within the radius, so each point is compared
//! against its 3x3 neighbourhood instead of every other point. Points within
//! the radius are joined transitively; a group with at least `min_points`
//! members becomes a cluster.

use std::collections::HashMap;

use crate::config::EngineConfig;
use crate::error::MapError;
use crate::models::{ClusterGroup, Coordinate, PointEntity};
use crate::projection::{self, PixelPoint};
use crate::viewport::Viewport;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClusterOptions {
    pub radius_px: f64,
    pub min_points: usize,
    /// Above this zoom only identical coordinates are grouped.
    pub max_zoom: f64,
}

impl Default for ClusterOptions {
    fn default() -> Self {
        ClusterOptions::from(&EngineConfig::default())
    }
}

impl From<&EngineConfig> for ClusterOptions {
    fn from(config: &EngineConfig) -> Self {
        ClusterOptions {
            radius_px: config.cluster_radius_px,
            min_points: config.cluster_min_points.max(2),
            max_zoom: config.cluster_max_zoom,
        }
    }
}

/// Result of one clustering run.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Clustering {
    pub clusters: Vec<ClusterGroup>,
    pub singletons: Vec<PointEntity>,
}

impl Clustering {
    /// Number of shapes drawn on the map: one per cluster plus one per singleton.
    pub fn shape_count(&self) -> usize {
        self.clusters.len() + self.singletons.len()
    }

    pub fn find_cluster(&self, cluster_id: &str) -> Option<&ClusterGroup> {
        self.clusters.iter().find(|c| c.cluster_id == cluster_id)
    }

    /// Membership of every cluster, independent of the minted cluster ids.
    pub fn memberships(&self) -> Vec<Vec<String>> {
        self.clusters
            .iter()
            .map(|c| c.member_point_ids.clone())
            .collect()
    }
}

/// Group `points` for `viewport`.
///
/// Deterministic for a given `(points, viewport)`: clusters come out ordered
/// by their first member's input position and members keep input order. Only
/// the cluster ids are fresh on every call.
pub fn cluster(
    points: &[PointEntity],
    viewport: &Viewport,
    options: &ClusterOptions,
) -> Clustering {
    let coords: Vec<Coordinate> = points.iter().map(|p| p.coordinate).collect();
    let groups = group_indices(&coords, viewport.zoom, options);

    let mut out = Clustering::default();
    let mut minted = 0usize;
    for group in groups {
        if group.len() >= options.min_points {
            minted += 1;
            let first = points[group[0]].coordinate;
            out.clusters.push(ClusterGroup {
                cluster_id: mint_cluster_id(minted),
                centroid: centroid(group.iter().map(|&i| points[i].coordinate)),
                member_count: group.len(),
                member_point_ids: group.iter().map(|&i| points[i].id.clone()).collect(),
                same_location: group.iter().all(|&i| points[i].coordinate.same_location(&first)),
            });
        } else {
            out.singletons
                .extend(group.iter().map(|&i| points[i].clone()));
        }
    }

    tracing::debug!(
        zoom = viewport.zoom,
        points = points.len(),
        clusters = out.clusters.len(),
        singletons = out.singletons.len(),
        "Clustered points"
    );
    out
}

/// Lowest whole zoom above `current_zoom` at which `members` stop forming a
/// single group.
///
/// Members sharing one coordinate never separate, so there is no such zoom
/// and the query fails with [`MapError::ExpansionUnavailable`].
pub fn expansion_zoom(
    members: &[&PointEntity],
    current_zoom: f64,
    options: &ClusterOptions,
) -> Result<f64, MapError> {
    let coords: Vec<Coordinate> = members.iter().map(|p| p.coordinate).collect();
    let start = current_zoom.floor() as i32 + 1;
    let end = options.max_zoom.ceil() as i32;
    for z in start..=end {
        let groups = group_indices(&coords, z as f64, options);
        if groups.len() > 1 {
            return Ok(z as f64);
        }
    }
    Err(MapError::ExpansionUnavailable)
}

/// Connected components of "within radius" at `zoom`, ordered by first index.
fn group_indices(coords: &[Coordinate], zoom: f64, options: &ClusterOptions) -> Vec<Vec<usize>> {
    let radius = options.radius_px.max(f64::EPSILON);
    // Past the cutoff, only exact duplicates are joined. Their screen distance
    // is always zero, so they stay together up to the top of the zoom range.
    let exact_only = zoom > options.max_zoom;

    let pixels: Vec<PixelPoint> = coords.iter().map(|&c| projection::project(c, zoom)).collect();
    let mut grid: HashMap<(i64, i64), Vec<usize>> = HashMap::new();
    for (i, p) in pixels.iter().enumerate() {
        grid.entry(cell_of(*p, radius)).or_default().push(i);
    }

    let mut sets = DisjointSet::new(coords.len());
    for (i, p) in pixels.iter().enumerate() {
        let (cx, cy) = cell_of(*p, radius);
        for dx in -1..=1 {
            for dy in -1..=1 {
                let Some(bucket) = grid.get(&(cx + dx, cy + dy)) else {
                    continue;
                };
                for &j in bucket.iter().filter(|&&j| j > i) {
                    let joined = if exact_only {
                        coords[i].same_location(&coords[j])
                    } else {
                        p.distance(pixels[j]) <= radius
                    };
                    if joined {
                        sets.union(i, j);
                    }
                }
            }
        }
    }

    let mut order: HashMap<usize, usize> = HashMap::new();
    let mut groups: Vec<Vec<usize>> = Vec::new();
    for i in 0..coords.len() {
        let root = sets.find(i);
        let slot = *order.entry(root).or_insert_with(|| {
            groups.push(Vec::new());
            groups.len() - 1
        });
        groups[slot].push(i);
    }
    groups
}

fn cell_of(p: PixelPoint, size: f64) -> (i64, i64) {
    ((p.x / size).floor() as i64, (p.y / size).floor() as i64)
}

/// Mean position in projected space, so the centroid sits where the pins are drawn.
fn centroid(coords: impl Iterator<Item = Coordinate>) -> Coordinate {
    let (mut sx, mut sy, mut n) = (0.0, 0.0, 0usize);
    for c in coords {
        let p = projection::project(c, 0.0);
        sx += p.x;
        sy += p.y;
        n += 1;
    }
    let n = n.max(1) as f64;
    projection::unproject(PixelPoint::new(sx / n, sy / n), 0.0)
}

#[cfg(feature = "uuid-support")]
fn mint_cluster_id(_seq: usize) -> String {
    uuid::Uuid::new_v4().to_string()
}

#[cfg(not(feature = "uuid-support"))]
fn mint_cluster_id(seq: usize) -> String {
    format!("group-{seq}")
}

/// Union-find with path halving.
struct DisjointSet {
    parent: Vec<usize>,
}

impl DisjointSet {
    fn new(n: usize) -> Self {
        DisjointSet {
            parent: (0..n).collect(),
        }
    }

    fn find(&mut self, mut i: usize) -> usize {
        while self.parent[i] != i {
            self.parent[i] = self.parent[self.parent[i]];
            i = self.parent[i];
        }
        i
    }

    fn union(&mut self, a: usize, b: usize) {
        let (ra, rb) = (self.find(a), self.find(b));
        if ra != rb {
            // Keep the lower index as root so component order is stable
            let (lo, hi) = if ra < rb { (ra, rb) } else { (rb, ra) };
            self.parent[hi] = lo;
        }
    }
}
