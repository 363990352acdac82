//! Memoized synthesis of pin and cluster icons.
//!
//! Every icon is addressed by a stable registry key. Shapes reference icons by
//! key only, so registering a finished photo icon under the key that already
//! holds a placeholder updates every placed pin without touching geometry.

pub mod raster;

use std::collections::HashMap;
use std::future::Future;
use std::io::Cursor;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use image::{ImageFormat, RgbaImage};
use tokio::sync::OnceCell;
use tracing::{debug, warn};

use crate::error::AssetFailure;
use crate::models::BorderColor;

/// Largest count with its own cluster icon; bigger clusters share one.
pub const MAX_EXACT_CLUSTER: usize = 20;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ClusterBucket {
    Count(u8),
    Large,
}

impl ClusterBucket {
    pub fn for_count(count: usize) -> Self {
        if count > MAX_EXACT_CLUSTER {
            ClusterBucket::Large
        } else {
            ClusterBucket::Count(count.max(2) as u8)
        }
    }

    pub fn key(&self) -> String {
        match self {
            ClusterBucket::Count(n) => format!("cluster-{n}"),
            ClusterBucket::Large => "cluster-large".to_string(),
        }
    }

    fn label(&self) -> String {
        match self {
            ClusterBucket::Count(n) => n.to_string(),
            ClusterBucket::Large => format!("{MAX_EXACT_CLUSTER}+"),
        }
    }

    fn size(&self) -> u32 {
        match self {
            ClusterBucket::Count(_) => raster::CLUSTER_SIZE,
            ClusterBucket::Large => raster::CLUSTER_LARGE_SIZE,
        }
    }
}

/// Registry key under which a person's pin is drawn.
pub fn point_key(photo_ref: &str) -> String {
    format!("user-photo-{photo_ref}")
}

/// A synthesized icon. Cloning shares the pixels.
#[derive(Debug, Clone)]
pub struct IconHandle {
    pub key: String,
    pub image: Arc<RgbaImage>,
    /// Drawn with the default avatar because the photo was unusable.
    pub fallback: bool,
}

impl IconHandle {
    /// Same underlying synthesis result, not just equal pixels.
    pub fn ptr_eq(&self, other: &IconHandle) -> bool {
        Arc::ptr_eq(&self.image, &other.image)
    }

    pub fn encode_png(&self) -> Result<Vec<u8>, image::ImageError> {
        let mut out = Cursor::new(Vec::new());
        self.image.write_to(&mut out, ImageFormat::Png)?;
        Ok(out.into_inner())
    }
}

/// Where photo bytes come from. Keyed by [`crate::models::PointEntity::photo_ref`].
pub trait PhotoSource: Send + Sync {
    fn fetch(&self, photo_ref: &str) -> impl Future<Output = Result<Vec<u8>, AssetFailure>> + Send;
}

/// Photo source for hosts without photos; every pin gets the default avatar.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoPhotos;

impl PhotoSource for NoPhotos {
    async fn fetch(&self, _photo_ref: &str) -> Result<Vec<u8>, AssetFailure> {
        Err(AssetFailure::Missing)
    }
}

/// Encoded photos held in memory.
#[derive(Debug, Clone, Default)]
pub struct MemoryPhotos {
    photos: HashMap<String, Vec<u8>>,
}

impl MemoryPhotos {
    pub fn insert(&mut self, photo_ref: impl Into<String>, bytes: Vec<u8>) {
        self.photos.insert(photo_ref.into(), bytes);
    }
}

impl PhotoSource for MemoryPhotos {
    async fn fetch(&self, photo_ref: &str) -> Result<Vec<u8>, AssetFailure> {
        self.photos.get(photo_ref).cloned().ok_or(AssetFailure::Missing)
    }
}

#[derive(Debug, Clone)]
pub enum IconLookup {
    Ready(IconHandle),
    Pending,
}

type PointSlot = Arc<OnceCell<IconHandle>>;

pub struct IconCache<P> {
    photos: P,
    photo_timeout: Duration,
    clusters: Mutex<HashMap<ClusterBucket, IconHandle>>,
    points: Mutex<HashMap<(String, BorderColor), PointSlot>>,
    placeholders: Mutex<HashMap<BorderColor, Arc<RgbaImage>>>,
    synthesized: AtomicUsize,
    asset_failures: AtomicUsize,
}

impl<P: PhotoSource> IconCache<P> {
    pub fn new(photos: P, photo_timeout: Duration) -> Self {
        IconCache {
            photos,
            photo_timeout,
            clusters: Mutex::new(HashMap::new()),
            points: Mutex::new(HashMap::new()),
            placeholders: Mutex::new(HashMap::new()),
            synthesized: AtomicUsize::new(0),
            asset_failures: AtomicUsize::new(0),
        }
    }

    /// Icon for a cluster of `count` members, built on first use.
    pub fn cluster_icon(&self, count: usize) -> IconHandle {
        let bucket = ClusterBucket::for_count(count);
        // Held across synthesis so one bucket is never drawn twice
        let mut clusters = lock(&self.clusters);
        clusters
            .entry(bucket)
            .or_insert_with(|| {
                self.synthesized.fetch_add(1, Ordering::SeqCst);
                IconHandle {
                    key: bucket.key(),
                    image: Arc::new(raster::cluster_icon(&bucket.label(), bucket.size())),
                    fallback: false,
                }
            })
            .clone()
    }

    /// Build every cluster icon up front: counts 2 to 20 plus the shared large one.
    pub fn prewarm_clusters(&self) -> Vec<IconHandle> {
        (2..=MAX_EXACT_CLUSTER)
            .chain(std::iter::once(MAX_EXACT_CLUSTER + 1))
            .map(|count| self.cluster_icon(count))
            .collect()
    }

    /// Pin for one person. Concurrent callers for the same key share one synthesis.
    pub async fn point_icon(&self, photo_ref: &str, border: BorderColor) -> IconHandle {
        let slot = self.slot(photo_ref, border);
        slot.get_or_init(|| self.synthesize_point(photo_ref, border))
            .await
            .clone()
    }

    /// The finished pin if it exists, without starting any work.
    pub fn peek_point_icon(&self, photo_ref: &str, border: BorderColor) -> IconLookup {
        let slot = lock(&self.points).get(&(photo_ref.to_string(), border)).cloned();
        match slot.as_ref().and_then(|s| s.get()) {
            Some(handle) => IconLookup::Ready(handle.clone()),
            None => IconLookup::Pending,
        }
    }

    /// Default avatar registered under the person's key until the real pin is ready.
    pub fn placeholder_pin(&self, photo_ref: &str, border: BorderColor) -> IconHandle {
        let image = lock(&self.placeholders)
            .entry(border)
            .or_insert_with(|| {
                self.synthesized.fetch_add(1, Ordering::SeqCst);
                Arc::new(raster::pin_icon(None, border))
            })
            .clone();
        IconHandle {
            key: point_key(photo_ref),
            image,
            fallback: true,
        }
    }

    /// Number of icons drawn so far, across every kind.
    pub fn synthesis_count(&self) -> usize {
        self.synthesized.load(Ordering::SeqCst)
    }

    /// Photos that were missing, failed, timed out or could not be decoded.
    pub fn asset_failures(&self) -> usize {
        self.asset_failures.load(Ordering::SeqCst)
    }

    fn slot(&self, photo_ref: &str, border: BorderColor) -> PointSlot {
        lock(&self.points)
            .entry((photo_ref.to_string(), border))
            .or_default()
            .clone()
    }

    async fn synthesize_point(&self, photo_ref: &str, border: BorderColor) -> IconHandle {
        self.synthesized.fetch_add(1, Ordering::SeqCst);
        let key = point_key(photo_ref);

        match self.load_photo(photo_ref).await {
            Ok(photo) => {
                debug!(photo_ref, "Synthesized photo pin");
                IconHandle {
                    key,
                    image: Arc::new(raster::pin_icon(Some(&photo), border)),
                    fallback: false,
                }
            }
            Err(failure) => {
                if failure != AssetFailure::Missing {
                    warn!(photo_ref, %failure, "Using default avatar");
                }
                self.asset_failures.fetch_add(1, Ordering::SeqCst);
                IconHandle {
                    key,
                    image: Arc::new(raster::pin_icon(None, border)),
                    fallback: true,
                }
            }
        }
    }

    async fn load_photo(&self, photo_ref: &str) -> Result<image::DynamicImage, AssetFailure> {
        let bytes = tokio::time::timeout(self.photo_timeout, self.photos.fetch(photo_ref))
            .await
            .map_err(|_| AssetFailure::Timeout)??;
        image::load_from_memory(&bytes).map_err(|e| AssetFailure::Decode(e.to_string()))
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
