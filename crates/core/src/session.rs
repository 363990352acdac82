//! One people map: data, engine, icons and interaction wired together.

use std::collections::HashMap;
use std::sync::Arc;

use serde::Serialize;
use tokio::task::JoinSet;
use tokio::time::Instant;
use tracing::{info, warn};

use crate::cluster::{self, ClusterOptions, Clustering};
use crate::config::EngineConfig;
use crate::controller::ViewportController;
use crate::debounce::Debouncer;
use crate::engine::{EngineFactory, MapEngine};
use crate::error::MapError;
use crate::gesture::{
    ContextMenuTracker, Gesture, GestureDisambiguator, PointerEvent, PointerSource,
};
use crate::icons::{IconCache, IconHandle, IconLookup, PhotoSource};
use crate::interaction::{
    expansion_target, ClickTarget, InteractionManager, OverlayKind, OverlayState,
};
use crate::models::{PointEntity, RawRecord};
use crate::readiness::{Lifecycle, ReadySignal};
use crate::scene;
use crate::validate::{self, LocationStats};
use crate::viewport::Viewport;

/// Absorbed failures, counted for display.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Diagnostics {
    pub records: usize,
    pub valid: usize,
    pub dropped: usize,
    pub asset_failures: usize,
    pub render_failures: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadOutcome {
    /// Drawn with this many shapes.
    Rendered { shapes: usize },
    /// Held until the engine is ready.
    Queued { points: usize },
}

/// Everything a debug panel shows.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DebugStatus {
    pub lifecycle: Lifecycle,
    pub ready: bool,
    pub ready_signal: Option<ReadySignal>,
    pub zoom: Option<f64>,
    pub loaded_points: usize,
    pub clusters: usize,
    pub singletons: usize,
    pub overlay: OverlayKind,
    pub diagnostics: Diagnostics,
    pub stats: LocationStats,
    pub last_error: Option<String>,
}

pub struct PeopleMap<F: EngineFactory, P: PhotoSource + 'static> {
    config: EngineConfig,
    controller: ViewportController<F>,
    icons: Arc<IconCache<P>>,
    cluster_options: ClusterOptions,
    points: Vec<PointEntity>,
    stats: LocationStats,
    clustering: Clustering,
    interaction: InteractionManager,
    gestures: GestureDisambiguator,
    context_menu: ContextMenuTracker,
    recluster: Debouncer<f64>,
    diagnostics: Diagnostics,
    last_error: Option<MapError>,
}

impl<F: EngineFactory, P: PhotoSource + 'static> PeopleMap<F, P> {
    pub fn new(config: EngineConfig, factory: F, photos: P) -> Self {
        PeopleMap {
            icons: Arc::new(IconCache::new(photos, config.photo_timeout())),
            cluster_options: ClusterOptions::from(&config),
            interaction: InteractionManager::new(&config),
            gestures: GestureDisambiguator::new(config.drag_threshold_px),
            context_menu: ContextMenuTracker::new(config.right_click_window()),
            recluster: Debouncer::new(config.recluster_settle()),
            controller: ViewportController::new(config.clone(), factory),
            config,
            points: Vec::new(),
            stats: LocationStats::default(),
            clustering: Clustering::default(),
            diagnostics: Diagnostics::default(),
            last_error: None,
        }
    }

    pub fn controller(&self) -> &ViewportController<F> {
        &self.controller
    }

    pub fn controller_mut(&mut self) -> &mut ViewportController<F> {
        &mut self.controller
    }

    pub fn engine(&self) -> Result<&F::Engine, MapError> {
        self.controller.engine()
    }

    pub fn icons(&self) -> &IconCache<P> {
        &self.icons
    }

    pub fn points(&self) -> &[PointEntity] {
        &self.points
    }

    pub fn clustering(&self) -> &Clustering {
        &self.clustering
    }

    pub fn overlay(&self) -> &OverlayState {
        self.interaction.overlay()
    }

    pub fn diagnostics(&self) -> Diagnostics {
        self.diagnostics
    }

    pub fn last_error(&self) -> Option<&MapError> {
        self.last_error.as_ref()
    }

    /// Bring the engine up, then draw anything loaded while it was starting.
    pub async fn start(&mut self) -> Result<ReadySignal, MapError> {
        let signal = self.controller.initialize().await.map_err(|e| self.fail(e))?;
        self.on_ready().await?;
        Ok(signal)
    }

    /// Full re-initialization after a fatal engine error, or a fresh render
    /// after a render failure. Already loaded points are reused.
    pub async fn retry(&mut self) -> Result<ReadySignal, MapError> {
        let signal = if self.controller.fault().is_some() || !self.controller.is_ready() {
            self.controller.reinitialize().await.map_err(|e| self.fail(e))?
        } else {
            self.controller
                .ready_signal()
                .ok_or(MapError::EngineNotReady)?
        };
        self.last_error = None;
        if !self.points.is_empty() && !self.controller.has_pending() {
            self.controller.queue_pending(self.points.clone());
        }
        self.on_ready().await?;
        Ok(signal)
    }

    async fn on_ready(&mut self) -> Result<(), MapError> {
        let clusters = self.icons.prewarm_clusters();
        let engine = self.controller.engine_mut()?;
        for icon in &clusters {
            engine.register_image(&icon.key, icon);
        }
        if let Some(points) = self.controller.take_pending_after_grace().await {
            info!(points = points.len(), "Rendering points queued before the map was ready");
            self.render().await?;
        }
        if self.controller.lifecycle() == Lifecycle::Disposed {
            return Err(self.fail(MapError::Disposed));
        }
        Ok(())
    }

    /// Replace the point set with a new search result.
    pub async fn load(&mut self, records: &[RawRecord]) -> Result<LoadOutcome, MapError> {
        self.controller.ensure_live()?;
        let valid = validate::validate(records);
        self.stats = LocationStats::from_records(records);
        self.diagnostics.records = records.len();
        self.diagnostics.valid = valid.points.len();
        self.diagnostics.dropped = valid.dropped();
        self.interaction.close_overlay();
        self.recluster.cancel();

        let points = match valid.into_points() {
            Ok(points) => points,
            Err(err) => {
                self.points.clear();
                self.clustering = Clustering::default();
                if let Ok(engine) = self.controller.engine_mut() {
                    engine.clear_shapes();
                }
                warn!(records = records.len(), "No records have a valid location");
                return Err(self.fail(err));
            }
        };
        self.points = points;

        if !self.controller.is_ready() {
            self.controller.queue_pending(self.points.clone());
            return Ok(LoadOutcome::Queued {
                points: self.points.len(),
            });
        }
        let shapes = self.render().await?;
        Ok(LoadOutcome::Rendered { shapes })
    }

    /// Fit the camera to the points, draw them, then fetch photos.
    async fn render(&mut self) -> Result<usize, MapError> {
        let fitted = self.controller.fit(&self.points).map_err(|e| self.fail(e))?;
        let shapes = self.draw(&fitted)?;
        info!(
            points = self.points.len(),
            shapes,
            zoom = fitted.zoom,
            "Rendered people on the map"
        );
        self.resolve_point_icons().await?;
        Ok(shapes)
    }

    /// Cluster for `view` and replace every shape on the engine.
    fn draw(&mut self, view: &Viewport) -> Result<usize, MapError> {
        let clustering = cluster::cluster(&self.points, view, &self.cluster_options);
        let shapes = scene::build_shapes(&clustering);
        let mut icons: Vec<IconHandle> = clustering
            .clusters
            .iter()
            .map(|c| self.icons.cluster_icon(c.member_count))
            .collect();
        icons.extend(clustering.singletons.iter().map(|p| self.current_pin(p)));

        let engine = self.controller.engine_mut()?;
        for icon in &icons {
            engine.register_image(&icon.key, icon);
        }
        let count = shapes.len();
        match engine.replace_shapes(shapes) {
            Ok(()) => {
                self.clustering = clustering;
                Ok(count)
            }
            Err(err) => {
                warn!(%err, points = self.points.len(), "Render failed, showing default view");
                self.diagnostics.render_failures += 1;
                self.clustering = Clustering::default();
                engine.clear_shapes();
                // Camera is the one thing we can still leave in a sane state
                if let Err(view_err) = self.controller.default_view() {
                    warn!(%view_err, "Could not reset the camera after a failed render");
                }
                let err = match err {
                    MapError::RenderFailure(_) => err,
                    other => MapError::RenderFailure(other.to_string()),
                };
                Err(self.fail(err))
            }
        }
    }

    /// The finished pin if there is one, otherwise the placeholder under the same key.
    fn current_pin(&self, point: &PointEntity) -> IconHandle {
        match self.icons.peek_point_icon(&point.photo_ref, point.border) {
            IconLookup::Ready(handle) => handle,
            IconLookup::Pending => self.icons.placeholder_pin(&point.photo_ref, point.border),
        }
    }

    /// Build every person's pin and swap it in for the placeholder.
    async fn resolve_point_icons(&mut self) -> Result<(), MapError> {
        let mut set = JoinSet::new();
        let mut seen = std::collections::HashSet::new();
        for point in &self.points {
            if !seen.insert((point.photo_ref.clone(), point.border)) {
                continue;
            }
            let icons = self.icons.clone();
            let photo_ref = point.photo_ref.clone();
            let border = point.border;
            set.spawn(async move { icons.point_icon(&photo_ref, border).await });
        }

        let mut resolved = Vec::with_capacity(set.len());
        while let Some(joined) = set.join_next().await {
            match joined {
                Ok(handle) => resolved.push(handle),
                Err(err) => warn!(%err, "Icon task failed"),
            }
        }
        self.diagnostics.asset_failures = self.icons.asset_failures();

        let engine = self.controller.engine_mut()?;
        for handle in &resolved {
            engine.register_image(&handle.key, handle);
        }
        Ok(())
    }

    /// A zoom change happened: close the overlay and schedule re-clustering.
    pub fn on_zoom_changed(&mut self, now: Instant) -> Result<(), MapError> {
        let zoom = self.controller.camera()?.zoom;
        self.interaction.on_zoom_changed();
        self.recluster.trigger(now, zoom);
        Ok(())
    }

    /// Move the camera to `zoom` the way a wheel or pinch would.
    pub fn set_zoom(&mut self, zoom: f64) -> Result<Viewport, MapError> {
        let view = self.controller.camera()?;
        let view = self.controller.set_camera(view.with_zoom(zoom))?;
        self.on_zoom_changed(Instant::now())?;
        Ok(view)
    }

    pub fn zoom_in(&mut self) -> Result<Viewport, MapError> {
        let view = self.controller.zoom_in()?;
        self.on_zoom_changed(Instant::now())?;
        Ok(view)
    }

    pub fn zoom_out(&mut self) -> Result<Viewport, MapError> {
        let view = self.controller.zoom_out()?;
        self.on_zoom_changed(Instant::now())?;
        Ok(view)
    }

    /// Wait out the settle delay and re-cluster for the camera as it is now.
    /// Returns the new shape count, or `None` if nothing was scheduled.
    pub async fn settle(&mut self) -> Result<Option<usize>, MapError> {
        if self.recluster.settled().await.is_none() {
            return Ok(None);
        }
        self.recluster_now().map(Some)
    }

    /// Non-blocking variant of [`settle`](Self::settle) for host event loops.
    pub fn poll_recluster(&mut self, now: Instant) -> Result<Option<usize>, MapError> {
        if self.recluster.poll(now).is_none() {
            return Ok(None);
        }
        self.recluster_now().map(Some)
    }

    pub fn recluster_deadline(&self) -> Option<Instant> {
        self.recluster.deadline()
    }

    fn recluster_now(&mut self) -> Result<usize, MapError> {
        let view = self.controller.camera()?;
        self.draw(&view)
    }

    /// Feed a pointer event. A completed click on a shape opens its overlay;
    /// a completed click on the background closes the overlay.
    pub fn pointer(
        &mut self,
        source: PointerSource,
        event: PointerEvent,
        target: &ClickTarget,
    ) -> Option<Gesture> {
        let gesture = self.gestures.feed_from(source, event)?;
        match (gesture, target) {
            (Gesture::Click, ClickTarget::Shape(id)) => {
                if let Err(err) = self.activate(id) {
                    warn!(%err, shape = %id, "Clicked shape is gone");
                }
            }
            _ => {
                self.interaction.on_background_click(gesture, target);
            }
        }
        Some(gesture)
    }

    /// Open the overlay for a shape on the map.
    pub fn activate(&mut self, shape_id: &str) -> Result<&OverlayState, MapError> {
        if let Some(group) = self.clustering.find_cluster(shape_id) {
            let by_id: HashMap<&str, &PointEntity> =
                self.points.iter().map(|p| (p.id.as_str(), p)).collect();
            let members: Vec<&PointEntity> = group
                .member_point_ids
                .iter()
                .filter_map(|id| by_id.get(id.as_str()).copied())
                .collect();
            return Ok(self.interaction.show_cluster(group, &members, group.centroid));
        }
        match self.clustering.singletons.iter().find(|p| p.id == shape_id) {
            Some(point) => Ok(self.interaction.show_point(point, point.coordinate)),
            None => Err(MapError::RenderFailure(format!("no shape with id {shape_id}"))),
        }
    }

    /// Id of the shape currently showing a person: their pin or their cluster.
    pub fn shape_for_point(&self, point_id: &str) -> Option<String> {
        if let Some(group) = self
            .clustering
            .clusters
            .iter()
            .find(|c| c.member_point_ids.iter().any(|id| id == point_id))
        {
            return Some(group.cluster_id.clone());
        }
        self.clustering
            .singletons
            .iter()
            .find(|p| p.id == point_id)
            .map(|p| p.id.clone())
    }

    pub fn close_overlay(&mut self) -> bool {
        self.interaction.close_overlay()
    }

    /// Double activation: clusters zoom in until they come apart.
    /// Returns the new zoom, or `None` when the shape is not a cluster.
    pub fn double_click(&mut self, shape_id: &str) -> Result<Option<f64>, MapError> {
        let Some(group) = self.clustering.find_cluster(shape_id).cloned() else {
            return Ok(None);
        };
        let view = self.controller.camera()?;
        let members: Vec<&PointEntity> = self
            .points
            .iter()
            .filter(|p| group.member_point_ids.contains(&p.id))
            .collect();
        let query = cluster::expansion_zoom(&members, view.zoom, &self.cluster_options);
        if let Err(err) = &query {
            info!(%err, cluster = %group.cluster_id, "No expansion zoom, using fallback");
        }
        let zoom = expansion_target(query, view.zoom, &self.config);
        let view = self
            .controller
            .set_camera(view.with_center(group.centroid).with_zoom(zoom))?;
        self.on_zoom_changed(Instant::now())?;
        Ok(Some(view.zoom))
    }

    /// Right click. Two within the window zoom out one level.
    pub fn context_menu(&mut self, now: Instant) -> Result<Option<Viewport>, MapError> {
        if !self.context_menu.on_context_menu(now) {
            return Ok(None);
        }
        let view = self.controller.zoom_out()?;
        self.on_zoom_changed(now)?;
        Ok(Some(view))
    }

    /// The engine reported an unrecoverable error.
    pub fn report_engine_error(&mut self, message: impl Into<String>) -> MapError {
        let err = self.controller.report_fatal(message);
        self.interaction.close_overlay();
        self.last_error = Some(err.clone());
        err
    }

    pub fn debug_status(&self) -> DebugStatus {
        DebugStatus {
            lifecycle: self.controller.lifecycle(),
            ready: self.controller.is_ready(),
            ready_signal: self.controller.ready_signal(),
            zoom: self.controller.camera().ok().map(|v| v.zoom),
            loaded_points: self.points.len(),
            clusters: self.clustering.clusters.len(),
            singletons: self.clustering.singletons.len(),
            overlay: self.interaction.overlay().kind,
            diagnostics: self.diagnostics,
            stats: self.stats,
            last_error: self.last_error.as_ref().map(|e| e.user_message().to_string()),
        }
    }

    /// Host teardown.
    pub fn dispose(&mut self) {
        self.interaction.close_overlay();
        self.recluster.cancel();
        self.controller.dispose();
    }

    fn fail(&mut self, err: MapError) -> MapError {
        self.last_error = Some(err.clone());
        err
    }
}
