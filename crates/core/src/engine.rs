//! The narrow interface to the rendering engine, plus an in-process engine.
//!
//! The controller owns exactly one engine at a time and is the only thing
//! that talks to it. Everything else goes through the controller.

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use crate::error::MapError;
use crate::icons::IconHandle;
use crate::models::Coordinate;
use crate::scene::Shape;
use crate::viewport::Viewport;

/// Resolves `Ok` on the engine's ready event, `Err` on an error it reports
/// before getting there.
pub type ReadyFuture = Pin<Box<dyn Future<Output = Result<(), MapError>> + Send + 'static>>;

pub trait MapEngine {
    /// Resolves when the engine announces it is ready or fails. May never resolve.
    fn native_ready(&mut self) -> ReadyFuture;

    /// Whether camera and layer calls would currently succeed.
    fn check_ready(&self) -> bool;

    fn camera(&self) -> Viewport;
    fn set_camera(&mut self, viewport: Viewport) -> Result<(), MapError>;

    /// Add or replace an image in the registry. Shapes using `key` pick it up.
    fn register_image(&mut self, key: &str, icon: &IconHandle);

    fn replace_shapes(&mut self, shapes: Vec<Shape>) -> Result<(), MapError>;
    fn clear_shapes(&mut self);

    fn attach_zoom_controls(&mut self);

    /// Release the engine. Further calls fail or do nothing.
    fn dispose(&mut self);
}

/// Builds engines for the controller; called again on every re-initialization.
pub trait EngineFactory {
    type Engine: MapEngine;

    fn create(&mut self, size: (f64, f64)) -> Result<Self::Engine, MapError>;
}

/// How a [`HeadlessEngine`] announces readiness on its own.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum NativeReady {
    Immediate,
    After(Duration),
    Never,
    /// Reports a fatal error after the delay instead of getting ready.
    Fail(Duration),
}

/// Engine that keeps the map surface in memory.
#[derive(Debug)]
pub struct HeadlessEngine {
    camera: Viewport,
    native: NativeReady,
    /// Checks answered "not ready" before the first "ready"; `None` never gets ready.
    checks_until_ready: Option<u32>,
    checks: AtomicU32,
    images: HashMap<String, IconHandle>,
    shapes: Vec<Shape>,
    zoom_controls: bool,
    fail_next_render: bool,
    renders: usize,
    disposed: bool,
}

impl HeadlessEngine {
    pub fn new(size: (f64, f64), native: NativeReady, checks_until_ready: Option<u32>) -> Self {
        HeadlessEngine {
            camera: Viewport::new(Coordinate::new(0.0, 0.0), 1.0, size),
            native,
            checks_until_ready,
            checks: AtomicU32::new(0),
            images: HashMap::new(),
            shapes: Vec::new(),
            zoom_controls: false,
            fail_next_render: false,
            renders: 0,
            disposed: false,
        }
    }

    pub fn images(&self) -> &HashMap<String, IconHandle> {
        &self.images
    }

    pub fn image(&self, key: &str) -> Option<&IconHandle> {
        self.images.get(key)
    }

    pub fn shapes(&self) -> &[Shape] {
        &self.shapes
    }

    pub fn zoom_controls_attached(&self) -> bool {
        self.zoom_controls
    }

    pub fn check_count(&self) -> u32 {
        self.checks.load(Ordering::SeqCst)
    }

    pub fn render_count(&self) -> usize {
        self.renders
    }

    pub fn is_disposed(&self) -> bool {
        self.disposed
    }

    /// Make the next `replace_shapes` fail, as a broken layer would.
    pub fn fail_next_render(&mut self) {
        self.fail_next_render = true;
    }
}

impl MapEngine for HeadlessEngine {
    fn native_ready(&mut self) -> ReadyFuture {
        match self.native {
            NativeReady::Immediate => Box::pin(async { Ok(()) }),
            NativeReady::After(delay) => Box::pin(async move {
                tokio::time::sleep(delay).await;
                Ok(())
            }),
            NativeReady::Never => Box::pin(std::future::pending()),
            NativeReady::Fail(delay) => Box::pin(async move {
                tokio::time::sleep(delay).await;
                Err(MapError::EngineFatal("style failed to load".into()))
            }),
        }
    }

    fn check_ready(&self) -> bool {
        let seen = self.checks.fetch_add(1, Ordering::SeqCst);
        !self.disposed && self.checks_until_ready.is_some_and(|n| seen >= n)
    }

    fn camera(&self) -> Viewport {
        self.camera
    }

    fn set_camera(&mut self, viewport: Viewport) -> Result<(), MapError> {
        if self.disposed {
            return Err(MapError::Disposed);
        }
        self.camera = viewport;
        Ok(())
    }

    fn register_image(&mut self, key: &str, icon: &IconHandle) {
        if !self.disposed {
            self.images.insert(key.to_string(), icon.clone());
        }
    }

    fn replace_shapes(&mut self, shapes: Vec<Shape>) -> Result<(), MapError> {
        if self.disposed {
            return Err(MapError::Disposed);
        }
        if std::mem::take(&mut self.fail_next_render) {
            return Err(MapError::RenderFailure("symbol layer rejected the data source".into()));
        }
        self.shapes = shapes;
        self.renders += 1;
        Ok(())
    }

    fn clear_shapes(&mut self) {
        self.shapes.clear();
    }

    fn attach_zoom_controls(&mut self) {
        self.zoom_controls = true;
    }

    fn dispose(&mut self) {
        self.disposed = true;
        self.shapes.clear();
        self.images.clear();
    }
}

/// Factory for [`HeadlessEngine`]s that all behave the same way.
#[derive(Debug, Clone)]
pub struct HeadlessFactory {
    pub native: NativeReady,
    pub checks_until_ready: Option<u32>,
    /// Fail this many `create` calls before succeeding.
    pub failing_creates: u32,
    created: usize,
}

impl HeadlessFactory {
    pub fn new(native: NativeReady, checks_until_ready: Option<u32>) -> Self {
        HeadlessFactory {
            native,
            checks_until_ready,
            failing_creates: 0,
            created: 0,
        }
    }

    /// Engines successfully created so far.
    pub fn created(&self) -> usize {
        self.created
    }
}

impl Default for HeadlessFactory {
    fn default() -> Self {
        HeadlessFactory::new(NativeReady::Immediate, Some(0))
    }
}

impl EngineFactory for HeadlessFactory {
    type Engine = HeadlessEngine;

    fn create(&mut self, size: (f64, f64)) -> Result<HeadlessEngine, MapError> {
        if self.failing_creates > 0 {
            self.failing_creates -= 1;
            return Err(MapError::EngineFatal("engine construction failed".into()));
        }
        self.created += 1;
        Ok(HeadlessEngine::new(size, self.native, self.checks_until_ready))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_check_turns_ready_after_count() {
        let engine = HeadlessEngine::new((100.0, 100.0), NativeReady::Never, Some(2));
        assert!(!engine.check_ready());
        assert!(!engine.check_ready());
        assert!(engine.check_ready());
        assert_eq!(engine.check_count(), 3);

        let never = HeadlessEngine::new((100.0, 100.0), NativeReady::Never, None);
        assert!(!never.check_ready());
    }

    #[test]
    fn test_failed_render_keeps_previous_shapes() {
        let mut engine = HeadlessEngine::new((100.0, 100.0), NativeReady::Immediate, Some(0));
        engine.fail_next_render();
        let err = engine.replace_shapes(Vec::new()).unwrap_err();
        assert!(matches!(err, MapError::RenderFailure(_)));
        assert_eq!(engine.render_count(), 0);
        // Only the next render fails
        engine.replace_shapes(Vec::new()).unwrap();
        assert_eq!(engine.render_count(), 1);
    }

    #[test]
    fn test_disposed_engine_rejects_calls() {
        let mut engine = HeadlessEngine::new((100.0, 100.0), NativeReady::Immediate, Some(0));
        engine.dispose();
        assert!(engine.is_disposed());
        assert_eq!(engine.set_camera(engine.camera()), Err(MapError::Disposed));
        assert!(!engine.check_ready());
    }

    #[tokio::test(start_paused = true)]
    async fn test_native_failure_resolves_to_error() {
        let mut engine =
            HeadlessEngine::new((100.0, 100.0), NativeReady::Fail(Duration::from_secs(1)), None);
        let err = engine.native_ready().await.unwrap_err();
        assert_eq!(err, MapError::EngineFatal("style failed to load".into()));
        let mut ready =
            HeadlessEngine::new((100.0, 100.0), NativeReady::After(Duration::from_secs(1)), None);
        assert_eq!(ready.native_ready().await, Ok(()));
    }

    #[test]
    fn test_factory_counts_and_failures() {
        let mut factory = HeadlessFactory::default();
        factory.failing_creates = 1;
        assert!(factory.create((10.0, 10.0)).is_err());
        assert!(factory.create((10.0, 10.0)).is_ok());
        assert_eq!(factory.created(), 1);
    }
}
