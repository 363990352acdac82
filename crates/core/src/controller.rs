//! Owner of the map engine: lifecycle, camera and pending data.

use std::sync::Arc;

use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::config::EngineConfig;
use crate::engine::{EngineFactory, MapEngine};
use crate::error::MapError;
use crate::models::PointEntity;
use crate::readiness::{race_ready, Lifecycle, Readiness, ReadinessTimings, ReadySignal};
use crate::viewport::{self, Viewport};

/// Cancels in-flight readiness waits and grace delays from anywhere.
#[derive(Debug, Clone)]
pub struct TeardownHandle(Arc<watch::Sender<bool>>);

impl TeardownHandle {
    pub fn teardown(&self) {
        self.0.send_replace(true);
    }

    pub fn is_torn_down(&self) -> bool {
        *self.0.borrow()
    }
}

pub struct ViewportController<F: EngineFactory> {
    config: EngineConfig,
    factory: F,
    engine: Option<F::Engine>,
    readiness: Readiness,
    teardown: TeardownHandle,
    pending: Option<Vec<PointEntity>>,
}

impl<F: EngineFactory> ViewportController<F> {
    pub fn new(config: EngineConfig, factory: F) -> Self {
        let (tx, _) = watch::channel(false);
        ViewportController {
            config,
            factory,
            engine: None,
            readiness: Readiness::new(),
            teardown: TeardownHandle(Arc::new(tx)),
            pending: None,
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn factory(&self) -> &F {
        &self.factory
    }

    pub fn factory_mut(&mut self) -> &mut F {
        &mut self.factory
    }

    /// Disposed as soon as a teardown has been requested, even before the
    /// controller has released the engine.
    pub fn lifecycle(&self) -> Lifecycle {
        if self.teardown.is_torn_down() {
            Lifecycle::Disposed
        } else {
            self.readiness.state()
        }
    }

    pub fn is_ready(&self) -> bool {
        self.readiness.is_ready() && !self.teardown.is_torn_down()
    }

    pub fn ready_signal(&self) -> Option<ReadySignal> {
        self.readiness.fired_by()
    }

    pub fn fault(&self) -> Option<&MapError> {
        self.readiness.fault()
    }

    pub fn teardown_handle(&self) -> TeardownHandle {
        self.teardown.clone()
    }

    /// Build an engine and wait until it is usable.
    ///
    /// Returns the signal that made it ready. A teardown during the wait
    /// disposes the controller.
    ///
    /// An engine that fails to build, or reports an error before it is ready,
    /// is released and the controller goes back to Uninitialized with the
    /// error kept as its fault. Calling this again starts over.
    pub async fn initialize(&mut self) -> Result<ReadySignal, MapError> {
        self.ensure_live()?;
        if self.readiness.is_ready() {
            return match (self.readiness.fault(), self.readiness.fired_by()) {
                (Some(fault), _) => Err(fault.clone()),
                (None, Some(signal)) => Ok(signal),
                (None, None) => Err(MapError::EngineNotReady),
            };
        }
        self.readiness.begin()?;

        let mut engine = match self.factory.create(self.config.viewport_size()) {
            Ok(engine) => engine,
            Err(err) => return Err(self.readiness.abort(err)),
        };
        info!("Map engine created, waiting for readiness");

        let native = engine.native_ready();
        let outcome = race_ready(
            native,
            || engine.check_ready(),
            ReadinessTimings::from(&self.config),
            self.teardown.0.subscribe(),
        )
        .await;

        match outcome {
            Ok(Some(signal)) => {
                self.engine = Some(engine);
                self.signal_ready(signal)?;
                Ok(signal)
            }
            Ok(None) => {
                self.engine = Some(engine);
                self.dispose();
                Err(MapError::Disposed)
            }
            Err(err) => {
                engine.dispose();
                Err(self.readiness.abort(err))
            }
        }
    }

    /// Finish a teardown requested through a [`TeardownHandle`].
    /// `Err(Disposed)` once the controller is, or has just been, disposed.
    pub fn ensure_live(&mut self) -> Result<(), MapError> {
        if self.teardown.is_torn_down() || self.readiness.state() == Lifecycle::Disposed {
            self.dispose();
            return Err(MapError::Disposed);
        }
        Ok(())
    }

    /// The single transition into Ready. Later signals are ignored.
    pub fn signal_ready(&mut self, signal: ReadySignal) -> Result<bool, MapError> {
        if self.engine.is_none() {
            return Err(MapError::EngineNotReady);
        }
        if !self.readiness.signal(signal) {
            return Ok(false);
        }
        let view = Viewport::default_view(&self.config);
        let engine = self.engine_mut()?;
        engine.set_camera(view)?;
        engine.attach_zoom_controls();
        Ok(true)
    }

    /// Hold a point set until the engine is ready.
    pub fn queue_pending(&mut self, points: Vec<PointEntity>) {
        debug!(points = points.len(), "Queued points until the map is ready");
        self.pending = Some(points);
    }

    pub fn has_pending(&self) -> bool {
        self.pending.is_some()
    }

    /// Pending points once the engine is ready and the grace delay has passed.
    ///
    /// `None` when nothing is pending, the engine is not ready, or teardown
    /// happens during the delay. A teardown disposes the controller.
    pub async fn take_pending_after_grace(&mut self) -> Option<Vec<PointEntity>> {
        if self.ensure_live().is_err() || !self.is_ready() || self.pending.is_none() {
            return None;
        }
        let mut cancel = self.teardown.0.subscribe();
        tokio::select! {
            _ = tokio::time::sleep(self.config.pending_grace()) => {}
            _ = cancel.changed() => {
                debug!("Grace delay cancelled");
                self.dispose();
                return None;
            }
        }
        if !self.is_ready() {
            return None;
        }
        self.pending.take()
    }

    pub fn engine(&self) -> Result<&F::Engine, MapError> {
        self.check_usable()?;
        self.engine.as_ref().ok_or(MapError::EngineNotReady)
    }

    pub fn engine_mut(&mut self) -> Result<&mut F::Engine, MapError> {
        self.check_usable()?;
        self.engine.as_mut().ok_or(MapError::EngineNotReady)
    }

    fn check_usable(&self) -> Result<(), MapError> {
        match self.lifecycle() {
            Lifecycle::Disposed => Err(MapError::Disposed),
            Lifecycle::Ready => match self.readiness.fault() {
                Some(fault) => Err(fault.clone()),
                None => Ok(()),
            },
            Lifecycle::Uninitialized | Lifecycle::Initializing => Err(MapError::EngineNotReady),
        }
    }

    pub fn camera(&self) -> Result<Viewport, MapError> {
        Ok(self.engine()?.camera())
    }

    /// Move the camera, keeping zoom inside the configured range.
    pub fn set_camera(&mut self, view: Viewport) -> Result<Viewport, MapError> {
        let view = view.with_zoom(self.config.clamp_zoom(view.zoom));
        self.engine_mut()?.set_camera(view)?;
        Ok(view)
    }

    pub fn zoom_in(&mut self) -> Result<Viewport, MapError> {
        let view = self.camera()?;
        self.set_camera(view.with_zoom((view.zoom + 1.0).min(self.config.max_zoom)))
    }

    pub fn zoom_out(&mut self) -> Result<Viewport, MapError> {
        let view = self.camera()?;
        self.set_camera(view.with_zoom((view.zoom - 1.0).max(self.config.min_zoom)))
    }

    pub fn fit(&mut self, points: &[PointEntity]) -> Result<Viewport, MapError> {
        let current = self.camera()?;
        let view = viewport::fit_points(points, &current, &self.config);
        self.set_camera(view)
    }

    pub fn default_view(&mut self) -> Result<Viewport, MapError> {
        self.set_camera(Viewport::default_view(&self.config))
    }

    /// Record an engine-reported fatal error; every engine call fails until
    /// [`reinitialize`](Self::reinitialize).
    pub fn report_fatal(&mut self, message: impl Into<String>) -> MapError {
        self.readiness.report_fatal(message)
    }

    /// Host teardown. Cancels waits, releases the engine, drops pending data.
    pub fn dispose(&mut self) {
        self.teardown.teardown();
        if let Some(mut engine) = self.engine.take() {
            engine.dispose();
        }
        self.pending = None;
        self.readiness.dispose();
    }

    /// Dispose the current engine and run initialization again from scratch.
    /// Pending points survive.
    pub async fn reinitialize(&mut self) -> Result<ReadySignal, MapError> {
        self.readiness.reset()?;
        if let Some(mut engine) = self.engine.take() {
            engine.dispose();
        }
        warn!("Re-initializing map engine");
        self.initialize().await
    }
}
