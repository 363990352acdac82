//! Engine lifecycle and the race that decides when the engine is ready.
//!
//! Three independent signals can make a freshly built engine usable: the
//! engine's own ready notification, a periodic check of its camera and layer
//! calls, and an absolute timeout. [`race_ready`] waits for whichever comes
//! first; [`Readiness::signal`] is the single transition into `Ready` and
//! ignores every signal after the first.

use std::time::Duration;

use serde::Serialize;
use tokio::sync::watch;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, error, info, warn};

use crate::config::EngineConfig;
use crate::engine::ReadyFuture;
use crate::error::MapError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum Lifecycle {
    Uninitialized,
    Initializing,
    Ready,
    Disposed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum ReadySignal {
    Native,
    Poll { attempt: u32 },
    Timeout,
}

#[derive(Debug)]
pub struct Readiness {
    state: Lifecycle,
    fired: Option<ReadySignal>,
    fault: Option<MapError>,
}

impl Default for Readiness {
    fn default() -> Self {
        Readiness::new()
    }
}

impl Readiness {
    pub fn new() -> Self {
        Readiness {
            state: Lifecycle::Uninitialized,
            fired: None,
            fault: None,
        }
    }

    pub fn state(&self) -> Lifecycle {
        self.state
    }

    pub fn is_ready(&self) -> bool {
        self.state == Lifecycle::Ready
    }

    /// The signal that made the engine ready, if any.
    pub fn fired_by(&self) -> Option<ReadySignal> {
        self.fired
    }

    pub fn fault(&self) -> Option<&MapError> {
        self.fault.as_ref()
    }

    /// Uninitialized -> Initializing. Clears a fault left by a failed start.
    pub fn begin(&mut self) -> Result<(), MapError> {
        match self.state {
            Lifecycle::Uninitialized => {
                self.state = Lifecycle::Initializing;
                self.fault = None;
                Ok(())
            }
            Lifecycle::Disposed => Err(MapError::Disposed),
            Lifecycle::Initializing | Lifecycle::Ready => Ok(()),
        }
    }

    /// Initializing -> Ready, for the first signal only. Returns whether this
    /// call made the transition.
    pub fn signal(&mut self, signal: ReadySignal) -> bool {
        if self.state != Lifecycle::Initializing || self.fired.is_some() {
            debug!(?signal, state = ?self.state, "Ignoring readiness signal");
            return false;
        }
        self.state = Lifecycle::Ready;
        self.fired = Some(signal);
        match signal {
            ReadySignal::Timeout => warn!("Engine never reported ready, forcing readiness"),
            _ => info!(?signal, "Map engine ready"),
        }
        true
    }

    /// Record an engine-reported fatal error. Not a lifecycle state: the
    /// engine stays where it is until re-initialized.
    pub fn report_fatal(&mut self, message: impl Into<String>) -> MapError {
        let err = MapError::EngineFatal(message.into());
        if self.state != Lifecycle::Disposed {
            error!(%err, state = ?self.state, "Map engine reported a fatal error");
            self.fault = Some(err.clone());
        }
        err
    }

    /// A start that failed before Ready: back to Uninitialized, keeping the
    /// error as the fault until the next `begin`.
    pub fn abort(&mut self, err: MapError) -> MapError {
        if self.state == Lifecycle::Disposed {
            return err;
        }
        error!(%err, "Map engine failed to start");
        self.state = Lifecycle::Uninitialized;
        self.fired = None;
        self.fault = Some(err.clone());
        err
    }

    /// Terminal.
    pub fn dispose(&mut self) {
        if self.state != Lifecycle::Disposed {
            info!("Map engine disposed");
        }
        self.state = Lifecycle::Disposed;
    }

    /// Back to Uninitialized for a full re-initialization.
    pub fn reset(&mut self) -> Result<(), MapError> {
        if self.state == Lifecycle::Disposed {
            return Err(MapError::Disposed);
        }
        self.state = Lifecycle::Uninitialized;
        self.fired = None;
        self.fault = None;
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ReadinessTimings {
    pub poll_interval: Duration,
    pub poll_attempts: u32,
    pub timeout: Duration,
}

impl From<&EngineConfig> for ReadinessTimings {
    fn from(config: &EngineConfig) -> Self {
        ReadinessTimings {
            poll_interval: config.ready_poll_interval(),
            poll_attempts: config.ready_poll_attempts,
            timeout: config.init_timeout(),
        }
    }
}

/// Wait for the first readiness signal.
///
/// Returns `Ok(None)` when `cancel` flips to `true` (or its sender goes away)
/// first, and the engine's error when it fails before any signal. Every
/// pending timer is dropped with the future.
pub async fn race_ready<F>(
    mut native: ReadyFuture,
    check: F,
    timings: ReadinessTimings,
    mut cancel: watch::Receiver<bool>,
) -> Result<Option<ReadySignal>, MapError>
where
    F: Fn() -> bool,
{
    if *cancel.borrow_and_update() {
        return Ok(None);
    }

    let deadline = tokio::time::sleep(timings.timeout);
    tokio::pin!(deadline);
    let first_tick = Instant::now() + timings.poll_interval;
    let mut ticker = tokio::time::interval_at(first_tick, timings.poll_interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut attempts = 0u32;

    loop {
        tokio::select! {
            biased;
            changed = cancel.changed() => {
                if changed.is_err() || *cancel.borrow_and_update() {
                    debug!("Readiness wait cancelled");
                    return Ok(None);
                }
            }
            outcome = &mut native => return outcome.map(|()| Some(ReadySignal::Native)),
            _ = &mut deadline => return Ok(Some(ReadySignal::Timeout)),
            _ = ticker.tick(), if attempts < timings.poll_attempts => {
                attempts += 1;
                if check() {
                    return Ok(Some(ReadySignal::Poll { attempt: attempts }));
                }
                debug!(attempts, "Engine not ready yet");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    fn timings() -> ReadinessTimings {
        ReadinessTimings::from(&EngineConfig::default())
    }

    fn never() -> ReadyFuture {
        Box::pin(std::future::pending())
    }

    #[test]
    fn test_first_signal_wins_in_any_order() {
        let signals = [
            ReadySignal::Native,
            ReadySignal::Poll { attempt: 4 },
            ReadySignal::Timeout,
        ];
        let orders = [[0, 1, 2], [0, 2, 1], [1, 0, 2], [1, 2, 0], [2, 0, 1], [2, 1, 0]];
        for order in orders {
            let mut r = Readiness::new();
            r.begin().unwrap();
            let fired: Vec<bool> = order.iter().map(|&i| r.signal(signals[i])).collect();
            assert_eq!(fired, vec![true, false, false]);
            assert_eq!(r.fired_by(), Some(signals[order[0]]));
            assert!(r.is_ready());
        }
    }

    #[test]
    fn test_signal_before_begin_is_ignored() {
        let mut r = Readiness::new();
        assert!(!r.signal(ReadySignal::Native));
        assert_eq!(r.state(), Lifecycle::Uninitialized);
    }

    #[test]
    fn test_disposed_is_terminal() {
        let mut r = Readiness::new();
        r.begin().unwrap();
        r.dispose();
        assert!(!r.signal(ReadySignal::Native));
        assert_eq!(r.begin(), Err(MapError::Disposed));
        assert_eq!(r.reset(), Err(MapError::Disposed));
        assert_eq!(r.state(), Lifecycle::Disposed);
    }

    #[test]
    fn test_fatal_is_recorded_and_cleared_by_reset() {
        let mut r = Readiness::new();
        r.begin().unwrap();
        r.signal(ReadySignal::Native);
        let err = r.report_fatal("webgl context lost");
        assert!(err.is_retryable());
        assert_eq!(r.fault(), Some(&err));
        assert_eq!(r.state(), Lifecycle::Ready);

        r.reset().unwrap();
        assert_eq!(r.state(), Lifecycle::Uninitialized);
        assert!(r.fault().is_none());
        assert!(r.fired_by().is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_native_ready_wins_immediately() {
        let (_tx, rx) = watch::channel(false);
        let signal = race_ready(Box::pin(async { Ok(()) }), || false, timings(), rx).await;
        assert_eq!(signal, Ok(Some(ReadySignal::Native)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_poll_succeeds_on_third_attempt() {
        let (_tx, rx) = watch::channel(false);
        let calls = Cell::new(0);
        let start = Instant::now();
        let signal = race_ready(
            never(),
            || {
                calls.set(calls.get() + 1);
                calls.get() == 3
            },
            timings(),
            rx,
        )
        .await;
        assert_eq!(signal, Ok(Some(ReadySignal::Poll { attempt: 3 })));
        assert_eq!(start.elapsed(), Duration::from_millis(1500));
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_forces_readiness() {
        let (_tx, rx) = watch::channel(false);
        let calls = Cell::new(0);
        let start = Instant::now();
        let signal = race_ready(
            never(),
            || {
                calls.set(calls.get() + 1);
                false
            },
            timings(),
            rx,
        )
        .await;
        assert_eq!(signal, Ok(Some(ReadySignal::Timeout)));
        assert_eq!(start.elapsed(), Duration::from_secs(10));
        // Ticks at 0.5s..9.5s ran; the deadline wins the tie at 10s
        assert_eq!(calls.get(), 19);
    }

    #[tokio::test(start_paused = true)]
    async fn test_polling_stops_after_attempt_limit() {
        let (_tx, rx) = watch::channel(false);
        let calls = Cell::new(0);
        let t = ReadinessTimings {
            poll_interval: Duration::from_millis(100),
            poll_attempts: 5,
            timeout: Duration::from_secs(2),
        };
        let signal = race_ready(
            never(),
            || {
                calls.set(calls.get() + 1);
                false
            },
            t,
            rx,
        )
        .await;
        assert_eq!(signal, Ok(Some(ReadySignal::Timeout)));
        assert_eq!(calls.get(), 5);
    }

    #[tokio::test(start_paused = true)]
    async fn test_engine_error_ends_the_race() {
        let (_tx, rx) = watch::channel(false);
        let failing: ReadyFuture = Box::pin(async {
            tokio::time::sleep(Duration::from_secs(3)).await;
            Err(MapError::EngineFatal("style failed to load".into()))
        });
        let start = Instant::now();
        let outcome = race_ready(failing, || false, timings(), rx).await;
        assert_eq!(outcome, Err(MapError::EngineFatal("style failed to load".into())));
        assert_eq!(start.elapsed(), Duration::from_secs(3));
    }

    #[test]
    fn test_abort_returns_to_uninitialized_and_begin_clears_fault() {
        let mut r = Readiness::new();
        r.begin().unwrap();
        let err = r.abort(MapError::EngineFatal("no context".into()));
        assert_eq!(err, MapError::EngineFatal("no context".into()));
        assert_eq!(r.state(), Lifecycle::Uninitialized);
        assert_eq!(r.fault(), Some(&err));

        r.begin().unwrap();
        assert_eq!(r.state(), Lifecycle::Initializing);
        assert!(r.fault().is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_stops_the_race() {
        let (tx, rx) = watch::channel(false);
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(2)).await;
            let _ = tx.send(true);
        });
        let start = Instant::now();
        let signal = race_ready(never(), || false, timings(), rx).await;
        assert_eq!(signal, Ok(None));
        assert_eq!(start.elapsed(), Duration::from_secs(2));
    }

    #[tokio::test(start_paused = true)]
    async fn test_already_cancelled() {
        let (_tx, rx) = watch::channel(true);
        let signal = race_ready(Box::pin(async { Ok(()) }), || true, timings(), rx).await;
        assert_eq!(signal, Ok(None));
    }
}
