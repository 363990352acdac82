use std::time::Duration;

use tokio::time::Instant;

/// Coalesces a burst of triggers into one value, delivered once the burst
/// has been quiet for the settle window.
///
/// Each trigger restarts the window and replaces the held value, so only the
/// most recent value is ever delivered.
#[derive(Debug)]
pub struct Debouncer<T> {
    settle: Duration,
    deadline: Option<Instant>,
    latest: Option<T>,
}

impl<T> Debouncer<T> {
    pub fn new(settle: Duration) -> Self {
        Debouncer {
            settle,
            deadline: None,
            latest: None,
        }
    }

    pub fn trigger(&mut self, now: Instant, value: T) {
        self.deadline = Some(now + self.settle);
        self.latest = Some(value);
    }

    /// The held value if the window has elapsed by `now`.
    pub fn poll(&mut self, now: Instant) -> Option<T> {
        match self.deadline {
            Some(deadline) if deadline <= now => {
                self.deadline = None;
                self.latest.take()
            }
            _ => None,
        }
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    pub fn is_pending(&self) -> bool {
        self.deadline.is_some()
    }

    /// Drop whatever is held.
    pub fn cancel(&mut self) {
        self.deadline = None;
        self.latest = None;
    }

    /// Sleep until the window closes and hand back the value.
    pub async fn settled(&mut self) -> Option<T> {
        let deadline = self.deadline?;
        tokio::time::sleep_until(deadline).await;
        self.poll(Instant::now())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_burst_delivers_only_last_value() {
        let mut d = Debouncer::new(Duration::from_millis(50));
        let t0 = Instant::now();
        d.trigger(t0, 3.0);
        d.trigger(t0 + Duration::from_millis(20), 3.5);
        d.trigger(t0 + Duration::from_millis(40), 4.25);
        // Restarted by the last trigger, so not ready at 60ms
        assert_eq!(d.poll(t0 + Duration::from_millis(60)), None);
        assert_eq!(d.poll(t0 + Duration::from_millis(90)), Some(4.25));
        assert!(!d.is_pending());
        assert_eq!(d.poll(t0 + Duration::from_millis(200)), None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_settled_waits_for_window() {
        let mut d = Debouncer::new(Duration::from_millis(50));
        let start = Instant::now();
        d.trigger(start, "zoom 5");
        assert_eq!(d.settled().await, Some("zoom 5"));
        assert_eq!(start.elapsed(), Duration::from_millis(50));
        assert_eq!(d.settled().await, None);
    }

    #[test]
    fn test_cancel_drops_value() {
        let mut d = Debouncer::new(Duration::from_millis(50));
        let now = Instant::now();
        d.trigger(now, 1);
        d.cancel();
        assert_eq!(d.poll(now + Duration::from_secs(1)), None);
    }
}
