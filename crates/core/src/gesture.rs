use std::time::Duration;

use tokio::time::Instant;
use tracing::trace;

use crate::projection::PixelPoint;

/// Where a pointer event was observed. The same physical gesture may be
/// reported by both; they feed one classifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PointerSource {
    EngineBus,
    Container,
}

/// Pointer event in screen pixels.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PointerEvent {
    Down(PixelPoint),
    Move(PixelPoint),
    Up(PixelPoint),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Gesture {
    Click,
    Drag,
}

/// Classifies press-move-release sequences as click or drag.
///
/// Moving further than the threshold from the press position makes the
/// sequence a drag until the next press, even if the pointer comes back.
/// A release with no press in progress is not a gesture, unless it repeats
/// the release that just ended a sequence.
#[derive(Debug, Clone)]
pub struct GestureDisambiguator {
    threshold: f64,
    anchor: Option<PixelPoint>,
    pressed: bool,
    dragging: bool,
    released_at: Option<PixelPoint>,
    last: Option<Gesture>,
}

impl GestureDisambiguator {
    pub fn new(threshold_px: f64) -> Self {
        GestureDisambiguator {
            threshold: threshold_px,
            anchor: None,
            pressed: false,
            dragging: false,
            released_at: None,
            last: None,
        }
    }

    pub fn feed_from(&mut self, source: PointerSource, event: PointerEvent) -> Option<Gesture> {
        trace!(?source, ?event, "Pointer event");
        self.feed(event)
    }

    /// Returns the verdict on release, `None` otherwise.
    pub fn feed(&mut self, event: PointerEvent) -> Option<Gesture> {
        match event {
            PointerEvent::Down(at) => {
                // Second report of a press we already have
                if self.pressed && self.anchor == Some(at) {
                    return None;
                }
                self.anchor = Some(at);
                self.pressed = true;
                self.dragging = false;
                self.released_at = None;
                None
            }
            PointerEvent::Move(at) => {
                if let (true, Some(anchor)) = (self.pressed, self.anchor) {
                    if !self.dragging && anchor.distance(at) > self.threshold {
                        self.dragging = true;
                    }
                }
                None
            }
            PointerEvent::Up(at) => {
                if !self.pressed {
                    // Second report of the release we already classified
                    if self.released_at == Some(at) {
                        return self.last;
                    }
                    return None;
                }
                self.pressed = false;
                self.released_at = Some(at);
                let verdict = if self.dragging {
                    Gesture::Drag
                } else {
                    Gesture::Click
                };
                self.last = Some(verdict);
                Some(verdict)
            }
        }
    }

    pub fn is_dragging(&self) -> bool {
        self.dragging
    }

    /// Verdict of the most recent completed sequence.
    pub fn last_gesture(&self) -> Option<Gesture> {
        self.last
    }
}

/// Detects two context-menu events within the window.
#[derive(Debug, Clone)]
pub struct ContextMenuTracker {
    window: Duration,
    last: Option<Instant>,
}

impl ContextMenuTracker {
    pub fn new(window: Duration) -> Self {
        ContextMenuTracker { window, last: None }
    }

    /// True when this right click completes a double right click.
    pub fn on_context_menu(&mut self, now: Instant) -> bool {
        match self.last.take() {
            Some(prev) if now.saturating_duration_since(prev) <= self.window => true,
            _ => {
                self.last = Some(now);
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use super::PointerEvent::{Down, Move, Up};

    fn p(x: f64, y: f64) -> PixelPoint {
        PixelPoint::new(x, y)
    }

    #[test]
    fn test_small_move_is_click() {
        let mut g = GestureDisambiguator::new(5.0);
        g.feed(Down(p(100.0, 100.0)));
        g.feed(Move(p(103.0, 102.0)));
        assert_eq!(g.feed(Up(p(103.0, 102.0))), Some(Gesture::Click));
    }

    #[test]
    fn test_large_move_is_drag() {
        let mut g = GestureDisambiguator::new(5.0);
        g.feed(Down(p(100.0, 100.0)));
        g.feed(Move(p(110.0, 100.0)));
        assert_eq!(g.feed(Up(p(110.0, 100.0))), Some(Gesture::Drag));
    }

    #[test]
    fn test_drag_is_sticky_until_next_press() {
        let mut g = GestureDisambiguator::new(5.0);
        g.feed(Down(p(0.0, 0.0)));
        g.feed(Move(p(20.0, 0.0)));
        g.feed(Move(p(0.0, 0.0)));
        assert!(g.is_dragging());
        assert_eq!(g.feed(Up(p(0.0, 0.0))), Some(Gesture::Drag));

        g.feed(Down(p(50.0, 50.0)));
        assert!(!g.is_dragging());
        assert_eq!(g.feed(Up(p(50.0, 50.0))), Some(Gesture::Click));
    }

    #[test]
    fn test_exact_threshold_is_still_click() {
        let mut g = GestureDisambiguator::new(5.0);
        g.feed(Down(p(0.0, 0.0)));
        g.feed(Move(p(3.0, 4.0)));
        assert_eq!(g.feed(Up(p(3.0, 4.0))), Some(Gesture::Click));
    }

    #[test]
    fn test_both_sources_reach_one_verdict() {
        let mut g = GestureDisambiguator::new(5.0);
        let events = [Down(p(10.0, 10.0)), Move(p(30.0, 10.0)), Up(p(30.0, 10.0))];
        let mut verdicts = Vec::new();
        for ev in events {
            for source in [PointerSource::EngineBus, PointerSource::Container] {
                if let Some(v) = g.feed_from(source, ev) {
                    verdicts.push(v);
                }
            }
        }
        assert_eq!(verdicts, vec![Gesture::Drag, Gesture::Drag]);
    }

    #[test]
    fn test_release_without_press() {
        let mut g = GestureDisambiguator::new(5.0);
        assert_eq!(g.feed(Move(p(40.0, 40.0))), None);
        assert_eq!(g.feed(Up(p(40.0, 40.0))), None);
    }

    #[test]
    fn test_stray_release_after_click_is_ignored() {
        let mut g = GestureDisambiguator::new(5.0);
        g.feed(Down(p(10.0, 10.0)));
        assert_eq!(g.feed(Up(p(10.0, 10.0))), Some(Gesture::Click));
        assert_eq!(g.last_gesture(), Some(Gesture::Click));

        // Pointer pressed elsewhere, released over the map
        assert_eq!(g.feed(Up(p(400.0, 300.0))), None);
        assert_eq!(g.feed_from(PointerSource::Container, Up(p(400.0, 300.0))), None);
        // The real release reported again still gets its verdict
        assert_eq!(g.feed_from(PointerSource::Container, Up(p(10.0, 10.0))), Some(Gesture::Click));
    }

    #[test]
    fn test_double_right_click_window() {
        let mut t = ContextMenuTracker::new(Duration::from_millis(300));
        let t0 = Instant::now();
        assert!(!t.on_context_menu(t0));
        assert!(t.on_context_menu(t0 + Duration::from_millis(250)));
        // A third click starts over
        assert!(!t.on_context_menu(t0 + Duration::from_millis(400)));
        // Too slow
        assert!(!t.on_context_menu(t0 + Duration::from_millis(800)));
        assert!(t.on_context_menu(t0 + Duration::from_millis(900)));
    }
}
