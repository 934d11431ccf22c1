//! Hold-duration measurement and threshold policy.

use std::time::{Duration, Instant};

/// Remembers the most recent press of one button.
#[derive(Debug, Default, Clone)]
pub struct HoldTimer {
    pressed_at: Option<Instant>,
}

impl HoldTimer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn press(&mut self, at: Instant) {
        self.pressed_at = Some(at);
    }

    /// Elapsed time since the recorded press. A release with no recorded press yields
    /// `None` so it cannot be mistaken for a very long hold.
    pub fn release(&mut self, at: Instant) -> Option<Duration> {
        self.pressed_at
            .take()
            .map(|start| at.saturating_duration_since(start))
    }

    pub fn is_pressed(&self) -> bool {
        self.pressed_at.is_some()
    }
}

/// Which of a flow's two actions a hold selected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HoldSelection {
    Lesser,
    Greater,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HoldThresholds {
    pub low: Duration,
    pub high: Duration,
}

impl HoldThresholds {
    pub fn new(low: Duration, high: Duration) -> Self {
        Self { low, high }
    }

    pub fn from_secs(low: f64, high: f64) -> Self {
        Self::new(Duration::from_secs_f64(low), Duration::from_secs_f64(high))
    }

    /// `[0, low)` selects nothing, `[low, high)` the lesser action, `[high, ∞)` the greater.
    pub fn select(&self, held: Duration) -> Option<HoldSelection> {
        if held < self.low {
            None
        } else if held < self.high {
            Some(HoldSelection::Lesser)
        } else {
            Some(HoldSelection::Greater)
        }
    }
}
