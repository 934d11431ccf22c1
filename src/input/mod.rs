//! Turns raw line edges into normalized button events.
//!
//! [`ButtonTracker`] is pure state (debounce + hold timing) so it can be driven from
//! tests; [`gpio`] owns the character-device threads that feed it.

pub mod gpio;

use crate::config::ButtonConfig;
use crate::hold::HoldTimer;
use crate::model::{ButtonEvent, ButtonRole};
use std::fmt;
use std::time::{Duration, Instant};

pub use gpio::{spawn_inputs, InputThreads};

/// Logical edge after polarity has been applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RawEdge {
    Down,
    Up,
}

impl RawEdge {
    /// Map an electrical edge to a logical one. Pull-up buttons are active low.
    pub fn from_level_change(rising: bool, pull_up: bool) -> Self {
        if rising != pull_up {
            RawEdge::Down
        } else {
            RawEdge::Up
        }
    }
}

/// One normalized event tagged with the button it came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InputEvent {
    pub role: ButtonRole,
    pub pin: u32,
    pub event: ButtonEvent,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InputError {
    Chip { path: String, message: String },
    Line { pin: u32, message: String },
    NoButtons,
    Unsupported,
}

impl fmt::Display for InputError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InputError::Chip { path, message } => {
                write!(f, "failed to open GPIO chip {path}: {message}")
            }
            InputError::Line { pin, message } => {
                write!(f, "failed to register button on pin {pin}: {message}")
            }
            InputError::NoButtons => write!(f, "no button could be registered"),
            InputError::Unsupported => {
                write!(f, "GPIO input support was not compiled in (feature `gpio`)")
            }
        }
    }
}

impl std::error::Error for InputError {}

/// Debounce and hold tracking for a single button.
#[derive(Debug, Clone)]
pub struct ButtonTracker {
    role: ButtonRole,
    pin: u32,
    bounce: Duration,
    reports_hold: bool,
    last_accepted: Option<Instant>,
    down: bool,
    hold: HoldTimer,
}

impl ButtonTracker {
    pub fn new(config: &ButtonConfig) -> Self {
        if config.hold_repeat {
            tracing::warn!(
                pin = config.pin,
                role = %config.role,
                "hold_repeat is accepted for compatibility but has no effect"
            );
        }
        Self {
            role: config.role,
            pin: config.pin,
            bounce: Duration::try_from_secs_f64(config.bounce_time).unwrap_or_default(),
            reports_hold: config.hold_time.is_some(),
            last_accepted: None,
            down: false,
            hold: HoldTimer::new(),
        }
    }

    pub fn role(&self) -> ButtonRole {
        self.role
    }

    pub fn pin(&self) -> u32 {
        self.pin
    }

    /// Feed one edge; returns the events it produces (zero, one, or two).
    pub fn on_edge(&mut self, edge: RawEdge, at: Instant) -> Vec<InputEvent> {
        if let Some(last) = self.last_accepted {
            if at.saturating_duration_since(last) < self.bounce {
                tracing::trace!(pin = self.pin, ?edge, "edge inside bounce window");
                return Vec::new();
            }
        }
        let is_down = edge == RawEdge::Down;
        if is_down == self.down {
            // Repeated edge in the same direction: a missed transition, not a press.
            return Vec::new();
        }
        self.last_accepted = Some(at);
        self.down = is_down;

        let mut events = Vec::with_capacity(2);
        if is_down {
            if self.reports_hold {
                self.hold.press(at);
            }
            events.push(self.tag(ButtonEvent::Press));
        } else {
            events.push(self.tag(ButtonEvent::Release));
            if self.reports_hold {
                if let Some(duration) = self.hold.release(at) {
                    events.push(self.tag(ButtonEvent::HoldReleased { duration }));
                }
            }
        }
        events
    }

    fn tag(&self, event: ButtonEvent) -> InputEvent {
        InputEvent {
            role: self.role,
            pin: self.pin,
            event,
        }
    }
}
