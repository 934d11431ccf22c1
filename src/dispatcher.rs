//! Single consumer of button events.
//!
//! Input threads and the signal thread only ever send into one bounded channel; this
//! loop is the only caller of the coordinator's event entry points.

use crate::coordinator::{FlowCoordinator, Outcome};
use crate::input::InputEvent;
use crossbeam_channel::{bounded, Receiver, Sender};

pub const EVENT_CHANNEL_CAPACITY: usize = 64;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlMessage {
    Button(InputEvent),
    Shutdown,
}

pub fn control_channel() -> (Sender<ControlMessage>, Receiver<ControlMessage>) {
    bounded(EVENT_CHANNEL_CAPACITY)
}

/// Why the dispatcher returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchExit {
    Shutdown,
    Disconnected,
}

/// Block on `rx` and feed every button event to the coordinator until shutdown.
///
/// Events that queued up while an action was running are discarded once it finishes,
/// so presses made during a long update never act on a later prompt.
pub fn run_dispatcher(coordinator: &FlowCoordinator, rx: &Receiver<ControlMessage>) -> DispatchExit {
    while let Ok(message) = rx.recv() {
        let input = match message {
            ControlMessage::Shutdown => return DispatchExit::Shutdown,
            ControlMessage::Button(input) => input,
        };
        let outcome = coordinator.handle_event(input.role, input.event);
        if outcome != Outcome::Ignored {
            tracing::debug!(
                pin = input.pin,
                role = %input.role,
                event = ?input.event,
                ?outcome,
                "button event handled"
            );
        }
        if outcome.ran_action() {
            if let Some(exit) = drain_stale(rx) {
                return exit;
            }
        }
    }
    DispatchExit::Disconnected
}

fn drain_stale(rx: &Receiver<ControlMessage>) -> Option<DispatchExit> {
    let mut dropped = 0usize;
    while let Ok(message) = rx.try_recv() {
        match message {
            ControlMessage::Shutdown => return Some(DispatchExit::Shutdown),
            ControlMessage::Button(_) => dropped += 1,
        }
    }
    if dropped > 0 {
        tracing::info!(dropped, "ignored button events queued during action");
    }
    None
}
