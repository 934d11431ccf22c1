//! One reader thread per button on the Linux GPIO character device.

use super::{InputError, InputEvent};
use crate::config::ButtonConfig;
use crate::dispatcher::ControlMessage;
use crossbeam_channel::Sender;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;

/// Label shown by `gpioinfo` for lines we hold.
#[cfg_attr(not(feature = "gpio"), allow(dead_code))]
const CONSUMER: &str = "padd-control";
/// How often a reader thread re-checks the stop flag while the line is quiet.
#[cfg_attr(not(feature = "gpio"), allow(dead_code))]
const POLL_INTERVAL_MS: i32 = 200;

/// Running reader threads. Lines are released when each thread drops its handle.
pub struct InputThreads {
    stop: Arc<AtomicBool>,
    handles: Vec<JoinHandle<()>>,
}

impl InputThreads {
    pub fn len(&self) -> usize {
        self.handles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }

    /// Signal every reader to exit and wait for them.
    pub fn shutdown(self) {
        self.stop.store(true, Ordering::SeqCst);
        for handle in self.handles {
            if handle.join().is_err() {
                tracing::warn!("button reader thread panicked");
            }
        }
    }
}

/// Forward one event without blocking the reader; a full queue drops the event.
#[cfg_attr(not(feature = "gpio"), allow(dead_code))]
fn forward(tx: &Sender<ControlMessage>, input: InputEvent) -> bool {
    use crossbeam_channel::TrySendError;
    match tx.try_send(ControlMessage::Button(input)) {
        Ok(()) => true,
        Err(TrySendError::Full(_)) => {
            tracing::warn!(pin = input.pin, event = ?input.event, "event queue full; dropping");
            true
        }
        Err(TrySendError::Disconnected(_)) => false,
    }
}

#[cfg(feature = "gpio")]
pub fn spawn_inputs(
    chip_path: &Path,
    buttons: &[ButtonConfig],
    tx: &Sender<ControlMessage>,
) -> Result<InputThreads, InputError> {
    use gpio_cdev::Chip;

    let mut chip = Chip::new(chip_path).map_err(|err| InputError::Chip {
        path: chip_path.display().to_string(),
        message: err.to_string(),
    })?;
    let stop = Arc::new(AtomicBool::new(false));
    let mut handles = Vec::with_capacity(buttons.len());
    for button in buttons {
        match cdev::watch_line(&mut chip, button, tx.clone(), stop.clone()) {
            Ok(handle) => {
                tracing::info!(
                    pin = button.pin,
                    role = %button.role,
                    pull_up = button.pull_up,
                    hold = button.hold_time.is_some(),
                    "button registered"
                );
                handles.push(handle);
            }
            Err(err) => tracing::error!(error = %err, "button disabled"),
        }
    }
    if handles.is_empty() {
        return Err(InputError::NoButtons);
    }
    Ok(InputThreads { stop, handles })
}

#[cfg(not(feature = "gpio"))]
pub fn spawn_inputs(
    _chip_path: &Path,
    _buttons: &[ButtonConfig],
    _tx: &Sender<ControlMessage>,
) -> Result<InputThreads, InputError> {
    Err(InputError::Unsupported)
}

#[cfg(feature = "gpio")]
mod cdev {
    use super::{forward, CONSUMER, POLL_INTERVAL_MS};
    use crate::config::ButtonConfig;
    use crate::dispatcher::ControlMessage;
    use crate::input::{ButtonTracker, InputError, RawEdge};
    use crossbeam_channel::Sender;
    use gpio_cdev::{Chip, EventRequestFlags, EventType, LineEventHandle, LineRequestFlags};
    use std::io;
    use std::os::unix::io::{AsRawFd, RawFd};
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;
    use std::thread::{self, JoinHandle};
    use std::time::Instant;

    pub(super) fn watch_line(
        chip: &mut Chip,
        button: &ButtonConfig,
        tx: Sender<ControlMessage>,
        stop: Arc<AtomicBool>,
    ) -> Result<JoinHandle<()>, InputError> {
        let pin = button.pin;
        let line_err = |message: String| InputError::Line { pin, message };
        let line = chip.get_line(pin).map_err(|err| line_err(err.to_string()))?;
        // Bias resistors are not settable through this ABI; `pull_up` only picks polarity.
        let events = line
            .events(
                LineRequestFlags::INPUT,
                EventRequestFlags::BOTH_EDGES,
                CONSUMER,
            )
            .map_err(|err| line_err(err.to_string()))?;
        let tracker = ButtonTracker::new(button);
        let pull_up = button.pull_up;
        thread::Builder::new()
            .name(format!("button-{pin}"))
            .spawn(move || read_edges(events, tracker, pull_up, &tx, &stop))
            .map_err(|err| line_err(err.to_string()))
    }

    fn read_edges(
        mut events: LineEventHandle,
        mut tracker: ButtonTracker,
        pull_up: bool,
        tx: &Sender<ControlMessage>,
        stop: &AtomicBool,
    ) {
        let fd = events.as_raw_fd();
        while !stop.load(Ordering::SeqCst) {
            match wait_readable(fd, POLL_INTERVAL_MS) {
                Ok(true) => {}
                Ok(false) => continue,
                Err(err) => {
                    tracing::error!(pin = tracker.pin(), error = %err, "poll on button line failed");
                    return;
                }
            }
            let event = match events.get_event() {
                Ok(event) => event,
                Err(err) => {
                    tracing::error!(pin = tracker.pin(), error = %err, "reading button line failed");
                    return;
                }
            };
            let rising = event.event_type() == EventType::RisingEdge;
            let edge = RawEdge::from_level_change(rising, pull_up);
            for input in tracker.on_edge(edge, Instant::now()) {
                if !forward(tx, input) {
                    return;
                }
            }
        }
        tracing::debug!(pin = tracker.pin(), "button reader stopped");
    }

    fn wait_readable(fd: RawFd, timeout_ms: i32) -> io::Result<bool> {
        let mut pollfd = libc::pollfd {
            fd,
            events: libc::POLLIN,
            revents: 0,
        };
        // SAFETY: pollfd is a valid, initialized struct and the count matches.
        let rc = unsafe { libc::poll(&mut pollfd, 1, timeout_ms) };
        if rc < 0 {
            let err = io::Error::last_os_error();
            if err.kind() == io::ErrorKind::Interrupted {
                return Ok(false);
            }
            return Err(err);
        }
        Ok(rc > 0 && pollfd.revents & libc::POLLIN != 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dispatcher::control_channel;
    use crate::model::{ButtonEvent, ButtonRole};

    fn input() -> InputEvent {
        InputEvent {
            role: ButtonRole::ConfirmOptionA,
            pin: 23,
            event: ButtonEvent::Press,
        }
    }

    #[test]
    fn forward_drops_on_full_queue_and_stops_on_disconnect() {
        let (tx, rx) = crossbeam_channel::bounded(1);
        assert!(forward(&tx, input()));
        assert!(forward(&tx, input()));
        assert_eq!(rx.len(), 1);
        drop(rx);
        assert!(!forward(&tx, input()));
    }

    #[test]
    fn missing_chip_is_reported() {
        let (tx, _rx) = control_channel();
        let buttons = [ButtonConfig::new(23, ButtonRole::ConfirmOptionA)];
        let err = spawn_inputs(Path::new("/dev/padd-control-no-such-chip"), &buttons, &tx)
            .err()
            .unwrap();
        if cfg!(feature = "gpio") {
            assert!(matches!(err, InputError::Chip { .. }));
        } else {
            assert_eq!(err, InputError::Unsupported);
        }
    }

    #[test]
    fn shutdown_with_no_threads_returns() {
        let threads = InputThreads {
            stop: Arc::new(AtomicBool::new(false)),
            handles: Vec::new(),
        };
        assert!(threads.is_empty());
        threads.shutdown();
    }
}
