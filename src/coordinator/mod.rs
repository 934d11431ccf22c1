//! Routes button events to flows and keeps at most one flow awaiting confirmation.
//!
//! Every transition, including the action run after a confirm and the feedback
//! pause that follows it, happens under one lock. Confirmation timers take the
//! same lock, so a timeout racing a confirm always sees the loser's state as `Idle`.

#[cfg(test)]
mod tests;

use crate::backlight::Brightness;
use crate::executor::ActionExecutor;
use crate::flow::{ArmError, ConfirmationFlow, FlowSpec, Resolution};
use crate::lock_or_recover;
use crate::model::{ActionKind, ButtonEvent, ButtonRole, ConfirmationState, FlowKind};
use crate::presentation::{PresentationPort, Prompt};
use crate::timer::Clock;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CoordinatorSettings {
    pub confirmation_timeout: Duration,
    pub feedback_delay: Duration,
}

impl Default for CoordinatorSettings {
    fn default() -> Self {
        Self {
            confirmation_timeout: Duration::from_secs(30),
            feedback_delay: Duration::from_secs(3),
        }
    }
}

/// Collaborators injected at construction.
pub struct Ports {
    pub presentation: Arc<dyn PresentationPort>,
    pub executor: Arc<dyn ActionExecutor>,
    pub clock: Arc<dyn Clock>,
    /// `None` when the backlight could not be initialized.
    pub brightness: Option<Box<dyn Brightness>>,
}

/// What one event did. Returned for logging and tests; callers may ignore it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Ignored,
    /// An arm request lost to an already-awaiting flow.
    Rejected,
    BrightnessStepped(u8),
    Armed { flow: FlowKind, action: ActionKind },
    /// The prompt could not be shown, so the flow was cancelled right away.
    ArmAborted { flow: FlowKind },
    Cancelled { flow: FlowKind },
    TimedOut { flow: FlowKind },
    Completed {
        flow: FlowKind,
        action: ActionKind,
        succeeded: bool,
    },
}

impl Outcome {
    pub fn ran_action(&self) -> bool {
        matches!(self, Outcome::Completed { .. })
    }
}

struct Inner {
    flows: Vec<ConfirmationFlow>,
    brightness: Option<Box<dyn Brightness>>,
}

impl Inner {
    fn active_index(&self) -> Option<usize> {
        self.flows.iter().position(ConfirmationFlow::is_awaiting)
    }

    fn index_of(&self, kind: FlowKind) -> Option<usize> {
        self.flows.iter().position(|flow| flow.kind() == kind)
    }
}

struct Shared {
    inner: Mutex<Inner>,
    presentation: Arc<dyn PresentationPort>,
    executor: Arc<dyn ActionExecutor>,
    clock: Arc<dyn Clock>,
    settings: CoordinatorSettings,
}

#[derive(Clone)]
pub struct FlowCoordinator {
    shared: Arc<Shared>,
}

impl FlowCoordinator {
    pub fn new(specs: Vec<FlowSpec>, settings: CoordinatorSettings, ports: Ports) -> Self {
        let flows = specs.into_iter().map(ConfirmationFlow::new).collect();
        Self {
            shared: Arc::new(Shared {
                inner: Mutex::new(Inner {
                    flows,
                    brightness: ports.brightness,
                }),
                presentation: ports.presentation,
                executor: ports.executor,
                clock: ports.clock,
                settings,
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        lock_or_recover(&self.shared.inner, "flow coordinator")
    }

    pub fn handle_event(&self, role: ButtonRole, event: ButtonEvent) -> Outcome {
        match event {
            ButtonEvent::Press => self.on_press(role),
            ButtonEvent::HoldReleased { duration } => self.on_hold_released(role, duration),
            ButtonEvent::Release => Outcome::Ignored,
        }
    }

    pub fn on_press(&self, role: ButtonRole) -> Outcome {
        let mut inner = self.lock();
        let Some(idx) = inner.active_index() else {
            return match role {
                ButtonRole::BrightnessOrMenuOpen => self.step_brightness(&mut inner),
                _ => Outcome::Ignored,
            };
        };

        if !role.is_confirm_option() {
            tracing::debug!(role = %role, "press ignored while awaiting confirmation");
            return Outcome::Ignored;
        }
        let kind = inner.flows[idx].kind();
        match inner.flows[idx].resolve(role) {
            Resolution::Run(action) => {
                tracing::info!(flow = %kind, action = %action, role = %role, "confirmed");
                self.execute(kind, action)
            }
            Resolution::Unmapped => self.cancel_at(&mut inner, idx),
            Resolution::NotAwaiting => Outcome::Ignored,
        }
    }

    pub fn on_hold_released(&self, role: ButtonRole, duration: Duration) -> Outcome {
        let hold_secs = duration.as_secs_f64();
        let mut inner = self.lock();

        if let Some(active) = inner.active_index() {
            if inner.flows[active].spec().trigger == role {
                tracing::debug!(role = %role, hold_secs, "flow already awaiting; hold ignored");
                return Outcome::Rejected;
            }
            // Only another flow's trigger, held past its own threshold, cancels.
            let deliberate = inner.flows.iter().enumerate().any(|(idx, flow)| {
                idx != active
                    && flow.spec().trigger == role
                    && duration >= flow.spec().thresholds.low
            });
            if deliberate {
                tracing::info!(role = %role, hold_secs, "hold release cancels pending confirmation");
                return self.cancel_at(&mut inner, active);
            }
            tracing::debug!(role = %role, hold_secs, "hold release ignored while awaiting");
            return Outcome::Ignored;
        }

        let Some(idx) = inner
            .flows
            .iter()
            .position(|flow| flow.spec().trigger == role)
        else {
            return Outcome::Ignored;
        };
        let Some(action) = inner.flows[idx].spec().action_for_hold(duration) else {
            tracing::debug!(role = %role, hold_secs, "hold shorter than activation threshold");
            return Outcome::Ignored;
        };
        self.arm_at(&mut inner, idx, action)
    }

    /// Arm `flow` directly. Rejected while any flow, including this one, is awaiting.
    pub fn arm(&self, flow: FlowKind, action: ActionKind) -> Outcome {
        let mut inner = self.lock();
        if let Some(active) = inner.active_index() {
            tracing::debug!(
                flow = %flow,
                active = %inner.flows[active].kind(),
                "arm rejected; another confirmation is pending"
            );
            return Outcome::Rejected;
        }
        match inner.index_of(flow) {
            Some(idx) => self.arm_at(&mut inner, idx, action),
            None => Outcome::Ignored,
        }
    }

    /// Cancel whichever flow is awaiting. No-op when idle.
    pub fn cancel_active(&self) -> Outcome {
        let mut inner = self.lock();
        match inner.active_index() {
            Some(idx) => self.cancel_at(&mut inner, idx),
            None => Outcome::Ignored,
        }
    }

    /// Shutdown path: cancel any pending confirmation and hand the backlight back.
    pub fn release_all(&self) {
        self.cancel_active();
        let brightness = self.lock().brightness.take();
        if let Some(mut brightness) = brightness {
            if let Err(err) = brightness.restore() {
                tracing::error!(error = %err, "failed to restore backlight");
            }
        }
    }

    pub fn state_of(&self, flow: FlowKind) -> Option<ConfirmationState> {
        let inner = self.lock();
        inner.index_of(flow).map(|idx| inner.flows[idx].state())
    }

    pub fn active_flow(&self) -> Option<FlowKind> {
        let inner = self.lock();
        inner.active_index().map(|idx| inner.flows[idx].kind())
    }

    pub fn brightness_percentage(&self) -> Option<u8> {
        self.lock()
            .brightness
            .as_ref()
            .map(|brightness| brightness.percentage())
    }

    fn step_brightness(&self, inner: &mut Inner) -> Outcome {
        let Some(brightness) = inner.brightness.as_mut() else {
            tracing::warn!("brightness press ignored; backlight unavailable");
            return Outcome::Ignored;
        };
        match brightness.step() {
            Ok(percent) => {
                tracing::info!(percent, "brightness changed");
                Outcome::BrightnessStepped(percent)
            }
            Err(err) => {
                tracing::error!(error = %err, "brightness step failed");
                Outcome::Ignored
            }
        }
    }

    fn arm_at(&self, inner: &mut Inner, idx: usize, action: ActionKind) -> Outcome {
        let kind = inner.flows[idx].kind();
        let timeout = self.shared.settings.confirmation_timeout;
        let clock = self.shared.clock.clone();
        let weak = Arc::downgrade(&self.shared);
        let armed = inner.flows[idx].arm(action, clock.now(), timeout, |generation| {
            clock.schedule(
                timeout,
                Box::new(move || {
                    if let Some(shared) = weak.upgrade() {
                        FlowCoordinator { shared }.handle_timeout(kind, generation);
                    }
                }),
            )
        });
        if let Err(ArmError::AlreadyAwaiting { requested }) = armed {
            tracing::debug!(flow = %kind, requested = %requested, "flow already awaiting");
            return Outcome::Rejected;
        }
        tracing::info!(flow = %kind, action = %action, "awaiting confirmation");

        let prompt = Prompt {
            flow: kind,
            action,
            options: inner.flows[idx].spec().options.entries().to_vec(),
            timeout,
        };
        match self.shared.presentation.show_prompt(&prompt) {
            Ok(()) => Outcome::Armed { flow: kind, action },
            Err(err) => {
                tracing::error!(flow = %kind, error = %err, "prompt failed; cancelling");
                inner.flows[idx].cancel();
                self.shared.presentation.show_message(&err.to_string());
                self.return_to_default();
                Outcome::ArmAborted { flow: kind }
            }
        }
    }

    fn cancel_at(&self, inner: &mut Inner, idx: usize) -> Outcome {
        let flow = &mut inner.flows[idx];
        let kind = flow.kind();
        let ConfirmationState::AwaitingConfirmation { requested, .. } = flow.state() else {
            return Outcome::Ignored;
        };
        if !flow.cancel() {
            return Outcome::Ignored;
        }
        tracing::info!(flow = %kind, action = %requested, "confirmation cancelled");
        self.shared
            .presentation
            .show_message(&format!("{} cancelled", requested.title()));
        self.return_to_default();
        Outcome::Cancelled { flow: kind }
    }

    fn handle_timeout(&self, kind: FlowKind, generation: u64) -> Outcome {
        let mut inner = self.lock();
        let Some(idx) = inner.index_of(kind) else {
            return Outcome::Ignored;
        };
        let flow = &mut inner.flows[idx];
        let ConfirmationState::AwaitingConfirmation { requested, .. } = flow.state() else {
            return Outcome::Ignored;
        };
        if !flow.on_timeout(generation) {
            tracing::debug!(flow = %kind, generation, "stale confirmation timer");
            return Outcome::Ignored;
        }
        tracing::info!(flow = %kind, action = %requested, "confirmation timed out");
        self.shared.presentation.show_message(&format!(
            "{} cancelled due to timeout",
            requested.title()
        ));
        self.return_to_default();
        Outcome::TimedOut { flow: kind }
    }

    fn execute(&self, kind: FlowKind, action: ActionKind) -> Outcome {
        let presentation = &self.shared.presentation;
        presentation.show_message(&format!("Starting {}...", action.title()));
        let result = self
            .shared
            .executor
            .run(action, &mut |line: &str| presentation.show_progress(line));
        let succeeded = match result {
            Ok(result) if result.succeeded => {
                presentation.show_message(&format!("{} completed successfully", action.title()));
                true
            }
            Ok(result) => {
                let code = result
                    .exit_code
                    .map_or_else(|| "signal".to_string(), |code| code.to_string());
                tracing::warn!(flow = %kind, action = %action, exit_code = %code, "action failed");
                presentation.show_message(&format!("{} failed (exit {code})", action.title()));
                false
            }
            Err(err) => {
                tracing::error!(flow = %kind, action = %action, error = %err, "action error");
                presentation.show_message(&format!("{} failed: {err}", action.title()));
                false
            }
        };
        self.return_to_default();
        Outcome::Completed {
            flow: kind,
            action,
            succeeded,
        }
    }

    fn return_to_default(&self) {
        self.shared.clock.sleep(self.shared.settings.feedback_delay);
        if let Err(err) = self.shared.presentation.show_default_view() {
            tracing::error!(error = %err, "failed to restore default view");
        }
    }
}
