//! One confirmation lifecycle: `Idle -> AwaitingConfirmation -> Idle`.
//!
//! A flow only tracks its own state, its timer, and its option table. Prompting,
//! running actions, and arbitration between flows live in the coordinator, which
//! calls into flows while holding its lock.


use crate::hold::{HoldSelection, HoldThresholds};
use crate::model::{ActionKind, ButtonRole, ConfirmationState, FlowKind};
use crate::timer::TimerHandle;
use std::time::{Duration, Instant};

/// Fixed mapping from a confirm button to the action it runs in one flow.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OptionTable {
    entries: Vec<(ButtonRole, ActionKind)>,
}

impl OptionTable {
    pub fn new(entries: Vec<(ButtonRole, ActionKind)>) -> Self {
        Self { entries }
    }

    pub fn lookup(&self, role: ButtonRole) -> Option<ActionKind> {
        self.entries
            .iter()
            .find(|(candidate, _)| *candidate == role)
            .map(|(_, action)| *action)
    }

    pub fn entries(&self) -> &[(ButtonRole, ActionKind)] {
        &self.entries
    }
}

/// Static description of a flow, built from configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlowSpec {
    pub kind: FlowKind,
    /// Role whose hold release arms this flow.
    pub trigger: ButtonRole,
    pub thresholds: HoldThresholds,
    pub lesser: ActionKind,
    pub greater: ActionKind,
    pub options: OptionTable,
}

impl FlowSpec {
    pub fn action_for_hold(&self, held: Duration) -> Option<ActionKind> {
        self.thresholds.select(held).map(|selection| match selection {
            HoldSelection::Lesser => self.lesser,
            HoldSelection::Greater => self.greater,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArmError {
    AlreadyAwaiting { requested: ActionKind },
}

/// Result of feeding a confirm press to a flow.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution {
    NotAwaiting,
    /// The role has no entry in the option table; the flow is left untouched.
    Unmapped,
    /// The flow is back to `Idle` and the caller must run this action.
    Run(ActionKind),
}

pub struct ConfirmationFlow {
    spec: FlowSpec,
    state: ConfirmationState,
    timer: Option<TimerHandle>,
    generation: u64,
}

impl ConfirmationFlow {
    pub fn new(spec: FlowSpec) -> Self {
        Self {
            spec,
            state: ConfirmationState::Idle,
            timer: None,
            generation: 0,
        }
    }

    pub fn kind(&self) -> FlowKind {
        self.spec.kind
    }

    pub fn spec(&self) -> &FlowSpec {
        &self.spec
    }

    pub fn state(&self) -> ConfirmationState {
        self.state
    }

    pub fn is_awaiting(&self) -> bool {
        self.state.is_awaiting()
    }

    /// Identifies the current arming; timers carry it so a stale one is ignored.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Enter `AwaitingConfirmation`. `start_timer` receives the new generation and
    /// must schedule the timeout for it.
    pub fn arm(
        &mut self,
        action: ActionKind,
        now: Instant,
        timeout: Duration,
        start_timer: impl FnOnce(u64) -> TimerHandle,
    ) -> Result<(), ArmError> {
        if let ConfirmationState::AwaitingConfirmation { requested, .. } = self.state {
            return Err(ArmError::AlreadyAwaiting { requested });
        }
        self.generation = self.generation.wrapping_add(1);
        self.state = ConfirmationState::AwaitingConfirmation {
            deadline: now + timeout,
            requested: action,
        };
        self.timer = Some(start_timer(self.generation));
        Ok(())
    }

    pub fn resolve(&mut self, role: ButtonRole) -> Resolution {
        if !self.is_awaiting() {
            return Resolution::NotAwaiting;
        }
        match self.spec.options.lookup(role) {
            Some(action) => {
                self.disarm();
                Resolution::Run(action)
            }
            None => Resolution::Unmapped,
        }
    }

    /// Returns whether a pending confirmation was actually cancelled.
    pub fn cancel(&mut self) -> bool {
        if !self.is_awaiting() {
            return false;
        }
        self.disarm();
        true
    }

    /// Timeout callback. Only the timer of the current arming may cancel.
    pub fn on_timeout(&mut self, generation: u64) -> bool {
        if !self.is_awaiting() || generation != self.generation {
            return false;
        }
        self.disarm();
        true
    }

    fn disarm(&mut self) {
        if let Some(timer) = self.timer.take() {
            timer.cancel();
        }
        self.state = ConfirmationState::Idle;
    }
}
