use super::*;
use crate::backlight::BacklightError;
use crate::executor::{ActionError, ExecutionResult};
use crate::flow::OptionTable;
use crate::hold::HoldThresholds;
use crate::presentation::PresentationError;
use crate::timer::{ManualClock, SystemClock};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::thread;

#[derive(Debug, Clone, PartialEq, Eq)]
enum Shown {
    Prompt(FlowKind, ActionKind),
    Message(String),
    Progress(String),
    DefaultView,
}

#[derive(Default)]
struct FakePresentation {
    shown: Mutex<Vec<Shown>>,
    fail_prompt: AtomicBool,
}

impl FakePresentation {
    fn shown(&self) -> Vec<Shown> {
        self.shown.lock().unwrap().clone()
    }

    fn messages_containing(&self, needle: &str) -> usize {
        self.shown()
            .iter()
            .filter(|entry| matches!(entry, Shown::Message(text) if text.contains(needle)))
            .count()
    }

    fn record(&self, entry: Shown) {
        self.shown.lock().unwrap().push(entry);
    }
}

impl PresentationPort for FakePresentation {
    fn is_ready(&self) -> bool {
        true
    }

    fn show_prompt(&self, prompt: &Prompt) -> Result<(), PresentationError> {
        if self.fail_prompt.load(Ordering::SeqCst) {
            return Err(PresentationError::CheckFailed("Update check failed!".into()));
        }
        self.record(Shown::Prompt(prompt.flow, prompt.action));
        Ok(())
    }

    fn show_message(&self, message: &str) {
        self.record(Shown::Message(message.to_string()));
    }

    fn show_progress(&self, line: &str) {
        self.record(Shown::Progress(line.to_string()));
    }

    fn show_default_view(&self) -> Result<(), PresentationError> {
        self.record(Shown::DefaultView);
        Ok(())
    }
}

#[derive(Default)]
struct FakeExecutor {
    runs: Mutex<Vec<ActionKind>>,
    exit_code: Mutex<Option<i32>>,
    spawn_fails: AtomicBool,
}

impl FakeExecutor {
    fn runs(&self) -> Vec<ActionKind> {
        self.runs.lock().unwrap().clone()
    }
}

impl ActionExecutor for FakeExecutor {
    fn run(
        &self,
        action: ActionKind,
        progress: &mut dyn FnMut(&str),
    ) -> Result<ExecutionResult, ActionError> {
        self.runs.lock().unwrap().push(action);
        if self.spawn_fails.load(Ordering::SeqCst) {
            return Err(ActionError::Spawn {
                command: "pihole".into(),
                message: "not found".into(),
            });
        }
        progress(&format!("running {action}"));
        let code = self.exit_code.lock().unwrap().unwrap_or(0);
        Ok(ExecutionResult {
            exit_code: Some(code),
            succeeded: code == 0,
        })
    }
}

struct FakeBrightness {
    percent: u8,
    steps: Arc<AtomicUsize>,
    restored: Arc<AtomicBool>,
}

impl Brightness for FakeBrightness {
    fn step(&mut self) -> Result<u8, BacklightError> {
        self.steps.fetch_add(1, Ordering::SeqCst);
        self.percent = if self.percent == 0 { 100 } else { self.percent - 10 };
        Ok(self.percent)
    }

    fn percentage(&self) -> u8 {
        self.percent
    }

    fn restore(&mut self) -> Result<(), BacklightError> {
        self.percent = 100;
        self.restored.store(true, Ordering::SeqCst);
        Ok(())
    }
}

fn update_spec() -> FlowSpec {
    FlowSpec {
        kind: FlowKind::Update,
        trigger: ButtonRole::UpdateMenuOpen,
        thresholds: HoldThresholds::from_secs(1.0, 5.0),
        lesser: ActionKind::UpdateGravity,
        greater: ActionKind::UpdatePiHoleCore,
        options: OptionTable::new(vec![
            (ButtonRole::ConfirmOptionA, ActionKind::UpdateGravity),
            (ButtonRole::ConfirmOptionB, ActionKind::UpdatePiHoleCore),
        ]),
    }
}

fn system_spec() -> FlowSpec {
    FlowSpec {
        kind: FlowKind::System,
        trigger: ButtonRole::BrightnessOrMenuOpen,
        thresholds: HoldThresholds::from_secs(2.0, 5.0),
        lesser: ActionKind::Reboot,
        greater: ActionKind::Shutdown,
        options: OptionTable::new(vec![
            (ButtonRole::ConfirmOptionA, ActionKind::Reboot),
            (ButtonRole::ConfirmOptionB, ActionKind::Shutdown),
        ]),
    }
}

struct Harness {
    coordinator: FlowCoordinator,
    clock: Arc<ManualClock>,
    presentation: Arc<FakePresentation>,
    executor: Arc<FakeExecutor>,
    steps: Arc<AtomicUsize>,
    restored: Arc<AtomicBool>,
}

fn harness() -> Harness {
    let clock = ManualClock::new();
    let presentation = Arc::new(FakePresentation::default());
    let executor = Arc::new(FakeExecutor::default());
    let steps = Arc::new(AtomicUsize::new(0));
    let restored = Arc::new(AtomicBool::new(false));
    let coordinator = FlowCoordinator::new(
        vec![update_spec(), system_spec()],
        CoordinatorSettings::default(),
        Ports {
            presentation: presentation.clone(),
            executor: executor.clone(),
            clock: clock.clone(),
            brightness: Some(Box::new(FakeBrightness {
                percent: 100,
                steps: steps.clone(),
                restored: restored.clone(),
            })),
        },
    );
    Harness {
        coordinator,
        clock,
        presentation,
        executor,
        steps,
        restored,
    }
}

fn secs(value: f64) -> Duration {
    Duration::from_secs_f64(value)
}

#[test]
fn only_one_flow_can_await_at_a_time() {
    let h = harness();
    assert_eq!(
        h.coordinator.arm(FlowKind::Update, ActionKind::UpdateGravity),
        Outcome::Armed {
            flow: FlowKind::Update,
            action: ActionKind::UpdateGravity
        }
    );
    assert_eq!(
        h.coordinator.arm(FlowKind::System, ActionKind::Reboot),
        Outcome::Rejected
    );
    assert_eq!(h.coordinator.active_flow(), Some(FlowKind::Update));
    assert_eq!(
        h.coordinator.state_of(FlowKind::System),
        Some(ConfirmationState::Idle)
    );
    assert_eq!(h.clock.live_timers(), 1);
}

#[test]
fn timeout_cancels_with_exactly_one_notification() {
    let h = harness();
    h.coordinator.arm(FlowKind::Update, ActionKind::UpdateGravity);

    h.clock.advance(secs(29.0));
    assert_eq!(h.coordinator.active_flow(), Some(FlowKind::Update));

    h.clock.advance(secs(2.0));
    assert_eq!(h.coordinator.active_flow(), None);
    assert_eq!(h.presentation.messages_containing("cancelled due to timeout"), 1);
    assert_eq!(h.presentation.shown().last(), Some(&Shown::DefaultView));
    assert_eq!(h.clock.slept(), secs(3.0));

    h.clock.advance(secs(120.0));
    assert_eq!(h.presentation.messages_containing("cancelled due to timeout"), 1);
    assert!(h.executor.runs().is_empty());
}

#[test]
fn confirming_stops_the_timer() {
    let h = harness();
    h.coordinator.arm(FlowKind::System, ActionKind::Reboot);
    let outcome = h.coordinator.on_press(ButtonRole::ConfirmOptionB);
    assert_eq!(
        outcome,
        Outcome::Completed {
            flow: FlowKind::System,
            action: ActionKind::Shutdown,
            succeeded: true
        }
    );
    assert_eq!(h.clock.live_timers(), 0);

    h.clock.advance(secs(60.0));
    assert_eq!(h.presentation.messages_containing("timeout"), 0);
    assert_eq!(h.executor.runs(), vec![ActionKind::Shutdown]);
}

#[test]
fn cancel_on_idle_is_silent() {
    let h = harness();
    assert_eq!(h.coordinator.cancel_active(), Outcome::Ignored);
    assert!(h.presentation.shown().is_empty());
    assert_eq!(h.clock.slept(), Duration::ZERO);

    h.coordinator.arm(FlowKind::Update, ActionKind::UpdateGravity);
    assert_eq!(
        h.coordinator.cancel_active(),
        Outcome::Cancelled {
            flow: FlowKind::Update
        }
    );
    let shown_after_first = h.presentation.shown().len();
    assert_eq!(h.coordinator.cancel_active(), Outcome::Ignored);
    assert_eq!(h.presentation.shown().len(), shown_after_first);
    assert_eq!(h.presentation.messages_containing("Gravity update cancelled"), 1);
}

#[test]
fn gravity_hold_then_confirm_runs_and_restores_default_view() {
    let h = harness();
    assert_eq!(h.coordinator.on_press(ButtonRole::UpdateMenuOpen), Outcome::Ignored);
    assert_eq!(
        h.coordinator
            .on_hold_released(ButtonRole::UpdateMenuOpen, secs(1.2)),
        Outcome::Armed {
            flow: FlowKind::Update,
            action: ActionKind::UpdateGravity
        }
    );
    assert_eq!(
        h.presentation.shown(),
        vec![Shown::Prompt(FlowKind::Update, ActionKind::UpdateGravity)]
    );

    let outcome = h.coordinator.on_press(ButtonRole::ConfirmOptionA);
    assert!(outcome.ran_action());
    assert_eq!(h.executor.runs(), vec![ActionKind::UpdateGravity]);
    assert_eq!(h.clock.slept(), secs(3.0));

    let shown = h.presentation.shown();
    assert_eq!(
        shown,
        vec![
            Shown::Prompt(FlowKind::Update, ActionKind::UpdateGravity),
            Shown::Message("Starting Gravity update...".into()),
            Shown::Progress("running update_gravity".into()),
            Shown::Message("Gravity update completed successfully".into()),
            Shown::DefaultView,
        ]
    );
    assert_eq!(
        h.coordinator.state_of(FlowKind::Update),
        Some(ConfirmationState::Idle)
    );
}

#[test]
fn other_menu_button_is_ignored_while_a_flow_awaits() {
    let h = harness();
    h.coordinator
        .on_hold_released(ButtonRole::UpdateMenuOpen, secs(1.2));

    assert_eq!(
        h.coordinator.on_press(ButtonRole::BrightnessOrMenuOpen),
        Outcome::Ignored
    );
    assert_eq!(
        h.coordinator
            .on_hold_released(ButtonRole::BrightnessOrMenuOpen, secs(0.3)),
        Outcome::Ignored
    );
    assert_eq!(h.coordinator.active_flow(), Some(FlowKind::Update));
    assert_eq!(
        h.coordinator.state_of(FlowKind::System),
        Some(ConfirmationState::Idle)
    );
    assert_eq!(h.steps.load(Ordering::SeqCst), 0);
}

#[test]
fn deliberate_hold_of_a_trigger_cancels_the_active_flow() {
    let h = harness();
    h.coordinator
        .on_hold_released(ButtonRole::UpdateMenuOpen, secs(1.2));

    assert_eq!(
        h.coordinator
            .on_hold_released(ButtonRole::BrightnessOrMenuOpen, secs(2.5)),
        Outcome::Cancelled {
            flow: FlowKind::Update
        }
    );
    assert_eq!(h.coordinator.active_flow(), None);
    assert_eq!(h.clock.live_timers(), 0);
    assert!(h.executor.runs().is_empty());
}

#[test]
fn second_hold_of_same_trigger_keeps_original_deadline() {
    let h = harness();
    h.coordinator
        .on_hold_released(ButtonRole::UpdateMenuOpen, secs(1.2));
    h.clock.advance(secs(20.0));
    assert_eq!(
        h.coordinator
            .on_hold_released(ButtonRole::UpdateMenuOpen, secs(1.5)),
        Outcome::Rejected
    );
    assert_eq!(
        h.coordinator
            .on_hold_released(ButtonRole::UpdateMenuOpen, secs(6.0)),
        Outcome::Rejected
    );
    assert_eq!(h.coordinator.active_flow(), Some(FlowKind::Update));
    assert!(matches!(
        h.coordinator.state_of(FlowKind::Update),
        Some(ConfirmationState::AwaitingConfirmation {
            requested: ActionKind::UpdateGravity,
            ..
        })
    ));
    assert_eq!(h.clock.live_timers(), 1);
    assert_eq!(h.presentation.messages_containing("cancelled"), 0);

    h.clock.advance(secs(10.5));
    assert_eq!(h.coordinator.active_flow(), None);
    assert_eq!(h.presentation.messages_containing("cancelled due to timeout"), 1);
}

#[test]
fn direct_second_arm_is_rejected() {
    let h = harness();
    h.coordinator.arm(FlowKind::Update, ActionKind::UpdateGravity);
    assert_eq!(
        h.coordinator.arm(FlowKind::Update, ActionKind::UpdatePiHoleCore),
        Outcome::Rejected
    );
    assert_eq!(h.clock.live_timers(), 1);
}

#[test]
fn timer_that_already_started_is_ignored_after_confirm() {
    let h = harness();
    h.coordinator
        .on_hold_released(ButtonRole::UpdateMenuOpen, secs(1.2));
    let generation = h.coordinator.lock().flows[0].generation();
    // The timer thread has passed its cancel check but not yet taken the lock.
    let started = h.clock.take_tasks();
    assert_eq!(started.len(), 1);

    assert!(h.coordinator.on_press(ButtonRole::ConfirmOptionA).ran_action());
    assert_eq!(
        h.coordinator.handle_timeout(FlowKind::Update, generation),
        Outcome::Ignored
    );
    for task in started {
        task();
    }
    assert_eq!(h.presentation.messages_containing("cancelled due to timeout"), 0);
    assert_eq!(h.executor.runs(), vec![ActionKind::UpdateGravity]);
    assert_eq!(
        h.coordinator.state_of(FlowKind::Update),
        Some(ConfirmationState::Idle)
    );
}

#[test]
fn prompt_failure_cancels_the_just_armed_flow() {
    let h = harness();
    h.presentation.fail_prompt.store(true, Ordering::SeqCst);
    assert_eq!(
        h.coordinator
            .on_hold_released(ButtonRole::UpdateMenuOpen, secs(6.0)),
        Outcome::ArmAborted {
            flow: FlowKind::Update
        }
    );
    assert_eq!(h.coordinator.active_flow(), None);
    assert_eq!(h.clock.live_timers(), 0);
    assert_eq!(h.presentation.messages_containing("Update check failed!"), 1);
    assert_eq!(h.presentation.shown().last(), Some(&Shown::DefaultView));
}

#[test]
fn idle_brightness_press_steps_backlight() {
    let h = harness();
    assert_eq!(
        h.coordinator.on_press(ButtonRole::BrightnessOrMenuOpen),
        Outcome::BrightnessStepped(90)
    );
    assert_eq!(h.coordinator.on_press(ButtonRole::ConfirmOptionA), Outcome::Ignored);
    assert_eq!(h.coordinator.brightness_percentage(), Some(90));
    assert_eq!(h.steps.load(Ordering::SeqCst), 1);
}

#[test]
fn short_hold_arms_nothing() {
    let h = harness();
    assert_eq!(
        h.coordinator
            .on_hold_released(ButtonRole::UpdateMenuOpen, secs(0.4)),
        Outcome::Ignored
    );
    assert_eq!(
        h.coordinator
            .on_hold_released(ButtonRole::ConfirmOptionA, secs(9.0)),
        Outcome::Ignored
    );
    assert_eq!(h.coordinator.active_flow(), None);
}

#[test]
fn failed_action_is_reported_and_returns_to_default() {
    let h = harness();
    *h.executor.exit_code.lock().unwrap() = Some(2);
    h.coordinator.arm(FlowKind::Update, ActionKind::UpdatePiHoleCore);
    assert_eq!(
        h.coordinator.on_press(ButtonRole::ConfirmOptionB),
        Outcome::Completed {
            flow: FlowKind::Update,
            action: ActionKind::UpdatePiHoleCore,
            succeeded: false
        }
    );
    assert_eq!(h.presentation.messages_containing("failed (exit 2)"), 1);
    assert_eq!(h.presentation.shown().last(), Some(&Shown::DefaultView));
}

#[test]
fn executor_error_is_reported_and_returns_to_default() {
    let h = harness();
    h.executor.spawn_fails.store(true, Ordering::SeqCst);
    h.coordinator.arm(FlowKind::System, ActionKind::Reboot);
    let outcome = h.coordinator.on_press(ButtonRole::ConfirmOptionA);
    assert_eq!(
        outcome,
        Outcome::Completed {
            flow: FlowKind::System,
            action: ActionKind::Reboot,
            succeeded: false
        }
    );
    assert_eq!(h.presentation.messages_containing("failed to start"), 1);
    assert_eq!(h.coordinator.active_flow(), None);
}

#[test]
fn release_all_cancels_and_restores_backlight() {
    let h = harness();
    h.coordinator.on_press(ButtonRole::BrightnessOrMenuOpen);
    h.coordinator.arm(FlowKind::System, ActionKind::Shutdown);
    h.coordinator.release_all();

    assert_eq!(h.coordinator.active_flow(), None);
    assert!(h.restored.load(Ordering::SeqCst));
    assert_eq!(h.coordinator.brightness_percentage(), None);
    assert!(h.executor.runs().is_empty());
}

#[test]
fn real_clock_timeout_fires_from_timer_thread() {
    let presentation = Arc::new(FakePresentation::default());
    let coordinator = FlowCoordinator::new(
        vec![update_spec()],
        CoordinatorSettings {
            confirmation_timeout: Duration::from_millis(40),
            feedback_delay: Duration::ZERO,
        },
        Ports {
            presentation: presentation.clone(),
            executor: Arc::new(FakeExecutor::default()),
            clock: Arc::new(SystemClock),
            brightness: None,
        },
    );
    coordinator.arm(FlowKind::Update, ActionKind::UpdateGravity);
    for _ in 0..100 {
        if coordinator.active_flow().is_none() {
            break;
        }
        thread::sleep(Duration::from_millis(10));
    }
    assert_eq!(coordinator.active_flow(), None);
    assert_eq!(presentation.messages_containing("cancelled due to timeout"), 1);
}
