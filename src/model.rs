//! Shared vocabulary for buttons, flows, and the actions they trigger.

use serde::Deserialize;
use std::fmt;
use std::time::{Duration, Instant};

/// Semantic purpose of a physical button. Assigned once from the config file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ButtonRole {
    #[serde(alias = "brightness_system")]
    BrightnessOrMenuOpen,
    #[serde(alias = "update_select")]
    UpdateMenuOpen,
    #[serde(alias = "confirm_1")]
    ConfirmOptionA,
    #[serde(alias = "confirm_2")]
    ConfirmOptionB,
}

impl ButtonRole {
    pub const ALL: [ButtonRole; 4] = [
        ButtonRole::BrightnessOrMenuOpen,
        ButtonRole::UpdateMenuOpen,
        ButtonRole::ConfirmOptionA,
        ButtonRole::ConfirmOptionB,
    ];

    pub fn label(self) -> &'static str {
        match self {
            ButtonRole::BrightnessOrMenuOpen => "brightness_or_menu_open",
            ButtonRole::UpdateMenuOpen => "update_menu_open",
            ButtonRole::ConfirmOptionA => "confirm_option_a",
            ButtonRole::ConfirmOptionB => "confirm_option_b",
        }
    }

    /// Roles that can resolve a pending confirmation.
    pub fn is_confirm_option(self) -> bool {
        matches!(self, ButtonRole::ConfirmOptionA | ButtonRole::ConfirmOptionB)
    }
}

impl fmt::Display for ButtonRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Normalized event from one button. Events of a single button are ordered;
/// events of different buttons are not.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ButtonEvent {
    Press,
    Release,
    HoldReleased { duration: Duration },
}

/// Every side effect a button can eventually cause.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionKind {
    StepBrightness,
    UpdateGravity,
    UpdatePiHoleCore,
    UpdatePadd,
    Reboot,
    Shutdown,
}

impl ActionKind {
    pub const COMMANDS: [ActionKind; 5] = [
        ActionKind::UpdateGravity,
        ActionKind::UpdatePiHoleCore,
        ActionKind::UpdatePadd,
        ActionKind::Reboot,
        ActionKind::Shutdown,
    ];

    pub fn label(self) -> &'static str {
        match self {
            ActionKind::StepBrightness => "step_brightness",
            ActionKind::UpdateGravity => "update_gravity",
            ActionKind::UpdatePiHoleCore => "update_pi_hole_core",
            ActionKind::UpdatePadd => "update_padd",
            ActionKind::Reboot => "reboot",
            ActionKind::Shutdown => "shutdown",
        }
    }

    /// Human-readable name used in prompts and status messages.
    pub fn title(self) -> &'static str {
        match self {
            ActionKind::StepBrightness => "Brightness step",
            ActionKind::UpdateGravity => "Gravity update",
            ActionKind::UpdatePiHoleCore => "Pi-hole update",
            ActionKind::UpdatePadd => "PADD update",
            ActionKind::Reboot => "System reboot",
            ActionKind::Shutdown => "System shutdown",
        }
    }

    /// Actions carried out by an external command rather than in-process.
    pub fn is_command(self) -> bool {
        !matches!(self, ActionKind::StepBrightness)
    }
}

impl fmt::Display for ActionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// The independent confirmation lifecycles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FlowKind {
    Update,
    System,
}

impl FlowKind {
    pub fn label(self) -> &'static str {
        match self {
            FlowKind::Update => "update",
            FlowKind::System => "system",
        }
    }

    pub fn title(self) -> &'static str {
        match self {
            FlowKind::Update => "Pi-hole Updates",
            FlowKind::System => "System Control",
        }
    }
}

impl fmt::Display for FlowKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfirmationState {
    Idle,
    AwaitingConfirmation {
        deadline: Instant,
        requested: ActionKind,
    },
}

impl ConfirmationState {
    pub fn is_awaiting(&self) -> bool {
        matches!(self, ConfirmationState::AwaitingConfirmation { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Deserialize)]
    struct Wrapper {
        role: ButtonRole,
        action: ActionKind,
    }

    #[test]
    fn roles_accept_legacy_function_names() {
        let parsed: Wrapper =
            serde_yaml::from_str("role: brightness_system\naction: update_padd\n").unwrap();
        assert_eq!(parsed.role, ButtonRole::BrightnessOrMenuOpen);
        assert_eq!(parsed.action, ActionKind::UpdatePadd);

        let parsed: Wrapper =
            serde_yaml::from_str("role: confirm_2\naction: update_pi_hole_core\n").unwrap();
        assert_eq!(parsed.role, ButtonRole::ConfirmOptionB);
        assert_eq!(parsed.action, ActionKind::UpdatePiHoleCore);
    }

    #[test]
    fn labels_round_trip_through_serde() {
        for role in ButtonRole::ALL {
            let yaml = format!("role: {}\naction: reboot\n", role.label());
            let parsed: Wrapper = serde_yaml::from_str(&yaml).unwrap();
            assert_eq!(parsed.role, role);
        }
    }

    #[test]
    fn only_brightness_is_in_process() {
        assert!(!ActionKind::StepBrightness.is_command());
        assert!(ActionKind::COMMANDS.iter().all(|action| action.is_command()));
    }
}
