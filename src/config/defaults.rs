use crate::model::{ActionKind, ButtonRole};
use std::{env, path::PathBuf};

pub const DEFAULT_CONFIG_PATH: &str = "/etc/padd-control/config.yaml";
pub const DEFAULT_GPIO_CHIP: &str = "/dev/gpiochip0";

pub const DEFAULT_CONFIRMATION_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_FEEDBACK_DELAY_SECS: u64 = 3;
pub const MAX_CONFIRMATION_TIMEOUT_SECS: u64 = 600;
pub const MAX_FEEDBACK_DELAY_SECS: u64 = 60;

pub const DEFAULT_BOUNCE_TIME_SECS: f64 = 0.05;
pub const MAX_BOUNCE_TIME_SECS: f64 = 1.0;

pub const DEFAULT_LOG_MAX_BYTES: u64 = 1024 * 1024;
pub const DEFAULT_LOG_BACKUP_COUNT: usize = 5;

pub const DEFAULT_PWM_FREQUENCY_HZ: u32 = 240;
pub const DEFAULT_GAMMA: f64 = 2.2;
pub const MAX_GAMMA: f64 = 5.0;
pub const DEFAULT_PWM_RETRY_ATTEMPTS: u32 = 3;

pub const TMUX_NAME_PATTERN: &str = r"^[A-Za-z0-9_.-]+$";

pub fn default_log_file() -> PathBuf {
    env::temp_dir().join("padd_control.log")
}

/// Built-in shape of one flow before any YAML overrides.
pub(super) struct FlowDefaults {
    pub trigger: ButtonRole,
    pub low: f64,
    pub high: f64,
    pub lesser: ActionKind,
    pub greater: ActionKind,
    pub option_a: ActionKind,
    pub option_b: ActionKind,
}

pub(super) const UPDATE_FLOW: FlowDefaults = FlowDefaults {
    trigger: ButtonRole::UpdateMenuOpen,
    low: 1.0,
    high: 5.0,
    lesser: ActionKind::UpdateGravity,
    greater: ActionKind::UpdatePiHoleCore,
    option_a: ActionKind::UpdateGravity,
    option_b: ActionKind::UpdatePiHoleCore,
};

pub(super) const SYSTEM_FLOW: FlowDefaults = FlowDefaults {
    trigger: ButtonRole::BrightnessOrMenuOpen,
    low: 2.0,
    high: 5.0,
    lesser: ActionKind::Reboot,
    greater: ActionKind::Shutdown,
    option_a: ActionKind::Reboot,
    option_b: ActionKind::Shutdown,
};

/// Pin layout of the four front buttons on the 2.8" PiTFT.
pub(super) const DEFAULT_BUTTONS: [(u32, ButtonRole, Option<f64>); 4] = [
    (17, ButtonRole::BrightnessOrMenuOpen, Some(2.0)),
    (22, ButtonRole::UpdateMenuOpen, Some(1.0)),
    (23, ButtonRole::ConfirmOptionA, None),
    (27, ButtonRole::ConfirmOptionB, None),
];

pub(super) const DEFAULT_UPDATE_GRAVITY: &str = "sudo pihole -g";
pub(super) const DEFAULT_UPDATE_CORE: &str = "sudo pihole -up";
pub(super) const DEFAULT_UPDATE_PADD: &str = "sudo padd.sh -u";
pub(super) const DEFAULT_REBOOT: &str = "sudo reboot";
pub(super) const DEFAULT_SHUTDOWN: &str = "sudo shutdown -h now";
pub(super) const DEFAULT_UPDATE_CHECK: &str = "sudo pihole -up --check-only";
