//! Command-line flags plus the YAML file describing buttons, flows, and commands.

mod defaults;
mod validation;

use crate::model::{ActionKind, ButtonRole};
use clap::{Parser, ValueEnum};
use serde::Deserialize;
use std::path::PathBuf;

use defaults::{
    default_log_file, FlowDefaults, DEFAULT_BOUNCE_TIME_SECS, DEFAULT_BUTTONS,
    DEFAULT_CONFIG_PATH, DEFAULT_REBOOT, DEFAULT_SHUTDOWN, DEFAULT_UPDATE_CHECK,
    DEFAULT_UPDATE_CORE, DEFAULT_UPDATE_GRAVITY, DEFAULT_UPDATE_PADD, SYSTEM_FLOW, UPDATE_FLOW,
};
pub use defaults::{
    DEFAULT_CONFIRMATION_TIMEOUT_SECS, DEFAULT_FEEDBACK_DELAY_SECS, DEFAULT_GAMMA,
    DEFAULT_GPIO_CHIP, DEFAULT_LOG_BACKUP_COUNT, DEFAULT_LOG_MAX_BYTES,
    DEFAULT_PWM_FREQUENCY_HZ, DEFAULT_PWM_RETRY_ATTEMPTS,
};
pub use validation::ConfigError;

/// CLI options for the controller daemon.
#[derive(Debug, Parser, Clone)]
#[command(about = "Button controller for a PADD/Pi-hole display", author, version)]
pub struct AppConfig {
    /// Path to the controller configuration (YAML)
    #[arg(long, env = "PADD_CONTROL_CONFIG", default_value = DEFAULT_CONFIG_PATH)]
    pub config: PathBuf,

    /// Print environment diagnostics and exit
    #[arg(long = "doctor", default_value_t = false)]
    pub doctor: bool,

    /// Validate the configuration file and exit
    #[arg(long = "check-config", default_value_t = false)]
    pub check_config: bool,

    /// Create the tmux session (PADD + control window) if it is missing
    #[arg(long = "create-session", default_value_t = false)]
    pub create_session: bool,

    /// Disable the log file (stderr mirroring still applies)
    #[arg(long = "no-logs", env = "PADD_CONTROL_NO_LOGS", default_value_t = false)]
    pub no_logs: bool,

    /// Mirror log output to stderr
    #[arg(long = "log-stderr", default_value_t = false)]
    pub log_stderr: bool,

    /// Override `logging.level` from the config file
    #[arg(long = "log-level", value_enum)]
    pub log_level: Option<LogLevel>,
}

impl AppConfig {
    /// Load the YAML file named by `--config` and apply CLI overrides.
    pub fn load_controller(&self) -> Result<ControllerConfig, ConfigError> {
        let mut controller = ControllerConfig::load(&self.config)?;
        if let Some(level) = self.log_level {
            controller.logging.level = level;
        }
        Ok(controller)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Error,
    #[serde(alias = "warning")]
    Warn,
    #[default]
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    pub fn as_str(self) -> &'static str {
        match self {
            LogLevel::Error => "error",
            LogLevel::Warn => "warn",
            LogLevel::Info => "info",
            LogLevel::Debug => "debug",
            LogLevel::Trace => "trace",
        }
    }

    pub fn to_level(self) -> tracing::Level {
        match self {
            LogLevel::Error => tracing::Level::ERROR,
            LogLevel::Warn => tracing::Level::WARN,
            LogLevel::Info => tracing::Level::INFO,
            LogLevel::Debug => tracing::Level::DEBUG,
            LogLevel::Trace => tracing::Level::TRACE,
        }
    }
}

/// Contents of the YAML configuration file. Loaded once and never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ControllerConfig {
    pub confirmation_timeout_seconds: u64,
    pub feedback_delay_seconds: u64,
    pub gpio_chip: PathBuf,
    pub buttons: Vec<ButtonConfig>,
    pub flows: FlowsConfig,
    pub actions: ActionsConfig,
    pub display: DisplayConfig,
    pub logging: LoggingConfig,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            confirmation_timeout_seconds: DEFAULT_CONFIRMATION_TIMEOUT_SECS,
            feedback_delay_seconds: DEFAULT_FEEDBACK_DELAY_SECS,
            gpio_chip: PathBuf::from(DEFAULT_GPIO_CHIP),
            buttons: DEFAULT_BUTTONS
                .iter()
                .map(|(pin, role, hold_time)| ButtonConfig {
                    hold_time: *hold_time,
                    ..ButtonConfig::new(*pin, *role)
                })
                .collect(),
            flows: FlowsConfig::default(),
            actions: ActionsConfig::default(),
            display: DisplayConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ButtonConfig {
    pub pin: u32,
    #[serde(alias = "function")]
    pub role: ButtonRole,
    #[serde(default = "default_true")]
    pub pull_up: bool,
    /// Seconds; edges closer together than this are ignored.
    #[serde(default = "default_bounce_time")]
    pub bounce_time: f64,
    /// Present means the button reports hold durations on release.
    #[serde(default)]
    pub hold_time: Option<f64>,
    #[serde(default)]
    pub hold_repeat: bool,
}

impl ButtonConfig {
    pub fn new(pin: u32, role: ButtonRole) -> Self {
        Self {
            pin,
            role,
            pull_up: true,
            bounce_time: DEFAULT_BOUNCE_TIME_SECS,
            hold_time: None,
            hold_repeat: false,
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_bounce_time() -> f64 {
    DEFAULT_BOUNCE_TIME_SECS
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FlowsConfig {
    pub update: FlowConfig,
    pub system: FlowConfig,
}

/// Per-flow overrides. Missing fields fall back to that flow's built-in values.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FlowConfig {
    pub trigger: Option<ButtonRole>,
    pub low_threshold: Option<f64>,
    pub high_threshold: Option<f64>,
    pub lesser_action: Option<ActionKind>,
    pub greater_action: Option<ActionKind>,
    pub options: FlowOptionsConfig,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FlowOptionsConfig {
    pub confirm_option_a: Option<ActionKind>,
    pub confirm_option_b: Option<ActionKind>,
}

/// A flow with every default filled in, before conversion to runtime types.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedFlow {
    pub trigger: ButtonRole,
    pub low_threshold: f64,
    pub high_threshold: f64,
    pub lesser_action: ActionKind,
    pub greater_action: ActionKind,
    pub options: Vec<(ButtonRole, ActionKind)>,
}

impl FlowConfig {
    fn resolve(&self, defaults: &FlowDefaults) -> ResolvedFlow {
        ResolvedFlow {
            trigger: self.trigger.unwrap_or(defaults.trigger),
            low_threshold: self.low_threshold.unwrap_or(defaults.low),
            high_threshold: self.high_threshold.unwrap_or(defaults.high),
            lesser_action: self.lesser_action.unwrap_or(defaults.lesser),
            greater_action: self.greater_action.unwrap_or(defaults.greater),
            options: vec![
                (
                    ButtonRole::ConfirmOptionA,
                    self.options.confirm_option_a.unwrap_or(defaults.option_a),
                ),
                (
                    ButtonRole::ConfirmOptionB,
                    self.options.confirm_option_b.unwrap_or(defaults.option_b),
                ),
            ],
        }
    }
}

impl FlowsConfig {
    pub fn update(&self) -> ResolvedFlow {
        self.update.resolve(&UPDATE_FLOW)
    }

    pub fn system(&self) -> ResolvedFlow {
        self.system.resolve(&SYSTEM_FLOW)
    }
}

/// Command line for every command action. `update_check: null` disables the pre-check.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ActionsConfig {
    pub update_gravity: String,
    pub update_pi_hole_core: String,
    pub update_padd: String,
    pub reboot: String,
    pub shutdown: String,
    pub update_check: Option<String>,
}

impl Default for ActionsConfig {
    fn default() -> Self {
        Self {
            update_gravity: DEFAULT_UPDATE_GRAVITY.to_string(),
            update_pi_hole_core: DEFAULT_UPDATE_CORE.to_string(),
            update_padd: DEFAULT_UPDATE_PADD.to_string(),
            reboot: DEFAULT_REBOOT.to_string(),
            shutdown: DEFAULT_SHUTDOWN.to_string(),
            update_check: Some(DEFAULT_UPDATE_CHECK.to_string()),
        }
    }
}

impl ActionsConfig {
    pub fn command(&self, action: ActionKind) -> Option<&str> {
        match action {
            ActionKind::StepBrightness => None,
            ActionKind::UpdateGravity => Some(self.update_gravity.as_str()),
            ActionKind::UpdatePiHoleCore => Some(self.update_pi_hole_core.as_str()),
            ActionKind::UpdatePadd => Some(self.update_padd.as_str()),
            ActionKind::Reboot => Some(self.reboot.as_str()),
            ActionKind::Shutdown => Some(self.shutdown.as_str()),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DisplayConfig {
    pub tmux: TmuxConfig,
    pub backlight: BacklightConfig,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TmuxConfig {
    pub session_name: String,
    pub padd_window: String,
    pub control_window: String,
    /// Command run in the PADD window when `--create-session` builds the session.
    pub padd_command: String,
}

impl Default for TmuxConfig {
    fn default() -> Self {
        Self {
            session_name: "padd".to_string(),
            padd_window: "padd".to_string(),
            control_window: "control".to_string(),
            padd_command: "padd.sh".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BacklightConfig {
    pub enabled: bool,
    pub pwm_chip: u32,
    pub pwm_channel: u32,
    pub pwm_frequency: u32,
    pub gamma: f64,
    pub retry_attempts: u32,
}

impl Default for BacklightConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            pwm_chip: 0,
            pwm_channel: 0,
            pwm_frequency: DEFAULT_PWM_FREQUENCY_HZ,
            gamma: DEFAULT_GAMMA,
            retry_attempts: DEFAULT_PWM_RETRY_ATTEMPTS,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LoggingConfig {
    pub level: LogLevel,
    pub file: PathBuf,
    pub max_bytes: u64,
    pub backup_count: usize,
    /// Emit JSON lines instead of plain text.
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: LogLevel::Info,
            file: default_log_file(),
            max_bytes: DEFAULT_LOG_MAX_BYTES,
            backup_count: DEFAULT_LOG_BACKUP_COUNT,
            json: false,
        }
    }
}
