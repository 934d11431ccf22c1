use super::defaults::{
    MAX_BOUNCE_TIME_SECS, MAX_CONFIRMATION_TIMEOUT_SECS, MAX_FEEDBACK_DELAY_SECS, MAX_GAMMA,
    TMUX_NAME_PATTERN,
};
use super::{ControllerConfig, ResolvedFlow};
use crate::coordinator::CoordinatorSettings;
use crate::executor::CommandLine;
use crate::flow::{FlowSpec, OptionTable};
use crate::hold::HoldThresholds;
use crate::model::{ActionKind, ButtonRole, FlowKind};
use regex::Regex;
use std::collections::{HashMap, HashSet};
use std::sync::OnceLock;
use std::time::Duration;
use std::{fmt, fs, path::Path};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    Read { path: String, message: String },
    Parse(String),
    Invalid(String),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::Read { path, message } => {
                write!(f, "failed to read config '{path}': {message}")
            }
            ConfigError::Parse(msg) => write!(f, "invalid config syntax: {msg}"),
            ConfigError::Invalid(msg) => write!(f, "invalid config: {msg}"),
        }
    }
}

impl std::error::Error for ConfigError {}

macro_rules! invalid {
    ($($arg:tt)*) => {
        return Err(ConfigError::Invalid(format!($($arg)*)))
    };
}

fn tmux_name_regex() -> &'static Regex {
    static TMUX_NAME_RE: OnceLock<Regex> = OnceLock::new();
    TMUX_NAME_RE
        .get_or_init(|| Regex::new(TMUX_NAME_PATTERN).expect("tmux name regex should compile"))
}

fn seconds(value: f64, what: &str) -> Result<Duration, ConfigError> {
    Duration::try_from_secs_f64(value).map_err(|_| {
        ConfigError::Invalid(format!("{what} must be a non-negative number, got {value}"))
    })
}

impl ControllerConfig {
    /// Read, parse, and validate a config file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let raw = fs::read_to_string(path).map_err(|err| ConfigError::Read {
            path: path.display().to_string(),
            message: err.to_string(),
        })?;
        Self::from_yaml_str(&raw)
    }

    pub fn from_yaml_str(raw: &str) -> Result<Self, ConfigError> {
        // An empty file means "all defaults".
        let config: Self = if raw.trim().is_empty() {
            Self::default()
        } else {
            serde_yaml::from_str(raw).map_err(|err| ConfigError::Parse(err.to_string()))?
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(1..=MAX_CONFIRMATION_TIMEOUT_SECS).contains(&self.confirmation_timeout_seconds) {
            invalid!(
                "confirmation_timeout_seconds must be between 1 and {MAX_CONFIRMATION_TIMEOUT_SECS}, got {}",
                self.confirmation_timeout_seconds
            );
        }
        if self.feedback_delay_seconds > MAX_FEEDBACK_DELAY_SECS {
            invalid!(
                "feedback_delay_seconds must be between 0 and {MAX_FEEDBACK_DELAY_SECS}, got {}",
                self.feedback_delay_seconds
            );
        }

        self.validate_buttons()?;
        self.validate_flows()?;

        for action in ActionKind::COMMANDS {
            if let Some(raw) = self.actions.command(action) {
                CommandLine::parse(raw)
                    .map_err(|err| ConfigError::Invalid(format!("actions.{action}: {err}")))?;
            }
        }
        if let Some(raw) = &self.actions.update_check {
            CommandLine::parse(raw)
                .map_err(|err| ConfigError::Invalid(format!("actions.update_check: {err}")))?;
        }

        let tmux = &self.display.tmux;
        for (field, value) in [
            ("session_name", &tmux.session_name),
            ("padd_window", &tmux.padd_window),
            ("control_window", &tmux.control_window),
        ] {
            if !tmux_name_regex().is_match(value) {
                invalid!("display.tmux.{field} must match {TMUX_NAME_PATTERN}, got '{value}'");
            }
        }
        if tmux.padd_window == tmux.control_window {
            invalid!("display.tmux.padd_window and control_window must differ");
        }
        if tmux.padd_command.trim().is_empty() {
            invalid!("display.tmux.padd_command must not be empty");
        }

        let backlight = &self.display.backlight;
        if !(backlight.gamma > 0.0 && backlight.gamma <= MAX_GAMMA) {
            invalid!(
                "display.backlight.gamma must be in (0, {MAX_GAMMA}], got {}",
                backlight.gamma
            );
        }
        if backlight.pwm_frequency == 0 {
            invalid!("display.backlight.pwm_frequency must be non-zero");
        }
        if backlight.retry_attempts == 0 {
            invalid!("display.backlight.retry_attempts must be at least 1");
        }

        if self.logging.max_bytes == 0 {
            invalid!("logging.max_bytes must be non-zero");
        }
        Ok(())
    }

    fn validate_buttons(&self) -> Result<(), ConfigError> {
        if self.buttons.is_empty() {
            invalid!("at least one button must be configured");
        }
        let mut pins = HashSet::new();
        let mut roles = HashSet::new();
        for button in &self.buttons {
            if !pins.insert(button.pin) {
                invalid!("pin {} is assigned to more than one button", button.pin);
            }
            if !roles.insert(button.role) {
                invalid!("role {} is assigned to more than one button", button.role);
            }
            let bounce = seconds(button.bounce_time, "bounce_time")?;
            if bounce > Duration::from_secs_f64(MAX_BOUNCE_TIME_SECS) {
                invalid!(
                    "bounce_time for pin {} must be at most {MAX_BOUNCE_TIME_SECS}s, got {}",
                    button.pin,
                    button.bounce_time
                );
            }
            if let Some(hold) = button.hold_time {
                seconds(hold, "hold_time")?;
            }
        }
        if self.display.backlight.enabled && !roles.contains(&ButtonRole::BrightnessOrMenuOpen) {
            invalid!(
                "backlight control needs a button with role {}",
                ButtonRole::BrightnessOrMenuOpen
            );
        }
        Ok(())
    }

    fn validate_flows(&self) -> Result<(), ConfigError> {
        let update = self.flows.update();
        let system = self.flows.system();
        if update.trigger == system.trigger {
            invalid!("flows.update and flows.system must use different triggers");
        }
        for (name, flow) in [("update", &update), ("system", &system)] {
            if flow.trigger.is_confirm_option() {
                invalid!("flows.{name}.trigger cannot be a confirm option ({})", flow.trigger);
            }
            let low = seconds(flow.low_threshold, "low_threshold")?;
            let high = seconds(flow.high_threshold, "high_threshold")?;
            if low.is_zero() || low >= high {
                invalid!(
                    "flows.{name} needs 0 < low_threshold < high_threshold, got {} / {}",
                    flow.low_threshold,
                    flow.high_threshold
                );
            }
            let trigger_button = self.buttons.iter().find(|b| b.role == flow.trigger);
            match trigger_button {
                None => invalid!("flows.{name}.trigger role {} has no button", flow.trigger),
                Some(button) if button.hold_time.is_none() => invalid!(
                    "button on pin {} triggers flows.{name} and needs hold_time",
                    button.pin
                ),
                Some(_) => {}
            }
            for action in [flow.lesser_action, flow.greater_action]
                .into_iter()
                .chain(flow.options.iter().map(|(_, action)| *action))
            {
                if !action.is_command() {
                    invalid!("flows.{name} cannot confirm {action}; only command actions");
                }
            }
            for (role, _) in &flow.options {
                if !self.buttons.iter().any(|b| b.role == *role) {
                    invalid!("flows.{name} option role {role} has no button");
                }
            }
        }
        Ok(())
    }

    pub fn coordinator_settings(&self) -> CoordinatorSettings {
        CoordinatorSettings {
            confirmation_timeout: Duration::from_secs(self.confirmation_timeout_seconds),
            feedback_delay: Duration::from_secs(self.feedback_delay_seconds),
        }
    }

    pub fn flow_specs(&self) -> Result<Vec<FlowSpec>, ConfigError> {
        [
            (FlowKind::Update, self.flows.update()),
            (FlowKind::System, self.flows.system()),
        ]
        .into_iter()
        .map(|(kind, flow)| flow_spec(kind, flow))
        .collect()
    }

    pub fn command_table(&self) -> Result<HashMap<ActionKind, CommandLine>, ConfigError> {
        let mut table = HashMap::new();
        for action in ActionKind::COMMANDS {
            if let Some(raw) = self.actions.command(action) {
                let command = CommandLine::parse(raw)
                    .map_err(|err| ConfigError::Invalid(format!("actions.{action}: {err}")))?;
                table.insert(action, command);
            }
        }
        Ok(table)
    }

    pub fn update_check_command(&self) -> Result<Option<CommandLine>, ConfigError> {
        self.actions
            .update_check
            .as_deref()
            .map(|raw| {
                CommandLine::parse(raw)
                    .map_err(|err| ConfigError::Invalid(format!("actions.update_check: {err}")))
            })
            .transpose()
    }
}

fn flow_spec(kind: FlowKind, flow: ResolvedFlow) -> Result<FlowSpec, ConfigError> {
    Ok(FlowSpec {
        kind,
        trigger: flow.trigger,
        thresholds: HoldThresholds::new(
            seconds(flow.low_threshold, "low_threshold")?,
            seconds(flow.high_threshold, "high_threshold")?,
        ),
        lesser: flow.lesser_action,
        greater: flow.greater_action,
        options: OptionTable::new(flow.options),
    })
}
