use crate::backlight::pwm_chip_dir;
use crate::config::{AppConfig, ControllerConfig};
use crate::presentation::tmux::{TmuxController, WindowSwitcher};
use std::{env, fmt::Display, fs, path::Path};

pub struct DoctorReport {
    lines: Vec<String>,
}

impl DoctorReport {
    pub fn new(title: &str) -> Self {
        Self {
            lines: vec![title.to_string()],
        }
    }

    pub fn section(&mut self, title: &str) {
        self.lines.push(String::new());
        self.lines.push(format!("{title}:"));
    }

    pub fn push_kv(&mut self, key: &str, value: impl Display) {
        self.lines.push(format!("  {key}: {value}"));
    }

    pub fn push_line(&mut self, line: impl Into<String>) {
        self.lines.push(line.into());
    }

    pub fn render(&self) -> String {
        self.lines.join("\n")
    }
}

pub fn doctor_report(app: &AppConfig) -> DoctorReport {
    report_with_tmux(app, "tmux")
}

fn report_with_tmux(app: &AppConfig, tmux_program: &str) -> DoctorReport {
    let mut report = DoctorReport::new("padd-control doctor");
    report.push_kv("version", env!("CARGO_PKG_VERSION"));
    report.push_kv("os", format!("{}/{}", env::consts::OS, env::consts::ARCH));
    report.push_kv(
        "gpio_support",
        if cfg!(feature = "gpio") { "compiled in" } else { "disabled" },
    );

    report.section("Config");
    report.push_kv("path", app.config.display());
    let loaded = app.load_controller();
    match &loaded {
        Ok(_) => report.push_kv("validation", "ok"),
        Err(err) => report.push_kv("validation", format!("error: {err}")),
    }
    // Probe the rest with defaults so a broken file still gets a full report.
    let config = loaded.unwrap_or_default();
    report.push_kv(
        "confirmation_timeout",
        format!("{}s", config.confirmation_timeout_seconds),
    );
    report.push_kv("feedback_delay", format!("{}s", config.feedback_delay_seconds));

    report.section("Logging");
    report.push_kv("level", config.logging.level.as_str());
    report.push_kv(
        "file",
        if app.no_logs {
            "disabled (--no-logs)".to_string()
        } else {
            config.logging.file.display().to_string()
        },
    );
    report.push_kv("format", if config.logging.json { "json" } else { "text" });

    push_tmux(&mut report, &config, tmux_program);
    push_gpio(&mut report, &config);
    push_backlight(&mut report, &config);
    report
}

fn push_tmux(report: &mut DoctorReport, config: &ControllerConfig, program: &str) {
    let tmux_config = &config.display.tmux;
    report.section("tmux");
    let tmux = TmuxController::with_program(program, tmux_config);
    match tmux.verify_available() {
        Ok(version) => report.push_kv("version", version),
        Err(err) => {
            report.push_kv("version", format!("error: {err}"));
            return;
        }
    }
    report.push_kv(
        "session",
        format!(
            "{} ({})",
            tmux_config.session_name,
            if tmux.has_session() { "running" } else { "missing" }
        ),
    );
    if let Ok(windows) = tmux.list_windows() {
        report.push_kv("windows", windows.join(", "));
    }
}

fn push_gpio(report: &mut DoctorReport, config: &ControllerConfig) {
    report.section("GPIO");
    report.push_kv("chip", describe_access(&config.gpio_chip));
    report.push_line("  buttons:");
    for button in &config.buttons {
        let hold = button
            .hold_time
            .map(|secs| format!(", hold {secs}s"))
            .unwrap_or_default();
        report.push_line(format!(
            "    - pin {}: {} ({}{hold})",
            button.pin,
            button.role,
            if button.pull_up { "pull-up" } else { "pull-down" },
        ));
    }
}

fn push_backlight(report: &mut DoctorReport, config: &ControllerConfig) {
    let backlight = &config.display.backlight;
    report.section("Backlight");
    if !backlight.enabled {
        report.push_kv("pwm", "disabled");
        return;
    }
    let chip_dir = pwm_chip_dir(backlight.pwm_chip);
    report.push_kv("pwm_chip", describe_access(&chip_dir));
    report.push_kv("pwm_channel", backlight.pwm_channel);
    report.push_kv("frequency", format!("{} Hz", backlight.pwm_frequency));
    report.push_kv("gamma", backlight.gamma);
}

fn describe_access(path: &Path) -> String {
    match fs::metadata(path) {
        Ok(meta) if meta.is_dir() => format!("{} (present)", path.display()),
        Ok(_) => match fs::OpenOptions::new().read(true).open(path) {
            Ok(_) => format!("{} (readable)", path.display()),
            Err(err) => format!("{} (not readable: {err})", path.display()),
        },
        Err(err) => format!("{} (missing: {err})", path.display()),
    }
}
