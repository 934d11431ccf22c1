//! Display backlight: stepped, gamma-corrected brightness over sysfs PWM.

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::thread;
use std::time::Duration;

/// 11 steps from full brightness down to off. Each step press moves one entry right,
/// wrapping back to the start.
pub const BRIGHTNESS_LEVELS: [f64; 11] = [1.0, 0.9, 0.8, 0.7, 0.6, 0.5, 0.4, 0.3, 0.2, 0.1, 0.0];

const PWM_SYSFS_ROOT: &str = "/sys/class/pwm";
const PWM_RETRY_DELAY: Duration = Duration::from_millis(500);

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BacklightError {
    Init { attempts: u32, message: String },
    Write(String),
}

impl fmt::Display for BacklightError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BacklightError::Init { attempts, message } => write!(
                f,
                "failed to initialize PWM after {attempts} attempts: {message}"
            ),
            BacklightError::Write(msg) => write!(f, "failed to set brightness: {msg}"),
        }
    }
}

impl std::error::Error for BacklightError {}

/// Something that accepts a duty cycle in `0.0..=1.0`.
pub trait PwmOutput: Send {
    fn set_duty(&mut self, duty: f64) -> Result<(), BacklightError>;
    fn release(&mut self) -> Result<(), BacklightError>;
}

/// The in-process side of the brightness button.
pub trait Brightness: Send {
    /// Advance one level and return the new percentage.
    fn step(&mut self) -> Result<u8, BacklightError>;
    fn percentage(&self) -> u8;
    /// Full brightness, then release the output. Called once at shutdown.
    fn restore(&mut self) -> Result<(), BacklightError>;
}

pub fn apply_gamma(value: f64, gamma: f64) -> f64 {
    if value > 0.0 {
        value.powf(gamma)
    } else {
        0.0
    }
}

pub struct Backlight<P: PwmOutput> {
    output: P,
    gamma: f64,
    step: usize,
}

impl<P: PwmOutput> Backlight<P> {
    /// Take ownership of `output` and drive it to full brightness.
    pub fn new(mut output: P, gamma: f64) -> Result<Self, BacklightError> {
        output.set_duty(apply_gamma(BRIGHTNESS_LEVELS[0], gamma))?;
        Ok(Self {
            output,
            gamma,
            step: 0,
        })
    }

    fn apply(&mut self) -> Result<(), BacklightError> {
        let raw = BRIGHTNESS_LEVELS[self.step];
        let corrected = apply_gamma(raw, self.gamma);
        self.output.set_duty(corrected)?;
        tracing::debug!(raw, corrected, "brightness applied");
        Ok(())
    }
}

impl<P: PwmOutput> Brightness for Backlight<P> {
    fn step(&mut self) -> Result<u8, BacklightError> {
        self.step = (self.step + 1) % BRIGHTNESS_LEVELS.len();
        self.apply()?;
        Ok(self.percentage())
    }

    fn percentage(&self) -> u8 {
        (BRIGHTNESS_LEVELS[self.step] * 100.0).round() as u8
    }

    fn restore(&mut self) -> Result<(), BacklightError> {
        self.step = 0;
        let applied = self.apply();
        let released = self.output.release();
        applied.and(released)
    }
}

/// One channel of a Linux PWM chip, driven through sysfs.
#[derive(Debug)]
pub struct SysfsPwm {
    channel_dir: PathBuf,
    period_ns: u64,
}

/// Sysfs directory of one PWM chip.
pub fn pwm_chip_dir(chip: u32) -> PathBuf {
    Path::new(PWM_SYSFS_ROOT).join(format!("pwmchip{chip}"))
}

impl SysfsPwm {
    pub fn open(chip: u32, channel: u32, frequency_hz: u32) -> Result<Self, BacklightError> {
        Self::open_at(Path::new(PWM_SYSFS_ROOT), chip, channel, frequency_hz)
    }

    /// Like [`SysfsPwm::open`] with a custom sysfs root.
    pub fn open_at(
        root: &Path,
        chip: u32,
        channel: u32,
        frequency_hz: u32,
    ) -> Result<Self, BacklightError> {
        let write_err = |err: std::io::Error| BacklightError::Write(err.to_string());
        if frequency_hz == 0 {
            return Err(BacklightError::Write("PWM frequency must be non-zero".into()));
        }
        let chip_dir = root.join(format!("pwmchip{chip}"));
        let channel_dir = chip_dir.join(format!("pwm{channel}"));
        if !channel_dir.exists() {
            fs::write(chip_dir.join("export"), channel.to_string()).map_err(write_err)?;
            // The kernel creates the channel directory asynchronously.
            for _ in 0..10 {
                if channel_dir.exists() {
                    break;
                }
                thread::sleep(Duration::from_millis(20));
            }
            if !channel_dir.exists() {
                return Err(BacklightError::Write(format!(
                    "{} did not appear after export",
                    channel_dir.display()
                )));
            }
        }
        let period_ns = 1_000_000_000 / u64::from(frequency_hz);
        fs::write(channel_dir.join("period"), period_ns.to_string()).map_err(write_err)?;
        fs::write(channel_dir.join("duty_cycle"), "0").map_err(write_err)?;
        fs::write(channel_dir.join("enable"), "1").map_err(write_err)?;
        Ok(Self {
            channel_dir,
            period_ns,
        })
    }

    /// Retry [`SysfsPwm::open`] with a short pause, for boards where the chip appears late.
    pub fn open_with_retry(
        chip: u32,
        channel: u32,
        frequency_hz: u32,
        attempts: u32,
    ) -> Result<Self, BacklightError> {
        let attempts = attempts.max(1);
        let mut last_error = String::new();
        for attempt in 1..=attempts {
            tracing::info!(chip, channel, attempt, attempts, "initializing backlight PWM");
            match Self::open(chip, channel, frequency_hz) {
                Ok(pwm) => return Ok(pwm),
                Err(err) => {
                    tracing::error!(attempt, error = %err, "PWM initialization attempt failed");
                    last_error = err.to_string();
                }
            }
            if attempt < attempts {
                thread::sleep(PWM_RETRY_DELAY);
            }
        }
        Err(BacklightError::Init {
            attempts,
            message: last_error,
        })
    }

    pub fn channel_dir(&self) -> &Path {
        &self.channel_dir
    }
}

impl PwmOutput for SysfsPwm {
    fn set_duty(&mut self, duty: f64) -> Result<(), BacklightError> {
        if !(0.0..=1.0).contains(&duty) {
            return Err(BacklightError::Write(format!("duty {duty} out of range")));
        }
        let duty_ns = (self.period_ns as f64 * duty).round() as u64;
        fs::write(self.channel_dir.join("duty_cycle"), duty_ns.to_string())
            .map_err(|err| BacklightError::Write(err.to_string()))
    }

    fn release(&mut self) -> Result<(), BacklightError> {
        fs::write(self.channel_dir.join("enable"), "0")
            .map_err(|err| BacklightError::Write(err.to_string()))
    }
}
