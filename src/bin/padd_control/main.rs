//! padd-control entrypoint: wires GPIO buttons, the tmux control window, and the
//! backlight to the flow coordinator.
//!
//! # Threads
//!
//! - Button readers: one per configured line, normalize edges into events
//! - Signals: turns SIGINT/SIGTERM/SIGHUP into a shutdown message
//! - Dispatcher (main thread): the only consumer of button events
//! - Confirmation timers: one short-lived thread per armed flow

use anyhow::{bail, Context, Result};
use clap::Parser;
use padd_control::app::{install_panic_hook, spawn_signal_thread, SignalSet};
use padd_control::backlight::{Backlight, Brightness, SysfsPwm};
use padd_control::config::{AppConfig, BacklightConfig};
use padd_control::coordinator::{FlowCoordinator, Ports};
use padd_control::dispatcher::{control_channel, run_dispatcher};
use padd_control::doctor::doctor_report;
use padd_control::executor::ShellExecutor;
use padd_control::input::spawn_inputs;
use padd_control::presentation::{ControlWindow, PresentationPort, TmuxController};
use padd_control::telemetry::{init_tracing, LogTargets};
use padd_control::timer::SystemClock;
use std::sync::Arc;

fn main() -> Result<()> {
    let app = AppConfig::parse();

    if app.doctor {
        println!("{}", doctor_report(&app).render());
        return Ok(());
    }

    let config = app
        .load_controller()
        .with_context(|| format!("configuration {} rejected", app.config.display()))?;
    if app.check_config {
        println!("{}: ok", app.config.display());
        return Ok(());
    }

    // Must happen before any thread is spawned so every thread inherits the mask.
    let signals = SignalSet::termination().context("failed to build signal set")?;
    signals.block().context("failed to block termination signals")?;

    let targets = LogTargets {
        file: !app.no_logs,
        stderr: app.log_stderr,
    };
    match init_tracing(&config.logging, targets) {
        Ok(Some(path)) => tracing::debug!(path = %path.display(), "logging to file"),
        Ok(None) => {}
        Err(err) => tracing::warn!(
            path = %config.logging.file.display(),
            error = %err,
            "log file unavailable; logging to stderr"
        ),
    }
    install_panic_hook();
    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        config = %app.config.display(),
        "padd-control starting"
    );

    let tmux = TmuxController::new(&config.display.tmux);
    let tmux_version = tmux.verify_available().context("tmux is not available")?;
    tracing::info!(version = %tmux_version, "tmux found");
    if app.create_session {
        tmux.create_session()
            .context("failed to create tmux session")?;
    }
    let session = tmux.session().to_string();
    let presentation = Arc::new(ControlWindow::for_tmux(tmux, config.update_check_command()?));
    if !presentation.is_ready() {
        tracing::error!(session = %session, "tmux session not found; not starting");
        bail!("tmux session '{session}' not found (start it or pass --create-session)");
    }

    let executor = Arc::new(ShellExecutor::new(config.command_table()?));
    let specs = config.flow_specs()?;

    let (tx, rx) = control_channel();
    let inputs = spawn_inputs(&config.gpio_chip, &config.buttons, &tx)
        .context("failed to register buttons")?;
    let _signal_thread =
        spawn_signal_thread(signals, tx.clone()).context("failed to start signal thread")?;
    drop(tx);

    let coordinator = FlowCoordinator::new(
        specs,
        config.coordinator_settings(),
        Ports {
            presentation,
            executor,
            clock: Arc::new(SystemClock),
            brightness: init_backlight(&config.display.backlight),
        },
    );
    tracing::info!(buttons = inputs.len(), "ready; waiting for button events");

    let exit = run_dispatcher(&coordinator, &rx);
    tracing::info!(?exit, "dispatcher stopped");
    inputs.shutdown();
    coordinator.release_all();
    tracing::info!("cleanup completed");
    Ok(())
}

/// Backlight failures leave brightness control disabled; the rest keeps running.
fn init_backlight(config: &BacklightConfig) -> Option<Box<dyn Brightness>> {
    if !config.enabled {
        tracing::info!("backlight control disabled in config");
        return None;
    }
    let pwm = match SysfsPwm::open_with_retry(
        config.pwm_chip,
        config.pwm_channel,
        config.pwm_frequency,
        config.retry_attempts,
    ) {
        Ok(pwm) => pwm,
        Err(err) => {
            tracing::error!(error = %err, "backlight control unavailable");
            return None;
        }
    };
    tracing::info!(path = %pwm.channel_dir().display(), "backlight PWM ready");
    match Backlight::new(pwm, config.gamma) {
        Ok(backlight) => Some(Box::new(backlight)),
        Err(err) => {
            tracing::error!(error = %err, "backlight control unavailable");
            None
        }
    }
}
