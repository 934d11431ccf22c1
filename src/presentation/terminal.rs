//! Renders prompts and status text into the tmux control window.
//!
//! The daemon itself runs inside the control window, so "rendering" is writing to
//! stdout after switching tmux to that window.

use super::tmux::{TmuxController, WindowSwitcher};
use super::{PresentationError, PresentationPort, Prompt};
use crate::executor::{stream_command, CommandLine};
use crate::lock_or_recover;
use crate::model::ActionKind;
use crossterm::cursor::MoveTo;
use crossterm::queue;
use crossterm::style::{Attribute, Print, SetAttribute};
use crossterm::terminal::{Clear, ClearType};
use std::io::{self, Write};
use std::sync::Mutex;

const UPDATE_CHECK_FAILED: &str = "Update check failed!";

pub struct ControlWindow<S: WindowSwitcher = TmuxController> {
    switcher: S,
    control_window: String,
    padd_window: String,
    out: Mutex<Box<dyn Write + Send>>,
    update_check: Option<CommandLine>,
}

impl ControlWindow<TmuxController> {
    pub fn for_tmux(tmux: TmuxController, update_check: Option<CommandLine>) -> Self {
        let control = tmux.control_window().to_string();
        let padd = tmux.padd_window().to_string();
        Self::new(tmux, &control, &padd, Box::new(io::stdout()), update_check)
    }
}

impl<S: WindowSwitcher> ControlWindow<S> {
    pub fn new(
        switcher: S,
        control_window: &str,
        padd_window: &str,
        out: Box<dyn Write + Send>,
        update_check: Option<CommandLine>,
    ) -> Self {
        Self {
            switcher,
            control_window: control_window.to_string(),
            padd_window: padd_window.to_string(),
            out: Mutex::new(out),
            update_check,
        }
    }

    fn write_bytes(&self, bytes: &[u8]) -> Result<(), PresentationError> {
        let mut out = lock_or_recover(&self.out, "control window output");
        out.write_all(bytes)
            .and_then(|()| out.flush())
            .map_err(|err| PresentationError::Io(err.to_string()))
    }

    fn write_line(&self, line: &str) -> Result<(), PresentationError> {
        self.write_bytes(format!("{line}\n").as_bytes())
    }

    /// Clear the pane and print a bold, underlined heading.
    fn heading(&self, title: &str) -> Result<(), PresentationError> {
        let mut buf = Vec::new();
        queue!(
            buf,
            Clear(ClearType::All),
            MoveTo(0, 0),
            Print("\n\n"),
            SetAttribute(Attribute::Bold),
            Print(title),
            SetAttribute(Attribute::Reset),
            Print(format!("\n{}\n", "-".repeat(title.chars().count())))
        )
        .map_err(|err| PresentationError::Io(err.to_string()))?;
        self.write_bytes(&buf)
    }

    fn run_update_check(&self, command: &CommandLine) -> Result<(), PresentationError> {
        self.heading("Checking for Pi-hole Updates")?;
        let mut write_failed = None;
        let result = stream_command(command, &mut |line: &str| {
            if let Err(err) = self.write_line(line) {
                write_failed.get_or_insert(err);
            }
        });
        if let Some(err) = write_failed {
            return Err(err);
        }
        match result {
            Ok(result) if result.succeeded => {
                self.write_line("")?;
                self.write_line("Updates are available.")
            }
            Ok(result) => {
                tracing::error!(exit_code = ?result.exit_code, "update check failed");
                let _ = self.write_line("");
                let _ = self.write_line(UPDATE_CHECK_FAILED);
                Err(PresentationError::CheckFailed(UPDATE_CHECK_FAILED.to_string()))
            }
            Err(err) => {
                tracing::error!(error = %err, "update check could not run");
                let _ = self.write_line(UPDATE_CHECK_FAILED);
                Err(PresentationError::CheckFailed(UPDATE_CHECK_FAILED.to_string()))
            }
        }
    }
}

impl<S: WindowSwitcher> PresentationPort for ControlWindow<S> {
    fn is_ready(&self) -> bool {
        self.switcher.has_session()
    }

    fn show_prompt(&self, prompt: &Prompt) -> Result<(), PresentationError> {
        self.switcher.switch_window(&self.control_window)?;
        match (&self.update_check, prompt.action) {
            (Some(check), ActionKind::UpdatePiHoleCore) => self.run_update_check(check)?,
            _ => self.heading(prompt.flow.title())?,
        }
        let mut body = String::from("\n");
        for line in prompt.body_lines() {
            body.push_str(&line);
            body.push('\n');
        }
        self.write_bytes(body.as_bytes())
    }

    fn show_message(&self, message: &str) {
        if let Err(err) = self.write_line(&format!("\n{message}")) {
            tracing::warn!(error = %err, "failed to show message");
        }
    }

    fn show_progress(&self, line: &str) {
        if let Err(err) = self.write_line(line) {
            tracing::warn!(error = %err, "failed to show progress");
        }
    }

    fn show_default_view(&self) -> Result<(), PresentationError> {
        self.switcher.switch_window(&self.padd_window)
    }
}
