//! Presentation port: how prompts, progress, and the default view reach the user.
//!
//! The appliance renders into a tmux "control" window and flips back to the PADD
//! dashboard afterwards. The coordinator only sees [`PresentationPort`].

pub mod terminal;
pub mod tmux;

use crate::model::{ActionKind, ButtonRole, FlowKind};
use std::fmt;
use std::time::Duration;

pub use terminal::ControlWindow;
pub use tmux::TmuxController;

/// Everything needed to render one confirmation prompt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Prompt {
    pub flow: FlowKind,
    pub action: ActionKind,
    pub options: Vec<(ButtonRole, ActionKind)>,
    pub timeout: Duration,
}

impl Prompt {
    /// Plain-text body shown under the prompt title.
    pub fn body_lines(&self) -> Vec<String> {
        let mut lines = Vec::with_capacity(self.options.len() + 4);
        lines.push(format!("Requested: {}", self.action.title()));
        lines.push(String::new());
        for (role, action) in &self.options {
            lines.push(format!("  {:<18} {}", button_caption(*role), action.title()));
        }
        lines.push(String::new());
        lines.push(format!(
            "Hold a menu button or wait {} seconds to cancel",
            self.timeout.as_secs()
        ));
        lines
    }
}

fn button_caption(role: ButtonRole) -> &'static str {
    match role {
        ButtonRole::BrightnessOrMenuOpen => "Brightness button",
        ButtonRole::UpdateMenuOpen => "Update button",
        ButtonRole::ConfirmOptionA => "Option A button",
        ButtonRole::ConfirmOptionB => "Option B button",
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PresentationError {
    /// tmux missing, or the session/window cannot be reached.
    Unavailable(String),
    /// Switching windows did not land on the expected window.
    WindowSwitch { expected: String, actual: String },
    /// A pre-prompt check (for example the core update check) failed.
    CheckFailed(String),
    Io(String),
}

impl fmt::Display for PresentationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PresentationError::Unavailable(msg) => write!(f, "display unavailable: {msg}"),
            PresentationError::WindowSwitch { expected, actual } => {
                write!(f, "window switch failed: expected '{expected}', found '{actual}'")
            }
            PresentationError::CheckFailed(msg) => write!(f, "{msg}"),
            PresentationError::Io(msg) => write!(f, "display I/O error: {msg}"),
        }
    }
}

impl std::error::Error for PresentationError {}

pub trait PresentationPort: Send + Sync {
    /// Checked once at startup; `false` aborts the daemon.
    fn is_ready(&self) -> bool;
    fn show_prompt(&self, prompt: &Prompt) -> Result<(), PresentationError>;
    /// Status line such as "Update cancelled". Failures are logged, not returned.
    fn show_message(&self, message: &str);
    /// One line of streamed action output.
    fn show_progress(&self, line: &str);
    fn show_default_view(&self) -> Result<(), PresentationError>;
}
