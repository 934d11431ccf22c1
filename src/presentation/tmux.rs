//! Thin wrapper over the `tmux` CLI for the PADD session.

use super::PresentationError;
use crate::config::TmuxConfig;
use std::process::{Command, Output};

/// Window switching as the control window needs it.
pub trait WindowSwitcher: Send + Sync {
    fn has_session(&self) -> bool;
    fn switch_window(&self, window: &str) -> Result<(), PresentationError>;
}

#[derive(Debug, Clone)]
pub struct TmuxController {
    program: String,
    session: String,
    padd_window: String,
    control_window: String,
    padd_command: String,
}

impl TmuxController {
    pub fn new(config: &TmuxConfig) -> Self {
        Self::with_program("tmux", config)
    }

    /// Use a different tmux binary (tests point this at a stub script).
    pub fn with_program(program: &str, config: &TmuxConfig) -> Self {
        Self {
            program: program.to_string(),
            session: config.session_name.clone(),
            padd_window: config.padd_window.clone(),
            control_window: config.control_window.clone(),
            padd_command: config.padd_command.clone(),
        }
    }

    pub fn session(&self) -> &str {
        &self.session
    }

    fn run(&self, args: &[&str]) -> Result<Output, PresentationError> {
        tracing::debug!(program = %self.program, args = ?args, "running tmux command");
        Command::new(&self.program)
            .args(args)
            .output()
            .map_err(|err| PresentationError::Unavailable(format!("{}: {err}", self.program)))
    }

    fn run_checked(&self, args: &[&str]) -> Result<String, PresentationError> {
        let output = self.run(args)?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(PresentationError::Unavailable(format!(
                "tmux {} failed: {}",
                args.first().copied().unwrap_or_default(),
                stderr.trim()
            )));
        }
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }

    /// Returns the `tmux -V` version line.
    pub fn verify_available(&self) -> Result<String, PresentationError> {
        self.run_checked(&["-V"]).map(|out| out.trim().to_string())
    }

    pub fn list_windows(&self) -> Result<Vec<String>, PresentationError> {
        let target = self.session.as_str();
        let out = self.run_checked(&["list-windows", "-t", target, "-F", "#W"])?;
        Ok(out.lines().map(|line| line.trim().to_string()).collect())
    }

    pub fn current_window(&self) -> Result<String, PresentationError> {
        let target = self.session.as_str();
        self.run_checked(&["display-message", "-p", "-t", target, "#W"])
            .map(|out| out.trim().to_string())
    }

    /// Detached session with PADD in the first window and an empty control window.
    /// Succeeds without changes when the session already exists.
    pub fn create_session(&self) -> Result<(), PresentationError> {
        if self.has_session() {
            tracing::debug!(session = %self.session, "tmux session already exists");
            return Ok(());
        }
        tracing::info!(session = %self.session, "creating tmux session");
        let session = self.session.as_str();
        self.run_checked(&[
            "new-session",
            "-d",
            "-s",
            session,
            "-n",
            self.padd_window.as_str(),
            self.padd_command.as_str(),
        ])?;
        self.run_checked(&["set-option", "-t", session, "status", "off"])?;
        let next = format!("{session}:1");
        let control = self.control_window.as_str();
        self.run_checked(&["new-window", "-t", next.as_str(), "-n", control])?;
        let padd = format!("{session}:{}", self.padd_window);
        self.run_checked(&["select-window", "-t", padd.as_str()])?;
        Ok(())
    }

    pub fn padd_window(&self) -> &str {
        &self.padd_window
    }

    pub fn control_window(&self) -> &str {
        &self.control_window
    }
}

impl WindowSwitcher for TmuxController {
    fn has_session(&self) -> bool {
        match self.run(&["has-session", "-t", self.session.as_str()]) {
            Ok(output) => output.status.success(),
            Err(err) => {
                tracing::error!(session = %self.session, error = %err, "has-session failed");
                false
            }
        }
    }

    fn switch_window(&self, window: &str) -> Result<(), PresentationError> {
        let windows = self.list_windows()?;
        if !windows.iter().any(|name| name == window) {
            return Err(PresentationError::Unavailable(format!(
                "window '{window}' not found in session '{}'",
                self.session
            )));
        }
        let target = format!("{}:{window}", self.session);
        self.run_checked(&["select-window", "-t", target.as_str()])?;
        let actual = self.current_window()?;
        if actual != window {
            return Err(PresentationError::WindowSwitch {
                expected: window.to_string(),
                actual,
            });
        }
        tracing::debug!(window, "switched tmux window");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::os::unix::fs::PermissionsExt;
    use std::path::PathBuf;
    use std::time::{SystemTime, UNIX_EPOCH};

    /// Writes a stub `tmux` that logs its arguments and answers from fixed state.
    fn stub_tmux(label: &str, current_window: &str) -> (PathBuf, PathBuf) {
        let nanos = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap()
            .as_nanos();
        let dir = std::env::temp_dir().join(format!("padd_tmux_{label}_{nanos}"));
        fs::create_dir_all(&dir).unwrap();
        let log = dir.join("calls.log");
        let script = dir.join("tmux");
        let body = format!(
            "#!/bin/sh\n\
             echo \"$*\" >> '{log}'\n\
             case \"$1\" in\n\
               -V) echo 'tmux 3.3a' ;;\n\
               has-session) [ \"$3\" = padd ] ;;\n\
               list-windows) printf 'padd\\ncontrol\\n' ;;\n\
               display-message) echo '{current_window}' ;;\n\
               *) exit 0 ;;\n\
             esac\n",
            log = log.display()
        );
        fs::write(&script, body).unwrap();
        fs::set_permissions(&script, fs::Permissions::from_mode(0o755)).unwrap();
        (script, log)
    }

    fn controller(script: &PathBuf, session: &str) -> TmuxController {
        let config = TmuxConfig {
            session_name: session.to_string(),
            ..TmuxConfig::default()
        };
        TmuxController::with_program(script.to_str().unwrap(), &config)
    }

    #[test]
    fn reports_version_and_session_presence() {
        let (script, _) = stub_tmux("version", "padd");
        assert_eq!(
            controller(&script, "padd").verify_available().unwrap(),
            "tmux 3.3a"
        );
        assert!(controller(&script, "padd").has_session());
        assert!(!controller(&script, "other").has_session());
    }

    #[test]
    fn switch_verifies_landing_window() {
        let (script, log) = stub_tmux("switch", "control");
        let tmux = controller(&script, "padd");
        tmux.switch_window("control").unwrap();
        let calls = fs::read_to_string(log).unwrap();
        assert!(calls.contains("select-window -t padd:control"));

        let err = tmux.switch_window("padd").unwrap_err();
        assert_eq!(
            err,
            PresentationError::WindowSwitch {
                expected: "padd".into(),
                actual: "control".into()
            }
        );
    }

    #[test]
    fn switch_rejects_unknown_window() {
        let (script, log) = stub_tmux("unknown", "padd");
        let err = controller(&script, "padd")
            .switch_window("stats")
            .unwrap_err();
        assert!(matches!(err, PresentationError::Unavailable(_)));
        assert!(!fs::read_to_string(log).unwrap().contains("select-window"));
    }

    #[test]
    fn create_session_is_skipped_when_present() {
        let (script, log) = stub_tmux("create_present", "padd");
        controller(&script, "padd").create_session().unwrap();
        assert!(!fs::read_to_string(&log).unwrap().contains("new-session"));

        controller(&script, "fresh").create_session().unwrap();
        let calls = fs::read_to_string(log).unwrap();
        assert!(calls.contains("new-session -d -s fresh -n padd padd.sh"));
        assert!(calls.contains("set-option -t fresh status off"));
        assert!(calls.contains("new-window -t fresh:1 -n control"));
        assert!(calls.contains("select-window -t fresh:padd"));
    }

    #[test]
    fn missing_binary_is_unavailable() {
        let tmux = TmuxController::with_program(
            "/nonexistent/padd-control/tmux",
            &TmuxConfig::default(),
        );
        assert!(matches!(
            tmux.verify_available(),
            Err(PresentationError::Unavailable(_))
        ));
        assert!(!tmux.has_session());
    }
}
