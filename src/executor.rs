//! Runs the external command behind each action and streams its output.

use crate::model::ActionKind;
use crossbeam_channel::unbounded;
use std::collections::HashMap;
use std::fmt;
use std::io::{BufRead, BufReader, Read};
use std::process::{Command, Stdio};
use std::thread;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExecutionResult {
    /// `None` when the child was terminated by a signal.
    pub exit_code: Option<i32>,
    pub succeeded: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ActionError {
    NotConfigured(ActionKind),
    Spawn { command: String, message: String },
    Io(String),
}

impl fmt::Display for ActionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ActionError::NotConfigured(action) => {
                write!(f, "no command configured for action '{action}'")
            }
            ActionError::Spawn { command, message } => {
                write!(f, "failed to start '{command}': {message}")
            }
            ActionError::Io(msg) => write!(f, "action I/O error: {msg}"),
        }
    }
}

impl std::error::Error for ActionError {}

pub trait ActionExecutor: Send + Sync {
    /// Run `action` to completion, feeding each output line to `progress`.
    fn run(
        &self,
        action: ActionKind,
        progress: &mut dyn FnMut(&str),
    ) -> Result<ExecutionResult, ActionError>;
}

/// A program plus arguments, split with POSIX shell rules but never run through a shell.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandLine {
    pub program: String,
    pub args: Vec<String>,
}

impl CommandLine {
    pub fn parse(raw: &str) -> Result<Self, String> {
        let mut words = shell_words::split(raw).map_err(|err| err.to_string())?;
        if words.is_empty() {
            return Err("command is empty".to_string());
        }
        let program = words.remove(0);
        Ok(Self {
            program,
            args: words,
        })
    }
}

impl fmt::Display for CommandLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut words = Vec::with_capacity(self.args.len() + 1);
        words.push(self.program.as_str());
        words.extend(self.args.iter().map(String::as_str));
        f.write_str(&shell_words::join(words))
    }
}

/// Spawn `command`, forward stdout and stderr lines as they arrive, and wait for exit.
pub fn stream_command(
    command: &CommandLine,
    progress: &mut dyn FnMut(&str),
) -> Result<ExecutionResult, ActionError> {
    let mut child = Command::new(&command.program)
        .args(&command.args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .map_err(|err| ActionError::Spawn {
            command: command.to_string(),
            message: err.to_string(),
        })?;

    let stdout = child
        .stdout
        .take()
        .ok_or_else(|| ActionError::Io("failed to capture stdout".to_string()))?;
    let stderr = child
        .stderr
        .take()
        .ok_or_else(|| ActionError::Io("failed to capture stderr".to_string()))?;

    let (tx, rx) = unbounded::<String>();
    let readers = [
        spawn_line_reader("action-stdout", stdout, tx.clone()),
        spawn_line_reader("action-stderr", stderr, tx),
    ];

    // The channel disconnects once both readers hit EOF.
    for line in rx.iter() {
        tracing::debug!(
            command = %command.program,
            line = %strip_ansi_escapes::strip_str(&line),
            "action output"
        );
        progress(&line);
    }
    for reader in readers.into_iter().flatten() {
        let _ = reader.join();
    }

    let status = child
        .wait()
        .map_err(|err| ActionError::Io(err.to_string()))?;
    Ok(ExecutionResult {
        exit_code: status.code(),
        succeeded: status.success(),
    })
}

fn spawn_line_reader<R: Read + Send + 'static>(
    name: &str,
    source: R,
    tx: crossbeam_channel::Sender<String>,
) -> Option<thread::JoinHandle<()>> {
    let spawned = thread::Builder::new().name(name.to_string()).spawn(move || {
        let mut reader = BufReader::new(source);
        let mut buf = Vec::new();
        loop {
            buf.clear();
            match reader.read_until(b'\n', &mut buf) {
                Ok(0) | Err(_) => break,
                Ok(_) => {
                    let line = String::from_utf8_lossy(&buf);
                    let line = line.trim_end_matches(['\r', '\n']);
                    if !line.trim().is_empty() && tx.send(line.to_string()).is_err() {
                        break;
                    }
                }
            }
        }
    });
    match spawned {
        Ok(handle) => Some(handle),
        Err(err) => {
            tracing::warn!(error = %err, reader = name, "failed to spawn output reader");
            None
        }
    }
}

/// Executor backed by the configured command table.
#[derive(Debug, Clone, Default)]
pub struct ShellExecutor {
    commands: HashMap<ActionKind, CommandLine>,
}

impl ShellExecutor {
    pub fn new(commands: HashMap<ActionKind, CommandLine>) -> Self {
        Self { commands }
    }

    pub fn command_for(&self, action: ActionKind) -> Option<&CommandLine> {
        self.commands.get(&action)
    }
}

impl ActionExecutor for ShellExecutor {
    fn run(
        &self,
        action: ActionKind,
        progress: &mut dyn FnMut(&str),
    ) -> Result<ExecutionResult, ActionError> {
        let command = self
            .commands
            .get(&action)
            .ok_or(ActionError::NotConfigured(action))?;
        tracing::info!(action = %action, command = %command, "running action");
        let result = stream_command(command, progress)?;
        tracing::info!(
            action = %action,
            exit_code = ?result.exit_code,
            succeeded = result.succeeded,
            "action finished"
        );
        Ok(result)
    }
}
