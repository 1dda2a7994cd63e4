//! External tool invocation with testable command execution.
//!
//! Every stage that shells out (ffmpeg, demucs) goes through the
//! `CommandExecutor` trait, so the whole pipeline can run in tests without
//! the real tools installed.

use crate::error::{PipelineError, Result};
use std::process::Command;
use std::sync::Mutex;

/// Trait for executing system commands.
///
/// Object-safe, Send + Sync for use from concurrent jobs.
pub trait CommandExecutor: Send + Sync {
    /// Execute a command with arguments.
    ///
    /// Returns the stdout of the command on success.
    /// Returns an error if the command is not found or exits non-zero.
    fn execute(&self, command: &str, args: &[&str]) -> Result<String>;
}

/// Production command executor using std::process::Command.
#[derive(Debug, Clone, Default)]
pub struct SystemCommandExecutor;

impl SystemCommandExecutor {
    pub fn new() -> Self {
        Self
    }
}

impl CommandExecutor for SystemCommandExecutor {
    fn execute(&self, command: &str, args: &[&str]) -> Result<String> {
        tracing::debug!(command, args = ?args, "Running external tool");

        let output = Command::new(command).args(args).output().map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                PipelineError::ToolNotFound {
                    tool: command.to_string(),
                }
            } else {
                PipelineError::ToolFailed {
                    tool: command.to_string(),
                    status: "spawn error".to_string(),
                    stderr: e.to_string(),
                }
            }
        })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(PipelineError::ToolFailed {
                tool: command.to_string(),
                status: output.status.to_string(),
                stderr: stderr.trim().to_string(),
            });
        }

        Ok(String::from_utf8_lossy(&output.stdout).to_string())
    }
}

type Handler = dyn Fn(&str, &[&str]) -> Result<String> + Send + Sync;

/// Mock command executor for testing.
///
/// Records every invocation and delegates to a handler closure, which can
/// create the files a real tool would have written or simulate a failure.
pub struct MockCommandExecutor {
    calls: Mutex<Vec<(String, Vec<String>)>>,
    handler: Box<Handler>,
}

impl MockCommandExecutor {
    /// Executor where every command succeeds with empty stdout.
    pub fn succeeding() -> Self {
        Self::with_handler(|_, _| Ok(String::new()))
    }

    /// Executor where every command exits non-zero.
    pub fn failing() -> Self {
        Self::with_handler(|command, _| {
            Err(PipelineError::ToolFailed {
                tool: command.to_string(),
                status: "exit status: 1".to_string(),
                stderr: "mock failure".to_string(),
            })
        })
    }

    /// Executor driven by a custom handler.
    pub fn with_handler<F>(handler: F) -> Self
    where
        F: Fn(&str, &[&str]) -> Result<String> + Send + Sync + 'static,
    {
        Self {
            calls: Mutex::new(Vec::new()),
            handler: Box::new(handler),
        }
    }

    /// All recorded calls as (command, args).
    pub fn calls(&self) -> Vec<(String, Vec<String>)> {
        match self.calls.lock() {
            Ok(calls) => calls.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    /// Names of the commands invoked, in order.
    pub fn commands(&self) -> Vec<String> {
        self.calls().into_iter().map(|(command, _)| command).collect()
    }
}

impl std::fmt::Debug for MockCommandExecutor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MockCommandExecutor")
            .field("calls", &self.calls())
            .finish()
    }
}

impl CommandExecutor for MockCommandExecutor {
    fn execute(&self, command: &str, args: &[&str]) -> Result<String> {
        match self.calls.lock() {
            Ok(mut calls) => calls.push((
                command.to_string(),
                args.iter().map(|s| s.to_string()).collect(),
            )),
            Err(poisoned) => poisoned.into_inner().push((
                command.to_string(),
                args.iter().map(|s| s.to_string()).collect(),
            )),
        }
        (self.handler)(command, args)
    }
}
