use crate::backup::process::{spawn, ChildProcess, NormalizedExitStatus, ProcessState};
use std::process::Command;

pub static SHELL: &str = "sh";

#[derive(Debug)]
enum CommandState {
    NotRun,
    Running(ChildProcess),
    /// The process could not be created at all
    SpawnFailed,
    Exited(NormalizedExitStatus),
}

/// A shell command run through `sh -c` and its process lifecycle.
#[derive(Debug)]
pub struct SystemCommand {
    command: String,
    state: CommandState,
}

impl SystemCommand {
    pub fn new<S: Into<String>>(command: S) -> Self {
        Self {
            command: command.into(),
            state: CommandState::NotRun,
        }
    }

    pub fn command(&self) -> &str {
        &self.command
    }

    pub fn has_run(&self) -> bool {
        !matches!(self.state, CommandState::NotRun)
    }

    /// Starts the command. Does nothing if it was already started.
    pub fn run(&mut self) {
        if self.has_run() {
            tracing::warn!("Command {:?} already started", self.command);
            return;
        }
        self.state = match spawn(Command::new(SHELL).arg("-c").arg(&self.command)) {
            Ok(child) => CommandState::Running(child),
            Err(e) => {
                tracing::error!("Failed to spawn, can't run hook {:?}: {e}", self.command);
                CommandState::SpawnFailed
            }
        };
    }

    /// Non-blocking. A command that failed to spawn counts as exited.
    pub fn has_exited(&mut self) -> bool {
        match &mut self.state {
            CommandState::NotRun => false,
            CommandState::Running(child) => {
                if child.poll() == ProcessState::Running {
                    return false;
                }
                self.state = CommandState::Exited(child.wait());
                true
            }
            CommandState::SpawnFailed | CommandState::Exited(_) => true,
        }
    }

    /// Blocks until the command finishes; cached afterwards.
    pub fn wait(&mut self) -> NormalizedExitStatus {
        match &mut self.state {
            CommandState::NotRun => {
                tracing::warn!(
                    "Waiting on command {:?} that was never started",
                    self.command
                );
                NormalizedExitStatus::InternalError
            }
            CommandState::Running(child) => {
                let status = child.wait();
                self.state = CommandState::Exited(status);
                status
            }
            CommandState::SpawnFailed => NormalizedExitStatus::InternalError,
            CommandState::Exited(status) => *status,
        }
    }
}
