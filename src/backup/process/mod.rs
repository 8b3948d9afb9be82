//! Spawning and reaping child processes.
//!
//! A [`ChildProcess`] is reaped exactly once: the first observed exit status is
//! cached and every later `poll`/`wait` answers from the cache. A handle dropped
//! before it was reaped waits for the child so no zombie is left behind.

pub mod command;

use derive_more::Display;
use std::io;
use std::os::unix::process::ExitStatusExt;
use std::process::{Child, Command, ExitStatus};

/// Code reported for statuses that are not a real process exit code.
pub static INTERNAL_ERROR_CODE: i32 = -1;

#[derive(Clone, Copy, Debug, Display, PartialEq, Eq)]
pub enum NormalizedExitStatus {
    #[display("success")]
    Success,
    #[display("exited with code {_0}")]
    Failed(i32),
    #[display("terminated by signal {_0}")]
    Signaled(i32),
    #[display("internal error")]
    InternalError,
}

impl NormalizedExitStatus {
    /// `0`, the exit code, the terminating signal number, or `-1`.
    pub fn code(&self) -> i32 {
        match self {
            Self::Success => 0,
            Self::Failed(code) => *code,
            Self::Signaled(signal) => *signal,
            Self::InternalError => INTERNAL_ERROR_CODE,
        }
    }

    pub fn is_failure(&self) -> bool {
        !matches!(self, Self::Success)
    }
}

impl From<ExitStatus> for NormalizedExitStatus {
    fn from(status: ExitStatus) -> Self {
        match (status.code(), status.signal()) {
            (Some(0), _) => Self::Success,
            (Some(code), _) => Self::Failed(code),
            (None, Some(signal)) => Self::Signaled(signal),
            (None, None) => Self::InternalError,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ProcessState {
    Running,
    Exited,
}

#[derive(Debug)]
pub struct ChildProcess {
    child: Child,
    status: Option<NormalizedExitStatus>,
}

/// Starts `command`. A failure here means no process exists.
pub fn spawn(command: &mut Command) -> io::Result<ChildProcess> {
    let child = command.spawn()?;
    tracing::debug!("Spawned pid {}: {:?}", child.id(), command);
    Ok(ChildProcess {
        child,
        status: None,
    })
}

impl ChildProcess {
    pub fn id(&self) -> u32 {
        self.child.id()
    }

    /// Non-blocking exit check.
    pub fn poll(&mut self) -> ProcessState {
        if self.status.is_some() {
            return ProcessState::Exited;
        }
        match self.child.try_wait() {
            Ok(None) => ProcessState::Running,
            Ok(Some(status)) => {
                self.status = Some(status.into());
                ProcessState::Exited
            }
            Err(e) => {
                tracing::warn!("Checking pid {} failed: {e}", self.child.id());
                self.status = Some(NormalizedExitStatus::InternalError);
                ProcessState::Exited
            }
        }
    }

    /// Blocks until the child exits. Repeated calls return the cached status.
    pub fn wait(&mut self) -> NormalizedExitStatus {
        if let Some(status) = self.status {
            return status;
        }
        let status = match self.child.wait() {
            Ok(status) => status.into(),
            Err(e) => {
                tracing::warn!("Waiting on pid {} failed: {e}", self.child.id());
                NormalizedExitStatus::InternalError
            }
        };
        self.status = Some(status);
        status
    }

    /// Sends SIGTERM if the child has not been reaped yet.
    pub fn terminate(&mut self) -> io::Result<()> {
        if self.poll() == ProcessState::Exited {
            return Ok(());
        }
        let pid = libc::pid_t::try_from(self.child.id())
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidInput, e))?;
        // SAFETY: the pid belongs to our unreaped child, so it cannot have been recycled.
        if unsafe { libc::kill(pid, libc::SIGTERM) } == -1 {
            return Err(io::Error::last_os_error());
        }
        Ok(())
    }
}

impl Drop for ChildProcess {
    fn drop(&mut self) {
        if self.status.is_none() {
            tracing::debug!("Reaping pid {} on drop", self.child.id());
            let _ = self.child.wait();
        }
    }
}
