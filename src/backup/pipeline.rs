//! Archiver and encryptor command construction and the pipeline that runs them.
//!
//! [`PipelineBuilder`] turns a [`Target`] into a [`PipelinePlan`] without starting
//! anything. [`PipelineRun::launch`] spawns the stages, wires the archiver's stdout
//! into the encryptor's stdin and hands the passphrase over a separate pipe.

use crate::backup::function_path;
use crate::backup::passphrase::PassphraseChannel;
use crate::backup::process::{spawn, ChildProcess, NormalizedExitStatus};
use crate::backup::redacted::RedactedString;
use crate::backup::result_error::error::Error;
use crate::backup::result_error::result::Result;
use crate::backup::result_error::AddFunctionName;
use crate::backup::target::Target;
use function_name::named;
use itertools::Itertools;
use std::ffi::{OsStr, OsString};
use std::fmt::{Display, Formatter};
use std::io;
use std::os::fd::RawFd;
use std::path::{Path, PathBuf};
use std::process::Command;

pub static ARCHIVER_PROGRAM: &str = "tar";
pub static ENCRYPTOR_PROGRAM: &str = "gpg";
pub static CIPHER_ALGO: &str = "AES256";
static ELAVATE_SEPARATOR: &str = "--";
static STDOUT_ARCHIVE: &str = "-";

/// One argument of a command line.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Arg {
    Literal(OsString),
    /// Replaced by the passphrase pipe's descriptor number at spawn time
    PassphraseFd,
}

impl<S: AsRef<OsStr>> From<&S> for Arg {
    fn from(value: &S) -> Self {
        Arg::Literal(value.as_ref().to_os_string())
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CommandLine {
    program: OsString,
    args: Vec<Arg>,
}

impl CommandLine {
    pub fn new<S: AsRef<OsStr>>(program: S) -> Self {
        Self {
            program: program.as_ref().to_os_string(),
            args: Vec::new(),
        }
    }

    pub fn arg<S: AsRef<OsStr>>(mut self, arg: S) -> Self {
        self.args.push(Arg::from(&arg));
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        self.args.extend(args.into_iter().map(|a| Arg::from(&a)));
        self
    }

    pub fn passphrase_fd_arg(mut self) -> Self {
        self.args.push(Arg::PassphraseFd);
        self
    }

    /// Full argument vector, program first.
    pub fn argv(&self, passphrase_fd: Option<RawFd>) -> Vec<OsString> {
        std::iter::once(self.program.clone())
            .chain(self.args.iter().map(|arg| match arg {
                Arg::Literal(s) => s.clone(),
                Arg::PassphraseFd => passphrase_fd
                    .map(|fd| fd.to_string())
                    .unwrap_or_default()
                    .into(),
            }))
            .collect()
    }

    pub fn to_command(&self, passphrase_fd: Option<RawFd>) -> Command {
        let argv = self.argv(passphrase_fd);
        let mut command = Command::new(&argv[0]);
        command.args(&argv[1..]);
        command
    }
}

impl Display for CommandLine {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let args = self.args.iter().map(|arg| match arg {
            Arg::Literal(s) => s.to_string_lossy(),
            Arg::PassphraseFd => "<fd>".into(),
        });
        let rendered = std::iter::once(self.program.to_string_lossy())
            .chain(args)
            .join(" ");
        f.write_str(&rendered)
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PipelinePlan {
    name: String,
    archiver: CommandLine,
    encryptor: Option<CommandLine>,
    /// Output written by the last stage, removed when the run is aborted
    destfile: Option<PathBuf>,
}

impl PipelinePlan {
    pub fn new<S: Into<String>>(
        name: S,
        archiver: CommandLine,
        encryptor: Option<CommandLine>,
    ) -> Self {
        Self {
            name: name.into(),
            archiver,
            encryptor,
            destfile: None,
        }
    }

    pub fn with_destfile<P: Into<PathBuf>>(mut self, destfile: P) -> Self {
        self.destfile = Some(destfile.into());
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn archiver(&self) -> &CommandLine {
        &self.archiver
    }

    pub fn encryptor(&self) -> Option<&CommandLine> {
        self.encryptor.as_ref()
    }

    pub fn destfile(&self) -> Option<&Path> {
        self.destfile.as_deref()
    }
}

pub fn is_effective_root() -> bool {
    // SAFETY: geteuid cannot fail and touches no memory.
    unsafe { libc::geteuid() == 0 }
}

pub struct PipelineBuilder<'a> {
    target: &'a Target,
    running_as_root: bool,
}

impl<'a> PipelineBuilder<'a> {
    pub fn new(target: &'a Target) -> Self {
        Self {
            target,
            running_as_root: is_effective_root(),
        }
    }

    /// Elevation is skipped when already running as root.
    pub fn running_as_root(mut self, running_as_root: bool) -> Self {
        self.running_as_root = running_as_root;
        self
    }

    pub fn archiver_command(&self) -> CommandLine {
        let t = self.target;
        let cmd = if *t.elavated() && !self.running_as_root {
            CommandLine::new(t.elavate_program())
                .arg(ELAVATE_SEPARATOR)
                .arg(ARCHIVER_PROGRAM)
        } else {
            CommandLine::new(ARCHIVER_PROGRAM)
        };

        let cmd = if *t.one_file_system() {
            cmd.arg("--one-file-system")
        } else {
            cmd
        };

        let cmd = cmd
            .args(["-cp", "--xattrs", "--acls"])
            .arg("-I")
            .arg(t.compress_program())
            .args(t.excludes().iter().map(|e| format!("--exclude={e}")))
            .args(t.tar_flags())
            .arg(t.path())
            .arg("-f");

        if t.is_encrypted() {
            cmd.arg(STDOUT_ARCHIVE)
        } else {
            cmd.arg(t.destfile())
        }
    }

    pub fn encryptor_command(&self) -> Option<CommandLine> {
        let t = self.target;
        t.is_encrypted().then(|| {
            CommandLine::new(ENCRYPTOR_PROGRAM)
                .args(["--batch", "--yes", "--pinentry-mode", "loopback"])
                .arg("--passphrase-fd")
                .passphrase_fd_arg()
                .args(["--symmetric", "--cipher-algo", CIPHER_ALGO])
                .arg("-o")
                .arg(t.destfile())
        })
    }

    /// Builds the stage commands and makes sure the destination directory exists.
    #[named]
    pub fn build(&self) -> Result<PipelinePlan> {
        let destdir = self.target.destdir();
        std::fs::create_dir_all(destdir)
            .map_err(|source| Error::CreateDestDir {
                path: destdir.to_path_buf(),
                source,
            })
            .add_fn_name(function_path!())?;

        let plan = PipelinePlan::new(
            self.target.name().as_str(),
            self.archiver_command(),
            self.encryptor_command(),
        )
        .with_destfile(self.target.destfile());
        tracing::debug!("Archiver: {}", plan.archiver);
        if let Some(encryptor) = &plan.encryptor {
            tracing::debug!("Encryptor: {}", encryptor);
        }
        Ok(plan)
    }
}

#[derive(Debug)]
enum Stage {
    Spawned(ChildProcess),
    SpawnFailed,
    /// Never started because an earlier stage could not be spawned
    Skipped,
}

impl Stage {
    fn from_spawn(label: &str, res: io::Result<ChildProcess>) -> Self {
        match res {
            Ok(child) => Stage::Spawned(child),
            Err(e) => {
                tracing::error!("Failed to spawn {label}: {e}");
                Stage::SpawnFailed
            }
        }
    }

    fn wait(&mut self) -> NormalizedExitStatus {
        match self {
            Stage::Spawned(child) => child.wait(),
            Stage::SpawnFailed | Stage::Skipped => NormalizedExitStatus::InternalError,
        }
    }
}

fn remove_partial_output(path: &Path) {
    match std::fs::remove_file(path) {
        Ok(()) => tracing::warn!("Removed partial archive {path:?}"),
        Err(e) if e.kind() == io::ErrorKind::NotFound => {}
        Err(e) => tracing::warn!("Removing partial archive {path:?} failed: {e}"),
    }
}

/// The one or two processes of a running pipeline.
#[derive(Debug)]
pub struct PipelineRun {
    archiver: Stage,
    encryptor: Option<Stage>,
    /// Partial output to delete once every stage was reaped
    discard: Option<PathBuf>,
}

impl PipelineRun {
    /// Starts every stage of `plan`.
    ///
    /// Fails without spawning anything when the plan has an encryptor but no
    /// passphrase was given. Spawn failures are recorded per stage instead.
    pub fn launch(plan: &PipelinePlan, passphrase: Option<&RedactedString>) -> Result<Self> {
        match plan.encryptor() {
            None => {
                tracing::info!("Starting archiver for target {:?}", plan.name());
                let archiver = spawn(&mut plan.archiver().to_command(None));
                Ok(Self {
                    archiver: Stage::from_spawn("archiver", archiver),
                    encryptor: None,
                    discard: None,
                })
            }
            Some(encryptor) => {
                let passphrase =
                    passphrase.ok_or_else(|| Error::MissingPassphrase(plan.name().to_owned()))?;
                tracing::info!("Starting encrypted pipeline for target {:?}", plan.name());
                Ok(Self::launch_encrypted(
                    plan.archiver(),
                    encryptor,
                    passphrase,
                    plan.destfile(),
                ))
            }
        }
    }

    fn launch_encrypted(
        archiver: &CommandLine,
        encryptor: &CommandLine,
        passphrase: &RedactedString,
        destfile: Option<&Path>,
    ) -> Self {
        let failed = |e: io::Error| {
            tracing::error!("Failed to create pipe: {e}");
            Self {
                archiver: Stage::Skipped,
                encryptor: Some(Stage::SpawnFailed),
                discard: None,
            }
        };
        let (data_reader, data_writer) = match io::pipe() {
            Ok(pipe) => pipe,
            Err(e) => return failed(e),
        };
        let channel = match PassphraseChannel::open() {
            Ok(channel) => channel,
            Err(e) => return failed(e),
        };

        // The command owns our copy of the read end; dropping it closes that copy.
        let encryptor = {
            let mut command = encryptor.to_command(Some(channel.child_fd()));
            command.stdin(data_reader);
            channel.attach(&mut command);
            spawn(&mut command)
        };
        let mut encryptor = match encryptor {
            Ok(child) => {
                if let Err(e) = channel.deliver(passphrase) {
                    tracing::warn!("Delivering passphrase to pid {} failed: {e}", child.id());
                }
                Stage::Spawned(child)
            }
            Err(e) => {
                tracing::error!("Failed to spawn encryptor: {e}");
                return Self {
                    archiver: Stage::Skipped,
                    encryptor: Some(Stage::SpawnFailed),
                    discard: None,
                };
            }
        };

        let archiver = {
            let mut command = archiver.to_command(None);
            command.stdout(data_writer);
            spawn(&mut command)
        };
        let archiver = Stage::from_spawn("archiver", archiver);
        let mut discard = None;
        // The encryptor already saw end of input and may have started writing destfile.
        if let (Stage::SpawnFailed, Stage::Spawned(child)) = (&archiver, &mut encryptor) {
            tracing::warn!("Terminating encryptor pid {} without input", child.id());
            if let Err(e) = child.terminate() {
                tracing::warn!("Terminating pid {} failed: {e}", child.id());
            }
            discard = destfile.map(Path::to_path_buf);
        }

        Self {
            archiver,
            encryptor: Some(encryptor),
            discard,
        }
    }

    /// Waits for every stage and returns their statuses, archiver first.
    pub fn wait(&mut self) -> Vec<NormalizedExitStatus> {
        let statuses = std::iter::once(&mut self.archiver)
            .chain(self.encryptor.as_mut())
            .map(Stage::wait)
            .collect();
        if let Some(path) = self.discard.take() {
            remove_partial_output(&path);
        }
        statuses
    }

    /// Waits for every stage; true if any of them failed.
    pub fn wait_failed(&mut self) -> bool {
        let statuses = self.wait();
        statuses.iter().for_each(|s| {
            if s.is_failure() {
                tracing::warn!("Pipeline stage {s}");
            }
        });
        statuses.iter().any(NormalizedExitStatus::is_failure)
    }
}
