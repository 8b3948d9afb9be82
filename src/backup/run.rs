//! Runs one target: before-hooks, the archive pipeline, then end-hooks.

use crate::backup::hooks::HookScheduler;
use crate::backup::pipeline::{is_effective_root, PipelineBuilder, PipelineRun};
use crate::backup::result_error::error::Error;
use crate::backup::result_error::result::Result;
use crate::backup::result_error::AddMsg;
use crate::backup::target::Target;
use bon::Builder;
use getset::CopyGetters;

/// Which phases of a target run failed.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, CopyGetters)]
#[getset(get_copy = "pub")]
pub struct RunReport {
    before_hooks_failed: bool,
    pipeline_failed: bool,
    end_hooks_failed: bool,
}

impl RunReport {
    pub fn is_success(&self) -> bool {
        !(self.before_hooks_failed || self.pipeline_failed || self.end_hooks_failed)
    }

    /// `Ok` for a clean run, [`Error::TargetFailed`] otherwise.
    pub fn into_result(self, name: &str) -> Result<()> {
        if self.is_success() {
            return Ok(());
        }
        Err(Error::TargetFailed {
            name: name.to_owned(),
            before_hooks_failed: self.before_hooks_failed,
            pipeline_failed: self.pipeline_failed,
            end_hooks_failed: self.end_hooks_failed,
        })
    }
}

#[derive(Clone, Debug, Builder)]
pub struct TargetRunner {
    #[builder(default = HookScheduler::builder().build())]
    scheduler: HookScheduler,
    #[builder(default = is_effective_root())]
    running_as_root: bool,
}

impl TargetRunner {
    /// Runs `target` to completion.
    ///
    /// Errors are returned only when the target cannot be attempted at all: an
    /// encrypted target without a passphrase or a destination directory that
    /// cannot be created. Hook and pipeline failures end up in the report.
    pub fn run(&self, target: &Target) -> Result<RunReport> {
        let name = target.name();
        if target.is_encrypted() && target.passphrase().is_none() {
            return Err(Error::MissingPassphrase(name.clone()));
        }

        tracing::info!("Running before hooks for target {name:?}");
        let before_hooks_failed = self.scheduler.run_commands(target.before_hooks());

        let plan = PipelineBuilder::new(target)
            .running_as_root(self.running_as_root)
            .build()
            .add_msg(format!("Cannot back up target {name:?}"))?;

        let pipeline_failed = match PipelineRun::launch(&plan, target.passphrase().as_ref()) {
            Ok(mut run) => run.wait_failed(),
            Err(e) => {
                tracing::error!("Pipeline for target {name:?} not started: {e}");
                true
            }
        };

        tracing::info!("Running end hooks for target {name:?}");
        let end_hooks_failed = self.scheduler.run_commands(target.end_hooks());

        let report = RunReport {
            before_hooks_failed,
            pipeline_failed,
            end_hooks_failed,
        };
        if report.is_success() {
            tracing::info!("Target {name:?} written to {:?}", target.destfile());
        } else {
            tracing::warn!("Target {name:?} finished with failures: {report:?}");
        }
        Ok(report)
    }
}
