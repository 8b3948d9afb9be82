//! Runs a list of hook commands with at most `jobs` of them alive at once.

use crate::backup::process::command::SystemCommand;
use bon::Builder;
use std::num::NonZeroUsize;
use std::time::Duration;

pub static DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Turns a configured job count into a usable one. Anything below 1 becomes 1.
pub fn clamp_jobs(jobs: i64) -> NonZeroUsize {
    usize::try_from(jobs)
        .ok()
        .and_then(NonZeroUsize::new)
        .unwrap_or_else(|| {
            tracing::warn!("Invalid jobs value {jobs}, using 1");
            NonZeroUsize::MIN
        })
}

#[derive(Clone, Debug, Builder)]
pub struct HookScheduler {
    #[builder(default = NonZeroUsize::MIN)]
    jobs: NonZeroUsize,
    #[builder(default = DEFAULT_POLL_INTERVAL)]
    poll_interval: Duration,
}

impl HookScheduler {
    /// Starts every hook in order and waits for all of them.
    ///
    /// A failing hook does not stop the others. Returns true if any hook failed.
    pub fn run(&self, hooks: &mut [SystemCommand]) -> bool {
        let jobs = self.jobs.get();
        let mut next = 0;
        // Indices of started hooks that have not been seen exiting.
        let mut running: Vec<usize> = Vec::with_capacity(jobs.min(hooks.len()));

        while next < hooks.len() || !running.is_empty() {
            let before = running.len();
            running.retain(|&i| !hooks[i].has_exited());
            let freed = running.len() < before;

            while running.len() < jobs && next < hooks.len() {
                tracing::info!("Running hook: {}", hooks[next].command());
                hooks[next].run();
                running.push(next);
                next += 1;
            }

            if !freed && !running.is_empty() {
                std::thread::sleep(self.poll_interval);
            }
        }

        hooks.iter_mut().fold(false, |failed, hook| {
            let status = hook.wait();
            if status.is_failure() {
                tracing::warn!("Hook {:?} {}", hook.command(), status);
            }
            failed || status.is_failure()
        })
    }

    /// Convenience wrapper taking plain command strings.
    pub fn run_commands<I, S>(&self, commands: I) -> bool
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut hooks: Vec<SystemCommand> =
            commands.into_iter().map(SystemCommand::new).collect();
        self.run(&mut hooks)
    }
}
