//! Top level flow: load the config, pick the requested targets, ask for their
//! passphrases and run them one after another.

use crate::backup::context::ConfigContext;
use crate::backup::env_path::resolve_path_with_environment;
use crate::backup::hooks::{clamp_jobs, HookScheduler};
use crate::backup::ini::IniData;
use crate::backup::prompt::PassphraseSource;
use crate::backup::result_error::error::Error;
use crate::backup::result_error::result::{convert_error_vec, Result};
use crate::backup::result_error::AddMsg;
use crate::backup::run::TargetRunner;
use crate::backup::target::Target;
use bon::Builder;
use chrono::{Local, NaiveDate};
use getset::Getters;
use itertools::Itertools;
use std::collections::HashSet;
use std::path::PathBuf;

pub static TARGET_SECTION: &str = "target";
pub static ALL_TARGETS: &str = "all";
static DEFAULT_JOBS: i64 = 1;

/// `$XDG_CONFIG_HOME/backman/backman.ini`, or under `$HOME/.config` when unset.
pub fn default_config_path() -> PathBuf {
    let config_home = match std::env::var_os("XDG_CONFIG_HOME") {
        Some(dir) if !dir.is_empty() => PathBuf::from(dir),
        _ => resolve_path_with_environment("$HOME/.config"),
    };
    config_home.join("backman").join("backman.ini")
}

#[derive(Clone, Debug, Builder, Getters)]
#[getset(get = "pub")]
pub struct DriverOptions {
    #[builder(default = default_config_path(), into)]
    config: PathBuf,
    /// Hook concurrency, wins over the global `jobs` key
    jobs: Option<i64>,
    /// Destination for every target
    #[builder(into)]
    destdir: Option<PathBuf>,
    #[builder(default)]
    keep_going: bool,
    #[builder(default, into)]
    targets: Vec<String>,
    #[builder(default = Local::now().date_naive())]
    today: NaiveDate,
    /// Detected from the effective uid when unset
    running_as_root: Option<bool>,
}

/// Builds a [`Target`] from every `[target]` section. Other named sections are
/// ignored with a warning.
pub fn load_targets(data: &IniData, ctx: &ConfigContext) -> Result<Vec<Target>> {
    let (targets, errors): (Vec<Target>, Vec<Error>) = data
        .sections()
        .filter(|section| {
            let is_target = section.name() == TARGET_SECTION;
            if !is_target {
                tracing::warn!(
                    "Invalid section {:?} at line {}, ignoring",
                    section.name(),
                    section.line()
                );
            }
            is_target
        })
        .map(|section| Target::from_section(section, ctx))
        .partition_result();
    convert_error_vec(errors)?;

    let mut seen = HashSet::new();
    let duplicates = targets
        .iter()
        .map(|t| t.name().as_str())
        .filter(|name| !seen.insert(*name))
        .unique()
        .map(|name| Error::DuplicateTargetName(name.to_owned()))
        .collect_vec();
    convert_error_vec(duplicates)?;

    Ok(targets)
}

/// Keeps the requested targets, in config file order.
pub fn select_targets(targets: Vec<Target>, requested: &[String]) -> Result<Vec<Target>> {
    if requested.is_empty() {
        return Err(Error::NoTargetRequested);
    }
    if requested.iter().any(|name| name == ALL_TARGETS) {
        return if requested.len() == 1 {
            Ok(targets)
        } else {
            Err(Error::AllWithOtherTargets)
        };
    }

    let mut wanted = HashSet::new();
    if let Some(duplicate) = requested.iter().find(|name| !wanted.insert(name.as_str())) {
        return Err(Error::DuplicateRequestedTarget(duplicate.clone()));
    }

    let unknown = requested
        .iter()
        .filter(|name| !targets.iter().any(|t| t.name() == *name))
        .map(|name| Error::UnknownTarget(name.clone()))
        .collect_vec();
    convert_error_vec(unknown)?;

    Ok(targets
        .into_iter()
        .filter(|t| wanted.contains(t.name().as_str()))
        .collect())
}

/// Attaches passphrases to the targets that encrypt.
pub fn attach_passphrases(
    targets: Vec<Target>,
    source: &dyn PassphraseSource,
) -> Result<Vec<Target>> {
    targets
        .into_iter()
        .map(|target| {
            if !target.is_encrypted() {
                return Ok(target);
            }
            Ok(match source.passphrase_for(target.name())? {
                Some(passphrase) => target.with_passphrase(passphrase),
                None => target,
            })
        })
        .collect()
}

pub fn run(options: &DriverOptions, passphrases: &dyn PassphraseSource) -> Result<()> {
    let data = IniData::from_file(&options.config)?;
    let ctx = ConfigContext::from_global(data.global(), options.destdir.clone(), options.today)
        .add_msg(format!("Invalid global section in {:?}", options.config))?;
    let targets = load_targets(&data, &ctx)
        .add_msg(format!("Invalid config {:?}", options.config))?;
    let selected = select_targets(targets, &options.targets)?;
    let selected = attach_passphrases(selected, passphrases)?;

    let jobs = clamp_jobs(options.jobs.or(*ctx.jobs()).unwrap_or(DEFAULT_JOBS));
    let runner = TargetRunner::builder()
        .scheduler(HookScheduler::builder().jobs(jobs).build())
        .maybe_running_as_root(options.running_as_root)
        .build();

    let mut errors = Vec::new();
    for target in &selected {
        tracing::info!("Backing up target {:?}", target.name());
        let res = runner
            .run(target)
            .and_then(|report| report.into_result(target.name()));
        if let Err(e) = res {
            tracing::error!("Target {:?} failed", target.name());
            errors.push(e);
            if !options.keep_going {
                break;
            }
        }
    }
    convert_error_vec(errors)
}
