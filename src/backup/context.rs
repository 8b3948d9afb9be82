//! Configuration context handed to target construction.
//!
//! Holds the global (unsectioned) config values, command line overrides and the
//! date used for archive names, so building a target never reads process state.

use crate::backup::env_path::resolve_path_with_environment;
use crate::backup::ini::IniSection;
use crate::backup::result_error::result::Result;
use crate::backup::validate::{optional_scalar, parse_int, parse_path};
use bon::Builder;
use chrono::NaiveDate;
use getset::Getters;
use std::path::{Path, PathBuf};

pub static FALLBACK_DEST: &str = "$HOME/Backups";

fn default_fallback_dest() -> PathBuf {
    resolve_path_with_environment(FALLBACK_DEST)
}

#[derive(Clone, Debug, Builder, Getters)]
#[getset(get = "pub")]
pub struct ConfigContext {
    /// Date stamped into archive file names
    today: NaiveDate,
    /// `--destdir`, wins over every config value
    #[builder(into)]
    destdir_override: Option<PathBuf>,
    /// Global `default_dest`
    #[builder(into)]
    default_dest: Option<PathBuf>,
    #[builder(default = default_fallback_dest(), into)]
    fallback_dest: PathBuf,
    /// Global `jobs`
    jobs: Option<i64>,
}

impl ConfigContext {
    pub fn from_global(
        global: &IniSection,
        destdir_override: Option<PathBuf>,
        today: NaiveDate,
    ) -> Result<Self> {
        Ok(ConfigContext::builder()
            .today(today)
            .maybe_destdir_override(destdir_override)
            .maybe_default_dest(optional_scalar(global, "default_dest", parse_path)?)
            .maybe_jobs(optional_scalar(global, "jobs", parse_int)?)
            .build())
    }

    /// Command line override, then the target's own `dest`, then the global
    /// `default_dest`, then the fallback.
    pub fn resolve_destdir(&self, target_dest: Option<&Path>) -> PathBuf {
        self.destdir_override
            .as_deref()
            .or(target_dest)
            .or(self.default_dest.as_deref())
            .unwrap_or(&self.fallback_dest)
            .to_path_buf()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backup::ini::IniData;
    use crate::backup::result_error::error::Error;

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 1, 29).unwrap()
    }

    #[test]
    fn test_destdir_precedence() {
        let ctx = ConfigContext::builder()
            .today(today())
            .default_dest("/global")
            .fallback_dest("/fallback")
            .build();
        assert_eq!(
            ctx.resolve_destdir(Some(Path::new("/target"))),
            PathBuf::from("/target")
        );
        assert_eq!(ctx.resolve_destdir(None), PathBuf::from("/global"));

        let ctx = ConfigContext::builder()
            .today(today())
            .destdir_override("/cli")
            .default_dest("/global")
            .build();
        assert_eq!(
            ctx.resolve_destdir(Some(Path::new("/target"))),
            PathBuf::from("/cli")
        );

        let ctx = ConfigContext::builder()
            .today(today())
            .fallback_dest("/fallback")
            .build();
        assert_eq!(ctx.resolve_destdir(None), PathBuf::from("/fallback"));
    }

    #[test]
    fn test_from_global() {
        let source = "default_dest = /srv/backups\njobs = 3\n[target]\nname = x\n";
        let data = IniData::parse(source);
        let ctx = ConfigContext::from_global(data.global(), None, today())
            .unwrap();
        assert_eq!(ctx.default_dest(), &Some(PathBuf::from("/srv/backups")));
        assert_eq!(ctx.jobs(), &Some(3));
    }

    #[test]
    fn test_from_global_duplicate_default_dest() {
        let data = IniData::parse("default_dest = /a\ndefault_dest = /b\n");
        let res = ConfigContext::from_global(data.global(), None, today());
        assert!(matches!(
            res,
            Err(Error::DuplicateField { field: "default_dest", count: 2 })
        ));
    }
}
