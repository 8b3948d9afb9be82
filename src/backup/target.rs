//! One configured backup job.
//!
//! A [`Target`] is assembled once from a `[target]` section and a [`ConfigContext`],
//! validated, and then only read. The archive file name is fixed at construction.

use crate::backup::context::ConfigContext;
use crate::backup::file_ext::{compressor_file_ext, ENCRYPTED_FILE_EXT, TAR_FILE_EXT};
use crate::backup::ini::IniSection;
use crate::backup::redacted::RedactedString;
use crate::backup::result_error::result::Result;
use crate::backup::result_error::AddMsg;
use crate::backup::validate::{
    multi_value, optional_scalar, parse_bool, parse_path, parse_string, required_scalar,
    scalar_or, validate_valid_archive_base_name,
};
use chrono::NaiveDate;
use getset::Getters;
use itertools::Itertools;
use serde::Serialize;
use serde_with::skip_serializing_none;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::Level;
use validator::Validate;

pub static DEFAULT_COMPRESS_PROGRAM: &str = "xz -9e --threads=0";
pub static DEFAULT_ELAVATE_PROGRAM: &str = "sudo";
static DATE_FORMAT: &str = "%Y-%m-%d";

pub static ENV_DESTFILE: &str = "BACKMAN_TARGET_DESTFILE";
pub static ENV_NAME: &str = "BACKMAN_TARGET_NAME";
pub static ENV_DESTDIR: &str = "BACKMAN_TARGET_DESTDIR";

#[skip_serializing_none]
#[derive(Clone, Debug, Serialize, Validate, Getters)]
#[getset(get = "pub")]
pub struct Target {
    #[validate(length(min = 1), custom(function = validate_valid_archive_base_name))]
    name: String,
    path: PathBuf,
    destdir: PathBuf,
    destfile: PathBuf,
    elavated: bool,
    one_file_system: bool,
    encrypt: bool,
    #[validate(length(min = 1))]
    compress_program: String,
    #[validate(length(min = 1))]
    elavate_program: String,
    excludes: Vec<String>,
    tar_flags: Vec<String>,
    before_hooks: Vec<String>,
    end_hooks: Vec<String>,
    passphrase: Option<RedactedString>,
}

/// `{name}_{YYYY-MM-DD}.{ext}`
pub fn archive_file_name(name: &str, date: NaiveDate, file_ext: &str) -> String {
    format!("{}_{}.{}", name, date.format(DATE_FORMAT), file_ext)
}

fn shell_quote(s: &str) -> String {
    format!("'{}'", s.replace('\'', r"'\''"))
}

/// Prefixes a hook with exported variables describing the target's destination.
pub fn hook_command(destfile: &Path, name: &str, destdir: &Path, command: &str) -> String {
    format!(
        "export {}={} {}={} {}={}; {}",
        ENV_DESTFILE,
        shell_quote(&destfile.to_string_lossy()),
        ENV_NAME,
        shell_quote(name),
        ENV_DESTDIR,
        shell_quote(&destdir.to_string_lossy()),
        command
    )
}

fn target_file_ext(compress_program: &str, encrypt: bool) -> Arc<str> {
    let compressor = compressor_file_ext(compress_program);
    std::iter::once(TAR_FILE_EXT)
        .chain(std::iter::once(compressor.as_ref()))
        .chain(encrypt.then_some(ENCRYPTED_FILE_EXT))
        .join(".")
        .into()
}

impl Target {
    pub fn from_section(section: &IniSection, ctx: &ConfigContext) -> Result<Self> {
        let target = Self::build_from_section(section, ctx)
            .and_then(|t| t.validate().map(|_| t).map_err(Into::into))
            .add_msg(format!(
                "Invalid [{}] section at line {}",
                section.name(),
                section.line()
            ))?;

        if tracing::enabled!(Level::DEBUG) {
            tracing::debug!("Loaded target:\n{}", serde_yml::to_string(&target)?);
        }
        Ok(target)
    }

    fn build_from_section(section: &IniSection, ctx: &ConfigContext) -> Result<Self> {
        let path = required_scalar(section, "path", parse_path)?;
        let name = required_scalar(section, "name", parse_string)?;
        let elavated = scalar_or(section, "elavated", || false, parse_bool)?;
        let dest = optional_scalar(section, "dest", parse_path)?;
        let compress_program = scalar_or(
            section,
            "compress_program",
            || DEFAULT_COMPRESS_PROGRAM.to_owned(),
            parse_string,
        )?;
        let encrypt = scalar_or(section, "encrypt", || elavated, parse_bool)?;
        let one_file_system = scalar_or(section, "one_file_system", || true, parse_bool)?;
        let elavate_program = scalar_or(
            section,
            "elavate_program",
            || DEFAULT_ELAVATE_PROGRAM.to_owned(),
            parse_string,
        )?;

        let destdir = ctx.resolve_destdir(dest.as_deref());
        let destfile = destdir.join(archive_file_name(
            &name,
            *ctx.today(),
            &target_file_ext(&compress_program, encrypt),
        ));

        let hooks = |field: &str| {
            multi_value(section, field)
                .iter()
                .map(|cmd| hook_command(&destfile, &name, &destdir, cmd))
                .collect_vec()
        };
        let before_hooks = hooks("before_hook");
        let end_hooks = hooks("end_hook");

        Ok(Target {
            path,
            elavated,
            one_file_system,
            encrypt,
            compress_program,
            elavate_program,
            excludes: multi_value(section, "exclude"),
            tar_flags: multi_value(section, "add_tar_flag"),
            before_hooks,
            end_hooks,
            passphrase: None,
            name,
            destdir,
            destfile,
        })
    }

    pub fn is_encrypted(&self) -> bool {
        self.encrypt
    }

    pub fn with_passphrase(mut self, passphrase: RedactedString) -> Self {
        self.passphrase = Some(passphrase);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backup::ini::IniData;
    use crate::backup::redacted::REDACTED_PASSPHRASE;
    use crate::backup::result_error::error::Error;

    fn ctx() -> ConfigContext {
        ConfigContext::builder()
            .today(NaiveDate::from_ymd_opt(2026, 1, 29).unwrap())
            .default_dest("/srv/backups")
            .build()
    }

    fn target(body: &str) -> Result<Target> {
        let data = IniData::parse(&format!("[target]\n{body}"));
        let section = data.sections().next().unwrap();
        Target::from_section(section, &ctx())
    }

    #[test]
    fn test_defaults() {
        let t = target("name = home\npath = /home/user\n").unwrap();
        assert_eq!(t.name(), "home");
        assert_eq!(t.path(), &PathBuf::from("/home/user"));
        assert_eq!(t.destdir(), &PathBuf::from("/srv/backups"));
        assert!(!*t.elavated());
        assert!(!*t.encrypt());
        assert!(*t.one_file_system());
        assert_eq!(t.compress_program(), DEFAULT_COMPRESS_PROGRAM);
        assert_eq!(t.elavate_program(), DEFAULT_ELAVATE_PROGRAM);
        assert!(t.passphrase().is_none());
    }

    #[test]
    fn test_destfile_name() {
        let t = target("name = home\npath = /home/user\n").unwrap();
        assert_eq!(
            t.destfile(),
            &PathBuf::from("/srv/backups/home_2026-01-29.tar.xz")
        );
        let ext = target_file_ext(t.compress_program(), false);
        assert_eq!(ext.as_ref(), "tar.xz");
        assert_eq!(target_file_ext("pigz", true).as_ref(), "tar.gz.gpg");
    }

    #[test]
    fn test_encrypt_defaults_to_elavated() {
        let t = target("name = root\npath = /\nelavated = true\n").unwrap();
        assert!(*t.encrypt());
        assert!(t.is_encrypted());
        assert_eq!(
            t.destfile(),
            &PathBuf::from("/srv/backups/root_2026-01-29.tar.xz.gpg")
        );

        let t = target("name = root\npath = /\nelavated = true\nencrypt = false\n")
            .unwrap();
        assert!(!*t.encrypt());
    }

    #[test]
    fn test_compress_program_sets_extension() {
        let t = target("name = x\npath = /x\ncompress_program = \"zstd -19\"\nencrypt = true\n")
            .unwrap();
        assert_eq!(t.compress_program(), "zstd -19");
        assert_eq!(
            t.destfile(),
            &PathBuf::from("/srv/backups/x_2026-01-29.tar.zst.gpg")
        );
    }

    #[test]
    fn test_target_dest_overrides_default_dest() {
        let t = target("name = x\npath = /x\ndest = /mnt/usb\n").unwrap();
        assert_eq!(t.destdir(), &PathBuf::from("/mnt/usb"));
        assert_eq!(t.destfile(), &PathBuf::from("/mnt/usb/x_2026-01-29.tar.xz"));
    }

    #[test]
    fn test_lists_keep_order() {
        let t = target(
            "name = x\npath = /x\nexclude = /x/b\nexclude = /x/a\nexclude = /x/b\n\
             add_tar_flag = --verbose\nadd_tar_flag = --totals\n",
        )
        .unwrap();
        assert_eq!(t.excludes(), &vec!["/x/b", "/x/a", "/x/b"]);
        assert_eq!(t.tar_flags(), &vec!["--verbose", "--totals"]);
    }

    #[test]
    fn test_hooks_are_prefixed_with_exports() {
        let t = target("name = x\npath = /x\nbefore_hook = \"echo hi\"\nend_hook = sync\n")
            .unwrap();
        assert_eq!(
            t.before_hooks(),
            &vec![
                "export BACKMAN_TARGET_DESTFILE='/srv/backups/x_2026-01-29.tar.xz' \
                 BACKMAN_TARGET_NAME='x' BACKMAN_TARGET_DESTDIR='/srv/backups'; echo hi"
                    .to_owned()
            ]
        );
        assert!(t.end_hooks()[0].ends_with("; sync"));
    }

    #[test]
    fn test_shell_quote_escapes_single_quotes() {
        assert_eq!(shell_quote("it's"), r"'it'\''s'");
    }

    #[test]
    fn test_missing_required_fields() {
        let err = target("name = x\n").unwrap_err();
        assert!(matches!(
            err.root_cause(),
            Error::RequiredField { field: "path", count: 0 }
        ));

        let err = target("path = /x\nname = a\nname = b\n").unwrap_err();
        assert!(matches!(
            err.root_cause(),
            Error::RequiredField { field: "name", count: 2 }
        ));
    }

    #[test]
    fn test_duplicate_scalar_is_fatal() {
        let err = target("name = x\npath = /x\nencrypt = true\nencrypt = true\n")
            .unwrap_err();
        assert!(matches!(
            err.root_cause(),
            Error::DuplicateField { field: "encrypt", count: 2 }
        ));
    }

    #[test]
    fn test_invalid_bool_is_fatal() {
        let err = target("name = x\npath = /x\none_file_system = maybe\n")
            .unwrap_err();
        assert!(matches!(
            err.root_cause(),
            Error::InvalidValue { field: "one_file_system", .. }
        ));
    }

    #[test]
    fn test_invalid_name_is_rejected() {
        let err = target("name = a/b\npath = /x\n").unwrap_err();
        assert!(matches!(err.root_cause(), Error::ValidationError(_)));

        let err = target("name =\npath = /x\n").unwrap_err();
        assert!(matches!(err.root_cause(), Error::ValidationError(_)));
    }

    #[test]
    fn test_passphrase_is_redacted_in_dumps() {
        let t = target("name = x\npath = /x\nencrypt = true\n")
            .unwrap()
            .with_passphrase(RedactedString::from("hunter22"));
        let yaml = serde_yml::to_string(&t).unwrap();
        assert!(yaml.contains(REDACTED_PASSPHRASE));
        assert!(!yaml.contains("hunter22"));
        assert!(!format!("{t:?}").contains("hunter22"));
    }
}
