use crate::backup::result_error::{AddFunctionName, AddMsg};
use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    ValidationError(#[from] validator::ValidationErrors),
    #[error(transparent)]
    SerdeYml(#[from] serde_yml::Error),
    #[error(transparent)]
    Dialoguer(#[from] dialoguer::Error),
    #[error("config file {0:?} does not exist")]
    ConfigNotFound(PathBuf),
    #[error("{field} must be defined exactly once but is defined {count} times")]
    RequiredField { field: &'static str, count: usize },
    #[error("{field} may only be defined once but is defined {count} times")]
    DuplicateField { field: &'static str, count: usize },
    #[error("invalid value {value:?} for {field}, must be {expected}")]
    InvalidValue {
        field: &'static str,
        value: String,
        expected: &'static str,
    },
    #[error("target {0:?} is defined more than once")]
    DuplicateTargetName(String),
    #[error("target {0:?} requested multiple times")]
    DuplicateRequestedTarget(String),
    #[error("target {0:?} not found")]
    UnknownTarget(String),
    #[error("target all requested together with other targets")]
    AllWithOtherTargets,
    #[error("no target requested")]
    NoTargetRequested,
    #[error("encrypt set to true but no passphrase was provided for target {0:?}")]
    MissingPassphrase(String),
    #[error("error creating destination directory {path:?}: {source}")]
    CreateDestDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("target {name:?} failed (before hooks failed: {before_hooks_failed}, pipeline failed: {pipeline_failed}, end hooks failed: {end_hooks_failed})")]
    TargetFailed {
        name: String,
        before_hooks_failed: bool,
        pipeline_failed: bool,
        end_hooks_failed: bool,
    },
    #[error("{}:\n{}", msg, indent::indent_all_with("  ", error.to_string()))]
    WithMsg { msg: String, error: Box<Error> },
    #[error("{} failed:\n{}", fn_name, indent::indent_all_with("  ", error.to_string()))]
    WithFnName { error: Box<Error>, fn_name: String },
    #[error("{}", itertools::join(.0, "\n\n"))]
    LotsOfError(Vec<Error>),
}

impl<S: Into<String>> AddFunctionName<S> for Error {
    fn add_fn_name(self, fn_name: S) -> Self {
        Error::WithFnName {
            error: Box::new(self),
            fn_name: fn_name.into(),
        }
    }
}

impl<S: Into<String>> AddMsg<S> for Error {
    fn add_msg(self, msg: S) -> Self {
        Self::WithMsg {
            msg: msg.into(),
            error: Box::new(self),
        }
    }
}

impl Error {
    pub fn into_iter(self) -> Box<dyn Iterator<Item = Error>> {
        match self {
            Error::LotsOfError(v) => Box::new(v.into_iter().flat_map(|e| e.into_iter())),
            e => Box::new(std::iter::once(e)),
        }
    }

    pub fn chain(self, other: Error) -> Error {
        Error::LotsOfError(self.into_iter().chain(other.into_iter()).collect())
    }

    /// Strips message and function name wrappers.
    pub fn root_cause(&self) -> &Error {
        match self {
            Error::WithMsg { error, .. } | Error::WithFnName { error, .. } => error.root_cause(),
            e => e,
        }
    }
}
