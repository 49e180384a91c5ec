//! Error and option types shared by builders.

use std::collections::BTreeMap;
use std::io;
use std::path::PathBuf;

use thiserror::Error;

use crate::vars::VarError;

/// Errors a builder (or a hook around it) can report.
#[derive(Debug, Error)]
pub enum BuildError {
  /// An external command exited unsuccessfully.
  #[error("command failed with exit code {code:?}: {command}")]
  CommandFailed { command: String, code: Option<i32> },

  /// An external command could not be started.
  #[error("failed to run '{program}': {source}")]
  Spawn {
    program: String,
    #[source]
    source: io::Error,
  },

  /// The command expanded to nothing.
  #[error("command expanded to an empty argument list")]
  EmptyCommand,

  #[error("{path}: {source}")]
  Io {
    path: PathBuf,
    #[source]
    source: io::Error,
  },

  #[error(transparent)]
  Var(#[from] VarError),

  /// No registered builder can turn `path` into any acceptable suffix.
  #[error("no builder can produce any of [{suffixes}] from '{path}'")]
  NoBuilderFor { path: String, suffixes: String },

  /// A builder was handed a source it does not understand.
  #[error("{builder} builder does not know how to handle '{path}'")]
  UnknownSourceType { builder: String, path: String },

  /// A build hook failed.
  #[error("build hook failed: {0}")]
  Hook(String),

  /// A programmatic builder failed.
  #[error("{0}")]
  Failed(String),
}

impl BuildError {
  /// Whether this error stems from the build description rather than from
  /// running a tool.
  pub fn is_configuration(&self) -> bool {
    matches!(
      self,
      BuildError::Var(_)
        | BuildError::EmptyCommand
        | BuildError::NoBuilderFor { .. }
        | BuildError::UnknownSourceType { .. }
    )
  }

  pub(crate) fn io(path: impl Into<PathBuf>) -> impl FnOnce(io::Error) -> BuildError {
    let path = path.into();
    move |source| BuildError::Io { path, source }
  }
}

/// Per-invocation options for [`Executor::execute`](super::Executor::execute).
#[derive(Debug, Clone, Default)]
pub struct ExecOptions {
  /// Redirect the child's stdout into this file.
  pub stdout_to: Option<PathBuf>,
  /// Extra environment variables for the child.
  pub env: BTreeMap<String, String>,
}
