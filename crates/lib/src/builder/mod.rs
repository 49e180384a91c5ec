//! The builder contract.
//!
//! A [`Builder`] knows how to produce some kind of output from some kind of
//! input. It decides for itself whether work is needed by consulting the
//! [`BuildCache`], runs external tools through the [`Executor`] handle, and
//! registers what it built.
//!
//! Most builders expand a command template and hand it to
//! [`standard_build`], which performs the staleness check, runs the command,
//! and records the result.

pub mod builders;
mod depfile;
mod executor;
mod types;

use std::fs;
use std::io;
use std::path::Path;

pub use depfile::parse_makefile_deps;
pub use executor::{Executor, command_to_string};
pub(crate) use executor::ExecutorParts;
pub use types::{BuildError, ExecOptions};

use crate::cache::{BuildCache, CommandKey, UpToDateOptions};
use crate::vars::{VarMap, VarStore};

/// A capability that can produce certain outputs from certain inputs.
pub trait Builder: Send + Sync {
  /// The name targets use to select this builder.
  fn name(&self) -> &str;

  /// Variables seeded into an environment when this builder is registered.
  ///
  /// Values the environment already defines are left alone.
  fn default_vars(&self) -> VarMap {
    VarMap::new()
  }

  /// Whether this builder can produce `target` from `source`.
  ///
  /// Consulted by [`Executor::build_sources`] when converting sources into
  /// intermediates.
  fn produces(&self, _target: &str, _source: &str, _exec: &Executor<'_>, _vars: &VarStore) -> bool {
    false
  }

  /// The path `target` is built at.
  ///
  /// Applied when target names are resolved, so the cache, user
  /// dependencies and consuming targets all see the same name.
  fn target_path(&self, target: &str, _exec: &Executor<'_>, _vars: &VarStore) -> Result<String, BuildError> {
    Ok(target.to_string())
  }

  /// Bring `target` up to date from `sources`.
  ///
  /// Returns the path(s) produced.
  fn run(
    &self,
    target: &str,
    sources: &[String],
    cache: &mut BuildCache,
    exec: &Executor<'_>,
    vars: &VarStore,
  ) -> Result<Vec<String>, BuildError>;
}

/// The common build step.
///
/// When `target` is stale: create its parent directory, remove the old
/// file, run `command`, and register the build with `sources` as its
/// dependencies. Returns the target path either way.
pub fn standard_build(
  label: &str,
  target: &str,
  command: Vec<String>,
  sources: &[String],
  exec: &Executor<'_>,
  cache: &mut BuildCache,
) -> Result<Vec<String>, BuildError> {
  let targets = [target.to_string()];
  let key = CommandKey::Argv(command.clone());

  if !cache.is_up_to_date(&targets, &key, sources, exec.user_deps(), UpToDateOptions::default()) {
    prepare_target(target, cache)?;
    exec.execute(label, &command, &ExecOptions::default())?;
    cache.register_build(&targets, &key, sources, exec.user_deps());
  }

  Ok(targets.to_vec())
}

/// Create the target's directory and remove any stale copy of it.
pub fn prepare_target(target: &str, cache: &mut BuildCache) -> Result<(), BuildError> {
  if let Some(parent) = Path::new(target).parent() {
    cache.mkdir_all(parent).map_err(BuildError::io(parent))?;
  }
  match fs::remove_file(target) {
    Ok(()) => Ok(()),
    Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
    Err(e) => Err(BuildError::Io {
      path: target.into(),
      source: e,
    }),
  }
}
