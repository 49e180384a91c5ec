//! Build script evaluation.
//!
//! [`evaluate_script`] runs a Lua build script and returns the environments
//! it created. Targets a script declares without calling `env:process()`
//! itself are left pending for the caller to process.

use std::path::Path;

use mlua::prelude::*;
use tracing::{debug, info};

use crate::env::{EnvError, EnvOptions, ProcessSummary};
use crate::lua::env::{EnvRegistry, SharedEnv, lock_env};
use crate::lua::runtime;

/// Errors that can occur during script evaluation.
#[derive(Debug, thiserror::Error)]
pub enum EvalError {
  /// Lua evaluation error.
  #[error("lua error: {0}")]
  Lua(#[from] LuaError),

  /// The script does not exist or cannot be read.
  #[error("build script '{path}' not found")]
  NotFound { path: String },
}

/// An evaluated build script.
///
/// Keeps the Lua state alive, since Lua-defined builders, hooks and
/// deferred variables of the environments call back into it.
pub struct Script {
  environments: Vec<SharedEnv>,
  _lua: Lua,
}

impl std::fmt::Debug for Script {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("Script")
      .field("environments", &self.environments.len())
      .finish_non_exhaustive()
  }
}

impl Script {
  /// Environments in creation order.
  pub fn environments(&self) -> &[SharedEnv] {
    &self.environments
  }

  /// Whether any environment still has targets to build.
  pub fn has_pending(&self) -> bool {
    self.environments.iter().any(|env| lock_env(env).targets().next().is_some())
  }

  /// Process every environment with pending targets, in creation order.
  ///
  /// Stops at the first failure.
  pub fn process_pending(&self) -> Result<ProcessSummary, EnvError> {
    let mut total = ProcessSummary::default();
    for env in &self.environments {
      let mut env = lock_env(env);
      if env.targets().next().is_none() {
        continue;
      }
      let summary = env.process()?;
      total.targets_built += summary.targets_built;
      total.commands_run += summary.commands_run;
      total.passes += summary.passes;
    }
    Ok(total)
  }
}

/// Evaluate the build script at `path`.
///
/// Environments start from `defaults`; a script may override options per
/// environment.
///
/// # Example
/// ```ignore
/// use std::path::Path;
/// use kiln_lib::env::EnvOptions;
/// use kiln_lib::eval::evaluate_script;
///
/// let script = evaluate_script(Path::new("build.lua"), EnvOptions::default())?;
/// let summary = script.process_pending()?;
/// println!("{} targets", summary.targets_built);
/// ```
pub fn evaluate_script(path: &Path, defaults: EnvOptions) -> Result<Script, EvalError> {
  if !path.is_file() {
    return Err(EvalError::NotFound {
      path: path.display().to_string(),
    });
  }

  let registry = EnvRegistry::new(defaults);
  let lua = runtime::create_runtime(registry.clone())?;
  info!(script = %path.display(), "evaluating build script");
  runtime::load_file(&lua, path)?;

  let environments = registry.environments();
  debug!(count = environments.len(), "build script evaluated");
  Ok(Script {
    environments,
    _lua: lua,
  })
}
