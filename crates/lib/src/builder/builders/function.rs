use std::sync::Arc;

use super::{BuildError, Builder, Executor};
use crate::cache::BuildCache;
use crate::vars::{VarMap, VarStore};

/// Signature of a closure-backed builder.
pub type BuildFn =
  dyn Fn(&str, &[String], &mut BuildCache, &Executor<'_>, &VarStore) -> Result<Vec<String>, BuildError> + Send + Sync;

/// A builder whose name and behavior are supplied at construction.
///
/// The closure has the same contract as [`Builder::run`]: check the cache,
/// do the work if needed, register it, and return the produced paths.
#[derive(Clone)]
pub struct FnBuilder {
  name: String,
  defaults: VarMap,
  run: Arc<BuildFn>,
}

impl FnBuilder {
  pub fn new<F>(name: impl Into<String>, run: F) -> Self
  where
    F: Fn(&str, &[String], &mut BuildCache, &Executor<'_>, &VarStore) -> Result<Vec<String>, BuildError>
      + Send
      + Sync
      + 'static,
  {
    Self {
      name: name.into(),
      defaults: VarMap::new(),
      run: Arc::new(run),
    }
  }

  pub fn with_defaults(mut self, defaults: VarMap) -> Self {
    self.defaults = defaults;
    self
  }
}

impl std::fmt::Debug for FnBuilder {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("FnBuilder").field("name", &self.name).finish_non_exhaustive()
  }
}

impl Builder for FnBuilder {
  fn name(&self) -> &str {
    &self.name
  }

  fn default_vars(&self) -> VarMap {
    self.defaults.clone()
  }

  fn run(
    &self,
    target: &str,
    sources: &[String],
    cache: &mut BuildCache,
    exec: &Executor<'_>,
    vars: &VarStore,
  ) -> Result<Vec<String>, BuildError> {
    (self.run)(target, sources, cache, exec, vars)
  }
}
