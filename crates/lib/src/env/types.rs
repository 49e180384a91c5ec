//! Types for the build graph executor.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;

use serde::Serialize;
use thiserror::Error;

use crate::builder::BuildError;
use crate::cache::{CacheError, DEFAULT_CACHE_FILE, DepsProvider};
use crate::vars::{VarError, VarMap, VarStore};

/// A declared build target.
#[derive(Debug, Clone, PartialEq)]
pub struct TargetSpec {
  /// Name of the registered builder that produces this target.
  pub builder: String,
  /// Output path. May contain variable references until paths are resolved.
  pub target: String,
  /// Source paths, in order.
  pub sources: Vec<String>,
  /// Per-target variable overrides.
  pub vars: VarMap,
}

impl TargetSpec {
  pub fn new(builder: impl Into<String>, target: impl Into<String>, sources: Vec<String>) -> Self {
    Self {
      builder: builder.into(),
      target: target.into(),
      sources,
      vars: VarMap::new(),
    }
  }

  pub fn with_vars(mut self, vars: VarMap) -> Self {
    self.vars = vars;
    self
  }
}

/// The mutable view of a single build handed to build hooks.
#[derive(Debug)]
pub struct BuildOperation {
  pub builder: String,
  pub target: String,
  pub sources: Vec<String>,
  /// The merged variables the builder will run with.
  pub vars: VarStore,
  pub(crate) declared: Vec<TargetSpec>,
}

impl BuildOperation {
  pub(crate) fn new(builder: &str, target: &str, sources: Vec<String>, vars: VarStore) -> Self {
    Self {
      builder: builder.to_string(),
      target: target.to_string(),
      sources,
      vars,
      declared: Vec::new(),
    }
  }

  /// Declare a new target; it is built later in the same `process` call.
  pub fn declare(&mut self, spec: TargetSpec) {
    self.declared.push(spec);
  }

  /// Targets declared through this operation so far.
  pub fn declared(&self) -> &[TargetSpec] {
    &self.declared
  }
}

/// A callback run immediately before or after a single build.
pub type BuildHook = Arc<dyn Fn(&mut BuildOperation) -> Result<(), BuildError> + Send + Sync>;

/// Extra dependencies declared by hand, per target.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UserDependencies {
  deps: BTreeMap<String, Vec<String>>,
}

impl UserDependencies {
  /// Add `paths` to `target`'s list, keeping first-seen order and skipping
  /// duplicates.
  pub fn add<I>(&mut self, target: &str, paths: I)
  where
    I: IntoIterator<Item = String>,
  {
    let entry = self.deps.entry(target.to_string()).or_default();
    for path in paths {
      if !entry.contains(&path) {
        entry.push(path);
      }
    }
  }

  pub fn get(&self, target: &str) -> &[String] {
    self.user_deps_for(target)
  }

  pub fn is_empty(&self) -> bool {
    self.deps.is_empty()
  }

  /// A copy where each renamed target also carries the dependencies
  /// declared against its original name.
  pub(crate) fn aliased<'a, I>(&self, renames: I) -> UserDependencies
  where
    I: IntoIterator<Item = (&'a str, &'a str)>,
  {
    let mut out = self.clone();
    for (from, to) in renames {
      if from != to
        && let Some(paths) = self.deps.get(from)
      {
        out.add(to, paths.iter().cloned());
      }
    }
    out
  }
}

impl DepsProvider for UserDependencies {
  fn user_deps_for(&self, target: &str) -> &[String] {
    self.deps.get(target).map(Vec::as_slice).unwrap_or(&[])
  }
}

/// How builds are echoed to stdout.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum EchoMode {
  /// `CC build/main.o`
  #[default]
  Short,
  /// The full command line.
  Command,
  Off,
}

impl std::str::FromStr for EchoMode {
  type Err = String;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    match s {
      "short" => Ok(EchoMode::Short),
      "command" => Ok(EchoMode::Command),
      "off" => Ok(EchoMode::Off),
      other => Err(format!("unknown echo mode '{other}' (expected short, command or off)")),
    }
  }
}

/// Which default builders an environment leaves out.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum ExcludeBuilders {
  #[default]
  None,
  All,
  Named(Vec<String>),
}

impl ExcludeBuilders {
  pub fn excludes(&self, name: &str) -> bool {
    match self {
      ExcludeBuilders::None => false,
      ExcludeBuilders::All => true,
      ExcludeBuilders::Named(names) => names.iter().any(|n| n == name),
    }
  }
}

/// Engine options of an environment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnvOptions {
  pub echo: EchoMode,
  pub cache_file: PathBuf,
  pub exclude_builders: ExcludeBuilders,
}

impl Default for EnvOptions {
  fn default() -> Self {
    Self {
      echo: EchoMode::default(),
      cache_file: PathBuf::from(DEFAULT_CACHE_FILE),
      exclude_builders: ExcludeBuilders::default(),
    }
  }
}

/// What a cloned environment carries over besides its variables.
#[derive(Debug, Clone, Default)]
pub struct CloneOptions {
  pub builders: bool,
  /// Build root and build directory rules.
  pub build_root: bool,
  pub build_hooks: bool,
  /// Variables layered over the copied ones.
  pub vars: VarMap,
}

impl CloneOptions {
  /// Copy everything that can be copied.
  pub fn all() -> Self {
    Self {
      builders: true,
      build_root: true,
      build_hooks: true,
      vars: VarMap::new(),
    }
  }

  pub fn with_vars(mut self, vars: VarMap) -> Self {
    self.vars = vars;
    self
  }
}

/// Totals for one `process` call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ProcessSummary {
  /// Targets walked, whether rebuilt or found up to date.
  pub targets_built: usize,
  /// External commands actually run.
  pub commands_run: usize,
  /// Rounds needed to drain targets declared by hooks.
  pub passes: usize,
}

/// A target in build order, as returned by `plan`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PlannedTarget {
  pub target: String,
  pub builder: String,
  pub sources: Vec<String>,
}

/// Errors surfaced by an environment.
#[derive(Debug, Error)]
pub enum EnvError {
  /// The build description is wrong for this target.
  #[error("configuration error for target '{target}': {source}")]
  Config {
    target: String,
    #[source]
    source: BuildError,
  },

  /// Building this target failed.
  #[error("build failed for target '{target}': {source}")]
  BuildFailed {
    target: String,
    #[source]
    source: BuildError,
  },

  #[error("unknown builder '{builder}' for target '{target}'")]
  UnknownBuilder { builder: String, target: String },

  /// A target name expanded to zero or several paths.
  #[error("target '{path}' must name exactly one path, but expanded to {count}")]
  TargetName { path: String, count: usize },

  #[error("dependency cycle involving target '{target}'")]
  DependencyCycle { target: String },

  #[error("cannot resolve path '{path}': {source}")]
  Path {
    path: String,
    #[source]
    source: VarError,
  },

  #[error("invalid build directory pattern '{pattern}': {source}")]
  BuildDirPattern {
    pattern: String,
    #[source]
    source: regex::Error,
  },

  #[error(transparent)]
  Var(#[from] VarError),

  #[error(transparent)]
  Cache(#[from] CacheError),
}

impl EnvError {
  /// Attribute a builder error to `target`, split into configuration and
  /// build failures.
  pub(crate) fn for_target(target: &str, source: BuildError) -> Self {
    let target = target.to_string();
    if source.is_configuration() {
      EnvError::Config { target, source }
    } else {
      EnvError::BuildFailed { target, source }
    }
  }

  /// The target this error is about, if any.
  pub fn target(&self) -> Option<&str> {
    match self {
      EnvError::Config { target, .. }
      | EnvError::BuildFailed { target, .. }
      | EnvError::UnknownBuilder { target, .. }
      | EnvError::DependencyCycle { target } => Some(target),
      _ => None,
    }
  }
}
