//! The build graph executor.
//!
//! An [`Environment`] owns a variable store, a registry of builders, and the
//! targets declared against it. [`Environment::process`] brings every
//! declared target up to date:
//!
//! 1. Target and source names are expanded through the variable store and
//!    `^/` prefixes are rewritten to the build root.
//! 2. Targets are walked depth first; a source that is itself a declared
//!    target is built before the target that consumes it. Each target is
//!    built at most once per pass.
//! 3. Each build runs the pre-build hooks, the builder, then the post-build
//!    hooks. Targets declared by hooks are processed in a further round.
//! 4. The cache is written back, also when a build failed.

pub mod paths;
mod types;

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;

use indexmap::IndexMap;
use petgraph::algo::toposort;
use petgraph::graph::DiGraph;
use tracing::{debug, info, warn};

pub use paths::{PathRules, has_suffix, set_suffix};
pub use types::*;

use crate::builder::builders::default_builders;
use crate::builder::{BuildError, Builder, ExecOptions, Executor, ExecutorParts};
use crate::cache::BuildCache;
use crate::platform::Shell;
use crate::vars::{EvalContext, Expansion, VarError, VarMap, VarStore, VarValue};

/// A build environment: variables, builders, targets and hooks.
pub struct Environment {
  vars: VarStore,
  builders: BTreeMap<String, Arc<dyn Builder>>,
  targets: IndexMap<String, TargetSpec>,
  user_deps: UserDependencies,
  paths: PathRules,
  pre_hooks: Vec<BuildHook>,
  post_hooks: Vec<BuildHook>,
  options: EnvOptions,
  shell: Shell,
}

/// A target whose names have been resolved to paths.
struct Resolved {
  /// The name before the builder's naming conventions were applied.
  declared: String,
  builder: String,
  sources: Vec<String>,
  vars: VarMap,
}

impl Environment {
  /// Create an environment with the default builders registered.
  pub fn new(options: EnvOptions) -> Self {
    Self::with_vars(VarMap::new(), options)
  }

  /// Create an environment seeded with `vars`.
  ///
  /// Builder defaults are added afterwards, so `vars` take precedence.
  pub fn with_vars(vars: VarMap, options: EnvOptions) -> Self {
    let mut env = Self {
      vars: VarStore::from(vars),
      builders: BTreeMap::new(),
      targets: IndexMap::new(),
      user_deps: UserDependencies::default(),
      paths: PathRules::default(),
      pre_hooks: Vec::new(),
      post_hooks: Vec::new(),
      options,
      shell: Shell::detect(),
    };
    env.add_default_builders();
    env
  }

  fn add_default_builders(&mut self) {
    for builder in default_builders() {
      if !self.options.exclude_builders.excludes(builder.name()) {
        self.add_builder(builder);
      }
    }
  }

  pub fn options(&self) -> &EnvOptions {
    &self.options
  }

  pub fn vars(&self) -> &VarStore {
    &self.vars
  }

  pub fn vars_mut(&mut self) -> &mut VarStore {
    &mut self.vars
  }

  pub fn get(&self, name: &str) -> Option<&VarValue> {
    self.vars.get(name)
  }

  pub fn set(&mut self, name: impl Into<String>, value: impl Into<VarValue>) {
    self.vars.set(name, value);
  }

  /// Use `shell` for scalar commands instead of the detected one.
  pub fn set_shell(&mut self, shell: Shell) {
    self.shell = shell;
  }

  /// Register `builder`, replacing any builder with the same name.
  ///
  /// Its default variables are seeded only where this environment has no
  /// value yet.
  pub fn add_builder(&mut self, builder: Arc<dyn Builder>) {
    for (name, value) in builder.default_vars() {
      if !self.vars.has(&name) {
        self.vars.set(name, value);
      }
    }
    debug!(builder = builder.name(), "registered builder");
    self.builders.insert(builder.name().to_string(), builder);
  }

  pub fn builder_names(&self) -> impl Iterator<Item = &str> {
    self.builders.keys().map(String::as_str)
  }

  /// Declare `target`, built by `builder` from `sources`.
  ///
  /// Names are kept as written and resolved when the environment is
  /// processed. Redeclaring a target replaces the earlier declaration.
  pub fn declare_target(&mut self, spec: TargetSpec) -> Result<(), EnvError> {
    if !self.builders.contains_key(&spec.builder) {
      return Err(EnvError::UnknownBuilder {
        builder: spec.builder,
        target: spec.target,
      });
    }
    if self.targets.contains_key(&spec.target) {
      warn!(target_name = %spec.target, "target redeclared, replacing the earlier declaration");
    }
    self.targets.insert(spec.target.clone(), spec);
    Ok(())
  }

  /// Targets declared and not yet processed, in declaration order.
  pub fn targets(&self) -> impl Iterator<Item = &TargetSpec> {
    self.targets.values()
  }

  pub fn clear_targets(&mut self) {
    self.targets.clear();
  }

  /// Make `target` additionally depend on `paths`.
  ///
  /// Both are expanded now, against the current variables.
  pub fn depends<I, S>(&mut self, target: &str, paths: I) -> Result<(), EnvError>
  where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
  {
    let target = self.resolve_target_name(target)?;
    let mut resolved = Vec::new();
    for path in paths {
      resolved.extend(self.resolve_path(path.as_ref())?);
    }
    self.user_deps.add(&target, resolved);
    Ok(())
  }

  pub fn user_deps(&self) -> &UserDependencies {
    &self.user_deps
  }

  pub fn add_build_hook(&mut self, hook: BuildHook) {
    self.pre_hooks.push(hook);
  }

  pub fn add_post_build_hook(&mut self, hook: BuildHook) {
    self.post_hooks.push(hook);
  }

  /// Place intermediates generated under `src` in `dst` instead.
  pub fn build_dir(&mut self, src: &str, dst: &str) {
    self.paths.add_build_dir(src, dst);
  }

  /// Place intermediates whose names match `pattern` at `replacement`,
  /// which may refer to captures as `$1`.
  pub fn build_dir_regex(&mut self, pattern: &str, replacement: &str) -> Result<(), EnvError> {
    self
      .paths
      .add_build_dir_regex(pattern, replacement)
      .map_err(|source| EnvError::BuildDirPattern {
        pattern: pattern.to_string(),
        source,
      })
  }

  pub fn build_root(&mut self, root: &str) {
    self.paths.set_build_root(root);
  }

  pub fn paths(&self) -> &PathRules {
    &self.paths
  }

  /// Name of the intermediate built from `source` with `suffix`.
  pub fn build_fname(&self, source: &str, suffix: &str) -> String {
    self.paths.build_fname(source, suffix)
  }

  /// Copy this environment.
  ///
  /// Variables are always carried over and stay isolated from the
  /// original. Declared targets and user dependencies are never copied.
  /// Without `options.builders` the clone starts with the default builders.
  pub fn clone_env(&self, options: CloneOptions) -> Environment {
    let mut env = Environment {
      vars: self.vars.merge(options.vars),
      builders: BTreeMap::new(),
      targets: IndexMap::new(),
      user_deps: UserDependencies::default(),
      paths: PathRules::default(),
      pre_hooks: Vec::new(),
      post_hooks: Vec::new(),
      options: self.options.clone(),
      shell: self.shell.clone(),
    };
    if options.builders {
      env.builders = self.builders.clone();
    } else {
      env.add_default_builders();
    }
    if options.build_root {
      env.paths = self.paths.clone();
    }
    if options.build_hooks {
      env.pre_hooks = self.pre_hooks.clone();
      env.post_hooks = self.post_hooks.clone();
    }
    env
  }

  /// Expand `template` against this environment's variables.
  pub fn expand(&self, template: &str) -> Result<Expansion, VarError> {
    self.vars.expand_str(template, &EvalContext::of(&self.vars))
  }

  /// Expand `template` into an argument vector, with `extra` layered over
  /// the environment's variables.
  pub fn build_command(&self, template: &str, extra: VarMap) -> Result<Vec<String>, VarError> {
    let vars = self.vars.merge(extra);
    Ok(vars.expand_str(template, &EvalContext::new(&self.vars, &vars))?.into_vec())
  }

  /// Run an external command the way builders do.
  pub fn execute(&self, label: &str, argv: &[String], options: &ExecOptions) -> Result<(), BuildError> {
    self.executor().execute(label, argv, options)
  }

  /// Convert `sources` into files bearing one of `suffixes`.
  pub fn build_sources(
    &self,
    sources: &[String],
    suffixes: &[String],
    cache: &mut BuildCache,
  ) -> Result<Vec<String>, BuildError> {
    self.executor().build_sources(sources, suffixes, cache, &self.vars)
  }

  fn executor(&self) -> Executor<'_> {
    self.executor_with(&self.user_deps)
  }

  fn executor_with<'a>(&'a self, user_deps: &'a UserDependencies) -> Executor<'a> {
    Executor::new(ExecutorParts {
      builders: &self.builders,
      user_deps,
      vars: &self.vars,
      paths: &self.paths,
      pre_hooks: &self.pre_hooks,
      post_hooks: &self.post_hooks,
      echo: self.options.echo,
      shell: &self.shell,
    })
  }

  fn resolve_path(&self, path: &str) -> Result<Vec<String>, EnvError> {
    let expanded = self.expand(path).map_err(|source| EnvError::Path {
      path: path.to_string(),
      source,
    })?;
    Ok(
      expanded
        .into_vec()
        .into_iter()
        .filter(|p| !p.is_empty())
        .map(|p| self.paths.expand_path(&p))
        .collect(),
    )
  }

  fn resolve_target_name(&self, target: &str) -> Result<String, EnvError> {
    let resolved = self.resolve_path(target)?;
    match <[String; 1]>::try_from(resolved) {
      Ok([name]) => Ok(name),
      Err(names) => Err(EnvError::TargetName {
        path: target.to_string(),
        count: names.len(),
      }),
    }
  }

  fn resolve<'s, I>(&self, exec: &Executor<'_>, specs: I) -> Result<IndexMap<String, Resolved>, EnvError>
  where
    I: IntoIterator<Item = &'s TargetSpec>,
  {
    let mut resolved = IndexMap::new();
    for spec in specs {
      let declared = self.resolve_target_name(&spec.target)?;
      let target = match exec.builder(&spec.builder) {
        Some(builder) => builder
          .target_path(&declared, exec, &self.vars.merge(spec.vars.clone()))
          .map_err(|e| EnvError::for_target(&declared, e))?,
        None => declared.clone(),
      };
      let mut sources = Vec::with_capacity(spec.sources.len());
      for source in &spec.sources {
        sources.extend(self.resolve_path(source)?);
      }
      resolved.insert(
        target,
        Resolved {
          declared,
          builder: spec.builder.clone(),
          sources,
          vars: spec.vars.clone(),
        },
      );
    }
    Ok(resolved)
  }

  /// Declared targets in the order they would be built, without building.
  pub fn plan(&self) -> Result<Vec<PlannedTarget>, EnvError> {
    let resolved = self.resolve(&self.executor(), self.targets.values())?;

    let mut graph = DiGraph::<&str, ()>::new();
    let nodes: HashMap<&str, _> = resolved
      .keys()
      .map(|name| (name.as_str(), graph.add_node(name.as_str())))
      .collect();
    for (name, target) in &resolved {
      for source in &target.sources {
        if let Some(&dep) = nodes.get(source.as_str()) {
          graph.add_edge(dep, nodes[name.as_str()], ());
        }
      }
    }

    let order = toposort(&graph, None).map_err(|cycle| EnvError::DependencyCycle {
      target: graph[cycle.node_id()].to_string(),
    })?;

    Ok(
      order
        .into_iter()
        .filter_map(|idx| {
          let name = graph[idx];
          resolved.get(name).map(|target| PlannedTarget {
            target: name.to_string(),
            builder: target.builder.clone(),
            sources: target.sources.clone(),
          })
        })
        .collect(),
    )
  }

  /// Build every declared target.
  ///
  /// Declared targets are consumed whether or not the build succeeds. The
  /// cache is written back in both cases, so work finished before a failure
  /// is not repeated.
  pub fn process(&mut self) -> Result<ProcessSummary, EnvError> {
    let pending: Vec<TargetSpec> = std::mem::take(&mut self.targets).into_values().collect();
    let mut cache = BuildCache::load(&self.options.cache_file);

    let result = self.run_passes(pending, &mut cache);
    let written = cache.write();

    match (result, written) {
      (Ok(summary), Ok(())) => {
        info!(
          targets = summary.targets_built,
          commands = summary.commands_run,
          passes = summary.passes,
          "environment processed"
        );
        Ok(summary)
      }
      (Ok(_), Err(e)) => Err(e.into()),
      (Err(e), written) => {
        if let Err(write_err) = written {
          warn!(error = %write_err, "could not write cache after failed build");
        }
        Err(e)
      }
    }
  }

  fn run_passes(&self, mut pending: Vec<TargetSpec>, cache: &mut BuildCache) -> Result<ProcessSummary, EnvError> {
    let mut summary = ProcessSummary::default();

    while !pending.is_empty() {
      summary.passes += 1;
      cache.clear_checksum_memo();

      let resolved = self.resolve(&self.executor(), &pending)?;
      let user_deps = self
        .user_deps
        .aliased(resolved.iter().map(|(path, target)| (target.declared.as_str(), path.as_str())));
      let exec = self.executor_with(&user_deps);
      info!(pass = summary.passes, targets = resolved.len(), "starting build pass");

      let mut walk = Walk {
        exec: &exec,
        targets: &resolved,
        built: HashSet::new(),
        in_progress: HashSet::new(),
      };
      for name in resolved.keys() {
        walk.build(name, cache)?;
      }
      summary.targets_built += walk.built.len();
      summary.commands_run += exec.commands_run();

      pending = exec.take_declared();
      if !pending.is_empty() {
        debug!(count = pending.len(), "hooks declared further targets");
      }
    }

    Ok(summary)
  }
}

/// Depth-first walk over one round of resolved targets.
struct Walk<'a, 'e> {
  exec: &'a Executor<'e>,
  targets: &'a IndexMap<String, Resolved>,
  built: HashSet<String>,
  in_progress: HashSet<String>,
}

impl Walk<'_, '_> {
  fn build(&mut self, name: &str, cache: &mut BuildCache) -> Result<(), EnvError> {
    if self.built.contains(name) {
      return Ok(());
    }
    let targets = self.targets;
    let Some(target) = targets.get(name) else {
      return Ok(());
    };
    if !self.in_progress.insert(name.to_string()) {
      return Err(EnvError::DependencyCycle {
        target: name.to_string(),
      });
    }

    for source in &target.sources {
      if targets.contains_key(source) {
        self.build(source, cache)?;
      }
    }

    let exec = self.exec;
    let Some(builder) = exec.builder(&target.builder) else {
      return Err(EnvError::UnknownBuilder {
        builder: target.builder.clone(),
        target: name.to_string(),
      });
    };
    debug!(target_name = %name, builder = %target.builder, "building target");
    exec
      .run_builder(
        builder.as_ref(),
        name,
        target.sources.clone(),
        cache,
        &VarStore::from(target.vars.clone()),
      )
      .map_err(|e| EnvError::for_target(name, e))?;

    self.in_progress.remove(name);
    self.built.insert(name.to_string());
    Ok(())
  }
}
