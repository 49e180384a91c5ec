//! The handle builders use to call back into their environment.

use std::collections::BTreeMap;
use std::fs::File;
use std::process::Command;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use tracing::{debug, info};

use super::{BuildError, Builder, ExecOptions};
use crate::cache::BuildCache;
use crate::env::paths::{PathRules, has_suffix};
use crate::env::{BuildHook, BuildOperation, EchoMode, TargetSpec, UserDependencies};
use crate::platform::Shell;
use crate::vars::{EvalContext, Expansion, VarStore};

/// What an executor borrows from its environment for one build pass.
pub(crate) struct ExecutorParts<'a> {
  pub builders: &'a BTreeMap<String, Arc<dyn Builder>>,
  pub user_deps: &'a UserDependencies,
  pub vars: &'a VarStore,
  pub paths: &'a PathRules,
  pub pre_hooks: &'a [BuildHook],
  pub post_hooks: &'a [BuildHook],
  pub echo: EchoMode,
  pub shell: &'a Shell,
}

/// Runs builders and external commands on behalf of an environment.
pub struct Executor<'a> {
  parts: ExecutorParts<'a>,
  commands_run: AtomicUsize,
  declared: Mutex<Vec<TargetSpec>>,
}

impl<'a> Executor<'a> {
  pub(crate) fn new(parts: ExecutorParts<'a>) -> Self {
    Self {
      parts,
      commands_run: AtomicUsize::new(0),
      declared: Mutex::new(Vec::new()),
    }
  }

  /// The environment's own variables.
  pub fn scope(&self) -> &VarStore {
    self.parts.vars
  }

  pub fn user_deps(&self) -> &UserDependencies {
    self.parts.user_deps
  }

  pub fn shell(&self) -> &Shell {
    self.parts.shell
  }

  pub fn builder(&self, name: &str) -> Option<&Arc<dyn Builder>> {
    self.parts.builders.get(name)
  }

  /// Number of external commands run so far.
  pub fn commands_run(&self) -> usize {
    self.commands_run.load(Ordering::SeqCst)
  }

  /// Expand `template` against `vars`.
  pub fn expand(&self, template: &str, vars: &VarStore) -> Result<Expansion, BuildError> {
    Ok(vars.expand_str(template, &EvalContext::new(self.parts.vars, vars))?)
  }

  /// Expand `template` into an argument vector.
  pub fn build_command(&self, template: &str, vars: &VarStore) -> Result<Vec<String>, BuildError> {
    Ok(self.expand(template, vars)?.into_vec())
  }

  /// Name of the intermediate built from `source` with `suffix`.
  pub fn build_fname(&self, source: &str, suffix: &str) -> String {
    self.parts.paths.build_fname(source, suffix)
  }

  /// Run an external command, echoing it according to the echo mode.
  ///
  /// The command is run directly, not through a shell.
  pub fn execute(&self, label: &str, argv: &[String], options: &ExecOptions) -> Result<(), BuildError> {
    let Some((program, args)) = argv.split_first() else {
      return Err(BuildError::EmptyCommand);
    };
    self.commands_run.fetch_add(1, Ordering::SeqCst);

    let rendered = command_to_string(argv);
    match self.parts.echo {
      EchoMode::Short => println!("{label}"),
      EchoMode::Command => println!("{rendered}"),
      EchoMode::Off => {}
    }
    info!(label = %label, "running");
    debug!(command = %rendered, "spawning process");

    let mut command = Command::new(program);
    command.args(args);
    for (key, value) in &options.env {
      command.env(key, value);
    }
    if let Some(path) = &options.stdout_to {
      let file = File::create(path).map_err(BuildError::io(path))?;
      command.stdout(file);
    }

    let status = command.status().map_err(|source| BuildError::Spawn {
      program: program.clone(),
      source,
    })?;

    if !status.success() {
      if self.parts.echo != EchoMode::Command {
        println!("Failed command was: {rendered}");
      }
      return Err(BuildError::CommandFailed {
        command: rendered,
        code: status.code(),
      });
    }
    Ok(())
  }

  /// Run `builder` for one target, with hooks around it.
  ///
  /// `overrides` are layered over the environment's variables. Pre-build
  /// hooks may change the operation before the builder sees it; post-build
  /// hooks run only after success. Targets declared by either are collected
  /// for the environment to build later in the same `process` call.
  pub fn run_builder(
    &self,
    builder: &dyn Builder,
    target: &str,
    sources: Vec<String>,
    cache: &mut BuildCache,
    overrides: &VarStore,
  ) -> Result<Vec<String>, BuildError> {
    let vars = self.parts.vars.merge(overrides.clone());
    let mut op = BuildOperation::new(builder.name(), target, sources, vars);

    for hook in self.parts.pre_hooks {
      hook(&mut op)?;
    }

    let produced = builder.run(&op.target, &op.sources, cache, self, &op.vars);
    let produced = match produced {
      Ok(produced) => produced,
      Err(e) => {
        self.collect_declared(&mut op);
        return Err(e);
      }
    };

    for hook in self.parts.post_hooks {
      hook(&mut op)?;
    }
    self.collect_declared(&mut op);
    Ok(produced)
  }

  fn collect_declared(&self, op: &mut BuildOperation) {
    if op.declared.is_empty() {
      return;
    }
    let mut declared = self.declared.lock().unwrap_or_else(PoisonError::into_inner);
    declared.append(&mut op.declared);
  }

  /// Drain the targets declared by hooks so far.
  pub(crate) fn take_declared(&self) -> Vec<TargetSpec> {
    let mut declared = self.declared.lock().unwrap_or_else(PoisonError::into_inner);
    std::mem::take(&mut *declared)
  }

  /// Convert `sources` into files bearing one of `suffixes`.
  ///
  /// Sources that already have an acceptable suffix pass through. For the
  /// rest, each suffix is tried in order, and the first builder (by name)
  /// that can produce the intermediate name from the source is run.
  pub fn build_sources(
    &self,
    sources: &[String],
    suffixes: &[String],
    cache: &mut BuildCache,
    vars: &VarStore,
  ) -> Result<Vec<String>, BuildError> {
    let mut out = Vec::with_capacity(sources.len());
    for source in sources {
      if has_suffix(source, suffixes) {
        out.push(source.clone());
        continue;
      }

      let mut converted = None;
      'suffixes: for suffix in suffixes {
        let intermediate = self.build_fname(source, suffix);
        for builder in self.parts.builders.values() {
          if builder.produces(&intermediate, source, self, vars) {
            debug!(source = %source, intermediate = %intermediate, builder = builder.name(), "converting source");
            converted = Some(self.run_builder(builder.as_ref(), &intermediate, vec![source.clone()], cache, vars)?);
            break 'suffixes;
          }
        }
      }

      match converted {
        Some(produced) => out.extend(produced),
        None => {
          return Err(BuildError::NoBuilderFor {
            path: source.clone(),
            suffixes: suffixes.join(", "),
          });
        }
      }
    }
    Ok(out)
  }
}

/// Render an argument vector for display, quoting arguments with spaces.
pub fn command_to_string(argv: &[String]) -> String {
  argv
    .iter()
    .map(|arg| {
      if arg.is_empty() || arg.chars().any(char::is_whitespace) {
        format!("'{arg}'")
      } else {
        arg.clone()
      }
    })
    .collect::<Vec<_>>()
    .join(" ")
}
