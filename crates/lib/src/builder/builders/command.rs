use super::{BuildError, Builder, Executor, with_build_vars};
use crate::builder::standard_build;
use crate::cache::BuildCache;
use crate::vars::{Expansion, VarStore};

/// Runs an arbitrary command given by the `CMD` variable.
///
/// A list `CMD` is run as an argument vector; a single string is run
/// through the system shell.
///
/// ```lua
/// env:target("Command", "docs.html", {"docs.md"}, {
///   CMD = {"pandoc", "-o", "${_TARGET}", "${_SOURCES}"},
/// })
/// ```
pub struct CommandBuilder;

impl Builder for CommandBuilder {
  fn name(&self) -> &str {
    "Command"
  }

  fn run(
    &self,
    target: &str,
    sources: &[String],
    cache: &mut BuildCache,
    exec: &Executor<'_>,
    vars: &VarStore,
  ) -> Result<Vec<String>, BuildError> {
    let vars = with_build_vars(vars, [("_TARGET", target.into()), ("_SOURCES", sources.to_vec().into())]);
    let command = match exec.expand("${CMD}", &vars)? {
      Expansion::String(line) => exec.shell().wrap(&line),
      Expansion::List(argv) => argv,
    };
    standard_build(&format!("CMD {target}"), target, command, sources, exec, cache)
  }
}
