use super::{BuildError, Builder, Executor, expand_suffixes, var_map, with_build_vars};
use crate::builder::standard_build;
use crate::cache::BuildCache;
use crate::vars::{VarMap, VarStore};

/// Archives objects into a static library with `${ARCMD}`.
///
/// Sources that are not already objects or libraries are first built into
/// objects by whichever builder can produce them.
pub struct Library;

impl Builder for Library {
  fn name(&self) -> &str {
    "Library"
  }

  fn default_vars(&self) -> VarMap {
    var_map([
      ("AR", "ar".into()),
      ("LIBSUFFIX", ".a".into()),
      ("ARFLAGS", ["rcs"].into()),
      ("ARCMD", ["${AR}", "${ARFLAGS}", "${_TARGET}", "${_SOURCES}"].into()),
    ])
  }

  fn run(
    &self,
    target: &str,
    sources: &[String],
    cache: &mut BuildCache,
    exec: &Executor<'_>,
    vars: &VarStore,
  ) -> Result<Vec<String>, BuildError> {
    let suffixes = expand_suffixes(exec, vars, &["OBJSUFFIX", "LIBSUFFIX"])?;
    let objects = exec.build_sources(sources, &suffixes, cache, vars)?;
    let vars = with_build_vars(vars, [("_TARGET", target.into()), ("_SOURCES", objects.clone().into())]);
    let command = exec.build_command("${ARCMD}", &vars)?;
    standard_build(&format!("AR {target}"), target, command, &objects, exec, cache)
  }
}
