use std::path::Path;

use super::{BuildError, Builder, Executor, expand_suffixes, var_map, with_build_vars};
use crate::builder::standard_build;
use crate::cache::BuildCache;
use crate::env::paths::has_suffix;
use crate::platform::program_suffix;
use crate::vars::{VarMap, VarStore, VarValue};

/// Links objects and libraries into an executable with `${LDCMD}`.
///
/// The linker is `${LD}` when set, else the D compiler when any source is D,
/// else the C++ compiler when any source is C++, else the C compiler.
/// A target without an extension gets `${PROGSUFFIX}` appended.
pub struct Program;

impl Program {
  fn linker(&self, sources: &[String], exec: &Executor<'_>, vars: &VarStore) -> Result<&'static str, BuildError> {
    if vars.get("LD").and_then(VarValue::as_str).is_some_and(|ld| !ld.is_empty()) {
      return Ok("${LD}");
    }
    let d_suffixes = expand_suffixes(exec, vars, &["DSUFFIX"])?;
    if sources.iter().any(|s| has_suffix(s, &d_suffixes)) {
      return Ok("${DC}");
    }
    let cxx_suffixes = expand_suffixes(exec, vars, &["CXXSUFFIX"])?;
    if sources.iter().any(|s| has_suffix(s, &cxx_suffixes)) {
      return Ok("${CXX}");
    }
    Ok("${CC}")
  }
}

impl Builder for Program {
  fn name(&self) -> &str {
    "Program"
  }

  fn default_vars(&self) -> VarMap {
    var_map([
      ("OBJSUFFIX", ".o".into()),
      ("LIBSUFFIX", ".a".into()),
      ("PROGSUFFIX", program_suffix().into()),
      ("LDFLAGS", VarValue::List(vec![])),
      ("LIBPATH", VarValue::List(vec![])),
      ("LIBS", VarValue::List(vec![])),
      (
        "LDCMD",
        [
          "${_LINKER}",
          "-o",
          "${_TARGET}",
          "${LDFLAGS}",
          "${_SOURCES}",
          "-L${LIBPATH}",
          "-l${LIBS}",
        ]
        .into(),
      ),
    ])
  }

  fn target_path(&self, target: &str, exec: &Executor<'_>, vars: &VarStore) -> Result<String, BuildError> {
    if Path::new(target).extension().is_some() {
      return Ok(target.to_string());
    }
    let suffix = exec.expand("${PROGSUFFIX}", vars)?.into_vec().concat();
    Ok(format!("{target}{suffix}"))
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

    let linker = self.linker(sources, exec, vars)?;
    let vars = with_build_vars(
      vars,
      [
        ("_TARGET", target.into()),
        ("_SOURCES", objects.clone().into()),
        ("_LINKER", linker.into()),
      ],
    );
    let command = exec.build_command("${LDCMD}", &vars)?;
    standard_build(&format!("LD {target}"), target, command, &objects, exec, cache)
  }
}
