use super::{BuildError, Builder, Executor, expand_suffixes, var_map, with_build_vars};
use crate::builder::standard_build;
use crate::cache::BuildCache;
use crate::env::paths::has_suffix;
use crate::vars::{VarMap, VarStore};

/// Runs the C preprocessor with `${CPP_CMD}`, using the C++ compiler when
/// any source is C++.
pub struct Preprocess;

impl Builder for Preprocess {
  fn name(&self) -> &str {
    "Preprocess"
  }

  fn default_vars(&self) -> VarMap {
    var_map([(
      "CPP_CMD",
      [
        "${_PREPROCESS_CC}",
        "-E",
        "-o",
        "${_TARGET}",
        "-I${CPPPATH}",
        "${CPPFLAGS}",
        "${CFLAGS}",
        "${_SOURCES}",
      ]
      .into(),
    )])
  }

  fn run(
    &self,
    target: &str,
    sources: &[String],
    cache: &mut BuildCache,
    exec: &Executor<'_>,
    vars: &VarStore,
  ) -> Result<Vec<String>, BuildError> {
    let cxx_suffixes = expand_suffixes(exec, vars, &["CXXSUFFIX"])?;
    let compiler = if sources.iter().any(|s| has_suffix(s, &cxx_suffixes)) {
      "${CXX}"
    } else {
      "${CC}"
    };
    let vars = with_build_vars(
      vars,
      [
        ("_PREPROCESS_CC", compiler.into()),
        ("_TARGET", target.into()),
        ("_SOURCES", sources.to_vec().into()),
      ],
    );
    let command = exec.build_command("${CPP_CMD}", &vars)?;
    standard_build(&format!("Preprocess {target}"), target, command, sources, exec, cache)
  }
}
