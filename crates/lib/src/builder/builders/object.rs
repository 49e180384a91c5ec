use std::fs;

use tracing::debug;

use super::{BuildError, Builder, Executor, expand_suffixes, var_map, with_build_vars};
use crate::builder::{ExecOptions, parse_makefile_deps, prepare_target};
use crate::cache::{BuildCache, CommandKey, UpToDateOptions};
use crate::env::paths::{has_suffix, set_suffix};
use crate::vars::{VarMap, VarStore, VarValue};

/// Compiler prefix and the variable naming its source suffixes.
const KNOWN_SUFFIXES: [(&str, &str); 4] = [("AS", "ASSUFFIX"), ("CC", "CSUFFIX"), ("CXX", "CXXSUFFIX"), ("DC", "DSUFFIX")];

/// Compiles C, C++, D and assembly sources to object files.
///
/// The compiler is chosen by the first source's suffix; `${CCCOM}`,
/// `${CXXCOM}`, `${DCCOM}` or `${ASCOM}` is the command. Header
/// dependencies reported by the compiler through `${_DEPFILE}` are recorded
/// in the cache alongside the sources.
pub struct Object;

impl Object {
  fn compiler_for(&self, source: &str, exec: &Executor<'_>, vars: &VarStore) -> Result<Option<&'static str>, BuildError> {
    for (prefix, suffix_var) in KNOWN_SUFFIXES {
      if has_suffix(source, &expand_suffixes(exec, vars, &[suffix_var])?) {
        return Ok(Some(prefix));
      }
    }
    Ok(None)
  }
}

impl Builder for Object {
  fn name(&self) -> &str {
    "Object"
  }

  fn default_vars(&self) -> VarMap {
    var_map([
      ("OBJSUFFIX", ".o".into()),
      ("AS", "${CC}".into()),
      ("ASFLAGS", VarValue::List(vec![])),
      ("ASSUFFIX", ".S".into()),
      ("ASPPPATH", "${CPPPATH}".into()),
      ("ASPPFLAGS", "${CPPFLAGS}".into()),
      ("ASDEPGEN", ["-MMD", "-MF", "${_DEPFILE}"].into()),
      (
        "ASCOM",
        [
          "${AS}",
          "-c",
          "-o",
          "${_TARGET}",
          "${ASDEPGEN}",
          "-I${ASPPPATH}",
          "${ASPPFLAGS}",
          "${ASFLAGS}",
          "${_SOURCES}",
        ]
        .into(),
      ),
      ("CPPFLAGS", VarValue::List(vec![])),
      ("CPPPATH", VarValue::List(vec![])),
      ("CC", "gcc".into()),
      ("CFLAGS", VarValue::List(vec![])),
      ("CSUFFIX", ".c".into()),
      ("CCDEPGEN", ["-MMD", "-MF", "${_DEPFILE}"].into()),
      (
        "CCCOM",
        [
          "${CC}",
          "-c",
          "-o",
          "${_TARGET}",
          "${CCDEPGEN}",
          "-I${CPPPATH}",
          "${CPPFLAGS}",
          "${CFLAGS}",
          "${_SOURCES}",
        ]
        .into(),
      ),
      ("CXX", "g++".into()),
      ("CXXFLAGS", VarValue::List(vec![])),
      ("CXXSUFFIX", ".cc".into()),
      ("CXXDEPGEN", ["-MMD", "-MF", "${_DEPFILE}"].into()),
      (
        "CXXCOM",
        [
          "${CXX}",
          "-c",
          "-o",
          "${_TARGET}",
          "${CXXDEPGEN}",
          "-I${CPPPATH}",
          "${CPPFLAGS}",
          "${CXXFLAGS}",
          "${_SOURCES}",
        ]
        .into(),
      ),
      ("DC", "gdc".into()),
      ("DFLAGS", VarValue::List(vec![])),
      ("DSUFFIX", ".d".into()),
      ("D_IMPORT_PATH", VarValue::List(vec![])),
      (
        "DCCOM",
        ["${DC}", "-c", "-o", "${_TARGET}", "-I${D_IMPORT_PATH}", "${DFLAGS}", "${_SOURCES}"].into(),
      ),
    ])
  }

  fn produces(&self, target: &str, source: &str, exec: &Executor<'_>, vars: &VarStore) -> bool {
    let Ok(obj_suffixes) = expand_suffixes(exec, vars, &["OBJSUFFIX"]) else {
      return false;
    };
    has_suffix(target, &obj_suffixes) && matches!(self.compiler_for(source, exec, vars), Ok(Some(_)))
  }

  fn run(
    &self,
    target: &str,
    sources: &[String],
    cache: &mut BuildCache,
    exec: &Executor<'_>,
    vars: &VarStore,
  ) -> Result<Vec<String>, BuildError> {
    let first = sources.first().map(String::as_str).unwrap_or_default();
    let Some(prefix) = self.compiler_for(first, exec, vars)? else {
      return Err(BuildError::UnknownSourceType {
        builder: self.name().to_string(),
        path: first.to_string(),
      });
    };

    let depfile = set_suffix(target, ".mf");
    let vars = with_build_vars(
      vars,
      [
        ("_TARGET", target.into()),
        ("_SOURCES", sources.to_vec().into()),
        ("_DEPFILE", depfile.clone().into()),
      ],
    );
    let command = exec.build_command(&format!("${{{prefix}COM}}"), &vars)?;
    let key = CommandKey::Argv(command.clone());
    let targets = [target.to_string()];

    if !cache.is_up_to_date(&targets, &key, sources, exec.user_deps(), UpToDateOptions::default()) {
      prepare_target(target, cache)?;
      exec.execute(&format!("{prefix} {target}"), &command, &ExecOptions::default())?;

      let mut deps = sources.to_vec();
      if let Ok(header_deps) = parse_makefile_deps(&depfile, target) {
        debug!(output = %target, count = header_deps.len(), "read compiler dependencies");
        for dep in header_deps {
          if !deps.contains(&dep) {
            deps.push(dep);
          }
        }
        fs::remove_file(&depfile).map_err(BuildError::io(&depfile))?;
      }
      cache.register_build(&targets, &key, &deps, exec.user_deps());
    }

    Ok(targets.to_vec())
  }
}
