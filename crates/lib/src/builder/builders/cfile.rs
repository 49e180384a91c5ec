use super::{BuildError, Builder, Executor, var_map, with_build_vars};
use crate::builder::standard_build;
use crate::cache::BuildCache;
use crate::vars::{VarMap, VarStore, VarValue};

/// Generates C or C++ sources from lexer (`.l`, `.ll`) or parser (`.y`,
/// `.yy`) grammars.
pub struct CFile;

impl Builder for CFile {
  fn name(&self) -> &str {
    "CFile"
  }

  fn default_vars(&self) -> VarMap {
    var_map([
      ("YACC", "bison".into()),
      ("YACC_FLAGS", ["-d"].into()),
      ("YACC_CMD", ["${YACC}", "${YACC_FLAGS}", "-o", "${_TARGET}", "${_SOURCES}"].into()),
      ("LEX", "flex".into()),
      ("LEX_FLAGS", VarValue::List(vec![])),
      ("LEX_CMD", ["${LEX}", "${LEX_FLAGS}", "-o", "${_TARGET}", "${_SOURCES}"].into()),
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
    let first = sources.first().map(String::as_str).unwrap_or_default();
    let tool = if first.ends_with(".l") || first.ends_with(".ll") {
      "LEX"
    } else if first.ends_with(".y") || first.ends_with(".yy") {
      "YACC"
    } else {
      return Err(BuildError::UnknownSourceType {
        builder: self.name().to_string(),
        path: first.to_string(),
      });
    };

    let vars = with_build_vars(vars, [("_TARGET", target.into()), ("_SOURCES", sources.to_vec().into())]);
    let command = exec.build_command(&format!("${{{tool}_CMD}}"), &vars)?;
    standard_build(&format!("{tool} {target}"), target, command, sources, exec, cache)
  }
}
