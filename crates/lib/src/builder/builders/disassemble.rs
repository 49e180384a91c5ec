use std::path::PathBuf;

use super::{BuildError, Builder, Executor, var_map, with_build_vars};
use crate::builder::ExecOptions;
use crate::cache::{BuildCache, CommandKey, UpToDateOptions};
use crate::vars::{VarMap, VarStore};

/// Writes a disassembly listing of an object to the target.
///
/// `${DISASM_CMD}` prints to stdout, which is redirected into the target.
pub struct Disassemble;

impl Builder for Disassemble {
  fn name(&self) -> &str {
    "Disassemble"
  }

  fn default_vars(&self) -> VarMap {
    var_map([
      ("OBJDUMP", "objdump".into()),
      ("DISASM_CMD", ["${OBJDUMP}", "${DISASM_FLAGS}", "${_SOURCES}"].into()),
      ("DISASM_FLAGS", ["--disassemble", "--source"].into()),
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
    let vars = with_build_vars(vars, [("_SOURCES", sources.to_vec().into())]);
    let command = exec.build_command("${DISASM_CMD}", &vars)?;
    let key = CommandKey::Argv(command.clone());
    let targets = [target.to_string()];

    if !cache.is_up_to_date(&targets, &key, sources, exec.user_deps(), UpToDateOptions::default()) {
      if let Some(parent) = std::path::Path::new(target).parent() {
        cache.mkdir_all(parent).map_err(BuildError::io(parent))?;
      }
      let options = ExecOptions {
        stdout_to: Some(PathBuf::from(target)),
        ..ExecOptions::default()
      };
      exec.execute(&format!("Disassemble {target}"), &command, &options)?;
      cache.register_build(&targets, &key, sources, exec.user_deps());
    }

    Ok(targets.to_vec())
  }
}
