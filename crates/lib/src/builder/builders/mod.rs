//! Built-in builders.
//!
//! Every environment registers these unless told otherwise. Each reads its
//! tools and flags from construction variables, seeded by
//! [`Builder::default_vars`], so a build script customizes them by setting
//! variables rather than by configuring the builder.
//!
//! Builders see the target and sources through the `_TARGET` and `_SOURCES`
//! variables while their command template is expanded.

mod cfile;
mod command;
mod disassemble;
mod function;
mod library;
mod object;
mod preprocess;
mod program;

use std::sync::Arc;

pub use cfile::CFile;
pub use command::CommandBuilder;
pub use disassemble::Disassemble;
pub use function::{BuildFn, FnBuilder};
pub use library::Library;
pub use object::Object;
pub use preprocess::Preprocess;
pub use program::Program;

use super::{BuildError, Builder, Executor};
use crate::vars::{VarMap, VarStore, VarValue};

/// The builders registered by default, in name order.
pub fn default_builders() -> Vec<Arc<dyn Builder>> {
  vec![
    Arc::new(CFile),
    Arc::new(CommandBuilder),
    Arc::new(Disassemble),
    Arc::new(Library),
    Arc::new(Object),
    Arc::new(Preprocess),
    Arc::new(Program),
  ]
}

fn var_map<const N: usize>(entries: [(&str, VarValue); N]) -> VarMap {
  entries.into_iter().map(|(k, v)| (k.to_string(), v)).collect()
}

/// `vars` with the build-local variables layered on top.
fn with_build_vars<const N: usize>(vars: &VarStore, entries: [(&str, VarValue); N]) -> VarStore {
  vars.merge(var_map(entries))
}

/// Expand each `${NAME}` in `names` and flatten the results.
fn expand_suffixes(exec: &Executor<'_>, vars: &VarStore, names: &[&str]) -> Result<Vec<String>, BuildError> {
  let mut out = Vec::new();
  for name in names {
    out.extend(exec.build_command(&format!("${{{name}}}"), vars)?);
  }
  out.retain(|s| !s.is_empty());
  Ok(out)
}

#[cfg(all(test, unix))]
mod tests {
  use super::*;
  use crate::cache::BuildCache;
  use crate::env::{EchoMode, EnvError, EnvOptions, Environment, TargetSpec};
  use crate::util::testutil::Scratch;

  /// Writes "obj" to the target and a depfile naming the source and `hdr`.
  fn fake_compiler(hdr: &str) -> VarValue {
    VarValue::from(vec![
      "sh",
      "-c",
      r#"echo obj > "$0"; printf '%s: %s %s\n' "$0" "$1" "$2" > "$3""#,
      "${_TARGET}",
      "${_SOURCES}",
      hdr,
      "${_DEPFILE}",
    ])
  }

  /// Concatenates all sources into the target.
  fn concat() -> VarValue {
    VarValue::from(vec!["sh", "-c", r#"cat "$@" > "$0""#, "${_TARGET}", "${_SOURCES}"])
  }

  /// Writes its second argument into the target.
  fn echo_into(value: &str) -> VarValue {
    VarValue::from(vec!["sh", "-c", r#"echo "$1" > "$0""#, "${_TARGET}", value])
  }

  fn env(scratch: &Scratch, vars: Vec<(&str, VarValue)>) -> Environment {
    let vars: VarMap = vars.into_iter().map(|(k, v)| (k.to_string(), v)).collect();
    Environment::with_vars(
      vars,
      EnvOptions {
        echo: EchoMode::Off,
        cache_file: scratch.cache_file(),
        ..EnvOptions::default()
      },
    )
  }

  fn declare(env: &mut Environment, builder: &str, target: &str, sources: &[&String]) {
    let sources = sources.iter().map(|s| s.to_string()).collect();
    env.declare_target(TargetSpec::new(builder, target, sources)).unwrap();
  }

  mod object {
    use super::*;

    #[test]
    fn records_compiler_dependencies() {
      let scratch = Scratch::new();
      let src = scratch.write("main.c", "int main;");
      let hdr = scratch.write("main.h", "#define X");
      let obj = scratch.path("main.o");
      let mut env = env(&scratch, vec![("CCCOM", fake_compiler(&hdr))]);

      declare(&mut env, "Object", &obj, &[&src]);
      assert_eq!(env.process().unwrap().commands_run, 1);
      assert_eq!(scratch.read("main.o"), "obj\n");
      assert!(!scratch.exists("main.mf"));

      let cache = BuildCache::load(scratch.cache_file());
      let deps: Vec<_> = cache.target(&obj).unwrap().deps.iter().map(|d| d.path.clone()).collect();
      assert_eq!(deps, vec![src.clone(), hdr.clone()]);

      declare(&mut env, "Object", &obj, &[&src]);
      assert_eq!(env.process().unwrap().commands_run, 0);

      scratch.write("main.h", "#define Y");
      declare(&mut env, "Object", &obj, &[&src]);
      assert_eq!(env.process().unwrap().commands_run, 1);
    }

    #[test]
    fn unknown_source_is_a_configuration_error() {
      let scratch = Scratch::new();
      let src = scratch.write("notes.txt", "");
      let mut env = env(&scratch, vec![]);
      declare(&mut env, "Object", &scratch.path("notes.o"), &[&src]);
      assert!(matches!(env.process(), Err(EnvError::Config { .. })));
    }
  }

  mod linking {
    use super::*;

    #[test]
    fn program_compiles_sources_and_appends_suffix() {
      let scratch = Scratch::new();
      let src = scratch.write("main.c", "int main;");
      let lib = scratch.write("libx.a", "LIB\n");
      let mut env = env(
        &scratch,
        vec![
          ("CCCOM", fake_compiler("")),
          ("LDCMD", concat()),
          ("PROGSUFFIX", ".exe".into()),
        ],
      );

      declare(&mut env, "Program", &scratch.path("app"), &[&src, &lib]);
      let summary = env.process().unwrap();
      assert_eq!(summary.commands_run, 2);
      assert_eq!(scratch.read("main.o"), "obj\n");
      assert_eq!(scratch.read("app.exe"), "obj\nLIB\n");
    }

    #[test]
    fn program_suffix_carries_user_dependencies() {
      let scratch = Scratch::new();
      let obj = scratch.write("main.o", "obj\n");
      let script = scratch.write("link.ld", "v1");
      let app = scratch.path("app");
      let mut env = env(&scratch, vec![("LDCMD", concat()), ("PROGSUFFIX", ".exe".into())]);
      env.depends(&app, [&script]).unwrap();

      declare(&mut env, "Program", &app, &[&obj]);
      assert_eq!(env.plan().unwrap()[0].target, scratch.path("app.exe"));
      assert_eq!(env.process().unwrap().commands_run, 1);

      declare(&mut env, "Program", &app, &[&obj]);
      assert_eq!(env.process().unwrap().commands_run, 0);

      scratch.write("link.ld", "v2");
      declare(&mut env, "Program", &app, &[&obj]);
      assert_eq!(env.process().unwrap().commands_run, 1);
      assert_eq!(scratch.read("app.exe"), "obj\n");
    }

    #[test]
    fn program_links_cxx_with_cxx_compiler() {
      let scratch = Scratch::new();
      let src = scratch.write("main.cc", "int main;");
      let mut env = env(
        &scratch,
        vec![
          ("CXXCOM", echo_into("obj")),
          ("CXX", "my-cxx".into()),
          ("LDCMD", echo_into("${_LINKER}")),
        ],
      );

      declare(&mut env, "Program", &scratch.path("app.bin"), &[&src]);
      env.process().unwrap();
      assert_eq!(scratch.read("app.bin"), "my-cxx\n");
    }

    #[test]
    fn explicit_linker_wins() {
      let scratch = Scratch::new();
      let obj = scratch.write("main.o", "obj");
      let mut env = env(
        &scratch,
        vec![("LD", "my-ld".into()), ("LDCMD", echo_into("${_LINKER}"))],
      );

      declare(&mut env, "Program", &scratch.path("app.bin"), &[&obj]);
      env.process().unwrap();
      assert_eq!(scratch.read("app.bin"), "my-ld\n");
    }

    #[test]
    fn library_archives_built_and_existing_objects() {
      let scratch = Scratch::new();
      let src = scratch.write("a.c", "int a;");
      let obj = scratch.write("b.o", "B\n");
      let mut env = env(&scratch, vec![("CCCOM", fake_compiler("")), ("ARCMD", concat())]);

      declare(&mut env, "Library", &scratch.path("libab.a"), &[&src, &obj]);
      env.process().unwrap();
      assert_eq!(scratch.read("libab.a"), "obj\nB\n");
    }

    #[test]
    fn unconvertible_source_is_a_configuration_error() {
      let scratch = Scratch::new();
      let src = scratch.write("data.zz", "");
      let mut env = env(&scratch, vec![("ARCMD", concat())]);

      declare(&mut env, "Library", &scratch.path("libz.a"), &[&src]);
      let err = env.process().unwrap_err();
      assert!(err.to_string().contains("data.zz"), "unexpected error: {err}");
      assert!(matches!(err, EnvError::Config { .. }));
    }
  }

  mod others {
    use super::*;

    #[test]
    fn command_string_runs_through_shell() {
      let scratch = Scratch::new();
      let out = scratch.path("out.txt");
      let mut env = env(&scratch, vec![("CMD", "echo hi > ${_TARGET}".into())]);

      declare(&mut env, "Command", &out, &[]);
      env.process().unwrap();
      assert_eq!(scratch.read("out.txt"), "hi\n");
    }

    #[test]
    fn preprocess_uses_cxx_for_cxx_sources() {
      let scratch = Scratch::new();
      let src = scratch.write("a.cc", "");
      let mut env = env(
        &scratch,
        vec![("CXX", "my-cxx".into()), ("CPP_CMD", echo_into("${_PREPROCESS_CC}"))],
      );

      declare(&mut env, "Preprocess", &scratch.path("a.ii"), &[&src]);
      env.process().unwrap();
      assert_eq!(scratch.read("a.ii"), "my-cxx\n");
    }

    #[test]
    fn disassemble_redirects_stdout_into_target() {
      let scratch = Scratch::new();
      let obj = scratch.write("main.o", "obj");
      let mut env = env(&scratch, vec![("DISASM_CMD", vec!["echo", "listing"].into())]);

      declare(&mut env, "Disassemble", &scratch.path("out/main.txt"), &[&obj]);
      env.process().unwrap();
      assert_eq!(scratch.read("out/main.txt"), "listing\n");
    }

    #[test]
    fn cfile_picks_tool_by_grammar_suffix() {
      let scratch = Scratch::new();
      let grammar = scratch.write("parse.y", "%%");
      let mut env = env(&scratch, vec![("YACC_CMD", echo_into("yacc"))]);

      declare(&mut env, "CFile", &scratch.path("parse.c"), &[&grammar]);
      env.process().unwrap();
      assert_eq!(scratch.read("parse.c"), "yacc\n");

      let other = scratch.write("notes.txt", "");
      declare(&mut env, "CFile", &scratch.path("notes.c"), &[&other]);
      assert!(matches!(env.process(), Err(EnvError::Config { .. })));
    }
  }
}
