//! The `kiln` global table.
//!
//! - `kiln.env{...}` - Create an environment
//! - `kiln.path` - Path manipulation utilities
//! - `kiln.files(dir, suffixes...)` - List files under a directory
//! - `kiln.dir` - Directory of the script being evaluated (set by the loader)

use std::path::Path;

use mlua::prelude::*;
use walkdir::WalkDir;

use super::env::{EnvRegistry, create_env};
use super::helpers;
use crate::env::paths::has_suffix;

/// Register the `kiln` global table in the Lua runtime.
pub fn register_globals(lua: &Lua, registry: EnvRegistry) -> LuaResult<()> {
  let kiln = lua.create_table()?;

  kiln.set(
    "env",
    lua.create_function(move |lua, spec: Option<LuaTable>| create_env(lua, &registry, spec))?,
  )?;

  kiln.set("path", helpers::path::create_path_helpers(lua)?)?;

  kiln.set(
    "files",
    lua.create_function(|_, (dir, suffixes): (String, LuaVariadic<String>)| list_files(&dir, &suffixes))?,
  )?;

  lua.globals().set("kiln", kiln)?;
  Ok(())
}

/// Files under `dir` ending with any of `suffixes` (all files when none are
/// given), sorted.
fn list_files(dir: &str, suffixes: &[String]) -> LuaResult<Vec<String>> {
  let mut files = Vec::new();
  for entry in WalkDir::new(dir).sort_by_file_name() {
    let entry = entry.map_err(|e| LuaError::external(format!("cannot list '{dir}': {e}")))?;
    if !entry.file_type().is_file() {
      continue;
    }
    let path = entry.path().to_string_lossy().replace('\\', "/");
    if suffixes.is_empty() || has_suffix(&path, suffixes) {
      files.push(path);
    }
  }
  files.sort();
  Ok(files)
}

/// Directory containing `script`, for `kiln.dir`.
pub(crate) fn script_dir(script: &Path) -> String {
  script
    .parent()
    .map(|p| p.to_string_lossy().into_owned())
    .unwrap_or_default()
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::util::testutil::Scratch;

  fn create_test_lua() -> LuaResult<Lua> {
    let lua = Lua::new();
    register_globals(&lua, EnvRegistry::default())?;
    Ok(lua)
  }

  mod kiln_table {
    use super::*;

    #[test]
    fn kiln_global_exists() -> LuaResult<()> {
      let lua = create_test_lua()?;
      let kiln: LuaTable = lua.globals().get("kiln")?;
      assert!(kiln.contains_key("env")?);
      assert!(kiln.contains_key("path")?);
      assert!(kiln.contains_key("files")?);
      Ok(())
    }

    #[test]
    fn files_filters_and_sorts() -> LuaResult<()> {
      let scratch = Scratch::new();
      scratch.write("src/b.c", "");
      scratch.write("src/a.c", "");
      scratch.write("src/sub/c.cc", "");
      scratch.write("src/notes.txt", "");
      let lua = create_test_lua()?;
      lua.globals().set("root", scratch.path("src"))?;

      let files: Vec<String> = lua.load(r#"return kiln.files(root, ".c", ".cc")"#).eval()?;
      let names: Vec<_> = files.iter().map(|f| f.rsplit('/').next().unwrap_or_default()).collect();
      assert_eq!(names, vec!["a.c", "b.c", "c.cc"]);

      let all: Vec<String> = lua.load("return kiln.files(root)").eval()?;
      assert_eq!(all.len(), 4);
      Ok(())
    }

    #[test]
    fn files_reports_missing_directory() -> LuaResult<()> {
      let lua = create_test_lua()?;
      let result: LuaResult<Vec<String>> = lua.load(r#"return kiln.files("/definitely/not/here")"#).eval();
      assert!(result.is_err());
      Ok(())
    }
  }

  mod path_helpers {
    use super::*;

    #[test]
    fn join_uses_forward_slashes() -> LuaResult<()> {
      let lua = create_test_lua()?;
      let result: String = lua.load(r#"return kiln.path.join("build", "obj/", "main.o")"#).eval()?;
      assert_eq!(result, "build/obj/main.o");
      let result: String = lua.load(r#"return kiln.path.join("build", "/abs/x.o")"#).eval()?;
      assert_eq!(result, "/abs/x.o");
      Ok(())
    }

    #[test]
    fn dirname_and_basename() -> LuaResult<()> {
      let lua = create_test_lua()?;
      let dir: String = lua.load(r#"return kiln.path.dirname("src/io/file.c")"#).eval()?;
      let base: String = lua.load(r#"return kiln.path.basename("src/io/file.c")"#).eval()?;
      assert_eq!(dir, "src/io");
      assert_eq!(base, "file.c");
      Ok(())
    }

    #[test]
    fn extname_and_set_suffix() -> LuaResult<()> {
      let lua = create_test_lua()?;
      let ext: String = lua.load(r#"return kiln.path.extname("src/main.cc")"#).eval()?;
      assert_eq!(ext, ".cc");
      let none: String = lua.load(r#"return kiln.path.extname("Makefile")"#).eval()?;
      assert_eq!(none, "");
      let obj: String = lua.load(r#"return kiln.path.set_suffix("src/main.cc", ".o")"#).eval()?;
      assert_eq!(obj, "src/main.o");
      Ok(())
    }
  }
}
