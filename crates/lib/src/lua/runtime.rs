use std::path::Path;

use mlua::prelude::*;

use crate::lua::env::EnvRegistry;
use crate::lua::globals;

/// Create a new Lua runtime with the `kiln` global registered.
///
/// Environments created by scripts run in this runtime are recorded in
/// `registry`.
pub fn create_runtime(registry: EnvRegistry) -> LuaResult<Lua> {
  let lua = Lua::new();
  globals::register_globals(&lua, registry)?;
  Ok(lua)
}

/// Load and execute a build script.
///
/// Sets `kiln.dir` to the directory of the script before running it.
pub fn load_file(lua: &Lua, path: &Path) -> LuaResult<LuaValue> {
  let content = std::fs::read_to_string(path)
    .map_err(|e| LuaError::external(format!("cannot read '{}': {}", path.display(), e)))?;

  let kiln = lua.globals().get::<LuaTable>("kiln")?;
  kiln.set("dir", globals::script_dir(path))?;

  lua
    .load(&content)
    .set_name(format!("@{}", path.display()))
    .eval::<LuaValue>()
}
