use mlua::Lua;
use mlua::prelude::*;

use crate::env::paths::{is_absolute, set_suffix};

/// Create the `kiln.path` table with path manipulation utilities.
///
/// Paths are handled as strings with `/` separators, the form build
/// scripts declare targets in.
pub fn create_path_helpers(lua: &Lua) -> LuaResult<LuaTable> {
  let path = lua.create_table()?;

  // kiln.path.join(...) - Join path segments; an absolute segment restarts the path
  path.set(
    "join",
    lua.create_function(|_, segments: LuaVariadic<String>| {
      let mut result = String::new();
      for segment in segments.iter().filter(|s| !s.is_empty()) {
        if is_absolute(segment) || result.is_empty() {
          result = segment.clone();
        } else {
          result = format!("{}/{}", result.trim_end_matches('/'), segment);
        }
      }
      Ok(result)
    })?,
  )?;

  // kiln.path.dirname(path) - Everything before the last separator
  path.set(
    "dirname",
    lua.create_function(|_, path_str: String| {
      let path = std::path::Path::new(&path_str);
      Ok(
        path
          .parent()
          .map(|p| p.to_string_lossy().into_owned())
          .unwrap_or_default(),
      )
    })?,
  )?;

  // kiln.path.basename(path) - Get file name
  path.set(
    "basename",
    lua.create_function(|_, path_str: String| {
      let path = std::path::Path::new(&path_str);
      Ok(
        path
          .file_name()
          .map(|n| n.to_string_lossy().into_owned())
          .unwrap_or_default(),
      )
    })?,
  )?;

  // kiln.path.extname(path) - Get file extension (including the dot)
  path.set(
    "extname",
    lua.create_function(|_, path_str: String| {
      let path = std::path::Path::new(&path_str);
      Ok(
        path
          .extension()
          .map(|e| format!(".{}", e.to_string_lossy()))
          .unwrap_or_default(),
      )
    })?,
  )?;

  // kiln.path.set_suffix(path, suffix) - Replace or append the extension
  path.set(
    "set_suffix",
    lua.create_function(|_, (path_str, suffix): (String, String)| Ok(set_suffix(&path_str, &suffix)))?,
  )?;

  path.set(
    "is_absolute",
    lua.create_function(|_, path_str: String| Ok(is_absolute(&path_str)))?,
  )?;

  Ok(path)
}
