//! Conversions between Lua values and construction variables.
//!
//! - strings and numbers become scalars
//! - sequences become lists (nested sequences are flattened)
//! - tables with string keys become maps
//! - functions become deferred values, called at expansion time with a
//!   context table offering `get` and `expand`

use mlua::prelude::*;

use crate::vars::{Deferred, EvalContext, Expansion, VarError, VarMap, VarValue};

/// Drop a leading table argument, so functions stored in a context table
/// can be called both as `ctx.get(name)` and `ctx:get(name)`.
pub(crate) fn strip_self(mut args: LuaMultiValue) -> LuaMultiValue {
  if matches!(args.front(), Some(LuaValue::Table(_))) {
    args.pop_front();
  }
  args
}

fn scalar(value: &LuaValue) -> LuaResult<Option<String>> {
  Ok(match value {
    LuaValue::String(s) => Some(s.to_str()?.to_string()),
    LuaValue::Integer(i) => Some(i.to_string()),
    LuaValue::Number(n) => Some(n.to_string()),
    LuaValue::Boolean(b) => Some(b.to_string()),
    _ => None,
  })
}

/// Flatten a string, number or (nested) sequence into strings. `nil` is
/// an empty list.
pub fn lua_to_strings(value: LuaValue) -> LuaResult<Vec<String>> {
  if let Some(s) = scalar(&value)? {
    return Ok(vec![s]);
  }
  match value {
    LuaValue::Nil => Ok(Vec::new()),
    LuaValue::Table(table) => {
      let mut out = Vec::new();
      for item in table.sequence_values::<LuaValue>() {
        out.extend(lua_to_strings(item?)?);
      }
      Ok(out)
    }
    other => Err(LuaError::external(format!(
      "expected a string or a list of strings, got {}",
      other.type_name()
    ))),
  }
}

/// Convert a Lua value into a variable value.
pub fn lua_to_var(lua: &Lua, value: LuaValue) -> LuaResult<VarValue> {
  if let Some(s) = scalar(&value)? {
    return Ok(VarValue::String(s));
  }
  match value {
    LuaValue::Nil => Ok(VarValue::String(String::new())),
    LuaValue::Table(table) => table_to_var(lua, table),
    LuaValue::Function(func) => Ok(VarValue::Deferred(deferred(lua, func))),
    other => Err(LuaError::external(format!(
      "cannot store a {} in a variable",
      other.type_name()
    ))),
  }
}

fn table_to_var(lua: &Lua, table: LuaTable) -> LuaResult<VarValue> {
  let mut entries = 0;
  for pair in table.pairs::<LuaValue, LuaValue>() {
    pair?;
    entries += 1;
  }
  if entries == table.raw_len() {
    Ok(VarValue::List(lua_to_strings(LuaValue::Table(table))?))
  } else {
    Ok(VarValue::Map(table_to_map(lua, table)?))
  }
}

/// Convert a table with string keys into a variable map.
pub fn table_to_map(lua: &Lua, table: LuaTable) -> LuaResult<VarMap> {
  let mut map = VarMap::new();
  for pair in table.pairs::<String, LuaValue>() {
    let (key, value) = pair?;
    map.insert(key, lua_to_var(lua, value)?);
  }
  Ok(map)
}

/// Convert a variable value into Lua, invoking deferred values.
pub fn var_to_lua(lua: &Lua, value: &VarValue, ctx: &EvalContext<'_>) -> LuaResult<LuaValue> {
  match value {
    VarValue::String(s) => Ok(LuaValue::String(lua.create_string(s)?)),
    VarValue::List(items) => Ok(LuaValue::Table(lua.create_sequence_from(items.iter().cloned())?)),
    VarValue::Map(map) => {
      let table = lua.create_table()?;
      for (key, value) in map {
        table.set(key.as_str(), var_to_lua(lua, value, ctx)?)?;
      }
      Ok(LuaValue::Table(table))
    }
    VarValue::Deferred(deferred) => {
      let computed = deferred.call(ctx).map_err(LuaError::external)?;
      var_to_lua(lua, &computed, ctx)
    }
  }
}

pub fn expansion_to_lua(lua: &Lua, expansion: Expansion) -> LuaResult<LuaValue> {
  match expansion {
    Expansion::String(s) => Ok(LuaValue::String(lua.create_string(&s)?)),
    Expansion::List(items) => Ok(LuaValue::Table(lua.create_sequence_from(items)?)),
  }
}

/// Wrap a Lua function as a deferred value.
///
/// The function is called with a context table and returns the value to
/// expand in its place.
pub fn deferred(lua: &Lua, func: LuaFunction) -> Deferred {
  let weak = lua.weak();
  Deferred::new(move |ctx| {
    let lua = weak
      .try_upgrade()
      .ok_or_else(|| VarError::Deferred("build script is no longer loaded".to_string()))?;
    call_deferred(&lua, &func, ctx).map_err(|e| VarError::Deferred(e.to_string()))
  })
}

fn call_deferred(lua: &Lua, func: &LuaFunction, ctx: &EvalContext<'_>) -> LuaResult<VarValue> {
  let result = lua.scope(|scope| {
    let table = lua.create_table()?;
    table.set(
      "get",
      scope.create_function(|lua, args: LuaMultiValue| {
        let name: String = lua.unpack_multi(strip_self(args))?;
        match ctx.vars.get(&name).or_else(|| ctx.scope.get(&name)) {
          Some(value) => var_to_lua(lua, value, ctx),
          None => Ok(LuaValue::Nil),
        }
      })?,
    )?;
    table.set(
      "expand",
      scope.create_function(|lua, args: LuaMultiValue| {
        let template: String = lua.unpack_multi(strip_self(args))?;
        let expansion = ctx.vars.expand_str(&template, ctx).map_err(LuaError::external)?;
        expansion_to_lua(lua, expansion)
      })?,
    )?;
    func.call::<LuaValue>(table)
  })?;
  lua_to_var(lua, result)
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::vars::VarStore;

  mod to_var {
    use super::*;

    #[test]
    fn scalars_and_lists() -> LuaResult<()> {
      let lua = Lua::new();
      assert_eq!(lua_to_var(&lua, lua.load(r#"return "gcc""#).eval()?)?, VarValue::from("gcc"));
      assert_eq!(lua_to_var(&lua, lua.load("return 3").eval()?)?, VarValue::from("3"));
      assert_eq!(
        lua_to_var(&lua, lua.load(r#"return {"-O2", {"-g", "-Wall"}}"#).eval()?)?,
        VarValue::from(vec!["-O2", "-g", "-Wall"])
      );
      assert_eq!(lua_to_var(&lua, lua.load("return {}").eval()?)?, VarValue::List(vec![]));
      Ok(())
    }

    #[test]
    fn keyed_tables_become_maps() -> LuaResult<()> {
      let lua = Lua::new();
      let value = lua_to_var(&lua, lua.load(r#"return {debug = {"-g"}, name = "x"}"#).eval()?)?;
      let VarValue::Map(map) = value else {
        panic!("expected a map, got {value:?}");
      };
      assert_eq!(map["debug"], VarValue::from(vec!["-g"]));
      assert_eq!(map["name"], VarValue::from("x"));
      Ok(())
    }

    #[test]
    fn userdata_is_rejected() -> LuaResult<()> {
      let lua = Lua::new();
      let value = LuaValue::LightUserData(LuaLightUserData(std::ptr::null_mut()));
      assert!(lua_to_var(&lua, value).is_err());
      Ok(())
    }
  }

  mod deferred_values {
    use super::*;

    #[test]
    fn function_reads_variables_through_context() -> LuaResult<()> {
      let lua = Lua::new();
      let func: LuaFunction = lua.load(r#"return function(ctx) return ctx:get("CC") .. "-14" end"#).eval()?;
      let mut store = VarStore::new();
      store.set("CC", "gcc");
      store.set("TOOL", deferred(&lua, func));
      let expanded = store.expand_str("${TOOL}", &EvalContext::of(&store)).unwrap();
      assert_eq!(expanded, Expansion::String("gcc-14".into()));
      Ok(())
    }

    #[test]
    fn function_can_return_a_template() -> LuaResult<()> {
      let lua = Lua::new();
      let func: LuaFunction = lua.load(r#"return function(ctx) return {"-I${ROOT}/a", "-I${ROOT}/b"} end"#).eval()?;
      let mut store = VarStore::new();
      store.set("ROOT", "/src");
      store.set("INCS", deferred(&lua, func));
      let expanded = store.expand_str("${INCS}", &EvalContext::of(&store)).unwrap();
      assert_eq!(expanded, Expansion::List(vec!["-I/src/a".into(), "-I/src/b".into()]));
      Ok(())
    }

    #[test]
    fn lua_errors_surface_as_variable_errors() -> LuaResult<()> {
      let lua = Lua::new();
      let func: LuaFunction = lua.load(r#"return function() error("no compiler") end"#).eval()?;
      let mut store = VarStore::new();
      store.set("CC", deferred(&lua, func));
      let err = store.expand_str("${CC}", &EvalContext::of(&store)).unwrap_err();
      assert!(matches!(err, VarError::Deferred(ref msg) if msg.contains("no compiler")));
      Ok(())
    }
  }

  #[test]
  fn var_to_lua_round_trips_lists() -> LuaResult<()> {
    let lua = Lua::new();
    let store = VarStore::new();
    let value = var_to_lua(&lua, &VarValue::from(vec!["a", "b"]), &EvalContext::of(&store))?;
    let items: Vec<String> = lua.unpack(value)?;
    assert_eq!(items, vec!["a", "b"]);
    Ok(())
  }
}
