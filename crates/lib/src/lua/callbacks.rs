//! Builders and build hooks implemented by Lua functions.
//!
//! Both run while the environment is being processed, so the Lua side only
//! ever sees tables scoped to a single call: a builder context with
//! `get`, `expand`, `execute`, `standard_build` and `build_sources`, or a
//! build operation with `get`, `set`, `extend` and `declare`. The tables
//! are invalid once the call returns.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use mlua::prelude::*;

use super::convert::{expansion_to_lua, lua_to_strings, lua_to_var, strip_self, table_to_map, var_to_lua};
use crate::builder::builders::FnBuilder;
use crate::builder::{BuildError, ExecOptions, Executor, standard_build};
use crate::cache::BuildCache;
use crate::env::{BuildHook, BuildOperation, TargetSpec};
use crate::vars::{EvalContext, VarStore};

const UNLOADED: &str = "build script is no longer loaded";

fn locked<'m, T>(mutex: &'m Mutex<T>) -> MutexGuard<'m, T> {
  mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// A builder named `name` that calls `func(target, sources, ctx)`.
///
/// The function may return the produced path(s); `nil` means the target
/// itself.
pub fn lua_builder(lua: &Lua, name: String, func: LuaFunction) -> FnBuilder {
  let weak = lua.weak();
  FnBuilder::new(name, move |target, sources, cache, exec, vars| {
    let lua = weak.try_upgrade().ok_or_else(|| BuildError::Failed(UNLOADED.to_string()))?;
    call_builder(&lua, &func, target, sources, cache, exec, vars).map_err(|e| BuildError::Failed(e.to_string()))
  })
}

fn call_builder(
  lua: &Lua,
  func: &LuaFunction,
  target: &str,
  sources: &[String],
  cache: &mut BuildCache,
  exec: &Executor<'_>,
  vars: &VarStore,
) -> LuaResult<Vec<String>> {
  let cache = Mutex::new(cache);
  let ctx = EvalContext::new(exec.scope(), vars);

  let produced = lua.scope(|scope| {
    let table = lua.create_table()?;
    table.set("target", target)?;
    table.set("sources", lua.create_sequence_from(sources.iter().cloned())?)?;

    table.set(
      "get",
      scope.create_function(|lua, args: LuaMultiValue| {
        let name: String = lua.unpack_multi(strip_self(args))?;
        match vars.get(&name) {
          Some(value) => var_to_lua(lua, value, &ctx),
          None => Ok(LuaValue::Nil),
        }
      })?,
    )?;

    table.set(
      "expand",
      scope.create_function(|lua, args: LuaMultiValue| {
        let template: String = lua.unpack_multi(strip_self(args))?;
        let expansion = exec.expand(&template, vars).map_err(LuaError::external)?;
        expansion_to_lua(lua, expansion)
      })?,
    )?;

    table.set(
      "execute",
      scope.create_function(|lua, args: LuaMultiValue| {
        let (label, argv): (String, LuaValue) = lua.unpack_multi(strip_self(args))?;
        let argv = lua_to_strings(argv)?;
        exec
          .execute(&label, &argv, &ExecOptions::default())
          .map_err(LuaError::external)
      })?,
    )?;

    table.set(
      "standard_build",
      scope.create_function(|lua, args: LuaMultiValue| {
        let (label, command): (String, LuaValue) = lua.unpack_multi(strip_self(args))?;
        let command = lua_to_strings(command)?;
        let mut cache = locked(&cache);
        standard_build(&label, target, command, sources, exec, &mut **cache).map_err(LuaError::external)?;
        Ok(())
      })?,
    )?;

    table.set(
      "build_sources",
      scope.create_function(|lua, mut args: LuaMultiValue| {
        // The inputs are a table themselves, so only a third argument means a method call.
        if args.len() > 2 {
          args.pop_front();
        }
        let (inputs, suffixes): (LuaValue, LuaValue) = lua.unpack_multi(args)?;
        let inputs = lua_to_strings(inputs)?;
        let suffixes = lua_to_strings(suffixes)?;
        let mut cache = locked(&cache);
        let built = exec
          .build_sources(&inputs, &suffixes, &mut **cache, vars)
          .map_err(LuaError::external)?;
        lua.create_sequence_from(built)
      })?,
    )?;

    func.call::<LuaValue>((target, lua.create_sequence_from(sources.iter().cloned())?, table))
  })?;

  match produced {
    LuaValue::Nil => Ok(vec![target.to_string()]),
    other => lua_to_strings(other),
  }
}

/// A build hook that calls `func(op)`.
pub fn lua_hook(lua: &Lua, func: LuaFunction) -> BuildHook {
  let weak = lua.weak();
  Arc::new(move |op: &mut BuildOperation| -> Result<(), BuildError> {
    let lua = weak.try_upgrade().ok_or_else(|| BuildError::Hook(UNLOADED.to_string()))?;
    call_hook(&lua, &func, op).map_err(|e| BuildError::Hook(e.to_string()))
  })
}

fn call_hook(lua: &Lua, func: &LuaFunction, op: &mut BuildOperation) -> LuaResult<()> {
  let table = lua.create_table()?;
  table.set("target", op.target.as_str())?;
  table.set("builder", op.builder.as_str())?;
  table.set("sources", lua.create_sequence_from(op.sources.iter().cloned())?)?;

  let op = Mutex::new(op);
  lua.scope(|scope| {
    table.set(
      "get",
      scope.create_function(|lua, args: LuaMultiValue| {
        let name: String = lua.unpack_multi(strip_self(args))?;
        // Deferred values may call back into this table.
        let vars = locked(&op).vars.clone();
        match vars.get(&name) {
          Some(value) => var_to_lua(lua, value, &EvalContext::of(&vars)),
          None => Ok(LuaValue::Nil),
        }
      })?,
    )?;

    table.set(
      "set",
      scope.create_function(|lua, args: LuaMultiValue| {
        let (name, value): (String, LuaValue) = lua.unpack_multi(strip_self(args))?;
        let value = lua_to_var(lua, value)?;
        locked(&op).vars.set(name, value);
        Ok(())
      })?,
    )?;

    table.set(
      "extend",
      scope.create_function(|lua, args: LuaMultiValue| {
        let (name, values): (String, LuaValue) = lua.unpack_multi(strip_self(args))?;
        let values = lua_to_strings(values)?;
        locked(&op).vars.extend(&name, values).map_err(LuaError::external)
      })?,
    )?;

    table.set(
      "declare",
      scope.create_function(|lua, args: LuaMultiValue| {
        let (builder, target, sources, vars): (String, String, LuaValue, Option<LuaTable>) =
          lua.unpack_multi(strip_self(args))?;
        let mut spec = TargetSpec::new(builder, target.as_str(), lua_to_strings(sources)?);
        if let Some(vars) = vars {
          spec = spec.with_vars(table_to_map(lua, vars)?);
        }
        locked(&op).declare(spec);
        Ok(target)
      })?,
    )?;

    func.call::<()>(table.clone())
  })
}
