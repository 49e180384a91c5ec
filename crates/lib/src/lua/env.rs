//! Lua bindings for environments.
//!
//! `kiln.env{...}` returns an [`LuaEnv`] userdata. Every environment a
//! script creates, including clones, is recorded in the [`EnvRegistry`] so
//! the caller can process whatever the script left pending.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError, TryLockError};

use mlua::prelude::*;
use tracing::debug;

use super::callbacks::{lua_builder, lua_hook};
use super::convert::{expansion_to_lua, lua_to_strings, lua_to_var, table_to_map, var_to_lua};
use crate::env::{CloneOptions, EchoMode, EnvOptions, Environment, ExcludeBuilders, TargetSpec};
use crate::vars::{EvalContext, VarMap};

/// An environment shared between the script and its caller.
pub type SharedEnv = Arc<Mutex<Environment>>;

/// Lock an environment, recovering from a poisoned lock.
pub fn lock_env(env: &SharedEnv) -> MutexGuard<'_, Environment> {
  env.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Every environment created by a script, in creation order.
#[derive(Clone, Default)]
pub struct EnvRegistry {
  envs: Arc<Mutex<Vec<SharedEnv>>>,
  defaults: EnvOptions,
}

impl EnvRegistry {
  /// A registry whose environments start from `defaults`.
  pub fn new(defaults: EnvOptions) -> Self {
    Self {
      envs: Arc::default(),
      defaults,
    }
  }

  pub fn defaults(&self) -> &EnvOptions {
    &self.defaults
  }

  fn register(&self, env: Environment) -> SharedEnv {
    let shared = Arc::new(Mutex::new(env));
    let mut envs = self.envs.lock().unwrap_or_else(PoisonError::into_inner);
    envs.push(shared.clone());
    debug!(count = envs.len(), "environment created");
    shared
  }

  pub fn environments(&self) -> Vec<SharedEnv> {
    self.envs.lock().unwrap_or_else(PoisonError::into_inner).clone()
  }
}

/// Parse the `options` table of `kiln.env{}` over `options`.
fn parse_options(value: LuaValue, options: &mut EnvOptions) -> LuaResult<()> {
  let LuaValue::Table(table) = value else {
    return Err(LuaError::external("env options must be a table"));
  };
  if let Some(echo) = table.get::<Option<String>>("echo")? {
    options.echo = echo.parse::<EchoMode>().map_err(LuaError::external)?;
  }
  match table.get::<LuaValue>("exclude_builders")? {
    LuaValue::Nil | LuaValue::Boolean(false) => {}
    LuaValue::Boolean(true) => options.exclude_builders = ExcludeBuilders::All,
    other => options.exclude_builders = ExcludeBuilders::Named(lua_to_strings(other)?),
  }
  if let Some(cache_file) = table.get::<Option<String>>("cache_file")? {
    options.cache_file = cache_file.into();
  }
  Ok(())
}

/// Create an environment from the table passed to `kiln.env{}`.
pub(crate) fn create_env(lua: &Lua, registry: &EnvRegistry, spec: Option<LuaTable>) -> LuaResult<LuaEnv> {
  let mut options = registry.defaults.clone();
  let mut vars = VarMap::new();
  if let Some(spec) = spec {
    for pair in spec.pairs::<String, LuaValue>() {
      let (key, value) = pair?;
      if key == "options" {
        parse_options(value, &mut options)?;
      } else {
        vars.insert(key, lua_to_var(lua, value)?);
      }
    }
  }
  let env = Environment::with_vars(vars, options);
  Ok(LuaEnv {
    env: registry.register(env),
    registry: registry.clone(),
  })
}

/// The Lua handle of an environment.
#[derive(Clone)]
pub struct LuaEnv {
  env: SharedEnv,
  registry: EnvRegistry,
}

impl LuaEnv {
  /// Run `f` on the environment.
  ///
  /// Fails instead of deadlocking when the environment is already locked,
  /// i.e. when a builder or hook calls back into the environment that is
  /// processing it.
  fn with<R>(&self, f: impl FnOnce(&mut Environment) -> LuaResult<R>) -> LuaResult<R> {
    let mut env = match self.env.try_lock() {
      Ok(env) => env,
      Err(TryLockError::Poisoned(poisoned)) => poisoned.into_inner(),
      Err(TryLockError::WouldBlock) => {
        return Err(LuaError::external(
          "environment is busy processing; use the context passed to builders and hooks instead",
        ));
      }
    };
    f(&mut env)
  }
}

impl LuaUserData for LuaEnv {
  fn add_methods<M: LuaUserDataMethods<Self>>(methods: &mut M) {
    methods.add_method("get", |lua, this, name: String| {
      this.with(|env| match env.get(&name) {
        Some(value) => var_to_lua(lua, value, &EvalContext::of(env.vars())),
        None => Ok(LuaValue::Nil),
      })
    });

    methods.add_method("set", |lua, this, (name, value): (String, LuaValue)| {
      let value = lua_to_var(lua, value)?;
      this.with(|env| {
        env.set(name, value);
        Ok(())
      })
    });

    methods.add_method("append", |lua, this, values: LuaTable| {
      let values = table_to_map(lua, values)?;
      this.with(|env| {
        env.vars_mut().append(values);
        Ok(())
      })
    });

    methods.add_method("extend", |_, this, (name, values): (String, LuaValue)| {
      let values = lua_to_strings(values)?;
      this.with(|env| env.vars_mut().extend(&name, values).map_err(LuaError::external))
    });

    methods.add_method("expand", |lua, this, template: String| {
      let expansion = this.with(|env| env.expand(&template).map_err(LuaError::external))?;
      expansion_to_lua(lua, expansion)
    });

    methods.add_method("clone", |lua, this, options: Option<LuaTable>| {
      let mut clone_options = CloneOptions::default();
      if let Some(options) = options {
        if options.get::<Option<bool>>("all")?.unwrap_or(false) {
          clone_options = CloneOptions::all();
        }
        for (key, flag) in [
          ("builders", &mut clone_options.builders),
          ("build_root", &mut clone_options.build_root),
          ("build_hooks", &mut clone_options.build_hooks),
        ] {
          if let Some(value) = options.get::<Option<bool>>(key)? {
            *flag = value;
          }
        }
        if let Some(vars) = options.get::<Option<LuaTable>>("vars")? {
          clone_options.vars = table_to_map(lua, vars)?;
        }
      }
      let cloned = this.with(|env| Ok(env.clone_env(clone_options)))?;
      Ok(LuaEnv {
        env: this.registry.register(cloned),
        registry: this.registry.clone(),
      })
    });

    methods.add_method("build_dir", |_, this, (src, dst): (String, String)| {
      this.with(|env| {
        env.build_dir(&src, &dst);
        Ok(())
      })
    });

    methods.add_method("build_dir_regex", |_, this, (pattern, replacement): (String, String)| {
      this.with(|env| env.build_dir_regex(&pattern, &replacement).map_err(LuaError::external))
    });

    methods.add_method("build_root", |_, this, root: String| {
      this.with(|env| {
        env.build_root(&root);
        Ok(())
      })
    });

    methods.add_method("build_fname", |_, this, (source, suffix): (String, String)| {
      this.with(|env| Ok(env.build_fname(&source, &suffix)))
    });

    methods.add_method("add_builder", |lua, this, (name, func): (String, LuaFunction)| {
      let builder = Arc::new(lua_builder(lua, name, func));
      this.with(|env| {
        env.add_builder(builder);
        Ok(())
      })
    });

    methods.add_method(
      "target",
      |lua, this, (builder, target, sources, vars): (String, String, LuaValue, Option<LuaTable>)| {
        let mut spec = TargetSpec::new(builder, target.as_str(), lua_to_strings(sources)?);
        if let Some(vars) = vars {
          spec = spec.with_vars(table_to_map(lua, vars)?);
        }
        this.with(|env| env.declare_target(spec).map_err(LuaError::external))?;
        Ok(target)
      },
    );

    methods.add_method("depends", |_, this, (target, paths): (String, LuaVariadic<LuaValue>)| {
      let mut deps = Vec::new();
      for path in paths {
        deps.extend(lua_to_strings(path)?);
      }
      this.with(|env| env.depends(&target, deps).map_err(LuaError::external))
    });

    methods.add_method("add_build_hook", |lua, this, func: LuaFunction| {
      let hook = lua_hook(lua, func);
      this.with(|env| {
        env.add_build_hook(hook);
        Ok(())
      })
    });

    methods.add_method("add_post_build_hook", |lua, this, func: LuaFunction| {
      let hook = lua_hook(lua, func);
      this.with(|env| {
        env.add_post_build_hook(hook);
        Ok(())
      })
    });

    methods.add_method("process", |lua, this, ()| {
      let summary = this.with(|env| env.process().map_err(LuaError::external))?;
      let table = lua.create_table()?;
      table.set("targets_built", summary.targets_built)?;
      table.set("commands_run", summary.commands_run)?;
      table.set("passes", summary.passes)?;
      Ok(table)
    });

    methods.add_method("clear_targets", |_, this, ()| {
      this.with(|env| {
        env.clear_targets();
        Ok(())
      })
    });
  }
}
