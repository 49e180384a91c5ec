//! kiln-lib: Core types and logic for kiln
//!
//! This crate provides the build engine behind the `kiln` CLI:
//! - `vars`: construction variables with layered, copy-on-write scoping
//! - `cache`: the persistent record of what was built and from what
//! - `builder`: the builder contract and the default builder catalog
//! - `env`: environments that resolve, order and build declared targets
//! - `lua` / `eval`: the Lua build-script frontend

pub mod builder;
pub mod cache;
pub mod env;
pub mod eval;
pub mod lua;
pub mod platform;
pub mod util;
pub mod vars;
