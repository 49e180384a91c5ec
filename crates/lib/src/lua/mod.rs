//! Lua build-script frontend.
//!
//! Build descriptions are Lua scripts. They create environments with
//! `kiln.env{}`, declare targets against them, and may define builders,
//! hooks and deferred variables as Lua functions.
//!
//! # Submodules
//!
//! - [`callbacks`] - Builders and hooks backed by Lua functions
//! - [`convert`] - Lua values to and from construction variables
//! - [`env`] - The environment userdata and the registry of environments
//! - [`globals`] - The `kiln` global table
//! - [`helpers`] - Lua helper modules exposed to scripts
//! - [`runtime`] - Lua VM creation and script loading

pub mod callbacks;
pub mod convert;
pub mod env;
pub mod globals;
pub mod helpers;
pub mod runtime;
