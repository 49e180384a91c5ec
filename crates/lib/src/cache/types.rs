//! Persisted cache structure and related types.

use std::collections::BTreeMap;
use std::io;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Default cache file name, relative to the working directory.
pub const DEFAULT_CACHE_FILE: &str = ".kiln-cache.json";

/// Format tag written into every cache file.
pub const CACHE_VERSION: &str = env!("CARGO_PKG_VERSION");

/// The identity of the operation that produced a target.
///
/// For external-process builders this is the argument vector; programmatic
/// builders may use any stable token. The cache only compares it for
/// equality.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CommandKey {
  Argv(Vec<String>),
  Token(String),
}

impl CommandKey {
  /// Render for diagnostics.
  pub fn display(&self) -> String {
    match self {
      CommandKey::Argv(argv) => argv.join(" "),
      CommandKey::Token(token) => token.clone(),
    }
  }
}

impl From<Vec<String>> for CommandKey {
  fn from(argv: Vec<String>) -> Self {
    CommandKey::Argv(argv)
  }
}

impl From<&[String]> for CommandKey {
  fn from(argv: &[String]) -> Self {
    CommandKey::Argv(argv.to_vec())
  }
}

impl From<&str> for CommandKey {
  fn from(token: &str) -> Self {
    CommandKey::Token(token.to_string())
  }
}

impl From<String> for CommandKey {
  fn from(token: String) -> Self {
    CommandKey::Token(token)
  }
}

/// A dependency path and its checksum at build time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DepRecord {
  pub path: String,
  pub checksum: String,
}

/// Everything recorded about one built target.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TargetRecord {
  /// Checksum of the target file right after it was built.
  pub checksum: String,
  pub command: CommandKey,
  #[serde(default)]
  pub deps: Vec<DepRecord>,
  #[serde(default)]
  pub user_deps: Vec<DepRecord>,
}

/// The on-disk document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheData {
  #[serde(default)]
  pub version: String,
  #[serde(default)]
  pub targets: BTreeMap<String, TargetRecord>,
  /// Directories created on behalf of builders. Values are always `true`.
  #[serde(default)]
  pub directories: BTreeMap<String, bool>,
}

impl Default for CacheData {
  fn default() -> Self {
    Self {
      version: CACHE_VERSION.to_string(),
      targets: BTreeMap::new(),
      directories: BTreeMap::new(),
    }
  }
}

/// Options for the staleness check.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UpToDateOptions {
  /// Require the dependency list to equal the cached one exactly, order
  /// included, instead of being a subset of it.
  pub strict_deps: bool,
}

/// Supplies the user-declared dependencies of a target.
pub trait DepsProvider {
  fn user_deps_for(&self, target: &str) -> &[String];
}

impl DepsProvider for () {
  fn user_deps_for(&self, _target: &str) -> &[String] {
    &[]
  }
}

impl DepsProvider for BTreeMap<String, Vec<String>> {
  fn user_deps_for(&self, target: &str) -> &[String] {
    self.get(target).map(Vec::as_slice).unwrap_or(&[])
  }
}

/// Errors that can occur while persisting or cleaning the cache.
#[derive(Debug, Error)]
pub enum CacheError {
  #[error("failed to serialize cache: {0}")]
  Serialize(#[source] serde_json::Error),

  #[error("failed to write cache file {path}: {source}")]
  Write {
    path: PathBuf,
    #[source]
    source: io::Error,
  },

  #[error("failed to remove {path}: {source}")]
  Remove {
    path: PathBuf,
    #[source]
    source: io::Error,
  },
}
