//! Value types for construction variables.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use thiserror::Error;

use super::VarStore;

/// A map of variable names to values, as stored in a single layer.
pub type VarMap = BTreeMap<String, VarValue>;

/// Signature of a deferred value's computation.
pub type DeferredFn = dyn Fn(&EvalContext<'_>) -> Result<VarValue, VarError> + Send + Sync;

/// A value computed at expansion time.
///
/// The closure receives the scope that owns the expansion and the merged
/// variables in effect, and may return any other value kind, including a
/// template that is expanded again.
#[derive(Clone)]
pub struct Deferred(Arc<DeferredFn>);

impl Deferred {
  pub fn new<F>(f: F) -> Self
  where
    F: Fn(&EvalContext<'_>) -> Result<VarValue, VarError> + Send + Sync + 'static,
  {
    Self(Arc::new(f))
  }

  pub fn call(&self, ctx: &EvalContext<'_>) -> Result<VarValue, VarError> {
    (self.0)(ctx)
  }
}

impl fmt::Debug for Deferred {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str("Deferred(..)")
  }
}

impl PartialEq for Deferred {
  fn eq(&self, other: &Self) -> bool {
    Arc::ptr_eq(&self.0, &other.0)
  }
}

/// A construction variable value.
#[derive(Debug, Clone, PartialEq)]
pub enum VarValue {
  String(String),
  List(Vec<String>),
  Map(VarMap),
  Deferred(Deferred),
}

impl VarValue {
  /// Returns the scalar string, if this is one.
  pub fn as_str(&self) -> Option<&str> {
    match self {
      VarValue::String(s) => Some(s),
      _ => None,
    }
  }

  pub fn as_list(&self) -> Option<&[String]> {
    match self {
      VarValue::List(items) => Some(items),
      _ => None,
    }
  }

  /// Short kind name used in error messages.
  pub fn kind(&self) -> &'static str {
    match self {
      VarValue::String(_) => "string",
      VarValue::List(_) => "list",
      VarValue::Map(_) => "map",
      VarValue::Deferred(_) => "deferred",
    }
  }
}

impl From<&str> for VarValue {
  fn from(s: &str) -> Self {
    VarValue::String(s.to_string())
  }
}

impl From<String> for VarValue {
  fn from(s: String) -> Self {
    VarValue::String(s)
  }
}

impl From<Vec<String>> for VarValue {
  fn from(items: Vec<String>) -> Self {
    VarValue::List(items)
  }
}

impl From<Vec<&str>> for VarValue {
  fn from(items: Vec<&str>) -> Self {
    VarValue::List(items.into_iter().map(str::to_string).collect())
  }
}

impl<const N: usize> From<[&str; N]> for VarValue {
  fn from(items: [&str; N]) -> Self {
    VarValue::List(items.iter().map(|s| s.to_string()).collect())
  }
}

impl From<VarMap> for VarValue {
  fn from(map: VarMap) -> Self {
    VarValue::Map(map)
  }
}

impl From<Deferred> for VarValue {
  fn from(d: Deferred) -> Self {
    VarValue::Deferred(d)
  }
}

impl From<Expansion> for VarValue {
  fn from(e: Expansion) -> Self {
    match e {
      Expansion::String(s) => VarValue::String(s),
      Expansion::List(items) => VarValue::List(items),
    }
  }
}

/// The result of expanding a template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Expansion {
  String(String),
  List(Vec<String>),
}

impl Expansion {
  /// Flattens the expansion into an argument vector.
  pub fn into_vec(self) -> Vec<String> {
    match self {
      Expansion::String(s) => vec![s],
      Expansion::List(items) => items,
    }
  }

  pub fn as_str(&self) -> Option<&str> {
    match self {
      Expansion::String(s) => Some(s),
      Expansion::List(_) => None,
    }
  }
}

/// What a deferred value sees when it is invoked.
#[derive(Debug, Clone, Copy)]
pub struct EvalContext<'a> {
  /// The variables of the scope performing the expansion.
  pub scope: &'a VarStore,
  /// The merged variables the expansion is resolving against.
  pub vars: &'a VarStore,
}

impl<'a> EvalContext<'a> {
  pub fn new(scope: &'a VarStore, vars: &'a VarStore) -> Self {
    Self { scope, vars }
  }

  /// A context where scope and variables are the same store.
  pub fn of(store: &'a VarStore) -> Self {
    Self {
      scope: store,
      vars: store,
    }
  }
}

/// Errors raised by variable access and expansion.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum VarError {
  /// A variable was required to hold a list but held something else.
  #[error("expected a list for variable '{name}', found {found}")]
  ExpectedList { name: String, found: &'static str },

  /// A placeholder resolved to a nested map.
  #[error("cannot expand variable '{name}': it holds a map")]
  UnexpandableMap { name: String },

  /// A map was passed directly as a template.
  #[error("cannot expand a map template")]
  MapTemplate,

  /// Expansion did not terminate, usually a variable referencing itself.
  #[error("expansion of '{name}' exceeded depth {limit}; does it reference itself?")]
  RecursionLimit { name: String, limit: usize },

  /// A deferred value failed.
  #[error("deferred value failed: {0}")]
  Deferred(String),
}
