//! Construction variables.
//!
//! A [`VarStore`] is a stack of immutable layers plus one mutable layer.
//! Reads search the mutable layer first, then the immutable layers from
//! newest to oldest. Deriving a store (via [`VarStore::merge`] or `Clone`)
//! shares the immutable layers and copies only the mutable one, so a derived
//! store can be mutated freely without touching the store it came from.
//!
//! Mutation of a value that lives in an immutable layer goes through
//! [`VarStore::get_mut`], which first copies the value into the mutable
//! layer (copy-on-access). Lists and nested maps are deep-copied, so edits
//! never leak across stores at any depth of derivation.

mod expand;
mod types;

use std::collections::BTreeSet;
use std::sync::Arc;

pub use expand::MAX_DEPTH;
pub use types::{Deferred, DeferredFn, EvalContext, Expansion, VarError, VarMap, VarValue};

/// A layered, copy-on-write map of construction variables.
#[derive(Debug, Clone, Default)]
pub struct VarStore {
  /// Immutable layers, oldest first.
  layers: Vec<Arc<VarMap>>,
  /// The mutable top layer.
  vars: VarMap,
}

impl VarStore {
  pub fn new() -> Self {
    Self::default()
  }

  /// Look up a variable without materializing a copy.
  pub fn get(&self, name: &str) -> Option<&VarValue> {
    if let Some(value) = self.vars.get(name) {
      return Some(value);
    }
    self.layers.iter().rev().find_map(|layer| layer.get(name))
  }

  /// Look up a variable for mutation.
  ///
  /// A value found in an immutable layer is copied into the mutable layer
  /// first, so the mutation is visible only through this store.
  pub fn get_mut(&mut self, name: &str) -> Option<&mut VarValue> {
    if !self.vars.contains_key(name) {
      let inherited = self.layers.iter().rev().find_map(|layer| layer.get(name))?.clone();
      self.vars.insert(name.to_string(), inherited);
    }
    self.vars.get_mut(name)
  }

  /// Set a variable in the mutable layer.
  pub fn set(&mut self, name: impl Into<String>, value: impl Into<VarValue>) {
    self.vars.insert(name.into(), value.into());
  }

  /// Whether any layer defines `name`.
  pub fn has(&self, name: &str) -> bool {
    self.vars.contains_key(name) || self.layers.iter().any(|layer| layer.contains_key(name))
  }

  /// All variable names visible through this store, sorted.
  pub fn keys(&self) -> BTreeSet<&str> {
    self
      .layers
      .iter()
      .flat_map(|layer| layer.keys())
      .chain(self.vars.keys())
      .map(String::as_str)
      .collect()
  }

  /// Strict list accessor.
  ///
  /// Returns an empty slice for an absent variable and
  /// [`VarError::ExpectedList`] for any non-list value.
  pub fn list(&self, name: &str) -> Result<&[String], VarError> {
    match self.get(name) {
      None => Ok(&[]),
      Some(VarValue::List(items)) => Ok(items),
      Some(other) => Err(VarError::ExpectedList {
        name: name.to_string(),
        found: other.kind(),
      }),
    }
  }

  /// Append values to a list variable.
  ///
  /// An absent variable becomes a list; a scalar is promoted to a one-element
  /// list first.
  pub fn extend<I, S>(&mut self, name: &str, values: I) -> Result<(), VarError>
  where
    I: IntoIterator<Item = S>,
    S: Into<String>,
  {
    let values = values.into_iter().map(Into::into);
    let Some(slot) = self.get_mut(name) else {
      self.vars.insert(name.to_string(), VarValue::List(values.collect()));
      return Ok(());
    };
    match slot {
      VarValue::List(items) => items.extend(values),
      VarValue::String(s) => {
        let first = std::mem::take(s);
        *slot = VarValue::List(std::iter::once(first).chain(values).collect());
      }
      other => {
        return Err(VarError::ExpectedList {
          name: name.to_string(),
          found: other.kind(),
        });
      }
    }
    Ok(())
  }

  /// Push the mutable layer onto the immutable stack.
  ///
  /// Anything that captured the previous contents (e.g. a clone) keeps
  /// seeing them unchanged regardless of later writes through this store.
  pub fn freeze(&mut self) {
    if !self.vars.is_empty() {
      let top = std::mem::take(&mut self.vars);
      self.layers.push(Arc::new(top));
    }
  }

  /// Fold `values` into this store, overriding on key collision.
  ///
  /// The current mutable layer is frozen first. When `values` is another
  /// store, its immutable history is layered above ours and its mutable
  /// layer becomes ours.
  pub fn append(&mut self, values: impl Into<VarStore>) -> &mut Self {
    let values = values.into();
    self.freeze();
    self.layers.extend(values.layers);
    self.vars = values.vars;
    self
  }

  /// A new store that shares this one's history with `values` on top.
  pub fn merge(&self, values: impl Into<VarStore>) -> VarStore {
    let mut merged = self.clone();
    merged.append(values);
    merged
  }

  /// Number of immutable layers.
  pub fn depth(&self) -> usize {
    self.layers.len()
  }
}

impl From<VarMap> for VarStore {
  fn from(vars: VarMap) -> Self {
    Self {
      layers: Vec::new(),
      vars,
    }
  }
}

impl<K, V> FromIterator<(K, V)> for VarStore
where
  K: Into<String>,
  V: Into<VarValue>,
{
  fn from_iter<T: IntoIterator<Item = (K, V)>>(iter: T) -> Self {
    let vars: VarMap = iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect();
    Self::from(vars)
  }
}
