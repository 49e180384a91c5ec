//! Template expansion.
//!
//! A placeholder is `${name}`, where `name` is any run of characters other
//! than `}`. Expansion always resolves the right-most placeholder first, then
//! re-scans the substituted text, so placeholders may be nested (`${${KIND}CC}`)
//! and a variable may hold a template referencing other variables.
//!
//! When a placeholder resolves to a list, the surrounding text is repeated
//! once per element. With several list placeholders in one string the result
//! is the Cartesian product, with the right-most list varying slowest:
//!
//! ```
//! use kiln_lib::vars::{EvalContext, Expansion, VarStore};
//!
//! let mut vars = VarStore::new();
//! vars.set("A", ["a1", "a2"]);
//! vars.set("B", ["b1", "b2"]);
//! let out = vars.expand_str("${A}${B}", &EvalContext::of(&vars)).unwrap();
//! assert_eq!(out, Expansion::List(vec![
//!   "a1b1".into(), "a2b1".into(), "a1b2".into(), "a2b2".into(),
//! ]));
//! ```

use tracing::trace;

use super::VarStore;
use super::types::{EvalContext, Expansion, VarError, VarValue};

/// Maximum nesting of placeholder resolution before giving up.
pub const MAX_DEPTH: usize = 64;

/// Byte range of the right-most placeholder in `s` opening before `limit`,
/// from `${` through `}`.
fn last_placeholder_span(s: &str, limit: usize) -> Option<(usize, usize)> {
  let mut end = limit;
  while let Some(start) = s[..end].rfind("${") {
    let name_start = start + 2;
    if let Some(len) = s[name_start..].find('}')
      && len > 0
    {
      return Some((start, name_start + len + 1));
    }
    end = start;
  }
  None
}

/// Splits `s` around its right-most placeholder.
///
/// Returns `(prefix, name, suffix)`, or `None` when `s` holds no placeholder.
pub(crate) fn split_last_placeholder(s: &str) -> Option<(&str, &str, &str)> {
  let (start, end) = last_placeholder_span(s, s.len())?;
  Some((&s[..start], &s[start + 2..end - 1], &s[end..]))
}

impl VarStore {
  /// Expand a template against this store.
  ///
  /// `ctx` is handed to any deferred value met along the way.
  pub fn expand(&self, template: &VarValue, ctx: &EvalContext<'_>) -> Result<Expansion, VarError> {
    self.expand_value(template, ctx, 0)
  }

  /// Expand a string template against this store.
  pub fn expand_str(&self, template: &str, ctx: &EvalContext<'_>) -> Result<Expansion, VarError> {
    self.expand_string(template, ctx, 0)
  }

  /// Expand the named variable, requiring the result to be a list.
  ///
  /// Unlike placeholder resolution, an absent variable is an error here.
  pub fn expand_var_list(&self, name: &str, ctx: &EvalContext<'_>) -> Result<Vec<String>, VarError> {
    let Some(value) = self.get(name) else {
      return Err(VarError::ExpectedList {
        name: name.to_string(),
        found: "nothing",
      });
    };
    match self.expand_value(value, ctx, 0)? {
      Expansion::List(items) => Ok(items),
      Expansion::String(_) => Err(VarError::ExpectedList {
        name: name.to_string(),
        found: "string",
      }),
    }
  }

  fn expand_value(&self, template: &VarValue, ctx: &EvalContext<'_>, depth: usize) -> Result<Expansion, VarError> {
    match template {
      VarValue::String(s) => self.expand_string(s, ctx, depth),
      VarValue::List(items) => {
        let mut out = Vec::with_capacity(items.len());
        for item in items {
          out.extend(self.expand_string(item, ctx, depth)?.into_vec());
        }
        Ok(Expansion::List(out))
      }
      VarValue::Map(_) => Err(VarError::MapTemplate),
      VarValue::Deferred(deferred) => {
        let value = deferred.call(ctx)?;
        self.expand_value(&value, ctx, depth + 1)
      }
    }
  }

  fn expand_string(&self, s: &str, ctx: &EvalContext<'_>, depth: usize) -> Result<Expansion, VarError> {
    // Strings still to scan, last output first, each with the offset after
    // which no placeholder can open.
    let mut pending = vec![(s.to_string(), s.len(), depth)];
    let mut done = Vec::new();
    let mut is_list = false;

    while let Some((mut text, limit, depth)) = pending.pop() {
      let Some((start, end)) = last_placeholder_span(&text, limit) else {
        done.push(text);
        continue;
      };
      let name = &text[start + 2..end - 1];

      if depth >= MAX_DEPTH {
        return Err(VarError::RecursionLimit {
          name: name.to_string(),
          limit: MAX_DEPTH,
        });
      }

      let resolved = match self.get(name) {
        None => {
          trace!(name, "unknown variable expands to empty string");
          Expansion::String(String::new())
        }
        Some(VarValue::Map(_)) => {
          return Err(VarError::UnexpandableMap { name: name.to_string() });
        }
        Some(value) => self.expand_value(value, ctx, depth + 1)?,
      };

      // Substituted text is already fully expanded. Only a leftover "${" can
      // combine with the surrounding text into a new placeholder, so only that
      // case counts towards the depth limit. Unless a "$" at the seam can
      // open one, the text after the substitution needs no further scanning.
      let rescan = |value: &str, text: &str| {
        let seam = start + value.len();
        if value.contains("${") {
          (text.len(), depth + 1)
        } else if text[..seam].ends_with('$') {
          (text.len(), depth)
        } else {
          (seam, depth)
        }
      };

      match resolved {
        Expansion::String(value) => {
          text.replace_range(start..end, &value);
          let (limit, next) = rescan(value.as_str(), text.as_str());
          pending.push((text, limit, next));
        }
        Expansion::List(items) => {
          is_list = true;
          for item in items.iter().rev() {
            let mut element = String::with_capacity(text.len() - (end - start) + item.len());
            element.push_str(&text[..start]);
            element.push_str(item);
            element.push_str(&text[end..]);
            let (limit, next) = rescan(item.as_str(), element.as_str());
            pending.push((element, limit, next));
          }
        }
      }
    }

    if is_list {
      Ok(Expansion::List(done))
    } else {
      Ok(Expansion::String(done.pop().unwrap_or_default()))
    }
  }
}
