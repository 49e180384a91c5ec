//! Path rewriting for generated files.
//!
//! Intermediate files (e.g. objects compiled on behalf of a program) are
//! named after their source with a new suffix, then moved out of the source
//! tree by the first matching build directory rule, or else under the build
//! root when one is configured.
//!
//! Declared target and source names beginning with `^/` are always placed
//! under the build root.

use regex::Regex;

/// How a build directory rule matches a path.
#[derive(Debug, Clone)]
pub enum BuildDirPattern {
  /// A literal directory prefix, stored without trailing slashes.
  Prefix(String),
  /// A regular expression; the replacement may use `$1`-style captures.
  Regex(Regex),
}

#[derive(Debug, Clone)]
pub struct BuildDir {
  pub pattern: BuildDirPattern,
  pub replacement: String,
}

/// Build directory rules plus an optional build root.
#[derive(Debug, Clone, Default)]
pub struct PathRules {
  build_dirs: Vec<BuildDir>,
  build_root: Option<String>,
}

impl PathRules {
  /// Redirect intermediates under `src/` to `dst/`.
  pub fn add_build_dir(&mut self, src: &str, dst: &str) {
    let src = normalize(src).trim_end_matches('/').to_string();
    self.build_dirs.push(BuildDir {
      pattern: BuildDirPattern::Prefix(src),
      replacement: normalize(dst).trim_end_matches('/').to_string(),
    });
  }

  /// Redirect intermediates matching `pattern`, substituting `replacement`.
  pub fn add_build_dir_regex(&mut self, pattern: &str, replacement: &str) -> Result<(), regex::Error> {
    self.build_dirs.push(BuildDir {
      pattern: BuildDirPattern::Regex(Regex::new(pattern)?),
      replacement: replacement.to_string(),
    });
    Ok(())
  }

  pub fn set_build_root(&mut self, root: &str) {
    self.build_root = Some(normalize(root).trim_end_matches('/').to_string());
  }

  pub fn build_root(&self) -> Option<&str> {
    self.build_root.as_deref()
  }

  pub fn build_dirs(&self) -> &[BuildDir] {
    &self.build_dirs
  }

  /// Name of the file produced from `source` with its suffix changed to
  /// `suffix`, after build directory and build root rewriting.
  pub fn build_fname(&self, source: &str, suffix: &str) -> String {
    let fname = normalize(&set_suffix(source, suffix));

    for dir in &self.build_dirs {
      match &dir.pattern {
        BuildDirPattern::Prefix(prefix) => {
          if let Some(rest) = fname.strip_prefix(prefix.as_str())
            && let Some(rest) = rest.strip_prefix('/')
          {
            return format!("{}/{}", dir.replacement, rest);
          }
        }
        BuildDirPattern::Regex(regex) => {
          if regex.is_match(&fname) {
            return regex.replace(&fname, dir.replacement.as_str()).into_owned();
          }
        }
      }
    }

    match &self.build_root {
      Some(root) if !is_absolute(source) && !fname.starts_with(&format!("{root}/")) => format!("{root}/{fname}"),
      _ => fname,
    }
  }

  /// Rewrite a leading `^/` to the build root.
  ///
  /// Without a build root the marker is simply dropped.
  pub fn expand_path(&self, path: &str) -> String {
    let rest = path.strip_prefix("^/").or_else(|| path.strip_prefix("^\\"));
    match (rest, &self.build_root) {
      (Some(rest), Some(root)) => format!("{root}/{rest}"),
      (Some(rest), None) => rest.to_string(),
      (None, _) => path.to_string(),
    }
  }
}

fn normalize(path: &str) -> String {
  path.replace('\\', "/")
}

/// Replace the suffix of the final path component with `suffix`, or append
/// it when there is none.
pub fn set_suffix(path: &str, suffix: &str) -> String {
  let name_start = path.rfind(['/', '\\']).map(|i| i + 1).unwrap_or(0);
  match path[name_start..].rfind('.') {
    Some(dot) if dot > 0 => format!("{}{}", &path[..name_start + dot], suffix),
    _ => format!("{path}{suffix}"),
  }
}

/// Whether `path` ends with any of `suffixes`.
pub fn has_suffix<S: AsRef<str>>(path: &str, suffixes: &[S]) -> bool {
  suffixes.iter().any(|s| !s.as_ref().is_empty() && path.ends_with(s.as_ref()))
}

/// Whether `path` is absolute on either Unix or Windows.
pub fn is_absolute(path: &str) -> bool {
  let bytes = path.as_bytes();
  path.starts_with('/')
    || path.starts_with('\\')
    || (bytes.len() >= 3 && bytes[0].is_ascii_alphabetic() && bytes[1] == b':' && matches!(bytes[2], b'/' | b'\\'))
}
