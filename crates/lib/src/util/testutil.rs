//! Test utilities for kiln-lib.
//!
//! This module provides helpers for tests that need a scratch workspace on
//! disk or a platform-specific command to run.

use std::path::{Path, PathBuf};

use tempfile::TempDir;

/// A scratch directory with helpers for writing source files.
///
/// All paths handed to the engine in tests are absolute paths inside the
/// temp dir, so tests never depend on the process working directory.
pub struct Scratch {
  pub temp: TempDir,
}

impl Scratch {
  pub fn new() -> Self {
    Self {
      temp: TempDir::new().unwrap(),
    }
  }

  /// Absolute path (as a string) of `relative` inside the scratch dir.
  pub fn path(&self, relative: &str) -> String {
    self.temp.path().join(relative).to_string_lossy().into_owned()
  }

  pub fn root(&self) -> &Path {
    self.temp.path()
  }

  /// Write a file relative to the scratch dir, creating parents.
  pub fn write(&self, relative: &str, content: &str) -> String {
    let path = self.temp.path().join(relative);
    if let Some(parent) = path.parent() {
      std::fs::create_dir_all(parent).unwrap();
    }
    std::fs::write(&path, content).unwrap();
    path.to_string_lossy().into_owned()
  }

  pub fn read(&self, relative: &str) -> String {
    std::fs::read_to_string(self.temp.path().join(relative)).unwrap()
  }

  pub fn exists(&self, relative: &str) -> bool {
    self.temp.path().join(relative).exists()
  }

  /// Location for the cache file of this scratch workspace.
  pub fn cache_file(&self) -> PathBuf {
    self.temp.path().join(".kiln-cache.json")
  }
}

/// Returns an argv that copies `source` to `target`.
#[cfg(unix)]
pub fn copy_cmd(source: &str, target: &str) -> Vec<String> {
  vec!["cp".to_string(), source.to_string(), target.to_string()]
}

#[cfg(windows)]
pub fn copy_cmd(source: &str, target: &str) -> Vec<String> {
  vec![
    "cmd.exe".to_string(),
    "/C".to_string(),
    format!("copy /Y \"{}\" \"{}\"", source, target),
  ]
}

/// Returns an argv that always fails.
#[cfg(unix)]
pub fn failing_cmd() -> Vec<String> {
  vec!["sh".to_string(), "-c".to_string(), "exit 3".to_string()]
}

#[cfg(windows)]
pub fn failing_cmd() -> Vec<String> {
  vec!["cmd.exe".to_string(), "/C".to_string(), "exit 3".to_string()]
}
