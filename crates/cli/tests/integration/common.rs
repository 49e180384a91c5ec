//! Shared test helpers for CLI integration tests.

use std::path::PathBuf;

use assert_cmd::Command;
use assert_cmd::cargo::cargo_bin_cmd;
use tempfile::TempDir;

/// Isolated test environment.
///
/// Each test gets its own temporary directory holding the build script, its
/// sources, its outputs and the build cache.
pub struct TestEnv {
  pub temp: TempDir,
  pub script_path: PathBuf,
}

impl TestEnv {
  /// Create a test environment whose `build.lua` holds `script`.
  pub fn with_script(script: &str) -> Self {
    let env = Self::empty();
    std::fs::write(&env.script_path, script).unwrap();
    env
  }

  /// Create an empty test environment.
  pub fn empty() -> Self {
    let temp = TempDir::new().unwrap();
    let script_path = temp.path().join("build.lua");
    Self { temp, script_path }
  }

  /// Write a file relative to the temp directory.
  pub fn write_file(&self, relative_path: &str, content: &str) {
    let path = self.temp.path().join(relative_path);
    if let Some(parent) = path.parent() {
      std::fs::create_dir_all(parent).unwrap();
    }
    std::fs::write(&path, content).unwrap();
  }

  /// Read a file relative to the temp directory.
  pub fn read_file(&self, relative_path: &str) -> String {
    std::fs::read_to_string(self.temp.path().join(relative_path)).unwrap()
  }

  pub fn exists(&self, relative_path: &str) -> bool {
    self.temp.path().join(relative_path).exists()
  }

  /// Get a Command for the kiln binary running inside the temp directory.
  pub fn kiln_cmd(&self) -> Command {
    let mut cmd: Command = cargo_bin_cmd!("kiln");
    cmd.current_dir(self.temp.path());
    cmd.env_remove("RUST_LOG");
    cmd
  }
}

/// A script copying `in.txt` to `out/copy.txt` with `cp`.
pub const COPY_SCRIPT: &str = r#"
local env = kiln.env{}
env:target("Command", "out/copy.txt", {"in.txt"}, {
  CMD = {"cp", "${_SOURCES}", "${_TARGET}"},
})
"#;
