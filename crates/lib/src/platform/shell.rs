//! System shell detection.
//!
//! Scalar commands (e.g. a `Command` target whose `CMD` is a single string)
//! are handed to the system shell. The shell is probed once when an
//! environment is created and threaded through from there.

use std::fmt;

use tracing::debug;

/// Environment variable that overrides the detected shell.
pub const SHELL_ENV: &str = "KILN_SHELL";

/// A shell program and the arguments that precede the command string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Shell {
  pub program: String,
  pub args: Vec<String>,
}

impl Shell {
  /// Resolve the shell to use.
  ///
  /// Honors `KILN_SHELL` when set; otherwise `/bin/sh -c` on Unix and
  /// `cmd.exe /C` on Windows.
  pub fn detect() -> Self {
    let shell = match std::env::var(SHELL_ENV) {
      Ok(program) if !program.trim().is_empty() => Self::for_program(program.trim()),
      _ => Self::platform_default(),
    };
    debug!(shell = %shell, "detected shell");
    shell
  }

  /// Pick the command-string flag based on the shell's name.
  pub fn for_program(program: &str) -> Self {
    let lower = program.to_ascii_lowercase();
    let args = if lower.contains("powershell") || lower.contains("pwsh") {
      vec!["-NoProfile".to_string(), "-Command".to_string()]
    } else if lower.ends_with("cmd") || lower.ends_with("cmd.exe") {
      vec!["/C".to_string()]
    } else {
      vec!["-c".to_string()]
    };
    Self {
      program: program.to_string(),
      args,
    }
  }

  #[cfg(unix)]
  fn platform_default() -> Self {
    Self::for_program("/bin/sh")
  }

  #[cfg(windows)]
  fn platform_default() -> Self {
    Self::for_program("cmd.exe")
  }

  /// The full argument vector that runs `command` through this shell.
  pub fn wrap(&self, command: &str) -> Vec<String> {
    let mut argv = Vec::with_capacity(self.args.len() + 2);
    argv.push(self.program.clone());
    argv.extend(self.args.iter().cloned());
    argv.push(command.to_string());
    argv
  }
}

impl Default for Shell {
  fn default() -> Self {
    Self::platform_default()
  }
}

impl fmt::Display for Shell {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{} {}", self.program, self.args.join(" "))
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use serial_test::serial;

  #[test]
  fn flags_follow_shell_name() {
    assert_eq!(Shell::for_program("/bin/bash").args, vec!["-c"]);
    assert_eq!(Shell::for_program("cmd.exe").args, vec!["/C"]);
    assert_eq!(Shell::for_program("pwsh").args, vec!["-NoProfile", "-Command"]);
  }

  #[test]
  fn wrap_appends_command() {
    let shell = Shell::for_program("/bin/sh");
    assert_eq!(shell.wrap("echo hi"), vec!["/bin/sh", "-c", "echo hi"]);
  }

  #[test]
  #[serial]
  fn env_override_wins() {
    temp_env::with_var(SHELL_ENV, Some("/usr/bin/zsh"), || {
      assert_eq!(Shell::detect().program, "/usr/bin/zsh");
    });
  }

  #[test]
  #[serial]
  fn blank_override_is_ignored() {
    temp_env::with_var(SHELL_ENV, Some("  "), || {
      assert_eq!(Shell::detect(), Shell::default());
    });
  }
}
