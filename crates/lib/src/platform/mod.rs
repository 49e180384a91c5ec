//! Platform probing.

pub mod shell;

pub use shell::Shell;

/// Suffix appended to linked programs that have no extension.
pub fn program_suffix() -> &'static str {
  std::env::consts::EXE_SUFFIX
}
