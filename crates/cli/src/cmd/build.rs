//! Implementation of the `kiln build` command.
//!
//! Evaluates a build script, then processes every environment the script
//! left with pending targets.

use std::path::Path;
use std::time::Instant;

use anyhow::{Context, Result};
use tracing::info;

use kiln_lib::env::{EchoMode, EnvOptions};
use kiln_lib::eval::evaluate_script;

use crate::output::{format_duration, print_info, print_stat, print_success};

pub fn cmd_build(file: &Path, echo: Option<EchoMode>) -> Result<()> {
  let start = Instant::now();

  let mut defaults = EnvOptions::default();
  if let Some(echo) = echo {
    defaults.echo = echo;
  }

  let script =
    evaluate_script(file, defaults).with_context(|| format!("Failed to evaluate build script: {}", file.display()))?;

  if !script.has_pending() {
    print_info("No pending targets");
    return Ok(());
  }

  let summary = script.process_pending().context("Build failed")?;

  info!(
    targets = summary.targets_built,
    commands = summary.commands_run,
    passes = summary.passes,
    "build finished"
  );

  println!();
  print_success("Build complete!");
  print_stat("Targets built", &summary.targets_built.to_string());
  print_stat("Commands run", &summary.commands_run.to_string());
  print_stat("Duration", &format_duration(start.elapsed()));

  Ok(())
}
