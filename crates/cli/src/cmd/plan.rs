//! Implementation of the `kiln plan` command.
//!
//! Evaluates a build script and prints the order each environment would
//! build its targets in, without running any builder.

use std::path::Path;

use anyhow::{Context, Result};
use serde::Serialize;

use kiln_lib::env::{EnvOptions, PlannedTarget};
use kiln_lib::eval::evaluate_script;
use kiln_lib::lua::env::lock_env;

use crate::output::{OutputFormat, print_info, print_json, symbols};

#[derive(Debug, Serialize)]
struct EnvPlan {
  environment: usize,
  targets: Vec<PlannedTarget>,
}

pub fn cmd_plan(file: &Path, output: OutputFormat) -> Result<()> {
  let script = evaluate_script(file, EnvOptions::default())
    .with_context(|| format!("Failed to evaluate build script: {}", file.display()))?;

  let mut plans = Vec::new();
  for (index, env) in script.environments().iter().enumerate() {
    let targets = lock_env(env)
      .plan()
      .with_context(|| format!("Failed to plan environment {}", index + 1))?;
    if !targets.is_empty() {
      plans.push(EnvPlan {
        environment: index + 1,
        targets,
      });
    }
  }

  if output.is_json() {
    return print_json(&plans);
  }

  if plans.is_empty() {
    print_info("Nothing to build");
    return Ok(());
  }

  for plan in &plans {
    println!("Environment {}:", plan.environment);
    for target in &plan.targets {
      println!(
        "  {} {} ({}) {} {}",
        symbols::ADD,
        target.target,
        target.builder,
        symbols::ARROW,
        target.sources.join(" ")
      );
    }
  }

  Ok(())
}
