mod cmd;
mod output;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use kiln_lib::env::EchoMode;

use crate::output::{OutputFormat, print_error};

/// kiln - Lua-scripted build engine
#[derive(Parser)]
#[command(name = "kiln")]
#[command(author, version, about, long_about = None)]
struct Cli {
  /// Log level used when RUST_LOG is not set (error, warn, info, debug, trace)
  #[arg(long, global = true, default_value = "warn")]
  log_level: String,

  #[command(subcommand)]
  command: Commands,
}

#[derive(Subcommand)]
enum Commands {
  /// Evaluate a build script and build its targets
  Build {
    /// Path to the build script
    #[arg(short, long, default_value = "build.lua")]
    file: PathBuf,

    /// How builds are echoed (short, command, off)
    #[arg(long)]
    echo: Option<EchoMode>,
  },

  /// Show the build order without building anything
  Plan {
    /// Path to the build script
    #[arg(short, long, default_value = "build.lua")]
    file: PathBuf,

    #[arg(short, long, value_enum, default_value_t)]
    output: OutputFormat,
  },

  /// Remove everything a previous build produced
  Clean {
    /// Path to the build cache
    #[arg(long)]
    cache: Option<PathBuf>,
  },
}

fn main() {
  let cli = Cli::parse();

  let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&cli.log_level));
  tracing_subscriber::fmt()
    .with_env_filter(filter)
    .with_writer(std::io::stderr)
    .without_time()
    .init();

  let result = match cli.command {
    Commands::Build { file, echo } => cmd::cmd_build(&file, echo),
    Commands::Plan { file, output } => cmd::cmd_plan(&file, output),
    Commands::Clean { cache } => cmd::cmd_clean(cache),
  };

  if let Err(err) = result {
    print_error(&format!("{err:#}"));
    std::process::exit(1);
  }
}
