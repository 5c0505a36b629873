//! `br`: build and deploy software from a folder of YAML configuration.

mod cmd;
mod output;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, ValueEnum};
use tracing_subscriber::EnvFilter;

use crate::cmd::{cmd_build, cmd_describe};
use crate::output::print_error;

#[derive(Parser)]
#[command(name = "br")]
#[command(author, version, about = "Declarative build rules with an installed-state ledger", long_about = None)]
struct Cli {
  /// Build target that turns the configuration into rules (ci, scripts)
  target: String,

  /// What to do with the target
  #[arg(value_enum)]
  command: Command,

  /// Folder holding the target's configuration documents
  config_folder: PathBuf,

  /// Logging verbosity
  #[arg(short, long, value_enum, ignore_case = true, default_value_t = LogLevel::Info)]
  loglevel: LogLevel,

  /// Invoke every rule with its effects suppressed
  #[arg(long)]
  dry_run: bool,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum Command {
  /// Execute build rules followed by deployment rules
  Build,
  /// Log configuration files and rule descriptions without executing anything
  Describe,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum LogLevel {
  Trace,
  Debug,
  Info,
  #[value(alias = "warn")]
  Warning,
  Error,
  #[value(alias = "fatal")]
  Critical,
}

impl LogLevel {
  fn directive(self) -> &'static str {
    match self {
      LogLevel::Trace => "trace",
      LogLevel::Debug => "debug",
      LogLevel::Info => "info",
      LogLevel::Warning => "warn",
      LogLevel::Error | LogLevel::Critical => "error",
    }
  }
}

fn main() -> ExitCode {
  let cli = Cli::parse();

  tracing_subscriber::fmt()
    .with_env_filter(EnvFilter::new(cli.loglevel.directive()))
    .without_time()
    .init();

  let result = match cli.command {
    Command::Build => cmd_build(&cli.target, &cli.config_folder, cli.dry_run),
    Command::Describe => cmd_describe(&cli.target, &cli.config_folder),
  };

  match result {
    Ok(()) => ExitCode::SUCCESS,
    Err(err) => {
      print_error(&format!("{:#}", err));
      ExitCode::FAILURE
    }
  }
}
