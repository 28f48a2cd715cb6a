mod cmd;
mod console;
mod output;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Args, Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use anvil_lib::document::{DEFAULT_DOCUMENT, DocumentError, LoadOptions};
use anvil_lib::execute::listener::MessageLevel;
use anvil_lib::execute::{BuildError, ExecuteConfig, ResolveError};

use crate::output::{Tone, status};

#[derive(Parser)]
#[command(name = "anvil")]
#[command(author, version, about = "Declarative build orchestration", long_about = None)]
struct Cli {
  /// Show verbose step output and debug logs
  #[arg(short, long, global = true, conflicts_with = "quiet")]
  verbose: bool,

  /// Only show warnings and errors
  #[arg(short, long, global = true)]
  quiet: bool,

  #[command(subcommand)]
  command: Commands,
}

#[derive(Args)]
struct DocumentArgs {
  /// Build document to load
  #[arg(short = 'f', long = "file", default_value = DEFAULT_DOCUMENT)]
  file: PathBuf,

  /// Define a property, taking precedence over every other definition
  #[arg(short = 'D', value_name = "NAME=VALUE", value_parser = parse_definition)]
  define: Vec<(String, String)>,

  /// Load properties from a properties file
  #[arg(long = "propertyfile", value_name = "FILE")]
  property_files: Vec<PathBuf>,

  /// Deploy a library descriptor before loading the document
  #[arg(long = "lib", value_name = "DESCRIPTOR")]
  libraries: Vec<PathBuf>,
}

impl DocumentArgs {
  fn load_options(&self) -> LoadOptions {
    LoadOptions {
      user_properties: self.define.clone(),
      property_files: self.property_files.clone(),
      libraries: self.libraries.clone(),
      bundles: Vec::new(),
    }
  }
}

#[derive(Subcommand)]
enum Commands {
  /// Run targets (the default target when none are given)
  Run {
    /// Targets to run, in order
    targets: Vec<String>,

    #[command(flatten)]
    document: DocumentArgs,

    /// Keep running targets that do not depend on a failed one
    #[arg(short = 'k', long)]
    keep_going: bool,

    /// Maximum number of targets to run at once
    #[arg(short = 'j', long, default_value_t = 1)]
    jobs: usize,
  },

  /// Show the execution order without running anything
  Plan {
    /// Targets to plan
    targets: Vec<String>,

    #[command(flatten)]
    document: DocumentArgs,

    /// Output as JSON
    #[arg(long)]
    json: bool,
  },

  /// List the targets of a build document
  Targets {
    #[command(flatten)]
    document: DocumentArgs,

    /// Output as JSON
    #[arg(long)]
    json: bool,

    /// Also list the registered step, type and condition names
    #[arg(long)]
    types: bool,
  },
}

fn parse_definition(raw: &str) -> Result<(String, String), String> {
  match raw.split_once('=') {
    Some((name, _)) if name.trim().is_empty() => Err(format!("missing property name in '{raw}'")),
    Some((name, value)) => Ok((name.trim().to_string(), value.to_string())),
    // -Dflag binds an empty value
    None => Ok((raw.trim().to_string(), String::new())),
  }
}

fn init_tracing(verbose: bool, quiet: bool) {
  let default = if verbose {
    "anvil=debug,anvil_lib=debug"
  } else if quiet {
    "error"
  } else {
    "warn"
  };
  tracing_subscriber::fmt()
    .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default)))
    .with_writer(std::io::stderr)
    .without_time()
    .init();
}

/// Exit status for a failed command.
fn exit_code(err: &anyhow::Error) -> u8 {
  for cause in err.chain() {
    if let Some(e) = cause.downcast_ref::<BuildError>() {
      return u8::try_from(e.exit_code()).unwrap_or(1);
    }
    if let Some(e) = cause.downcast_ref::<DocumentError>() {
      return u8::try_from(e.exit_code()).unwrap_or(1);
    }
    if cause.downcast_ref::<ResolveError>().is_some() {
      return 2;
    }
  }
  1
}

fn main() -> ExitCode {
  let cli = Cli::parse();
  init_tracing(cli.verbose, cli.quiet);

  let level = if cli.verbose {
    MessageLevel::Verbose
  } else if cli.quiet {
    MessageLevel::Warning
  } else {
    MessageLevel::Info
  };

  let result = match cli.command {
    Commands::Run {
      targets,
      document,
      keep_going,
      jobs,
    } => {
      let config = ExecuteConfig {
        parallelism: jobs.max(1),
        keep_going,
      };
      cmd::cmd_run(&document.file, &document.load_options(), targets, config, level)
    }
    Commands::Plan {
      targets,
      document,
      json,
    } => cmd::cmd_plan(&document.file, &document.load_options(), &targets, json),
    Commands::Targets { document, json, types } => {
      cmd::cmd_targets(&document.file, &document.load_options(), json, types, cli.verbose)
    }
  };

  match result {
    Ok(()) => ExitCode::SUCCESS,
    Err(err) => {
      status(Tone::Failure, &format!("{err:#}"));
      ExitCode::from(exit_code(&err))
    }
  }
}
