use anyhow::Result;
use clap::{ArgAction, Parser, Subcommand};
use tracing_subscriber::EnvFilter;

mod cmd;
mod output;

use output::OutputFormat;

/// gpack - Declarative git package manager
#[derive(Parser)]
#[command(name = "gpack")]
#[command(author, version, about, long_about = None)]
struct Cli {
  /// Increase log verbosity (-v: debug, -vv: trace)
  #[arg(short, long, global = true, action = ArgAction::Count)]
  verbose: u8,

  /// Emit machine-readable JSON instead of text summaries
  #[arg(long, global = true)]
  json: bool,

  #[command(subcommand)]
  command: Commands,
}

#[derive(Subcommand)]
enum Commands {
  /// Clone every declared package that is missing on disk
  Install {
    /// Restrict the run to one collection
    collection: Option<String>,
  },

  /// Pull every declared package
  Update {
    /// Restrict the run to one collection
    collection: Option<String>,
  },

  /// Delete checkouts that no declaration covers
  Clean {
    /// Report what would be removed without deleting anything
    #[arg(long)]
    dry_run: bool,
  },

  /// Report each declared package as missing, installed or activated
  Status {
    /// Restrict the report to one collection
    collection: Option<String>,
  },

  /// Activate one declared package right now
  Add {
    /// Package name; when declared more than once, the last wins
    name: String,
  },

  /// Print the durable fetch transcript
  Log,
}

fn main() -> Result<()> {
  let cli = Cli::parse();

  tracing_subscriber::fmt()
    .with_env_filter(log_filter(cli.verbose))
    .with_writer(std::io::stderr)
    .without_time()
    .init();

  let output = if cli.json { OutputFormat::Json } else { OutputFormat::Text };

  match cli.command {
    Commands::Install { collection } => cmd::cmd_install(collection.as_deref(), output),
    Commands::Update { collection } => cmd::cmd_update(collection.as_deref(), output),
    Commands::Clean { dry_run } => cmd::cmd_clean(dry_run, output),
    Commands::Status { collection } => cmd::cmd_status(collection.as_deref(), output),
    Commands::Add { name } => cmd::cmd_add(&name),
    Commands::Log => cmd::cmd_log(),
  }
}

/// `RUST_LOG` wins when set; otherwise `-v` picks the floor.
fn log_filter(verbose: u8) -> EnvFilter {
  let fallback = match verbose {
    0 => "warn",
    1 => "warn,gpack=debug,gpack_lib=debug",
    _ => "trace",
  };
  EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(fallback))
}
