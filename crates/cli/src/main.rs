// assocload - headless identifier association loads

mod exit_codes;
mod load;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use exit_codes::EXIT_SUCCESS;

#[derive(Parser)]
#[command(name = "assocload")]
#[command(about = "Reconcile provider identifiers against a registry and load the associations")]
#[command(long_version = long_version())]
#[command(version)]
struct Cli {
    /// Debug logging (overrides RUST_LOG)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a load from a TOML config file
    #[command(after_help = "\
Examples:
  assocload run genbank.toml
  assocload run genbank.toml --json
  assocload run genbank.toml --output result.json
  assocload run genbank.toml --dry-run -v")]
    Run {
        /// Path to the load config
        config: PathBuf,

        /// Output JSON to stdout
        #[arg(long)]
        json: bool,

        /// Write JSON output to file
        #[arg(long)]
        output: Option<PathBuf>,

        /// Reconcile and report counts without writing output files
        #[arg(long)]
        dry_run: bool,
    },

    /// Validate a load config without running
    #[command(after_help = "\
Examples:
  assocload validate genbank.toml")]
    Validate {
        /// Path to the load config
        config: PathBuf,
    },

    /// Annotate a provider file against the registry and write staged candidates
    #[command(after_help = "\
Examples:
  assocload stage genbank.toml --output staged.csv")]
    Stage {
        /// Path to the load config (must name `provider` and `registry`)
        config: PathBuf,

        /// Candidate CSV to write
        #[arg(long, short = 'o')]
        output: PathBuf,
    },
}

fn long_version() -> &'static str {
    concat!(
        env!("CARGO_PKG_VERSION"),
        " (", env!("GIT_COMMIT_HASH"), ")",
        "\nengine:  assocload-recon ", env!("CARGO_PKG_VERSION"),
        "\ntarget:  ", env!("TARGET"),
    )
}

fn init_tracing(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let result = match cli.command {
        Commands::Run { config, json, output, dry_run } => load::cmd_run(config, json, output, dry_run),
        Commands::Validate { config } => load::cmd_validate(config),
        Commands::Stage { config, output } => load::cmd_stage(config, output),
    };

    match result {
        Ok(()) => ExitCode::from(EXIT_SUCCESS),
        Err(CliError { code, message, hint }) => {
            if !message.is_empty() {
                eprintln!("error: {}", message);
            }
            if let Some(hint) = hint {
                eprintln!("hint:  {}", hint);
            }
            ExitCode::from(code)
        }
    }
}

#[derive(Debug)]
pub struct CliError {
    pub code: u8,
    pub message: String,
    pub hint: Option<String>,
}
