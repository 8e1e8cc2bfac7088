//! qseal CLI - seal and verify QR-attested documents.

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use colored::Colorize;
use tracing_subscriber::EnvFilter;

mod commands;
mod exit_codes;
mod remote;
mod utils;

use commands::seal::SealArgs;
use commands::verify::VerifyArgs;

#[derive(Parser)]
#[command(name = "qseal")]
#[command(author, version, about = "QR document attestation sealing and verification", long_about = None)]
#[command(after_help = "Exit codes:
  0   success
  1   general error
  64  usage error
  65  verification failed
  66  input file unreadable
  69  signing or key service unreachable
  74  output write error")]
struct Cli {
    /// Suppress user-facing output; errors still go to stderr
    #[arg(long, global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate a local Ed25519 signing keypair
    Keygen {
        /// Where to write the key file
        #[arg(short, long, default_value = "qseal-key.json")]
        output: PathBuf,
    },

    /// Seal a document image with a signed attestation QR
    Seal(SealArgs),

    /// Verify a sealed document image
    Verify(VerifyArgs),
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("qseal=warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Keygen { output } => commands::keygen::execute(output, cli.quiet),
        Commands::Seal(args) => commands::seal::execute(args, cli.quiet).await,
        Commands::Verify(args) => commands::verify::execute(args, cli.quiet).await,
    };

    if let Err(e) = result {
        let exit = exit_codes::ExitCode::from_anyhow(&e);
        eprintln!("{} {:#}", "error:".red().bold(), e);
        std::process::exit(exit.code);
    }
}
