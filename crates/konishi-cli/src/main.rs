//! Konishi CLI: bills of materials for container images.
//!
//! Identify an image's package manager, list what it installed, and write
//! SPDX or `CycloneDX` documents.

mod commands;
#[expect(
    unreachable_pub,
    reason = "binary crate: pub inside private module is fine"
)]
mod config;

use clap::Parser;
use color_eyre::eyre::Result;

/// Konishi: bills of materials for container images.
///
/// Starts a throwaway container, reads the native apk, dpkg or rpm
/// database and reports every installed package with its content hash.
#[derive(Parser)]
#[command(name = "konishi", version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging (repeat for more detail: -v, -vv, -vvv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Output logs as JSON (for machine consumption).
    #[arg(long, global = true)]
    json_logs: bool,
}

#[derive(clap::Subcommand)]
enum Commands {
    /// List the packages of a container image and write BOM files.
    Bom(commands::bom::BomArgs),
}

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;
    let cli = Cli::parse();

    let filter = match cli.verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };

    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(true);

    if cli.json_logs {
        subscriber.json().init();
    } else {
        subscriber.init();
    }

    match cli.command {
        Commands::Bom(args) => commands::bom::execute(args).await,
    }
}
