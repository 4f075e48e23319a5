// SPDX-License-Identifier: GPL-3.0-only

use clap::{Parser, Subcommand};
use std::path::PathBuf;

mod cli;

#[derive(Parser)]
#[command(name = "qrcode-reading")]
#[command(about = "Run the QR capture engine against image files")]
#[command(version = env!("GIT_VERSION"))]
struct Cli {
    /// JSON configuration file (defaults are used when omitted)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Replay images through a full capture session and print every code read
    Replay {
        /// Image files, delivered in order as camera frames
        #[arg(required = true)]
        files: Vec<PathBuf>,

        /// How many times to deliver the whole list
        #[arg(short, long, default_value = "1")]
        passes: u32,
    },

    /// Decode each image once, without a session
    Decode {
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },

    /// Print the effective configuration as JSON
    Config,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Set RUST_LOG to control log level, e.g. RUST_LOG=qrcode_reading=debug
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_target(true)
        .with_level(true)
        .init();

    let cli = Cli::parse();
    let config = cli::load_config(cli.config.as_deref())?;

    match cli.command {
        Commands::Replay { files, passes } => cli::replay(config, &files, passes),
        Commands::Decode { files } => cli::decode_files(&config, &files),
        Commands::Config => cli::print_config(&config),
    }
}
