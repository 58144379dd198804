//! SwapBatch CLI
//!
//! Command-line tools for loading text into batch files and reading it back.
//!
//! # Commands
//!
//! - `load` - Store the lines of a file in batches
//! - `dump` - Print the lines held by preserved batches
//! - `inspect` - Display per-batch record counts
//! - `version` - Show version information

mod commands;

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use swapbatch_core::BatchConfig;
use tracing_subscriber::EnvFilter;

/// SwapBatch command-line tools.
#[derive(Parser)]
#[command(name = "swapbatch")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path prefix of the batch files (batch i is `<basename>i`)
    #[arg(global = true, short, long)]
    basename: Option<PathBuf>,

    /// Capacity of each batch file in bytes
    #[arg(global = true, short = 's', long, default_value_t = BatchConfig::DEFAULT_BATCH_SIZE)]
    batch_size: usize,

    /// Enable verbose output
    #[arg(global = true, short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Store each line of a file as a record
    Load {
        /// Input file
        input: PathBuf,

        /// Keep the batch files after loading
        #[arg(short, long)]
        preserve: bool,

        /// Skip lines that do not fit in a batch instead of stopping
        #[arg(long)]
        skip_errors: bool,

        /// Print each line as it is stored
        #[arg(short, long)]
        echo: bool,

        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// Print the lines held by preserved batches
    Dump {
        /// Maximum number of lines to print
        #[arg(short, long)]
        limit: Option<usize>,

        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// Display per-batch record counts for preserved batches
    Inspect {
        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// Show version information
    Version,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();

    match cli.command {
        Commands::Load {
            input,
            preserve,
            skip_errors,
            echo,
            format,
        } => {
            let basename = cli.basename.ok_or("Batch basename required for load")?;
            let config = BatchConfig::new(basename, cli.batch_size);
            commands::load::run(config, &input, preserve, skip_errors, echo, &format)?;
        }
        Commands::Dump { limit, format } => {
            let basename = cli.basename.ok_or("Batch basename required for dump")?;
            let config = BatchConfig::new(basename, cli.batch_size);
            commands::dump::run(config, limit, &format)?;
        }
        Commands::Inspect { format } => {
            let basename = cli.basename.ok_or("Batch basename required for inspect")?;
            let config = BatchConfig::new(basename, cli.batch_size);
            commands::inspect::run(config, &format)?;
        }
        Commands::Version => {
            println!("SwapBatch CLI v{}", env!("CARGO_PKG_VERSION"));
            println!("SwapBatch Core v{}", swapbatch_core::VERSION);
        }
    }

    Ok(())
}
