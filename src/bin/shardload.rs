//! shardload binary
//!
//! Restores backup chunks into freshly created shards.

use std::error::Error;
use std::path::PathBuf;
use std::process;

use clap::{Parser, Subcommand};
use shardload::{RestoreConfig, RestoreOrchestrator};
use tracing_subscriber::{fmt, EnvFilter};

/// shardload
#[derive(Parser, Debug)]
#[command(name = "shardload")]
#[command(about = "Offline restore of key-value backups into storage shards")]
#[command(version)]
struct Args {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Load every backup chunk at a location into shard-N directories
    Restore {
        /// Location of the backup chunks (directory path or file:// URI)
        #[arg(short, long)]
        location: String,

        /// Directory to write the shard directories into
        #[arg(short, long = "postings")]
        postings: PathBuf,

        /// Report load progress every second
        #[arg(long)]
        progress: bool,
    },
}

fn main() {
    // Logs go to stderr; stdout carries the user-facing lines
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,shardload=debug"));

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(true)
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    match args.command {
        Commands::Restore {
            location,
            postings,
            progress,
        } => restore(location, postings, progress),
    }
}

fn restore(location: String, postings: PathBuf, progress: bool) {
    println!("Restoring from: {}", location);
    println!("Writing postings to: {}", postings.display());

    let config = RestoreConfig::builder()
        .location(location)
        .postings_dir(postings)
        .progress(progress)
        .build();

    // Each chunk's summary is printed as soon as its shard is closed
    let orchestrator = RestoreOrchestrator::new(config);
    match orchestrator.run_location() {
        Ok(summary) => {
            println!(
                "Restored {} keys into {} shard(s)",
                summary.total_records(),
                summary.chunks.len()
            );
        }
        Err(e) => {
            tracing::error!("Restore failed: {}", e);
            eprintln!("Error while restoring: {}", e);
            let mut source = e.source();
            while let Some(cause) = source {
                eprintln!("  caused by: {}", cause);
                source = cause.source();
            }
            process::exit(1);
        }
    }
}
