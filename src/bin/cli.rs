//! CaskDB CLI
//!
//! Command-line interface operating directly on a local data directory.

use std::path::PathBuf;
use std::process;

use caskdb::{CaskError, Config, Engine};
use clap::{Parser, Subcommand};
use tracing_subscriber::{fmt, EnvFilter};

/// CaskDB CLI
#[derive(Parser, Debug)]
#[command(name = "caskdb-cli")]
#[command(about = "CLI for the CaskDB storage engine")]
#[command(version)]
struct Args {
    /// Data directory
    #[arg(short, long, default_value = "./caskdb_data")]
    data_dir: PathBuf,

    /// Segment size limit in MB before rotation
    #[arg(short, long, default_value = "256")]
    segment_mb: u64,

    /// Sync after every write
    #[arg(long)]
    sync: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Get a value by key
    Get {
        /// The key to get
        key: String,
    },

    /// Set a key-value pair
    Put {
        /// The key to set
        key: String,

        /// The value to set
        value: String,
    },

    /// Delete a key
    Del {
        /// The key to delete
        key: String,
    },

    /// List all keys
    List,

    /// Compact sealed segments (applied on next open)
    Merge,

    /// Show engine statistics
    Stat,

    /// Copy the data directory
    Backup {
        /// Destination directory
        dest: PathBuf,
    },
}

fn main() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info,caskdb=debug"));

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    let config = Config::builder()
        .data_dir(&args.data_dir)
        .segment_size(args.segment_mb * 1024 * 1024)
        .sync_writes(args.sync)
        .build();

    let engine = match Engine::open(config) {
        Ok(engine) => engine,
        Err(e) => {
            tracing::error!("Failed to open engine: {}", e);
            process::exit(1);
        }
    };

    let outcome = run(&engine, args.command);

    if let Err(e) = engine.close() {
        tracing::error!("Failed to close engine: {}", e);
        process::exit(1);
    }

    match outcome {
        Ok(()) => {}
        Err(CaskError::KeyNotFound) => {
            println!("(nil)");
            process::exit(2);
        }
        Err(e) => {
            tracing::error!("{}", e);
            process::exit(1);
        }
    }
}

fn run(engine: &Engine, command: Commands) -> caskdb::Result<()> {
    match command {
        Commands::Get { key } => {
            let value = engine.get(key.as_bytes())?;
            println!("{}", String::from_utf8_lossy(&value));
        }
        Commands::Put { key, value } => {
            engine.put(key.as_bytes(), value.as_bytes())?;
            println!("OK");
        }
        Commands::Del { key } => {
            engine.delete(key.as_bytes())?;
            println!("OK");
        }
        Commands::List => {
            for key in engine.list_keys() {
                println!("{}", String::from_utf8_lossy(&key));
            }
        }
        Commands::Merge => {
            engine.merge()?;
            println!("OK");
        }
        Commands::Stat => {
            let stat = engine.stat()?;
            println!("segments:    {}", stat.segment_count);
            println!("keys:        {}", stat.key_count);
            println!("reclaimable: {} bytes", stat.reclaimable_bytes);
            println!("disk usage:  {} bytes", stat.disk_usage);
        }
        Commands::Backup { dest } => {
            engine.backup(&dest)?;
            println!("OK");
        }
    }
    Ok(())
}
