//! CaskDB CLI
//!
//! Opens a data file, runs one command against it, and closes it.

use std::path::PathBuf;
use std::process;
use std::time::Instant;

use caskdb::log::Recovery;
use caskdb::{CaskError, Config, Engine, Result, SyncStrategy};
use clap::{Parser, Subcommand};
use tracing_subscriber::{fmt, EnvFilter};

/// CaskDB CLI
#[derive(Parser, Debug)]
#[command(name = "caskdb-cli")]
#[command(about = "CLI for the CaskDB key-value store")]
#[command(version)]
struct Args {
    /// Data file path
    #[arg(short, long, default_value = "./caskdb.db")]
    path: PathBuf,

    /// Skip the compaction pass on open
    #[arg(long)]
    no_compact: bool,

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
    Set {
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

    /// Check whether a key has a live value
    Exists {
        /// The key to check
        key: String,
    },

    /// Rewrite the data file down to its live entries
    Compact,

    /// Scan the data file read-only and report what it holds
    Verify,

    /// Put, get and delete N keys and report timings
    Bench {
        /// Number of keys
        #[arg(short, long, default_value = "100000")]
        count: usize,
    },
}

fn main() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,caskdb=debug"));

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    if let Err(e) = run(args) {
        tracing::error!("{}", e);
        process::exit(1);
    }
}

fn run(args: Args) -> Result<()> {
    // Verify scans read-only, without opening an engine
    if let Commands::Verify = args.command {
        let stats = Recovery::verify(&args.path)?;
        println!(
            "entries={} tombstones={} live_keys={} bytes={}",
            stats.entries_scanned, stats.tombstones, stats.live_keys, stats.bytes_scanned
        );
        return Ok(());
    }

    let sync_strategy = match args.command {
        Commands::Bench { .. } => SyncStrategy::OsManaged,
        _ => SyncStrategy::EveryWrite,
    };

    let config = Config::builder()
        .path(&args.path)
        .sync_strategy(sync_strategy)
        .compact_on_open(!args.no_compact)
        .build();

    let engine = Engine::open(config)?;

    let result = match args.command {
        Commands::Get { key } => engine.get(key.as_bytes()).map(|value| {
            println!("{}", String::from_utf8_lossy(&value));
        }),
        Commands::Set { key, value } => engine.put(key.as_bytes(), value.as_bytes()).map(|_| {
            println!("OK");
        }),
        Commands::Del { key } => engine.delete(key.as_bytes()).map(|_| {
            println!("OK");
        }),
        Commands::Exists { key } => {
            println!("{}", engine.exists(key.as_bytes()));
            Ok(())
        }
        Commands::Compact => engine.compact().map(|stats| {
            println!(
                "bytes_before={} bytes_after={} live_entries={}",
                stats.bytes_before, stats.bytes_after, stats.live_entries
            );
        }),
        Commands::Bench { count } => bench(&engine, count),
        Commands::Verify => Ok(()),
    };

    // Close even when the command failed
    let closed = engine.close();
    result.and(closed)
}

/// Put N keys, read them back, delete them, and confirm they are gone
fn bench(engine: &Engine, count: usize) -> Result<()> {
    let key = |i: usize| format!("key-{}", i);

    let start = Instant::now();
    for i in 0..count {
        engine.put(key(i).as_bytes(), format!("value-{}", i).as_bytes())?;
    }
    println!("put    {:?}", start.elapsed());

    let start = Instant::now();
    for i in 0..count {
        engine.get(key(i).as_bytes())?;
    }
    println!("get    {:?}", start.elapsed());

    let start = Instant::now();
    for i in 0..count {
        engine.delete(key(i).as_bytes())?;
    }
    println!("delete {:?}", start.elapsed());

    let start = Instant::now();
    let mut still_live = 0usize;
    for i in 0..count {
        match engine.get(key(i).as_bytes()) {
            Err(CaskError::KeyNotFound) => {}
            Ok(_) => still_live += 1,
            Err(e) => return Err(e),
        }
    }
    if still_live > 0 {
        tracing::warn!(still_live, "keys readable after delete");
    }
    println!("miss   {:?}", start.elapsed());

    Ok(())
}
