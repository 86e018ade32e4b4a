//! sessreap - inspect a session database and run its reaper.
//!
//! - `sessreap run` keeps a reaper running until Ctrl-C
//! - `sessreap sweep` removes expired records in one full pass and exits
//! - `sessreap get|put|delete|stats` operate on single records
//!
//! See `sessreap --help` for full usage information.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;

use sessreap::config::Config;
use sessreap::logging::init_logging;
use sessreap::reaper::{ReaperHandle, Sweeper};
use sessreap::record::unix_now;
use sessreap::store::SessionStore;

#[derive(Parser)]
#[command(name = "sessreap")]
#[command(version)]
#[command(about = "Expiring session records on redb with a background reaper")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Configuration file
    #[arg(short, long, global = true, default_value = "sessreap.toml")]
    config: PathBuf,

    /// Database file (overrides the configuration)
    #[arg(long, global = true)]
    db: Option<PathBuf>,

    /// Enable verbose/debug output
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the reaper until interrupted
    Run,
    /// Remove expired and malformed records in one full pass
    Sweep {
        /// Records examined per batch (defaults to the configuration)
        #[arg(long)]
        batch_size: Option<usize>,
    },
    /// Print the payload of a live record
    Get {
        key: String,
    },
    /// Store a record
    Put {
        key: String,
        value: String,
        /// Lifetime in seconds; 0 never expires, negative is already expired
        #[arg(long, allow_hyphen_values = true)]
        max_age: Option<i64>,
    },
    /// Delete a record
    Delete {
        key: String,
    },
    /// Count live, expired and malformed records
    Stats,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = Config::load(&cli.config)?;
    if let Some(db) = cli.db {
        config.store.path = db;
    }
    if cli.verbose {
        config.logging.level = "debug".to_string();
    }
    if let Err(errors) = config.validate() {
        anyhow::bail!("Invalid configuration:\n  {}", errors.join("\n  "));
    }
    init_logging(&config.logging)?;

    let store = SessionStore::open_async(config.store.clone())
        .await
        .with_context(|| format!("Failed to open {}", config.store.path.display()))?;

    match cli.command {
        Commands::Run => run(&store, &config).await,
        Commands::Sweep { batch_size } => {
            let mut options = config.reaper.to_options(store.namespace());
            if let Some(batch_size) = batch_size {
                options = options.with_batch_size(batch_size);
            }
            let mut sweeper = Sweeper::for_store(&store, options);
            let total = tokio::task::spawn_blocking(move || sweeper.sweep_full_pass())
                .await
                .context("Task join error")??;
            println!(
                "examined {} | deleted {} | malformed {} | skipped {}",
                total.examined, total.deleted, total.malformed, total.skipped
            );
            Ok(())
        },
        Commands::Get { key } => {
            match store.load_async(key.clone().into_bytes()).await? {
                Some(record) => println!("{}", String::from_utf8_lossy(&record.payload)),
                None => anyhow::bail!("No live session for '{key}'"),
            }
            Ok(())
        },
        Commands::Put {
            key,
            value,
            max_age,
        } => {
            let max_age = max_age.unwrap_or(config.store.default_max_age_secs);
            store
                .save_async(key.into_bytes(), value.into_bytes(), max_age)
                .await?;
            Ok(())
        },
        Commands::Delete { key } => {
            if !store.delete_async(key.clone().into_bytes()).await? {
                eprintln!("'{key}' did not exist");
            }
            Ok(())
        },
        Commands::Stats => {
            let stats = store.stats_at(unix_now())?;
            println!(
                "{}: {} records ({} live, {} expired, {} malformed)",
                store.namespace(),
                stats.total(),
                stats.live,
                stats.expired,
                stats.malformed
            );
            Ok(())
        },
    }
}

async fn run(store: &SessionStore, config: &Config) -> Result<()> {
    if !config.reaper.enabled {
        anyhow::bail!("Reaper is disabled in the configuration");
    }

    sessreap::metrics::describe_metrics();
    let reaper = ReaperHandle::start(store, config.reaper.to_options(store.namespace()));

    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for Ctrl-C")?;
    tracing::info!("Shutdown requested, waiting for the current batch");
    reaper.stop().await;
    Ok(())
}
