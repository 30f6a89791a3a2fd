mod cli;

use std::io;
use std::process;
use std::sync::Arc;

use audio_harvester::config::{self, AppConfig};
use audio_harvester::watcher::{self, Watcher};
use audio_harvester::{scan_existing, Error, Ingestor, Ledger, WorkerPool};
use clap::Parser;
use cli::commands::{Cli, Commands};
use cli::confirm::confirm_clear_ledger;
use cli::progress::CliReporter;
use colored::*;
use dotenv::dotenv;
use tracing::{error, info};

fn main() -> anyhow::Result<()> {
    dotenv().ok();

    let _guard = cli::logging::init_logger();

    let config = match config::load_configuration() {
        Ok(config) => config,
        Err(err) => {
            error!("Error loading configuration: {}", err);
            process::exit(1);
        }
    };

    let args = Cli::parse();

    match args.command.unwrap_or(Commands::Run) {
        Commands::Run => {
            let ingestor = build_ingestor(&config)?;
            run_scan(&config, &ingestor)?;
            run_watch(&config, ingestor)?;
        }
        Commands::Scan => {
            let ingestor = build_ingestor(&config)?;
            run_scan(&config, &ingestor)?;
        }
        Commands::Watch => {
            let ingestor = build_ingestor(&config)?;
            run_watch(&config, ingestor)?;
        }
        Commands::PrintConfig => {
            println!("Configuration: {:#?}", config);
        }
        Commands::LedgerCount => {
            let ledger = Ledger::load(&config.ledger_path);
            info!(
                "{} processed files recorded in {}",
                format!("{}", ledger.len()).cyan(),
                ledger.path().display()
            );
        }
        Commands::ClearLedger => {
            let stdin = io::stdin();
            match confirm_clear_ledger(&config.ledger_path, &mut stdin.lock(), &mut io::stdout()) {
                Ok(true) => {
                    if let Err(e) = Ledger::clear(&config.ledger_path) {
                        error!("Error clearing ledger: {}", e);
                    }
                }
                _ => {
                    process::exit(0);
                }
            }
        }
    }

    Ok(())
}

fn build_ingestor(config: &AppConfig) -> Result<Arc<Ingestor>, Error> {
    if !config.watch_dir.is_dir() {
        return Err(Error::WatchDirMissing(config.watch_dir.clone()));
    }
    info!("Watch directory: {}", config.watch_dir.display());

    let ledger = Arc::new(Ledger::load(&config.ledger_path));
    let ingestor = Ingestor::new(ledger, &config.output_dir)
        .with_retry_policy(config.retry_policy())
        .with_chunk_size(config.read_chunk_size);
    Ok(Arc::new(ingestor))
}

fn run_scan(config: &AppConfig, ingestor: &Arc<Ingestor>) -> Result<(), Error> {
    let pool = match config.worker_threads {
        0 => WorkerPool::with_available_parallelism()?,
        n => WorkerPool::new(n)?,
    };
    let workers = pool.size();
    let reporter = CliReporter::new();

    let summary = scan_existing(
        &config.watch_dir,
        ingestor,
        &pool,
        config.scan_poll_interval(),
        &reporter,
    );
    pool.shutdown();

    info!(
        "Scanned {} files with {} workers in {}, {} copied",
        format!("{}", summary.files_scanned).cyan(),
        workers,
        format!("{:.2}s", summary.elapsed.as_secs_f64()).green(),
        format!("{}", summary.files_copied).green(),
    );

    Ok(())
}

/// Runs until the change source fails; that failure is the process result.
fn run_watch(config: &AppConfig, ingestor: Arc<Ingestor>) -> Result<(), Error> {
    let source = watcher::open_platform_source(&config.watch_dir)?;
    let watcher = Watcher::new(
        &config.watch_dir,
        config.scratch_prefix.as_str(),
        ingestor,
        source,
    );
    Err(watcher.run())
}
