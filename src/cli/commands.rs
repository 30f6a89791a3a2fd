use clap::{Parser, Subcommand};

#[derive(Debug, Parser)]
#[command(name = "audio-harvester")]
#[command(about = "Copies audio out of a producer's cache directory as it appears", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Debug, Clone, Copy, Subcommand)]
pub enum Commands {
    /// Scan existing files, then watch for new ones (default)
    Run,
    /// Scan existing files once and exit
    Scan,
    /// Watch for new files without the initial scan
    Watch,
    /// Print configuration values
    PrintConfig,
    /// Display the number of files recorded as processed
    LedgerCount,
    /// Forget every processed file so the next scan copies them again
    ClearLedger,
}
