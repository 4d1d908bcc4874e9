use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Debug, Parser)]
#[command(name = "hashguard")]
#[command(about = "Signature-based malware scanner", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Update signatures, then scan a folder (defaults to the configured scan_root)
    Scan {
        path: Option<PathBuf>,
        /// Move infected files to the quarantine folder afterwards
        #[arg(long, conflicts_with = "delete")]
        quarantine: bool,
        /// Delete infected files afterwards
        #[arg(long)]
        delete: bool,
        /// Do not ask before deleting
        #[arg(long, short = 'y')]
        yes: bool,
        /// Print every file, not only detections
        #[arg(long, short = 'v')]
        verbose: bool,
    },
    /// Download the signature database and print its size
    Update,
    /// Print the SHA-256 fingerprint of a file
    Hash { file: PathBuf },
    /// Run the update and auto-scan timers and accept commands on stdin
    Watch,
    /// Print configuration values
    PrintConfig,
    /// Write the effective configuration as TOML
    SaveConfig {
        #[arg(default_value = "Config.toml")]
        path: PathBuf,
    },
}
