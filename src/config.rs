//! Configuration and CLI argument handling

use std::path::PathBuf;

use clap::Parser;

/// Directory name used under the platform data directory
const APP_DIR: &str = "countdown-timers";

/// CLI argument parsing structure
#[derive(Debug, Parser)]
#[command(name = "countdown-timers")]
#[command(about = "Runs named countdown timers and records the ones that complete")]
#[command(version)]
pub struct Config {
    /// Directory holding the stored timers and history
    #[arg(short, long)]
    pub data_dir: Option<PathBuf>,

    /// Print the completion history as JSON and exit
    #[arg(long)]
    pub export_history: bool,

    /// Enable verbose logging
    #[arg(short, long)]
    pub verbose: bool,
}

impl Config {
    /// Parse configuration from command line arguments
    pub fn parse() -> Self {
        Parser::parse()
    }

    /// Directory the file store writes to: `--data-dir`, else the platform
    /// data directory, else the working directory.
    pub fn storage_dir(&self) -> PathBuf {
        if let Some(dir) = &self.data_dir {
            return dir.clone();
        }
        dirs::data_dir()
            .map(|dir| dir.join(APP_DIR))
            .unwrap_or_else(|| PathBuf::from(APP_DIR))
    }

    /// Get the appropriate log level based on verbose flag
    pub fn log_level(&self) -> &'static str {
        if self.verbose { "debug" } else { "info" }
    }
}
