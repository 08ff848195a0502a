//! CLI for seedgate.

mod commands;

use anyhow::Result;
use clap::{Parser, Subcommand};
use seedgate_core::config;
use seedgate_core::logging::{self, LogOptions};
use std::path::PathBuf;

use commands::{run_check, run_daemon};

/// Top-level CLI for seedgate.
#[derive(Debug, Parser)]
#[command(name = "seedgate")]
#[command(
    about = "seedgate: throttle torrent clients around media streams and schedules",
    long_about = None
)]
pub struct Cli {
    /// Config file (default: ~/.config/seedgate/config.toml).
    #[arg(long, global = true, env = "SEEDGATE_CONFIG", value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Log level for stderr (trace, debug, info, warn, error, off).
    #[arg(
        long,
        global = true,
        env = "SEEDGATE_LOG_LEVEL",
        default_value = "info",
        value_name = "LEVEL"
    )]
    pub log_level: String,

    /// Log level for the log file.
    #[arg(
        long,
        global = true,
        env = "SEEDGATE_LOG_FILE_LEVEL",
        default_value = "warn",
        value_name = "LEVEL"
    )]
    pub log_file_level: String,

    #[command(subcommand)]
    pub command: CliCommand,
}

#[derive(Debug, Subcommand)]
pub enum CliCommand {
    /// Run the throttler until Ctrl-C or SIGTERM.
    Run,

    /// Validate the config and show what would be throttled.
    Check,
}

impl Cli {
    pub async fn run(self) -> Result<()> {
        let stderr_level = logging::parse_level(&self.log_level)?;
        let file_level = logging::parse_level(&self.log_file_level)?;
        let path = match self.config {
            Some(path) => path,
            None => config::config_path()?,
        };

        match self.command {
            CliCommand::Run => {
                let cfg = config::load(Some(path.as_path()))?;
                let opts = LogOptions {
                    stderr_level,
                    file_level,
                    log_dir: cfg.logs_path.clone(),
                };
                match logging::init_logging(&opts) {
                    Ok(log_file) => tracing::debug!("logging to {}", log_file.display()),
                    Err(e) => {
                        logging::init_logging_stderr(stderr_level);
                        tracing::warn!("could not open log file, logging to stderr only: {:#}", e);
                    }
                }
                tracing::info!("loaded config from {}", path.display());
                run_daemon(&cfg).await?;
            }
            CliCommand::Check => {
                logging::init_logging_stderr(stderr_level);
                let cfg = config::load(Some(path.as_path()))?;
                run_check(&cfg, &path)?;
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests;
