//! Command-line argument parsing for AIMY
//!
//! Every flag is optional; running with none starts the interactive
//! session with the configured defaults.

use clap::Parser;
use std::path::PathBuf;

use crate::cli::config::Config;

/// AIMY - chat with a locally hosted model from the terminal
#[derive(Parser, Debug, Default)]
#[command(name = "aimy")]
#[command(version)]
#[command(about = "Stream replies from a local inference server", long_about = None)]
pub struct Args {
    /// Configuration file path (default: ~/.aimy/config.toml)
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Model to use instead of the configured one
    #[arg(short, long)]
    pub model: Option<String>,

    /// Server host:port instead of the configured one
    #[arg(long)]
    pub host: Option<String>,

    /// Log verbosity: -v (info), -vv (debug), -vvv (trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,
}

impl Args {
    /// Apply command-line overrides to a loaded configuration
    pub fn apply(&self, config: &mut Config) {
        if let Some(ref model) = self.model {
            config.model.name = model.clone();
        }
        if let Some(ref host) = self.host {
            config.server.host = host.clone();
        }
    }
}
