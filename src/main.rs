use std::time::Instant;

use anyhow::Context;
use clap::Parser;
use tracing::debug;
use tracing_subscriber::EnvFilter;

mod builtins;
mod command;
mod config;
mod error;
mod jobs;
mod process;
mod prompt;
mod redirects;
mod shell;
mod signal_handler;
mod variables;

use config::{Config, LOG_ENV};

fn init_logging() {
    let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn main() -> anyhow::Result<()> {
    let config = Config::parse();
    init_logging();

    let start = Instant::now();
    let mut shell = shell::Shell::new(&config);
    debug!(elapsed = ?start.elapsed(), max_jobs = config.max_jobs, "startup");

    let code = shell.run().context("failed to install signal handlers")?;
    std::process::exit(code);
}
