use clap::Parser;

use crate::jobs::DEFAULT_MAX_JOBS;

/// Environment variable holding the `tracing` filter, e.g. `SMALLSH_LOG=debug`.
pub const LOG_ENV: &str = "SMALLSH_LOG";

#[derive(Parser, Debug, Clone)]
#[command(name = "smallsh", version)]
#[command(about = "A small interactive shell with background jobs and redirection")]
pub struct Config {
    /// Most background jobs tracked at once
    #[arg(long, default_value_t = DEFAULT_MAX_JOBS)]
    pub max_jobs: usize,
}
