use std::path::PathBuf;
use std::time::Duration;

use clap::Args;
use missive_db::{DEFAULT_MAX_THREAD_DEPTH, DbConfig};

/// Settings shared by every subcommand. Each can come from a flag, the
/// environment, or a `.env` file, in that order of precedence.
#[derive(Debug, Clone, Args)]
pub struct Config {
    /// SQLite database file
    #[arg(long, env = "MISSIVE_DB_PATH", default_value = "missive.db", global = true)]
    pub db_path: PathBuf,

    /// Deepest reply level included when rebuilding a thread
    #[arg(long, env = "MISSIVE_MAX_THREAD_DEPTH", default_value_t = DEFAULT_MAX_THREAD_DEPTH, global = true)]
    pub max_thread_depth: usize,

    /// How long a writer waits on a locked database, in milliseconds
    #[arg(long, env = "MISSIVE_BUSY_TIMEOUT_MS", default_value_t = 5000, global = true)]
    pub busy_timeout_ms: u64,
}

impl Config {
    pub fn db_config(&self) -> DbConfig {
        DbConfig {
            max_thread_depth: self.max_thread_depth,
            busy_timeout: Duration::from_millis(self.busy_timeout_ms),
        }
    }
}
