pub mod cascade;
pub mod error;
pub mod history;
pub mod messages;
pub mod migrations;
pub mod notifications;
pub mod queries;
pub mod threads;
pub mod unread;

pub use error::{Result, StoreError};

use rusqlite::{Connection, Transaction, TransactionBehavior};
use std::path::Path;
use std::sync::Mutex;
use std::time::Duration;
use tracing::info;

pub const DEFAULT_MAX_THREAD_DEPTH: usize = 256;
pub const DEFAULT_BUSY_TIMEOUT: Duration = Duration::from_millis(5000);

/// Tunables for a [`Database`] handle.
#[derive(Debug, Clone)]
pub struct DbConfig {
    /// Replies nested deeper than this are left out of a reconstructed thread.
    pub max_thread_depth: usize,
    pub busy_timeout: Duration,
}

impl Default for DbConfig {
    fn default() -> Self {
        Self {
            max_thread_depth: DEFAULT_MAX_THREAD_DEPTH,
            busy_timeout: DEFAULT_BUSY_TIMEOUT,
        }
    }
}

pub struct Database {
    conn: Mutex<Connection>,
    config: DbConfig,
}

impl Database {
    pub fn open(path: &Path, config: DbConfig) -> Result<Self> {
        let conn = Connection::open(path)?;

        // WAL mode for concurrent reads
        conn.pragma_update(None, "journal_mode", "WAL")?;

        let db = Self::init(conn, config)?;
        info!("Database opened at {}", path.display());
        Ok(db)
    }

    pub fn open_in_memory() -> Result<Self> {
        Self::init(Connection::open_in_memory()?, DbConfig::default())
    }

    pub fn open_in_memory_with(config: DbConfig) -> Result<Self> {
        Self::init(Connection::open_in_memory()?, config)
    }

    fn init(conn: Connection, config: DbConfig) -> Result<Self> {
        conn.pragma_update(None, "foreign_keys", "ON")?;
        conn.busy_timeout(config.busy_timeout)?;

        migrations::run(&conn)?;

        Ok(Self {
            conn: Mutex::new(conn),
            config,
        })
    }

    pub fn config(&self) -> &DbConfig {
        &self.config
    }

    pub fn with_conn<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&Connection) -> Result<T>,
    {
        let conn = self
            .conn
            .lock()
            .map_err(|e| StoreError::LockPoisoned(e.to_string()))?;
        f(&conn)
    }

    pub fn with_conn_mut<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&mut Connection) -> Result<T>,
    {
        let mut conn = self
            .conn
            .lock()
            .map_err(|e| StoreError::LockPoisoned(e.to_string()))?;
        f(&mut conn)
    }

    /// Run `f` inside an immediate transaction. The write lock is taken up front,
    /// so reads made inside `f` stay valid until commit. Any error rolls back.
    pub fn write<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&Transaction<'_>) -> Result<T>,
    {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
            let out = f(&tx)?;
            tx.commit()?;
            Ok(out)
        })
    }
}
