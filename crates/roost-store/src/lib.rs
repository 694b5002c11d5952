pub mod cache;
pub mod error;
pub mod messages;
pub mod migrations;
pub mod rows;
pub mod social;
pub mod users;

pub use cache::{FastStore, MemoryCache, QueuedMessage, SetKind};
pub use error::StoreError;

use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use rusqlite::Connection;
use tokio::task;
use tokio::time;
use tracing::info;

/// Ceiling on any single durable-store call. A call that runs past it is
/// reported as `StoreError::Unavailable`, the same as an unreachable store.
const DURABLE_TIMEOUT: Duration = Duration::from_secs(5);

/// The durable tier: system of record for users, friend edges and messages.
pub struct Database {
    conn: Mutex<Connection>,
}

impl Database {
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        let conn = Connection::open(path)?;

        // WAL mode for concurrent reads
        conn.pragma_update(None, "journal_mode", "WAL")?;
        conn.pragma_update(None, "foreign_keys", "ON")?;

        migrations::run(&conn)?;

        info!("Database opened at {}", path.display());
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    pub fn open_in_memory() -> Result<Self, StoreError> {
        let conn = Connection::open_in_memory()?;
        conn.pragma_update(None, "foreign_keys", "ON")?;
        migrations::run(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn with_conn<F, T>(&self, f: F) -> Result<T, StoreError>
    where
        F: FnOnce(&Connection) -> Result<T, StoreError>,
    {
        let conn = self
            .conn
            .lock()
            .map_err(|_| StoreError::Unavailable("durable store lock poisoned".into()))?;
        f(&conn)
    }
}

/// Shared store handle combining the durable tier with the fast tier.
///
/// Every mutating operation writes the durable store first and mirrors into
/// the fast store second; the two are never wrapped in one transaction. A
/// failure between the steps leaves the fast store stale until the next
/// read-through rebuilds it from durable state.
#[derive(Clone)]
pub struct Store {
    db: Arc<Database>,
    cache: Arc<dyn FastStore>,
}

impl Store {
    pub fn new(db: Database, cache: Arc<dyn FastStore>) -> Self {
        Self {
            db: Arc::new(db),
            cache,
        }
    }

    /// Run a closure against the durable store on the blocking pool, bounded
    /// by [`DURABLE_TIMEOUT`].
    pub(crate) async fn durable<F, T>(&self, f: F) -> Result<T, StoreError>
    where
        F: FnOnce(&Connection) -> Result<T, StoreError> + Send + 'static,
        T: Send + 'static,
    {
        let db = self.db.clone();
        let call = task::spawn_blocking(move || db.with_conn(f));
        match time::timeout(DURABLE_TIMEOUT, call).await {
            Err(_) => Err(StoreError::Unavailable("durable store timed out".into())),
            Ok(Err(join)) => Err(StoreError::Unavailable(format!(
                "durable store worker failed: {join}"
            ))),
            Ok(Ok(result)) => result,
        }
    }
}
