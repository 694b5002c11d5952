//! Store error types.

use thiserror::Error;

/// Errors surfaced by the durable and fast store tiers.
///
/// Fast-store trouble never reaches callers through this type: reads degrade
/// to the durable store and mirror writes are logged and swallowed, because
/// the durable store is the correctness source. `Unavailable` therefore
/// always describes the durable tier (unreachable, timed out, or its worker
/// failed).
#[derive(Debug, Error)]
pub enum StoreError {
    /// Underlying SQLite error (query, corruption, etc.)
    #[error("database error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// No such user, edge or pending request
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    /// Duplicate user, edge or pending request
    #[error("{entity} already exists: {id}")]
    AlreadyExists { entity: &'static str, id: String },

    /// Durable store unreachable or timed out
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

/// True for UNIQUE/PRIMARY KEY violations specifically; other constraint
/// failures (foreign keys, NOT NULL) must not be mistaken for duplicates.
pub(crate) fn is_unique_violation(err: &rusqlite::Error) -> bool {
    matches!(
        err,
        rusqlite::Error::SqliteFailure(e, _)
            if e.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE
                || e.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_PRIMARYKEY
    )
}
