use rusqlite::Connection;
use tracing::info;

use crate::StoreError;

pub fn run(conn: &Connection) -> Result<(), StoreError> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS users (
            username    TEXT PRIMARY KEY,
            avatar      INTEGER NOT NULL DEFAULT 1,
            hash        TEXT NOT NULL,
            created_at  TEXT NOT NULL DEFAULT (datetime('now'))
        );

        CREATE TABLE IF NOT EXISTS friends (
            user_a      TEXT NOT NULL REFERENCES users(username),
            user_b      TEXT NOT NULL REFERENCES users(username),
            accepted    INTEGER NOT NULL DEFAULT 0,
            created_at  TEXT NOT NULL DEFAULT (datetime('now'))
        );

        -- One row per unordered pair, whichever direction created it. While
        -- accepted = 0 the row direction carries meaning: user_a requested,
        -- user_b was asked.
        CREATE UNIQUE INDEX IF NOT EXISTS idx_friends_pair
            ON friends (min(user_a, user_b), max(user_a, user_b));

        CREATE TABLE IF NOT EXISTS messages (
            id          INTEGER PRIMARY KEY,
            sender      TEXT NOT NULL REFERENCES users(username),
            receiver    TEXT NOT NULL REFERENCES users(username),
            content     TEXT NOT NULL,
            delivered   INTEGER NOT NULL,
            created_at  TEXT NOT NULL DEFAULT (datetime('now'))
        );

        CREATE INDEX IF NOT EXISTS idx_messages_undelivered
            ON messages(receiver, delivered);
        ",
    )?;

    info!("Database migrations complete");
    Ok(())
}
