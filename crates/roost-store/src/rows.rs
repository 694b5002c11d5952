//! Database row types, mapping directly to SQLite rows. Kept distinct from
//! the roost-types API models so the credential hash never leaks into a
//! wire-facing struct.

#[derive(Debug, Clone)]
pub struct UserRow {
    pub username: String,
    pub avatar: i64,
    pub hash: String,
}
