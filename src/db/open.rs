use std::path::Path;

use log::info;
use rusqlite::{Connection, OptionalExtension};

use crate::error::WorkgenError;

/// Open the primary store (application and workunit tables).
pub fn open_primary(path: &Path) -> rusqlite::Result<Connection> {
    if !path.exists() {
        info!("Creating new primary store {}", path.display())
    }
    let conn = Connection::open(path)?;

    static SCHEMA: &str = include_str!(concat!(env!("CARGO_MANIFEST_DIR"), "/data/db/primary.sql"));
    conn.execute_batch(SCHEMA)?;

    Ok(conn)
}

/// Open the secondary store (project, batch, and parameter tables).
pub fn open_secondary(path: &Path) -> rusqlite::Result<Connection> {
    if !path.exists() {
        info!("Creating new secondary store {}", path.display())
    }
    let conn = Connection::open(path)?;

    static SCHEMA: &str = include_str!(concat!(env!("CARGO_MANIFEST_DIR"), "/data/db/secondary.sql"));
    conn.execute_batch(SCHEMA)?;

    Ok(conn)
}

/// High-water mark of the workunit table, 0 when empty.
pub fn last_workunit_id(conn: &Connection) -> rusqlite::Result<i64> {
    conn.query_row("SELECT coalesce(max(id), 0) FROM workunit", [], |row| row.get(0))
}

/// High-water mark of the batch table, 0 when empty.
pub fn last_batch_id(conn: &Connection) -> rusqlite::Result<i64> {
    conn.query_row("SELECT coalesce(max(id), 0) FROM batch", [], |row| row.get(0))
}

pub fn app_id(conn: &Connection, name: &str) -> Result<i64, WorkgenError> {
    conn.query_row("SELECT id FROM app WHERE name = ?1", [name], |row| row.get(0))
        .optional()?
        .ok_or_else(|| WorkgenError::UnknownApplication(name.to_string()))
}

pub fn project_id(conn: &Connection, name: &str) -> Result<i64, WorkgenError> {
    conn.query_row("SELECT id FROM project WHERE name = ?1", [name], |row| row.get(0))
        .optional()?
        .ok_or_else(|| WorkgenError::UnknownProject(name.to_string()))
}
