//! Batch and workunit metadata lives across two independent SQLite stores
//!
//! The primary store holds the application and workunit tables, the secondary
//! store the project, batch, and parameter tables. There is no cross-store
//! transaction; every insert commits on its own.

/// Connect to the stores and read their high-water marks
pub mod open;
/// Insert workunit, parameter, and batch rows
pub mod record;
