//! Stage per-workunit input artifacts into the delivery area

/// Package named files into an archive and unpack archives into scratch
pub mod archive;
/// Resolve and stage the three ancillary data archives
pub mod ancil;
/// Render namelists by exact-token substitution
pub mod namelist;
