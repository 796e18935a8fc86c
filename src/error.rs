use std::path::PathBuf;

use thiserror::Error;

/// Everything that can stop a submission run.
///
/// Descriptor and model-configuration problems are fatal for the run but
/// reported cleanly; store, archive, and template failures propagate as-is.
#[derive(Debug, Error)]
pub enum WorkgenError {
    #[error("malformed descriptor {}: {problem}", path.display())]
    MalformedDescriptor { path: PathBuf, problem: String },

    #[error("invalid grid_type '{0}'")]
    InvalidGridType(String),

    #[error("length of simulation ({fclen} days) does not divide equally by timestep ({timestep}s)")]
    InvalidTimestep { fclen: u64, timestep: u64 },

    #[error("no application named '{0}' in the primary store")]
    UnknownApplication(String),

    #[error("no project named '{0}' in the secondary store")]
    UnknownProject(String),

    #[error("descriptor {} is not well-formed XML: {source}", path.display())]
    Xml { path: PathBuf, source: roxmltree::Error },

    #[error(transparent)]
    Database(#[from] rusqlite::Error),

    #[error("template rendering failed: {0}")]
    Template(#[from] tinytemplate::error::Error),

    #[error("archive error: {0}")]
    Archive(#[from] zip::result::ZipError),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl WorkgenError {
    /// Configuration errors abort the remaining descriptor processing but the
    /// run still cleans its scratch area and releases the lock on the way out.
    pub fn is_fatal_config(&self) -> bool {
        matches!(
            self,
            WorkgenError::MalformedDescriptor { .. }
                | WorkgenError::InvalidGridType(_)
                | WorkgenError::InvalidTimestep { .. }
                | WorkgenError::UnknownApplication(_)
                | WorkgenError::UnknownProject(_)
                | WorkgenError::Xml { .. }
        )
    }
}
