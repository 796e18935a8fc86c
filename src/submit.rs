//! Hand staged packages to the platform's work-registration mechanism

/// Generate the input and result template documents
pub mod template;
/// Invoke the external create_work command
pub mod create_work;
