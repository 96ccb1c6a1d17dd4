/// Core Module for recadmin
///
/// Shared infrastructure used by the record operations: database access
/// and the error taxonomy.

pub mod db;
pub mod error;

// Re-export commonly used types for convenience
pub use error::{RecadminError, Result};
