// Core infrastructure modules
pub mod core;

// Feature-specific modules
pub mod config;
pub mod records;
pub mod shell;
pub mod sql;
pub mod value;

#[cfg(test)]
mod test_utils;

pub use crate::core::{RecadminError, Result};
pub use crate::records::{KeySelector, Outcome, Record, Records, Skip};
