//! Error types for the watch tree and source registry.

use std::path::PathBuf;
use thiserror::Error;

/// Errors from watch tree and registry operations.
///
/// Polling itself never fails: unreadable entries are logged and treated
/// as absent. These errors only surface from configuration-time calls and
/// from style text loading, where the caller logs and substitutes empty text.
#[derive(Error, Debug)]
pub enum WatchError {
    #[error("Invalid file filter pattern '{pattern}': {reason}")]
    InvalidPattern { pattern: String, reason: String },

    #[error("Cannot read {path}: {reason}")]
    ReadFailed { path: PathBuf, reason: String },
}
