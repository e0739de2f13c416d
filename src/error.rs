//! Error types for the persistence surface.
//!
//! Per-tick animation paths never fail: missing bones, clips or skeletons
//! degrade to defaults. Only writing and reading the save record can error.

use thiserror::Error;

/// Errors produced while saving or loading a visual record.
#[derive(Error, Debug)]
pub enum VisualError {
    #[error("serialization error: {0}")]
    Codec(#[from] bincode::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("malformed visual record: {0}")]
    Corrupt(String),
}
