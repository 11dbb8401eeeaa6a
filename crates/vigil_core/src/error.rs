//! Error types for Vigil.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum VigilError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid retention policy: {0}")]
    Retention(String),
}
