//! Error types for the audit.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, AuditError>;

#[derive(Debug, Error)]
pub enum AuditError {
    /// The input is not a results or matrix document.
    #[error("Malformed results document: {0}")]
    Malformed(#[from] serde_json::Error),
}
