//! Domain error types
//!
//! This module defines error types specific to domain operations,
//! including validation failures for share paths and file names.

use thiserror::Error;

/// Errors that can occur in domain operations
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// Invalid share path format or content
    #[error("Invalid share path: {0}")]
    InvalidSharePath(String),

    /// Invalid file name for the remote share
    #[error("Invalid file name: {0}")]
    InvalidFileName(String),

    /// Generic validation failure
    #[error("Validation failed: {0}")]
    ValidationFailed(String),

    /// ID parsing error
    #[error("Invalid ID format: {0}")]
    InvalidId(String),
}
