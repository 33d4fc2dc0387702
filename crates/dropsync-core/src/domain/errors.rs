//! Domain error types
//!
//! This module defines error types specific to domain operations,
//! mostly validation failures of user-supplied paths.

use thiserror::Error;

/// Errors that can occur in domain operations
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// Invalid source root path
    #[error("Invalid source path: {0}")]
    InvalidSourcePath(String),
}
