//! Domain error types
//!
//! This module defines error types specific to domain operations,
//! such as destination parsing and object key validation.

use thiserror::Error;

use super::owner::OwnerId;

/// Errors that can occur in domain operations
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// Destination string could not be parsed into a drive target
    #[error("Invalid destination: {0}")]
    InvalidDestination(String),

    /// Object key does not name a file
    #[error("Invalid object key: {0}")]
    InvalidObjectKey(String),

    /// Owner identifier could not be parsed
    #[error("Invalid owner id: {0}")]
    InvalidOwnerId(String),

    /// The owner has never authorized a drive integration
    #[error("no integration found for owner {0}")]
    IntegrationNotFound(OwnerId),

    /// Generic validation failure
    #[error("Validation failed: {0}")]
    ValidationFailed(String),
}
