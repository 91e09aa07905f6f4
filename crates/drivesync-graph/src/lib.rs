//! drivesync Graph - Microsoft identity and Graph API adapters
//!
//! Provides async clients for:
//! - OAuth2 refresh-token exchange against the Microsoft identity platform
//! - Access-token resolution per owner, with optional in-memory caching
//! - OneDrive uploads via Microsoft Graph
//!
//! ## Modules
//!
//! - [`auth`] - Token endpoint client and the `IAccessTokenSource` adapter
//! - [`client`] - Authenticated Microsoft Graph HTTP client
//! - [`upload`] - `IDriveUploader` adapter (inline PUT uploads)

pub mod auth;
pub mod client;
pub mod upload;

use std::time::Duration;

use reqwest::StatusCode;
use thiserror::Error;

/// Errors that can occur when talking to the token endpoint or Graph API
#[derive(Debug, Error)]
pub enum GraphError {
    /// The token endpoint rejected the refresh token exchange
    #[error("token exchange failed: status {status}")]
    TokenExchange {
        /// HTTP status returned by the token endpoint
        status: u16,
        /// Response body, usually an OAuth error document
        body: String,
    },

    /// Authentication credentials are invalid or expired
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// Insufficient permissions for the requested operation
    #[error("Forbidden: {0}")]
    Forbidden(String),

    /// The requested resource does not exist
    #[error("Not found: {0}")]
    NotFound(String),

    /// A conflict was detected (e.g., name collision)
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Rate limit exceeded; retry after the specified duration
    #[error("Too many requests, retry after {retry_after:?}")]
    TooManyRequests {
        /// Duration to wait before retrying
        retry_after: Duration,
        body: String,
    },

    /// A server-side error occurred (5xx)
    #[error("Server error ({status}): {body}")]
    ServerError { status: u16, body: String },

    /// Any other non-success status
    #[error("request failed with status {status}: {body}")]
    Status { status: u16, body: String },

    /// A network-level error occurred
    #[error("Network error: {0}")]
    NetworkError(#[from] reqwest::Error),

    /// The API response could not be parsed or was malformed
    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    /// The operation has no implementation in this adapter
    #[error("Unsupported operation: {0}")]
    Unsupported(String),
}

/// Default wait when a 429 response carries no usable `Retry-After`
pub const DEFAULT_RETRY_AFTER: Duration = Duration::from_secs(30);

impl GraphError {
    /// Classifies a non-success Graph response
    ///
    /// # Arguments
    /// * `status` - Response status (must not be 2xx)
    /// * `retry_after` - Raw `Retry-After` header value, if any
    /// * `body` - Response body text
    pub fn from_status(status: StatusCode, retry_after: Option<&str>, body: String) -> Self {
        match status {
            StatusCode::UNAUTHORIZED => GraphError::Unauthorized(body),
            StatusCode::FORBIDDEN => GraphError::Forbidden(body),
            StatusCode::NOT_FOUND => GraphError::NotFound(body),
            StatusCode::CONFLICT => GraphError::Conflict(body),
            StatusCode::TOO_MANY_REQUESTS => GraphError::TooManyRequests {
                retry_after: retry_after
                    .map(|v| client::parse_retry_after(v, DEFAULT_RETRY_AFTER))
                    .unwrap_or(DEFAULT_RETRY_AFTER),
                body,
            },
            s if s.is_server_error() => GraphError::ServerError {
                status: s.as_u16(),
                body,
            },
            s => GraphError::Status {
                status: s.as_u16(),
                body,
            },
        }
    }

    /// HTTP status carried by this error, if it came from a response
    pub fn status(&self) -> Option<u16> {
        match self {
            GraphError::TokenExchange { status, .. }
            | GraphError::ServerError { status, .. }
            | GraphError::Status { status, .. } => Some(*status),
            GraphError::Unauthorized(_) => Some(401),
            GraphError::Forbidden(_) => Some(403),
            GraphError::NotFound(_) => Some(404),
            GraphError::Conflict(_) => Some(409),
            GraphError::TooManyRequests { .. } => Some(429),
            GraphError::NetworkError(e) => e.status().map(|s| s.as_u16()),
            GraphError::InvalidResponse(_) | GraphError::Unsupported(_) => None,
        }
    }
}
