//! Microsoft Graph API client
//!
//! Provides an HTTP client that resolves a bearer token for the owner on
//! every request and turns non-success responses into [`GraphError`] values
//! that carry the response body.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use std::time::Duration;
//! use drivesync_core::{domain::OwnerId, ports::IAccessTokenSource};
//! use drivesync_graph::client::GraphClient;
//! use reqwest::{header::HeaderMap, Method};
//!
//! # async fn example(tokens: Arc<dyn IAccessTokenSource>) -> anyhow::Result<()> {
//! let client = GraphClient::with_base_url(
//!     tokens,
//!     "https://graph.microsoft.com/v1.0",
//!     Duration::from_secs(30),
//! )?;
//! let response = client
//!     .authenticated_request(OwnerId::new(1), Method::GET, "/me/drive", None, HeaderMap::new())
//!     .await?;
//! # Ok(())
//! # }
//! ```

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use drivesync_core::{config::DriveConfig, domain::OwnerId, ports::IAccessTokenSource};
use reqwest::{header::HeaderMap, Body, Client, Method, RequestBuilder, Response};
use tracing::{debug, warn};

use crate::GraphError;

// ============================================================================
// GraphClient
// ============================================================================

/// HTTP client for Microsoft Graph API calls
///
/// Wraps `reqwest::Client` with per-owner bearer authentication and base URL
/// construction.
pub struct GraphClient {
    /// The underlying HTTP client
    client: Client,
    /// Base URL for API requests
    base_url: String,
    /// Access token provider
    tokens: Arc<dyn IAccessTokenSource>,
}

impl GraphClient {
    /// Creates a GraphClient from the `drive` configuration section
    ///
    /// # Errors
    /// Returns an error if the HTTP client cannot be built
    pub fn from_config(
        config: &DriveConfig,
        tokens: Arc<dyn IAccessTokenSource>,
    ) -> Result<Self, GraphError> {
        Self::with_base_url(
            tokens,
            config.base_url.trim_end_matches('/'),
            Duration::from_secs(config.http_timeout_secs),
        )
    }

    /// Creates a GraphClient for `base_url` whose requests time out after `timeout`
    ///
    /// # Errors
    /// Returns an error if the HTTP client cannot be built
    pub fn with_base_url(
        tokens: Arc<dyn IAccessTokenSource>,
        base_url: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, GraphError> {
        Ok(Self {
            client: Client::builder().timeout(timeout).build()?,
            base_url: base_url.into(),
            tokens,
        })
    }

    /// Returns the base URL for API requests
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Creates an unauthenticated request builder for the given method and path
    ///
    /// # Arguments
    /// * `method` - HTTP method (GET, POST, PUT, DELETE, etc.)
    /// * `path` - API path relative to base URL (e.g., "/me/drive")
    pub fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let url = format!("{}{}", self.base_url, path);
        self.client.request(method, url)
    }

    /// Sends an authenticated request on behalf of `owner_id`
    ///
    /// Obtains an access token from the token source, attaches it as a
    /// bearer token, and sends the request once.
    ///
    /// # Arguments
    /// * `owner_id` - Owner whose OneDrive integration authorizes the call
    /// * `method` - HTTP method
    /// * `path` - API path relative to base URL
    /// * `body` - Optional request body
    /// * `headers` - Extra request headers
    ///
    /// # Errors
    /// Fails if no access token can be obtained, on transport errors, and
    /// with a [`GraphError`] for any non-2xx response.
    pub async fn authenticated_request(
        &self,
        owner_id: OwnerId,
        method: Method,
        path: &str,
        body: Option<Body>,
        headers: HeaderMap,
    ) -> Result<Response> {
        let access_token = self
            .tokens
            .access_token(owner_id)
            .await
            .context("Failed to obtain access token")?;

        debug!(owner_id = %owner_id, %method, path, "Sending Graph request");

        let mut request = self
            .request(method.clone(), path)
            .bearer_auth(access_token)
            .headers(headers);
        if let Some(body) = body {
            request = request.body(body);
        }

        let response = request.send().await.map_err(GraphError::from)?;
        check_status(response).await.map_err(Into::into)
    }
}

/// Passes 2xx responses through and converts everything else to a [`GraphError`]
pub async fn check_status(response: Response) -> Result<Response, GraphError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let retry_after = response
        .headers()
        .get(reqwest::header::RETRY_AFTER)
        .and_then(|v| v.to_str().ok())
        .map(str::to_owned);
    let body = response.text().await.unwrap_or_default();

    warn!(status = status.as_u16(), "Graph request failed");
    Err(GraphError::from_status(status, retry_after.as_deref(), body))
}

// ============================================================================
// Retry-After parsing
// ============================================================================

/// Parses a `Retry-After` header value into a Duration.
///
/// The header can be either:
/// - An integer number of seconds (e.g., "30")
/// - An HTTP-date (e.g., "Fri, 31 Dec 2025 23:59:59 GMT") - parsed as seconds from now
///
/// Falls back to the default duration if parsing fails.
pub fn parse_retry_after(value: &str, default: Duration) -> Duration {
    if let Ok(seconds) = value.trim().parse::<u64>() {
        return Duration::from_secs(seconds);
    }

    if let Ok(date) = chrono::DateTime::parse_from_rfc2822(value.trim()) {
        let now = chrono::Utc::now();
        let target = date.with_timezone(&chrono::Utc);
        if target > now {
            let diff = target - now;
            if let Some(secs) = diff
                .num_seconds()
                .try_into()
                .ok()
                .filter(|&s: &u64| s <= 3600)
            {
                return Duration::from_secs(secs);
            }
        }
    }

    warn!(value, "Could not parse Retry-After header, using default");
    default
}
