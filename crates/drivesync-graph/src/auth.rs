//! OAuth2 refresh-token exchange
//!
//! ## Components
//!
//! - [`OAuthClient`] - Posts `grant_type=refresh_token` requests to the token endpoint
//! - [`TokenResponse`] - Token endpoint response document
//! - [`OAuthTokenSource`] - Resolves an owner's access token from the stored
//!   refresh token; implements [`IAccessTokenSource`]
//!
//! ## Usage
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use drivesync_core::config::AuthConfig;
//! use drivesync_core::ports::ICredentialStore;
//! use drivesync_graph::auth::{OAuthClient, OAuthTokenSource};
//!
//! # fn example(store: Arc<dyn ICredentialStore>) -> anyhow::Result<()> {
//! let config = AuthConfig::default();
//! let oauth = OAuthClient::from_config(&config)?;
//! let tokens = OAuthTokenSource::new(oauth, store).with_cache(config.cache_access_tokens);
//! # Ok(())
//! # }
//! ```

use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use dashmap::DashMap;
use drivesync_core::{
    config::AuthConfig,
    domain::OwnerId,
    ports::{IAccessTokenSource, ICredentialStore},
};
use reqwest::Client;
use serde::Deserialize;
use tracing::{debug, info, warn};

use crate::GraphError;

/// Cached tokens are dropped this long before the provider's expiry
const EXPIRY_SKEW: Duration = Duration::from_secs(60);

// ============================================================================
// Token endpoint client
// ============================================================================

/// Response from the token endpoint
#[derive(Clone, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    /// Present when the provider rotates the refresh token
    #[serde(default)]
    pub refresh_token: Option<String>,
    /// Access token lifetime in seconds
    #[serde(default)]
    pub expires_in: Option<u64>,
    #[serde(default)]
    pub token_type: Option<String>,
    #[serde(default)]
    pub scope: Option<String>,
}

impl fmt::Debug for TokenResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenResponse")
            .field("access_token", &"<redacted>")
            .field(
                "refresh_token",
                &self.refresh_token.as_ref().map(|_| "<redacted>"),
            )
            .field("expires_in", &self.expires_in)
            .field("token_type", &self.token_type)
            .field("scope", &self.scope)
            .finish()
    }
}

/// Client for the OAuth2 token endpoint
///
/// Performs a single exchange per call. Retrying is left to the caller.
pub struct OAuthClient {
    http: Client,
    token_url: String,
    client_id: String,
    client_secret: String,
}

impl OAuthClient {
    /// Creates a client with an explicit HTTP client
    ///
    /// # Arguments
    /// * `http` - Shared reqwest client (carries the request timeout)
    /// * `token_url` - Token endpoint URL
    /// * `client_id` / `client_secret` - Application credentials
    pub fn new(
        http: Client,
        token_url: impl Into<String>,
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
    ) -> Self {
        Self {
            http,
            token_url: token_url.into(),
            client_id: client_id.into(),
            client_secret: client_secret.into(),
        }
    }

    /// Creates a client from the `auth` configuration section
    ///
    /// # Errors
    /// Returns an error if the HTTP client cannot be built
    pub fn from_config(config: &AuthConfig) -> Result<Self, GraphError> {
        let http = Client::builder()
            .timeout(Duration::from_secs(config.http_timeout_secs))
            .build()?;
        Ok(Self::new(
            http,
            &config.token_url,
            &config.client_id,
            &config.client_secret,
        ))
    }

    /// Exchanges a refresh token for an access token
    ///
    /// # Errors
    /// - [`GraphError::TokenExchange`] on a non-2xx response
    /// - [`GraphError::NetworkError`] on transport failure
    /// - [`GraphError::InvalidResponse`] if the response body is not a token document
    pub async fn exchange(&self, refresh_token: &str) -> Result<TokenResponse, GraphError> {
        let params = [
            ("grant_type", "refresh_token"),
            ("refresh_token", refresh_token),
            ("client_id", self.client_id.as_str()),
            ("client_secret", self.client_secret.as_str()),
        ];

        let response = self
            .http
            .post(&self.token_url)
            .form(&params)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            debug!(status = status.as_u16(), "Token endpoint rejected exchange");
            return Err(GraphError::TokenExchange {
                status: status.as_u16(),
                body,
            });
        }

        let text = response.text().await?;
        serde_json::from_str(&text)
            .map_err(|e| GraphError::InvalidResponse(format!("token response: {e}")))
    }
}

// ============================================================================
// OAuthTokenSource
// ============================================================================

struct CachedToken {
    access_token: String,
    expires_at: Instant,
}

/// Resolves access tokens for owners from their stored refresh tokens
///
/// Every call exchanges the stored refresh token unless caching is enabled.
/// Rotated refresh tokens are written back to the credential store.
pub struct OAuthTokenSource {
    oauth: OAuthClient,
    credential_store: Arc<dyn ICredentialStore>,
    cache: Option<DashMap<OwnerId, CachedToken>>,
}

impl OAuthTokenSource {
    pub fn new(oauth: OAuthClient, credential_store: Arc<dyn ICredentialStore>) -> Self {
        Self {
            oauth,
            credential_store,
            cache: None,
        }
    }

    /// Enables or disables the in-memory access-token cache
    pub fn with_cache(mut self, enabled: bool) -> Self {
        self.cache = enabled.then(DashMap::new);
        self
    }

    fn cached(&self, owner_id: OwnerId) -> Option<String> {
        let cache = self.cache.as_ref()?;
        let entry = cache.get(&owner_id)?;
        if entry.expires_at > Instant::now() {
            Some(entry.access_token.clone())
        } else {
            drop(entry);
            cache.remove(&owner_id);
            None
        }
    }

    fn remember(&self, owner_id: OwnerId, response: &TokenResponse) {
        let Some(cache) = self.cache.as_ref() else {
            return;
        };
        let Some(lifetime) = response
            .expires_in
            .map(Duration::from_secs)
            .and_then(|d| d.checked_sub(EXPIRY_SKEW))
            .filter(|d| !d.is_zero())
        else {
            return;
        };
        cache.insert(
            owner_id,
            CachedToken {
                access_token: response.access_token.clone(),
                expires_at: Instant::now() + lifetime,
            },
        );
    }
}

#[async_trait]
impl IAccessTokenSource for OAuthTokenSource {
    async fn access_token(&self, owner_id: OwnerId) -> anyhow::Result<String> {
        if let Some(token) = self.cached(owner_id) {
            debug!(owner_id = %owner_id, "Using cached access token");
            return Ok(token);
        }

        let refresh_token = self.credential_store.get_refresh_token(owner_id).await?;
        let response = self.oauth.exchange(&refresh_token).await?;

        if let Some(rotated) = response
            .refresh_token
            .as_deref()
            .filter(|t| !t.is_empty() && *t != refresh_token)
        {
            match self
                .credential_store
                .rotate_refresh_token(owner_id, &refresh_token, rotated)
                .await
            {
                Ok(true) => info!(owner_id = %owner_id, "Stored rotated refresh token"),
                Ok(false) => info!(
                    owner_id = %owner_id,
                    "Integration re-authorized during exchange, discarding rotated refresh token"
                ),
                Err(e) => warn!(
                    owner_id = %owner_id,
                    error = %e,
                    "Failed to store rotated refresh token"
                ),
            }
        }

        self.remember(owner_id, &response);
        Ok(response.access_token)
    }

    fn invalidate(&self, owner_id: OwnerId) {
        if let Some(cache) = &self.cache {
            cache.remove(&owner_id);
        }
    }
}

// ============================================================================
// Unit tests
// ============================================================================
