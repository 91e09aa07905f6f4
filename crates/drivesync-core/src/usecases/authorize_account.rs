//! Account authorization use case
//!
//! Binds an owner to a OneDrive refresh token. Persistence and validation
//! are decoupled: the token is stored first and kept even when the
//! validation exchange fails, so a transient provider outage does not force
//! the user to authorize again.

use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::{info, warn};

use crate::{
    domain::AuthorizationCommand,
    ports::{IAccessTokenSource, ICredentialStore},
};

/// Result of an authorization once the token has been persisted
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthorizationOutcome {
    /// The stored refresh token was exchanged successfully
    Validated,
    /// The token is stored but the validation exchange failed
    Unvalidated {
        /// Rendered cause of the failed exchange
        reason: String,
    },
}

/// Use case for OneDrive authorization messages
pub struct AuthorizeAccountUseCase {
    credential_store: Arc<dyn ICredentialStore>,
    token_source: Arc<dyn IAccessTokenSource>,
}

impl AuthorizeAccountUseCase {
    /// Creates a new AuthorizeAccountUseCase
    ///
    /// # Arguments
    ///
    /// * `credential_store` - Persistent storage for integration records
    /// * `token_source` - Exchanges the stored refresh token for an access token
    pub fn new(
        credential_store: Arc<dyn ICredentialStore>,
        token_source: Arc<dyn IAccessTokenSource>,
    ) -> Self {
        Self {
            credential_store,
            token_source,
        }
    }

    /// Saves the integration and validates the new refresh token
    ///
    /// This method:
    /// 1. Upserts the integration record for the owner
    /// 2. Drops any access token cached for the previous refresh token
    /// 3. Exchanges the freshly stored refresh token as a validation step
    ///
    /// # Errors
    ///
    /// Returns an error only if the integration cannot be saved. A failed
    /// validation is reported through [`AuthorizationOutcome::Unvalidated`].
    pub async fn execute(&self, command: &AuthorizationCommand) -> Result<AuthorizationOutcome> {
        let owner_id = command.owner_id;

        self.credential_store
            .save_refresh_token(owner_id, &command.user_id, &command.refresh_token)
            .await
            .context("Failed to save OneDrive integration")?;

        info!(
            owner_id = %owner_id,
            user_id = %command.user_id,
            "Saved OneDrive integration"
        );

        self.token_source.invalidate(owner_id);

        match self.token_source.access_token(owner_id).await {
            Ok(_) => {
                info!(owner_id = %owner_id, "Validated OneDrive refresh token");
                Ok(AuthorizationOutcome::Validated)
            }
            Err(e) => {
                let reason = format!("{e:#}");
                warn!(
                    owner_id = %owner_id,
                    error = %reason,
                    "Refresh token stored but validation exchange failed"
                );
                Ok(AuthorizationOutcome::Unvalidated { reason })
            }
        }
    }
}
