//! Credential store port (driven/secondary port)
//!
//! Persists one integration record per owner. Writes are upserts keyed by
//! owner id, so the latest authorization for an owner wins.
//!
//! ## Design Notes
//!
//! - Uses `anyhow::Result` because storage errors are adapter-specific.
//! - Refresh tokens cross this boundary in plaintext; implementations store
//!   them through an [`ITokenCipher`].

use crate::domain::{IntegrationRecord, OwnerId};

/// Port trait for persistent integration records
#[async_trait::async_trait]
pub trait ICredentialStore: Send + Sync {
    /// Returns the active integration for `owner_id`, if any
    async fn get_integration(&self, owner_id: OwnerId)
        -> anyhow::Result<Option<IntegrationRecord>>;

    /// Inserts or replaces the integration for `owner_id`
    ///
    /// Re-activates a previously deactivated integration.
    async fn save_refresh_token(
        &self,
        owner_id: OwnerId,
        user_id: &str,
        refresh_token: &str,
    ) -> anyhow::Result<()>;

    /// Returns the refresh token of the active integration for `owner_id`
    ///
    /// # Errors
    ///
    /// Fails with `DomainError::IntegrationNotFound` when no active
    /// integration exists.
    async fn get_refresh_token(&self, owner_id: OwnerId) -> anyhow::Result<String>;

    /// Replaces the refresh token only if it still equals `expected`
    ///
    /// Used when the identity provider rotates the refresh token during an
    /// exchange. `expected` is the token that was exchanged; if the owner
    /// re-authorized in the meantime the stored token differs and the newer
    /// authorization is kept.
    ///
    /// Returns `true` if the token was replaced and `false` if the stored
    /// token no longer matches `expected`.
    ///
    /// # Errors
    ///
    /// Fails with `DomainError::IntegrationNotFound` when no active
    /// integration exists.
    async fn rotate_refresh_token(
        &self,
        owner_id: OwnerId,
        expected: &str,
        refresh_token: &str,
    ) -> anyhow::Result<bool>;
}

/// Encrypts refresh tokens before they are written and decrypts them on read
pub trait ITokenCipher: Send + Sync {
    fn encrypt(&self, plaintext: &str) -> anyhow::Result<String>;
    fn decrypt(&self, ciphertext: &str) -> anyhow::Result<String>;
}

/// Cipher that stores tokens unchanged
///
/// Used until a key-management backed cipher is configured.
#[derive(Debug, Clone, Copy, Default)]
pub struct PlaintextCipher;

impl ITokenCipher for PlaintextCipher {
    fn encrypt(&self, plaintext: &str) -> anyhow::Result<String> {
        Ok(plaintext.to_string())
    }

    fn decrypt(&self, ciphertext: &str) -> anyhow::Result<String> {
        Ok(ciphertext.to_string())
    }
}
