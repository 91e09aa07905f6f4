//! SQLite implementation of ICredentialStore
//!
//! ## Type Mapping
//!
//! | Domain Type   | SQL Type | Strategy                                        |
//! |---------------|----------|-------------------------------------------------|
//! | OwnerId       | INTEGER  | `OwnerId::get()` / `OwnerId::new()`              |
//! | refresh token | TEXT     | `ITokenCipher::encrypt` / `ITokenCipher::decrypt` |
//! | DateTime<Utc> | TEXT     | ISO 8601 via `to_rfc3339()` / `DateTime::parse_from_rfc3339()` |

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};

use drivesync_core::domain::{DomainError, IntegrationRecord, OwnerId};
use drivesync_core::ports::{ICredentialStore, ITokenCipher, PlaintextCipher};

use crate::CacheError;

/// SQLite-based implementation of the credential store port
///
/// Writes are upserts keyed by `owner_id`; the last write for an owner wins.
/// Only active rows are visible to lookups.
pub struct SqliteCredentialStore {
    pool: SqlitePool,
    cipher: Arc<dyn ITokenCipher>,
}

impl SqliteCredentialStore {
    /// Creates a store that keeps refresh tokens as plaintext
    pub fn new(pool: SqlitePool) -> Self {
        Self {
            pool,
            cipher: Arc::new(PlaintextCipher),
        }
    }

    /// Replaces the cipher applied to refresh tokens at rest
    pub fn with_cipher(mut self, cipher: Arc<dyn ITokenCipher>) -> Self {
        self.cipher = cipher;
        self
    }

    /// Marks an owner's integration inactive; returns whether a row changed
    ///
    /// Inactive integrations are invisible to lookups until the owner
    /// authorizes again.
    pub async fn deactivate(&self, owner_id: OwnerId) -> Result<bool, CacheError> {
        let result = sqlx::query(
            "UPDATE onedrive_integrations SET is_active = 0, updated_at = ? \
             WHERE owner_id = ? AND is_active = 1",
        )
        .bind(Utc::now().to_rfc3339())
        .bind(owner_id.get())
        .execute(&self.pool)
        .await?;

        tracing::debug!(owner_id = %owner_id, "Deactivated OneDrive integration");
        Ok(result.rows_affected() > 0)
    }

    fn record_from_row(&self, row: &SqliteRow) -> Result<IntegrationRecord, CacheError> {
        let owner_id: i64 = row.get("owner_id");
        let user_id: String = row.get("user_id");
        let stored_token: String = row.get("refresh_token");
        let updated_at: String = row.get("updated_at");

        let refresh_token = self
            .cipher
            .decrypt(&stored_token)
            .map_err(|e| CacheError::SerializationError(format!("refresh token: {e}")))?;

        Ok(IntegrationRecord {
            owner_id: OwnerId::new(owner_id),
            user_id,
            refresh_token,
            updated_at: parse_datetime(&updated_at)?,
        })
    }

    fn seal(&self, refresh_token: &str) -> Result<String, CacheError> {
        self.cipher
            .encrypt(refresh_token)
            .map_err(|e| CacheError::SerializationError(format!("refresh token: {e}")))
    }
}

/// Parse an ISO 8601 / RFC 3339 datetime string into `DateTime<Utc>`
fn parse_datetime(s: &str) -> Result<DateTime<Utc>, CacheError> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| CacheError::SerializationError(format!("invalid datetime '{s}': {e}")))
}

// ============================================================================
// ICredentialStore implementation
// ============================================================================

#[async_trait]
impl ICredentialStore for SqliteCredentialStore {
    async fn get_integration(
        &self,
        owner_id: OwnerId,
    ) -> anyhow::Result<Option<IntegrationRecord>> {
        let row = sqlx::query(
            "SELECT owner_id, user_id, refresh_token, updated_at \
             FROM onedrive_integrations WHERE owner_id = ? AND is_active = 1",
        )
        .bind(owner_id.get())
        .fetch_optional(&self.pool)
        .await
        .map_err(CacheError::from)?;

        match row {
            Some(row) => Ok(Some(self.record_from_row(&row)?)),
            None => Ok(None),
        }
    }

    async fn save_refresh_token(
        &self,
        owner_id: OwnerId,
        user_id: &str,
        refresh_token: &str,
    ) -> anyhow::Result<()> {
        let sealed = self.seal(refresh_token)?;
        let now = Utc::now().to_rfc3339();

        sqlx::query(
            "INSERT INTO onedrive_integrations \
             (owner_id, user_id, refresh_token, is_active, created_at, updated_at) \
             VALUES (?, ?, ?, 1, ?, ?) \
             ON CONFLICT(owner_id) DO UPDATE SET \
                user_id = excluded.user_id, \
                refresh_token = excluded.refresh_token, \
                is_active = 1, \
                updated_at = excluded.updated_at",
        )
        .bind(owner_id.get())
        .bind(user_id)
        .bind(&sealed)
        .bind(&now)
        .bind(&now)
        .execute(&self.pool)
        .await
        .map_err(CacheError::from)?;

        tracing::trace!(owner_id = %owner_id, "Saved OneDrive integration");
        Ok(())
    }

    async fn get_refresh_token(&self, owner_id: OwnerId) -> anyhow::Result<String> {
        self.get_integration(owner_id)
            .await?
            .map(|record| record.refresh_token)
            .ok_or_else(|| DomainError::IntegrationNotFound(owner_id).into())
    }

    async fn rotate_refresh_token(
        &self,
        owner_id: OwnerId,
        expected: &str,
        refresh_token: &str,
    ) -> anyhow::Result<bool> {
        let row = sqlx::query(
            "SELECT user_id, refresh_token FROM onedrive_integrations \
             WHERE owner_id = ? AND is_active = 1",
        )
        .bind(owner_id.get())
        .fetch_optional(&self.pool)
        .await
        .map_err(CacheError::from)?
        .ok_or(DomainError::IntegrationNotFound(owner_id))?;

        let user_id: String = row.get("user_id");
        let stored_token: String = row.get("refresh_token");
        let current = self
            .cipher
            .decrypt(&stored_token)
            .map_err(|e| CacheError::SerializationError(format!("refresh token: {e}")))?;
        if current != expected {
            tracing::debug!(owner_id = %owner_id, "Stored refresh token changed, skipping rotation");
            return Ok(false);
        }

        // Compare-and-swap on the row as read; a concurrent save changes the
        // stored ciphertext and leaves this update without effect.
        let result = sqlx::query(
            "UPDATE onedrive_integrations SET refresh_token = ?, updated_at = ? \
             WHERE owner_id = ? AND is_active = 1 AND user_id = ? AND refresh_token = ?",
        )
        .bind(self.seal(refresh_token)?)
        .bind(Utc::now().to_rfc3339())
        .bind(owner_id.get())
        .bind(&user_id)
        .bind(&stored_token)
        .execute(&self.pool)
        .await
        .map_err(CacheError::from)?;

        let rotated = result.rows_affected() > 0;
        tracing::trace!(owner_id = %owner_id, rotated, "Rotated refresh token");
        Ok(rotated)
    }
}
