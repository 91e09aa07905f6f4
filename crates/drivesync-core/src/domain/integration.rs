//! Persisted binding of an owner to its OneDrive credentials

use std::fmt;

use chrono::{DateTime, Utc};

use super::owner::OwnerId;

/// One active OneDrive integration per owner
///
/// The refresh token held here is already decrypted; it is only ever
/// handed to the OAuth token exchange.
#[derive(Clone, PartialEq, Eq)]
pub struct IntegrationRecord {
    pub owner_id: OwnerId,
    pub user_id: String,
    pub refresh_token: String,
    pub updated_at: DateTime<Utc>,
}

impl IntegrationRecord {
    pub fn new(
        owner_id: OwnerId,
        user_id: impl Into<String>,
        refresh_token: impl Into<String>,
    ) -> Self {
        Self {
            owner_id,
            user_id: user_id.into(),
            refresh_token: refresh_token.into(),
            updated_at: Utc::now(),
        }
    }
}

impl fmt::Debug for IntegrationRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IntegrationRecord")
            .field("owner_id", &self.owner_id)
            .field("user_id", &self.user_id)
            .field("refresh_token", &"<redacted>")
            .field("updated_at", &self.updated_at)
            .finish()
    }
}
