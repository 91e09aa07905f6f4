//! Access token source port

use crate::domain::OwnerId;

/// Produces short-lived access tokens for an owner's drive integration
///
/// Implementations read the owner's refresh token from the credential store
/// and exchange it with the identity provider. Access tokens are never
/// persisted.
#[async_trait::async_trait]
pub trait IAccessTokenSource: Send + Sync {
    /// Returns an access token for `owner_id`
    async fn access_token(&self, owner_id: OwnerId) -> anyhow::Result<String>;

    /// Drops any cached access token for `owner_id`
    fn invalidate(&self, owner_id: OwnerId);
}
