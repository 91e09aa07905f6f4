//! Shared test helpers for the token endpoint and Graph API integration tests

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use drivesync_core::{
    domain::{IntegrationRecord, OwnerId},
    ports::{ByteStream, IAccessTokenSource, ICredentialStore},
};
use drivesync_graph::{
    auth::{OAuthClient, OAuthTokenSource},
    client::GraphClient,
};
use futures_util::{stream, StreamExt};
use wiremock::matchers::{body_string_contains, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

pub const TOKEN_PATH: &str = "/common/oauth2/v2.0/token";

/// Credential store holding records in memory
#[derive(Default)]
pub struct MemoryStore {
    records: Mutex<HashMap<OwnerId, IntegrationRecord>>,
    pub fail_rotation: bool,
}

impl MemoryStore {
    pub fn with_token(owner_id: OwnerId, refresh_token: &str) -> Self {
        let store = Self::default();
        store.records.lock().unwrap().insert(
            owner_id,
            IntegrationRecord::new(owner_id, "user", refresh_token),
        );
        store
    }

    pub fn user_id(&self, owner_id: OwnerId) -> Option<String> {
        self.records
            .lock()
            .unwrap()
            .get(&owner_id)
            .map(|r| r.user_id.clone())
    }

    pub fn refresh_token(&self, owner_id: OwnerId) -> Option<String> {
        self.records
            .lock()
            .unwrap()
            .get(&owner_id)
            .map(|r| r.refresh_token.clone())
    }
}

#[async_trait]
impl ICredentialStore for MemoryStore {
    async fn get_integration(
        &self,
        owner_id: OwnerId,
    ) -> anyhow::Result<Option<IntegrationRecord>> {
        Ok(self.records.lock().unwrap().get(&owner_id).cloned())
    }

    async fn save_refresh_token(
        &self,
        owner_id: OwnerId,
        user_id: &str,
        refresh_token: &str,
    ) -> anyhow::Result<()> {
        self.records.lock().unwrap().insert(
            owner_id,
            IntegrationRecord::new(owner_id, user_id, refresh_token),
        );
        Ok(())
    }

    async fn get_refresh_token(&self, owner_id: OwnerId) -> anyhow::Result<String> {
        self.refresh_token(owner_id)
            .ok_or_else(|| anyhow::anyhow!("no integration found for owner {owner_id}"))
    }

    async fn rotate_refresh_token(
        &self,
        owner_id: OwnerId,
        expected: &str,
        refresh_token: &str,
    ) -> anyhow::Result<bool> {
        if self.fail_rotation {
            anyhow::bail!("database is locked");
        }
        let mut records = self.records.lock().unwrap();
        let record = records
            .get_mut(&owner_id)
            .ok_or_else(|| anyhow::anyhow!("no integration found for owner {owner_id}"))?;
        if record.refresh_token != expected {
            return Ok(false);
        }
        record.refresh_token = refresh_token.to_string();
        Ok(true)
    }
}

/// Token source returning a fixed access token
pub struct StaticTokenSource(pub &'static str);

#[async_trait]
impl IAccessTokenSource for StaticTokenSource {
    async fn access_token(&self, _owner_id: OwnerId) -> anyhow::Result<String> {
        Ok(self.0.to_string())
    }

    fn invalidate(&self, _owner_id: OwnerId) {}
}

pub fn oauth_client(server: &MockServer) -> OAuthClient {
    OAuthClient::new(
        reqwest::Client::new(),
        format!("{}{}", server.uri(), TOKEN_PATH),
        "client-id",
        "client-secret",
    )
}

pub fn token_source(server: &MockServer, store: Arc<MemoryStore>, cache: bool) -> OAuthTokenSource {
    OAuthTokenSource::new(oauth_client(server), store).with_cache(cache)
}

/// Returns a (MockServer, GraphClient) pair authenticated with `test-access-token`
pub async fn setup_graph_mock() -> (MockServer, Arc<GraphClient>) {
    setup_graph_mock_with_timeout(Duration::from_secs(30)).await
}

pub async fn setup_graph_mock_with_timeout(timeout: Duration) -> (MockServer, Arc<GraphClient>) {
    let server = MockServer::start().await;
    let client = GraphClient::with_base_url(
        Arc::new(StaticTokenSource("test-access-token")),
        server.uri(),
        timeout,
    )
    .expect("Failed to build Graph client");
    (server, Arc::new(client))
}

/// Mounts a token endpoint that accepts `refresh_token` and answers with `response`
pub async fn mount_token(server: &MockServer, refresh_token: &str, response: serde_json::Value) {
    Mock::given(method("POST"))
        .and(path(TOKEN_PATH))
        .and(body_string_contains(format!("refresh_token={refresh_token}")))
        .respond_with(ResponseTemplate::new(200).set_body_json(response))
        .mount(server)
        .await;
}

/// Splits `data` into a multi-chunk body stream
pub fn body_stream(data: Vec<u8>) -> ByteStream {
    let chunks: Vec<std::io::Result<Bytes>> = data
        .chunks(1024)
        .map(|c| Ok(Bytes::copy_from_slice(c)))
        .collect();
    stream::iter(chunks).boxed()
}
