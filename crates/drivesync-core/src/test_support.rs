//! In-memory port fakes shared by the unit tests of this crate

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use bytes::Bytes;
use futures_util::{stream, StreamExt, TryStreamExt};

use crate::domain::{DomainError, IntegrationRecord, OwnerId, UploadDescriptor, UploadRoute};
use crate::ports::{
    ByteStream, IAccessTokenSource, ICredentialStore, IDriveUploader, IObjectStorage,
    StoredObject, UploadedItem,
};

/// Credential store backed by a HashMap
pub struct MockCredentialStore {
    records: Mutex<HashMap<OwnerId, IntegrationRecord>>,
    fail_writes: AtomicBool,
}

impl MockCredentialStore {
    pub fn new() -> Self {
        Self {
            records: Mutex::new(HashMap::new()),
            fail_writes: AtomicBool::new(false),
        }
    }

    pub fn insert(&self, owner_id: OwnerId, user_id: &str, refresh_token: &str) {
        self.records.lock().unwrap().insert(
            owner_id,
            IntegrationRecord::new(owner_id, user_id, refresh_token),
        );
    }

    pub fn fail_writes(&self) {
        self.fail_writes.store(true, Ordering::SeqCst);
    }
}

#[async_trait]
impl ICredentialStore for MockCredentialStore {
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
        if self.fail_writes.load(Ordering::SeqCst) {
            anyhow::bail!("database is locked");
        }
        self.insert(owner_id, user_id, refresh_token);
        Ok(())
    }

    async fn get_refresh_token(&self, owner_id: OwnerId) -> anyhow::Result<String> {
        self.records
            .lock()
            .unwrap()
            .get(&owner_id)
            .map(|r| r.refresh_token.clone())
            .ok_or_else(|| DomainError::IntegrationNotFound(owner_id).into())
    }

    async fn rotate_refresh_token(
        &self,
        owner_id: OwnerId,
        expected: &str,
        refresh_token: &str,
    ) -> anyhow::Result<bool> {
        let mut records = self.records.lock().unwrap();
        let record = records
            .get_mut(&owner_id)
            .ok_or(DomainError::IntegrationNotFound(owner_id))?;
        if record.refresh_token != expected {
            return Ok(false);
        }
        record.refresh_token = refresh_token.to_string();
        Ok(true)
    }
}

/// Token source that "exchanges" whatever refresh token the store holds
pub struct MockTokenSource {
    store: Arc<MockCredentialStore>,
    fail: bool,
    exchanged: Mutex<Vec<String>>,
    invalidated: Mutex<Vec<OwnerId>>,
}

impl MockTokenSource {
    pub fn new(store: Arc<MockCredentialStore>) -> Self {
        Self {
            store,
            fail: false,
            exchanged: Mutex::new(Vec::new()),
            invalidated: Mutex::new(Vec::new()),
        }
    }

    pub fn failing(store: Arc<MockCredentialStore>) -> Self {
        Self {
            fail: true,
            ..Self::new(store)
        }
    }

    pub fn exchanged(&self) -> Vec<String> {
        self.exchanged.lock().unwrap().clone()
    }

    pub fn invalidated(&self) -> Vec<OwnerId> {
        self.invalidated.lock().unwrap().clone()
    }
}

#[async_trait]
impl IAccessTokenSource for MockTokenSource {
    async fn access_token(&self, owner_id: OwnerId) -> anyhow::Result<String> {
        let refresh_token = self.store.get_refresh_token(owner_id).await?;
        self.exchanged.lock().unwrap().push(refresh_token.clone());
        if self.fail {
            anyhow::bail!("token exchange failed: status 400");
        }
        Ok(format!("access-for-{refresh_token}"))
    }

    fn invalidate(&self, owner_id: OwnerId) {
        self.invalidated.lock().unwrap().push(owner_id);
    }
}

/// Object storage holding objects in memory
pub struct MockObjectStorage {
    objects: Mutex<HashMap<(String, String), Vec<u8>>>,
    fetches: AtomicUsize,
}

impl MockObjectStorage {
    pub fn new() -> Self {
        Self {
            objects: Mutex::new(HashMap::new()),
            fetches: AtomicUsize::new(0),
        }
    }

    pub fn put(&self, bucket: &str, key: &str, data: Vec<u8>) {
        self.objects
            .lock()
            .unwrap()
            .insert((bucket.to_string(), key.to_string()), data);
    }

    pub fn fetches(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl IObjectStorage for MockObjectStorage {
    async fn get_object(&self, bucket: &str, key: &str) -> anyhow::Result<StoredObject> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        let data = self
            .objects
            .lock()
            .unwrap()
            .get(&(bucket.to_string(), key.to_string()))
            .cloned()
            .ok_or_else(|| anyhow::anyhow!("NoSuchKey: {bucket}/{key}"))?;

        Ok(StoredObject {
            content_length: data.len() as u64,
            body: stream::once(async move { Ok(Bytes::from(data)) }).boxed(),
        })
    }
}

/// Uploader that drains the body and records each call
pub struct MockUploader {
    calls: Mutex<Vec<(UploadRoute, UploadDescriptor, usize)>>,
    fail: AtomicBool,
}

impl MockUploader {
    pub fn new() -> Self {
        Self {
            calls: Mutex::new(Vec::new()),
            fail: AtomicBool::new(false),
        }
    }

    pub fn fail_uploads(&self) {
        self.fail.store(true, Ordering::SeqCst);
    }

    /// `(route, descriptor, bytes received)` per upload
    pub fn calls(&self) -> Vec<(UploadRoute, UploadDescriptor, usize)> {
        self.calls.lock().unwrap().clone()
    }

    async fn record(
        &self,
        route: UploadRoute,
        descriptor: &UploadDescriptor,
        body: ByteStream,
    ) -> anyhow::Result<UploadedItem> {
        if self.fail.load(Ordering::SeqCst) {
            anyhow::bail!("upload failed with status 507");
        }
        let received = body
            .try_fold(0usize, |acc, chunk| async move { Ok(acc + chunk.len()) })
            .await?;
        self.calls
            .lock()
            .unwrap()
            .push((route, descriptor.clone(), received));
        Ok(UploadedItem {
            id: format!("item-{}", descriptor.file_name),
            name: descriptor.file_name.clone(),
            size: Some(received as u64),
        })
    }
}

#[async_trait]
impl IDriveUploader for MockUploader {
    async fn upload_small(
        &self,
        _owner_id: OwnerId,
        descriptor: &UploadDescriptor,
        body: ByteStream,
    ) -> anyhow::Result<UploadedItem> {
        self.record(UploadRoute::Inline, descriptor, body).await
    }

    async fn upload_large(
        &self,
        _owner_id: OwnerId,
        descriptor: &UploadDescriptor,
        body: ByteStream,
    ) -> anyhow::Result<UploadedItem> {
        self.record(UploadRoute::Large, descriptor, body).await
    }
}
