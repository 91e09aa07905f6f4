//! File synchronization use case
//!
//! Copies objects from object storage into an owner's drive. The object's
//! declared size picks the upload protocol: a single PUT below 4 MiB, a
//! resumable session at or above it.

use std::sync::Arc;

use anyhow::{Context, Result};
use futures_util::stream::{self, StreamExt};
use tracing::{debug, info, warn};

use crate::{
    domain::{
        DomainError, DriveTarget, OwnerId, SyncBatchCommand, SyncCommand, UploadDescriptor,
        UploadRoute,
    },
    ports::{ICredentialStore, IDriveUploader, IObjectStorage, UploadedItem},
};

/// Default number of batch items synced at the same time
pub const DEFAULT_BATCH_CONCURRENCY: usize = 4;

/// Per-item results of a sync batch
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchOutcome {
    pub synced: usize,
    pub failed: usize,
}

/// Use case for file sync messages
pub struct SyncFileUseCase {
    credential_store: Arc<dyn ICredentialStore>,
    object_storage: Arc<dyn IObjectStorage>,
    drive_uploader: Arc<dyn IDriveUploader>,
    batch_concurrency: usize,
}

impl SyncFileUseCase {
    /// Creates a new SyncFileUseCase
    ///
    /// # Arguments
    ///
    /// * `credential_store` - Looks up the owner's integration
    /// * `object_storage` - Source of the objects to copy
    /// * `drive_uploader` - Destination drive service
    pub fn new(
        credential_store: Arc<dyn ICredentialStore>,
        object_storage: Arc<dyn IObjectStorage>,
        drive_uploader: Arc<dyn IDriveUploader>,
    ) -> Self {
        Self {
            credential_store,
            object_storage,
            drive_uploader,
            batch_concurrency: DEFAULT_BATCH_CONCURRENCY,
        }
    }

    /// Sets how many batch items are synced at the same time (minimum 1)
    pub fn with_batch_concurrency(mut self, concurrency: usize) -> Self {
        self.batch_concurrency = concurrency.max(1);
        self
    }

    /// Handles one sync command
    ///
    /// This method:
    /// 1. Looks up the owner's integration (a sync requires prior authorization)
    /// 2. Parses the destination into a drive target
    /// 3. Copies the object with [`sync_file`](Self::sync_file)
    ///
    /// # Errors
    ///
    /// Returns `DomainError::IntegrationNotFound` (wrapped) when the owner has
    /// no integration; no object is fetched in that case.
    pub async fn sync(&self, command: &SyncCommand) -> Result<UploadedItem> {
        let owner_id = command.owner_id;

        let integration = self
            .credential_store
            .get_integration(owner_id)
            .await
            .context("Failed to look up OneDrive integration")?
            .ok_or(DomainError::IntegrationNotFound(owner_id))?;

        debug!(
            owner_id = %owner_id,
            user_id = %integration.user_id,
            "Resolved OneDrive integration"
        );

        let target = DriveTarget::parse(&command.destination)?;

        self.sync_file(owner_id, &command.bucket, &command.key, target)
            .await
    }

    /// Copies one object into the drive
    ///
    /// This method:
    /// 1. Opens the object as a stream with its declared content length
    /// 2. Builds the upload descriptor (file name from the last key segment)
    /// 3. Uploads inline below [`SIMPLE_UPLOAD_THRESHOLD`](crate::domain::SIMPLE_UPLOAD_THRESHOLD),
    ///    through a resumable session otherwise
    ///
    /// # Errors
    ///
    /// Any fetch or upload error aborts the copy.
    pub async fn sync_file(
        &self,
        owner_id: OwnerId,
        bucket: &str,
        key: &str,
        target: DriveTarget,
    ) -> Result<UploadedItem> {
        let object = self
            .object_storage
            .get_object(bucket, key)
            .await
            .with_context(|| format!("Failed to fetch object {bucket}/{key}"))?;

        let descriptor = UploadDescriptor::new(target, key, object.content_length)?;
        let route = descriptor.route();

        info!(
            owner_id = %owner_id,
            bucket,
            key,
            size = descriptor.size,
            folder = %descriptor.folder_path,
            file_name = %descriptor.file_name,
            route = ?route,
            "Uploading object to OneDrive"
        );

        let item = match route {
            UploadRoute::Inline => self
                .drive_uploader
                .upload_small(owner_id, &descriptor, object.body)
                .await
                .context("Failed to upload file inline")?,
            UploadRoute::Large => self
                .drive_uploader
                .upload_large(owner_id, &descriptor, object.body)
                .await
                .context("Failed to upload file through upload session")?,
        };

        info!(owner_id = %owner_id, item_id = %item.id, "Object synced");
        Ok(item)
    }

    async fn sync_indexed(
        &self,
        index: usize,
        command: &SyncCommand,
    ) -> (usize, Result<UploadedItem>) {
        (index, self.sync(command).await)
    }

    /// Syncs every item of a batch with bounded concurrency
    ///
    /// Items are independent: one failure does not stop the others.
    ///
    /// # Errors
    ///
    /// Returns an error naming the failure count if any item failed.
    pub async fn sync_batch(&self, batch: &SyncBatchCommand) -> Result<BatchOutcome> {
        let uploads: Vec<_> = batch
            .items
            .iter()
            .enumerate()
            .map(|(index, item)| self.sync_indexed(index, item))
            .collect();
        let results: Vec<(usize, Result<UploadedItem>)> = stream::iter(uploads)
            .buffer_unordered(self.batch_concurrency)
            .collect()
            .await;

        let mut outcome = BatchOutcome::default();
        for (index, result) in results {
            match result {
                Ok(_) => outcome.synced += 1,
                Err(e) => {
                    let item = &batch.items[index];
                    warn!(
                        owner_id = %item.owner_id,
                        bucket = %item.bucket,
                        key = %item.key,
                        error = %format!("{e:#}"),
                        "Batch item failed to sync"
                    );
                    outcome.failed += 1;
                }
            }
        }

        if outcome.failed > 0 {
            anyhow::bail!(
                "{} of {} files failed to sync",
                outcome.failed,
                batch.items.len()
            );
        }

        Ok(outcome)
    }
}
