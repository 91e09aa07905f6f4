//! OneDrive uploads
//!
//! Implements [`IDriveUploader`] on top of [`GraphClient`]. Files below
//! [`SIMPLE_UPLOAD_THRESHOLD`] are streamed in a single PUT request. Upload
//! sessions for larger files are not implemented by this adapter.

use std::sync::Arc;

use anyhow::{Context, Result};
use async_trait::async_trait;
use drivesync_core::{
    domain::{OwnerId, UploadDescriptor, SIMPLE_UPLOAD_THRESHOLD},
    ports::{ByteStream, IDriveUploader, UploadedItem},
};
use reqwest::{
    header::{HeaderMap, HeaderValue, CONTENT_LENGTH, CONTENT_TYPE},
    Body, Method,
};
use serde::Deserialize;
use tracing::{debug, info};

use crate::{client::GraphClient, GraphError};

// ============================================================================
// Graph API response types
// ============================================================================

/// DriveItem returned by a completed upload
#[derive(Debug, Deserialize)]
struct DriveItemResponse {
    id: String,
    name: String,
    #[serde(default)]
    size: Option<u64>,
}

impl From<DriveItemResponse> for UploadedItem {
    fn from(item: DriveItemResponse) -> Self {
        UploadedItem {
            id: item.id,
            name: item.name,
            size: item.size,
        }
    }
}

// ============================================================================
// API path construction helper
// ============================================================================

/// Builds the item-by-path Graph API path for an upload
///
/// - Default drive: `/me/drive/root:/{folder}/{name}:/{suffix}`
/// - Explicit drive: `/drives/{drive_id}/root:/{folder}/{name}:/{suffix}`
///
/// Each path segment is percent-encoded; an empty folder means the drive root.
pub fn build_item_path(descriptor: &UploadDescriptor, suffix: &str) -> String {
    let drive = match &descriptor.drive_id {
        Some(id) => format!("/drives/{}", urlencoding::encode(id)),
        None => "/me/drive".to_string(),
    };

    let segments: Vec<String> = descriptor
        .folder_path
        .split('/')
        .filter(|s| !s.is_empty())
        .chain(std::iter::once(descriptor.file_name.as_str()))
        .map(|s| urlencoding::encode(s).into_owned())
        .collect();

    format!("{}/root:/{}:/{}", drive, segments.join("/"), suffix)
}

// ============================================================================
// GraphDriveUploader
// ============================================================================

/// [`IDriveUploader`] backed by the Microsoft Graph API
pub struct GraphDriveUploader {
    client: Arc<GraphClient>,
}

impl GraphDriveUploader {
    pub fn new(client: Arc<GraphClient>) -> Self {
        Self { client }
    }
}

#[async_trait]
impl IDriveUploader for GraphDriveUploader {
    /// Streams the body in a single `PUT .../content` request
    ///
    /// The declared size is sent as `Content-Length`.
    async fn upload_small(
        &self,
        owner_id: OwnerId,
        descriptor: &UploadDescriptor,
        body: ByteStream,
    ) -> Result<UploadedItem> {
        let path = build_item_path(descriptor, "content");
        debug!(
            owner_id = %owner_id,
            size = descriptor.size,
            path = %path,
            "Uploading small file"
        );

        let mut headers = HeaderMap::new();
        headers.insert(
            CONTENT_TYPE,
            HeaderValue::from_static("application/octet-stream"),
        );
        headers.insert(CONTENT_LENGTH, HeaderValue::from(descriptor.size));

        let response = self
            .client
            .authenticated_request(
                owner_id,
                Method::PUT,
                &path,
                Some(Body::wrap_stream(body)),
                headers,
            )
            .await
            .context("Small upload request failed")?;

        let text = response
            .text()
            .await
            .context("Failed to read upload response")?;
        let item: DriveItemResponse = serde_json::from_str(&text)
            .map_err(|e| GraphError::InvalidResponse(format!("upload response: {e}")))?;

        info!(
            owner_id = %owner_id,
            item_id = %item.id,
            name = %item.name,
            "Small upload completed"
        );
        Ok(item.into())
    }

    /// Upload sessions are not implemented; always fails with
    /// [`GraphError::Unsupported`] without consuming the body
    async fn upload_large(
        &self,
        owner_id: OwnerId,
        descriptor: &UploadDescriptor,
        _body: ByteStream,
    ) -> Result<UploadedItem> {
        debug!(
            owner_id = %owner_id,
            size = descriptor.size,
            threshold = SIMPLE_UPLOAD_THRESHOLD,
            "Large upload requested"
        );
        Err(GraphError::Unsupported(format!(
            "upload session for {} ({} bytes)",
            descriptor.file_name, descriptor.size
        ))
        .into())
    }
}

// ============================================================================
// Unit tests
// ============================================================================
