//! Drive targets and upload descriptors
//!
//! A sync command names its target as a single `destination` string. This
//! module parses it into a [`DriveTarget`] and combines it with the object
//! key and size into an [`UploadDescriptor`], which decides between the
//! inline and large-file upload paths.
//!
//! ## Destination format
//!
//! ```text
//! [<drive_id>:]<folder_path>
//!
//! "/Documents/Reports"       -> owner's default drive, folder "Documents/Reports"
//! "b!x7Qa:/Shared/Invoices"  -> drive "b!x7Qa", folder "Shared/Invoices"
//! "/" or ""                  -> owner's default drive, root folder
//! ```

use super::errors::DomainError;

/// Objects smaller than this are uploaded with a single PUT request.
/// Objects of exactly this size or larger take the large-file path.
pub const SIMPLE_UPLOAD_THRESHOLD: u64 = 4 * 1024 * 1024;

/// Where in the drive service a file should be written
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DriveTarget {
    /// Explicit drive id; `None` selects the owner's default drive
    pub drive_id: Option<String>,
    /// Folder path without leading or trailing slashes; empty for the root
    pub folder_path: String,
}

impl DriveTarget {
    /// Parses a destination string
    ///
    /// # Errors
    ///
    /// Returns `DomainError::InvalidDestination` if the drive id prefix is
    /// empty or the folder path contains `.` or `..` segments.
    pub fn parse(destination: &str) -> Result<Self, DomainError> {
        let destination = destination.trim();

        let (drive_id, folder) = match destination.split_once(':') {
            Some((drive, rest)) if !drive.contains('/') => {
                if drive.trim().is_empty() {
                    return Err(DomainError::InvalidDestination(destination.to_string()));
                }
                (Some(drive.trim().to_string()), rest)
            }
            _ => (None, destination),
        };

        let folder_path = folder.trim_matches('/').to_string();
        if folder_path
            .split('/')
            .any(|segment| segment == ".." || segment == ".")
        {
            return Err(DomainError::InvalidDestination(destination.to_string()));
        }

        Ok(Self {
            drive_id,
            folder_path,
        })
    }
}

/// Which upload protocol a file will use
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UploadRoute {
    /// Single PUT of the whole body
    Inline,
    /// Resumable upload session
    Large,
}

/// Everything the drive uploader needs to place one file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadDescriptor {
    pub drive_id: Option<String>,
    pub folder_path: String,
    pub file_name: String,
    pub size: u64,
}

impl UploadDescriptor {
    /// Builds a descriptor from a parsed target, the source object key and its size
    ///
    /// The file name is the last `/`-separated segment of `key`.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::InvalidObjectKey` if the key is empty or ends with `/`.
    pub fn new(target: DriveTarget, key: &str, size: u64) -> Result<Self, DomainError> {
        let file_name = key.rsplit('/').next().unwrap_or_default().trim();
        if file_name.is_empty() || file_name == "." || file_name == ".." {
            return Err(DomainError::InvalidObjectKey(key.to_string()));
        }

        Ok(Self {
            drive_id: target.drive_id,
            folder_path: target.folder_path,
            file_name: file_name.to_string(),
            size,
        })
    }

    /// Chooses the upload protocol for this file's size
    pub fn route(&self) -> UploadRoute {
        if self.size < SIMPLE_UPLOAD_THRESHOLD {
            UploadRoute::Inline
        } else {
            UploadRoute::Large
        }
    }
}
