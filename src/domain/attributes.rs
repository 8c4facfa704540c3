//! Attributes reported for files and emulated directories.

use chrono::{DateTime, Utc};
use serde::Serialize;

/// Metadata resolved for a single file. Every attribute is optional because
/// each one comes from a different lookup.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct FileAttributes {
    pub path: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file_size: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_modified: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mime_type: Option<String>,
}

impl FileAttributes {
    pub fn new(path: impl Into<String>) -> Self {
        Self { path: path.into(), ..Default::default() }
    }

    pub fn with_file_size(mut self, size: u64) -> Self {
        self.file_size = Some(size);
        self
    }

    pub fn with_last_modified(mut self, at: Option<DateTime<Utc>>) -> Self {
        self.last_modified = at;
        self
    }

    pub fn with_mime_type(mut self, mime_type: Option<String>) -> Self {
        self.mime_type = mime_type;
        self
    }

    /// Last modification as seconds since the Unix epoch.
    pub fn last_modified_timestamp(&self) -> Option<i64> {
        self.last_modified.map(|at| at.timestamp())
    }
}

/// One item produced by a contents listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type")]
pub enum StorageEntry {
    #[serde(rename = "file")]
    File(FileAttributes),
    #[serde(rename = "dir")]
    Directory { path: String },
}

impl StorageEntry {
    pub fn path(&self) -> &str {
        match self {
            StorageEntry::File(attributes) => &attributes.path,
            StorageEntry::Directory { path } => path,
        }
    }

    pub fn is_file(&self) -> bool {
        matches!(self, StorageEntry::File(_))
    }

    pub fn is_dir(&self) -> bool {
        matches!(self, StorageEntry::Directory { .. })
    }

    /// `"file"` or `"dir"`.
    pub fn type_name(&self) -> &'static str {
        match self {
            StorageEntry::File(_) => "file",
            StorageEntry::Directory { .. } => "dir",
        }
    }
}

/// Access level a conventional filesystem could attach to a path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Visibility {
    Public,
    Private,
}

/// Options for mutating operations.
#[derive(Debug, Clone, Default)]
pub struct WriteConfig {
    /// Replaces the default message of every commit the call makes. A move
    /// uses it for both the upload at the destination and the delete of the
    /// source.
    pub commit_message: Option<String>,
}

impl WriteConfig {
    pub fn with_commit_message(message: impl Into<String>) -> Self {
        Self { commit_message: Some(message.into()) }
    }
}
