//! Repository client port definition.
//!
//! All paths handed to a client are repository paths: already prefixed and
//! normalized, with no leading slash.

use std::io::Read;

use chrono::{DateTime, FixedOffset};
use serde::Deserialize;

use crate::domain::ClientError;

/// File metadata returned by a metadata read.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FileMetadata {
    pub file_path: String,
    pub size: Option<u64>,
    pub blob_id: Option<String>,
    pub last_commit_id: Option<String>,
    /// Hex SHA-256 digest of the file content.
    pub content_sha256: Option<String>,
}

/// Result of a create, update or delete.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Commit {
    pub id: Option<String>,
    pub path: String,
    pub message: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TreeEntryKind {
    /// A file.
    Blob,
    /// A directory.
    Tree,
    /// A submodule pointer.
    Commit,
}

/// One entry of a tree listing.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct TreeEntry {
    #[serde(rename = "type")]
    pub kind: TreeEntryKind,
    pub path: String,
    #[serde(default)]
    pub name: String,
}

impl TreeEntry {
    pub fn is_directory(&self) -> bool {
        self.kind == TreeEntryKind::Tree
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct BlameCommit {
    #[serde(default)]
    pub id: String,
    pub committed_date: DateTime<FixedOffset>,
}

/// A run of lines attributed to a single commit.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct BlameRange {
    pub commit: BlameCommit,
}

/// Pages of a tree listing, fetched one at a time as the iterator advances.
///
/// After an error the iterator is exhausted.
pub type TreePages<'a> = Box<dyn Iterator<Item = Result<Vec<TreeEntry>, ClientError>> + 'a>;

/// Port for remote repository operations.
///
/// Implementations perform no retries and hold no cache; every call reflects
/// the latest commit on the configured branch.
pub trait RepositoryClient: Send + Sync {
    /// Read file metadata without its content.
    fn read_metadata(&self, path: &str) -> Result<FileMetadata, ClientError>;

    /// Read the raw file content.
    fn read_raw(&self, path: &str) -> Result<Vec<u8>, ClientError>;

    /// Open the raw file content as a stream. `None` means the store returned no content.
    fn read_stream(&self, path: &str) -> Result<Option<Box<dyn Read + Send>>, ClientError>;

    /// Create (`overwrite == false`) or update (`overwrite == true`) a file.
    fn upload(
        &self,
        path: &str,
        contents: &[u8],
        message: &str,
        overwrite: bool,
    ) -> Result<Commit, ClientError>;

    /// Same as [`upload`](Self::upload) but consumes the content from a reader.
    fn upload_stream(
        &self,
        path: &str,
        contents: Box<dyn Read + Send>,
        message: &str,
        overwrite: bool,
    ) -> Result<Commit, ClientError>;

    fn delete(&self, path: &str, message: &str) -> Result<Commit, ClientError>;

    /// List the entries at `path` (the root when empty), descending into
    /// subdirectories when `recursive` is set.
    fn tree(&self, path: &str, recursive: bool) -> TreePages<'_>;

    /// Blame ranges for the file, in line order.
    fn blame(&self, path: &str) -> Result<Vec<BlameRange>, ClientError>;
}

impl<C: RepositoryClient + ?Sized> RepositoryClient for Box<C> {
    fn read_metadata(&self, path: &str) -> Result<FileMetadata, ClientError> {
        (**self).read_metadata(path)
    }

    fn read_raw(&self, path: &str) -> Result<Vec<u8>, ClientError> {
        (**self).read_raw(path)
    }

    fn read_stream(&self, path: &str) -> Result<Option<Box<dyn Read + Send>>, ClientError> {
        (**self).read_stream(path)
    }

    fn upload(
        &self,
        path: &str,
        contents: &[u8],
        message: &str,
        overwrite: bool,
    ) -> Result<Commit, ClientError> {
        (**self).upload(path, contents, message, overwrite)
    }

    fn upload_stream(
        &self,
        path: &str,
        contents: Box<dyn Read + Send>,
        message: &str,
        overwrite: bool,
    ) -> Result<Commit, ClientError> {
        (**self).upload_stream(path, contents, message, overwrite)
    }

    fn delete(&self, path: &str, message: &str) -> Result<Commit, ClientError> {
        (**self).delete(path, message)
    }

    fn tree(&self, path: &str, recursive: bool) -> TreePages<'_> {
        (**self).tree(path, recursive)
    }

    fn blame(&self, path: &str) -> Result<Vec<BlameRange>, ClientError> {
        (**self).blame(path)
    }
}
