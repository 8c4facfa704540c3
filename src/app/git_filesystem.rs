//! Filesystem semantics over a version-controlled repository.
//!
//! The remote API only knows per-file create, update and delete plus tree
//! listings. Directories are inferred from the files they contain, empty
//! directories are kept alive by a [`DIRECTORY_MARKER`] file, and every
//! mutation becomes its own commit.
//!
//! `move_file`, `copy` and `delete_directory` are composed from several
//! commits and are not atomic. A failure part-way leaves the earlier commits
//! in place: a failed move can leave the file at both locations, and a failed
//! directory delete leaves the files it already removed deleted.

use std::io::Read;

use chrono::{DateTime, Utc};
use tracing::{debug, warn};

use crate::app::contents_listing::ContentsListing;
use crate::domain::digest::sha256_hex;
use crate::domain::path_prefixer::join;
use crate::domain::{
    ClientError, FileAttributes, FilesystemError, MetadataKind, PathPrefixer, Visibility,
    WriteConfig, mime,
};
use crate::ports::{Commit, FilesystemAdapter, Listing, RepositoryClient};

pub const UPLOADED_FILE_COMMIT_MESSAGE: &str = "Uploaded file via GIT API";
pub const DELETED_FILE_COMMIT_MESSAGE: &str = "Deleted file via GIT API";

/// Hidden zero-byte file that makes an otherwise empty directory visible.
pub const DIRECTORY_MARKER: &str = ".gitkeep";

/// Filesystem adapter backed by a [`RepositoryClient`].
///
/// The client is fixed for the adapter's lifetime; to switch credentials or
/// project, build a new adapter. Concurrent writers to the same path are not
/// coordinated: the remote commit order decides, last commit wins.
#[derive(Debug)]
pub struct GitFilesystem<C> {
    client: C,
    prefixer: PathPrefixer,
}

impl<C: RepositoryClient> GitFilesystem<C> {
    pub fn new(client: C) -> Self {
        Self::with_prefix(client, "")
    }

    /// Adapter whose paths are resolved below `prefix` inside the repository.
    pub fn with_prefix(client: C, prefix: &str) -> Self {
        Self { client, prefixer: PathPrefixer::new(prefix) }
    }

    pub fn client(&self) -> &C {
        &self.client
    }

    pub fn prefixer(&self) -> &PathPrefixer {
        &self.prefixer
    }

    fn location(&self, path: &str) -> String {
        self.prefixer.prefix_path(path)
    }

    /// Metadata probe where a missing file is an answer, not a failure.
    fn exists_at(&self, location: &str) -> Result<bool, ClientError> {
        match self.client.read_metadata(location) {
            Ok(_) => Ok(true),
            Err(err) if err.is_not_found() => Ok(false),
            Err(err) => Err(err),
        }
    }

    /// Upload that updates when the file exists and creates otherwise.
    fn upload_at(
        &self,
        location: &str,
        contents: &[u8],
        config: &WriteConfig,
    ) -> Result<Commit, ClientError> {
        let overwrite = self.exists_at(location)?;
        self.client.upload(location, contents, upload_message(config), overwrite)
    }

    pub(crate) fn file_size_at(&self, location: &str) -> Result<u64, ClientError> {
        Ok(self.client.read_metadata(location)?.size.unwrap_or(0))
    }

    /// Commit date of the newest blame range, `None` when blame is empty.
    pub(crate) fn last_modified_at(
        &self,
        location: &str,
    ) -> Result<Option<DateTime<Utc>>, ClientError> {
        let ranges = self.client.blame(location)?;
        Ok(ranges.iter().map(|range| range.commit.committed_date.with_timezone(&Utc)).max())
    }
}

fn upload_message(config: &WriteConfig) -> &str {
    config.commit_message.as_deref().unwrap_or(UPLOADED_FILE_COMMIT_MESSAGE)
}

fn delete_message(config: &WriteConfig) -> &str {
    config.commit_message.as_deref().unwrap_or(DELETED_FILE_COMMIT_MESSAGE)
}

impl<C: RepositoryClient> FilesystemAdapter for GitFilesystem<C> {
    fn file_exists(&self, path: &str) -> Result<bool, FilesystemError> {
        debug!(path, "file exists");
        self.exists_at(&self.location(path)).map_err(|err| FilesystemError::CheckExistenceFailed {
            path: path.to_string(),
            source: Box::new(err),
        })
    }

    /// True when a shallow listing at `path` yields anything at all. A path
    /// holding only files counts, and so does one whose only content is a
    /// marker file.
    fn directory_exists(&self, path: &str) -> Result<bool, FilesystemError> {
        debug!(path, "directory exists");
        let location = self.location(path);
        match self.client.tree(&location, false).next() {
            None => Ok(false),
            Some(Ok(page)) => Ok(!page.is_empty()),
            Some(Err(err)) if err.is_not_found() => Ok(false),
            Some(Err(err)) => Err(FilesystemError::CheckExistenceFailed {
                path: path.to_string(),
                source: Box::new(err),
            }),
        }
    }

    fn write(
        &self,
        path: &str,
        contents: &[u8],
        config: &WriteConfig,
    ) -> Result<(), FilesystemError> {
        debug!(path, bytes = contents.len(), "write");
        self.upload_at(&self.location(path), contents, config).map(|_| ()).map_err(|err| {
            FilesystemError::WriteFailed { path: path.to_string(), source: Box::new(err) }
        })
    }

    fn write_stream(
        &self,
        path: &str,
        contents: Box<dyn Read + Send>,
        config: &WriteConfig,
    ) -> Result<(), FilesystemError> {
        debug!(path, "write stream");
        let location = self.location(path);
        let result = self.exists_at(&location).and_then(|overwrite| {
            self.client.upload_stream(&location, contents, upload_message(config), overwrite)
        });
        result.map(|_| ()).map_err(|err| FilesystemError::WriteFailed {
            path: path.to_string(),
            source: Box::new(err),
        })
    }

    fn read(&self, path: &str) -> Result<Vec<u8>, FilesystemError> {
        debug!(path, "read");
        self.client.read_raw(&self.location(path)).map_err(|err| FilesystemError::read(path, err))
    }

    fn read_stream(&self, path: &str) -> Result<Box<dyn Read + Send>, FilesystemError> {
        debug!(path, "read stream");
        match self.client.read_stream(&self.location(path)) {
            Ok(Some(stream)) => Ok(stream),
            Ok(None) => Err(FilesystemError::ReadFailed {
                path: path.to_string(),
                reason: "Empty content".to_string(),
                source: None,
            }),
            Err(err) => Err(FilesystemError::read(path, err)),
        }
    }

    fn delete(&self, path: &str) -> Result<(), FilesystemError> {
        debug!(path, "delete");
        self.client
            .delete(&self.location(path), DELETED_FILE_COMMIT_MESSAGE)
            .map(|_| ())
            .map_err(|err| FilesystemError::DeleteFailed {
                path: path.to_string(),
                source: Box::new(err),
            })
    }

    /// Deletes the files directly inside `path`, one commit each.
    ///
    /// Subdirectories are not descended into. The listing is read in full
    /// before the first delete so that removals cannot shift later pages.
    fn delete_directory(&self, path: &str) -> Result<(), FilesystemError> {
        debug!(path, "delete directory");
        let fail = |err: ClientError| FilesystemError::DeleteDirectoryFailed {
            path: path.to_string(),
            source: Box::new(err),
        };

        let mut files = Vec::new();
        for page in self.client.tree(&self.location(path), false) {
            files.extend(page.map_err(fail)?.into_iter().filter(|e| !e.is_directory()));
        }

        for (deleted, entry) in files.iter().enumerate() {
            if let Err(err) = self.client.delete(&entry.path, DELETED_FILE_COMMIT_MESSAGE) {
                if deleted > 0 {
                    warn!(
                        path,
                        deleted,
                        remaining = files.len() - deleted,
                        "directory delete aborted after partial removal"
                    );
                }
                return Err(fail(err));
            }
        }
        Ok(())
    }

    fn create_directory(&self, path: &str, config: &WriteConfig) -> Result<(), FilesystemError> {
        debug!(path, "create directory");
        let marker = self.location(&join(path, DIRECTORY_MARKER));
        self.upload_at(&marker, b"", config).map(|_| ()).map_err(|err| {
            FilesystemError::CreateDirectoryFailed { path: path.to_string(), source: Box::new(err) }
        })
    }

    fn set_visibility(&self, path: &str, _visibility: Visibility) -> Result<(), FilesystemError> {
        debug!(path, "set visibility");
        Err(FilesystemError::VisibilityUnsupported { path: path.to_string() })
    }

    fn visibility(&self, path: &str) -> Result<Visibility, FilesystemError> {
        debug!(path, "visibility");
        Err(FilesystemError::VisibilityUnsupported { path: path.to_string() })
    }

    fn mime_type(&self, path: &str) -> Result<FileAttributes, FilesystemError> {
        debug!(path, "mime type");
        match mime::detect_from_path(&self.location(path)) {
            Some(mime_type) => Ok(FileAttributes::new(path).with_mime_type(Some(mime_type))),
            None => Err(FilesystemError::MetadataUnavailable {
                path: path.to_string(),
                kind: MetadataKind::MimeType,
                reason: None,
                source: None,
            }),
        }
    }

    fn last_modified(&self, path: &str) -> Result<FileAttributes, FilesystemError> {
        debug!(path, "last modified");
        let modified = self
            .last_modified_at(&self.location(path))
            .map_err(|err| FilesystemError::metadata(path, MetadataKind::LastModified, err))?;
        Ok(FileAttributes::new(path).with_last_modified(modified))
    }

    fn file_size(&self, path: &str) -> Result<FileAttributes, FilesystemError> {
        debug!(path, "file size");
        let size = self
            .file_size_at(&self.location(path))
            .map_err(|err| FilesystemError::metadata(path, MetadataKind::FileSize, err))?;
        Ok(FileAttributes::new(path).with_file_size(size))
    }

    fn list_contents(&self, path: &str, deep: bool) -> Listing<'_> {
        debug!(path, deep, "list contents");
        Box::new(ContentsListing::new(self, path, &self.location(path), deep))
    }

    fn move_file(
        &self,
        source: &str,
        destination: &str,
        config: &WriteConfig,
    ) -> Result<(), FilesystemError> {
        debug!(source, destination, "move");
        let fail = |err: ClientError| FilesystemError::MoveFailed {
            source_path: source.to_string(),
            destination: destination.to_string(),
            source: Box::new(err),
        };
        let from = self.location(source);
        let to = self.location(destination);

        let contents = self.client.read_raw(&from).map_err(fail)?;
        self.upload_at(&to, &contents, config).map_err(fail)?;
        self.client.delete(&from, delete_message(config)).map_err(|err| {
            warn!(source, destination, "move left the source in place after uploading the copy");
            fail(err)
        })?;
        Ok(())
    }

    fn copy(
        &self,
        source: &str,
        destination: &str,
        config: &WriteConfig,
    ) -> Result<(), FilesystemError> {
        debug!(source, destination, "copy");
        let fail = |err: ClientError| FilesystemError::CopyFailed {
            source_path: source.to_string(),
            destination: destination.to_string(),
            source: Box::new(err),
        };

        let contents = self.client.read_raw(&self.location(source)).map_err(fail)?;
        self.upload_at(&self.location(destination), &contents, config).map_err(fail)?;
        Ok(())
    }

    /// Uses the digest reported with the file metadata and falls back to
    /// hashing the content when the server does not report one.
    fn checksum(&self, path: &str) -> Result<String, FilesystemError> {
        debug!(path, "checksum");
        let location = self.location(path);
        let fail = |err: ClientError| FilesystemError::metadata(path, MetadataKind::Checksum, err);

        match self.client.read_metadata(&location).map_err(fail)?.content_sha256 {
            Some(digest) => Ok(digest),
            None => Ok(sha256_hex(&self.client.read_raw(&location).map_err(fail)?)),
        }
    }
}
