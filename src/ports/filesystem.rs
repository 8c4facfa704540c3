//! Filesystem capability surface exposed to consumers.

use std::io::Read;

use crate::domain::{FileAttributes, FilesystemError, StorageEntry, Visibility, WriteConfig};

/// Lazily produced listing entries.
pub type Listing<'a> = Box<dyn Iterator<Item = Result<StorageEntry, FilesystemError>> + 'a>;

/// Port for hierarchical file storage.
///
/// All paths are relative to the adapter's root.
pub trait FilesystemAdapter {
    fn file_exists(&self, path: &str) -> Result<bool, FilesystemError>;

    fn directory_exists(&self, path: &str) -> Result<bool, FilesystemError>;

    fn write(&self, path: &str, contents: &[u8], config: &WriteConfig)
    -> Result<(), FilesystemError>;

    fn write_stream(
        &self,
        path: &str,
        contents: Box<dyn Read + Send>,
        config: &WriteConfig,
    ) -> Result<(), FilesystemError>;

    fn read(&self, path: &str) -> Result<Vec<u8>, FilesystemError>;

    fn read_stream(&self, path: &str) -> Result<Box<dyn Read + Send>, FilesystemError>;

    fn delete(&self, path: &str) -> Result<(), FilesystemError>;

    fn delete_directory(&self, path: &str) -> Result<(), FilesystemError>;

    fn create_directory(&self, path: &str, config: &WriteConfig) -> Result<(), FilesystemError>;

    fn set_visibility(&self, path: &str, visibility: Visibility) -> Result<(), FilesystemError>;

    fn visibility(&self, path: &str) -> Result<Visibility, FilesystemError>;

    fn mime_type(&self, path: &str) -> Result<FileAttributes, FilesystemError>;

    fn last_modified(&self, path: &str) -> Result<FileAttributes, FilesystemError>;

    fn file_size(&self, path: &str) -> Result<FileAttributes, FilesystemError>;

    fn list_contents(&self, path: &str, deep: bool) -> Listing<'_>;

    fn move_file(
        &self,
        source: &str,
        destination: &str,
        config: &WriteConfig,
    ) -> Result<(), FilesystemError>;

    fn copy(
        &self,
        source: &str,
        destination: &str,
        config: &WriteConfig,
    ) -> Result<(), FilesystemError>;

    /// Hex SHA-256 digest of the file content.
    fn checksum(&self, path: &str) -> Result<String, FilesystemError>;
}
