use std::vec;

use crate::app::git_filesystem::GitFilesystem;
use crate::domain::{ClientError, FileAttributes, FilesystemError, StorageEntry, mime};
use crate::ports::{RepositoryClient, TreeEntry, TreePages};

/// Lazy listing over the repository tree.
///
/// Tree pages are fetched only as the caller advances, and file attributes
/// are resolved per entry when it is yielded. The first failure is yielded
/// as [`FilesystemError::ListingFailed`] and ends the listing.
pub struct ContentsListing<'a, C> {
    fs: &'a GitFilesystem<C>,
    path: String,
    pages: TreePages<'a>,
    current: vec::IntoIter<TreeEntry>,
    finished: bool,
}

impl<'a, C: RepositoryClient> ContentsListing<'a, C> {
    pub(crate) fn new(fs: &'a GitFilesystem<C>, path: &str, location: &str, deep: bool) -> Self {
        Self {
            fs,
            path: path.to_string(),
            pages: fs.client().tree(location, deep),
            current: Vec::new().into_iter(),
            finished: false,
        }
    }

    fn next_entry(&mut self) -> Option<Result<TreeEntry, ClientError>> {
        loop {
            if let Some(entry) = self.current.next() {
                return Some(Ok(entry));
            }
            match self.pages.next()? {
                Ok(page) => self.current = page.into_iter(),
                Err(err) => return Some(Err(err)),
            }
        }
    }

    fn resolve(&self, entry: TreeEntry) -> Result<StorageEntry, ClientError> {
        let path = self.fs.prefixer().strip_prefix(&entry.path);
        if entry.is_directory() {
            return Ok(StorageEntry::Directory { path });
        }

        let size = self.fs.file_size_at(&entry.path)?;
        let last_modified = self.fs.last_modified_at(&entry.path)?;
        Ok(StorageEntry::File(
            FileAttributes::new(path)
                .with_file_size(size)
                .with_last_modified(last_modified)
                .with_mime_type(mime::detect_from_path(&entry.path)),
        ))
    }
}

impl<C: RepositoryClient> Iterator for ContentsListing<'_, C> {
    type Item = Result<StorageEntry, FilesystemError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.finished {
            return None;
        }

        let resolved = match self.next_entry() {
            None => {
                self.finished = true;
                return None;
            }
            Some(entry) => entry.and_then(|entry| self.resolve(entry)),
        };

        match resolved {
            Ok(entry) => Some(Ok(entry)),
            Err(err) => {
                self.finished = true;
                Some(Err(FilesystemError::ListingFailed {
                    path: self.path.clone(),
                    source: Box::new(err),
                }))
            }
        }
    }
}
