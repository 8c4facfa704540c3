use std::collections::{BTreeMap, BTreeSet};
use std::io::{Cursor, Read};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use chrono::{DateTime, Duration, FixedOffset, TimeZone};
use crate::domain::ClientError;
use crate::domain::digest::sha256_hex;
use crate::ports::{
    BlameCommit, BlameRange, Commit, FileMetadata, RepositoryClient, TreeEntry, TreeEntryKind,
    TreePages,
};

const DEFAULT_PAGE_SIZE: usize = 100;

/// Client call categories that failures can be injected into.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Any,
    ReadMetadata,
    ReadRaw,
    ReadStream,
    Upload,
    Delete,
    Tree,
    Blame,
}

#[derive(Debug, Clone)]
struct FailureRule {
    operation: Operation,
    path: Option<String>,
    status: u16,
}

/// A commit recorded by the in-memory store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommitRecord {
    pub id: String,
    pub path: String,
    pub message: String,
    pub committed_date: DateTime<FixedOffset>,
}

#[derive(Debug, Clone)]
struct StoredFile {
    content: Vec<u8>,
    /// Indexes into the commit log, oldest first.
    history: Vec<usize>,
}

#[derive(Debug, Default)]
struct State {
    files: BTreeMap<String, StoredFile>,
    commits: Vec<CommitRecord>,
    failures: Vec<FailureRule>,
}

/// In-memory repository for testing and offline use.
///
/// Mirrors the remote API's rules: directories exist only through the files
/// they contain, creating an existing file or updating a missing one is
/// rejected, and every mutation appends a commit one minute after the last.
#[derive(Debug, Clone)]
pub struct MemoryRepositoryClient {
    state: Arc<Mutex<State>>,
    page_size: usize,
    report_checksums: bool,
    pages_served: Arc<AtomicUsize>,
    epoch: DateTime<FixedOffset>,
}

impl Default for MemoryRepositoryClient {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryRepositoryClient {
    pub fn new() -> Self {
        let epoch = FixedOffset::east_opt(0)
            .and_then(|utc| utc.with_ymd_and_hms(2020, 11, 30, 15, 37, 32).single())
            .unwrap_or_default();
        Self {
            state: Arc::new(Mutex::new(State::default())),
            page_size: DEFAULT_PAGE_SIZE,
            report_checksums: true,
            pages_served: Arc::new(AtomicUsize::new(0)),
            epoch,
        }
    }

    /// Entries per tree page.
    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    /// Omit `content_sha256` from metadata, like older API versions.
    pub fn without_checksums(mut self) -> Self {
        self.report_checksums = false;
        self
    }

    /// Seed a file, recording a commit for it.
    pub fn with_file(self, path: &str, content: impl AsRef<[u8]>) -> Self {
        {
            let mut state = self.lock();
            let index = self.record_commit(&mut state, path, "Seeded file");
            state.files.insert(
                path.to_string(),
                StoredFile { content: content.as_ref().to_vec(), history: vec![index] },
            );
        }
        self
    }

    /// Fail every matching call with the given HTTP status. `path` restricts the
    /// rule to one repository path.
    pub fn fail_on(&self, operation: Operation, path: Option<&str>, status: u16) {
        self.lock().failures.push(FailureRule {
            operation,
            path: path.map(str::to_string),
            status,
        });
    }

    pub fn clear_failures(&self) {
        self.lock().failures.clear();
    }

    pub fn commits(&self) -> Vec<CommitRecord> {
        self.lock().commits.clone()
    }

    pub fn paths(&self) -> Vec<String> {
        self.lock().files.keys().cloned().collect()
    }

    pub fn contains(&self, path: &str) -> bool {
        self.lock().files.contains_key(path)
    }

    /// Number of tree pages handed out so far.
    pub fn pages_served(&self) -> usize {
        self.pages_served.load(Ordering::SeqCst)
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        // A poisoned lock only means another test thread panicked mid-call.
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn check(&self, state: &State, operation: Operation, path: &str) -> Result<(), ClientError> {
        let rule = state.failures.iter().find(|rule| {
            (rule.operation == Operation::Any || rule.operation == operation)
                && rule.path.as_deref().is_none_or(|p| p == path)
        });
        match rule {
            Some(rule) if rule.status == 404 => Err(ClientError::not_found(path)),
            Some(rule) => Err(ClientError::Api {
                status: rule.status,
                message: format!("{} injected failure", rule.status),
            }),
            None => Ok(()),
        }
    }

    fn record_commit(&self, state: &mut State, path: &str, message: &str) -> usize {
        let index = state.commits.len();
        let minutes = i64::try_from(index).unwrap_or(i64::MAX);
        state.commits.push(CommitRecord {
            id: format!("{:040x}", index + 1),
            path: path.to_string(),
            message: message.to_string(),
            committed_date: self.epoch + Duration::minutes(minutes),
        });
        index
    }

    fn store(
        &self,
        path: &str,
        contents: Vec<u8>,
        message: &str,
        overwrite: bool,
    ) -> Result<Commit, ClientError> {
        let mut state = self.lock();
        self.check(&state, Operation::Upload, path)?;

        let exists = state.files.contains_key(path);
        if exists && !overwrite {
            return Err(ClientError::Conflict {
                path: path.to_string(),
                message: "A file with this name already exists".to_string(),
            });
        }
        if !exists && overwrite {
            return Err(ClientError::Conflict {
                path: path.to_string(),
                message: "A file with this name doesn't exist".to_string(),
            });
        }

        let index = self.record_commit(&mut state, path, message);
        let file = state
            .files
            .entry(path.to_string())
            .or_insert_with(|| StoredFile { content: Vec::new(), history: Vec::new() });
        file.content = contents;
        file.history.push(index);

        let id = state.commits[index].id.clone();
        Ok(Commit { id: Some(id), path: path.to_string(), message: message.to_string() })
    }

    fn file(&self, operation: Operation, path: &str) -> Result<StoredFile, ClientError> {
        let state = self.lock();
        self.check(&state, operation, path)?;
        state.files.get(path).cloned().ok_or_else(|| ClientError::not_found(path))
    }

    fn list(&self, path: &str, recursive: bool) -> Result<Vec<TreeEntry>, ClientError> {
        let state = self.lock();
        self.check(&state, Operation::Tree, path)?;

        let base = if path.is_empty() { String::new() } else { format!("{}/", path) };
        let descendants: Vec<&str> = state
            .files
            .keys()
            .filter_map(|file| file.strip_prefix(base.as_str()))
            .collect();

        if !path.is_empty() && descendants.is_empty() {
            return Err(ClientError::not_found(path));
        }

        let mut directories = BTreeSet::new();
        let mut files = BTreeSet::new();
        for relative in descendants {
            let segments: Vec<&str> = relative.split('/').collect();
            let dirs = &segments[..segments.len() - 1];
            let visible_dirs = if recursive { dirs.len() } else { dirs.len().min(1) };
            for depth in 1..=visible_dirs {
                directories.insert(dirs[..depth].join("/"));
            }
            if recursive || dirs.is_empty() {
                files.insert(relative.to_string());
            }
        }

        let entry = |kind, relative: String| {
            let name = relative.rsplit('/').next().unwrap_or_default().to_string();
            TreeEntry { kind, path: format!("{}{}", base, relative), name }
        };
        Ok(directories
            .into_iter()
            .map(|d| entry(TreeEntryKind::Tree, d))
            .chain(files.into_iter().map(|f| entry(TreeEntryKind::Blob, f)))
            .collect())
    }
}

impl RepositoryClient for MemoryRepositoryClient {
    fn read_metadata(&self, path: &str) -> Result<FileMetadata, ClientError> {
        let file = self.file(Operation::ReadMetadata, path)?;
        let digest = sha256_hex(&file.content);
        let last_commit_id = file.history.last().map(|index| format!("{:040x}", index + 1));
        Ok(FileMetadata {
            file_path: path.to_string(),
            size: u64::try_from(file.content.len()).ok(),
            blob_id: Some(digest[..40].to_string()),
            last_commit_id,
            content_sha256: self.report_checksums.then_some(digest),
        })
    }

    fn read_raw(&self, path: &str) -> Result<Vec<u8>, ClientError> {
        Ok(self.file(Operation::ReadRaw, path)?.content)
    }

    fn read_stream(&self, path: &str) -> Result<Option<Box<dyn Read + Send>>, ClientError> {
        let file = self.file(Operation::ReadStream, path)?;
        if file.content.is_empty() {
            return Ok(None);
        }
        Ok(Some(Box::new(Cursor::new(file.content))))
    }

    fn upload(
        &self,
        path: &str,
        contents: &[u8],
        message: &str,
        overwrite: bool,
    ) -> Result<Commit, ClientError> {
        self.store(path, contents.to_vec(), message, overwrite)
    }

    fn upload_stream(
        &self,
        path: &str,
        mut contents: Box<dyn Read + Send>,
        message: &str,
        overwrite: bool,
    ) -> Result<Commit, ClientError> {
        let mut buffer = Vec::new();
        contents.read_to_end(&mut buffer)?;
        self.store(path, buffer, message, overwrite)
    }

    fn delete(&self, path: &str, message: &str) -> Result<Commit, ClientError> {
        let mut state = self.lock();
        self.check(&state, Operation::Delete, path)?;
        if state.files.remove(path).is_none() {
            return Err(ClientError::Conflict {
                path: path.to_string(),
                message: "A file with this name doesn't exist".to_string(),
            });
        }
        let index = self.record_commit(&mut state, path, message);
        let id = state.commits[index].id.clone();
        Ok(Commit { id: Some(id), path: path.to_string(), message: message.to_string() })
    }

    fn tree(&self, path: &str, recursive: bool) -> TreePages<'_> {
        Box::new(MemoryTreePages {
            client: self,
            path: path.to_string(),
            recursive,
            pending: None,
            done: false,
        })
    }

    fn blame(&self, path: &str) -> Result<Vec<BlameRange>, ClientError> {
        let file = self.file(Operation::Blame, path)?;
        let state = self.lock();
        // The first line keeps its original commit; the rest belong to the latest one.
        let mut touched: Vec<usize> = file.history.first().copied().into_iter().collect();
        if let Some(&latest) = file.history.last() {
            if !touched.contains(&latest) {
                touched.push(latest);
            }
        }
        Ok(touched
            .into_iter()
            .filter_map(|index| state.commits.get(index))
            .map(|commit| BlameRange {
                commit: BlameCommit {
                    id: commit.id.clone(),
                    committed_date: commit.committed_date,
                },
            })
            .collect())
    }
}

struct MemoryTreePages<'a> {
    client: &'a MemoryRepositoryClient,
    path: String,
    recursive: bool,
    pending: Option<std::vec::IntoIter<TreeEntry>>,
    done: bool,
}

impl Iterator for MemoryTreePages<'_> {
    type Item = Result<Vec<TreeEntry>, ClientError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        if self.pending.is_none() {
            match self.client.list(&self.path, self.recursive) {
                Ok(entries) => self.pending = Some(entries.into_iter()),
                Err(err) => {
                    self.done = true;
                    return Some(Err(err));
                }
            }
        }

        let pending = self.pending.as_mut()?;
        let page: Vec<TreeEntry> = pending.by_ref().take(self.client.page_size).collect();
        if pending.as_slice().is_empty() {
            self.done = true;
        }
        if page.is_empty() {
            return None;
        }
        self.client.pages_served.fetch_add(1, Ordering::SeqCst);
        Some(Ok(page))
    }
}
