use std::fmt;

use chrono::{DateTime, Utc};

use crate::domain::{ErrorKind, FilesystemError};
use crate::ports::FilesystemAdapter;

/// Attributes printed by `repofs stat`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(super) struct StatReport {
    pub path: String,
    pub size: u64,
    pub mime_type: Option<String>,
    pub last_modified: Option<DateTime<Utc>>,
    pub checksum: String,
}

/// Resolve every attribute of `path`. A file without a recognizable
/// extension simply has no MIME type.
pub(super) fn collect<F: FilesystemAdapter>(
    fs: &F,
    path: &str,
) -> Result<StatReport, FilesystemError> {
    let size = fs.file_size(path)?.file_size.unwrap_or(0);
    let mime_type = match fs.mime_type(path) {
        Ok(attributes) => attributes.mime_type,
        Err(err) if err.kind() == ErrorKind::MetadataUnavailable => None,
        Err(err) => return Err(err),
    };
    let last_modified = fs.last_modified(path)?.last_modified;
    let checksum = fs.checksum(path)?;

    Ok(StatReport { path: path.to_string(), size, mime_type, last_modified, checksum })
}

impl fmt::Display for StatReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "path:          {}", self.path)?;
        writeln!(f, "size:          {}", self.size)?;
        writeln!(f, "mime-type:     {}", self.mime_type.as_deref().unwrap_or("-"))?;
        match self.last_modified {
            Some(at) => writeln!(f, "last-modified: {}", at.to_rfc3339())?,
            None => writeln!(f, "last-modified: -")?,
        }
        writeln!(f, "sha256:        {}", self.checksum)
    }
}
