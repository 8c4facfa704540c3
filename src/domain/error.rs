use std::io;

use thiserror::Error;

type Cause = Box<dyn std::error::Error + Send + Sync>;

/// Failure reported by a repository client.
#[derive(Debug, Error)]
pub enum ClientError {
    /// The remote store has nothing at this path.
    #[error("'{path}' not found in repository")]
    NotFound { path: String },

    /// The remote API answered with a non-success status.
    #[error("Repository API error ({status}): {message}")]
    Api { status: u16, message: String },

    /// The request never produced a response.
    #[error("Repository request failed: {0}")]
    Transport(String),

    /// The response could not be decoded.
    #[error("Failed to decode repository response: {0}")]
    Decode(String),

    /// The remote rejected a create because the file already exists, or an
    /// update because it does not.
    #[error("Conflicting write at '{path}': {message}")]
    Conflict { path: String, message: String },

    /// Local I/O failure while streaming content.
    #[error(transparent)]
    Io(#[from] io::Error),
}

impl ClientError {
    pub fn not_found(path: impl Into<String>) -> Self {
        ClientError::NotFound { path: path.into() }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, ClientError::NotFound { .. })
    }
}

/// Attribute that could not be resolved by a metadata lookup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetadataKind {
    FileSize,
    MimeType,
    LastModified,
    Checksum,
}

impl MetadataKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            MetadataKind::FileSize => "file size",
            MetadataKind::MimeType => "mime type",
            MetadataKind::LastModified => "last modified",
            MetadataKind::Checksum => "checksum",
        }
    }
}

impl std::fmt::Display for MetadataKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Discriminant of [`FilesystemError`] for callers that branch on the failure kind.
///
/// A missing path is not a kind of its own: it surfaces as the failure of the
/// operation that needed it, and [`FilesystemError::is_not_found`] tells it apart.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    CheckExistenceFailed,
    ReadFailed,
    WriteFailed,
    DeleteFailed,
    MoveFailed,
    CopyFailed,
    CreateDirectoryFailed,
    DeleteDirectoryFailed,
    MetadataUnavailable,
    VisibilityUnsupported,
    ListingFailed,
}

/// Failure of a filesystem operation.
///
/// Every variant names the caller-relative path(s) involved and, except for
/// the unconditional ones, keeps the underlying cause reachable through
/// [`std::error::Error::source`].
#[derive(Debug, Error)]
pub enum FilesystemError {
    #[error("Unable to check existence of '{path}': {source}")]
    CheckExistenceFailed {
        path: String,
        #[source]
        source: Cause,
    },

    #[error("Unable to read '{path}': {reason}")]
    ReadFailed {
        path: String,
        reason: String,
        #[source]
        source: Option<Cause>,
    },

    #[error("Unable to write '{path}': {source}")]
    WriteFailed {
        path: String,
        #[source]
        source: Cause,
    },

    #[error("Unable to delete '{path}': {source}")]
    DeleteFailed {
        path: String,
        #[source]
        source: Cause,
    },

    #[error("Unable to move '{source_path}' to '{destination}': {source}")]
    MoveFailed {
        source_path: String,
        destination: String,
        #[source]
        source: Cause,
    },

    #[error("Unable to copy '{source_path}' to '{destination}': {source}")]
    CopyFailed {
        source_path: String,
        destination: String,
        #[source]
        source: Cause,
    },

    #[error("Unable to create directory '{path}': {source}")]
    CreateDirectoryFailed {
        path: String,
        #[source]
        source: Cause,
    },

    #[error("Unable to delete directory '{path}': {source}")]
    DeleteDirectoryFailed {
        path: String,
        #[source]
        source: Cause,
    },

    #[error("Unable to retrieve the {kind} of '{path}'{}", reason_suffix(.reason))]
    MetadataUnavailable {
        path: String,
        kind: MetadataKind,
        reason: Option<String>,
        #[source]
        source: Option<Cause>,
    },

    #[error("Visibility is not supported by the repository API (requested for '{path}')")]
    VisibilityUnsupported { path: String },

    #[error("Unable to list contents of '{path}': {source}")]
    ListingFailed {
        path: String,
        #[source]
        source: Cause,
    },
}

fn reason_suffix(reason: &Option<String>) -> String {
    reason.as_deref().map(|r| format!(": {}", r)).unwrap_or_default()
}

impl FilesystemError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            FilesystemError::CheckExistenceFailed { .. } => ErrorKind::CheckExistenceFailed,
            FilesystemError::ReadFailed { .. } => ErrorKind::ReadFailed,
            FilesystemError::WriteFailed { .. } => ErrorKind::WriteFailed,
            FilesystemError::DeleteFailed { .. } => ErrorKind::DeleteFailed,
            FilesystemError::MoveFailed { .. } => ErrorKind::MoveFailed,
            FilesystemError::CopyFailed { .. } => ErrorKind::CopyFailed,
            FilesystemError::CreateDirectoryFailed { .. } => ErrorKind::CreateDirectoryFailed,
            FilesystemError::DeleteDirectoryFailed { .. } => ErrorKind::DeleteDirectoryFailed,
            FilesystemError::MetadataUnavailable { .. } => ErrorKind::MetadataUnavailable,
            FilesystemError::VisibilityUnsupported { .. } => ErrorKind::VisibilityUnsupported,
            FilesystemError::ListingFailed { .. } => ErrorKind::ListingFailed,
        }
    }

    /// Whether the root cause is the remote store reporting a missing path.
    pub fn is_not_found(&self) -> bool {
        let mut current = std::error::Error::source(self);
        while let Some(err) = current {
            if let Some(client) = err.downcast_ref::<ClientError>() {
                return client.is_not_found();
            }
            current = err.source();
        }
        false
    }

    pub(crate) fn read(path: &str, source: impl Into<Cause>) -> Self {
        let source = source.into();
        FilesystemError::ReadFailed {
            path: path.to_string(),
            reason: source.to_string(),
            source: Some(source),
        }
    }

    pub(crate) fn metadata(path: &str, kind: MetadataKind, source: impl Into<Cause>) -> Self {
        let source = source.into();
        FilesystemError::MetadataUnavailable {
            path: path.to_string(),
            kind,
            reason: Some(source.to_string()),
            source: Some(source),
        }
    }
}

/// Configuration loading or validation failure.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config '{path}': {source}")]
    Read {
        path: String,
        #[source]
        source: io::Error,
    },

    #[error("TOML parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Environment variable '{0}' is not set")]
    MissingToken(String),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Top-level error surfaced by the CLI.
#[derive(Debug, Error)]
pub enum AppError {
    #[error(transparent)]
    Filesystem(#[from] FilesystemError),

    #[error(transparent)]
    Client(#[from] ClientError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Io(#[from] io::Error),

    #[error("Prompt failed: {0}")]
    Prompt(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn not_found_is_visible_through_wrapping() {
        let err = FilesystemError::read("README.md", ClientError::not_found("README.md"));
        assert_eq!(err.kind(), ErrorKind::ReadFailed);
        assert!(err.is_not_found());
    }

    #[test]
    fn api_failure_is_not_a_missing_path() {
        let err = FilesystemError::DeleteFailed {
            path: "a.md".into(),
            source: Box::new(ClientError::Api { status: 401, message: "401 Unauthorized".into() }),
        };
        assert!(!err.is_not_found());
        assert!(err.to_string().contains("a.md"));
        assert!(err.to_string().contains("401 Unauthorized"));
    }

    #[test]
    fn metadata_message_names_attribute_and_path() {
        let err = FilesystemError::MetadataUnavailable {
            path: "LICENSE".into(),
            kind: MetadataKind::MimeType,
            reason: None,
            source: None,
        };
        assert_eq!(err.to_string(), "Unable to retrieve the mime type of 'LICENSE'");
    }
}
