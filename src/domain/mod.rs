pub mod attributes;
pub mod config;
pub mod digest;
pub mod error;
pub mod mime;
pub mod path_prefixer;

pub use attributes::{FileAttributes, StorageEntry, Visibility, WriteConfig};
pub use config::{AccessToken, RepositoryConfig};
pub use error::{AppError, ClientError, ConfigError, ErrorKind, FilesystemError, MetadataKind};
pub use path_prefixer::PathPrefixer;
