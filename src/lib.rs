//! repofs: filesystem operations on a branch of a hosted Git repository.
//!
//! Every mutation becomes a commit made through the hosting service's REST
//! API; there is no local clone.

pub mod adapters;
pub mod app;
pub mod domain;
pub mod ports;

pub use adapters::{HttpRepositoryClient, MemoryRepositoryClient};
pub use app::{ContentsListing, GitFilesystem, LoadedConfig, load_config};
pub use domain::{
    AccessToken, AppError, ClientError, ConfigError, ErrorKind, FileAttributes, FilesystemError,
    MetadataKind, PathPrefixer, RepositoryConfig, StorageEntry, Visibility, WriteConfig,
};
pub use ports::{FilesystemAdapter, Listing, RepositoryClient};
