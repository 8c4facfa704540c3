mod filesystem;
mod repository_client;

pub use filesystem::{FilesystemAdapter, Listing};
pub use repository_client::{
    BlameCommit, BlameRange, Commit, FileMetadata, RepositoryClient, TreeEntry, TreeEntryKind,
    TreePages,
};
