pub mod cli;
mod contents_listing;
mod git_filesystem;
pub mod load_config;

pub use contents_listing::ContentsListing;
pub use git_filesystem::{
    DELETED_FILE_COMMIT_MESSAGE, DIRECTORY_MARKER, GitFilesystem, UPLOADED_FILE_COMMIT_MESSAGE,
};
pub use load_config::{LoadedConfig, load_config};
