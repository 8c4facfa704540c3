mod memory_repository_client;
mod repository_client_http;

pub use memory_repository_client::{CommitRecord, MemoryRepositoryClient, Operation};
pub use repository_client_http::HttpRepositoryClient;
