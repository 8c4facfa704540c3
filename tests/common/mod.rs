//! Shared testing utilities for repofs integration tests.

#![allow(dead_code)]

use assert_cmd::Command;
use mockito::{Matcher, Mock, Server, ServerGuard};
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

pub const PROJECT_ID: &str = "42";
pub const TOKEN: &str = "glpat-test";

/// Isolated working directory with a `repofs.toml` pointing at a mock API server.
pub struct TestContext {
    root: TempDir,
    pub server: ServerGuard,
}

impl TestContext {
    pub fn new() -> Self {
        let server = Server::new();
        let root = TempDir::new().expect("Failed to create temp directory for tests");
        let config = format!(
            "base_url = \"{}\"\nproject_id = \"{}\"\ntimeout_secs = 5\n",
            server.url(),
            PROJECT_ID
        );
        fs::write(root.path().join("repofs.toml"), config).expect("Failed to write repofs.toml");
        Self { root, server }
    }

    pub fn work_dir(&self) -> &Path {
        self.root.path()
    }

    /// Write a local file into the working directory.
    pub fn local_file(&self, name: &str, content: &str) -> PathBuf {
        let path = self.root.path().join(name);
        fs::write(&path, content).expect("Failed to write local file");
        path
    }

    /// Build a command for the compiled `repofs` binary with a clean environment.
    pub fn cli(&self) -> Command {
        let mut cmd = Command::cargo_bin("repofs").expect("Failed to locate repofs binary");
        cmd.current_dir(self.work_dir())
            .env("REPOFS_TOKEN", TOKEN)
            .env_remove("REPOFS_CONFIG")
            .env_remove("REPOFS_BASE_URL")
            .env_remove("REPOFS_PROJECT_ID")
            .env_remove("REPOFS_BRANCH")
            .env_remove("REPOFS_LOG");
        cmd
    }

    /// Mock `HEAD` on a file; `size` of `None` answers 404.
    pub fn head(&mut self, path: &str, size: Option<usize>) -> Mock {
        let mock = self
            .server
            .mock("HEAD", file_endpoint(path, None).as_str())
            .match_query(Matcher::UrlEncoded("ref".into(), "main".into()))
            .match_header("PRIVATE-TOKEN", TOKEN);
        let mock = match size {
            Some(size) => mock.with_status(200).with_header("X-Gitlab-Size", &size.to_string()),
            None => mock.with_status(404),
        };
        mock.create()
    }
}

/// API path of a repository file endpoint, encoded the way the client sends it.
pub fn file_endpoint(path: &str, suffix: Option<&str>) -> String {
    let mut endpoint =
        format!("/api/v4/projects/{}/repository/files/{}", PROJECT_ID, path.replace('/', "%2F"));
    if let Some(suffix) = suffix {
        endpoint.push('/');
        endpoint.push_str(suffix);
    }
    endpoint
}

pub fn tree_endpoint() -> String {
    format!("/api/v4/projects/{}/repository/tree", PROJECT_ID)
}
