//! Repository client for GitLab-compatible v4 REST APIs using reqwest.

use std::io::{BufRead, BufReader, Cursor, Read};
use std::time::Duration;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use reqwest::StatusCode;
use reqwest::blocking::{Body, Client, RequestBuilder, Response};
use reqwest::header::{CONTENT_TYPE, HeaderMap};
use serde::{Deserialize, Serialize};
use tracing::debug;
use url::Url;

use crate::domain::{AccessToken, ClientError, RepositoryConfig};
use crate::ports::{BlameRange, Commit, FileMetadata, RepositoryClient, TreeEntry, TreePages};

const PRIVATE_TOKEN: &str = "PRIVATE-TOKEN";
const X_GITLAB_SIZE: &str = "x-gitlab-size";
const X_GITLAB_BLOB_ID: &str = "x-gitlab-blob-id";
const X_GITLAB_LAST_COMMIT_ID: &str = "x-gitlab-last-commit-id";
const X_GITLAB_CONTENT_SHA256: &str = "x-gitlab-content-sha256";
const X_NEXT_PAGE: &str = "x-next-page";
const DEFAULT_STATUS_MESSAGE: &str = "Repository API request failed";
const BASE64_CHUNK: usize = 3 * 1024;

/// HTTP transport for the repository API.
///
/// Every call issues exactly one request (tree listings one per page); there
/// is no retry and no caching.
#[derive(Clone)]
pub struct HttpRepositoryClient {
    token: AccessToken,
    base_url: Url,
    project_id: String,
    branch: String,
    page_size: u32,
    client: Client,
}

impl std::fmt::Debug for HttpRepositoryClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpRepositoryClient")
            .field("base_url", &self.base_url)
            .field("project_id", &self.project_id)
            .field("branch", &self.branch)
            .field("token", &"[REDACTED]")
            .finish()
    }
}

impl HttpRepositoryClient {
    pub fn new(config: &RepositoryConfig, token: AccessToken) -> Result<Self, ClientError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| ClientError::Transport(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            token,
            base_url: config.base_url.clone(),
            project_id: config.project_id.clone(),
            branch: config.branch.clone(),
            page_size: config.tree_page_size,
            client,
        })
    }

    pub fn branch(&self) -> &str {
        &self.branch
    }

    pub fn project_id(&self) -> &str {
        &self.project_id
    }

    /// `{base}/api/v4/projects/{id}/{segments...}` with each segment percent-encoded,
    /// so a file path's slashes become `%2F` as the API expects.
    fn endpoint(&self, segments: &[&str]) -> Result<Url, ClientError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| ClientError::Transport(format!("Invalid base URL: {}", self.base_url)))?
            .pop_if_empty()
            .extend(["api", "v4", "projects", self.project_id.as_str()])
            .extend(segments);
        Ok(url)
    }

    fn file_url(&self, path: &str, suffix: Option<&str>) -> Result<Url, ClientError> {
        let mut segments = vec!["repository", "files", path];
        segments.extend(suffix);
        self.endpoint(&segments)
    }

    fn authorized(&self, request: RequestBuilder) -> RequestBuilder {
        request.header(PRIVATE_TOKEN, self.token.expose())
    }

    fn send(&self, request: RequestBuilder, path: &str) -> Result<Response, ClientError> {
        let response = self
            .authorized(request)
            .send()
            .map_err(|e| ClientError::Transport(format!("HTTP request failed: {}", e)))?;
        check_status(response, path)
    }

    fn fetch_tree_page(
        &self,
        path: &str,
        recursive: bool,
        page: u32,
    ) -> Result<(Vec<TreeEntry>, Option<u32>), ClientError> {
        debug!(path, recursive, page, "GET repository tree");
        let url = self.endpoint(&["repository", "tree"])?;
        let mut query = vec![
            ("ref", self.branch.clone()),
            ("recursive", recursive.to_string()),
            ("per_page", self.page_size.to_string()),
            ("page", page.to_string()),
        ];
        if !path.is_empty() {
            query.push(("path", path.to_string()));
        }

        let response = self.send(self.client.get(url).query(&query), path)?;
        let next_page = next_page(response.headers());
        let entries = decode_json::<Vec<TreeEntry>>(response)?;
        Ok((entries, next_page))
    }

    fn upload_request(&self, url: Url, overwrite: bool) -> RequestBuilder {
        if overwrite { self.client.put(url) } else { self.client.post(url) }
    }
}

#[derive(Debug, Serialize)]
struct UploadRequest<'a> {
    branch: &'a str,
    commit_message: &'a str,
    encoding: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    content: Option<String>,
}

#[derive(Debug, Serialize)]
struct DeleteRequest<'a> {
    branch: &'a str,
    commit_message: &'a str,
}

#[derive(Debug, Default, Deserialize)]
struct UploadResponse {
    #[serde(default)]
    file_path: Option<String>,
}

fn check_status(response: Response, path: &str) -> Result<Response, ClientError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    if status == StatusCode::NOT_FOUND {
        return Err(ClientError::not_found(path));
    }

    let body_text = response.text().unwrap_or_default();
    let message = extract_error_message(&body_text).unwrap_or_else(|| {
        if !body_text.trim().is_empty() {
            body_text.clone()
        } else if status.is_server_error() {
            "Server error".to_string()
        } else {
            DEFAULT_STATUS_MESSAGE.to_string()
        }
    });

    if status == StatusCode::BAD_REQUEST && is_conflict_message(&message) {
        return Err(ClientError::Conflict { path: path.to_string(), message });
    }

    Err(ClientError::Api { status: status.as_u16(), message })
}

fn is_conflict_message(message: &str) -> bool {
    let lower = message.to_ascii_lowercase();
    ["already exists", "doesn't exist", "does not exist"].iter().any(|needle| lower.contains(needle))
}

fn extract_error_message(body: &str) -> Option<String> {
    if body.trim().is_empty() {
        return None;
    }

    let parsed = serde_json::from_str::<serde_json::Value>(body).ok()?;

    for key in ["message", "error"] {
        match parsed.get(key) {
            Some(serde_json::Value::String(message)) => return Some(message.clone()),
            Some(serde_json::Value::Object(fields)) if !fields.is_empty() => {
                return Some(serde_json::Value::Object(fields.clone()).to_string());
            }
            _ => {}
        }
    }
    None
}

fn decode_json<T: for<'de> Deserialize<'de>>(response: Response) -> Result<T, ClientError> {
    let body_text = response
        .text()
        .map_err(|e| ClientError::Transport(format!("Failed to read response body: {}", e)))?;
    serde_json::from_str(&body_text)
        .map_err(|e| ClientError::Decode(format!("Failed to parse response: {}", e)))
}

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|value| value.to_str().ok()).map(str::trim).filter(|v| !v.is_empty())
}

fn next_page(headers: &HeaderMap) -> Option<u32> {
    header_str(headers, X_NEXT_PAGE).and_then(|raw| raw.parse::<u32>().ok())
}

/// The commit has already landed once the status is a success, so an
/// unreadable body only loses the echoed path.
fn commit_from(response: Response, path: &str, message: &str) -> Commit {
    let body: UploadResponse = match decode_json(response) {
        Ok(body) => body,
        Err(err) => {
            debug!(path, error = %err, "ignoring undecodable upload response");
            UploadResponse::default()
        }
    };
    Commit {
        id: None,
        path: body.file_path.unwrap_or_else(|| path.to_string()),
        message: message.to_string(),
    }
}

impl RepositoryClient for HttpRepositoryClient {
    fn read_metadata(&self, path: &str) -> Result<FileMetadata, ClientError> {
        debug!(path, "HEAD repository file");
        let url = self.file_url(path, None)?;
        let response = self.send(self.client.head(url).query(&[("ref", &self.branch)]), path)?;
        let headers = response.headers();

        Ok(FileMetadata {
            file_path: path.to_string(),
            size: header_str(headers, X_GITLAB_SIZE).and_then(|raw| raw.parse::<u64>().ok()),
            blob_id: header_str(headers, X_GITLAB_BLOB_ID).map(str::to_string),
            last_commit_id: header_str(headers, X_GITLAB_LAST_COMMIT_ID).map(str::to_string),
            content_sha256: header_str(headers, X_GITLAB_CONTENT_SHA256).map(str::to_string),
        })
    }

    fn read_raw(&self, path: &str) -> Result<Vec<u8>, ClientError> {
        debug!(path, "GET raw repository file");
        let url = self.file_url(path, Some("raw"))?;
        let response = self.send(self.client.get(url).query(&[("ref", &self.branch)]), path)?;
        response
            .bytes()
            .map(|bytes| bytes.to_vec())
            .map_err(|e| ClientError::Transport(format!("Failed to read response body: {}", e)))
    }

    fn read_stream(&self, path: &str) -> Result<Option<Box<dyn Read + Send>>, ClientError> {
        debug!(path, "GET raw repository file as stream");
        let url = self.file_url(path, Some("raw"))?;
        let response = self.send(self.client.get(url).query(&[("ref", &self.branch)]), path)?;
        let mut reader = BufReader::new(response);
        if reader.fill_buf().map_err(ClientError::Io)?.is_empty() {
            return Ok(None);
        }
        Ok(Some(Box::new(reader)))
    }

    fn upload(
        &self,
        path: &str,
        contents: &[u8],
        message: &str,
        overwrite: bool,
    ) -> Result<Commit, ClientError> {
        debug!(path, overwrite, bytes = contents.len(), "upload repository file");
        let url = self.file_url(path, None)?;
        let request = UploadRequest {
            branch: &self.branch,
            commit_message: message,
            encoding: "base64",
            content: Some(STANDARD.encode(contents)),
        };
        let response = self.send(self.upload_request(url, overwrite).json(&request), path)?;
        Ok(commit_from(response, path, message))
    }

    fn upload_stream(
        &self,
        path: &str,
        contents: Box<dyn Read + Send>,
        message: &str,
        overwrite: bool,
    ) -> Result<Commit, ClientError> {
        debug!(path, overwrite, "upload repository file from stream");
        let url = self.file_url(path, None)?;
        let envelope = UploadRequest {
            branch: &self.branch,
            commit_message: message,
            encoding: "base64",
            content: None,
        };
        let body = streaming_json_body(&envelope, contents)?;
        let request = self.upload_request(url, overwrite).header(CONTENT_TYPE, "application/json");
        let response = self.send(request.body(body), path)?;
        Ok(commit_from(response, path, message))
    }

    fn delete(&self, path: &str, message: &str) -> Result<Commit, ClientError> {
        debug!(path, "DELETE repository file");
        let url = self.file_url(path, None)?;
        let request = DeleteRequest { branch: &self.branch, commit_message: message };
        self.send(self.client.delete(url).json(&request), path)?;
        Ok(Commit { id: None, path: path.to_string(), message: message.to_string() })
    }

    fn tree(&self, path: &str, recursive: bool) -> TreePages<'_> {
        Box::new(HttpTreePages {
            client: self,
            path: path.to_string(),
            recursive,
            next_page: Some(1),
        })
    }

    fn blame(&self, path: &str) -> Result<Vec<BlameRange>, ClientError> {
        debug!(path, "GET repository file blame");
        let url = self.file_url(path, Some("blame"))?;
        let response = self.send(self.client.get(url).query(&[("ref", &self.branch)]), path)?;
        decode_json(response)
    }
}

/// Tree listing that requests the next page only when advanced.
struct HttpTreePages<'a> {
    client: &'a HttpRepositoryClient,
    path: String,
    recursive: bool,
    next_page: Option<u32>,
}

impl Iterator for HttpTreePages<'_> {
    type Item = Result<Vec<TreeEntry>, ClientError>;

    fn next(&mut self) -> Option<Self::Item> {
        let page = self.next_page.take()?;
        match self.client.fetch_tree_page(&self.path, self.recursive, page) {
            Ok((entries, next)) => {
                // Guard against a server repeating the current page number.
                self.next_page = next.filter(|n| *n > page);
                if entries.is_empty() && page > 1 {
                    return None;
                }
                Some(Ok(entries))
            }
            Err(err) => Some(Err(err)),
        }
    }
}

/// JSON body whose `content` field is base64-encoded from `contents` as the
/// request is sent.
fn streaming_json_body(
    envelope: &UploadRequest<'_>,
    contents: Box<dyn Read + Send>,
) -> Result<Body, ClientError> {
    let mut head = serde_json::to_string(envelope)
        .map_err(|e| ClientError::Decode(format!("Failed to encode request: {}", e)))?;
    head.pop();
    head.push_str(",\"content\":\"");

    let reader = Cursor::new(head.into_bytes())
        .chain(Base64Reader::new(contents))
        .chain(Cursor::new(b"\"}".to_vec()));
    Ok(Body::new(reader))
}

/// Reader adapter producing the standard base64 encoding of its inner reader.
struct Base64Reader<R> {
    inner: R,
    pending: Vec<u8>,
    encoded: Vec<u8>,
    position: usize,
    finished: bool,
}

impl<R: Read> Base64Reader<R> {
    fn new(inner: R) -> Self {
        Self { inner, pending: Vec::new(), encoded: Vec::new(), position: 0, finished: false }
    }

    fn refill(&mut self) -> std::io::Result<()> {
        let mut chunk = [0u8; BASE64_CHUNK];
        let read = self.inner.read(&mut chunk)?;
        if read == 0 {
            self.finished = true;
            self.encoded = STANDARD.encode(&self.pending).into_bytes();
            self.pending.clear();
        } else {
            self.pending.extend_from_slice(&chunk[..read]);
            let whole = self.pending.len() / 3 * 3;
            self.encoded = STANDARD.encode(&self.pending[..whole]).into_bytes();
            self.pending.drain(..whole);
        }
        self.position = 0;
        Ok(())
    }
}

impl<R: Read> Read for Base64Reader<R> {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        loop {
            if self.position < self.encoded.len() {
                let available = &self.encoded[self.position..];
                let count = available.len().min(buf.len());
                buf[..count].copy_from_slice(&available[..count]);
                self.position += count;
                return Ok(count);
            }
            if self.finished {
                return Ok(0);
            }
            self.refill()?;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::Matcher;

    fn client_for(server: &mockito::Server) -> HttpRepositoryClient {
        let config = RepositoryConfig {
            timeout_secs: 5,
            tree_page_size: 2,
            ..RepositoryConfig::new(Url::parse(&server.url()).unwrap(), "42")
        };
        HttpRepositoryClient::new(&config, AccessToken::new("glpat-test")).unwrap()
    }

    #[test]
    fn read_metadata_parses_gitlab_headers() {
        let mut server = mockito::Server::new();
        let mock = server
            .mock("HEAD", "/api/v4/projects/42/repository/files/README.md")
            .match_query(Matcher::UrlEncoded("ref".into(), "main".into()))
            .match_header("PRIVATE-TOKEN", "glpat-test")
            .with_status(200)
            .with_header("X-Gitlab-Size", "37")
            .with_header("X-Gitlab-Blob-Id", "abc")
            .with_header("X-Gitlab-Content-Sha256", "deadbeef")
            .create();

        let meta = client_for(&server).read_metadata("README.md").unwrap();
        assert_eq!(meta.size, Some(37));
        assert_eq!(meta.blob_id.as_deref(), Some("abc"));
        assert_eq!(meta.content_sha256.as_deref(), Some("deadbeef"));
        assert!(meta.last_commit_id.is_none());
        mock.assert();
    }

    #[test]
    fn nested_paths_are_encoded_as_one_segment() {
        let mut server = mockito::Server::new();
        let mock = server
            .mock("GET", "/api/v4/projects/42/repository/files/docs%2Fguide.md/raw")
            .match_query(Matcher::Any)
            .with_status(200)
            .with_body("# Guide")
            .create();

        let body = client_for(&server).read_raw("docs/guide.md").unwrap();
        assert_eq!(body, b"# Guide");
        mock.assert();
    }

    #[test]
    fn missing_file_maps_to_not_found() {
        let mut server = mockito::Server::new();
        let _mock = server
            .mock("GET", "/api/v4/projects/42/repository/files/I_DONT_EXIST.md/raw")
            .match_query(Matcher::Any)
            .with_status(404)
            .with_body(r#"{"message":"404 File Not Found"}"#)
            .create();

        let err = client_for(&server).read_raw("I_DONT_EXIST.md").unwrap_err();
        assert!(err.is_not_found());
    }

    #[test]
    fn unauthorized_maps_to_api_error_with_message() {
        let mut server = mockito::Server::new();
        let _mock = server
            .mock("HEAD", "/api/v4/projects/42/repository/files/README.md")
            .match_query(Matcher::Any)
            .with_status(401)
            .create();

        match client_for(&server).read_metadata("README.md").unwrap_err() {
            ClientError::Api { status, message } => {
                assert_eq!(status, 401);
                assert_eq!(message, DEFAULT_STATUS_MESSAGE);
            }
            other => panic!("unexpected error variant: {}", other),
        }
    }

    #[test]
    fn create_posts_base64_content() {
        let mut server = mockito::Server::new();
        let mock = server
            .mock("POST", "/api/v4/projects/42/repository/files/testing.md")
            .match_body(Matcher::Json(serde_json::json!({
                "branch": "main",
                "commit_message": "Uploaded file via GIT API",
                "encoding": "base64",
                "content": "IyBUZXN0aW5nIGNyZWF0ZQ==",
            })))
            .with_status(201)
            .with_body(r#"{"file_path":"testing.md","branch":"main"}"#)
            .create();

        let commit = client_for(&server)
            .upload("testing.md", b"# Testing create", "Uploaded file via GIT API", false)
            .unwrap();
        assert_eq!(commit.path, "testing.md");
        mock.assert();
    }

    #[test]
    fn overwrite_uses_put() {
        let mut server = mockito::Server::new();
        let mock = server
            .mock("PUT", "/api/v4/projects/42/repository/files/testing.md")
            .with_status(200)
            .with_body(r#"{"file_path":"testing.md","branch":"main"}"#)
            .create();

        client_for(&server).upload("testing.md", b"# Testing update", "msg", true).unwrap();
        mock.assert();
    }

    #[test]
    fn undecodable_upload_response_keeps_request_path() {
        let mut server = mockito::Server::new();
        let mock = server
            .mock("POST", "/api/v4/projects/42/repository/files/docs%2Fnotes.md")
            .with_status(201)
            .with_body("not json")
            .create();

        let commit =
            client_for(&server).upload("docs/notes.md", b"n", "Add notes", false).unwrap();
        assert_eq!(commit.path, "docs/notes.md");
        assert_eq!(commit.message, "Add notes");
        mock.assert();
    }

    #[test]
    fn empty_chunked_stream_is_no_content() {
        let mut server = mockito::Server::new();
        let _mock = server
            .mock("GET", "/api/v4/projects/42/repository/files/test/raw")
            .match_query(Matcher::Any)
            .with_status(200)
            .with_chunked_body(|_| Ok(()))
            .create();

        assert!(client_for(&server).read_stream("test").unwrap().is_none());
    }

    #[test]
    fn existing_file_on_create_is_a_conflict() {
        let mut server = mockito::Server::new();
        let _mock = server
            .mock("POST", "/api/v4/projects/42/repository/files/testing.md")
            .with_status(400)
            .with_body(r#"{"message":"A file with this name already exists"}"#)
            .create();

        let err = client_for(&server).upload("testing.md", b"x", "msg", false).unwrap_err();
        assert!(matches!(err, ClientError::Conflict { .. }));
    }

    #[test]
    fn streamed_upload_sends_the_same_json_document() {
        let mut server = mockito::Server::new();
        let content = "File for testing file streams".repeat(300);
        let mock = server
            .mock("POST", "/api/v4/projects/42/repository/files/testing.txt")
            .match_body(Matcher::Json(serde_json::json!({
                "branch": "main",
                "commit_message": "msg",
                "encoding": "base64",
                "content": STANDARD.encode(content.as_bytes()),
            })))
            .with_status(201)
            .create();

        let reader = Box::new(Cursor::new(content.into_bytes()));
        client_for(&server).upload_stream("testing.txt", reader, "msg", false).unwrap();
        mock.assert();
    }

    #[test]
    fn delete_sends_branch_and_message() {
        let mut server = mockito::Server::new();
        let mock = server
            .mock("DELETE", "/api/v4/projects/42/repository/files/testing.md")
            .match_body(Matcher::Json(serde_json::json!({
                "branch": "main",
                "commit_message": "Deleted file via GIT API",
            })))
            .with_status(204)
            .create();

        client_for(&server).delete("testing.md", "Deleted file via GIT API").unwrap();
        mock.assert();
    }

    #[test]
    fn tree_follows_next_page_header_lazily() {
        let mut server = mockito::Server::new();
        let first = server
            .mock("GET", "/api/v4/projects/42/repository/tree")
            .match_query(Matcher::AllOf(vec![
                Matcher::UrlEncoded("page".into(), "1".into()),
                Matcher::UrlEncoded("per_page".into(), "2".into()),
                Matcher::UrlEncoded("recursive".into(), "false".into()),
            ]))
            .with_status(200)
            .with_header("X-Next-Page", "2")
            .with_body(
                r#"[{"id":"a","name":"recursive","type":"tree","path":"recursive","mode":"040000"},
                    {"id":"b","name":"LICENSE","type":"blob","path":"LICENSE","mode":"100644"}]"#,
            )
            .expect(1)
            .create();
        let second = server
            .mock("GET", "/api/v4/projects/42/repository/tree")
            .match_query(Matcher::UrlEncoded("page".into(), "2".into()))
            .with_status(200)
            .with_header("X-Next-Page", "")
            .with_body(r#"[{"id":"c","name":"README.md","type":"blob","path":"README.md","mode":"100644"}]"#)
            .expect(1)
            .create();

        let client = client_for(&server);
        let mut pages = client.tree("", false);
        let page = pages.next().unwrap().unwrap();
        assert_eq!(page.len(), 2);
        assert!(page[0].is_directory());
        first.assert();

        let page = pages.next().unwrap().unwrap();
        assert_eq!(page[0].path, "README.md");
        assert!(pages.next().is_none());
        second.assert();
    }

    #[test]
    fn blame_decodes_commit_dates() {
        let mut server = mockito::Server::new();
        let _mock = server
            .mock("GET", "/api/v4/projects/42/repository/files/README.md/blame")
            .match_query(Matcher::Any)
            .with_status(200)
            .with_body(
                r##"[{"commit":{"id":"d42409","committed_date":"2020-11-30T16:37:32.000+01:00"},"lines":["# Testing"]}]"##,
            )
            .create();

        let ranges = client_for(&server).blame("README.md").unwrap();
        assert_eq!(ranges.len(), 1);
        assert_eq!(ranges[0].commit.committed_date.timestamp(), 1606750652);
    }

    #[test]
    fn base64_reader_matches_one_shot_encoding() {
        for size in [0usize, 1, 2, 3, 4, 3071, 3072, 3073, 10_000] {
            let data: Vec<u8> = (0..size).map(|i| (i % 251) as u8).collect();
            let mut encoded = String::new();
            Base64Reader::new(Cursor::new(data.clone())).read_to_string(&mut encoded).unwrap();
            assert_eq!(encoded, STANDARD.encode(&data), "size {}", size);
        }
    }

    #[test]
    fn debug_output_redacts_token() {
        let server = mockito::Server::new();
        let debug = format!("{:?}", client_for(&server));
        assert!(debug.contains("[REDACTED]"));
        assert!(!debug.contains("glpat-test"));
    }
}
