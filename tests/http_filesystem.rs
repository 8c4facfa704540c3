//! The core adapter driven through the HTTP client against a mock API.

mod common;

use common::{TOKEN, file_endpoint};
use mockito::{Matcher, Server, ServerGuard};
use repofs::{
    AccessToken, ErrorKind, FilesystemAdapter, GitFilesystem, HttpRepositoryClient,
    RepositoryConfig, WriteConfig,
};
use std::io::{Read, Write};
use url::Url;

fn filesystem(server: &ServerGuard) -> GitFilesystem<HttpRepositoryClient> {
    let config = RepositoryConfig {
        timeout_secs: 5,
        ..RepositoryConfig::new(Url::parse(&server.url()).unwrap(), common::PROJECT_ID)
    };
    GitFilesystem::new(HttpRepositoryClient::new(&config, AccessToken::new(TOKEN)).unwrap())
}

#[test]
fn last_modified_is_unknown_when_blame_is_empty() {
    let mut server = Server::new();
    let mock = server
        .mock("GET", file_endpoint("README.md", Some("blame")).as_str())
        .match_query(Matcher::UrlEncoded("ref".into(), "main".into()))
        .match_header("PRIVATE-TOKEN", TOKEN)
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body("[]")
        .create();

    let attributes = filesystem(&server).last_modified("README.md").unwrap();
    assert_eq!(attributes.path, "README.md");
    assert_eq!(attributes.last_modified, None);
    mock.assert();
}

#[test]
fn file_size_defaults_to_zero_without_size_header() {
    let mut server = Server::new();
    let mock = server
        .mock("HEAD", file_endpoint("docs/empty.md", None).as_str())
        .match_query(Matcher::UrlEncoded("ref".into(), "main".into()))
        .with_status(200)
        .with_header("X-Gitlab-Blob-Id", "e69de29b")
        .create();

    let attributes = filesystem(&server).file_size("docs/empty.md").unwrap();
    assert_eq!(attributes.file_size, Some(0));
    mock.assert();
}

#[test]
fn read_stream_rejects_empty_chunked_body() {
    let mut server = Server::new();
    let _mock = server
        .mock("GET", file_endpoint("test", Some("raw")).as_str())
        .match_query(Matcher::Any)
        .with_status(200)
        .with_chunked_body(|_| Ok(()))
        .create();

    let err = match filesystem(&server).read_stream("test") {
        Ok(_) => panic!("empty content must not yield a reader"),
        Err(err) => err,
    };
    assert_eq!(err.kind(), ErrorKind::ReadFailed);
    assert!(err.to_string().contains("Empty content"));
    assert!(!err.is_not_found());
}

#[test]
fn read_stream_yields_the_whole_chunked_body() {
    let mut server = Server::new();
    let _mock = server
        .mock("GET", file_endpoint("docs/guide.md", Some("raw")).as_str())
        .match_query(Matcher::Any)
        .with_status(200)
        .with_chunked_body(|w| {
            w.write_all(b"# Guide\n")?;
            w.write_all(b"second chunk\n")
        })
        .create();

    let mut contents = String::new();
    filesystem(&server)
        .read_stream("docs/guide.md")
        .unwrap()
        .read_to_string(&mut contents)
        .unwrap();
    assert_eq!(contents, "# Guide\nsecond chunk\n");
}

#[test]
fn write_succeeds_when_upload_response_is_not_json() {
    let mut server = Server::new();
    let head = server
        .mock("HEAD", file_endpoint("notes.md", None).as_str())
        .match_query(Matcher::Any)
        .with_status(404)
        .create();
    let create = server
        .mock("POST", file_endpoint("notes.md", None).as_str())
        .match_body(Matcher::PartialJson(serde_json::json!({ "commit_message": "Add notes" })))
        .with_status(201)
        .with_body("<html>created</html>")
        .create();

    filesystem(&server)
        .write("notes.md", b"n", &WriteConfig::with_commit_message("Add notes"))
        .unwrap();
    head.assert();
    create.assert();
}
