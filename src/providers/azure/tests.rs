use std::io::{Cursor, Write};
use std::time::Duration;

use mockito::{Matcher, Server};
use serde_json::json;
use tokio_util::sync::CancellationToken;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

use super::*;
use crate::auth::Token;
use crate::candidate::{CandidateBuild, PullRequestRef};
use crate::error::MauiChannelError;
use crate::providers::http::build_http_client;
use crate::resolver::{ArtifactVerifier, BuildSource};

const BUILDS_PATH: &str = "/dnceng-public/public/_apis/build/builds";
const ARTIFACTS_PATH: &str = "/dnceng-public/public/_apis/build/builds/155100/artifacts";

fn client_for(server: &Server) -> AzureDevOpsClient {
    let http = build_http_client(Duration::from_secs(5)).unwrap();
    AzureDevOpsClient::new(http, &server.url(), "dnceng-public", "public", None).unwrap()
}

fn candidate() -> CandidateBuild {
    CandidateBuild {
        build_id: 155100,
        build_number: "PR-12345".to_string(),
        status: "completed".to_string(),
        result: Some("success".to_string()),
        source_branch: "refs/pull/12345/merge".to_string(),
        source_version: "a".repeat(40),
        organization: "dnceng-public".to_string(),
        project: "public".to_string(),
    }
}

fn build(id: u64, definition: &str, status: &str) -> serde_json::Value {
    json!({
        "id": id,
        "buildNumber": format!("20250101.{id}"),
        "status": status,
        "result": "succeeded",
        "sourceBranch": "refs/pull/12345/merge",
        "sourceVersion": "b".repeat(40),
        "definition": {"name": definition}
    })
}

fn zipped_package() -> Vec<u8> {
    let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Stored);
    writer
        .start_file("PackageArtifacts/Microsoft.Maui.Controls.9.0.100-ci.12345.nupkg", options)
        .unwrap();
    writer.write_all(b"nupkg").unwrap();
    writer.finish().unwrap().into_inner()
}

#[tokio::test]
async fn test_find_pr_build_queries_merge_ref() {
    let mut server = Server::new_async().await;
    let mock = server
        .mock("GET", BUILDS_PATH)
        .match_query(Matcher::AllOf(vec![
            Matcher::UrlEncoded("branchName".into(), "refs/pull/12345/merge".into()),
            Matcher::UrlEncoded("$top".into(), "10".into()),
        ]))
        .with_status(200)
        .with_body(
            json!({"count": 4, "value": [
                build(4, "maui-pr", "inProgress"),
                build(3, "maui-pr-uitests", "completed"),
                build(2, "maui-pr", "completed"),
                build(1, "maui-pr", "completed")
            ]})
            .to_string(),
        )
        .create_async()
        .await;

    let found = client_for(&server)
        .find_pr_build(PullRequestRef(12345), "maui-pr", &CancellationToken::new())
        .await
        .unwrap()
        .unwrap();

    mock.assert_async().await;
    assert_eq!(found.build_id, 2);
    assert_eq!(found.organization, "dnceng-public");
    assert_eq!(found.project, "public");
    assert_eq!(found.source_branch, "refs/pull/12345/merge");
}

#[tokio::test]
async fn test_find_pr_build_none_completed() {
    let mut server = Server::new_async().await;
    server
        .mock("GET", BUILDS_PATH)
        .match_query(Matcher::Any)
        .with_status(200)
        .with_body(json!({"value": [build(9, "maui-pr", "notStarted")]}).to_string())
        .create_async()
        .await;

    let found = client_for(&server)
        .with_top(3)
        .find_pr_build(PullRequestRef(12345), "maui-pr", &CancellationToken::new())
        .await
        .unwrap();

    assert!(found.is_none());
}

#[tokio::test]
async fn test_find_pr_build_missing_value_is_parse_error() {
    let mut server = Server::new_async().await;
    server
        .mock("GET", BUILDS_PATH)
        .match_query(Matcher::Any)
        .with_status(200)
        .with_body(r#"{"count": 0}"#)
        .create_async()
        .await;

    let result = client_for(&server)
        .find_pr_build(PullRequestRef(12345), "maui-pr", &CancellationToken::new())
        .await;

    assert!(matches!(result, Err(MauiChannelError::Parse { .. })));
}

#[tokio::test]
async fn test_has_artifact_case_insensitive() {
    let mut server = Server::new_async().await;
    server
        .mock("GET", ARTIFACTS_PATH)
        .match_query(Matcher::UrlEncoded("api-version".into(), "7.1".into()))
        .with_status(200)
        .with_body(
            json!({"value": [
                {"name": "logs"},
                {"name": "packageartifacts", "resource": {"downloadUrl": "https://example.invalid/a.zip"}}
            ]})
            .to_string(),
        )
        .create_async()
        .await;

    let verified = client_for(&server)
        .has_artifact(&candidate(), "PackageArtifacts", &CancellationToken::new())
        .await;

    assert!(verified);
}

#[tokio::test]
async fn test_has_artifact_absent() {
    let mut server = Server::new_async().await;
    server
        .mock("GET", ARTIFACTS_PATH)
        .match_query(Matcher::Any)
        .with_status(200)
        .with_body(json!({"value": [{"name": "logs"}]}).to_string())
        .create_async()
        .await;

    let verified = client_for(&server)
        .has_artifact(&candidate(), "PackageArtifacts", &CancellationToken::new())
        .await;

    assert!(!verified);
}

#[tokio::test]
async fn test_has_artifact_treats_errors_as_unverified() {
    let mut server = Server::new_async().await;
    server
        .mock("GET", ARTIFACTS_PATH)
        .match_query(Matcher::Any)
        .with_status(404)
        .create_async()
        .await;

    let verified = client_for(&server)
        .has_artifact(&candidate(), "PackageArtifacts", &CancellationToken::new())
        .await;

    assert!(!verified);
}

#[tokio::test]
async fn test_token_sent_as_basic_auth() {
    let mut server = Server::new_async().await;
    // base64(":pat")
    let mock = server
        .mock("GET", ARTIFACTS_PATH)
        .match_query(Matcher::Any)
        .match_header("authorization", "Basic OnBhdA==")
        .with_status(200)
        .with_body(json!({"value": []}).to_string())
        .create_async()
        .await;

    let http = build_http_client(Duration::from_secs(5)).unwrap();
    let client = AzureDevOpsClient::new(
        http,
        &server.url(),
        "dnceng-public",
        "public",
        Some(Token::from("pat")),
    )
    .unwrap();
    let artifacts = client
        .list_artifacts(&candidate(), &CancellationToken::new())
        .await
        .unwrap();

    mock.assert_async().await;
    assert!(artifacts.is_empty());
}

#[tokio::test]
async fn test_download_artifact_extracts_archive() {
    let mut server = Server::new_async().await;
    let download_url = format!("{}/download/PackageArtifacts.zip", server.url());
    server
        .mock("GET", ARTIFACTS_PATH)
        .match_query(Matcher::Any)
        .with_status(200)
        .with_body(
            json!({"value": [{"name": "PackageArtifacts", "resource": {"downloadUrl": download_url}}]})
                .to_string(),
        )
        .create_async()
        .await;
    server
        .mock("GET", "/download/PackageArtifacts.zip")
        .with_status(200)
        .with_header("content-type", "application/zip")
        .with_body(zipped_package())
        .create_async()
        .await;

    let temp_dir = tempfile::tempdir().unwrap();
    let destination = temp_dir.path().join("155100");
    let extracted = client_for(&server)
        .download_artifact(
            &candidate(),
            "PackageArtifacts",
            &destination,
            &CancellationToken::new(),
        )
        .await
        .unwrap();

    assert_eq!(extracted, destination.join("extracted"));
    let package = extracted
        .join("PackageArtifacts")
        .join("Microsoft.Maui.Controls.9.0.100-ci.12345.nupkg");
    assert_eq!(std::fs::read(package).unwrap(), b"nupkg");
}

#[tokio::test]
async fn test_download_artifact_missing_artifact() {
    let mut server = Server::new_async().await;
    server
        .mock("GET", ARTIFACTS_PATH)
        .match_query(Matcher::Any)
        .with_status(200)
        .with_body(json!({"value": []}).to_string())
        .create_async()
        .await;

    let temp_dir = tempfile::tempdir().unwrap();
    let destination = temp_dir.path().join("155100");
    let result = client_for(&server)
        .download_artifact(
            &candidate(),
            "PackageArtifacts",
            &destination,
            &CancellationToken::new(),
        )
        .await;

    assert!(matches!(result, Err(MauiChannelError::Download(_))));
    assert!(!destination.exists());
}

#[tokio::test]
async fn test_download_artifact_corrupt_archive_cleans_up() {
    let mut server = Server::new_async().await;
    let download_url = format!("{}/download/broken.zip", server.url());
    server
        .mock("GET", ARTIFACTS_PATH)
        .match_query(Matcher::Any)
        .with_status(200)
        .with_body(
            json!({"value": [{"name": "PackageArtifacts", "resource": {"downloadUrl": download_url}}]})
                .to_string(),
        )
        .create_async()
        .await;
    server
        .mock("GET", "/download/broken.zip")
        .with_status(200)
        .with_body("definitely not a zip")
        .create_async()
        .await;

    let temp_dir = tempfile::tempdir().unwrap();
    let destination = temp_dir.path().join("155100");
    let result = client_for(&server)
        .download_artifact(
            &candidate(),
            "PackageArtifacts",
            &destination,
            &CancellationToken::new(),
        )
        .await;

    assert!(matches!(result, Err(MauiChannelError::Download(_))));
    assert!(!destination.exists());
}
