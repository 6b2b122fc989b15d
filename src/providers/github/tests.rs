use std::io::Write;
use std::time::Duration;

use mockito::{Matcher, Server};
use serde_json::json;
use tokio_util::sync::CancellationToken;

use super::*;
use crate::auth::Token;
use crate::candidate::{CommitSha, PullRequestRef};
use crate::error::MauiChannelError;
use crate::providers::http::build_http_client;
use crate::resolver::{CheckRunSource, CommitLister};

fn sha(fill: char) -> CommitSha {
    CommitSha::try_from(fill.to_string().repeat(40)).unwrap()
}

fn client_for(server: &Server) -> GitHubClient {
    let http = build_http_client(Duration::from_secs(5)).unwrap();
    GitHubClient::new(http, &server.url(), "dotnet/maui", Some(Token::from("test-token"))).unwrap()
}

fn check_run(name: &str) -> serde_json::Value {
    json!({
        "name": name,
        "status": "completed",
        "conclusion": "success",
        "details_url": "https://dev.azure.com/dnceng-public/public/_build/results?buildId=1"
    })
}

fn page_query(per_page: &str, page: &str) -> Matcher {
    Matcher::AllOf(vec![
        Matcher::UrlEncoded("per_page".into(), per_page.into()),
        Matcher::UrlEncoded("page".into(), page.into()),
    ])
}

#[test]
fn test_github_client_invalid_repo_path() {
    let http = build_http_client(Duration::from_secs(5)).unwrap();
    let result = GitHubClient::new(http.clone(), "https://api.github.com", "invalid-path", None);
    assert!(matches!(result, Err(MauiChannelError::Config(_))));

    let result = GitHubClient::new(http, "https://api.github.com", "owner/repo/extra", None);
    assert!(result.is_err());
}

#[test]
fn test_pull_request_url() {
    let http = build_http_client(Duration::from_secs(5)).unwrap();
    let client = GitHubClient::new(http, "https://api.github.com", "dotnet/maui", None).unwrap();
    assert_eq!(
        client.pull_request_url(PullRequestRef(12345)),
        "https://github.com/dotnet/maui/pull/12345"
    );
}

#[tokio::test]
async fn test_list_pr_commits_most_recent_first() {
    let mut server = Server::new_async().await;
    let mock = server
        .mock("GET", "/repos/dotnet/maui/pulls/42/commits")
        .match_query(Matcher::UrlEncoded("per_page".into(), "100".into()))
        .match_header("authorization", "Bearer test-token")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(
            json!([
                {"sha": "a".repeat(40)},
                {"sha": "b".repeat(40)},
                {"sha": "c".repeat(40)}
            ])
            .to_string(),
        )
        .create_async()
        .await;

    let commits = client_for(&server)
        .list_pr_commits(PullRequestRef(42), &CancellationToken::new())
        .await
        .unwrap();

    mock.assert_async().await;
    assert_eq!(commits, vec![sha('c'), sha('b'), sha('a')]);
}

#[tokio::test]
async fn test_list_pr_commits_unavailable() {
    let mut server = Server::new_async().await;
    server
        .mock("GET", "/repos/dotnet/maui/pulls/42/commits")
        .match_query(Matcher::Any)
        .with_status(502)
        .create_async()
        .await;

    let result = client_for(&server)
        .list_pr_commits(PullRequestRef(42), &CancellationToken::new())
        .await;

    assert!(matches!(result, Err(MauiChannelError::Unavailable { .. })));
}

#[tokio::test]
async fn test_list_pr_commits_malformed_sha_is_parse_error() {
    let mut server = Server::new_async().await;
    server
        .mock("GET", "/repos/dotnet/maui/pulls/42/commits")
        .match_query(Matcher::Any)
        .with_status(200)
        .with_body(r#"[{"sha": "not-a-sha"}]"#)
        .create_async()
        .await;

    let result = client_for(&server)
        .list_pr_commits(PullRequestRef(42), &CancellationToken::new())
        .await;

    assert!(matches!(result, Err(MauiChannelError::Parse { .. })));
}

#[tokio::test]
async fn test_fetch_check_runs_paginates_to_total_count() {
    let mut server = Server::new_async().await;
    let path = format!("/repos/dotnet/maui/commits/{}/check-runs", "a".repeat(40));

    let first = server
        .mock("GET", path.as_str())
        .match_query(page_query("2", "1"))
        .with_status(200)
        .with_body(
            json!({"total_count": 3, "check_runs": [check_run("maui-pr"), check_run("lint")]})
                .to_string(),
        )
        .create_async()
        .await;
    let second = server
        .mock("GET", path.as_str())
        .match_query(page_query("2", "2"))
        .with_status(200)
        .with_body(json!({"total_count": 3, "check_runs": [check_run("docs")]}).to_string())
        .create_async()
        .await;

    let runs = client_for(&server)
        .with_page_sizes(100, 2)
        .fetch_check_runs(&sha('a'), &CancellationToken::new())
        .await
        .unwrap();

    first.assert_async().await;
    second.assert_async().await;
    let names: Vec<_> = runs.iter().map(|run| run.name.as_str()).collect();
    assert_eq!(names, vec!["maui-pr", "lint", "docs"]);
}

#[tokio::test]
async fn test_fetch_check_runs_empty_commit() {
    let mut server = Server::new_async().await;
    let path = format!("/repos/dotnet/maui/commits/{}/check-runs", "a".repeat(40));
    server
        .mock("GET", path.as_str())
        .match_query(page_query("100", "1"))
        .with_status(200)
        .with_body(json!({"total_count": 0, "check_runs": []}).to_string())
        .create_async()
        .await;

    let runs = client_for(&server)
        .fetch_check_runs(&sha('a'), &CancellationToken::new())
        .await
        .unwrap();

    assert!(runs.is_empty());
}

#[tokio::test]
async fn test_fetch_check_runs_failed_page_invalidates_fetch() {
    let mut server = Server::new_async().await;
    let path = format!("/repos/dotnet/maui/commits/{}/check-runs", "a".repeat(40));
    server
        .mock("GET", path.as_str())
        .match_query(page_query("1", "1"))
        .with_status(200)
        .with_body(json!({"total_count": 2, "check_runs": [check_run("maui-pr")]}).to_string())
        .create_async()
        .await;
    server
        .mock("GET", path.as_str())
        .match_query(page_query("1", "2"))
        .with_status(500)
        .create_async()
        .await;

    let result = client_for(&server)
        .with_page_sizes(100, 1)
        .fetch_check_runs(&sha('a'), &CancellationToken::new())
        .await;

    assert!(matches!(result, Err(MauiChannelError::Unavailable { .. })));
}

#[tokio::test]
async fn test_fetch_check_runs_short_pages_are_an_error() {
    let mut server = Server::new_async().await;
    let path = format!("/repos/dotnet/maui/commits/{}/check-runs", "a".repeat(40));
    server
        .mock("GET", path.as_str())
        .match_query(page_query("100", "1"))
        .with_status(200)
        .with_body(json!({"total_count": 5, "check_runs": [check_run("maui-pr")]}).to_string())
        .create_async()
        .await;
    server
        .mock("GET", path.as_str())
        .match_query(page_query("100", "2"))
        .with_status(200)
        .with_body(json!({"total_count": 5, "check_runs": []}).to_string())
        .create_async()
        .await;

    let result = client_for(&server)
        .fetch_check_runs(&sha('a'), &CancellationToken::new())
        .await;

    match result {
        Err(MauiChannelError::IncompletePagination {
            expected, received, ..
        }) => {
            assert_eq!(expected, 5);
            assert_eq!(received, 1);
        }
        other => panic!("expected incomplete pagination, got {other:?}"),
    }
}

#[tokio::test]
async fn test_fetch_check_runs_cancelled() {
    let server = Server::new_async().await;
    let cancel = CancellationToken::new();
    cancel.cancel();

    let result = client_for(&server).fetch_check_runs(&sha('a'), &cancel).await;

    assert!(matches!(result, Err(MauiChannelError::Cancelled)));
}

#[tokio::test]
async fn test_fetch_check_runs_cancelled_between_pages() {
    let mut server = Server::new_async().await;
    let path = format!("/repos/dotnet/maui/commits/{}/check-runs", "a".repeat(40));
    let cancel = CancellationToken::new();
    let first_page = server
        .mock("GET", path.as_str())
        .match_query(page_query("100", "1"))
        .with_status(200)
        .with_body(json!({"total_count": 2, "check_runs": [check_run("maui-pr")]}).to_string())
        .create_async()
        .await;
    let fired = cancel.clone();
    server
        .mock("GET", path.as_str())
        .match_query(page_query("100", "2"))
        .with_status(200)
        .with_chunked_body(move |writer| {
            fired.cancel();
            std::thread::sleep(Duration::from_millis(500));
            writer.write_all(
                json!({"total_count": 2, "check_runs": [check_run("maui-pr-devicetests")]})
                    .to_string()
                    .as_bytes(),
            )
        })
        .create_async()
        .await;

    let result = client_for(&server).fetch_check_runs(&sha('a'), &cancel).await;

    first_page.assert_async().await;
    assert!(matches!(result, Err(MauiChannelError::Cancelled)));
}
