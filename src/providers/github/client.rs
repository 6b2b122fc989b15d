use async_trait::async_trait;
use log::{debug, info, warn};
use reqwest::header::ACCEPT;
use reqwest::{Client, RequestBuilder};
use tokio_util::sync::CancellationToken;

use crate::auth::Token;
use crate::candidate::{CommitSha, PullRequestRef};
use crate::error::{MauiChannelError, Result};
use crate::providers::http::{normalize_base_url, send_json};
use crate::resolver::{CheckRunSource, CommitLister};

use super::types::{CheckRun, CheckRunsPage, PullRequestCommit};

const API_VERSION: &str = "2022-11-28";
const MAX_PAGE_SIZE: u32 = 100;

/// GitHub REST API client for pull request commits and check runs.
#[derive(Clone)]
pub struct GitHubClient {
    client: Client,
    base_url: String,
    owner: String,
    repo: String,
    token: Option<Token>,
    commits_per_page: u32,
    check_runs_per_page: u32,
}

impl GitHubClient {
    /// Create a new GitHub API client.
    ///
    /// # Arguments
    ///
    /// * `client` - Process-wide HTTP client
    /// * `base_url` - GitHub API base URL (e.g., <https://api.github.com>)
    /// * `repo_path` - Repository path in format "owner/repo"
    /// * `token` - Optional GitHub personal access token
    ///
    /// # Errors
    ///
    /// Returns an error if the base URL or repository path is malformed.
    pub fn new(
        client: Client,
        base_url: &str,
        repo_path: &str,
        token: Option<Token>,
    ) -> Result<Self> {
        let parts: Vec<&str> = repo_path.split('/').collect();
        let [owner, repo] = parts.as_slice() else {
            return Err(MauiChannelError::Config(
                "Repository path must be in format 'owner/repo'".to_string(),
            ));
        };
        if owner.is_empty() || repo.is_empty() {
            return Err(MauiChannelError::Config(
                "Repository path must be in format 'owner/repo'".to_string(),
            ));
        }

        Ok(Self {
            client,
            base_url: normalize_base_url(base_url)?,
            owner: (*owner).to_string(),
            repo: (*repo).to_string(),
            token,
            commits_per_page: MAX_PAGE_SIZE,
            check_runs_per_page: MAX_PAGE_SIZE,
        })
    }

    /// Overrides the page sizes, clamped to GitHub's maximum of 100.
    pub fn with_page_sizes(mut self, commits_per_page: u32, check_runs_per_page: u32) -> Self {
        self.commits_per_page = commits_per_page.clamp(1, MAX_PAGE_SIZE);
        self.check_runs_per_page = check_runs_per_page.clamp(1, MAX_PAGE_SIZE);
        self
    }

    /// Web page of a pull request.
    pub fn pull_request_url(&self, pr: PullRequestRef) -> String {
        format!(
            "https://github.com/{}/{}/pull/{}",
            self.owner,
            self.repo,
            pr.number()
        )
    }

    fn repo_url(&self) -> String {
        format!("{}/repos/{}/{}", self.base_url, self.owner, self.repo)
    }

    fn auth_request(&self, request: RequestBuilder) -> RequestBuilder {
        let request = request
            .header(ACCEPT, "application/vnd.github+json")
            .header("X-GitHub-Api-Version", API_VERSION);

        if let Some(token) = &self.token {
            request.bearer_auth(token.as_str())
        } else {
            request
        }
    }
}

#[async_trait]
impl CommitLister for GitHubClient {
    /// Only the first page is requested; PRs longer than `commits_per_page`
    /// lose their oldest commits.
    async fn list_pr_commits(
        &self,
        pr: PullRequestRef,
        cancel: &CancellationToken,
    ) -> Result<Vec<CommitSha>> {
        let endpoint = format!("{}/pulls/{}/commits", self.repo_url(), pr.number());
        let request = self.auth_request(
            self.client
                .get(&endpoint)
                .query(&[("per_page", self.commits_per_page)]),
        );

        let commits: Vec<PullRequestCommit> = send_json(request, &endpoint, cancel).await?;

        if commits.len() >= self.commits_per_page as usize {
            warn!(
                "PR {pr} has at least {} commits; older commits are not searched",
                commits.len()
            );
        }
        info!("Found {} commits for PR {pr}", commits.len());

        // GitHub lists oldest first
        Ok(commits.into_iter().rev().map(|commit| commit.sha).collect())
    }
}

#[async_trait]
impl CheckRunSource for GitHubClient {
    async fn fetch_check_runs(
        &self,
        sha: &CommitSha,
        cancel: &CancellationToken,
    ) -> Result<Vec<CheckRun>> {
        let endpoint = format!("{}/commits/{}/check-runs", self.repo_url(), sha);
        let mut all_runs = Vec::new();
        let mut total_count;
        let mut page: u32 = 1;

        loop {
            debug!("Fetching check runs for commit {} (page {page})", sha.short());

            let request = self.auth_request(
                self.client
                    .get(&endpoint)
                    .query(&[("per_page", self.check_runs_per_page), ("page", page)]),
            );

            let response: CheckRunsPage = send_json(request, &endpoint, cancel).await?;
            total_count = response.total_count;

            if response.check_runs.is_empty() {
                break;
            }

            all_runs.extend(response.check_runs);

            if all_runs.len() >= total_count {
                break;
            }

            page += 1;
        }

        if all_runs.len() != total_count {
            return Err(MauiChannelError::IncompletePagination {
                sha: sha.to_string(),
                expected: total_count,
                received: all_runs.len(),
            });
        }

        debug!(
            "Fetched {} check runs for commit {} across {page} page(s)",
            all_runs.len(),
            sha.short()
        );

        Ok(all_runs)
    }
}
