use async_trait::async_trait;
use log::{debug, info, warn};
use reqwest::header::ACCEPT;
use reqwest::{Client, RequestBuilder};
use tokio_util::sync::CancellationToken;

use crate::auth::Token;
use crate::candidate::{CandidateBuild, PullRequestRef};
use crate::error::{MauiChannelError, Result};
use crate::providers::http::{normalize_base_url, send_json};
use crate::resolver::{ArtifactVerifier, BuildSource};

use super::types::{Artifact, Build, BuildStatus, ListResponse};

const API_VERSION: &str = "7.1";
const DEFAULT_TOP: u32 = 10;

/// Azure DevOps build REST API client.
#[derive(Clone)]
pub struct AzureDevOpsClient {
    pub(super) client: Client,
    base_url: String,
    organization: String,
    project: String,
    token: Option<Token>,
    top: u32,
}

impl AzureDevOpsClient {
    /// Create a new Azure DevOps client.
    ///
    /// # Arguments
    ///
    /// * `client` - Process-wide HTTP client
    /// * `base_url` - REST API base URL (e.g., <https://dev.azure.com>)
    /// * `organization` - Organization searched for merge-ref builds
    /// * `project` - Project searched for merge-ref builds
    /// * `token` - Optional personal access token
    ///
    /// # Errors
    ///
    /// Returns an error if the base URL is malformed.
    pub fn new(
        client: Client,
        base_url: &str,
        organization: &str,
        project: &str,
        token: Option<Token>,
    ) -> Result<Self> {
        Ok(Self {
            client,
            base_url: normalize_base_url(base_url)?,
            organization: organization.to_string(),
            project: project.to_string(),
            token,
            top: DEFAULT_TOP,
        })
    }

    /// Number of most recent merge-ref builds inspected by the fallback.
    pub fn with_top(mut self, top: u32) -> Self {
        self.top = top.max(1);
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub(super) fn auth_request(&self, request: RequestBuilder) -> RequestBuilder {
        let request = request.header(ACCEPT, "application/json");

        if let Some(token) = &self.token {
            request.basic_auth("", Some(token.as_str()))
        } else {
            request
        }
    }

    fn builds_url(&self, organization: &str, project: &str) -> String {
        format!("{}/{organization}/{project}/_apis/build/builds", self.base_url)
    }

    /// Lists the artifacts published by a build.
    ///
    /// # Errors
    ///
    /// Returns `Unavailable` or `Parse` if the listing cannot be read, and
    /// `Cancelled` if `cancel` fires first.
    pub async fn list_artifacts(
        &self,
        build: &CandidateBuild,
        cancel: &CancellationToken,
    ) -> Result<Vec<Artifact>> {
        let endpoint = format!(
            "{}/{}/artifacts",
            self.builds_url(&build.organization, &build.project),
            build.build_id
        );
        let request = self.auth_request(
            self.client
                .get(&endpoint)
                .query(&[("api-version", API_VERSION)]),
        );

        let response: ListResponse<Artifact> = send_json(request, &endpoint, cancel).await?;
        debug!(
            "Build {} publishes {} artifacts",
            build.build_id,
            response.value.len()
        );

        Ok(response.value)
    }

    /// Finds the artifact named `name`, compared case-insensitively.
    ///
    /// # Errors
    ///
    /// Propagates listing failures.
    pub async fn find_artifact(
        &self,
        build: &CandidateBuild,
        name: &str,
        cancel: &CancellationToken,
    ) -> Result<Option<Artifact>> {
        let artifacts = self.list_artifacts(build, cancel).await?;
        Ok(artifacts
            .into_iter()
            .find(|artifact| artifact.name.eq_ignore_ascii_case(name)))
    }
}

#[async_trait]
impl BuildSource for AzureDevOpsClient {
    async fn find_pr_build(
        &self,
        pr: PullRequestRef,
        definition: &str,
        cancel: &CancellationToken,
    ) -> Result<Option<CandidateBuild>> {
        let endpoint = self.builds_url(&self.organization, &self.project);
        let branch = pr.merge_ref();
        let top = self.top.to_string();

        info!("Querying Azure DevOps builds for branch {branch}");

        let request = self.auth_request(self.client.get(&endpoint).query(&[
            ("branchName", branch.as_str()),
            ("$top", top.as_str()),
            ("api-version", API_VERSION),
        ]));

        let response: ListResponse<Build> = send_json(request, &endpoint, cancel).await?;
        info!(
            "Found {} builds for {branch} in {}/{}",
            response.value.len(),
            self.organization,
            self.project
        );

        for build in response.value {
            if build.status == BuildStatus::Completed && build.definition.name == definition {
                info!(
                    "Found completed {definition} build {} ({})",
                    build.id, build.build_number
                );
                return Ok(Some(build.into_candidate(&self.organization, &self.project)));
            }

            debug!(
                "Skipping build {}: definition={}, status={}",
                build.id, build.definition.name, build.status
            );
        }

        Ok(None)
    }
}

#[async_trait]
impl ArtifactVerifier for AzureDevOpsClient {
    async fn has_artifact(
        &self,
        build: &CandidateBuild,
        artifact: &str,
        cancel: &CancellationToken,
    ) -> bool {
        match self.find_artifact(build, artifact, cancel).await {
            Ok(Some(_)) => {
                debug!("Build {} publishes {artifact}", build.build_id);
                true
            }
            Ok(None) => {
                info!("Build {} does not publish {artifact}", build.build_id);
                false
            }
            Err(MauiChannelError::Cancelled) => false,
            Err(err) => {
                warn!("Could not verify artifacts of build {}: {err}", build.build_id);
                false
            }
        }
    }
}
