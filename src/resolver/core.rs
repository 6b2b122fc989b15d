use std::fmt;
use std::pin::pin;
use std::sync::Arc;

use futures::stream::{self, StreamExt};
use log::{debug, info, warn};
use serde::Serialize;
use tokio_util::sync::CancellationToken;

use crate::candidate::{CandidateBuild, CommitSha, PullRequestRef};
use crate::config::ResolverConfig;
use crate::error::{MauiChannelError, Result};
use crate::providers::azure::BuildUrlPattern;
use crate::providers::github::{CheckConclusion, CheckRun, CheckStatus};
use crate::providers::{AzureDevOpsClient, GitHubClient};

use super::filter::CheckNameFilter;
use super::sources::{ArtifactVerifier, BuildSource, CheckRunSource, CommitLister};

/// How a resolved build was found.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum Strategy {
    /// A check run on this commit linked to the build.
    CommitChecks { sha: CommitSha },
    /// The build system listed the build for the PR's merge ref.
    MergeRefBuilds,
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::CommitChecks { sha } => write!(f, "check runs on commit {}", sha.short()),
            Self::MergeRefBuilds => f.write_str("merge-ref builds"),
        }
    }
}

/// A verified build and how it was reached.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Resolution {
    pub build: CandidateBuild,
    pub strategy: Strategy,
    pub verification_attempts: usize,
}

/// The systems the resolver searches.
pub struct ResolverSources {
    pub commits: Arc<dyn CommitLister>,
    pub checks: Arc<dyn CheckRunSource>,
    pub builds: Arc<dyn BuildSource>,
    pub verifier: Arc<dyn ArtifactVerifier>,
}

impl ResolverSources {
    /// Commits and checks from GitHub, builds and artifacts from Azure DevOps.
    pub fn new(github: Arc<GitHubClient>, azure: Arc<AzureDevOpsClient>) -> Self {
        Self {
            commits: github.clone(),
            checks: github,
            builds: azure.clone(),
            verifier: azure,
        }
    }
}

/// Maps a pull request to a build with a confirmed package artifact.
///
/// The search moves through `SearchingCommits → VerifyingCommitCandidate →
/// SearchingOrchestrator → VerifyingOrchestratorCandidate` and ends either
/// resolved or exhausted. Commits are walked newest first because the head
/// commit is often a merge or rebase whose run superseded an earlier,
/// artifact-bearing one. The merge-ref query runs only once every commit has
/// been tried, since some triggers never report back as check runs.
pub struct BuildResolver {
    sources: ResolverSources,
    filter: CheckNameFilter,
    url_pattern: BuildUrlPattern,
    required_artifact: String,
    commit_concurrency: usize,
}

impl BuildResolver {
    /// # Errors
    ///
    /// Returns a configuration error if the build host domain is unusable or
    /// `commit_concurrency` is zero.
    pub fn new(
        sources: ResolverSources,
        config: &ResolverConfig,
        host_domain: &str,
    ) -> Result<Self> {
        if config.commit_concurrency == 0 {
            return Err(MauiChannelError::Config(
                "commit concurrency must be at least 1".to_string(),
            ));
        }

        Ok(Self {
            sources,
            filter: CheckNameFilter::new(config.build_check.clone(), &config.excluded_checks),
            url_pattern: BuildUrlPattern::new(host_domain)?,
            required_artifact: config.required_artifact.clone(),
            commit_concurrency: config.commit_concurrency,
        })
    }

    /// Finds the build to download for `pr`.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` when neither strategy yields a verified build and
    /// `Cancelled` when `cancel` fires. Transient API failures never escape.
    pub async fn resolve(
        &self,
        pr: PullRequestRef,
        cancel: &CancellationToken,
    ) -> Result<Resolution> {
        let mut attempts = 0;

        if let Some(resolution) = self.search_commits(pr, &mut attempts, cancel).await? {
            return Ok(resolution);
        }

        if let Some(resolution) = self
            .search_merge_ref_builds(pr, &mut attempts, cancel)
            .await?
        {
            return Ok(resolution);
        }

        warn!("No verified build for PR {pr} after {attempts} verification attempt(s)");
        Err(MauiChannelError::NotFound { pr: pr.number() })
    }

    async fn search_commits(
        &self,
        pr: PullRequestRef,
        attempts: &mut usize,
        cancel: &CancellationToken,
    ) -> Result<Option<Resolution>> {
        ensure_active(cancel)?;

        let commits = match self.sources.commits.list_pr_commits(pr, cancel).await {
            Ok(commits) => commits,
            Err(err) if err.is_recoverable() => {
                warn!("Could not list commits of PR {pr}, falling back to merge-ref builds: {err}");
                return Ok(None);
            }
            Err(err) => return Err(err),
        };

        if commits.is_empty() {
            info!("PR {pr} has no commits to search");
            return Ok(None);
        }

        // Up to `commit_concurrency` check-run fetches overlap while the stream
        // is polled. Nothing is fetched during verification, and `buffered`
        // yields in commit order.
        let mut scans = pin!(stream::iter(&commits)
            .map(move |sha| async move { (sha, self.scan_commit(pr, sha, cancel).await) })
            .buffered(self.commit_concurrency));

        while let Some((sha, outcome)) = scans.next().await {
            let candidate = match outcome {
                Ok(Some(candidate)) => candidate,
                Ok(None) => continue,
                Err(err) if err.is_recoverable() => {
                    warn!("Skipping commit {}: {err}", sha.short());
                    continue;
                }
                Err(err) => return Err(err),
            };

            let strategy = Strategy::CommitChecks { sha: sha.clone() };
            if let Some(resolution) = self.verify(candidate, strategy, attempts, cancel).await? {
                return Ok(Some(resolution));
            }
        }

        info!(
            "None of the {} commits of PR {pr} led to a verified build",
            commits.len()
        );
        Ok(None)
    }

    async fn scan_commit(
        &self,
        pr: PullRequestRef,
        sha: &CommitSha,
        cancel: &CancellationToken,
    ) -> Result<Option<CandidateBuild>> {
        ensure_active(cancel)?;

        let runs = self.sources.checks.fetch_check_runs(sha, cancel).await?;
        debug!("Commit {} has {} check runs", sha.short(), runs.len());

        Ok(self.candidate_from_checks(pr, sha, &runs))
    }

    /// First relevant, completed check whose link names a build. Relevant
    /// checks that fail either test are only reported.
    fn candidate_from_checks(
        &self,
        pr: PullRequestRef,
        sha: &CommitSha,
        runs: &[CheckRun],
    ) -> Option<CandidateBuild> {
        let mut unusable = Vec::new();

        for run in runs.iter().filter(|run| self.filter.is_relevant(&run.name)) {
            let location = match (run.status, run.details_url.as_deref()) {
                (CheckStatus::Completed, Some(url)) => self.url_pattern.extract(url),
                _ => None,
            };

            let Some(location) = location else {
                unusable.push(format!(
                    "{} ({}/{})",
                    run.name,
                    run.status,
                    run.conclusion.map_or("pending", CheckConclusion::as_str)
                ));
                continue;
            };

            info!(
                "Check {} on commit {} links to build {} in {}/{}",
                run.name,
                sha.short(),
                location.build_id,
                location.organization,
                location.project
            );

            return Some(CandidateBuild {
                build_id: location.build_id,
                build_number: format!("PR-{}", pr.number()),
                status: run.status.to_string(),
                result: run.conclusion.map(|conclusion| conclusion.to_string()),
                source_branch: pr.merge_ref(),
                source_version: sha.to_string(),
                organization: location.organization,
                project: location.project,
            });
        }

        if unusable.is_empty() {
            info!(
                "No {} checks on commit {}",
                self.filter.identifier(),
                sha.short()
            );
        } else {
            warn!(
                "Found {} relevant {} checks on commit {}, none completed with a build link: {}",
                unusable.len(),
                self.filter.identifier(),
                sha.short(),
                unusable.join(", ")
            );
        }

        None
    }

    async fn search_merge_ref_builds(
        &self,
        pr: PullRequestRef,
        attempts: &mut usize,
        cancel: &CancellationToken,
    ) -> Result<Option<Resolution>> {
        ensure_active(cancel)?;

        let found = self
            .sources
            .builds
            .find_pr_build(pr, self.filter.identifier(), cancel)
            .await;

        let build = match found {
            Ok(Some(build)) => build,
            Ok(None) => {
                info!(
                    "No completed {} build for {}",
                    self.filter.identifier(),
                    pr.merge_ref()
                );
                return Ok(None);
            }
            Err(err) if err.is_recoverable() => {
                warn!("Merge-ref build search for PR {pr} failed: {err}");
                return Ok(None);
            }
            Err(err) => return Err(err),
        };

        self.verify(build, Strategy::MergeRefBuilds, attempts, cancel)
            .await
    }

    async fn verify(
        &self,
        build: CandidateBuild,
        strategy: Strategy,
        attempts: &mut usize,
        cancel: &CancellationToken,
    ) -> Result<Option<Resolution>> {
        ensure_active(cancel)?;
        *attempts += 1;

        let verified = self
            .sources
            .verifier
            .has_artifact(&build, &self.required_artifact, cancel)
            .await;

        // A cancelled verification reads as `false`; don't mistake it for a miss.
        ensure_active(cancel)?;

        if !verified {
            warn!(
                "Build {} found via {strategy} has no {} artifact, continuing search",
                build.build_id, self.required_artifact
            );
            return Ok(None);
        }

        info!("Resolved build {} via {strategy}", build.build_id);
        Ok(Some(Resolution {
            build,
            strategy,
            verification_attempts: *attempts,
        }))
    }
}

fn ensure_active(cancel: &CancellationToken) -> Result<()> {
    if cancel.is_cancelled() {
        Err(MauiChannelError::Cancelled)
    } else {
        Ok(())
    }
}
