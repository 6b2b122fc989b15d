//! The narrow interfaces the resolver searches through.
//!
//! Production implementations talk to GitHub and Azure DevOps; tests plug in
//! in-memory hosts.

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::candidate::{CandidateBuild, CommitSha, PullRequestRef};
use crate::error::Result;
use crate::providers::github::CheckRun;

/// Lists the commits of a pull request.
#[async_trait]
pub trait CommitLister: Send + Sync {
    /// Commits of `pr`, most recent first.
    async fn list_pr_commits(
        &self,
        pr: PullRequestRef,
        cancel: &CancellationToken,
    ) -> Result<Vec<CommitSha>>;
}

/// Fetches every check run reported for a commit.
#[async_trait]
pub trait CheckRunSource: Send + Sync {
    /// Returns the complete set, or an error. Never a partial page set.
    async fn fetch_check_runs(
        &self,
        sha: &CommitSha,
        cancel: &CancellationToken,
    ) -> Result<Vec<CheckRun>>;
}

/// Queries the build system directly for a pull request's merge-ref builds.
#[async_trait]
pub trait BuildSource: Send + Sync {
    /// First completed build of `definition` for the PR, in the host's order.
    async fn find_pr_build(
        &self,
        pr: PullRequestRef,
        definition: &str,
        cancel: &CancellationToken,
    ) -> Result<Option<CandidateBuild>>;
}

/// Confirms that a build exposes a named artifact.
#[async_trait]
pub trait ArtifactVerifier: Send + Sync {
    /// `false` covers both "absent" and "could not check".
    async fn has_artifact(
        &self,
        build: &CandidateBuild,
        artifact: &str,
        cancel: &CancellationToken,
    ) -> bool;
}
