use std::fmt;

use serde::{Deserialize, Serialize};

/// A pull request number on the code host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PullRequestRef(pub u64);

impl PullRequestRef {
    pub fn number(self) -> u64 {
        self.0
    }

    /// Synthetic branch Azure Pipelines builds for a pull request.
    pub fn merge_ref(self) -> String {
        format!("refs/pull/{}/merge", self.0)
    }
}

impl fmt::Display for PullRequestRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// A full 40-character hexadecimal commit id.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct CommitSha(String);

impl CommitSha {
    pub const LEN: usize = 40;

    /// Abbreviated form for log lines.
    pub fn short(&self) -> &str {
        &self.0[..8]
    }
}

impl TryFrom<String> for CommitSha {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        if value.len() == Self::LEN && value.bytes().all(|b| b.is_ascii_hexdigit()) {
            Ok(Self(value.to_ascii_lowercase()))
        } else {
            Err(format!("invalid commit sha: {value:?}"))
        }
    }
}

impl From<CommitSha> for String {
    fn from(value: CommitSha) -> Self {
        value.0
    }
}

impl fmt::Display for CommitSha {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A build that exposes the package artifact and can be downloaded.
///
/// Produced by either search strategy. Only builds that passed artifact
/// verification leave the resolver.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CandidateBuild {
    pub build_id: u64,
    pub build_number: String,
    pub status: String,
    pub result: Option<String>,
    pub source_branch: String,
    pub source_version: String,
    pub organization: String,
    pub project: String,
}

impl CandidateBuild {
    /// Web page of the build on the build host.
    pub fn web_url(&self, base_url: &str) -> String {
        format!(
            "{}/{}/{}/_build/results?buildId={}",
            base_url.trim_end_matches('/'),
            self.organization,
            self.project,
            self.build_id
        )
    }
}
