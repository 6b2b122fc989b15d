use std::fmt;

use serde::Deserialize;

use crate::candidate::CandidateBuild;

/// Envelope Azure DevOps wraps list responses in.
#[derive(Debug, Deserialize)]
pub(super) struct ListResponse<T> {
    pub value: Vec<T>,
}

/// Execution state of an Azure Pipelines build.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum BuildStatus {
    NotStarted,
    InProgress,
    Cancelling,
    Postponed,
    Completed,
    #[serde(other)]
    Other,
}

impl BuildStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::NotStarted => "notStarted",
            Self::InProgress => "inProgress",
            Self::Cancelling => "cancelling",
            Self::Postponed => "postponed",
            Self::Completed => "completed",
            Self::Other => "other",
        }
    }
}

impl fmt::Display for BuildStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct BuildDefinition {
    pub name: String,
}

/// A build as returned by `_apis/build/builds`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Build {
    pub id: u64,
    pub build_number: String,
    pub status: BuildStatus,
    #[serde(default)]
    pub result: Option<String>,
    #[serde(default)]
    pub source_branch: String,
    #[serde(default)]
    pub source_version: String,
    pub definition: BuildDefinition,
}

impl Build {
    pub fn into_candidate(self, organization: &str, project: &str) -> CandidateBuild {
        CandidateBuild {
            build_id: self.id,
            build_number: self.build_number,
            status: self.status.to_string(),
            result: self.result,
            source_branch: self.source_branch,
            source_version: self.source_version,
            organization: organization.to_string(),
            project: project.to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ArtifactResource {
    #[serde(default)]
    pub download_url: Option<String>,
}

/// A named output bundle attached to a build.
#[derive(Debug, Clone, Deserialize)]
pub struct Artifact {
    pub name: String,
    #[serde(default)]
    pub resource: Option<ArtifactResource>,
}

impl Artifact {
    pub fn download_url(&self) -> Option<&str> {
        self.resource.as_ref()?.download_url.as_deref()
    }
}
