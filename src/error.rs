use thiserror::Error;

#[derive(Error, Debug)]
pub enum MauiChannelError {
    /// The remote API could not be reached or answered with a non-success status.
    #[error("{endpoint} unavailable: {reason}")]
    Unavailable { endpoint: String, reason: String },

    /// A success response whose body could not be interpreted.
    #[error("Malformed response from {endpoint}: {source}")]
    Parse {
        endpoint: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("Check runs for commit {sha} were truncated: expected {expected}, received {received}")]
    IncompletePagination {
        sha: String,
        expected: usize,
        received: usize,
    },

    #[error("No resolvable build found for PR #{pr}")]
    NotFound { pr: u64 },

    #[error("Operation cancelled")]
    Cancelled,

    /// A package feed answered but holds nothing usable.
    #[error("Package feed error: {0}")]
    PackageFeed(String),

    #[error("Artifact download failed: {0}")]
    Download(String),

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Project descriptor error: {0}")]
    Descriptor(String),

    #[error("dotnet restore failed: {0}")]
    Restore(String),

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Archive error: {0}")]
    Archive(#[from] zip::result::ZipError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl MauiChannelError {
    /// Failures that abandon a single commit or strategy rather than the whole search.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Self::Unavailable { .. } | Self::Parse { .. } | Self::IncompletePagination { .. }
        )
    }
}

pub type Result<T> = std::result::Result<T, MauiChannelError>;
