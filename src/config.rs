use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Configuration file structure for maui-channel.
///
/// Everything the resolver matches against (check names, artifact name, host
/// domain) lives here so the tool can be pointed at another repository or
/// pipeline naming convention without code changes.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct Config {
    #[serde(default)]
    pub github: GitHubConfig,

    #[serde(default)]
    pub azure: AzureConfig,

    #[serde(default)]
    pub resolver: ResolverConfig,

    #[serde(default)]
    pub nuget: NuGetConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct GitHubConfig {
    /// GitHub REST API base URL
    #[serde(default = "default_github_base_url")]
    pub base_url: String,

    /// Repository path (e.g., 'dotnet/maui')
    #[serde(default = "default_repo_path")]
    pub repo_path: String,

    /// GitHub personal access token
    pub token: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct AzureConfig {
    /// Azure DevOps REST API base URL
    #[serde(default = "default_azure_base_url")]
    pub base_url: String,

    /// Host that check-run details URLs must point at
    #[serde(default = "default_host_domain")]
    pub host_domain: String,

    /// Organization queried by the merge-ref fallback
    #[serde(default = "default_organization")]
    pub organization: String,

    /// Project queried by the merge-ref fallback
    #[serde(default = "default_project")]
    pub project: String,

    /// Azure DevOps personal access token
    pub token: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct ResolverConfig {
    /// Name of the pipeline check that publishes packages
    #[serde(default = "default_build_check")]
    pub build_check: String,

    /// Check names containing any of these (case-insensitive) are ignored
    #[serde(default = "default_excluded_checks")]
    pub excluded_checks: Vec<String>,

    /// Artifact a build must expose to be usable
    #[serde(default = "default_required_artifact")]
    pub required_artifact: String,

    /// Commits requested for a PR. Only one page is fetched, so PRs with more
    /// commits than this lose their oldest commits to the check-run search.
    #[serde(default = "default_page_size")]
    pub commits_per_page: u32,

    /// Page size used while paginating check runs
    #[serde(default = "default_page_size")]
    pub check_runs_per_page: u32,

    /// Builds requested from the merge-ref fallback
    #[serde(default = "default_orchestrator_top")]
    pub orchestrator_top: u32,

    /// Commits whose check runs may be fetched ahead concurrently
    #[serde(default = "default_commit_concurrency")]
    pub commit_concurrency: usize,

    /// Per-request timeout in seconds
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct NuGetConfig {
    /// Flat container the stable channel reads released versions from
    #[serde(default = "default_flat_container_url")]
    pub flat_container_url: String,
}

impl Default for NuGetConfig {
    fn default() -> Self {
        Self {
            flat_container_url: default_flat_container_url(),
        }
    }
}

impl Default for GitHubConfig {
    fn default() -> Self {
        Self {
            base_url: default_github_base_url(),
            repo_path: default_repo_path(),
            token: None,
        }
    }
}

impl Default for AzureConfig {
    fn default() -> Self {
        Self {
            base_url: default_azure_base_url(),
            host_domain: default_host_domain(),
            organization: default_organization(),
            project: default_project(),
            token: None,
        }
    }
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            build_check: default_build_check(),
            excluded_checks: default_excluded_checks(),
            required_artifact: default_required_artifact(),
            commits_per_page: default_page_size(),
            check_runs_per_page: default_page_size(),
            orchestrator_top: default_orchestrator_top(),
            commit_concurrency: default_commit_concurrency(),
            request_timeout_secs: default_request_timeout_secs(),
        }
    }
}

fn default_github_base_url() -> String {
    "https://api.github.com".to_string()
}

fn default_repo_path() -> String {
    "dotnet/maui".to_string()
}

fn default_azure_base_url() -> String {
    "https://dev.azure.com".to_string()
}

fn default_host_domain() -> String {
    "dev.azure.com".to_string()
}

fn default_organization() -> String {
    "dnceng-public".to_string()
}

fn default_project() -> String {
    "public".to_string()
}

fn default_flat_container_url() -> String {
    "https://api.nuget.org/v3-flatcontainer".to_string()
}

fn default_build_check() -> String {
    "maui-pr".to_string()
}

fn default_excluded_checks() -> Vec<String> {
    vec!["uitests".to_string()]
}

fn default_required_artifact() -> String {
    "PackageArtifacts".to_string()
}

fn default_page_size() -> u32 {
    100
}

fn default_orchestrator_top() -> u32 {
    10
}

fn default_commit_concurrency() -> usize {
    4
}

fn default_request_timeout_secs() -> u64 {
    30
}

impl Config {
    /// Load configuration from a file.
    ///
    /// Searches for configuration files in this order:
    /// 1. Specified path
    /// 2. ./maui-channel.toml
    /// 3. ./maui-channel.json
    /// 4. ./maui-channel.yaml
    /// 5. ./maui-channel.yml
    ///
    /// Returns default configuration if no file is found.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        if let Some(path) = path {
            return Self::load_from_path(path);
        }

        let candidates = [
            "maui-channel.toml",
            "maui-channel.json",
            "maui-channel.yaml",
            "maui-channel.yml",
        ];

        for candidate in &candidates {
            let path = Path::new(candidate);
            if path.exists() {
                return Self::load_from_path(path);
            }
        }

        Ok(Self::default())
    }

    fn load_from_path(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let extension = path.extension().and_then(|ext| ext.to_str()).unwrap_or("");

        let config: Self = match extension {
            "toml" => toml::from_str(&contents)
                .with_context(|| format!("Failed to parse TOML config: {}", path.display()))?,
            "json" => serde_json::from_str(&contents)
                .with_context(|| format!("Failed to parse JSON config: {}", path.display()))?,
            "yaml" | "yml" => serde_yaml::from_str(&contents)
                .with_context(|| format!("Failed to parse YAML config: {}", path.display()))?,
            _ => toml::from_str(&contents)
                .or_else(|_| serde_json::from_str(&contents))
                .or_else(|_| serde_yaml::from_str(&contents))
                .with_context(|| format!("Failed to parse config file: {}", path.display()))?,
        };

        config.validate()?;
        Ok(config)
    }

    /// Reject values the GitHub and Azure APIs would refuse or silently clamp.
    pub fn validate(&self) -> Result<()> {
        let resolver = &self.resolver;
        if resolver.build_check.trim().is_empty() {
            anyhow::bail!("resolver.build-check must not be empty");
        }
        if resolver.required_artifact.trim().is_empty() {
            anyhow::bail!("resolver.required-artifact must not be empty");
        }
        if !(1..=100).contains(&resolver.commits_per_page) {
            anyhow::bail!("resolver.commits-per-page must be between 1 and 100");
        }
        if !(1..=100).contains(&resolver.check_runs_per_page) {
            anyhow::bail!("resolver.check-runs-per-page must be between 1 and 100");
        }
        if resolver.orchestrator_top == 0 {
            anyhow::bail!("resolver.orchestrator-top must be at least 1");
        }
        if resolver.commit_concurrency == 0 {
            anyhow::bail!("resolver.commit-concurrency must be at least 1");
        }
        if resolver.request_timeout_secs == 0 {
            anyhow::bail!("resolver.request-timeout-secs must be at least 1");
        }
        if self.github.repo_path.split('/').count() != 2 {
            anyhow::bail!("github.repo-path must be in format 'owner/repo'");
        }
        Ok(())
    }
}
