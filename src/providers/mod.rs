pub mod azure;
pub mod github;
mod http;
pub mod nuget;

pub use azure::AzureDevOpsClient;
pub use github::GitHubClient;
pub use http::build_http_client;
pub use nuget::NuGetClient;
