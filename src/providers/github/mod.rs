mod client;
mod types;

#[cfg(test)]
mod tests;

pub use client::GitHubClient;
pub use types::{CheckConclusion, CheckRun, CheckStatus};
