mod client;
mod download;
pub mod links;
mod types;

#[cfg(test)]
mod tests;

pub use client::AzureDevOpsClient;
pub use links::BuildUrlPattern;
