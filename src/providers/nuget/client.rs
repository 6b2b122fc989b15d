use log::{debug, info, warn};
use reqwest::Client;
use tokio_util::sync::CancellationToken;

use crate::error::{MauiChannelError, Result};
use crate::project::dotnet_version_for;
use crate::providers::http::{normalize_base_url, send_json};

use super::types::{ServiceIndex, VersionIndex};

const PACKAGE_BASE_ADDRESS: &str = "PackageBaseAddress/3.0.0";

/// Looks up released package versions on nuget.org and nightly feeds.
#[derive(Clone)]
pub struct NuGetClient {
    client: Client,
    flat_container_url: String,
}

impl NuGetClient {
    /// # Errors
    ///
    /// Returns a `Config` error if `flat_container_url` is not a URL.
    pub fn new(client: Client, flat_container_url: &str) -> Result<Self> {
        Ok(Self {
            client,
            flat_container_url: normalize_base_url(flat_container_url)?,
        })
    }

    /// Newest stable release of `package` built for `dotnet_version`.
    ///
    /// Falls back to the newest stable release overall when the .NET version
    /// is unknown or no release matches it.
    ///
    /// # Errors
    ///
    /// Propagates request failures; `PackageFeed` if no stable version exists.
    pub async fn latest_stable(
        &self,
        package: &str,
        dotnet_version: Option<&str>,
        cancel: &CancellationToken,
    ) -> Result<String> {
        let versions = self
            .versions(&self.flat_container_url, package, cancel)
            .await?;

        let version = select_stable(&versions, dotnet_version).ok_or_else(|| {
            MauiChannelError::PackageFeed(format!("no stable {package} release on nuget.org"))
        })?;

        info!(
            "Latest stable {package} for .NET {}: {version}",
            dotnet_version.unwrap_or("unknown")
        );
        Ok(version.to_string())
    }

    /// Last version of `package` published to the feed at `feed_url`.
    ///
    /// # Errors
    ///
    /// Propagates request failures; `PackageFeed` if the feed has no package
    /// base address or no version of `package`.
    pub async fn latest_on_feed(
        &self,
        feed_url: &str,
        package: &str,
        cancel: &CancellationToken,
    ) -> Result<String> {
        let index: ServiceIndex = send_json(self.client.get(feed_url), feed_url, cancel).await?;

        let base_address = index
            .resources
            .into_iter()
            .find(|resource| resource.kind == PACKAGE_BASE_ADDRESS)
            .map(|resource| resource.id)
            .ok_or_else(|| {
                MauiChannelError::PackageFeed(format!(
                    "{feed_url} has no {PACKAGE_BASE_ADDRESS} resource"
                ))
            })?;

        let versions = self.versions(&base_address, package, cancel).await?;
        let version = versions.last().cloned().ok_or_else(|| {
            MauiChannelError::PackageFeed(format!("no {package} versions on {feed_url}"))
        })?;

        info!("Latest {package} on {feed_url}: {version}");
        Ok(version)
    }

    async fn versions(
        &self,
        base_address: &str,
        package: &str,
        cancel: &CancellationToken,
    ) -> Result<Vec<String>> {
        let endpoint = format!(
            "{}/{}/index.json",
            base_address.trim_end_matches('/'),
            package.to_ascii_lowercase()
        );
        let index: VersionIndex = send_json(self.client.get(&endpoint), &endpoint, cancel).await?;

        debug!("{} versions of {package} at {endpoint}", index.versions.len());
        Ok(index.versions)
    }
}

/// Prerelease versions carry a `-` suffix and are never stable.
fn select_stable<'a>(versions: &'a [String], dotnet_version: Option<&str>) -> Option<&'a str> {
    let stable = versions
        .iter()
        .map(String::as_str)
        .filter(|version| !version.contains('-'));
    let newest = stable.clone().last();

    let Some(dotnet_version) = dotnet_version else {
        return newest;
    };
    let matching = stable
        .filter(|version| dotnet_version_for(version).as_deref() == Some(dotnet_version))
        .last();

    if matching.is_none() {
        warn!("No stable release targets .NET {dotnet_version}, using the newest release");
    }
    matching.or(newest)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn versions(list: &[&str]) -> Vec<String> {
        list.iter().map(|v| (*v).to_string()).collect()
    }

    #[test]
    fn test_select_stable_skips_prereleases() {
        let versions = versions(&["8.0.90", "9.0.21", "9.0.30", "10.0.0-rc.2.1"]);

        assert_eq!(select_stable(&versions, Some("9.0")), Some("9.0.30"));
        assert_eq!(select_stable(&versions, Some("8.0")), Some("8.0.90"));
        assert_eq!(select_stable(&versions, Some("10.0")), Some("9.0.30"));
        assert_eq!(select_stable(&versions, None), Some("9.0.30"));
        assert_eq!(select_stable(&[], Some("9.0")), None);
    }
}
