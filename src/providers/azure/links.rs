use regex::Regex;

use crate::error::{MauiChannelError, Result};

/// Build coordinates recovered from a check run's details link.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildLocation {
    pub organization: String,
    pub project: String,
    pub build_id: u64,
}

/// Matches Azure Pipelines result links on one host.
///
/// Accepts `<scheme>://<host>/<org>/<project>/<path>?...buildId=<digits>`,
/// e.g. <https://dev.azure.com/dnceng-public/public/_build/results?buildId=155100&view=logs>.
#[derive(Debug, Clone)]
pub struct BuildUrlPattern {
    regex: Regex,
}

impl BuildUrlPattern {
    /// # Errors
    ///
    /// Returns a configuration error if `host_domain` is empty.
    pub fn new(host_domain: &str) -> Result<Self> {
        let host = host_domain.trim().trim_end_matches('/');
        if host.is_empty() {
            return Err(MauiChannelError::Config(
                "Build host domain must not be empty".to_string(),
            ));
        }

        let pattern = format!(
            r"^[A-Za-z][A-Za-z0-9+.-]*://{}/([^/?#]+)/([^/?#]+)/[^?#]*\?(?:[^#]*&)?buildId=(\d+)(?:[&#]|$)",
            regex::escape(host)
        );
        let regex = Regex::new(&pattern)
            .map_err(|e| MauiChannelError::Config(format!("Invalid build URL pattern: {e}")))?;

        Ok(Self { regex })
    }

    /// Returns `None` for links on other hosts or without a numeric `buildId`.
    pub fn extract(&self, url: &str) -> Option<BuildLocation> {
        let captures = self.regex.captures(url)?;
        let build_id = captures[3].parse().ok()?;

        Some(BuildLocation {
            organization: captures[1].to_string(),
            project: captures[2].to_string(),
            build_id,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pattern() -> BuildUrlPattern {
        BuildUrlPattern::new("dev.azure.com").unwrap()
    }

    #[test]
    fn test_extract_results_link() {
        let location = pattern()
            .extract("https://dev.azure.com/dnceng-public/public/_build/results?buildId=155100")
            .unwrap();
        assert_eq!(
            location,
            BuildLocation {
                organization: "dnceng-public".to_string(),
                project: "public".to_string(),
                build_id: 155100,
            }
        );
    }

    #[test]
    fn test_extract_with_extra_query_parameters() {
        let location = pattern()
            .extract("https://dev.azure.com/dnceng-public/public/_build/results?buildId=155161&view=logs&jobId=abc")
            .unwrap();
        assert_eq!(location.build_id, 155161);

        let location = pattern()
            .extract("https://dev.azure.com/xamarin/public/_build/results?view=logs&buildId=42")
            .unwrap();
        assert_eq!(location.organization, "xamarin");
        assert_eq!(location.build_id, 42);
    }

    #[test]
    fn test_missing_build_id_does_not_match() {
        assert!(pattern()
            .extract("https://dev.azure.com/dnceng-public/public/_build/results?view=logs")
            .is_none());
        assert!(pattern()
            .extract("https://dev.azure.com/dnceng-public/public/_build/results")
            .is_none());
        assert!(pattern()
            .extract("https://dev.azure.com/dnceng-public/public/_build/results?xbuildId=5")
            .is_none());
        assert!(pattern()
            .extract("https://dev.azure.com/dnceng-public/public/_build/results?buildId=12abc")
            .is_none());
    }

    #[test]
    fn test_other_hosts_do_not_match() {
        assert!(pattern()
            .extract("https://github.com/dotnet/maui/actions/runs?buildId=1")
            .is_none());
        assert!(pattern()
            .extract("https://notdev.azure.com/org/project/_build/results?buildId=1")
            .is_none());
    }

    #[test]
    fn test_custom_host() {
        let pattern = BuildUrlPattern::new("azure.contoso.com").unwrap();
        let location = pattern
            .extract("https://azure.contoso.com/contoso/ci/_build/results?buildId=7")
            .unwrap();
        assert_eq!(location.project, "ci");
        assert!(pattern
            .extract("https://dev.azure.com/contoso/ci/_build/results?buildId=7")
            .is_none());
    }

    #[test]
    fn test_empty_host_rejected() {
        assert!(BuildUrlPattern::new("  ").is_err());
    }
}
