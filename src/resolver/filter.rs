/// Decides which check runs belong to the package-producing pipeline.
///
/// A name is relevant when it is the pipeline identifier itself or one of its
/// sub-jobs (`"<id> (..."` or `"<id>-..."`), and it contains none of the
/// excluded substrings. Exclusions are compared case-insensitively and filter
/// out sibling pipelines that never publish packages.
#[derive(Debug, Clone)]
pub struct CheckNameFilter {
    identifier: String,
    exclusions: Vec<String>,
}

impl CheckNameFilter {
    pub fn new<I, S>(identifier: impl Into<String>, exclusions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            identifier: identifier.into(),
            exclusions: exclusions
                .into_iter()
                .map(|exclusion| exclusion.as_ref().trim().to_lowercase())
                .filter(|exclusion| !exclusion.is_empty())
                .collect(),
        }
    }

    pub fn identifier(&self) -> &str {
        &self.identifier
    }

    pub fn is_relevant(&self, name: &str) -> bool {
        let belongs_to_pipeline = match name.strip_prefix(self.identifier.as_str()) {
            Some("") => true,
            Some(rest) => rest.starts_with(" (") || rest.starts_with('-'),
            None => false,
        };

        if !belongs_to_pipeline {
            return false;
        }

        let lowered = name.to_lowercase();
        !self
            .exclusions
            .iter()
            .any(|exclusion| lowered.contains(exclusion.as_str()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn filter() -> CheckNameFilter {
        CheckNameFilter::new("maui-pr", ["uitests"])
    }

    #[test]
    fn test_exact_identifier_matches() {
        assert!(filter().is_relevant("maui-pr"));
    }

    #[test]
    fn test_sub_jobs_match() {
        assert!(filter().is_relevant("maui-pr (Build macOS)"));
        assert!(filter().is_relevant("maui-pr-devicetests"));
    }

    #[test]
    fn test_excluded_sub_jobs_do_not_match() {
        assert!(!filter().is_relevant("maui-pr (uitests)"));
        assert!(!filter().is_relevant("maui-pr-UITests"));
        assert!(!filter().is_relevant("maui-pr (Run UITests Android)"));
    }

    #[test]
    fn test_configured_exclusions() {
        let filter = CheckNameFilter::new("maui-pr", ["uitests", "DeviceTests"]);
        assert!(!filter.is_relevant("maui-pr-devicetests"));
        assert!(filter.is_relevant("maui-pr (Pack)"));
    }

    #[test]
    fn test_requires_boundary_after_identifier() {
        assert!(!filter().is_relevant("maui-prerelease"));
        assert!(!filter().is_relevant("maui-pr("));
        assert!(!filter().is_relevant("maui-pr_extra"));
        assert!(!filter().is_relevant("MAUI-PR"));
        assert!(!filter().is_relevant("other maui-pr"));
    }

    #[test]
    fn test_blank_exclusions_ignored() {
        let filter = CheckNameFilter::new("maui-pr", ["", "  "]);
        assert!(filter.is_relevant("maui-pr"));
        assert_eq!(filter.identifier(), "maui-pr");
    }
}
