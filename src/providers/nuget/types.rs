use serde::Deserialize;

/// `{package}/index.json` below a `PackageBaseAddress`, oldest version first.
#[derive(Debug, Deserialize)]
pub(super) struct VersionIndex {
    #[serde(default)]
    pub versions: Vec<String>,
}

/// The `index.json` a NuGet v3 feed is addressed by.
#[derive(Debug, Deserialize)]
pub(super) struct ServiceIndex {
    #[serde(default)]
    pub resources: Vec<ServiceResource>,
}

#[derive(Debug, Deserialize)]
pub(super) struct ServiceResource {
    #[serde(rename = "@id")]
    pub id: String,
    #[serde(rename = "@type")]
    pub kind: String,
}
