use std::fs;
use std::path::{Path, PathBuf};
use std::process::Stdio;

use log::{debug, info, warn};
use tokio::process::Command;
use tokio_util::sync::CancellationToken;
use walkdir::WalkDir;

use crate::error::{MauiChannelError, Result};

use super::escape_xml;

/// Feed key of the extracted artifact directory in `NuGet.config`.
pub const PR_SOURCE_KEY: &str = "pr-build";
/// Feed key of a nightly package feed in `NuGet.config`.
pub const NIGHTLY_SOURCE_KEY: &str = "nightly";
const NUGET_ORG_KEY: &str = "nuget.org";
const NUGET_ORG_URL: &str = "https://api.nuget.org/v3/index.json";
const NUGET_CONFIG: &str = "NuGet.config";

/// A `.nupkg` found in an extracted artifact.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalPackage {
    pub path: PathBuf,
    pub version: String,
}

impl LocalPackage {
    /// Directory to register as a package source.
    pub fn source_dir(&self) -> &Path {
        self.path.parent().unwrap_or(Path::new("."))
    }
}

/// `9.0.100-ci.1` targets .NET `9.0`.
pub fn dotnet_version_for(package_version: &str) -> Option<String> {
    let major: u32 = package_version.split('.').next()?.parse().ok()?;
    Some(format!("{major}.0"))
}

/// Finds `package` below `root`.
///
/// File names are `{package}.{version}.nupkg`; the version must start with a
/// digit so `Microsoft.Maui.Controls.Core.*` never passes for
/// `Microsoft.Maui.Controls`. Symbol packages are ignored.
///
/// # Errors
///
/// Returns a `Descriptor` error when no matching package exists.
pub fn find_package(root: &Path, package: &str) -> Result<LocalPackage> {
    let prefix = format!("{}.", package.to_ascii_lowercase());
    let mut found = Vec::new();

    for entry in WalkDir::new(root).sort_by_file_name() {
        let entry = entry.map_err(std::io::Error::from)?;
        if !entry.file_type().is_file() {
            continue;
        }

        let name = entry.file_name().to_string_lossy().to_ascii_lowercase();
        let Some(stem) = name.strip_suffix(".nupkg") else {
            continue;
        };
        if stem.ends_with(".symbols") {
            continue;
        }

        let Some(version) = stem.strip_prefix(&prefix) else {
            continue;
        };
        if !version.starts_with(|c: char| c.is_ascii_digit()) {
            continue;
        }

        // Take the version from the original name; NuGet versions keep their case.
        let original = entry.file_name().to_string_lossy();
        let version = original[prefix.len()..prefix.len() + version.len()].to_string();
        debug!("Found {package} {version} at {}", entry.path().display());
        found.push(LocalPackage {
            path: entry.into_path(),
            version,
        });
    }

    if found.len() > 1 {
        warn!(
            "Found {} {package} packages under {}, using {}",
            found.len(),
            root.display(),
            found[0].path.display()
        );
    }

    found.into_iter().next().ok_or_else(|| {
        MauiChannelError::Descriptor(format!(
            "{package} package not found under {}",
            root.display()
        ))
    })
}

/// Writes `NuGet.config` into `project_dir` with `location` registered as
/// `key` first and nuget.org as the only other source.
///
/// # Errors
///
/// Returns an IO error if the file cannot be written.
pub fn write_nuget_config(project_dir: &Path, key: &str, location: &str) -> Result<PathBuf> {
    let path = project_dir.join(NUGET_CONFIG);

    let content = format!(
        r#"<?xml version="1.0" encoding="utf-8"?>
<configuration>
  <packageSources>
    <clear />
    <add key="{}" value="{}" />
    <add key="{NUGET_ORG_KEY}" value="{NUGET_ORG_URL}" />
  </packageSources>
</configuration>
"#,
        escape_xml(key),
        escape_xml(location)
    );

    if path.exists() {
        info!("Replacing existing {}", path.display());
    }
    fs::write(&path, content)?;
    info!("Wrote {} with source {key} = {location}", path.display());

    Ok(path)
}

/// Deletes the project's `NuGet.config` so restore falls back to nuget.org.
///
/// Returns the removed path, or `None` if there was nothing to remove.
///
/// # Errors
///
/// Returns an IO error if the file exists but cannot be deleted.
pub fn remove_nuget_config(project_dir: &Path) -> Result<Option<PathBuf>> {
    let path = project_dir.join(NUGET_CONFIG);
    if !path.is_file() {
        debug!("No {} to remove", path.display());
        return Ok(None);
    }

    fs::remove_file(&path)?;
    info!("Removed {}", path.display());
    Ok(Some(path))
}

/// Runs `dotnet restore` for the project.
///
/// # Errors
///
/// Returns `Restore` when the command fails or cannot start, and `Cancelled`
/// if `cancel` fires first; the child process is killed in that case.
pub async fn restore(project: &Path, cancel: &CancellationToken) -> Result<()> {
    run_restore("dotnet", project, cancel).await
}

async fn run_restore(program: &str, project: &Path, cancel: &CancellationToken) -> Result<()> {
    let working_dir = match project.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => dir,
        _ => Path::new("."),
    };

    info!("Running {program} restore {}", project.display());

    let child = Command::new(program)
        .arg("restore")
        .arg(project)
        .current_dir(working_dir)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn()
        .map_err(|e| MauiChannelError::Restore(format!("could not start {program}: {e}")))?;

    let output = tokio::select! {
        biased;
        () = cancel.cancelled() => return Err(MauiChannelError::Cancelled),
        output = child.wait_with_output() => output?,
    };

    if output.status.success() {
        return Ok(());
    }

    let stderr = String::from_utf8_lossy(&output.stderr);
    let stdout = String::from_utf8_lossy(&output.stdout);
    let details = if stderr.trim().is_empty() { stdout } else { stderr };
    Err(MauiChannelError::Restore(format!(
        "{} {}",
        output.status,
        details.trim()
    )))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn touch(path: &Path) {
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, b"nupkg").unwrap();
    }

    #[test]
    fn test_dotnet_version_from_package_major() {
        assert_eq!(dotnet_version_for("9.0.100-ci.12345").as_deref(), Some("9.0"));
        assert_eq!(dotnet_version_for("10.0.0-preview.1").as_deref(), Some("10.0"));
        assert_eq!(dotnet_version_for("preview"), None);
        assert_eq!(dotnet_version_for(""), None);
    }

    #[test]
    fn test_find_package_skips_similar_names() {
        let temp_dir = tempfile::tempdir().unwrap();
        let root = temp_dir.path();
        touch(&root.join("PackageArtifacts/Microsoft.Maui.Controls.Core.9.0.100-ci.1.nupkg"));
        touch(&root.join("PackageArtifacts/Microsoft.Maui.Controls.9.0.100-ci.1.symbols.nupkg"));
        touch(&root.join("PackageArtifacts/Microsoft.Maui.Controls.9.0.100-ci.1.nupkg"));
        touch(&root.join("PackageArtifacts/Microsoft.Maui.Graphics.9.0.100-ci.1.nupkg"));

        let package = find_package(root, "Microsoft.Maui.Controls").unwrap();

        assert_eq!(package.version, "9.0.100-ci.1");
        assert_eq!(package.source_dir(), root.join("PackageArtifacts"));
        assert_eq!(dotnet_version_for(&package.version).as_deref(), Some("9.0"));
    }

    #[test]
    fn test_find_package_keeps_version_case() {
        let temp_dir = tempfile::tempdir().unwrap();
        touch(&temp_dir.path().join("nested/deeper/microsoft.maui.controls.9.0.0-PR.5.nupkg"));

        let package = find_package(temp_dir.path(), "Microsoft.Maui.Controls").unwrap();

        assert_eq!(package.version, "9.0.0-PR.5");
    }

    #[test]
    fn test_find_package_missing() {
        let temp_dir = tempfile::tempdir().unwrap();
        touch(&temp_dir.path().join("Other.Package.1.0.0.nupkg"));

        let result = find_package(temp_dir.path(), "Microsoft.Maui.Controls");

        assert!(matches!(result, Err(MauiChannelError::Descriptor(_))));
    }

    #[test]
    fn test_write_nuget_config() {
        let temp_dir = tempfile::tempdir().unwrap();
        let source = temp_dir.path().join("cache & co");

        let path =
            write_nuget_config(temp_dir.path(), PR_SOURCE_KEY, &source.to_string_lossy()).unwrap();
        let content = fs::read_to_string(path).unwrap();

        let clear = content.find("<clear />").unwrap();
        let pr = content.find(r#"<add key="pr-build""#).unwrap();
        let nuget = content.find(r#"<add key="nuget.org" value="https://api.nuget.org/v3/index.json" />"#).unwrap();
        assert!(clear < pr && pr < nuget);
        assert!(content.contains("cache &amp; co"));
    }

    #[test]
    fn test_remove_nuget_config() {
        let temp_dir = tempfile::tempdir().unwrap();
        let feed = "https://pkgs.dev.azure.com/dnceng/public/_packaging/dotnet9/nuget/v3/index.json";
        let written = write_nuget_config(temp_dir.path(), NIGHTLY_SOURCE_KEY, feed).unwrap();
        assert!(fs::read_to_string(&written).unwrap().contains(r#"<add key="nightly""#));

        let removed = remove_nuget_config(temp_dir.path()).unwrap();

        assert_eq!(removed, Some(written.clone()));
        assert!(!written.exists());
        assert_eq!(remove_nuget_config(temp_dir.path()).unwrap(), None);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_restore_reports_exit_status() {
        let temp_dir = tempfile::tempdir().unwrap();
        let project = temp_dir.path().join("App.csproj");

        run_restore("true", &project, &CancellationToken::new())
            .await
            .unwrap();
        let failed = run_restore("false", &project, &CancellationToken::new()).await;

        assert!(matches!(failed, Err(MauiChannelError::Restore(_))));
    }

    #[tokio::test]
    async fn test_restore_missing_program() {
        let temp_dir = tempfile::tempdir().unwrap();
        let project = temp_dir.path().join("App.csproj");

        let result = run_restore(
            "maui-channel-no-such-program",
            &project,
            &CancellationToken::new(),
        )
        .await;

        assert!(matches!(result, Err(MauiChannelError::Restore(_))));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_restore_cancelled() {
        let temp_dir = tempfile::tempdir().unwrap();
        let project = temp_dir.path().join("App.csproj");
        let cancel = CancellationToken::new();
        cancel.cancel();

        let result = run_restore("true", &project, &cancel).await;

        assert!(matches!(result, Err(MauiChannelError::Cancelled)));
    }
}
