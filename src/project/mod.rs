//! The `.csproj` side: locating a MAUI project and pointing it at a local
//! package feed.

mod descriptor;
mod packages;

use std::fs;
use std::path::{Path, PathBuf};

use log::{info, warn};

use crate::error::{MauiChannelError, Result};

pub use descriptor::{CsprojEditor, DescriptorMutator};
pub use packages::{dotnet_version_for, find_package, restore, LocalPackage, NIGHTLY_SOURCE_KEY};
use packages::{remove_nuget_config, write_nuget_config, PR_SOURCE_KEY};

/// Package whose version selects the MAUI build a project consumes.
pub const CONTROLS_PACKAGE: &str = "Microsoft.Maui.Controls";
const PROJECT_EXTENSION: &str = "csproj";

/// A project file with `UseMaui` enabled.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MauiProject {
    pub path: PathBuf,
    pub controls_version: Option<String>,
    pub target_frameworks: Vec<String>,
    /// `X.Y` of the first target framework moniker.
    pub dotnet_version: Option<String>,
}

/// Where restore looks for the package a project is pointed at.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PackageSource<'a> {
    /// nuget.org alone; a project-level `NuGet.config` is removed.
    NuGetOrg,
    /// `location` registered as `key` ahead of nuget.org.
    Feed { key: &'a str, location: &'a str },
}

/// What [`MauiProject::apply_version`] changed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppliedPackage {
    pub previous_version: Option<String>,
    pub version: String,
    /// Set when the target frameworks were rewritten.
    pub retargeted_to: Option<String>,
    /// `None` when the project restores from nuget.org alone.
    pub nuget_config: Option<PathBuf>,
}

impl MauiProject {
    /// Finds the project at `path`, which may name a `.csproj` or a
    /// directory holding one. Defaults to the working directory.
    ///
    /// # Errors
    ///
    /// Returns a `Descriptor` error if no project file is found or it is not a
    /// MAUI project.
    pub fn locate(path: Option<&Path>, editor: &CsprojEditor) -> Result<Self> {
        let file = match path {
            Some(path) if path.is_file() => {
                if !has_project_extension(path) {
                    return Err(MauiChannelError::Descriptor(format!(
                        "{} is not a .{PROJECT_EXTENSION} file",
                        path.display()
                    )));
                }
                path.to_path_buf()
            }
            Some(path) if path.is_dir() => find_project_file(path)?,
            Some(path) => {
                return Err(MauiChannelError::Descriptor(format!(
                    "{} does not exist",
                    path.display()
                )))
            }
            None => find_project_file(&std::env::current_dir()?)?,
        };

        Self::load(file, editor)
    }

    fn load(path: PathBuf, editor: &CsprojEditor) -> Result<Self> {
        let content = fs::read_to_string(&path)?;

        if !editor.uses_maui(&content) {
            return Err(MauiChannelError::Descriptor(format!(
                "{} is not a .NET MAUI project (UseMaui is not true)",
                path.display()
            )));
        }

        let target_frameworks = editor.target_frameworks(&content);
        let project = Self {
            controls_version: editor.package_version(&content, CONTROLS_PACKAGE),
            dotnet_version: editor.dotnet_version(&target_frameworks),
            target_frameworks,
            path,
        };

        info!(
            "Using project {} ({CONTROLS_PACKAGE} {}, .NET {})",
            project.path.display(),
            project.controls_version.as_deref().unwrap_or("unset"),
            project.dotnet_version.as_deref().unwrap_or("unknown")
        );
        Ok(project)
    }

    pub fn directory(&self) -> &Path {
        match self.path.parent() {
            Some(dir) if !dir.as_os_str().is_empty() => dir,
            _ => Path::new("."),
        }
    }

    /// The .NET version to move to when `package_version` targets a different
    /// one than the project. Unknown versions on either side never count as
    /// a mismatch.
    pub fn needs_retarget(&self, package_version: &str) -> Option<String> {
        let required = dotnet_version_for(package_version)?;
        let current = self.dotnet_version.as_deref()?;
        (current != required).then_some(required)
    }

    /// Points the project at `version` from `source`: retargets unless
    /// `keep_target_framework`, sets the package version and writes or removes
    /// `NuGet.config`.
    ///
    /// # Errors
    ///
    /// Propagates descriptor and file system failures.
    pub fn apply_version(
        &self,
        version: &str,
        source: PackageSource<'_>,
        mutator: &dyn DescriptorMutator,
        keep_target_framework: bool,
    ) -> Result<AppliedPackage> {
        let mut retargeted_to = None;

        if let Some(required) = self.needs_retarget(version) {
            if keep_target_framework {
                warn!(
                    "{CONTROLS_PACKAGE} {version} targets .NET {required} but the project targets .NET {}; keeping target frameworks",
                    self.dotnet_version.as_deref().unwrap_or("unknown")
                );
            } else if mutator.set_target_framework(&self.path, &required)? {
                retargeted_to = Some(required);
            }
        }

        mutator.set_package_version(&self.path, CONTROLS_PACKAGE, version)?;

        let nuget_config = match source {
            PackageSource::NuGetOrg => {
                remove_nuget_config(self.directory())?;
                None
            }
            PackageSource::Feed { key, location } => {
                Some(write_nuget_config(self.directory(), key, location)?)
            }
        };

        Ok(AppliedPackage {
            previous_version: self.controls_version.clone(),
            version: version.to_string(),
            retargeted_to,
            nuget_config,
        })
    }

    /// Points the project at a package extracted from a PR build, registering
    /// its directory as the `pr-build` feed.
    ///
    /// # Errors
    ///
    /// Propagates descriptor and file system failures.
    pub fn apply_package(
        &self,
        package: &LocalPackage,
        mutator: &dyn DescriptorMutator,
        keep_target_framework: bool,
    ) -> Result<AppliedPackage> {
        let location = package.source_dir().to_string_lossy();
        self.apply_version(
            &package.version,
            PackageSource::Feed {
                key: PR_SOURCE_KEY,
                location: &location,
            },
            mutator,
            keep_target_framework,
        )
    }
}

fn has_project_extension(path: &Path) -> bool {
    path.extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case(PROJECT_EXTENSION))
}

fn find_project_file(dir: &Path) -> Result<PathBuf> {
    let mut projects = fs::read_dir(dir)?
        .filter_map(|entry| entry.ok().map(|entry| entry.path()))
        .filter(|path| path.is_file() && has_project_extension(path))
        .collect::<Vec<_>>();
    projects.sort();

    if projects.len() > 1 {
        warn!(
            "Found {} project files in {}, using {}",
            projects.len(),
            dir.display(),
            projects[0].display()
        );
    }

    projects.into_iter().next().ok_or_else(|| {
        MauiChannelError::Descriptor(format!(
            "No .{PROJECT_EXTENSION} file found in {}",
            dir.display()
        ))
    })
}

pub(crate) fn escape_xml(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&apos;"),
            c => escaped.push(c),
        }
    }
    escaped
}
