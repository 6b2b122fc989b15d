use std::fs;
use std::path::Path;

use log::{debug, info};
use regex::{Captures, NoExpand, Regex};

use crate::error::{MauiChannelError, Result};

use super::escape_xml;

/// Edits applied to a project descriptor on disk.
pub trait DescriptorMutator {
    /// Points the reference to `package` at `version`, adding the reference if absent.
    fn set_package_version(&self, path: &Path, package: &str, version: &str) -> Result<()>;

    /// Rewrites every `netX.Y` moniker to `net{dotnet_version}`.
    ///
    /// Returns whether the file changed.
    fn set_target_framework(&self, path: &Path, dotnet_version: &str) -> Result<bool>;
}

/// Pattern-based reader and editor for SDK-style `.csproj` files.
///
/// Only the attribute form of `PackageReference` is understood, and the rest
/// of the file is preserved byte for byte.
pub struct CsprojEditor {
    package_reference: Regex,
    include: Regex,
    version: Regex,
    target_frameworks: Regex,
    moniker: Regex,
    use_maui: Regex,
}

pub(super) fn compile(pattern: &str) -> Result<Regex> {
    Regex::new(pattern)
        .map_err(|e| MauiChannelError::Descriptor(format!("invalid pattern {pattern}: {e}")))
}

impl CsprojEditor {
    /// # Errors
    ///
    /// Returns a `Descriptor` error if a built-in pattern fails to compile.
    pub fn new() -> Result<Self> {
        Ok(Self {
            package_reference: compile(r"<PackageReference\b[^>]*>")?,
            include: compile(r#"\bInclude\s*=\s*"([^"]*)""#)?,
            version: compile(r#"\bVersion\s*=\s*"([^"]*)""#)?,
            target_frameworks: compile(r"(<TargetFrameworks?\b[^>]*>)([^<]*)(</TargetFrameworks?>)")?,
            moniker: compile(r"net(\d+\.\d+)")?,
            use_maui: compile(r"(?i)<UseMaui\b[^>]*>\s*true\s*</UseMaui>")?,
        })
    }

    pub fn uses_maui(&self, content: &str) -> bool {
        self.use_maui.is_match(content)
    }

    /// Version attribute of the first reference to `package`.
    pub fn package_version(&self, content: &str, package: &str) -> Option<String> {
        let tag = self.find_reference(content, package)?;
        self.version
            .captures(tag.as_str())
            .map(|caps| caps[1].to_string())
    }

    /// Monikers of the first `TargetFramework(s)` element, in order.
    pub fn target_frameworks(&self, content: &str) -> Vec<String> {
        self.target_frameworks
            .captures(content)
            .map(|caps| {
                caps[2]
                    .split(';')
                    .map(str::trim)
                    .filter(|moniker| !moniker.is_empty())
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default()
    }

    /// `X.Y` of the first `netX.Y` moniker.
    pub fn dotnet_version(&self, monikers: &[String]) -> Option<String> {
        let first = monikers.first()?;
        self.moniker
            .captures(first)
            .map(|caps| caps[1].to_string())
    }

    fn find_reference<'c>(&self, content: &'c str, package: &str) -> Option<regex::Match<'c>> {
        self.package_reference.find_iter(content).find(|tag| {
            self.include
                .captures(tag.as_str())
                .is_some_and(|caps| caps[1].eq_ignore_ascii_case(package))
        })
    }

    pub(super) fn with_package_version(
        &self,
        content: &str,
        package: &str,
        version: &str,
    ) -> Result<String> {
        let attribute = format!(r#"Version="{}""#, escape_xml(version));

        if let Some(tag) = self.find_reference(content, package) {
            let text = tag.as_str();
            let updated = if self.version.is_match(text) {
                self.version.replace(text, NoExpand(&attribute)).into_owned()
            } else {
                let (head, tail) = match text.strip_suffix("/>") {
                    Some(head) => (head.trim_end(), " />"),
                    None => (text.strip_suffix('>').unwrap_or(text).trim_end(), ">"),
                };
                format!("{head} {attribute}{tail}")
            };

            return Ok(format!(
                "{}{updated}{}",
                &content[..tag.start()],
                &content[tag.end()..]
            ));
        }

        let reference = format!(
            r#"<PackageReference Include="{}" {attribute} />"#,
            escape_xml(package)
        );

        if let Some(start) = content.find("<ItemGroup>") {
            let at = start + "<ItemGroup>".len();
            return Ok(format!("{}\n    {reference}{}", &content[..at], &content[at..]));
        }

        let Some(at) = content.rfind("</Project>") else {
            return Err(MauiChannelError::Descriptor(
                "project file has no </Project> element".to_string(),
            ));
        };
        Ok(format!(
            "{}  <ItemGroup>\n    {reference}\n  </ItemGroup>\n{}",
            &content[..at],
            &content[at..]
        ))
    }

    pub(super) fn with_target_framework(&self, content: &str, dotnet_version: &str) -> String {
        let replacement = format!("net{dotnet_version}");

        self.target_frameworks
            .replace_all(content, |caps: &Captures| {
                let monikers = self.moniker.replace_all(&caps[2], NoExpand(&replacement));
                if monikers != caps[2] {
                    debug!("Target frameworks {} -> {monikers}", &caps[2]);
                }
                format!("{}{monikers}{}", &caps[1], &caps[3])
            })
            .into_owned()
    }
}

impl DescriptorMutator for CsprojEditor {
    fn set_package_version(&self, path: &Path, package: &str, version: &str) -> Result<()> {
        let content = fs::read_to_string(path)?;
        let updated = self.with_package_version(&content, package, version)?;
        fs::write(path, updated)?;

        info!("Set {package} to {version} in {}", path.display());
        Ok(())
    }

    fn set_target_framework(&self, path: &Path, dotnet_version: &str) -> Result<bool> {
        let content = fs::read_to_string(path)?;
        let updated = self.with_target_framework(&content, dotnet_version);
        if updated == content {
            return Ok(false);
        }

        fs::write(path, updated)?;
        info!(
            "Retargeted {} to .NET {dotnet_version}",
            path.display()
        );
        Ok(true)
    }
}
