use anyhow::{anyhow, bail, Context, Result};
use clap::{ArgAction, ArgGroup, Parser, Subcommand, ValueEnum};
use log::info;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

use crate::auth::Token;
use crate::candidate::PullRequestRef;
use crate::config::Config;
use crate::error::MauiChannelError;
use crate::output::{self, PhaseProgress};
use crate::project::{
    self, AppliedPackage, CsprojEditor, MauiProject, PackageSource, CONTROLS_PACKAGE,
    NIGHTLY_SOURCE_KEY,
};
use crate::providers::{build_http_client, AzureDevOpsClient, GitHubClient, NuGetClient};
use crate::resolver::{BuildResolver, Resolution, ResolverSources};

#[derive(Parser)]
#[command(name = "maui-channel")]
#[command(author, version, about = "Consume .NET MAUI pull request builds", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Configuration file (defaults to ./maui-channel.{toml,json,yaml,yml})
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[arg(long, global = true, env = "GITHUB_TOKEN", hide_env_values = true)]
    github_token: Option<String>,

    #[arg(long, global = true, env = "AZURE_DEVOPS_TOKEN", hide_env_values = true)]
    azure_token: Option<String>,

    /// Log more (-v for info, -vv for debug)
    #[arg(short, long, global = true, action = ArgAction::Count)]
    pub verbose: u8,
}

#[derive(Subcommand)]
enum Commands {
    /// Find the build of a pull request that published packages
    Resolve {
        #[arg(long, value_parser = clap::value_parser!(u64).range(1..))]
        pr: u64,

        /// Print the build as JSON instead of a table
        #[arg(long, default_value_t = false)]
        json: bool,

        #[arg(short, long, default_value_t = false)]
        pretty: bool,
    },

    /// Point a project at a pull request build or a release channel
    #[command(group(ArgGroup::new("source").required(true).args(["pr", "channel"])))]
    Apply {
        /// Pull request whose CI packages to download
        #[arg(long, value_parser = clap::value_parser!(u64).range(1..))]
        pr: Option<u64>,

        /// Release channel to follow instead of a pull request
        #[arg(short = 'c', long, value_enum)]
        channel: Option<Channel>,

        /// Nightly feed (defaults to the one matching the project's .NET version)
        #[arg(long, value_enum, requires = "channel", conflicts_with = "feed_url")]
        feed: Option<NightlyFeed>,

        /// Service index URL of another nightly feed
        #[arg(long, requires = "channel")]
        feed_url: Option<String>,

        /// Project file or directory (defaults to the working directory)
        #[arg(short = 'P', long)]
        project: Option<PathBuf>,

        #[arg(long, default_value_t = false)]
        no_restore: bool,

        /// Leave target frameworks alone when the package needs another .NET
        #[arg(long, default_value_t = false)]
        keep_target_framework: bool,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Channel {
    /// Latest release on nuget.org for the project's .NET version
    Stable,
    /// Latest build on a nightly feed
    Nightly,
}

impl Channel {
    fn label(self) -> &'static str {
        match self {
            Self::Stable => "stable",
            Self::Nightly => "nightly",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum NightlyFeed {
    Dotnet9,
    Dotnet10,
}

impl NightlyFeed {
    /// Feed for a project on `dotnet_version`; .NET 10 for anything but 9.
    fn for_dotnet(dotnet_version: Option<&str>) -> Self {
        match dotnet_version {
            Some("9.0") => Self::Dotnet9,
            _ => Self::Dotnet10,
        }
    }

    fn index_url(self) -> &'static str {
        match self {
            Self::Dotnet9 => {
                "https://pkgs.dev.azure.com/dnceng/public/_packaging/dotnet9/nuget/v3/index.json"
            }
            Self::Dotnet10 => {
                "https://pkgs.dev.azure.com/dnceng/public/_packaging/dotnet10/nuget/v3/index.json"
            }
        }
    }
}

/// Clients and resolver built from one configuration.
struct Session {
    config: Config,
    github: Arc<GitHubClient>,
    azure: Arc<AzureDevOpsClient>,
    resolver: BuildResolver,
}

impl Session {
    async fn resolve(
        &self,
        pr: PullRequestRef,
        progress: &mut PhaseProgress,
        cancel: &CancellationToken,
    ) -> Result<Resolution> {
        progress.start(format!("Searching builds of PR {pr}"));

        match self.resolver.resolve(pr, cancel).await {
            Ok(resolution) => {
                progress.complete(format!(
                    "Found build {} via {}",
                    resolution.build.build_id, resolution.strategy
                ));
                Ok(resolution)
            }
            Err(MauiChannelError::NotFound { .. }) => {
                progress.fail("No usable build");
                Err(anyhow!(output::not_found_message(
                    pr,
                    &self.config.resolver.required_artifact,
                    &self.github.pull_request_url(pr)
                )))
            }
            Err(err) => {
                progress.fail("Search stopped");
                Err(err.into())
            }
        }
    }
}

impl Cli {
    fn load_config(&self) -> Result<(Config, reqwest::Client)> {
        let config = Config::load(self.config.as_deref())?;
        let http = build_http_client(Duration::from_secs(config.resolver.request_timeout_secs))?;
        Ok((config, http))
    }

    fn session(&self) -> Result<Session> {
        let (config, http) = self.load_config()?;

        let github_token = self
            .github_token
            .clone()
            .or_else(|| config.github.token.clone())
            .map(Token::from);
        let azure_token = self
            .azure_token
            .clone()
            .or_else(|| config.azure.token.clone())
            .map(Token::from);

        let github = Arc::new(
            GitHubClient::new(
                http.clone(),
                &config.github.base_url,
                &config.github.repo_path,
                github_token,
            )?
            .with_page_sizes(
                config.resolver.commits_per_page,
                config.resolver.check_runs_per_page,
            ),
        );
        let azure = Arc::new(
            AzureDevOpsClient::new(
                http,
                &config.azure.base_url,
                &config.azure.organization,
                &config.azure.project,
                azure_token,
            )?
            .with_top(config.resolver.orchestrator_top),
        );

        let resolver = BuildResolver::new(
            ResolverSources::new(github.clone(), azure.clone()),
            &config.resolver,
            &config.azure.host_domain,
        )?;

        Ok(Session {
            config,
            github,
            azure,
            resolver,
        })
    }

    async fn execute_resolve(
        &self,
        pr: PullRequestRef,
        json: bool,
        pretty: bool,
        cancel: &CancellationToken,
    ) -> Result<()> {
        info!("Resolving build for PR {pr}");

        let session = self.session()?;
        let mut progress = PhaseProgress::new(1);
        let resolution = session.resolve(pr, &mut progress, cancel).await?;
        progress.finish();

        if json {
            let json_output = if pretty {
                serde_json::to_string_pretty(&resolution)?
            } else {
                serde_json::to_string(&resolution)?
            };
            println!("{json_output}");
        } else {
            let build_url = resolution.build.web_url(session.azure.base_url());
            output::print_resolution(&resolution, pr, &build_url);
        }

        Ok(())
    }

    async fn execute_apply(
        &self,
        pr: PullRequestRef,
        project_path: Option<&Path>,
        no_restore: bool,
        keep_target_framework: bool,
        cancel: &CancellationToken,
    ) -> Result<()> {
        info!("Applying build of PR {pr}");

        let editor = CsprojEditor::new()?;
        let project = MauiProject::locate(project_path, &editor)
            .context("Failed to find a .NET MAUI project")?;
        let session = self.session()?;
        let artifact = &session.config.resolver.required_artifact;

        let mut progress = PhaseProgress::new(if no_restore { 3 } else { 4 });
        let resolution = session.resolve(pr, &mut progress, cancel).await?;
        let build = &resolution.build;

        progress.start(format!("Downloading {artifact} of build {}", build.build_id));
        let destination = download_dir(pr, build.build_id);
        let extracted = session
            .azure
            .download_artifact(build, artifact, &destination, cancel)
            .await
            .inspect_err(|_| progress.fail("Download failed"))?;
        progress.complete(format!("Downloaded {artifact}"));

        progress.start(format!("Updating {}", project.path.display()));
        let applied = project::find_package(&extracted, CONTROLS_PACKAGE)
            .and_then(|package| project.apply_package(&package, &editor, keep_target_framework))
            .inspect_err(|_| progress.fail("Project update failed"))?;
        progress.complete(format!("Using {CONTROLS_PACKAGE} {}", applied.version));

        finish_apply(&project, &applied, progress, no_restore, cancel).await
    }

    async fn execute_apply_channel(
        &self,
        channel: Channel,
        feed: Option<NightlyFeed>,
        feed_url: Option<&str>,
        project_path: Option<&Path>,
        no_restore: bool,
        keep_target_framework: bool,
        cancel: &CancellationToken,
    ) -> Result<()> {
        info!("Applying the {} channel", channel.label());

        let editor = CsprojEditor::new()?;
        let project = MauiProject::locate(project_path, &editor)
            .context("Failed to find a .NET MAUI project")?;
        let (config, http) = self.load_config()?;
        let nuget = NuGetClient::new(http, &config.nuget.flat_container_url)?;

        let mut progress = PhaseProgress::new(if no_restore { 2 } else { 3 });
        progress.start(format!("Looking up the latest {} {CONTROLS_PACKAGE}", channel.label()));
        let (version, source) = match channel {
            Channel::Stable => {
                let version = nuget
                    .latest_stable(CONTROLS_PACKAGE, project.dotnet_version.as_deref(), cancel)
                    .await;
                (version, PackageSource::NuGetOrg)
            }
            Channel::Nightly => {
                let feed_url = feed_url.unwrap_or_else(|| {
                    feed.unwrap_or_else(|| {
                        NightlyFeed::for_dotnet(project.dotnet_version.as_deref())
                    })
                    .index_url()
                });
                info!("Using nightly feed {feed_url}");
                let version = nuget.latest_on_feed(feed_url, CONTROLS_PACKAGE, cancel).await;
                let source = PackageSource::Feed {
                    key: NIGHTLY_SOURCE_KEY,
                    location: feed_url,
                };
                (version, source)
            }
        };
        let version = version.inspect_err(|_| progress.fail("Version lookup failed"))?;
        progress.complete(format!("Latest {} is {version}", channel.label()));

        progress.start(format!("Updating {}", project.path.display()));
        let applied = project
            .apply_version(&version, source, &editor, keep_target_framework)
            .inspect_err(|_| progress.fail("Project update failed"))?;
        progress.complete(format!("Using {CONTROLS_PACKAGE} {}", applied.version));

        finish_apply(&project, &applied, progress, no_restore, cancel).await
    }

    pub async fn execute(&self, cancel: &CancellationToken) -> Result<()> {
        match &self.command {
            Commands::Resolve { pr, json, pretty } => {
                self.execute_resolve(PullRequestRef(*pr), *json, *pretty, cancel)
                    .await
            }
            Commands::Apply {
                pr: Some(pr),
                project,
                no_restore,
                keep_target_framework,
                ..
            } => {
                self.execute_apply(
                    PullRequestRef(*pr),
                    project.as_deref(),
                    *no_restore,
                    *keep_target_framework,
                    cancel,
                )
                .await
            }
            Commands::Apply {
                channel: Some(channel),
                feed,
                feed_url,
                project,
                no_restore,
                keep_target_framework,
                ..
            } => {
                if *channel == Channel::Stable && (feed.is_some() || feed_url.is_some()) {
                    bail!("--feed and --feed-url only apply to --channel nightly");
                }

                self.execute_apply_channel(
                    *channel,
                    *feed,
                    feed_url.as_deref(),
                    project.as_deref(),
                    *no_restore,
                    *keep_target_framework,
                    cancel,
                )
                .await
            }
            Commands::Apply { .. } => bail!("apply needs --pr or --channel"),
        }
    }
}

/// Runs restore unless skipped and prints what changed.
async fn finish_apply(
    project: &MauiProject,
    applied: &AppliedPackage,
    mut progress: PhaseProgress,
    no_restore: bool,
    cancel: &CancellationToken,
) -> Result<()> {
    if !no_restore {
        progress.start("Running dotnet restore");
        project::restore(&project.path, cancel)
            .await
            .inspect_err(|_| progress.fail("Restore failed"))?;
        progress.complete("Restored packages");
    }
    progress.finish();

    output::print_applied(applied, project, !no_restore);
    Ok(())
}

/// Per-build directory in the user cache, reused across runs.
fn download_dir(pr: PullRequestRef, build_id: u64) -> PathBuf {
    dirs::cache_dir()
        .unwrap_or_else(std::env::temp_dir)
        .join("maui-channel")
        .join(format!("pr-{}", pr.number()))
        .join(build_id.to_string())
}
