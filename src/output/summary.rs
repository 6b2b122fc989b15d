use std::fmt::Write;

use comfy_table::Cell;

use crate::candidate::PullRequestRef;
use crate::project::{AppliedPackage, MauiProject, CONTROLS_PACKAGE};
use crate::resolver::{Resolution, Strategy};

use super::styling::{paint, Tone};
use super::tables::{color_coded_result_cell, create_table, label_cell};

/// Prints the resolved build of `pr` to stdout.
pub fn print_resolution(resolution: &Resolution, pr: PullRequestRef, build_url: &str) {
    println!("{}", render_resolution(resolution, pr, build_url));
}

/// Prints what `apply` changed in the project to stdout.
pub fn print_applied(applied: &AppliedPackage, project: &MauiProject, restored: bool) {
    println!("{}", render_applied(applied, project, restored));
}

/// Explains the usual reasons a pull request has no usable build yet.
pub fn not_found_message(pr: PullRequestRef, artifact: &str, pr_url: &str) -> String {
    format!(
        "No build with a {artifact} artifact was found for PR {pr}.

This usually means one of:
  - CI has not been triggered for the pull request yet
  - the pull request is a draft and CI does not run on drafts
  - the build is still running
  - the build failed before publishing packages

Check the pull request status at {pr_url}"
    )
}

fn add_section_header(output: &mut String, emoji: &str, title: &str) {
    let _ = writeln!(output, "{emoji} {}", paint(title, Tone::Heading));
}

fn render_resolution(resolution: &Resolution, pr: PullRequestRef, build_url: &str) -> String {
    let build = &resolution.build;
    let mut output = String::new();

    add_section_header(&mut output, "🔎", &format!("Build for PR {pr}"));

    let mut table = create_table();
    table.add_row(vec![
        label_cell("Build"),
        Cell::new(format!("{} ({})", build.build_id, build.build_number)),
    ]);
    table.add_row(vec![
        label_cell("Project"),
        Cell::new(format!("{}/{}", build.organization, build.project)),
    ]);
    table.add_row(vec![label_cell("Branch"), Cell::new(&build.source_branch)]);
    table.add_row(vec![label_cell("Commit"), Cell::new(&build.source_version)]);
    table.add_row(vec![label_cell("Status"), Cell::new(&build.status)]);
    table.add_row(vec![
        label_cell("Result"),
        color_coded_result_cell(build.result.as_deref()),
    ]);
    table.add_row(vec![
        label_cell("Found via"),
        Cell::new(resolution.strategy.to_string()),
    ]);
    table.add_row(vec![
        label_cell("Verifications"),
        Cell::new(resolution.verification_attempts),
    ]);
    table.add_row(vec![label_cell("Link"), Cell::new(build_url)]);

    let _ = writeln!(output, "{table}");

    if resolution.strategy == Strategy::MergeRefBuilds {
        let _ = writeln!(
            output,
            "{}",
            paint(
                "No check run linked a build with packages; using the newest merge-ref build.",
                Tone::Muted
            )
        );
    }
    output
}

fn render_applied(applied: &AppliedPackage, project: &MauiProject, restored: bool) -> String {
    let mut output = String::new();

    add_section_header(&mut output, "✅", "Project updated");

    let target_framework = applied.retargeted_to.as_ref().map_or_else(
        || {
            project
                .dotnet_version
                .as_ref()
                .map_or_else(|| "unchanged".to_string(), |v| format!("net{v} (unchanged)"))
        },
        |v| format!("net{v}"),
    );

    let mut table = create_table();
    table.add_row(vec![
        label_cell("Project"),
        Cell::new(project.path.display()),
    ]);
    table.add_row(vec![label_cell("Package"), Cell::new(CONTROLS_PACKAGE)]);
    table.add_row(vec![
        label_cell("Version"),
        Cell::new(format!(
            "{} → {}",
            applied.previous_version.as_deref().unwrap_or("unset"),
            applied.version
        )),
    ]);
    table.add_row(vec![label_cell("Target framework"), Cell::new(target_framework)]);
    table.add_row(vec![
        label_cell("Package source"),
        Cell::new(applied.nuget_config.as_ref().map_or_else(
            || "nuget.org".to_string(),
            |path| path.display().to_string(),
        )),
    ]);
    table.add_row(vec![
        label_cell("Restore"),
        Cell::new(if restored { "done" } else { "skipped" }),
    ]);

    let _ = writeln!(output, "{table}");

    if !restored {
        let _ = writeln!(
            output,
            "{}",
            paint("Run `dotnet restore` before building.", Tone::Muted)
        );
    }
    output
}
