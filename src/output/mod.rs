mod progress;
mod styling;
mod summary;
mod tables;

pub use progress::PhaseProgress;
use styling::{paint, Tone};
pub use summary::{not_found_message, print_applied, print_resolution};

/// Prints the `maui-channel` banner to stderr.
pub fn print_banner() {
    eprintln!(
        r"
{} {}
  {}
",
        paint("📦 maui-channel", Tone::Brand),
        paint(env!("CARGO_PKG_VERSION"), Tone::Muted),
        paint("Pull request builds of .NET MAUI", Tone::Muted)
    );
}
