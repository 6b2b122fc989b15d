use std::fmt::Display;
use std::time::Duration;

use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};

use super::styling::{paint, Tone};

/// Spinner per step of a fixed sequence of phases, drawn on stderr.
pub struct PhaseProgress {
    total: usize,
    current: usize,
    pb: Option<ProgressBar>,
}

impl PhaseProgress {
    pub fn new(total: usize) -> Self {
        eprintln!("⚙️  {}", paint("Phases", Tone::Heading));
        Self {
            total,
            current: 0,
            pb: None,
        }
    }

    /// Starts the next phase, completing a still-running one silently.
    pub fn start(&mut self, running: impl Display) {
        if let Some(pb) = self.pb.take() {
            pb.finish();
        }
        self.current += 1;
        let message = format!("Phase {}/{}: {running}", self.current, self.total);
        self.pb = Some(create_spinner(paint(message, Tone::Running).to_string()));
    }

    pub fn complete(&mut self, done: impl Display) {
        if let Some(pb) = self.pb.take() {
            let message = format!("Phase {}/{}: {done} ✓", self.current, self.total);
            pb.finish_with_message(paint(message, Tone::Success).to_string());
        }
    }

    pub fn fail(&mut self, reason: impl Display) {
        if let Some(pb) = self.pb.take() {
            let message = format!("Phase {}/{}: {reason} ✗", self.current, self.total);
            pb.abandon_with_message(paint(message, Tone::Failure).to_string());
        }
    }

    pub fn finish(mut self) {
        if let Some(pb) = self.pb.take() {
            pb.finish();
        }
        eprintln!();
    }
}

fn create_spinner(message: String) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    pb.set_draw_target(ProgressDrawTarget::stderr());
    pb.set_style(
        ProgressStyle::default_spinner()
            .template("  {msg} {spinner}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    pb.set_message(message);
    pb.enable_steady_tick(Duration::from_millis(100));
    pb
}
