use std::fmt::Display;

use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};

use super::styling::{bright, bright_green, bright_red, bright_yellow};

/// Progress tracking for the phases of a build resolution
pub struct PhaseProgress {
    pb: ProgressBar,
    phase: u8,
}

impl PhaseProgress {
    pub fn start_phase_1() -> Self {
        eprintln!("{}  {}", bright("⚙️"), bright("Phases").underlined());
        let pb = create_spinner(bright_yellow("Phase 1/2: Listing builds").to_string());
        Self { pb, phase: 1 }
    }

    pub fn finish_phase_1_start_phase_2(self, build_count: usize) -> Self {
        self.pb.finish_with_message(
            bright_green(format!("Phase 1/2: Listed {build_count} succeeded builds ✓")).to_string(),
        );
        let pb = create_spinner(
            bright_yellow("Phase 2/2: Resolving resources and metadata").to_string(),
        );
        Self { pb, phase: 2 }
    }

    pub fn finish_phase_2(self) {
        self.pb.finish_with_message(
            bright_green("Phase 2/2: Build record assembled successfully ✓").to_string(),
        );
        eprintln!();
    }

    /// Ends the run early when the requested build is not among the listed ones.
    pub fn finish_not_found(self, build_number: u64) {
        self.pb.finish_with_message(
            bright_red(format!("Phase 2/2: No succeeded build #{build_number} ✗")).to_string(),
        );
        eprintln!();
    }

    /// Ends the current phase with the error that aborted it.
    pub fn fail(self, error: &dyn Display) {
        self.pb.finish_with_message(
            bright_red(format!("Phase {}/2: Failed: {error} ✗", self.phase)).to_string(),
        );
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
    pb.enable_steady_tick(std::time::Duration::from_millis(100));
    pb
}
