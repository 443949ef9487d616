use std::path::Path;

use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};

use super::styling::{bright, bright_green, bright_red, bright_yellow};

/// Progress over the files of a batch run, drawn on stderr.
pub struct BatchProgress {
    pb: ProgressBar,
}

impl BatchProgress {
    pub fn start(total: usize) -> Self {
        eprintln!("{}  {}", bright("⚙️"), bright("Pipelines").underlined());
        let pb = ProgressBar::new(total as u64);
        pb.set_draw_target(ProgressDrawTarget::stderr());
        pb.set_style(
            ProgressStyle::default_bar()
                .template("  {msg} [{bar:30.cyan/blue}] {pos}/{len} {spinner}")
                .unwrap()
                .progress_chars("=> "),
        );
        pb.set_message(bright_yellow("Analyzing").to_string());
        pb.enable_steady_tick(std::time::Duration::from_millis(100));
        Self { pb }
    }

    /// Records one finished file; failures are printed above the bar.
    pub fn file_done(&self, path: &Path, ok: bool) {
        if !ok {
            self.pb
                .println(format!("  {} {}", bright_red("✗"), path.display()));
        }
        self.pb.inc(1);
    }

    pub fn finish(self, failed: usize) {
        let message = if failed == 0 {
            bright_green("Analyzed all pipelines ✓").to_string()
        } else {
            bright_red(format!("{failed} pipelines failed")).to_string()
        };
        self.pb.finish_with_message(message);
        eprintln!();
    }
}
