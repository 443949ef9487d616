//! Report Assembler: every format renders one [`AnalysisResult`] and never
//! recomputes a figure of its own.

mod exports;
mod html;
mod markdown;
mod progress;
mod styling;
mod summary;
mod tables;

use crate::analysis::AnalysisResult;

pub use exports::write_reports;
pub use progress::BatchProgress;
pub use styling::{bright_green, bright_red, cyan, dim, magenta_bold};
pub use summary::print_summary;

/// Fixed follow-up list closing the concise summary.
const NEXT_STEPS: [&str; 4] = [
    "Review the detailed report (CONVERSION_REPORT.md)",
    "Configure repository secrets and approval environments",
    "Test the converted workflow with a sample commit",
    "Address the manual conversion items",
];

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S UTC";

/// Headline figures shared by every format, in display order.
fn headline(result: &AnalysisResult) -> Vec<(&'static str, String)> {
    vec![
        ("Total Stages", result.stage_count().to_string()),
        ("Complexity Score", result.score.to_string()),
        ("Complexity Band", result.band.to_string()),
        ("Conversion Feasibility", result.feasibility.to_string()),
        ("Manual Items", result.manual_items.len().to_string()),
        ("Approval Gates", result.approval_gate_count().to_string()),
        ("Required Secrets", result.secrets.len().to_string()),
    ]
}

/// Prints the `pipelens` banner to stderr.
pub fn print_banner() {
    eprintln!(
        r"
{} {}
  {}
",
        magenta_bold("🔍 pipelens"),
        dim(env!("CARGO_PKG_VERSION")),
        dim("Jenkins Pipeline Migration Analysis")
    );
}
