use std::fmt::Write;

use comfy_table::{Cell, Color as TableColor};

use super::styling::{bright, bright_yellow, cyan, dim, styled_band, styled_feasibility};
use super::tables::{
    color_coded_score_cell, create_cyan_header, create_table, priority_cell, status_cell,
};
use super::NEXT_STEPS;
use crate::analysis::AnalysisResult;

/// Prints a human-readable summary of one analysis to stdout.
///
/// Displays color-coded tables showing:
/// - Overview: pipeline name, score and band, feasibility, counts
/// - Stages: score, features, manual items and status per stage
/// - Manual Items: every construct that needs a human rewrite
/// - Secrets: the credentials to recreate on the target system
/// - Next Steps: the fixed follow-up list
///
/// Color coding:
/// - Green: Low band, High feasibility, stage scores below 10
/// - Yellow: Medium band or feasibility, stage scores below 25
/// - Red: High band and above, Low feasibility, stage scores of 25 and up
pub fn print_summary(result: &AnalysisResult) {
    println!("{}", render_summary(result));
}

fn add_section_header(output: &mut String, emoji: &str, title: &str) {
    let _ = writeln!(output, "{} {}", bright(emoji), bright(title).underlined());
}

fn render_summary(result: &AnalysisResult) -> String {
    let mut output = String::new();

    add_section_header(&mut output, "📊", "Overview");
    let _ = writeln!(
        output,
        "  {} {}\n  {} {}\n  {} {}\n  {} {}\n  {} {}\n  {} {}\n  {} {}\n",
        dim("Pipeline:"),
        cyan(&result.pipeline.name),
        dim("Complexity:"),
        styled_band(result.band, result.score),
        dim("Feasibility:"),
        styled_feasibility(result.feasibility),
        dim("Stages:"),
        bright_yellow(result.stage_count()),
        dim("Manual items:"),
        bright_yellow(result.manual_items.len()),
        dim("Approval gates:"),
        bright_yellow(result.approval_gate_count()),
        dim("Secrets:"),
        bright_yellow(result.secrets.len()),
    );

    if result.stages.is_empty() {
        let _ = writeln!(output, "{}", bright_yellow("No stages found."));
        return output;
    }

    add_section_header(&mut output, "📋", "Stages");
    let mut stages_table = create_table();
    stages_table.set_header(create_cyan_header(&[
        "#",
        "Stage",
        "Score",
        "Features",
        "Manual",
        "Status",
    ]));
    for (idx, stage) in result.stages.iter().enumerate() {
        let name = match &stage.parent {
            Some(parent) => format!("{parent} ↳ {}", stage.name),
            None => stage.name.clone(),
        };
        let features: Vec<_> = stage.tags.iter().map(|tag| tag.label()).collect();
        stages_table.add_row(vec![
            Cell::new(idx + 1),
            Cell::new(name),
            color_coded_score_cell(stage.score),
            Cell::new(features.join("\n")),
            Cell::new(stage.manual_items),
            status_cell(stage.status),
        ]);
    }
    let _ = writeln!(output, "{stages_table}\n");

    if !result.manual_items.is_empty() {
        add_section_header(&mut output, "🔧", "Manual Conversion Required");
        let mut manual_table = create_table();
        manual_table.set_header(create_cyan_header(&[
            "Priority",
            "Stage",
            "Item",
            "Action Required",
        ]));
        for item in &result.manual_items {
            manual_table.add_row(vec![
                priority_cell(item.priority),
                Cell::new(&item.scope),
                Cell::new(format!("{}\n{}", item.category, item.description)),
                Cell::new(&item.action),
            ]);
        }
        let _ = writeln!(output, "{manual_table}\n");
    }

    if !result.secrets.is_empty() {
        add_section_header(&mut output, "🔐", "Required Secrets");
        let mut secrets_table = create_table();
        secrets_table.set_header(create_cyan_header(&[
            "Secret Name",
            "Purpose",
            "Required For",
            "Type",
        ]));
        for secret in &result.secrets {
            let name = if secret.collision {
                Cell::new(format!("{} (ambiguous)", secret.name)).fg(TableColor::Red)
            } else {
                Cell::new(&secret.name)
            };
            let required_for = if secret.required_for.is_empty() {
                "All stages (global)".to_string()
            } else {
                secret.required_for.join("\n")
            };
            secrets_table.add_row(vec![
                name,
                Cell::new(&secret.purpose),
                Cell::new(required_for),
                Cell::new(secret.secret_type),
            ]);
        }
        let _ = writeln!(output, "{secrets_table}\n");
    }

    if !result.warnings.is_empty() {
        add_section_header(&mut output, "⚠️", "Warnings");
        for warning in &result.warnings {
            let _ = writeln!(output, "  {} {warning}", bright_yellow("!"));
        }
        output.push('\n');
    }

    add_section_header(&mut output, "💡", "Next Steps");
    for step in NEXT_STEPS {
        let _ = writeln!(output, "  {} {step}", cyan("•"));
    }

    output
}
