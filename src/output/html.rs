use std::io::Write;

use anyhow::Result;
use chrono::{DateTime, Utc};

use super::{headline, NEXT_STEPS, TIMESTAMP_FORMAT};
use crate::analysis::{AnalysisResult, ComplexityBand, Feasibility, ManualScope, StageStatus};

fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

fn band_class(band: ComplexityBand) -> &'static str {
    match band {
        ComplexityBand::Low => "good",
        ComplexityBand::Medium => "warning",
        ComplexityBand::High | ComplexityBand::VeryHigh => "bad",
    }
}

fn feasibility_class(feasibility: Feasibility) -> &'static str {
    match feasibility {
        Feasibility::High => "good",
        Feasibility::Medium => "warning",
        Feasibility::Low => "bad",
    }
}

/// Self-contained report with one expandable panel per stage.
pub fn render_html(
    result: &AnalysisResult,
    generated_at: DateTime<Utc>,
    output: &mut dyn Write,
) -> Result<()> {
    let name = escape(&result.pipeline.name);

    writeln!(output, "<!DOCTYPE html>")?;
    writeln!(output, "<html lang=\"en\">")?;
    writeln!(output, "<head>")?;
    writeln!(output, "    <meta charset=\"UTF-8\">")?;
    writeln!(output, "    <meta name=\"viewport\" content=\"width=device-width, initial-scale=1.0\">")?;
    writeln!(output, "    <title>pipelens Report - {name}</title>")?;
    writeln!(output, "    <style>")?;
    writeln!(output, "        body {{ font-family: system-ui, 'Helvetica Neue', Arial, sans-serif; margin: 0; padding: 32px; background: #eef1f5; color: #1f2933; }}")?;
    writeln!(output, "        .container {{ max-width: 1100px; margin: 0 auto; background: #fff; padding: 28px 36px; border-radius: 6px; border: 1px solid #d9dee4; }}")?;
    writeln!(output, "        h1 {{ color: #24292f; border-bottom: 2px solid #0969da; padding-bottom: 8px; }}")?;
    writeln!(output, "        h2 {{ color: #24292f; margin-top: 32px; font-size: 1.3em; }}")?;
    writeln!(output, "        .summary {{ background: #f6f8fa; border-left: 4px solid #0969da; padding: 16px 20px; margin: 16px 0; }}")?;
    writeln!(output, "        .summary p {{ margin: 6px 0; }}")?;
    writeln!(output, "        table {{ width: 100%; border-collapse: collapse; margin: 16px 0; font-size: 0.95em; }}")?;
    writeln!(output, "        th, td {{ padding: 8px 10px; text-align: left; border: 1px solid #d0d7de; vertical-align: top; }}")?;
    writeln!(output, "        th {{ background: #f6f8fa; color: #24292f; }}")?;
    writeln!(output, "        details {{ border: 1px solid #d0d7de; border-radius: 6px; margin: 8px 0; padding: 8px 14px; }}")?;
    writeln!(output, "        details[open] {{ background: #fbfcfd; }}")?;
    writeln!(output, "        summary {{ cursor: pointer; font-weight: 600; }}")?;
    writeln!(output, "        .tag {{ display: inline-block; background: #ddf4ff; color: #0550ae; border-radius: 10px; padding: 1px 8px; margin-right: 4px; font-size: 0.8em; }}")?;
    writeln!(output, "        code {{ background: #eff1f3; padding: 1px 4px; border-radius: 4px; }}")?;
    writeln!(output, "        .good {{ color: #1a7f37; }}")?;
    writeln!(output, "        .warning {{ color: #9a6700; }}")?;
    writeln!(output, "        .bad {{ color: #cf222e; }}")?;
    writeln!(output, "        .metric {{ font-weight: 700; }}")?;
    writeln!(output, "    </style>")?;
    writeln!(output, "</head>")?;
    writeln!(output, "<body>")?;
    writeln!(output, "    <div class=\"container\">")?;
    writeln!(output, "        <h1>🚀 Jenkins Conversion Report: {name}</h1>")?;

    writeln!(output, "        <div class=\"summary\">")?;
    writeln!(output, "            <p><strong>Generated:</strong> {}</p>", generated_at.format(TIMESTAMP_FORMAT))?;
    writeln!(
        output,
        "            <p><strong>Pipeline Complexity:</strong> <span class=\"{}\">{} ({} points)</span></p>",
        band_class(result.band),
        result.band,
        result.score
    )?;
    writeln!(
        output,
        "            <p><strong>Conversion Feasibility:</strong> <span class=\"{}\">{}</span></p>",
        feasibility_class(result.feasibility),
        result.feasibility
    )?;
    for (label, value) in headline(result) {
        writeln!(output, "            <p>{label}: <span class=\"metric\">{value}</span></p>")?;
    }
    writeln!(output, "        </div>")?;

    write_stages(result, output)?;
    write_pipeline_items(result, output)?;
    write_secrets(result, output)?;

    if !result.warnings.is_empty() {
        writeln!(output, "        <h2>Warnings</h2>")?;
        writeln!(output, "        <ul>")?;
        for warning in &result.warnings {
            writeln!(output, "            <li class=\"warning\">{}</li>", escape(&warning.to_string()))?;
        }
        writeln!(output, "        </ul>")?;
    }

    writeln!(output, "        <h2>Next Steps</h2>")?;
    writeln!(output, "        <ol>")?;
    for step in NEXT_STEPS {
        writeln!(output, "            <li>{}</li>", escape(step))?;
    }
    writeln!(output, "        </ol>")?;

    writeln!(output, "        <footer style=\"margin-top: 32px; padding-top: 12px; border-top: 1px solid #d0d7de; color: #57606a; font-size: 0.85em;\">")?;
    writeln!(
        output,
        "            <p>Report generated by pipelens v{} on {}</p>",
        env!("CARGO_PKG_VERSION"),
        generated_at.format(TIMESTAMP_FORMAT)
    )?;
    writeln!(output, "        </footer>")?;
    writeln!(output, "    </div>")?;
    writeln!(output, "</body>")?;
    writeln!(output, "</html>")?;

    Ok(())
}

fn write_stages(result: &AnalysisResult, output: &mut dyn Write) -> Result<()> {
    writeln!(output, "        <h2>Stages</h2>")?;
    for stage in &result.stages {
        let (status_class, status) = match stage.status {
            StageStatus::Ready => ("good", "✅ Ready"),
            StageStatus::Manual => ("warning", "⚠️ Manual"),
        };
        let open = if stage.status == StageStatus::Manual { " open" } else { "" };
        writeln!(output, "        <details class=\"stage\" id=\"stage-{}\"{open}>", escape(&stage.slug))?;
        writeln!(
            output,
            "            <summary>{} &middot; score {} &middot; <span class=\"{status_class}\">{status}</span></summary>",
            escape(&stage.name),
            stage.score
        )?;

        write!(output, "            <p>")?;
        for tag in &stage.tags {
            write!(output, "<span class=\"tag\">{}</span>", escape(tag.label()))?;
        }
        writeln!(output, "</p>")?;

        if let Some(parent) = &stage.parent {
            writeln!(output, "            <p>Runs inside <strong>{}</strong></p>", escape(parent))?;
        }
        if let Some(env) = &stage.approval_environment {
            writeln!(
                output,
                "            <p>Approval environment: <code>{}</code></p>",
                escape(env)
            )?;
        }
        if !stage.post_conditions.is_empty() {
            writeln!(output, "            <ul>")?;
            for condition in &stage.post_conditions {
                writeln!(
                    output,
                    "                <li>post <code>{condition}</code> &rarr; <code>{}</code></li>",
                    escape(condition.target_condition())
                )?;
            }
            writeln!(output, "            </ul>")?;
        }

        let items: Vec<_> = result
            .manual_items
            .iter()
            .filter(|item| matches!(&item.scope, ManualScope::Stage(name) if *name == stage.name))
            .collect();
        if !items.is_empty() {
            writeln!(output, "            <table>")?;
            writeln!(output, "                <thead><tr><th>Priority</th><th>Item</th><th>Action Required</th></tr></thead>")?;
            writeln!(output, "                <tbody>")?;
            for item in items {
                writeln!(
                    output,
                    "                    <tr><td>{}</td><td>{}: {}</td><td>{}</td></tr>",
                    item.priority,
                    escape(&item.category.label()),
                    escape(&item.description),
                    escape(&item.action)
                )?;
            }
            writeln!(output, "                </tbody>")?;
            writeln!(output, "            </table>")?;
        }
        writeln!(output, "        </details>")?;
    }
    Ok(())
}

fn write_pipeline_items(result: &AnalysisResult, output: &mut dyn Write) -> Result<()> {
    let items: Vec<_> = result.pipeline_manual_items().collect();
    if items.is_empty() {
        return Ok(());
    }

    writeln!(output, "        <details class=\"pipeline-items\" open>")?;
    writeln!(output, "            <summary>Pipeline Level &middot; {} manual items</summary>", items.len())?;
    writeln!(output, "            <table>")?;
    writeln!(output, "                <thead><tr><th>Priority</th><th>Item</th><th>Action Required</th></tr></thead>")?;
    writeln!(output, "                <tbody>")?;
    for item in items {
        writeln!(
            output,
            "                    <tr><td>{}</td><td>{}: {}</td><td>{}</td></tr>",
            item.priority,
            escape(&item.category.label()),
            escape(&item.description),
            escape(&item.action)
        )?;
    }
    writeln!(output, "                </tbody>")?;
    writeln!(output, "            </table>")?;
    writeln!(output, "        </details>")?;
    Ok(())
}

fn write_secrets(result: &AnalysisResult, output: &mut dyn Write) -> Result<()> {
    writeln!(output, "        <h2>Required Secrets</h2>")?;
    if result.secrets.is_empty() {
        writeln!(output, "        <p><em>No credentials referenced</em></p>")?;
        return Ok(());
    }

    writeln!(output, "        <table>")?;
    writeln!(output, "            <thead>")?;
    writeln!(output, "                <tr><th>Secret Name</th><th>Purpose</th><th>Required For</th><th>Type</th></tr>")?;
    writeln!(output, "            </thead>")?;
    writeln!(output, "            <tbody>")?;
    for secret in &result.secrets {
        let class = if secret.collision { " class=\"bad\"" } else { "" };
        let required_for = if secret.required_for.is_empty() {
            "All stages (global)".to_string()
        } else {
            secret.required_for.join(", ")
        };
        writeln!(
            output,
            "                <tr><td{class}><code>{}</code></td><td>{}</td><td>{}</td><td>{}</td></tr>",
            escape(&secret.name),
            escape(&secret.purpose),
            escape(&required_for),
            secret.secret_type
        )?;
    }
    writeln!(output, "            </tbody>")?;
    writeln!(output, "        </table>")?;
    Ok(())
}
