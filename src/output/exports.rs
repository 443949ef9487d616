use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use log::info;
use serde::Serialize;

use super::html::render_html;
use super::markdown::{render_detailed, render_summary_markdown};
use crate::analysis::AnalysisResult;
use crate::config::ReportFormat;

/// JSON envelope: the analysis plus when and by what it was rendered.
#[derive(Serialize)]
struct JsonReport<'a> {
    generated_at: DateTime<Utc>,
    tool_version: &'static str,
    #[serde(flatten)]
    analysis: &'a AnalysisResult,
}

/// Renders one report format into `output`.
///
/// Every format reads the same [`AnalysisResult`]:
/// - Summary: concise Markdown with one line per stage
/// - Detailed: the full Markdown breakdown
/// - Html: self-contained interactive page
/// - Json: the result itself, for tooling
pub fn export_report(
    result: &AnalysisResult,
    format: ReportFormat,
    pretty: bool,
    generated_at: DateTime<Utc>,
    output: &mut dyn Write,
) -> Result<()> {
    match format {
        ReportFormat::Summary => {
            output.write_all(render_summary_markdown(result, generated_at).as_bytes())?;
        }
        ReportFormat::Detailed => {
            output.write_all(render_detailed(result, generated_at).as_bytes())?;
        }
        ReportFormat::Html => render_html(result, generated_at, output)?,
        ReportFormat::Json => export_json(result, pretty, generated_at, output)?,
    }
    Ok(())
}

fn export_json(
    result: &AnalysisResult,
    pretty: bool,
    generated_at: DateTime<Utc>,
    output: &mut dyn Write,
) -> Result<()> {
    let report = JsonReport {
        generated_at,
        tool_version: env!("CARGO_PKG_VERSION"),
        analysis: result,
    };
    let json = if pretty {
        serde_json::to_string_pretty(&report)?
    } else {
        serde_json::to_string(&report)?
    };
    writeln!(output, "{json}")?;
    Ok(())
}

/// Writes each requested format into `directory`, returning the written paths.
pub fn write_reports(
    directory: &Path,
    result: &AnalysisResult,
    formats: &[ReportFormat],
    pretty: bool,
) -> Result<Vec<PathBuf>> {
    fs::create_dir_all(directory).with_context(|| {
        format!("Failed to create output directory: {}", directory.display())
    })?;

    let generated_at = Utc::now();
    let mut written = Vec::with_capacity(formats.len());
    for format in formats {
        let path = directory.join(format.file_name());
        let file = File::create(&path)
            .with_context(|| format!("Failed to create report file: {}", path.display()))?;
        let mut writer = BufWriter::new(file);
        export_report(result, *format, pretty, generated_at, &mut writer)
            .with_context(|| format!("Failed to write report: {}", path.display()))?;
        writer
            .flush()
            .with_context(|| format!("Failed to write report: {}", path.display()))?;

        info!("Wrote {}", path.display());
        written.push(path);
    }
    Ok(written)
}
