use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use log::info;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::analysis::batch::{analyze_files, output_dir_names, pipeline_name};
use crate::analysis::Analyzer;
use crate::config::{Config, ReportFormat};
use crate::output::{self, bright_green, bright_red, cyan, dim, BatchProgress};

#[derive(Parser)]
#[command(name = "pipelens")]
#[command(author, version, about = "Jenkins Pipeline Migration Analysis", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Configuration file (defaults to ./pipelens.toml or the user config)
    #[arg(short, long, global = true, env = "PIPELENS_CONFIG")]
    config: Option<PathBuf>,

    /// Pretty-print JSON reports
    #[arg(short, long, global = true, default_value_t = false)]
    pretty: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Analyze one or more Jenkinsfiles and write conversion reports
    Analyze {
        /// Jenkinsfiles to analyze
        #[arg(required = true)]
        files: Vec<PathBuf>,

        /// Report formats to write (repeatable)
        #[arg(short, long, value_enum)]
        format: Vec<ReportFormat>,

        /// Directory for the reports
        #[arg(short, long)]
        output_dir: Option<PathBuf>,

        /// Maximum number of pipelines analyzed at once
        #[arg(short, long)]
        workers: Option<usize>,
    },
    /// Write a configuration file with the default weights
    InitConfig {
        #[arg(default_value = "pipelens.toml")]
        path: PathBuf,

        /// Overwrite an existing file
        #[arg(long, default_value_t = false)]
        force: bool,
    },
}

/// Effective report settings after CLI flags override the config file.
struct ReportSettings {
    formats: Vec<ReportFormat>,
    directory: PathBuf,
    pretty: bool,
}

impl Cli {
    pub async fn execute(&self) -> Result<()> {
        match &self.command {
            Commands::Analyze {
                files,
                format,
                output_dir,
                workers,
            } => {
                let config = Config::load(self.config.as_deref())?;
                let settings = ReportSettings {
                    formats: if format.is_empty() {
                        config.output.formats.clone()
                    } else {
                        format.clone()
                    },
                    directory: output_dir
                        .clone()
                        .unwrap_or_else(|| config.output.directory.clone()),
                    pretty: self.pretty || config.output.pretty,
                };
                let workers = workers.unwrap_or(config.analysis.workers);
                let analyzer = Analyzer::from_config(&config);

                if let [file] = files.as_slice() {
                    Self::analyze_single(file, &analyzer, &settings)
                } else {
                    Self::analyze_batch(files, analyzer, workers, &settings).await
                }
            }
            Commands::InitConfig { path, force } => Self::init_config(path, *force),
        }
    }

    fn analyze_single(file: &Path, analyzer: &Analyzer, settings: &ReportSettings) -> Result<()> {
        info!("Analyzing pipeline file: {}", file.display());

        let text = std::fs::read_to_string(file)
            .with_context(|| format!("Failed to read pipeline file: {}", file.display()))?;
        let result = analyzer
            .analyze_source(&pipeline_name(file), &text)
            .with_context(|| format!("Failed to analyze {}", file.display()))?;

        output::print_summary(&result);

        let written = output::write_reports(
            &settings.directory,
            &result,
            &settings.formats,
            settings.pretty,
        )?;
        for path in written {
            eprintln!("  {} {}", bright_green("✓"), dim(path.display()));
        }
        Ok(())
    }

    async fn analyze_batch(
        files: &[PathBuf],
        analyzer: Analyzer,
        workers: usize,
        settings: &ReportSettings,
    ) -> Result<()> {
        let progress = BatchProgress::start(files.len());
        let outcomes = analyze_files(files, Arc::new(analyzer), workers, |path, result| {
            progress.file_done(path, result.is_ok());
        })
        .await;

        let mut failed = outcomes.iter().filter(|o| o.result.is_err()).count();
        progress.finish(failed);

        for (outcome, dir_name) in outcomes.iter().zip(output_dir_names(files)) {
            let directory = settings.directory.join(&dir_name);
            let written = outcome
                .result
                .as_ref()
                .map_err(|e| format!("{e:#}"))
                .and_then(|result| {
                    output::write_reports(&directory, result, &settings.formats, settings.pretty)
                        .map(|_| result)
                        .map_err(|e| format!("{e:#}"))
                });
            match written {
                Ok(result) => {
                    eprintln!(
                        "  {} {} {} ({}, {})",
                        bright_green("✓"),
                        cyan(outcome.path.display()),
                        dim(format!("→ {}", directory.display())),
                        result.band,
                        result.feasibility
                    );
                }
                Err(message) => {
                    if outcome.result.is_ok() {
                        failed += 1;
                    }
                    eprintln!(
                        "  {} {} {}",
                        bright_red("✗"),
                        cyan(outcome.path.display()),
                        dim(message)
                    );
                }
            }
        }

        if failed > 0 {
            bail!("{failed} of {} pipelines could not be analyzed or reported", files.len());
        }
        Ok(())
    }

    fn init_config(path: &Path, force: bool) -> Result<()> {
        if path.exists() && !force {
            bail!(
                "{} already exists; pass --force to overwrite it",
                path.display()
            );
        }
        Config::default().save(path)?;
        info!("Default configuration written to: {}", path.display());
        eprintln!("  {} {}", bright_green("✓"), dim(path.display()));
        Ok(())
    }
}
