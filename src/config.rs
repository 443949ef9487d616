use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::PipelensError;

/// Configuration file structure for pipelens.
///
/// Holds the scoring weights used by the analysis and the defaults for
/// batch runs and report output. Loaded once per process and shared
/// read-only with every analysis.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct Config {
    /// Complexity scoring weights
    #[serde(default)]
    pub scoring: ScoringWeights,

    /// Analysis parameters
    #[serde(default)]
    pub analysis: AnalysisConfig,

    /// Report output preferences
    #[serde(default)]
    pub output: OutputConfig,
}

/// Per-construct complexity weights.
///
/// Band and feasibility thresholds are fixed and not configurable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct ScoringWeights {
    pub base_stage: u32,
    pub script_small: u32,
    pub script_medium: u32,
    pub script_large: u32,
    /// Statement count at which a script block becomes medium
    pub script_medium_threshold: usize,
    /// Statement count at which a script block becomes large
    pub script_large_threshold: usize,
    pub docker_build_push: u32,
    pub docker_build: u32,
    pub kubernetes: u32,
    pub sonarqube: u32,
    pub security_scan: u32,
    pub approval_gate: u32,
    pub complex_when: u32,
    pub triggers: u32,
    pub per_option: u32,
    pub pipeline_script: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct AnalysisConfig {
    /// Maximum number of pipelines analyzed concurrently
    #[serde(default = "default_workers")]
    pub workers: usize,

    /// Plugin steps treated as directly convertible, on top of the built-in list
    #[serde(default)]
    pub convertible_plugins: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct OutputConfig {
    /// Report formats written for each pipeline
    #[serde(default = "default_formats")]
    pub formats: Vec<ReportFormat>,

    /// Directory receiving the reports
    #[serde(default = "default_directory")]
    pub directory: PathBuf,

    /// Pretty-print JSON output
    #[serde(default)]
    pub pretty: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum ReportFormat {
    /// Concise Markdown summary
    Summary,
    /// Detailed Markdown breakdown
    Detailed,
    /// Interactive HTML view
    Html,
    /// Machine-readable analysis result
    Json,
}

impl ReportFormat {
    pub fn file_name(self) -> &'static str {
        match self {
            Self::Summary => "CONVERSION_SUMMARY.md",
            Self::Detailed => "CONVERSION_REPORT.md",
            Self::Html => "conversion_report.html",
            Self::Json => "analysis.json",
        }
    }
}

impl Default for ScoringWeights {
    fn default() -> Self {
        Self {
            base_stage: 1,
            script_small: 3,
            script_medium: 4,
            script_large: 6,
            script_medium_threshold: 6,
            script_large_threshold: 16,
            docker_build_push: 16,
            docker_build: 8,
            kubernetes: 15,
            sonarqube: 5,
            security_scan: 3,
            approval_gate: 0,
            complex_when: 4,
            triggers: 4,
            per_option: 4,
            pipeline_script: 4,
        }
    }
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            workers: default_workers(),
            convertible_plugins: Vec::new(),
        }
    }
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            formats: default_formats(),
            directory: default_directory(),
            pretty: false,
        }
    }
}

fn default_workers() -> usize {
    std::thread::available_parallelism().map_or(4, std::num::NonZeroUsize::get)
}

fn default_formats() -> Vec<ReportFormat> {
    vec![
        ReportFormat::Summary,
        ReportFormat::Detailed,
        ReportFormat::Html,
    ]
}

fn default_directory() -> PathBuf {
    PathBuf::from("pipelens-report")
}

impl Config {
    /// Load configuration from a file.
    ///
    /// Searches for configuration files in this order:
    /// 1. Specified path
    /// 2. ./pipelens.toml, ./pipelens.json, ./pipelens.yaml, ./pipelens.yml
    /// 3. `<user config dir>/pipelens/config.toml`
    ///
    /// Returns default configuration if no file is found.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        if let Some(path) = path {
            return Self::load_from_path(path);
        }

        let candidates = ["pipelens.toml", "pipelens.json", "pipelens.yaml", "pipelens.yml"];

        for candidate in &candidates {
            let path = Path::new(candidate);
            if path.exists() {
                return Self::load_from_path(path);
            }
        }

        if let Some(path) = Self::user_config_path().filter(|p| p.exists()) {
            return Self::load_from_path(&path);
        }

        Ok(Self::default())
    }

    /// `<user config dir>/pipelens/config.toml`, when the platform has one.
    pub fn user_config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("pipelens").join("config.toml"))
    }

    fn load_from_path(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let extension = path.extension().and_then(|ext| ext.to_str()).unwrap_or("");

        let config: Self = match extension {
            "toml" => toml::from_str(&contents)
                .with_context(|| format!("Failed to parse TOML config: {}", path.display()))?,
            "json" => serde_json::from_str(&contents)
                .with_context(|| format!("Failed to parse JSON config: {}", path.display()))?,
            "yaml" | "yml" => serde_yaml::from_str(&contents)
                .with_context(|| format!("Failed to parse YAML config: {}", path.display()))?,
            _ => toml::from_str(&contents)
                .or_else(|_| serde_json::from_str(&contents))
                .or_else(|_| serde_yaml::from_str(&contents))
                .with_context(|| format!("Failed to parse config file: {}", path.display()))?,
        };

        config
            .validate()
            .with_context(|| format!("Invalid config file: {}", path.display()))?;
        Ok(config)
    }

    pub fn validate(&self) -> crate::error::Result<()> {
        if self.analysis.workers == 0 {
            return Err(PipelensError::Config(
                "analysis.workers must be at least 1".to_string(),
            ));
        }
        if self.scoring.script_medium_threshold >= self.scoring.script_large_threshold {
            return Err(PipelensError::Config(format!(
                "scoring.script-medium-threshold ({}) must be below scoring.script-large-threshold ({})",
                self.scoring.script_medium_threshold, self.scoring.script_large_threshold
            )));
        }
        Ok(())
    }

    /// Save configuration to a file.
    pub fn save(&self, path: &Path) -> Result<()> {
        let contents = match path.extension().and_then(|ext| ext.to_str()) {
            Some("json") => serde_json::to_string_pretty(self)?,
            Some("yaml" | "yml") => serde_yaml::to_string(self)?,
            _ => toml::to_string_pretty(self)?,
        };

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create directory: {}", parent.display()))?;
        }
        std::fs::write(path, contents)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.scoring.base_stage, 1);
        assert_eq!(config.scoring.docker_build_push, 16);
        assert_eq!(config.scoring.kubernetes, 15);
        assert_eq!(config.scoring.approval_gate, 0);
        assert!(config.analysis.workers >= 1);
        assert_eq!(config.output.formats.len(), 3);
        assert!(!config.output.pretty);
    }

    #[test]
    fn test_load_toml_config() {
        let mut temp_file = NamedTempFile::with_suffix(".toml").unwrap();
        let toml_content = r#"
[scoring]
kubernetes = 20
script-large = 8

[analysis]
workers = 2
convertible-plugins = ["slackSend", "publishHTML"]

[output]
formats = ["json", "summary"]
directory = "reports"
pretty = true
"#;
        write!(temp_file, "{toml_content}").unwrap();

        let config = Config::load_from_path(temp_file.path()).unwrap();
        assert_eq!(config.scoring.kubernetes, 20);
        assert_eq!(config.scoring.script_large, 8);
        assert_eq!(config.scoring.docker_build_push, 16);
        assert_eq!(config.analysis.workers, 2);
        assert_eq!(config.analysis.convertible_plugins, vec!["slackSend", "publishHTML"]);
        assert_eq!(
            config.output.formats,
            vec![ReportFormat::Json, ReportFormat::Summary]
        );
        assert_eq!(config.output.directory, PathBuf::from("reports"));
        assert!(config.output.pretty);
    }

    #[test]
    fn test_load_json_config() {
        let mut temp_file = NamedTempFile::with_suffix(".json").unwrap();
        let json_content = r#"{
  "scoring": { "docker-build": 10 },
  "output": { "formats": ["html"] }
}"#;
        write!(temp_file, "{json_content}").unwrap();

        let config = Config::load_from_path(temp_file.path()).unwrap();
        assert_eq!(config.scoring.docker_build, 10);
        assert_eq!(config.output.formats, vec![ReportFormat::Html]);
        assert_eq!(config.output.directory, PathBuf::from("pipelens-report"));
    }

    #[test]
    fn test_load_yaml_config_without_extension() {
        let mut temp_file = NamedTempFile::new().unwrap();
        write!(temp_file, "analysis:\n  workers: 3\n").unwrap();

        let config = Config::load_from_path(temp_file.path()).unwrap();
        assert_eq!(config.analysis.workers, 3);
    }

    #[test]
    fn test_load_missing_explicit_path_fails() {
        let err = Config::load(Some(Path::new("does-not-exist/pipelens.toml"))).unwrap_err();
        assert!(err.to_string().contains("Failed to read config file"));
    }

    #[test]
    fn test_zero_workers_is_rejected() {
        let mut temp_file = NamedTempFile::with_suffix(".toml").unwrap();
        write!(temp_file, "[analysis]\nworkers = 0\n").unwrap();

        let err = Config::load_from_path(temp_file.path()).unwrap_err();
        assert!(format!("{err:#}").contains("workers"));
    }

    #[test]
    fn test_inverted_script_thresholds_are_rejected() {
        let mut config = Config::default();
        config.scoring.script_medium_threshold = 20;
        assert!(matches!(config.validate(), Err(PipelensError::Config(_))));
    }

    #[test]
    fn test_save_and_reload() {
        let temp_dir = tempfile::tempdir().unwrap();
        let mut config = Config::default();
        config.scoring.sonarqube = 7;
        config.analysis.workers = 5;

        for name in ["nested/pipelens.toml", "pipelens.json", "pipelens.yaml"] {
            let path = temp_dir.path().join(name);
            config.save(&path).unwrap();
            assert_eq!(Config::load(Some(&path)).unwrap(), config);
        }
    }
}
