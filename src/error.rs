use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum PipelensError {
    #[error("Structural parse error at line {line}: {message}")]
    StructuralParse { message: String, line: usize },

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("YAML serialization error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl PipelensError {
    pub fn structural(message: impl Into<String>, line: usize) -> Self {
        Self::StructuralParse {
            message: message.into(),
            line,
        }
    }
}

pub type Result<T> = std::result::Result<T, PipelensError>;

/// Non-fatal findings collected during an analysis run.
///
/// Each warning is logged when raised and also kept in the analysis result so
/// that every report format lists the same set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AnalysisWarning {
    UnknownPlugin {
        scope: String,
        plugin: String,
    },
    UnknownDirective {
        scope: String,
        directive: String,
    },
    AmbiguousSecret {
        name: String,
        identifiers: Vec<String>,
    },
}

impl std::fmt::Display for AnalysisWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::UnknownPlugin { scope, plugin } => {
                write!(f, "Unknown plugin step `{plugin}` in {scope}")
            }
            Self::UnknownDirective { scope, directive } => {
                write!(f, "Unsupported directive `{directive}` in {scope}")
            }
            Self::AmbiguousSecret { name, identifiers } => write!(
                f,
                "Credentials {} all normalize to secret `{name}`",
                identifiers
                    .iter()
                    .map(|id| format!("`{id}`"))
                    .collect::<Vec<_>>()
                    .join(", ")
            ),
        }
    }
}
