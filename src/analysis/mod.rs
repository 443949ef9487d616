//! Migration analysis over an extracted [`PipelineDefinition`].
//!
//! [`Analyzer::analyze`] runs feature detection, scoring, manual
//! classification and secret extraction once and freezes everything into an
//! [`AnalysisResult`]. Report renderers only ever read that result.

pub mod batch;
mod complexity;
mod features;
mod manual;
mod secrets;

#[cfg(test)]
mod tests;

use std::collections::BTreeSet;

use log::{debug, info};
use serde::{Deserialize, Serialize};

use crate::config::{Config, ScoringWeights};
use crate::error::{AnalysisWarning, Result};
use crate::extractor;
use crate::pipeline::{PipelineDefinition, PostCondition, Stage};

pub use complexity::{ComplexityBand, Feasibility};
pub use features::FeatureTag;
pub use manual::{ManualCategory, ManualItem, ManualScope, Priority};
pub use secrets::{SecretRequirement, SecretType};

/// Lower-cased stage name with spaces, `&` and `/` turned into single dashes.
pub fn slugify(name: &str) -> String {
    let mut slug = String::with_capacity(name.len());
    for c in name.trim().chars().flat_map(char::to_lowercase) {
        let c = if matches!(c, ' ' | '&' | '/') { '-' } else { c };
        if c == '-' && slug.ends_with('-') {
            continue;
        }
        slug.push(c);
    }
    slug.trim_matches('-').to_string()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StageStatus {
    Ready,
    Manual,
}

impl std::fmt::Display for StageStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::Ready => "Ready",
            Self::Manual => "Manual",
        })
    }
}

/// Per-stage figures, in flattened stage order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageAnalysis {
    pub name: String,
    pub slug: String,
    /// Enclosing stage for stages declared in `parallel {}` or `stages {}`.
    pub parent: Option<String>,
    pub tags: BTreeSet<FeatureTag>,
    pub score: u32,
    pub manual_items: usize,
    pub status: StageStatus,
    pub post_conditions: Vec<PostCondition>,
    /// Protected environment that replaces the stage's approval gate.
    pub approval_environment: Option<String>,
}

impl StageAnalysis {
    pub fn has(&self, tag: FeatureTag) -> bool {
        self.tags.contains(&tag)
    }

    /// Technology tags only, or `None` for a stage without any.
    pub fn technology(&self) -> Option<String> {
        let labels: Vec<_> = self
            .tags
            .iter()
            .filter(|tag| tag.is_technology())
            .map(|tag| tag.label())
            .collect();
        (!labels.is_empty()).then(|| labels.join(", "))
    }
}

/// The single source of truth for every report format.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisResult {
    pub pipeline: PipelineDefinition,
    pub stages: Vec<StageAnalysis>,
    /// Triggers, options and pipeline-level scripts.
    pub pipeline_additions: u32,
    pub score: u32,
    pub band: ComplexityBand,
    pub feasibility: Feasibility,
    pub manual_items: Vec<ManualItem>,
    pub secrets: Vec<SecretRequirement>,
    pub warnings: Vec<AnalysisWarning>,
}

impl AnalysisResult {
    pub fn stage_count(&self) -> usize {
        self.stages.len()
    }

    pub fn approval_gate_count(&self) -> usize {
        self.stages_with(FeatureTag::ApprovalGate).count()
    }

    pub fn stages_with(&self, tag: FeatureTag) -> impl Iterator<Item = &StageAnalysis> {
        self.stages.iter().filter(move |stage| stage.has(tag))
    }

    pub fn pipeline_manual_items(&self) -> impl Iterator<Item = &ManualItem> {
        self.manual_items
            .iter()
            .filter(|item| item.scope == ManualScope::Pipeline)
    }
}

/// Runs the analysis with one read-only set of scoring weights.
#[derive(Debug, Clone)]
pub struct Analyzer {
    weights: ScoringWeights,
    classifier: manual::Classifier,
}

impl Analyzer {
    pub fn new(weights: ScoringWeights, convertible_plugins: &[String]) -> Self {
        Self {
            weights,
            classifier: manual::Classifier::new(convertible_plugins),
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(
            config.scoring.clone(),
            &config.analysis.convertible_plugins,
        )
    }

    /// Extracts and analyzes one Jenkinsfile.
    pub fn analyze_source(&self, name: &str, text: &str) -> Result<AnalysisResult> {
        let pipeline = extractor::extract(name, text)?;
        Ok(self.analyze(pipeline))
    }

    pub fn analyze(&self, pipeline: PipelineDefinition) -> AnalysisResult {
        info!("Analyzing pipeline `{}`", pipeline.name);

        let mut flattened: Vec<(&Stage, Option<&str>)> = Vec::new();
        for stage in &pipeline.stages {
            flattened.push((stage, None));
            flattened.extend(stage.children.iter().map(|child| (child, Some(stage.name.as_str()))));
        }

        let features: Vec<_> = flattened
            .iter()
            .map(|(stage, _)| features::detect(stage))
            .collect();

        let mut stages = Vec::with_capacity(flattened.len());
        let mut manual_items = Vec::new();
        let mut warnings = Vec::new();

        for ((stage, parent), detected) in flattened.iter().zip(&features) {
            let score = complexity::stage_score(stage, detected, &self.weights);
            let (items, stage_warnings) = self.classifier.stage_items(stage);
            let slug = slugify(&stage.name);

            debug!(
                "Stage `{}`: score {score}, tags {:?}, {} manual items",
                stage.name,
                detected.tags,
                items.len()
            );

            stages.push(StageAnalysis {
                name: stage.name.clone(),
                approval_environment: detected
                    .has(FeatureTag::ApprovalGate)
                    .then(|| format!("approval-{slug}")),
                slug,
                parent: parent.map(str::to_string),
                tags: detected.tags.clone(),
                score,
                manual_items: items.len(),
                status: if items.is_empty() {
                    StageStatus::Ready
                } else {
                    StageStatus::Manual
                },
                post_conditions: stage.post.conditions().collect(),
            });
            manual_items.extend(items);
            warnings.extend(stage_warnings);
        }

        let (pipeline_items, pipeline_warnings) = self.classifier.pipeline_items(&pipeline);
        manual_items.extend(pipeline_items);
        warnings.extend(pipeline_warnings);

        let tagged: Vec<_> = flattened
            .iter()
            .zip(&features)
            .map(|((stage, _), detected)| (*stage, &detected.tags))
            .collect();
        let (secrets, secret_warnings) = secrets::extract(&pipeline, &tagged);
        warnings.extend(secret_warnings);

        let pipeline_additions = complexity::pipeline_additions(&pipeline, &self.weights);
        let score = stages.iter().map(|s| s.score).sum::<u32>() + pipeline_additions;
        let band = ComplexityBand::from_score(score);
        let feasibility = Feasibility::assess(band, manual_items.len(), stages.len());

        info!(
            "Pipeline `{}`: {} stages, score {score} ({band}), feasibility {feasibility}, {} manual items",
            pipeline.name,
            stages.len(),
            manual_items.len()
        );

        AnalysisResult {
            pipeline,
            stages,
            pipeline_additions,
            score,
            band,
            feasibility,
            manual_items,
            secrets,
            warnings,
        }
    }
}

impl Default for Analyzer {
    fn default() -> Self {
        Self::new(ScoringWeights::default(), &[])
    }
}
