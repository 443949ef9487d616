use std::fmt;

use serde::{Deserialize, Serialize};

use super::features::{FeatureTag, StageFeatures};
use crate::config::ScoringWeights;
use crate::pipeline::{PipelineDefinition, Stage, Step};

/// Qualitative band of the pipeline score. Thresholds are fixed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum ComplexityBand {
    Low,
    Medium,
    High,
    VeryHigh,
}

impl ComplexityBand {
    pub fn from_score(score: u32) -> Self {
        match score {
            0..=19 => Self::Low,
            20..=59 => Self::Medium,
            60..=119 => Self::High,
            _ => Self::VeryHigh,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Low => "Low",
            Self::Medium => "Medium",
            Self::High => "High",
            Self::VeryHigh => "Very High",
        }
    }
}

impl fmt::Display for ComplexityBand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// How mechanically convertible the pipeline is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Feasibility {
    Low,
    Medium,
    High,
}

impl Feasibility {
    /// High needs a band of at most Medium and fewer than 0.3 manual items
    /// per stage; a band of High or above, or 0.5 items per stage, is Low.
    pub fn assess(band: ComplexityBand, manual_items: usize, stage_count: usize) -> Self {
        let ratio = manual_ratio(manual_items, stage_count);
        if band <= ComplexityBand::Medium && ratio < 0.3 {
            Self::High
        } else if band >= ComplexityBand::High || ratio >= 0.5 {
            Self::Low
        } else {
            Self::Medium
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Low => "Low",
            Self::Medium => "Medium",
            Self::High => "High",
        }
    }
}

impl fmt::Display for Feasibility {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Manual items per stage. Items without any stage count as unbounded.
#[allow(clippy::cast_precision_loss)]
pub fn manual_ratio(manual_items: usize, stage_count: usize) -> f64 {
    match (manual_items, stage_count) {
        (0, _) => 0.0,
        (_, 0) => f64::INFINITY,
        (items, stages) => items as f64 / stages as f64,
    }
}

/// Statements in a script block: non-blank lines that are not just braces.
pub fn statement_count(text: &str) -> usize {
    text.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .filter(|line| !line.chars().all(|c| matches!(c, '{' | '}' | '(' | ')' | ';')))
        .count()
}

pub fn script_weight(text: &str, weights: &ScoringWeights) -> u32 {
    let statements = statement_count(text);
    if statements >= weights.script_large_threshold {
        weights.script_large
    } else if statements >= weights.script_medium_threshold {
        weights.script_medium
    } else {
        weights.script_small
    }
}

/// Scores one stage (children are scored on their own).
pub fn stage_score(stage: &Stage, features: &StageFeatures, weights: &ScoringWeights) -> u32 {
    let mut score = weights.base_stage;

    for step in stage.walk_steps().into_iter().chain(stage.walk_post_steps()) {
        if let Step::ScriptBlock { text } = step {
            score += script_weight(text, weights);
        }
    }

    if features.has(FeatureTag::Docker) {
        score += if features.docker_push {
            weights.docker_build_push
        } else {
            weights.docker_build
        };
    }
    if features.has(FeatureTag::Kubernetes) {
        score += weights.kubernetes;
    }
    if features.has(FeatureTag::SonarQube) {
        score += weights.sonarqube;
    }
    if features.has(FeatureTag::SecurityScan) {
        score += weights.security_scan;
    }
    if features.has(FeatureTag::ApprovalGate) {
        score += weights.approval_gate;
    }
    if stage.when.as_ref().is_some_and(|when| when.is_complex()) {
        score += weights.complex_when;
    }

    score
}

/// Triggers, options and pipeline-level scripts, added on top of the stage sum.
pub fn pipeline_additions(pipeline: &PipelineDefinition, weights: &ScoringWeights) -> u32 {
    let mut score = 0;

    if !pipeline.triggers.is_empty() {
        score += weights.triggers;
    }

    let mut options: Vec<&str> = pipeline.options.iter().map(|o| o.name.as_str()).collect();
    options.sort_unstable();
    options.dedup();
    score += weights.per_option * u32::try_from(options.len()).unwrap_or(u32::MAX);

    let has_script = pipeline
        .post
        .walk_steps()
        .iter()
        .any(|step| matches!(step, Step::ScriptBlock { .. }));
    if has_script {
        score += weights.pipeline_script;
    }

    score
}
