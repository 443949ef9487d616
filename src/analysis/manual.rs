use std::collections::BTreeSet;
use std::fmt;

use log::warn;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::AnalysisWarning;
use crate::pipeline::{Agent, PipelineDefinition, Stage, Step};

/// Plugin steps with a direct equivalent on the target system.
pub const CONVERTIBLE_PLUGINS: [&str; 15] = [
    "junit",
    "archiveArtifacts",
    "withSonarQubeEnv",
    "waitForQualityGate",
    "dir",
    "cleanWs",
    "deleteDir",
    "stash",
    "unstash",
    "withEnv",
    "writeFile",
    "readFile",
    "sleep",
    "error",
    "mail",
];

const WORKSPACE_RESET: [&str; 2] = ["cleanWs", "deleteDir"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Priority {
    Low,
    Medium,
    High,
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Low => "Low",
            Self::Medium => "Medium",
            Self::High => "High",
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type", content = "name", rename_all = "snake_case")]
pub enum ManualScope {
    Stage(String),
    Pipeline,
}

impl fmt::Display for ManualScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Stage(name) => f.write_str(name),
            Self::Pipeline => f.write_str("Pipeline Level"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "name", rename_all = "snake_case")]
pub enum ManualCategory {
    /// Script content sharing a stage with checkout or workspace cleanup.
    ComplexScriptBlocks,
    ScriptBlocks,
    Plugin(String),
    BuildTriggers,
    OptionsBlock,
    ComplexWhen,
    PostActionScripts,
    SharedLibraries,
    CustomFunctions,
    NonCpsFunctions,
    /// Assignments to `currentBuild` fields such as `result` or `description`.
    BuildPropertyChanges,
    MatrixBuild,
    NodeAllocation,
    ArchiveOnFailure,
    StageOptions,
    Directive(String),
}

impl ManualCategory {
    pub fn label(&self) -> String {
        match self {
            Self::ComplexScriptBlocks => "Complex script blocks".to_string(),
            Self::ScriptBlocks => "Script blocks (complex)".to_string(),
            Self::Plugin(name) => format!("Jenkins-equivalent plugin: {name}"),
            Self::BuildTriggers => "Build triggers".to_string(),
            Self::OptionsBlock => "Options block".to_string(),
            Self::ComplexWhen => "When expressions (complex)".to_string(),
            Self::PostActionScripts => "Post-action script blocks".to_string(),
            Self::SharedLibraries => "Shared libraries".to_string(),
            Self::CustomFunctions => "Custom functions".to_string(),
            Self::NonCpsFunctions => "Non-CPS functions".to_string(),
            Self::BuildPropertyChanges => "Build property modifications".to_string(),
            Self::MatrixBuild => "Matrix builds".to_string(),
            Self::NodeAllocation => "Node allocation".to_string(),
            Self::ArchiveOnFailure => "Archive on failure only".to_string(),
            Self::StageOptions => "Stage options".to_string(),
            Self::Directive(name) => format!("Unsupported directive: {name}"),
        }
    }

    pub fn action_required(&self) -> &'static str {
        match self {
            Self::ComplexScriptBlocks => {
                "Split checkout and workspace cleanup from the script into separate steps"
            }
            Self::ScriptBlocks => "Break down into smaller steps or external scripts",
            Self::Plugin(name) => match name.as_str() {
                "timeout" => "Use timeout-minutes at job or step level",
                "retry" => "Use a retry action or implement retry logic in the step",
                "lock" => "Use workflow concurrency groups",
                "milestone" => "Use deployment environments and protection rules",
                "build" => "Use workflow_call or repository_dispatch events",
                "publishHTML" => "Upload the report as a workflow artifact",
                _ => "Review Jenkins documentation and implement equivalent logic",
            },
            Self::BuildTriggers => "Configure repository webhooks or use scheduled workflows",
            Self::OptionsBlock => "Set workflow-level timeouts, concurrency, and retention policies",
            Self::ComplexWhen => "Simplify to basic if conditions on the job or step",
            Self::PostActionScripts => "Move post-action logic into steps guarded by if conditions",
            Self::SharedLibraries => "Port the library steps to reusable composite actions",
            Self::CustomFunctions => "Convert helper functions to shell scripts or composite actions",
            Self::NonCpsFunctions => "Rewrite the function as a standalone script",
            Self::BuildPropertyChanges => "Report status through step outputs or the job summary",
            Self::MatrixBuild => "Use a matrix strategy on the job",
            Self::NodeAllocation => "Map the agent label to a runs-on runner label",
            Self::ArchiveOnFailure => "Upload artifacts in a step guarded by if: failure()",
            Self::StageOptions => "Move stage options to job-level timeout and concurrency settings",
            Self::Directive(_) => "Review the directive and implement equivalent workflow logic",
        }
    }
}

impl fmt::Display for ManualCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.label())
    }
}

/// A construct that needs a human rewrite.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManualItem {
    pub scope: ManualScope,
    pub category: ManualCategory,
    pub priority: Priority,
    pub description: String,
    pub action: String,
}

impl ManualItem {
    fn new(scope: ManualScope, category: ManualCategory, description: String) -> Self {
        Self {
            action: category.action_required().to_string(),
            scope,
            category,
            priority: Priority::Medium,
            description,
        }
    }
}

/// Decides which plugin steps convert without help.
#[derive(Debug, Clone)]
pub struct Classifier {
    convertible: BTreeSet<String>,
    build_property: Regex,
    archive_on_failure: Regex,
}

impl Classifier {
    pub fn new(extra_plugins: &[String]) -> Self {
        let convertible = CONVERTIBLE_PLUGINS
            .iter()
            .map(|name| (*name).to_string())
            .chain(extra_plugins.iter().cloned())
            .collect();
        Self {
            convertible,
            build_property: Regex::new(r"\bcurrentBuild\.\w+\s*=([^=]|$)").expect("valid regex"),
            archive_on_failure: Regex::new(r"\bonlyIfSuccessful\s*:\s*false\b")
                .expect("valid regex"),
        }
    }

    fn changes_build(&self, text: &str) -> bool {
        self.build_property.is_match(text)
    }

    pub fn is_convertible(&self, plugin: &str) -> bool {
        self.convertible.contains(plugin)
    }

    /// Manual items of one stage, in step order, and the warnings they raise.
    pub fn stage_items(&self, stage: &Stage) -> (Vec<ManualItem>, Vec<AnalysisWarning>) {
        let scope = ManualScope::Stage(stage.name.clone());
        let steps: Vec<&Step> = stage
            .walk_steps()
            .into_iter()
            .chain(stage.walk_post_steps())
            .collect();

        let resets_workspace = steps.iter().any(|step| match step {
            Step::Checkout { .. } => true,
            Step::PluginInvocation { name, .. } => WORKSPACE_RESET.contains(&name.as_str()),
            _ => false,
        });

        let mut items = Vec::new();
        let mut warnings = Vec::new();
        let mut changes_build = false;
        for step in steps {
            match step {
                Step::ScriptBlock { text } => {
                    let category = if resets_workspace {
                        ManualCategory::ComplexScriptBlocks
                    } else {
                        ManualCategory::ScriptBlocks
                    };
                    items.push(ManualItem::new(
                        scope.clone(),
                        category,
                        format!("Script block starting with `{}`", first_line(text)),
                    ));
                    changes_build |= self.changes_build(text);
                }
                Step::PluginInvocation { name, args, .. } if !self.is_convertible(name) => {
                    warnings.push(unknown_plugin(&stage.name, name));
                    items.push(ManualItem::new(
                        scope.clone(),
                        ManualCategory::Plugin(name.clone()),
                        format!("`{name}({args})` has no direct equivalent"),
                    ));
                }
                Step::PluginInvocation { name, args, .. }
                    if name == "archiveArtifacts" && self.archive_on_failure.is_match(args) =>
                {
                    items.push(ManualItem::new(
                        scope.clone(),
                        ManualCategory::ArchiveOnFailure,
                        format!("`archiveArtifacts({args})` also archives failed builds"),
                    ));
                }
                _ => {}
            }
        }

        if changes_build {
            items.push(ManualItem::new(
                scope.clone(),
                ManualCategory::BuildPropertyChanges,
                "Script assigns `currentBuild` fields".to_string(),
            ));
        }
        if let Some(matrix) = &stage.matrix {
            let axes: Vec<_> = matrix.axes.iter().map(|axis| axis.name.as_str()).collect();
            items.push(ManualItem::new(
                scope.clone(),
                ManualCategory::MatrixBuild,
                format!(
                    "Matrix over {} ({} combinations)",
                    axes.join(", "),
                    matrix.cells()
                ),
            ));
        }
        if let Some(Agent::Label { label }) = &stage.agent {
            items.push(ManualItem::new(
                scope.clone(),
                ManualCategory::NodeAllocation,
                format!("Stage runs on agent label `{label}`"),
            ));
        }
        if !stage.options.is_empty() {
            let names: Vec<_> = stage.options.iter().map(|o| o.name.as_str()).collect();
            items.push(ManualItem::new(
                scope.clone(),
                ManualCategory::StageOptions,
                format!("Options: {}", names.join(", ")),
            ));
        }
        for directive in &stage.unknown_directives {
            warnings.push(unknown_directive(&stage.name, directive));
            items.push(ManualItem::new(
                scope.clone(),
                ManualCategory::Directive(directive.clone()),
                format!("`{directive}` directive has no structured form"),
            ));
        }

        (items, warnings)
    }

    /// Pipeline-scope items, in a fixed category order with post actions last.
    pub fn pipeline_items(
        &self,
        pipeline: &PipelineDefinition,
    ) -> (Vec<ManualItem>, Vec<AnalysisWarning>) {
        let mut items = Vec::new();
        let mut warnings = Vec::new();

        if !pipeline.triggers.is_empty() {
            let kinds: Vec<_> = pipeline.triggers.iter().map(|t| t.kind.as_str()).collect();
            items.push(ManualItem::new(
                ManualScope::Pipeline,
                ManualCategory::BuildTriggers,
                format!("Triggers: {}", kinds.join(", ")),
            ));
        }

        if !pipeline.options.is_empty() {
            let names: Vec<_> = pipeline.options.iter().map(|o| o.name.as_str()).collect();
            items.push(ManualItem::new(
                ManualScope::Pipeline,
                ManualCategory::OptionsBlock,
                format!("Options: {}", names.join(", ")),
            ));
        }

        let complex_when: Vec<_> = pipeline
            .flattened_stages()
            .into_iter()
            .filter(|stage| stage.when.as_ref().is_some_and(|w| w.is_complex()))
            .map(|stage| stage.name.as_str())
            .collect();
        if !complex_when.is_empty() {
            items.push(ManualItem::new(
                ManualScope::Pipeline,
                ManualCategory::ComplexWhen,
                format!("Nested or multi-parameter conditions in: {}", complex_when.join(", ")),
            ));
        }

        if !pipeline.libraries.is_empty() {
            items.push(ManualItem::new(
                ManualScope::Pipeline,
                ManualCategory::SharedLibraries,
                format!("Libraries: {}", pipeline.libraries.join(", ")),
            ));
        }
        if !pipeline.helpers.is_empty() {
            let names: Vec<_> = pipeline.helpers.iter().map(|h| h.name.as_str()).collect();
            items.push(ManualItem::new(
                ManualScope::Pipeline,
                ManualCategory::CustomFunctions,
                format!("Functions: {}", names.join(", ")),
            ));
        }
        let non_cps: Vec<_> = pipeline
            .helpers
            .iter()
            .filter(|h| h.non_cps)
            .map(|h| h.name.as_str())
            .collect();
        if !non_cps.is_empty() {
            items.push(ManualItem::new(
                ManualScope::Pipeline,
                ManualCategory::NonCpsFunctions,
                format!("@NonCPS functions: {}", non_cps.join(", ")),
            ));
        }
        let changes_build = pipeline.helpers.iter().any(|h| self.changes_build(&h.text))
            || pipeline.post.walk_steps().iter().any(
                |step| matches!(step, Step::ScriptBlock { text } if self.changes_build(text)),
            );
        if changes_build {
            items.push(ManualItem::new(
                ManualScope::Pipeline,
                ManualCategory::BuildPropertyChanges,
                "Helper functions or pipeline post actions assign `currentBuild` fields"
                    .to_string(),
            ));
        }
        for directive in &pipeline.unknown_directives {
            warnings.push(unknown_directive("pipeline", directive));
            items.push(ManualItem::new(
                ManualScope::Pipeline,
                ManualCategory::Directive(directive.clone()),
                format!("`{directive}` directive has no structured form"),
            ));
        }

        for (condition, steps) in &pipeline.post.0 {
            for step in steps.iter().flat_map(Step::walk) {
                match step {
                    Step::ScriptBlock { text } => items.push(ManualItem::new(
                        ManualScope::Pipeline,
                        ManualCategory::PostActionScripts,
                        format!("`post {{ {condition} }}` script starting with `{}`", first_line(text)),
                    )),
                    Step::PluginInvocation { name, args, .. } if !self.is_convertible(name) => {
                        warnings.push(unknown_plugin("pipeline post actions", name));
                        items.push(ManualItem::new(
                            ManualScope::Pipeline,
                            ManualCategory::Plugin(name.clone()),
                            format!("`{name}({args})` in `post {{ {condition} }}` has no direct equivalent"),
                        ));
                    }
                    _ => {}
                }
            }
        }

        (items, warnings)
    }
}

fn unknown_plugin(scope: &str, plugin: &str) -> AnalysisWarning {
    let warning = AnalysisWarning::UnknownPlugin {
        scope: scope.to_string(),
        plugin: plugin.to_string(),
    };
    warn!("{warning}");
    warning
}

fn unknown_directive(scope: &str, directive: &str) -> AnalysisWarning {
    let warning = AnalysisWarning::UnknownDirective {
        scope: scope.to_string(),
        directive: directive.to_string(),
    };
    warn!("{warning}");
    warning
}

impl Default for Classifier {
    fn default() -> Self {
        Self::new(&[])
    }
}

fn first_line(text: &str) -> String {
    let line = text.lines().map(str::trim).find(|l| !l.is_empty()).unwrap_or("");
    if line.chars().count() > 60 {
        format!("{}...", line.chars().take(57).collect::<String>())
    } else {
        line.to_string()
    }
}
