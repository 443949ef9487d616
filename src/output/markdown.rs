use std::fmt::Write;

use chrono::{DateTime, Utc};

use super::{headline, NEXT_STEPS, TIMESTAMP_FORMAT};
use crate::analysis::{
    AnalysisResult, ComplexityBand, Feasibility, FeatureTag, ManualScope, Priority, StageStatus,
};
use crate::pipeline::Agent;

/// Stage scores below this go into the "simple stages" roadmap phase.
const SIMPLE_STAGE_SCORE: u32 = 10;
const ROADMAP_LISTED: usize = 5;

fn escape_cell(text: &str) -> String {
    text.replace('|', "\\|").replace('\n', " ")
}

fn add_section_header(output: &mut String, emoji: &str, title: &str) {
    let _ = writeln!(output, "## {emoji} {title}\n");
}

fn status_label(status: StageStatus) -> &'static str {
    match status {
        StageStatus::Ready => "✅ Ready",
        StageStatus::Manual => "⚠️ Manual",
    }
}

fn priority_badge(priority: Priority) -> &'static str {
    match priority {
        Priority::High => "🔴",
        Priority::Medium => "🟡",
        Priority::Low => "🟢",
    }
}

fn add_title(
    output: &mut String,
    title: &str,
    result: &AnalysisResult,
    generated_at: DateTime<Utc>,
) {
    let _ = writeln!(output, "# 🚀 {title}: {}\n", result.pipeline.name);
    let _ = writeln!(
        output,
        "**Generated:** {}  \n**Pipeline Complexity:** {} ({} points)  \n**Conversion Feasibility:** {}  \n",
        generated_at.format(TIMESTAMP_FORMAT),
        result.band,
        result.score,
        result.feasibility
    );
}

/// Concise summary: headline figures, one line per stage and the next steps.
pub fn render_summary_markdown(result: &AnalysisResult, generated_at: DateTime<Utc>) -> String {
    let mut output = String::new();
    add_title(&mut output, "Conversion Summary", result, generated_at);

    add_section_header(&mut output, "📈", "Quick Statistics");
    output.push_str("| Metric | Value |\n|--------|-------|\n");
    for (label, value) in headline(result) {
        let _ = writeln!(output, "| {label} | **{value}** |");
    }
    output.push('\n');

    add_section_header(&mut output, "📋", "Stages");
    for stage in &result.stages {
        let technology = stage
            .technology()
            .map(|tech| format!(" ({tech})"))
            .unwrap_or_default();
        let _ = writeln!(
            output,
            "- **{}**{technology}: {}",
            stage.name,
            status_label(stage.status)
        );
    }
    output.push('\n');

    add_section_header(&mut output, "🎯", "Next Steps");
    for (idx, step) in NEXT_STEPS.iter().enumerate() {
        let _ = writeln!(output, "{}. {step}", idx + 1);
    }

    output
}

/// Full breakdown written as `CONVERSION_REPORT.md`.
pub fn render_detailed(result: &AnalysisResult, generated_at: DateTime<Utc>) -> String {
    let mut output = String::new();
    add_title(&mut output, "Jenkins Conversion Report", result, generated_at);

    add_status_badges(&mut output, result);
    add_statistics(&mut output, result);
    add_pipeline_configuration(&mut output, result);
    add_secrets(&mut output, result);
    add_setup_requirements(&mut output, result);
    add_stage_details(&mut output, result);
    add_manual_items(&mut output, result);
    add_post_actions(&mut output, result);
    add_approval_environments(&mut output, result);
    add_warnings(&mut output, result);
    add_roadmap(&mut output, result);
    add_file_structure(&mut output, result);
    add_checklist(&mut output, result);

    output
}

fn add_status_badges(output: &mut String, result: &AnalysisResult) {
    let manual_stages = result
        .stages
        .iter()
        .filter(|s| s.status == StageStatus::Manual)
        .count();
    let feasibility_color = match result.feasibility {
        Feasibility::High => "green",
        Feasibility::Medium => "yellow",
        Feasibility::Low => "red",
    };
    let band_color = match result.band {
        ComplexityBand::Low => "green",
        ComplexityBand::Medium => "yellow",
        ComplexityBand::High => "orange",
        ComplexityBand::VeryHigh => "red",
    };

    add_section_header(output, "📊", "Conversion Status Overview");
    let _ = writeln!(
        output,
        "![Stages](https://img.shields.io/badge/Stages-{}-blue) \
         ![Manual Required](https://img.shields.io/badge/Manual_Required-{manual_stages}-orange) \
         ![Feasibility](https://img.shields.io/badge/Feasibility-{}-{feasibility_color}) \
         ![Complexity](https://img.shields.io/badge/Complexity-{}-{band_color})\n",
        result.stage_count(),
        result.feasibility,
        result.band.label().replace(' ', "_"),
    );
}

fn add_statistics(output: &mut String, result: &AnalysisResult) {
    let count = |tag| result.stages_with(tag).count();

    add_section_header(output, "📈", "Quick Statistics");
    output.push_str("| Metric | Value |\n|--------|-------|\n");
    for (label, value) in headline(result) {
        let _ = writeln!(output, "| {label} | **{value}** |");
    }
    let extra = [
        ("Docker Operations", count(FeatureTag::Docker)),
        ("Kubernetes Stages", count(FeatureTag::Kubernetes)),
        ("SonarQube Integration", count(FeatureTag::SonarQube)),
        ("Security Scans", count(FeatureTag::SecurityScan)),
        ("Post-Action Handling", count(FeatureTag::PostActions)),
        (
            "Stages Needing Manual Work",
            result
                .stages
                .iter()
                .filter(|s| s.status == StageStatus::Manual)
                .count(),
        ),
    ];
    for (label, value) in extra {
        let _ = writeln!(output, "| {label} | {value} |");
    }
    let _ = writeln!(
        output,
        "| Pipeline-Level Score | {} |\n",
        result.pipeline_additions
    );
}

fn add_pipeline_configuration(output: &mut String, result: &AnalysisResult) {
    let pipeline = &result.pipeline;
    add_section_header(output, "⚙️", "Pipeline Configuration");

    let agent = match &pipeline.agent {
        None => "not declared".to_string(),
        Some(Agent::Any) => "any".to_string(),
        Some(Agent::None) => "none (per-stage agents)".to_string(),
        Some(Agent::Label { label }) => format!("label `{label}`"),
        Some(Agent::Docker { image, .. }) => format!("docker image `{image}`"),
    };
    let _ = writeln!(output, "- **Agent:** {agent}");

    if !pipeline.triggers.is_empty() {
        let triggers: Vec<_> = pipeline
            .triggers
            .iter()
            .map(|t| format!("`{}('{}')`", t.kind, t.spec))
            .collect();
        let _ = writeln!(output, "- **Triggers:** {}", triggers.join(", "));
    }
    if !pipeline.options.is_empty() {
        let options: Vec<_> = pipeline
            .options
            .iter()
            .map(|o| format!("`{}`", o.name))
            .collect();
        let _ = writeln!(output, "- **Options:** {}", options.join(", "));
    }
    output.push('\n');

    if !pipeline.parameters.is_empty() {
        output.push_str("| Parameter | Type | Default | Description |\n");
        output.push_str("|-----------|------|---------|-------------|\n");
        for parameter in &pipeline.parameters {
            let _ = writeln!(
                output,
                "| `{}` | {} | {} | {} |",
                parameter.name,
                parameter.kind.label(),
                escape_cell(&parameter.default),
                escape_cell(&parameter.description)
            );
        }
        output.push('\n');
    }
}

fn add_secrets(output: &mut String, result: &AnalysisResult) {
    add_section_header(output, "🔐", "Required Secrets Configuration");
    if result.secrets.is_empty() {
        output.push_str("*No credentials referenced*\n\n");
        return;
    }

    output.push_str("| Secret Name | Purpose | Required For | Type |\n");
    output.push_str("|-------------|---------|--------------|------|\n");
    for secret in &result.secrets {
        let flag = if secret.collision { " ⚠️" } else { "" };
        let required_for = if secret.required_for.is_empty() {
            "All stages (global)".to_string()
        } else {
            secret.required_for.join(", ")
        };
        let _ = writeln!(
            output,
            "| `{}`{flag} | {} | {} | {} |",
            secret.name,
            escape_cell(&secret.purpose),
            escape_cell(&required_for),
            secret.secret_type
        );
    }
    output.push('\n');
}

fn add_setup_requirements(output: &mut String, result: &AnalysisResult) {
    const REQUIREMENTS: [(FeatureTag, &str, [&str; 3]); 4] = [
        (
            FeatureTag::SonarQube,
            "SonarQube Integration",
            [
                "Store the SonarQube server URL and token as secrets",
                "Set up the project key and quality gate",
                "Replace `waitForQualityGate` with a quality gate check step",
            ],
        ),
        (
            FeatureTag::Docker,
            "Docker Registry Setup",
            [
                "Configure registry credentials as secrets",
                "Grant the workflow push permission on the registry",
                "Consider the repository's own container registry",
            ],
        ),
        (
            FeatureTag::Kubernetes,
            "Kubernetes Configuration",
            [
                "Store the kubeconfig as a secret",
                "Allow cluster access from the workflow runners",
                "Review RBAC permissions for the deploy identity",
            ],
        ),
        (
            FeatureTag::ApprovalGate,
            "Environment Protection Rules",
            [
                "Create the approval environments listed below",
                "Add required reviewers to each environment",
                "Move environment-specific secrets into the environment",
            ],
        ),
    ];

    add_section_header(output, "🔧", "Additional Setup Requirements");
    let mut any = false;
    for (tag, title, steps) in REQUIREMENTS {
        if result.stages_with(tag).next().is_none() {
            continue;
        }
        any = true;
        let _ = writeln!(output, "### {title}");
        for step in steps {
            let _ = writeln!(output, "- {step}");
        }
        output.push('\n');
    }
    if !any {
        output.push_str("*No additional setup required*\n\n");
    }
}

fn stage_level(score: u32) -> &'static str {
    if score < SIMPLE_STAGE_SCORE {
        "Low"
    } else if score < 25 {
        "Medium"
    } else {
        "High"
    }
}

fn add_stage_details(output: &mut String, result: &AnalysisResult) {
    add_section_header(output, "📋", "Stage Conversion Details");
    output.push_str("| Stage | Complexity | Features | Manual Items | Status |\n");
    output.push_str("|-------|------------|----------|--------------|--------|\n");
    for stage in &result.stages {
        let features: Vec<_> = stage.tags.iter().map(|tag| tag.label()).collect();
        let manual = match stage.manual_items {
            0 => "None".to_string(),
            1 => "1 item".to_string(),
            n => format!("{n} items"),
        };
        let name = match &stage.parent {
            Some(parent) => format!("{} ↳ {}", escape_cell(parent), escape_cell(&stage.name)),
            None => escape_cell(&stage.name),
        };
        let _ = writeln!(
            output,
            "| {name} | {} ({}) | {} | {manual} | {} |",
            stage_level(stage.score),
            stage.score,
            features.join(", "),
            status_label(stage.status)
        );
    }
    output.push('\n');
}

fn add_manual_items(output: &mut String, result: &AnalysisResult) {
    add_section_header(output, "🔧", "Manual Conversion Required");
    if result.manual_items.is_empty() {
        output.push_str("*No manual conversion required*\n\n");
        return;
    }

    let mut items: Vec<_> = result.manual_items.iter().collect();
    items.sort_by(|a, b| b.priority.cmp(&a.priority));

    output.push_str("| Priority | Stage | Item | Action Required |\n");
    output.push_str("|----------|-------|------|-----------------|\n");
    for item in items {
        let _ = writeln!(
            output,
            "| {} {} | {} | {}: {} | {} |",
            priority_badge(item.priority),
            item.priority,
            escape_cell(&item.scope.to_string()),
            item.category,
            escape_cell(&item.description),
            escape_cell(&item.action)
        );
    }
    output.push('\n');
}

fn add_post_actions(output: &mut String, result: &AnalysisResult) {
    let mut rows = Vec::new();
    for stage in &result.stages {
        for condition in &stage.post_conditions {
            rows.push((stage.name.as_str(), *condition));
        }
    }
    for condition in result.pipeline.post.conditions() {
        rows.push(("Pipeline Level", condition));
    }
    if rows.is_empty() {
        return;
    }

    add_section_header(output, "📤", "Post-Action Handling");
    output.push_str("| Stage | Post Condition | Target Equivalent |\n");
    output.push_str("|-------|----------------|-------------------|\n");
    for (stage, condition) in rows {
        let _ = writeln!(
            output,
            "| {} | `{condition}` | `{}` |",
            escape_cell(stage),
            escape_cell(condition.target_condition())
        );
    }
    output.push('\n');
}

fn add_approval_environments(output: &mut String, result: &AnalysisResult) {
    let gates: Vec<_> = result
        .stages
        .iter()
        .filter_map(|s| s.approval_environment.as_deref().map(|env| (env, s)))
        .collect();
    if gates.is_empty() {
        return;
    }

    add_section_header(output, "🚦", "Manual Approval Gates");
    output.push_str("| Environment Name | Stage | Configuration Steps |\n");
    output.push_str("|------------------|-------|---------------------|\n");
    for (env, stage) in gates {
        let _ = writeln!(
            output,
            "| `{env}` | {} | Go to Settings → Environments → Create environment → Add required reviewers |",
            escape_cell(&stage.name)
        );
    }
    output.push('\n');
}

fn add_warnings(output: &mut String, result: &AnalysisResult) {
    if result.warnings.is_empty() {
        return;
    }
    add_section_header(output, "⚠️", "Warnings");
    for warning in &result.warnings {
        let _ = writeln!(output, "- {warning}");
    }
    output.push('\n');
}

fn add_listed_stages(output: &mut String, lines: impl ExactSizeIterator<Item = String>) {
    let total = lines.len();
    for line in lines.take(ROADMAP_LISTED) {
        let _ = writeln!(output, "- {line}");
    }
    if total > ROADMAP_LISTED {
        let _ = writeln!(output, "- ... and {} more", total - ROADMAP_LISTED);
    }
    output.push('\n');
}

fn add_roadmap(output: &mut String, result: &AnalysisResult) {
    add_section_header(output, "🗺️", "Implementation Roadmap");
    output.push_str(
        "### Phase 1: Initial Setup 🔧\n\
         1. Configure repository secrets and environments\n\
         2. Set up external service integrations\n\
         3. Create the main workflow file (`.github/workflows/ci.yml`)\n\n",
    );

    let (simple, complex): (Vec<_>, Vec<_>) = result
        .stages
        .iter()
        .partition(|stage| stage.score < SIMPLE_STAGE_SCORE);

    if !simple.is_empty() {
        let _ = writeln!(
            output,
            "### Phase 2: Simple Stages ✅\n*{} stages with basic functionality*\n",
            simple.len()
        );
        add_listed_stages(output, simple.iter().map(|s| s.name.clone()));
    }
    if !complex.is_empty() {
        let _ = writeln!(
            output,
            "### Phase 3: Complex Stages ⚠️\n*{} stages requiring additional attention*\n",
            complex.len()
        );
        add_listed_stages(
            output,
            complex.iter().map(|s| match s.manual_items {
                0 => s.name.clone(),
                n => format!("{} ({n} manual items)", s.name),
            }),
        );
    }

    output.push_str(
        "### Phase 4: Testing & Validation 🧪\n\
         1. Run the workflow against sample commits\n\
         2. Validate secrets and environment configuration\n\
         3. Exercise approval gates and post-action handling\n\
         4. Compare results with the Jenkins pipeline\n\n\
         ### Phase 5: Production Deployment 🚀\n\
         1. Migrate from Jenkins gradually\n\
         2. Monitor workflow reliability\n\
         3. Walk the team through the new workflow\n\
         4. Decommission the Jenkins job once stable\n\n",
    );
}

fn add_file_structure(output: &mut String, result: &AnalysisResult) {
    add_section_header(output, "📁", "Generated Files Structure");
    output.push_str("```\n.github/\n├── workflows/\n│   └── ci.yml\n└── actions/\n");
    let last = result.stages.len().saturating_sub(1);
    for (idx, stage) in result.stages.iter().enumerate() {
        let (branch, indent) = if idx == last {
            ("└──", "    ")
        } else {
            ("├──", "│   ")
        };
        let _ = writeln!(output, "    {branch} {}/", stage.slug);
        let _ = writeln!(output, "    {indent}└── action.yml");
    }
    output.push_str("\nCONVERSION_REPORT.md\n```\n\n");
}

fn add_checklist(output: &mut String, result: &AnalysisResult) {
    add_section_header(output, "✅", "Next Steps Checklist");
    let _ = writeln!(
        output,
        "### Repository Setup\n\
         - [ ] Review the generated workflow file (`.github/workflows/ci.yml`)\n\
         - [ ] Set up {} required secrets (see table above)",
        result.secrets.len()
    );
    let conditional = [
        (FeatureTag::SonarQube, "Configure SonarQube integration"),
        (FeatureTag::Docker, "Set up Docker registry authentication"),
        (FeatureTag::Kubernetes, "Configure Kubernetes cluster access"),
        (
            FeatureTag::ApprovalGate,
            "Create approval environments with required reviewers",
        ),
    ];
    for (tag, line) in conditional {
        if result.stages_with(tag).next().is_some() {
            let _ = writeln!(output, "- [ ] {line}");
        }
    }
    output.push('\n');

    if !result.manual_items.is_empty() {
        let pipeline_level = result
            .manual_items
            .iter()
            .filter(|item| item.scope == ManualScope::Pipeline)
            .count();
        let _ = writeln!(
            output,
            "### Manual Conversion Tasks\n\
             - [ ] Address {} manual conversion items ({pipeline_level} at pipeline level)\n\
             - [ ] Test complex script blocks and plugin replacements\n",
            result.manual_items.len()
        );
    }

    output.push_str(
        "### Testing & Validation\n\
         - [ ] Trigger the workflow on a test branch\n\
         - [ ] Verify every secret resolves\n\
         - [ ] Validate artifact uploads and post-action handling\n",
    );
}
