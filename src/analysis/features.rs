use std::collections::BTreeSet;
use std::fmt;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::pipeline::{Stage, Step};

/// Capability labels attached to a stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum FeatureTag {
    Docker,
    Kubernetes,
    SonarQube,
    SecurityScan,
    PostActions,
    ApprovalGate,
    Basic,
}

impl FeatureTag {
    pub fn label(self) -> &'static str {
        match self {
            Self::Docker => "Docker",
            Self::Kubernetes => "K8s",
            Self::SonarQube => "SonarQube",
            Self::SecurityScan => "Security Scan",
            Self::PostActions => "Post-Actions",
            Self::ApprovalGate => "Approval",
            Self::Basic => "Basic",
        }
    }

    /// Tags that name a technology rather than a pipeline construct.
    pub fn is_technology(self) -> bool {
        matches!(
            self,
            Self::Docker | Self::Kubernetes | Self::SonarQube | Self::SecurityScan
        )
    }
}

impl fmt::Display for FeatureTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Detected tags plus the detail the scorer needs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StageFeatures {
    pub tags: BTreeSet<FeatureTag>,
    /// The stage pushes an image, not only builds one.
    pub docker_push: bool,
}

impl StageFeatures {
    pub fn has(&self, tag: FeatureTag) -> bool {
        self.tags.contains(&tag)
    }
}

struct Patterns {
    docker: Regex,
    docker_push: Regex,
    kubernetes: Regex,
    sonarqube: Regex,
    security: Regex,
}

impl Patterns {
    fn new() -> Self {
        let compile = |pattern: &str| Regex::new(pattern).expect("valid regex");
        Self {
            docker: compile(
                r"\bdocker(?:\s+(?:image\s+)?(?:build|push|login|tag)\b|\s+buildx\b|\.build\s*\(|\.withregistry\b)|\bbuildx\b|\bkaniko\b",
            ),
            docker_push: compile(r"\bdocker\s+(?:image\s+)?push\b|\.push\s*\(|\bdocker\.withregistry\b"),
            kubernetes: compile(r"\b(?:kubectl|helm|kustomize)\b|\bwithkubeconfig\b|\bkubernetesdeploy\b"),
            sonarqube: compile(
                r"withsonarqubeenv|waitforqualitygate|sonar-scanner|sonar:sonar|\bsonarqube\b|\bsonarscanner\b",
            ),
            security: compile(
                r"\b(?:trivy|grype|snyk|semgrep|bandit|gitleaks|checkov|owasp|dependency-?check|zap-(?:baseline|full-scan|api-scan))",
            ),
        }
    }
}

/// Step text that carries tool invocations. Checkout URLs and credential ids
/// are names, not commands.
fn command_text(step: &Step) -> Option<String> {
    match step {
        Step::ShellCommand { .. } | Step::ScriptBlock { .. } | Step::PluginInvocation { .. } => {
            Some(step.searchable_text().to_lowercase())
        }
        _ => None,
    }
}

/// Tags a stage from its own steps; nested child stages are tagged separately.
pub fn detect(stage: &Stage) -> StageFeatures {
    let patterns = Patterns::new();
    let mut tags = BTreeSet::new();
    let mut docker_push = false;

    let steps = stage.walk_steps();
    for step in &steps {
        if matches!(step, Step::ApprovalGate { .. }) {
            tags.insert(FeatureTag::ApprovalGate);
        }
        let Some(text) = command_text(step) else {
            continue;
        };
        if patterns.docker.is_match(&text) {
            tags.insert(FeatureTag::Docker);
            docker_push |= patterns.docker_push.is_match(&text);
        }
        if patterns.kubernetes.is_match(&text) {
            tags.insert(FeatureTag::Kubernetes);
        }
        if patterns.sonarqube.is_match(&text) {
            tags.insert(FeatureTag::SonarQube);
        }
        if patterns.security.is_match(&text) {
            tags.insert(FeatureTag::SecurityScan);
        }
    }

    if !stage.post.is_empty() {
        tags.insert(FeatureTag::PostActions);
    }
    if tags.is_empty() {
        tags.insert(FeatureTag::Basic);
    }

    StageFeatures { tags, docker_push }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::PostCondition;

    fn shell(text: &str) -> Step {
        Step::ShellCommand {
            text: text.to_string(),
        }
    }

    fn stage_with(steps: Vec<Step>) -> Stage {
        let mut stage = Stage::new("Stage");
        stage.steps = steps;
        stage
    }

    #[test]
    fn test_plain_stage_is_basic() {
        let features = detect(&stage_with(vec![shell("mvn -B package")]));
        assert_eq!(features.tags, BTreeSet::from([FeatureTag::Basic]));
    }

    #[test]
    fn test_docker_build_and_push() {
        let build_only = detect(&stage_with(vec![shell("docker build -t acme/app:1 .")]));
        assert!(build_only.has(FeatureTag::Docker));
        assert!(!build_only.docker_push);

        let pushed = detect(&stage_with(vec![
            shell("docker build -t acme/app:1 ."),
            shell("docker push acme/app:1"),
        ]));
        assert!(pushed.docker_push);
    }

    #[test]
    fn test_groovy_docker_api_inside_script() {
        let features = detect(&stage_with(vec![Step::ScriptBlock {
            text: "def img = docker.build(\"acme/app\")\ndocker.withRegistry('https://registry', 'creds') {\n  img.push()\n}".to_string(),
        }]));
        assert!(features.has(FeatureTag::Docker));
        assert!(features.docker_push);
    }

    #[test]
    fn test_docker_mentioned_in_image_name_is_not_docker() {
        let features = detect(&stage_with(vec![shell("echo docker-compose.yml is ignored")]));
        assert!(!features.has(FeatureTag::Docker));
    }

    #[test]
    fn test_tools_inside_block_plugins() {
        let features = detect(&stage_with(vec![Step::PluginInvocation {
            name: "withSonarQubeEnv".to_string(),
            args: "'sonar'".to_string(),
            body: vec![
                shell("mvn sonar:sonar"),
                shell("trivy fs --exit-code 1 ."),
                shell("helm upgrade --install app ./chart"),
            ],
        }]));
        assert_eq!(
            features.tags,
            BTreeSet::from([
                FeatureTag::Kubernetes,
                FeatureTag::SonarQube,
                FeatureTag::SecurityScan
            ])
        );
    }

    #[test]
    fn test_post_and_approval_tags() {
        let mut stage = stage_with(vec![Step::ApprovalGate {
            message: "Deploy?".to_string(),
            ok_label: "Yes".to_string(),
            parameters: vec![],
        }]);
        stage
            .post
            .0
            .insert(PostCondition::Always, vec![shell("docker push acme/app")]);

        let features = detect(&stage);
        assert_eq!(
            features.tags,
            BTreeSet::from([FeatureTag::PostActions, FeatureTag::ApprovalGate])
        );
    }

    #[test]
    fn test_detection_is_idempotent() {
        let stage = stage_with(vec![shell("kubectl apply -f k8s/"), shell("snyk test")]);
        assert_eq!(detect(&stage), detect(&stage));
    }
}
