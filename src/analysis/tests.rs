use super::*;
use crate::pipeline::{Agent, Step};

const STOREFRONT: &str = include_str!("../../fixtures/storefront.groovy");
const PLATFORM: &str = include_str!("../../fixtures/platform.groovy");

fn storefront() -> AnalysisResult {
    Analyzer::default()
        .analyze_source("storefront", STOREFRONT)
        .unwrap()
}

fn platform() -> AnalysisResult {
    Analyzer::default()
        .analyze_source("platform", PLATFORM)
        .unwrap()
}

fn shell(text: &str) -> Step {
    Step::ShellCommand {
        text: text.to_string(),
    }
}

fn single_stage_pipeline(stage: Stage) -> PipelineDefinition {
    let mut pipeline = PipelineDefinition::new("single");
    pipeline.stages = vec![stage];
    pipeline
}

fn scores(result: &AnalysisResult) -> Vec<(&str, u32)> {
    result
        .stages
        .iter()
        .map(|stage| (stage.name.as_str(), stage.score))
        .collect()
}

#[test]
fn test_storefront_is_medium_with_high_feasibility() {
    let result = storefront();

    assert_eq!(result.stage_count(), 10);
    assert_eq!(result.pipeline_additions, 0);
    assert_eq!(result.score, 54);
    assert_eq!(result.band, ComplexityBand::Medium);
    assert_eq!(result.manual_items.len(), 2);
    assert_eq!(result.feasibility, Feasibility::High);
}

#[test]
fn test_storefront_stage_scores() {
    let result = storefront();
    assert_eq!(
        scores(&result),
        vec![
            ("Checkout", 4),
            ("Build", 1),
            ("Unit Tests", 1),
            ("Static Code Analysis (SonarQube)", 6),
            ("Quality Gate", 6),
            ("Integration Tests", 1),
            ("Docker Build & Push", 17),
            ("Deploy to Staging", 16),
            ("Approval", 1),
            ("Archive", 1),
        ]
    );
}

#[test]
fn test_storefront_tags_and_status() {
    let result = storefront();
    let stage = |name: &str| result.stages.iter().find(|s| s.name == name).unwrap();

    assert!(stage("Build").has(FeatureTag::Basic));
    assert!(stage("Unit Tests").has(FeatureTag::PostActions));
    assert!(stage("Quality Gate").has(FeatureTag::SonarQube));
    assert_eq!(
        stage("Docker Build & Push").technology().as_deref(),
        Some("Docker")
    );
    assert_eq!(
        stage("Deploy to Staging").technology().as_deref(),
        Some("K8s")
    );
    assert_eq!(stage("Archive").technology(), None);

    assert_eq!(stage("Checkout").status, StageStatus::Manual);
    assert_eq!(stage("Quality Gate").status, StageStatus::Manual);
    assert_eq!(stage("Build").status, StageStatus::Ready);

    assert_eq!(result.approval_gate_count(), 1);
    assert_eq!(
        stage("Approval").approval_environment.as_deref(),
        Some("approval-approval")
    );
    assert_eq!(stage("Unit Tests").post_conditions, vec![PostCondition::Always]);
}

#[test]
fn test_storefront_manual_items_and_warnings() {
    let result = storefront();

    let categories: Vec<_> = result
        .manual_items
        .iter()
        .map(|item| (item.scope.to_string(), item.category.clone()))
        .collect();
    assert_eq!(
        categories,
        vec![
            ("Checkout".to_string(), ManualCategory::ComplexScriptBlocks),
            (
                "Quality Gate".to_string(),
                ManualCategory::Plugin("timeout".to_string())
            ),
        ]
    );
    assert_eq!(
        result.manual_items[1].action,
        "Use timeout-minutes at job or step level"
    );
    assert_eq!(result.pipeline_manual_items().count(), 0);

    assert_eq!(
        result.warnings,
        vec![AnalysisWarning::UnknownPlugin {
            scope: "Quality Gate".to_string(),
            plugin: "timeout".to_string(),
        }]
    );
}

#[test]
fn test_storefront_secrets() {
    let result = storefront();
    let names: Vec<_> = result.secrets.iter().map(|s| s.name.as_str()).collect();
    assert_eq!(
        names,
        vec!["DOCKER_REGISTRY_PASSWORD", "DOCKER_REGISTRY_USERNAME"]
    );
    for secret in &result.secrets {
        assert_eq!(secret.original_id, "docker-registry");
        assert_eq!(secret.purpose, "Docker registry authentication");
        assert_eq!(secret.required_for, vec!["Docker Build & Push"]);
        assert!(!secret.collision);
    }
    assert_eq!(result.secrets[0].secret_type, SecretType::Password);
    assert_eq!(result.secrets[1].secret_type, SecretType::Username);
}

#[test]
fn test_platform_is_very_high_with_low_feasibility() {
    let result = platform();

    assert_eq!(
        scores(&result),
        vec![("Build Images", 27), ("Quality", 17), ("Deploy", 38)]
    );
    // triggers 4 + nine distinct options at 4 each
    assert_eq!(result.pipeline_additions, 40);
    assert_eq!(result.score, 122);
    assert_eq!(result.band, ComplexityBand::VeryHigh);
    assert_eq!(result.feasibility, Feasibility::Low);
}

#[test]
fn test_platform_manual_items() {
    let result = platform();

    let stage_items: Vec<_> = result
        .manual_items
        .iter()
        .filter(|item| item.scope != ManualScope::Pipeline)
        .map(|item| (item.scope.to_string(), item.category.clone()))
        .collect();
    assert_eq!(
        stage_items,
        vec![
            ("Build Images".to_string(), ManualCategory::ScriptBlocks),
            ("Quality".to_string(), ManualCategory::ScriptBlocks),
            (
                "Quality".to_string(),
                ManualCategory::Plugin("timeout".to_string())
            ),
            ("Deploy".to_string(), ManualCategory::ScriptBlocks),
        ]
    );

    let pipeline_items: Vec<_> = result.pipeline_manual_items().collect();
    let categories: Vec<_> = pipeline_items.iter().map(|item| &item.category).collect();
    assert_eq!(
        categories,
        vec![
            &ManualCategory::BuildTriggers,
            &ManualCategory::OptionsBlock,
            &ManualCategory::ComplexWhen,
        ]
    );
    assert_eq!(pipeline_items[0].description, "Triggers: cron, pollSCM");
    assert!(pipeline_items[2].description.ends_with("Build Images, Quality"));
    assert!(result
        .manual_items
        .iter()
        .all(|item| item.priority == Priority::Medium));
}

#[test]
fn test_platform_secrets() {
    let result = platform();

    let summary: Vec<_> = result
        .secrets
        .iter()
        .map(|s| (s.name.as_str(), s.secret_type, s.purpose.as_str()))
        .collect();
    assert_eq!(
        summary,
        vec![
            ("PROD_KUBECONFIG", SecretType::File, "Kubernetes cluster access"),
            (
                "REGISTRY_CREDS_PASSWORD",
                SecretType::Password,
                "Docker registry authentication"
            ),
            (
                "REGISTRY_CREDS_USERNAME",
                SecretType::Username,
                "Docker registry authentication"
            ),
        ]
    );
    assert_eq!(result.secrets[0].required_for, vec!["Deploy"]);
}

#[test]
fn test_platform_tags() {
    let result = platform();
    let tags: Vec<_> = result.stages.iter().map(|s| s.tags.clone()).collect();
    assert_eq!(
        tags,
        vec![
            BTreeSet::from([FeatureTag::Docker]),
            BTreeSet::from([FeatureTag::SonarQube, FeatureTag::SecurityScan]),
            BTreeSet::from([
                FeatureTag::Docker,
                FeatureTag::Kubernetes,
                FeatureTag::PostActions,
                FeatureTag::ApprovalGate,
            ]),
        ]
    );
    assert_eq!(result.stages_with(FeatureTag::Docker).count(), 2);
}

#[test]
fn test_analysis_is_deterministic() {
    assert_eq!(storefront(), storefront());
    assert_eq!(
        serde_json::to_string(&platform()).unwrap(),
        serde_json::to_string(&platform()).unwrap()
    );
}

#[test]
fn test_docker_build_and_push_never_lowers_score() {
    let analyzer = Analyzer::default();
    let mut stage = Stage::new("Package");
    stage.steps = vec![shell("mvn -B package")];
    let before = analyzer.analyze(single_stage_pipeline(stage.clone()));

    stage.steps.push(shell("docker build -t acme/app ."));
    stage.steps.push(shell("docker push acme/app"));
    let after = analyzer.analyze(single_stage_pipeline(stage));

    assert!(after.score >= before.score + 16);
}

#[test]
fn test_adding_docker_stage_never_lowers_score() {
    let analyzer = Analyzer::default();
    let before = storefront();
    let mut pipeline = before.pipeline.clone();

    let mut stage = Stage::new("Publish Image");
    stage.steps = vec![
        shell("docker build -t acme/storefront ."),
        shell("docker push acme/storefront"),
    ];
    pipeline.stages.push(stage);
    let after = analyzer.analyze(pipeline);

    assert_eq!(after.stage_count(), before.stage_count() + 1);
    assert!(after.score >= before.score + 16);
}

#[test]
fn test_adding_script_block_never_lowers_manual_count() {
    let analyzer = Analyzer::default();
    let mut result = storefront();
    let mut pipeline = result.pipeline.clone();
    let before = result.manual_items.len();

    for index in 0..pipeline.stages.len() {
        pipeline.stages[index].steps.push(Step::ScriptBlock {
            text: "echo done".to_string(),
        });
        result = analyzer.analyze(pipeline.clone());
        assert!(result.manual_items.len() >= before);
    }
    assert_eq!(result.manual_items.len(), before + 10);
}

#[test]
fn test_weights_and_plugins_come_from_config() {
    let mut config = Config::default();
    config.scoring.kubernetes = 30;
    config.analysis.convertible_plugins = vec!["timeout".to_string()];

    let result = Analyzer::from_config(&config)
        .analyze_source("storefront", STOREFRONT)
        .unwrap();

    assert_eq!(result.score, 54 + 15);
    assert_eq!(result.manual_items.len(), 1);
    assert!(result.warnings.is_empty());
}

#[test]
fn test_stage_slugs() {
    assert_eq!(
        slugify("Static Code Analysis (SonarQube)"),
        "static-code-analysis-(sonarqube)"
    );
    assert_eq!(slugify("Docker Build & Push"), "docker-build-push");
    assert_eq!(slugify("Build/Test"), "build-test");
    assert_eq!(slugify("  Deploy  "), "deploy");

    let result = storefront();
    assert_eq!(result.stages[6].slug, "docker-build-push");
}

#[test]
fn test_nested_stages_are_flattened_with_parent() {
    let text = r"
pipeline {
    agent any
    stages {
        stage('Checks') {
            parallel {
                stage('Lint') {
                    steps { sh 'npm run lint' }
                }
                stage('Scan') {
                    steps { sh 'snyk test' }
                }
            }
        }
    }
}
";
    let result = Analyzer::default().analyze_source("nested", text).unwrap();
    let names: Vec<_> = result
        .stages
        .iter()
        .map(|s| (s.name.as_str(), s.parent.as_deref()))
        .collect();
    assert_eq!(
        names,
        vec![
            ("Checks", None),
            ("Lint", Some("Checks")),
            ("Scan", Some("Checks")),
        ]
    );
    assert!(result.stages[2].has(FeatureTag::SecurityScan));
}

#[test]
fn test_extraction_errors_propagate() {
    let err = Analyzer::default()
        .analyze_source("broken", "pipeline {\n  agent any\n")
        .unwrap_err();
    assert!(matches!(err, crate::error::PipelensError::StructuralParse { .. }));
}

#[test]
fn test_plugin_and_script_credentials_reach_the_catalog() {
    let text = r"
pipeline {
    agent any
    stages {
        stage('Deploy') {
            steps {
                withKubeConfig([credentialsId: 'kube-prod']) {
                    sh 'kubectl apply -f k8s/'
                }
            }
        }
        stage('Push') {
            steps {
                withDockerRegistry([credentialsId: 'dockerhub', url: '']) {
                    sh 'docker push acme/app'
                }
            }
        }
        stage('Publish') {
            steps {
                script {
                    withCredentials([string(credentialsId: 'npm-token', variable: 'T')]) {
                        sh 'npm publish'
                    }
                }
            }
        }
    }
}
";
    let result = Analyzer::default().analyze_source("creds", text).unwrap();
    let secrets: Vec<_> = result
        .secrets
        .iter()
        .map(|s| (s.name.as_str(), s.required_for.join(",")))
        .collect();
    assert_eq!(
        secrets,
        vec![
            ("DOCKERHUB", "Push".to_string()),
            ("KUBE_PROD", "Deploy".to_string()),
            ("NPM_TOKEN", "Publish".to_string()),
        ]
    );
}

#[test]
fn test_secret_purpose_follows_any_using_stage() {
    let text = r"
pipeline {
    agent any
    stages {
        stage('Build') {
            steps {
                withCredentials([string(credentialsId: 'reg-secret', variable: 'R')]) {
                    sh 'make'
                }
            }
        }
        stage('Push') {
            steps {
                withCredentials([string(credentialsId: 'reg-secret', variable: 'R')]) {
                    sh 'docker push acme/app'
                }
            }
        }
    }
}
";
    let result = Analyzer::default().analyze_source("purpose", text).unwrap();
    assert_eq!(result.secrets.len(), 1);
    assert_eq!(result.secrets[0].required_for, vec!["Build", "Push"]);
    assert_eq!(result.secrets[0].purpose, "Docker registry authentication");
}

#[test]
fn test_matrix_and_stage_directives_are_reported() {
    let text = r"
pipeline {
    agent any
    stages {
        stage('Test') {
            agent { label 'linux-large' }
            options { timeout(time: 30, unit: 'MINUTES') }
            matrix {
                axes {
                    axis {
                        name 'JDK'
                        values '11', '17'
                    }
                }
                stages {
                    stage('Unit') {
                        steps { sh 'mvn -B test' }
                    }
                }
            }
            customDirective { foo 'bar' }
        }
    }
}
";
    let result = Analyzer::default().analyze_source("matrix", text).unwrap();
    let names: Vec<_> = result
        .stages
        .iter()
        .map(|s| (s.name.as_str(), s.parent.as_deref()))
        .collect();
    assert_eq!(names, vec![("Test", None), ("Unit", Some("Test"))]);
    assert!(matches!(result.pipeline.stages[0].agent, Some(Agent::Label { .. })));

    let labels: Vec<_> = result
        .manual_items
        .iter()
        .map(|item| item.category.to_string())
        .collect();
    for expected in [
        "Matrix builds",
        "Node allocation",
        "Stage options",
        "Unsupported directive: customDirective",
    ] {
        assert!(labels.iter().any(|l| l == expected), "missing {expected}");
    }
    assert!(result.warnings.contains(&crate::error::AnalysisWarning::UnknownDirective {
        scope: "Test".to_string(),
        directive: "customDirective".to_string(),
    }));
}
