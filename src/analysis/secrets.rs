//! Secret catalog: every credential the pipeline binds, as target-system secrets.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use log::warn;
use serde::{Deserialize, Serialize};

use super::features::FeatureTag;
use crate::error::AnalysisWarning;
use crate::extractor::credential_references;
use crate::pipeline::{CredentialKind, EnvValue, PipelineDefinition, Stage, Step};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum SecretType {
    Password,
    Token,
    Username,
    File,
    Url,
    Credential,
}

impl fmt::Display for SecretType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Password => "Password",
            Self::Token => "Token",
            Self::Username => "Username",
            Self::File => "File",
            Self::Url => "URL",
            Self::Credential => "Credential",
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SecretRequirement {
    pub name: String,
    pub original_id: String,
    pub purpose: String,
    /// Stages using the secret; empty when only the global environment binds it.
    pub required_for: Vec<String>,
    pub secret_type: SecretType,
    /// Another credential id normalizes to the same name.
    pub collision: bool,
}

/// Upper-snake secret name for a credential id.
pub fn normalize_name(id: &str) -> String {
    let mut name = String::with_capacity(id.len());
    for c in id.chars() {
        if c.is_ascii_alphanumeric() {
            name.push(c.to_ascii_uppercase());
        } else if !name.ends_with('_') {
            name.push('_');
        }
    }
    let name = name.trim_matches('_');
    if name.is_empty() {
        "SECRET".to_string()
    } else {
        name.to_string()
    }
}

fn type_from_id(id: &str) -> SecretType {
    let id = id.to_lowercase();
    if ["token", "api", "key"].iter().any(|k| id.contains(k)) {
        SecretType::Token
    } else if id.contains("password") || id.contains("pwd") {
        SecretType::Password
    } else if id.contains("user") {
        SecretType::Username
    } else if id.contains("kubeconfig") {
        SecretType::File
    } else if id.contains("url") || id.contains("host") {
        SecretType::Url
    } else {
        SecretType::Credential
    }
}

fn purpose_of(id: &str, tags: &BTreeSet<FeatureTag>) -> String {
    const BY_ID: [(&[&str], &str); 6] = [
        (&["docker"], "Docker registry authentication"),
        (&["kube", "k8s"], "Kubernetes cluster access"),
        (&["sonar"], "SonarQube server authentication"),
        (&["git"], "Git repository access"),
        (&["aws"], "AWS service authentication"),
        (&["ssh"], "SSH server access"),
    ];
    const BY_TAG: [(FeatureTag, &str); 3] = [
        (FeatureTag::Kubernetes, "Kubernetes cluster access"),
        (FeatureTag::Docker, "Docker registry authentication"),
        (FeatureTag::SonarQube, "SonarQube server authentication"),
    ];

    let lower = id.to_lowercase();
    BY_ID
        .iter()
        .find(|(keywords, _)| keywords.iter().any(|k| lower.contains(k)))
        .map(|(_, purpose)| *purpose)
        .or_else(|| {
            BY_TAG
                .iter()
                .find(|(tag, _)| tags.contains(tag))
                .map(|(_, purpose)| *purpose)
        })
        .map_or_else(|| format!("Authentication for {id}"), str::to_string)
}

/// Secret names and types one binding expands to.
fn expand(id: &str, kind: CredentialKind) -> Vec<(String, SecretType)> {
    let name = normalize_name(id);
    match kind {
        CredentialKind::UsernamePassword => vec![
            (format!("{name}_USERNAME"), SecretType::Username),
            (format!("{name}_PASSWORD"), SecretType::Password),
        ],
        CredentialKind::UsernameColonPassword => vec![(name, SecretType::Password)],
        CredentialKind::String => vec![(name, SecretType::Token)],
        CredentialKind::File | CredentialKind::SshUserPrivateKey | CredentialKind::Certificate => {
            vec![(name, SecretType::File)]
        }
        CredentialKind::Generic => vec![(name, type_from_id(id))],
    }
}

struct Usage<'a> {
    id: String,
    kind: CredentialKind,
    stage: Option<&'a str>,
}

fn stage_usages<'a>(stage: &'a Stage, out: &mut Vec<Usage<'a>>) {
    let name = Some(stage.name.as_str());
    let mut push = |id: &str, kind: CredentialKind| {
        out.push(Usage {
            id: id.to_string(),
            kind,
            stage: name,
        })
    };

    for binding in &stage.environment {
        if let EnvValue::Credential(id) = &binding.value {
            push(id, CredentialKind::Generic);
        }
    }
    for step in stage.walk_steps().into_iter().chain(stage.walk_post_steps()) {
        match step {
            Step::CredentialBinding { credentials, .. } => {
                for credential in credentials {
                    push(&credential.id, credential.kind);
                }
            }
            Step::Checkout {
                credentials_id: Some(id),
                ..
            } => push(id, CredentialKind::Generic),
            Step::PluginInvocation { args: text, .. } | Step::ScriptBlock { text } => {
                for credential in credential_references(text) {
                    push(&credential.id, credential.kind);
                }
            }
            _ => {}
        }
    }
}

/// Builds the catalog, sorted by name then original id.
///
/// `stages` pairs each flattened stage with its feature tags.
pub fn extract(
    pipeline: &PipelineDefinition,
    stages: &[(&Stage, &BTreeSet<FeatureTag>)],
) -> (Vec<SecretRequirement>, Vec<AnalysisWarning>) {
    let mut usages = Vec::new();

    for binding in &pipeline.environment {
        if let EnvValue::Credential(id) = &binding.value {
            usages.push(Usage {
                id: id.clone(),
                kind: CredentialKind::Generic,
                stage: None,
            });
        }
    }
    for (stage, _) in stages {
        stage_usages(stage, &mut usages);
    }

    let mut catalog: Vec<SecretRequirement> = Vec::new();
    for usage in &usages {
        for (name, secret_type) in expand(&usage.id, usage.kind) {
            let existing = catalog
                .iter_mut()
                .find(|s| s.name == name && s.original_id == usage.id);
            match existing {
                Some(secret) => {
                    if let Some(stage) = usage.stage {
                        if !secret.required_for.iter().any(|s| s == stage) {
                            secret.required_for.push(stage.to_string());
                        }
                    }
                }
                None => catalog.push(SecretRequirement {
                    name,
                    original_id: usage.id.clone(),
                    purpose: String::new(),
                    required_for: usage.stage.map(str::to_string).into_iter().collect(),
                    secret_type,
                    collision: false,
                }),
            }
        }
    }

    // Purpose looks at every stage using the secret, so stage order never matters.
    for secret in &mut catalog {
        let tags: BTreeSet<FeatureTag> = secret
            .required_for
            .iter()
            .filter_map(|name| stages.iter().find(|(s, _)| s.name == *name))
            .flat_map(|(_, tags)| tags.iter().copied())
            .collect();
        secret.purpose = purpose_of(&secret.original_id, &tags);
    }

    let mut ids_by_name: BTreeMap<&str, BTreeSet<&str>> = BTreeMap::new();
    for secret in &catalog {
        ids_by_name
            .entry(secret.name.as_str())
            .or_default()
            .insert(secret.original_id.as_str());
    }
    let warnings: Vec<AnalysisWarning> = ids_by_name
        .into_iter()
        .filter(|(_, ids)| ids.len() > 1)
        .map(|(name, ids)| {
            let warning = AnalysisWarning::AmbiguousSecret {
                name: name.to_string(),
                identifiers: ids.into_iter().map(str::to_string).collect(),
            };
            warn!("{warning}");
            warning
        })
        .collect();

    for secret in &mut catalog {
        secret.collision = warnings.iter().any(
            |w| matches!(w, AnalysisWarning::AmbiguousSecret { name, .. } if *name == secret.name),
        );
    }
    catalog.sort_by(|a, b| {
        a.name
            .cmp(&b.name)
            .then_with(|| a.original_id.cmp(&b.original_id))
    });

    (catalog, warnings)
}
