//! Pipeline- and stage-level directives other than `stages` and `steps`.

use indexmap::IndexMap;
use log::debug;
use regex::Regex;

use super::scanner::{
    line_of, named_raw, named_value, quoted_strings, split_statements, unquote, Body, Statement,
};
use super::steps::parse_steps;
use crate::error::{PipelensError, Result};
use crate::pipeline::{
    Agent, EnvBinding, EnvValue, Parameter, ParameterKind, PipelineOption, PostActions,
    PostCondition, Trigger,
};

fn unquoted_or_raw(args: &str) -> String {
    unquote(args).unwrap_or_else(|| args.to_string())
}

/// `agent any`, `agent none`, `agent { label '...' }`, `agent { docker { ... } }`.
pub fn parse_agent(statement: &Statement<'_>) -> Agent {
    match (statement.args, statement.body) {
        ("any", None) => Agent::Any,
        ("none", None) => Agent::None,
        (_, Some(body)) => {
            let inner = split_statements(body.text, body.offset);
            let Some(first) = inner.first() else {
                return Agent::Any;
            };
            match (first.keyword, first.body) {
                ("docker", Some(docker)) => {
                    let directives = split_statements(docker.text, docker.offset);
                    let value = |key: &str| {
                        directives
                            .iter()
                            .find(|d| d.keyword == key)
                            .map(|d| unquoted_or_raw(d.args))
                    };
                    Agent::Docker {
                        image: value("image").unwrap_or_default(),
                        args: value("args"),
                    }
                }
                ("docker", None) => Agent::Docker {
                    image: named_value(first.args, "image")
                        .unwrap_or_else(|| unquoted_or_raw(first.args)),
                    args: named_value(first.args, "args"),
                },
                ("label", _) => Agent::Label {
                    label: unquoted_or_raw(first.args),
                },
                ("node", Some(node)) => {
                    let label = split_statements(node.text, node.offset)
                        .iter()
                        .find(|d| d.keyword == "label")
                        .map(|d| unquoted_or_raw(d.args))
                        .unwrap_or_default();
                    Agent::Label { label }
                }
                _ => Agent::Label {
                    label: body.text.trim().to_string(),
                },
            }
        }
        (args, None) => Agent::Label {
            label: unquoted_or_raw(args),
        },
    }
}

pub fn parse_options(body: Body<'_>) -> Vec<PipelineOption> {
    split_statements(body.text, body.offset)
        .iter()
        .map(|statement| PipelineOption {
            name: statement.keyword.to_string(),
            arguments: statement.args.to_string(),
        })
        .collect()
}

pub fn parse_triggers(body: Body<'_>) -> Vec<Trigger> {
    split_statements(body.text, body.offset)
        .iter()
        .map(|statement| Trigger {
            kind: statement.keyword.to_string(),
            spec: unquoted_or_raw(statement.args),
        })
        .collect()
}

/// Reads `parameters {}`. A declaration without `name:` fails validation.
pub fn parse_parameters(source: &str, body: Body<'_>) -> Result<Vec<Parameter>> {
    let choices_re = Regex::new(r"\bchoices\s*:\s*\[([^\]]*)\]").expect("valid regex");

    split_statements(body.text, body.offset)
        .iter()
        .map(|statement| {
            let args = statement.args;
            let name = named_value(args, "name").ok_or_else(|| {
                PipelensError::Validation(format!(
                    "parameter `{}` on line {} has no name",
                    statement.keyword,
                    line_of(source, statement.offset)
                ))
            })?;

            let kind = match statement.keyword {
                "string" => ParameterKind::String,
                "text" => ParameterKind::Text,
                "password" => ParameterKind::Password,
                "booleanParam" => ParameterKind::Boolean,
                "choice" => {
                    let choices = match choices_re.captures(args) {
                        Some(caps) => quoted_strings(&caps[1]),
                        None => named_value(args, "choices")
                            .map(|list| list.lines().map(|l| l.trim().to_string()).collect())
                            .unwrap_or_default(),
                    };
                    ParameterKind::Choice { choices }
                }
                other => {
                    debug!("Treating parameter type `{other}` of `{name}` as string");
                    ParameterKind::String
                }
            };

            let default = match &kind {
                ParameterKind::Choice { choices } => choices.first().cloned().unwrap_or_default(),
                _ => named_value(args, "defaultValue")
                    .or_else(|| named_raw(args, "defaultValue"))
                    .unwrap_or_default(),
            };

            Ok(Parameter {
                name,
                kind,
                default,
                description: named_value(args, "description").unwrap_or_default(),
            })
        })
        .collect()
}

/// `NAME = 'value'` and `NAME = credentials('id')` bindings.
pub fn parse_environment(body: Body<'_>) -> Vec<EnvBinding> {
    let assignment = Regex::new(r"(?s)^([A-Za-z_][A-Za-z0-9_]*)\s*=\s*(.+)$").expect("valid regex");
    let credential =
        Regex::new(r#"^credentials\s*\(\s*['"]([^'"]+)['"]\s*\)$"#).expect("valid regex");

    split_statements(body.text, body.offset)
        .iter()
        .filter_map(|statement| {
            let Some(caps) = assignment.captures(statement.text) else {
                debug!("Skipping environment entry `{}`", statement.text);
                return None;
            };
            let raw = caps[2].trim();
            let value = match credential.captures(raw) {
                Some(id) => EnvValue::Credential(id[1].to_string()),
                None => EnvValue::Literal(unquoted_or_raw(raw)),
            };
            Some(EnvBinding {
                name: caps[1].to_string(),
                value,
            })
        })
        .collect()
}

pub fn parse_tools(body: Body<'_>) -> IndexMap<String, String> {
    split_statements(body.text, body.offset)
        .iter()
        .map(|statement| {
            (
                statement.keyword.to_string(),
                unquoted_or_raw(statement.args),
            )
        })
        .collect()
}

/// Post conditions in declaration order; unknown condition names are skipped.
pub fn parse_post(body: Body<'_>) -> PostActions {
    let mut actions = PostActions::default();
    for statement in split_statements(body.text, body.offset) {
        let Some(condition) = PostCondition::ALL
            .into_iter()
            .find(|c| c.keyword() == statement.keyword)
        else {
            debug!("Skipping unknown post condition `{}`", statement.keyword);
            continue;
        };
        let steps = statement.body.map(parse_steps).unwrap_or_default();
        actions.0.entry(condition).or_default().extend(steps);
    }
    actions
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::Step;

    fn body(text: &str) -> Body<'_> {
        Body { text, offset: 0 }
    }

    fn agent_of(text: &str) -> Agent {
        let statements = split_statements(text, 0);
        parse_agent(&statements[0])
    }

    #[test]
    fn test_agent_forms() {
        assert_eq!(agent_of("agent any"), Agent::Any);
        assert_eq!(agent_of("agent none"), Agent::None);
        assert_eq!(
            agent_of("agent { label 'linux && docker' }"),
            Agent::Label {
                label: "linux && docker".to_string()
            }
        );
        assert_eq!(
            agent_of("agent {\n  docker {\n    image 'maven:3.9-eclipse-temurin-17'\n    args '-v $HOME/.m2:/root/.m2'\n  }\n}"),
            Agent::Docker {
                image: "maven:3.9-eclipse-temurin-17".to_string(),
                args: Some("-v $HOME/.m2:/root/.m2".to_string()),
            }
        );
    }

    #[test]
    fn test_options_and_triggers() {
        let options = parse_options(body(
            "buildDiscarder(logRotator(numToKeepStr: '10'))\ntimeout(time: 1, unit: 'HOURS')\ntimestamps()",
        ));
        let names: Vec<_> = options.iter().map(|o| o.name.as_str()).collect();
        assert_eq!(names, vec!["buildDiscarder", "timeout", "timestamps"]);
        assert_eq!(options[0].arguments, "logRotator(numToKeepStr: '10')");

        let triggers = parse_triggers(body("cron('H 2 * * 1-5')\npollSCM 'H/15 * * * *'"));
        assert_eq!(
            triggers,
            vec![
                Trigger {
                    kind: "cron".to_string(),
                    spec: "H 2 * * 1-5".to_string()
                },
                Trigger {
                    kind: "pollSCM".to_string(),
                    spec: "H/15 * * * *".to_string()
                },
            ]
        );
    }

    #[test]
    fn test_parameters() {
        let text = "choice(name: 'ENV', choices: ['dev', 'staging', 'prod'], description: 'Target')\nbooleanParam(name: 'SKIP_TESTS', defaultValue: false)\nstring(name: 'TAG', defaultValue: 'latest')";
        let params = parse_parameters(text, body(text)).unwrap();
        assert_eq!(params.len(), 3);
        assert_eq!(
            params[0].kind,
            ParameterKind::Choice {
                choices: vec!["dev".to_string(), "staging".to_string(), "prod".to_string()]
            }
        );
        assert_eq!(params[0].default, "dev");
        assert_eq!(params[0].description, "Target");
        assert_eq!(params[1].kind, ParameterKind::Boolean);
        assert_eq!(params[1].default, "false");
        assert_eq!(params[2].default, "latest");
    }

    #[test]
    fn test_parameter_without_name_is_rejected() {
        let text = "string(name: 'A')\nstring(defaultValue: 'x')";
        let err = parse_parameters(text, body(text)).unwrap_err();
        assert!(matches!(err, PipelensError::Validation(_)));
        assert!(err.to_string().contains("line 2"));
    }

    #[test]
    fn test_environment_bindings() {
        let env = parse_environment(body(
            "REGISTRY = 'registry.acme.io'\nDOCKER_CREDS = credentials('docker-hub')\nBUILD_TAG = \"${env.BUILD_NUMBER}\"",
        ));
        assert_eq!(env.len(), 3);
        assert_eq!(env[0].value, EnvValue::Literal("registry.acme.io".to_string()));
        assert_eq!(env[1].value, EnvValue::Credential("docker-hub".to_string()));
        assert_eq!(env[2].value, EnvValue::Literal("${env.BUILD_NUMBER}".to_string()));
    }

    #[test]
    fn test_post_conditions_keep_order() {
        let post = parse_post(body(
            "failure { mail to: 'team@acme.io', subject: 'Failed' }\nalways { junit 'target/*.xml' }\nbogus { sh 'x' }",
        ));
        let conditions: Vec<_> = post.conditions().collect();
        assert_eq!(conditions, vec![PostCondition::Failure, PostCondition::Always]);
        assert!(matches!(
            post.walk_steps()[1],
            Step::PluginInvocation { name, .. } if name == "junit"
        ));
    }

    #[test]
    fn test_tools() {
        let tools = parse_tools(body("maven 'Maven 3.9'\njdk 'temurin-17'"));
        assert_eq!(tools.get("maven").map(String::as_str), Some("Maven 3.9"));
        assert_eq!(tools.len(), 2);
    }
}
