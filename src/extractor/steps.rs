use log::debug;
use regex::Regex;

use super::scanner::{
    first_string_arg, named_value, quoted_strings, split_statements, unquote, Body, Statement,
};
use crate::pipeline::{BoundCredential, CredentialKind, Step};

const SHELL_STEPS: [&str; 4] = ["sh", "bat", "powershell", "pwsh"];

/// Groovy control flow never maps onto a declarative step.
const CONTROL_KEYWORDS: [&str; 10] = [
    "if", "else", "for", "while", "try", "switch", "def", "return", "catch", "parallel",
];

/// Parses the statements of a `steps {}` (or post condition) body.
pub fn parse_steps(body: Body<'_>) -> Vec<Step> {
    split_statements(body.text, body.offset)
        .iter()
        .map(classify)
        .collect()
}

fn script_fallback(statement: &Statement<'_>) -> Step {
    debug!(
        "No step form matches `{}`, keeping it as a script block",
        statement.keyword
    );
    Step::ScriptBlock {
        text: statement.text.trim().to_string(),
    }
}

fn is_identifier(keyword: &str) -> bool {
    !keyword.is_empty()
        && keyword
            .chars()
            .next()
            .is_some_and(|c| c.is_ascii_alphabetic() || c == '_')
        && keyword
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// Maps one statement onto the closest known step form.
fn classify(statement: &Statement<'_>) -> Step {
    let keyword = statement.keyword;
    let args = statement.args;

    if !is_identifier(keyword)
        || CONTROL_KEYWORDS.contains(&keyword)
        || args.starts_with('=')
    {
        return script_fallback(statement);
    }

    match keyword {
        "script" => match statement.body {
            Some(body) => Step::ScriptBlock {
                text: body.text.trim().to_string(),
            },
            None => script_fallback(statement),
        },
        shell if SHELL_STEPS.contains(&shell) && statement.body.is_none() => {
            match unquote(args).or_else(|| named_value(args, "script")) {
                Some(text) => Step::ShellCommand { text: text.trim().to_string() },
                None => script_fallback(statement),
            }
        }
        "echo" if statement.body.is_none() => Step::ShellCommand {
            text: format!("echo {}", unquote(args).unwrap_or_else(|| args.to_string())),
        },
        "checkout" | "git" if statement.body.is_none() => parse_checkout(keyword, args),
        "input" => parse_input(args, statement.body),
        "withCredentials" => match statement.body {
            Some(body) => Step::CredentialBinding {
                credentials: parse_bindings(args),
                body: parse_steps(body),
            },
            None => script_fallback(statement),
        },
        "sshagent" => match statement.body {
            Some(body) => Step::CredentialBinding {
                credentials: quoted_strings(args)
                    .into_iter()
                    .map(|id| BoundCredential {
                        id,
                        kind: CredentialKind::SshUserPrivateKey,
                        variables: vec![],
                    })
                    .collect(),
                body: parse_steps(body),
            },
            None => script_fallback(statement),
        },
        _ => Step::PluginInvocation {
            name: keyword.to_string(),
            args: args.to_string(),
            body: statement.body.map(parse_steps).unwrap_or_default(),
        },
    }
}

fn parse_checkout(keyword: &str, args: &str) -> Step {
    let url = named_value(args, "url").or_else(|| {
        if keyword == "git" {
            first_string_arg(args)
        } else {
            None
        }
    });
    Step::Checkout {
        url,
        branch: named_value(args, "branch").or_else(|| named_value(args, "name")),
        credentials_id: named_value(args, "credentialsId"),
    }
}

/// `input message: '...', ok: '...'` as a step, or the stage-level `input {}` directive.
pub fn parse_input(args: &str, body: Option<Body<'_>>) -> Step {
    let source = body.map_or(args, |b| b.text);

    let directive = |key: &str| {
        let pattern = format!(r#"\b{key}\s+(?:'([^']*)'|"([^"]*)")"#);
        Regex::new(&pattern)
            .expect("valid regex")
            .captures(source)
            .and_then(|caps| caps.get(1).or_else(|| caps.get(2)))
            .map(|m| m.as_str().to_string())
    };

    let message = named_value(source, "message")
        .or_else(|| directive("message"))
        .or_else(|| first_string_arg(args))
        .unwrap_or_else(|| "Approval required".to_string());
    let ok_label = named_value(source, "ok")
        .or_else(|| directive("ok"))
        .unwrap_or_else(|| "Proceed".to_string());

    let param_re = Regex::new(r#"\b(?:string|choice|booleanParam|text|password)\s*\(\s*name\s*:\s*['"]([^'"]+)['"]"#)
        .expect("valid regex");
    let parameters = param_re
        .captures_iter(source)
        .map(|caps| caps[1].to_string())
        .collect();

    Step::ApprovalGate {
        message,
        ok_label,
        parameters,
    }
}

/// Credentials referenced in free text such as plugin arguments or script blocks.
///
/// Typed `withCredentials` bindings keep their kind. Bare `credentialsId:`,
/// `credentials('...')` and `withRegistry(url, id)` references are generic.
pub fn credential_references(text: &str) -> Vec<BoundCredential> {
    let re = Regex::new(
        r#"\bcredentialsId\s*:\s*['"]([^'"]+)['"]|\bcredentials\s*\(\s*['"]([^'"]+)['"]\s*\)|\bwithRegistry\s*\(\s*['"][^'"]*['"]\s*,\s*['"]([^'"]+)['"]|\bsshagent\s*\(\s*(?:credentials\s*:\s*)?\[\s*['"]([^'"]+)['"]"#,
    )
    .expect("valid regex");

    let mut found = parse_bindings(text);
    for caps in re.captures_iter(text) {
        let generic = caps.get(1).or_else(|| caps.get(2)).or_else(|| caps.get(3));
        let (id, kind) = match (generic, caps.get(4)) {
            (Some(id), _) => (id.as_str(), CredentialKind::Generic),
            (None, Some(id)) => (id.as_str(), CredentialKind::SshUserPrivateKey),
            (None, None) => continue,
        };
        if !found.iter().any(|c| c.id == id) {
            found.push(BoundCredential {
                id: id.to_string(),
                kind,
                variables: vec![],
            });
        }
    }
    found
}

/// Reads the binding list of `withCredentials([...])`.
fn parse_bindings(args: &str) -> Vec<BoundCredential> {
    let re = Regex::new(
        r"\b(usernamePassword|usernameColonPassword|string|file|sshUserPrivateKey|certificate)\s*\(([^)]*)\)",
    )
    .expect("valid regex");

    re.captures_iter(args)
        .filter_map(|caps| {
            let inner = caps.get(2).map_or("", |m| m.as_str());
            let Some(id) = named_value(inner, "credentialsId") else {
                debug!("Credential binding without credentialsId: {}", &caps[0]);
                return None;
            };
            let (kind, variable_keys): (CredentialKind, &[&str]) = match &caps[1] {
                "usernamePassword" => (
                    CredentialKind::UsernamePassword,
                    &["usernameVariable", "passwordVariable"][..],
                ),
                "usernameColonPassword" => (CredentialKind::UsernameColonPassword, &["variable"][..]),
                "string" => (CredentialKind::String, &["variable"][..]),
                "file" => (CredentialKind::File, &["variable"][..]),
                "sshUserPrivateKey" => (
                    CredentialKind::SshUserPrivateKey,
                    &["keyFileVariable", "usernameVariable", "passphraseVariable"][..],
                ),
                _ => (
                    CredentialKind::Certificate,
                    &["keystoreVariable", "passwordVariable", "aliasVariable"][..],
                ),
            };
            let variables = variable_keys
                .iter()
                .filter_map(|key| named_value(inner, key))
                .collect();
            Some(BoundCredential {
                id,
                kind,
                variables,
            })
        })
        .collect()
}
