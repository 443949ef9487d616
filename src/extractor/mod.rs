//! Pipeline Model Extractor: declarative Jenkinsfile text to [`PipelineDefinition`].
//!
//! Extraction matches balanced blocks instead of parsing Groovy. Only
//! unbalanced nesting, a missing `pipeline`/`stages` block, over-deep stage
//! nesting, duplicate stage names and unnamed parameters are errors; anything
//! else that does not fit a known step form survives as a script block.

mod scanner;
mod sections;
mod steps;
mod when;

pub use steps::credential_references;

use std::collections::HashSet;

use log::debug;

use crate::error::{PipelensError, Result};
use crate::pipeline::{HelperFunction, Matrix, MatrixAxis, PipelineDefinition, Stage};
use scanner::{
    blank_comments, check_balance, first_string_arg, line_of, quoted_strings, split_statements,
    Body,
};

/// Extracts the pipeline named `name` from Jenkinsfile source text.
pub fn extract(name: &str, text: &str) -> Result<PipelineDefinition> {
    let source = blank_comments(text);
    check_balance(&source)?;

    let mut definition = PipelineDefinition::new(name);
    let mut body = None;
    let mut non_cps = false;

    for statement in split_statements(&source, 0) {
        match (statement.keyword, statement.body) {
            ("pipeline", Some(pipeline)) => body = Some(pipeline),
            ("@Library", _) => definition.libraries.extend(quoted_strings(statement.args)),
            ("library", _) => {
                definition.libraries.extend(quoted_strings(statement.args).into_iter().next());
            }
            ("@NonCPS", None) => non_cps = true,
            ("def" | "@NonCPS", Some(_)) => {
                let signature = if statement.keyword == "def" {
                    statement.args
                } else {
                    statement.args.strip_prefix("def").unwrap_or(statement.args).trim()
                };
                if let Some(helper) = helper_name(signature) {
                    debug!("Found helper function `{helper}`");
                    definition.helpers.push(HelperFunction {
                        name: helper,
                        non_cps: non_cps || statement.keyword == "@NonCPS",
                        text: statement.text.to_string(),
                    });
                }
                non_cps = false;
            }
            (other, _) => debug!(
                "Ignoring top-level statement `{other}` on line {}",
                line_of(&source, statement.offset)
            ),
        }
    }

    let body = body
        .ok_or_else(|| PipelensError::structural("no `pipeline { ... }` block found", 1))?;
    let mut found_stages = false;

    for section in split_statements(body.text, body.offset) {
        let line = line_of(&source, section.offset);
        match (section.keyword, section.body) {
            ("agent", _) => definition.agent = Some(sections::parse_agent(&section)),
            ("stages", Some(stages)) => {
                definition.stages = parse_stages(&source, stages, false)?;
                found_stages = true;
            }
            ("options", Some(options)) => definition.options = sections::parse_options(options),
            ("triggers", Some(triggers)) => {
                definition.triggers = sections::parse_triggers(triggers)
            }
            ("parameters", Some(parameters)) => {
                definition.parameters = sections::parse_parameters(&source, parameters)?
            }
            ("environment", Some(environment)) => {
                definition.environment = sections::parse_environment(environment)
            }
            ("post", Some(post)) => definition.post = sections::parse_post(post),
            ("tools", Some(tools)) => definition.tools = sections::parse_tools(tools),
            ("libraries", Some(libraries)) => {
                definition.libraries.extend(quoted_strings(libraries.text));
            }
            (
                "stages" | "options" | "triggers" | "parameters" | "environment" | "post",
                None,
            ) => {
                return Err(PipelensError::structural(
                    format!("`{}` section has no block", section.keyword),
                    line,
                ))
            }
            (other, _) => {
                debug!("Unsupported pipeline directive `{other}` on line {line}");
                definition.unknown_directives.push(other.to_string());
            }
        }
    }

    if !found_stages {
        return Err(PipelensError::structural(
            "pipeline has no `stages` block",
            line_of(&source, body.offset),
        ));
    }

    let mut seen = HashSet::new();
    for stage in definition.flattened_stages() {
        if !seen.insert(stage.name.as_str()) {
            return Err(PipelensError::Validation(format!(
                "duplicate stage name `{}`",
                stage.name
            )));
        }
    }

    debug!(
        "Extracted pipeline `{}` with {} top-level stages",
        definition.name,
        definition.stages.len()
    );
    Ok(definition)
}

/// Stages listed in a `stages {}` or `parallel {}` block.
fn parse_stages(source: &str, body: Body<'_>, nested: bool) -> Result<Vec<Stage>> {
    let mut stages = Vec::new();

    for statement in split_statements(body.text, body.offset) {
        let line = line_of(source, statement.offset);
        match (statement.keyword, statement.body) {
            ("stage", Some(stage_body)) => {
                let name = first_string_arg(statement.args).ok_or_else(|| {
                    PipelensError::structural("stage without a quoted name", line)
                })?;
                debug!("Found stage `{name}` on line {line}");
                stages.push(parse_stage(source, name, stage_body, nested)?);
            }
            ("stage", None) => {
                return Err(PipelensError::structural("stage has no block", line));
            }
            ("failFast", _) => {}
            (other, _) => {
                return Err(PipelensError::structural(
                    format!("expected `stage`, found `{other}`"),
                    line,
                ))
            }
        }
    }

    Ok(stages)
}

fn parse_stage(source: &str, name: String, body: Body<'_>, nested: bool) -> Result<Stage> {
    let mut stage = Stage::new(name);
    let mut gate = None;

    for section in split_statements(body.text, body.offset) {
        let line = line_of(source, section.offset);
        match (section.keyword, section.body) {
            ("steps", Some(steps)) => stage.steps = steps::parse_steps(steps),
            ("when", Some(when)) => stage.when = when::parse_when(when),
            ("post", Some(post)) => stage.post = sections::parse_post(post),
            ("tools", Some(tools)) => stage.tools = sections::parse_tools(tools),
            ("environment", Some(environment)) => {
                stage.environment = sections::parse_environment(environment)
            }
            ("agent", _) => stage.agent = Some(sections::parse_agent(&section)),
            ("input", input) => gate = Some(steps::parse_input(section.args, input)),
            ("options", Some(options)) => stage.options = sections::parse_options(options),
            ("parallel" | "stages" | "matrix", Some(children)) => {
                if nested {
                    return Err(PipelensError::structural(
                        format!(
                            "stage `{}` nests stages more than one level deep",
                            stage.name
                        ),
                        line,
                    ));
                }
                if section.keyword == "matrix" {
                    let (matrix, cells) = parse_matrix(source, children)?;
                    stage.matrix = Some(matrix);
                    stage.children = cells;
                } else {
                    stage.children = parse_stages(source, children, true)?;
                }
            }
            ("failFast", None) => {}
            (other, _) => {
                debug!(
                    "Unsupported directive `{other}` in stage `{}` on line {line}",
                    stage.name
                );
                stage.unknown_directives.push(other.to_string());
            }
        }
    }

    // The input directive runs before the stage's steps.
    if let Some(gate) = gate {
        stage.steps.insert(0, gate);
    }

    Ok(stage)
}

/// Axes and nested stages of a `matrix {}` block.
fn parse_matrix(source: &str, body: Body<'_>) -> Result<(Matrix, Vec<Stage>)> {
    let mut matrix = Matrix::default();
    let mut stages = Vec::new();

    for section in split_statements(body.text, body.offset) {
        match (section.keyword, section.body) {
            ("axes", Some(axes)) => {
                for axis in split_statements(axes.text, axes.offset) {
                    let Some(axis_body) = axis.body.filter(|_| axis.keyword == "axis") else {
                        continue;
                    };
                    let mut name = String::new();
                    let mut values = Vec::new();
                    for entry in split_statements(axis_body.text, axis_body.offset) {
                        match entry.keyword {
                            "name" => name = first_string_arg(entry.args).unwrap_or_default(),
                            "values" => values = quoted_strings(entry.args),
                            _ => {}
                        }
                    }
                    matrix.axes.push(MatrixAxis { name, values });
                }
            }
            ("stages", Some(children)) => stages = parse_stages(source, children, true)?,
            (other, _) => debug!(
                "Ignoring matrix directive `{other}` on line {}",
                line_of(source, section.offset)
            ),
        }
    }

    Ok((matrix, stages))
}

/// Function name from a `def` signature such as `String tagFor(env)`.
fn helper_name(signature: &str) -> Option<String> {
    let head = &signature[..signature.find('(')?];
    head.split_whitespace()
        .last()
        .filter(|name| name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_'))
        .map(str::to_string)
}
