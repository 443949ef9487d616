use log::debug;

use super::scanner::{named_value, split_statements, unquote, Body, Statement};
use crate::pipeline::WhenCondition;

/// Stage-entry modifiers that change evaluation order, not the outcome.
const MODIFIERS: [&str; 3] = ["beforeAgent", "beforeInput", "beforeOptions"];

/// Parses a `when {}` body. Several top-level conditions combine as `allOf`.
pub fn parse_when(body: Body<'_>) -> Option<WhenCondition> {
    let mut conditions = parse_conditions(body);
    match conditions.len() {
        0 => None,
        1 => conditions.pop(),
        _ => Some(WhenCondition::AllOf { conditions }),
    }
}

fn parse_conditions(body: Body<'_>) -> Vec<WhenCondition> {
    split_statements(body.text, body.offset)
        .iter()
        .filter(|statement| !MODIFIERS.contains(&statement.keyword))
        .map(parse_condition)
        .collect()
}

fn pattern_of(args: &str) -> String {
    unquote(args)
        .or_else(|| named_value(args, "pattern"))
        .unwrap_or_else(|| args.to_string())
}

fn parse_condition(statement: &Statement<'_>) -> WhenCondition {
    let args = statement.args;
    match (statement.keyword, statement.body) {
        ("branch", None) => WhenCondition::Branch {
            pattern: pattern_of(args),
        },
        ("tag", None) => WhenCondition::Tag {
            pattern: pattern_of(args),
        },
        ("environment", None) => WhenCondition::Environment {
            name: named_value(args, "name").unwrap_or_default(),
            value: named_value(args, "value").unwrap_or_default(),
        },
        ("expression", Some(body)) => {
            let text = body.text.trim();
            WhenCondition::Expression {
                text: text.strip_prefix("return ").unwrap_or(text).trim().to_string(),
            }
        }
        ("changeRequest", _) => WhenCondition::ChangeRequest,
        ("buildingTag", _) => WhenCondition::BuildingTag,
        ("allOf", Some(body)) => WhenCondition::AllOf {
            conditions: parse_conditions(body),
        },
        ("anyOf", Some(body)) => WhenCondition::AnyOf {
            conditions: parse_conditions(body),
        },
        ("not", Some(body)) => match parse_conditions(body).into_iter().next() {
            Some(inner) => WhenCondition::Not {
                condition: Box::new(inner),
            },
            None => opaque(statement),
        },
        _ => opaque(statement),
    }
}

fn opaque(statement: &Statement<'_>) -> WhenCondition {
    debug!("Keeping when condition `{}` as an expression", statement.keyword);
    WhenCondition::Expression {
        text: statement.text.trim().to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn when(text: &str) -> Option<WhenCondition> {
        parse_when(Body { text, offset: 0 })
    }

    #[test]
    fn test_single_branch_condition() {
        assert_eq!(
            when("branch 'main'"),
            Some(WhenCondition::Branch {
                pattern: "main".to_string()
            })
        );
    }

    #[test]
    fn test_multiple_conditions_become_all_of() {
        let parsed = when("beforeAgent true\nbranch 'main'\nenvironment name: 'DEPLOY', value: 'true'")
            .unwrap();
        assert_eq!(
            parsed,
            WhenCondition::AllOf {
                conditions: vec![
                    WhenCondition::Branch {
                        pattern: "main".to_string()
                    },
                    WhenCondition::Environment {
                        name: "DEPLOY".to_string(),
                        value: "true".to_string()
                    },
                ]
            }
        );
        assert!(parsed.is_complex());
    }

    #[test]
    fn test_nested_combinators() {
        let parsed = when(
            "anyOf {\n  branch 'release/*'\n  not { buildingTag() }\n  expression { return params.FORCE_DEPLOY }\n}",
        )
        .unwrap();
        assert_eq!(parsed.depth(), 3);
        let WhenCondition::AnyOf { conditions } = &parsed else {
            panic!("expected anyOf, got {parsed:?}");
        };
        assert_eq!(conditions.len(), 3);
        assert_eq!(
            conditions[2],
            WhenCondition::Expression {
                text: "params.FORCE_DEPLOY".to_string()
            }
        );
    }

    #[test]
    fn test_unknown_condition_is_kept_as_expression() {
        assert_eq!(
            when("triggeredBy 'TimerTrigger'"),
            Some(WhenCondition::Expression {
                text: "triggeredBy 'TimerTrigger'".to_string()
            })
        );
        assert_eq!(when("   "), None);
    }
}
