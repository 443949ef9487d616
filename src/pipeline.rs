use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// Structured form of one declarative Jenkins pipeline.
///
/// Stage order is the execution order and is kept verbatim in every report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PipelineDefinition {
    pub name: String,
    pub agent: Option<Agent>,
    pub stages: Vec<Stage>,
    pub options: Vec<PipelineOption>,
    pub triggers: Vec<Trigger>,
    pub parameters: Vec<Parameter>,
    pub environment: Vec<EnvBinding>,
    pub tools: IndexMap<String, String>,
    pub post: PostActions,
    /// Shared libraries loaded with `@Library`, `library` or a `libraries {}` directive.
    pub libraries: Vec<String>,
    /// Functions defined next to the `pipeline` block.
    pub helpers: Vec<HelperFunction>,
    /// Pipeline directives with no structured form, by keyword.
    pub unknown_directives: Vec<String>,
}

impl PipelineDefinition {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            agent: None,
            stages: Vec::new(),
            options: Vec::new(),
            triggers: Vec::new(),
            parameters: Vec::new(),
            environment: Vec::new(),
            tools: IndexMap::new(),
            post: PostActions::default(),
            libraries: Vec::new(),
            helpers: Vec::new(),
            unknown_directives: Vec::new(),
        }
    }

    /// Stages in report order: each top-level stage followed by its nested stages.
    pub fn flattened_stages(&self) -> Vec<&Stage> {
        self.stages
            .iter()
            .flat_map(|stage| std::iter::once(stage).chain(stage.children.iter()))
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Agent {
    Any,
    None,
    Label { label: String },
    Docker { image: String, args: Option<String> },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Stage {
    pub name: String,
    pub steps: Vec<Step>,
    pub when: Option<WhenCondition>,
    pub post: PostActions,
    pub tools: IndexMap<String, String>,
    pub agent: Option<Agent>,
    pub environment: Vec<EnvBinding>,
    pub options: Vec<PipelineOption>,
    pub matrix: Option<Matrix>,
    /// Stages declared inside `parallel {}`, `stages {}` or `matrix {}`; never nested further.
    pub children: Vec<Stage>,
    /// Stage directives with no structured form, by keyword.
    pub unknown_directives: Vec<String>,
}

impl Stage {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            steps: Vec::new(),
            when: None,
            post: PostActions::default(),
            tools: IndexMap::new(),
            agent: None,
            environment: Vec::new(),
            options: Vec::new(),
            matrix: None,
            children: Vec::new(),
            unknown_directives: Vec::new(),
        }
    }

    /// Every step of the stage in document order, descending into block bodies.
    pub fn walk_steps(&self) -> Vec<&Step> {
        let mut out = Vec::new();
        for step in &self.steps {
            step.collect(&mut out);
        }
        out
    }

    /// Steps reachable from the stage's post block, in condition order.
    pub fn walk_post_steps(&self) -> Vec<&Step> {
        self.post.walk_steps()
    }
}

/// One executable or declarative action within a stage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Step {
    ShellCommand {
        text: String,
    },
    PluginInvocation {
        name: String,
        args: String,
        body: Vec<Step>,
    },
    CredentialBinding {
        credentials: Vec<BoundCredential>,
        body: Vec<Step>,
    },
    ApprovalGate {
        message: String,
        ok_label: String,
        parameters: Vec<String>,
    },
    Checkout {
        url: Option<String>,
        branch: Option<String>,
        credentials_id: Option<String>,
    },
    /// Opaque Groovy; never parsed further.
    ScriptBlock {
        text: String,
    },
}

impl Step {
    /// This step followed by every step nested in its body.
    pub fn walk(&self) -> Vec<&Step> {
        let mut out = Vec::new();
        self.collect(&mut out);
        out
    }

    fn collect<'a>(&'a self, out: &mut Vec<&'a Step>) {
        out.push(self);
        match self {
            Self::PluginInvocation { body, .. } | Self::CredentialBinding { body, .. } => {
                for step in body {
                    step.collect(out);
                }
            }
            _ => {}
        }
    }

    /// The text a keyword detector should look at for this step alone.
    pub fn searchable_text(&self) -> String {
        match self {
            Self::ShellCommand { text } | Self::ScriptBlock { text } => text.clone(),
            Self::PluginInvocation { name, args, .. } => format!("{name} {args}"),
            Self::CredentialBinding { credentials, .. } => credentials
                .iter()
                .map(|c| c.id.as_str())
                .collect::<Vec<_>>()
                .join(" "),
            Self::ApprovalGate { message, .. } => message.clone(),
            Self::Checkout { url, .. } => url.clone().unwrap_or_default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BoundCredential {
    pub id: String,
    pub kind: CredentialKind,
    pub variables: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CredentialKind {
    UsernamePassword,
    UsernameColonPassword,
    String,
    File,
    SshUserPrivateKey,
    Certificate,
    /// Bound through `credentials('id')` or a bare `credentialsId:`; kind unknown.
    Generic,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum WhenCondition {
    Branch { pattern: String },
    Tag { pattern: String },
    Environment { name: String, value: String },
    Expression { text: String },
    ChangeRequest,
    BuildingTag,
    AllOf { conditions: Vec<WhenCondition> },
    AnyOf { conditions: Vec<WhenCondition> },
    Not { condition: Box<WhenCondition> },
}

impl WhenCondition {
    /// Leaf conditions have depth 1; every combinator adds one level.
    pub fn depth(&self) -> usize {
        match self {
            Self::AllOf { conditions } | Self::AnyOf { conditions } => {
                1 + conditions.iter().map(Self::depth).max().unwrap_or(0)
            }
            Self::Not { condition } => 1 + condition.depth(),
            _ => 1,
        }
    }

    /// Distinct `params.X` names referenced anywhere in the tree, sorted.
    pub fn referenced_parameters(&self) -> Vec<String> {
        let mut names = Vec::new();
        self.collect_parameters(&mut names);
        names.sort();
        names.dedup();
        names
    }

    fn collect_parameters(&self, out: &mut Vec<String>) {
        match self {
            Self::Expression { text } => {
                let re = regex::Regex::new(r"params\.([A-Za-z_][A-Za-z0-9_]*)")
                    .expect("valid regex");
                out.extend(re.captures_iter(text).map(|c| c[1].to_string()));
            }
            Self::AllOf { conditions } | Self::AnyOf { conditions } => {
                for condition in conditions {
                    condition.collect_parameters(out);
                }
            }
            Self::Not { condition } => condition.collect_parameters(out),
            _ => {}
        }
    }

    pub fn is_complex(&self) -> bool {
        self.depth() > 1 || self.referenced_parameters().len() > 1
    }
}

/// Outcome condition of a `post` section.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PostCondition {
    Always,
    Changed,
    Fixed,
    Regression,
    Aborted,
    Failure,
    Success,
    Unstable,
    Cleanup,
}

impl PostCondition {
    pub const ALL: [Self; 9] = [
        Self::Always,
        Self::Changed,
        Self::Fixed,
        Self::Regression,
        Self::Aborted,
        Self::Failure,
        Self::Success,
        Self::Unstable,
        Self::Cleanup,
    ];

    pub fn keyword(self) -> &'static str {
        match self {
            Self::Always => "always",
            Self::Changed => "changed",
            Self::Fixed => "fixed",
            Self::Regression => "regression",
            Self::Aborted => "aborted",
            Self::Failure => "failure",
            Self::Success => "success",
            Self::Unstable => "unstable",
            Self::Cleanup => "cleanup",
        }
    }

    /// Equivalent job-status expression on the target system.
    pub fn target_condition(self) -> &'static str {
        match self {
            Self::Always | Self::Cleanup => "always()",
            Self::Success => "success()",
            Self::Failure => "failure()",
            Self::Unstable => "success() || failure()",
            Self::Aborted => "cancelled()",
            Self::Changed | Self::Fixed | Self::Regression => "custom condition (manual)",
        }
    }
}

impl std::fmt::Display for PostCondition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.keyword())
    }
}

/// Post actions keyed by outcome condition, in declaration order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PostActions(pub IndexMap<PostCondition, Vec<Step>>);

impl PostActions {
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn conditions(&self) -> impl Iterator<Item = PostCondition> + '_ {
        self.0.keys().copied()
    }

    pub fn walk_steps(&self) -> Vec<&Step> {
        let mut out = Vec::new();
        for steps in self.0.values() {
            for step in steps {
                step.collect(&mut out);
            }
        }
        out
    }
}

/// Axes of a `matrix {}` stage; the nested stages run once per cell.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Matrix {
    pub axes: Vec<MatrixAxis>,
}

impl Matrix {
    /// Number of axis combinations, before any `excludes`.
    pub fn cells(&self) -> usize {
        self.axes.iter().map(|axis| axis.values.len().max(1)).product()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatrixAxis {
    pub name: String,
    pub values: Vec<String>,
}

/// A Groovy `def name(...) { }` declared outside the `pipeline` block.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HelperFunction {
    pub name: String,
    /// Annotated with `@NonCPS`.
    pub non_cps: bool,
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PipelineOption {
    pub name: String,
    pub arguments: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Trigger {
    pub kind: String,
    pub spec: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Parameter {
    pub name: String,
    pub kind: ParameterKind,
    pub default: String,
    pub description: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ParameterKind {
    String,
    Text,
    Password,
    Boolean,
    Choice { choices: Vec<String> },
}

impl ParameterKind {
    pub fn label(&self) -> &'static str {
        match self {
            Self::String => "string",
            Self::Text => "text",
            Self::Password => "password",
            Self::Boolean => "boolean",
            Self::Choice { .. } => "choice",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnvBinding {
    pub name: String,
    pub value: EnvValue,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum EnvValue {
    Literal(String),
    Credential(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    fn expression(text: &str) -> WhenCondition {
        WhenCondition::Expression {
            text: text.to_string(),
        }
    }

    #[test]
    fn test_leaf_condition_is_simple() {
        let when = WhenCondition::Branch {
            pattern: "main".to_string(),
        };
        assert_eq!(when.depth(), 1);
        assert!(!when.is_complex());
    }

    #[test]
    fn test_combinator_adds_depth() {
        let when = WhenCondition::AllOf {
            conditions: vec![
                WhenCondition::Branch {
                    pattern: "main".to_string(),
                },
                WhenCondition::Not {
                    condition: Box::new(WhenCondition::BuildingTag),
                },
            ],
        };
        assert_eq!(when.depth(), 3);
        assert!(when.is_complex());
    }

    #[test]
    fn test_expression_with_two_parameters_is_complex() {
        let when = expression("params.DEPLOY && params.ENV == 'prod' && params.DEPLOY");
        assert_eq!(when.referenced_parameters(), vec!["DEPLOY", "ENV"]);
        assert!(when.is_complex());
        assert!(!expression("params.DEPLOY").is_complex());
    }

    #[test]
    fn test_flattened_stages_keep_children_after_parent() {
        let mut parent = Stage::new("Tests");
        parent.children = vec![Stage::new("Unit"), Stage::new("Integration")];
        let mut pipeline = PipelineDefinition::new("app");
        pipeline.stages = vec![Stage::new("Build"), parent, Stage::new("Deploy")];
        let names: Vec<_> = pipeline
            .flattened_stages()
            .iter()
            .map(|s| s.name.as_str())
            .collect();
        assert_eq!(names, vec!["Build", "Tests", "Unit", "Integration", "Deploy"]);
    }

    #[test]
    fn test_walk_steps_descends_into_bodies() {
        let mut stage = Stage::new("Deploy");
        stage.steps = vec![Step::CredentialBinding {
            credentials: vec![],
            body: vec![Step::PluginInvocation {
                name: "timeout".to_string(),
                args: "time: 5".to_string(),
                body: vec![Step::ShellCommand {
                    text: "kubectl apply -f k8s/".to_string(),
                }],
            }],
        }];
        assert_eq!(stage.walk_steps().len(), 3);
    }

    #[test]
    fn test_matrix_cells_multiply_axes() {
        let matrix = Matrix {
            axes: vec![
                MatrixAxis {
                    name: "PLATFORM".to_string(),
                    values: vec!["linux".to_string(), "windows".to_string()],
                },
                MatrixAxis {
                    name: "JDK".to_string(),
                    values: vec!["11".to_string(), "17".to_string(), "21".to_string()],
                },
            ],
        };
        assert_eq!(matrix.cells(), 6);
        assert_eq!(Matrix::default().cells(), 1);
    }
}
