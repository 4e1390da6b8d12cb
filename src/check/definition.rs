//! Check definition: metadata, targets and collector bindings

use crate::context::ContextCollector;
use crate::diagnostic::Severity;
use crate::model::{Graph, NodeId, NodeKind};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashSet};
use std::fmt;
use std::sync::Arc;
use thiserror::Error;

/// How expensive a check is to evaluate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CheckComplexity {
    #[default]
    Normal,
    /// Only run on full scans, never on incremental re-checks
    Expensive,
}

impl fmt::Display for CheckComplexity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CheckComplexity::Normal => write!(f, "normal"),
            CheckComplexity::Expensive => write!(f, "expensive"),
        }
    }
}

/// Issue category reported alongside a check's findings
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IssueType {
    Error,
    #[default]
    CodeStyle,
    UiStyle,
    Performance,
    Portability,
    Security,
    Warning,
}

impl fmt::Display for IssueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IssueType::Error => write!(f, "error"),
            IssueType::CodeStyle => write!(f, "code_style"),
            IssueType::UiStyle => write!(f, "ui_style"),
            IssueType::Performance => write!(f, "performance"),
            IssueType::Portability => write!(f, "portability"),
            IssueType::Security => write!(f, "security"),
            IssueType::Warning => write!(f, "warning"),
        }
    }
}

impl std::str::FromStr for IssueType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().replace('-', "_").as_str() {
            "error" => Ok(IssueType::Error),
            "code_style" | "style" => Ok(IssueType::CodeStyle),
            "ui_style" | "ui" => Ok(IssueType::UiStyle),
            "performance" | "perf" => Ok(IssueType::Performance),
            "portability" => Ok(IssueType::Portability),
            "security" => Ok(IssueType::Security),
            "warning" => Ok(IssueType::Warning),
            _ => Err(format!("Unknown issue type: {}", s)),
        }
    }
}

/// Which nodes a check evaluates
///
/// With no `kinds`, the root itself is the target. Otherwise every node of
/// one of `kinds` inside the root is a target; the root qualifies too unless
/// `requires_containment` is set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TargetSpec {
    pub root: NodeKind,
    pub requires_containment: bool,
    pub kinds: BTreeSet<NodeKind>,
}

impl TargetSpec {
    pub fn new(root: NodeKind, requires_containment: bool, kinds: &[NodeKind]) -> Self {
        Self {
            root,
            requires_containment,
            kinds: kinds.iter().copied().collect(),
        }
    }

    /// Whether `node` is a target of this spec, given its registered root
    pub fn accepts(&self, graph: &Graph, root: NodeId, node: NodeId) -> bool {
        if !graph.is_kind(root, self.root) {
            return false;
        }
        if self.kinds.is_empty() {
            return node == root;
        }
        let Some(kind) = graph.kind(node) else {
            return false;
        };
        if node == root && self.requires_containment {
            return false;
        }
        self.kinds.contains(&kind)
    }

    /// Every target under `root`, in pre-order
    pub fn targets(&self, graph: &Graph, root: NodeId) -> Vec<NodeId> {
        if !graph.is_kind(root, self.root) {
            return Vec::new();
        }
        if self.kinds.is_empty() {
            return vec![root];
        }
        graph
            .preorder(root)
            .into_iter()
            .filter(|&node| self.accepts(graph, root, node))
            .collect()
    }
}

/// A context collector and the features it listens to
#[derive(Clone)]
pub struct CollectorBinding {
    pub collector: Arc<dyn ContextCollector>,
    pub features: BTreeSet<String>,
}

impl CollectorBinding {
    pub fn listens_to(&self, feature: &str) -> bool {
        self.features.contains(feature)
    }
}

impl fmt::Debug for CollectorBinding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CollectorBinding")
            .field("features", &self.features)
            .finish_non_exhaustive()
    }
}

/// Declared type of a parameter's string value
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParameterKind {
    Bool,
    Int,
    Str,
}

impl ParameterKind {
    pub(crate) fn parse_bool(self, raw: &str) -> Option<bool> {
        match raw.trim().to_lowercase().as_str() {
            "true" | "yes" | "on" | "1" => Some(true),
            "false" | "no" | "off" | "0" => Some(false),
            _ => None,
        }
    }

    /// Whether `raw` is a valid encoding of this kind
    pub fn accepts(self, raw: &str) -> bool {
        match self {
            ParameterKind::Bool => self.parse_bool(raw).is_some(),
            ParameterKind::Int => raw.trim().parse::<i64>().is_ok(),
            ParameterKind::Str => true,
        }
    }
}

impl fmt::Display for ParameterKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParameterKind::Bool => write!(f, "bool"),
            ParameterKind::Int => write!(f, "int"),
            ParameterKind::Str => write!(f, "string"),
        }
    }
}

/// A parameter a check declares, with its default
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParameterDef {
    pub name: String,
    pub kind: ParameterKind,
    pub default: String,
    pub title: String,
}

impl ParameterDef {
    pub fn new(name: &str, kind: ParameterKind, default: &str, title: &str) -> Self {
        Self {
            name: name.to_string(),
            kind,
            default: default.to_string(),
            title: title.to_string(),
        }
    }
}

/// Registration rejected
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigurationError {
    #[error("check id is empty")]
    EmptyId,

    #[error("check '{0}' is already registered")]
    DuplicateId(String),

    #[error("check '{0}' declares no checked model objects")]
    NoTargets(String),

    #[error("check '{check}' binds a context collector to no feature")]
    CollectorWithoutFeatures { check: String },

    #[error("check '{check}' parameter '{name}' default '{default}' is not a valid {kind}")]
    InvalidParameterDefault {
        check: String,
        name: String,
        default: String,
        kind: ParameterKind,
    },

    #[error("check '{check}' declares parameter '{name}' twice")]
    DuplicateParameter { check: String, name: String },
}

/// Everything a check declares about itself at registration
///
/// Filled once by [`Check::configure`](super::Check::configure), then frozen
/// inside the registry.
#[derive(Debug, Clone)]
pub struct CheckDefinition {
    id: String,
    title: String,
    description: String,
    complexity: CheckComplexity,
    severity: Severity,
    issue_type: IssueType,
    targets: Vec<TargetSpec>,
    collectors: Vec<CollectorBinding>,
    parameters: Vec<ParameterDef>,
}

impl CheckDefinition {
    pub fn new(id: &str) -> Self {
        Self {
            id: id.to_string(),
            title: String::new(),
            description: String::new(),
            complexity: CheckComplexity::default(),
            severity: Severity::default(),
            issue_type: IssueType::default(),
            targets: Vec::new(),
            collectors: Vec::new(),
            parameters: Vec::new(),
        }
    }

    pub fn set_title(&mut self, title: &str) -> &mut Self {
        self.title = title.to_string();
        self
    }

    pub fn set_description(&mut self, description: &str) -> &mut Self {
        self.description = description.to_string();
        self
    }

    pub fn set_complexity(&mut self, complexity: CheckComplexity) -> &mut Self {
        self.complexity = complexity;
        self
    }

    pub fn set_default_severity(&mut self, severity: Severity) -> &mut Self {
        self.severity = severity;
        self
    }

    pub fn set_issue_type(&mut self, issue_type: IssueType) -> &mut Self {
        self.issue_type = issue_type;
        self
    }

    /// Declare a root kind and the sub kinds evaluated under it
    pub fn add_checked_model_objects(
        &mut self,
        root: NodeKind,
        requires_containment: bool,
        kinds: &[NodeKind],
    ) -> &mut Self {
        self.targets
            .push(TargetSpec::new(root, requires_containment, kinds));
        self
    }

    /// Bind a collector to the features whose changes it reacts to
    pub fn add_feature_change_collector(
        &mut self,
        collector: Arc<dyn ContextCollector>,
        features: &[&str],
    ) -> &mut Self {
        self.collectors.push(CollectorBinding {
            collector,
            features: features.iter().map(|f| f.to_string()).collect(),
        });
        self
    }

    pub fn add_parameter(
        &mut self,
        name: &str,
        kind: ParameterKind,
        default: &str,
        title: &str,
    ) -> &mut Self {
        self.parameters
            .push(ParameterDef::new(name, kind, default, title));
        self
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn complexity(&self) -> CheckComplexity {
        self.complexity
    }

    pub fn default_severity(&self) -> Severity {
        self.severity
    }

    pub fn issue_type(&self) -> IssueType {
        self.issue_type
    }

    pub fn targets(&self) -> &[TargetSpec] {
        &self.targets
    }

    pub fn collectors(&self) -> &[CollectorBinding] {
        &self.collectors
    }

    pub fn parameters(&self) -> &[ParameterDef] {
        &self.parameters
    }

    /// Whether any target spec accepts `node` under `root`
    pub fn is_target(&self, graph: &Graph, root: NodeId, node: NodeId) -> bool {
        self.targets.iter().any(|t| t.accepts(graph, root, node))
    }

    /// Targets under one root, deduplicated in first-seen order
    pub fn targets_under(&self, graph: &Graph, root: NodeId) -> Vec<NodeId> {
        let mut seen = HashSet::new();
        self.targets
            .iter()
            .flat_map(|spec| spec.targets(graph, root))
            .filter(|node| seen.insert(*node))
            .collect()
    }

    /// Reject malformed definitions
    pub fn validate(&self) -> Result<(), ConfigurationError> {
        if self.id.trim().is_empty() {
            return Err(ConfigurationError::EmptyId);
        }
        if self.targets.is_empty() {
            return Err(ConfigurationError::NoTargets(self.id.clone()));
        }
        if self.collectors.iter().any(|b| b.features.is_empty()) {
            return Err(ConfigurationError::CollectorWithoutFeatures {
                check: self.id.clone(),
            });
        }

        let mut names = HashSet::new();
        for param in &self.parameters {
            if !names.insert(param.name.as_str()) {
                return Err(ConfigurationError::DuplicateParameter {
                    check: self.id.clone(),
                    name: param.name.clone(),
                });
            }
            if !param.kind.accepts(&param.default) {
                return Err(ConfigurationError::InvalidParameterDefault {
                    check: self.id.clone(),
                    name: param.name.clone(),
                    default: param.default.clone(),
                    kind: param.kind,
                });
            }
        }
        Ok(())
    }
}
