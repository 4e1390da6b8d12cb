//! `self-reference`: excessive `ThisObject` / `ЭтотОбъект` usage in modules

use crate::check::{
    CancellationToken, Check, CheckComplexity, CheckDefinition, CheckError, CheckParameters,
    Issue, IssueType, ParameterKind, ResultAcceptor, EXTRA_LINE_KEY,
};
use crate::context::NearestRootCollector;
use crate::diagnostic::Severity;
use crate::message::format_message;
use crate::model::{features, Graph, NodeId, NodeKind};
use std::sync::Arc;

pub const CHECK_ID: &str = "self-reference";

/// In form modules, only report references to properties the form declares
pub const PARAM_CHECK_ONLY_EXISTING_FORM_PROPERTIES: &str = "check_only_existing_form_properties";

const SELF_KEYWORDS: [&str; 2] = ["ThisObject", "ЭтотОбъект"];

const MESSAGE: &str =
    "Excessive usage of self reference {keyword} (when referencing method, property or attribute)";

#[derive(Debug, Default, Clone, Copy)]
pub struct SelfReference;

impl SelfReference {
    pub fn new() -> Self {
        Self
    }
}

/// Keywords compare case-insensitively, like the module language does
fn is_self_keyword(keyword: &str) -> bool {
    SELF_KEYWORDS
        .iter()
        .any(|k| k.to_lowercase() == keyword.to_lowercase())
}

/// The form owning a form module
fn owning_form(graph: &Graph, module: NodeId) -> Option<NodeId> {
    graph
        .parent(module)
        .filter(|&parent| graph.is_kind(parent, NodeKind::Form))
}

/// Attribute edits fall back to the module of the form declaring them
fn attribute_form_module(graph: &Graph, node: NodeId) -> Vec<NodeId> {
    let Some(attr) = graph
        .ancestors(node)
        .find(|&n| graph.is_kind(n, NodeKind::FormAttribute))
    else {
        return Vec::new();
    };
    graph
        .parent(attr)
        .filter(|&form| graph.is_kind(form, NodeKind::Form))
        .and_then(|form| graph.single(form, features::MODULE))
        .filter(|&module| graph.is_kind(module, NodeKind::Module))
        .into_iter()
        .collect()
}

fn is_form_property(graph: &Graph, form: NodeId, property: &str) -> bool {
    graph
        .nodes(form, features::ATTRIBUTES)
        .iter()
        .any(|&attr| graph.name(attr) == Some(property))
}

impl Check for SelfReference {
    fn id(&self) -> &str {
        CHECK_ID
    }

    fn configure(&self, definition: &mut CheckDefinition) {
        let collector = NearestRootCollector::new(NodeKind::Module)
            .with_look_down()
            .with_fallback(attribute_form_module);

        definition
            .add_checked_model_objects(NodeKind::Module, false, &[])
            .add_checked_model_objects(NodeKind::Form, true, &[NodeKind::Module])
            .add_feature_change_collector(
                Arc::new(collector),
                &[
                    features::METHODS,
                    features::STATEMENTS,
                    features::KEYWORD,
                    features::PROPERTY,
                    features::MODULE,
                    features::ATTRIBUTES,
                    features::NAME,
                ],
            )
            .add_parameter(
                PARAM_CHECK_ONLY_EXISTING_FORM_PROPERTIES,
                ParameterKind::Bool,
                "true",
                "Check only existing form properties",
            )
            .set_title("Excessive usage of self reference")
            .set_description(
                "Excessive usage of self reference (when referencing method, property or attribute)",
            )
            .set_complexity(CheckComplexity::Normal)
            .set_default_severity(Severity::Minor)
            .set_issue_type(IssueType::CodeStyle);
    }

    fn check(
        &self,
        graph: &Graph,
        node: NodeId,
        acceptor: &mut dyn ResultAcceptor,
        params: &CheckParameters,
        cancel: &CancellationToken,
    ) -> Result<(), CheckError> {
        if !graph.is_kind(node, NodeKind::Module) {
            return Ok(());
        }
        let existing_only = params.get_bool(PARAM_CHECK_ONLY_EXISTING_FORM_PROPERTIES)?;
        let form = owning_form(graph, node).filter(|_| existing_only);

        for &method in graph.nodes(node, features::METHODS) {
            if cancel.is_cancelled() {
                return Ok(());
            }
            for &statement in graph.nodes(method, features::STATEMENTS) {
                if !graph.is_kind(statement, NodeKind::SelfReference) {
                    continue;
                }
                let Some(keyword) = graph
                    .str_attr(statement, features::KEYWORD)
                    .filter(|k| is_self_keyword(k))
                else {
                    continue;
                };

                if let Some(form) = form {
                    let known = graph
                        .str_attr(statement, features::PROPERTY)
                        .is_some_and(|property| is_form_property(graph, form, property));
                    if !known {
                        continue;
                    }
                }

                let message = format_message(MESSAGE, &[("keyword", keyword)]);
                let mut issue = Issue::new(statement, &message);
                if let Some(line) = graph.int_attr(statement, features::LINE) {
                    issue = issue.with_extra(EXTRA_LINE_KEY, line);
                }
                acceptor.add_issue(issue);
            }
        }
        Ok(())
    }
}
