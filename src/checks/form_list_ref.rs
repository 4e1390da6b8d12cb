//! `form-list-field-ref-not-added`: dynamic lists must show their Ref field
//!
//! A Table bound to a dynamic list whose main table has an identity field
//! should contain, directly or inside nested groups, a form field bound to
//! that field. Without it the list cannot be navigated by reference.

use crate::check::{
    CancellationToken, Check, CheckComplexity, CheckDefinition, CheckError, CheckParameters,
    Issue, IssueType, ResultAcceptor,
};
use crate::context::{ContextCollector, ContextSink, FeatureChange, NearestRootCollector};
use crate::diagnostic::Severity;
use crate::message::format_message;
use crate::model::{features, Graph, NodeId, NodeKind};
use crate::path::{DataPath, IdentityMatcher};
use std::sync::Arc;

pub const CHECK_ID: &str = "form-list-field-ref-not-added";

const MESSAGE: &str = "The {field} field is not added to dynamic list";

/// Outcome of searching a table's items
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Search {
    Found,
    Missing,
    Cancelled,
}

#[derive(Debug, Clone)]
pub struct FormListFieldRefNotAdded {
    matcher: IdentityMatcher,
    schema_field: String,
}

impl Default for FormListFieldRefNotAdded {
    fn default() -> Self {
        Self::new(IdentityMatcher::default(), "Ref")
    }
}

impl FormListFieldRefNotAdded {
    pub fn new(matcher: IdentityMatcher, schema_field: &str) -> Self {
        Self {
            matcher,
            schema_field: schema_field.to_string(),
        }
    }

    fn search(&self, graph: &Graph, items: &[NodeId], cancel: &CancellationToken) -> Search {
        for &item in items {
            if cancel.is_cancelled() {
                return Search::Cancelled;
            }
            match graph.kind(item) {
                Some(NodeKind::FormField) => {
                    let bound = graph
                        .contents(item)
                        .iter()
                        .filter_map(|&c| DataPath::from_node(graph, c))
                        .any(|path| self.matcher.matches(&path));
                    if bound {
                        return Search::Found;
                    }
                }
                Some(NodeKind::FormGroup) => {
                    match self.search(graph, graph.nodes(item, features::ITEMS), cancel) {
                        Search::Missing => {}
                        found_or_cancelled => return found_or_cancelled,
                    }
                }
                _ => {}
            }
        }
        Search::Missing
    }
}

/// Whether `table` lists a dynamic list whose main table has `schema_field`
///
/// Unresolvable main tables, missing attributes and detached tables all
/// answer `false`.
pub fn lists_identity_field(graph: &Graph, table: NodeId, schema_field: &str) -> bool {
    if !graph.is_kind(table, NodeKind::Table) {
        return false;
    }
    let Some(path) = graph
        .single(table, features::DATA_PATH)
        .and_then(|p| DataPath::from_node(graph, p))
    else {
        return false;
    };
    let Ok(form) = graph.top_container(table) else {
        return false;
    };
    if !graph.is_kind(form, NodeKind::Form) {
        return false;
    }

    let Some(ext) = list_attribute(graph, form, &path)
        .and_then(|attr| graph.single(attr, features::EXT_INFO))
        .filter(|&ext| graph.is_kind(ext, NodeKind::DynamicListExtInfo))
    else {
        return false;
    };
    let Some(main_table) = graph.resolve_single(ext, features::MAIN_TABLE) else {
        return false;
    };

    graph
        .nodes(main_table, features::FIELDS)
        .iter()
        .any(|&field| graph.name(field) == Some(schema_field))
}

/// Form attribute backing a table: the one named by the path's first
/// segment, else the first dynamic list attribute of the form
fn list_attribute(graph: &Graph, form: NodeId, path: &DataPath) -> Option<NodeId> {
    let attributes: Vec<NodeId> = graph
        .nodes(form, features::ATTRIBUTES)
        .iter()
        .copied()
        .filter(|&a| graph.is_kind(a, NodeKind::FormAttribute))
        .collect();

    let named = path
        .first()
        .and_then(|first| attributes.iter().copied().find(|&a| graph.name(a) == Some(first)));
    named.or_else(|| {
        attributes.into_iter().find(|&a| {
            graph
                .single(a, features::EXT_INFO)
                .is_some_and(|ext| graph.is_kind(ext, NodeKind::DynamicListExtInfo))
        })
    })
}

/// Column group fallback: a column group change outside any table marks the
/// form's table
fn column_group_table(graph: &Graph, node: NodeId) -> Vec<NodeId> {
    if !graph.is_kind(node, NodeKind::FormGroup) {
        return Vec::new();
    }
    let is_column_group = graph
        .single(node, features::EXT_INFO)
        .is_some_and(|ext| graph.is_kind(ext, NodeKind::ColumnGroupExtInfo));
    if !is_column_group {
        return Vec::new();
    }

    let form = match graph.top_container(node) {
        Ok(form) if graph.is_kind(form, NodeKind::Form) => form,
        Ok(_) => return Vec::new(),
        Err(err) => {
            log::debug!("{}: {}", CHECK_ID, err);
            return Vec::new();
        }
    };
    graph
        .nodes(form, features::ITEMS)
        .iter()
        .copied()
        .find(|&item| graph.is_kind(item, NodeKind::Table))
        .into_iter()
        .collect()
}

fn form_tables(graph: &Graph, form: NodeId) -> Vec<NodeId> {
    graph
        .preorder(form)
        .into_iter()
        .filter(|&n| graph.is_kind(n, NodeKind::Table))
        .collect()
}

/// Attribute fallback: an edit inside a form attribute marks every table of
/// that form
fn attribute_tables(graph: &Graph, node: NodeId) -> Vec<NodeId> {
    graph
        .ancestors(node)
        .find(|&n| graph.is_kind(n, NodeKind::FormAttribute))
        .and_then(|attr| graph.parent(attr))
        .filter(|&form| graph.is_kind(form, NodeKind::Form))
        .map(|form| form_tables(graph, form))
        .unwrap_or_default()
}

/// Re-derives the list tables of a form when its attributes change
///
/// Any attribute edit can rebind any table of the form, so tables are found
/// from the form rather than by walking up from the changed node.
#[derive(Debug, Clone)]
struct ListAttributeCollector {
    schema_field: String,
}

impl ContextCollector for ListAttributeCollector {
    fn collect(&self, graph: &Graph, change: &FeatureChange, sink: &mut ContextSink<'_>) {
        if let Err(err) = graph.top_container(change.node) {
            log::debug!("{}: skipping change of '{}': {}", sink.check_id(), change.feature, err);
            return;
        }

        let tables = if graph.is_kind(change.node, NodeKind::Form) {
            form_tables(graph, change.node)
        } else {
            attribute_tables(graph, change.node)
        };
        for table in tables {
            if lists_identity_field(graph, table, &self.schema_field) {
                sink.add_model_check(table);
            }
        }
    }
}

impl Check for FormListFieldRefNotAdded {
    fn id(&self) -> &str {
        CHECK_ID
    }

    fn configure(&self, definition: &mut CheckDefinition) {
        let schema_field = self.schema_field.clone();
        let collector = NearestRootCollector::new(NodeKind::Table)
            .with_look_down()
            .with_fallback(column_group_table)
            .with_fallback(attribute_tables)
            .with_precondition(move |graph, table| {
                lists_identity_field(graph, table, &schema_field)
            });
        let attributes = ListAttributeCollector {
            schema_field: self.schema_field.clone(),
        };

        definition
            .add_checked_model_objects(NodeKind::Form, true, &[NodeKind::Table])
            .add_feature_change_collector(
                Arc::new(collector),
                &[
                    features::ITEMS,
                    features::DATA_PATH,
                    features::SEGMENTS,
                    features::EXT_INFO,
                ],
            )
            .add_feature_change_collector(
                Arc::new(attributes),
                &[features::ATTRIBUTES, features::MAIN_TABLE, features::NAME],
            )
            .set_title("Dynamic list Ref field is not added")
            .set_description(
                "A form table showing a dynamic list should contain a field bound to the list's Ref field",
            )
            .set_complexity(CheckComplexity::Normal)
            .set_default_severity(Severity::Minor)
            .set_issue_type(IssueType::UiStyle);
    }

    fn check(
        &self,
        graph: &Graph,
        node: NodeId,
        acceptor: &mut dyn ResultAcceptor,
        _params: &CheckParameters,
        cancel: &CancellationToken,
    ) -> Result<(), CheckError> {
        if !lists_identity_field(graph, node, &self.schema_field) {
            return Ok(());
        }

        if self.search(graph, graph.nodes(node, features::ITEMS), cancel) == Search::Missing {
            let message = format_message(MESSAGE, &[("field", self.schema_field.as_str())]);
            acceptor.add_issue(Issue::new(node, &message));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::check::IssueCollector;
    use crate::context::{ChangeEvent, ContextCollector, ContextSession, FeatureChange};

    struct Fixture {
        graph: Graph,
        form: NodeId,
        table: NodeId,
        view: NodeId,
    }

    fn add_path(graph: &mut Graph, owner: NodeId, segments: &[&str]) {
        let path = graph.set_child(owner, features::DATA_PATH, NodeKind::DataPath);
        graph.set_list(path, features::SEGMENTS, segments);
    }

    fn fixture(view_fields: &[&str]) -> Fixture {
        let mut graph = Graph::new();
        let view = graph.add_root(NodeKind::DbViewDef);
        graph.set_str(view, features::URI, "Catalog.Products");
        for name in view_fields {
            let field = graph.add_child(view, features::FIELDS, NodeKind::DbViewFieldDef);
            graph.set_str(field, features::NAME, name);
        }

        let form = graph.add_root(NodeKind::Form);
        let attr = graph.add_child(form, features::ATTRIBUTES, NodeKind::FormAttribute);
        graph.set_str(attr, features::NAME, "List");
        let ext = graph.set_child(attr, features::EXT_INFO, NodeKind::DynamicListExtInfo);
        let proxy = graph.add_proxy(NodeKind::DbViewDef, "Catalog.Products");
        graph.set_reference(ext, features::MAIN_TABLE, proxy);

        let table = graph.add_child(form, features::ITEMS, NodeKind::Table);
        graph.set_str(table, features::NAME, "List");
        add_path(&mut graph, table, &["List"]);

        Fixture {
            graph,
            form,
            table,
            view,
        }
    }

    fn add_field(graph: &mut Graph, parent: NodeId, segments: &[&str]) -> NodeId {
        let field = graph.add_child(parent, features::ITEMS, NodeKind::FormField);
        add_path(graph, field, segments);
        field
    }

    fn run(check: &FormListFieldRefNotAdded, fx: &Fixture) -> Vec<Issue> {
        let mut collector = IssueCollector::new();
        check
            .check(
                &fx.graph,
                fx.table,
                &mut collector,
                &CheckParameters::new(),
                &CancellationToken::new(),
            )
            .unwrap();
        collector.into_issues()
    }

    #[test]
    fn test_missing_ref_field_reports_on_table() {
        let mut fx = fixture(&["Ref", "Code"]);
        add_field(&mut fx.graph, fx.table, &["List", "Code"]);

        let issues = run(&FormListFieldRefNotAdded::default(), &fx);
        assert_eq!(issues.len(), 1);
        assert_eq!(issues[0].node(), fx.table);
        assert_eq!(issues[0].message(), "The Ref field is not added to dynamic list");
    }

    #[test]
    fn test_nested_ref_field_is_found() {
        let mut fx = fixture(&["Ref"]);
        let outer = fx.graph.add_child(fx.table, features::ITEMS, NodeKind::FormGroup);
        let inner = fx.graph.add_child(outer, features::ITEMS, NodeKind::FormGroup);
        add_field(&mut fx.graph, inner, &["List", "Ссылка"]);

        assert!(run(&FormListFieldRefNotAdded::default(), &fx).is_empty());
    }

    #[test]
    fn test_schema_without_ref_is_silent() {
        let fx = fixture(&["Code", "Description"]);
        assert!(run(&FormListFieldRefNotAdded::default(), &fx).is_empty());
    }

    #[test]
    fn test_unresolvable_main_table_is_silent() {
        let mut fx = fixture(&["Ref"]);
        fx.graph.set_str(fx.view, features::URI, "Catalog.Other");
        assert!(run(&FormListFieldRefNotAdded::default(), &fx).is_empty());
    }

    #[test]
    fn test_table_without_data_path_is_silent() {
        let mut fx = fixture(&["Ref"]);
        fx.graph.unset(fx.table, features::DATA_PATH);
        assert!(run(&FormListFieldRefNotAdded::default(), &fx).is_empty());
    }

    #[test]
    fn test_cancelled_run_reports_nothing() {
        let mut fx = fixture(&["Ref"]);
        add_field(&mut fx.graph, fx.table, &["List", "Code"]);
        let cancel = CancellationToken::new();
        cancel.cancel();

        let mut collector = IssueCollector::new();
        FormListFieldRefNotAdded::default()
            .check(
                &fx.graph,
                fx.table,
                &mut collector,
                &CheckParameters::new(),
                &cancel,
            )
            .unwrap();
        assert!(collector.is_empty());
    }

    #[test]
    fn test_custom_identity_spelling() {
        let mut fx = fixture(&["Id"]);
        add_field(&mut fx.graph, fx.table, &["List", "Ref"]);

        let check = FormListFieldRefNotAdded::new(IdentityMatcher::new(["Id"]), "Id");
        let issues = run(&check, &fx);
        assert_eq!(issues.len(), 1);
        assert_eq!(issues[0].message(), "The Id field is not added to dynamic list");
    }

    #[test]
    fn test_column_group_change_marks_form_table() {
        let mut fx = fixture(&["Ref"]);
        let group = fx.graph.add_child(fx.form, features::ITEMS, NodeKind::FormGroup);
        fx.graph.set_child(group, features::EXT_INFO, NodeKind::ColumnGroupExtInfo);
        fx.graph.add_child(fx.form, features::ITEMS, NodeKind::FormField);

        let mut definition = CheckDefinition::new(CHECK_ID);
        FormListFieldRefNotAdded::default().configure(&mut definition);
        let binding = &definition.collectors()[0];

        let mut session = ContextSession::new();
        let change = FeatureChange::new(group, features::ITEMS, ChangeEvent::Set);
        binding
            .collector
            .collect(&fx.graph, &change, &mut session.sink(CHECK_ID));
        assert_eq!(session.pending_for(CHECK_ID), vec![fx.table]);
    }

    fn dirty_tables(fx: &Fixture, changes: &[FeatureChange]) -> Vec<NodeId> {
        let mut definition = CheckDefinition::new(CHECK_ID);
        FormListFieldRefNotAdded::default().configure(&mut definition);

        let mut session = ContextSession::new();
        for change in changes {
            for binding in definition.collectors() {
                if binding.listens_to(&change.feature) {
                    binding
                        .collector
                        .collect(&fx.graph, change, &mut session.sink(CHECK_ID));
                }
            }
        }
        session.pending_for(CHECK_ID)
    }

    #[test]
    fn test_list_attribute_edit_marks_table() {
        let mut fx = fixture(&["Ref"]);
        let attr = fx.graph.nodes(fx.form, features::ATTRIBUTES)[0];
        fx.graph.unset(attr, features::EXT_INFO);
        fx.graph.take_changes();

        let ext = fx
            .graph
            .set_child(attr, features::EXT_INFO, NodeKind::DynamicListExtInfo);
        let set_ext = fx.graph.take_changes();
        // No main table yet: nothing qualifies
        assert!(dirty_tables(&fx, &set_ext).is_empty());

        let proxy = fx.graph.add_proxy(NodeKind::DbViewDef, "Catalog.Products");
        fx.graph.set_reference(ext, features::MAIN_TABLE, proxy);
        let set_main = fx.graph.take_changes();
        assert_eq!(dirty_tables(&fx, &set_main), vec![fx.table]);
        assert_eq!(dirty_tables(&fx, &set_ext), vec![fx.table]);
    }

    #[test]
    fn test_new_attribute_marks_form_tables() {
        let mut fx = fixture(&["Ref"]);
        fx.graph.take_changes();
        let attr = fx
            .graph
            .add_child(fx.form, features::ATTRIBUTES, NodeKind::FormAttribute);
        fx.graph.set_str(attr, features::NAME, "Extra");

        let changes = fx.graph.take_changes();
        assert_eq!(dirty_tables(&fx, &changes), vec![fx.table]);
    }

    #[test]
    fn test_plain_group_change_outside_table_marks_nothing() {
        let mut fx = fixture(&["Ref"]);
        let group = fx.graph.add_child(fx.form, features::ITEMS, NodeKind::FormGroup);

        let mut definition = CheckDefinition::new(CHECK_ID);
        FormListFieldRefNotAdded::default().configure(&mut definition);

        let mut session = ContextSession::new();
        let change = FeatureChange::new(group, features::NAME, ChangeEvent::Set);
        definition.collectors()[0]
            .collector
            .collect(&fx.graph, &change, &mut session.sink(CHECK_ID));
        assert!(session.is_empty());
    }
}
