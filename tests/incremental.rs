//! Incremental re-checks driven by graph edits

use formcheck::check::CancellationToken;
use formcheck::checks::ids;
use formcheck::config::Config;
use formcheck::model::{features, Graph, NodeId, NodeKind};
use formcheck::Engine;
use pretty_assertions::assert_eq;

struct Products {
    graph: Graph,
    form: NodeId,
    table: NodeId,
    column_group: NodeId,
}

fn add_path(graph: &mut Graph, owner: NodeId, segments: &[&str]) {
    let path = graph.set_child(owner, features::DATA_PATH, NodeKind::DataPath);
    graph.set_list(path, features::SEGMENTS, segments);
}

/// A form whose items are a decoration group, a column group and one list
/// table missing its Ref field
fn products() -> Products {
    let mut graph = Graph::new();

    let view = graph.add_root(NodeKind::DbViewDef);
    graph.set_str(view, features::URI, "Catalog.Products");
    for name in ["Ref", "Code"] {
        let field = graph.add_child(view, features::FIELDS, NodeKind::DbViewFieldDef);
        graph.set_str(field, features::NAME, name);
    }

    let form = graph.add_root(NodeKind::Form);
    graph.set_str(form, features::NAME, "Products");
    let attr = graph.add_child(form, features::ATTRIBUTES, NodeKind::FormAttribute);
    graph.set_str(attr, features::NAME, "List");
    let ext = graph.set_child(attr, features::EXT_INFO, NodeKind::DynamicListExtInfo);
    let proxy = graph.add_proxy(NodeKind::DbViewDef, "Catalog.Products");
    graph.set_reference(ext, features::MAIN_TABLE, proxy);

    let header = graph.add_child(form, features::ITEMS, NodeKind::FormGroup);
    graph.set_str(header, features::NAME, "Header");

    let column_group = graph.add_child(form, features::ITEMS, NodeKind::FormGroup);
    graph.set_str(column_group, features::NAME, "Columns");
    graph.set_child(column_group, features::EXT_INFO, NodeKind::ColumnGroupExtInfo);

    let table = graph.add_child(form, features::ITEMS, NodeKind::Table);
    graph.set_str(table, features::NAME, "List");
    add_path(&mut graph, table, &["List"]);
    let code = graph.add_child(table, features::ITEMS, NodeKind::FormField);
    add_path(&mut graph, code, &["List", "Code"]);

    graph.take_changes();
    Products {
        graph,
        form,
        table,
        column_group,
    }
}

fn engine() -> Engine {
    Engine::with_builtin_checks(Config::default()).unwrap()
}

#[test]
fn test_column_group_change_dirties_the_form_table() {
    let mut fx = products();
    let field = fx
        .graph
        .add_child(fx.column_group, features::ITEMS, NodeKind::FormField);
    add_path(&mut fx.graph, field, &["Price"]);

    let changes = fx.graph.take_changes();
    let session = engine().registry().collect_all(&fx.graph, &changes);
    assert_eq!(
        session.pending_for(ids::FORM_LIST_FIELD_REF_NOT_ADDED),
        vec![fx.table]
    );
}

#[test]
fn test_plain_group_change_dirties_nothing() {
    let mut fx = products();
    let header = fx.graph.nodes(fx.form, features::ITEMS)[0];
    fx.graph.add_child(header, features::ITEMS, NodeKind::FormField);

    let changes = fx.graph.take_changes();
    let session = engine().registry().collect_all(&fx.graph, &changes);
    assert!(session.pending_for(ids::FORM_LIST_FIELD_REF_NOT_ADDED).is_empty());
}

#[test]
fn test_unrelated_feature_change_is_ignored() {
    let mut fx = products();
    fx.graph.set_str(fx.table, features::NAME, "Renamed");

    let changes = fx.graph.take_changes();
    let engine = engine();
    assert!(engine.registry().collect_all(&fx.graph, &changes).is_empty());

    let result = engine.recheck(&fx.graph, &changes, &CancellationToken::new());
    assert_eq!(result.targets_checked, 0);
}

#[test]
fn test_recheck_after_adding_ref_field() {
    let mut fx = products();
    let engine = engine();
    let cancel = CancellationToken::new();

    let full = engine.scan(&fx.graph, &cancel);
    assert_eq!(full.diagnostics.len(), 1);
    assert_eq!(full.diagnostics[0].location.node, fx.table);

    let group = fx.graph.add_child(fx.table, features::ITEMS, NodeKind::FormGroup);
    let reference = fx.graph.add_child(group, features::ITEMS, NodeKind::FormField);
    add_path(&mut fx.graph, reference, &["List", "Ref"]);

    let changes = fx.graph.take_changes();
    assert!(changes.len() >= 3);

    // Several changes under one table collapse to a single evaluation
    let result = engine.recheck(&fx.graph, &changes, &cancel);
    assert_eq!(result.targets_checked, 1);
    assert!(result.is_clean());
}

#[test]
fn test_recheck_after_removing_ref_field() {
    let mut fx = products();
    let reference = fx.graph.add_child(fx.table, features::ITEMS, NodeKind::FormField);
    add_path(&mut fx.graph, reference, &["List", "Ref"]);
    fx.graph.take_changes();

    let engine = engine();
    let cancel = CancellationToken::new();
    assert!(engine.scan(&fx.graph, &cancel).is_clean());

    assert!(fx.graph.remove(reference));
    let changes = fx.graph.take_changes();
    let result = engine.recheck(&fx.graph, &changes, &cancel);
    assert_eq!(result.targets_checked, 1);
    assert_eq!(
        result.diagnostics[0].check_id,
        ids::FORM_LIST_FIELD_REF_NOT_ADDED
    );
}

#[test]
fn test_removed_table_is_not_evaluated() {
    let mut fx = products();
    let path = fx.graph.single(fx.table, features::DATA_PATH).unwrap();
    fx.graph.set_list(path, features::SEGMENTS, &["List", "Other"]);
    assert!(fx.graph.remove(fx.table));

    let changes = fx.graph.take_changes();
    let result = engine().recheck(&fx.graph, &changes, &CancellationToken::new());
    assert_eq!(result.targets_checked, 0);
    assert!(!result.has_failures());
}

#[test]
fn test_schema_edit_outside_form_is_not_tracked() {
    // Main table fields live in another document; the form is not notified
    let mut fx = products();
    let view = fx.graph.roots()[0];
    let field = fx.graph.add_child(view, features::FIELDS, NodeKind::DbViewFieldDef);
    fx.graph.set_str(field, features::NAME, "Description");

    let changes = fx.graph.take_changes();
    let session = engine().registry().collect_all(&fx.graph, &changes);
    assert!(session.is_empty());
}

#[test]
fn test_module_edit_rechecks_that_module_only() {
    let mut graph = Graph::new();
    let mut modules = Vec::new();
    for name in ["First", "Second"] {
        let module = graph.add_root(NodeKind::Module);
        graph.set_str(module, features::NAME, name);
        graph.add_child(module, features::METHODS, NodeKind::Method);
        modules.push(module);
    }
    graph.take_changes();

    let method = graph.nodes(modules[1], features::METHODS)[0];
    let statement = graph.add_child(method, features::STATEMENTS, NodeKind::SelfReference);
    graph.set_str(statement, features::KEYWORD, "ThisObject");
    graph.set_int(statement, features::LINE, 4);

    let changes = graph.take_changes();
    let result = engine().recheck(&graph, &changes, &CancellationToken::new());
    assert_eq!(result.targets_checked, 1);
    assert_eq!(result.diagnostics.len(), 1);
    assert_eq!(result.diagnostics[0].check_id, ids::SELF_REFERENCE);
    assert_eq!(result.diagnostics[0].location.line, Some(4));
}

#[test]
fn test_form_attribute_edit_rechecks_form_module() {
    let mut graph = Graph::new();
    let form = graph.add_root(NodeKind::Form);
    let module = graph.set_child(form, features::MODULE, NodeKind::Module);
    let method = graph.add_child(module, features::METHODS, NodeKind::Method);
    let statement = graph.add_child(method, features::STATEMENTS, NodeKind::SelfReference);
    graph.set_str(statement, features::KEYWORD, "ЭтотОбъект");
    graph.set_str(statement, features::PROPERTY, "Object");
    graph.take_changes();

    let engine = engine();
    let cancel = CancellationToken::new();
    assert!(engine.scan(&graph, &cancel).is_clean());

    // Declaring the attribute makes the reference redundant
    let attr = graph.add_child(form, features::ATTRIBUTES, NodeKind::FormAttribute);
    graph.set_str(attr, features::NAME, "Object");

    let changes = graph.take_changes();
    let result = engine.recheck(&graph, &changes, &cancel);
    assert_eq!(result.targets_checked, 1);
    assert_eq!(result.diagnostics.len(), 1);
}

#[test]
fn test_attribute_becoming_dynamic_list_rechecks_table() {
    let mut graph = Graph::new();
    let view = graph.add_root(NodeKind::DbViewDef);
    graph.set_str(view, features::URI, "Catalog.Products");
    let field = graph.add_child(view, features::FIELDS, NodeKind::DbViewFieldDef);
    graph.set_str(field, features::NAME, "Ref");

    let form = graph.add_root(NodeKind::Form);
    let attr = graph.add_child(form, features::ATTRIBUTES, NodeKind::FormAttribute);
    graph.set_str(attr, features::NAME, "List");
    let table = graph.add_child(form, features::ITEMS, NodeKind::Table);
    add_path(&mut graph, table, &["List"]);
    let code = graph.add_child(table, features::ITEMS, NodeKind::FormField);
    add_path(&mut graph, code, &["List", "Code"]);
    graph.take_changes();

    let engine = engine();
    let cancel = CancellationToken::new();
    assert!(engine.scan(&graph, &cancel).is_clean());

    let ext = graph.set_child(attr, features::EXT_INFO, NodeKind::DynamicListExtInfo);
    let proxy = graph.add_proxy(NodeKind::DbViewDef, "Catalog.Products");
    graph.set_reference(ext, features::MAIN_TABLE, proxy);
    assert_eq!(engine.scan(&graph, &cancel).diagnostics.len(), 1);

    let changes = graph.take_changes();
    let session = engine.registry().collect_all(&graph, &changes);
    assert_eq!(
        session.pending_for(ids::FORM_LIST_FIELD_REF_NOT_ADDED),
        vec![table]
    );

    let result = engine.recheck(&graph, &changes, &cancel);
    assert_eq!(result.targets_checked, 1);
    assert_eq!(result.diagnostics.len(), 1);
    assert_eq!(result.diagnostics[0].location.node, table);
}

#[test]
fn test_main_table_change_rechecks_table() {
    let mut fx = products();
    let engine = engine();
    let cancel = CancellationToken::new();
    assert_eq!(engine.scan(&fx.graph, &cancel).diagnostics.len(), 1);

    // Point the list at another schema
    let other = fx.graph.add_root(NodeKind::DbViewDef);
    fx.graph.set_str(other, features::URI, "Catalog.Prices");
    let field = fx.graph.add_child(other, features::FIELDS, NodeKind::DbViewFieldDef);
    fx.graph.set_str(field, features::NAME, "Ref");
    let attr = fx.graph.nodes(fx.form, features::ATTRIBUTES)[0];
    let ext = fx.graph.single(attr, features::EXT_INFO).unwrap();
    let proxy = fx.graph.add_proxy(NodeKind::DbViewDef, "Catalog.Prices");
    fx.graph.set_reference(ext, features::MAIN_TABLE, proxy);

    let changes = fx.graph.take_changes();
    let result = engine.recheck(&fx.graph, &changes, &cancel);
    assert_eq!(result.targets_checked, 1);
    assert_eq!(result.diagnostics[0].location.node, fx.table);
}

#[test]
fn test_attribute_rename_rechecks_list_table() {
    // A plain attribute named like the table hides the dynamic list
    let mut fx = products();
    let dynamic = fx.graph.nodes(fx.form, features::ATTRIBUTES)[0];
    fx.graph.set_str(dynamic, features::NAME, "Items");
    let plain = fx
        .graph
        .add_child(fx.form, features::ATTRIBUTES, NodeKind::FormAttribute);
    fx.graph.set_str(plain, features::NAME, "List");
    fx.graph.take_changes();

    let engine = engine();
    let cancel = CancellationToken::new();
    assert!(engine.scan(&fx.graph, &cancel).is_clean());

    fx.graph.set_str(plain, features::NAME, "Plain");
    let changes = fx.graph.take_changes();
    let result = engine.recheck(&fx.graph, &changes, &cancel);
    assert_eq!(result.targets_checked, 1);
    assert_eq!(result.diagnostics.len(), 1);
    assert_eq!(result.diagnostics[0].location.node, fx.table);
}

#[test]
fn test_form_attribute_rename_rechecks_form_module() {
    let mut graph = Graph::new();
    let form = graph.add_root(NodeKind::Form);
    let attr = graph.add_child(form, features::ATTRIBUTES, NodeKind::FormAttribute);
    graph.set_str(attr, features::NAME, "Other");
    let module = graph.set_child(form, features::MODULE, NodeKind::Module);
    let method = graph.add_child(module, features::METHODS, NodeKind::Method);
    let statement = graph.add_child(method, features::STATEMENTS, NodeKind::SelfReference);
    graph.set_str(statement, features::KEYWORD, "ThisObject");
    graph.set_str(statement, features::PROPERTY, "Object");
    graph.take_changes();

    let engine = engine();
    let cancel = CancellationToken::new();
    assert!(engine.scan(&graph, &cancel).is_clean());

    graph.set_str(attr, features::NAME, "Object");
    assert_eq!(engine.scan(&graph, &cancel).diagnostics.len(), 1);

    let changes = graph.take_changes();
    let result = engine.recheck(&graph, &changes, &cancel);
    assert_eq!(result.targets_checked, 1);
    assert_eq!(result.diagnostics.len(), 1);
    assert_eq!(result.diagnostics[0].location.node, statement);
}
