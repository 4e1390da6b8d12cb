//! Arena-backed object graph
//!
//! Nodes live in a single arena and are addressed by [`NodeId`]. Ownership
//! flows strictly from container to contained: a node's `owner` is a plain
//! back reference used for upward traversal, never for lifetime.

use super::change::{ChangeEvent, FeatureChange};
use super::features;
use super::proxy::{ProxyResolver, ResolutionFailure, UriResolver};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::{Arc, OnceLock};
use thiserror::Error;

/// Index of a node inside its [`Graph`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct NodeId(usize);

impl NodeId {
    pub fn index(self) -> usize {
        self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Closed set of node kinds understood by the shipped checks
///
/// New kinds are added here; checks dispatch with `match`, never with
/// string comparisons on type names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeKind {
    Form,
    Table,
    FormGroup,
    FormField,
    FormAttribute,
    DataPath,
    DynamicListExtInfo,
    ColumnGroupExtInfo,
    DbViewDef,
    DbViewFieldDef,
    Module,
    Method,
    SelfReference,
}

impl NodeKind {
    pub fn as_str(self) -> &'static str {
        match self {
            NodeKind::Form => "form",
            NodeKind::Table => "table",
            NodeKind::FormGroup => "form_group",
            NodeKind::FormField => "form_field",
            NodeKind::FormAttribute => "form_attribute",
            NodeKind::DataPath => "data_path",
            NodeKind::DynamicListExtInfo => "dynamic_list_ext_info",
            NodeKind::ColumnGroupExtInfo => "column_group_ext_info",
            NodeKind::DbViewDef => "db_view_def",
            NodeKind::DbViewFieldDef => "db_view_field_def",
            NodeKind::Module => "module",
            NodeKind::Method => "method",
            NodeKind::SelfReference => "self_reference",
        }
    }

    /// Kinds that hold form items under the `items` feature
    pub fn is_item_container(self) -> bool {
        matches!(self, NodeKind::Form | NodeKind::Table | NodeKind::FormGroup)
    }

    /// Containment feature a node of this kind normally sits in
    pub fn default_feature(self) -> Option<&'static str> {
        match self {
            NodeKind::Table | NodeKind::FormGroup | NodeKind::FormField => Some(features::ITEMS),
            NodeKind::FormAttribute => Some(features::ATTRIBUTES),
            NodeKind::DataPath => Some(features::DATA_PATH),
            NodeKind::DynamicListExtInfo | NodeKind::ColumnGroupExtInfo => {
                Some(features::EXT_INFO)
            }
            NodeKind::DbViewFieldDef => Some(features::FIELDS),
            NodeKind::Module => Some(features::MODULE),
            NodeKind::Method => Some(features::METHODS),
            NodeKind::SelfReference => Some(features::STATEMENTS),
            NodeKind::Form | NodeKind::DbViewDef => None,
        }
    }
}

impl fmt::Display for NodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for NodeKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let kind = match s.to_lowercase().replace('-', "_").as_str() {
            "form" => NodeKind::Form,
            "table" => NodeKind::Table,
            "form_group" | "group" => NodeKind::FormGroup,
            "form_field" | "field" => NodeKind::FormField,
            "form_attribute" | "attribute" => NodeKind::FormAttribute,
            "data_path" | "abstract_data_path" => NodeKind::DataPath,
            "dynamic_list_ext_info" => NodeKind::DynamicListExtInfo,
            "column_group_ext_info" => NodeKind::ColumnGroupExtInfo,
            "db_view_def" => NodeKind::DbViewDef,
            "db_view_field_def" => NodeKind::DbViewFieldDef,
            "module" => NodeKind::Module,
            "method" => NodeKind::Method,
            "self_reference" => NodeKind::SelfReference,
            _ => return Err(format!("Unknown node kind: {}", s)),
        };
        Ok(kind)
    }
}

/// Scalar feature value
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Scalar {
    Str(String),
    Bool(bool),
    Int(i64),
    List(Vec<String>),
}

/// Value stored under a feature name
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Value {
    Node(NodeId),
    Nodes(Vec<NodeId>),
    Scalar(Scalar),
}

impl Value {
    /// Nodes referenced by this value (empty for scalars)
    pub fn nodes(&self) -> &[NodeId] {
        match self {
            Value::Node(id) => std::slice::from_ref(id),
            Value::Nodes(ids) => ids,
            Value::Scalar(_) => &[],
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Scalar(Scalar::Str(s)) => Some(s),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Scalar(Scalar::Bool(b)) => Some(*b),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Scalar(Scalar::Int(i)) => Some(*i),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[String]> {
        match self {
            Value::Scalar(Scalar::List(items)) => Some(items),
            _ => None,
        }
    }
}

/// Back reference from a contained node to its container
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Owner {
    pub node: NodeId,
    pub feature: String,
}

#[derive(Debug)]
struct ProxyCell {
    uri: String,
    resolved: OnceLock<Result<NodeId, ResolutionFailure>>,
}

/// Storage for one node
#[derive(Debug)]
pub struct NodeData {
    kind: NodeKind,
    owner: Option<Owner>,
    contents: Vec<NodeId>,
    features: BTreeMap<String, Value>,
    proxy: Option<ProxyCell>,
}

impl NodeData {
    fn new(kind: NodeKind) -> Self {
        Self {
            kind,
            owner: None,
            contents: Vec::new(),
            features: BTreeMap::new(),
            proxy: None,
        }
    }

    pub fn kind(&self) -> NodeKind {
        self.kind
    }

    pub fn owner(&self) -> Option<&Owner> {
        self.owner.as_ref()
    }

    pub fn features(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.features.iter().map(|(k, v)| (k.as_str(), v))
    }
}

/// Node has no owner chain ending at a registered root
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("node {node} is not attached to a root container")]
pub struct DetachedNodeError {
    pub node: NodeId,
}

/// The object graph under analysis
///
/// Edits go through `&mut Graph` and are recorded as [`FeatureChange`]s;
/// evaluation only ever needs `&Graph`. Proxy answers are cached per proxy
/// with a `OnceLock`, so concurrent readers converge on the same result.
/// The caches are dropped only when the set of roots or a `uri` changes,
/// which is everything a [`ProxyResolver`] may look at.
pub struct Graph {
    nodes: Vec<NodeData>,
    roots: Vec<NodeId>,
    proxies: Vec<NodeId>,
    resolver: Arc<dyn ProxyResolver>,
    changes: Vec<FeatureChange>,
    recording: bool,
}

impl Default for Graph {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Graph {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Graph")
            .field("nodes", &self.nodes.len())
            .field("roots", &self.roots)
            .field("proxies", &self.proxies.len())
            .field("pending_changes", &self.changes.len())
            .finish()
    }
}

impl Graph {
    /// Create an empty graph resolving proxies against its own roots
    pub fn new() -> Self {
        Self {
            nodes: Vec::new(),
            roots: Vec::new(),
            proxies: Vec::new(),
            resolver: Arc::new(UriResolver),
            changes: Vec::new(),
            recording: true,
        }
    }

    /// Use a custom proxy resolver
    pub fn with_resolver(mut self, resolver: Arc<dyn ProxyResolver>) -> Self {
        self.resolver = resolver;
        self.invalidate_proxies();
        self
    }

    /// Number of nodes in the arena (attached or not)
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    // ---------------------------------------------------------------------
    // Edits
    // ---------------------------------------------------------------------

    fn push(&mut self, data: NodeData) -> NodeId {
        let id = NodeId(self.nodes.len());
        self.nodes.push(data);
        id
    }

    fn record(&mut self, node: NodeId, feature: &str, event: ChangeEvent) {
        if self.recording {
            self.changes.push(FeatureChange::new(node, feature, event));
        }
    }

    /// Forget every cached proxy answer
    ///
    /// Called when roots come or go and when a `uri` changes.
    fn invalidate_proxies(&mut self) {
        let Self { nodes, proxies, .. } = self;
        for id in proxies.iter() {
            if let Some(cell) = nodes[id.0].proxy.as_mut() {
                cell.resolved = OnceLock::new();
            }
        }
    }

    /// Turn change recording on or off, returning the previous setting
    pub fn set_recording(&mut self, recording: bool) -> bool {
        std::mem::replace(&mut self.recording, recording)
    }

    /// Add a root document (Form, DbViewDef, Module, ...)
    pub fn add_root(&mut self, kind: NodeKind) -> NodeId {
        let id = self.push(NodeData::new(kind));
        self.roots.push(id);
        self.invalidate_proxies();
        id
    }

    /// Detach the nodes a feature contains before its value is replaced
    fn release(&mut self, parent: NodeId, feature: &str) {
        let held = match self.nodes[parent.0].features.get(feature) {
            Some(value) => value.nodes().to_vec(),
            None => return,
        };
        for child in held {
            let contained = self.nodes[child.0]
                .owner
                .as_ref()
                .is_some_and(|o| o.node == parent && o.feature == feature);
            if contained {
                self.detach(child);
            }
        }
    }

    /// Append a contained node to a many-valued feature
    ///
    /// A single value already stored under `feature` is replaced, and a node
    /// it contained is detached.
    pub fn add_child(&mut self, parent: NodeId, feature: &str, kind: NodeKind) -> NodeId {
        if !matches!(
            self.nodes[parent.0].features.get(feature),
            Some(Value::Nodes(_)) | None
        ) {
            self.release(parent, feature);
        }

        let mut data = NodeData::new(kind);
        data.owner = Some(Owner {
            node: parent,
            feature: feature.to_string(),
        });
        let child = self.push(data);

        let parent_data = &mut self.nodes[parent.0];
        let index = match parent_data.features.get_mut(feature) {
            Some(Value::Nodes(ids)) => {
                ids.push(child);
                ids.len() - 1
            }
            _ => {
                parent_data
                    .features
                    .insert(feature.to_string(), Value::Nodes(vec![child]));
                0
            }
        };
        parent_data.contents.push(child);

        self.record(parent, feature, ChangeEvent::Added { child, index });
        child
    }

    /// Set a single-valued containment feature, detaching any previous value
    pub fn set_child(&mut self, parent: NodeId, feature: &str, kind: NodeKind) -> NodeId {
        self.release(parent, feature);

        let mut data = NodeData::new(kind);
        data.owner = Some(Owner {
            node: parent,
            feature: feature.to_string(),
        });
        let child = self.push(data);

        let parent_data = &mut self.nodes[parent.0];
        parent_data
            .features
            .insert(feature.to_string(), Value::Node(child));
        parent_data.contents.push(child);

        self.record(parent, feature, ChangeEvent::Set);
        child
    }

    /// Create a free-standing proxy node of the expected kind
    pub fn add_proxy(&mut self, kind: NodeKind, uri: &str) -> NodeId {
        let mut data = NodeData::new(kind);
        data.proxy = Some(ProxyCell {
            uri: uri.to_string(),
            resolved: OnceLock::new(),
        });
        let id = self.push(data);
        self.proxies.push(id);
        id
    }

    /// Point a non-containment feature at another node
    pub fn set_reference(&mut self, node: NodeId, feature: &str, target: NodeId) {
        self.release(node, feature);
        self.nodes[node.0]
            .features
            .insert(feature.to_string(), Value::Node(target));
        self.record(node, feature, ChangeEvent::Set);
    }

    /// Assign a scalar feature
    pub fn set_attr(&mut self, node: NodeId, feature: &str, value: Scalar) {
        self.release(node, feature);
        self.nodes[node.0]
            .features
            .insert(feature.to_string(), Value::Scalar(value));
        self.record(node, feature, ChangeEvent::Set);
        if feature == features::URI {
            self.invalidate_proxies();
        }
    }

    pub fn set_str(&mut self, node: NodeId, feature: &str, value: &str) {
        self.set_attr(node, feature, Scalar::Str(value.to_string()));
    }

    pub fn set_bool(&mut self, node: NodeId, feature: &str, value: bool) {
        self.set_attr(node, feature, Scalar::Bool(value));
    }

    pub fn set_int(&mut self, node: NodeId, feature: &str, value: i64) {
        self.set_attr(node, feature, Scalar::Int(value));
    }

    pub fn set_list<S: AsRef<str>>(&mut self, node: NodeId, feature: &str, values: &[S]) {
        let values = values.iter().map(|s| s.as_ref().to_string()).collect();
        self.set_attr(node, feature, Scalar::List(values));
    }

    /// Clear a feature; contained nodes it held become detached
    pub fn unset(&mut self, node: NodeId, feature: &str) {
        let Some(old) = self.nodes[node.0].features.remove(feature) else {
            return;
        };
        for child in old.nodes().to_vec() {
            let contained = self.nodes[child.0]
                .owner
                .as_ref()
                .is_some_and(|o| o.node == node && o.feature == feature);
            if contained {
                self.nodes[child.0].owner = None;
                self.nodes[node.0].contents.retain(|&c| c != child);
            }
        }
        self.record(node, feature, ChangeEvent::Unset);
        if feature == features::URI {
            self.invalidate_proxies();
        }
    }

    /// Detach a node (and its subtree) from its container
    ///
    /// Returns `false` if the node was neither contained nor a root.
    pub fn remove(&mut self, node: NodeId) -> bool {
        if let Some(pos) = self.roots.iter().position(|&r| r == node) {
            self.roots.remove(pos);
            self.invalidate_proxies();
            return true;
        }
        let Some(owner) = self.nodes.get(node.0).and_then(|n| n.owner.clone()) else {
            return false;
        };
        let index = self.detach(node).unwrap_or(0);
        self.record(
            owner.node,
            &owner.feature,
            ChangeEvent::Removed { child: node, index },
        );
        true
    }

    /// Unlink a contained node, returning its index inside the owning feature
    fn detach(&mut self, node: NodeId) -> Option<usize> {
        let owner = self.nodes[node.0].owner.take()?;
        let parent = &mut self.nodes[owner.node.0];
        parent.contents.retain(|&c| c != node);

        match parent.features.get_mut(&owner.feature) {
            Some(Value::Nodes(ids)) => {
                let index = ids.iter().position(|&c| c == node)?;
                ids.remove(index);
                Some(index)
            }
            Some(Value::Node(id)) if *id == node => {
                parent.features.remove(&owner.feature);
                Some(0)
            }
            _ => None,
        }
    }

    /// Drain recorded change notifications
    pub fn take_changes(&mut self) -> Vec<FeatureChange> {
        std::mem::take(&mut self.changes)
    }

    pub fn pending_changes(&self) -> &[FeatureChange] {
        &self.changes
    }

    // ---------------------------------------------------------------------
    // Traversal
    // ---------------------------------------------------------------------

    pub fn node(&self, id: NodeId) -> Option<&NodeData> {
        self.nodes.get(id.0)
    }

    pub fn kind(&self, id: NodeId) -> Option<NodeKind> {
        self.node(id).map(|n| n.kind)
    }

    pub fn is_kind(&self, id: NodeId, kind: NodeKind) -> bool {
        self.kind(id) == Some(kind)
    }

    pub fn roots(&self) -> &[NodeId] {
        &self.roots
    }

    pub fn is_root(&self, id: NodeId) -> bool {
        self.roots.contains(&id)
    }

    /// Direct children in declaration order (never recurses)
    pub fn contents(&self, id: NodeId) -> &[NodeId] {
        self.node(id).map(|n| n.contents.as_slice()).unwrap_or(&[])
    }

    /// Owning container, if any
    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.node(id)?.owner.as_ref().map(|o| o.node)
    }

    /// The node itself followed by its containers, innermost first
    pub fn ancestors(&self, id: NodeId) -> Ancestors<'_> {
        Ancestors {
            graph: self,
            next: self.node(id).map(|_| id),
            budget: self.nodes.len(),
        }
    }

    /// Outermost container of a node
    pub fn top_container(&self, id: NodeId) -> Result<NodeId, DetachedNodeError> {
        let top = self
            .ancestors(id)
            .last()
            .ok_or(DetachedNodeError { node: id })?;
        if self.is_root(top) {
            Ok(top)
        } else {
            Err(DetachedNodeError { node: id })
        }
    }

    /// Feature value; unknown names are simply absent
    pub fn feature(&self, id: NodeId, name: &str) -> Option<&Value> {
        self.node(id)?.features.get(name)
    }

    /// Nodes held by a feature (empty if absent or scalar)
    pub fn nodes(&self, id: NodeId, feature: &str) -> &[NodeId] {
        self.feature(id, feature).map(Value::nodes).unwrap_or(&[])
    }

    /// First node held by a feature
    pub fn single(&self, id: NodeId, feature: &str) -> Option<NodeId> {
        self.nodes(id, feature).first().copied()
    }

    pub fn str_attr(&self, id: NodeId, feature: &str) -> Option<&str> {
        self.feature(id, feature)?.as_str()
    }

    pub fn bool_attr(&self, id: NodeId, feature: &str) -> Option<bool> {
        self.feature(id, feature)?.as_bool()
    }

    pub fn int_attr(&self, id: NodeId, feature: &str) -> Option<i64> {
        self.feature(id, feature)?.as_int()
    }

    pub fn list_attr(&self, id: NodeId, feature: &str) -> Option<&[String]> {
        self.feature(id, feature)?.as_list()
    }

    pub fn name(&self, id: NodeId) -> Option<&str> {
        self.str_attr(id, features::NAME)
    }

    /// Whether the node is a proxy placeholder
    pub fn is_proxy(&self, id: NodeId) -> bool {
        self.node(id).is_some_and(|n| n.proxy.is_some())
    }

    pub fn proxy_uri(&self, id: NodeId) -> Option<&str> {
        self.node(id)?.proxy.as_ref().map(|p| p.uri.as_str())
    }

    /// Resolve a proxy to its real node; non-proxies resolve to themselves
    ///
    /// The answer is computed at most once per proxy until the roots or a
    /// `uri` change.
    pub fn resolve(&self, id: NodeId) -> Result<NodeId, ResolutionFailure> {
        let data = self.node(id).ok_or(ResolutionFailure::UnknownNode(id))?;
        let Some(cell) = &data.proxy else {
            return Ok(id);
        };

        cell.resolved
            .get_or_init(|| {
                let target = self.resolver.resolve(self, &cell.uri)?;
                match self.kind(target) {
                    Some(found) if found == data.kind => Ok(target),
                    Some(found) => Err(ResolutionFailure::KindMismatch {
                        uri: cell.uri.clone(),
                        expected: data.kind,
                        found,
                    }),
                    None => Err(ResolutionFailure::UnknownNode(target)),
                }
            })
            .clone()
    }

    /// Follow a single-valued reference and resolve it, `None` on failure
    pub fn resolve_single(&self, id: NodeId, feature: &str) -> Option<NodeId> {
        let target = self.single(id, feature)?;
        match self.resolve(target) {
            Ok(resolved) => Some(resolved),
            Err(failure) => {
                log::debug!("{} of {}: {}", feature, id, failure);
                None
            }
        }
    }

    /// Pre-order walk of a subtree, the starting node first
    pub fn preorder(&self, id: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        if self.node(id).is_none() {
            return out;
        }
        let mut stack = vec![id];
        while let Some(next) = stack.pop() {
            out.push(next);
            stack.extend(self.contents(next).iter().rev().copied());
        }
        out
    }

    /// Human-readable containment path, e.g. `form 'Orders' / table 'List'`
    pub fn describe(&self, id: NodeId) -> String {
        let mut segments: Vec<String> = self
            .ancestors(id)
            .map(|n| match (self.kind(n), self.name(n)) {
                (Some(kind), Some(name)) => format!("{} '{}'", kind, name),
                (Some(kind), None) => kind.to_string(),
                (None, _) => n.to_string(),
            })
            .collect();
        segments.reverse();
        segments.join(" / ")
    }
}

/// Iterator over a node and its containers
pub struct Ancestors<'a> {
    graph: &'a Graph,
    next: Option<NodeId>,
    budget: usize,
}

impl Iterator for Ancestors<'_> {
    type Item = NodeId;

    fn next(&mut self) -> Option<NodeId> {
        let current = self.next?;
        // Containment is a tree; the budget only stops a corrupted chain.
        if self.budget == 0 {
            return None;
        }
        self.budget -= 1;
        self.next = self.graph.parent(current);
        Some(current)
    }
}
