//! Model documents (YAML/JSON) loaded into a [`Graph`]
//!
//! A document is either a single root node or `{ roots: [...] }`:
//!
//! ```yaml
//! roots:
//!   - kind: form
//!     name: Products
//!     children:
//!       - kind: form_attribute
//!         name: List
//!         children:
//!           - kind: dynamic_list_ext_info
//!             refs:
//!               main_table: { kind: db_view_def, uri: Catalog.Products }
//!       - kind: table
//!         name: List
//!         children:
//!           - { kind: data_path, attrs: { segments: [List] } }
//!   - kind: db_view_def
//!     uri: Catalog.Products
//!     children:
//!       - { kind: db_view_field_def, name: Ref }
//! ```
//!
//! Children without an explicit `feature` land in the kind's default
//! containment feature.

use super::features;
use super::graph::{Graph, NodeId, NodeKind, Scalar};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::Path;
use thiserror::Error;

/// Error loading a model document
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML parse error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Unknown model file format: {0}")]
    UnknownFormat(String),

    #[error("{kind} node needs an explicit feature to be contained in {parent}")]
    MissingFeature { kind: NodeKind, parent: NodeKind },
}

/// Scalar attribute value in a document
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum ScalarDoc {
    Bool(bool),
    Int(i64),
    Str(String),
    List(Vec<String>),
}

impl From<ScalarDoc> for Scalar {
    fn from(doc: ScalarDoc) -> Self {
        match doc {
            ScalarDoc::Bool(b) => Scalar::Bool(b),
            ScalarDoc::Int(i) => Scalar::Int(i),
            ScalarDoc::Str(s) => Scalar::Str(s),
            ScalarDoc::List(items) => Scalar::List(items),
        }
    }
}

/// Cross reference to another document, always loaded as a proxy
#[derive(Debug, Clone, Deserialize)]
pub struct RefDoc {
    pub kind: NodeKind,
    pub uri: String,
}

/// One node of a model document
#[derive(Debug, Clone, Deserialize)]
pub struct NodeDoc {
    pub kind: NodeKind,

    /// Containment feature inside the parent (defaults per kind)
    #[serde(default)]
    pub feature: Option<String>,

    #[serde(default)]
    pub name: Option<String>,

    #[serde(default)]
    pub uri: Option<String>,

    #[serde(default)]
    pub attrs: BTreeMap<String, ScalarDoc>,

    #[serde(default)]
    pub refs: BTreeMap<String, RefDoc>,

    #[serde(default)]
    pub children: Vec<NodeDoc>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ModelFile {
    Many { roots: Vec<NodeDoc> },
    One(NodeDoc),
}

impl ModelFile {
    fn into_roots(self) -> Vec<NodeDoc> {
        match self {
            ModelFile::Many { roots } => roots,
            ModelFile::One(root) => vec![root],
        }
    }
}

/// Supported document encodings
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModelFormat {
    Yaml,
    Json,
}

impl ModelFormat {
    /// Pick the format from a file extension
    pub fn from_path(path: &Path) -> Result<Self, LoadError> {
        let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("");
        match ext {
            "yaml" | "yml" => Ok(ModelFormat::Yaml),
            "json" => Ok(ModelFormat::Json),
            _ => Err(LoadError::UnknownFormat(ext.to_string())),
        }
    }
}

/// Load a model file into `graph`, returning the new roots
pub fn load_file(graph: &mut Graph, path: &Path) -> Result<Vec<NodeId>, LoadError> {
    let format = ModelFormat::from_path(path)?;
    let content = std::fs::read_to_string(path)?;
    load_str(graph, &content, format)
}

/// Load model text into `graph`, returning the new roots
///
/// Loading is the initial build of the documents and is not recorded as
/// change notifications.
pub fn load_str(
    graph: &mut Graph,
    content: &str,
    format: ModelFormat,
) -> Result<Vec<NodeId>, LoadError> {
    let file: ModelFile = match format {
        ModelFormat::Yaml => serde_yaml::from_str(content)?,
        ModelFormat::Json => serde_json::from_str(content)?,
    };

    let was_recording = graph.set_recording(false);
    let result: Result<Vec<NodeId>, LoadError> = file
        .into_roots()
        .into_iter()
        .map(|doc| {
            let root = graph.add_root(doc.kind);
            fill(graph, root, doc)?;
            Ok(root)
        })
        .collect();
    graph.set_recording(was_recording);
    result
}

fn fill(graph: &mut Graph, node: NodeId, doc: NodeDoc) -> Result<(), LoadError> {
    if let Some(name) = &doc.name {
        graph.set_str(node, features::NAME, name);
    }
    if let Some(uri) = &doc.uri {
        graph.set_str(node, features::URI, uri);
    }
    for (feature, value) in doc.attrs {
        graph.set_attr(node, &feature, value.into());
    }
    for (feature, target) in doc.refs {
        let proxy = graph.add_proxy(target.kind, &target.uri);
        graph.set_reference(node, &feature, proxy);
    }

    let parent_kind = doc.kind;
    for child in doc.children {
        let feature = match child.feature.as_deref().or(child.kind.default_feature()) {
            Some(feature) => feature.to_string(),
            None => {
                return Err(LoadError::MissingFeature {
                    kind: child.kind,
                    parent: parent_kind,
                })
            }
        };
        let id = if features::is_single_valued(&feature) {
            graph.set_child(node, &feature, child.kind)
        } else {
            graph.add_child(node, &feature, child.kind)
        };
        fill(graph, id, child)?;
    }
    Ok(())
}
