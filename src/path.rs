//! Data paths and identity-reference matching
//!
//! A form field is bound to the data schema through a data path such as
//! `List.Ref`. The identity matcher answers one question: does a path end in
//! the object's own reference field?
//!
//! Only the last segment is compared, case-sensitively, against a fixed set of
//! accepted spellings. There is no schema resolution, so a path that ends in
//! `Ref` inside an unrelated nested structure also matches. That trade keeps
//! matching O(1) per path.

use crate::model::{features, Graph, NodeId, NodeKind};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Default accepted spellings of the identity field
pub const DEFAULT_IDENTITY_NAMES: [&str; 2] = ["Ref", "Ссылка"];

/// Ordered sequence of path segments; zero segments means "unset"
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DataPath {
    segments: Vec<String>,
}

impl DataPath {
    pub fn new<I, S>(segments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            segments: segments.into_iter().map(Into::into).collect(),
        }
    }

    /// Parse a dotted path such as `List.Ref`
    pub fn from_dotted(path: &str) -> Self {
        Self::new(path.split('.').map(str::trim).filter(|s| !s.is_empty()))
    }

    /// Read the segments of a data path node
    ///
    /// Returns `None` when the node is not a data path.
    pub fn from_node(graph: &Graph, node: NodeId) -> Option<Self> {
        if !graph.is_kind(node, NodeKind::DataPath) {
            return None;
        }
        let segments = graph
            .list_attr(node, features::SEGMENTS)
            .map(<[String]>::to_vec)
            .unwrap_or_default();
        Some(Self { segments })
    }

    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    pub fn first(&self) -> Option<&str> {
        self.segments.first().map(String::as_str)
    }

    pub fn last(&self) -> Option<&str> {
        self.segments.last().map(String::as_str)
    }

    pub fn is_unset(&self) -> bool {
        self.segments.is_empty()
    }
}

impl fmt::Display for DataPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.segments.join("."))
    }
}

/// Matches paths that terminate at the identity reference
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdentityMatcher {
    accepted: Vec<String>,
}

impl Default for IdentityMatcher {
    fn default() -> Self {
        Self::new(DEFAULT_IDENTITY_NAMES)
    }
}

impl IdentityMatcher {
    /// Build a matcher from the accepted terminal spellings
    ///
    /// The first spelling is the primary one, used as the schema field name.
    pub fn new<I, S>(accepted: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            accepted: accepted.into_iter().map(Into::into).collect(),
        }
    }

    pub fn accepted(&self) -> &[String] {
        &self.accepted
    }

    /// Primary spelling of the identity field
    pub fn primary(&self) -> Option<&str> {
        self.accepted.first().map(String::as_str)
    }

    pub fn is_identity_name(&self, name: &str) -> bool {
        self.accepted.iter().any(|a| a == name)
    }

    /// Whether the path's last segment is an accepted spelling
    pub fn matches(&self, path: &DataPath) -> bool {
        path.last().is_some_and(|last| self.is_identity_name(last))
    }
}
