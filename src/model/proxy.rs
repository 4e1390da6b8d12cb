//! Proxy resolution
//!
//! A proxy is a placeholder node standing for an object that lives in
//! another document. The graph asks a [`ProxyResolver`] for the real node the
//! first time the proxy is read and caches the answer.

use super::features;
use super::graph::{Graph, NodeId, NodeKind};
use thiserror::Error;

/// Proxy could not be resolved
///
/// Callers treat this as "feature absent", never as a fatal error.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ResolutionFailure {
    #[error("unresolved proxy '{uri}'")]
    Unresolved { uri: String },

    #[error("proxy '{uri}' resolved to {found}, expected {expected}")]
    KindMismatch {
        uri: String,
        expected: NodeKind,
        found: NodeKind,
    },

    #[error("unknown node {0}")]
    UnknownNode(NodeId),
}

/// Resolves proxy URIs to nodes of the same graph
pub trait ProxyResolver: Send + Sync {
    /// Find the node addressed by `uri`
    fn resolve(&self, graph: &Graph, uri: &str) -> Result<NodeId, ResolutionFailure>;
}

/// Default resolver: looks the URI up among the graph's registered roots
#[derive(Debug, Default, Clone, Copy)]
pub struct UriResolver;

impl ProxyResolver for UriResolver {
    fn resolve(&self, graph: &Graph, uri: &str) -> Result<NodeId, ResolutionFailure> {
        graph
            .roots()
            .iter()
            .copied()
            .find(|&root| graph.str_attr(root, features::URI) == Some(uri))
            .ok_or_else(|| ResolutionFailure::Unresolved {
                uri: uri.to_string(),
            })
    }
}
