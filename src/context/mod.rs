//! Incremental context collection
//!
//! After an edit the host fires one [`FeatureChange`] per touched feature.
//! Each check's collectors map the change to the checkable roots that are now
//! dirty and add them to a [`ContextSession`]; only those roots get
//! re-evaluated.

mod nearest;

pub use crate::model::{ChangeEvent, FeatureChange};
pub use nearest::{NearestRootCollector, Precondition, RootFinder};

use crate::model::{Graph, NodeId};
use std::collections::{BTreeMap, BTreeSet};

/// Maps a feature change to dirty checkable roots
///
/// Runs synchronously at the change site and must stay cheap: an upward walk
/// or a scan of one node's children. Shapes it does not understand are
/// ignored.
pub trait ContextCollector: Send + Sync {
    fn collect(&self, graph: &Graph, change: &FeatureChange, sink: &mut ContextSink<'_>);
}

/// Dirty roots gathered for one batch of changes, per check
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ContextSession {
    pending: BTreeMap<String, BTreeSet<NodeId>>,
}

impl ContextSession {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sink that records roots on behalf of `check_id`
    pub fn sink<'a>(&'a mut self, check_id: &'a str) -> ContextSink<'a> {
        ContextSink {
            check_id,
            session: self,
        }
    }

    /// Dirty roots of one check, in node order
    pub fn pending_for(&self, check_id: &str) -> Vec<NodeId> {
        self.pending
            .get(check_id)
            .map(|roots| roots.iter().copied().collect())
            .unwrap_or_default()
    }

    /// Checks with at least one dirty root
    pub fn check_ids(&self) -> impl Iterator<Item = &str> {
        self.pending.keys().map(String::as_str)
    }

    /// Total number of (check, root) pairs
    pub fn len(&self) -> usize {
        self.pending.values().map(BTreeSet::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    pub fn merge(&mut self, other: ContextSession) {
        for (check_id, roots) in other.pending {
            self.pending.entry(check_id).or_default().extend(roots);
        }
    }
}

/// Handle a collector adds dirty roots through
pub struct ContextSink<'a> {
    check_id: &'a str,
    session: &'a mut ContextSession,
}

impl ContextSink<'_> {
    pub fn check_id(&self) -> &str {
        self.check_id
    }

    /// Mark `node` for re-evaluation by this check
    pub fn add_model_check(&mut self, node: NodeId) {
        self.session
            .pending
            .entry(self.check_id.to_string())
            .or_default()
            .insert(node);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::NodeKind;

    #[test]
    fn test_session_dedups_per_check() {
        let mut graph = Graph::new();
        let a = graph.add_root(NodeKind::Form);
        let b = graph.add_root(NodeKind::Form);

        let mut session = ContextSession::new();
        {
            let mut sink = session.sink("one");
            sink.add_model_check(b);
            sink.add_model_check(a);
            sink.add_model_check(b);
        }
        session.sink("two").add_model_check(a);

        assert_eq!(session.pending_for("one"), vec![a, b]);
        assert_eq!(session.pending_for("two"), vec![a]);
        assert!(session.pending_for("three").is_empty());
        assert_eq!(session.len(), 3);
        assert_eq!(session.check_ids().collect::<Vec<_>>(), vec!["one", "two"]);
    }

    #[test]
    fn test_merge() {
        let mut graph = Graph::new();
        let a = graph.add_root(NodeKind::Form);
        let b = graph.add_root(NodeKind::Form);

        let mut first = ContextSession::new();
        first.sink("one").add_model_check(a);
        let mut second = ContextSession::new();
        second.sink("one").add_model_check(b);

        first.merge(second);
        assert_eq!(first.pending_for("one"), vec![a, b]);
    }
}
