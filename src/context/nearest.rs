//! Collector that marks the nearest enclosing root of a given kind

use super::{ChangeEvent, ContextCollector, ContextSink, FeatureChange};
use crate::model::{Graph, NodeId, NodeKind};
use std::fmt;
use std::sync::Arc;

/// Extra lookup tried when neither walk finds a root
pub type RootFinder = Arc<dyn Fn(&Graph, NodeId) -> Vec<NodeId> + Send + Sync>;

/// Cheap test a root must pass before it is marked dirty
pub type Precondition = Arc<dyn Fn(&Graph, NodeId) -> bool + Send + Sync>;

/// Finds the checkable root affected by a change
///
/// Lookup order, first hit wins:
/// 1. the changed node or its nearest container of the root kind;
/// 2. when enabled, one level down: the added child if it is of the root
///    kind, else the changed node's first direct child of that kind;
/// 3. the registered fallbacks, in order.
///
/// The root is always re-derived from the graph; the event subject is only
/// the starting point. Changes on nodes that are no longer attached to a
/// root are skipped.
#[derive(Clone)]
pub struct NearestRootCollector {
    root: NodeKind,
    look_down: bool,
    fallbacks: Vec<RootFinder>,
    precondition: Option<Precondition>,
}

impl NearestRootCollector {
    pub fn new(root: NodeKind) -> Self {
        Self {
            root,
            look_down: false,
            fallbacks: Vec::new(),
            precondition: None,
        }
    }

    /// Also look one level below the changed node
    pub fn with_look_down(mut self) -> Self {
        self.look_down = true;
        self
    }

    pub fn with_fallback<F>(mut self, finder: F) -> Self
    where
        F: Fn(&Graph, NodeId) -> Vec<NodeId> + Send + Sync + 'static,
    {
        self.fallbacks.push(Arc::new(finder));
        self
    }

    pub fn with_precondition<F>(mut self, precondition: F) -> Self
    where
        F: Fn(&Graph, NodeId) -> bool + Send + Sync + 'static,
    {
        self.precondition = Some(Arc::new(precondition));
        self
    }

    pub fn root_kind(&self) -> NodeKind {
        self.root
    }

    /// Roots affected by a change, before the precondition
    pub fn find_roots(&self, graph: &Graph, change: &FeatureChange) -> Vec<NodeId> {
        let node = change.node;
        if let Some(up) = graph.ancestors(node).find(|&n| graph.is_kind(n, self.root)) {
            return vec![up];
        }

        if self.look_down {
            // An added root is the one that changed; otherwise the first one
            let added = match change.event {
                ChangeEvent::Added { child, .. } if graph.parent(child) == Some(node) => {
                    Some(child)
                }
                _ => None,
            };
            if let Some(down) = added.filter(|&c| graph.is_kind(c, self.root)).or_else(|| {
                graph
                    .contents(node)
                    .iter()
                    .copied()
                    .find(|&c| graph.is_kind(c, self.root))
            }) {
                return vec![down];
            }
        }

        for finder in &self.fallbacks {
            let found = finder(graph, node);
            if !found.is_empty() {
                return found;
            }
        }
        Vec::new()
    }
}

impl ContextCollector for NearestRootCollector {
    fn collect(&self, graph: &Graph, change: &FeatureChange, sink: &mut ContextSink<'_>) {
        if let Err(err) = graph.top_container(change.node) {
            log::debug!("{}: skipping change of '{}': {}", sink.check_id(), change.feature, err);
            return;
        }

        for root in self.find_roots(graph, change) {
            let passes = self
                .precondition
                .as_ref()
                .map_or(true, |precondition| precondition(graph, root));
            if passes {
                sink.add_model_check(root);
            } else {
                log::debug!(
                    "{}: {} does not qualify as a checkable root",
                    sink.check_id(),
                    graph.describe(root)
                );
            }
        }
    }
}

impl fmt::Debug for NearestRootCollector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NearestRootCollector")
            .field("root", &self.root)
            .field("look_down", &self.look_down)
            .field("fallbacks", &self.fallbacks.len())
            .field("precondition", &self.precondition.is_some())
            .finish()
    }
}
