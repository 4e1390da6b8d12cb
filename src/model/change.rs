//! Feature change notifications emitted by graph edits

use super::graph::NodeId;

/// What happened to a feature
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeEvent {
    /// A scalar or single-valued feature was assigned
    Set,
    /// A feature was cleared
    Unset,
    /// A node was appended to (or inserted into) a many-valued feature
    Added { child: NodeId, index: usize },
    /// A node was removed from a feature
    Removed { child: NodeId, index: usize },
}

impl ChangeEvent {
    /// Node gained or lost by this event, if any
    pub fn child(&self) -> Option<NodeId> {
        match self {
            ChangeEvent::Added { child, .. } | ChangeEvent::Removed { child, .. } => Some(*child),
            ChangeEvent::Set | ChangeEvent::Unset => None,
        }
    }
}

/// A single `(node, feature, event)` notification
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeatureChange {
    /// Node whose feature changed
    pub node: NodeId,
    /// Feature name (see [`crate::model::features`])
    pub feature: String,
    /// Change payload
    pub event: ChangeEvent,
}

impl FeatureChange {
    pub fn new(node: NodeId, feature: &str, event: ChangeEvent) -> Self {
        Self {
            node,
            feature: feature.to_string(),
            event,
        }
    }
}
