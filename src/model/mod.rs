//! Read-mostly object graph the checks run against
//!
//! The graph is owned and edited by the host's modeling layer. Checks only
//! read it, resolving proxies lazily as a side effect.

mod change;
pub mod features;
mod graph;
pub mod loader;
mod proxy;

pub use change::{ChangeEvent, FeatureChange};
pub use graph::{
    Ancestors, DetachedNodeError, Graph, NodeData, NodeId, NodeKind, Owner, Scalar, Value,
};
pub use loader::{load_file, load_str, LoadError, ModelFormat};
pub use proxy::{ProxyResolver, ResolutionFailure, UriResolver};
