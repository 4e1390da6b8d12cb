//! The check contract
//!
//! A check declares what it looks at in [`Check::configure`] and evaluates one
//! target node at a time in [`Check::check`], reporting through a
//! [`ResultAcceptor`]. Checks hold no per-run state, so the same instance may
//! be evaluated on several targets at once.

mod cancel;
mod definition;
mod issue;
mod params;

pub use cancel::CancellationToken;
pub use definition::{
    CheckComplexity, CheckDefinition, CollectorBinding, ConfigurationError, IssueType,
    ParameterDef, ParameterKind, TargetSpec,
};
pub use issue::{Issue, IssueCollector, ResultAcceptor, EXTRA_LINE_KEY};
pub use params::{CheckParameters, NoParameters, ParameterSource};

use crate::model::{DetachedNodeError, Graph, NodeId};
use thiserror::Error;

/// Error raised by a check during evaluation
///
/// "No issue found" is never an error; these are genuine failures that the
/// runner isolates and turns into a diagnostic.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CheckError {
    #[error("parameter '{name}' value '{value}' is not a valid {expected}")]
    InvalidParameter {
        name: String,
        value: String,
        expected: ParameterKind,
    },

    #[error("parameter '{name}' is not set")]
    MissingParameter { name: String },

    #[error("malformed model at {node}: {message}")]
    Model { node: NodeId, message: String },

    #[error(transparent)]
    Detached(#[from] DetachedNodeError),
}

/// A static-analysis check over the object graph
pub trait Check: Send + Sync {
    /// Stable check identifier (e.g., "form-list-field-ref-not-added")
    fn id(&self) -> &str;

    /// Fill in the definition; called exactly once at registration
    fn configure(&self, definition: &mut CheckDefinition);

    /// Evaluate one target node
    ///
    /// Must not mutate the graph. Long loops poll `cancel` once per sibling
    /// and return `Ok(())` early when it is set.
    fn check(
        &self,
        graph: &Graph,
        node: NodeId,
        acceptor: &mut dyn ResultAcceptor,
        params: &CheckParameters,
        cancel: &CancellationToken,
    ) -> Result<(), CheckError>;
}
