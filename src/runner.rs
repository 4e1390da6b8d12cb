//! Runs one check on one target, isolating failures

use crate::check::{CancellationToken, Check, CheckParameters, Issue, IssueCollector};
use crate::model::{Graph, NodeId};
use serde::Serialize;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::time::{Duration, Instant};
use thiserror::Error;

/// A check failed (error or panic) while evaluating a target
///
/// Confined to that one (check, target) pair; sibling checks and targets are
/// unaffected.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Error)]
#[error("check '{check_id}' failed on {target}: {message}")]
pub struct EvaluationFailure {
    pub check_id: String,
    pub target: NodeId,
    pub message: String,
    /// The check panicked rather than returning an error
    pub panicked: bool,
}

/// Result of one evaluation
#[derive(Debug, Clone)]
pub struct RunOutcome {
    pub check_id: String,
    pub target: NodeId,
    /// Issues in the order the check reported them
    pub issues: Vec<Issue>,
    pub failure: Option<EvaluationFailure>,
    /// Cancellation was observed after the run
    pub cancelled: bool,
    pub elapsed: Duration,
}

impl RunOutcome {
    pub fn is_ok(&self) -> bool {
        self.failure.is_none()
    }
}

/// Stateless evaluator of `(check, target)` pairs
#[derive(Debug, Default, Clone, Copy)]
pub struct CheckRunner;

impl CheckRunner {
    pub fn new() -> Self {
        Self
    }

    /// Evaluate `check` on `target`
    ///
    /// Never fails: a returned error or a panic becomes
    /// [`RunOutcome::failure`], and issues reported before it are kept.
    pub fn run(
        &self,
        check: &dyn Check,
        graph: &Graph,
        target: NodeId,
        params: &CheckParameters,
        cancel: &CancellationToken,
    ) -> RunOutcome {
        let start = Instant::now();
        let mut collector = IssueCollector::new();

        let result = catch_unwind(AssertUnwindSafe(|| {
            check.check(graph, target, &mut collector, params, cancel)
        }));

        let failure = match result {
            Ok(Ok(())) => None,
            Ok(Err(err)) => Some(self.failure(check.id(), target, &err, false)),
            Err(payload) => {
                let message = format!("check panicked: {}", panic_message(payload.as_ref()));
                Some(self.failure(check.id(), target, &message, true))
            }
        };
        if let Some(failure) = &failure {
            log::warn!("{} ({})", failure, graph.describe(target));
        }

        RunOutcome {
            check_id: check.id().to_string(),
            target,
            issues: collector.into_issues(),
            failure,
            cancelled: cancel.is_cancelled(),
            elapsed: start.elapsed(),
        }
    }

    fn failure(
        &self,
        check_id: &str,
        target: NodeId,
        message: &dyn std::fmt::Display,
        panicked: bool,
    ) -> EvaluationFailure {
        EvaluationFailure {
            check_id: check_id.to_string(),
            target,
            message: message.to_string(),
            panicked,
        }
    }
}

pub(crate) fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(text) = payload.downcast_ref::<&'static str>() {
        (*text).to_string()
    } else if let Some(text) = payload.downcast_ref::<String>() {
        text.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
