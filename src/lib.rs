//! Formcheck - incremental structural checks over typed model graphs
//!
//! Checks declare which model objects they evaluate, which parameters they
//! take, and which feature changes should make the engine re-evaluate them.
//! The engine runs them over a whole graph, or only over the roots dirtied
//! by a batch of edits.
//!
//! # Architecture
//!
//! ```text
//! CLI/API -> Engine -> CheckRegistry -> CheckRunner -> Check -> Graph
//!                 \-> ContextCollector (changes -> dirty roots)
//! ```
//!
//! # Example
//!
//! ```no_run
//! use formcheck::{CancellationToken, Config, Engine, Graph};
//! use formcheck::model::{load_str, ModelFormat};
//!
//! let mut graph = Graph::new();
//! load_str(&mut graph, "kind: module", ModelFormat::Yaml).unwrap();
//!
//! let engine = Engine::with_builtin_checks(Config::default()).unwrap();
//! let result = engine.scan(&graph, &CancellationToken::new());
//! println!("{} issue(s)", result.diagnostics.len());
//! ```

pub mod check;
pub mod checks;
pub mod config;
pub mod context;
pub mod diagnostic;
pub mod engine;
pub mod message;
pub mod model;
pub mod output;
pub mod path;
pub mod registry;
pub mod runner;
pub mod watch;

// Re-export main types
pub use check::{
    CancellationToken, Check, CheckDefinition, CheckError, CheckParameters, Issue,
    ResultAcceptor,
};
pub use config::{Config, SettingsStore};
pub use context::{ContextCollector, ContextSession, NearestRootCollector};
pub use diagnostic::{Diagnostic, Location, Severity};
pub use engine::{CheckTiming, Engine, ScanResult};
pub use model::{FeatureChange, Graph, NodeId, NodeKind};
pub use output::{JsonFormatter, OutputFormatter, TextFormatter};
pub use path::{DataPath, IdentityMatcher};
pub use registry::CheckRegistry;
pub use runner::{CheckRunner, EvaluationFailure, RunOutcome};
