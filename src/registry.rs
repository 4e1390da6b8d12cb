//! Check registry: registration, lookup and change dispatch

use crate::check::{Check, CheckDefinition, ConfigurationError};
use crate::context::{ContextSession, FeatureChange};
use crate::model::{Graph, NodeId};
use crate::runner::panic_message;
use std::collections::HashMap;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

struct Registered {
    check: Arc<dyn Check>,
    definition: CheckDefinition,
}

/// All registered checks with their frozen definitions
#[derive(Default)]
pub struct CheckRegistry {
    checks: Vec<Registered>,
    index: HashMap<String, usize>,
}

impl CheckRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Configure and validate a check, then register it
    ///
    /// `configure` runs exactly once, here. An invalid definition rejects the
    /// check and leaves the registry unchanged.
    pub fn register(&mut self, check: Arc<dyn Check>) -> Result<(), ConfigurationError> {
        let mut definition = CheckDefinition::new(check.id());
        check.configure(&mut definition);
        definition.validate()?;

        let id = definition.id().to_string();
        if self.index.contains_key(&id) {
            return Err(ConfigurationError::DuplicateId(id));
        }

        log::debug!("registered check '{}'", id);
        self.index.insert(id, self.checks.len());
        self.checks.push(Registered { check, definition });
        Ok(())
    }

    /// Register several checks, collecting the rejections
    pub fn register_all<I>(&mut self, checks: I) -> Vec<ConfigurationError>
    where
        I: IntoIterator<Item = Arc<dyn Check>>,
    {
        checks
            .into_iter()
            .filter_map(|check| self.register(check).err())
            .collect()
    }

    pub fn get(&self, id: &str) -> Option<&Arc<dyn Check>> {
        self.index.get(id).map(|&i| &self.checks[i].check)
    }

    pub fn definition(&self, id: &str) -> Option<&CheckDefinition> {
        self.index.get(id).map(|&i| &self.checks[i].definition)
    }

    /// Checks in registration order
    pub fn iter(&self) -> impl Iterator<Item = (&Arc<dyn Check>, &CheckDefinition)> {
        self.checks.iter().map(|r| (&r.check, &r.definition))
    }

    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.checks.iter().map(|r| r.definition.id())
    }

    pub fn len(&self) -> usize {
        self.checks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.checks.is_empty()
    }

    /// Dispatch one change to every collector bound to its feature
    ///
    /// Changes on features nobody listens to are ignored. A panicking
    /// collector is logged and skipped.
    pub fn collect_context(
        &self,
        graph: &Graph,
        change: &FeatureChange,
        session: &mut ContextSession,
    ) {
        for registered in &self.checks {
            let id = registered.definition.id();
            for binding in registered.definition.collectors() {
                if !binding.listens_to(&change.feature) {
                    continue;
                }
                let mut sink = session.sink(id);
                let result = catch_unwind(AssertUnwindSafe(|| {
                    binding.collector.collect(graph, change, &mut sink)
                }));
                if let Err(payload) = result {
                    log::warn!(
                        "context collector of '{}' panicked on '{}': {}",
                        id,
                        change.feature,
                        panic_message(payload.as_ref())
                    );
                }
            }
        }
    }

    /// Dirty roots for a whole batch of changes
    pub fn collect_all(&self, graph: &Graph, changes: &[FeatureChange]) -> ContextSession {
        let mut session = ContextSession::new();
        for change in changes {
            self.collect_context(graph, change, &mut session);
        }
        session
    }

    /// Every target of one check across the graph's roots
    pub fn targets(&self, graph: &Graph, id: &str) -> Vec<NodeId> {
        let Some(definition) = self.definition(id) else {
            return Vec::new();
        };
        graph
            .roots()
            .iter()
            .flat_map(|&root| definition.targets_under(graph, root))
            .collect()
    }
}

impl std::fmt::Debug for CheckRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CheckRegistry")
            .field("checks", &self.ids().collect::<Vec<_>>())
            .finish()
    }
}
