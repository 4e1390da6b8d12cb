//! Core check engine: full scans and incremental re-checks

use crate::check::{
    CancellationToken, Check, CheckComplexity, CheckDefinition, CheckParameters, ConfigurationError,
    IssueType, ParameterSource,
};
use crate::checks::builtin_checks;
use crate::config::{Config, SettingsStore};
use crate::context::FeatureChange;
use crate::diagnostic::{Diagnostic, Location, Severity};
use crate::model::{Graph, NodeId};
use crate::registry::CheckRegistry;
use crate::runner::{CheckRunner, EvaluationFailure, RunOutcome};
use rayon::prelude::*;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Per-check timing statistics
#[derive(Debug, Clone, Default)]
pub struct CheckTiming {
    /// Check ID
    pub check_id: String,
    /// Total time spent in this check
    pub total_time: Duration,
    /// Number of targets evaluated
    pub evaluation_count: usize,
    /// Number of issues reported
    pub issue_count: usize,
}

impl CheckTiming {
    pub fn new(check_id: &str) -> Self {
        Self {
            check_id: check_id.to_string(),
            ..Default::default()
        }
    }

    /// Average time per evaluation
    pub fn avg_time(&self) -> Duration {
        if self.evaluation_count > 0 {
            self.total_time / self.evaluation_count as u32
        } else {
            Duration::ZERO
        }
    }
}

/// Result of a scan or re-check
#[derive(Debug, Default)]
pub struct ScanResult {
    /// Diagnostics in evaluation order (check, then target)
    pub diagnostics: Vec<Diagnostic>,

    /// Isolated evaluation failures (also reported as diagnostics)
    pub failures: Vec<EvaluationFailure>,

    /// Number of (check, target) pairs evaluated
    pub targets_checked: usize,

    /// Diagnostics per severity
    pub counts: BTreeMap<Severity, usize>,

    /// The run stopped early on cancellation
    pub cancelled: bool,

    /// Processing duration
    pub duration: Duration,

    /// Per-check timing statistics (check_id -> timing)
    pub check_timings: HashMap<String, CheckTiming>,
}

impl ScanResult {
    pub fn count(&self, severity: Severity) -> usize {
        self.counts.get(&severity).copied().unwrap_or(0)
    }

    /// Diagnostics at or above `severity`
    pub fn count_at_least(&self, severity: Severity) -> usize {
        self.counts
            .iter()
            .filter(|(s, _)| **s >= severity)
            .map(|(_, n)| n)
            .sum()
    }

    pub fn has_failures(&self) -> bool {
        !self.failures.is_empty()
    }

    pub fn is_clean(&self) -> bool {
        self.diagnostics.is_empty()
    }

    /// Get exit code (0 = clean, 1 = minor issues only, 2 = major or worse, or failures)
    pub fn exit_code(&self) -> i32 {
        if self.has_failures() || self.count_at_least(Severity::Major) > 0 {
            2
        } else if !self.diagnostics.is_empty() {
            1
        } else {
            0
        }
    }

    fn push(&mut self, diagnostic: Diagnostic) {
        *self.counts.entry(diagnostic.severity).or_insert(0) += 1;
        self.diagnostics.push(diagnostic);
    }

    /// Merge another result into this one
    pub fn merge(&mut self, other: ScanResult) {
        for diagnostic in other.diagnostics {
            self.push(diagnostic);
        }
        self.failures.extend(other.failures);
        self.targets_checked += other.targets_checked;
        self.cancelled |= other.cancelled;

        for (check_id, timing) in other.check_timings {
            let entry = self
                .check_timings
                .entry(check_id)
                .or_insert_with(|| CheckTiming::new(&timing.check_id));
            entry.total_time += timing.total_time;
            entry.evaluation_count += timing.evaluation_count;
            entry.issue_count += timing.issue_count;
        }
    }

    /// Get check timings sorted by total time (descending)
    pub fn sorted_timings(&self) -> Vec<&CheckTiming> {
        let mut timings: Vec<_> = self.check_timings.values().collect();
        timings.sort_by(|a, b| b.total_time.cmp(&a.total_time));
        timings
    }

    /// Format timing statistics as a string
    pub fn format_timings(&self) -> String {
        let timings = self.sorted_timings();
        if timings.is_empty() {
            return "No timing data available".to_string();
        }

        let mut output = String::new();
        output.push_str("Check Timing Statistics:\n");
        output.push_str(&format!(
            "{:<40} {:>12} {:>12} {:>10} {:>12}\n",
            "Check ID", "Total", "Avg", "Evals", "Issues"
        ));
        output.push_str(&"-".repeat(90));
        output.push('\n');

        for timing in timings {
            let total_ms = timing.total_time.as_secs_f64() * 1000.0;
            let avg_us = timing.avg_time().as_secs_f64() * 1_000_000.0;

            output.push_str(&format!(
                "{:<40} {:>10.2}ms {:>10.2}µs {:>10} {:>12}\n",
                timing.check_id, total_ms, avg_us, timing.evaluation_count, timing.issue_count
            ));
        }

        output
    }
}

/// One pending evaluation
#[derive(Clone, Copy)]
struct Job<'a> {
    check: &'a Arc<dyn Check>,
    definition: &'a CheckDefinition,
    target: NodeId,
}

/// The main check engine
///
/// Owns the registry and decides what to evaluate; the runner evaluates.
pub struct Engine {
    config: Config,
    registry: CheckRegistry,
    settings: Arc<dyn ParameterSource>,
    runner: CheckRunner,
}

impl Engine {
    /// Create an engine with an empty registry
    pub fn new(config: Config) -> Self {
        let settings = Arc::new(SettingsStore::from_config(&config));
        Self {
            config,
            registry: CheckRegistry::new(),
            settings,
            runner: CheckRunner::new(),
        }
    }

    /// Create an engine with every built-in check registered
    pub fn with_builtin_checks(config: Config) -> Result<Self, ConfigurationError> {
        let mut engine = Self::new(config);
        for check in builtin_checks(&engine.config.identity) {
            engine.register(check)?;
        }
        Ok(engine)
    }

    /// Read parameters from another source (e.g. a shared [`SettingsStore`])
    pub fn with_settings(mut self, settings: Arc<dyn ParameterSource>) -> Self {
        self.settings = settings;
        self
    }

    pub fn register(&mut self, check: Arc<dyn Check>) -> Result<(), ConfigurationError> {
        self.registry.register(check)
    }

    pub fn registry(&self) -> &CheckRegistry {
        &self.registry
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    fn enabled(&self) -> impl Iterator<Item = (&Arc<dyn Check>, &CheckDefinition)> {
        self.registry
            .iter()
            .filter(|(_, definition)| self.config.is_check_enabled(definition.id()))
    }

    /// Evaluate every enabled check on all of its targets
    pub fn scan(&self, graph: &Graph, cancel: &CancellationToken) -> ScanResult {
        let jobs: Vec<Job<'_>> = self
            .enabled()
            .flat_map(|(check, definition)| {
                self.registry
                    .targets(graph, definition.id())
                    .into_iter()
                    .map(move |target| Job {
                        check,
                        definition,
                        target,
                    })
            })
            .collect();
        self.run_jobs(graph, &jobs, cancel)
    }

    /// Evaluate only the roots dirtied by `changes`
    ///
    /// Expensive checks are skipped unless `engine.expensive_on_change` is set.
    pub fn recheck(
        &self,
        graph: &Graph,
        changes: &[FeatureChange],
        cancel: &CancellationToken,
    ) -> ScanResult {
        let session = self.registry.collect_all(graph, changes);
        log::debug!(
            "{} change(s) dirtied {} root(s)",
            changes.len(),
            session.len()
        );

        let jobs: Vec<Job<'_>> = self
            .enabled()
            .filter(|(_, definition)| {
                definition.complexity() != CheckComplexity::Expensive
                    || self.config.engine.expensive_on_change
            })
            .flat_map(|(check, definition)| {
                session
                    .pending_for(definition.id())
                    .into_iter()
                    .filter(|&root| is_current_target(graph, definition, root))
                    .map(move |target| Job {
                        check,
                        definition,
                        target,
                    })
                    .collect::<Vec<_>>()
            })
            .collect();
        self.run_jobs(graph, &jobs, cancel)
    }

    fn run_jobs(&self, graph: &Graph, jobs: &[Job<'_>], cancel: &CancellationToken) -> ScanResult {
        let start = Instant::now();

        let evaluate = |job: &Job<'_>| -> Option<RunOutcome> {
            if cancel.is_cancelled() {
                return None;
            }
            // Current values on every evaluation, never cached
            let overrides = self.settings.parameters(job.definition.id());
            let params = CheckParameters::resolve(job.definition.parameters(), overrides);
            Some(
                self.runner
                    .run(job.check.as_ref(), graph, job.target, &params, cancel),
            )
        };

        let outcomes: Vec<Option<RunOutcome>> = if self.config.engine.parallel && jobs.len() > 1 {
            let threads = if self.config.engine.jobs > 0 {
                self.config.engine.jobs
            } else {
                num_cpus::get()
            };
            match rayon::ThreadPoolBuilder::new().num_threads(threads).build() {
                Ok(pool) => pool.install(|| jobs.par_iter().map(evaluate).collect()),
                Err(err) => {
                    log::warn!("falling back to sequential evaluation: {}", err);
                    jobs.iter().map(evaluate).collect()
                }
            }
        } else {
            jobs.iter().map(evaluate).collect()
        };

        let mut result = ScanResult::default();
        for (job, outcome) in jobs.iter().zip(outcomes) {
            match outcome {
                Some(outcome) => self.record(graph, job.definition, outcome, &mut result),
                None => result.cancelled = true,
            }
        }
        result.cancelled |= cancel.is_cancelled();
        result.duration = start.elapsed();
        result
    }

    fn record(
        &self,
        graph: &Graph,
        definition: &CheckDefinition,
        outcome: RunOutcome,
        result: &mut ScanResult,
    ) {
        let severity = self
            .config
            .get_severity_override(definition.id())
            .unwrap_or(definition.default_severity());

        let timing = result
            .check_timings
            .entry(definition.id().to_string())
            .or_insert_with(|| CheckTiming::new(definition.id()));
        timing.total_time += outcome.elapsed;
        timing.evaluation_count += 1;
        timing.issue_count += outcome.issues.len();
        result.targets_checked += 1;

        for issue in &outcome.issues {
            let mut diagnostic = Diagnostic::from_issue(graph, definition.id(), severity, issue)
                .with_issue_type(definition.issue_type());
            if !definition.description().is_empty() {
                diagnostic = diagnostic.with_help(definition.description());
            }
            result.push(diagnostic);
        }

        if let Some(failure) = outcome.failure {
            result.push(
                Diagnostic::new(
                    definition.id(),
                    Severity::Major,
                    &failure.message,
                    Location::of(graph, failure.target),
                )
                .with_issue_type(IssueType::Error),
            );
            result.failures.push(failure);
        }
        result.cancelled |= outcome.cancelled;
    }
}

/// A dirty root is evaluated only if it is still attached and still a target
fn is_current_target(graph: &Graph, definition: &CheckDefinition, node: NodeId) -> bool {
    match graph.top_container(node) {
        Ok(top) => definition.is_target(graph, top, node),
        Err(err) => {
            log::debug!("{}: {}", definition.id(), err);
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::checks::PARAM_CHECK_ONLY_EXISTING_FORM_PROPERTIES;
    use crate::model::{features, NodeKind};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    #[test]
    fn test_scan_result_exit_code() {
        let mut graph = Graph::new();
        let form = graph.add_root(crate::model::NodeKind::Form);

        let mut result = ScanResult::default();
        assert_eq!(result.exit_code(), 0);

        result.push(Diagnostic::new("a", Severity::Minor, "m", Location::new(form, "form")));
        assert_eq!(result.exit_code(), 1);

        result.push(Diagnostic::new("b", Severity::Critical, "m", Location::new(form, "form")));
        assert_eq!(result.exit_code(), 2);
        assert_eq!(result.count(Severity::Minor), 1);
        assert_eq!(result.count_at_least(Severity::Major), 1);
    }

    #[test]
    fn test_scan_result_merge() {
        let mut graph = Graph::new();
        let form = graph.add_root(crate::model::NodeKind::Form);

        let mut first = ScanResult {
            targets_checked: 2,
            ..Default::default()
        };
        first.check_timings.insert("a".to_string(), CheckTiming {
            evaluation_count: 2,
            ..CheckTiming::new("a")
        });

        let mut second = ScanResult {
            targets_checked: 1,
            ..Default::default()
        };
        second.push(Diagnostic::new("a", Severity::Info, "m", Location::new(form, "form")));
        second.check_timings.insert("a".to_string(), CheckTiming {
            evaluation_count: 1,
            issue_count: 1,
            ..CheckTiming::new("a")
        });

        first.merge(second);
        assert_eq!(first.targets_checked, 3);
        assert_eq!(first.count(Severity::Info), 1);
        assert_eq!(first.check_timings["a"].evaluation_count, 3);
        assert_eq!(first.check_timings["a"].issue_count, 1);
    }

    #[test]
    fn test_format_timings_empty() {
        assert_eq!(ScanResult::default().format_timings(), "No timing data available");
    }

    /// Counts every lookup and answers from a shared map
    struct CountingSource {
        calls: AtomicUsize,
        values: Mutex<HashMap<String, String>>,
    }

    impl ParameterSource for CountingSource {
        fn parameters(&self, _check_id: &str) -> HashMap<String, String> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.values.lock().map(|v| v.clone()).unwrap_or_default()
        }
    }

    #[test]
    fn test_parameters_read_on_every_evaluation() {
        let mut graph = Graph::new();
        for _ in 0..3 {
            let module = graph.add_root(NodeKind::Module);
            let method = graph.add_child(module, features::METHODS, NodeKind::Method);
            let statement = graph.add_child(method, features::STATEMENTS, NodeKind::SelfReference);
            graph.set_str(statement, features::KEYWORD, "ThisObject");
        }

        let source = Arc::new(CountingSource {
            calls: AtomicUsize::new(0),
            values: Mutex::new(HashMap::new()),
        });
        let mut config = Config::default();
        config.checks.enabled.push(crate::checks::ids::SELF_REFERENCE.to_string());
        let engine = Engine::with_builtin_checks(config)
            .unwrap()
            .with_settings(source.clone());

        let result = engine.scan(&graph, &CancellationToken::new());
        assert_eq!(result.targets_checked, 3);
        assert_eq!(source.calls.load(Ordering::SeqCst), 3);

        // An invalid value set between runs surfaces on the next one
        source
            .values
            .lock()
            .unwrap()
            .insert(PARAM_CHECK_ONLY_EXISTING_FORM_PROPERTIES.to_string(), "maybe".to_string());
        let result = engine.scan(&graph, &CancellationToken::new());
        assert_eq!(source.calls.load(Ordering::SeqCst), 6);
        assert_eq!(result.failures.len(), 3);
    }

    #[test]
    fn test_check_timing_avg() {
        let timing = CheckTiming {
            total_time: Duration::from_millis(10),
            evaluation_count: 5,
            ..CheckTiming::new("a")
        };
        assert_eq!(timing.avg_time(), Duration::from_millis(2));
        assert_eq!(CheckTiming::new("b").avg_time(), Duration::ZERO);
    }
}
