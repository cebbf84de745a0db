//! The rule motor: prepares rules, indexes a document once and evaluates
//! every rule against it on a bounded worker pool.
//!
//! ```text
//! Idle → LoadingRules → Indexing → Evaluating → Aggregating → Done
//! ```
//!
//! A motor runs exactly once. Build a new one per document version.

use std::collections::HashSet;
use std::fmt;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use crossbeam_channel::{bounded, unbounded, RecvTimeoutError};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::document::{Document, SpecInfo};
use crate::function::{FunctionContext, FunctionRegistry, Options, OptionsError, PreparedFunction};
use crate::index::{DocumentIndex, IndexError};
use crate::ruleset::{LoadError, LoadedRules, RuleDefinition, RuleSet};
use crate::selector::Selector;
use crate::tree::{NodeId, NodeTree};
use crate::types::{Diagnostic, DiagnosticKind, Range, Report, Severity, Violation};

/// Errors that stop a run.
#[derive(Debug, Error)]
pub enum MotorError {
    /// [`Motor::run`] was called on a motor that already ran.
    #[error("motor has already run; build a new one for each document")]
    AlreadyRun,

    /// The document could not be indexed.
    #[error("failed to index document: {0}")]
    Index(#[from] IndexError),
}

/// Lifecycle of a [`Motor`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MotorState {
    /// Built, not yet run.
    Idle,
    /// Validating and preparing rule definitions.
    LoadingRules,
    /// Building the Document Index.
    Indexing,
    /// Running rules.
    Evaluating,
    /// Deduplicating and ordering results.
    Aggregating,
    /// Finished (successfully or not).
    Done,
}

impl fmt::Display for MotorState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Idle => "idle",
            Self::LoadingRules => "loading-rules",
            Self::Indexing => "indexing",
            Self::Evaluating => "evaluating",
            Self::Aggregating => "aggregating",
            Self::Done => "done",
        };
        f.write_str(s)
    }
}

/// Builder for configuring a [`Motor`].
#[derive(Default)]
pub struct MotorBuilder {
    registry: Option<Arc<FunctionRegistry>>,
    rules: RuleSet,
    load_errors: Vec<LoadError>,
    config: Option<Config>,
    parallelism: Option<usize>,
    deadline: Option<Duration>,
}

impl MotorBuilder {
    /// Creates a new builder with default settings.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the function registry rules are resolved against.
    #[must_use]
    pub fn registry(mut self, registry: impl Into<Arc<FunctionRegistry>>) -> Self {
        self.registry = Some(registry.into());
        self
    }

    /// Adds a rule.
    #[must_use]
    pub fn rule(mut self, rule: RuleDefinition) -> Self {
        self.rules.insert(rule);
        self
    }

    /// Adds several rules.
    #[must_use]
    pub fn rules<I>(mut self, rules: I) -> Self
    where
        I: IntoIterator<Item = RuleDefinition>,
    {
        for rule in rules {
            self.rules.insert(rule);
        }
        self
    }

    /// Adds the output of a rule-set loader, carrying its per-rule errors
    /// into the report.
    #[must_use]
    pub fn loaded(mut self, loaded: LoadedRules) -> Self {
        self.rules.merge(loaded.rule_set);
        self.load_errors.extend(loaded.errors);
        self
    }

    /// Sets the configuration (rule overrides, parallelism, deadline).
    #[must_use]
    pub fn config(mut self, config: Config) -> Self {
        self.config = Some(config);
        self
    }

    /// Sets the maximum number of rules evaluated in parallel.
    #[must_use]
    pub fn parallelism(mut self, workers: usize) -> Self {
        self.parallelism = Some(workers);
        self
    }

    /// Sets the overall evaluation deadline, measured from the start of
    /// [`Motor::run`].
    #[must_use]
    pub fn deadline(mut self, deadline: Duration) -> Self {
        self.deadline = Some(deadline);
        self
    }

    /// Builds the motor.
    #[must_use]
    pub fn build(self) -> Motor {
        let config = self.config.unwrap_or_default();
        Motor {
            registry: self.registry.unwrap_or_default(),
            parallelism: self.parallelism.or(config.motor.parallelism),
            deadline: self.deadline.or_else(|| config.motor.deadline()),
            rules: self.rules,
            load_errors: self.load_errors,
            config,
            state: MotorState::Idle,
        }
    }
}

/// Evaluates a rule set against one document.
///
/// Use [`Motor::builder()`] to construct an instance.
pub struct Motor {
    registry: Arc<FunctionRegistry>,
    rules: RuleSet,
    load_errors: Vec<LoadError>,
    config: Config,
    parallelism: Option<usize>,
    deadline: Option<Duration>,
    state: MotorState,
}

impl fmt::Debug for Motor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Motor")
            .field("rules", &self.rules.len())
            .field("state", &self.state)
            .field("parallelism", &self.parallelism)
            .field("deadline", &self.deadline)
            .finish_non_exhaustive()
    }
}

impl Motor {
    /// Creates a new builder for configuring a motor.
    #[must_use]
    pub fn builder() -> MotorBuilder {
        MotorBuilder::new()
    }

    /// Returns the current lifecycle state.
    #[must_use]
    pub fn state(&self) -> MotorState {
        self.state
    }

    /// Returns the number of rule definitions.
    #[must_use]
    pub fn rule_count(&self) -> usize {
        self.rules.len()
    }

    fn transition(&mut self, next: MotorState) {
        debug!("Motor state {} -> {}", self.state, next);
        self.state = next;
    }

    /// Lints a parsed and classified document.
    ///
    /// # Errors
    ///
    /// See [`Motor::run_tree`].
    pub fn run(&mut self, document: &Document) -> Result<Report, MotorError> {
        self.run_tree(Arc::clone(document.tree()), Some(document.info().clone()))
    }

    /// Lints a node tree. Without `spec`, `formats` filters are not applied.
    ///
    /// # Errors
    ///
    /// Returns [`MotorError::AlreadyRun`] on a second call and
    /// [`MotorError::Index`] when the tree is empty.
    pub fn run_tree(
        &mut self,
        tree: Arc<NodeTree>,
        spec: Option<SpecInfo>,
    ) -> Result<Report, MotorError> {
        if self.state != MotorState::Idle {
            return Err(MotorError::AlreadyRun);
        }
        let started = Instant::now();
        let deadline_at = self.deadline.map(|d| started + d);

        self.transition(MotorState::LoadingRules);
        let mut diagnostics: Vec<Diagnostic> = self.load_errors.iter().map(Diagnostic::from).collect();
        let prepared = self.prepare_rules(spec.as_ref(), &mut diagnostics);
        info!(
            "Prepared {} of {} rules ({} rejected)",
            prepared.len(),
            self.rules.len(),
            diagnostics.len()
        );

        self.transition(MotorState::Indexing);
        let index = match DocumentIndex::build(tree) {
            Ok(index) => Arc::new(index),
            Err(e) => {
                self.transition(MotorState::Done);
                return Err(e.into());
            }
        };
        diagnostics.extend(index.diagnostics().iter().map(Diagnostic::from));

        self.transition(MotorState::Evaluating);
        let workers = self.worker_count(prepared.len());
        let (outputs, partial) = if workers <= 1 && deadline_at.is_none() {
            (evaluate_inline(&prepared, &index), false)
        } else {
            evaluate_parallel(Arc::new(prepared), &index, workers, deadline_at)
        };

        self.transition(MotorState::Aggregating);
        let report = aggregate(outputs, diagnostics, partial, spec);

        self.transition(MotorState::Done);
        info!(
            "Evaluation complete: {} violations from {} rules in {:?}{}",
            report.violations.len(),
            report.rules_evaluated,
            started.elapsed(),
            if report.partial { " (partial)" } else { "" }
        );
        Ok(report)
    }

    fn worker_count(&self, rules: usize) -> usize {
        let available = thread::available_parallelism().map_or(1, std::num::NonZeroUsize::get);
        self.parallelism.unwrap_or(available).min(rules).max(1)
    }

    fn prepare_rules(
        &self,
        spec: Option<&SpecInfo>,
        diagnostics: &mut Vec<Diagnostic>,
    ) -> Vec<PreparedRule> {
        let mut prepared = Vec::with_capacity(self.rules.len());
        for rule in &self.rules {
            let enabled = self.config.rule_enabled(&rule.id).unwrap_or(rule.enabled);
            if !enabled {
                debug!("Skipping disabled rule: {}", rule.id);
                continue;
            }
            if let Some(spec) = spec {
                if !rule.applies_to(spec.spec_type) {
                    debug!("Skipping rule {} for {} document", rule.id, spec.spec_type);
                    continue;
                }
            }

            let severity = self.config.rule_severity(&rule.id).unwrap_or(rule.severity);
            match prepare_rule(rule, severity, &self.registry) {
                Ok(p) => prepared.push(p),
                Err(e) => {
                    warn!("{}", e);
                    diagnostics.push(Diagnostic::from(&e));
                }
            }
        }
        prepared
    }
}

struct PreparedCall {
    field: Option<String>,
    options: Options,
    function: Box<dyn PreparedFunction>,
    name: String,
}

struct PreparedRule {
    id: String,
    severity: Severity,
    selectors: Vec<Selector>,
    calls: Vec<PreparedCall>,
}

fn prepare_rule(
    rule: &RuleDefinition,
    severity: Severity,
    registry: &FunctionRegistry,
) -> Result<PreparedRule, LoadError> {
    let selectors = rule
        .given
        .iter()
        .map(|given| {
            Selector::parse(given).map_err(|source| LoadError::InvalidSelector {
                rule_id: rule.id.clone(),
                given: given.clone(),
                source,
            })
        })
        .collect::<Result<Vec<_>, _>>()?;

    if rule.then.is_empty() {
        return Err(LoadError::NoFunctions {
            rule_id: rule.id.clone(),
        });
    }

    let mut calls = Vec::with_capacity(rule.then.len());
    for call in &rule.then {
        let function = registry
            .get(&call.function)
            .ok_or_else(|| LoadError::UnknownFunction {
                rule_id: rule.id.clone(),
                function: call.function.clone(),
            })?;

        let missing = function.schema().missing_required(&call.options);
        if !missing.is_empty() {
            return Err(LoadError::MissingOptions {
                rule_id: rule.id.clone(),
                function: call.function.clone(),
                missing: missing.into_iter().map(String::from).collect(),
            });
        }

        let prepared = function.prepare(&call.options).map_err(|e| match e {
            OptionsError::Missing { name } => LoadError::MissingOptions {
                rule_id: rule.id.clone(),
                function: call.function.clone(),
                missing: vec![name],
            },
            OptionsError::Invalid { message } => LoadError::InvalidOptions {
                rule_id: rule.id.clone(),
                function: call.function.clone(),
                message,
            },
        })?;

        calls.push(PreparedCall {
            field: call.field.clone(),
            options: call.options.clone(),
            function: prepared,
            name: call.function.clone(),
        });
    }

    Ok(PreparedRule {
        id: rule.id.clone(),
        severity,
        selectors,
        calls,
    })
}

/// Results of one rule, tagged with its position in the rule list.
struct UnitOutput {
    order: usize,
    violations: Vec<Violation>,
    diagnostics: Vec<Diagnostic>,
}

fn evaluate_rule(rule: &PreparedRule, order: usize, index: &DocumentIndex) -> UnitOutput {
    let tree = index.tree();
    let mut output = UnitOutput {
        order,
        violations: Vec::new(),
        diagnostics: Vec::new(),
    };

    let matches: Vec<NodeId> = rule
        .selectors
        .iter()
        .flat_map(|s| s.select(index))
        .collect();
    debug!("Rule {} matched {} nodes", rule.id, matches.len());

    for call in &rule.calls {
        let ctx = FunctionContext::new(&rule.id, &call.options, index);
        for &node in &matches {
            let target = match &call.field {
                Some(field) => match tree.mapping_get(node, field) {
                    Some(value) => value,
                    None => continue,
                },
                None => node,
            };

            let results = match catch_unwind(AssertUnwindSafe(|| call.function.run(&[target], &ctx))) {
                Ok(results) => results,
                Err(_) => {
                    warn!("Function {} panicked in rule {}", call.name, rule.id);
                    output.diagnostics.push(
                        Diagnostic::new(
                            DiagnosticKind::FunctionFailure,
                            format!("function `{}` panicked and was skipped", call.name),
                        )
                        .with_rule(&rule.id)
                        .with_path(index.path_of(target).unwrap_or_default()),
                    );
                    continue;
                }
            };

            for result in results {
                let mut violation = Violation::new(
                    &rule.id,
                    rule.severity,
                    index.path_of(result.node).unwrap_or_default(),
                    result.message,
                );
                if let Some(span) = index.span_of(result.node) {
                    violation = violation.with_range(Range::from(span));
                }
                output.violations.push(violation);
            }
        }
    }

    output
}

fn evaluate_inline(rules: &[PreparedRule], index: &DocumentIndex) -> Vec<UnitOutput> {
    rules
        .iter()
        .enumerate()
        .map(|(order, rule)| evaluate_rule(rule, order, index))
        .collect()
}

/// Fans rules out to `workers` threads and collects their outputs until all
/// are in or the deadline passes. Returns the outputs and whether the run was
/// cut short.
fn evaluate_parallel(
    rules: Arc<Vec<PreparedRule>>,
    index: &Arc<DocumentIndex>,
    workers: usize,
    deadline_at: Option<Instant>,
) -> (Vec<UnitOutput>, bool) {
    let total = rules.len();
    let (job_tx, job_rx) = bounded::<usize>(total.max(1));
    for order in 0..total {
        if job_tx.send(order).is_err() {
            break;
        }
    }
    drop(job_tx);

    let (result_tx, result_rx) = unbounded::<UnitOutput>();
    let cancel = Arc::new(AtomicBool::new(false));

    let mut spawned = 0;
    for worker in 0..workers {
        let jobs = job_rx.clone();
        let results = result_tx.clone();
        let rules = Arc::clone(&rules);
        let index = Arc::clone(index);
        let cancel = Arc::clone(&cancel);
        let handle = thread::Builder::new()
            .name(format!("apilint-worker-{worker}"))
            .spawn(move || {
                while let Ok(order) = jobs.recv() {
                    if cancel.load(Ordering::Relaxed) {
                        break;
                    }
                    let output = evaluate_rule(&rules[order], order, &index);
                    if results.send(output).is_err() {
                        break;
                    }
                }
            });
        match handle {
            Ok(_) => spawned += 1,
            Err(e) => warn!("Failed to spawn worker {}: {}", worker, e),
        }
    }
    drop(result_tx);

    if spawned == 0 {
        warn!("No workers available, evaluating inline");
        return (evaluate_inline(&rules, index), false);
    }
    debug!("Evaluating {} rules on {} workers", total, spawned);

    let mut outputs = Vec::with_capacity(total);
    let mut partial = false;
    while outputs.len() < total {
        let next = match deadline_at {
            Some(at) => result_rx.recv_deadline(at),
            None => result_rx
                .recv()
                .map_err(|_| RecvTimeoutError::Disconnected),
        };
        match next {
            Ok(output) => outputs.push(output),
            Err(RecvTimeoutError::Timeout) => {
                warn!(
                    "Deadline expired with {} of {} rules finished",
                    outputs.len(),
                    total
                );
                cancel.store(true, Ordering::Relaxed);
                partial = true;
                break;
            }
            Err(RecvTimeoutError::Disconnected) => {
                warn!(
                    "Workers stopped with {} of {} rules finished",
                    outputs.len(),
                    total
                );
                break;
            }
        }
    }

    (outputs, partial)
}

fn aggregate(
    mut outputs: Vec<UnitOutput>,
    mut diagnostics: Vec<Diagnostic>,
    partial: bool,
    spec: Option<SpecInfo>,
) -> Report {
    outputs.sort_by_key(|o| o.order);
    let rules_evaluated = outputs.len();

    let mut seen: HashSet<(String, String, String)> = HashSet::new();
    let mut tagged: Vec<(usize, usize, Violation)> = Vec::new();
    for output in outputs {
        diagnostics.extend(output.diagnostics);
        for (seq, violation) in output.violations.into_iter().enumerate() {
            let key = (
                violation.rule_id.clone(),
                violation.path.clone(),
                violation.message.clone(),
            );
            if seen.insert(key) {
                tagged.push((output.order, seq, violation));
            }
        }
    }

    tagged.sort_by(|a, b| {
        a.2.position_key()
            .cmp(&b.2.position_key())
            .then_with(|| a.2.rule_id.cmp(&b.2.rule_id))
            .then(a.0.cmp(&b.0))
            .then(a.1.cmp(&b.1))
    });

    if partial {
        diagnostics.push(Diagnostic::new(
            DiagnosticKind::DeadlineExceeded,
            "evaluation deadline expired; results are partial",
        ));
    }

    Report {
        spec,
        violations: tagged.into_iter().map(|(_, _, v)| v).collect(),
        diagnostics,
        partial,
        rules_evaluated,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::function::{FunctionResult, FunctionSchema, RuleFunction};
    use crate::ruleset::FunctionCall;

    struct Flag;

    struct FlagPrepared;

    impl RuleFunction for Flag {
        fn name(&self) -> &'static str {
            "flag"
        }
        fn schema(&self) -> FunctionSchema {
            FunctionSchema::new("flag", "reports every node")
        }
        fn prepare(&self, _: &Options) -> Result<Box<dyn PreparedFunction>, OptionsError> {
            Ok(Box::new(FlagPrepared))
        }
    }

    impl PreparedFunction for FlagPrepared {
        fn run(&self, nodes: &[NodeId], _: &FunctionContext<'_>) -> Vec<FunctionResult> {
            nodes
                .iter()
                .map(|n| FunctionResult::new("flagged", *n))
                .collect()
        }
    }

    fn registry() -> FunctionRegistry {
        let mut registry = FunctionRegistry::new();
        registry.register(Box::new(Flag));
        registry
    }

    fn document() -> Document {
        Document::load(b"openapi: 3.0.0\ninfo:\n  title: x\n").unwrap()
    }

    #[test]
    fn motor_runs_once() {
        let mut motor = Motor::builder()
            .registry(registry())
            .rule(RuleDefinition::new("r", "$.info").then(FunctionCall::new("flag")))
            .build();
        assert_eq!(motor.state(), MotorState::Idle);
        let report = motor.run(&document()).unwrap();
        assert_eq!(report.violations.len(), 1);
        assert_eq!(motor.state(), MotorState::Done);
        assert!(matches!(motor.run(&document()), Err(MotorError::AlreadyRun)));
    }

    #[test]
    fn empty_tree_is_an_index_error() {
        let mut motor = Motor::builder().build();
        let err = motor.run_tree(Arc::new(NodeTree::new()), None).unwrap_err();
        assert!(matches!(err, MotorError::Index(IndexError::EmptyDocument)));
        assert_eq!(motor.state(), MotorState::Done);
    }

    #[test]
    fn worker_count_is_bounded_by_rules() {
        let motor = Motor::builder().parallelism(8).build();
        assert_eq!(motor.worker_count(3), 3);
        assert_eq!(motor.worker_count(0), 1);
    }

    #[test]
    fn config_supplies_motor_settings() {
        let config = Config::parse("[motor]\nparallelism = 2\ndeadline_ms = 50\n").unwrap();
        let motor = Motor::builder().config(config).build();
        assert_eq!(motor.parallelism, Some(2));
        assert_eq!(motor.deadline, Some(Duration::from_millis(50)));
    }

    #[test]
    fn field_narrows_the_matched_node() {
        let mut motor = Motor::builder()
            .registry(registry())
            .rule(
                RuleDefinition::new("r", "$.info")
                    .then(FunctionCall::new("flag").with_field("title"))
                    .then(FunctionCall::new("flag").with_field("missing")),
            )
            .build();
        let report = motor.run(&document()).unwrap();
        assert_eq!(report.violations.len(), 1);
        assert_eq!(report.violations[0].path, "#/info/title");
    }
}
