//! Lint command implementation.

use anyhow::{bail, Context, Result};
use apilint_core::{
    load_rule_set, Config, Document, FunctionRegistry, LoadedRules, Motor, Report,
    RuleDefinition, Severity,
};
use apilint_functions::{builtin_registry, Preset};
use serde::Serialize;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use crate::config_resolver::ConfigSource;
use crate::LintArgs;

/// Outcome of linting one file.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FileReport {
    /// The linted file.
    pub file: PathBuf,
    /// File text, kept for source snippets in text output.
    #[serde(skip)]
    pub content: String,
    /// The motor's report, when the file could be linted.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub report: Option<Report>,
    /// Why the file could not be linted.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl FileReport {
    /// Returns `true` if this file does not fail the run at `fail_on`.
    #[must_use]
    pub fn passes(&self, fail_on: Severity) -> bool {
        self.error.is_none()
            && self
                .report
                .as_ref()
                .map_or(true, |r| !r.has_violations_at(fail_on))
    }
}

/// Everything needed to lint files, resolved once per invocation.
struct LintPlan {
    registry: Arc<FunctionRegistry>,
    rules: Vec<RuleDefinition>,
    loaded: LoadedRules,
    config: Config,
    jobs: Option<usize>,
    deadline: Option<Duration>,
}

/// Runs the lint command. Returns `false` when any file fails.
pub fn run(args: &LintArgs, source: &ConfigSource) -> Result<bool> {
    let config = source.load()?;
    let fail_on = args.fail_on.unwrap_or_else(|| config.fail_on());

    let files = expand_inputs(&args.files)?;
    if files.is_empty() {
        bail!("No documents matched: {}", args.files.join(", "));
    }

    let plan = plan(args, config)?;
    tracing::info!(
        "Linting {} file(s) with {} rule(s)",
        files.len(),
        plan.rules.len() + plan.loaded.rule_set.len()
    );

    let reports: Vec<FileReport> = files.iter().map(|f| lint_file(f, &plan)).collect();
    super::output::print(&reports, args.format, fail_on)?;

    Ok(reports.iter().all(|r| r.passes(fail_on)))
}

fn plan(args: &LintArgs, config: Config) -> Result<LintPlan> {
    let preset_name = args
        .preset
        .as_deref()
        .or(config.preset.as_deref())
        .unwrap_or("recommended");
    let preset: Preset = preset_name.parse()?;
    let mut rules = preset.rules();

    let ruleset = args.ruleset.as_ref().or(config.ruleset.as_ref());
    let mut loaded = match ruleset {
        Some(path) => read_rule_set(path)?,
        None => LoadedRules::default(),
    };

    if let Some(filter) = &args.rules {
        let ids: HashSet<&str> = filter
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .collect();
        rules.retain(|r| ids.contains(r.id.as_str()));
        loaded.rule_set.retain(|r| ids.contains(r.id.as_str()));
        loaded.errors.retain(|e| ids.contains(e.rule_id()));
        let known: HashSet<&str> = rules
            .iter()
            .chain(loaded.rule_set.iter())
            .map(|r| r.id.as_str())
            .collect();
        for id in ids.difference(&known) {
            tracing::warn!("Unknown rule: {}", id);
        }
    }

    Ok(LintPlan {
        registry: Arc::new(builtin_registry()),
        rules,
        loaded,
        jobs: args.jobs,
        deadline: args.deadline_ms.map(Duration::from_millis),
        config,
    })
}

fn read_rule_set(path: &Path) -> Result<LoadedRules> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read rule set: {}", path.display()))?;
    let loaded = load_rule_set(&content)
        .with_context(|| format!("Failed to parse rule set: {}", path.display()))?;
    tracing::debug!(
        "Loaded {} rule(s) from {} ({} rejected)",
        loaded.rule_set.len(),
        path.display(),
        loaded.errors.len()
    );
    Ok(loaded)
}

/// Expands glob patterns. A pattern that matches nothing is kept as a
/// literal path when that path exists.
fn expand_inputs(patterns: &[String]) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for pattern in patterns {
        let mut matched = false;
        for entry in glob::glob(pattern).with_context(|| format!("Invalid pattern: {pattern}"))? {
            match entry {
                Ok(path) if path.is_file() => {
                    matched = true;
                    files.push(path);
                }
                Ok(_) => {}
                Err(e) => tracing::warn!("Skipping unreadable path: {}", e),
            }
        }
        if !matched {
            let literal = PathBuf::from(pattern);
            if literal.is_file() {
                files.push(literal);
            } else {
                tracing::warn!("No documents matched {}", pattern);
            }
        }
    }
    files.sort();
    files.dedup();
    Ok(files)
}

fn lint_file(file: &Path, plan: &LintPlan) -> FileReport {
    let mut outcome = FileReport {
        file: file.to_path_buf(),
        content: String::new(),
        report: None,
        error: None,
    };

    let bytes = match std::fs::read(file) {
        Ok(bytes) => bytes,
        Err(e) => {
            outcome.error = Some(format!("failed to read file: {e}"));
            return outcome;
        }
    };
    outcome.content = String::from_utf8_lossy(&bytes).into_owned();

    let document = match Document::load(&bytes) {
        Ok(document) => document,
        Err(e) => {
            tracing::debug!("{} could not be loaded: {}", file.display(), e);
            outcome.error = Some(e.to_string());
            return outcome;
        }
    };

    let mut builder = Motor::builder()
        .registry(Arc::clone(&plan.registry))
        .rules(plan.rules.iter().cloned())
        .loaded(plan.loaded.clone())
        .config(plan.config.clone());
    if let Some(jobs) = plan.jobs {
        builder = builder.parallelism(jobs);
    }
    if let Some(deadline) = plan.deadline {
        builder = builder.deadline(deadline);
    }

    match builder.build().run(&document) {
        Ok(report) => outcome.report = Some(report),
        Err(e) => outcome.error = Some(e.to_string()),
    }
    outcome
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::OutputFormat;
    use std::fs;
    use tempfile::TempDir;

    const SPEC: &str = "openapi: 3.0.0
info:
  title: Pets
  version: 1.0.0
paths:
  /pets:
    get:
      operationId: list_pets
      tags: [pets]
      responses:
        '200':
          description: ok
";

    fn args(files: Vec<String>) -> LintArgs {
        LintArgs {
            files,
            ruleset: None,
            preset: None,
            format: OutputFormat::Compact,
            fail_on: None,
            jobs: Some(1),
            deadline_ms: None,
            rules: None,
        }
    }

    #[test]
    fn globs_expand_and_literals_pass_through() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join("a.yaml"), SPEC).unwrap();
        fs::write(tmp.path().join("b.yaml"), SPEC).unwrap();
        fs::write(tmp.path().join("c.json"), "{}").unwrap();

        let pattern = tmp.path().join("*.yaml").display().to_string();
        let literal = tmp.path().join("c.json").display().to_string();
        let files = expand_inputs(&[pattern, literal]).unwrap();
        let names: Vec<_> = files
            .iter()
            .map(|f| f.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["a.yaml", "b.yaml", "c.json"]);
    }

    #[test]
    fn recommended_preset_flags_operation_id() {
        let tmp = TempDir::new().unwrap();
        let file = tmp.path().join("api.yaml");
        fs::write(&file, SPEC).unwrap();

        let plan = plan(&args(vec![]), Config::default()).unwrap();
        let outcome = lint_file(&file, &plan);
        let report = outcome.report.as_ref().unwrap();
        let ids: Vec<&str> = report.violations.iter().map(|v| v.rule_id.as_str()).collect();
        assert_eq!(ids, vec!["operation-id-camel-case", "operation-tag-defined"]);
        assert!(outcome.passes(Severity::Error));
        assert!(!outcome.passes(Severity::Warn));
    }

    #[test]
    fn rules_filter_and_ruleset_file() {
        let tmp = TempDir::new().unwrap();
        let ruleset = tmp.path().join("rules.yaml");
        fs::write(
            &ruleset,
            "rules:
  title-casing:
    given: $.info.title
    severity: error
    then:
      function: casing
      functionOptions:
        type: kebab
",
        )
        .unwrap();
        let file = tmp.path().join("api.yaml");
        fs::write(&file, SPEC).unwrap();

        let mut args = args(vec![]);
        args.ruleset = Some(ruleset);
        args.rules = Some("title-casing".to_string());
        let plan = plan(&args, Config::default()).unwrap();
        assert!(plan.rules.is_empty());

        let outcome = lint_file(&file, &plan);
        let report = outcome.report.as_ref().unwrap();
        assert_eq!(report.violations.len(), 1);
        assert_eq!(report.violations[0].message, "'Pets' is not kebab case!");
        assert!(!outcome.passes(Severity::Error));
    }

    #[test]
    fn unloadable_document_is_reported_not_fatal() {
        let tmp = TempDir::new().unwrap();
        let file = tmp.path().join("notes.yaml");
        fs::write(&file, "title: not an api\n").unwrap();

        let plan = plan(&args(vec![]), Config::default()).unwrap();
        let outcome = lint_file(&file, &plan);
        assert!(outcome.report.is_none());
        assert!(outcome.error.is_some());
        assert!(!outcome.passes(Severity::Hint));
    }

    #[test]
    fn unknown_preset_is_an_error() {
        let mut args = args(vec![]);
        args.preset = Some("paranoid".to_string());
        assert!(plan(&args, Config::default()).is_err());
    }

    #[test]
    fn run_returns_pass_state() {
        let tmp = TempDir::new().unwrap();
        let file = tmp.path().join("api.yaml");
        fs::write(&file, SPEC).unwrap();

        let passed = run(&args(vec![file.display().to_string()]), &ConfigSource::Default).unwrap();
        assert!(passed);

        let mut strict = args(vec![file.display().to_string()]);
        strict.fail_on = Some(Severity::Info);
        assert!(!run(&strict, &ConfigSource::Default).unwrap());
    }
}
