//! Core types for lint violations and reports.

use std::fmt;
use std::str::FromStr;

use miette::{Diagnostic as MietteDiagnostic, SourceSpan};
use serde::{Deserialize, Serialize};

use crate::document::{offset_for, SpecInfo};
use crate::index::IndexDiagnostic;
use crate::tree::Span;

/// Severity level for violations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// Stylistic suggestion.
    Hint,
    /// Informational message.
    Info,
    /// Warning that should be addressed.
    #[serde(alias = "warning")]
    Warn,
    /// Error that must be fixed.
    Error,
}

impl Severity {
    /// All severities, lowest first.
    pub const ALL: [Self; 4] = [Self::Hint, Self::Info, Self::Warn, Self::Error];

    /// Returns the lowercase name.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Hint => "hint",
            Self::Info => "info",
            Self::Warn => "warn",
            Self::Error => "error",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when parsing an unknown severity name.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown severity '{0}', expected one of: error, warn, info, hint")]
pub struct UnknownSeverity(pub String);

impl FromStr for Severity {
    type Err = UnknownSeverity;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "hint" => Ok(Self::Hint),
            "info" => Ok(Self::Info),
            "warn" | "warning" => Ok(Self::Warn),
            "error" => Ok(Self::Error),
            _ => Err(UnknownSeverity(s.to_string())),
        }
    }
}

/// Source range of a violation (1-indexed, inclusive start).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Range {
    /// Start line.
    pub start_line: usize,
    /// Start column.
    pub start_col: usize,
    /// End line.
    pub end_line: usize,
    /// End column.
    pub end_col: usize,
}

impl From<Span> for Range {
    fn from(span: Span) -> Self {
        Self {
            start_line: span.start.line,
            start_col: span.start.column,
            end_line: span.end.line,
            end_col: span.end.column,
        }
    }
}

/// A rule violation in the final report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Violation {
    /// Id of the rule that produced it.
    pub rule_id: String,
    /// Human-readable message.
    pub message: String,
    /// Path of the offending node.
    pub path: String,
    /// Effective severity.
    pub severity: Severity,
    /// Source range, when the node's position is known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub range: Option<Range>,
}

impl Violation {
    /// Creates a new violation without a source range.
    #[must_use]
    pub fn new(
        rule_id: impl Into<String>,
        severity: Severity,
        path: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            rule_id: rule_id.into(),
            message: message.into(),
            path: path.into(),
            severity,
            range: None,
        }
    }

    /// Sets the source range.
    #[must_use]
    pub fn with_range(mut self, range: Range) -> Self {
        self.range = Some(range);
        self
    }

    /// Returns the `(line, column)` sort key; unknown positions sort last.
    #[must_use]
    pub fn position_key(&self) -> (usize, usize) {
        self.range
            .map_or((usize::MAX, usize::MAX), |r| (r.start_line, r.start_col))
    }

    /// Formats the violation for terminal output.
    #[must_use]
    pub fn format(&self) -> String {
        use std::fmt::Write;
        let mut output = match self.range {
            Some(r) => format!("{} at {}:{}\n", self.rule_id, r.start_line, r.start_col),
            None => format!("{}\n", self.rule_id),
        };
        let _ = writeln!(output, "  {}: {}", self.severity, self.message);
        let _ = writeln!(output, "  = path: {}", self.path);
        output
    }
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(r) = self.range {
            write!(f, "{}:{}: ", r.start_line, r.start_col)?;
        }
        write!(
            f,
            "{} [{}] {} ({})",
            self.severity, self.rule_id, self.message, self.path
        )
    }
}

/// Converts a [`Violation`] to a miette diagnostic for rich display.
#[derive(Debug, thiserror::Error, MietteDiagnostic)]
#[error("[{rule_id}] {message}")]
pub struct ViolationDiagnostic {
    rule_id: String,
    message: String,
    #[help]
    help: Option<String>,
    #[label("{label_message}")]
    span: SourceSpan,
    label_message: String,
}

impl ViolationDiagnostic {
    /// Builds the diagnostic, computing byte offsets against `content`.
    #[must_use]
    pub fn new(v: &Violation, content: &str) -> Self {
        let (offset, length) = v.range.map_or((0, 0), |r| {
            let start = offset_for(content, r.start_line, r.start_col);
            let end = offset_for(content, r.end_line, r.end_col);
            (start, end.saturating_sub(start))
        });
        Self {
            rule_id: v.rule_id.clone(),
            message: v.message.clone(),
            help: Some(format!("at {}", v.path)),
            span: SourceSpan::from((offset, length)),
            label_message: v.severity.to_string(),
        }
    }
}

/// Kinds of non-violation findings attached to a report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DiagnosticKind {
    /// A rule definition was rejected.
    RuleLoad,
    /// A reference target does not exist.
    UnresolvedReference,
    /// A reference closes a cycle.
    CircularReference,
    /// A reference points to another document.
    ExternalReference,
    /// A function panicked and was treated as producing no results.
    FunctionFailure,
    /// The evaluation deadline expired.
    DeadlineExceeded,
}

impl fmt::Display for DiagnosticKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::RuleLoad => "rule-load",
            Self::UnresolvedReference => "unresolved-reference",
            Self::CircularReference => "circular-reference",
            Self::ExternalReference => "external-reference",
            Self::FunctionFailure => "function-failure",
            Self::DeadlineExceeded => "deadline-exceeded",
        };
        f.write_str(s)
    }
}

/// A caveat about a run: something that did not stop it but affects how far
/// the report can be trusted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Diagnostic {
    /// What happened.
    pub kind: DiagnosticKind,
    /// Rule involved, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rule_id: Option<String>,
    /// Document path involved, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    /// Human-readable description.
    pub message: String,
}

impl Diagnostic {
    /// Creates a diagnostic.
    #[must_use]
    pub fn new(kind: DiagnosticKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            rule_id: None,
            path: None,
            message: message.into(),
        }
    }

    /// Creates a rule-load diagnostic.
    #[must_use]
    pub fn rule_load(rule_id: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(DiagnosticKind::RuleLoad, message).with_rule(rule_id)
    }

    /// Sets the rule id.
    #[must_use]
    pub fn with_rule(mut self, rule_id: impl Into<String>) -> Self {
        self.rule_id = Some(rule_id.into());
        self
    }

    /// Sets the document path.
    #[must_use]
    pub fn with_path(mut self, path: impl Into<String>) -> Self {
        self.path = Some(path.into());
        self
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.kind, self.message)
    }
}

impl From<&IndexDiagnostic> for Diagnostic {
    fn from(d: &IndexDiagnostic) -> Self {
        let kind = match d {
            IndexDiagnostic::UnresolvedReference { .. } => DiagnosticKind::UnresolvedReference,
            IndexDiagnostic::ExternalReference { .. } => DiagnosticKind::ExternalReference,
            IndexDiagnostic::CircularReference { .. } => DiagnosticKind::CircularReference,
        };
        Self::new(kind, d.to_string()).with_path(d.path())
    }
}

/// Result of running the motor over one document.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Report {
    /// Classification of the document, when known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub spec: Option<SpecInfo>,
    /// Ordered, deduplicated violations.
    pub violations: Vec<Violation>,
    /// Load, index and runtime caveats.
    pub diagnostics: Vec<Diagnostic>,
    /// `true` when the deadline expired before every rule finished.
    pub partial: bool,
    /// Number of rules that were evaluated.
    pub rules_evaluated: usize,
}

impl Report {
    /// Creates a new empty report.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns true if there are any errors.
    #[must_use]
    pub fn has_errors(&self) -> bool {
        self.has_violations_at(Severity::Error)
    }

    /// Checks if any violations meet or exceed the given severity threshold.
    #[must_use]
    pub fn has_violations_at(&self, severity: Severity) -> bool {
        self.violations.iter().any(|v| v.severity >= severity)
    }

    /// Returns true when there are no violations and no diagnostics.
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.violations.is_empty() && self.diagnostics.is_empty() && !self.partial
    }

    /// Returns violations filtered by severity.
    #[must_use]
    pub fn by_severity(&self, severity: Severity) -> Vec<&Violation> {
        self.violations
            .iter()
            .filter(|v| v.severity == severity)
            .collect()
    }

    /// Counts violations by severity: `(errors, warnings, infos, hints)`.
    #[must_use]
    pub fn count_by_severity(&self) -> (usize, usize, usize, usize) {
        let count = |s: Severity| self.violations.iter().filter(|v| v.severity == s).count();
        (
            count(Severity::Error),
            count(Severity::Warn),
            count(Severity::Info),
            count(Severity::Hint),
        )
    }

    /// Formats violations at or above `fail_on` as a multi-line failure
    /// report, suitable for `panic!()` messages in tests.
    #[must_use]
    pub fn format_test_report(&self, fail_on: Severity) -> String {
        use std::fmt::Write;

        let failing: Vec<&Violation> = self
            .violations
            .iter()
            .filter(|v| v.severity >= fail_on)
            .collect();

        let mut report = String::new();
        let _ = writeln!(report, "\n=== apilint: {} violation(s) ===\n", failing.len());
        for v in &failing {
            let _ = writeln!(report, "{}", v.format());
        }

        let (errors, warnings, infos, hints) = self.count_by_severity();
        let _ = writeln!(
            report,
            "Total: {errors} error(s), {warnings} warning(s), {infos} info(s), {hints} hint(s)"
        );
        if self.partial {
            let _ = writeln!(report, "(partial: evaluation deadline expired)");
        }
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_violation(severity: Severity) -> Violation {
        Violation::new(
            "operation-tag-defined",
            severity,
            "#/paths/~1pets/get/tags/0",
            "tag 'pets' is not defined",
        )
        .with_range(Range {
            start_line: 7,
            start_col: 9,
            end_line: 7,
            end_col: 13,
        })
    }

    #[test]
    fn severity_parses_aliases() {
        assert_eq!("warning".parse::<Severity>(), Ok(Severity::Warn));
        assert_eq!("ERROR".parse::<Severity>(), Ok(Severity::Error));
        assert!("fatal".parse::<Severity>().is_err());
        assert!(Severity::Hint < Severity::Info && Severity::Warn < Severity::Error);
    }

    #[test]
    fn violation_display_includes_position() {
        let display = make_violation(Severity::Warn).to_string();
        assert!(display.starts_with("7:9: warn [operation-tag-defined]"));
    }

    #[test]
    fn violation_format_without_range() {
        let mut v = make_violation(Severity::Error);
        v.range = None;
        assert!(v.format().starts_with("operation-tag-defined\n"));
        assert_eq!(v.position_key(), (usize::MAX, usize::MAX));
    }

    #[test]
    fn violation_serializes_camel_case() {
        let json = serde_json::to_value(make_violation(Severity::Error)).unwrap();
        assert_eq!(json["ruleId"], "operation-tag-defined");
        assert_eq!(json["range"]["startLine"], 7);
        assert_eq!(json["severity"], "error");
    }

    #[test]
    fn has_violations_at_threshold() {
        let mut report = Report::new();
        report.violations.push(make_violation(Severity::Warn));
        assert!(!report.has_errors());
        assert!(report.has_violations_at(Severity::Warn));
        assert!(report.has_violations_at(Severity::Hint));
        assert!(!report.is_clean());
    }

    #[test]
    fn format_test_report_filters_by_severity() {
        let mut report = Report::new();
        report.violations.push(make_violation(Severity::Warn));
        report.violations.push(make_violation(Severity::Error));
        let text = report.format_test_report(Severity::Error);
        assert!(text.contains("1 violation(s)"));
        assert!(text.contains("1 error(s), 1 warning(s)"));
        insta::assert_snapshot!(text.trim(), @r"
        === apilint: 1 violation(s) ===

        operation-tag-defined at 7:9
          error: tag 'pets' is not defined
          = path: #/paths/~1pets/get/tags/0

        Total: 1 error(s), 1 warning(s), 0 info(s), 0 hint(s)
        ");
    }

    #[test]
    fn index_diagnostic_conversion_keeps_path() {
        let d = Diagnostic::from(&IndexDiagnostic::CircularReference {
            path: "#/a".to_string(),
            pointer: "#/a".to_string(),
        });
        assert_eq!(d.kind, DiagnosticKind::CircularReference);
        assert_eq!(d.path.as_deref(), Some("#/a"));
    }

    #[test]
    fn miette_span_uses_byte_offsets() {
        let content = "a: 1\nbb: 2\n";
        let v = Violation::new("r", Severity::Error, "#/bb", "m").with_range(Range {
            start_line: 2,
            start_col: 1,
            end_line: 2,
            end_col: 3,
        });
        let diag = ViolationDiagnostic::new(&v, content);
        assert_eq!(diag.span.offset(), 5);
        assert_eq!(diag.span.len(), 2);
    }
}
