//! Shared output formatting for lint results.

use anyhow::Result;
use apilint_core::types::ViolationDiagnostic;
use apilint_core::Severity;
use miette::NamedSource;

use super::lint::FileReport;
use crate::OutputFormat;

/// Print lint results in the specified format.
pub fn print(reports: &[FileReport], format: OutputFormat, fail_on: Severity) -> Result<()> {
    match format {
        OutputFormat::Text => print_text(reports, fail_on),
        OutputFormat::Json => return print_json(reports),
        OutputFormat::Compact => print_compact(reports),
    }
    Ok(())
}

fn severity_indicator(severity: Severity) -> &'static str {
    match severity {
        Severity::Error => "\x1b[31merror\x1b[0m",
        Severity::Warn => "\x1b[33mwarning\x1b[0m",
        Severity::Info => "\x1b[34minfo\x1b[0m",
        Severity::Hint => "\x1b[36mhint\x1b[0m",
    }
}

fn print_text(reports: &[FileReport], fail_on: Severity) {
    let mut totals = (0, 0, 0, 0);

    for outcome in reports {
        let name = outcome.file.display().to_string();

        if let Some(error) = &outcome.error {
            println!("{name}");
            println!("  {}: {}", severity_indicator(Severity::Error), error);
            println!();
            continue;
        }
        let Some(report) = &outcome.report else {
            continue;
        };

        if let Some(spec) = &report.spec {
            tracing::debug!("{} is {} {}", name, spec.spec_type, spec.version);
        }

        for violation in &report.violations {
            if violation.severity >= fail_on {
                let diagnostic = miette::Report::new(ViolationDiagnostic::new(
                    violation,
                    &outcome.content,
                ))
                .with_source_code(NamedSource::new(&name, outcome.content.clone()));
                println!("{diagnostic:?}");
            } else {
                let position = violation
                    .range
                    .map(|r| format!(":{}:{}", r.start_line, r.start_col))
                    .unwrap_or_default();
                println!("{} {} at {}{}", violation.rule_id, violation.path, name, position);
                println!(
                    "  {}: {}",
                    severity_indicator(violation.severity),
                    violation.message
                );
                println!();
            }
        }

        for diagnostic in &report.diagnostics {
            println!("{name}: note: {diagnostic}");
        }
        if report.partial {
            println!("{name}: note: results are partial, the evaluation deadline expired");
        }

        let (errors, warnings, infos, hints) = report.count_by_severity();
        totals.0 += errors;
        totals.1 += warnings;
        totals.2 += infos;
        totals.3 += hints;
    }

    let (errors, warnings, infos, hints) = totals;
    let failed = reports.iter().any(|r| !r.passes(fail_on));
    let summary_color = if failed {
        "\x1b[31m"
    } else if errors + warnings > 0 {
        "\x1b[33m"
    } else {
        "\x1b[32m"
    };

    println!(
        "{}Found {} error(s), {} warning(s), {} info(s), {} hint(s) in {} file(s)\x1b[0m",
        summary_color,
        errors,
        warnings,
        infos,
        hints,
        reports.len()
    );
}

fn print_json(reports: &[FileReport]) -> Result<()> {
    let json = serde_json::to_string_pretty(reports)?;
    println!("{json}");
    Ok(())
}

fn print_compact(reports: &[FileReport]) {
    for outcome in reports {
        let name = outcome.file.display();
        if let Some(error) = &outcome.error {
            println!("{name}: error [document] {error}");
        }
        for violation in outcome.report.iter().flat_map(|r| &r.violations) {
            println!("{name}:{violation}");
        }
    }
}
