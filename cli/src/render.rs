//! Human and JSON renderings of command results.

use depot_core::api::{ReconcileOutcome, RemoteAssetRecord, RunOutcome, RunReport};
use serde_json::{json, Value};

use crate::commands::cli::OutputFormat;

pub fn report_json(report: &RunReport) -> Value {
    json!({
        "summary": report.summary,
        "outcome": report.outcome,
        "phase": report.phase.to_string(),
        "failures": report.failures,
        "deleted": report.reconcile.deleted,
        "deletion_failures": report.reconcile.failed,
        "commit_message": report.commit_message,
        "commit_error": report.commit_error.as_ref().map(|e| e.to_string()),
        "fatal_error": report.fatal_error.as_ref().map(|e| json!({
            "kind": e.kind(),
            "message": e.to_string(),
        })),
        "hint": report.recovery_hint(),
    })
}

pub fn report_text(report: &RunReport) -> String {
    let s = &report.summary;
    let mut out = String::new();

    match report.outcome {
        RunOutcome::Completed if report.fully_successful() => out.push_str("Upload complete\n"),
        RunOutcome::Completed => out.push_str("Upload finished with problems\n"),
        RunOutcome::Aborted(reason) => {
            let reason = serde_json::to_value(reason)
                .ok()
                .and_then(|v| v.as_str().map(str::to_string))
                .unwrap_or_default();
            out.push_str(&format!("Run aborted ({reason})\n"));
        }
    }

    out.push_str(&format!(
        "  files: {} attempted, {} succeeded, {} failed\n",
        s.files_attempted, s.files_succeeded, s.files_failed
    ));
    out.push_str(&format!("  deleted remote files: {}\n", s.deleted_count));
    if report.reconcile.has_failures() {
        out.push_str(&format!(
            "  deletion failures: {}\n",
            join(report.reconcile.failed.iter())
        ));
    }
    out.push_str(&format!("  committed: {}\n", if s.committed { "yes" } else { "no" }));
    if let Some(message) = &report.commit_message {
        out.push_str(&format!("  remote: {message}\n"));
    }

    for failure in &report.failures {
        out.push_str(&format!(
            "  ✗ {} [{}] {}\n",
            failure.name, failure.kind, failure.message
        ));
    }

    if let Some(err) = &report.commit_error {
        out.push_str(&format!("  commit error: {err}\n"));
    }
    if let Some(err) = &report.fatal_error {
        out.push_str(&format!("  fatal error: {err}\n"));
    }
    if let Some(hint) = report.recovery_hint() {
        out.push_str(&format!("  hint: {hint} (run `depot commit`)\n"));
    }
    out
}

pub fn print_report(report: &RunReport, format: OutputFormat) {
    match format {
        OutputFormat::Json => println!("{}", pretty(&report_json(report))),
        OutputFormat::Text => print!("{}", report_text(report)),
    }
}

pub fn records_text(records: &[RemoteAssetRecord]) -> String {
    if records.is_empty() {
        return "No files listed in the remote workspace\n".to_string();
    }
    let width = records
        .iter()
        .map(|r| r.display_name.chars().count())
        .max()
        .unwrap_or(0);
    let mut out = format!("{} file(s) in the remote workspace\n", records.len());
    for r in records {
        out.push_str(&format!(
            "  {:<width$}  {:>10}  {}  {}\n",
            r.display_name, r.size_label, r.uploaded_timestamp, r.identifier
        ));
    }
    out
}

pub fn print_records(records: &[RemoteAssetRecord], format: OutputFormat) {
    match format {
        OutputFormat::Json => println!("{}", pretty(&json!({ "files": records, "count": records.len() }))),
        OutputFormat::Text => print!("{}", records_text(records)),
    }
}

pub fn reconcile_text(outcome: &ReconcileOutcome) -> String {
    let mut out = format!("Deleted {} file(s)\n", outcome.deleted_count());
    if outcome.has_failures() {
        out.push_str(&format!(
            "Failed to delete {}: {}\n",
            outcome.failed.len(),
            join(outcome.failed.iter())
        ));
    }
    out
}

pub fn print_reconcile(outcome: &ReconcileOutcome, format: OutputFormat) {
    match format {
        OutputFormat::Json => println!(
            "{}",
            pretty(&json!({ "deleted": outcome.deleted, "failed": outcome.failed }))
        ),
        OutputFormat::Text => print!("{}", reconcile_text(outcome)),
    }
}

fn join<'a>(items: impl Iterator<Item = &'a String>) -> String {
    items.map(String::as_str).collect::<Vec<_>>().join(", ")
}

fn pretty(value: &Value) -> String {
    serde_json::to_string_pretty(value).unwrap_or_else(|_| value.to_string())
}
