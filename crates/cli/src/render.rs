//! Report rendering: status lines, JSON and the probe table

use colored::Colorize;
use diagnose_core::application::{Diagnostic, ProbeReport, Registry, RunReport};
use diagnose_core::domain::Outcome;
use serde::Serialize;
use std::sync::Arc;
use tabled::{Table, Tabled};

/// Exit status: 2 on any worker fault, 1 on any failure, 0 otherwise
pub fn exit_status(report: &RunReport) -> u8 {
    if report.has_faults() {
        2
    } else if report.any_failed() {
        1
    } else {
        0
    }
}

/// One status line (multi-line for failures) per probe
pub fn outcome_line(report: &ProbeReport) -> String {
    match &report.outcome {
        Outcome::Skipped { requires: Some(r) } => {
            format!("{} {}: requires {}", "SKIP".yellow().bold(), report.name, r)
        }
        Outcome::Skipped { requires: None } => format!("{} {}", "SKIP".yellow().bold(), report.name),
        Outcome::Passed { message } if message.is_empty() => {
            format!("{} {}", "PASS".green().bold(), report.name)
        }
        Outcome::Passed { message } => {
            format!("{} {}: {}", "PASS".green().bold(), report.name, message)
        }
        Outcome::Failed { failures } => {
            let mut line = format!("{} {}: [", "FAIL".red().bold(), report.name);
            for failure in failures {
                for text in failure.to_string().lines() {
                    line.push_str("\n  ");
                    line.push_str(text);
                }
            }
            line.push_str("\n]");
            line
        }
    }
}

pub fn text(report: &RunReport) -> String {
    let mut lines: Vec<String> = report.reports.iter().map(outcome_line).collect();
    lines.extend(report.faults.iter().map(|fault| {
        format!("{} {}: {}", "ERROR".magenta().bold(), fault.name, fault.error)
    }));
    lines.join("\n")
}

#[derive(Serialize)]
struct JsonFault<'a> {
    name: &'a str,
    error: String,
}

#[derive(Serialize)]
struct JsonReport<'a> {
    reports: &'a [ProbeReport],
    faults: Vec<JsonFault<'a>>,
}

pub fn json(report: &RunReport) -> serde_json::Result<String> {
    let faults = report
        .faults
        .iter()
        .map(|fault| JsonFault {
            name: &fault.name,
            error: fault.error.to_string(),
        })
        .collect();

    serde_json::to_string_pretty(&JsonReport {
        reports: &report.reports,
        faults,
    })
}

#[derive(Tabled)]
struct ProbeRow {
    name: String,
    kind: &'static str,
    parallel: &'static str,
    requires: String,
    message: String,
}

impl ProbeRow {
    fn new(kind: &'static str, diagnostic: &Arc<dyn Diagnostic>) -> Self {
        Self {
            name: diagnostic.name().to_string(),
            kind,
            parallel: if diagnostic.runs_in_parallel() { "yes" } else { "no" },
            requires: diagnostic.requires().unwrap_or("-").to_string(),
            message: diagnostic.message().to_string(),
        }
    }
}

/// Table of every known probe
pub fn probe_table(system: &Registry, stress: &Registry) -> String {
    let rows: Vec<ProbeRow> = system
        .iter()
        .map(|d| ProbeRow::new("system", d))
        .chain(stress.iter().map(|d| ProbeRow::new("stress", d)))
        .collect();

    Table::new(rows).to_string()
}
