//! Campaign results and their text and JSON renderings.

use std::collections::BTreeMap;
use std::time::Duration;

use proofsweep_lattice::{BoundaryEntry, Boundaries, Configuration, Verdict};
use serde::{Serialize, Serializer};

use crate::journal::{format_duration, FAILING_HEADER, MAXIMAL_HEADER, OPEN_HEADER};

fn serialize_secs<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_f64(duration.as_secs_f64())
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CampaignStats {
    pub oracle_calls: u64,
    pub verdicts: BTreeMap<Verdict, u64>,
    /// Journal entries settled without calling the oracle.
    pub settled_from_journal: u64,
    #[serde(rename = "elapsed_secs", serialize_with = "serialize_secs")]
    pub elapsed: Duration,
}

impl CampaignStats {
    pub fn record(&mut self, verdict: Verdict) {
        self.oracle_calls += 1;
        *self.verdicts.entry(verdict).or_default() += 1;
    }

    pub fn count(&self, verdict: Verdict) -> u64 {
        self.verdicts.get(&verdict).copied().unwrap_or_default()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CampaignReport {
    pub supremum: Configuration,
    pub timeout_secs: u64,
    pub workers: usize,
    /// Configurations neither tested nor settled (non-zero only after an abort).
    pub open_remaining: usize,
    #[serde(flatten)]
    pub boundaries: Boundaries,
    pub stats: CampaignStats,
}

/// Labels printed around the report.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RunInfo {
    pub query: String,
    /// Revision of the model under test, when known.
    pub revision: Option<String>,
}

impl RunInfo {
    fn suffix(&self) -> String {
        match &self.revision {
            Some(rev) => format!(" for {} in version {}", self.query, short_revision(rev)),
            None => format!(" for {}", self.query),
        }
    }
}

fn short_revision(rev: &str) -> &str {
    rev.get(..7).unwrap_or(rev)
}

fn entry_line(entry: &BoundaryEntry) -> String {
    format!(
        "{}: {} {}",
        entry.configuration,
        entry.verdict,
        format_duration(entry.duration)
    )
}

fn parallel_suffix(workers: usize) -> String {
    if workers > 1 {
        format!(" using {workers} parallel processes")
    } else {
        String::new()
    }
}

/// Human-readable report; its boundary sections form a valid journal.
pub fn render_report(report: &CampaignReport, info: &RunInfo) -> String {
    let suffix = info.suffix();
    let timeout = if report.timeout_secs == 0 {
        "unbounded".to_string()
    } else {
        format_duration(Duration::from_secs(report.timeout_secs))
    };
    let mut lines = vec![
        format!(
            "Proving query: {} in version {}",
            info.query,
            info.revision.as_deref().unwrap_or("?")
        ),
        format!("With maximal configuration: {}", report.supremum),
        format!(
            "Computations with a timeout of {} seconds{}.",
            report.timeout_secs,
            parallel_suffix(report.workers)
        ),
        String::new(),
        format!("{OPEN_HEADER}:"),
    ];
    lines.extend(report.boundaries.exhausted.iter().map(entry_line));
    lines.push(String::new());
    lines.push(format!("{FAILING_HEADER}{suffix}:"));
    lines.extend(report.boundaries.failing.iter().map(entry_line));
    lines.push(String::new());
    lines.push(format!("{MAXIMAL_HEADER} (< {timeout}){suffix}:"));
    lines.extend(report.boundaries.maximal.iter().map(entry_line));
    lines.push(String::new());

    let counts: Vec<String> = report
        .stats
        .verdicts
        .iter()
        .map(|(verdict, n)| format!("{verdict} {n}"))
        .collect();
    lines.push(format!(
        "Oracle calls: {} ({})",
        report.stats.oracle_calls,
        counts.join(", ")
    ));
    if report.open_remaining > 0 {
        lines.push(format!(
            "Configurations left open: {}",
            report.open_remaining
        ));
    }
    lines.push(format!(
        "Total time: {}{}{}.",
        format_duration(report.stats.elapsed),
        suffix,
        parallel_suffix(report.workers)
    ));
    lines.push(String::new());
    lines.join("\n")
}

#[derive(Serialize)]
struct ReportDocument<'a> {
    #[serde(flatten)]
    info: &'a RunInfo,
    #[serde(flatten)]
    report: &'a CampaignReport,
}

pub fn render_json(report: &CampaignReport, info: &RunInfo) -> Result<String, serde_json::Error> {
    serde_json::to_string_pretty(&ReportDocument { info, report })
}
