//! Resume journal: the boundary sections of a previous report.
//!
//! A journal holds three sections, each introduced by a header line and
//! closed by a blank line (or the end of input):
//!
//! ```text
//! Minimal configurations:
//! <configuration>: TIMEOUT 05m 00s
//!
//! Minimal FALSE configurations for secrecy:
//! <configuration>: FALSE 00m 12s
//!
//! Maximal configurations (< 05m 00s) for secrecy:
//! <configuration>: TRUE 01m 40s
//! ```
//!
//! Anything outside the sections is ignored, so a rendered report is a valid
//! journal.

use std::time::Duration;

use proofsweep_lattice::{Configuration, ConfigurationError, Verdict};
use thiserror::Error;

pub const OPEN_HEADER: &str = "Minimal configurations";
pub const FAILING_HEADER: &str = "Minimal FALSE configurations";
pub const MAXIMAL_HEADER: &str = "Maximal configurations";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("journal line {line}: {reason}")]
pub struct JournalError {
    /// 1-based; the line after the last one for a missing section.
    pub line: usize,
    pub reason: String,
}

impl JournalError {
    fn new(line: usize, reason: impl Into<String>) -> Self {
        Self {
            line,
            reason: reason.into(),
        }
    }
}

/// Worklists recovered from a journal.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResumeState {
    /// Minimal configurations that were left unproved, to retry.
    pub open: Vec<Configuration>,
    /// The `MEM_OUT` subset of `open`, with recorded durations.
    pub exhausted: Vec<(Configuration, Duration)>,
    /// Minimal FALSE or CANNOT configurations.
    pub failing: Vec<(Configuration, Verdict, Duration)>,
    /// Maximal TRUE configurations.
    pub maximal: Vec<(Configuration, Duration)>,
}

impl ResumeState {
    pub fn is_empty(&self) -> bool {
        self.open.is_empty() && self.failing.is_empty() && self.maximal.is_empty()
    }
}

/// Render a duration as `MMm SSs`, `HHh MMm` or `N day(s) HHh`.
pub fn format_duration(duration: Duration) -> String {
    let secs = duration.as_secs();
    if secs >= 86_400 {
        let days = secs / 86_400;
        let unit = if days == 1 { "day" } else { "days" };
        format!("{days} {unit} {:02}h", (secs % 86_400) / 3600)
    } else if secs >= 3600 {
        format!("{:02}h {:02}m", secs / 3600, (secs % 3600) / 60)
    } else {
        format!("{:02}m {:02}s", secs / 60, secs % 60)
    }
}

/// Parse any form produced by [`format_duration`]; whitespace is ignored.
pub fn parse_duration(text: &str) -> Option<Duration> {
    let compact: String = text.chars().filter(|c| !c.is_whitespace()).collect();
    let (high, low, high_unit, low_unit) = if let Some((days, rest)) = compact.split_once("day") {
        let hours = rest.strip_prefix('s').unwrap_or(rest).strip_suffix('h')?;
        (days, hours, 86_400, 3600)
    } else if let Some(rest) = compact.strip_suffix('s') {
        let (minutes, seconds) = rest.split_once('m')?;
        (minutes, seconds, 60, 1)
    } else {
        let (hours, minutes) = compact.strip_suffix('m')?.split_once('h')?;
        (hours, minutes, 3600, 60)
    };
    let secs = high
        .parse::<u64>()
        .ok()?
        .checked_mul(high_unit)?
        .checked_add(low.parse::<u64>().ok()?.checked_mul(low_unit)?)?;
    Some(Duration::from_secs(secs))
}

struct Entry {
    configuration: Configuration,
    verdict: Verdict,
    duration: Duration,
}

fn parse_entry(number: usize, line: &str) -> Result<Entry, JournalError> {
    let (configuration, result) = line
        .split_once(':')
        .ok_or_else(|| JournalError::new(number, "expected '<configuration>: <verdict> <duration>'"))?;
    let configuration = configuration
        .parse::<Configuration>()
        .map_err(|e: ConfigurationError| JournalError::new(number, e.to_string()))?;
    let result = result.trim();
    let (verdict, duration) = result.split_once(char::is_whitespace).unwrap_or((result, ""));
    let verdict = verdict
        .parse::<Verdict>()
        .map_err(|e| JournalError::new(number, e.to_string()))?;
    let duration = parse_duration(duration)
        .ok_or_else(|| JournalError::new(number, format!("malformed duration '{}'", duration.trim())))?;
    Ok(Entry {
        configuration,
        verdict,
        duration,
    })
}

/// Parse the three sections of a journal, in order.
pub fn parse_journal(text: &str) -> Result<ResumeState, JournalError> {
    let lines: Vec<&str> = text.lines().collect();
    let mut cursor = 0;
    let mut state = ResumeState::default();

    for entry in section(&lines, &mut cursor, OPEN_HEADER)? {
        let (number, entry) = entry?;
        if !entry.verdict.is_failure() {
            return Err(JournalError::new(
                number,
                format!("unexpected {} among unproved configurations", entry.verdict),
            ));
        }
        if entry.verdict == Verdict::MemOut {
            state.exhausted.push((entry.configuration, entry.duration));
        }
        state.open.push(entry.configuration);
    }

    for entry in section(&lines, &mut cursor, FAILING_HEADER)? {
        let (number, entry) = entry?;
        if !matches!(entry.verdict, Verdict::False | Verdict::Cannot) {
            return Err(JournalError::new(
                number,
                format!("expected FALSE or CANNOT, found {}", entry.verdict),
            ));
        }
        state
            .failing
            .push((entry.configuration, entry.verdict, entry.duration));
    }

    for entry in section(&lines, &mut cursor, MAXIMAL_HEADER)? {
        let (number, entry) = entry?;
        if entry.verdict != Verdict::True {
            return Err(JournalError::new(
                number,
                format!("expected TRUE, found {}", entry.verdict),
            ));
        }
        state.maximal.push((entry.configuration, entry.duration));
    }

    Ok(state)
}

/// Entries of the next section introduced by a line containing `header`.
fn section<'a>(
    lines: &'a [&'a str],
    cursor: &mut usize,
    header: &str,
) -> Result<impl Iterator<Item = Result<(usize, Entry), JournalError>> + 'a, JournalError> {
    let start = lines[*cursor..]
        .iter()
        .position(|l| l.contains(header))
        .map(|p| *cursor + p + 1)
        .ok_or_else(|| JournalError::new(lines.len() + 1, format!("missing '{header}' section")))?;
    let end = lines[start..]
        .iter()
        .position(|l| l.trim().is_empty())
        .map_or(lines.len(), |p| start + p);
    *cursor = end;
    Ok(lines[start..end]
        .iter()
        .enumerate()
        .map(move |(i, line)| parse_entry(start + i + 1, line).map(|e| (start + i + 1, e))))
}
