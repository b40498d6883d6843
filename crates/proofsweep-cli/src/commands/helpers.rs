//! Helpers turning CLI strings and files into engine inputs.

use std::fs;
use std::path::Path;
use std::process::Command;

use miette::{miette, IntoDiagnostic, WrapErr};
use tracing::warn;

use proofsweep_engine::budget::check_journal_size;
use proofsweep_engine::{parse_journal, ResumeState};
use proofsweep_lattice::Configuration;

use crate::OutputFormat;

pub(crate) fn parse_output_format(raw: &str) -> miette::Result<OutputFormat> {
    match raw {
        "text" => Ok(OutputFormat::Text),
        "json" => Ok(OutputFormat::Json),
        other => Err(miette!("unknown output format: {other}. Use 'text' or 'json'.")),
    }
}

pub(crate) fn parse_configuration(raw: &str, what: &str) -> miette::Result<Configuration> {
    raw.parse::<Configuration>()
        .map_err(|e| miette!("invalid {what} configuration '{raw}': {e}"))
}

/// Read and parse a resume journal, refusing oversized files.
pub(crate) fn load_journal(path: &Path) -> miette::Result<ResumeState> {
    let size = fs::metadata(path)
        .into_diagnostic()
        .wrap_err_with(|| format!("cannot stat journal {}", path.display()))?
        .len();
    check_journal_size(size).into_diagnostic()?;
    let text = fs::read_to_string(path)
        .into_diagnostic()
        .wrap_err_with(|| format!("cannot read journal {}", path.display()))?;
    parse_journal(&text)
        .into_diagnostic()
        .wrap_err_with(|| format!("malformed journal {}", path.display()))
}

/// `git rev-parse HEAD` of the working directory, if it is a repository.
pub(crate) fn git_revision() -> Option<String> {
    let output = match Command::new("git").args(["rev-parse", "HEAD"]).output() {
        Ok(output) => output,
        Err(e) => {
            warn!(error = %e, "cannot run git");
            return None;
        }
    };
    if !output.status.success() {
        warn!("git rev-parse HEAD failed; revision left blank");
        return None;
    }
    let revision = String::from_utf8_lossy(&output.stdout).trim().to_string();
    (!revision.is_empty()).then_some(revision)
}
