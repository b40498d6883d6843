//! The property-checker boundary.

use std::time::Duration;

use proofsweep_lattice::{Configuration, Verdict};

/// Result of one oracle call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Evaluation {
    pub verdict: Verdict,
    pub duration: Duration,
    /// Checker message explaining an `ERROR` verdict.
    pub diagnostic: Option<String>,
}

impl Evaluation {
    pub fn new(verdict: Verdict, duration: Duration) -> Self {
        Self {
            verdict,
            duration,
            diagnostic: None,
        }
    }

    pub fn error(diagnostic: impl Into<String>, duration: Duration) -> Self {
        Self {
            verdict: Verdict::Error,
            duration,
            diagnostic: Some(diagnostic.into()),
        }
    }
}

/// Decides whether the property holds for one configuration.
///
/// Implementations return within `timeout_secs` (0 means unbounded) plus a
/// bounded overhead and report expected failures through the verdict:
/// `MEM_OUT`, `TIMEOUT` or `ERROR`. `TRUE` means every checked query holds.
/// Calls run concurrently from several workers.
pub trait Oracle: Sync {
    fn evaluate(&self, configuration: &Configuration, timeout_secs: u64) -> Evaluation;
}

impl<F> Oracle for F
where
    F: Fn(&Configuration, u64) -> Evaluation + Sync,
{
    fn evaluate(&self, configuration: &Configuration, timeout_secs: u64) -> Evaluation {
        self(configuration, timeout_secs)
    }
}
