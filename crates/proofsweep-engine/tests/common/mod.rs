#![allow(dead_code)]

use std::collections::BTreeSet;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use proofsweep_engine::{CampaignReport, Evaluation, Oracle};
use proofsweep_lattice::{Configuration, Verdict};

pub const SUP: &str =
    "RSA|ECC, None|Sign|Encrypt, no_reopen, SSec, anon|pwd|cert, no_switch, no_leaks";

/// Configurations below which the property holds.
pub const GENERATORS: &[&str] = &[
    "RSA, None|Sign, no_reopen, SSec, anon|pwd, no_switch, no_leaks",
    "RSA|ECC, None, no_reopen, SSec, anon, no_switch, no_leaks",
    "ECC, Encrypt, no_reopen, SSec, cert, no_switch, no_leaks",
];

pub fn cfg(text: &str) -> Configuration {
    text.parse()
        .unwrap_or_else(|e| panic!("bad configuration '{text}': {e}"))
}

/// Deterministic oracle: TRUE iff the configuration lies below a generator,
/// FALSE otherwise. Every call is logged.
pub struct MonotoneOracle {
    generators: Vec<Configuration>,
    calls: AtomicU64,
    log: Mutex<Vec<(Configuration, u64)>>,
}

impl MonotoneOracle {
    pub fn new(generators: &[&str]) -> Self {
        Self {
            generators: generators.iter().map(|g| cfg(g)).collect(),
            calls: AtomicU64::new(0),
            log: Mutex::new(Vec::new()),
        }
    }

    pub fn holds(&self, configuration: &Configuration) -> bool {
        self.generators.iter().any(|g| configuration.leq(g))
    }

    pub fn calls(&self) -> u64 {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn log(&self) -> Vec<(Configuration, u64)> {
        self.log.lock().unwrap().clone()
    }
}

impl Oracle for MonotoneOracle {
    fn evaluate(&self, configuration: &Configuration, timeout_secs: u64) -> Evaluation {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.log.lock().unwrap().push((*configuration, timeout_secs));
        let verdict = if self.holds(configuration) {
            Verdict::True
        } else {
            Verdict::False
        };
        Evaluation::new(verdict, Duration::from_secs(1))
    }
}

/// Every configuration below `sup`, by brute force over element subsets.
pub fn all_below(sup: &Configuration) -> Vec<Configuration> {
    let elements = sup.elements();
    (0u32..1 << elements.len())
        .filter_map(|mask| {
            let chosen: Vec<_> = elements
                .iter()
                .enumerate()
                .filter(|(i, _)| mask & (1 << i) != 0)
                .map(|(_, &e)| e)
                .collect();
            Configuration::from_elements(&chosen).ok()
        })
        .collect()
}

pub fn expected_maximal(oracle: &MonotoneOracle, sup: &Configuration) -> BTreeSet<String> {
    let holding: Vec<_> = all_below(sup).into_iter().filter(|c| oracle.holds(c)).collect();
    holding
        .iter()
        .filter(|c| !holding.iter().any(|d| d != *c && c.leq(d)))
        .map(ToString::to_string)
        .collect()
}

pub fn expected_minimal_failing(oracle: &MonotoneOracle, sup: &Configuration) -> BTreeSet<String> {
    let failing: Vec<_> = all_below(sup).into_iter().filter(|c| !oracle.holds(c)).collect();
    failing
        .iter()
        .filter(|c| !failing.iter().any(|d| d != *c && d.leq(c)))
        .map(ToString::to_string)
        .collect()
}

pub fn maximal_of(report: &CampaignReport) -> BTreeSet<String> {
    report
        .boundaries
        .maximal
        .iter()
        .map(|e| e.configuration.to_string())
        .collect()
}

pub fn failing_of(report: &CampaignReport) -> BTreeSet<String> {
    report
        .boundaries
        .failing
        .iter()
        .map(|e| e.configuration.to_string())
        .collect()
}
