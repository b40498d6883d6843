//! Concurrent campaign driver.
//!
//! A [`Scheduler`] owns the trie and the resume worklists and runs a pool of
//! workers against them in two phases separated by a barrier:
//!
//! * Phase A retests the recorded minimal failing and maximal TRUE
//!   configurations with an extended timeout.
//! * Phase B explores: recorded open configurations first, each followed by
//!   a greedy climb through [`Trie::mutate_up`] while the verdict stays TRUE,
//!   then whatever [`Trie::first`] returns until the trie is void.
//!
//! The trie lock is held for reservation and for mark-and-propagate, never
//! across an oracle call.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard};
use std::thread;
use std::time::{Duration, Instant};

use proofsweep_lattice::{Configuration, ConfigurationError, Element, Trie, TrieError, Verdict};
use thiserror::Error;
use tracing::{debug, error, info, warn};

use crate::budget::{BudgetError, DEFAULT_TIMEOUT_SECS};
use crate::journal::{format_duration, ResumeState};
use crate::oracle::Oracle;
use crate::report::{CampaignReport, CampaignStats};
use crate::timeout::retest_timeout_secs;

#[derive(Debug, Error)]
pub enum CampaignError {
    #[error("oracle failed on [{configuration}]: {diagnostic}")]
    OracleFailure {
        configuration: String,
        diagnostic: String,
    },
    #[error("oracle returned non-terminal verdict {verdict} for [{configuration}]")]
    OpenVerdict {
        configuration: String,
        verdict: Verdict,
    },
    #[error("seed configuration [{0}] is not below the maximal configuration")]
    SeedOutsideLattice(Configuration),
    #[error(transparent)]
    Inconsistent(#[from] TrieError),
    #[error(transparent)]
    Configuration(#[from] ConfigurationError),
    #[error(transparent)]
    Budget(#[from] BudgetError),
}

/// Runtime options of one campaign.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CampaignOptions {
    /// Per-oracle timeout in seconds; 0 is unbounded.
    pub timeout_secs: u64,
    pub workers: usize,
    /// Settle journal entries with their recorded verdicts instead of
    /// retesting them.
    pub skip_known: bool,
    /// Tested once without timeout before anything else.
    pub seed: Option<Configuration>,
}

impl Default for CampaignOptions {
    fn default() -> Self {
        Self {
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            workers: 1,
            skip_known: false,
            seed: None,
        }
    }
}

#[derive(Debug, Default)]
struct Worklists {
    failing: VecDeque<(Configuration, Verdict, Duration)>,
    maximal: VecDeque<(Configuration, Duration)>,
    open: VecDeque<Configuration>,
}

pub struct Scheduler<'o, O: Oracle + ?Sized> {
    supremum: Configuration,
    trie: Mutex<Trie>,
    oracle: &'o O,
    options: CampaignOptions,
    resume: ResumeState,
    worklists: Mutex<Worklists>,
    stats: Mutex<CampaignStats>,
    abort: AtomicBool,
    failure: Mutex<Option<CampaignError>>,
}

fn relock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

impl<'o, O: Oracle + ?Sized> Scheduler<'o, O> {
    pub fn new(supremum: Configuration, oracle: &'o O, options: CampaignOptions) -> Self {
        Self {
            supremum,
            trie: Mutex::new(Trie::from_configuration(supremum)),
            oracle,
            options,
            resume: ResumeState::default(),
            worklists: Mutex::new(Worklists::default()),
            stats: Mutex::new(CampaignStats::default()),
            abort: AtomicBool::new(false),
            failure: Mutex::new(None),
        }
    }

    /// Seed the worklists from a previous run.
    pub fn with_resume(mut self, resume: ResumeState) -> Self {
        self.resume = resume;
        self
    }

    /// Run the campaign to completion or to the first fatal error.
    pub fn run(self) -> Result<CampaignReport, CampaignError> {
        if self.options.workers == 0 {
            return Err(BudgetError::NoWorkers.into());
        }
        let started = Instant::now();
        info!(
            supremum = %self.supremum,
            configurations = relock(&self.trie).configuration_count(),
            workers = self.options.workers,
            timeout_secs = self.options.timeout_secs,
            "campaign started"
        );

        if self.options.skip_known {
            self.settle_from_journal()?;
        } else {
            self.load_worklists(false);
        }
        if let Some(seed) = self.options.seed {
            self.test_seed(seed)?;
        }

        self.run_pool("settle", Self::settle_known)?;
        self.run_pool("explore", Self::explore)?;

        let trie = relock(&self.trie);
        let mut stats = relock(&self.stats).clone();
        stats.elapsed = started.elapsed();
        info!(
            oracle_calls = stats.oracle_calls,
            elapsed = %format_duration(stats.elapsed),
            "campaign finished"
        );
        Ok(CampaignReport {
            supremum: self.supremum,
            timeout_secs: self.options.timeout_secs,
            workers: self.options.workers,
            open_remaining: trie.open_count(),
            boundaries: trie.boundaries(),
            stats,
        })
    }

    /// Fill the worklists from the journal. Entries already settled from the
    /// journal (failing, maximal, MEM_OUT) are left out.
    fn load_worklists(&self, skip_known: bool) {
        let mut lists = relock(&self.worklists);
        if !skip_known {
            lists.failing.extend(self.resume.failing.iter().copied());
            lists.maximal.extend(self.resume.maximal.iter().copied());
        }
        lists.open.extend(self.resume.open.iter().copied().filter(|c| {
            !skip_known || !self.resume.exhausted.iter().any(|(e, _)| e == c)
        }));
    }

    /// Write the journal's verdicts into the trie without calling the oracle.
    fn settle_from_journal(&self) -> Result<(), CampaignError> {
        let recorded = self
            .resume
            .failing
            .iter()
            .copied()
            .chain(
                self.resume
                    .exhausted
                    .iter()
                    .map(|&(c, d)| (c, Verdict::MemOut, d)),
            )
            .chain(
                self.resume
                    .maximal
                    .iter()
                    .map(|&(c, d)| (c, Verdict::True, d)),
            );
        let mut settled = 0;
        {
            let mut trie = relock(&self.trie);
            for (configuration, verdict, duration) in recorded {
                let path = configuration.elements();
                if trie.find(&path) {
                    debug!(%configuration, %verdict, "settling recorded verdict");
                    trie.record(&path, verdict, duration)?;
                    settled += 1;
                }
            }
        }
        relock(&self.stats).settled_from_journal += settled;
        info!(settled, "skipped recorded configurations");
        self.load_worklists(true);
        Ok(())
    }

    fn test_seed(&self, seed: Configuration) -> Result<(), CampaignError> {
        let path = seed.elements();
        let reserved = {
            let mut trie = relock(&self.trie);
            if !trie.contains(&seed) {
                return Err(CampaignError::SeedOutsideLattice(seed));
            }
            trie.reserve(&path)
        };
        if !reserved {
            info!(configuration = %seed, "seed configuration already decided");
            return Ok(());
        }
        let verdict = self.test(&path, 0)?;
        if verdict.is_failure() {
            warn!(configuration = %seed, %verdict, "seed configuration is not TRUE");
        }
        Ok(())
    }

    fn run_pool(
        &self,
        phase: &str,
        worker: fn(&Self) -> Result<(), CampaignError>,
    ) -> Result<(), CampaignError> {
        debug!(phase, workers = self.options.workers, "phase started");
        if self.options.workers == 1 {
            if let Err(e) = worker(self) {
                self.fail(e);
            }
        } else {
            thread::scope(|scope| {
                for _ in 0..self.options.workers {
                    scope.spawn(|| {
                        if let Err(e) = worker(self) {
                            self.fail(e);
                        }
                    });
                }
            });
        }
        match relock(&self.failure).take() {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    fn fail(&self, e: CampaignError) {
        error!(error = %e, "aborting campaign");
        self.abort.store(true, Ordering::Release);
        let mut failure = relock(&self.failure);
        if failure.is_none() {
            *failure = Some(e);
        }
    }

    fn aborted(&self) -> bool {
        self.abort.load(Ordering::Acquire)
    }

    /// Evaluate a reserved configuration and propagate its verdict.
    fn test(&self, path: &[Element], timeout_secs: u64) -> Result<Verdict, CampaignError> {
        let configuration = Configuration::from_elements(path)?;
        let evaluation = self.oracle.evaluate(&configuration, timeout_secs);
        let verdict = evaluation.verdict;
        relock(&self.stats).record(verdict);
        info!(
            %configuration,
            %verdict,
            duration = %format_duration(evaluation.duration),
            "oracle verdict"
        );
        match verdict {
            Verdict::Error => Err(CampaignError::OracleFailure {
                configuration: configuration.to_string(),
                diagnostic: evaluation
                    .diagnostic
                    .unwrap_or_else(|| "no diagnostic".to_string()),
            }),
            Verdict::Unknown | Verdict::Pending => Err(CampaignError::OpenVerdict {
                configuration: configuration.to_string(),
                verdict,
            }),
            _ => {
                relock(&self.trie).record(path, verdict, evaluation.duration)?;
                Ok(verdict)
            }
        }
    }

    /// Phase A worker: retest recorded boundary points.
    fn settle_known(&self) -> Result<(), CampaignError> {
        while !self.aborted() {
            let next = {
                let mut lists = relock(&self.worklists);
                lists.failing.pop_front().or_else(|| {
                    lists
                        .maximal
                        .pop_front()
                        .map(|(c, d)| (c, Verdict::True, d))
                })
            };
            let Some((configuration, recorded, duration)) = next else {
                break;
            };
            let path = configuration.elements();
            if !relock(&self.trie).reserve(&path) {
                continue;
            }
            let timeout = retest_timeout_secs(duration, self.options.timeout_secs);
            let verdict = self.test(&path, timeout)?;
            if recorded == Verdict::True && verdict.is_failure() {
                warn!(%configuration, %verdict, "recorded maximal TRUE configuration is no longer TRUE");
            } else if recorded != Verdict::True && verdict == Verdict::True {
                warn!(%configuration, %recorded, "recorded minimal failing configuration is now TRUE");
            }
        }
        Ok(())
    }

    /// Phase B worker.
    fn explore(&self) -> Result<(), CampaignError> {
        while !self.aborted() {
            let next_open = relock(&self.worklists).open.pop_front();
            if let Some(configuration) = next_open {
                let path = configuration.elements();
                let start = {
                    let mut trie = relock(&self.trie);
                    if trie.reserve(&path) {
                        Some(path)
                    } else {
                        trie.mutate_down(&path).filter(|down| trie.reserve(down))
                    }
                };
                if let Some(start) = start {
                    self.climb(start)?;
                }
                continue;
            }

            let picked = {
                let mut trie = relock(&self.trie);
                trie.first().filter(|path| trie.reserve(path))
            };
            match picked {
                Some(path) => {
                    self.test(&path, self.options.timeout_secs)?;
                }
                None => break,
            }
        }
        Ok(())
    }

    /// Test `path` and keep strengthening it while it stays TRUE.
    fn climb(&self, mut path: Vec<Element>) -> Result<(), CampaignError> {
        loop {
            let verdict = self.test(&path, self.options.timeout_secs)?;
            if verdict != Verdict::True || self.aborted() {
                return Ok(());
            }
            let next = {
                let mut trie = relock(&self.trie);
                trie.mutate_up(&path).filter(|up| trie.reserve(up))
            };
            match next {
                Some(up) => path = up,
                None => return Ok(()),
            }
        }
    }
}
