//! Campaign runs against deterministic oracles.

mod common;

use std::time::Duration;

use common::*;
use proofsweep_engine::{
    parse_journal, render_report, CampaignError, CampaignOptions, Evaluation, ResumeState,
    RunInfo, Scheduler,
};
use proofsweep_lattice::{Configuration, TrieError, Verdict};

fn options(workers: usize) -> CampaignOptions {
    CampaignOptions {
        workers,
        ..CampaignOptions::default()
    }
}

fn info() -> RunInfo {
    RunInfo {
        query: "secrecy".into(),
        revision: None,
    }
}

#[test]
fn sequential_campaign_finds_exact_boundaries() {
    let sup = cfg(SUP);
    let oracle = MonotoneOracle::new(GENERATORS);
    let report = Scheduler::new(sup, &oracle, options(1)).run().unwrap();

    assert_eq!(maximal_of(&report), expected_maximal(&oracle, &sup));
    assert_eq!(failing_of(&report), expected_minimal_failing(&oracle, &sup));
    assert!(report.boundaries.exhausted.is_empty());
    assert_eq!(report.open_remaining, 0);
    // Propagation settles most of the 147 configurations without a call.
    assert!(oracle.calls() < 147, "{} oracle calls", oracle.calls());
}

#[test]
fn parallel_campaign_finds_the_same_boundaries() {
    let sup = cfg(SUP);
    let oracle = MonotoneOracle::new(GENERATORS);
    let report = Scheduler::new(sup, &oracle, options(4)).run().unwrap();

    assert_eq!(report.workers, 4);
    assert_eq!(maximal_of(&report), expected_maximal(&oracle, &sup));
    assert_eq!(failing_of(&report), expected_minimal_failing(&oracle, &sup));
    assert_eq!(report.open_remaining, 0);
}

#[test]
fn statistics_count_every_call() {
    let oracle = MonotoneOracle::new(GENERATORS);
    let report = Scheduler::new(cfg(SUP), &oracle, options(1)).run().unwrap();
    let stats = &report.stats;
    assert_eq!(stats.oracle_calls, oracle.calls());
    assert_eq!(
        stats.count(Verdict::True) + stats.count(Verdict::False),
        stats.oracle_calls
    );
    assert!(stats.count(Verdict::True) >= GENERATORS.len() as u64);
    assert_eq!(stats.settled_from_journal, 0);
}

#[test]
fn property_false_everywhere_leaves_only_singletons() {
    let sup = cfg(SUP);
    let oracle = MonotoneOracle::new(&[]);
    let report = Scheduler::new(sup, &oracle, options(1)).run().unwrap();
    assert!(report.boundaries.maximal.is_empty());
    // 2 crypto, 3 channel and 3 token singletons.
    assert_eq!(report.boundaries.failing.len(), 18);
    assert!(oracle.calls() >= 18);
}

#[test]
fn error_verdict_aborts_the_campaign() {
    let oracle = |c: &Configuration, _timeout: u64| {
        if c.to_string().contains("Encrypt") {
            Evaluation::error("proverif: syntax error", Duration::ZERO)
        } else {
            Evaluation::new(Verdict::True, Duration::ZERO)
        }
    };
    let sup = cfg("RSA, None|Encrypt, no_reopen, SSec, anon, no_switch, no_leaks");
    let err = Scheduler::new(sup, &oracle, options(1)).run().unwrap_err();
    match err {
        CampaignError::OracleFailure {
            configuration,
            diagnostic,
        } => {
            assert!(configuration.contains("Encrypt"));
            assert_eq!(diagnostic, "proverif: syntax error");
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn error_verdict_aborts_parallel_workers() {
    let oracle = |_: &Configuration, _timeout: u64| Evaluation::error("boom", Duration::ZERO);
    let err = Scheduler::new(cfg(SUP), &oracle, options(4))
        .run()
        .unwrap_err();
    assert!(matches!(err, CampaignError::OracleFailure { .. }));
}

#[test]
fn open_verdict_from_the_oracle_is_rejected() {
    let oracle = |_: &Configuration, _timeout: u64| Evaluation::new(Verdict::Pending, Duration::ZERO);
    let err = Scheduler::new(cfg(SUP), &oracle, options(1))
        .run()
        .unwrap_err();
    assert!(matches!(
        err,
        CampaignError::OpenVerdict {
            verdict: Verdict::Pending,
            ..
        }
    ));
}

#[test]
fn seed_outside_the_lattice_is_rejected() {
    let oracle = MonotoneOracle::new(GENERATORS);
    let seed = cfg("RSA, None, reopen, SSec, anon, no_switch, no_leaks");
    let opts = CampaignOptions {
        seed: Some(seed),
        ..options(1)
    };
    let err = Scheduler::new(cfg(SUP), &oracle, opts).run().unwrap_err();
    assert!(matches!(err, CampaignError::SeedOutsideLattice(c) if c == seed));
    assert_eq!(oracle.calls(), 0);
}

#[test]
fn seed_is_tested_first_without_timeout() {
    let sup = cfg(SUP);
    let seed = cfg(GENERATORS[0]);
    let oracle = MonotoneOracle::new(GENERATORS);
    let opts = CampaignOptions {
        seed: Some(seed),
        ..options(1)
    };
    let report = Scheduler::new(sup, &oracle, opts).run().unwrap();
    assert_eq!(oracle.log()[0], (seed, 0));
    assert_eq!(maximal_of(&report), expected_maximal(&oracle, &sup));
}

#[test]
fn recorded_boundaries_are_retested_with_extended_timeout() {
    let sup = cfg(SUP);
    // The journal claims a point that does not hold anymore is maximal.
    let stale = cfg("ECC, Sign, no_reopen, SSec, pwd, no_switch, no_leaks");
    let resume = ResumeState {
        maximal: vec![(stale, Duration::from_secs(400))],
        ..ResumeState::default()
    };
    let oracle = MonotoneOracle::new(GENERATORS);
    let report = Scheduler::new(sup, &oracle, options(1))
        .with_resume(resume)
        .run()
        .unwrap();

    assert_eq!(oracle.log()[0], (stale, 800));
    // One configuration per facet, so it is minimal among the failing ones.
    assert!(failing_of(&report).contains(&stale.to_string()));
    assert_eq!(maximal_of(&report), expected_maximal(&oracle, &sup));
}

#[test]
fn recorded_open_configurations_are_climbed_first() {
    let sup = cfg(SUP);
    let start = cfg("RSA, None, no_reopen, SSec, anon, no_switch, no_leaks");
    let resume = ResumeState {
        open: vec![start],
        ..ResumeState::default()
    };
    let oracle = MonotoneOracle::new(GENERATORS);
    let report = Scheduler::new(sup, &oracle, options(1))
        .with_resume(resume)
        .run()
        .unwrap();

    let log = oracle.log();
    assert_eq!(log[0], (start, 300));
    // The climb strengthens the channel mode first.
    assert_eq!(
        log[1].0,
        cfg("RSA, None|Encrypt, no_reopen, SSec, anon, no_switch, no_leaks")
    );
    assert_eq!(maximal_of(&report), expected_maximal(&oracle, &sup));
}

#[test]
fn skip_mode_settles_a_previous_report_without_calls() {
    let sup = cfg(SUP);
    let first = MonotoneOracle::new(GENERATORS);
    let report = Scheduler::new(sup, &first, options(1)).run().unwrap();
    let journal = parse_journal(&render_report(&report, &info())).unwrap();

    let second = MonotoneOracle::new(GENERATORS);
    let opts = CampaignOptions {
        skip_known: true,
        ..options(1)
    };
    let resumed = Scheduler::new(sup, &second, opts)
        .with_resume(journal)
        .run()
        .unwrap();

    assert_eq!(second.calls(), 0);
    assert_eq!(maximal_of(&resumed), maximal_of(&report));
    assert_eq!(failing_of(&resumed), failing_of(&report));
    assert_eq!(
        resumed.stats.settled_from_journal,
        (report.boundaries.maximal.len() + report.boundaries.failing.len()) as u64
    );
}

#[test]
fn resuming_without_skip_retests_the_boundaries() {
    let sup = cfg(SUP);
    let first = MonotoneOracle::new(GENERATORS);
    let report = Scheduler::new(sup, &first, options(1)).run().unwrap();
    let journal = parse_journal(&render_report(&report, &info())).unwrap();
    let boundary_count = (journal.failing.len() + journal.maximal.len()) as u64;

    let second = MonotoneOracle::new(GENERATORS);
    let resumed = Scheduler::new(sup, &second, options(2))
        .with_resume(journal)
        .run()
        .unwrap();
    assert!(second.calls() >= boundary_count);
    assert_eq!(maximal_of(&resumed), maximal_of(&report));
    assert_eq!(failing_of(&resumed), failing_of(&report));
}

#[test]
fn settled_open_entry_is_replaced_by_a_weaker_open_one() {
    let sup = cfg(SUP);
    let failing = cfg("ECC, Sign, no_reopen, SSec, pwd, no_switch, no_leaks");
    let open = cfg("RSA|ECC, Sign|Encrypt, no_reopen, SSec, pwd, no_switch, no_leaks");
    assert!(failing.leq(&open));
    let resume = ResumeState {
        open: vec![open],
        failing: vec![(failing, Verdict::False, Duration::from_secs(10))],
        ..ResumeState::default()
    };
    let oracle = MonotoneOracle::new(GENERATORS);
    let report = Scheduler::new(sup, &oracle, options(1))
        .with_resume(resume)
        .run()
        .unwrap();

    let log = oracle.log();
    assert_eq!(log[0], (failing, 300));
    // The retest settled the open entry, so exploration starts one step
    // below it, with ECC dropped.
    assert_eq!(
        log[1],
        (cfg("RSA, Sign|Encrypt, no_reopen, SSec, pwd, no_switch, no_leaks"), 300)
    );
    assert!(log.iter().all(|(c, _)| *c != open));
    assert_eq!(maximal_of(&report), expected_maximal(&oracle, &sup));
    assert_eq!(failing_of(&report), expected_minimal_failing(&oracle, &sup));
}

#[test]
fn skip_mode_keeps_memory_exhausted_entries_out_of_the_retry_list() {
    let sup = cfg(SUP);
    let exhausted = cfg(GENERATORS[0]);
    let resume = ResumeState {
        open: vec![exhausted],
        exhausted: vec![(exhausted, Duration::from_secs(90))],
        ..ResumeState::default()
    };
    let oracle = MonotoneOracle::new(GENERATORS);
    let opts = CampaignOptions {
        skip_known: true,
        ..options(1)
    };
    let report = Scheduler::new(sup, &oracle, opts)
        .with_resume(resume)
        .run()
        .unwrap();

    assert!(oracle.calls() > 0);
    assert!(oracle.log().iter().all(|(c, _)| !exhausted.leq(c)));
    assert_eq!(report.stats.settled_from_journal, 1);
    assert_eq!(report.boundaries.exhausted.len(), 1);
    let entry = &report.boundaries.exhausted[0];
    assert_eq!(entry.configuration, exhausted);
    assert_eq!(entry.verdict, Verdict::MemOut);
    assert_eq!(entry.duration, Duration::from_secs(90));
    assert_eq!(report.open_remaining, 0);
}

#[test]
fn contradicting_verdicts_abort_the_campaign() {
    let sup = cfg("RSA, None|Sign|Encrypt, no_reopen, SSec, anon, no_switch, no_leaks");
    let strong = cfg("RSA, Sign|Encrypt, no_reopen, SSec, anon, no_switch, no_leaks");
    let weak = cfg("RSA, Sign, no_reopen, SSec, anon, no_switch, no_leaks");
    // The weak point fails while the strong one, already claimed by the
    // other worker, is still running; its late TRUE contradicts the
    // propagated FALSE.
    let oracle = move |c: &Configuration, _timeout: u64| {
        if *c == strong {
            std::thread::sleep(Duration::from_millis(400));
            Evaluation::new(Verdict::True, Duration::ZERO)
        } else if *c == weak {
            std::thread::sleep(Duration::from_millis(20));
            Evaluation::new(Verdict::False, Duration::ZERO)
        } else {
            Evaluation::new(Verdict::True, Duration::ZERO)
        }
    };
    let resume = ResumeState {
        open: vec![strong, weak],
        ..ResumeState::default()
    };
    let err = Scheduler::new(sup, &oracle, options(2))
        .with_resume(resume)
        .run()
        .unwrap_err();
    match err {
        CampaignError::Inconsistent(TrieError::Contradiction {
            configuration,
            recorded,
            incoming,
        }) => {
            assert_eq!(configuration, strong.to_string());
            assert_eq!(recorded, Verdict::False);
            assert_eq!(incoming, Verdict::True);
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn zero_workers_is_a_budget_error() {
    let oracle = MonotoneOracle::new(GENERATORS);
    let err = Scheduler::new(cfg(SUP), &oracle, options(0)).run().unwrap_err();
    assert!(matches!(err, CampaignError::Budget(_)));
}
