//! The campaign command: wire the CLI options into a scheduler run.

use miette::IntoDiagnostic;
use tracing::info;

use proofsweep_engine::{
    render_json, render_report, CampaignOptions, ProcessOracle, ProcessOracleConfig,
    ResourceBudget, ResumeState, RunInfo, Scheduler,
};

use crate::commands::helpers::{git_revision, load_journal, parse_configuration, parse_output_format};
use crate::{Cli, OutputFormat};

pub(crate) fn run_campaign_command(cli: Cli) -> miette::Result<()> {
    let format = parse_output_format(&cli.format)?;
    let supremum = parse_configuration(&cli.config, "maximal")?;
    let seed = cli
        .seed
        .as_deref()
        .map(|raw| parse_configuration(raw, "seed"))
        .transpose()?;
    let resume = match &cli.start {
        Some(path) => {
            let state = load_journal(path)?;
            info!(
                journal = %path.display(),
                open = state.open.len(),
                failing = state.failing.len(),
                maximal = state.maximal.len(),
                "resuming from journal"
            );
            state
        }
        None => ResumeState::default(),
    };

    let budget = ResourceBudget::plan(cli.processes, cli.timeout).into_diagnostic()?;
    if let Some(requested) = cli.processes {
        if requested > budget.workers {
            info!(requested, workers = budget.workers, "worker count capped by the timeout");
        }
    }
    if budget.is_parallel() {
        info!(
            workers = budget.workers,
            memory_limit_gib = budget.memory_limit_gib,
            "parallel campaign"
        );
    } else {
        info!(timeout_secs = budget.timeout_secs, "sequential campaign");
    }

    let mut oracle_config = ProcessOracleConfig::new(cli.query.clone());
    oracle_config.program = cli.oracle;
    oracle_config.args = cli.oracle_args;
    oracle_config.output_dir = cli.log_dir;
    oracle_config.full_logs = cli.logs;
    oracle_config.memory_limit_gib = budget.memory_limit_gib;
    let oracle = ProcessOracle::new(oracle_config).into_diagnostic()?;

    let run_info = RunInfo {
        query: cli.query,
        revision: if cli.git { git_revision() } else { None },
    };
    let options = CampaignOptions {
        timeout_secs: budget.timeout_secs,
        workers: budget.workers,
        skip_known: cli.skip,
        seed,
    };

    let report = Scheduler::new(supremum, &oracle, options)
        .with_resume(resume)
        .run()
        .into_diagnostic()?;

    match format {
        OutputFormat::Text => print!("{}", render_report(&report, &run_info)),
        OutputFormat::Json => println!("{}", render_json(&report, &run_info).into_diagnostic()?),
    }
    Ok(())
}
