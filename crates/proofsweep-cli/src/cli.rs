//! CLI argument definitions.

use clap::Parser;
use std::path::PathBuf;

use proofsweep_engine::budget::DEFAULT_TIMEOUT_SECS;

pub(crate) const CLI_LONG_ABOUT: &str =
    "Explore the configuration lattice of a protocol model with an external checker.\n\n\
    Every configuration below --config is either tested or settled by a tested\n\
    neighbour: TRUE settles every weaker configuration, FALSE every stronger one.\n\
    The report lists the minimal failing and maximal TRUE configurations and can\n\
    be passed back with --start to resume.";

#[derive(Parser, Debug)]
#[command(name = "proofsweep")]
#[command(about = "Search a configuration lattice for the boundary of a security property")]
#[command(long_about = CLI_LONG_ABOUT)]
#[command(version)]
pub(crate) struct Cli {
    /// Maximal configuration, e.g. "RSA|ECC, None|Sign, no_reopen, SSec, anon|pwd, no_switch, no_leaks"
    #[arg(long)]
    pub(crate) config: String,

    /// Query handed to the checker
    #[arg(long)]
    pub(crate) query: String,

    /// Per-configuration timeout in seconds (0 = unbounded)
    #[arg(long, default_value_t = DEFAULT_TIMEOUT_SECS)]
    pub(crate) timeout: u64,

    /// Run workers in parallel (capped by the timeout); the count defaults to 5
    #[arg(long, num_args = 0..=1, default_missing_value = "5")]
    pub(crate) processes: Option<usize>,

    /// Report of a previous run to resume from
    #[arg(long)]
    pub(crate) start: Option<PathBuf>,

    /// Settle the entries of --start without rerunning them
    #[arg(long, default_value_t = false, requires = "start")]
    pub(crate) skip: bool,

    /// Configuration tested first, without timeout
    #[arg(long)]
    pub(crate) seed: Option<String>,

    /// Checker driver program
    #[arg(long, default_value = "python3")]
    pub(crate) oracle: String,

    /// Argument passed to the driver before the generated ones (repeatable)
    #[arg(long = "oracle-arg", default_value = "opcua.py", allow_hyphen_values = true)]
    pub(crate) oracle_args: Vec<String>,

    /// Directory for per-run logs
    #[arg(long, default_value = ".")]
    pub(crate) log_dir: PathBuf,

    /// Keep the full checker output in the logs
    #[arg(long, default_value_t = false)]
    pub(crate) logs: bool,

    /// Record the model's git revision in the report
    #[arg(long, default_value_t = false)]
    pub(crate) git: bool,

    /// Output format: text | json
    #[arg(long, default_value = "text")]
    pub(crate) format: String,
}
