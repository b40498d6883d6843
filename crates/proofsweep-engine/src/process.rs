//! Subprocess oracle.
//!
//! Each evaluation spawns the checker driver as
//! `program args... -l <GiB> -q <query> -c <configuration> -r <run id> [-t <secs>]`,
//! waits for it with a kill deadline, and classifies its output.

use std::fs::{self, File};
use std::io::{Read, Write};
use std::path::PathBuf;
use std::process::{Child, Command, ExitStatus, Stdio};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::mpsc::{self, Receiver};
use std::thread;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use proofsweep_lattice::{Configuration, Verdict};
use sha2::{Digest, Sha256};
use thiserror::Error;
use tracing::{debug, warn};

use crate::oracle::{Evaluation, Oracle};
use crate::timeout::{deadline_exceeded, kill_deadline};

/// Marker printed by the driver when the checker hit its own time limit.
pub const OUT_OF_TIME: &str = "Out of time!";
pub const SUMMARY_START: &str = "Verification summary:";
pub const SUMMARY_END: &str = "\n\n--------------------------------------------------------------";
pub const PARSE_FAILURE: &str = "Error while parsing the verifier output";

const POLL_INTERVAL: Duration = Duration::from_millis(50);
/// How long output is collected once the driver has exited or been killed.
const DRAIN_WAIT: Duration = Duration::from_secs(2);

#[derive(Debug, Error)]
pub enum OracleSetupError {
    #[error("oracle query must not be empty")]
    EmptyQuery,
    #[error("cannot prepare log directory {path}: {source}")]
    LogDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessOracleConfig {
    pub program: String,
    pub args: Vec<String>,
    pub query: String,
    /// Where per-run logs are written.
    pub output_dir: PathBuf,
    /// Keep the whole driver output instead of the summary only.
    pub full_logs: bool,
    pub memory_limit_gib: u64,
    /// Files the driver leaves behind; `{run}` is replaced by the run id.
    pub scratch_files: Vec<String>,
    /// Extra time granted past the timeout before the driver is killed.
    pub grace: Duration,
}

impl ProcessOracleConfig {
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            program: "python3".into(),
            args: vec!["opcua.py".into()],
            query: query.into(),
            output_dir: PathBuf::from("."),
            full_logs: false,
            memory_limit_gib: crate::budget::MEMORY_POOL_GIB,
            scratch_files: vec!["tmp_conf{run}.pvl".into(), "tmp_opcua{run}.pv".into()],
            grace: Duration::from_secs(30),
        }
    }
}

#[derive(Debug)]
pub struct ProcessOracle {
    config: ProcessOracleConfig,
    runs: AtomicU64,
}

struct RunOutput {
    status: Option<ExitStatus>,
    killed: bool,
    /// Until the driver exited or was killed; output draining is not counted.
    elapsed: Duration,
    output: String,
}

impl ProcessOracle {
    pub fn new(config: ProcessOracleConfig) -> Result<Self, OracleSetupError> {
        if config.query.trim().is_empty() {
            return Err(OracleSetupError::EmptyQuery);
        }
        fs::create_dir_all(&config.output_dir).map_err(|source| OracleSetupError::LogDir {
            path: config.output_dir.clone(),
            source,
        })?;
        Ok(Self {
            config,
            runs: AtomicU64::new(0),
        })
    }

    /// `_<query>_<sha256 hex>`, unique per call.
    fn run_id(&self, configuration: &str) -> String {
        let mut hasher = Sha256::new();
        hasher.update(std::process::id().to_le_bytes());
        hasher.update(self.runs.fetch_add(1, Ordering::Relaxed).to_le_bytes());
        let nanos = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_nanos())
            .unwrap_or_default();
        hasher.update(nanos.to_le_bytes());
        hasher.update(configuration.as_bytes());
        let digest = hasher.finalize();
        let hex: String = digest.iter().map(|b| format!("{b:02x}")).collect();
        format!("_{}_{hex}", self.config.query)
    }

    fn command(&self, configuration: &str, run_id: &str, timeout_secs: u64) -> Command {
        let mut cmd = Command::new(&self.config.program);
        cmd.args(&self.config.args)
            .arg("-l")
            .arg(self.config.memory_limit_gib.to_string())
            .arg("-q")
            .arg(&self.config.query)
            .arg("-c")
            .arg(configuration)
            .arg("-r")
            .arg(run_id);
        if timeout_secs != 0 {
            cmd.arg("-t").arg(timeout_secs.to_string());
        }
        cmd.stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        // The driver starts the checker itself; a group lets both be killed.
        #[cfg(unix)]
        {
            use std::os::unix::process::CommandExt;
            cmd.process_group(0);
        }
        cmd
    }

    fn run(&self, configuration: &str, run_id: &str, timeout_secs: u64) -> std::io::Result<RunOutput> {
        let started = Instant::now();
        let mut child = self.command(configuration, run_id, timeout_secs).spawn()?;
        let stdout = child.stdout.take().map(drain);
        let stderr = child.stderr.take().map(drain);

        let deadline = kill_deadline(started, timeout_secs, self.config.grace);
        let mut killed = false;
        let status = loop {
            if let Some(status) = child.try_wait()? {
                break Some(status);
            }
            if deadline_exceeded(deadline) {
                warn!(configuration, "oracle exceeded its deadline, killing it");
                kill_group(&mut child);
                killed = true;
                break child.wait().ok();
            }
            thread::sleep(POLL_INTERVAL);
        };
        let elapsed = started.elapsed();

        let mut output = collect(stdout, configuration);
        output.push_str(&collect(stderr, configuration));
        Ok(RunOutput {
            status,
            killed,
            elapsed,
            output,
        })
    }

    fn write_log(&self, run_id: &str, configuration: &str, result: &str, output: &str) {
        let path = self.config.output_dir.join(format!("log{run_id}.txt"));
        let kept = if self.config.full_logs {
            output
        } else {
            output.find(SUMMARY_START).map_or("", |n| &output[n..])
        };
        let written = File::create(&path).and_then(|mut f| {
            write!(
                f,
                "TEST CASE:\nQuery: {}\nConfiguration: {configuration}\n{result}\n{kept}",
                self.config.query
            )
        });
        if let Err(e) = written {
            warn!(path = %path.display(), error = %e, "cannot write oracle log");
        }
    }

    fn remove_scratch_files(&self, run_id: &str) {
        for pattern in &self.config.scratch_files {
            let path = PathBuf::from(pattern.replace("{run}", run_id));
            if path.exists() {
                if let Err(e) = fs::remove_file(&path) {
                    debug!(path = %path.display(), error = %e, "cannot remove scratch file");
                }
            }
        }
    }
}

fn drain<R: Read + Send + 'static>(mut reader: R) -> Receiver<String> {
    let (tx, rx) = mpsc::channel();
    thread::spawn(move || {
        let mut buf = Vec::new();
        let _ = reader.read_to_end(&mut buf);
        let _ = tx.send(String::from_utf8_lossy(&buf).into_owned());
    });
    rx
}

/// Output of a drain thread, given up on after [`DRAIN_WAIT`]: a surviving
/// grandchild may hold the pipe open indefinitely.
fn collect(rx: Option<Receiver<String>>, configuration: &str) -> String {
    let Some(rx) = rx else {
        return String::new();
    };
    match rx.recv_timeout(DRAIN_WAIT) {
        Ok(text) => text,
        Err(_) => {
            warn!(configuration, "oracle output still open after exit, dropping it");
            String::new()
        }
    }
}

/// Kill the driver and everything it started.
fn kill_group(child: &mut Child) {
    #[cfg(unix)]
    {
        let group = format!("-{}", child.id());
        if let Err(e) = Command::new("kill").args(["-KILL", "--", &group]).status() {
            debug!(error = %e, "cannot signal the oracle process group");
        }
    }
    let _ = child.kill();
}

impl Oracle for ProcessOracle {
    fn evaluate(&self, configuration: &Configuration, timeout_secs: u64) -> Evaluation {
        let text = configuration.to_string();
        let run_id = self.run_id(&text);
        let started = Instant::now();
        let run = self.run(&text, &run_id, timeout_secs);
        let duration = match &run {
            Ok(run) => run.elapsed,
            Err(_) => started.elapsed(),
        };

        let (evaluation, output) = match run {
            Err(e) => (
                Evaluation::error(format!("cannot run {}: {e}", self.config.program), duration),
                String::new(),
            ),
            Ok(run) if run.killed => (Evaluation::new(Verdict::Timeout, duration), run.output),
            Ok(run) => {
                let evaluation = match run.status {
                    Some(status) if status.success() => {
                        let (verdict, diagnostic) = classify_output(&run.output);
                        Evaluation {
                            verdict,
                            duration,
                            diagnostic,
                        }
                    }
                    Some(status) => Evaluation::error(
                        format!("{} exited with {status}: {}", self.config.program, last_line(&run.output)),
                        duration,
                    ),
                    None => Evaluation::error(
                        format!("{} vanished without exit status", self.config.program),
                        duration,
                    ),
                };
                (evaluation, run.output)
            }
        };

        let result = match &evaluation.diagnostic {
            Some(diagnostic) => format!("{} {diagnostic}", evaluation.verdict),
            None => evaluation.verdict.to_string(),
        };
        self.write_log(&run_id, &text, &result, &output);
        self.remove_scratch_files(&run_id);
        evaluation
    }
}

fn last_line(output: &str) -> &str {
    output
        .lines()
        .rev()
        .find(|l| !l.trim().is_empty())
        .unwrap_or("")
        .trim()
}

/// Map driver output to a verdict.
///
/// The summary block lists one ` - Query ...` line per sub-property: any
/// false query makes the configuration FALSE, otherwise any unproved query
/// makes it CANNOT, otherwise all queries hold. No query result at all means
/// the checker died early: an `Error:` line is an oracle error, silence is
/// taken as memory exhaustion.
pub fn classify_output(output: &str) -> (Verdict, Option<String>) {
    if output.contains(OUT_OF_TIME) {
        return (Verdict::Timeout, None);
    }
    let summary = output
        .find(SUMMARY_START)
        .map(|n| {
            let body = &output[n + SUMMARY_START.len()..];
            body.find(SUMMARY_END).map_or(body, |m| &body[..m])
        })
        .unwrap_or("");

    let mut verdict = None;
    for query in summary.split(" - Query").skip(1) {
        let outcome = ["is true.", "is false.", "cannot be proved."]
            .into_iter()
            .filter_map(|needle| query.find(needle).map(|at| (at, needle)))
            .min_by_key(|(at, _)| *at);
        verdict = match (outcome.map(|(_, needle)| needle), verdict) {
            (None, _) => return (Verdict::Error, Some(PARSE_FAILURE.to_string())),
            (Some("is false."), _) | (_, Some(Verdict::False)) => Some(Verdict::False),
            (Some("cannot be proved."), _) | (_, Some(Verdict::Cannot)) => Some(Verdict::Cannot),
            _ => Some(Verdict::True),
        };
    }

    match verdict {
        Some(verdict) => (verdict, None),
        None => match output.lines().find_map(|l| l.find("Error:").map(|at| &l[at..])) {
            Some(error) => (Verdict::Error, Some(error.trim().to_string())),
            None => (Verdict::MemOut, None),
        },
    }
}
