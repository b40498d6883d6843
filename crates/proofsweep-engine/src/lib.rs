#![doc = include_str!("../README.md")]

//! Campaign engine for `proofsweep`.
//!
//! This crate drives the concurrent search over the configuration lattice
//! and hosts the collaborators it talks to: the oracle boundary and its
//! subprocess implementation, the resource budget, deadline helpers, the
//! resume journal and the final report.

pub mod budget;
pub mod journal;
pub mod oracle;
pub mod process;
pub mod report;
pub mod scheduler;
pub mod timeout;

pub use budget::{BudgetError, ResourceBudget};
pub use journal::{parse_journal, JournalError, ResumeState};
pub use oracle::{Evaluation, Oracle};
pub use process::{OracleSetupError, ProcessOracle, ProcessOracleConfig};
pub use report::{render_json, render_report, CampaignReport, CampaignStats, RunInfo};
pub use scheduler::{CampaignError, CampaignOptions, Scheduler};
