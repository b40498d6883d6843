//! Resource budget for a campaign.
//!
//! The machine is shared by every concurrent oracle run: long timeouts get
//! fewer workers, and the memory pool is split evenly between workers. The
//! plan is fixed once per campaign by [`ResourceBudget::plan`].

/// Memory shared by all concurrent oracle runs (GiB).
pub const MEMORY_POOL_GIB: u64 = 400;
/// Worker ceiling for short timeouts.
pub const MAX_WORKERS: u64 = 20;
/// Worker floor for long timeouts.
pub const MIN_WORKERS: u64 = 4;
/// Per-oracle timeout when none is given (seconds).
pub const DEFAULT_TIMEOUT_SECS: u64 = 300;
/// Worker request when parallelism is asked for without a count.
pub const DEFAULT_WORKERS: usize = 5;
/// Largest resume journal accepted (bytes).
pub const MAX_JOURNAL_BYTES: u64 = 16 * 1024 * 1024;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum BudgetError {
    #[error("at least one worker is required")]
    NoWorkers,
    #[error("journal too large: {size} bytes exceeds limit of {limit} bytes")]
    JournalTooLarge { size: u64, limit: u64 },
}

/// Worker count and per-run limits derived from the campaign timeout.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResourceBudget {
    /// Concurrent oracle runs.
    pub workers: usize,
    /// Memory limit handed to each oracle run (GiB).
    pub memory_limit_gib: u64,
    pub timeout_secs: u64,
}

impl ResourceBudget {
    /// Plan a campaign. `requested_workers` is `None` for a sequential run.
    ///
    /// Parallel runs get `min(requested, max(20 - 8 * timeout / 3600, 4))`
    /// workers: 20 for timeouts of a few minutes, 4 from two hours on.
    pub fn plan(requested_workers: Option<usize>, timeout_secs: u64) -> Result<Self, BudgetError> {
        let workers = match requested_workers {
            None => 1,
            Some(0) => return Err(BudgetError::NoWorkers),
            Some(requested) => {
                let ceiling = MAX_WORKERS
                    .saturating_sub(8u64.saturating_mul(timeout_secs) / 3600)
                    .max(MIN_WORKERS);
                requested.min(usize::try_from(ceiling).unwrap_or(usize::MAX))
            }
        };
        Ok(Self {
            workers,
            memory_limit_gib: MEMORY_POOL_GIB / workers as u64,
            timeout_secs,
        })
    }

    pub fn is_parallel(&self) -> bool {
        self.workers > 1
    }
}

impl Default for ResourceBudget {
    fn default() -> Self {
        Self {
            workers: 1,
            memory_limit_gib: MEMORY_POOL_GIB,
            timeout_secs: DEFAULT_TIMEOUT_SECS,
        }
    }
}

/// Reject a resume journal larger than [`MAX_JOURNAL_BYTES`].
pub fn check_journal_size(size: u64) -> Result<(), BudgetError> {
    if size > MAX_JOURNAL_BYTES {
        return Err(BudgetError::JournalTooLarge {
            size,
            limit: MAX_JOURNAL_BYTES,
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sequential_without_request() {
        let b = ResourceBudget::plan(None, 300).unwrap();
        assert_eq!(b.workers, 1);
        assert_eq!(b.memory_limit_gib, 400);
        assert!(!b.is_parallel());
    }

    #[test]
    fn test_short_timeouts_allow_many_workers() {
        let b = ResourceBudget::plan(Some(32), 300).unwrap();
        assert_eq!(b.workers, 20);
        assert_eq!(b.memory_limit_gib, 20);
        let b = ResourceBudget::plan(Some(5), 300).unwrap();
        assert_eq!(b.workers, 5);
        assert_eq!(b.memory_limit_gib, 80);
    }

    #[test]
    fn test_long_timeouts_reduce_workers() {
        // 8 * 3600 / 3600 = 8
        assert_eq!(ResourceBudget::plan(Some(32), 3600).unwrap().workers, 12);
        assert_eq!(ResourceBudget::plan(Some(32), 7200).unwrap().workers, 4);
        assert_eq!(ResourceBudget::plan(Some(32), 86_400).unwrap().workers, 4);
        assert_eq!(ResourceBudget::plan(Some(32), 86_400).unwrap().memory_limit_gib, 100);
    }

    #[test]
    fn test_single_requested_worker_is_sequential() {
        let b = ResourceBudget::plan(Some(1), 300).unwrap();
        assert_eq!(b.workers, 1);
        assert!(!b.is_parallel());
        assert!(ResourceBudget::plan(Some(2), 300).unwrap().is_parallel());
    }

    #[test]
    fn test_zero_workers_rejected() {
        assert_eq!(ResourceBudget::plan(Some(0), 300), Err(BudgetError::NoWorkers));
    }

    #[test]
    fn test_journal_size_limit() {
        assert!(check_journal_size(1024).is_ok());
        assert!(matches!(
            check_journal_size(MAX_JOURNAL_BYTES + 1),
            Err(BudgetError::JournalTooLarge { .. })
        ));
    }
}
