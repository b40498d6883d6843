//! Oracle verdicts and the search-internal node states.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Outcome attached to a configuration node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Verdict {
    /// Still to be tested.
    Unknown,
    /// Reserved by a worker.
    Pending,
    /// Every checked query holds.
    True,
    /// At least one query is falsified.
    False,
    /// The checker could neither prove nor refute a query.
    Cannot,
    /// The checker ran out of memory.
    MemOut,
    /// The checker ran out of time.
    Timeout,
    /// The checker itself malfunctioned.
    Error,
}

impl Verdict {
    /// Verdicts that propagate upward to every stronger configuration.
    pub fn is_failure(self) -> bool {
        matches!(
            self,
            Verdict::False | Verdict::Cannot | Verdict::MemOut | Verdict::Timeout
        )
    }

    pub fn is_resource_exhaustion(self) -> bool {
        matches!(self, Verdict::MemOut | Verdict::Timeout)
    }

    /// Not yet decided.
    pub fn is_open(self) -> bool {
        matches!(self, Verdict::Unknown | Verdict::Pending)
    }

    pub fn name(self) -> &'static str {
        match self {
            Verdict::Unknown => "UNKNOWN",
            Verdict::Pending => "PENDING",
            Verdict::True => "TRUE",
            Verdict::False => "FALSE",
            Verdict::Cannot => "CANNOT",
            Verdict::MemOut => "MEM_OUT",
            Verdict::Timeout => "TIMEOUT",
            Verdict::Error => "ERROR",
        }
    }

    /// Whether two terminal verdicts on the same configuration are a logical
    /// contradiction rather than a noisy re-run.
    pub fn contradicts(self, other: Verdict) -> bool {
        matches!(
            (self, other),
            (Verdict::True, Verdict::False) | (Verdict::False, Verdict::True)
        )
    }
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown verdict '{0}'")]
pub struct UnknownVerdict(pub String);

impl FromStr for Verdict {
    type Err = UnknownVerdict;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        [
            Verdict::Unknown,
            Verdict::Pending,
            Verdict::True,
            Verdict::False,
            Verdict::Cannot,
            Verdict::MemOut,
            Verdict::Timeout,
            Verdict::Error,
        ]
        .into_iter()
        .find(|v| v.name() == s)
        .ok_or_else(|| UnknownVerdict(s.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classes_partition_terminal_verdicts() {
        assert!(Verdict::Timeout.is_failure());
        assert!(Verdict::Timeout.is_resource_exhaustion());
        assert!(Verdict::Cannot.is_failure());
        assert!(!Verdict::Cannot.is_resource_exhaustion());
        assert!(!Verdict::True.is_failure());
        assert!(!Verdict::Error.is_failure());
        assert!(!Verdict::Error.is_open());
        assert!(Verdict::Pending.is_open());
    }

    #[test]
    fn only_true_false_contradict() {
        assert!(Verdict::True.contradicts(Verdict::False));
        assert!(Verdict::False.contradicts(Verdict::True));
        assert!(!Verdict::True.contradicts(Verdict::Timeout));
        assert!(!Verdict::Cannot.contradicts(Verdict::True));
    }

    #[test]
    fn names_parse_back() {
        assert_eq!("MEM_OUT".parse::<Verdict>().unwrap(), Verdict::MemOut);
        assert_eq!("CANNOT".parse::<Verdict>().unwrap(), Verdict::Cannot);
        assert!("maybe".parse::<Verdict>().is_err());
        assert_eq!(serde_json::to_string(&Verdict::MemOut).unwrap(), "\"MEM_OUT\"");
    }
}
