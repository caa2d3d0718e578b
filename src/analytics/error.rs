// Error types for the Aggregation Engine
//
// All three kinds surface to the caller unmodified: the engine never
// substitutes defaults for a failed sub-query or returns a partial
// aggregate.

use chrono::NaiveDate;
use thiserror::Error;

use crate::analytics::store::StoreError;

/// Which record set a failed or timed-out sub-query targeted
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchTarget {
    Users,
    Transactions,
    Rewards,
}

impl FetchTarget {
    /// Convert target to string representation
    pub fn as_str(&self) -> &'static str {
        match self {
            FetchTarget::Users => "users",
            FetchTarget::Transactions => "transactions",
            FetchTarget::Rewards => "rewards",
        }
    }
}

impl std::fmt::Display for FetchTarget {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Main error type for the Aggregation Engine
#[derive(Debug, Error)]
pub enum AnalyticsError {
    /// Custom window whose end precedes its start; rejected before
    /// any query is issued
    #[error("invalid custom range: start {start} is after end {end}")]
    InvalidRange { start: NaiveDate, end: NaiveDate },

    /// A required sub-query failed; carries the entity it targeted
    #[error("failed to fetch {target} records: {source}")]
    DataFetch {
        target: FetchTarget,
        #[source]
        source: StoreError,
    },

    /// A sub-query exceeded the caller-supplied time budget
    #[error("{target} query exceeded the {budget_ms}ms fetch budget")]
    Timeout { target: FetchTarget, budget_ms: u64 },
}

/// Result type alias for Aggregation Engine operations
pub type AnalyticsResult<T> = Result<T, AnalyticsError>;
