// Record-store read contract
//
// The engine is backend-agnostic: it consumes three read queries with
// equality/inclusion/range filters and never owns a wire format. The
// PostgreSQL backend lives in `repository.rs`; `MemoryStore` below is
// a reference backend used by the engine tests.

use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::analytics::error::FetchTarget;
use crate::models::{Reward, Transaction, TransactionStatus, TransactionType, User, UserRole};

/// Errors produced by a record-store backend
#[derive(Debug, Error)]
pub enum StoreError {
    /// Database operation errors, converted from sqlx::Error
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Backend-specific failures outside the database driver
    #[error("{0}")]
    Backend(String),
}

/// Result type alias for record-store operations
pub type StoreResult<T> = Result<T, StoreError>;

/// Filter for user queries
#[derive(Debug, Clone, Default)]
pub struct UserFilter {
    /// Restrict to these user ids
    pub ids: Option<Vec<i32>>,
    /// Restrict to these roles
    pub roles: Option<Vec<UserRole>>,
    /// Restrict to users created by this parent dealer
    pub created_by: Option<i32>,
}

impl UserFilter {
    /// True when the user satisfies every present predicate
    pub fn matches(&self, user: &User) -> bool {
        if let Some(ids) = &self.ids {
            if !ids.contains(&user.id) {
                return false;
            }
        }
        if let Some(roles) = &self.roles {
            if !roles.contains(&user.role) {
                return false;
            }
        }
        if let Some(created_by) = self.created_by {
            if user.created_by != Some(created_by) {
                return false;
            }
        }
        true
    }
}

/// Filter for transaction queries
#[derive(Debug, Clone, Default)]
pub struct TransactionFilter {
    /// Restrict to transactions owned by these users
    pub user_ids: Option<Vec<i32>>,
    /// Restrict to one transaction type
    pub tx_type: Option<TransactionType>,
    /// Restrict to these statuses
    pub statuses: Option<Vec<TransactionStatus>>,
    /// Inclusive lower bound on `created_at`
    pub created_from: Option<DateTime<Utc>>,
    /// Inclusive upper bound on `created_at`
    pub created_to: Option<DateTime<Utc>>,
}

impl TransactionFilter {
    /// True when the transaction satisfies every present predicate
    pub fn matches(&self, tx: &Transaction) -> bool {
        if let Some(user_ids) = &self.user_ids {
            if !user_ids.contains(&tx.user_id) {
                return false;
            }
        }
        if let Some(tx_type) = self.tx_type {
            if tx.tx_type != tx_type {
                return false;
            }
        }
        if let Some(statuses) = &self.statuses {
            if !statuses.contains(&tx.status) {
                return false;
            }
        }
        if let Some(from) = self.created_from {
            if tx.created_at < from {
                return false;
            }
        }
        if let Some(to) = self.created_to {
            if tx.created_at > to {
                return false;
            }
        }
        true
    }
}

/// Filter for reward queries
#[derive(Debug, Clone, Default)]
pub struct RewardFilter {
    /// Restrict to these reward ids
    pub ids: Option<Vec<i32>>,
}

impl RewardFilter {
    /// True when the reward satisfies every present predicate
    pub fn matches(&self, reward: &Reward) -> bool {
        match &self.ids {
            Some(ids) => ids.contains(&reward.id),
            None => true,
        }
    }
}

/// Read contract consumed by the aggregation engine.
///
/// All queries are read-only and assumed point-in-time consistent
/// within one aggregation call. Implementations must be safe to query
/// concurrently; the engine fans sub-queries out and joins before
/// computing roll-ups.
pub trait RecordStore: Send + Sync {
    fn query_users(
        &self,
        filter: UserFilter,
    ) -> impl Future<Output = StoreResult<Vec<User>>> + Send;

    fn query_transactions(
        &self,
        filter: TransactionFilter,
    ) -> impl Future<Output = StoreResult<Vec<Transaction>>> + Send;

    fn query_rewards(
        &self,
        filter: RewardFilter,
    ) -> impl Future<Output = StoreResult<Vec<Reward>>> + Send;
}

/// In-memory record store.
///
/// Reference backend for engine tests and demos: supports injected
/// per-query latency, injected failure for a chosen target, and counts
/// issued queries so tests can assert that rejected calls never reach
/// the store.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    users: Vec<User>,
    transactions: Vec<Transaction>,
    rewards: Vec<Reward>,
    latency: Option<Duration>,
    fail_on: Option<FetchTarget>,
    queries_issued: Arc<AtomicU64>,
}

impl MemoryStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed the store with user records
    pub fn with_users(mut self, users: Vec<User>) -> Self {
        self.users = users;
        self
    }

    /// Seed the store with transaction records
    pub fn with_transactions(mut self, transactions: Vec<Transaction>) -> Self {
        self.transactions = transactions;
        self
    }

    /// Seed the store with reward records
    pub fn with_rewards(mut self, rewards: Vec<Reward>) -> Self {
        self.rewards = rewards;
        self
    }

    /// Delay every query by the given duration
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    /// Fail every query against the given target
    pub fn failing_on(mut self, target: FetchTarget) -> Self {
        self.fail_on = Some(target);
        self
    }

    /// Number of queries issued against this store so far
    pub fn queries_issued(&self) -> u64 {
        self.queries_issued.load(Ordering::Relaxed)
    }

    async fn before_query(&self, target: FetchTarget) -> StoreResult<()> {
        self.queries_issued.fetch_add(1, Ordering::Relaxed);
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }
        if self.fail_on == Some(target) {
            return Err(StoreError::Backend(format!("injected {} failure", target)));
        }
        Ok(())
    }
}

impl RecordStore for MemoryStore {
    async fn query_users(&self, filter: UserFilter) -> StoreResult<Vec<User>> {
        self.before_query(FetchTarget::Users).await?;
        Ok(self.users.iter().filter(|u| filter.matches(u)).cloned().collect())
    }

    async fn query_transactions(&self, filter: TransactionFilter) -> StoreResult<Vec<Transaction>> {
        self.before_query(FetchTarget::Transactions).await?;
        Ok(self
            .transactions
            .iter()
            .filter(|t| filter.matches(t))
            .cloned()
            .collect())
    }

    async fn query_rewards(&self, filter: RewardFilter) -> StoreResult<Vec<Reward>> {
        self.before_query(FetchTarget::Rewards).await?;
        Ok(self.rewards.iter().filter(|r| filter.matches(r)).cloned().collect())
    }
}
