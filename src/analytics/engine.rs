// Aggregation Engine
//
// Produces reconciled bag/point roll-ups and cross-sectional
// analytics over a transaction set, scoped by actor role and time
// window. The engine holds no mutable state: every call is
// referentially transparent given (scope, window, now), and dropping
// the returned future abandons any outstanding sub-fetches.

use std::collections::{HashMap, HashSet};
use std::future::Future;
use std::time::Duration;

use chrono::{DateTime, Utc};

use crate::analytics::error::{AnalyticsError, AnalyticsResult, FetchTarget};
use crate::analytics::models::{AnalyticsSnapshot, RollupTotals, TopDealer, TopReward};
use crate::analytics::scope::{ResolvedScope, ScopeSpec};
use crate::analytics::store::{
    RecordStore, RewardFilter, StoreResult, TransactionFilter,
};
use crate::analytics::window::{ReportingWindow, ResolvedWindow};
use crate::conversion::bags_from_transaction;
use crate::models::{Reward, Transaction, TransactionStatus, TransactionType, User};

/// Default per-fetch time budget
const DEFAULT_FETCH_TIMEOUT: Duration = Duration::from_secs(10);

/// Number of entries in the top-dealer and top-reward rankings
const TOP_N: usize = 5;

/// Statuses that count toward settled totals
const SETTLED: [TransactionStatus; 2] =
    [TransactionStatus::Approved, TransactionStatus::Completed];

/// Aggregation engine over a generic record store.
///
/// Independent sub-fetches fan out concurrently and join before any
/// roll-up math runs. Every fetch is bounded by the configured
/// timeout; on expiry the whole call fails with a timeout error
/// rather than returning a partial or stale aggregate.
#[derive(Debug, Clone)]
pub struct AnalyticsEngine<S> {
    store: S,
    fetch_timeout: Duration,
}

impl<S: RecordStore> AnalyticsEngine<S> {
    /// Create an engine with the default fetch budget
    pub fn new(store: S) -> Self {
        Self { store, fetch_timeout: DEFAULT_FETCH_TIMEOUT }
    }

    /// Override the per-fetch time budget
    pub fn with_fetch_timeout(mut self, fetch_timeout: Duration) -> Self {
        self.fetch_timeout = fetch_timeout;
        self
    }

    /// Bound a sub-fetch by the engine's budget and tag failures with
    /// the target they hit
    async fn fetch<T>(
        &self,
        target: FetchTarget,
        query: impl Future<Output = StoreResult<T>>,
    ) -> AnalyticsResult<T> {
        match tokio::time::timeout(self.fetch_timeout, query).await {
            Ok(Ok(records)) => Ok(records),
            Ok(Err(source)) => Err(AnalyticsError::DataFetch { target, source }),
            Err(_) => Err(AnalyticsError::Timeout {
                target,
                budget_ms: self.fetch_timeout.as_millis() as u64,
            }),
        }
    }

    /// Resolve a scope into its contributing users and disjoint
    /// dealer/sub-dealer id partitions
    pub async fn resolve_scope(&self, scope: ScopeSpec) -> AnalyticsResult<ResolvedScope> {
        let users = self
            .fetch(FetchTarget::Users, self.store.query_users(scope.user_filter()))
            .await?;
        Ok(ResolvedScope::from_users(users))
    }

    /// Settled bag/point roll-up for an arbitrary id set and window.
    ///
    /// Window resolution happens before the query, so an invalid
    /// custom range never reaches the store.
    pub async fn compute_rollup(
        &self,
        user_ids: &[i32],
        window: ReportingWindow,
        now: DateTime<Utc>,
    ) -> AnalyticsResult<RollupTotals> {
        let resolved = window.resolve(now)?;

        let transactions = self
            .fetch(
                FetchTarget::Transactions,
                self.store.query_transactions(TransactionFilter {
                    user_ids: Some(user_ids.to_vec()),
                    tx_type: Some(TransactionType::Earned),
                    statuses: Some(SETTLED.to_vec()),
                    created_from: resolved.start,
                    created_to: Some(resolved.end),
                }),
            )
            .await?;

        Ok(sum_rollup(transactions.iter()))
    }

    /// Cross-sectional analytics snapshot for a scope and window.
    ///
    /// The dealer ∪ sub-dealer transaction set is fetched once and
    /// partitioned post-fetch by id-set membership, so the
    /// dealer + sub-dealer = total reconciliation holds by
    /// construction for every window. If any required sub-query fails
    /// the whole call fails; partial results are never returned.
    pub async fn compute_analytics(
        &self,
        scope: ScopeSpec,
        window: ReportingWindow,
        now: DateTime<Utc>,
    ) -> AnalyticsResult<AnalyticsSnapshot> {
        let resolved_window = window.resolve(now)?;
        let resolved_scope = self.resolve_scope(scope).await?;
        let all_ids = resolved_scope.all_ids();

        tracing::debug!(
            "Computing {} snapshot over {} dealers and {} sub-dealers",
            window.label(),
            resolved_scope.dealer_ids.len(),
            resolved_scope.sub_dealer_ids.len()
        );

        // Independent reads, fanned out and joined before any math
        let (transactions, rewards) = tokio::try_join!(
            self.fetch(
                FetchTarget::Transactions,
                self.store.query_transactions(TransactionFilter {
                    user_ids: Some(all_ids),
                    created_from: resolved_window.start,
                    created_to: Some(resolved_window.end),
                    ..Default::default()
                }),
            ),
            self.fetch(FetchTarget::Rewards, self.store.query_rewards(RewardFilter::default())),
        )?;

        Ok(build_snapshot(
            window,
            resolved_window,
            &resolved_scope,
            &transactions,
            &rewards,
        ))
    }
}

/// Sum settled earned transactions into point and bag totals
fn sum_rollup<'a>(transactions: impl Iterator<Item = &'a Transaction>) -> RollupTotals {
    let mut totals = RollupTotals::default();
    for tx in transactions {
        totals.points += tx.amount;
        totals.bags += bags_from_transaction(&tx.description, tx.amount);
    }
    totals
}

/// True for transactions that contribute to settled earned totals
fn is_settled_earned(tx: &Transaction) -> bool {
    tx.tx_type == TransactionType::Earned && tx.status.is_settled()
}

/// Assemble the snapshot from already-fetched records. Pure; all
/// ranking and reconciliation math lives here.
fn build_snapshot(
    window: ReportingWindow,
    resolved_window: ResolvedWindow,
    scope: &ResolvedScope,
    transactions: &[Transaction],
    rewards: &[Reward],
) -> AnalyticsSnapshot {
    // Cancelled/rejected rows are excluded from every aggregate
    let countable: Vec<&Transaction> =
        transactions.iter().filter(|tx| !tx.status.is_excluded()).collect();

    let dealer_ids: HashSet<i32> = scope.dealer_ids.iter().copied().collect();
    let sub_dealer_ids: HashSet<i32> = scope.sub_dealer_ids.iter().copied().collect();

    let settled_earned: Vec<&Transaction> =
        countable.iter().copied().filter(|tx| is_settled_earned(tx)).collect();

    // Single fetched set partitioned by id membership; the union
    // total is the sum of the two disjoint parts by construction
    let dealer_totals = sum_rollup(
        settled_earned.iter().copied().filter(|tx| dealer_ids.contains(&tx.user_id)),
    );
    let sub_dealer_totals = sum_rollup(
        settled_earned.iter().copied().filter(|tx| sub_dealer_ids.contains(&tx.user_id)),
    );
    let totals = dealer_totals.combined(sub_dealer_totals);

    let active_users = countable
        .iter()
        .map(|tx| tx.user_id)
        .collect::<HashSet<i32>>()
        .len() as u64;
    let new_users = scope
        .users
        .iter()
        .filter(|u| resolved_window.contains(u.created_at))
        .count() as u64;
    let total_users = scope.users.len() as u64;

    let rewards_redeemed = countable
        .iter()
        .filter(|tx| tx.tx_type == TransactionType::Redeemed && tx.status.is_settled())
        .count() as u64;

    AnalyticsSnapshot {
        period: window.label().to_string(),
        window_start: resolved_window.start,
        window_end: resolved_window.end,
        total_users,
        active_users,
        new_users,
        total_transactions: countable.len() as u64,
        totals,
        dealer_totals,
        sub_dealer_totals,
        rewards_redeemed,
        engagement_rate: engagement_rate(active_users, total_users),
        top_dealers: rank_dealers(&scope.users, &settled_earned),
        top_rewards: rank_rewards(&countable, rewards),
    }
}

/// round(active / total * 100), defined as 0 when there are no users
fn engagement_rate(active: u64, total: u64) -> u32 {
    if total == 0 {
        return 0;
    }
    ((active as f64 / total as f64) * 100.0).round() as u32
}

/// Top entities by settled earned bags, descending, ties broken by
/// ascending user id for determinism
fn rank_dealers(users: &[User], settled_earned: &[&Transaction]) -> Vec<TopDealer> {
    let mut bags_by_user: HashMap<i32, i64> = HashMap::new();
    for tx in settled_earned {
        *bags_by_user.entry(tx.user_id).or_insert(0) +=
            bags_from_transaction(&tx.description, tx.amount);
    }

    let mut ranked: Vec<TopDealer> = users
        .iter()
        .filter_map(|user| {
            bags_by_user.get(&user.id).map(|bags| TopDealer {
                user_id: user.id,
                name: user.name.clone(),
                role: user.role,
                bags_sold: *bags,
            })
        })
        .collect();

    ranked.sort_by(|a, b| b.bags_sold.cmp(&a.bags_sold).then(a.user_id.cmp(&b.user_id)));
    ranked.truncate(TOP_N);
    ranked
}

/// Top rewards by settled redemption count, descending, ties broken
/// by ascending reward id
fn rank_rewards(countable: &[&Transaction], rewards: &[Reward]) -> Vec<TopReward> {
    let mut redemptions_by_reward: HashMap<i32, u64> = HashMap::new();
    for tx in countable {
        if tx.tx_type != TransactionType::Redeemed || !tx.status.is_settled() {
            continue;
        }
        if let Some(reward_id) = tx.reward_id {
            *redemptions_by_reward.entry(reward_id).or_insert(0) += 1;
        }
    }

    let names: HashMap<i32, &str> =
        rewards.iter().map(|r| (r.id, r.name.as_str())).collect();

    let mut ranked: Vec<TopReward> = redemptions_by_reward
        .into_iter()
        .map(|(reward_id, redemptions)| TopReward {
            reward_id,
            name: names.get(&reward_id).map(|n| n.to_string()),
            redemptions,
        })
        .collect();

    ranked.sort_by(|a, b| {
        b.redemptions.cmp(&a.redemptions).then(a.reward_id.cmp(&b.reward_id))
    });
    ranked.truncate(TOP_N);
    ranked
}
