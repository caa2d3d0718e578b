// End-to-end tests for the conversion endpoints and the aggregation
// engine, running against the in-memory record store.

use std::time::Duration;

use axum::routing::get;
use axum::Router;
use axum_test::TestServer;
use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use uuid::Uuid;

use crate::analytics::engine::AnalyticsEngine;
use crate::analytics::error::{AnalyticsError, FetchTarget};
use crate::analytics::handlers;
use crate::analytics::scope::ScopeSpec;
use crate::analytics::store::MemoryStore;
use crate::analytics::window::ReportingWindow;
use crate::models::{Reward, Transaction, TransactionStatus, TransactionType, User, UserRole};

// ============================================================================
// Test Helpers
// ============================================================================

/// Fixed reference clock: 2024-03-15 10:30 UTC
fn fixed_now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 3, 15, 10, 30, 0).single().expect("valid timestamp")
}

fn at(y: i32, m: u32, d: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(y, m, d, 12, 0, 0).single().expect("valid timestamp")
}

fn user(id: i32, role: UserRole, created_by: Option<i32>, created_at: DateTime<Utc>) -> User {
    User {
        id,
        name: format!("user-{}", id),
        role,
        created_by,
        district: Some("Pune".to_string()),
        points: 0,
        created_at,
    }
}

fn earned(
    user_id: i32,
    description: &str,
    amount: i64,
    status: TransactionStatus,
    created_at: DateTime<Utc>,
) -> Transaction {
    Transaction {
        id: Uuid::new_v4(),
        user_id,
        dealer_id: Some(1),
        tx_type: TransactionType::Earned,
        amount,
        description: description.to_string(),
        status,
        created_at,
        reward_id: None,
    }
}

fn redeemed(user_id: i32, reward_id: i32, status: TransactionStatus, created_at: DateTime<Utc>) -> Transaction {
    Transaction {
        id: Uuid::new_v4(),
        user_id,
        dealer_id: None,
        tx_type: TransactionType::Redeemed,
        amount: 100,
        description: "reward redemption".to_string(),
        status,
        created_at,
        reward_id: Some(reward_id),
    }
}

fn conversion_server() -> TestServer {
    let app: Router = Router::new()
        .route("/api/convert/points-to-bags", get(handlers::points_to_bags))
        .route("/api/convert/bags-to-points", get(handlers::bags_to_points));
    TestServer::new(app).expect("Failed to start test server")
}

// ============================================================================
// Conversion Endpoint Tests
// ============================================================================

#[tokio::test]
async fn test_points_to_bags_endpoint() {
    let server = conversion_server();

    let response = server
        .get("/api/convert/points-to-bags")
        .add_query_param("description", "50 OPC bags")
        .add_query_param("amount", "100")
        .await;
    response.assert_status_ok();
    response.assert_json(&serde_json::json!({ "bags": 20 }));
}

#[tokio::test]
async fn test_points_to_bags_endpoint_legacy_description() {
    let server = conversion_server();

    let response = server
        .get("/api/convert/points-to-bags")
        .add_query_param("description", "legacy purchase")
        .add_query_param("amount", "100")
        .await;
    response.assert_json(&serde_json::json!({ "bags": 10 }));
}

#[tokio::test]
async fn test_points_to_bags_endpoint_malformed_amount_is_zero() {
    let server = conversion_server();

    let response = server
        .get("/api/convert/points-to-bags")
        .add_query_param("description", "50 OPC bags")
        .add_query_param("amount", "plenty")
        .await;
    response.assert_status_ok();
    response.assert_json(&serde_json::json!({ "bags": 0 }));
}

#[tokio::test]
async fn test_bags_to_points_endpoint() {
    let server = conversion_server();

    let response = server
        .get("/api/convert/bags-to-points")
        .add_query_param("bags", "12")
        .add_query_param("cement_type", "OPC")
        .await;
    response.assert_status_ok();
    response.assert_json(&serde_json::json!({ "points": 60 }));
}

#[tokio::test]
async fn test_bags_to_points_endpoint_rejects_unknown_type() {
    let server = conversion_server();

    let response = server
        .get("/api/convert/bags-to-points")
        .add_query_param("bags", "12")
        .add_query_param("cement_type", "RMC")
        .await;
    response.assert_status_bad_request();
}

#[tokio::test]
async fn test_bags_to_points_endpoint_malformed_bags_is_zero() {
    let server = conversion_server();

    let response = server
        .get("/api/convert/bags-to-points")
        .add_query_param("bags", "a dozen")
        .add_query_param("cement_type", "PPC")
        .await;
    response.assert_json(&serde_json::json!({ "points": 0 }));
}

// ============================================================================
// Engine Scenario Tests
// ============================================================================

/// Three earned/approved transactions for one dealer in the current
/// month: ("10 OPC bags", 50), ("20 PPC bags", 200), ("no tag", 30)
/// must yield 33 bags and 280 points.
#[tokio::test]
async fn test_current_month_dealer_scenario() {
    let store = MemoryStore::new()
        .with_users(vec![user(1, UserRole::Dealer, None, at(2023, 6, 1))])
        .with_transactions(vec![
            earned(1, "10 OPC bags", 50, TransactionStatus::Approved, at(2024, 3, 5)),
            earned(1, "20 PPC bags", 200, TransactionStatus::Approved, at(2024, 3, 8)),
            earned(1, "no tag", 30, TransactionStatus::Approved, at(2024, 3, 12)),
        ]);
    let engine = AnalyticsEngine::new(store);

    let snapshot = engine
        .compute_analytics(
            ScopeSpec::DealerOwn { dealer_id: 1 },
            ReportingWindow::CurrentMonth,
            fixed_now(),
        )
        .await
        .expect("analytics succeeds");

    assert_eq!(snapshot.totals.bags, 33);
    assert_eq!(snapshot.totals.points, 280);
    assert_eq!(snapshot.period, "current_month");
    assert_eq!(snapshot.total_users, 1);
    assert_eq!(snapshot.active_users, 1);
    assert_eq!(snapshot.engagement_rate, 100);
}

/// Transactions outside the window must not contribute.
#[tokio::test]
async fn test_window_bounds_exclude_older_transactions() {
    let store = MemoryStore::new()
        .with_users(vec![user(1, UserRole::Dealer, None, at(2023, 6, 1))])
        .with_transactions(vec![
            earned(1, "10 OPC bags", 50, TransactionStatus::Approved, at(2024, 3, 5)),
            // Previous month, outside current_month
            earned(1, "10 OPC bags", 50, TransactionStatus::Approved, at(2024, 2, 5)),
        ]);
    let engine = AnalyticsEngine::new(store);

    let current = engine
        .compute_rollup(&[1], ReportingWindow::CurrentMonth, fixed_now())
        .await
        .expect("rollup succeeds");
    assert_eq!(current.bags, 10);

    let lifetime = engine
        .compute_rollup(&[1], ReportingWindow::Lifetime, fixed_now())
        .await
        .expect("rollup succeeds");
    assert_eq!(lifetime.bags, 20);
}

/// Reconciliation invariant: for disjoint dealer and sub-dealer sets,
/// rollup(D ∪ S) == rollup(D) + rollup(S) for every supported window.
#[tokio::test]
async fn test_rollup_reconciles_across_all_windows() {
    let dealer_ids = vec![1, 2];
    let sub_dealer_ids = vec![10, 11];
    let store = MemoryStore::new().with_transactions(vec![
        earned(1, "50 OPC bags", 250, TransactionStatus::Approved, at(2024, 3, 3)),
        earned(2, "PPC delivery", 90, TransactionStatus::Completed, at(2024, 2, 20)),
        earned(10, "OPC order", 45, TransactionStatus::Approved, at(2023, 11, 8)),
        earned(11, "untagged", 70, TransactionStatus::Approved, at(2023, 9, 30)),
        earned(11, "PPC bags", 130, TransactionStatus::Approved, at(2024, 1, 15)),
        // Unsettled rows must not disturb the invariant either
        earned(1, "OPC", 500, TransactionStatus::Pending, at(2024, 3, 10)),
        earned(10, "PPC", 300, TransactionStatus::Cancelled, at(2024, 3, 11)),
    ]);
    let engine = AnalyticsEngine::new(store);

    let windows = [
        ReportingWindow::CurrentMonth,
        ReportingWindow::Quarterly,
        ReportingWindow::HalfYearly,
        ReportingWindow::Yearly,
        ReportingWindow::Lifetime,
        ReportingWindow::Custom {
            start: NaiveDate::from_ymd_opt(2023, 9, 1).expect("valid date"),
            end: NaiveDate::from_ymd_opt(2024, 3, 15).expect("valid date"),
        },
    ];

    for window in windows {
        let union: Vec<i32> = dealer_ids.iter().chain(sub_dealer_ids.iter()).copied().collect();
        let combined = engine
            .compute_rollup(&union, window, fixed_now())
            .await
            .expect("rollup succeeds");
        let dealers = engine
            .compute_rollup(&dealer_ids, window, fixed_now())
            .await
            .expect("rollup succeeds");
        let subs = engine
            .compute_rollup(&sub_dealer_ids, window, fixed_now())
            .await
            .expect("rollup succeeds");

        assert_eq!(
            combined.bags,
            dealers.bags + subs.bags,
            "bag reconciliation drifted for {:?}",
            window
        );
        assert_eq!(combined.points, dealers.points + subs.points);
    }
}

/// The snapshot's dealer/sub-dealer partition must reconcile with its
/// combined totals in the admin view.
#[tokio::test]
async fn test_global_snapshot_partitions_reconcile() {
    let store = MemoryStore::new()
        .with_users(vec![
            user(1, UserRole::Dealer, None, at(2023, 1, 1)),
            user(2, UserRole::Dealer, None, at(2023, 1, 1)),
            user(10, UserRole::SubDealer, Some(1), at(2023, 5, 1)),
            // Contractors never contribute to bag totals
            user(20, UserRole::Contractor, None, at(2023, 5, 1)),
        ])
        .with_transactions(vec![
            earned(1, "40 OPC bags", 200, TransactionStatus::Approved, at(2024, 2, 1)),
            earned(2, "PPC stock", 100, TransactionStatus::Completed, at(2024, 3, 1)),
            earned(10, "30 PPC bags", 300, TransactionStatus::Approved, at(2024, 3, 2)),
        ]);
    let engine = AnalyticsEngine::new(store);

    let snapshot = engine
        .compute_analytics(ScopeSpec::Global, ReportingWindow::Quarterly, fixed_now())
        .await
        .expect("analytics succeeds");

    assert_eq!(snapshot.dealer_totals.bags, 40 + 10);
    assert_eq!(snapshot.sub_dealer_totals.bags, 30);
    assert_eq!(
        snapshot.totals.bags,
        snapshot.dealer_totals.bags + snapshot.sub_dealer_totals.bags
    );
    assert_eq!(
        snapshot.totals.points,
        snapshot.dealer_totals.points + snapshot.sub_dealer_totals.points
    );
    // Contractor is outside the global dealer scope entirely
    assert_eq!(snapshot.total_users, 3);
}

/// Network scope covers exactly the sub-dealers the dealer created.
#[tokio::test]
async fn test_dealer_network_scope() {
    let store = MemoryStore::new()
        .with_users(vec![
            user(1, UserRole::Dealer, None, at(2023, 1, 1)),
            user(10, UserRole::SubDealer, Some(1), at(2023, 5, 1)),
            user(11, UserRole::SubDealer, Some(2), at(2023, 5, 1)),
        ])
        .with_transactions(vec![
            earned(1, "OPC", 100, TransactionStatus::Approved, at(2024, 3, 5)),
            earned(10, "OPC", 50, TransactionStatus::Approved, at(2024, 3, 6)),
            earned(11, "OPC", 75, TransactionStatus::Approved, at(2024, 3, 7)),
        ]);
    let engine = AnalyticsEngine::new(store);

    let snapshot = engine
        .compute_analytics(
            ScopeSpec::DealerNetwork { dealer_id: 1 },
            ReportingWindow::CurrentMonth,
            fixed_now(),
        )
        .await
        .expect("analytics succeeds");

    // Only sub-dealer 10 contributes: not the dealer itself, not
    // another dealer's sub-dealer
    assert_eq!(snapshot.total_users, 1);
    assert_eq!(snapshot.totals.bags, 10);
    assert_eq!(snapshot.dealer_totals.bags, 0);
    assert_eq!(snapshot.sub_dealer_totals.bags, 10);
}

/// Zero users means engagement 0, never a division error.
#[tokio::test]
async fn test_empty_scope_has_zero_engagement() {
    let engine = AnalyticsEngine::new(MemoryStore::new());

    let snapshot = engine
        .compute_analytics(ScopeSpec::Global, ReportingWindow::Lifetime, fixed_now())
        .await
        .expect("analytics succeeds");

    assert_eq!(snapshot.total_users, 0);
    assert_eq!(snapshot.engagement_rate, 0);
    assert_eq!(snapshot.totals.bags, 0);
}

/// New/active user counting and redemption totals.
#[tokio::test]
async fn test_user_counts_and_redemptions() {
    let store = MemoryStore::new()
        .with_users(vec![
            user(1, UserRole::Dealer, None, at(2023, 1, 1)),
            user(2, UserRole::Dealer, None, at(2024, 3, 10)), // new this month
            user(10, UserRole::SubDealer, Some(1), at(2023, 5, 1)),
        ])
        .with_transactions(vec![
            earned(1, "OPC", 100, TransactionStatus::Approved, at(2024, 3, 5)),
            redeemed(1, 3, TransactionStatus::Completed, at(2024, 3, 6)),
            redeemed(1, 3, TransactionStatus::Pending, at(2024, 3, 7)),
            redeemed(10, 4, TransactionStatus::Cancelled, at(2024, 3, 8)),
        ])
        .with_rewards(vec![
            Reward { id: 3, name: "Steel water bottle".to_string(), points_cost: 500, created_at: at(2023, 1, 1) },
            Reward { id: 4, name: "Tool kit".to_string(), points_cost: 800, created_at: at(2023, 1, 1) },
        ]);
    let engine = AnalyticsEngine::new(store);

    let snapshot = engine
        .compute_analytics(ScopeSpec::Global, ReportingWindow::CurrentMonth, fixed_now())
        .await
        .expect("analytics succeeds");

    assert_eq!(snapshot.total_users, 3);
    assert_eq!(snapshot.new_users, 1);
    // The cancelled redemption does not make user 10 active
    assert_eq!(snapshot.active_users, 1);
    // earned + settled redemption + pending redemption
    assert_eq!(snapshot.total_transactions, 3);
    // Only the completed redemption counts
    assert_eq!(snapshot.rewards_redeemed, 1);
    assert_eq!(snapshot.top_rewards.len(), 1);
    assert_eq!(snapshot.top_rewards[0].reward_id, 3);
    assert_eq!(snapshot.top_rewards[0].name.as_deref(), Some("Steel water bottle"));
}

/// Tied bag counts rank by ascending dealer id.
#[tokio::test]
async fn test_top_dealer_tie_break_is_deterministic() {
    let store = MemoryStore::new()
        .with_users(vec![
            user(7, UserRole::Dealer, None, at(2023, 1, 1)),
            user(3, UserRole::Dealer, None, at(2023, 1, 1)),
            user(5, UserRole::Dealer, None, at(2023, 1, 1)),
        ])
        .with_transactions(vec![
            earned(7, "OPC", 100, TransactionStatus::Approved, at(2024, 3, 5)),
            earned(3, "OPC", 100, TransactionStatus::Approved, at(2024, 3, 6)),
            earned(5, "OPC", 100, TransactionStatus::Approved, at(2024, 3, 7)),
        ]);
    let engine = AnalyticsEngine::new(store);

    let snapshot = engine
        .compute_analytics(ScopeSpec::Global, ReportingWindow::CurrentMonth, fixed_now())
        .await
        .expect("analytics succeeds");

    let ids: Vec<i32> = snapshot.top_dealers.iter().map(|d| d.user_id).collect();
    assert_eq!(ids, vec![3, 5, 7]);
}

// ============================================================================
// Failure-Mode Tests
// ============================================================================

/// An invalid custom range is rejected before any query is issued.
#[tokio::test]
async fn test_invalid_range_issues_no_queries() {
    let store = MemoryStore::new();
    let engine = AnalyticsEngine::new(store.clone());

    let window = ReportingWindow::Custom {
        start: NaiveDate::from_ymd_opt(2024, 3, 10).expect("valid date"),
        end: NaiveDate::from_ymd_opt(2024, 3, 5).expect("valid date"),
    };

    let err = engine
        .compute_analytics(ScopeSpec::Global, window, fixed_now())
        .await
        .expect_err("must reject");
    assert!(matches!(err, AnalyticsError::InvalidRange { .. }));
    assert_eq!(store.queries_issued(), 0);

    let err = engine
        .compute_rollup(&[1], window, fixed_now())
        .await
        .expect_err("must reject");
    assert!(matches!(err, AnalyticsError::InvalidRange { .. }));
    assert_eq!(store.queries_issued(), 0);
}

/// A failed required sub-query fails the whole call; no partial
/// snapshot with silently-zeroed rewards is ever produced.
#[tokio::test]
async fn test_rewards_fetch_failure_fails_whole_call() {
    let store = MemoryStore::new()
        .with_users(vec![user(1, UserRole::Dealer, None, at(2023, 1, 1))])
        .with_transactions(vec![earned(
            1,
            "OPC",
            100,
            TransactionStatus::Approved,
            at(2024, 3, 5),
        )])
        .failing_on(FetchTarget::Rewards);
    let engine = AnalyticsEngine::new(store);

    let err = engine
        .compute_analytics(ScopeSpec::Global, ReportingWindow::CurrentMonth, fixed_now())
        .await
        .expect_err("must fail");
    assert!(matches!(
        err,
        AnalyticsError::DataFetch { target: FetchTarget::Rewards, .. }
    ));
}

#[tokio::test]
async fn test_users_fetch_failure_fails_whole_call() {
    let store = MemoryStore::new().failing_on(FetchTarget::Users);
    let engine = AnalyticsEngine::new(store);

    let err = engine
        .compute_analytics(ScopeSpec::Global, ReportingWindow::Lifetime, fixed_now())
        .await
        .expect_err("must fail");
    assert!(matches!(
        err,
        AnalyticsError::DataFetch { target: FetchTarget::Users, .. }
    ));
}

/// A slow store trips the fetch budget and surfaces a timeout instead
/// of hanging or returning a stale aggregate.
#[tokio::test(start_paused = true)]
async fn test_slow_store_times_out() {
    let store = MemoryStore::new()
        .with_users(vec![user(1, UserRole::Dealer, None, at(2023, 1, 1))])
        .with_latency(Duration::from_secs(60));
    let engine = AnalyticsEngine::new(store).with_fetch_timeout(Duration::from_millis(50));

    let err = engine
        .compute_analytics(ScopeSpec::Global, ReportingWindow::Lifetime, fixed_now())
        .await
        .expect_err("must time out");
    assert!(matches!(err, AnalyticsError::Timeout { budget_ms: 50, .. }));
}

#[tokio::test(start_paused = true)]
async fn test_fast_store_beats_the_budget() {
    let store = MemoryStore::new().with_latency(Duration::from_millis(10));
    let engine = AnalyticsEngine::new(store).with_fetch_timeout(Duration::from_millis(50));

    let totals = engine
        .compute_rollup(&[1], ReportingWindow::Lifetime, fixed_now())
        .await
        .expect("within budget");
    assert_eq!(totals.bags, 0);
}
