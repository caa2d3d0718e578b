use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::models::UserRole;

/// Settled point and bag totals for one id set and window
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct RollupTotals {
    /// Sum of settled earned point amounts
    #[schema(example = 280)]
    pub points: i64,
    /// Sum of derived bag counts
    #[schema(example = 33)]
    pub bags: i64,
}

impl RollupTotals {
    /// Component-wise sum of two roll-ups
    pub fn combined(self, other: RollupTotals) -> RollupTotals {
        RollupTotals {
            points: self.points + other.points,
            bags: self.bags + other.bags,
        }
    }
}

/// One entry in the top-dealers ranking
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct TopDealer {
    #[schema(example = 42)]
    pub user_id: i32,
    #[schema(example = "Sharma Traders")]
    pub name: String,
    pub role: UserRole,
    #[schema(example = 120)]
    pub bags_sold: i64,
}

/// One entry in the popular-rewards ranking
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct TopReward {
    #[schema(example = 3)]
    pub reward_id: i32,
    /// Absent when the catalog record for a redeemed reward is missing
    #[schema(example = "Steel water bottle")]
    pub name: Option<String>,
    #[schema(example = 17)]
    pub redemptions: u64,
}

/// Cross-sectional analytics for one scope and window.
///
/// Computed fresh on every query and discarded after use; callers may
/// cache it with a short TTL, the engine never does. The dealer and
/// sub-dealer partitions always reconcile: their component-wise sum
/// equals `totals`.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct AnalyticsSnapshot {
    /// Window label ("current_month", "quarterly", ...)
    #[schema(example = "current_month")]
    pub period: String,
    /// Resolved lower bound; absent for lifetime
    pub window_start: Option<DateTime<Utc>>,
    /// Resolved upper bound
    pub window_end: DateTime<Utc>,
    #[schema(example = 40)]
    pub total_users: u64,
    /// Distinct users with at least one countable transaction in the
    /// window
    #[schema(example = 25)]
    pub active_users: u64,
    /// Users whose record was created inside the window
    #[schema(example = 4)]
    pub new_users: u64,
    /// Countable transactions in the window (cancelled and rejected
    /// excluded)
    #[schema(example = 310)]
    pub total_transactions: u64,
    /// Combined settled totals; equals the sum of the two partitions
    pub totals: RollupTotals,
    /// Settled totals attributed to dealer-role users
    pub dealer_totals: RollupTotals,
    /// Settled totals attributed to sub-dealer-role users
    pub sub_dealer_totals: RollupTotals,
    /// Settled redemption count in the window
    #[schema(example = 12)]
    pub rewards_redeemed: u64,
    /// round(active / total * 100); 0 when there are no users
    #[schema(example = 63)]
    pub engagement_rate: u32,
    /// Top five entities by bags sold, ties broken by ascending id
    pub top_dealers: Vec<TopDealer>,
    /// Top five rewards by redemption count, ties broken by ascending id
    pub top_rewards: Vec<TopReward>,
}
