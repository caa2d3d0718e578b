use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;
use uuid::Uuid;

/// Transaction type: points are either earned against a bag purchase
/// or redeemed against a reward catalog item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type, ToSchema)]
#[sqlx(type_name = "text", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum TransactionType {
    Earned,
    Redeemed,
}

impl TransactionType {
    /// Convert type to string representation
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionType::Earned => "earned",
            TransactionType::Redeemed => "redeemed",
        }
    }
}

impl std::fmt::Display for TransactionType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Transaction status enum representing the approval lifecycle of a
/// point request.
///
/// Only `Approved` and `Completed` transactions count toward settled
/// totals. `Pending` and `DealerApproved` sit in the awaiting bucket,
/// while `Rejected` and `Cancelled` are excluded from every positive
/// aggregate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type, ToSchema)]
#[sqlx(type_name = "text", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum TransactionStatus {
    Pending,
    DealerApproved,
    Approved,
    Rejected,
    Completed,
    Cancelled,
}

impl TransactionStatus {
    /// Convert status to string representation
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionStatus::Pending => "pending",
            TransactionStatus::DealerApproved => "dealer_approved",
            TransactionStatus::Approved => "approved",
            TransactionStatus::Rejected => "rejected",
            TransactionStatus::Completed => "completed",
            TransactionStatus::Cancelled => "cancelled",
        }
    }

    /// Parse status from string
    pub fn from_str(s: &str) -> Result<Self, String> {
        match s.to_lowercase().as_str() {
            "pending" => Ok(TransactionStatus::Pending),
            "dealer_approved" => Ok(TransactionStatus::DealerApproved),
            "approved" => Ok(TransactionStatus::Approved),
            "rejected" => Ok(TransactionStatus::Rejected),
            "completed" => Ok(TransactionStatus::Completed),
            "cancelled" => Ok(TransactionStatus::Cancelled),
            _ => Err(format!("Invalid transaction status: {}", s)),
        }
    }

    /// True for statuses that count toward settled totals
    pub fn is_settled(&self) -> bool {
        matches!(self, TransactionStatus::Approved | TransactionStatus::Completed)
    }

    /// True for statuses still waiting on dealer/admin approval
    pub fn is_awaiting(&self) -> bool {
        matches!(self, TransactionStatus::Pending | TransactionStatus::DealerApproved)
    }

    /// True for terminal statuses excluded from all positive aggregates
    pub fn is_excluded(&self) -> bool {
        matches!(self, TransactionStatus::Rejected | TransactionStatus::Cancelled)
    }
}

impl Default for TransactionStatus {
    fn default() -> Self {
        TransactionStatus::Pending
    }
}

impl std::fmt::Display for TransactionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Role of a program participant
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type, ToSchema)]
#[sqlx(type_name = "text", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum UserRole {
    Admin,
    Dealer,
    SubDealer,
    Contractor,
    Builder,
}

impl UserRole {
    /// Convert role to string representation
    pub fn as_str(&self) -> &'static str {
        match self {
            UserRole::Admin => "admin",
            UserRole::Dealer => "dealer",
            UserRole::SubDealer => "sub_dealer",
            UserRole::Contractor => "contractor",
            UserRole::Builder => "builder",
        }
    }

    /// Parse role from string
    pub fn from_str(s: &str) -> Result<Self, String> {
        match s.to_lowercase().as_str() {
            "admin" => Ok(UserRole::Admin),
            "dealer" => Ok(UserRole::Dealer),
            "sub_dealer" => Ok(UserRole::SubDealer),
            "contractor" => Ok(UserRole::Contractor),
            "builder" => Ok(UserRole::Builder),
            _ => Err(format!("Invalid user role: {}", s)),
        }
    }
}

impl std::fmt::Display for UserRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A point transaction: an earned bag purchase awaiting or holding
/// approval, or a redemption against a reward.
///
/// The bag equivalent of a transaction is never stored; it is always
/// derived from `(description, amount)` by the conversion module.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct Transaction {
    pub id: Uuid,
    /// Owner of the transaction (the earner or redeemer)
    #[schema(example = 42)]
    pub user_id: i32,
    /// Dealer who countersigns an earned transaction
    pub dealer_id: Option<i32>,
    #[sqlx(rename = "transaction_type")]
    pub tx_type: TransactionType,
    /// Point quantity, always non-negative
    #[schema(example = 100)]
    pub amount: i64,
    /// Free text carrying the "OPC"/"PPC" cement-type tag for earned
    /// transactions; legacy rows may carry neither
    #[schema(example = "20 OPC bags")]
    pub description: String,
    pub status: TransactionStatus,
    pub created_at: DateTime<Utc>,
    /// Reward reference when `tx_type` is redeemed
    pub reward_id: Option<i32>,
}

/// A program participant. Sub-dealers reference the dealer that
/// created them through `created_by`, which defines the hierarchy
/// used for network roll-ups.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct User {
    #[schema(example = 42)]
    pub id: i32,
    #[schema(example = "Sharma Traders")]
    pub name: String,
    pub role: UserRole,
    /// Parent dealer for sub-dealers, absent for top-level users
    pub created_by: Option<i32>,
    #[schema(example = "Pune")]
    pub district: Option<String>,
    /// Running point balance, mutated atomically with transaction
    /// status changes
    pub points: i64,
    pub created_at: DateTime<Utc>,
}

/// A reward catalog item points can be redeemed against
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct Reward {
    #[schema(example = 3)]
    pub id: i32,
    #[schema(example = "Steel water bottle")]
    pub name: String,
    #[schema(example = 500)]
    pub points_cost: i64,
    pub created_at: DateTime<Utc>,
}
