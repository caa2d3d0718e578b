// PostgreSQL record store
//
// Translates the engine's filters into parameterized SQL. Clauses are
// assembled with numbered placeholders and bound in the same order
// they were pushed.

use sqlx::postgres::PgArguments;
use sqlx::query::QueryAs;
use sqlx::{PgPool, Postgres};

use crate::analytics::store::{
    RecordStore, RewardFilter, StoreResult, TransactionFilter, UserFilter,
};
use crate::models::{Reward, Transaction, User};

/// Record store backed by the PostgreSQL pool
#[derive(Debug, Clone)]
pub struct PgRecordStore {
    pool: PgPool,
}

impl PgRecordStore {
    /// Create a new PgRecordStore
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

type PgQueryAs<'q, T> = QueryAs<'q, Postgres, T, PgArguments>;

/// Append WHERE clauses to a base SELECT, numbering placeholders in
/// push order
fn with_clauses(base: &str, clauses: &[String]) -> String {
    if clauses.is_empty() {
        base.to_string()
    } else {
        format!("{} WHERE {}", base, clauses.join(" AND "))
    }
}

impl RecordStore for PgRecordStore {
    async fn query_users(&self, filter: UserFilter) -> StoreResult<Vec<User>> {
        let mut clauses = Vec::new();
        let mut idx = 0;

        if filter.ids.is_some() {
            idx += 1;
            clauses.push(format!("id = ANY(${})", idx));
        }
        if filter.roles.is_some() {
            idx += 1;
            clauses.push(format!("role = ANY(${})", idx));
        }
        if filter.created_by.is_some() {
            idx += 1;
            clauses.push(format!("created_by = ${}", idx));
        }

        let sql = with_clauses(
            "SELECT id, name, role, created_by, district, points, created_at FROM users",
            &clauses,
        ) + " ORDER BY id";

        let mut query: PgQueryAs<User> = sqlx::query_as(&sql);
        if let Some(ids) = &filter.ids {
            query = query.bind(ids);
        }
        if let Some(roles) = &filter.roles {
            let roles: Vec<String> = roles.iter().map(|r| r.as_str().to_string()).collect();
            query = query.bind(roles);
        }
        if let Some(created_by) = filter.created_by {
            query = query.bind(created_by);
        }

        let users = query.fetch_all(&self.pool).await?;
        Ok(users)
    }

    async fn query_transactions(&self, filter: TransactionFilter) -> StoreResult<Vec<Transaction>> {
        let mut clauses = Vec::new();
        let mut idx = 0;

        if filter.user_ids.is_some() {
            idx += 1;
            clauses.push(format!("user_id = ANY(${})", idx));
        }
        if filter.tx_type.is_some() {
            idx += 1;
            clauses.push(format!("transaction_type = ${}", idx));
        }
        if filter.statuses.is_some() {
            idx += 1;
            clauses.push(format!("status = ANY(${})", idx));
        }
        if filter.created_from.is_some() {
            idx += 1;
            clauses.push(format!("created_at >= ${}", idx));
        }
        if filter.created_to.is_some() {
            idx += 1;
            clauses.push(format!("created_at <= ${}", idx));
        }

        let sql = with_clauses(
            "SELECT id, user_id, dealer_id, transaction_type, amount, description, status, \
             created_at, reward_id FROM transactions",
            &clauses,
        ) + " ORDER BY created_at";

        let mut query: PgQueryAs<Transaction> = sqlx::query_as(&sql);
        if let Some(user_ids) = &filter.user_ids {
            query = query.bind(user_ids);
        }
        if let Some(tx_type) = filter.tx_type {
            query = query.bind(tx_type.as_str().to_string());
        }
        if let Some(statuses) = &filter.statuses {
            let statuses: Vec<String> = statuses.iter().map(|s| s.as_str().to_string()).collect();
            query = query.bind(statuses);
        }
        if let Some(from) = filter.created_from {
            query = query.bind(from);
        }
        if let Some(to) = filter.created_to {
            query = query.bind(to);
        }

        let transactions = query.fetch_all(&self.pool).await?;
        Ok(transactions)
    }

    async fn query_rewards(&self, filter: RewardFilter) -> StoreResult<Vec<Reward>> {
        let mut clauses = Vec::new();
        if filter.ids.is_some() {
            clauses.push("id = ANY($1)".to_string());
        }

        let sql = with_clauses(
            "SELECT id, name, points_cost, created_at FROM rewards",
            &clauses,
        ) + " ORDER BY id";

        let mut query: PgQueryAs<Reward> = sqlx::query_as(&sql);
        if let Some(ids) = &filter.ids {
            query = query.bind(ids);
        }

        let rewards = query.fetch_all(&self.pool).await?;
        Ok(rewards)
    }
}
