// Role-scoped entity resolution
//
// A single tagged scope replaces per-call-site role branching: the
// scope is resolved once into disjoint dealer and sub-dealer id sets
// and the rest of the engine operates uniformly over those sets.

use crate::analytics::store::UserFilter;
use crate::models::{User, UserRole};

/// Which slice of the dealer hierarchy a query covers.
///
/// The three scopes are mutually exclusive: a transaction is never
/// attributed to more than one scope at a time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScopeSpec {
    /// Admin view: every dealer and sub-dealer in the program
    Global,
    /// A dealer's own sales only
    DealerOwn { dealer_id: i32 },
    /// Sales of the sub-dealers a dealer created
    DealerNetwork { dealer_id: i32 },
}

impl ScopeSpec {
    /// The user filter whose result set spans this scope's
    /// contributing entities
    pub fn user_filter(&self) -> UserFilter {
        match self {
            ScopeSpec::Global => UserFilter {
                roles: Some(vec![UserRole::Dealer, UserRole::SubDealer]),
                ..Default::default()
            },
            ScopeSpec::DealerOwn { dealer_id } => UserFilter {
                ids: Some(vec![*dealer_id]),
                ..Default::default()
            },
            ScopeSpec::DealerNetwork { dealer_id } => UserFilter {
                roles: Some(vec![UserRole::SubDealer]),
                created_by: Some(*dealer_id),
                ..Default::default()
            },
        }
    }
}

/// A scope resolved to its contributing users, partitioned into
/// disjoint dealer and sub-dealer id sets
#[derive(Debug, Clone)]
pub struct ResolvedScope {
    pub users: Vec<User>,
    pub dealer_ids: Vec<i32>,
    pub sub_dealer_ids: Vec<i32>,
}

impl ResolvedScope {
    /// Partition fetched users by role.
    ///
    /// Ids land in exactly one partition; roles outside the dealer
    /// hierarchy contribute no ids (they never sell bags).
    pub fn from_users(users: Vec<User>) -> Self {
        let mut dealer_ids = Vec::new();
        let mut sub_dealer_ids = Vec::new();

        for user in &users {
            match user.role {
                UserRole::Dealer => dealer_ids.push(user.id),
                UserRole::SubDealer => sub_dealer_ids.push(user.id),
                _ => {}
            }
        }

        Self { users, dealer_ids, sub_dealer_ids }
    }

    /// Union of both id partitions
    pub fn all_ids(&self) -> Vec<i32> {
        let mut ids = Vec::with_capacity(self.dealer_ids.len() + self.sub_dealer_ids.len());
        ids.extend_from_slice(&self.dealer_ids);
        ids.extend_from_slice(&self.sub_dealer_ids);
        ids
    }
}
