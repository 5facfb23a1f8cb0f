//! Read-side contract the engine needs from whatever persists memberships and
//! policies.

use std::error::Error as StdError;

use async_trait::async_trait;
use thiserror::Error;

use crate::{
    model::{Membership, Policy, PrincipalId},
    path::HierarchyPath,
    pattern::any_matches,
};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("policy store backend failure")]
    Backend(#[source] Box<dyn StdError + Send + Sync>),
    #[error("invalid {table} record {id}: {reason}")]
    InvalidRecord {
        table: &'static str,
        id: String,
        reason: String,
    },
}

impl StoreError {
    pub fn backend(err: impl Into<Box<dyn StdError + Send + Sync>>) -> Self {
        Self::Backend(err.into())
    }
}

/// Narrowing applied when loading policies. Every field left unset matches all rows.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PolicyFilter {
    pub scopes_in: Option<Vec<HierarchyPath>>,
    /// Matches policies whose position is listed or that carry no position at all.
    pub positions_in: Option<Vec<String>>,
    pub enabled_only: bool,
    /// Matches policies with at least one action pattern accepting this action.
    pub action_equals: Option<String>,
}

impl PolicyFilter {
    pub fn scopes(mut self, scopes: Vec<HierarchyPath>) -> Self {
        self.scopes_in = Some(scopes);
        self
    }

    pub fn positions(mut self, positions: Vec<String>) -> Self {
        self.positions_in = Some(positions);
        self
    }

    pub fn enabled(mut self) -> Self {
        self.enabled_only = true;
        self
    }

    pub fn action(mut self, action: impl Into<String>) -> Self {
        self.action_equals = Some(action.into());
        self
    }

    /// Whether `policy` passes the filter. In-memory stores evaluate it directly.
    pub fn accepts(&self, policy: &Policy) -> bool {
        if self.enabled_only && !policy.enabled {
            return false;
        }
        if let Some(scopes) = &self.scopes_in {
            if !scopes.contains(&policy.scope) {
                return false;
            }
        }
        if let (Some(positions), Some(key)) = (&self.positions_in, &policy.position_key) {
            if !positions.contains(key) {
                return false;
            }
        }
        if let Some(action) = &self.action_equals {
            if !any_matches(&policy.actions, action) {
                return false;
            }
        }
        true
    }
}

#[async_trait]
pub trait PolicyStore: Send + Sync {
    async fn find_active_memberships(
        &self,
        principal: &PrincipalId,
    ) -> Result<Vec<Membership>, StoreError>;

    async fn find_policies(&self, filter: &PolicyFilter) -> Result<Vec<Policy>, StoreError>;
}
