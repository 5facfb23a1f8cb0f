use std::sync::Arc;

use async_trait::async_trait;

use crate::{
    model::{Membership, Policy, PrincipalId},
    store::{PolicyFilter, PolicyStore, StoreError},
};

/// Immutable in-process snapshot of memberships and policies.
#[derive(Clone, Debug, Default)]
pub struct MemoryStore {
    memberships: Arc<Vec<Membership>>,
    policies: Arc<Vec<Policy>>,
}

impl MemoryStore {
    pub fn new(memberships: Vec<Membership>, policies: Vec<Policy>) -> Self {
        Self {
            memberships: Arc::new(memberships),
            policies: Arc::new(policies),
        }
    }

    pub fn with_membership(self, membership: Membership) -> Self {
        let mut memberships = self.memberships.as_ref().clone();
        memberships.push(membership);
        Self {
            memberships: Arc::new(memberships),
            ..self
        }
    }

    pub fn with_policy(self, policy: Policy) -> Self {
        let mut policies = self.policies.as_ref().clone();
        policies.push(policy);
        Self {
            policies: Arc::new(policies),
            ..self
        }
    }
}

#[async_trait]
impl PolicyStore for MemoryStore {
    async fn find_active_memberships(
        &self,
        principal: &PrincipalId,
    ) -> Result<Vec<Membership>, StoreError> {
        Ok(self
            .memberships
            .iter()
            .filter(|m| m.active && &m.principal == principal)
            .cloned()
            .collect())
    }

    async fn find_policies(&self, filter: &PolicyFilter) -> Result<Vec<Policy>, StoreError> {
        Ok(self
            .policies
            .iter()
            .filter(|p| filter.accepts(p))
            .cloned()
            .collect())
    }
}
