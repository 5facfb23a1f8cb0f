//! Scope-chain decisions.
//!
//! A check walks from the target node up to the root. The first level holding a
//! matching policy decides; within a level position-bound policies beat
//! position-less ones and deny beats allow. Nothing matching anywhere means deny.

use std::{
    collections::{HashMap, HashSet},
    future::Future,
    sync::Arc,
    time::Duration,
};

use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use crate::{
    error::{AuthzError, AuthzResult},
    model::{Effect, Membership, Policy, PrincipalId},
    path::HierarchyPath,
    pattern::any_matches,
    store::{PolicyFilter, PolicyStore, StoreError},
};

pub const DEFAULT_STORE_TIMEOUT: Duration = Duration::from_secs(10);

/// A fully validated "may `principal` do `action` on `resource` at `org_path`".
#[derive(Clone, Debug, PartialEq, Eq, Deserialize, Serialize)]
pub struct PolicyContext {
    pub principal: PrincipalId,
    pub org_path: HierarchyPath,
    pub action: String,
    pub resource: String,
}

impl PolicyContext {
    pub fn parse(principal: &str, org_path: &str, action: &str, resource: &str) -> AuthzResult<Self> {
        Ok(Self {
            principal: parse_principal(principal)?,
            org_path: HierarchyPath::parse(org_path)?,
            action: required("action", action)?,
            resource: required("resource", resource)?,
        })
    }
}

pub(crate) fn parse_principal(raw: &str) -> AuthzResult<PrincipalId> {
    PrincipalId::parse(raw)
        .ok_or_else(|| AuthzError::InvalidInput("principal id is required".into()))
}

pub(crate) fn required(field: &str, raw: &str) -> AuthzResult<String> {
    let value = raw.trim();
    if value.is_empty() {
        return Err(AuthzError::InvalidInput(format!("{field} is required")));
    }
    Ok(value.to_owned())
}

/// Evaluates decisions and projections against a [`PolicyStore`].
///
/// Holds no state besides the store handle; every call loads its own snapshot.
#[derive(Clone)]
pub struct PolicyEngine {
    store: Arc<dyn PolicyStore>,
    store_timeout: Duration,
}

impl PolicyEngine {
    pub fn new(store: Arc<dyn PolicyStore>) -> Self {
        Self {
            store,
            store_timeout: DEFAULT_STORE_TIMEOUT,
        }
    }

    pub fn with_store_timeout(mut self, timeout: Duration) -> Self {
        self.store_timeout = timeout;
        self
    }

    /// Convenience wrapper over [`PolicyEngine::evaluate`] for raw inputs.
    pub async fn can(
        &self,
        principal: &str,
        org_path: &str,
        action: &str,
        resource: &str,
    ) -> AuthzResult<bool> {
        let ctx = PolicyContext::parse(principal, org_path, action, resource)?;
        self.evaluate(&ctx).await
    }

    #[instrument(
        name = "authz.can",
        skip_all,
        fields(principal = %ctx.principal, org_path = %ctx.org_path, action = %ctx.action)
    )]
    pub async fn evaluate(&self, ctx: &PolicyContext) -> AuthzResult<bool> {
        let memberships = self.memberships(&ctx.principal).await?;
        let scopes = ctx.org_path.ancestor_chain();
        let policies = self
            .policies(&PolicyFilter::default().scopes(scopes).enabled())
            .await?;
        let allowed = decide(ctx, &memberships, &policies);
        debug!(allowed, policies = policies.len(), "decision evaluated");
        Ok(allowed)
    }

    /// Like [`PolicyEngine::evaluate`] but turns a negative decision into
    /// [`AuthzError::Denied`], for callers that gate work on it.
    pub async fn check(&self, ctx: &PolicyContext) -> AuthzResult<()> {
        if self.evaluate(ctx).await? {
            Ok(())
        } else {
            Err(AuthzError::Denied {
                action: ctx.action.clone(),
                resource: ctx.resource.clone(),
                org_path: ctx.org_path.to_string(),
            })
        }
    }

    pub(crate) async fn memberships(&self, principal: &PrincipalId) -> AuthzResult<Vec<Membership>> {
        let mut memberships = self
            .bounded(self.store.find_active_memberships(principal))
            .await?;
        memberships.retain(|m| m.active);
        Ok(memberships)
    }

    pub(crate) async fn policies(&self, filter: &PolicyFilter) -> AuthzResult<Vec<Policy>> {
        self.bounded(self.store.find_policies(filter)).await
    }

    async fn bounded<T>(
        &self,
        call: impl Future<Output = Result<T, StoreError>>,
    ) -> AuthzResult<T> {
        match tokio::time::timeout(self.store_timeout, call).await {
            Ok(result) => result.map_err(AuthzError::from),
            Err(_) => Err(AuthzError::Timeout(self.store_timeout)),
        }
    }
}

/// Pure scope-chain decision over a loaded snapshot.
pub fn decide(ctx: &PolicyContext, memberships: &[Membership], policies: &[Policy]) -> bool {
    let mut positions_at: HashMap<&HierarchyPath, HashSet<&str>> = HashMap::new();
    for membership in memberships.iter().filter(|m| m.active) {
        positions_at
            .entry(&membership.org_path)
            .or_default()
            .insert(membership.position_key.as_str());
    }

    let mut by_scope: HashMap<&HierarchyPath, Vec<&Policy>> = HashMap::new();
    for policy in policies.iter().filter(|p| p.enabled) {
        by_scope.entry(&policy.scope).or_default().push(policy);
    }

    let no_positions = HashSet::new();
    for scope in ctx.org_path.ancestor_chain() {
        let Some(candidates) = by_scope.get(&scope) else {
            continue;
        };
        let at_target = scope == ctx.org_path;
        let held = positions_at.get(&scope).unwrap_or(&no_positions);
        let winner = candidates
            .iter()
            .filter(|p| at_target || p.inherit)
            .filter(|p| match p.position_key.as_deref() {
                None => true,
                Some(key) => held.contains(key),
            })
            .filter(|p| any_matches(&p.actions, &ctx.action) && any_matches(&p.resources, &ctx.resource))
            .min_by_key(|p| (p.position_key.is_none(), p.effect == Effect::Allow));
        if let Some(policy) = winner {
            debug!(scope = %scope, policy = %policy.id, effect = policy.effect.as_str(), "decisive policy");
            return policy.effect == Effect::Allow;
        }
    }
    false
}
