//! Membership-anchored projections: "what can I do here" and "where can I act".
//!
//! A policy joins a membership when its position matches (or it has none) and the
//! membership node sits under the policy scope. The membership node is the anchor;
//! `spread` decides whether the grant covers only the anchor or its whole subtree.

use std::collections::{BTreeMap, HashSet};

use serde::Serialize;
use tracing::{debug, instrument};

use crate::{
    engine::{PolicyEngine, parse_principal, required},
    error::AuthzResult,
    model::{Effect, Membership, Policy, Spread},
    path::HierarchyPath,
    pattern::any_matches,
    store::PolicyFilter,
};

/// Actions reported when the caller does not name any.
pub const DEFAULT_ABILITY_ACTIONS: [&str; 3] = ["post:create", "event:create", "post:moderate"];

/// Version tag reported alongside projections so clients can detect model changes.
pub const ABILITIES_VERSION: &str = "pol-v2";

pub type AbilityMap = BTreeMap<String, bool>;

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Abilities {
    pub org_path: HierarchyPath,
    pub abilities: AbilityMap,
}

/// Splits a comma separated action list, dropping blanks.
pub fn parse_action_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|action| !action.is_empty())
        .map(str::to_owned)
        .collect()
}

fn joins(policy: &Policy, membership: &Membership) -> bool {
    policy.enabled
        && policy.applies_to_position(&membership.position_key)
        && policy.scope.is_prefix_of(&membership.org_path)
}

fn reaches(spread: Spread, anchor: &HierarchyPath, target: &HierarchyPath) -> bool {
    match spread {
        Spread::Exact => anchor == target,
        Spread::Subtree => anchor.is_prefix_of(target),
    }
}

/// Pure projection of `requested` actions at `target` over a loaded snapshot.
///
/// An action is granted when an allow policy reaches `target` through any
/// membership and no deny policy does.
pub fn project_abilities(
    target: &HierarchyPath,
    requested: &[String],
    memberships: &[Membership],
    policies: &[Policy],
) -> AbilityMap {
    let mut granted: HashSet<&str> = HashSet::new();
    let mut denied: HashSet<&str> = HashSet::new();

    for membership in memberships.iter().filter(|m| m.active) {
        for policy in policies.iter().filter(|p| joins(p, membership)) {
            if !reaches(policy.spread, &membership.org_path, target) {
                continue;
            }
            for action in requested {
                if !any_matches(&policy.actions, action) {
                    continue;
                }
                match policy.effect {
                    Effect::Allow => granted.insert(action.as_str()),
                    Effect::Deny => denied.insert(action.as_str()),
                };
            }
        }
    }

    requested
        .iter()
        .map(|action| {
            let allowed = granted.contains(action.as_str()) && !denied.contains(action.as_str());
            (action.clone(), allowed)
        })
        .collect()
}

/// Membership anchors at which `action` is granted, in membership order.
pub fn project_where(action: &str, memberships: &[Membership], policies: &[Policy]) -> Vec<HierarchyPath> {
    let mut granted: Vec<&HierarchyPath> = Vec::new();
    let mut denied: HashSet<&HierarchyPath> = HashSet::new();

    for membership in memberships.iter().filter(|m| m.active) {
        for policy in policies.iter().filter(|p| joins(p, membership)) {
            if !any_matches(&policy.actions, action) {
                continue;
            }
            match policy.effect {
                Effect::Allow => {
                    if !granted.contains(&&membership.org_path) {
                        granted.push(&membership.org_path);
                    }
                }
                Effect::Deny => {
                    denied.insert(&membership.org_path);
                }
            }
        }
    }

    granted
        .into_iter()
        .filter(|path| !denied.contains(path))
        .cloned()
        .collect()
}

impl PolicyEngine {
    /// Reports which of `actions` the principal may perform at `org_path`.
    ///
    /// `None` or an empty list falls back to [`DEFAULT_ABILITY_ACTIONS`].
    #[instrument(name = "authz.abilities", skip(self, actions))]
    pub async fn abilities(
        &self,
        principal: &str,
        org_path: &str,
        actions: Option<&[String]>,
    ) -> AuthzResult<Abilities> {
        let principal = parse_principal(principal)?;
        let target = HierarchyPath::parse(org_path)?;
        let mut requested: Vec<String> = match actions {
            Some(list) if list.iter().any(|a| !a.trim().is_empty()) => list
                .iter()
                .map(|a| a.trim().to_owned())
                .filter(|a| !a.is_empty())
                .collect(),
            _ => DEFAULT_ABILITY_ACTIONS.iter().map(|a| a.to_string()).collect(),
        };
        let mut seen = HashSet::new();
        requested.retain(|action| seen.insert(action.clone()));

        let memberships = self.memberships(&principal).await?;
        if memberships.is_empty() {
            debug!("principal holds no active memberships");
            return Ok(Abilities {
                abilities: requested.into_iter().map(|a| (a, false)).collect(),
                org_path: target,
            });
        }

        let filter = PolicyFilter::default()
            .positions(held_positions(&memberships))
            .enabled();
        let policies = self.policies(&filter).await?;
        let abilities = project_abilities(&target, &requested, &memberships, &policies);
        debug!(policies = policies.len(), "abilities projected");
        Ok(Abilities {
            org_path: target,
            abilities,
        })
    }

    /// Lists the membership nodes from which the principal may perform `action`.
    #[instrument(name = "authz.where_can_act", skip(self))]
    pub async fn where_can_act(&self, principal: &str, action: &str) -> AuthzResult<Vec<HierarchyPath>> {
        let principal = parse_principal(principal)?;
        let action = required("action", action)?;

        let memberships = self.memberships(&principal).await?;
        if memberships.is_empty() {
            return Ok(Vec::new());
        }

        let filter = PolicyFilter::default()
            .positions(held_positions(&memberships))
            .enabled()
            .action(action.clone());
        let policies = self.policies(&filter).await?;
        let orgs = project_where(&action, &memberships, &policies);
        debug!(orgs = orgs.len(), "anchors resolved");
        Ok(orgs)
    }
}

fn held_positions(memberships: &[Membership]) -> Vec<String> {
    let mut positions: Vec<String> = memberships.iter().map(|m| m.position_key.clone()).collect();
    positions.sort();
    positions.dedup();
    positions
}
