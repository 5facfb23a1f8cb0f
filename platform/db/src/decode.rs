//! Row <-> record conversion. Every stored string is re-validated here so the engine
//! only ever sees typed records.

use entity::{memberships, policies};
use platform_authz::{
    Effect, HierarchyPath, Membership, Pattern, Policy, PrincipalId, Spread, StoreError,
};
use sea_orm::{
    ActiveValue::Set,
    prelude::{DateTimeWithTimeZone, Json},
};

fn invalid(table: &'static str, id: impl ToString, reason: impl ToString) -> StoreError {
    StoreError::InvalidRecord {
        table,
        id: id.to_string(),
        reason: reason.to_string(),
    }
}

pub(crate) fn membership_from_row(row: memberships::Model) -> Result<Membership, StoreError> {
    let principal = PrincipalId::parse(&row.principal_id)
        .ok_or_else(|| invalid("memberships", row.id, "blank principal id"))?;
    let org_path =
        HierarchyPath::parse(&row.org_path).map_err(|err| invalid("memberships", row.id, err))?;
    Ok(Membership {
        principal,
        org_path,
        position_key: row.position_key,
        active: row.active,
    })
}

pub(crate) fn policy_from_row(row: policies::Model) -> Result<Policy, StoreError> {
    let scope = HierarchyPath::parse(&row.scope).map_err(|err| invalid("policies", row.id, err))?;
    let effect: Effect = row
        .effect
        .parse()
        .map_err(|err| invalid("policies", row.id, err))?;
    let actions = patterns(&row.actions, row.id)?;
    let resources = patterns(&row.resources, row.id)?;
    Ok(Policy {
        id: row.id,
        key: row.key,
        scope,
        position_key: row.position_key.filter(|key| !key.trim().is_empty()),
        effect,
        actions,
        resources,
        inherit: row.inherit,
        spread: Spread::from_stored(&row.spread),
        enabled: row.enabled,
    })
}

fn patterns(value: &Json, id: uuid::Uuid) -> Result<Vec<Pattern>, StoreError> {
    serde_json::from_value(value.clone()).map_err(|err| invalid("policies", id, err))
}

fn patterns_json(patterns: &[Pattern]) -> Json {
    Json::Array(
        patterns
            .iter()
            .map(|pattern| Json::String(pattern.to_string()))
            .collect(),
    )
}

pub(crate) fn policy_to_active(
    policy: &Policy,
    created_at: DateTimeWithTimeZone,
) -> policies::ActiveModel {
    policies::ActiveModel {
        id: Set(policy.id),
        key: Set(policy.key.clone()),
        scope: Set(policy.scope.to_string()),
        position_key: Set(policy.position_key.clone()),
        effect: Set(policy.effect.as_str().to_owned()),
        actions: Set(patterns_json(&policy.actions)),
        resources: Set(patterns_json(&policy.resources)),
        inherit: Set(policy.inherit),
        spread: Set(policy.spread.as_str().to_owned()),
        enabled: Set(policy.enabled),
        created_at: Set(created_at),
    }
}
