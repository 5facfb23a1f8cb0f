//! Administrative write paths. These are the only places records are created or
//! changed, and every policy passes through [`PolicyDraft::validate`] first.

use chrono::Utc;
use entity::{memberships, policies};
use platform_authz::{HierarchyPath, Membership, Policy, PolicyDraft, PrincipalId};
use sea_orm::{
    ActiveModelTrait, ActiveValue::Set, ColumnTrait, EntityTrait, QueryFilter, QueryOrder,
    prelude::DateTimeWithTimeZone,
};
use tracing::{info, instrument};
use uuid::Uuid;

use crate::{
    DbPool, DbResult,
    decode::{membership_from_row, policy_from_row, policy_to_active},
};

fn now() -> DateTimeWithTimeZone {
    Utc::now().into()
}

#[instrument(skip(db))]
pub async fn list_policies(
    db: &DbPool,
    scope: Option<&HierarchyPath>,
    position: Option<&str>,
) -> DbResult<Vec<Policy>> {
    let mut query = policies::Entity::find();
    if let Some(scope) = scope {
        query = query.filter(policies::Column::Scope.eq(scope.to_string()));
    }
    if let Some(position) = position {
        query = query.filter(policies::Column::PositionKey.eq(position));
    }
    let rows = query
        .order_by_asc(policies::Column::CreatedAt)
        .all(db)
        .await?;
    rows.into_iter()
        .map(|row| policy_from_row(row).map_err(Into::into))
        .collect()
}

#[instrument(skip(db, draft))]
pub async fn create_policy(db: &DbPool, draft: PolicyDraft) -> DbResult<Policy> {
    let policy = draft.validate()?;
    let row = policy_to_active(&policy, now()).insert(db).await?;
    info!(policy = %row.id, scope = %row.scope, "policy created");
    Ok(policy_from_row(row)?)
}

/// Creates or replaces a policy.
///
/// A keyed draft replaces the row with the same `key`. Otherwise the match is on
/// `(position_key, scope, spread, effect, inherit)`, so an allow and a deny for the
/// same position never overwrite each other.
#[instrument(skip(db, draft))]
pub async fn upsert_policy(db: &DbPool, draft: PolicyDraft) -> DbResult<Policy> {
    let mut policy = draft.validate()?;
    let query = match &policy.key {
        Some(key) => policies::Entity::find().filter(policies::Column::Key.eq(key.as_str())),
        None => {
            let position = match &policy.position_key {
                Some(key) => policies::Column::PositionKey.eq(key.as_str()),
                None => policies::Column::PositionKey.is_null(),
            };
            policies::Entity::find()
                .filter(policies::Column::Key.is_null())
                .filter(position)
                .filter(policies::Column::Scope.eq(policy.scope.to_string()))
                .filter(policies::Column::Spread.eq(policy.spread.as_str()))
                .filter(policies::Column::Effect.eq(policy.effect.as_str()))
                .filter(policies::Column::Inherit.eq(policy.inherit))
        }
    };
    let existing = query.one(db).await?;

    let row = match existing {
        Some(current) => {
            policy.id = current.id;
            policy_to_active(&policy, current.created_at).update(db).await?
        }
        None => policy_to_active(&policy, now()).insert(db).await?,
    };
    info!(policy = %row.id, scope = %row.scope, "policy upserted");
    Ok(policy_from_row(row)?)
}

/// Deletes every policy at `scope`, optionally only those bound to `position`.
#[instrument(skip(db))]
pub async fn delete_policies(
    db: &DbPool,
    scope: &HierarchyPath,
    position: Option<&str>,
) -> DbResult<u64> {
    let mut query =
        policies::Entity::delete_many().filter(policies::Column::Scope.eq(scope.to_string()));
    if let Some(position) = position {
        query = query.filter(policies::Column::PositionKey.eq(position));
    }
    let result = query.exec(db).await?;
    info!(deleted = result.rows_affected, "policies deleted");
    Ok(result.rows_affected)
}

/// Creates or updates the membership keyed by `(principal, org_path, position)`.
#[instrument(skip(db))]
pub async fn upsert_membership(
    db: &DbPool,
    principal: &PrincipalId,
    org_path: &HierarchyPath,
    position: &str,
    active: bool,
) -> DbResult<Membership> {
    let existing = find_membership(db, principal, org_path, position).await?;
    let row = match existing {
        Some(current) => {
            let mut model: memberships::ActiveModel = current.into();
            model.active = Set(active);
            model.update(db).await?
        }
        None => {
            memberships::ActiveModel {
                id: Set(Uuid::new_v4()),
                principal_id: Set(principal.as_str().to_owned()),
                org_path: Set(org_path.to_string()),
                position_key: Set(position.trim().to_owned()),
                active: Set(active),
                created_at: Set(now()),
            }
            .insert(db)
            .await?
        }
    };
    Ok(membership_from_row(row)?)
}

/// Marks a membership inactive; `None` when it does not exist.
pub async fn deactivate_membership(
    db: &DbPool,
    principal: &PrincipalId,
    org_path: &HierarchyPath,
    position: &str,
) -> DbResult<Option<Membership>> {
    if find_membership(db, principal, org_path, position).await?.is_none() {
        return Ok(None);
    }
    upsert_membership(db, principal, org_path, position, false)
        .await
        .map(Some)
}

async fn find_membership(
    db: &DbPool,
    principal: &PrincipalId,
    org_path: &HierarchyPath,
    position: &str,
) -> DbResult<Option<memberships::Model>> {
    Ok(memberships::Entity::find()
        .filter(memberships::Column::PrincipalId.eq(principal.as_str()))
        .filter(memberships::Column::OrgPath.eq(org_path.to_string()))
        .filter(memberships::Column::PositionKey.eq(position.trim()))
        .one(db)
        .await?)
}

#[cfg(test)]
mod tests {
    use platform_authz::{Effect, PolicyError, Spread};

    use super::*;
    use crate::{DbError, testing::sqlite_pool};

    fn path(raw: &str) -> HierarchyPath {
        HierarchyPath::parse(raw).unwrap()
    }

    fn head_draft(spread: &str, actions: &[&str]) -> PolicyDraft {
        PolicyDraft {
            scope: "/faculty/".into(),
            position_key: Some("head".into()),
            spread: Some(spread.into()),
            actions: actions.iter().map(|a| a.to_string()).collect(),
            ..PolicyDraft::default()
        }
    }

    #[tokio::test]
    async fn create_rejects_unknown_effect_before_writing() {
        let db = sqlite_pool().await;
        let mut draft = head_draft("exact", &["post:create"]);
        draft.effect = Some("permit".into());
        let err = create_policy(&db, draft).await.unwrap_err();
        assert!(matches!(
            err,
            DbError::InvalidPolicy(PolicyError::UnknownEffect(_))
        ));
        assert!(err.is_client_error());
        assert!(list_policies(&db, None, None).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn create_round_trips_through_storage() {
        let db = sqlite_pool().await;
        let created = create_policy(&db, head_draft("subtree", &["event:create", "post:*"]))
            .await
            .unwrap();
        let listed = list_policies(&db, Some(&path("/faculty")), Some("head"))
            .await
            .unwrap();
        assert_eq!(listed, vec![created]);
        assert_eq!(listed[0].spread, Spread::Subtree);
        assert_eq!(listed[0].effect, Effect::Allow);
    }

    #[tokio::test]
    async fn upsert_replaces_matching_policy() {
        let db = sqlite_pool().await;
        let first = upsert_policy(&db, head_draft("subtree", &["event:create"]))
            .await
            .unwrap();
        let second = upsert_policy(&db, head_draft("subtree", &["event:create", "post:create"]))
            .await
            .unwrap();
        assert_eq!(first.id, second.id);
        assert_eq!(second.actions.len(), 2);

        upsert_policy(&db, head_draft("exact", &["post:moderate"]))
            .await
            .unwrap();
        assert_eq!(list_policies(&db, None, None).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn upsert_keeps_allow_and_deny_side_by_side() {
        let db = sqlite_pool().await;
        let allow = upsert_policy(&db, head_draft("exact", &["post:*"]))
            .await
            .unwrap();
        let mut deny = head_draft("exact", &["post:moderate"]);
        deny.effect = Some("deny".into());
        let deny = upsert_policy(&db, deny).await.unwrap();
        assert_ne!(allow.id, deny.id);

        let mut inherited = head_draft("exact", &["post:create"]);
        inherited.inherit = true;
        upsert_policy(&db, inherited).await.unwrap();

        let listed = list_policies(&db, Some(&path("/faculty")), Some("head"))
            .await
            .unwrap();
        assert_eq!(listed.len(), 3);
        assert!(listed.iter().any(|p| p.effect == Effect::Allow && !p.inherit));
        assert!(listed.iter().any(|p| p.effect == Effect::Deny));
        assert!(listed.iter().any(|p| p.inherit));
    }

    #[tokio::test]
    async fn keyed_upsert_replaces_by_key() {
        let db = sqlite_pool().await;
        let mut first = head_draft("exact", &["post:create"]);
        first.key = Some("faculty-head-posts".into());
        let first = upsert_policy(&db, first).await.unwrap();

        let mut second = head_draft("subtree", &["post:create"]);
        second.key = Some("faculty-head-posts".into());
        second.effect = Some("deny".into());
        let second = upsert_policy(&db, second).await.unwrap();

        assert_eq!(first.id, second.id);
        assert_eq!(second.effect, Effect::Deny);
        assert_eq!(list_policies(&db, None, None).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn delete_scopes_by_position() {
        let db = sqlite_pool().await;
        create_policy(&db, head_draft("exact", &["post:create"]))
            .await
            .unwrap();
        let mut staff = head_draft("exact", &["post:create"]);
        staff.position_key = Some("staff".into());
        create_policy(&db, staff).await.unwrap();

        assert_eq!(
            delete_policies(&db, &path("/faculty"), Some("head")).await.unwrap(),
            1
        );
        assert_eq!(delete_policies(&db, &path("/other"), None).await.unwrap(), 0);
        assert_eq!(delete_policies(&db, &path("/faculty"), None).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn memberships_upsert_and_deactivate() {
        let db = sqlite_pool().await;
        let u = PrincipalId::parse("u").unwrap();
        let created = upsert_membership(&db, &u, &path("/faculty/cs"), "head", true)
            .await
            .unwrap();
        assert!(created.active);

        let again = upsert_membership(&db, &u, &path("/faculty/cs/"), "head", true)
            .await
            .unwrap();
        assert_eq!(again, created);

        let deactivated = deactivate_membership(&db, &u, &path("/faculty/cs"), "head")
            .await
            .unwrap()
            .unwrap();
        assert!(!deactivated.active);
        assert!(
            deactivate_membership(&db, &u, &path("/faculty/ee"), "head")
                .await
                .unwrap()
                .is_none()
        );
    }
}
