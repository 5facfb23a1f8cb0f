use async_trait::async_trait;
use entity::{memberships, policies};
use platform_authz::{Membership, Policy, PolicyFilter, PolicyStore, PrincipalId, StoreError};
use sea_orm::{ColumnTrait, Condition, EntityTrait, QueryFilter, QueryOrder};
use tracing::{debug, instrument};

use crate::{
    DbPool,
    decode::{membership_from_row, policy_from_row},
};

/// [`PolicyStore`] over the `memberships` and `policies` tables.
///
/// Scope, position and enabled filters run in SQL; action matching needs wildcard
/// semantics and is applied after decoding.
#[derive(Clone, Debug)]
pub struct SeaOrmStore {
    db: DbPool,
}

impl SeaOrmStore {
    pub fn new(db: DbPool) -> Self {
        Self { db }
    }
}

#[async_trait]
impl PolicyStore for SeaOrmStore {
    #[instrument(name = "store.memberships", skip_all, fields(principal = %principal))]
    async fn find_active_memberships(
        &self,
        principal: &PrincipalId,
    ) -> Result<Vec<Membership>, StoreError> {
        let rows = memberships::Entity::find()
            .filter(memberships::Column::PrincipalId.eq(principal.as_str()))
            .filter(memberships::Column::Active.eq(true))
            .order_by_asc(memberships::Column::CreatedAt)
            .all(&self.db)
            .await
            .map_err(StoreError::backend)?;
        debug!(rows = rows.len(), "memberships loaded");
        rows.into_iter().map(membership_from_row).collect()
    }

    #[instrument(name = "store.policies", skip_all)]
    async fn find_policies(&self, filter: &PolicyFilter) -> Result<Vec<Policy>, StoreError> {
        let mut query = policies::Entity::find();
        if let Some(scopes) = &filter.scopes_in {
            query = query.filter(
                policies::Column::Scope.is_in(scopes.iter().map(ToString::to_string)),
            );
        }
        if let Some(positions) = &filter.positions_in {
            query = query.filter(
                Condition::any()
                    .add(policies::Column::PositionKey.is_in(positions.iter().cloned()))
                    .add(policies::Column::PositionKey.is_null()),
            );
        }
        if filter.enabled_only {
            query = query.filter(policies::Column::Enabled.eq(true));
        }
        let rows = query
            .order_by_asc(policies::Column::CreatedAt)
            .all(&self.db)
            .await
            .map_err(StoreError::backend)?;

        let mut out = Vec::with_capacity(rows.len());
        for row in rows {
            let policy = policy_from_row(row)?;
            if filter.accepts(&policy) {
                out.push(policy);
            }
        }
        debug!(rows = out.len(), "policies loaded");
        Ok(out)
    }
}
