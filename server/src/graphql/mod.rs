mod payload;

use std::sync::Arc;

use async_graphql::{
    Context, EmptyMutation, EmptySubscription, Error, ErrorExtensions, Object, Schema,
};
use platform_api::ApiError;
use platform_authz::{PolicyEngine, PrincipalId};
use tracing::instrument;

use payload::{AbilitiesPayload, HealthPayload, WherePayload};

pub type SchemaType = Schema<QueryRoot, EmptyMutation, EmptySubscription>;

/// Identity attached to each GraphQL request by the HTTP layer.
#[derive(Clone, Debug)]
pub struct RequestPrincipal(pub Option<PrincipalId>);

pub fn build_schema(engine: Arc<PolicyEngine>) -> SchemaType {
    Schema::build(QueryRoot, EmptyMutation, EmptySubscription)
        .data(engine)
        .finish()
}

#[derive(Default)]
pub struct QueryRoot;

fn engine(ctx: &Context<'_>) -> async_graphql::Result<Arc<PolicyEngine>> {
    ctx.data::<Arc<PolicyEngine>>()
        .cloned()
        .map_err(|_| ApiError::internal(anyhow::anyhow!("policy engine missing")).extend())
}

fn principal(ctx: &Context<'_>) -> async_graphql::Result<PrincipalId> {
    ctx.data::<RequestPrincipal>()
        .ok()
        .and_then(|p| p.0.clone())
        .ok_or_else(|| ApiError::Unauthorized.extend())
}

fn gql(err: impl Into<ApiError>) -> Error {
    err.into().extend()
}

#[Object]
impl QueryRoot {
    #[instrument(name = "graphql.health", skip_all)]
    async fn health(&self) -> HealthPayload {
        HealthPayload { ok: true }
    }

    #[instrument(name = "graphql.version", skip_all)]
    async fn version(&self) -> String {
        env!("CARGO_PKG_VERSION").to_string()
    }

    /// Which of `actions` the caller may perform at `orgPath`.
    #[instrument(name = "graphql.abilities", skip(self, ctx))]
    async fn abilities(
        &self,
        ctx: &Context<'_>,
        org_path: String,
        actions: Option<Vec<String>>,
    ) -> async_graphql::Result<AbilitiesPayload> {
        let principal = principal(ctx)?;
        let abilities = engine(ctx)?
            .abilities(principal.as_str(), &org_path, actions.as_deref())
            .await
            .map_err(gql)?;
        Ok(abilities.into())
    }

    #[instrument(name = "graphql.where_can_act", skip(self, ctx))]
    async fn where_can_act(
        &self,
        ctx: &Context<'_>,
        action: String,
    ) -> async_graphql::Result<WherePayload> {
        let principal = principal(ctx)?;
        let orgs = engine(ctx)?
            .where_can_act(principal.as_str(), &action)
            .await
            .map_err(gql)?;
        Ok(WherePayload::new(action.trim().to_string(), orgs))
    }

    #[instrument(name = "graphql.can", skip(self, ctx))]
    async fn can(
        &self,
        ctx: &Context<'_>,
        org_path: String,
        action: String,
        resource: String,
    ) -> async_graphql::Result<bool> {
        let principal = principal(ctx)?;
        engine(ctx)?
            .can(principal.as_str(), &org_path, &action, &resource)
            .await
            .map_err(gql)
    }
}
