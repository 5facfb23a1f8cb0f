use std::{
    net::{IpAddr, SocketAddr},
    sync::Arc,
};

use anyhow::Context;
use async_graphql_axum::{GraphQLRequest, GraphQLResponse};
use axum::{
    Json, Router,
    extract::{Query, State},
    http::{self, HeaderMap, HeaderName, HeaderValue, Method, StatusCode},
    response::IntoResponse,
    routing::{get, post},
};
use platform_api::{ApiError, ApiResult};
use platform_authz::{
    ABILITIES_VERSION, AbilityMap, HierarchyPath, Policy, PolicyContext, PolicyDraft, PolicyEngine,
    PrincipalId, parse_action_list,
};
use platform_db::{self, DbError, DbPool};
use serde::{Deserialize, Serialize};
use tower::ServiceBuilder;
use tower_http::{
    cors::{AllowOrigin, CorsLayer},
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::TraceLayer,
};
use tracing::{info, warn};

use crate::{
    config::AppConfig,
    graphql::{RequestPrincipal, SchemaType},
};

const MANAGE_ACTION: &str = "policy:manage";
const MANAGE_RESOURCE: &str = "policy";

#[derive(Clone)]
pub struct AppState {
    pub pool: DbPool,
    pub engine: Arc<PolicyEngine>,
    pub schema: SchemaType,
    pub config: Arc<AppConfig>,
}

#[derive(Clone, Debug)]
pub struct ServeConfig {
    addr: SocketAddr,
}

impl ServeConfig {
    pub fn new(host: IpAddr, port: u16) -> Self {
        Self {
            addr: SocketAddr::from((host, port)),
        }
    }
}

pub async fn serve(config: ServeConfig, state: AppState) -> anyhow::Result<()> {
    let router = build_router(state);
    let listener = tokio::net::TcpListener::bind(config.addr)
        .await
        .with_context(|| format!("failed to bind {}", config.addr))?;

    info!(%config.addr, "policy server listening");
    axum::serve(listener, router.into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("HTTP server error")?;
    Ok(())
}

fn cors_layer(origins: &[String], principal_header: &HeaderName) -> CorsLayer {
    let allowed = origins
        .iter()
        .filter_map(|origin| origin.parse::<HeaderValue>().ok())
        .collect::<Vec<_>>();
    let layer = CorsLayer::new()
        .allow_headers([http::header::CONTENT_TYPE, principal_header.clone()])
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE]);
    // credentials cannot be combined with a wildcard origin
    if allowed.is_empty() {
        layer.allow_origin(AllowOrigin::any())
    } else {
        layer
            .allow_credentials(true)
            .allow_origin(AllowOrigin::list(allowed))
    }
}

pub fn build_router(state: AppState) -> Router {
    let request_id = MakeRequestUuid;
    let header_name = HeaderName::from_static("x-request-id");
    let cors = cors_layer(
        &state.config.cors_allowed_origins,
        &state.config.principal_header,
    );
    Router::new()
        .route("/health", get(health_handler))
        .route("/abilities", get(abilities_handler))
        .route("/abilities/where", get(where_handler))
        .route("/can", get(can_handler))
        .route(
            "/policies",
            get(list_policies_handler)
                .post(create_policy_handler)
                .put(upsert_policy_handler)
                .delete(delete_policies_handler),
        )
        .route("/graphql", post(graphql_handler))
        .layer(
            ServiceBuilder::new()
                .layer(SetRequestIdLayer::new(header_name.clone(), request_id))
                .layer(PropagateRequestIdLayer::new(header_name))
                .layer(TraceLayer::new_for_http())
                .layer(cors),
        )
        .with_state(state)
}

/// Reads the identity the upstream gateway asserted for this request.
pub fn principal_from_headers(headers: &HeaderMap, name: &HeaderName) -> Option<PrincipalId> {
    headers
        .get(name)
        .and_then(|value| value.to_str().ok())
        .and_then(PrincipalId::parse)
}

fn require_principal(state: &AppState, headers: &HeaderMap) -> ApiResult<PrincipalId> {
    principal_from_headers(headers, &state.config.principal_header).ok_or(ApiError::Unauthorized)
}

fn db_error(err: DbError) -> ApiError {
    if err.is_client_error() {
        ApiError::InvalidInput(err.to_string())
    } else {
        ApiError::internal(err.into())
    }
}

async fn health_handler(State(state): State<AppState>) -> impl IntoResponse {
    let db_ok = state.pool.ping().await.is_ok();
    Json(HealthResponse {
        ok: db_ok,
        db_ok,
        version: env!("CARGO_PKG_VERSION"),
    })
}

#[derive(Serialize)]
struct HealthResponse {
    ok: bool,
    db_ok: bool,
    version: &'static str,
}

#[derive(Deserialize)]
struct AbilitiesQuery {
    #[serde(default)]
    org_path: String,
    #[serde(default)]
    actions: Option<String>,
}

#[derive(Serialize)]
struct AbilitiesResponse {
    org_path: String,
    abilities: AbilityMap,
    version: &'static str,
}

async fn abilities_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(query): Query<AbilitiesQuery>,
) -> ApiResult<Json<AbilitiesResponse>> {
    let principal = require_principal(&state, &headers)?;
    let requested = query.actions.as_deref().map(parse_action_list);
    let result = state
        .engine
        .abilities(principal.as_str(), &query.org_path, requested.as_deref())
        .await?;
    Ok(Json(AbilitiesResponse {
        org_path: result.org_path.to_string(),
        abilities: result.abilities,
        version: ABILITIES_VERSION,
    }))
}

#[derive(Deserialize)]
struct WhereQuery {
    #[serde(default)]
    action: String,
}

#[derive(Serialize)]
struct OrgRef {
    org_path: String,
}

#[derive(Serialize)]
struct WhereResponse {
    action: String,
    orgs: Vec<OrgRef>,
    version: &'static str,
}

async fn where_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(query): Query<WhereQuery>,
) -> ApiResult<Json<WhereResponse>> {
    let principal = require_principal(&state, &headers)?;
    let orgs = state
        .engine
        .where_can_act(principal.as_str(), &query.action)
        .await?;
    Ok(Json(WhereResponse {
        action: query.action.trim().to_string(),
        orgs: orgs
            .into_iter()
            .map(|org| OrgRef {
                org_path: org.to_string(),
            })
            .collect(),
        version: ABILITIES_VERSION,
    }))
}

#[derive(Deserialize)]
struct CanQuery {
    #[serde(default)]
    org_path: String,
    #[serde(default)]
    action: String,
    #[serde(default)]
    resource: String,
}

#[derive(Serialize)]
struct CanResponse {
    allowed: bool,
}

async fn can_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(query): Query<CanQuery>,
) -> ApiResult<Json<CanResponse>> {
    let principal = require_principal(&state, &headers)?;
    let allowed = state
        .engine
        .can(
            principal.as_str(),
            &query.org_path,
            &query.action,
            &query.resource,
        )
        .await?;
    Ok(Json(CanResponse { allowed }))
}

/// Administration is itself a policy decision at the affected scope.
async fn authorize_manage(state: &AppState, principal: &PrincipalId, scope: &str) -> ApiResult<()> {
    let ctx = PolicyContext::parse(principal.as_str(), scope, MANAGE_ACTION, MANAGE_RESOURCE)?;
    state.engine.check(&ctx).await?;
    Ok(())
}

#[derive(Deserialize)]
struct PolicyQuery {
    #[serde(default)]
    scope: Option<String>,
    #[serde(default)]
    position: Option<String>,
}

impl PolicyQuery {
    fn scope(&self) -> ApiResult<Option<HierarchyPath>> {
        self.scope
            .as_deref()
            .map(HierarchyPath::parse)
            .transpose()
            .map_err(|err| ApiError::invalid(err.to_string()))
    }

    fn position(&self) -> Option<&str> {
        self.position
            .as_deref()
            .map(str::trim)
            .filter(|p| !p.is_empty())
    }
}

async fn list_policies_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(query): Query<PolicyQuery>,
) -> ApiResult<Json<Vec<Policy>>> {
    let principal = require_principal(&state, &headers)?;
    let scope = query.scope()?;
    let gate = scope.clone().unwrap_or_else(HierarchyPath::root);
    authorize_manage(&state, &principal, &gate.to_string()).await?;
    let policies = platform_db::list_policies(&state.pool, scope.as_ref(), query.position())
        .await
        .map_err(db_error)?;
    Ok(Json(policies))
}

async fn create_policy_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(draft): Json<PolicyDraft>,
) -> ApiResult<(StatusCode, Json<Policy>)> {
    let principal = require_principal(&state, &headers)?;
    authorize_manage(&state, &principal, &draft.scope).await?;
    let policy = platform_db::create_policy(&state.pool, draft)
        .await
        .map_err(db_error)?;
    info!(policy = %policy.id, by = %principal, "policy created over http");
    Ok((StatusCode::CREATED, Json(policy)))
}

async fn upsert_policy_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(draft): Json<PolicyDraft>,
) -> ApiResult<Json<Policy>> {
    let principal = require_principal(&state, &headers)?;
    authorize_manage(&state, &principal, &draft.scope).await?;
    let policy = platform_db::upsert_policy(&state.pool, draft)
        .await
        .map_err(db_error)?;
    Ok(Json(policy))
}

#[derive(Serialize)]
struct DeleteResponse {
    deleted: u64,
}

async fn delete_policies_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(query): Query<PolicyQuery>,
) -> ApiResult<Json<DeleteResponse>> {
    let principal = require_principal(&state, &headers)?;
    let scope = query
        .scope()?
        .ok_or_else(|| ApiError::invalid("scope is required"))?;
    authorize_manage(&state, &principal, &scope.to_string()).await?;
    let deleted = platform_db::delete_policies(&state.pool, &scope, query.position())
        .await
        .map_err(db_error)?;
    if deleted == 0 {
        return Err(ApiError::NotFound);
    }
    Ok(Json(DeleteResponse { deleted }))
}

async fn graphql_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    request: GraphQLRequest,
) -> GraphQLResponse {
    let principal = principal_from_headers(&headers, &state.config.principal_header);
    let request = request.into_inner().data(RequestPrincipal(principal));
    state.schema.execute(request).await.into()
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            warn!(error = %err, "failed to install CTRL+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{SignalKind, signal};

        match signal(SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(err) => {
                warn!(error = %err, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    ctrl_c.await;

    #[cfg(unix)]
    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    };
}
