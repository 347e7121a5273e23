use std::sync::Arc;

use axum::http::Method;
use axum::middleware;
use axum::Router;
use sqlx::SqlitePool;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::authz::{CachedRoleResolver, DecisionEngine, PolicyTable, RoleSource, SqlRoleSource};
use crate::config::GatewayConfig;
use crate::errors::AppError;
use crate::gateway::{self, TokenSource};
use crate::token::TokenVerifier;

/// Shared per-request state of the gateway middleware.
#[derive(Clone)]
pub struct GatewayState {
    pub engine: Arc<DecisionEngine>,
    pub token_source: Arc<TokenSource>,
    pub login_path: Arc<str>,
}

impl GatewayState {
    pub fn from_parts(
        verifier: TokenVerifier,
        source: Arc<dyn RoleSource>,
        config: GatewayConfig,
    ) -> Result<Self, AppError> {
        let policy = Arc::new(PolicyTable::new(config.rules)?);
        let resolver = Arc::new(CachedRoleResolver::new(
            source,
            config.cache_ttl,
            config.lookup_timeout,
        ));
        let engine = Arc::new(DecisionEngine::new(verifier, resolver, policy));

        Ok(Self {
            engine,
            token_source: Arc::new(config.token_source),
            login_path: config.login_path.into(),
        })
    }
}

/// Build the gateway in front of an upstream router, with the default
/// sqlx-backed role-membership source.
pub async fn create_app(
    pool: SqlitePool,
    config: GatewayConfig,
    upstream: Router,
) -> Result<Router, AppError> {
    let verifier = TokenVerifier::from_env()?;
    let source = Arc::new(SqlRoleSource::new(pool));
    let state = GatewayState::from_parts(verifier, source, config)?;

    Ok(gate(upstream, state))
}

/// Layer the policy gate, CORS and request tracing over an upstream router.
pub fn gate(upstream: Router, state: GatewayState) -> Router {
    let cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE, Method::OPTIONS])
        .allow_origin(Any)
        .allow_headers(Any);

    upstream
        .layer(middleware::from_fn_with_state(state, gateway::gateway_middleware))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
}
