pub mod config;
pub mod db;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod repository;
pub mod rpc;
pub mod services;

use axum::{
    http::{header, HeaderName, Method},
    middleware::{from_fn, from_fn_with_state},
    routing::{get, post},
    Json, Router,
};
use service_core::middleware::tracing::{request_id_middleware, REQUEST_ID_HEADER};
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use utoipa::{
    openapi::security::{ApiKey, ApiKeyValue, HttpAuthScheme, HttpBuilder, SecurityScheme},
    Modify, OpenApi,
};

use crate::config::{InviteConfig, SecurityConfig};
use crate::repository::Repository;
use crate::services::{
    AuthzService, InviteNotifier, InviteService, JwtService, OrgService, TokenService,
};

#[derive(OpenApi)]
#[openapi(
    paths(
        handlers::health::health_check,
        handlers::rpc::rpc,
        handlers::invites::create_invite,
        handlers::invites::view_invite,
        handlers::invites::revoke_invite,
        handlers::invites::accept_invite,
        handlers::invites::decline_invite,
        handlers::invites::list_sent,
        handlers::invites::list_received,
    ),
    components(schemas(
        handlers::invites::CreateInviteBody,
        models::OrgInvite,
        models::InviteState,
        models::OrgMembership,
        models::OrgRole,
    )),
    modifiers(&SecurityAddon),
    tags(
        (name = "Invites", description = "Org invite lifecycle"),
        (name = "RPC", description = "Internal RPC boundary, JSON mapping"),
        (name = "Observability", description = "Service health"),
    )
)]
pub struct ApiDoc;

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer_auth",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .build(),
                ),
            );
            components.add_security_scheme(
                "service_api_key",
                SecurityScheme::ApiKey(ApiKey::Header(ApiKeyValue::new(
                    middleware::SERVICE_API_KEY_HEADER,
                ))),
            );
        }
    }
}

/// Services shared by every handler. Cloning is cheap.
#[derive(Clone)]
pub struct AppState {
    pub repo: Arc<dyn Repository>,
    pub tokens: Arc<TokenService>,
    pub authz: Arc<AuthzService>,
    pub orgs: Arc<OrgService>,
    pub invites: Arc<InviteService>,
    pub security: Arc<SecurityConfig>,
}

impl AppState {
    /// Wire the service graph over one store.
    pub fn new(
        repo: Arc<dyn Repository>,
        jwt: JwtService,
        notifier: Arc<dyn InviteNotifier>,
        invite_config: InviteConfig,
        security: SecurityConfig,
    ) -> Self {
        let tokens = Arc::new(TokenService::new(repo.clone(), jwt));
        let authz = Arc::new(AuthzService::new(repo.clone(), tokens.clone()));
        let orgs = Arc::new(OrgService::new(
            repo.clone(),
            tokens.clone(),
            authz.clone(),
        ));
        let invites = Arc::new(InviteService::new(
            repo.clone(),
            tokens.clone(),
            authz.clone(),
            notifier,
            invite_config,
        ));

        Self {
            repo,
            tokens,
            authz,
            orgs,
            invites,
            security: Arc::new(security),
        }
    }
}

pub fn build_router(state: AppState) -> Router {
    // internal boundary, callable only with the shared service key
    let rpc_routes = Router::new()
        .route("/rpc", post(handlers::rpc::rpc))
        .layer(from_fn_with_state(
            state.clone(),
            middleware::service_auth_middleware,
        ));

    let invite_routes = Router::new()
        .route("/groups/:id/invites", post(handlers::invites::create_invite))
        .route(
            "/invites/:id",
            get(handlers::invites::view_invite).delete(handlers::invites::revoke_invite),
        )
        .route("/invites/:id/accept", post(handlers::invites::accept_invite))
        .route(
            "/invites/:id/decline",
            post(handlers::invites::decline_invite),
        )
        .route("/users/:id/invites/sent", get(handlers::invites::list_sent))
        .route(
            "/users/:id/invites/received",
            get(handlers::invites::list_received),
        );

    Router::new()
        .route("/health", get(handlers::health::health_check))
        .route(
            "/.well-known/openapi.json",
            get(|| async { Json(ApiDoc::openapi()) }),
        )
        .merge(rpc_routes)
        .merge(invite_routes)
        .with_state(state)
        .layer(TraceLayer::new_for_http().make_span_with(
            |request: &axum::http::Request<_>| {
                let request_id = request
                    .headers()
                    .get(REQUEST_ID_HEADER)
                    .and_then(|value| value.to_str().ok())
                    .unwrap_or("-");

                tracing::info_span!(
                    "http_request",
                    request_id = %request_id,
                    method = %request.method(),
                    uri = %request.uri(),
                    version = ?request.version(),
                )
            },
        ))
        .layer(from_fn(request_id_middleware))
        .layer(
            CorsLayer::new()
                .allow_methods([Method::GET, Method::POST, Method::DELETE, Method::OPTIONS])
                .allow_headers([
                    header::AUTHORIZATION,
                    header::CONTENT_TYPE,
                    HeaderName::from_static(REQUEST_ID_HEADER),
                ]),
        )
}
