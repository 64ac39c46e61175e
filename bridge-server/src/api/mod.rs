mod authn_middleware;
mod extract;
pub(crate) mod health;
pub(crate) mod oauth;
pub(crate) mod sse;

use crate::api::authn_middleware::authentication_middleware;
use crate::state::AppState;
use axum::middleware;
use utoipa_axum::router::OpenApiRouter;

/// Combines all API routes into a single router
pub(super) fn router(state: &AppState) -> OpenApiRouter<AppState> {
    OpenApiRouter::new()
        .merge(health::router())
        .merge(oauth::router())
        .merge(protected_routes(state))
}

/// Routes that require a bearer token issued by the identity provider
fn protected_routes(state: &AppState) -> OpenApiRouter<AppState> {
    sse::router(state).layer(middleware::from_fn_with_state(
        state.clone(),
        authentication_middleware,
    ))
}
