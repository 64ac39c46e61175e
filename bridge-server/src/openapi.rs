use utoipa::openapi::security::{Http, HttpAuthScheme, SecurityScheme};
use utoipa::{Modify, OpenApi};

pub(crate) const HEALTH_TAG: &str = "Health API";
pub(crate) const OAUTH_TAG: &str = "OAuth API";
pub(crate) const SESSION_TAG: &str = "Session API";

#[derive(OpenApi)]
#[openapi(
    paths(crate::api::sse::post_message),
    modifiers(&BearerAuth),
    tags(
        (name = HEALTH_TAG, description = "Health check endpoints"),
        (name = OAUTH_TAG, description = "OAuth 2.0 authorization server endpoints"),
        (name = SESSION_TAG, description = "Authenticated server-sent event sessions"),
    ),
    info(
        title = "IdP Bridge",
        description = "OAuth 2.0 authorization server backed by an external identity provider",
        version = "0.1.0"
    )
)]
pub(crate) struct ApiDoc;

/// Registers the `bearer` scheme referenced by the session endpoints
struct BearerAuth;

impl Modify for BearerAuth {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        let components = openapi.components.get_or_insert_with(Default::default);
        components.add_security_scheme(
            "bearer",
            SecurityScheme::Http(Http::new(HttpAuthScheme::Bearer)),
        );
    }
}
