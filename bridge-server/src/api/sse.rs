//! Authenticated server-sent event sessions
//!
//! `GET /sse` opens a stream owned by the bearer's subject. The first event names the URL
//! to post messages to; replies from the protocol server follow as `message` events.

use crate::api::extract::{JsonBody, QueryParams};
use crate::auth::AuthInfo;
use crate::errors::ApiError;
use crate::openapi::SESSION_TAG;
use crate::protocol::{serve_session, SessionContext};
use crate::state::AppState;
use axum::{
    extract::State,
    http::StatusCode,
    response::sse::{Event, KeepAlive, KeepAliveStream, Sse},
    routing::post,
    Extension,
};
use futures::stream::{self, BoxStream, Stream, StreamExt};
use log::{debug, error, info, warn};
use serde::Deserialize;
use serde_json::Value;
use sse_session::{SessionError, SessionGuard};
use std::convert::Infallible;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use tokio_stream::wrappers::ReceiverStream;
use utoipa::IntoParams;
use utoipa_axum::{router::OpenApiRouter, routes};

/// Event stream that deregisters its session when dropped
pub struct SessionStream {
    inner: BoxStream<'static, Result<Event, Infallible>>,
    _guard: SessionGuard<SessionContext>,
}

impl Stream for SessionStream {
    type Item = Result<Event, Infallible>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.inner.poll_next_unpin(cx)
    }
}

/// Opens a session stream
#[utoipa::path(
    get,
    path = "/sse",
    responses(
        (status = 200, description = "Event stream", content_type = "text/event-stream"),
        (status = 401, description = "Missing or invalid bearer token")
    ),
    security(("bearer" = [])),
    tag = SESSION_TAG
)]
pub async fn open_stream(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthInfo>,
) -> Result<Sse<KeepAliveStream<SessionStream>>, ApiError> {
    let subject = auth.subject_id.clone();
    let (transport, channels) = state.sessions.create_transport(&state.config.sse.endpoint);
    transport
        .attach_context(SessionContext::new(auth))
        .map_err(session_error)?;
    let transport = state.sessions.insert(transport).map_err(session_error)?;
    let guard = state.sessions.guard(transport.session_id());

    tokio::spawn(serve_session(
        Arc::clone(&state.protocol),
        Arc::clone(&transport),
        channels.inbound,
    ));

    let endpoint = Event::default()
        .event("endpoint")
        .data(transport.endpoint_url());
    let messages = ReceiverStream::new(channels.outbound)
        .map(|message| Event::default().event("message").data(message.to_string()));
    let inner = stream::once(async move { endpoint })
        .chain(messages)
        .map(Ok)
        .take_until(transport.shutdown_token().cancelled_owned())
        .boxed();

    info!(
        "Opened session {} for subject {}",
        transport.session_id(),
        subject
    );
    Ok(Sse::new(SessionStream {
        inner,
        _guard: guard,
    })
    .keep_alive(KeepAlive::new().interval(state.config.sse.keep_alive_interval())))
}

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct MessageQuery {
    /// Session id announced in the stream's `endpoint` event
    #[serde(rename = "sessionId")]
    #[param(rename = "sessionId")]
    pub session_id: Option<String>,
}

/// Routes a message to an open session
#[utoipa::path(
    post,
    path = "/message",
    params(MessageQuery),
    request_body = Value,
    responses(
        (status = 202, description = "Message accepted"),
        (status = 401, description = "Missing or invalid bearer token"),
        (status = 403, description = "Session belongs to a different subject"),
        (status = 404, description = "Session not found"),
        (status = 429, description = "Too many messages pending for the session")
    ),
    security(("bearer" = [])),
    tag = SESSION_TAG
)]
pub async fn post_message(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthInfo>,
    QueryParams(query): QueryParams<MessageQuery>,
    JsonBody(message): JsonBody<Value>,
) -> Result<StatusCode, ApiError> {
    let session_id = query
        .session_id
        .filter(|id| !id.is_empty())
        .ok_or_else(|| ApiError::bad_request("Missing sessionId"))?;

    let transport = state
        .sessions
        .get(&session_id)
        .ok_or_else(|| ApiError::not_found("Session not found"))?;

    let owner = transport
        .context()
        .map(|context| context.auth.subject_id.as_str());
    if owner != Some(auth.subject_id.as_str()) {
        warn!(
            "Subject {} posted to session {} owned by someone else",
            auth.subject_id, session_id
        );
        return Err(ApiError::forbidden("Session belongs to a different subject"));
    }

    match transport.handle_post_message(message) {
        Ok(()) => Ok(StatusCode::ACCEPTED),
        Err(SessionError::Closed(_)) => {
            debug!("Session {} closed while routing", session_id);
            Err(ApiError::not_found("Session not found"))
        }
        Err(SessionError::Backlogged(_)) => {
            warn!("Session {} is not keeping up, refusing message", session_id);
            Err(ApiError::new(
                "Too many pending messages",
                StatusCode::TOO_MANY_REQUESTS,
            ))
        }
        Err(e) => Err(session_error(e)),
    }
}

fn session_error(e: SessionError) -> ApiError {
    error!("Session bookkeeping failed: {}", e);
    ApiError::internal("Failed to open session")
}

/// Session routes; the message path follows `BRIDGE_SSE__ENDPOINT`
pub(super) fn router(state: &AppState) -> OpenApiRouter<AppState> {
    OpenApiRouter::new()
        .routes(routes!(open_stream))
        .route(&state.config.sse.endpoint, post(post_message))
}

#[cfg(test)]
mod tests {
    use crate::test_utils::{TestFixture, OTHER_TOKEN, TEST_TOKEN};
    use axum::body::Body;
    use http::{Method, Request, StatusCode};
    use http_body_util::BodyExt;
    use serde_json::{json, Value};
    use std::time::Duration;

    async fn open(fixture: &TestFixture, token: &str) -> (Body, String) {
        let request = Request::builder()
            .uri("/sse")
            .header("Authorization", format!("Bearer {token}"))
            .body(Body::empty())
            .unwrap();
        let response = fixture.send_raw(request).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()["content-type"], "text/event-stream");

        let mut body = response.into_body();
        let event = next_event(&mut body).await.expect("stream ended");
        assert_eq!(event_name(&event), Some("endpoint"));
        let endpoint = event_data(&event).to_string();
        assert!(endpoint.starts_with("/message?sessionId="));
        (body, endpoint)
    }

    async fn next_event(body: &mut Body) -> Option<String> {
        let frame = tokio::time::timeout(Duration::from_secs(2), body.frame())
            .await
            .expect("timed out waiting for an event")?
            .unwrap();
        Some(String::from_utf8(frame.into_data().unwrap().to_vec()).unwrap())
    }

    fn event_name(event: &str) -> Option<&str> {
        event.lines().find_map(|line| line.strip_prefix("event: "))
    }

    fn event_data(event: &str) -> &str {
        event
            .lines()
            .find_map(|line| line.strip_prefix("data: "))
            .unwrap_or_default()
    }

    async fn post(
        fixture: &TestFixture,
        endpoint: &str,
        token: &str,
        message: Value,
    ) -> StatusCode {
        let request = Request::builder()
            .method(Method::POST)
            .uri(endpoint)
            .header("Authorization", format!("Bearer {token}"))
            .header("Content-Type", "application/json")
            .body(Body::from(message.to_string()))
            .unwrap();
        fixture.send(request).await.status
    }

    #[tokio::test]
    async fn test_open_requires_bearer_token() {
        let fixture = TestFixture::new().await;
        let request = Request::builder().uri("/sse").body(Body::empty()).unwrap();

        let response = fixture.send(request).await;
        response.assert_status(StatusCode::UNAUTHORIZED);
        assert_eq!(response.json, json!({"error": "Missing bearer token"}));
        assert!(fixture.state.sessions.is_empty());
    }

    #[tokio::test]
    async fn test_message_round_trip() {
        let fixture = TestFixture::new().await;
        let (mut body, endpoint) = open(&fixture, TEST_TOKEN).await;
        assert_eq!(fixture.state.sessions.len(), 1);

        let status = post(
            &fixture,
            &endpoint,
            TEST_TOKEN,
            json!({"jsonrpc": "2.0", "id": 1, "method": "whoami"}),
        )
        .await;
        assert_eq!(status, StatusCode::ACCEPTED);

        let event = next_event(&mut body).await.unwrap();
        assert_eq!(event_name(&event), Some("message"));
        let reply: Value = serde_json::from_str(event_data(&event)).unwrap();
        assert_eq!(reply["id"], 1);
        assert_eq!(reply["result"]["subject"], "test-user");
        assert_eq!(fixture.state.sessions.stats().routed_messages(), 1);
    }

    #[tokio::test]
    async fn test_messages_reach_only_their_session() {
        let fixture = TestFixture::new().await;
        let (mut a, a_endpoint) = open(&fixture, TEST_TOKEN).await;
        let (mut b, b_endpoint) = open(&fixture, TEST_TOKEN).await;
        assert_ne!(a_endpoint, b_endpoint);

        let status = post(
            &fixture,
            &a_endpoint,
            TEST_TOKEN,
            json!({"jsonrpc": "2.0", "id": "for-a", "method": "ping"}),
        )
        .await;
        assert_eq!(status, StatusCode::ACCEPTED);

        let event = next_event(&mut a).await.unwrap();
        assert!(event_data(&event).contains("for-a"));
        let nothing = tokio::time::timeout(Duration::from_millis(100), b.frame()).await;
        assert!(nothing.is_err(), "session b must not receive a's reply");
    }

    #[tokio::test]
    async fn test_post_from_other_subject_is_forbidden() {
        let fixture = TestFixture::new().await;
        let (_body, endpoint) = open(&fixture, TEST_TOKEN).await;

        let request = Request::builder()
            .method(Method::POST)
            .uri(&endpoint)
            .header("Authorization", format!("Bearer {OTHER_TOKEN}"))
            .header("Content-Type", "application/json")
            .body(Body::from(json!({"jsonrpc": "2.0", "method": "ping"}).to_string()))
            .unwrap();
        let response = fixture.send(request).await;
        response.assert_status(StatusCode::FORBIDDEN);
        assert_eq!(
            response.json,
            json!({"error": "Session belongs to a different subject"})
        );
    }

    #[tokio::test]
    async fn test_unknown_and_missing_session() {
        let fixture = TestFixture::new().await;

        let response = fixture.post("/message?sessionId=nope", &json!({})).await;
        response.assert_status(StatusCode::NOT_FOUND);
        assert_eq!(response.json, json!({"error": "Session not found"}));

        let response = fixture.post("/message", &json!({})).await;
        response.assert_status(StatusCode::BAD_REQUEST);
        assert_eq!(response.json, json!({"error": "Missing sessionId"}));
    }

    #[tokio::test]
    async fn test_malformed_message_gets_json_error() {
        let fixture = TestFixture::new().await;
        let (_body, endpoint) = open(&fixture, TEST_TOKEN).await;

        let request = fixture
            .request_builder(Method::POST, &endpoint)
            .header("Content-Type", "application/json")
            .body(Body::from("{not json"))
            .unwrap();
        let response = fixture.send(request).await;
        response.assert_status(StatusCode::BAD_REQUEST);
        assert_eq!(response.header("content-type"), Some("application/json"));
        assert_eq!(response.json["error"], "invalid_request");
        assert!(response.json["error_description"].is_string());
    }

    #[tokio::test]
    async fn test_stalled_session_refuses_posts() {
        let fixture = TestFixture::with_config(|config| {
            config.sse.channel_capacity = 1;
            config.sse.inbound_capacity = 1;
        })
        .await;
        // The stream is opened but never read past the endpoint event
        let (_body, endpoint) = open(&fixture, TEST_TOKEN).await;

        let mut statuses = vec![];
        for id in 0..10 {
            let message = json!({"jsonrpc": "2.0", "id": id, "method": "ping"});
            let status = post(&fixture, &endpoint, TEST_TOKEN, message).await;
            statuses.push(status);
            if status != StatusCode::ACCEPTED {
                break;
            }
        }

        assert_eq!(statuses.last(), Some(&StatusCode::TOO_MANY_REQUESTS));
        assert!(statuses.len() <= 4, "queue did not fill: {statuses:?}");
    }

    #[tokio::test]
    async fn test_disconnect_removes_session() {
        let fixture = TestFixture::new().await;
        let (body, endpoint) = open(&fixture, TEST_TOKEN).await;

        drop(body);
        assert!(fixture.state.sessions.is_empty());
        assert_eq!(fixture.state.sessions.stats().closed(), 1);

        let status = post(&fixture, &endpoint, TEST_TOKEN, json!({})).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_explicit_close_ends_stream() {
        let fixture = TestFixture::new().await;
        let (mut body, endpoint) = open(&fixture, TEST_TOKEN).await;
        let session_id = endpoint.trim_start_matches("/message?sessionId=");

        assert!(fixture.state.sessions.remove(session_id).is_some());
        assert!(next_event(&mut body).await.is_none());
        // Closing again is a no-op
        assert!(fixture.state.sessions.remove(session_id).is_none());
    }
}
