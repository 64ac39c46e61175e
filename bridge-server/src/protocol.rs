//! Protocol server attached to each streaming session.
//!
//! Messages posted to a session are handed to a [`ProtocolServer`] together with the
//! session's context; replies are queued on the session's stream.

use crate::auth::AuthInfo;
use async_trait::async_trait;
use log::{debug, warn};
use serde_json::{json, Value};
use sse_session::SessionTransport;
use std::sync::Arc;
use tokio::sync::mpsc::Receiver;

const JSONRPC_VERSION: &str = "2.0";
const INVALID_REQUEST: i64 = -32600;
const METHOD_NOT_FOUND: i64 = -32601;

/// Per-session context, attached once when the stream is opened
#[derive(Debug, Clone)]
pub struct SessionContext {
    pub auth: AuthInfo,
}

impl SessionContext {
    pub fn new(auth: AuthInfo) -> Self {
        Self { auth }
    }
}

#[async_trait]
pub trait ProtocolServer: Send + Sync {
    /// Handles one posted message. Returns the reply to push on the stream, if any.
    async fn handle_message(&self, context: &SessionContext, message: Value) -> Option<Value>;
}

/// Minimal JSON-RPC responder: answers `ping` and `whoami`, rejects everything else
#[derive(Debug, Clone, Default)]
pub struct BasicProtocolServer;

#[async_trait]
impl ProtocolServer for BasicProtocolServer {
    async fn handle_message(&self, context: &SessionContext, message: Value) -> Option<Value> {
        let id = message.get("id").cloned();
        let Some(method) = message.get("method").and_then(Value::as_str) else {
            // Replies from the client carry a result or an error and are not answered
            if message.get("result").is_some() || message.get("error").is_some() {
                return None;
            }
            return id.map(|id| error_reply(id, INVALID_REQUEST, "Invalid Request"));
        };

        // Notifications are never answered
        let id = id?;

        debug!("Handling '{}' for subject {}", method, context.auth.subject_id);
        match method {
            "ping" => Some(result_reply(id, json!({}))),
            "whoami" => Some(result_reply(
                id,
                json!({
                    "subject": context.auth.subject_id,
                    "scopes": context.auth.scopes,
                    "expires_at": context.auth.expires_at,
                    "claims": context.auth.claims,
                }),
            )),
            _ => Some(error_reply(id, METHOD_NOT_FOUND, "Method not found")),
        }
    }
}

fn result_reply(id: Value, result: Value) -> Value {
    json!({"jsonrpc": JSONRPC_VERSION, "id": id, "result": result})
}

fn error_reply(id: Value, code: i64, message: &str) -> Value {
    json!({"jsonrpc": JSONRPC_VERSION, "id": id, "error": {"code": code, "message": message}})
}

/// Feeds a session's posted messages to the protocol server until the session closes
pub async fn serve_session(
    server: Arc<dyn ProtocolServer>,
    transport: Arc<SessionTransport<SessionContext>>,
    mut inbound: Receiver<Value>,
) {
    let Some(context) = transport.context().cloned() else {
        warn!(
            "Session {} has no context, not serving it",
            transport.session_id()
        );
        return;
    };

    loop {
        let message = tokio::select! {
            _ = transport.closed() => break,
            message = inbound.recv() => match message {
                Some(message) => message,
                None => break,
            },
        };

        if let Some(reply) = server.handle_message(&context, message).await {
            if let Err(e) = transport.send(reply).await {
                debug!("Dropping reply: {}", e);
                break;
            }
        }
    }
    debug!("Protocol loop for session {} finished", transport.session_id());
}
