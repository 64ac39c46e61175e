use crate::{SessionError, SessionStats};
use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};
use log::debug;
use rand::Rng;
use serde_json::Value;
use std::sync::{Arc, OnceLock};
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tokio_util::sync::{CancellationToken, WaitForCancellationFuture};

#[derive(Debug, Clone)]
pub struct SessionOptions {
    /// Number of outbound messages buffered per session before `send` waits (default: 64)
    pub channel_capacity: usize,
    /// Number of posted messages queued per session before posts are refused (default: 64)
    pub inbound_capacity: usize,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            channel_capacity: 64,
            inbound_capacity: 64,
        }
    }
}

/// Receiving halves handed to the owner of the stream when a transport is created.
#[derive(Debug)]
pub struct SessionChannels {
    /// Messages to write to the client, in order
    pub outbound: mpsc::Receiver<Value>,
    /// Messages posted by the client, for the protocol server
    pub inbound: mpsc::Receiver<Value>,
}

/// One open server-push connection.
///
/// The context is attached once, right after the connection is accepted and before
/// the transport is registered. Later writes are rejected so a session can never
/// change owner while it is open.
#[derive(Debug)]
pub struct SessionTransport<C> {
    session_id: String,
    /// Path clients post messages to
    endpoint: String,
    context: OnceLock<C>,
    outbound: mpsc::Sender<Value>,
    inbound: mpsc::Sender<Value>,
    shutdown_token: CancellationToken,
    stats: Arc<SessionStats>,
}

impl<C> SessionTransport<C> {
    /// Creates a transport with a fresh session id.
    ///
    /// # Arguments
    /// * `endpoint` - The path clients post messages to.
    /// * `opt` - Channel sizing.
    pub fn new(endpoint: impl Into<String>, opt: &SessionOptions) -> (Self, SessionChannels) {
        Self::with_stats(endpoint, opt, Arc::new(SessionStats::new()))
    }

    pub(crate) fn with_stats(
        endpoint: impl Into<String>,
        opt: &SessionOptions,
        stats: Arc<SessionStats>,
    ) -> (Self, SessionChannels) {
        let (outbound_tx, outbound_rx) = mpsc::channel(opt.channel_capacity.max(1));
        let (inbound_tx, inbound_rx) = mpsc::channel(opt.inbound_capacity.max(1));

        let transport = Self {
            session_id: generate_session_id(),
            endpoint: endpoint.into(),
            context: OnceLock::new(),
            outbound: outbound_tx,
            inbound: inbound_tx,
            shutdown_token: CancellationToken::new(),
            stats,
        };
        let channels = SessionChannels {
            outbound: outbound_rx,
            inbound: inbound_rx,
        };
        (transport, channels)
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    /// The URL clients use to post messages to this session
    pub fn endpoint_url(&self) -> String {
        let separator = if self.endpoint.contains('?') { '&' } else { '?' };
        format!("{}{}sessionId={}", self.endpoint, separator, self.session_id)
    }

    /// Attaches the per-connection context. Fails if one is already attached.
    pub fn attach_context(&self, context: C) -> Result<(), SessionError> {
        self.context
            .set(context)
            .map_err(|_| SessionError::ContextAlreadyAttached(self.session_id.clone()))
    }

    pub fn context(&self) -> Option<&C> {
        self.context.get()
    }

    /// Queues a message for delivery to the client.
    pub async fn send(&self, message: Value) -> Result<(), SessionError> {
        if self.is_closed() {
            return Err(SessionError::Closed(self.session_id.clone()));
        }
        self.outbound
            .send(message)
            .await
            .map_err(|_| SessionError::Closed(self.session_id.clone()))
    }

    /// Hands a message posted by the client to the protocol server.
    ///
    /// Fails with [`SessionError::Backlogged`] when the protocol server has fallen
    /// `inbound_capacity` messages behind, e.g. because the client stopped reading.
    pub fn handle_post_message(&self, message: Value) -> Result<(), SessionError> {
        if self.is_closed() {
            return Err(SessionError::Closed(self.session_id.clone()));
        }
        self.inbound.try_send(message).map_err(|e| match e {
            TrySendError::Full(_) => SessionError::Backlogged(self.session_id.clone()),
            TrySendError::Closed(_) => SessionError::Closed(self.session_id.clone()),
        })?;
        self.stats.increment_routed_messages();
        debug!("Routed message to session {}", self.session_id);
        Ok(())
    }

    /// Signals the stream to end. Calling it more than once has no effect.
    pub fn close(&self) {
        if !self.shutdown_token.is_cancelled() {
            debug!("Closing session {}", self.session_id);
            self.shutdown_token.cancel();
        }
    }

    pub fn is_closed(&self) -> bool {
        self.shutdown_token.is_cancelled()
    }

    /// Resolves once the session has been closed
    pub fn closed(&self) -> WaitForCancellationFuture<'_> {
        self.shutdown_token.cancelled()
    }

    /// A token that is cancelled when the session closes, for use in spawned tasks
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown_token.clone()
    }
}

/// Generates a URL-safe session id from 32 random bytes
fn generate_session_id() -> String {
    let mut rng = rand::thread_rng();
    let bytes: Vec<u8> = (0..32).map(|_| rng.r#gen()).collect();
    URL_SAFE_NO_PAD.encode(bytes)
}
