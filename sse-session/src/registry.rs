use crate::{SessionChannels, SessionError, SessionOptions, SessionStats, SessionTransport};
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use log::info;
use std::sync::Arc;

/// Process-wide map from session id to open transport.
///
/// Cloning is cheap; all clones share the same map and statistics.
#[derive(Debug)]
pub struct SessionRegistry<C> {
    sessions: Arc<DashMap<String, Arc<SessionTransport<C>>>>,
    stats: Arc<SessionStats>,
    options: SessionOptions,
}

impl<C> Clone for SessionRegistry<C> {
    fn clone(&self) -> Self {
        Self {
            sessions: Arc::clone(&self.sessions),
            stats: Arc::clone(&self.stats),
            options: self.options.clone(),
        }
    }
}

impl<C> Default for SessionRegistry<C> {
    fn default() -> Self {
        Self::new(SessionOptions::default())
    }
}

impl<C> SessionRegistry<C> {
    pub fn new(options: SessionOptions) -> Self {
        Self {
            sessions: Arc::new(DashMap::new()),
            stats: Arc::new(SessionStats::new()),
            options,
        }
    }

    /// Creates an unregistered transport that reports into this registry's statistics.
    pub fn create_transport(
        &self,
        endpoint: impl Into<String>,
    ) -> (SessionTransport<C>, SessionChannels) {
        SessionTransport::with_stats(endpoint, &self.options, Arc::clone(&self.stats))
    }

    /// Registers a transport under its session id.
    ///
    /// The transport must already carry its context, so that no message can be routed
    /// to a session whose owner is unknown.
    pub fn insert(
        &self,
        transport: SessionTransport<C>,
    ) -> Result<Arc<SessionTransport<C>>, SessionError> {
        if transport.context().is_none() {
            return Err(SessionError::MissingContext(
                transport.session_id().to_string(),
            ));
        }

        // The entry holds a shard lock; nothing below may touch the map until it is dropped.
        let transport = match self.sessions.entry(transport.session_id().to_string()) {
            Entry::Occupied(entry) => {
                return Err(SessionError::DuplicateSession(entry.key().clone()));
            }
            Entry::Vacant(entry) => {
                let transport = Arc::new(transport);
                entry.insert(Arc::clone(&transport));
                transport
            }
        };

        self.stats.increment_opened();
        info!(
            "Session {} opened ({} open)",
            transport.session_id(),
            self.sessions.len()
        );
        Ok(transport)
    }

    pub fn get(&self, session_id: &str) -> Option<Arc<SessionTransport<C>>> {
        self.sessions
            .get(session_id)
            .map(|entry| Arc::clone(entry.value()))
    }

    pub fn contains(&self, session_id: &str) -> bool {
        self.sessions.contains_key(session_id)
    }

    /// Removes a session and closes its transport.
    ///
    /// Removing a session that is not registered is a no-op.
    pub fn remove(&self, session_id: &str) -> Option<Arc<SessionTransport<C>>> {
        let (_, transport) = self.sessions.remove(session_id)?;
        transport.close();
        self.stats.increment_closed();
        info!(
            "Session {} closed ({} open)",
            session_id,
            self.sessions.len()
        );
        Some(transport)
    }

    /// Closes every open session, e.g. on server shutdown
    pub fn close_all(&self) -> usize {
        let ids: Vec<String> = self
            .sessions
            .iter()
            .map(|entry| entry.key().clone())
            .collect();
        ids.iter()
            .filter(|id| self.remove(id).is_some())
            .count()
    }

    /// Returns a guard that removes the session when dropped
    pub fn guard(&self, session_id: impl Into<String>) -> SessionGuard<C> {
        SessionGuard {
            registry: self.clone(),
            session_id: session_id.into(),
        }
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    pub fn stats(&self) -> &SessionStats {
        &self.stats
    }
}

/// Deregisters a session when the stream that owns it goes away.
#[derive(Debug)]
pub struct SessionGuard<C> {
    registry: SessionRegistry<C>,
    session_id: String,
}

impl<C> SessionGuard<C> {
    pub fn session_id(&self) -> &str {
        &self.session_id
    }
}

impl<C> Drop for SessionGuard<C> {
    fn drop(&mut self) {
        self.registry.remove(&self.session_id);
    }
}
