//! Presence registry — live mapping of connected users to delivery channels
//!
//! Process-local, explicitly constructed and injected; one session is tracked
//! per user and a newer authenticate overwrites the previous mapping.

use dashmap::DashMap;
use tokio::sync::mpsc;
use tracing::debug;
use uuid::Uuid;

use super::events::LiveEvent;

/// Handle to one live connection
#[derive(Clone)]
pub struct Session {
    /// Identifier of this connection, used to detect stale disconnects
    pub connection_id: Uuid,
    sender: mpsc::UnboundedSender<LiveEvent>,
}

impl Session {
    /// Push an event to the connection, fire-and-forget.
    ///
    /// A closed receiver means the socket is gone; the event is dropped and
    /// the user catches up via the next-connect resync snapshot.
    pub fn push(&self, event: LiveEvent) {
        let _ = self.sender.send(event);
    }
}

/// Registry of currently-connected users
#[derive(Default)]
pub struct PresenceRegistry {
    sessions: DashMap<Uuid, Session>,
}

impl PresenceRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a user's live connection, overwriting any prior mapping.
    ///
    /// Returns the connection id the caller must hand back at disconnect.
    pub fn authenticate(&self, user_id: Uuid, sender: mpsc::UnboundedSender<LiveEvent>) -> Uuid {
        let connection_id = Uuid::new_v4();
        self.sessions.insert(
            user_id,
            Session {
                connection_id,
                sender,
            },
        );
        debug!(%user_id, %connection_id, "presence registered");
        connection_id
    }

    /// Remove a user's mapping, but only if it is still the given connection.
    ///
    /// A reconnect may have replaced the mapping already; removing blindly
    /// would tear down the newer session.
    pub fn disconnect(&self, user_id: Uuid, connection_id: Uuid) {
        let removed = self
            .sessions
            .remove_if(&user_id, |_, session| session.connection_id == connection_id);
        if removed.is_some() {
            debug!(%user_id, %connection_id, "presence removed");
        }
    }

    /// Look up a user's live session, if connected
    pub fn lookup(&self, user_id: Uuid) -> Option<Session> {
        self.sessions.get(&user_id).map(|entry| entry.clone())
    }

    /// Number of currently-connected users
    pub fn connected_count(&self) -> usize {
        self.sessions.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn channel() -> (
        mpsc::UnboundedSender<LiveEvent>,
        mpsc::UnboundedReceiver<LiveEvent>,
    ) {
        mpsc::unbounded_channel()
    }

    #[test]
    fn authenticate_then_lookup() {
        let registry = PresenceRegistry::new();
        let user = Uuid::new_v4();
        let (tx, _rx) = channel();

        let conn = registry.authenticate(user, tx);

        let session = registry.lookup(user).expect("user should be present");
        assert_eq!(session.connection_id, conn);
        assert_eq!(registry.connected_count(), 1);
    }

    #[test]
    fn newer_authenticate_overwrites() {
        let registry = PresenceRegistry::new();
        let user = Uuid::new_v4();
        let (tx1, _rx1) = channel();
        let (tx2, _rx2) = channel();

        let first = registry.authenticate(user, tx1);
        let second = registry.authenticate(user, tx2);

        assert_ne!(first, second);
        assert_eq!(registry.connected_count(), 1);
        assert_eq!(registry.lookup(user).unwrap().connection_id, second);
    }

    #[test]
    fn stale_disconnect_keeps_newer_session() {
        let registry = PresenceRegistry::new();
        let user = Uuid::new_v4();
        let (tx1, _rx1) = channel();
        let (tx2, _rx2) = channel();

        let stale = registry.authenticate(user, tx1);
        let current = registry.authenticate(user, tx2);

        // The old socket's teardown fires after the reconnect.
        registry.disconnect(user, stale);
        assert_eq!(registry.lookup(user).unwrap().connection_id, current);

        registry.disconnect(user, current);
        assert!(registry.lookup(user).is_none());
    }

    #[test]
    fn push_after_receiver_drop_is_silent() {
        let registry = PresenceRegistry::new();
        let user = Uuid::new_v4();
        let (tx, rx) = channel();
        registry.authenticate(user, tx);
        drop(rx);

        // Fire-and-forget: no panic, no error surfaced.
        registry
            .lookup(user)
            .unwrap()
            .push(LiveEvent::UnreadAlerts { alerts: vec![] });
    }
}
