//! Bookkeeping of active sessions.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::RwLock;

use crate::session::ClientSession;
use crate::types::SessionId;

/// Concurrent map from session id to session.
///
/// Broadcasts iterate a cloned snapshot, so no lock is held across socket I/O
/// and sessions may come and go mid-broadcast.
#[derive(Default)]
pub struct SessionRegistry {
    sessions: RwLock<HashMap<SessionId, Arc<ClientSession>>>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert if absent. Returns whether the insert happened.
    pub async fn add(&self, id: SessionId, session: Arc<ClientSession>) -> bool {
        let mut sessions = self.sessions.write().await;
        if sessions.contains_key(&id) {
            return false;
        }
        sessions.insert(id, session);
        true
    }

    /// Remove if present. Idempotent.
    pub async fn remove(&self, id: &SessionId) -> Option<Arc<ClientSession>> {
        self.sessions.write().await.remove(id)
    }

    /// Remove `session` only if it is the entry registered under its id.
    pub(crate) async fn remove_session(&self, session: &ClientSession) -> bool {
        let mut sessions = self.sessions.write().await;
        match sessions.get(session.id()) {
            Some(existing) if std::ptr::eq(Arc::as_ptr(existing), session) => {
                sessions.remove(session.id());
                true
            }
            _ => false,
        }
    }

    pub async fn get(&self, id: &SessionId) -> Option<Arc<ClientSession>> {
        self.sessions.read().await.get(id).cloned()
    }

    pub async fn contains(&self, id: &SessionId) -> bool {
        self.sessions.read().await.contains_key(id)
    }

    /// Point-in-time list of sessions, ordered by id.
    pub async fn snapshot_values(&self) -> Vec<Arc<ClientSession>> {
        let sessions = self.sessions.read().await;
        let mut values: Vec<_> = sessions.values().cloned().collect();
        values.sort_by(|a, b| a.id().cmp(b.id()));
        values
    }

    pub async fn ids(&self) -> Vec<SessionId> {
        let mut ids: Vec<_> = self.sessions.read().await.keys().cloned().collect();
        ids.sort();
        ids
    }

    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.sessions.read().await.is_empty()
    }

    /// Remove and return every session.
    pub async fn drain(&self) -> Vec<Arc<ClientSession>> {
        let mut sessions = self.sessions.write().await;
        sessions.drain().map(|(_, session)| session).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::test_support::detached_session;

    #[tokio::test]
    async fn add_and_get() {
        let registry = SessionRegistry::new();
        let (session, _peer) = detached_session("10.0.0.2:4000");
        assert!(registry.add(session.id().clone(), session.clone()).await);
        assert_eq!(registry.len().await, 1);
        let found = registry.get(&"10.0.0.2:4000".into()).await.unwrap();
        assert!(Arc::ptr_eq(&found, &session));
    }

    #[tokio::test]
    async fn duplicate_id_is_rejected() {
        let registry = SessionRegistry::new();
        let (first, _p1) = detached_session("10.0.0.2:4000");
        let (second, _p2) = detached_session("10.0.0.2:4000");
        assert!(registry.add(first.id().clone(), first.clone()).await);
        assert!(!registry.add(second.id().clone(), second).await);
        let kept = registry.get(first.id()).await.unwrap();
        assert!(Arc::ptr_eq(&kept, &first));
    }

    #[tokio::test]
    async fn remove_is_idempotent() {
        let registry = SessionRegistry::new();
        let (session, _peer) = detached_session("10.0.0.2:4000");
        registry.add(session.id().clone(), session.clone()).await;
        assert!(registry.remove(session.id()).await.is_some());
        assert!(registry.remove(session.id()).await.is_none());
        assert!(registry.is_empty().await);
    }

    #[tokio::test]
    async fn remove_session_ignores_other_entry_with_same_id() {
        let registry = SessionRegistry::new();
        let (registered, _p1) = detached_session("10.0.0.2:4000");
        let (stray, _p2) = detached_session("10.0.0.2:4000");
        registry.add(registered.id().clone(), registered.clone()).await;

        assert!(!registry.remove_session(&stray).await);
        assert!(registry.contains(registered.id()).await);
        assert!(registry.remove_session(&registered).await);
        assert!(registry.is_empty().await);
    }

    #[tokio::test]
    async fn snapshot_is_unaffected_by_later_changes() {
        let registry = SessionRegistry::new();
        let mut peers = Vec::new();
        for id in ["10.0.0.3:1", "10.0.0.2:1", "10.0.0.4:1"] {
            let (session, peer) = detached_session(id);
            registry.add(session.id().clone(), session).await;
            peers.push(peer);
        }

        let snapshot = registry.snapshot_values().await;
        registry.remove(&"10.0.0.2:1".into()).await;
        let (late, _late_peer) = detached_session("10.0.0.9:1");
        registry.add(late.id().clone(), late).await;

        let ids: Vec<_> = snapshot.iter().map(|s| s.id().as_str().to_string()).collect();
        assert_eq!(ids, vec!["10.0.0.2:1", "10.0.0.3:1", "10.0.0.4:1"]);
        assert_eq!(registry.len().await, 3);
    }

    #[tokio::test]
    async fn concurrent_add_remove() {
        let registry = Arc::new(SessionRegistry::new());
        let mut handles = Vec::new();
        for i in 0..32u16 {
            let registry = Arc::clone(&registry);
            handles.push(tokio::spawn(async move {
                let (session, _peer) = detached_session(&format!("10.0.0.1:{i}"));
                registry.add(session.id().clone(), session.clone()).await;
                let _ = registry.snapshot_values().await;
                if i % 2 == 0 {
                    registry.remove(session.id()).await;
                }
            }));
        }
        for h in handles {
            h.await.unwrap();
        }
        assert_eq!(registry.len().await, 16);
        assert_eq!(registry.drain().await.len(), 16);
        assert!(registry.is_empty().await);
    }
}
