//! Session table abstraction.
//!
//! The table is injected into the `SessionManager` rather than living in a
//! global, so each server instance (and each test) owns its own.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use tokio::sync::RwLock;

use super::{Session, SessionKey};

#[async_trait]
pub trait SessionStore: Send + Sync {
    async fn get(&self, key: &SessionKey) -> Option<Session>;

    /// Inserts or replaces the session recorded for its key.
    async fn insert(&self, session: Session);

    async fn remove(&self, key: &SessionKey) -> Option<Session>;

    async fn list(&self) -> Vec<Session>;

    /// Refreshes the last-used timestamp. Returns false if the key is unknown.
    async fn touch(&self, key: &SessionKey, at: DateTime<Utc>) -> bool;
}

#[derive(Default)]
pub struct InMemorySessionStore {
    sessions: RwLock<HashMap<SessionKey, Session>>,
}

impl InMemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SessionStore for InMemorySessionStore {
    async fn get(&self, key: &SessionKey) -> Option<Session> {
        self.sessions.read().await.get(key).cloned()
    }

    async fn insert(&self, session: Session) {
        self.sessions
            .write()
            .await
            .insert(session.key.clone(), session);
    }

    async fn remove(&self, key: &SessionKey) -> Option<Session> {
        self.sessions.write().await.remove(key)
    }

    async fn list(&self) -> Vec<Session> {
        self.sessions.read().await.values().cloned().collect()
    }

    async fn touch(&self, key: &SessionKey, at: DateTime<Utc>) -> bool {
        match self.sessions.write().await.get_mut(key) {
            Some(session) => {
                session.last_used = at;
                true
            }
            None => false,
        }
    }
}
