//! Long-lived sandbox sessions keyed by (user, logical session, language).

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt;
use std::path::PathBuf;

pub mod manager;
pub mod store;

pub use manager::{SessionLease, SessionManager, SessionSettings};
pub use store::{InMemorySessionStore, SessionStore};

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionKey {
    pub user_id: String,
    pub session_id: String,
    pub language: String,
}

impl SessionKey {
    pub fn new(
        user_id: impl Into<String>,
        session_id: impl Into<String>,
        language: impl Into<String>,
    ) -> Self {
        Self {
            user_id: user_id.into(),
            session_id: session_id.into(),
            language: language.into(),
        }
    }
}

impl fmt::Display for SessionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.user_id, self.session_id, self.language)
    }
}

/// One reusable sandbox container and the host directory mounted into it.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    pub key: SessionKey,
    pub container_id: String,
    /// Host-side working directory, exclusively owned by this session.
    pub workdir: PathBuf,
    pub language: String,
    pub created_at: DateTime<Utc>,
    pub last_used: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_display() {
        let key = SessionKey::new("user-1", "tab-7", "python");
        assert_eq!(key.to_string(), "user-1:tab-7:python");
    }
}
