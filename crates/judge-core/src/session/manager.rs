// src/session/manager.rs
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::fs;
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};
use uuid::Uuid;

use super::{Session, SessionKey, SessionStore};
use crate::errors::{JudgeError, SandboxError};
use crate::executors::{ContainerSpec, SandboxRuntime};
use crate::languages::LanguageProfile;

pub const DEFAULT_IDLE_TIMEOUT: Duration = Duration::from_secs(600);
pub const DEFAULT_PIDS_LIMIT: i64 = 128;

pub const LABEL_SESSION: &str = "judge.session";
pub const LABEL_LANGUAGE: &str = "judge.language";

#[derive(Debug, Clone)]
pub struct SessionSettings {
    /// Sessions unused for longer than this are reaped.
    pub idle_timeout: Duration,
    /// Parent of every session's host working directory.
    pub workspace_root: PathBuf,
    pub pids_limit: i64,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            idle_timeout: DEFAULT_IDLE_TIMEOUT,
            workspace_root: std::env::temp_dir().join("judge-sessions"),
            pids_limit: DEFAULT_PIDS_LIMIT,
        }
    }
}

/// Exclusive right to use the session of one key. Dropping it lets the next
/// request for the same key proceed.
pub struct SessionLease {
    key: SessionKey,
    _guard: OwnedMutexGuard<()>,
}

impl SessionLease {
    pub fn key(&self) -> &SessionKey {
        &self.key
    }
}

/// Owns the lifecycle of session containers: lazy creation, health checks,
/// reuse, idle reaping and teardown.
pub struct SessionManager {
    runtime: Arc<dyn SandboxRuntime>,
    store: Arc<dyn SessionStore>,
    locks: Mutex<HashMap<SessionKey, Arc<AsyncMutex<()>>>>,
    settings: SessionSettings,
}

impl SessionManager {
    pub fn new(
        runtime: Arc<dyn SandboxRuntime>,
        store: Arc<dyn SessionStore>,
        settings: SessionSettings,
    ) -> Self {
        Self {
            runtime,
            store,
            locks: Mutex::new(HashMap::new()),
            settings,
        }
    }

    pub fn settings(&self) -> &SessionSettings {
        &self.settings
    }

    fn slot(&self, key: &SessionKey) -> Arc<AsyncMutex<()>> {
        let mut locks = self.locks.lock().unwrap_or_else(|p| p.into_inner());
        locks.entry(key.clone()).or_default().clone()
    }

    /// Drops lock slots nobody holds or waits on.
    fn prune_locks(&self) {
        let mut locks = self.locks.lock().unwrap_or_else(|p| p.into_inner());
        locks.retain(|_, slot| Arc::strong_count(slot) > 1);
    }

    /// Waits until no other request is using `key`'s session.
    pub async fn lock(&self, key: &SessionKey) -> SessionLease {
        let guard = self.slot(key).lock_owned().await;
        SessionLease {
            key: key.clone(),
            _guard: guard,
        }
    }

    /// Returns the live session for the lease's key, creating one if none
    /// exists or the recorded container is no longer running.
    pub async fn get_session(
        &self,
        lease: &SessionLease,
        profile: &LanguageProfile,
    ) -> Result<Session, JudgeError> {
        let key = lease.key();

        if let Some(session) = self.store.get(key).await {
            match self.runtime.is_running(&session.container_id).await {
                Ok(true) => {
                    let now = Utc::now();
                    self.store.touch(key, now).await;
                    log::debug!("Reusing session {} ({})", key, session.container_id);
                    return Ok(Session {
                        last_used: now,
                        ..session
                    });
                }
                Ok(false) => {
                    log::info!(
                        "Container {} for session {} is gone, recreating",
                        session.container_id,
                        key
                    );
                }
                Err(e) => {
                    log::warn!(
                        "Could not inspect container {} for session {}: {}. Recreating",
                        session.container_id,
                        key,
                        e
                    );
                }
            }
            self.store.remove(key).await;
            self.destroy(&session).await;
        }

        let session = self.create_session(key, profile).await?;
        self.store.insert(session.clone()).await;
        log::info!(
            "Created session {} in container {} ({})",
            key,
            session.container_id,
            profile.image
        );
        Ok(session)
    }

    async fn create_session(
        &self,
        key: &SessionKey,
        profile: &LanguageProfile,
    ) -> Result<Session, JudgeError> {
        let id = Uuid::new_v4();
        let workdir = self.settings.workspace_root.join(format!("judge-{}", id));
        create_workdir(&workdir).await?;

        let spec = ContainerSpec {
            name: format!("judge-{}-{}", profile.name, id.simple()),
            image: profile.image.to_string(),
            host_workdir: workdir.clone(),
            memory_bytes: profile.memory_bytes(),
            nano_cpus: profile.nano_cpus(),
            pids_limit: self.settings.pids_limit,
            labels: HashMap::from([
                (LABEL_SESSION.to_string(), key.to_string()),
                (LABEL_LANGUAGE.to_string(), profile.name.to_string()),
            ]),
        };

        let created: Result<String, SandboxError> = async {
            self.runtime.ensure_image(&spec.image).await?;
            self.runtime.create_container(&spec).await
        }
        .await;

        match created {
            Ok(container_id) => {
                let now = Utc::now();
                Ok(Session {
                    key: key.clone(),
                    container_id,
                    workdir,
                    language: profile.name.to_string(),
                    created_at: now,
                    last_used: now,
                })
            }
            Err(e) => {
                remove_workdir(&workdir).await;
                Err(JudgeError::SessionError(format!(
                    "Failed to start {} sandbox: {}",
                    profile.name, e
                )))
            }
        }
    }

    /// Records a completed execution.
    pub async fn touch(&self, lease: &SessionLease) {
        self.store.touch(lease.key(), Utc::now()).await;
    }

    /// Tears down the lease's session so the next request starts fresh.
    pub async fn invalidate(&self, lease: &SessionLease) {
        if let Some(session) = self.store.remove(lease.key()).await {
            log::warn!("Invalidating session {}", lease.key());
            self.destroy(&session).await;
        }
    }

    /// Destroys the session for `key` once it is not in use.
    pub async fn kill_session(&self, key: &SessionKey) -> bool {
        let lease = self.lock(key).await;
        let removed = self.store.remove(lease.key()).await;
        let found = match removed {
            Some(session) => {
                log::info!("Killed session {}", key);
                self.destroy(&session).await;
                true
            }
            None => false,
        };
        drop(lease);
        self.prune_locks();
        found
    }

    pub async fn reap_idle(&self) -> Vec<SessionKey> {
        self.reap_idle_at(Utc::now()).await
    }

    /// Destroys every session idle for longer than the timeout as of `now`.
    /// Sessions currently executing are left alone.
    pub async fn reap_idle_at(&self, now: DateTime<Utc>) -> Vec<SessionKey> {
        let mut reaped = Vec::new();

        for candidate in self.store.list().await {
            if !self.is_idle(&candidate, now) {
                continue;
            }
            let guard = match self.slot(&candidate.key).try_lock_owned() {
                Ok(guard) => guard,
                Err(_) => {
                    log::debug!("Session {} is busy, not reaping", candidate.key);
                    continue;
                }
            };

            // Re-read under the lock; a request may have used it meanwhile.
            let still_idle = match self.store.get(&candidate.key).await {
                Some(current) => self.is_idle(&current, now),
                None => false,
            };
            if still_idle {
                if let Some(session) = self.store.remove(&candidate.key).await {
                    log::info!("Reaping idle session {}", session.key);
                    self.destroy(&session).await;
                    reaped.push(session.key);
                }
            }
            drop(guard);
        }

        self.prune_locks();
        reaped
    }

    fn is_idle(&self, session: &Session, now: DateTime<Utc>) -> bool {
        now.signed_duration_since(session.last_used)
            .to_std()
            .map(|idle| idle > self.settings.idle_timeout)
            .unwrap_or(false)
    }

    /// Destroys every session. Used on process shutdown.
    pub async fn shutdown(&self) -> usize {
        let sessions = self.store.list().await;
        let count = sessions.len();
        for session in sessions {
            self.store.remove(&session.key).await;
            self.destroy(&session).await;
        }
        if count > 0 {
            log::info!("Destroyed {} session(s) on shutdown", count);
        }
        count
    }

    /// Snapshot of all sessions, oldest first.
    pub async fn list(&self) -> Vec<Session> {
        let mut sessions = self.store.list().await;
        sessions.sort_by_key(|s| s.created_at);
        sessions
    }

    /// Best-effort teardown; failures are logged and swallowed.
    async fn destroy(&self, session: &Session) {
        if let Err(e) = self.runtime.stop_container(&session.container_id).await {
            log::warn!(
                "Failed to stop container {} of session {}: {}",
                session.container_id,
                session.key,
                e
            );
        }
        remove_workdir(&session.workdir).await;
    }
}

async fn create_workdir(path: &Path) -> Result<(), JudgeError> {
    fs::create_dir_all(path).await.map_err(|e| {
        JudgeError::IoError(format!("Failed to create {}: {}", path.display(), e))
    })?;

    // The container user is not the host user.
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        fs::set_permissions(path, std::fs::Permissions::from_mode(0o777)).await?;
    }
    Ok(())
}

async fn remove_workdir(path: &Path) {
    if let Err(e) = fs::remove_dir_all(path).await {
        if e.kind() != std::io::ErrorKind::NotFound {
            log::warn!("Failed to remove session directory {}: {}", path.display(), e);
        }
    }
}
