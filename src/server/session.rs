use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;
use tokio::sync::RwLock;
use tracing::debug;
use uuid::Uuid;

use crate::export::Table;

pub const SESSION_COOKIE: &str = "labextract_session";

/// Progress of the last batch started in a session.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum BatchStatus {
    #[default]
    Idle,
    Running,
    Complete,
}

/// The PDF most recently uploaded, kept for the preview pane.
#[derive(Debug, Clone)]
pub struct StoredDocument {
    pub name: String,
    pub bytes: Vec<u8>,
}

/// Per-login state. A session only exists once the password was accepted.
#[derive(Debug)]
pub struct Session {
    last_seen: Instant,
    pub document: Option<StoredDocument>,
    pub table: Option<Table>,
    pub batch: BatchStatus,
}

impl Session {
    fn new() -> Self {
        Self {
            last_seen: Instant::now(),
            document: None,
            table: None,
            batch: BatchStatus::Idle,
        }
    }
}

/// Sessions keyed by the id stored in the session cookie.
#[derive(Clone)]
pub struct SessionStore {
    sessions: Arc<RwLock<HashMap<String, Session>>>,
    ttl: Duration,
}

impl SessionStore {
    pub fn new(ttl: Duration) -> Self {
        Self {
            sessions: Arc::new(RwLock::new(HashMap::new())),
            ttl,
        }
    }

    /// Open an authenticated session and return its id.
    pub async fn create(&self) -> String {
        let id = Uuid::new_v4().to_string();
        let mut sessions = self.sessions.write().await;
        sessions.retain(|_, s| s.last_seen.elapsed() < self.ttl);
        sessions.insert(id.clone(), Session::new());
        debug!("Opened session ({} active)", sessions.len());
        id
    }

    /// Refresh a session, dropping it if it has expired.
    pub async fn touch(&self, id: &str) -> bool {
        let mut sessions = self.sessions.write().await;
        match sessions.get_mut(id) {
            Some(session) if session.last_seen.elapsed() < self.ttl => {
                session.last_seen = Instant::now();
                true
            }
            Some(_) => {
                sessions.remove(id);
                debug!("Session expired");
                false
            }
            None => false,
        }
    }

    pub async fn remove(&self, id: &str) {
        self.sessions.write().await.remove(id);
    }

    /// Run `f` against a live session.
    pub async fn with_session<R>(&self, id: &str, f: impl FnOnce(&mut Session) -> R) -> Option<R> {
        let mut sessions = self.sessions.write().await;
        sessions.get_mut(id).map(f)
    }

    #[cfg(test)]
    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }
}

/// Session id from a `Cookie` header value.
pub fn session_id_from_cookie(header: &str) -> Option<&str> {
    header
        .split(';')
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(name, _)| *name == SESSION_COOKIE)
        .map(|(_, value)| value)
        .filter(|value| !value.is_empty())
}

pub fn session_cookie(id: &str) -> String {
    format!("{}={}; HttpOnly; SameSite=Strict; Path=/", SESSION_COOKIE, id)
}

pub fn cleared_cookie() -> String {
    format!("{}=; HttpOnly; SameSite=Strict; Path=/; Max-Age=0", SESSION_COOKIE)
}

pub fn hash_secret(secret: &str) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(secret.as_bytes());
    hasher.finalize().into()
}

/// Compare a login attempt against the stored hash in constant time.
pub fn password_matches(expected: Option<&[u8; 32]>, attempt: &str) -> bool {
    match expected {
        Some(hash) => hash.ct_eq(&hash_secret(attempt)).unwrap_u8() == 1,
        None => true,
    }
}
