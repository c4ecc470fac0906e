//! Session cache for abbreviated handshakes.
//!
//! One cache is shared (via `Arc`) by every connection that should be able
//! to resume each other's sessions. Servers look entries up by session id,
//! clients by the server name they connect to.

use std::collections::{HashMap, VecDeque};

use crate::{CipherSuite, ProtocolVersion};
use parking_lot::Mutex;
use tracing::debug;
use zeroize::Zeroize;

/// Default session lifetime: 2 hours.
pub const DEFAULT_SESSION_LIFETIME: u64 = 7200;

/// Parameters cached from a completed full handshake.
#[derive(Clone)]
pub struct CachedSession {
    pub id: Vec<u8>,
    pub cipher_suite: CipherSuite,
    pub version: ProtocolVersion,
    pub master_secret: Vec<u8>,
    /// Seconds since the UNIX epoch.
    pub created_at: u64,
    /// Server name the client connected to (client-side entries).
    pub server_name: Option<String>,
}

impl Drop for CachedSession {
    fn drop(&mut self) {
        self.master_secret.zeroize();
    }
}

impl std::fmt::Debug for CachedSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CachedSession")
            .field("id_len", &self.id.len())
            .field("cipher_suite", &self.cipher_suite)
            .field("version", &self.version)
            .field("created_at", &self.created_at)
            .field("server_name", &self.server_name)
            .finish_non_exhaustive()
    }
}

pub(crate) fn now_secs() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}

#[derive(Default)]
struct CacheInner {
    by_id: HashMap<Vec<u8>, CachedSession>,
    by_host: HashMap<String, Vec<u8>>,
    /// Insertion order, oldest first.
    order: VecDeque<Vec<u8>>,
}

impl CacheInner {
    fn remove(&mut self, id: &[u8]) -> Option<CachedSession> {
        let session = self.by_id.remove(id)?;
        self.order.retain(|k| k != id);
        if let Some(host) = &session.server_name {
            if self.by_host.get(host).map(Vec::as_slice) == Some(id) {
                self.by_host.remove(host);
            }
        }
        Some(session)
    }
}

/// In-memory session cache with a maximum size and TTL expiration.
pub struct SessionCache {
    inner: Mutex<CacheInner>,
    max_size: usize,
    /// Session lifetime in seconds. 0 means no expiry.
    session_lifetime: u64,
}

impl std::fmt::Debug for SessionCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionCache")
            .field("len", &self.len())
            .field("max_size", &self.max_size)
            .field("session_lifetime", &self.session_lifetime)
            .finish()
    }
}

impl SessionCache {
    /// Create a cache holding at most `max_size` sessions for
    /// [`DEFAULT_SESSION_LIFETIME`] seconds each.
    pub fn new(max_size: usize) -> Self {
        Self::with_lifetime(max_size, DEFAULT_SESSION_LIFETIME)
    }

    /// Create a cache with a custom lifetime. A lifetime of 0 never expires.
    pub fn with_lifetime(max_size: usize, lifetime_secs: u64) -> Self {
        Self {
            inner: Mutex::new(CacheInner::default()),
            max_size,
            session_lifetime: lifetime_secs,
        }
    }

    pub fn len(&self) -> usize {
        self.inner.lock().by_id.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn is_expired(&self, session: &CachedSession) -> bool {
        self.session_lifetime != 0
            && now_secs().saturating_sub(session.created_at) > self.session_lifetime
    }

    /// Store a session, evicting the oldest entry when full.
    pub fn insert(&self, session: CachedSession) {
        if self.max_size == 0 || session.id.is_empty() {
            return;
        }
        let mut inner = self.inner.lock();
        inner.remove(&session.id);
        while inner.by_id.len() >= self.max_size {
            let Some(oldest) = inner.order.front().cloned() else {
                break;
            };
            debug!(id_len = oldest.len(), "evicting oldest cached session");
            inner.remove(&oldest);
        }
        if let Some(host) = &session.server_name {
            inner.by_host.insert(host.clone(), session.id.clone());
        }
        inner.order.push_back(session.id.clone());
        inner.by_id.insert(session.id.clone(), session);
    }

    /// Look a session up by id (server side). Expired entries are dropped.
    pub fn get(&self, id: &[u8]) -> Option<CachedSession> {
        let mut inner = self.inner.lock();
        let session = inner.by_id.get(id)?;
        if self.is_expired(session) {
            inner.remove(id);
            return None;
        }
        Some(session.clone())
    }

    /// Look the most recent session for `server_name` up (client side).
    pub fn get_by_host(&self, server_name: &str) -> Option<CachedSession> {
        let id = self.inner.lock().by_host.get(server_name).cloned()?;
        self.get(&id)
    }

    pub fn remove(&self, id: &[u8]) {
        self.inner.lock().remove(id);
    }

    /// Remove all expired sessions.
    pub fn cleanup(&self) {
        if self.session_lifetime == 0 {
            return;
        }
        let mut inner = self.inner.lock();
        let expired: Vec<Vec<u8>> = inner
            .by_id
            .values()
            .filter(|s| self.is_expired(s))
            .map(|s| s.id.clone())
            .collect();
        for id in expired {
            inner.remove(&id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn session(id: u8, host: Option<&str>) -> CachedSession {
        CachedSession {
            id: vec![id; 32],
            cipher_suite: CipherSuite::TLS_RSA_WITH_AES_128_CBC_SHA,
            version: ProtocolVersion::Tls10,
            master_secret: vec![id; 48],
            created_at: now_secs(),
            server_name: host.map(str::to_string),
        }
    }

    #[test]
    fn test_insert_and_get() {
        let cache = SessionCache::new(10);
        assert!(cache.is_empty());
        cache.insert(session(1, None));
        let s = cache.get(&[1; 32]).unwrap();
        assert_eq!(s.master_secret, vec![1; 48]);
        assert!(cache.get(&[2; 32]).is_none());
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_host_index_follows_latest_session() {
        let cache = SessionCache::new(10);
        cache.insert(session(1, Some("example.com")));
        cache.insert(session(2, Some("example.com")));
        assert_eq!(cache.get_by_host("example.com").unwrap().id, vec![2; 32]);

        cache.remove(&[2; 32]);
        assert!(cache.get_by_host("example.com").is_none());
        // The older entry is still reachable by id
        assert!(cache.get(&[1; 32]).is_some());
    }

    #[test]
    fn test_eviction_oldest_first() {
        let cache = SessionCache::new(2);
        cache.insert(session(1, Some("a")));
        cache.insert(session(2, None));
        cache.insert(session(3, None));
        assert_eq!(cache.len(), 2);
        assert!(cache.get(&[1; 32]).is_none());
        assert!(cache.get_by_host("a").is_none());
        assert!(cache.get(&[2; 32]).is_some());
        assert!(cache.get(&[3; 32]).is_some());
    }

    #[test]
    fn test_reinsert_same_id_does_not_evict() {
        let cache = SessionCache::new(2);
        cache.insert(session(1, None));
        cache.insert(session(2, None));
        cache.insert(session(2, None));
        assert_eq!(cache.len(), 2);
        assert!(cache.get(&[1; 32]).is_some());
    }

    #[test]
    fn test_lazy_expiry_and_cleanup() {
        let cache = SessionCache::with_lifetime(10, 60);
        let mut old = session(1, Some("old.example"));
        old.created_at = now_secs() - 3600;
        cache.insert(old);
        cache.insert(session(2, None));
        assert_eq!(cache.len(), 2);
        assert!(cache.get_by_host("old.example").is_none());
        assert_eq!(cache.len(), 1);

        let mut old = session(3, None);
        old.created_at = 0;
        cache.insert(old);
        cache.cleanup();
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_zero_lifetime_never_expires() {
        let cache = SessionCache::with_lifetime(10, 0);
        let mut s = session(1, None);
        s.created_at = 0;
        cache.insert(s);
        assert!(cache.get(&[1; 32]).is_some());
    }

    #[test]
    fn test_empty_id_and_zero_capacity_ignored() {
        let cache = SessionCache::new(0);
        cache.insert(session(1, None));
        assert!(cache.is_empty());

        let cache = SessionCache::new(4);
        let mut s = session(1, None);
        s.id.clear();
        cache.insert(s);
        assert!(cache.is_empty());
    }
}
