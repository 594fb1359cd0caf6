//! In-memory session storage.

use crate::error::SessionResult;
use crate::options::{DEFAULT_STORE_TTL, MAX_STORE_TTL, Options};
use crate::store::{SessionData, SessionStore};
use async_trait::async_trait;
use parking_lot::RwLock as OptionsLock;
use std::collections::HashMap;
use std::time::Duration;
use tokio::sync::RwLock;
use tokio::time::Instant;

struct Entry {
    data: SessionData,
    expires_at: Instant,
}

impl Entry {
    fn new(data: SessionData, ttl: Duration) -> Self {
        let now = Instant::now();
        let expires_at = now.checked_add(ttl.min(MAX_STORE_TTL)).unwrap_or(now);
        Self { data, expires_at }
    }

    fn is_expired(&self) -> bool {
        Instant::now() >= self.expires_at
    }
}

/// Process-local session store.
///
/// Data lives in a map guarded by an async lock; expired entries read as
/// missing and are evicted lazily or by [`MemoryStore::cleanup_expired`].
/// Sessions do not survive a restart and are not shared between processes.
///
/// # Examples
///
/// ```
/// use satchel_core::{MemoryStore, Options, SessionStore};
/// use std::time::Duration;
///
/// let store = MemoryStore::new()
///     .with_key_prefix("myapp:")
///     .with_default_ttl(Duration::from_secs(3600));
/// store.options(Options::default().with_max_age(600));
/// assert_eq!(store.current_options().max_age, 600);
/// ```
pub struct MemoryStore {
    sessions: RwLock<HashMap<String, Entry>>,
    options: OptionsLock<Options>,
    key_prefix: String,
    default_ttl: Duration,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    /// Create an empty store with default options.
    pub fn new() -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            options: OptionsLock::new(Options::default()),
            key_prefix: String::new(),
            default_ttl: DEFAULT_STORE_TTL,
        }
    }

    /// Namespace stored keys.
    pub fn with_key_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.key_prefix = prefix.into();
        self
    }

    /// TTL applied when options carry `max_age == 0`.
    pub fn with_default_ttl(mut self, ttl: Duration) -> Self {
        self.default_ttl = ttl;
        self
    }

    fn session_key(&self, session_id: &str) -> String {
        format!("{}{}", self.key_prefix, session_id)
    }

    /// Number of stored sessions, including not-yet-evicted expired ones.
    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    /// Whether the store holds no sessions.
    pub async fn is_empty(&self) -> bool {
        self.sessions.read().await.is_empty()
    }

    /// Drop every session.
    pub async fn clear_all(&self) {
        self.sessions.write().await.clear();
    }

    /// Evict expired sessions, returning how many were removed.
    pub async fn cleanup_expired(&self) -> usize {
        let mut sessions = self.sessions.write().await;
        let before = sessions.len();
        sessions.retain(|_, entry| !entry.is_expired());
        let removed = before - sessions.len();
        if removed > 0 {
            tracing::debug!(removed, "Evicted expired sessions");
        }
        removed
    }
}

#[async_trait]
impl SessionStore for MemoryStore {
    async fn load(&self, session_id: &str) -> SessionResult<Option<SessionData>> {
        let key = self.session_key(session_id);

        {
            let sessions = self.sessions.read().await;
            match sessions.get(&key) {
                Some(entry) if !entry.is_expired() => return Ok(Some(entry.data.clone())),
                Some(_) => {}
                None => return Ok(None),
            }
        }

        // Expired: evict, unless a concurrent save refreshed it meanwhile.
        let mut sessions = self.sessions.write().await;
        if sessions.get(&key).is_some_and(Entry::is_expired) {
            sessions.remove(&key);
        }
        Ok(None)
    }

    async fn save(
        &self,
        session_id: &str,
        data: &SessionData,
        options: &Options,
    ) -> SessionResult<()> {
        let key = self.session_key(session_id);
        let ttl = options.store_ttl(self.default_ttl);

        let mut sessions = self.sessions.write().await;
        match ttl {
            Some(ttl) => {
                sessions.insert(key, Entry::new(data.clone(), ttl));
            }
            None => {
                sessions.remove(&key);
            }
        }
        Ok(())
    }

    async fn delete(&self, session_id: &str) -> SessionResult<()> {
        let key = self.session_key(session_id);
        self.sessions.write().await.remove(&key);
        Ok(())
    }

    fn options(&self, options: Options) {
        *self.options.write() = options;
    }

    fn current_options(&self) -> Options {
        self.options.read().clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn data(pairs: &[(&str, serde_json::Value)]) -> SessionData {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    fn max_age(secs: i64) -> Options {
        Options::default().with_max_age(secs)
    }

    #[tokio::test]
    async fn test_missing_is_not_an_error() {
        let store = MemoryStore::new();
        assert_eq!(store.load("nope").await.unwrap(), None);
        assert!(!store.exists("nope").await.unwrap());
    }

    #[tokio::test]
    async fn test_save_overwrites_whole_object() {
        let store = MemoryStore::new();
        let options = Options::default();
        store
            .save("s1", &data(&[("a", json!(1)), ("b", json!(2))]), &options)
            .await
            .unwrap();
        store
            .save("s1", &data(&[("a", json!(3))]), &options)
            .await
            .unwrap();

        let loaded = store.load("s1").await.unwrap().unwrap();
        assert_eq!(loaded, data(&[("a", json!(3))]));
    }

    #[tokio::test]
    async fn test_delete_is_idempotent() {
        let store = MemoryStore::new();
        store
            .save("s1", &SessionData::new(), &Options::default())
            .await
            .unwrap();
        store.delete("s1").await.unwrap();
        store.delete("s1").await.unwrap();
        store.delete("never-existed").await.unwrap();
        assert!(store.is_empty().await);
    }

    #[tokio::test(start_paused = true)]
    async fn test_expiry_reads_as_missing() {
        let store = MemoryStore::new();
        store
            .save("s1", &data(&[("a", json!(1))]), &max_age(10))
            .await
            .unwrap();

        tokio::time::advance(Duration::from_secs(5)).await;
        assert!(store.load("s1").await.unwrap().is_some());

        tokio::time::advance(Duration::from_secs(6)).await;
        assert_eq!(store.load("s1").await.unwrap(), None);
        assert_eq!(store.len().await, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_zero_max_age_uses_default_ttl() {
        let store = MemoryStore::new().with_default_ttl(Duration::from_secs(100));
        store
            .save("s1", &SessionData::new(), &max_age(0))
            .await
            .unwrap();

        tokio::time::advance(Duration::from_secs(99)).await;
        assert!(store.exists("s1").await.unwrap());
        tokio::time::advance(Duration::from_secs(2)).await;
        assert!(!store.exists("s1").await.unwrap());
    }

    #[tokio::test]
    async fn test_huge_max_age_does_not_overflow() {
        let store = MemoryStore::new().with_default_ttl(Duration::MAX);
        store
            .save("forever", &SessionData::new(), &max_age(i64::MAX))
            .await
            .unwrap();
        store
            .save("browser", &SessionData::new(), &max_age(0))
            .await
            .unwrap();

        assert!(store.exists("forever").await.unwrap());
        assert!(store.exists("browser").await.unwrap());
    }

    #[tokio::test(start_paused = true)]
    async fn test_cleanup_expired() {
        let store = MemoryStore::new();
        store
            .save("short", &SessionData::new(), &max_age(10))
            .await
            .unwrap();
        store
            .save("long", &SessionData::new(), &max_age(1000))
            .await
            .unwrap();

        tokio::time::advance(Duration::from_secs(20)).await;
        assert_eq!(store.cleanup_expired().await, 1);
        assert_eq!(store.len().await, 1);
    }

    #[tokio::test]
    async fn test_negative_max_age_removes_on_save() {
        let store = MemoryStore::new();
        store
            .save("s1", &SessionData::new(), &Options::default())
            .await
            .unwrap();
        store
            .save("s1", &SessionData::new(), &max_age(-1))
            .await
            .unwrap();
        assert!(store.is_empty().await);
    }

    #[tokio::test]
    async fn test_store_options_are_only_defaults() {
        let store = MemoryStore::new();
        store.options(max_age(-1));
        store
            .save("s1", &SessionData::new(), &Options::default())
            .await
            .unwrap();
        assert!(store.exists("s1").await.unwrap());
        assert_eq!(store.current_options().max_age, -1);
    }

    #[tokio::test]
    async fn test_key_prefix_namespaces_entries() {
        let store = MemoryStore::new().with_key_prefix("app:");
        store
            .save("s1", &SessionData::new(), &Options::default())
            .await
            .unwrap();
        assert!(store.sessions.read().await.contains_key("app:s1"));
        assert!(store.exists("s1").await.unwrap());
    }
}
