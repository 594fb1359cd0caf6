//! Request-scoped session.

use crate::codec::TokenCodec;
use crate::error::{SessionError, SessionResult};
use crate::options::{Options, SessionCookie};
use crate::store::{SessionData, SessionStore, generate_session_id};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, warn};

/// Data key holding the default flash queue.
pub const FLASH_KEY: &str = "_flash";

fn flash_key(key: Option<&str>) -> String {
    match key {
        Some(key) if !key.is_empty() => format!("{FLASH_KEY}:{key}"),
        _ => FLASH_KEY.to_string(),
    }
}

/// Mutable view over one session's data for the duration of a request.
///
/// All mutations stay in memory until [`Session::save`]. A session is owned
/// by a single request and is not synchronized internally.
///
/// # Examples
///
/// ```
/// use satchel_core::*;
/// use std::sync::Arc;
///
/// # tokio_test::block_on(async {
/// let codec = TokenCodec::new(vec![KeyPair::new(b"auth-key".to_vec())])?;
/// let manager = SessionManager::new(SessionConfig::default(), Arc::new(MemoryStore::new()), codec);
///
/// let mut session = manager.resolve(None).await?;
/// session.set("user_id", 123)?;
/// session.add_flash("Welcome back")?;
///
/// // New sessions always hand a token back to the transport layer.
/// let cookie = session.save().await?.expect("new session issues a cookie");
///
/// let mut session = manager.resolve(Some(cookie.value.as_str())).await?;
/// assert_eq!(session.get::<i64>("user_id")?, Some(123));
/// assert_eq!(session.flashes(), vec![serde_json::json!("Welcome back")]);
/// assert!(session.flashes().is_empty());
/// # Ok::<(), SessionError>(())
/// # }).unwrap();
/// ```
pub struct Session {
    id: String,
    data: SessionData,
    is_new: bool,
    modified: bool,
    reissue: bool,
    destroyed: bool,
    previous_id: Option<String>,
    options: Option<Options>,
    store: Arc<dyn SessionStore>,
    codec: Arc<TokenCodec>,
}

impl Session {
    /// A brand-new session with a freshly generated ID.
    pub(crate) fn fresh(store: Arc<dyn SessionStore>, codec: Arc<TokenCodec>) -> Self {
        Self {
            id: generate_session_id(),
            data: SessionData::new(),
            is_new: true,
            modified: false,
            reissue: false,
            destroyed: false,
            previous_id: None,
            options: None,
            store,
            codec,
        }
    }

    /// A session bound to an existing ID and its stored data.
    ///
    /// `reissue` forces a new token on the next save, e.g. when the
    /// presented token was signed by a key that is no longer current.
    pub(crate) fn loaded(
        id: String,
        data: SessionData,
        reissue: bool,
        store: Arc<dyn SessionStore>,
        codec: Arc<TokenCodec>,
    ) -> Self {
        Self {
            id,
            data,
            is_new: false,
            modified: false,
            reissue,
            destroyed: false,
            previous_id: None,
            options: None,
            store,
            codec,
        }
    }

    /// Session identifier.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Whether no token has been issued for this session yet.
    pub fn is_new(&self) -> bool {
        self.is_new
    }

    /// Whether the data changed since it was loaded or last saved.
    pub fn is_modified(&self) -> bool {
        self.modified
    }

    /// Raw session data.
    pub fn data(&self) -> &SessionData {
        &self.data
    }

    /// Get a value, converted to `T`.
    ///
    /// Returns `Ok(None)` when the key is absent and
    /// [`SessionError::TypeMismatch`] when the stored value has another shape.
    pub fn get<T: DeserializeOwned>(&self, key: &str) -> SessionResult<Option<T>> {
        self.data
            .get(key)
            .map(|value| {
                T::deserialize(value).map_err(|e| SessionError::TypeMismatch {
                    key: key.to_string(),
                    reason: e.to_string(),
                })
            })
            .transpose()
    }

    /// Get the stored value as-is.
    pub fn get_value(&self, key: &str) -> Option<&Value> {
        self.data.get(key)
    }

    /// Check if a key exists in the session data.
    pub fn contains(&self, key: &str) -> bool {
        self.data.contains_key(key)
    }

    /// All keys, including flash queues.
    pub fn keys(&self) -> Vec<&str> {
        self.data.keys().map(String::as_str).collect()
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Set a value in the session data.
    pub fn set<T: Serialize>(&mut self, key: impl Into<String>, value: T) -> SessionResult<()> {
        let value =
            serde_json::to_value(value).map_err(|e| SessionError::Serialization(e.to_string()))?;
        self.data.insert(key.into(), value);
        self.modified = true;
        Ok(())
    }

    /// Remove a value from the session data.
    pub fn delete(&mut self, key: &str) -> Option<Value> {
        let removed = self.data.remove(key);
        if removed.is_some() {
            self.modified = true;
        }
        removed
    }

    /// Remove every key, flashes included.
    pub fn clear(&mut self) {
        if !self.data.is_empty() {
            self.modified = true;
        }
        self.data.clear();
    }

    /// Queue a flash message under the default key.
    pub fn add_flash<T: Serialize>(&mut self, value: T) -> SessionResult<()> {
        self.push_flash(None, value)
    }

    /// Queue a flash message under a named key.
    pub fn add_flash_to<T: Serialize>(&mut self, key: &str, value: T) -> SessionResult<()> {
        self.push_flash(Some(key), value)
    }

    /// Take every flash message under the default key.
    ///
    /// The messages are removed from the session as they are returned.
    pub fn flashes(&mut self) -> Vec<Value> {
        self.take_flashes(None)
    }

    /// Take every flash message under a named key.
    pub fn flashes_from(&mut self, key: &str) -> Vec<Value> {
        self.take_flashes(Some(key))
    }

    fn push_flash<T: Serialize>(&mut self, key: Option<&str>, value: T) -> SessionResult<()> {
        let value =
            serde_json::to_value(value).map_err(|e| SessionError::Serialization(e.to_string()))?;

        match self
            .data
            .entry(flash_key(key))
            .or_insert_with(|| Value::Array(Vec::new()))
        {
            Value::Array(queue) => queue.push(value),
            other => {
                let existing = std::mem::take(other);
                *other = Value::Array(vec![existing, value]);
            }
        }
        self.modified = true;
        Ok(())
    }

    fn take_flashes(&mut self, key: Option<&str>) -> Vec<Value> {
        let flashes = match self.data.remove(&flash_key(key)) {
            Some(Value::Array(queue)) => queue,
            Some(other) => vec![other],
            None => return Vec::new(),
        };
        self.modified = true;
        flashes
    }

    /// Switch to a new random ID, keeping the data.
    ///
    /// Call after a privilege change. The old ID is deleted from the store
    /// on the next successful save.
    pub fn regenerate(&mut self) {
        let old = std::mem::replace(&mut self.id, generate_session_id());
        if !self.is_new && self.previous_id.is_none() {
            self.previous_id = Some(old);
        }
        self.reissue = true;
        self.modified = true;
    }

    /// Mark the session for removal; the next save deletes it.
    pub fn invalidate(&mut self) {
        self.data.clear();
        self.destroyed = true;
        self.modified = true;
    }

    /// Override cookie and expiry settings for this session.
    ///
    /// They apply to this session's next saves only; other sessions on the
    /// same store and tokens already issued are unaffected.
    pub fn options(&mut self, options: Options) {
        self.options = Some(options);
        self.reissue = true;
    }

    /// Settings in effect: this session's override, or the store defaults.
    pub fn current_options(&self) -> Options {
        match &self.options {
            Some(options) => options.clone(),
            None => self.store.current_options(),
        }
    }

    /// Persist the session.
    ///
    /// Returns the cookie to send back when the client's token must change:
    /// for new, regenerated or invalidated sessions, after an options change,
    /// when the presented token was signed by a previous key, and always for
    /// stores that embed data in the token. On error the in-memory state is
    /// untouched and the save may be retried.
    pub async fn save(&mut self) -> SessionResult<Option<SessionCookie>> {
        let options = self.current_options();
        let codec = Arc::clone(&self.codec);

        if self.destroyed || options.deletes() {
            self.delete_previous().await?;
            if let Err(e) = self.store.delete(&self.id).await {
                warn!(error = %e, "Failed to delete session");
                return Err(e);
            }
            debug!("Session removed");
            self.mark_saved();
            return Ok(Some(SessionCookie::removal(codec.name(), options)));
        }

        if self.store.embeds_data() {
            let token = codec.encode(&self.id, Some(&self.data))?;
            self.mark_saved();
            return Ok(Some(SessionCookie::new(codec.name(), token, options)));
        }

        let token = if self.is_new || self.reissue {
            Some(codec.encode(&self.id, None)?)
        } else {
            None
        };

        if let Err(e) = self.store.save(&self.id, &self.data, &options).await {
            warn!(error = %e, "Failed to save session");
            return Err(e);
        }
        self.delete_previous().await?;

        if self.is_new {
            debug!("New session persisted");
        }
        self.mark_saved();
        Ok(token.map(|token| SessionCookie::new(codec.name(), token, options)))
    }

    async fn delete_previous(&self) -> SessionResult<()> {
        if let Some(previous) = &self.previous_id {
            self.store.delete(previous).await?;
        }
        Ok(())
    }

    fn mark_saved(&mut self) {
        self.previous_id = None;
        self.is_new = false;
        self.modified = false;
        self.reissue = false;
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("id", &self.id)
            .field("keys", &self.keys())
            .field("is_new", &self.is_new)
            .field("modified", &self.modified)
            .field("destroyed", &self.destroyed)
            .finish()
    }
}
