//! Session store trait definition.

use crate::error::SessionResult;
use crate::options::Options;
use async_trait::async_trait;
use std::collections::HashMap;

/// Session payload: string keys mapped to tagged JSON values.
///
/// Values come back as the same [`serde_json::Value`] variant they were
/// stored as; typed access through [`crate::Session::get`] reports a
/// [`crate::SessionError::TypeMismatch`] when the shape does not fit.
pub type SessionData = HashMap<String, serde_json::Value>;

/// Storage backend contract.
///
/// Every backend must:
/// - expire saved data after [`Options::store_ttl`] of the options passed to
///   [`SessionStore::save`], deleting it when that yields `None`
/// - report a missing or backend-expired session as `Ok(None)`, never as an error
/// - replace the whole stored object on [`SessionStore::save`] (no field merge)
/// - treat deleting an unknown ID as success
/// - surface I/O failures as [`crate::SessionError::BackendUnavailable`]
///
/// Implementations are shared between concurrent requests and own whatever
/// pooling or locking that requires. Concurrent saves for the same ID are
/// last-write-wins.
///
/// # Examples
///
/// ```
/// use satchel_core::{MemoryStore, Options, SessionData, SessionStore};
///
/// # tokio_test::block_on(async {
/// let store = MemoryStore::new();
///
/// let mut data = SessionData::new();
/// data.insert("user_id".to_string(), 123.into());
/// store.save("abc", &data, &Options::default()).await?;
///
/// assert_eq!(store.load("abc").await?, Some(data));
/// store.delete("abc").await?;
/// assert_eq!(store.load("abc").await?, None);
/// # Ok::<(), satchel_core::SessionError>(())
/// # }).unwrap();
/// ```
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Load the data stored for a session.
    ///
    /// Returns `Ok(None)` if the ID is unknown or has expired.
    async fn load(&self, session_id: &str) -> SessionResult<Option<SessionData>>;

    /// Persist the full data for a session, replacing any previous state.
    ///
    /// `options` are the ones in effect for this session; they decide the
    /// backend TTL.
    async fn save(
        &self,
        session_id: &str,
        data: &SessionData,
        options: &Options,
    ) -> SessionResult<()>;

    /// Remove all data for a session. Idempotent.
    async fn delete(&self, session_id: &str) -> SessionResult<()>;

    /// Set the default cookie and expiry settings for sessions that do not
    /// override them.
    fn options(&self, options: Options);

    /// The default settings.
    fn current_options(&self) -> Options;

    /// Check if a session exists and is valid.
    async fn exists(&self, session_id: &str) -> SessionResult<bool> {
        Ok(self.load(session_id).await?.is_some())
    }

    /// Whether session data travels inside the token instead of the backend.
    fn embeds_data(&self) -> bool {
        false
    }
}

/// Generate a new unique session ID.
///
/// IDs are random and never derived from session content.
pub fn generate_session_id() -> String {
    uuid::Uuid::new_v4().simple().to_string()
}
