//! Token-embedded session storage.

use crate::error::SessionResult;
use crate::options::Options;
use crate::store::{SessionData, SessionStore};
use async_trait::async_trait;
use parking_lot::RwLock;

/// Store that keeps session data inside the token itself.
///
/// Nothing is held server-side: the [`crate::SessionManager`] encodes the
/// full data into every token it issues and reads it back on resolve, so
/// the backend operations are no-ops. Pair with a key ring that carries an
/// encryption key unless the data may be visible to the client, and keep
/// payloads small enough for the codec's maximum token length.
#[derive(Default)]
pub struct CookieStore {
    options: RwLock<Options>,
}

impl CookieStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SessionStore for CookieStore {
    async fn load(&self, _session_id: &str) -> SessionResult<Option<SessionData>> {
        Ok(None)
    }

    async fn save(
        &self,
        _session_id: &str,
        _data: &SessionData,
        _options: &Options,
    ) -> SessionResult<()> {
        Ok(())
    }

    async fn delete(&self, _session_id: &str) -> SessionResult<()> {
        Ok(())
    }

    fn options(&self, options: Options) {
        *self.options.write() = options;
    }

    fn current_options(&self) -> Options {
        self.options.read().clone()
    }

    fn embeds_data(&self) -> bool {
        true
    }
}
