//! Resolving sessions from incoming tokens.

use crate::codec::TokenCodec;
use crate::config::SessionConfig;
use crate::error::SessionResult;
use crate::keyring::KeyPair;
use crate::session::Session;
use crate::store::SessionStore;
use std::sync::Arc;
use tracing::debug;

/// Entry point for the transport layer.
///
/// Middleware extracts the incoming token, calls [`SessionManager::resolve`],
/// hands the [`Session`] to the handler and writes back whatever cookie
/// [`Session::save`] returns. The manager itself never touches requests or
/// responses.
#[derive(Clone)]
pub struct SessionManager {
    config: SessionConfig,
    store: Arc<dyn SessionStore>,
    codec: Arc<TokenCodec>,
}

impl SessionManager {
    /// Create a manager.
    ///
    /// Applies `config.options` to the store and binds the codec to the
    /// configured cookie name and token limits.
    pub fn new(config: SessionConfig, store: Arc<dyn SessionStore>, codec: TokenCodec) -> Self {
        store.options(config.options.clone());
        let codec = Arc::new(Self::configure_codec(&config, codec));
        Self {
            config,
            store,
            codec,
        }
    }

    fn configure_codec(config: &SessionConfig, codec: TokenCodec) -> TokenCodec {
        let codec = codec
            .with_name(config.name.clone())
            .with_max_length(config.max_token_length);
        match config.token_max_age {
            Some(max_age) => codec.with_max_age(max_age),
            None => codec,
        }
    }

    /// Cookie name.
    pub fn name(&self) -> &str {
        &self.config.name
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn store(&self) -> &Arc<dyn SessionStore> {
        &self.store
    }

    pub fn codec(&self) -> &TokenCodec {
        &self.codec
    }

    /// A manager over the same store whose ring has `pair` as its current
    /// pair. Sessions already resolved keep using the ring they started with.
    pub fn rotate(&self, pair: KeyPair) -> SessionResult<Self> {
        let ring = self.codec.ring().rotate(pair)?;
        Ok(Self {
            config: self.config.clone(),
            store: Arc::clone(&self.store),
            codec: Arc::new(Self::configure_codec(
                &self.config,
                TokenCodec::from_ring(ring),
            )),
        })
    }

    /// A fresh session with a new random ID.
    pub fn new_session(&self) -> Session {
        Session::fresh(Arc::clone(&self.store), Arc::clone(&self.codec))
    }

    /// Resolve the session for an incoming token.
    ///
    /// A missing, invalid or expired token yields a fresh session; so does a
    /// valid token whose ID the store no longer knows, so clients cannot pick
    /// their own IDs. Store failures propagate.
    pub async fn resolve(&self, token: Option<&str>) -> SessionResult<Session> {
        let Some(token) = token.filter(|t| !t.is_empty()) else {
            return Ok(self.new_session());
        };

        let decoded = match self.codec.decode(token) {
            Ok(decoded) => decoded,
            Err(e) if e.is_token_error() => {
                debug!(error = %e, "Discarding session token");
                return Ok(self.new_session());
            }
            Err(e) => return Err(e),
        };
        let reissue = decoded.signed_with_previous_key();

        let data = if self.store.embeds_data() {
            decoded.data.unwrap_or_default()
        } else {
            match self.store.load(&decoded.id).await? {
                Some(data) => data,
                None => {
                    debug!("Session not found in store, starting a new one");
                    return Ok(self.new_session());
                }
            }
        };

        Ok(Session::loaded(
            decoded.id,
            data,
            reissue,
            Arc::clone(&self.store),
            Arc::clone(&self.codec),
        ))
    }
}
