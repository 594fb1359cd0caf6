//! Pluggable session storage with signed, optionally encrypted tokens.
//!
//! A session is a per-request key/value map identified by an opaque token the
//! client holds in a cookie. The token is authenticated with HMAC-SHA256 and,
//! when the key pair carries an encryption key, encrypted with AES-GCM. Keys
//! live in an ordered [`KeyRing`] so they can be rotated without logging
//! everybody out.
//!
//! Session data lives in a [`SessionStore`] backend:
//!
//! - [`MemoryStore`] - process-local map with expiry
//! - [`CookieStore`] - data embedded in the token itself
//! - `RedisStore` - distributed cache (`satchel-redis`)
//!
//! # Examples
//!
//! ```
//! use satchel_core::*;
//! use std::sync::Arc;
//!
//! # tokio_test::block_on(async {
//! let codec = TokenCodec::new(vec![
//!     KeyPair::new(b"a-64-byte-authentication-key-is-recommended-for-hmac-sha256-use".to_vec())
//!         .with_encryption(b"0123456789abcdef0123456789abcdef".to_vec()),
//! ])?;
//! let store = Arc::new(MemoryStore::new());
//! let manager = SessionManager::new(SessionConfig::new("mysession"), store, codec);
//!
//! // First request: no cookie yet.
//! let mut session = manager.resolve(None).await?;
//! session.set("count", 0)?;
//! let cookie = session.save().await?.unwrap();
//! assert!(cookie.to_header_value().starts_with("mysession="));
//!
//! // Next request presents the token.
//! let mut session = manager.resolve(Some(cookie.value.as_str())).await?;
//! let count: i64 = session.get("count")?.unwrap_or(0);
//! session.set("count", count + 1)?;
//! session.save().await?;
//! # Ok::<(), SessionError>(())
//! # }).unwrap();
//! ```

pub mod codec;
pub mod config;
pub mod cookie;
pub mod error;
pub mod keyring;
pub mod manager;
pub mod memory;
pub mod options;
pub mod session;
pub mod store;

pub use codec::{DecodedToken, TokenCodec};
pub use config::SessionConfig;
pub use cookie::CookieStore;
pub use error::{SessionError, SessionResult};
pub use keyring::{KeyPair, KeyRing};
pub use manager::SessionManager;
pub use memory::MemoryStore;
pub use options::{
    DEFAULT_MAX_AGE, DEFAULT_STORE_TTL, MAX_STORE_TTL, Options, SameSite, SessionCookie,
};
pub use session::{FLASH_KEY, Session};
pub use store::{SessionData, SessionStore, generate_session_id};

/// Re-export commonly used types
pub mod prelude {
    pub use crate::codec::TokenCodec;
    pub use crate::config::SessionConfig;
    pub use crate::cookie::CookieStore;
    pub use crate::error::{SessionError, SessionResult};
    pub use crate::keyring::{KeyPair, KeyRing};
    pub use crate::manager::SessionManager;
    pub use crate::memory::MemoryStore;
    pub use crate::options::{Options, SameSite, SessionCookie};
    pub use crate::session::Session;
    pub use crate::store::{SessionData, SessionStore};
}
