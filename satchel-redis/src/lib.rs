//! # Satchel Redis
//!
//! Redis session backend for satchel.
//!
//! ## Features
//!
//! - **Connection Pooling**: bb8-managed multiplexed connections
//! - **Key Prefixes**: namespace sessions per application (`session_` by default)
//! - **Native Expiry**: sessions are written with `SET ... EX`, Redis drops them
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use satchel_core::prelude::*;
//! use satchel_redis::{RedisConfig, RedisStore};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> SessionResult<()> {
//!     let config = RedisConfig::from_env().pool_size(10).build();
//!     let store = Arc::new(RedisStore::connect(config).await?);
//!
//!     let codec = TokenCodec::new(vec![KeyPair::new(b"secret-authentication-key".to_vec())])?;
//!     let manager = SessionManager::new(SessionConfig::default(), store, codec);
//!
//!     let mut session = manager.resolve(None).await?;
//!     session.set("user_id", 42)?;
//!     if let Some(cookie) = session.save().await? {
//!         println!("Set-Cookie: {}", cookie.to_header_value());
//!     }
//!
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod pool;
pub mod store;

pub use config::{DEFAULT_KEY_PREFIX, RedisConfig, RedisConfigBuilder};
pub use pool::{RedisPool, RedisPoolBuilder};
pub use store::RedisStore;

/// Re-export commonly used types
pub mod prelude {
    pub use crate::config::RedisConfig;
    pub use crate::pool::RedisPool;
    pub use crate::store::RedisStore;
}
