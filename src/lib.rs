// Satchel - pluggable session storage for Rust
//
// This library provides signed, optionally encrypted session tokens with key
// rotation, on top of interchangeable storage backends.

// Re-export core functionality
pub use satchel_core::*;

// Re-export optional backends
#[cfg(feature = "redis")]
pub use satchel_redis;

#[cfg(feature = "redis")]
pub use satchel_redis::{RedisConfig, RedisPool, RedisStore};

/// Re-export commonly used types
pub mod prelude {
    pub use satchel_core::prelude::*;

    #[cfg(feature = "redis")]
    pub use satchel_redis::prelude::*;
}
