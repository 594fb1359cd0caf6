//! Integration tests for common session workflows.
//!
//! These drive the public facade the way request middleware would: resolve a
//! session from the incoming cookie, let a handler touch it, save it and send
//! back whatever cookie comes out.

use satchel::prelude::*;
use serde_json::json;
use std::sync::Arc;

// =============================================================================
// Helpers
// =============================================================================

fn key_pair(seed: u8, enc_len: Option<usize>) -> KeyPair {
    let pair = KeyPair::new(vec![seed; 32]);
    match enc_len {
        Some(len) => pair.with_encryption(vec![seed.wrapping_add(1); len]),
        None => pair,
    }
}

/// One simulated request: resolve, run the handler, save.
async fn request<F>(
    manager: &SessionManager,
    cookie: Option<&str>,
    handler: F,
) -> Option<SessionCookie>
where
    F: FnOnce(&mut Session),
{
    let mut session = manager.resolve(cookie).await.unwrap();
    handler(&mut session);
    session.save().await.unwrap()
}

// =============================================================================
// Login / logout
// =============================================================================

#[tokio::test]
async fn test_login_then_logout() {
    let store = Arc::new(MemoryStore::new());
    let codec = TokenCodec::new(vec![key_pair(7, Some(32))]).unwrap();
    let config = SessionConfig::new("app_session")
        .with_options(Options::default().with_http_only(true).with_same_site(SameSite::Lax));
    let manager = SessionManager::new(config, store.clone(), codec);

    let cookie = request(&manager, None, |s| {
        s.set("user_id", 42).unwrap();
    })
    .await
    .unwrap();
    let header = cookie.to_header_value();
    assert!(header.starts_with("app_session="));
    assert!(header.contains("; HttpOnly"));
    assert!(header.ends_with("; SameSite=Lax"));

    // Logged-in request sees the user and needs no new cookie
    let token = cookie.value;
    let mut user = None;
    let reply = request(&manager, Some(token.as_str()), |s| {
        user = s.get::<u64>("user_id").unwrap();
    })
    .await;
    assert_eq!(user, Some(42));
    assert!(reply.is_none());

    // Logout removes the stored session and the client's cookie
    let reply = request(&manager, Some(token.as_str()), |s| s.invalidate())
        .await
        .unwrap();
    assert!(reply.is_removal());
    assert!(store.is_empty().await);

    let session = manager.resolve(Some(token.as_str())).await.unwrap();
    assert!(session.is_new());
    assert!(session.is_empty());
}

#[tokio::test]
async fn test_regenerate_on_privilege_change() {
    let store = Arc::new(MemoryStore::new());
    let codec = TokenCodec::new(vec![key_pair(1, None)]).unwrap();
    let manager = SessionManager::new(SessionConfig::default(), store.clone(), codec);

    let anonymous = request(&manager, None, |s| {
        s.set("cart", json!(["book"])).unwrap();
    })
    .await
    .unwrap()
    .value;

    let mut session = manager.resolve(Some(anonymous.as_str())).await.unwrap();
    let old_id = session.id().to_string();
    session.regenerate();
    session.set("user_id", 7).unwrap();
    let fresh = session.save().await.unwrap().unwrap().value;

    assert_ne!(session.id(), old_id);
    assert!(!store.exists(&old_id).await.unwrap());

    let session = manager.resolve(Some(fresh.as_str())).await.unwrap();
    assert_eq!(session.get_value("cart"), Some(&json!(["book"])));
    assert_eq!(session.get::<i32>("user_id").unwrap(), Some(7));
}

// =============================================================================
// Key rotation
// =============================================================================

#[tokio::test]
async fn test_rolling_key_rotation_across_strengths() {
    let store = Arc::new(MemoryStore::new());
    let codec = TokenCodec::new(vec![key_pair(10, Some(16))]).unwrap();
    let v1 = SessionManager::new(SessionConfig::default(), store, codec);

    let token = request(&v1, None, |s| s.set("step", 1).unwrap())
        .await
        .unwrap()
        .value;

    // Deploy a new current key; the old one still verifies
    let v2 = v1.rotate(key_pair(20, Some(24))).unwrap();
    let reissued = request(&v2, Some(token.as_str()), |_| {}).await.unwrap().value;
    assert_eq!(v2.codec().decode(&reissued).unwrap().key_index, 0);

    // Then retire the old key entirely
    let ring = v2.codec().ring().retain_newest(1).unwrap();
    let v3 = SessionManager::new(
        SessionConfig::default(),
        Arc::clone(v2.store()),
        TokenCodec::from_ring(ring),
    );

    assert!(v3.resolve(Some(token.as_str())).await.unwrap().is_new());
    let session = v3.resolve(Some(reissued.as_str())).await.unwrap();
    assert_eq!(session.get::<i32>("step").unwrap(), Some(1));
}

// =============================================================================
// Token-embedded sessions
// =============================================================================

#[tokio::test]
async fn test_cookie_store_keeps_data_client_side() {
    let codec = TokenCodec::new(vec![key_pair(3, Some(32))]).unwrap();
    let manager = SessionManager::new(SessionConfig::default(), Arc::new(CookieStore::new()), codec);

    let mut token = request(&manager, None, |s| {
        s.add_flash("Welcome back").unwrap();
    })
    .await
    .unwrap()
    .value;
    assert!(!token.contains("Welcome"));

    let mut seen = Vec::new();
    token = request(&manager, Some(token.as_str()), |s| seen = s.flashes())
        .await
        .unwrap()
        .value;
    assert_eq!(seen, vec![json!("Welcome back")]);

    let session = manager.resolve(Some(token.as_str())).await.unwrap();
    assert!(session.is_empty());
}

// =============================================================================
// Facade
// =============================================================================

#[cfg(feature = "redis")]
#[test]
fn test_redis_backend_is_reexported() {
    let config = satchel::RedisConfig::new(8, "localhost:6379", "");
    assert_eq!(config.key_prefix, "session_");
}
