//! Secure token codec.
//!
//! A token is `base64url(content) "." base64url(mac)` where the MAC is
//! HMAC-SHA256 over `name "|" base64url(content)` with the current pair's
//! authentication key. `content` is the JSON token body, or
//! `nonce || AES-GCM(body)` when the current pair carries an encryption key.

use crate::error::{SessionError, SessionResult};
use crate::keyring::{KeyEntry, KeyPair, KeyRing};
use crate::store::SessionData;
use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};
use chrono::Utc;
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use std::time::Duration;

type HmacSha256 = Hmac<Sha256>;

/// Default cookie name tokens are bound to.
pub const DEFAULT_NAME: &str = "session";

/// Browsers reliably accept cookies up to this size.
pub const DEFAULT_MAX_LENGTH: usize = 4096;

#[derive(Serialize, Deserialize)]
struct TokenBody {
    id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    data: Option<SessionData>,
    iat: i64,
}

/// Result of a successful [`TokenCodec::decode`].
#[derive(Debug, Clone)]
pub struct DecodedToken {
    /// Session identifier carried by the token
    pub id: String,
    /// Session data, for tokens that embed it
    pub data: Option<SessionData>,
    /// Ring position of the pair that verified the token (0 = current)
    pub key_index: usize,
}

impl DecodedToken {
    /// Whether the token was produced under a pair that is no longer current.
    pub fn signed_with_previous_key(&self) -> bool {
        self.key_index > 0
    }
}

/// Encodes and verifies session tokens with a [`KeyRing`].
///
/// Read-only after construction and safe to share between sessions.
///
/// # Examples
///
/// ```
/// use satchel_core::{KeyPair, TokenCodec};
///
/// let codec = TokenCodec::new(vec![
///     KeyPair::new(b"an-authentication-key-of-32-byte".to_vec())
///         .with_encryption(b"0123456789abcdef0123456789abcdef".to_vec()),
/// ])
/// .unwrap();
///
/// let token = codec.encode("s1", None).unwrap();
/// assert_eq!(codec.decode(&token).unwrap().id, "s1");
/// ```
#[derive(Debug, Clone)]
pub struct TokenCodec {
    ring: KeyRing,
    name: String,
    max_age: Option<Duration>,
    max_length: usize,
}

impl TokenCodec {
    /// Create a codec from key pairs; index 0 signs new tokens.
    pub fn new(pairs: Vec<KeyPair>) -> SessionResult<Self> {
        Ok(Self::from_ring(KeyRing::new(pairs)?))
    }

    /// Create a codec over an existing ring.
    pub fn from_ring(ring: KeyRing) -> Self {
        Self {
            ring,
            name: DEFAULT_NAME.to_string(),
            max_age: None,
            max_length: DEFAULT_MAX_LENGTH,
        }
    }

    /// Bind tokens to a cookie name.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Reject tokens issued longer ago than `max_age`.
    pub fn with_max_age(mut self, max_age: Duration) -> Self {
        self.max_age = Some(max_age);
        self
    }

    /// Set the maximum encoded token length.
    pub fn with_max_length(mut self, max_length: usize) -> Self {
        self.max_length = max_length;
        self
    }

    /// The key ring used by this codec.
    pub fn ring(&self) -> &KeyRing {
        &self.ring
    }

    /// The cookie name tokens are bound to.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Encode a session identifier, and optionally its data, into a token.
    pub fn encode(&self, id: &str, data: Option<&SessionData>) -> SessionResult<String> {
        let body = TokenBody {
            id: id.to_string(),
            data: data.cloned(),
            iat: Utc::now().timestamp(),
        };
        let json =
            serde_json::to_vec(&body).map_err(|e| SessionError::Serialization(e.to_string()))?;

        let entry = self.ring.current_entry();
        let content = match &entry.cipher {
            Some(cipher) => cipher.seal(&json)?,
            None => json,
        };
        let content = URL_SAFE_NO_PAD.encode(content);
        let mac = URL_SAFE_NO_PAD.encode(self.sign(entry, &content)?);

        let token = format!("{content}.{mac}");
        if token.len() > self.max_length {
            return Err(SessionError::TokenTooLong(token.len()));
        }
        Ok(token)
    }

    /// Verify and decode a token.
    ///
    /// Pairs are tried in ring order; the first whose MAC verifies is used to
    /// decrypt (if it has an encryption key).
    pub fn decode(&self, token: &str) -> SessionResult<DecodedToken> {
        if token.len() > self.max_length {
            return Err(SessionError::InvalidToken(
                "token exceeds maximum length".to_string(),
            ));
        }

        let (content, mac) = token
            .split_once('.')
            .ok_or_else(|| SessionError::InvalidToken("missing signature".to_string()))?;
        let mac = URL_SAFE_NO_PAD
            .decode(mac)
            .map_err(|e| SessionError::InvalidToken(e.to_string()))?;

        let (key_index, entry) = self
            .ring
            .entries()
            .iter()
            .enumerate()
            .find(|(_, entry)| self.verify(entry, content, &mac))
            .ok_or_else(|| {
                SessionError::InvalidToken("no key pair in the ring verifies the token".to_string())
            })?;

        let content = URL_SAFE_NO_PAD
            .decode(content)
            .map_err(|e| SessionError::InvalidToken(e.to_string()))?;
        let json = match &entry.cipher {
            Some(cipher) => cipher.open(&content)?,
            None => content,
        };
        let body: TokenBody = serde_json::from_slice(&json)
            .map_err(|e| SessionError::InvalidToken(e.to_string()))?;

        if let Some(max_age) = self.max_age {
            let age = Utc::now().timestamp() - body.iat;
            if age > max_age.as_secs() as i64 {
                return Err(SessionError::Expired(format!(
                    "issued {age}s ago, limit is {}s",
                    max_age.as_secs()
                )));
            }
        }

        Ok(DecodedToken {
            id: body.id,
            data: body.data,
            key_index,
        })
    }

    fn mac(&self, entry: &KeyEntry, content: &str) -> SessionResult<HmacSha256> {
        let mut mac = HmacSha256::new_from_slice(entry.pair.auth_key())
            .map_err(|e| SessionError::InvalidKeyLength(e.to_string()))?;
        mac.update(self.name.as_bytes());
        mac.update(b"|");
        mac.update(content.as_bytes());
        Ok(mac)
    }

    fn sign(&self, entry: &KeyEntry, content: &str) -> SessionResult<Vec<u8>> {
        Ok(self.mac(entry, content)?.finalize().into_bytes().to_vec())
    }

    /// Constant-time MAC comparison.
    fn verify(&self, entry: &KeyEntry, content: &str, mac: &[u8]) -> bool {
        self.mac(entry, content)
            .map(|m| m.verify_slice(mac).is_ok())
            .unwrap_or(false)
    }
}
