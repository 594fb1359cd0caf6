//! Authentication/encryption key pairs and the rotation-aware key ring.
//!
//! Index 0 of a [`KeyRing`] is the current pair: every new token is signed
//! (and, when the pair carries an encryption key, encrypted) with it. All
//! pairs remain valid for decoding, so prepending a new pair rotates keys
//! without invalidating live sessions. Dropping a pair from the ring makes
//! its tokens permanently unverifiable.

use crate::error::{SessionError, SessionResult};
use aes_gcm::aead::consts::U12;
use aes_gcm::aead::{Aead, KeyInit};
use aes_gcm::aes::Aes192;
use aes_gcm::{Aes128Gcm, Aes256Gcm, AesGcm, Nonce};
use rand::RngCore;
use std::fmt;
use zeroize::{Zeroize, ZeroizeOnDrop};

type Aes192Gcm = AesGcm<Aes192, U12>;

/// Nonce length for every supported AES-GCM variant.
pub(crate) const NONCE_LEN: usize = 12;

/// A single authentication key with an optional encryption key.
///
/// The authentication key is required; 32 or 64 bytes are recommended.
/// The encryption key, if set, must be 16, 24 or 32 bytes and selects
/// AES-128, AES-192 or AES-256 respectively.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct KeyPair {
    auth_key: Vec<u8>,
    enc_key: Option<Vec<u8>>,
}

impl KeyPair {
    /// Create an authentication-only key pair.
    pub fn new(auth_key: impl Into<Vec<u8>>) -> Self {
        Self {
            auth_key: auth_key.into(),
            enc_key: None,
        }
    }

    /// Add an encryption key to the pair.
    pub fn with_encryption(mut self, enc_key: impl Into<Vec<u8>>) -> Self {
        self.enc_key = Some(enc_key.into());
        self
    }

    /// Build pairs from a flat list of keys taken two at a time.
    ///
    /// The first key of each pair authenticates, the second encrypts. The
    /// encryption key may be empty, or omitted entirely in the last pair.
    ///
    /// ```
    /// use satchel_core::KeyPair;
    ///
    /// let keys: [&[u8]; 3] = [b"new-auth-key", b"0123456789abcdef", b"old-auth-key"];
    /// let pairs = KeyPair::from_keys(&keys);
    /// assert_eq!(pairs.len(), 2);
    /// assert!(pairs[0].is_encrypted());
    /// assert!(!pairs[1].is_encrypted());
    /// ```
    pub fn from_keys(keys: &[&[u8]]) -> Vec<Self> {
        keys.chunks(2)
            .map(|chunk| {
                let pair = Self::new(chunk[0]);
                match chunk.get(1) {
                    Some(enc) if !enc.is_empty() => pair.with_encryption(*enc),
                    _ => pair,
                }
            })
            .collect()
    }

    /// Whether tokens signed with this pair are also encrypted.
    pub fn is_encrypted(&self) -> bool {
        self.enc_key.is_some()
    }

    pub(crate) fn auth_key(&self) -> &[u8] {
        &self.auth_key
    }
}

impl fmt::Debug for KeyPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyPair")
            .field("auth_key", &format_args!("[{} bytes redacted]", self.auth_key.len()))
            .field(
                "enc_key",
                &self.enc_key.as_ref().map(|k| format!("[{} bytes redacted]", k.len())),
            )
            .finish()
    }
}

/// AES-GCM cipher selected by the encryption key length.
#[derive(Clone)]
pub(crate) enum Cipher {
    Aes128(Aes128Gcm),
    Aes192(Aes192Gcm),
    Aes256(Aes256Gcm),
}

impl Cipher {
    fn new(key: &[u8]) -> SessionResult<Self> {
        let invalid = |_| SessionError::InvalidKeyLength(format!("{} bytes", key.len()));
        match key.len() {
            16 => Aes128Gcm::new_from_slice(key).map(Self::Aes128).map_err(invalid),
            24 => Aes192Gcm::new_from_slice(key).map(Self::Aes192).map_err(invalid),
            32 => Aes256Gcm::new_from_slice(key).map(Self::Aes256).map_err(invalid),
            n => Err(SessionError::InvalidKeyLength(format!(
                "encryption key must be 16, 24 or 32 bytes, got {n}"
            ))),
        }
    }

    /// Encrypt with a fresh random nonce, returning `nonce || ciphertext`.
    pub(crate) fn seal(&self, plaintext: &[u8]) -> SessionResult<Vec<u8>> {
        let mut nonce_bytes = [0u8; NONCE_LEN];
        rand::thread_rng().fill_bytes(&mut nonce_bytes);
        let nonce = Nonce::from_slice(&nonce_bytes);

        let ciphertext = match self {
            Self::Aes128(c) => c.encrypt(nonce, plaintext),
            Self::Aes192(c) => c.encrypt(nonce, plaintext),
            Self::Aes256(c) => c.encrypt(nonce, plaintext),
        }
        .map_err(|e| SessionError::Serialization(format!("encryption failed: {e}")))?;

        let mut sealed = Vec::with_capacity(NONCE_LEN + ciphertext.len());
        sealed.extend_from_slice(&nonce_bytes);
        sealed.extend_from_slice(&ciphertext);
        Ok(sealed)
    }

    /// Reverse of [`Cipher::seal`].
    pub(crate) fn open(&self, sealed: &[u8]) -> SessionResult<Vec<u8>> {
        if sealed.len() < NONCE_LEN {
            return Err(SessionError::InvalidToken("ciphertext too short".to_string()));
        }
        let (nonce_bytes, ciphertext) = sealed.split_at(NONCE_LEN);
        let nonce = Nonce::from_slice(nonce_bytes);

        match self {
            Self::Aes128(c) => c.decrypt(nonce, ciphertext),
            Self::Aes192(c) => c.decrypt(nonce, ciphertext),
            Self::Aes256(c) => c.decrypt(nonce, ciphertext),
        }
        .map_err(|_| SessionError::InvalidToken("decryption failed".to_string()))
    }
}

#[derive(Clone)]
pub(crate) struct KeyEntry {
    pub(crate) pair: KeyPair,
    pub(crate) cipher: Option<Cipher>,
}

impl KeyEntry {
    fn new(pair: KeyPair) -> SessionResult<Self> {
        if pair.auth_key.is_empty() {
            return Err(SessionError::InvalidKeyLength(
                "authentication key must not be empty".to_string(),
            ));
        }
        let cipher = pair.enc_key.as_deref().map(Cipher::new).transpose()?;
        Ok(Self { pair, cipher })
    }
}

/// Ordered, immutable list of key pairs.
///
/// Rotation never mutates a ring in place; [`KeyRing::rotate`] and
/// [`KeyRing::retain_newest`] return new rings so in-flight decodes keep
/// the ring they started with.
#[derive(Clone)]
pub struct KeyRing {
    entries: Vec<KeyEntry>,
}

impl KeyRing {
    /// Build a ring; the first pair becomes the current (signing) pair.
    pub fn new(pairs: Vec<KeyPair>) -> SessionResult<Self> {
        if pairs.is_empty() {
            return Err(SessionError::InvalidKeyLength(
                "key ring needs at least one key pair".to_string(),
            ));
        }
        let entries = pairs
            .into_iter()
            .map(KeyEntry::new)
            .collect::<SessionResult<Vec<_>>>()?;
        Ok(Self { entries })
    }

    /// Return a new ring with `pair` as the current pair and every
    /// existing pair kept for decoding.
    pub fn rotate(&self, pair: KeyPair) -> SessionResult<Self> {
        let mut entries = Vec::with_capacity(self.entries.len() + 1);
        entries.push(KeyEntry::new(pair)?);
        entries.extend(self.entries.iter().cloned());
        Ok(Self { entries })
    }

    /// Return a new ring holding only the `count` newest pairs.
    ///
    /// Tokens signed by the evicted pairs stop verifying.
    pub fn retain_newest(&self, count: usize) -> SessionResult<Self> {
        if count == 0 {
            return Err(SessionError::InvalidKeyLength(
                "key ring needs at least one key pair".to_string(),
            ));
        }
        Ok(Self {
            entries: self.entries.iter().take(count).cloned().collect(),
        })
    }

    /// Number of pairs in the ring.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Always false: a ring cannot be built empty.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// The pair used for new tokens.
    pub fn current(&self) -> &KeyPair {
        &self.entries[0].pair
    }

    pub(crate) fn current_entry(&self) -> &KeyEntry {
        &self.entries[0]
    }

    pub(crate) fn entries(&self) -> &[KeyEntry] {
        &self.entries
    }
}

impl fmt::Debug for KeyRing {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list()
            .entries(self.entries.iter().map(|e| &e.pair))
            .finish()
    }
}
