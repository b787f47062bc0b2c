//! Authenticated symmetric encryption for stored media blobs.
//!
//! Blobs are sealed as `nonce(12) || ciphertext || tag(16)` under
//! AES-256-GCM. The AES key is derived with PBKDF2-HMAC-SHA256 from the
//! caller's password material and a fresh per-object random salt; the salt
//! is the only derivation input the server keeps. Decryption fails closed:
//! a wrong key, wrong password, or flipped ciphertext bit yields
//! [`CryptoError::DecryptionFailed`], never corrupted plaintext.

use aes_gcm::aead::{Aead, KeyInit, OsRng};
use aes_gcm::{AeadCore, Aes256Gcm, Nonce};
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use pbkdf2::pbkdf2_hmac;
use rand::RngCore;
use sha2::Sha256;
use thiserror::Error;
use zeroize::Zeroizing;

/// AES-256 key length in bytes.
pub const KEY_LEN: usize = 32;

/// Per-object salt length in bytes.
pub const SALT_LEN: usize = 16;

/// AES-GCM nonce length in bytes, carried in the blob prefix.
pub const NONCE_LEN: usize = 12;

/// Resource key entropy in bytes (22 base64url chars).
pub const RESOURCE_KEY_LEN: usize = 16;

/// Canonical PBKDF2 iteration count. Configurable, but the stored blobs of
/// a deployment are only decryptable with the count they were sealed under.
pub const DEFAULT_PBKDF2_ITERATIONS: u32 = 100_000;

/// Errors from sealing and opening media blobs.
#[derive(Debug, Error)]
pub enum CryptoError {
    /// The blob is shorter than a nonce and cannot be opened.
    #[error("ciphertext too short")]
    Truncated,

    /// Authentication failed: wrong key material or tampered ciphertext.
    #[error("decryption failed (wrong key or corrupted data)")]
    DecryptionFailed,

    /// The cipher rejected the sealing operation.
    #[error("encryption failed: {0}")]
    EncryptionFailed(String),

    /// A key string was not valid URL-safe base64.
    #[error("invalid key encoding: {0}")]
    InvalidKeyEncoding(String),
}

/// Seals and opens media blobs with a configurable PBKDF2 iteration count.
#[derive(Clone)]
pub struct Encryptor {
    iterations: u32,
}

impl Default for Encryptor {
    fn default() -> Self {
        Self::new(DEFAULT_PBKDF2_ITERATIONS)
    }
}

impl std::fmt::Debug for Encryptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Encryptor")
            .field("iterations", &self.iterations)
            .finish()
    }
}

impl Encryptor {
    /// Create an encryptor with the given PBKDF2 iteration count. A zero
    /// count falls back to [`DEFAULT_PBKDF2_ITERATIONS`].
    #[must_use]
    pub fn new(iterations: u32) -> Self {
        Self {
            iterations: if iterations == 0 {
                DEFAULT_PBKDF2_ITERATIONS
            } else {
                iterations
            },
        }
    }

    /// Derive the AES key for the given password material and salt.
    ///
    /// The derived key is wiped from memory when dropped.
    fn derive_key(&self, password: &[u8], salt: &[u8]) -> Zeroizing<[u8; KEY_LEN]> {
        let mut key = Zeroizing::new([0u8; KEY_LEN]);
        pbkdf2_hmac::<Sha256>(password, salt, self.iterations, &mut *key);
        key
    }

    /// Encrypt `plaintext` under `password`, returning the sealed blob and
    /// the fresh salt it was derived with.
    ///
    /// The blob layout is `nonce || ciphertext || tag`; the salt must be
    /// stored alongside the resource metadata for decryption.
    pub fn encrypt(
        &self,
        plaintext: &[u8],
        password: &[u8],
    ) -> Result<(Vec<u8>, [u8; SALT_LEN]), CryptoError> {
        let mut salt = [0u8; SALT_LEN];
        rand::rngs::OsRng.fill_bytes(&mut salt);

        let key = self.derive_key(password, &salt);
        let cipher = Aes256Gcm::new_from_slice(&*key)
            .map_err(|e| CryptoError::EncryptionFailed(e.to_string()))?;
        let nonce = Aes256Gcm::generate_nonce(&mut OsRng);

        let sealed = cipher
            .encrypt(&nonce, plaintext)
            .map_err(|e| CryptoError::EncryptionFailed(e.to_string()))?;

        let mut blob = Vec::with_capacity(NONCE_LEN + sealed.len());
        blob.extend_from_slice(nonce.as_slice());
        blob.extend_from_slice(&sealed);

        Ok((blob, salt))
    }

    /// Decrypt a sealed blob with the stored salt and password material.
    pub fn decrypt(
        &self,
        blob: &[u8],
        salt: &[u8],
        password: &[u8],
    ) -> Result<Vec<u8>, CryptoError> {
        if blob.len() < NONCE_LEN {
            return Err(CryptoError::Truncated);
        }
        let (nonce, sealed) = blob.split_at(NONCE_LEN);

        let key = self.derive_key(password, salt);
        let cipher = Aes256Gcm::new_from_slice(&*key)
            .map_err(|_| CryptoError::DecryptionFailed)?;

        cipher
            .decrypt(Nonce::from_slice(nonce), sealed)
            .map_err(|_| CryptoError::DecryptionFailed)
    }
}

/// Generate a fresh 32-byte encryption key from the OS RNG.
#[must_use]
pub fn generate_key() -> [u8; KEY_LEN] {
    let mut key = [0u8; KEY_LEN];
    rand::rngs::OsRng.fill_bytes(&mut key);
    key
}

/// Generate a fresh resource key: 16 random bytes as un-padded base64url.
#[must_use]
pub fn generate_resource_key() -> String {
    let mut raw = [0u8; RESOURCE_KEY_LEN];
    rand::rngs::OsRng.fill_bytes(&mut raw);
    URL_SAFE_NO_PAD.encode(raw)
}

/// Encode key bytes as un-padded base64url, the canonical fragment form.
#[must_use]
pub fn encode_key(key: &[u8]) -> String {
    URL_SAFE_NO_PAD.encode(key)
}

/// Decode a base64url key, tolerating the padded variant.
///
/// Historical share URLs carry padded fragments; trailing `=` is stripped
/// before decoding so both flavors round-trip.
pub fn decode_key(encoded: &str) -> Result<Vec<u8>, CryptoError> {
    URL_SAFE_NO_PAD
        .decode(encoded.trim_end_matches('='))
        .map_err(|e| CryptoError::InvalidKeyEncoding(e.to_string()))
}
