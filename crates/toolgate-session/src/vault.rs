//! Credential vault: AES-256-GCM encryption of credential blobs at rest.
//!
//! Blob layout is `nonce (12) ‖ tag (16) ‖ ciphertext`. Every call to
//! [`CredentialVault::encrypt`] draws a fresh random nonce from the OS
//! RNG; a nonce is never reused under the same key.

use aes_gcm::aead::{AeadCore, AeadInPlace, KeyInit, OsRng};
use aes_gcm::{Aes256Gcm, Key, Nonce, Tag};
use base64::{Engine, engine::general_purpose::STANDARD as BASE64};
use thiserror::Error;
use toolgate_core::EncryptedBlob;

const NONCE_SIZE: usize = 12;
const TAG_SIZE: usize = 16;
const KEY_SIZE: usize = 32;

/// Environment variable holding the base64-encoded 32-byte key.
pub const ENCRYPTION_KEY_ENV: &str = "TOOLGATE_ENCRYPTION_KEY";

/// Errors from key loading, encryption and decryption.
#[derive(Debug, Error)]
pub enum VaultError {
    #[error("Encryption key is not configured (set TOOLGATE_ENCRYPTION_KEY)")]
    MissingKey,

    #[error("Encryption key must be 32 bytes, got {0}")]
    InvalidKeyLength(usize),

    #[error("Encryption key is not valid base64: {0}")]
    InvalidKeyEncoding(#[from] base64::DecodeError),

    #[error("Encryption failed")]
    Encrypt,

    #[error("Credential blob failed authentication")]
    Decrypt,

    #[error("Credential blob is malformed: {0}")]
    Malformed(String),
}

/// Process-wide key material.
#[derive(Clone)]
pub struct EncryptionKey([u8; KEY_SIZE]);

impl EncryptionKey {
    /// Wrap raw key bytes; anything but exactly 32 bytes is rejected.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, VaultError> {
        let key: [u8; KEY_SIZE] = bytes
            .try_into()
            .map_err(|_| VaultError::InvalidKeyLength(bytes.len()))?;
        Ok(Self(key))
    }

    /// Decode a base64-encoded key.
    pub fn from_base64(encoded: &str) -> Result<Self, VaultError> {
        let trimmed = encoded.trim();
        if trimmed.is_empty() {
            return Err(VaultError::MissingKey);
        }
        let bytes = BASE64.decode(trimmed)?;
        Self::from_bytes(&bytes)
    }

    /// Load the key from [`ENCRYPTION_KEY_ENV`].
    ///
    /// There is no fallback key: an unset variable is an error.
    pub fn from_env() -> Result<Self, VaultError> {
        let value = std::env::var(ENCRYPTION_KEY_ENV).map_err(|_| VaultError::MissingKey)?;
        Self::from_base64(&value)
    }

    /// Generate a random key.
    pub fn generate() -> Self {
        let key = Aes256Gcm::generate_key(&mut OsRng);
        let mut bytes = [0u8; KEY_SIZE];
        bytes.copy_from_slice(&key);
        Self(bytes)
    }

    /// Base64 encoding suitable for [`ENCRYPTION_KEY_ENV`].
    pub fn to_base64(&self) -> String {
        BASE64.encode(self.0)
    }
}

impl std::fmt::Debug for EncryptionKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("EncryptionKey(..)")
    }
}

/// Authenticated encryption of small credential payloads.
pub struct CredentialVault {
    cipher: Aes256Gcm,
}

impl CredentialVault {
    /// Create a vault from loaded key material.
    pub fn new(key: &EncryptionKey) -> Self {
        let key = Key::<Aes256Gcm>::from_slice(&key.0);
        Self {
            cipher: Aes256Gcm::new(key),
        }
    }

    /// Create a vault from an optional key, refusing to start without one.
    pub fn from_optional_key(key: Option<&EncryptionKey>) -> Result<Self, VaultError> {
        key.map(Self::new).ok_or(VaultError::MissingKey)
    }

    /// Encrypt `plaintext` under a fresh random nonce.
    pub fn encrypt(&self, plaintext: &[u8]) -> Result<EncryptedBlob, VaultError> {
        let nonce = Aes256Gcm::generate_nonce(&mut OsRng);
        let mut buffer = plaintext.to_vec();
        let tag = self
            .cipher
            .encrypt_in_place_detached(&nonce, b"", &mut buffer)
            .map_err(|_| VaultError::Encrypt)?;

        let mut out = Vec::with_capacity(NONCE_SIZE + TAG_SIZE + buffer.len());
        out.extend_from_slice(&nonce);
        out.extend_from_slice(&tag);
        out.extend_from_slice(&buffer);
        Ok(EncryptedBlob::from_bytes(out))
    }

    /// Decrypt a blob; fails on truncation or any authentication mismatch.
    pub fn decrypt(&self, blob: &EncryptedBlob) -> Result<Vec<u8>, VaultError> {
        let bytes = blob.as_bytes();
        if bytes.len() < NONCE_SIZE + TAG_SIZE {
            return Err(VaultError::Malformed(format!(
                "expected at least {} bytes, got {}",
                NONCE_SIZE + TAG_SIZE,
                bytes.len()
            )));
        }

        let (nonce, rest) = bytes.split_at(NONCE_SIZE);
        let (tag, ciphertext) = rest.split_at(TAG_SIZE);
        let mut buffer = ciphertext.to_vec();
        self.cipher
            .decrypt_in_place_detached(
                Nonce::from_slice(nonce),
                b"",
                &mut buffer,
                Tag::from_slice(tag),
            )
            .map_err(|_| VaultError::Decrypt)?;
        Ok(buffer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vault() -> CredentialVault {
        CredentialVault::new(&EncryptionKey::generate())
    }

    #[test]
    fn test_round_trip() {
        let vault = vault();
        let plaintext = br#"{"api_key":"sk-123"}"#;
        let blob = vault.encrypt(plaintext).unwrap();
        assert_eq!(blob.len(), NONCE_SIZE + TAG_SIZE + plaintext.len());
        assert_eq!(vault.decrypt(&blob).unwrap(), plaintext);
    }

    #[test]
    fn test_round_trip_empty_plaintext() {
        let vault = vault();
        let blob = vault.encrypt(b"").unwrap();
        assert!(vault.decrypt(&blob).unwrap().is_empty());
    }

    #[test]
    fn test_fresh_nonce_per_call() {
        let vault = vault();
        let a = vault.encrypt(b"same").unwrap();
        let b = vault.encrypt(b"same").unwrap();
        assert_ne!(a.as_bytes()[..NONCE_SIZE], b.as_bytes()[..NONCE_SIZE]);
        assert_ne!(a, b);
    }

    #[test]
    fn test_every_single_bit_flip_fails() {
        let vault = vault();
        let blob = vault.encrypt(br#"{"db_token":"t0k"}"#).unwrap();
        let bytes = blob.as_bytes().to_vec();

        for index in 0..bytes.len() {
            for bit in 0..8 {
                let mut corrupted = bytes.clone();
                corrupted[index] ^= 1 << bit;
                let result = vault.decrypt(&EncryptedBlob::from_bytes(corrupted));
                assert!(
                    matches!(result, Err(VaultError::Decrypt)),
                    "flip at byte {index} bit {bit} was accepted"
                );
            }
        }
    }

    #[test]
    fn test_truncated_blob_is_malformed() {
        let vault = vault();
        let blob = vault.encrypt(b"secret").unwrap();
        let truncated = EncryptedBlob::from_bytes(blob.as_bytes()[..20].to_vec());
        assert!(matches!(vault.decrypt(&truncated), Err(VaultError::Malformed(_))));
    }

    #[test]
    fn test_wrong_key_fails() {
        let blob = vault().encrypt(b"secret").unwrap();
        assert!(matches!(vault().decrypt(&blob), Err(VaultError::Decrypt)));
    }

    #[test]
    fn test_key_from_base64() {
        let key = EncryptionKey::generate();
        let decoded = EncryptionKey::from_base64(&key.to_base64()).unwrap();
        let blob = CredentialVault::new(&key).encrypt(b"x").unwrap();
        assert_eq!(CredentialVault::new(&decoded).decrypt(&blob).unwrap(), b"x");
    }

    #[test]
    fn test_key_rejects_wrong_length() {
        let short = BASE64.encode([7u8; 16]);
        assert!(matches!(
            EncryptionKey::from_base64(&short),
            Err(VaultError::InvalidKeyLength(16))
        ));
    }

    #[test]
    fn test_missing_key_refuses_to_start() {
        assert!(matches!(EncryptionKey::from_base64("  "), Err(VaultError::MissingKey)));
        assert!(matches!(
            CredentialVault::from_optional_key(None),
            Err(VaultError::MissingKey)
        ));
    }

    #[test]
    fn test_key_debug_is_redacted() {
        let key = EncryptionKey::generate();
        assert_eq!(format!("{key:?}"), "EncryptionKey(..)");
    }
}
