//! Snapshot encryption using AES-256-GCM.

use crate::error::{BackupError, BackupResult};
use aes_gcm::{
    aead::{generic_array::GenericArray, Aead, KeyInit},
    Aes256Gcm, Nonce,
};
use rand::RngCore;
use zeroize::{Zeroize, ZeroizeOnDrop};

/// Size of the AES-256 key in bytes.
pub const KEY_SIZE: usize = 32;
/// Size of the GCM nonce in bytes.
pub const NONCE_SIZE: usize = 12;
/// Size of the GCM authentication tag in bytes.
pub const TAG_SIZE: usize = 16;

/// Encryption key for backup payloads.
///
/// Zeroized on drop.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct BackupKey {
    bytes: [u8; KEY_SIZE],
}

impl BackupKey {
    /// Generates a new random key.
    #[must_use]
    pub fn generate() -> Self {
        let mut bytes = [0u8; KEY_SIZE];
        rand::thread_rng().fill_bytes(&mut bytes);
        Self { bytes }
    }

    /// Creates a key from raw bytes.
    ///
    /// # Errors
    ///
    /// Returns an error unless the slice is exactly 32 bytes.
    pub fn from_bytes(bytes: &[u8]) -> BackupResult<Self> {
        if bytes.len() != KEY_SIZE {
            return Err(BackupError::Crypto(format!(
                "key must be {KEY_SIZE} bytes, got {}",
                bytes.len()
            )));
        }
        let mut key_bytes = [0u8; KEY_SIZE];
        key_bytes.copy_from_slice(bytes);
        Ok(Self { bytes: key_bytes })
    }

    /// Derives a key from a passphrase using HKDF-SHA256.
    ///
    /// HKDF is appropriate when the passphrase already has high entropy;
    /// user-chosen passwords should be stretched first.
    pub fn derive_from_passphrase(passphrase: &[u8], salt: &[u8]) -> BackupResult<Self> {
        use hkdf::Hkdf;
        use sha2::Sha256;

        let hk = Hkdf::<Sha256>::new(Some(salt), passphrase);
        let mut bytes = [0u8; KEY_SIZE];
        hk.expand(b"satchel-backup-key-v1", &mut bytes)
            .map_err(|_| BackupError::Crypto("HKDF expand failed".into()))?;
        Ok(Self { bytes })
    }

    /// Returns the key material. Do not log or persist the result.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8; KEY_SIZE] {
        &self.bytes
    }
}

impl std::fmt::Debug for BackupKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BackupKey")
            .field("bytes", &"[REDACTED]")
            .finish()
    }
}

/// Encrypts and decrypts snapshot payloads.
///
/// Output format: `nonce (12 bytes) || ciphertext || tag (16 bytes)`,
/// with a fresh random nonce per encryption.
pub struct BackupCipher {
    cipher: Aes256Gcm,
}

impl BackupCipher {
    /// Creates a cipher from the given key.
    #[must_use]
    pub fn new(key: &BackupKey) -> Self {
        let cipher = Aes256Gcm::new(GenericArray::from_slice(key.as_bytes()));
        Self { cipher }
    }

    /// Encrypts a payload, prepending the nonce.
    pub fn encrypt(&self, plaintext: &[u8]) -> BackupResult<Vec<u8>> {
        let mut nonce_bytes = [0u8; NONCE_SIZE];
        rand::thread_rng().fill_bytes(&mut nonce_bytes);
        let nonce = Nonce::from_slice(&nonce_bytes);

        let ciphertext = self
            .cipher
            .encrypt(nonce, plaintext)
            .map_err(|_| BackupError::Crypto("encryption failed".into()))?;

        let mut result = Vec::with_capacity(NONCE_SIZE + ciphertext.len());
        result.extend_from_slice(&nonce_bytes);
        result.extend(ciphertext);
        Ok(result)
    }

    /// Decrypts a payload produced by [`encrypt`](Self::encrypt).
    ///
    /// # Errors
    ///
    /// Fails on a wrong key, a truncated payload, or any bit flip in
    /// the ciphertext (GCM authenticates the whole message).
    pub fn decrypt(&self, ciphertext: &[u8]) -> BackupResult<Vec<u8>> {
        if ciphertext.len() < NONCE_SIZE + TAG_SIZE {
            return Err(BackupError::Crypto("ciphertext too short".into()));
        }
        let nonce = Nonce::from_slice(&ciphertext[..NONCE_SIZE]);
        self.cipher
            .decrypt(nonce, &ciphertext[NONCE_SIZE..])
            .map_err(|_| BackupError::Crypto("decryption failed".into()))
    }
}

impl std::fmt::Debug for BackupCipher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BackupCipher")
            .field("cipher", &"Aes256Gcm")
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roundtrip() {
        let key = BackupKey::generate();
        let cipher = BackupCipher::new(&key);

        let plaintext = b"snapshot payload";
        let ciphertext = cipher.encrypt(plaintext).unwrap();
        assert_ne!(&ciphertext[NONCE_SIZE..], plaintext);
        assert_eq!(cipher.decrypt(&ciphertext).unwrap(), plaintext);
    }

    #[test]
    fn fresh_nonce_per_encryption() {
        let key = BackupKey::generate();
        let cipher = BackupCipher::new(&key);
        let ct1 = cipher.encrypt(b"same").unwrap();
        let ct2 = cipher.encrypt(b"same").unwrap();
        assert_ne!(ct1, ct2);
    }

    #[test]
    fn wrong_key_fails() {
        let ciphertext = BackupCipher::new(&BackupKey::generate())
            .encrypt(b"secret")
            .unwrap();
        let other = BackupCipher::new(&BackupKey::generate());
        assert!(other.decrypt(&ciphertext).is_err());
    }

    #[test]
    fn corrupted_ciphertext_fails() {
        let key = BackupKey::generate();
        let cipher = BackupCipher::new(&key);
        let mut ciphertext = cipher.encrypt(b"data").unwrap();
        let last = ciphertext.len() - 1;
        ciphertext[last] ^= 0xFF;
        assert!(cipher.decrypt(&ciphertext).is_err());
    }

    #[test]
    fn truncated_ciphertext_fails() {
        let cipher = BackupCipher::new(&BackupKey::generate());
        assert!(cipher.decrypt(&[0u8; 10]).is_err());
    }

    #[test]
    fn key_size_is_enforced() {
        assert!(BackupKey::from_bytes(&[0u8; 16]).is_err());
        assert!(BackupKey::from_bytes(&[0u8; 32]).is_ok());
    }

    #[test]
    fn passphrase_derivation_is_deterministic() {
        let a = BackupKey::derive_from_passphrase(b"phrase", b"salt").unwrap();
        let b = BackupKey::derive_from_passphrase(b"phrase", b"salt").unwrap();
        let c = BackupKey::derive_from_passphrase(b"phrase", b"other").unwrap();
        assert_eq!(a.as_bytes(), b.as_bytes());
        assert_ne!(a.as_bytes(), c.as_bytes());
    }
}
