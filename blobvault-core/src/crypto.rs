//! Cryptographic primitives for BlobVault
//!
//! Provides:
//! - SHA-256 content hashing (source of blob identifiers)
//! - AES-128-CBC payload encryption with PKCS#7 padding
//!
//! The cipher mode carries no authentication tag. A corrupted or tampered
//! ciphertext is only rejected when its padding happens to be invalid;
//! otherwise it decrypts to garbage.

use crate::error::{Result, VaultError};
use aes::cipher::{block_padding::Pkcs7, BlockDecryptMut, BlockEncryptMut, KeyIvInit};
use base64::Engine;
use sha2::{Digest, Sha256};
use std::fmt;

type Aes128CbcEnc = cbc::Encryptor<aes::Aes128>;
type Aes128CbcDec = cbc::Decryptor<aes::Aes128>;

/// AES-128 key size (16 bytes)
pub const KEY_SIZE: usize = 16;

/// CBC initialisation vector size (one AES block)
pub const IV_SIZE: usize = 16;

/// AES block size
pub const BLOCK_SIZE: usize = 16;

/// SHA-256 digest size
pub const HASH_SIZE: usize = 32;

/// SHA-256 hash wrapper for content addressing
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct ContentHash([u8; HASH_SIZE]);

impl ContentHash {
    /// Compute SHA-256 hash of data
    pub fn compute(data: &[u8]) -> Self {
        Self(Sha256::digest(data).into())
    }

    /// Get the raw hash bytes
    pub fn as_bytes(&self) -> &[u8; HASH_SIZE] {
        &self.0
    }

    /// Verify that data matches this hash
    pub fn verify(&self, data: &[u8]) -> bool {
        Self::compute(data) == *self
    }
}

impl fmt::Debug for ContentHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let prefix: String = self.0[..8].iter().map(|b| format!("{:02x}", b)).collect();
        write!(f, "ContentHash({})", prefix)
    }
}

/// Per-file AES-128 session key
///
/// Lives for the duration of one transfer. Zeroed on drop, never serialized.
#[derive(Clone)]
pub struct SessionKey([u8; KEY_SIZE]);

impl SessionKey {
    /// Generate a new random session key
    pub fn generate() -> Self {
        use rand::RngCore;
        let mut key = [0u8; KEY_SIZE];
        rand::thread_rng().fill_bytes(&mut key);
        Self(key)
    }

    /// Create from raw bytes
    pub fn from_bytes(bytes: [u8; KEY_SIZE]) -> Self {
        Self(bytes)
    }

    /// Create from a slice (validates length)
    pub fn from_slice(slice: &[u8]) -> Result<Self> {
        if slice.len() != KEY_SIZE {
            return Err(VaultError::InvalidKeyLength {
                expected: KEY_SIZE,
                actual: slice.len(),
            });
        }
        let mut key = [0u8; KEY_SIZE];
        key.copy_from_slice(slice);
        Ok(Self(key))
    }

    /// Parse a standard base64 encoded key
    pub fn from_base64(encoded: &str) -> Result<Self> {
        let bytes = base64::engine::general_purpose::STANDARD
            .decode(encoded.trim())
            .map_err(|e| VaultError::Configuration(format!("invalid session key: {}", e)))?;
        Self::from_slice(&bytes)
    }

    /// Encode as standard base64 (for handing the key to its owner)
    pub fn to_base64(&self) -> String {
        base64::engine::general_purpose::STANDARD.encode(self.0)
    }

    /// Get the raw key bytes
    pub fn as_bytes(&self) -> &[u8; KEY_SIZE] {
        &self.0
    }
}

impl fmt::Debug for SessionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SessionKey([REDACTED])")
    }
}

impl Drop for SessionKey {
    fn drop(&mut self) {
        self.0.iter_mut().for_each(|b| *b = 0);
    }
}

/// Generate a random IV
pub fn random_iv() -> [u8; IV_SIZE] {
    use rand::RngCore;
    let mut iv = [0u8; IV_SIZE];
    rand::thread_rng().fill_bytes(&mut iv);
    iv
}

/// Ciphertext length for a plaintext of `plaintext_len` bytes (IV + padded body)
pub fn encrypted_len(plaintext_len: usize) -> usize {
    IV_SIZE + (plaintext_len / BLOCK_SIZE + 1) * BLOCK_SIZE
}

/// Encrypt with a fresh random IV. Output is `IV || ciphertext`.
pub fn encrypt(key: &SessionKey, plaintext: &[u8]) -> Result<Vec<u8>> {
    encrypt_with_iv(key, plaintext, &random_iv())
}

/// Encrypt with a caller supplied IV. Output is `IV || ciphertext`.
pub fn encrypt_with_iv(key: &SessionKey, plaintext: &[u8], iv: &[u8; IV_SIZE]) -> Result<Vec<u8>> {
    let encryptor = Aes128CbcEnc::new_from_slices(key.as_bytes(), iv)
        .map_err(|e| VaultError::Encryption(e.to_string()))?;

    let mut out = vec![0u8; encrypted_len(plaintext.len())];
    out[..IV_SIZE].copy_from_slice(iv);

    let body = &mut out[IV_SIZE..];
    body[..plaintext.len()].copy_from_slice(plaintext);
    let padded_len = encryptor
        .encrypt_padded_mut::<Pkcs7>(body, plaintext.len())
        .map_err(|e| VaultError::Encryption(e.to_string()))?
        .len();

    debug_assert_eq!(padded_len + IV_SIZE, out.len());
    Ok(out)
}

/// Decrypt `IV || ciphertext` produced by [`encrypt`]
pub fn decrypt(key: &SessionKey, data: &[u8]) -> Result<Vec<u8>> {
    if data.len() < IV_SIZE + BLOCK_SIZE {
        return Err(VaultError::Decryption(format!(
            "data too short for encrypted content: {} bytes",
            data.len()
        )));
    }
    if (data.len() - IV_SIZE) % BLOCK_SIZE != 0 {
        return Err(VaultError::Decryption(
            "ciphertext not aligned to block size".to_string(),
        ));
    }

    let (iv, body) = data.split_at(IV_SIZE);
    let decryptor = Aes128CbcDec::new_from_slices(key.as_bytes(), iv)
        .map_err(|e| VaultError::Decryption(e.to_string()))?;

    let mut buf = body.to_vec();
    let plaintext_len = decryptor
        .decrypt_padded_mut::<Pkcs7>(&mut buf)
        .map_err(|_| VaultError::Decryption("invalid padding".to_string()))?
        .len();
    buf.truncate(plaintext_len);

    Ok(buf)
}
