//! Text-safe transforms for the vector field of a gallery record.
//!
//! [`PlainBase64`] is the gallery file's native format. It is a reversible
//! encoding and gives no confidentiality: anyone holding the file can read
//! every descriptor. [`AesGcmCipher`] actually encrypts each record, at the
//! price of producing files that the plain format cannot read.

use aes_gcm::aead::{Aead, KeyInit};
use aes_gcm::{Aes256Gcm, Key, Nonce};
use base64::{engine::general_purpose::STANDARD, Engine};
use rand::RngCore;
use sha2::{Digest, Sha256};

use crate::error::DecodeError;

const NONCE_LEN: usize = 12;

/// Reversible transform between raw record bytes and a `|`-free text field.
pub trait VectorCipher: Send + Sync {
    /// Short name for logs and diagnostics.
    fn name(&self) -> &'static str;

    /// Turn the UTF-8 vector text into the persisted field.
    fn seal(&self, plaintext: &[u8]) -> Result<String, String>;

    /// Recover the bytes passed to [`seal`](Self::seal).
    fn open(&self, field: &str) -> Result<Vec<u8>, DecodeError>;
}

/// Standard-alphabet, padded base64. Compatible with existing gallery files.
#[derive(Debug, Clone, Copy, Default)]
pub struct PlainBase64;

impl VectorCipher for PlainBase64 {
    fn name(&self) -> &'static str {
        "plain"
    }

    fn seal(&self, plaintext: &[u8]) -> Result<String, String> {
        Ok(STANDARD.encode(plaintext))
    }

    fn open(&self, field: &str) -> Result<Vec<u8>, DecodeError> {
        Ok(STANDARD.decode(field)?)
    }
}

/// AES-256-GCM with a SHA-256 passphrase-derived key.
///
/// Each record is `base64(nonce || ciphertext)` with a fresh random nonce.
pub struct AesGcmCipher {
    cipher: Aes256Gcm,
}

impl AesGcmCipher {
    pub fn from_passphrase(passphrase: &str) -> Self {
        let digest = Sha256::digest(passphrase.as_bytes());
        let key = Key::<Aes256Gcm>::from_slice(digest.as_slice());
        Self {
            cipher: Aes256Gcm::new(key),
        }
    }
}

impl VectorCipher for AesGcmCipher {
    fn name(&self) -> &'static str {
        "aes-gcm"
    }

    fn seal(&self, plaintext: &[u8]) -> Result<String, String> {
        let mut nonce_bytes = [0u8; NONCE_LEN];
        rand::thread_rng().fill_bytes(&mut nonce_bytes);
        let sealed = self
            .cipher
            .encrypt(Nonce::from_slice(&nonce_bytes), plaintext)
            .map_err(|e| e.to_string())?;

        let mut out = Vec::with_capacity(NONCE_LEN + sealed.len());
        out.extend_from_slice(&nonce_bytes);
        out.extend_from_slice(&sealed);
        Ok(STANDARD.encode(out))
    }

    fn open(&self, field: &str) -> Result<Vec<u8>, DecodeError> {
        let raw = STANDARD.decode(field)?;
        if raw.len() < NONCE_LEN {
            return Err(DecodeError::Cipher(format!(
                "sealed field is {} bytes, shorter than the nonce",
                raw.len()
            )));
        }
        let (nonce, sealed) = raw.split_at(NONCE_LEN);
        self.cipher
            .decrypt(Nonce::from_slice(nonce), sealed)
            .map_err(|_| DecodeError::Cipher("authentication failed (wrong passphrase or corrupted record)".into()))
    }
}
