//! Cipher contracts.
//!
//! `MetadataCipher` encrypts remote metadata entries under a node key, `EncryptionContext`
//! encrypts individual wallet document fields under the second password. Both produce
//! base64 text so the results can be stored in JSON as-is.

use crate::error::CipherError;
use aes_gcm::{
    aead::{Aead, KeyInit},
    Aes256Gcm, Key, Nonce,
};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use rand::rngs::OsRng;
use rand::RngCore;
use sha2::Sha256;
use std::fmt;
use zeroize::Zeroizing;

const NONCE_LEN: usize = 12;
const SALT_LEN: usize = 16;

/// Symmetric cipher for metadata entries.
pub trait MetadataCipher: Send + Sync {
    fn encrypt(&self, key: &[u8; 32], plaintext: &str) -> Result<String, CipherError>;
    fn decrypt(&self, key: &[u8; 32], ciphertext: &str) -> Result<String, CipherError>;
}

/// Field-level encryption of a double-encrypted wallet document.
pub trait EncryptionContext: Send + Sync {
    fn encrypt(&self, plaintext: &str) -> Result<String, CipherError>;
    fn decrypt(&self, ciphertext: &str) -> Result<String, CipherError>;
}

/// AES-256-GCM; output is base64(nonce ‖ ciphertext).
#[derive(Clone, Copy, Debug, Default)]
pub struct AesGcmCipher;

impl AesGcmCipher {
    fn seal(key: &[u8; 32], plaintext: &[u8]) -> Result<Vec<u8>, CipherError> {
        let mut nonce_bytes = [0u8; NONCE_LEN];
        OsRng.fill_bytes(&mut nonce_bytes);
        let nonce = Nonce::from_slice(&nonce_bytes);

        let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(key));
        let ciphertext = cipher
            .encrypt(nonce, plaintext)
            .map_err(|e| CipherError::EncryptionFailed(format!("{:?}", e)))?;

        let mut sealed = Vec::with_capacity(NONCE_LEN + ciphertext.len());
        sealed.extend_from_slice(&nonce_bytes);
        sealed.extend_from_slice(&ciphertext);
        Ok(sealed)
    }

    fn open(key: &[u8; 32], sealed: &[u8]) -> Result<Zeroizing<Vec<u8>>, CipherError> {
        if sealed.len() < NONCE_LEN {
            return Err(CipherError::DecryptionFailed("ciphertext too short".into()));
        }
        let (nonce_bytes, ciphertext) = sealed.split_at(NONCE_LEN);

        let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(key));
        cipher
            .decrypt(Nonce::from_slice(nonce_bytes), ciphertext)
            .map(Zeroizing::new)
            .map_err(|e| CipherError::DecryptionFailed(format!("{:?}", e)))
    }

    fn utf8(bytes: Zeroizing<Vec<u8>>) -> Result<String, CipherError> {
        String::from_utf8(bytes.to_vec())
            .map_err(|e| CipherError::DecryptionFailed(format!("plaintext is not utf-8: {}", e)))
    }
}

impl MetadataCipher for AesGcmCipher {
    fn encrypt(&self, key: &[u8; 32], plaintext: &str) -> Result<String, CipherError> {
        Ok(STANDARD.encode(Self::seal(key, plaintext.as_bytes())?))
    }

    fn decrypt(&self, key: &[u8; 32], ciphertext: &str) -> Result<String, CipherError> {
        let sealed = STANDARD.decode(ciphertext.trim())?;
        Self::utf8(Self::open(key, &sealed)?)
    }
}

/// Second-password field encryption.
///
/// Each field gets its own random salt; the AES key is PBKDF2-HMAC-SHA256 of the password
/// with the document's `pbkdf2_iterations`. Output is base64(salt ‖ nonce ‖ ciphertext).
pub struct SecondPasswordEncryption {
    password: Zeroizing<String>,
    iterations: u32,
}

impl SecondPasswordEncryption {
    pub fn new(password: impl Into<String>, iterations: u32) -> Self {
        Self {
            password: Zeroizing::new(password.into()),
            iterations: iterations.max(1),
        }
    }

    fn stretch(&self, salt: &[u8]) -> Zeroizing<[u8; 32]> {
        let mut key = Zeroizing::new([0u8; 32]);
        pbkdf2::pbkdf2_hmac::<Sha256>(self.password.as_bytes(), salt, self.iterations, key.as_mut());
        key
    }
}

impl EncryptionContext for SecondPasswordEncryption {
    fn encrypt(&self, plaintext: &str) -> Result<String, CipherError> {
        let mut salt = [0u8; SALT_LEN];
        OsRng.fill_bytes(&mut salt);
        let key = self.stretch(&salt);

        let sealed = AesGcmCipher::seal(&key, plaintext.as_bytes())?;
        let mut out = Vec::with_capacity(SALT_LEN + sealed.len());
        out.extend_from_slice(&salt);
        out.extend_from_slice(&sealed);
        Ok(STANDARD.encode(out))
    }

    fn decrypt(&self, ciphertext: &str) -> Result<String, CipherError> {
        let raw = STANDARD.decode(ciphertext.trim())?;
        if raw.len() < SALT_LEN + NONCE_LEN {
            return Err(CipherError::DecryptionFailed("ciphertext too short".into()));
        }
        let (salt, sealed) = raw.split_at(SALT_LEN);
        let key = self.stretch(salt);
        AesGcmCipher::utf8(AesGcmCipher::open(&key, sealed)?)
    }
}

impl fmt::Debug for SecondPasswordEncryption {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SecondPasswordEncryption")
            .field("iterations", &self.iterations)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_aes_gcm_round_trip() {
        let key = [7u8; 32];
        let cipher = AesGcmCipher;
        let sealed = cipher.encrypt(&key, r#"{"metadata":"xprv"}"#).unwrap();
        assert_ne!(sealed, cipher.encrypt(&key, r#"{"metadata":"xprv"}"#).unwrap());
        assert_eq!(cipher.decrypt(&key, &sealed).unwrap(), r#"{"metadata":"xprv"}"#);
    }

    #[test]
    fn test_aes_gcm_wrong_key() {
        let cipher = AesGcmCipher;
        let sealed = cipher.encrypt(&[1u8; 32], "secret").unwrap();
        assert!(matches!(
            cipher.decrypt(&[2u8; 32], &sealed),
            Err(CipherError::DecryptionFailed(_))
        ));
    }

    #[test]
    fn test_aes_gcm_malformed_input() {
        let cipher = AesGcmCipher;
        assert!(matches!(
            cipher.decrypt(&[1u8; 32], "not base64!"),
            Err(CipherError::Encoding(_))
        ));
        assert!(matches!(
            cipher.decrypt(&[1u8; 32], "AAAA"),
            Err(CipherError::DecryptionFailed(_))
        ));
    }

    #[test]
    fn test_second_password_round_trip() {
        let context = SecondPasswordEncryption::new("hunter2", 10);
        let sealed = context.encrypt("xprv9s21ZrQH143K").unwrap();
        assert_eq!(context.decrypt(&sealed).unwrap(), "xprv9s21ZrQH143K");

        let wrong = SecondPasswordEncryption::new("hunter3", 10);
        assert!(wrong.decrypt(&sealed).is_err());
    }

    #[test]
    fn test_second_password_debug_is_redacted() {
        let context = SecondPasswordEncryption::new("hunter2", 5000);
        let debug = format!("{:?}", context);
        assert!(!debug.contains("hunter2"));
        assert!(debug.contains("5000"));
    }
}
