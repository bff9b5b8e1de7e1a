use thiserror::Error;

/// Errors raised while deriving keys.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum DerivationError {
    #[error("Invalid seed: {0}")]
    InvalidSeed(String),

    #[error("Unsupported purpose: {0}")]
    UnsupportedPurpose(u32),

    #[error("Invalid extended key: {0}")]
    InvalidKey(String),

    #[error("Missing credentials: {0}")]
    MissingCredentials(&'static str),

    #[error("BIP32 error: {0}")]
    Bip32(String),

    #[error("Address encoding failed: {0}")]
    AddressEncoding(String),
}

impl From<bip32::Error> for DerivationError {
    fn from(e: bip32::Error) -> Self {
        DerivationError::Bip32(e.to_string())
    }
}

/// Errors raised by the metadata and second-password ciphers.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum CipherError {
    #[error("Encryption failed: {0}")]
    EncryptionFailed(String),

    #[error("Decryption failed: {0}")]
    DecryptionFailed(String),

    #[error("Invalid ciphertext encoding: {0}")]
    Encoding(String),
}

impl From<base64::DecodeError> for CipherError {
    fn from(e: base64::DecodeError) -> Self {
        CipherError::Encoding(e.to_string())
    }
}
