use thiserror::Error;

/// Errors that can occur while reading or writing wallet types.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum TypesError {
    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Unknown derivation purpose: {0}")]
    UnknownPurpose(u32),

    #[error("Unknown derivation type: {0}")]
    UnknownDerivationType(String),

    #[error("Duplicate address label index {index} in {derivation} derivation")]
    DuplicateAddressLabel { derivation: String, index: u32 },

    #[error("Wallet has no HD wallet")]
    MissingHdWallet,
}

impl From<serde_json::Error> for TypesError {
    fn from(e: serde_json::Error) -> Self {
        TypesError::Serialization(e.to_string())
    }
}
