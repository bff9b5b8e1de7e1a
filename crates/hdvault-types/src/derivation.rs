use crate::error::TypesError;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;

/// Derivation scheme of an account.
///
/// The persisted document spells segwit as `bech32`; `segwit` is accepted on input.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum DerivationType {
    /// BIP44, P2PKH addresses
    #[serde(rename = "legacy")]
    Legacy,
    /// BIP84, P2WPKH addresses
    #[serde(rename = "bech32", alias = "segwit")]
    Segwit,
}

impl DerivationType {
    /// Every derivation an account must carry, in canonical order.
    pub const REQUIRED: [DerivationType; 2] = [DerivationType::Legacy, DerivationType::Segwit];

    /// BIP43 purpose of this derivation.
    pub const fn purpose(self) -> u32 {
        match self {
            DerivationType::Legacy => 44,
            DerivationType::Segwit => 84,
        }
    }

    /// Look up the derivation type for a purpose value.
    pub fn from_purpose(purpose: u32) -> Result<Self, TypesError> {
        match purpose {
            44 => Ok(DerivationType::Legacy),
            84 => Ok(DerivationType::Segwit),
            other => Err(TypesError::UnknownPurpose(other)),
        }
    }

    /// Name used in the persisted document.
    pub const fn as_str(self) -> &'static str {
        match self {
            DerivationType::Legacy => "legacy",
            DerivationType::Segwit => "bech32",
        }
    }
}

impl fmt::Display for DerivationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DerivationType::Legacy => write!(f, "legacy"),
            DerivationType::Segwit => write!(f, "segwit"),
        }
    }
}

impl FromStr for DerivationType {
    type Err = TypesError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "legacy" => Ok(DerivationType::Legacy),
            "segwit" | "bech32" => Ok(DerivationType::Segwit),
            other => Err(TypesError::UnknownDerivationType(other.to_string())),
        }
    }
}

/// User-assigned label for a receive address index.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AddressLabel {
    pub index: u32,
    pub label: String,
}

impl AddressLabel {
    pub fn new(index: u32, label: impl Into<String>) -> Self {
        Self { index, label: label.into() }
    }
}

/// Account-level extended public keys for the receive (0) and change (1) chains.
#[derive(Clone, Debug, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct AddressCache {
    #[serde(rename = "receiveAccount", default)]
    pub receive_account: String,
    #[serde(rename = "changeAccount", default)]
    pub change_account: String,
}

impl AddressCache {
    pub fn new(receive_account: impl Into<String>, change_account: impl Into<String>) -> Self {
        Self {
            receive_account: receive_account.into(),
            change_account: change_account.into(),
        }
    }

    /// Cache with both keys blank, as found in broken documents.
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.receive_account.is_empty() && self.change_account.is_empty()
    }
}

/// One derivation scheme of an account.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Derivation {
    #[serde(rename = "type")]
    pub derivation_type: DerivationType,
    pub purpose: u32,
    #[serde(default)]
    pub xpriv: Option<String>,
    #[serde(default)]
    pub xpub: String,
    #[serde(rename = "address_labels", default)]
    pub address_labels: Vec<AddressLabel>,
    #[serde(default)]
    pub cache: AddressCache,
}

impl Derivation {
    pub fn new(
        derivation_type: DerivationType,
        xpriv: impl Into<String>,
        xpub: impl Into<String>,
        cache: AddressCache,
    ) -> Self {
        Self {
            derivation_type,
            purpose: derivation_type.purpose(),
            xpriv: Some(xpriv.into()),
            xpub: xpub.into(),
            address_labels: Vec::new(),
            cache,
        }
    }

    /// Attach address labels, replacing any present.
    pub fn with_address_labels(mut self, labels: Vec<AddressLabel>) -> Self {
        self.address_labels = labels;
        self
    }

    /// A derivation is usable when both keys are present and non-empty.
    pub fn has_keys(&self) -> bool {
        let has_xpriv = self.xpriv.as_deref().is_some_and(|x| !x.is_empty());
        has_xpriv && !self.xpub.is_empty()
    }

    /// Check that no two address labels share an index.
    pub fn validate_labels(&self) -> Result<(), TypesError> {
        let mut seen = HashSet::with_capacity(self.address_labels.len());
        for label in &self.address_labels {
            if !seen.insert(label.index) {
                return Err(TypesError::DuplicateAddressLabel {
                    derivation: self.derivation_type.to_string(),
                    index: label.index,
                });
            }
        }
        Ok(())
    }

    /// Label attached to a receive index, if any.
    pub fn label_for(&self, index: u32) -> Option<&str> {
        self.address_labels
            .iter()
            .find(|l| l.index == index)
            .map(|l| l.label.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_purposes() {
        assert_eq!(DerivationType::Legacy.purpose(), 44);
        assert_eq!(DerivationType::Segwit.purpose(), 84);
        assert_eq!(DerivationType::from_purpose(84).unwrap(), DerivationType::Segwit);
        assert_eq!(DerivationType::from_purpose(49), Err(TypesError::UnknownPurpose(49)));
    }

    #[test]
    fn test_type_wire_names() {
        assert_eq!(serde_json::to_string(&DerivationType::Segwit).unwrap(), "\"bech32\"");
        assert_eq!(serde_json::to_string(&DerivationType::Legacy).unwrap(), "\"legacy\"");

        let parsed: DerivationType = serde_json::from_str("\"segwit\"").unwrap();
        assert_eq!(parsed, DerivationType::Segwit);
        assert_eq!("bech32".parse::<DerivationType>().unwrap(), DerivationType::Segwit);
        assert!("p2sh".parse::<DerivationType>().is_err());
    }

    #[test]
    fn test_has_keys() {
        let mut d = Derivation::new(DerivationType::Legacy, "xprv", "xpub", AddressCache::empty());
        assert!(d.has_keys());

        d.xpriv = Some(String::new());
        assert!(!d.has_keys());

        d.xpriv = None;
        assert!(!d.has_keys());

        d.xpriv = Some("xprv".into());
        d.xpub.clear();
        assert!(!d.has_keys());
    }

    #[test]
    fn test_broken_derivation_decodes() {
        let json = r#"{"type":"bech32","purpose":84,"xpriv":null,"xpub":"","cache":{}}"#;
        let d: Derivation = serde_json::from_str(json).unwrap();
        assert_eq!(d.derivation_type, DerivationType::Segwit);
        assert!(d.xpriv.is_none());
        assert!(d.address_labels.is_empty());
        assert!(d.cache.is_empty());
    }

    #[test]
    fn test_duplicate_labels_rejected() {
        let d = Derivation::new(DerivationType::Segwit, "xprv", "xpub", AddressCache::empty())
            .with_address_labels(vec![AddressLabel::new(1, "a"), AddressLabel::new(1, "b")]);
        assert!(matches!(
            d.validate_labels(),
            Err(TypesError::DuplicateAddressLabel { index: 1, .. })
        ));
        assert_eq!(d.label_for(1), Some("a"));
        assert_eq!(d.label_for(7), None);
    }
}
