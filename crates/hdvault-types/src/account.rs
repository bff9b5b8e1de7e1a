use crate::derivation::{Derivation, DerivationType};
use serde::{Deserialize, Serialize};

/// Label given to an account synthesized for a wallet with none.
pub const DEFAULT_ACCOUNT_LABEL: &str = "Private Key Wallet";

/// HD account holding one derivation per supported derivation type.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    /// Position in the HD wallet's account list (not persisted)
    #[serde(skip)]
    pub index: u32,
    pub label: String,
    #[serde(default)]
    pub archived: bool,
    #[serde(rename = "default_derivation", default = "default_derivation_type")]
    pub default_derivation: DerivationType,
    #[serde(default)]
    pub derivations: Vec<Derivation>,
}

fn default_derivation_type() -> DerivationType {
    DerivationType::Segwit
}

impl Account {
    /// Create an account with no derivations yet.
    pub fn new(index: u32, label: impl Into<String>) -> Self {
        Self {
            index,
            label: label.into(),
            archived: false,
            default_derivation: DerivationType::Segwit,
            derivations: Vec::new(),
        }
    }

    /// Derivation of the given type, if present.
    pub fn derivation(&self, derivation_type: DerivationType) -> Option<&Derivation> {
        self.derivations
            .iter()
            .find(|d| d.derivation_type == derivation_type)
    }

    /// The derivation `default_derivation` points at.
    pub fn default_derivation(&self) -> Option<&Derivation> {
        self.derivation(self.default_derivation)
    }

    /// Check the structural invariants: exactly one usable derivation per
    /// required type, and a default that references one of them.
    pub fn is_complete(&self) -> bool {
        let one_each = DerivationType::REQUIRED.iter().all(|t| {
            let mut matching = self.derivations.iter().filter(|d| d.derivation_type == *t);
            matches!((matching.next(), matching.next()), (Some(d), None) if d.has_keys())
        });
        one_each && self.default_derivation().is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::derivation::AddressCache;

    fn derivation(t: DerivationType) -> Derivation {
        Derivation::new(t, format!("xprv-{}", t), format!("xpub-{}", t), AddressCache::empty())
    }

    #[test]
    fn test_new_account() {
        let acc = Account::new(3, "Savings");
        assert_eq!(acc.index, 3);
        assert!(!acc.archived);
        assert_eq!(acc.default_derivation, DerivationType::Segwit);
        assert!(!acc.is_complete());
    }

    #[test]
    fn test_complete_account() {
        let mut acc = Account::new(0, DEFAULT_ACCOUNT_LABEL);
        acc.derivations = vec![derivation(DerivationType::Legacy), derivation(DerivationType::Segwit)];
        assert!(acc.is_complete());
        assert_eq!(
            acc.default_derivation().map(|d| d.purpose),
            Some(84)
        );
    }

    #[test]
    fn test_duplicate_derivation_is_incomplete() {
        let mut acc = Account::new(0, "dup");
        acc.derivations = vec![
            derivation(DerivationType::Legacy),
            derivation(DerivationType::Segwit),
            derivation(DerivationType::Segwit),
        ];
        assert!(!acc.is_complete());
    }

    #[test]
    fn test_index_not_serialized() {
        let acc = Account::new(5, "x");
        let json = serde_json::to_value(&acc).unwrap();
        assert!(json.get("index").is_none());
        assert_eq!(json["default_derivation"], "bech32");
    }
}
