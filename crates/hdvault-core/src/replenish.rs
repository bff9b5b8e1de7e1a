//! Account derivation repair.
//!
//! Wallet documents written by older clients can lack a derivation type, carry blank keys
//! or hold the same derivation twice. `AccountDerivationRepository` rebuilds the broken
//! parts from the seed and leaves everything that is already valid untouched. User data
//! (account labels, archive flags, address labels) always survives.

use crate::error::{ReplenishError, SessionError};
use crate::session::Session;
use hdvault_crypto::{
    AddressCacheBuilder, Coin, DerivationError, EncryptionContext, HdKeyDeriver, KeyPath,
    MasterKey, Seed,
};
use hdvault_types::{
    Account, Derivation, DerivationType, HdWallet, TypesError, Wrapper, DEFAULT_ACCOUNT_LABEL,
};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// What a replenishment run changed.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ReplenishReport {
    pub hd_wallet_synthesized: bool,
    pub accounts_synthesized: usize,
    /// (account index, derivation type) of every rebuilt derivation
    pub regenerated: Vec<(u32, DerivationType)>,
    pub duplicates_collapsed: usize,
    /// Address labels kept on rebuilt or merged derivations
    pub labels_carried: usize,
    pub default_account_reset: bool,
}

impl ReplenishReport {
    pub fn is_unchanged(&self) -> bool {
        *self == Self::default()
    }
}

/// Repaired document plus the report of the run.
#[derive(Clone, Debug)]
pub struct ReplenishOutcome {
    pub document: Wrapper,
    pub report: ReplenishReport,
}

/// Derivation whose stored address cache does not match its account key.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct IllegitimateCache {
    pub account_index: u32,
    pub derivation_type: DerivationType,
}

/// Derivation with two address labels on the same receive index.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DuplicateAddressLabel {
    pub account_index: u32,
    pub derivation_type: DerivationType,
    pub label_index: u32,
}

/// The replenisher.
#[derive(Clone, Copy, Default)]
pub struct AccountDerivationRepository<'a> {
    encryption: Option<&'a dyn EncryptionContext>,
    coin: Coin,
}

impl<'a> AccountDerivationRepository<'a> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Encrypt regenerated secrets with the wallet's second password.
    pub fn with_encryption(mut self, encryption: &'a dyn EncryptionContext) -> Self {
        self.encryption = Some(encryption);
        self
    }

    pub fn with_coin(mut self, coin: Coin) -> Self {
        self.coin = coin;
        self
    }

    /// Repair the default HD wallet of `document`.
    pub fn replenish(&self, document: &Wrapper, seed: &Seed) -> Result<ReplenishOutcome, ReplenishError> {
        let master = MasterKey::from_seed(seed)?;
        let mut document = document.clone();
        let mut report = ReplenishReport::default();

        if document.wallet.double_encrypted && self.encryption.is_none() {
            warn!("document is double encrypted but no second password was supplied");
        }

        if document.wallet.hd_wallets.is_empty() {
            document.wallet.hd_wallets.push(self.synthesize_hd_wallet(seed)?);
            report.hd_wallet_synthesized = true;
        }

        if let Some(hd_wallet) = document.wallet.default_hd_wallet_mut() {
            hd_wallet.reindex_accounts();
            hd_wallet.accounts = self.replenish_accounts(&hd_wallet.accounts, &master, &mut report)?;

            if hd_wallet.default_account_index as usize >= hd_wallet.accounts.len() {
                hd_wallet.default_account_index = 0;
                report.default_account_reset = true;
            }
        }

        if report.is_unchanged() {
            debug!("wallet document needs no repair");
        } else {
            info!(
                hd_wallet_synthesized = report.hd_wallet_synthesized,
                accounts_synthesized = report.accounts_synthesized,
                regenerated = report.regenerated.len(),
                duplicates_collapsed = report.duplicates_collapsed,
                labels_carried = report.labels_carried,
                default_account_reset = report.default_account_reset,
                "wallet document repaired"
            );
        }

        Ok(ReplenishOutcome { document, report })
    }

    /// Repair a list of accounts; an empty list gets the default account.
    pub fn replenish_accounts(
        &self,
        accounts: &[Account],
        master: &MasterKey,
        report: &mut ReplenishReport,
    ) -> Result<Vec<Account>, ReplenishError> {
        if accounts.is_empty() {
            report.accounts_synthesized += 1;
            let account = Account::new(0, DEFAULT_ACCOUNT_LABEL);
            return Ok(vec![self.replenish_account(&account, master, report)?]);
        }

        accounts
            .iter()
            .map(|account| self.replenish_account(account, master, report))
            .collect()
    }

    fn replenish_account(
        &self,
        account: &Account,
        master: &MasterKey,
        report: &mut ReplenishReport,
    ) -> Result<Account, ReplenishError> {
        let mut repaired = account.clone();
        repaired.derivations = collapse_duplicates(&account.derivations, report);

        for derivation_type in DerivationType::REQUIRED {
            let existing = repaired
                .derivations
                .iter()
                .position(|d| d.derivation_type == derivation_type);

            match existing {
                Some(position) if repaired.derivations[position].has_keys() => {}
                Some(position) => {
                    let labels = std::mem::take(&mut repaired.derivations[position].address_labels);
                    report.labels_carried += labels.len();
                    repaired.derivations[position] = self
                        .regenerate(master, derivation_type, account.index)?
                        .with_address_labels(labels);
                    report.regenerated.push((account.index, derivation_type));
                }
                None => {
                    let derivation = self.regenerate(master, derivation_type, account.index)?;
                    repaired.derivations.push(derivation);
                    report.regenerated.push((account.index, derivation_type));
                }
            }
        }

        Ok(repaired)
    }

    fn regenerate(
        &self,
        master: &MasterKey,
        derivation_type: DerivationType,
        account_index: u32,
    ) -> Result<Derivation, ReplenishError> {
        let keys = HdKeyDeriver::derive_account(master, derivation_type, self.coin, account_index)?;
        let mut derivation = keys.to_derivation();
        if let Some(encryption) = self.encryption {
            derivation.xpriv = Some(encryption.encrypt(keys.keys.xpriv.as_str())?);
        }
        debug!(
            account = account_index,
            derivation = %derivation_type,
            xpub = %derivation.xpub,
            "regenerated derivation"
        );
        Ok(derivation)
    }

    fn synthesize_hd_wallet(&self, seed: &Seed) -> Result<HdWallet, ReplenishError> {
        let entropy = seed
            .entropy_hex()
            .ok_or_else(|| DerivationError::InvalidSeed("seed entropy is unavailable".into()))?;
        let (seed_hex, passphrase) = match self.encryption {
            Some(encryption) => (
                encryption.encrypt(entropy.as_str())?,
                encryption.encrypt(seed.passphrase())?,
            ),
            None => (entropy.to_string(), seed.passphrase().to_string()),
        };
        Ok(HdWallet {
            seed_hex,
            passphrase,
            mnemonic_verified: false,
            default_account_index: 0,
            accounts: Vec::new(),
        })
    }
}

/// Whether `replenish` would change the document.
pub fn needs_replenishment(document: &Wrapper) -> bool {
    match document.wallet.default_hd_wallet() {
        None => true,
        Some(hd_wallet) => {
            hd_wallet.accounts.is_empty()
                || hd_wallet.default_account_index as usize >= hd_wallet.accounts.len()
                || !hd_wallet.accounts.iter().all(Account::is_complete)
        }
    }
}

/// Accounts whose stored address caches differ from the ones derived from `master`
/// under `coin`.
pub fn check_address_cache_legitimacy(
    master: &MasterKey,
    accounts: &[Account],
    coin: Coin,
) -> Result<Vec<IllegitimateCache>, DerivationError> {
    let mut illegitimate = Vec::new();
    for account in accounts {
        for derivation in &account.derivations {
            let path = KeyPath::for_derivation(derivation.derivation_type, coin, account.index);
            let expected = AddressCacheBuilder::build(&HdKeyDeriver::derive_xprv(master, &path)?)?;
            if derivation.cache != expected {
                warn!(
                    account = account.index,
                    derivation = %derivation.derivation_type,
                    "address cache does not match account key"
                );
                illegitimate.push(IllegitimateCache {
                    account_index: account.index,
                    derivation_type: derivation.derivation_type,
                });
            }
        }
    }
    Ok(illegitimate)
}

/// Derivations whose address labels reuse a receive index. Repair keeps labels as they
/// are, so these are only reported.
pub fn check_address_labels(accounts: &[Account]) -> Vec<DuplicateAddressLabel> {
    accounts
        .iter()
        .flat_map(|account| {
            account.derivations.iter().filter_map(move |derivation| {
                match derivation.validate_labels() {
                    Err(TypesError::DuplicateAddressLabel { index, .. }) => {
                        warn!(
                            account = account.index,
                            derivation = %derivation.derivation_type,
                            index,
                            "duplicate address label index"
                        );
                        Some(DuplicateAddressLabel {
                            account_index: account.index,
                            derivation_type: derivation.derivation_type,
                            label_index: index,
                        })
                    }
                    _ => None,
                }
            })
        })
        .collect()
}

/// Replenish on a blocking thread; the result is dropped if the session ends first.
pub async fn replenish_in_session(
    session: &Session,
    document: Wrapper,
    seed: Arc<Seed>,
    encryption: Option<Arc<dyn EncryptionContext>>,
) -> Result<Result<ReplenishOutcome, ReplenishError>, SessionError> {
    let work = tokio::task::spawn_blocking(move || {
        let mut repository = AccountDerivationRepository::new();
        if let Some(encryption) = encryption.as_deref() {
            repository = repository.with_encryption(encryption);
        }
        repository.replenish(&document, &seed)
    });

    match session.scoped(work).await? {
        Ok(result) if !session.is_cancelled() => Ok(result),
        Ok(_) => Err(SessionError::Cancelled),
        Err(e) if e.is_panic() => std::panic::resume_unwind(e.into_panic()),
        Err(_) => Err(SessionError::Cancelled),
    }
}

/// Keep the first derivation of each type; merge labels from later copies.
fn collapse_duplicates(derivations: &[Derivation], report: &mut ReplenishReport) -> Vec<Derivation> {
    let mut kept: Vec<Derivation> = Vec::with_capacity(derivations.len());
    for derivation in derivations {
        match kept
            .iter_mut()
            .find(|d| d.derivation_type == derivation.derivation_type)
        {
            Some(first) => {
                report.duplicates_collapsed += 1;
                for label in &derivation.address_labels {
                    if first.label_for(label.index).is_none() {
                        first.address_labels.push(label.clone());
                        report.labels_carried += 1;
                    }
                }
            }
            None => kept.push(derivation.clone()),
        }
    }
    kept
}
