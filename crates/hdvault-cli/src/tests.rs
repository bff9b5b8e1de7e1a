//! CLI tests.

use crate::commands::*;
use crate::config::CliConfig;
use clap::Parser;
use hdvault_core::{MetadataEntryError, MetadataStoreError};
use hdvault_crypto::{EncryptionContext, KeyPath, SecondPasswordEncryption, Seed};
use hdvault_types::{AddressLabel, DerivationType, EthereumEntryPayload, Wrapper};
use std::path::{Path, PathBuf};
use tempfile::TempDir;

const ZERO_ENTROPY: &str = "00000000000000000000000000000000";
const LEGACY_XPUB: &str = "xpub6BosfCnifzxcFwrSzQiqu2DBVTshkCXacvNsWGYJVVhhawA7d4R5WSWGFNbi8Aw6ZRc1brxMyWMzG3DSSSSoekkudhUd9yLb6qx39T9nMdj";
const SEGWIT_XPUB: &str = "xpub6CatWdiZiodmUeTDp8LT5or8nmbKNcuyvz7WyksVFkKB4RHwCD3XyuvPEbvqAQY3rAPshWcMLoP2fMFMKHPJ4ZeZXYVUhLv1VMrjPC7PW6V";
const SEGWIT_XPRV: &str = "xprv9ybY78BftS5UGANki6oSifuQEjkpyAC8ZmBvBNTshQnCBcxnefjHS7buPMkkqhcRzmoGZ5bokx7GuyDAiktd5HemohAU4wV1ZPMDRmLpBMm";

fn wallet_json(accounts: &str) -> String {
    format!(
        r#"{{
            "pbkdf2_iterations": 5000,
            "version": 4,
            "payload_checksum": "",
            "language": "en",
            "sync_pubkeys": false,
            "wallet": {{
                "guid": "50dae286-e42e-4d67-8419-d5dcc563746c",
                "sharedKey": "8a260b2b-5257-4357-ac56-7a7efca323ea",
                "double_encryption": false,
                "options": {{"pbkdf2_iterations": 10}},
                "hd_wallets": [{{
                    "seed_hex": "{ZERO_ENTROPY}",
                    "passphrase": "",
                    "mnemonic_verified": false,
                    "default_account_idx": 0,
                    "accounts": {accounts}
                }}],
                "keys": [],
                "tx_notes": {{}}
            }}
        }}"#
    )
}

fn write_wallet(dir: &TempDir, json: &str) -> PathBuf {
    let path = dir.path().join("wallet.json");
    std::fs::write(&path, json).unwrap();
    path
}

fn test_config(dir: &Path) -> CliConfig {
    CliConfig {
        metadata_store_dir: dir.join("metadata"),
        ..CliConfig::default()
    }
}

#[test]
fn test_parse_derive() {
    let cli = Cli::try_parse_from([
        "hdvault", "derive", "--seed-hex", ZERO_ENTROPY, "--purpose", "44", "--index", "3",
    ])
    .unwrap();
    match cli.command {
        Commands::Derive {
            purpose,
            account,
            chain,
            index,
            ..
        } => {
            assert_eq!(purpose, 44);
            assert_eq!(account, 0);
            assert_eq!(chain, None);
            assert_eq!(index, Some(3));
        }
        _ => panic!("expected derive"),
    }
}

#[test]
fn test_parse_metadata_init() {
    let cli = Cli::try_parse_from([
        "hdvault", "--log-level", "debug", "metadata", "init", "wallet.json", "--guid", "g",
    ])
    .unwrap();
    assert_eq!(cli.log_level.as_deref(), Some("debug"));
    match cli.command {
        Commands::Metadata(MetadataCommands::Init(args)) => {
            assert_eq!(args.wallet, PathBuf::from("wallet.json"));
            assert_eq!(args.guid.as_deref(), Some("g"));
            assert!(args.shared_key.is_none());
        }
        _ => panic!("expected metadata init"),
    }
}

#[test]
fn test_derive_keys_and_addresses() {
    let seed = Seed::from_entropy_hex(ZERO_ENTROPY, "").unwrap();
    let keys = derive_keys(&seed, &KeyPath::account(44, 0, 0)).unwrap();
    assert_eq!(keys.xpub, LEGACY_XPUB);

    assert_eq!(
        derive_address(&seed, &KeyPath::account(44, 0, 0), 0).unwrap(),
        "1LqBGSKuX5yYUonjxT5qGfpUsXKYYWeabA"
    );
    assert_eq!(
        derive_address(&seed, &KeyPath::account(84, 0, 0).with_chain(0), 10).unwrap(),
        "bc1qd30z5a5e50jtgx28rvt64483tq65r9pkj623wh"
    );
    assert!(derive_address(&seed, &KeyPath::account(49, 0, 0), 0).is_err());
    assert!(derive_address(&seed, &KeyPath::account(44, 0, 0), u32::MAX).is_err());
}

#[test]
fn test_parse_derive_max_index_is_rejected_at_derivation() {
    let cli = Cli::try_parse_from([
        "hdvault", "derive", "--seed-hex", ZERO_ENTROPY, "--index", "4294967295",
    ])
    .unwrap();
    let Commands::Derive { index, .. } = cli.command else {
        panic!("expected derive");
    };
    let seed = Seed::from_entropy_hex(ZERO_ENTROPY, "").unwrap();
    let error = derive_address(&seed, &KeyPath::account(84, 0, 0), index.unwrap()).unwrap_err();
    assert!(error.to_string().contains("out of range"));
}

#[tokio::test]
async fn test_repair_writes_output_then_is_stable() {
    let temp_dir = TempDir::new().unwrap();
    let wallet = write_wallet(&temp_dir, &wallet_json("[]"));
    let repaired = temp_dir.path().join("repaired.json");

    let outcome = repair_wallet(&wallet, Some(&repaired), &SecretArgs::default())
        .await
        .unwrap();
    assert_eq!(outcome.report.accounts_synthesized, 1);

    let document = load_wallet(&repaired).unwrap();
    let account = &document.accounts().unwrap()[0];
    assert_eq!(account.derivation(DerivationType::Segwit).unwrap().xpub, SEGWIT_XPUB);

    let before = std::fs::read_to_string(&repaired).unwrap();
    let again = repair_wallet(&repaired, None, &SecretArgs::default())
        .await
        .unwrap();
    assert!(again.report.is_unchanged());
    assert_eq!(std::fs::read_to_string(&repaired).unwrap(), before);
}

#[tokio::test]
async fn test_repair_double_encrypted_wallet() {
    let temp_dir = TempDir::new().unwrap();
    let encryption = SecondPasswordEncryption::new("hunter2", 10);
    let mut document = Wrapper::from_json(&wallet_json("[]")).unwrap();
    document.wallet.double_encrypted = true;
    let hd_wallet = document.wallet.default_hd_wallet_mut().unwrap();
    hd_wallet.seed_hex = encryption.encrypt(ZERO_ENTROPY).unwrap();
    let wallet = write_wallet(&temp_dir, &document.to_json().unwrap());

    let error = repair_wallet(&wallet, None, &SecretArgs::default()).await;
    assert!(error.is_err());

    let secrets = SecretArgs {
        second_password: Some("hunter2".to_string()),
        seed_hex: None,
    };
    let outcome = repair_wallet(&wallet, None, &secrets).await.unwrap();
    let segwit = outcome.document.accounts().unwrap()[0]
        .derivation(DerivationType::Segwit)
        .unwrap()
        .clone();
    assert_eq!(segwit.xpub, SEGWIT_XPUB);
    let stored = segwit.xpriv.unwrap();
    assert_ne!(stored, SEGWIT_XPRV);
    assert_eq!(encryption.decrypt(&stored).unwrap(), SEGWIT_XPRV);
}

#[tokio::test]
async fn test_check_reports_tampered_cache() {
    let temp_dir = TempDir::new().unwrap();
    let wallet = write_wallet(&temp_dir, &wallet_json("[]"));
    let outcome = repair_wallet(&wallet, None, &SecretArgs::default())
        .await
        .unwrap();

    let mut document = outcome.document;
    let check = check_wallet(&document, &SecretArgs::default()).unwrap();
    assert!(!check.needs_repair);
    assert!(check.illegitimate.is_empty());
    assert!(check.duplicate_labels.is_empty());

    let account = &mut document.wallet.default_hd_wallet_mut().unwrap().accounts[0];
    account.derivations[0].cache.receive_account = SEGWIT_XPUB.to_string();
    let check = check_wallet(&document, &SecretArgs::default()).unwrap();
    assert_eq!(check.illegitimate.len(), 1);
    assert_eq!(check.illegitimate[0].account_index, 0);
}

#[tokio::test]
async fn test_check_reports_duplicate_label_indices() {
    let temp_dir = TempDir::new().unwrap();
    let wallet = write_wallet(&temp_dir, &wallet_json("[]"));
    let mut document = repair_wallet(&wallet, None, &SecretArgs::default())
        .await
        .unwrap()
        .document;

    let account = &mut document.wallet.default_hd_wallet_mut().unwrap().accounts[0];
    account.derivations[1].address_labels =
        vec![AddressLabel::new(2, "savings"), AddressLabel::new(2, "savings")];
    let derivation_type = account.derivations[1].derivation_type;

    let check = check_wallet(&document, &SecretArgs::default()).unwrap();
    assert!(!check.needs_repair);
    assert!(check.illegitimate.is_empty());
    assert_eq!(check.duplicate_labels.len(), 1);
    assert_eq!(check.duplicate_labels[0].derivation_type, derivation_type);
    assert_eq!(check.duplicate_labels[0].label_index, 2);
}

#[tokio::test]
async fn test_lookahead_from_static_index() {
    let temp_dir = TempDir::new().unwrap();
    let wallet = write_wallet(&temp_dir, &wallet_json("[]"));
    let document = repair_wallet(&wallet, None, &SecretArgs::default())
        .await
        .unwrap()
        .document;

    let config = test_config(temp_dir.path());
    let windows = lookahead(&document, 10, 2, &SecretArgs::default(), &config)
        .await
        .unwrap();
    assert_eq!(windows.len(), 1);
    assert_eq!(
        windows[0].addresses,
        vec![
            "bc1qd30z5a5e50jtgx28rvt64483tq65r9pkj623wh",
            "bc1qxr4fjkvnxjqphuyaw5a08za9g6qqh65t8qwgum",
        ]
    );
}

#[tokio::test]
async fn test_metadata_init_creates_record_once() {
    let temp_dir = TempDir::new().unwrap();
    let wallet = write_wallet(&temp_dir, &wallet_json("[]"));
    let config = test_config(temp_dir.path());
    let args = MetadataArgs {
        wallet,
        guid: None,
        shared_key: None,
        store_dir: None,
        secrets: SecretArgs::default(),
    };

    let (_, first) = load_metadata(&args, &config).await.unwrap();
    let entries = || std::fs::read_dir(temp_dir.path().join("metadata")).unwrap().count();
    assert_eq!(entries(), 1);

    let (provider, second) = load_metadata(&args, &config).await.unwrap();
    assert_eq!(first, second);
    assert_eq!(entries(), 1);

    let ethereum = provider.fetch_entry::<EthereumEntryPayload>().await;
    assert_eq!(
        ethereum.unwrap_err(),
        MetadataEntryError::Store(MetadataStoreError::NotYetCreated)
    );
}
