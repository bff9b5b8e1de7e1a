//! CLI command implementations.

use clap::{Args, Parser, Subcommand};
use colored::Colorize;
use hdvault_core::{
    check_address_cache_legitimacy, check_address_labels, needs_replenishment,
    replenish_in_session, AddressLookaheadScanner, AddressWindow, DuplicateAddressLabel,
    EncryptedMetadataStore, IllegitimateCache,
    MetadataEntryError, MetadataNodeProvider, MetadataState, MetadataStoreError, ReplenishOutcome,
    Session,
};
use hdvault_crypto::{
    derive_receive_addresses, AesGcmCipher, Coin, Credentials, EncryptionContext, HdKeyDeriver,
    KeyPair, KeyPath, MasterKey, SecondPasswordEncryption, Seed,
};
use hdvault_types::{DerivationType, EthereumEntryPayload, Wrapper};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::info;
use zeroize::Zeroizing;

use crate::chain::{CachingChainClient, StaticChainClient};
use crate::config::CliConfig;
use crate::output::*;
use crate::transport::DirectoryTransport;

/// Main CLI.
#[derive(Parser)]
#[command(name = "hdvault")]
#[command(about = "hdvault - HD wallet derivation, repair and metadata")]
#[command(version = env!("CARGO_PKG_VERSION"))]
pub struct Cli {
    /// Configuration file (defaults to ~/.hdvault/config.toml)
    #[arg(long, global = true, env = "HDVAULT_CONFIG")]
    pub config: Option<PathBuf>,

    /// Log filter, overrides the configured level
    #[arg(long, global = true)]
    pub log_level: Option<String>,

    /// Emit logs as JSON
    #[arg(long, global = true)]
    pub json_logs: bool,

    #[command(subcommand)]
    pub command: Commands,
}

/// Available commands.
#[derive(Subcommand)]
pub enum Commands {
    /// Derive an extended key pair from seed entropy
    Derive {
        /// BIP39 entropy (hex)
        #[arg(long)]
        seed_hex: String,
        /// BIP39 passphrase
        #[arg(long, default_value = "")]
        passphrase: String,
        /// 44 (legacy) or 84 (segwit)
        #[arg(long, default_value_t = 84)]
        purpose: u32,
        #[arg(long, default_value_t = 0)]
        account: u32,
        /// 0 receive, 1 change
        #[arg(long)]
        chain: Option<u32>,
        /// Address index on the chain
        #[arg(long)]
        index: Option<u32>,
    },

    /// Repair missing or broken account derivations
    Repair {
        /// Wallet document (JSON)
        wallet: PathBuf,
        /// Write the repaired document here instead of in place
        #[arg(short, long)]
        output: Option<PathBuf>,
        #[command(flatten)]
        secrets: SecretArgs,
    },

    /// Report whether a wallet document needs repair
    Check {
        /// Wallet document (JSON)
        wallet: PathBuf,
        #[command(flatten)]
        secrets: SecretArgs,
    },

    /// Print the receive address lookahead of every account
    Addresses {
        /// Wallet document (JSON)
        wallet: PathBuf,
        /// Receive index reported for every account
        #[arg(long, default_value_t = 0)]
        receive_index: u32,
        /// Overrides the configured gap limit
        #[arg(long)]
        gap_limit: Option<u32>,
        #[command(flatten)]
        secrets: SecretArgs,
    },

    /// Remote metadata
    #[command(subcommand)]
    Metadata(MetadataCommands),

    /// Configuration
    #[command(subcommand)]
    Config(ConfigCommands),
}

/// Metadata commands.
#[derive(Subcommand)]
pub enum MetadataCommands {
    /// Load the metadata nodes, creating the root record if needed
    Init(MetadataArgs),
    /// Print the Ethereum metadata entry
    Ethereum(MetadataArgs),
}

/// Configuration commands.
#[derive(Subcommand)]
pub enum ConfigCommands {
    /// Show current configuration
    Show,
    /// Reset configuration to defaults
    Reset,
}

/// Secrets needed to open a wallet document.
#[derive(Args, Clone, Default)]
pub struct SecretArgs {
    /// Second password of a double-encrypted wallet
    #[arg(long, env = "HDVAULT_SECOND_PASSWORD", hide_env_values = true)]
    pub second_password: Option<String>,
    /// Seed entropy (hex) to use instead of the document's
    #[arg(long)]
    pub seed_hex: Option<String>,
}

#[derive(Args, Clone)]
pub struct MetadataArgs {
    /// Wallet document (JSON)
    pub wallet: PathBuf,
    /// Overrides the document's guid
    #[arg(long)]
    pub guid: Option<String>,
    /// Overrides the document's shared key
    #[arg(long)]
    pub shared_key: Option<String>,
    /// Overrides the configured metadata store directory
    #[arg(long)]
    pub store_dir: Option<PathBuf>,
    #[command(flatten)]
    pub secrets: SecretArgs,
}

/// Execute a CLI command.
pub async fn execute(cmd: Commands, config: &CliConfig, config_path: &Path) -> anyhow::Result<()> {
    match cmd {
        Commands::Derive {
            seed_hex,
            passphrase,
            purpose,
            account,
            chain,
            index,
        } => execute_derive(&seed_hex, &passphrase, purpose, account, chain, index),
        Commands::Repair {
            wallet,
            output,
            secrets,
        } => execute_repair(&wallet, output.as_deref(), &secrets).await,
        Commands::Check { wallet, secrets } => execute_check(&wallet, &secrets),
        Commands::Addresses {
            wallet,
            receive_index,
            gap_limit,
            secrets,
        } => {
            let gap_limit = gap_limit.unwrap_or(config.gap_limit);
            execute_addresses(&wallet, receive_index, gap_limit, &secrets, config).await
        }
        Commands::Metadata(cmd) => execute_metadata(cmd, config).await,
        Commands::Config(cmd) => execute_config(cmd, config, config_path),
    }
}

fn execute_derive(
    seed_hex: &str,
    passphrase: &str,
    purpose: u32,
    account: u32,
    chain: Option<u32>,
    index: Option<u32>,
) -> anyhow::Result<()> {
    let seed = Seed::from_entropy_hex(seed_hex, passphrase)?;
    let mut path = KeyPath::account(purpose, 0, account);
    if let Some(chain) = chain {
        path = path.with_chain(chain);
    }
    let keys = derive_keys(&seed, &path)?;

    println!("{}", "Derived Keys".bold());
    println!("{}", "=".repeat(50));
    println!("Path:   {}", path.to_string().bright_green());
    println!("xpriv:  {}", keys.xpriv.as_str());
    println!("xpub:   {}", keys.xpub.bright_cyan());

    if let Some(index) = index {
        let address = derive_address(&seed, &path, index)?;
        println!(
            "Address {}: {}",
            path.with_address_index(index),
            address.bright_yellow()
        );
    }
    Ok(())
}

/// Key pair at `path`.
pub fn derive_keys(seed: &Seed, path: &KeyPath) -> anyhow::Result<KeyPair> {
    Ok(HdKeyDeriver::derive(seed, path)?)
}

/// Address at `index` below the chain of `path` (receive when unset).
pub fn derive_address(seed: &Seed, path: &KeyPath, index: u32) -> anyhow::Result<String> {
    let derivation_type = DerivationType::from_purpose(path.purpose)?;
    let chain_path = KeyPath {
        address_index: None,
        ..path.with_address_index(index)
    };
    let end = index
        .checked_add(1)
        .ok_or_else(|| anyhow::anyhow!("address index {} is out of range", index))?;
    let chain = HdKeyDeriver::derive(seed, &chain_path)?;
    let mut addresses = derive_receive_addresses(&chain.xpub, derivation_type, index..end)?;
    addresses
        .pop()
        .ok_or_else(|| anyhow::anyhow!("no address derived at index {}", index))
}

async fn execute_repair(
    wallet: &Path,
    output: Option<&Path>,
    secrets: &SecretArgs,
) -> anyhow::Result<()> {
    let outcome = repair_wallet(wallet, output, secrets).await?;
    print_report(&outcome.report);
    if !outcome.report.is_unchanged() {
        print_success(&format!(
            "Wrote repaired wallet to {}",
            output.unwrap_or(wallet).display()
        ));
    }
    Ok(())
}

/// Repair the document at `wallet` and write it to `output` (or back in place).
/// An unchanged document is only written when `output` is given.
pub async fn repair_wallet(
    wallet: &Path,
    output: Option<&Path>,
    secrets: &SecretArgs,
) -> anyhow::Result<ReplenishOutcome> {
    let document = load_wallet(wallet)?;
    let WalletSecrets { seed, encryption } = wallet_secrets(&document, secrets)?;
    let encryption = encryption.map(|e| Arc::new(e) as Arc<dyn EncryptionContext>);

    let session = Session::new();
    let outcome = replenish_in_session(&session, document, Arc::new(seed), encryption).await??;

    if output.is_some() || !outcome.report.is_unchanged() {
        let target = output.unwrap_or(wallet);
        std::fs::write(target, outcome.document.to_json_pretty()?)?;
        info!(path = %target.display(), "wrote wallet document");
    }
    Ok(outcome)
}

fn execute_check(wallet: &Path, secrets: &SecretArgs) -> anyhow::Result<()> {
    let document = load_wallet(wallet)?;
    let WalletCheck {
        needs_repair,
        illegitimate,
        duplicate_labels,
    } = check_wallet(&document, secrets)?;

    if needs_repair {
        print_warning("Wallet needs repair; run `hdvault repair`");
    } else {
        print_success("All account derivations are present");
    }
    if let Ok(accounts) = document.accounts() {
        for account in accounts {
            for derivation in &account.derivations {
                println!(
                    "  {} {:<7} {}",
                    account.index.to_string().bright_green(),
                    derivation.derivation_type,
                    format_key_short(&derivation.xpub)
                );
            }
        }
    }
    print_illegitimate(&illegitimate);
    print_duplicate_labels(&duplicate_labels);
    Ok(())
}

/// Findings of `hdvault check`.
#[derive(Debug, Default)]
pub struct WalletCheck {
    pub needs_repair: bool,
    /// Address caches that do not match the seed
    pub illegitimate: Vec<IllegitimateCache>,
    pub duplicate_labels: Vec<DuplicateAddressLabel>,
}

pub fn check_wallet(document: &Wrapper, secrets: &SecretArgs) -> anyhow::Result<WalletCheck> {
    let mut check = WalletCheck {
        needs_repair: needs_replenishment(document),
        ..WalletCheck::default()
    };
    if let Ok(accounts) = document.accounts() {
        let master = MasterKey::from_seed(&wallet_secrets(document, secrets)?.seed)?;
        check.illegitimate = check_address_cache_legitimacy(&master, accounts, Coin::Bitcoin)?;
        check.duplicate_labels = check_address_labels(accounts);
    }
    Ok(check)
}

async fn execute_addresses(
    wallet: &Path,
    receive_index: u32,
    gap_limit: u32,
    secrets: &SecretArgs,
    config: &CliConfig,
) -> anyhow::Result<()> {
    let document = load_wallet(wallet)?;
    if document.accounts().map_or(true, |a| a.is_empty()) {
        print_info("Wallet has no accounts; run `hdvault repair` first");
        return Ok(());
    }
    let windows = lookahead(&document, receive_index, gap_limit, secrets, config).await?;
    print_windows(&windows);
    Ok(())
}

/// Lookahead windows of every account, assuming `receive_index` for each.
pub async fn lookahead(
    document: &Wrapper,
    receive_index: u32,
    gap_limit: u32,
    secrets: &SecretArgs,
    config: &CliConfig,
) -> anyhow::Result<Vec<AddressWindow>> {
    let master = MasterKey::from_seed(&wallet_secrets(document, secrets)?.seed)?;
    let session = Session::new();
    let client = CachingChainClient::new(
        Arc::new(StaticChainClient::new(receive_index)),
        config.cache_refresh(),
    );
    let flush = client.cache().flush_on(session.subscribe());

    let scanner = AddressLookaheadScanner::new(Arc::new(client)).with_gap_limit(gap_limit);
    let windows = session.scoped(scanner.scan(&master, document.accounts()?)).await?;

    session.logout();
    flush.abort();
    Ok(windows?)
}

async fn execute_metadata(cmd: MetadataCommands, config: &CliConfig) -> anyhow::Result<()> {
    match cmd {
        MetadataCommands::Init(args) => {
            let (_, state) = load_metadata(&args, config).await?;
            print_success("Metadata nodes loaded");
            println!(
                "Root record:  {}",
                state.second_password_node.metadata_node.address().bright_cyan()
            );
            println!(
                "Metadata:     {}",
                state.metadata_nodes.metadata_node.address().bright_cyan()
            );
        }

        MetadataCommands::Ethereum(args) => {
            let (provider, _) = load_metadata(&args, config).await?;
            match provider.fetch_entry::<EthereumEntryPayload>().await {
                Ok(entry) => println!("{}", serde_json::to_string_pretty(&entry)?),
                Err(MetadataEntryError::Store(MetadataStoreError::NotYetCreated)) => {
                    print_info("No Ethereum metadata entry");
                }
                Err(e) => return Err(e.into()),
            }
        }
    }
    Ok(())
}

/// Initialise a provider over the directory store for the wallet in `args`.
pub async fn load_metadata(
    args: &MetadataArgs,
    config: &CliConfig,
) -> anyhow::Result<(MetadataNodeProvider, MetadataState)> {
    let document = load_wallet(&args.wallet)?;
    let master = MasterKey::from_seed(&wallet_secrets(&document, &args.secrets)?.seed)?;

    let mut credentials = Credentials::new(
        args.guid.clone().unwrap_or_else(|| document.wallet.guid.clone()),
        args.shared_key
            .clone()
            .unwrap_or_else(|| document.wallet.shared_key.clone()),
    );
    if let Some(password) = &args.secrets.second_password {
        credentials = credentials.with_second_password(password.as_str());
    }

    let store_dir = args
        .store_dir
        .clone()
        .unwrap_or_else(|| config.metadata_store_dir.clone());
    let store = EncryptedMetadataStore::new(
        Arc::new(DirectoryTransport::new(store_dir)),
        Arc::new(AesGcmCipher),
    );
    let provider = MetadataNodeProvider::new(store);
    let state = provider.initialise(&credentials, &master).await?;
    Ok((provider, state))
}

fn execute_config(cmd: ConfigCommands, config: &CliConfig, config_path: &Path) -> anyhow::Result<()> {
    match cmd {
        ConfigCommands::Show => {
            println!("{}", "CLI Configuration".bold());
            println!("{}", "=".repeat(50));
            println!("File:         {}", config_path.display());
            println!("Log Level:    {}", config.log_level.bright_cyan());
            println!("JSON Logs:    {}", config.json_logs.to_string().bright_green());
            println!("Gap Limit:    {}", config.gap_limit.to_string().bright_yellow());
            println!("Metadata Dir: {}", config.metadata_store_dir.display());
            println!("Cache TTL:    {}s", config.cache_refresh_secs.to_string().bright_magenta());
        }

        ConfigCommands::Reset => {
            CliConfig::default().save_to(config_path)?;
            print_success(&format!("Reset configuration at {}", config_path.display()));
        }
    }
    Ok(())
}

/// Read and decode a wallet document.
pub fn load_wallet(path: &Path) -> anyhow::Result<Wrapper> {
    let contents = std::fs::read_to_string(path)
        .map_err(|e| anyhow::anyhow!("Could not read {}: {}", path.display(), e))?;
    Ok(Wrapper::from_json(&contents)?)
}

/// Seed and second-password context of an opened wallet.
pub struct WalletSecrets {
    pub seed: Seed,
    pub encryption: Option<SecondPasswordEncryption>,
}

/// Recover the seed of `document`, decrypting it with the second password if needed.
pub fn wallet_secrets(document: &Wrapper, args: &SecretArgs) -> anyhow::Result<WalletSecrets> {
    let encryption = args
        .second_password
        .as_deref()
        .map(|password| SecondPasswordEncryption::new(password, second_password_iterations(document)));

    if document.wallet.double_encrypted && encryption.is_none() {
        anyhow::bail!("Wallet is double encrypted; pass --second-password");
    }

    let (seed_hex, passphrase) = match (&args.seed_hex, document.wallet.default_hd_wallet()) {
        (Some(seed_hex), _) => (Zeroizing::new(seed_hex.clone()), Zeroizing::new(String::new())),
        (None, Some(hd_wallet)) => match (&encryption, document.wallet.double_encrypted) {
            (Some(encryption), true) => (
                Zeroizing::new(encryption.decrypt(&hd_wallet.seed_hex)?),
                decrypt_optional(encryption, &hd_wallet.passphrase)?,
            ),
            _ => (
                Zeroizing::new(hd_wallet.seed_hex.clone()),
                Zeroizing::new(hd_wallet.passphrase.clone()),
            ),
        },
        (None, None) => anyhow::bail!("Wallet has no HD wallet; pass --seed-hex"),
    };

    Ok(WalletSecrets {
        seed: Seed::from_entropy_hex(&seed_hex, &passphrase)?,
        encryption,
    })
}

fn decrypt_optional(
    encryption: &SecondPasswordEncryption,
    ciphertext: &str,
) -> anyhow::Result<Zeroizing<String>> {
    if ciphertext.is_empty() {
        return Ok(Zeroizing::new(String::new()));
    }
    Ok(Zeroizing::new(encryption.decrypt(ciphertext)?))
}

/// PBKDF2 iterations for second-password fields: the wallet options' value, else the
/// envelope's.
fn second_password_iterations(document: &Wrapper) -> u32 {
    document
        .wallet
        .options
        .get("pbkdf2_iterations")
        .and_then(serde_json::Value::as_u64)
        .and_then(|n| u32::try_from(n).ok())
        .unwrap_or(document.pbkdf2_iterations)
}
