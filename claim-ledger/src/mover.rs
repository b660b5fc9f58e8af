//! Funds mover boundary
//!
//! The ledger never moves value itself. It hands an opaque source credential,
//! a destination and an amount to a [`FundsMover`] and records whatever comes
//! back. Backends:
//!
//! - [`SimulatedMover`] - no value moves; transaction ids are SHA-256 digests
//! - [`CommandMover`] - local sandbox driven through the `stellar` CLI
//! - [`RelayMover`] - payment relay on the public testnet
//!
//! Wallets are ed25519 keypairs in strkey form (`G...` address, `S...`
//! secret). Live backends sign every transfer with the source credential they
//! are handed and prefund new wallets through friendbot.

use crate::config::{MoverConfig, MoverMode, NetworkSettings};
use crate::error::{Error, Result};
use crate::token::hash_bytes;
use crate::types::{Currency, ExecutionMode, WalletCredential};
use async_trait::async_trait;
use ed25519_dalek::SigningKey;
use rand::rngs::OsRng;
use rand::RngCore;
use regex::Regex;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use stellar_strkey::ed25519::{PrivateKey, PublicKey};

const TESTNET_EXPLORER: &str = "https://stellar.expert/explorer/testnet/tx";
const STROOPS_PER_UNIT: i64 = 10_000_000;

/// Address and credential of a wallet
#[derive(Debug, Clone)]
pub struct WalletKeys {
    /// Public address
    pub address: String,
    /// Signing credential
    pub credential: WalletCredential,
}

impl WalletKeys {
    /// Fresh keypair from the OS RNG
    pub fn random() -> Self {
        let mut seed = [0u8; 32];
        OsRng.fill_bytes(&mut seed);
        Self::from_seed(seed)
    }

    /// Recover the address that a secret credential controls
    pub fn from_credential(credential: &WalletCredential) -> Result<Self> {
        let secret = PrivateKey::from_string(credential.expose())
            .map_err(|_| Error::Validation("credential is not a valid secret key".to_string()))?;
        Ok(Self::from_seed(secret.0))
    }

    fn from_seed(seed: [u8; 32]) -> Self {
        let signing_key = SigningKey::from_bytes(&seed);
        let address = PublicKey(signing_key.verifying_key().to_bytes()).to_string();

        Self {
            address,
            credential: WalletCredential::new(PrivateKey(seed).to_string()),
        }
    }
}

/// Whether `address` is a checksummed account address
pub fn is_valid_address(address: &str) -> bool {
    PublicKey::from_string(address).is_ok()
}

/// Outcome of a completed transfer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transfer {
    /// Network transaction identifier
    pub transaction_id: String,
    /// Explorer link, when the network has one
    pub explorer_url: Option<String>,
    /// How the transfer was carried out
    pub mode: ExecutionMode,
}

/// Executes or simulates value transfers
#[async_trait]
pub trait FundsMover: Send + Sync + std::fmt::Debug {
    /// Execution mode attached to results
    fn mode(&self) -> ExecutionMode;

    /// Create a wallet for a new claim
    async fn create_wallet(&self, owner_hint: &str) -> Result<WalletKeys>;

    /// Move `amount` from the wallet behind `source` to `destination`,
    /// signed with `source`
    async fn move_funds(
        &self,
        source: &WalletCredential,
        destination: &str,
        amount: Decimal,
        currency: Currency,
    ) -> Result<Transfer>;
}

/// Select the backend for the configured mode
pub fn build_mover(config: &MoverConfig) -> Arc<dyn FundsMover> {
    mover_for_mode(config, config.mode)
}

/// Select the backend for `mode`
///
/// Live modes missing their required settings fall back to simulation.
pub fn mover_for_mode(config: &MoverConfig, mode: MoverMode) -> Arc<dyn FundsMover> {
    if let Some(missing) = config.missing_for(mode) {
        tracing::warn!(%mode, missing, "Live mover is not configured, falling back to simulation");
        return Arc::new(SimulatedMover::new(Duration::from_millis(
            config.simulated_latency_ms,
        )));
    }

    match (mode, &config.relay_url) {
        (MoverMode::Testnet, Some(relay_url)) => Arc::new(RelayMover::new(
            relay_url.clone(),
            config.network(MoverMode::Testnet),
        )),
        (MoverMode::Sandbox, _) => Arc::new(CommandMover::new(
            config.command_path.clone(),
            config.network(MoverMode::Sandbox),
            config.asset_issuers.clone(),
        )),
        _ => Arc::new(SimulatedMover::new(Duration::from_millis(
            config.simulated_latency_ms,
        ))),
    }
}

/// Local simulation, no value moves
#[derive(Debug, Clone, Default)]
pub struct SimulatedMover {
    latency: Duration,
}

impl SimulatedMover {
    /// Create with an artificial per-transfer latency
    pub fn new(latency: Duration) -> Self {
        Self { latency }
    }
}

#[async_trait]
impl FundsMover for SimulatedMover {
    fn mode(&self) -> ExecutionMode {
        ExecutionMode::Simulated
    }

    async fn create_wallet(&self, _owner_hint: &str) -> Result<WalletKeys> {
        Ok(WalletKeys::random())
    }

    async fn move_funds(
        &self,
        _source: &WalletCredential,
        destination: &str,
        amount: Decimal,
        currency: Currency,
    ) -> Result<Transfer> {
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }

        let mut nonce = [0u8; 16];
        OsRng.fill_bytes(&mut nonce);
        let seed = format!(
            "{}:{}:{}:{}:{}",
            destination,
            amount,
            currency.code(),
            chrono::Utc::now().timestamp_nanos_opt().unwrap_or_default(),
            hex::encode(nonce)
        );

        let transaction_id = hex::encode(hash_bytes(seed.as_bytes()));
        tracing::debug!(%transaction_id, currency = %currency, "Simulated transfer completed");

        Ok(Transfer {
            transaction_id,
            explorer_url: None,
            mode: ExecutionMode::Simulated,
        })
    }
}

/// Sandbox backend driving the `stellar` CLI
///
/// The source secret reaches the CLI through `STELLAR_ACCOUNT`, never argv.
#[derive(Debug, Clone)]
pub struct CommandMover {
    program: String,
    network: NetworkSettings,
    asset_issuers: BTreeMap<String, String>,
    client: reqwest::Client,
}

impl CommandMover {
    /// Create a CLI-backed mover
    pub fn new(
        program: String,
        network: NetworkSettings,
        asset_issuers: BTreeMap<String, String>,
    ) -> Self {
        Self {
            program,
            network,
            asset_issuers,
            client: reqwest::Client::new(),
        }
    }

    async fn run(&self, args: &[&str], source: &WalletCredential) -> Result<String> {
        let output = tokio::process::Command::new(&self.program)
            .args(args)
            .env("STELLAR_ACCOUNT", source.expose())
            .env("STELLAR_RPC_URL", &self.network.rpc_url)
            .env("STELLAR_NETWORK_PASSPHRASE", &self.network.network_passphrase)
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| Error::MoverUnavailable(format!("failed to start {}: {}", self.program, e)))?;

        let stdout = String::from_utf8_lossy(&output.stdout);
        let stderr = String::from_utf8_lossy(&output.stderr);

        if !output.status.success() {
            return Err(Error::MoverUnavailable(format!(
                "{} exited with {}: {}",
                self.program,
                output.status,
                stderr.trim()
            )));
        }

        // The CLI logs the hash on stderr and may print an envelope on stdout
        Ok(format!("{}\n{}", stdout, stderr))
    }
}

#[async_trait]
impl FundsMover for CommandMover {
    fn mode(&self) -> ExecutionMode {
        ExecutionMode::LiveSandbox
    }

    async fn create_wallet(&self, _owner_hint: &str) -> Result<WalletKeys> {
        let keys = WalletKeys::random();
        prefund(&self.client, &self.network.friendbot_url, &keys.address).await;
        Ok(keys)
    }

    async fn move_funds(
        &self,
        source: &WalletCredential,
        destination: &str,
        amount: Decimal,
        currency: Currency,
    ) -> Result<Transfer> {
        let signer = WalletKeys::from_credential(source)?;
        let stroops = to_stroops(amount)?.to_string();
        let asset = asset_for(currency, &self.asset_issuers)?;

        let output = self
            .run(
                &[
                    "tx",
                    "new",
                    "payment",
                    "--destination",
                    destination,
                    "--asset",
                    &asset,
                    "--amount",
                    &stroops,
                ],
                source,
            )
            .await?;

        let transaction_id = extract_transaction_hash(&output).ok_or_else(|| {
            Error::MoverUnavailable("no transaction hash in CLI output".to_string())
        })?;

        tracing::info!(
            %transaction_id,
            source = %signer.address,
            currency = %currency,
            "Sandbox transfer completed"
        );

        Ok(Transfer {
            transaction_id,
            explorer_url: None,
            mode: ExecutionMode::LiveSandbox,
        })
    }
}

#[derive(Serialize)]
struct RelayPayment<'a> {
    source_secret: &'a str,
    destination: &'a str,
    amount: String,
    asset: &'a str,
    network_passphrase: &'a str,
}

#[derive(Debug, Deserialize)]
struct RelayReceipt {
    hash: String,
}

/// Testnet backend talking to a payment relay over HTTP
///
/// The relay signs with the `source_secret` it receives.
#[derive(Debug, Clone)]
pub struct RelayMover {
    client: reqwest::Client,
    relay_url: String,
    network: NetworkSettings,
}

impl RelayMover {
    /// Create a relay-backed mover
    pub fn new(relay_url: String, network: NetworkSettings) -> Self {
        Self {
            client: reqwest::Client::new(),
            relay_url: relay_url.trim_end_matches('/').to_string(),
            network,
        }
    }
}

#[async_trait]
impl FundsMover for RelayMover {
    fn mode(&self) -> ExecutionMode {
        ExecutionMode::LiveTestnet
    }

    async fn create_wallet(&self, _owner_hint: &str) -> Result<WalletKeys> {
        let keys = WalletKeys::random();
        prefund(&self.client, &self.network.friendbot_url, &keys.address).await;
        Ok(keys)
    }

    async fn move_funds(
        &self,
        source: &WalletCredential,
        destination: &str,
        amount: Decimal,
        currency: Currency,
    ) -> Result<Transfer> {
        let signer = WalletKeys::from_credential(source)?;
        let body = RelayPayment {
            source_secret: source.expose(),
            destination,
            amount: amount.to_string(),
            asset: currency.code(),
            network_passphrase: &self.network.network_passphrase,
        };

        let response = self
            .client
            .post(format!("{}/payments", self.relay_url))
            .json(&body)
            .send()
            .await
            .map_err(|e| Error::MoverUnavailable(format!("relay request failed: {}", e)))?;

        if !response.status().is_success() {
            return Err(Error::MoverUnavailable(format!(
                "relay returned {}",
                response.status()
            )));
        }

        let receipt: RelayReceipt = response
            .json()
            .await
            .map_err(|e| Error::MoverUnavailable(format!("invalid relay response: {}", e)))?;

        tracing::info!(
            transaction_id = %receipt.hash,
            source = %signer.address,
            currency = %currency,
            "Testnet transfer completed"
        );

        Ok(Transfer {
            explorer_url: Some(testnet_explorer_url(&receipt.hash)),
            transaction_id: receipt.hash,
            mode: ExecutionMode::LiveTestnet,
        })
    }
}

#[derive(Debug, Deserialize)]
struct FriendbotReceipt {
    hash: Option<String>,
}

/// Ask friendbot to create and fund `address`
///
/// Best effort: failures are logged and the wallet is returned unfunded.
async fn prefund(client: &reqwest::Client, friendbot_url: &str, address: &str) -> Option<String> {
    let response = match client
        .get(friendbot_url)
        .query(&[("addr", address)])
        .send()
        .await
    {
        Ok(response) => response,
        Err(e) => {
            tracing::warn!(error = %e, "Friendbot request failed, continuing without prefund");
            return None;
        }
    };

    if !response.status().is_success() {
        tracing::warn!(status = %response.status(), "Friendbot refused prefund");
        return None;
    }

    let hash = response
        .json::<FriendbotReceipt>()
        .await
        .ok()
        .and_then(|receipt| receipt.hash);
    tracing::debug!(%address, hash = ?hash, "Wallet prefunded");
    hash
}

/// Amount in stroops (1e-7 of a unit)
pub fn to_stroops(amount: Decimal) -> Result<i64> {
    let stroops = amount
        .checked_mul(Decimal::from(STROOPS_PER_UNIT))
        .filter(|s| s.is_sign_positive() && !s.is_zero() && s.fract().is_zero())
        .and_then(|s| s.to_i64());

    stroops.ok_or_else(|| {
        Error::Validation(format!("{} cannot be expressed in stroops", amount))
    })
}

/// CLI asset argument: `native` or `CODE:ISSUER`
fn asset_for(currency: Currency, issuers: &BTreeMap<String, String>) -> Result<String> {
    if currency == Currency::XLM {
        return Ok("native".to_string());
    }

    issuers
        .get(currency.code())
        .map(|issuer| format!("{}:{}", currency.code(), issuer))
        .ok_or_else(|| {
            Error::MoverUnavailable(format!("no issuer configured for {}", currency.code()))
        })
}

/// Explorer link for a testnet transaction
pub fn testnet_explorer_url(transaction_id: &str) -> String {
    format!("{}/{}", TESTNET_EXPLORER, transaction_id)
}

/// Find the first 64-hex transaction hash in CLI output
pub fn extract_transaction_hash(output: &str) -> Option<String> {
    let pattern = Regex::new(r"\b[0-9a-fA-F]{64}\b").ok()?;
    pattern
        .find(output)
        .map(|m| m.as_str().to_ascii_lowercase())
}
