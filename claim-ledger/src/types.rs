//! Core types for the claim ledger
//!
//! All persisted types serialize to flat JSON documents. Money is exact
//! (`Decimal`, serialized as a string).

use crate::config::{MoverMode, NetworkSettings};
use crate::token::{LookupKey, SecretToken};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

/// Prefix stored in `claimed_by` when a claim was consumed by forwarding
pub const FORWARD_MARKER: &str = "forward:";

/// Supported assets
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[non_exhaustive]
pub enum Currency {
    /// Circle USD
    USDC,
    /// PayPal USD
    PYUSD,
    /// Stellar Lumens
    XLM,
}

impl Currency {
    /// Asset code
    pub fn code(&self) -> &'static str {
        match self {
            Currency::USDC => "USDC",
            Currency::PYUSD => "PYUSD",
            Currency::XLM => "XLM",
        }
    }

    /// Maximum number of decimal places accepted for an amount
    pub fn precision(&self) -> u32 {
        match self {
            Currency::USDC | Currency::PYUSD => 2,
            Currency::XLM => 7,
        }
    }

    /// Human readable description
    pub fn description(&self) -> &'static str {
        match self {
            Currency::USDC => "Circle USD",
            Currency::PYUSD => "PayPal USD",
            Currency::XLM => "Stellar Lumens",
        }
    }

    /// Parse from string (case-insensitive)
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_uppercase().as_str() {
            "USDC" => Some(Currency::USDC),
            "PYUSD" => Some(Currency::PYUSD),
            "XLM" => Some(Currency::XLM),
            _ => None,
        }
    }

    /// All supported assets
    pub fn all() -> &'static [Currency] {
        &[Currency::USDC, Currency::PYUSD, Currency::XLM]
    }
}

impl fmt::Display for Currency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

/// How a transfer was actually carried out
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ExecutionMode {
    /// No value moved
    Simulated,
    /// Executed on the public testnet
    LiveTestnet,
    /// Executed on a local sandbox
    LiveSandbox,
}

impl ExecutionMode {
    /// Whether a real network carried the transfer
    pub fn is_live(&self) -> bool {
        !matches!(self, ExecutionMode::Simulated)
    }
}

impl fmt::Display for ExecutionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            ExecutionMode::Simulated => "simulated",
            ExecutionMode::LiveTestnet => "live-testnet",
            ExecutionMode::LiveSandbox => "live-sandbox",
        };
        f.write_str(label)
    }
}

/// Claim status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ClaimStatus {
    /// Funds waiting for the recipient
    Pending,
    /// Terminal
    Redeemed,
}

/// Opaque wallet credential handed to the funds mover
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WalletCredential(String);

impl WalletCredential {
    /// Wrap a credential
    pub fn new(secret: impl Into<String>) -> Self {
        Self(secret.into())
    }

    /// Expose the credential to a funds mover
    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for WalletCredential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("WalletCredential(<redacted>)")
    }
}

/// Sender supplied decoration of a claim
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClaimMetadata {
    /// Sender display name
    pub sender_name: Option<String>,

    /// Free-text message
    pub message: Option<String>,
}

/// One issued magic link
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClaimRecord {
    /// Storage key derived from the secret token
    pub lookup_key: LookupKey,

    /// Claim wallet address
    pub wallet_address: String,

    /// Claim wallet credential
    pub wallet_credential: WalletCredential,

    /// Email or phone of the recipient
    pub recipient: String,

    /// Amount held by the claim wallet
    pub amount: Decimal,

    /// Asset
    pub currency: Currency,

    /// Current status
    pub status: ClaimStatus,

    /// Creation time
    pub created_at: DateTime<Utc>,

    /// Expiry time
    pub expires_at: DateTime<Utc>,

    /// Redemption time
    pub redeemed_at: Option<DateTime<Utc>>,

    /// Transaction that funded the claim wallet
    pub funding_transaction_id: Option<String>,

    /// How the funding transfer was executed
    pub funding_mode: ExecutionMode,

    /// Explorer link for the funding transfer
    pub explorer_url: Option<String>,

    /// Sender display name
    pub sender_name: Option<String>,

    /// Free-text message
    pub message: Option<String>,

    /// Final destination once redeemed
    pub claimed_by: Option<String>,

    /// Recipients this claim was forwarded to
    #[serde(default)]
    pub forward_history: BTreeSet<String>,

    /// Last time the recipient acknowledged the link without redeeming
    pub last_acknowledged_at: Option<DateTime<Utc>>,
}

impl ClaimRecord {
    /// Check expiry against `now`
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now > self.expires_at
    }

    /// Check terminal state
    pub fn is_redeemed(&self) -> bool {
        self.status == ClaimStatus::Redeemed
    }

    /// Apply the single `pending -> redeemed` transition
    pub fn mark_redeemed(&mut self, claimed_by: String, now: DateTime<Utc>) -> crate::Result<()> {
        if self.is_redeemed() {
            return Err(crate::Error::AlreadyRedeemed);
        }

        self.status = ClaimStatus::Redeemed;
        self.redeemed_at = Some(now);
        self.claimed_by = Some(claimed_by);
        Ok(())
    }

    /// Caller-facing projection
    pub fn view(&self) -> ClaimView {
        ClaimView {
            lookup_key: self.lookup_key.clone(),
            wallet_address: self.wallet_address.clone(),
            recipient: self.recipient.clone(),
            amount: self.amount,
            currency: self.currency,
            status: self.status,
            created_at: self.created_at,
            expires_at: self.expires_at,
            redeemed_at: self.redeemed_at,
            funding_transaction_id: self.funding_transaction_id.clone(),
            funding_mode: self.funding_mode,
            explorer_url: self.explorer_url.clone(),
            sender_name: self.sender_name.clone(),
            message: self.message.clone(),
            claimed_by: self.claimed_by.clone(),
            last_acknowledged_at: self.last_acknowledged_at,
        }
    }
}

/// Claim data safe to hand outside the ledger
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClaimView {
    /// Storage key
    pub lookup_key: LookupKey,
    /// Claim wallet address
    pub wallet_address: String,
    /// Recipient
    pub recipient: String,
    /// Amount
    pub amount: Decimal,
    /// Asset
    pub currency: Currency,
    /// Status
    pub status: ClaimStatus,
    /// Creation time
    pub created_at: DateTime<Utc>,
    /// Expiry time
    pub expires_at: DateTime<Utc>,
    /// Redemption time
    pub redeemed_at: Option<DateTime<Utc>>,
    /// Funding transaction
    pub funding_transaction_id: Option<String>,
    /// Funding execution mode
    pub funding_mode: ExecutionMode,
    /// Explorer link
    pub explorer_url: Option<String>,
    /// Sender display name
    pub sender_name: Option<String>,
    /// Free-text message
    pub message: Option<String>,
    /// Final destination
    pub claimed_by: Option<String>,
    /// Last acknowledgement
    pub last_acknowledged_at: Option<DateTime<Utc>>,
}

/// Active payment mode and the network it points at
#[derive(Debug, Clone, Serialize)]
pub struct RuntimeDetails {
    /// Selected mode
    pub mode: MoverMode,
    /// Label attached to transfers made in this mode
    pub execution_mode: ExecutionMode,
    /// True while no value moves
    pub demo: bool,
    /// Endpoints and passphrase
    #[serde(flatten)]
    pub network: NetworkSettings,
    /// Whether a treasury credential is configured
    pub treasury_credential_configured: bool,
    /// Whether the mode needs a treasury credential
    pub requires_treasury_credential: bool,
    /// Modes a caller may switch to
    pub available_modes: Vec<MoverMode>,
}

/// Result of issuing a claim
#[derive(Debug, Clone)]
pub struct IssuedClaim {
    /// Raw token to embed in the link
    pub token: SecretToken,
    /// Storage key
    pub lookup_key: LookupKey,
    /// Expiry time
    pub expires_at: DateTime<Utc>,
    /// Claim wallet address
    pub wallet_address: String,
    /// Funding transaction
    pub funding_transaction_id: Option<String>,
    /// Funding execution mode
    pub funding_mode: ExecutionMode,
    /// Explorer link
    pub explorer_url: Option<String>,
}

/// Result of a self-redemption
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RedemptionResult {
    /// Transaction that moved the funds out of the claim wallet
    pub transaction_id: String,
    /// Explorer link
    pub explorer_url: Option<String>,
    /// Destination address
    pub claimed_by: String,
    /// Claim wallet address
    pub wallet_address: String,
    /// Amount
    pub amount: Decimal,
    /// Asset
    pub currency: Currency,
    /// How the transfer was executed
    pub mode: ExecutionMode,
}

/// Result of forwarding a claim to a new recipient
#[derive(Debug, Clone)]
pub struct ForwardResult {
    /// Token of the successor claim
    pub token: SecretToken,
    /// Storage key of the successor claim
    pub lookup_key: LookupKey,
    /// Expiry of the successor claim
    pub expires_at: DateTime<Utc>,
    /// New recipient
    pub recipient: String,
    /// Successor wallet address
    pub wallet_address: String,
    /// Amount carried over
    pub amount: Decimal,
    /// Asset carried over
    pub currency: Currency,
    /// Transaction that funded the successor wallet
    pub transaction_id: String,
    /// Explorer link
    pub explorer_url: Option<String>,
    /// How the transfer was executed
    pub mode: ExecutionMode,
    /// Sender name carried over
    pub sender_name: Option<String>,
    /// Message on the successor claim
    pub message: Option<String>,
    /// Audit record of the forward
    pub action_id: uuid::Uuid,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_record() -> ClaimRecord {
        record_for(&SecretToken::generate())
    }

    fn record_for(token: &SecretToken) -> ClaimRecord {
        let now = Utc::now();
        ClaimRecord {
            lookup_key: LookupKey::derive(token),
            wallet_address: "GTESTWALLET".to_string(),
            wallet_credential: WalletCredential::new("STESTSECRET"),
            recipient: "alice@example.com".to_string(),
            amount: Decimal::new(10000, 2),
            currency: Currency::USDC,
            status: ClaimStatus::Pending,
            created_at: now,
            expires_at: now + chrono::Duration::days(7),
            redeemed_at: None,
            funding_transaction_id: None,
            funding_mode: ExecutionMode::Simulated,
            explorer_url: None,
            sender_name: None,
            message: None,
            claimed_by: None,
            forward_history: BTreeSet::new(),
            last_acknowledged_at: None,
        }
    }

    #[test]
    fn test_currency_parse() {
        assert_eq!(Currency::parse("usdc"), Some(Currency::USDC));
        assert_eq!(Currency::parse(" XLM "), Some(Currency::XLM));
        assert_eq!(Currency::parse("DOGE"), None);
        assert_eq!(Currency::XLM.precision(), 7);
    }

    #[test]
    fn test_execution_mode_labels() {
        assert_eq!(
            serde_json::to_string(&ExecutionMode::LiveTestnet).unwrap(),
            "\"live-testnet\""
        );
        assert_eq!(ExecutionMode::LiveSandbox.to_string(), "live-sandbox");
        assert!(!ExecutionMode::Simulated.is_live());
    }

    #[test]
    fn test_mark_redeemed_once() {
        let mut record = test_record();
        assert!(record.claimed_by.is_none());

        record.mark_redeemed("GDEST".to_string(), Utc::now()).unwrap();
        assert!(record.is_redeemed());
        assert_eq!(record.claimed_by.as_deref(), Some("GDEST"));

        let second = record.mark_redeemed("GOTHER".to_string(), Utc::now());
        assert!(matches!(second, Err(crate::Error::AlreadyRedeemed)));
        assert_eq!(record.claimed_by.as_deref(), Some("GDEST"));
    }

    #[test]
    fn test_serialized_record_hides_token() {
        let token = SecretToken::generate();
        let record = record_for(&token);
        let json = serde_json::to_string(&record).unwrap();
        let debug = format!("{:?}", record);

        assert!(!json.contains(token.expose()));
        assert!(!debug.contains(token.expose()));
        assert!(json.contains("\"amount\":\"100.00\""));

        let restored: ClaimRecord = serde_json::from_str(&json).unwrap();
        assert_eq!(restored.lookup_key, record.lookup_key);
    }

    #[test]
    fn test_credential_debug_redacted() {
        let record = test_record();
        let debug = format!("{:?}", record);
        assert!(!debug.contains("STESTSECRET"));
    }
}
