//! Configuration for the claim ledger

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

/// Longest accepted claim lifetime (one year)
pub const MAX_CLAIM_TTL_SECS: i64 = 365 * 24 * 60 * 60;

const TESTNET_RPC_URL: &str = "https://soroban-testnet.stellar.org";
const TESTNET_FRIENDBOT_URL: &str = "https://friendbot.stellar.org";
const TESTNET_PASSPHRASE: &str = "Test SDF Network ; September 2015";
const SANDBOX_RPC_URL: &str = "http://localhost:8000/soroban/rpc";
const SANDBOX_FRIENDBOT_URL: &str = "http://localhost:8000/friendbot";
const SANDBOX_PASSPHRASE: &str = "Standalone Network ; February 2017";

/// Ledger configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Directory for the JSON documents (falls back to the OS temp dir, then memory)
    pub data_dir: Option<PathBuf>,

    /// Service name
    pub service_name: String,

    /// Public base URL used to build claim links
    pub base_url: String,

    /// Claim lifetime in seconds (1 to [`MAX_CLAIM_TTL_SECS`])
    pub claim_ttl_secs: i64,

    /// Maximum length of the sender's free-text message
    pub max_message_len: usize,

    /// Maximum length of the sender display name
    pub max_sender_name_len: usize,

    /// Funds mover configuration
    pub mover: MoverConfig,

    /// Rate limit budgets applied at the HTTP boundary
    pub rate_limits: RateLimitConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: Some(PathBuf::from("./data/claims")),
            service_name: "claim-ledger".to_string(),
            base_url: "http://localhost:3000".to_string(),
            claim_ttl_secs: 7 * 24 * 60 * 60, // 7 days
            max_message_len: 280,
            max_sender_name_len: 100,
            mover: MoverConfig::default(),
            rate_limits: RateLimitConfig::default(),
        }
    }
}

/// How transfers are executed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MoverMode {
    /// Deterministic local simulation
    #[serde(alias = "simulation", alias = "demo", alias = "off")]
    Simulated,
    /// Payment relay on the public testnet
    #[serde(alias = "live", alias = "on")]
    Testnet,
    /// Local sandbox driven through an external CLI
    Sandbox,
}

impl MoverMode {
    /// Every selectable mode
    pub const ALL: [MoverMode; 3] = [MoverMode::Simulated, MoverMode::Testnet, MoverMode::Sandbox];

    /// Parse a mode label, accepting the legacy aliases
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "simulated" | "simulation" | "demo" | "off" => Some(MoverMode::Simulated),
            "testnet" | "live" | "on" => Some(MoverMode::Testnet),
            "sandbox" => Some(MoverMode::Sandbox),
            _ => None,
        }
    }

    /// Mode label
    pub fn as_str(&self) -> &'static str {
        match self {
            MoverMode::Simulated => "simulated",
            MoverMode::Testnet => "testnet",
            MoverMode::Sandbox => "sandbox",
        }
    }

    /// Whether transfers touch a real network
    pub fn is_live(&self) -> bool {
        !matches!(self, MoverMode::Simulated)
    }
}

impl From<crate::types::ExecutionMode> for MoverMode {
    fn from(mode: crate::types::ExecutionMode) -> Self {
        match mode {
            crate::types::ExecutionMode::Simulated => MoverMode::Simulated,
            crate::types::ExecutionMode::LiveTestnet => MoverMode::Testnet,
            crate::types::ExecutionMode::LiveSandbox => MoverMode::Sandbox,
        }
    }
}

impl fmt::Display for MoverMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Endpoints and passphrase of the network behind a mode
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NetworkSettings {
    /// RPC endpoint
    pub rpc_url: String,
    /// Network passphrase signed into every transaction
    pub network_passphrase: String,
    /// Faucet used to prefund new wallets, without trailing slash
    pub friendbot_url: String,
}

/// Funds mover configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MoverConfig {
    /// Backend selection
    pub mode: MoverMode,

    /// Upper bound for a single mover call (milliseconds)
    pub timeout_ms: u64,

    /// Artificial latency of the simulated backend (milliseconds)
    pub simulated_latency_ms: u64,

    /// Credential of the treasury wallet that funds new claims
    pub treasury_credential: Option<String>,

    /// Payment relay endpoint (testnet)
    pub relay_url: Option<String>,

    /// CLI binary used in sandbox mode
    pub command_path: String,

    /// RPC endpoint override (defaults depend on the mode)
    pub rpc_url: Option<String>,

    /// Friendbot endpoint override (defaults depend on the mode)
    pub friendbot_url: Option<String>,

    /// Issuer account per non-native asset code
    pub asset_issuers: BTreeMap<String, String>,
}

impl Default for MoverConfig {
    fn default() -> Self {
        Self {
            mode: MoverMode::Simulated,
            timeout_ms: 15_000,
            simulated_latency_ms: 0,
            treasury_credential: None,
            relay_url: None,
            command_path: "stellar".to_string(),
            rpc_url: None,
            friendbot_url: None,
            asset_issuers: BTreeMap::new(),
        }
    }
}

impl MoverConfig {
    /// Network settings for `mode`, with overrides applied
    ///
    /// Simulation reports the public testnet, which is where a switch to a
    /// live mode lands by default.
    pub fn network(&self, mode: MoverMode) -> NetworkSettings {
        let (rpc_url, friendbot_url, passphrase) = match mode {
            MoverMode::Sandbox => (SANDBOX_RPC_URL, SANDBOX_FRIENDBOT_URL, SANDBOX_PASSPHRASE),
            MoverMode::Testnet | MoverMode::Simulated => {
                (TESTNET_RPC_URL, TESTNET_FRIENDBOT_URL, TESTNET_PASSPHRASE)
            }
        };

        NetworkSettings {
            rpc_url: self.rpc_url.clone().unwrap_or_else(|| rpc_url.to_string()),
            network_passphrase: passphrase.to_string(),
            friendbot_url: self
                .friendbot_url
                .as_deref()
                .unwrap_or(friendbot_url)
                .trim_end_matches('/')
                .to_string(),
        }
    }

    /// Why `mode` cannot run with this configuration, if it cannot
    pub fn missing_for(&self, mode: MoverMode) -> Option<&'static str> {
        match mode {
            MoverMode::Simulated => None,
            _ if self.treasury_credential.is_none() => Some("treasury credential"),
            MoverMode::Testnet if self.relay_url.is_none() => Some("relay URL"),
            _ => None,
        }
    }
}

/// A fixed-window budget
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct RateBudget {
    /// Requests allowed per window
    pub limit: u32,

    /// Window length (milliseconds)
    pub window_ms: u64,
}

impl RateBudget {
    /// Window length
    pub fn window(&self) -> Duration {
        Duration::from_millis(self.window_ms)
    }
}

/// Rate limit budgets per endpoint family
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RateLimitConfig {
    /// Token verification
    pub verify: RateBudget,

    /// Redemption
    pub redeem: RateBudget,

    /// Forwarding
    pub forward: RateBudget,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            verify: RateBudget { limit: 10, window_ms: 60_000 },
            redeem: RateBudget { limit: 10, window_ms: 60_000 },
            forward: RateBudget { limit: 5, window_ms: 5 * 60_000 },
        }
    }
}

impl Config {
    /// Claim lifetime, clamped to `0..=MAX_CLAIM_TTL_SECS`
    pub fn claim_ttl(&self) -> chrono::Duration {
        chrono::Duration::seconds(self.claim_ttl_secs.clamp(0, MAX_CLAIM_TTL_SECS))
    }

    /// Reject values that cannot describe a working ledger
    pub fn validate(&self) -> crate::Result<()> {
        if !(1..=MAX_CLAIM_TTL_SECS).contains(&self.claim_ttl_secs) {
            return Err(crate::Error::Config(format!(
                "claim_ttl_secs must be between 1 and {}, got {}",
                MAX_CLAIM_TTL_SECS, self.claim_ttl_secs
            )));
        }

        if self.mover.timeout_ms == 0 {
            return Err(crate::Error::Config(
                "mover timeout_ms must be positive".to_string(),
            ));
        }

        Ok(())
    }

    /// Mover call bound
    pub fn mover_timeout(&self) -> Duration {
        Duration::from_millis(self.mover.timeout_ms)
    }

    /// Load from file
    pub fn from_file(path: impl AsRef<std::path::Path>) -> crate::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)
            .map_err(|e| crate::Error::Config(format!("Failed to parse config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Load from environment variables
    pub fn from_env() -> crate::Result<Self> {
        let mut config = Config::default();

        if let Ok(data_dir) = std::env::var("CLAIMS_DATA_DIR") {
            config.data_dir = Some(PathBuf::from(data_dir));
        }

        if let Ok(base_url) = std::env::var("CLAIMS_BASE_URL") {
            config.base_url = base_url;
        }

        if let Ok(ttl) = std::env::var("CLAIMS_TTL_SECS") {
            config.claim_ttl_secs = ttl
                .parse()
                .map_err(|e| crate::Error::Config(format!("Invalid CLAIMS_TTL_SECS: {}", e)))?;
        }

        if let Ok(mode) = std::env::var("CLAIMS_MOVER_MODE") {
            config.mover.mode = MoverMode::parse(&mode)
                .ok_or_else(|| crate::Error::Config(format!("Unsupported mover mode: {}", mode)))?;
        }

        if let Ok(timeout) = std::env::var("CLAIMS_MOVER_TIMEOUT_MS") {
            config.mover.timeout_ms = timeout.parse().map_err(|e| {
                crate::Error::Config(format!("Invalid CLAIMS_MOVER_TIMEOUT_MS: {}", e))
            })?;
        }

        if let Ok(secret) = std::env::var("CLAIMS_TREASURY_CREDENTIAL") {
            config.mover.treasury_credential = Some(secret);
        }

        if let Ok(url) = std::env::var("CLAIMS_RELAY_URL") {
            config.mover.relay_url = Some(url);
        }

        if let Ok(path) = std::env::var("CLAIMS_CLI_PATH") {
            config.mover.command_path = path;
        }

        if let Ok(url) = std::env::var("CLAIMS_RPC_URL") {
            config.mover.rpc_url = Some(url);
        }

        if let Ok(url) = std::env::var("CLAIMS_FRIENDBOT_URL") {
            config.mover.friendbot_url = Some(url);
        }

        for currency in ["USDC", "PYUSD"] {
            if let Ok(issuer) = std::env::var(format!("CLAIMS_{}_ISSUER", currency)) {
                config.mover.asset_issuers.insert(currency.to_string(), issuer);
            }
        }

        config.validate()?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.service_name, "claim-ledger");
        assert_eq!(config.claim_ttl(), chrono::Duration::days(7));
        assert_eq!(config.mover.mode, MoverMode::Simulated);
        assert_eq!(config.rate_limits.forward.limit, 5);
    }

    #[test]
    fn test_mover_mode_aliases() {
        assert_eq!(MoverMode::parse("simulation"), Some(MoverMode::Simulated));
        assert_eq!(MoverMode::parse("LIVE"), Some(MoverMode::Testnet));
        assert_eq!(MoverMode::parse(" sandbox "), Some(MoverMode::Sandbox));
        assert_eq!(MoverMode::parse("mainnet"), None);
    }

    #[test]
    fn test_partial_toml() {
        let config: Config = toml::from_str(
            r#"
            base_url = "https://claims.example.com"
            claim_ttl_secs = 3600

            [mover]
            mode = "demo"
            "#,
        )
        .unwrap();

        assert_eq!(config.base_url, "https://claims.example.com");
        assert_eq!(config.claim_ttl_secs, 3600);
        assert_eq!(config.mover.mode, MoverMode::Simulated);
        assert_eq!(config.mover.timeout_ms, 15_000);
        assert_eq!(config.max_message_len, 280);
    }

    #[test]
    fn test_ttl_bounds() {
        for ttl in [i64::MAX, MAX_CLAIM_TTL_SECS + 1, 0, -60] {
            let config = Config {
                claim_ttl_secs: ttl,
                ..Config::default()
            };
            assert!(matches!(config.validate(), Err(crate::Error::Config(_))), "{}", ttl);
        }

        let config = Config {
            claim_ttl_secs: MAX_CLAIM_TTL_SECS,
            ..Config::default()
        };
        assert!(config.validate().is_ok());
        assert_eq!(config.claim_ttl(), chrono::Duration::days(365));

        let huge = Config {
            claim_ttl_secs: i64::MAX,
            ..Config::default()
        };
        assert_eq!(huge.claim_ttl(), chrono::Duration::days(365));
    }

    #[test]
    fn test_from_file_rejects_huge_ttl() {
        let temp = tempfile::TempDir::new().unwrap();
        let path = temp.path().join("claims.toml");

        std::fs::write(&path, format!("claim_ttl_secs = {}\n", i64::MAX)).unwrap();
        assert!(matches!(Config::from_file(&path), Err(crate::Error::Config(_))));

        std::fs::write(&path, "claim_ttl_secs = -1\n").unwrap();
        assert!(matches!(Config::from_file(&path), Err(crate::Error::Config(_))));

        std::fs::write(&path, "claim_ttl_secs = 86400\n").unwrap();
        assert_eq!(Config::from_file(&path).unwrap().claim_ttl_secs, 86400);
    }

    #[test]
    fn test_network_per_mode() {
        let config = MoverConfig::default();
        let sandbox = config.network(MoverMode::Sandbox);
        assert_eq!(sandbox.rpc_url, "http://localhost:8000/soroban/rpc");
        assert_eq!(sandbox.network_passphrase, "Standalone Network ; February 2017");

        let testnet = config.network(MoverMode::Testnet);
        assert_eq!(testnet.friendbot_url, "https://friendbot.stellar.org");
        assert_eq!(config.network(MoverMode::Simulated), testnet);

        let overridden = MoverConfig {
            friendbot_url: Some("http://faucet.local/".to_string()),
            ..MoverConfig::default()
        };
        assert_eq!(
            overridden.network(MoverMode::Sandbox).friendbot_url,
            "http://faucet.local"
        );
    }

    #[test]
    fn test_missing_requirements() {
        let mut config = MoverConfig::default();
        assert_eq!(config.missing_for(MoverMode::Simulated), None);
        assert_eq!(config.missing_for(MoverMode::Sandbox), Some("treasury credential"));

        config.treasury_credential = Some("STREASURY".to_string());
        assert_eq!(config.missing_for(MoverMode::Sandbox), None);
        assert_eq!(config.missing_for(MoverMode::Testnet), Some("relay URL"));
    }
}
