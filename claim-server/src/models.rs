use claim_ledger::{
    ClaimView, CreateClaimRequest, ExecutionMode, MoverMode, RedemptionResult, RuntimeDetails,
    TransactionEntry,
};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

// ===== Health =====
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub service: String,
    pub version: String,
    pub mode: ExecutionMode,
    pub claims: usize,
}

// ===== Create Claim =====
#[derive(Debug, Deserialize)]
pub struct CreateClaimBody {
    pub recipient: String,
    #[serde(deserialize_with = "amount_text")]
    pub amount: String,
    pub currency: String,
    #[serde(default, alias = "senderName")]
    pub sender_name: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
}

impl From<CreateClaimBody> for CreateClaimRequest {
    fn from(body: CreateClaimBody) -> Self {
        CreateClaimRequest {
            recipient: body.recipient,
            amount: body.amount,
            currency: body.currency,
            sender_name: body.sender_name,
            message: body.message,
        }
    }
}

/// Accept `"12.50"` as well as `12.5`
fn amount_text<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum AmountInput {
        Text(String),
        Number(serde_json::Number),
    }

    Ok(match AmountInput::deserialize(deserializer)? {
        AmountInput::Text(text) => text,
        AmountInput::Number(number) => number.to_string(),
    })
}

// ===== Verify =====
#[derive(Debug, Deserialize)]
pub struct VerifyBody {
    pub token: String,
}

#[derive(Debug, Serialize)]
pub struct VerifyResponse {
    pub valid: bool,
    pub claim: ClaimView,
}

// ===== Redeem =====
#[derive(Debug, Deserialize)]
pub struct RedeemBody {
    pub token: String,
    #[serde(default, alias = "destinationAddress", alias = "destination_address")]
    pub destination: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct RedeemResponse {
    pub success: bool,
    #[serde(flatten)]
    pub result: RedemptionResult,
}

// ===== Forward =====
#[derive(Debug, Deserialize)]
pub struct ForwardBody {
    pub token: String,
    #[serde(alias = "newRecipient", alias = "new_recipient")]
    pub recipient: String,
    #[serde(default)]
    pub message: Option<String>,
}

// ===== Preference Actions =====
#[derive(Debug, Deserialize)]
pub struct ActionBody {
    pub token: String,
    pub action: String,
    #[serde(default)]
    pub payload: serde_json::Value,
}

// ===== Payment Mode =====
/// Switch request: `mode`, `target` or `state` name a mode; `demo` toggles
/// between simulation (`true`) and testnet (`false`)
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct PaymentModeBody {
    pub mode: Option<Value>,
    pub target: Option<Value>,
    pub state: Option<Value>,
    pub demo: Option<Value>,
}

impl PaymentModeBody {
    pub fn requested_mode(&self) -> Option<MoverMode> {
        let named = self
            .mode
            .as_ref()
            .or(self.target.as_ref())
            .or(self.state.as_ref());

        named
            .and_then(requested_mode)
            .or_else(|| self.demo.as_ref().and_then(requested_mode))
    }
}

fn requested_mode(value: &Value) -> Option<MoverMode> {
    match value {
        Value::Bool(true) => Some(MoverMode::Simulated),
        Value::Bool(false) => Some(MoverMode::Testnet),
        Value::String(label) => match label.trim().to_ascii_lowercase().as_str() {
            "true" => Some(MoverMode::Simulated),
            "false" => Some(MoverMode::Testnet),
            other => MoverMode::parse(other),
        },
        _ => None,
    }
}

#[derive(Debug, Serialize)]
pub struct PaymentModeResponse {
    #[serde(flatten)]
    pub runtime: RuntimeDetails,
    pub updated: bool,
}

// ===== Transactions =====
#[derive(Debug, Serialize)]
pub struct TransactionsResponse {
    pub count: usize,
    pub transactions: Vec<TransactionEntry>,
}
