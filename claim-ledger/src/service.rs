//! Claim service
//!
//! The surface the HTTP layer talks to. Takes raw caller input, validates it,
//! drives the ledger and fires notifications. Constructed once at startup and
//! shared by reference; there is no ambient state.

use crate::{
    actions::{ActionKind, ActionPayload, CashOutRequest, MaskedWithdrawal, WithdrawRequest},
    history::TransactionEntry,
    ledger::{ClaimLedger, ForwardOptions, IssueRequest},
    notifier::{dispatch, Notification, NotificationKind, Notifier, TracingNotifier},
    storage::DurableStore,
    token::{claim_url, LookupKey, SecretToken},
    types::{ClaimMetadata, ClaimStatus, ClaimView, Currency, ExecutionMode, RedemptionResult},
    Config, Error, Result,
};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use std::sync::Arc;
use uuid::Uuid;

const MIN_PHONE_DIGITS: usize = 7;
const MAX_PHONE_DIGITS: usize = 15;

/// Raw send request
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CreateClaimRequest {
    /// Email or phone of the recipient
    pub recipient: String,
    /// Decimal amount as text
    pub amount: String,
    /// Asset code
    pub currency: String,
    /// Sender display name
    pub sender_name: Option<String>,
    /// Free-text message
    pub message: Option<String>,
}

/// A created claim, including the link to hand to the recipient
#[derive(Debug, Clone, Serialize)]
pub struct CreatedClaim {
    /// Raw token
    pub token: String,
    /// Public claim link
    pub claim_url: String,
    /// Storage key
    pub lookup_key: LookupKey,
    /// Claim wallet address
    pub wallet_address: String,
    /// Expiry
    pub expires_at: DateTime<Utc>,
    /// Funding transaction
    pub transaction_id: Option<String>,
    /// Funding mode
    pub mode: ExecutionMode,
    /// Explorer link
    pub explorer_url: Option<String>,
}

/// A forwarded claim
#[derive(Debug, Clone, Serialize)]
pub struct ForwardedClaim {
    /// Raw token of the successor
    pub token: String,
    /// Public link of the successor
    pub claim_url: String,
    /// Storage key of the successor
    pub lookup_key: LookupKey,
    /// New recipient
    pub recipient: String,
    /// Successor expiry
    pub expires_at: DateTime<Utc>,
    /// Amount carried over
    pub amount: Decimal,
    /// Asset carried over
    pub currency: Currency,
    /// Transaction that funded the successor
    pub transaction_id: String,
    /// Explorer link
    pub explorer_url: Option<String>,
    /// Execution mode
    pub mode: ExecutionMode,
    /// Audit record
    pub action_id: Uuid,
}

/// Body of a forward preference action
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ForwardRequest {
    /// New recipient
    pub recipient: String,
    /// Message for the new recipient
    pub message: Option<String>,
}

/// A recipient preference
#[derive(Debug, Clone)]
pub enum PreferenceAction {
    /// Keep the balance
    Keep,
    /// Withdraw to a bank account
    Withdraw(WithdrawRequest),
    /// Cash pickup
    CashOut(CashOutRequest),
    /// Forward to another recipient
    Forward(ForwardRequest),
}

impl PreferenceAction {
    /// Build from an action label and its JSON payload
    pub fn from_json(action: &str, payload: serde_json::Value) -> Result<Self> {
        let kind = ActionKind::parse(action)
            .ok_or_else(|| Error::Validation(format!("Unsupported claim action: {}", action)))?;

        let payload = if payload.is_null() {
            serde_json::Value::Object(Default::default())
        } else {
            payload
        };
        let invalid = |e: serde_json::Error| Error::Validation(format!("Invalid {} payload: {}", kind, e));

        Ok(match kind {
            ActionKind::Keep => PreferenceAction::Keep,
            ActionKind::Withdraw => PreferenceAction::Withdraw(serde_json::from_value(payload).map_err(invalid)?),
            ActionKind::CashOut => PreferenceAction::CashOut(serde_json::from_value(payload).map_err(invalid)?),
            ActionKind::Forward => PreferenceAction::Forward(serde_json::from_value(payload).map_err(invalid)?),
        })
    }

    /// Action kind
    pub fn kind(&self) -> ActionKind {
        match self {
            PreferenceAction::Keep => ActionKind::Keep,
            PreferenceAction::Withdraw(_) => ActionKind::Withdraw,
            PreferenceAction::CashOut(_) => ActionKind::CashOut,
            PreferenceAction::Forward(_) => ActionKind::Forward,
        }
    }
}

/// Outcome of a preference action
#[derive(Debug, Clone, Serialize)]
pub struct ActionReceipt {
    /// Audit record id
    pub action_id: Uuid,
    /// Action kind
    pub action: ActionKind,
    /// When the claim was acknowledged (non-forward actions)
    pub acknowledged_at: Option<DateTime<Utc>>,
    /// Masked account (withdraw only)
    pub masked_account: Option<String>,
    /// Successor claim (forward only)
    pub forwarded: Option<ForwardedClaim>,
}

/// Public claim operations
#[derive(Debug, Clone)]
pub struct ClaimService {
    ledger: Arc<ClaimLedger>,
    notifier: Arc<dyn Notifier>,
}

impl ClaimService {
    /// Wrap an existing ledger
    pub fn new(ledger: Arc<ClaimLedger>, notifier: Arc<dyn Notifier>) -> Self {
        Self { ledger, notifier }
    }

    /// Build store, mover and ledger from configuration
    ///
    /// A payment mode persisted by an earlier switch wins over the configured one.
    pub fn from_config(config: Config) -> Result<Self> {
        let store = Arc::new(DurableStore::open(config.data_dir.as_deref()));
        let ledger = Arc::new(ClaimLedger::open(config, store)?);
        Ok(Self::new(ledger, Arc::new(TracingNotifier)))
    }

    /// Underlying ledger
    pub fn ledger(&self) -> &ClaimLedger {
        &self.ledger
    }

    /// Validate, fund and persist a new claim, then notify the recipient
    pub async fn create_claim(&self, request: CreateClaimRequest) -> Result<CreatedClaim> {
        let config = self.ledger.config();
        let recipient = validate_recipient(&request.recipient)?;
        let currency = Currency::parse(&request.currency)
            .ok_or_else(|| Error::Validation(format!("Unsupported currency: {}", request.currency.trim())))?;
        let amount = validate_amount(&request.amount, currency)?;
        let sender_name = bounded_text(request.sender_name, config.max_sender_name_len, "Sender name")?;
        let message = bounded_text(request.message, config.max_message_len, "Message")?;

        let issued = self
            .ledger
            .issue(IssueRequest {
                recipient: recipient.clone(),
                amount,
                currency,
                metadata: ClaimMetadata {
                    sender_name: sender_name.clone(),
                    message,
                },
            })
            .await?;

        let url = claim_url(&config.base_url, &issued.token);
        self.notify(Notification {
            recipient,
            claim_url: url.clone(),
            amount,
            currency,
            sender_name,
            expires_at: issued.expires_at,
            kind: NotificationKind::NewClaim,
        });

        Ok(CreatedClaim {
            token: issued.token.expose().to_string(),
            claim_url: url,
            lookup_key: issued.lookup_key,
            wallet_address: issued.wallet_address,
            expires_at: issued.expires_at,
            transaction_id: issued.funding_transaction_id,
            mode: issued.funding_mode,
            explorer_url: issued.explorer_url,
        })
    }

    /// Read-only lookup of a pending claim
    pub fn verify_claim(&self, token: &str) -> Result<ClaimView> {
        self.ledger.verify(&parse_token(token)?)
    }

    /// Redeem a claim to a wallet
    pub async fn redeem_claim(&self, token: &str, destination: Option<&str>) -> Result<RedemptionResult> {
        self.ledger.redeem_to_self(&parse_token(token)?, destination).await
    }

    /// Forward a claim to a new recipient and notify them
    pub async fn forward_claim(
        &self,
        token: &str,
        new_recipient: &str,
        message: Option<String>,
    ) -> Result<ForwardedClaim> {
        let token = parse_token(token)?;
        let new_recipient = validate_recipient(new_recipient)?;
        let message = bounded_text(message, self.ledger.config().max_message_len, "Message")?;

        let result = self
            .ledger
            .forward(&token, &new_recipient, ForwardOptions { message })
            .await?;

        let url = claim_url(&self.ledger.config().base_url, &result.token);
        self.notify(Notification {
            recipient: result.recipient.clone(),
            claim_url: url.clone(),
            amount: result.amount,
            currency: result.currency,
            sender_name: result.sender_name.clone(),
            expires_at: result.expires_at,
            kind: NotificationKind::Forwarded,
        });

        Ok(ForwardedClaim {
            token: result.token.expose().to_string(),
            claim_url: url,
            lookup_key: result.lookup_key,
            recipient: result.recipient,
            expires_at: result.expires_at,
            amount: result.amount,
            currency: result.currency,
            transaction_id: result.transaction_id,
            explorer_url: result.explorer_url,
            mode: result.mode,
            action_id: result.action_id,
        })
    }

    /// Record a recipient preference
    ///
    /// Any action on a redeemed claim is `AlreadyRedeemed`. Keep, withdraw and
    /// cash out acknowledge the claim without redeeming it; forward redeems it.
    pub async fn record_preference_action(
        &self,
        token: &str,
        action: PreferenceAction,
    ) -> Result<ActionReceipt> {
        let parsed = parse_token(token)?;
        let snapshot = self.ledger.snapshot(&parsed)?;
        if snapshot.status == ClaimStatus::Redeemed {
            return Err(Error::AlreadyRedeemed);
        }

        let kind = action.kind();
        let (payload, logs, masked_account) = match action {
            PreferenceAction::Forward(forward) => {
                let forwarded = self
                    .forward_claim(token, &forward.recipient, forward.message)
                    .await?;
                return Ok(ActionReceipt {
                    action_id: forwarded.action_id,
                    action: kind,
                    acknowledged_at: None,
                    masked_account: None,
                    forwarded: Some(forwarded),
                });
            }
            PreferenceAction::Keep => (
                ActionPayload::Keep,
                vec![format!(
                    "Recipient {} acknowledged the claim without withdrawing",
                    snapshot.recipient
                )],
                None,
            ),
            PreferenceAction::Withdraw(request) => {
                let request = normalize_withdrawal(request)?;
                let masked = MaskedWithdrawal::from(request);
                let logs = vec![format!(
                    "Bank withdrawal of {} {} requested to {} for {}",
                    snapshot.amount, snapshot.currency, masked.bank_name, masked.full_name
                )];
                let account = masked.masked_account.clone();
                (ActionPayload::Withdraw(masked), logs, Some(account))
            }
            PreferenceAction::CashOut(request) => {
                let request = normalize_cash_out(request)?;
                let logs = vec![format!(
                    "Cash out of {} {} requested for {} in {}",
                    snapshot.amount, snapshot.currency, request.full_name, request.country
                )];
                (ActionPayload::CashOut(request), logs, None)
            }
        };

        let (action_id, view) = self.ledger.record_action(&parsed, payload, logs).await?;

        Ok(ActionReceipt {
            action_id,
            action: kind,
            acknowledged_at: view.last_acknowledged_at,
            masked_account,
            forwarded: None,
        })
    }

    /// History entries, newest first
    pub fn list_transactions(&self) -> Vec<TransactionEntry> {
        self.ledger.history().list()
    }

    fn notify(&self, notification: Notification) {
        let notifier = self.notifier.clone();
        tokio::spawn(async move {
            dispatch(&notifier, notification).await;
        });
    }
}

fn parse_token(token: &str) -> Result<SecretToken> {
    SecretToken::parse(token).ok_or_else(|| Error::Validation("Token is required".to_string()))
}

/// Accept an email-like or phone-like recipient
pub fn validate_recipient(recipient: &str) -> Result<String> {
    let recipient = recipient.trim();
    if recipient.is_empty() {
        return Err(Error::Validation("Recipient is required".to_string()));
    }

    if is_email_like(recipient) || is_phone_like(recipient) {
        Ok(recipient.to_string())
    } else {
        Err(Error::Validation(
            "Recipient must be an email address or phone number".to_string(),
        ))
    }
}

fn is_email_like(value: &str) -> bool {
    let Some((local, domain)) = value.split_once('@') else {
        return false;
    };

    !local.is_empty()
        && !domain.contains('@')
        && !value.chars().any(char::is_whitespace)
        && domain
            .split_once('.')
            .map(|(host, tld)| !host.is_empty() && !tld.is_empty() && !domain.ends_with('.'))
            .unwrap_or(false)
}

fn is_phone_like(value: &str) -> bool {
    let body = value.strip_prefix('+').unwrap_or(value);
    let digits = body.chars().filter(char::is_ascii_digit).count();

    (MIN_PHONE_DIGITS..=MAX_PHONE_DIGITS).contains(&digits)
        && body
            .chars()
            .all(|c| c.is_ascii_digit() || matches!(c, ' ' | '-' | '(' | ')' | '.'))
}

/// Parse a positive amount within the currency's precision
pub fn validate_amount(raw: &str, currency: Currency) -> Result<Decimal> {
    let amount = Decimal::from_str(raw.trim())
        .map_err(|_| Error::Validation(format!("Invalid amount: {}", raw.trim())))?;

    if amount <= Decimal::ZERO {
        return Err(Error::Validation("Amount must be positive".to_string()));
    }

    if amount.normalize().scale() > currency.precision() {
        return Err(Error::Validation(format!(
            "{} supports at most {} decimal places",
            currency,
            currency.precision()
        )));
    }

    Ok(amount)
}

fn bounded_text(value: Option<String>, max_len: usize, field: &str) -> Result<Option<String>> {
    let Some(value) = value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty()) else {
        return Ok(None);
    };

    if value.chars().count() > max_len {
        return Err(Error::Validation(format!(
            "{} must be at most {} characters",
            field, max_len
        )));
    }

    Ok(Some(value))
}

fn required(value: &str, message: &str) -> Result<String> {
    let value = value.trim();
    if value.is_empty() {
        Err(Error::Validation(message.to_string()))
    } else {
        Ok(value.to_string())
    }
}

fn optional(value: Option<String>) -> Option<String> {
    value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

fn normalize_withdrawal(request: WithdrawRequest) -> Result<WithdrawRequest> {
    let message = "Full name, bank name, and account number are required";
    Ok(WithdrawRequest {
        full_name: required(&request.full_name, message)?,
        bank_name: required(&request.bank_name, message)?,
        account_number: required(&request.account_number, message)?,
        routing_number: optional(request.routing_number),
        notes: optional(request.notes),
    })
}

fn normalize_cash_out(request: CashOutRequest) -> Result<CashOutRequest> {
    let message = "Full name and country are required for cash out";
    Ok(CashOutRequest {
        full_name: required(&request.full_name, message)?,
        country: required(&request.country, message)?,
        city: optional(request.city),
        contact: optional(request.contact),
    })
}
