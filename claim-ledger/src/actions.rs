//! Claim action log
//!
//! Append-only audit of what recipients asked for: keep, withdraw to a bank,
//! cash out, or forward. Records are never mutated and have no bearing on
//! redemption state.
//!
//! Bank account numbers are masked before a withdrawal can be stored; the
//! stored payload type has no field for the full number.

use crate::storage::{DurableStore, DOC_ACTIONS};
use crate::token::LookupKey;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use uuid::Uuid;

/// Action kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActionKind {
    /// Keep the balance in the claim wallet
    Keep,
    /// Withdraw to a bank account
    Withdraw,
    /// Cash pickup
    CashOut,
    /// Forward to another recipient
    Forward,
}

impl ActionKind {
    /// Parse an action label
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "keep" => Some(ActionKind::Keep),
            "withdraw" => Some(ActionKind::Withdraw),
            "cashout" => Some(ActionKind::CashOut),
            "forward" => Some(ActionKind::Forward),
            _ => None,
        }
    }
}

impl fmt::Display for ActionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            ActionKind::Keep => "keep",
            ActionKind::Withdraw => "withdraw",
            ActionKind::CashOut => "cashout",
            ActionKind::Forward => "forward",
        };
        f.write_str(label)
    }
}

/// Bank withdrawal as submitted by the recipient
#[derive(Clone, Default, Deserialize)]
#[serde(default)]
pub struct WithdrawRequest {
    /// Account holder
    pub full_name: String,
    /// Bank name
    pub bank_name: String,
    /// Full account number
    pub account_number: String,
    /// Routing number
    pub routing_number: Option<String>,
    /// Free-text notes
    pub notes: Option<String>,
}

impl fmt::Debug for WithdrawRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WithdrawRequest")
            .field("full_name", &self.full_name)
            .field("bank_name", &self.bank_name)
            .field("account_number", &mask_account_number(&self.account_number))
            .finish_non_exhaustive()
    }
}

/// Bank withdrawal in the form it is stored
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MaskedWithdrawal {
    /// Account holder
    pub full_name: String,
    /// Bank name
    pub bank_name: String,
    /// `****` followed by the last four digits
    pub masked_account: String,
    /// Routing number
    pub routing_number: Option<String>,
    /// Free-text notes
    pub notes: Option<String>,
}

impl From<WithdrawRequest> for MaskedWithdrawal {
    fn from(request: WithdrawRequest) -> Self {
        Self {
            masked_account: mask_account_number(&request.account_number),
            full_name: request.full_name,
            bank_name: request.bank_name,
            routing_number: request.routing_number,
            notes: request.notes,
        }
    }
}

/// Cash pickup request
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CashOutRequest {
    /// Recipient name
    pub full_name: String,
    /// Pickup country
    pub country: String,
    /// Pickup city
    pub city: Option<String>,
    /// Contact detail
    pub contact: Option<String>,
}

/// Forward as recorded in the log
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ForwardNote {
    /// New recipient
    pub recipient: String,
    /// Message on the successor claim
    pub message: Option<String>,
    /// Lookup key of the successor claim
    pub successor: LookupKey,
}

/// Stored payload of one action
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActionPayload {
    /// Keep
    Keep,
    /// Withdraw
    Withdraw(MaskedWithdrawal),
    /// Cash out
    CashOut(CashOutRequest),
    /// Forward
    Forward(ForwardNote),
}

impl ActionPayload {
    /// Kind of this payload
    pub fn kind(&self) -> ActionKind {
        match self {
            ActionPayload::Keep => ActionKind::Keep,
            ActionPayload::Withdraw(_) => ActionKind::Withdraw,
            ActionPayload::CashOut(_) => ActionKind::CashOut,
            ActionPayload::Forward(_) => ActionKind::Forward,
        }
    }
}

/// One audit record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClaimActionRecord {
    /// Record id
    pub id: Uuid,
    /// Claim lookup key
    pub lookup_key: LookupKey,
    /// Action kind
    pub action: ActionKind,
    /// When it was recorded
    pub created_at: DateTime<Utc>,
    /// Action details
    pub payload: ActionPayload,
    /// Human readable notes for support
    #[serde(default)]
    pub logs: Vec<String>,
}

/// Append-only action log
#[derive(Debug)]
pub struct ClaimActionLog {
    store: Arc<DurableStore>,
    records: Mutex<BTreeMap<String, ClaimActionRecord>>,
}

impl ClaimActionLog {
    /// Load the action document
    pub fn new(store: Arc<DurableStore>) -> Self {
        let records: BTreeMap<String, ClaimActionRecord> = store.load(DOC_ACTIONS, BTreeMap::new());
        tracing::debug!(records = records.len(), "Loaded claim action log");

        Self {
            store,
            records: Mutex::new(records),
        }
    }

    /// Append a record
    pub fn append(&self, lookup_key: &LookupKey, payload: ActionPayload, logs: Vec<String>) -> Uuid {
        let record = ClaimActionRecord {
            id: Uuid::now_v7(),
            lookup_key: lookup_key.clone(),
            action: payload.kind(),
            created_at: Utc::now(),
            payload,
            logs,
        };
        let id = record.id;

        tracing::info!(
            lookup_key = %lookup_key.short(),
            action = %record.action,
            action_id = %id,
            "Claim action recorded"
        );

        let mut records = self.records.lock();
        records.insert(id.to_string(), record);
        self.store.save(DOC_ACTIONS, &*records);

        id
    }

    /// All records for a claim, oldest first
    pub fn list_for(&self, lookup_key: &LookupKey) -> Vec<ClaimActionRecord> {
        let mut list: Vec<ClaimActionRecord> = self
            .records
            .lock()
            .values()
            .filter(|r| &r.lookup_key == lookup_key)
            .cloned()
            .collect();
        list.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));
        list
    }

    /// Total number of records
    pub fn len(&self) -> usize {
        self.records.lock().len()
    }

    /// Whether the log is empty
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Keep only the last four digits of an account number
///
/// Numbers with fewer than five digits reveal nothing.
pub fn mask_account_number(account_number: &str) -> String {
    let digits: Vec<char> = account_number.chars().filter(|c| c.is_ascii_digit()).collect();
    if digits.len() < 5 {
        return "****".to_string();
    }
    let last4: String = digits[digits.len() - 4..].iter().collect();
    format!("****{}", last4)
}
