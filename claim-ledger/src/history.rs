//! Transaction history
//!
//! Read-side projection of sender-initiated transfers, one entry per claim,
//! keyed by lookup key. Entries carry a denormalized copy of the claim so
//! listings never join against the ledger.
//!
//! Only the ledger mutates entries. Entries never hold the claim URL or the
//! raw token.

use crate::error::{Error, Result};
use crate::storage::{DurableStore, DOC_TRANSACTIONS};
use crate::token::LookupKey;
use crate::types::{Currency, ExecutionMode};
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use uuid::Uuid;

/// History status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransactionStatus {
    /// Funded and waiting for the recipient
    Sent,
    /// Redeemed or forwarded
    Claimed,
    /// Funding failed at creation time
    Failed,
}

/// Timeline event kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TransactionEventKind {
    /// Recipient opened the link without redeeming
    Acknowledged,
    /// Recipient chose to keep the balance
    Keep,
    /// Bank withdrawal requested
    WithdrawRequest,
    /// Cash pickup requested
    CashoutRequest,
    /// Funds left the claim wallet
    ClaimTransfer,
    /// Claim was forwarded to a new recipient
    Forwarded,
}

/// One timeline event
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionEvent {
    /// Event kind
    pub kind: TransactionEventKind,
    /// When it happened
    pub timestamp: DateTime<Utc>,
    /// Free-form details
    #[serde(default)]
    pub data: BTreeMap<String, String>,
}

impl TransactionEvent {
    /// Event stamped now
    pub fn now(kind: TransactionEventKind) -> Self {
        Self {
            kind,
            timestamp: Utc::now(),
            data: BTreeMap::new(),
        }
    }

    /// Attach a detail
    pub fn with(mut self, key: &str, value: impl ToString) -> Self {
        self.data.insert(key.to_string(), value.to_string());
        self
    }
}

/// Input for a new history entry
#[derive(Debug, Clone)]
pub struct NewTransaction {
    /// Claim lookup key
    pub lookup_key: LookupKey,
    /// Recipient
    pub recipient: String,
    /// Amount
    pub amount: Decimal,
    /// Asset
    pub currency: Currency,
    /// Claim wallet address
    pub wallet_address: String,
    /// Funding transaction
    pub transaction_id: Option<String>,
    /// Funding mode
    pub mode: ExecutionMode,
    /// Sender display name
    pub sender_name: Option<String>,
}

/// One history entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransactionEntry {
    /// Entry id
    pub id: Uuid,
    /// Claim lookup key
    pub lookup_key: LookupKey,
    /// Recipient
    pub recipient: String,
    /// Amount
    pub amount: Decimal,
    /// Asset
    pub currency: Currency,
    /// Status
    pub status: TransactionStatus,
    /// Claim wallet address
    pub wallet_address: String,
    /// Funding transaction
    pub transaction_id: Option<String>,
    /// Funding mode
    pub mode: ExecutionMode,
    /// Sender display name
    pub sender_name: Option<String>,
    /// Creation time
    pub created_at: DateTime<Utc>,
    /// Last update
    pub updated_at: DateTime<Utc>,
    /// Redemption time
    pub claimed_at: Option<DateTime<Utc>>,
    /// Transaction that emptied the claim wallet
    pub claim_transaction_id: Option<String>,
    /// Final destination
    pub claimed_by: Option<String>,
    /// Mover error for failed entries
    pub failure_reason: Option<String>,
    /// Timeline
    #[serde(default)]
    pub events: Vec<TransactionEvent>,
}

/// Transaction history store
#[derive(Debug)]
pub struct TransactionHistory {
    store: Arc<DurableStore>,
    entries: RwLock<HashMap<LookupKey, TransactionEntry>>,
}

impl TransactionHistory {
    /// Load the history document
    pub fn new(store: Arc<DurableStore>) -> Self {
        let entries: HashMap<LookupKey, TransactionEntry> =
            store.load(DOC_TRANSACTIONS, HashMap::new());
        tracing::debug!(entries = entries.len(), "Loaded transaction history");

        Self {
            store,
            entries: RwLock::new(entries),
        }
    }

    /// Record a funded send or forward
    pub fn record(&self, input: NewTransaction) -> TransactionEntry {
        self.insert(input, TransactionStatus::Sent, None)
    }

    /// Record a send whose funding failed
    pub fn record_failure(&self, input: NewTransaction, reason: impl Into<String>) -> TransactionEntry {
        self.insert(input, TransactionStatus::Failed, Some(reason.into()))
    }

    fn insert(
        &self,
        input: NewTransaction,
        status: TransactionStatus,
        failure_reason: Option<String>,
    ) -> TransactionEntry {
        let now = Utc::now();
        let entry = TransactionEntry {
            id: Uuid::now_v7(),
            lookup_key: input.lookup_key,
            recipient: input.recipient,
            amount: input.amount,
            currency: input.currency,
            status,
            wallet_address: input.wallet_address,
            transaction_id: input.transaction_id,
            mode: input.mode,
            sender_name: input.sender_name,
            created_at: now,
            updated_at: now,
            claimed_at: None,
            claim_transaction_id: None,
            claimed_by: None,
            failure_reason,
            events: Vec::new(),
        };

        let mut entries = self.entries.write();
        entries.insert(entry.lookup_key.clone(), entry.clone());
        self.store.save(DOC_TRANSACTIONS, &*entries);

        entry
    }

    /// Move an entry to `claimed`
    pub fn mark_claimed(
        &self,
        lookup_key: &LookupKey,
        claim_transaction_id: Option<String>,
        claimed_by: &str,
    ) -> Result<TransactionEntry> {
        let mut entries = self.entries.write();
        let entry = entries.get_mut(lookup_key).ok_or(Error::NotFound)?;

        let now = Utc::now();
        entry.status = TransactionStatus::Claimed;
        entry.claimed_at = Some(now);
        entry.updated_at = now;
        entry.claimed_by = Some(claimed_by.to_string());
        if claim_transaction_id.is_some() {
            entry.claim_transaction_id = claim_transaction_id;
        }

        let updated = entry.clone();
        self.store.save(DOC_TRANSACTIONS, &*entries);
        Ok(updated)
    }

    /// Append a timeline event; false when the entry is unknown
    pub fn append_event(&self, lookup_key: &LookupKey, event: TransactionEvent) -> bool {
        let mut entries = self.entries.write();
        let Some(entry) = entries.get_mut(lookup_key) else {
            tracing::debug!(lookup_key = %lookup_key.short(), "No history entry for event");
            return false;
        };

        entry.updated_at = event.timestamp;
        entry.events.push(event);
        self.store.save(DOC_TRANSACTIONS, &*entries);
        true
    }

    /// Entry for a claim
    pub fn get(&self, lookup_key: &LookupKey) -> Option<TransactionEntry> {
        self.entries.read().get(lookup_key).cloned()
    }

    /// All entries, newest first
    pub fn list(&self) -> Vec<TransactionEntry> {
        let mut list: Vec<TransactionEntry> = self.entries.read().values().cloned().collect();
        list.sort_by(|a, b| b.created_at.cmp(&a.created_at).then_with(|| b.id.cmp(&a.id)));
        list
    }
}
