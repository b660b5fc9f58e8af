//! Claim ledger
//!
//! Owns every claim record and is the only writer of claim state. History and
//! the action log are updated from here so the two never disagree about a
//! terminal transition.
//!
//! # State machine
//!
//! ```text
//! pending --[redeem_to_self | forward]--> redeemed
//! pending --[expiry reached]-----------> absent (evicted lazily)
//! ```
//!
//! # Concurrency
//!
//! - Mutations on one lookup key are serialized by a per-key async mutex.
//!   The key lock is held across the funds mover call, so only traffic for
//!   the same token waits on a slow transfer. A key's mutex is dropped from
//!   the lock table once its last holder releases it.
//! - The in-memory index is the source of truth. The claims document is
//!   written while the index write lock is held, so snapshots reach the
//!   store in commit order.
//! - `forward` holds the original's key lock while the successor is created
//!   and persisted, and only then marks the original redeemed.
//! - The active funds mover can be swapped at runtime. Each operation works
//!   with the mover that was active when it started.
//!
//! # Example
//!
//! ```no_run
//! use claim_ledger::{ClaimLedger, Config, Currency, DurableStore, IssueRequest};
//! use rust_decimal::Decimal;
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> claim_ledger::Result<()> {
//!     let config = Config::default();
//!     let store = Arc::new(DurableStore::open(config.data_dir.as_deref()));
//!     let ledger = ClaimLedger::open(config, store)?;
//!
//!     let issued = ledger
//!         .issue(IssueRequest {
//!             recipient: "alice@example.com".to_string(),
//!             amount: Decimal::new(100, 0),
//!             currency: Currency::USDC,
//!             metadata: Default::default(),
//!         })
//!         .await?;
//!
//!     let redeemed = ledger.redeem_to_self(&issued.token, None).await?;
//!     println!("claimed in {}", redeemed.transaction_id);
//!     Ok(())
//! }
//! ```

use crate::{
    actions::{ActionPayload, ClaimActionLog, ForwardNote},
    history::{NewTransaction, TransactionEvent, TransactionEventKind, TransactionHistory},
    metrics::Metrics,
    mover::{mover_for_mode, FundsMover, Transfer, WalletKeys},
    storage::{DurableStore, DOC_CLAIMS, DOC_PAYMENT_MODE},
    token::{LookupKey, SecretToken},
    types::{
        ClaimMetadata, ClaimRecord, ClaimStatus, ClaimView, Currency, ExecutionMode, ForwardResult,
        IssuedClaim, RedemptionResult, RuntimeDetails, WalletCredential, FORWARD_MARKER,
    },
    Config, Error, MoverMode, Result,
};
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use parking_lot::RwLock;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};
use std::future::Future;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::{Mutex, OwnedMutexGuard};

const SIMULATED_TREASURY: &str = "simulated-treasury";

/// Sender-facing send request
#[derive(Debug, Clone)]
pub struct IssueRequest {
    /// Email or phone of the recipient
    pub recipient: String,
    /// Amount
    pub amount: Decimal,
    /// Asset
    pub currency: Currency,
    /// Sender name and message
    pub metadata: ClaimMetadata,
}

/// A claim to insert for an existing wallet
#[derive(Debug, Clone)]
pub struct NewClaim {
    /// Email or phone of the recipient
    pub recipient: String,
    /// Wallet holding the funds
    pub wallet: WalletKeys,
    /// Amount
    pub amount: Decimal,
    /// Asset
    pub currency: Currency,
    /// Sender name and message
    pub metadata: ClaimMetadata,
    /// Transfer that funded the wallet
    pub funding: Option<Transfer>,
}

/// Options for `forward`
#[derive(Debug, Clone, Default)]
pub struct ForwardOptions {
    /// Message for the new recipient; the original message is kept when absent
    pub message: Option<String>,
}

#[derive(Debug)]
struct ActiveMover {
    mode: MoverMode,
    mover: Arc<dyn FundsMover>,
}

#[derive(Debug, Serialize, Deserialize)]
struct PersistedMode {
    mode: MoverMode,
    updated_at: DateTime<Utc>,
}

type KeyLocks = DashMap<LookupKey, Arc<Mutex<()>>>;

/// Exclusive hold on one lookup key
///
/// Dropping it releases the mutex and removes the table entry when no other
/// task holds a handle to it.
struct KeyGuard<'a> {
    locks: &'a KeyLocks,
    lookup_key: LookupKey,
    lock: Arc<Mutex<()>>,
    guard: Option<OwnedMutexGuard<()>>,
}

impl<'a> KeyGuard<'a> {
    fn new(locks: &'a KeyLocks, lookup_key: &LookupKey) -> Self {
        let lock = locks.entry(lookup_key.clone()).or_default().clone();
        Self {
            locks,
            lookup_key: lookup_key.clone(),
            lock,
            guard: None,
        }
    }

    async fn acquire(locks: &'a KeyLocks, lookup_key: &LookupKey) -> KeyGuard<'a> {
        let mut key = Self::new(locks, lookup_key);
        key.guard = Some(key.lock.clone().lock_owned().await);
        key
    }

    fn try_acquire(locks: &'a KeyLocks, lookup_key: &LookupKey) -> Option<KeyGuard<'a>> {
        let mut key = Self::new(locks, lookup_key);
        key.guard = Some(key.lock.clone().try_lock_owned().ok()?);
        Some(key)
    }
}

impl Drop for KeyGuard<'_> {
    fn drop(&mut self) {
        self.guard.take();
        // Two handles left: the table's and ours
        self.locks
            .remove_if(&self.lookup_key, |_, lock| Arc::strong_count(lock) <= 2);
    }
}

/// Claim ledger
#[derive(Debug)]
pub struct ClaimLedger {
    config: Config,
    store: Arc<DurableStore>,
    mover: RwLock<ActiveMover>,
    treasury: WalletCredential,
    index: RwLock<HashMap<LookupKey, ClaimRecord>>,
    key_locks: KeyLocks,
    history: TransactionHistory,
    actions: ClaimActionLog,
    metrics: Metrics,
}

impl ClaimLedger {
    /// Build a ledger over a store with the mover for the persisted payment
    /// mode, or the configured one when none was persisted
    pub fn open(config: Config, store: Arc<DurableStore>) -> Result<Self> {
        let persisted: Option<PersistedMode> = store.load(DOC_PAYMENT_MODE, None);
        let mode = persisted.map(|p| p.mode).unwrap_or(config.mover.mode);
        let mover = mover_for_mode(&config.mover, mode);
        Self::new(config, store, mover)
    }

    /// Build a ledger over a store, hydrating the index from the claims document
    pub fn new(config: Config, store: Arc<DurableStore>, mover: Arc<dyn FundsMover>) -> Result<Self> {
        let metrics = Metrics::new()
            .map_err(|e| Error::Config(format!("Failed to register metrics: {}", e)))?;

        let records: HashMap<LookupKey, ClaimRecord> = store.load(DOC_CLAIMS, HashMap::new());
        let pending = records.values().filter(|r| !r.is_redeemed()).count();
        tracing::info!(
            records = records.len(),
            pending,
            durable = store.is_durable(),
            mode = %mover.mode(),
            "Claim ledger hydrated"
        );

        let treasury = WalletCredential::new(
            config
                .mover
                .treasury_credential
                .clone()
                .unwrap_or_else(|| SIMULATED_TREASURY.to_string()),
        );

        Ok(Self {
            history: TransactionHistory::new(store.clone()),
            actions: ClaimActionLog::new(store.clone()),
            config,
            store,
            mover: RwLock::new(ActiveMover {
                mode: MoverMode::from(mover.mode()),
                mover,
            }),
            treasury,
            index: RwLock::new(records),
            key_locks: DashMap::new(),
            metrics,
        })
    }

    /// Configuration
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Transaction history
    pub fn history(&self) -> &TransactionHistory {
        &self.history
    }

    /// Claim action log
    pub fn actions(&self) -> &ClaimActionLog {
        &self.actions
    }

    /// Metrics
    pub fn metrics(&self) -> &Metrics {
        &self.metrics
    }

    /// Execution mode of the active mover
    pub fn mode(&self) -> ExecutionMode {
        self.active_mover().mode()
    }

    fn active_mover(&self) -> Arc<dyn FundsMover> {
        self.mover.read().mover.clone()
    }

    /// Active payment mode and its network settings
    pub fn runtime(&self) -> RuntimeDetails {
        let active = self.mover.read();
        RuntimeDetails {
            mode: active.mode,
            execution_mode: active.mover.mode(),
            demo: !active.mode.is_live(),
            network: self.config.mover.network(active.mode),
            treasury_credential_configured: self.config.mover.treasury_credential.is_some(),
            requires_treasury_credential: active.mode.is_live(),
            available_modes: MoverMode::ALL.to_vec(),
        }
    }

    /// Swap the funds mover for `mode` and persist the choice
    ///
    /// Live modes are refused unless their credentials are configured.
    /// Operations already running finish on the previous mover.
    pub fn switch_mode(&self, mode: MoverMode) -> Result<RuntimeDetails> {
        if let Some(missing) = self.config.mover.missing_for(mode) {
            return Err(Error::Validation(format!(
                "Switching to {} mode requires a {} to be configured",
                mode, missing
            )));
        }

        {
            let mut active = self.mover.write();
            if active.mode != mode {
                let previous = active.mode;
                *active = ActiveMover {
                    mode,
                    mover: mover_for_mode(&self.config.mover, mode),
                };
                self.store.save(
                    DOC_PAYMENT_MODE,
                    &PersistedMode {
                        mode,
                        updated_at: Utc::now(),
                    },
                );
                tracing::info!(from = %previous, to = %mode, "Payment mode switched");
            }
        }

        Ok(self.runtime())
    }

    /// Number of records in the index (any status)
    pub fn len(&self) -> usize {
        self.index.read().len()
    }

    /// Whether the index is empty
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Create a wallet, fund it from the treasury and persist a pending claim
    ///
    /// A funding failure is recorded in history as `failed` and surfaces as
    /// `MoverUnavailable`; no claim is created.
    pub async fn issue(&self, request: IssueRequest) -> Result<IssuedClaim> {
        let token = SecretToken::generate();
        let lookup_key = LookupKey::derive(&token);
        let mover = self.active_mover();

        let wallet = match self.bounded(mover.create_wallet(&request.recipient)).await {
            Ok(wallet) => wallet,
            Err(e) => {
                self.record_issue_failure(&lookup_key, &request, String::new(), mover.mode(), &e);
                return Err(e);
            }
        };

        let funding = self
            .bounded(mover.move_funds(
                &self.treasury,
                &wallet.address,
                request.amount,
                request.currency,
            ))
            .await;
        let funding = match funding {
            Ok(transfer) => transfer,
            Err(e) => {
                self.record_issue_failure(
                    &lookup_key,
                    &request,
                    wallet.address.clone(),
                    mover.mode(),
                    &e,
                );
                return Err(e);
            }
        };

        let issued = self.insert_record(
            token,
            NewClaim {
                recipient: request.recipient.clone(),
                wallet,
                amount: request.amount,
                currency: request.currency,
                metadata: request.metadata.clone(),
                funding: Some(funding),
            },
        );

        self.history.record(NewTransaction {
            lookup_key: issued.lookup_key.clone(),
            recipient: request.recipient,
            amount: request.amount,
            currency: request.currency,
            wallet_address: issued.wallet_address.clone(),
            transaction_id: issued.funding_transaction_id.clone(),
            mode: issued.funding_mode,
            sender_name: request.metadata.sender_name,
        });
        self.metrics.record_issued();

        Ok(issued)
    }

    fn record_issue_failure(
        &self,
        lookup_key: &LookupKey,
        request: &IssueRequest,
        wallet_address: String,
        mode: ExecutionMode,
        error: &Error,
    ) {
        self.history.record_failure(
            NewTransaction {
                lookup_key: lookup_key.clone(),
                recipient: request.recipient.clone(),
                amount: request.amount,
                currency: request.currency,
                wallet_address,
                transaction_id: None,
                mode,
                sender_name: request.metadata.sender_name.clone(),
            },
            error.to_string(),
        );
    }

    /// Persist a new pending claim for an existing wallet
    pub fn create(&self, claim: NewClaim) -> IssuedClaim {
        self.insert_record(SecretToken::generate(), claim)
    }

    fn insert_record(&self, token: SecretToken, claim: NewClaim) -> IssuedClaim {
        let now = Utc::now();
        let lookup_key = LookupKey::derive(&token);
        let expires_at = now + self.config.claim_ttl();

        let (funding_transaction_id, funding_mode, explorer_url) = match claim.funding {
            Some(transfer) => (
                Some(transfer.transaction_id),
                transfer.mode,
                transfer.explorer_url,
            ),
            None => (None, ExecutionMode::Simulated, None),
        };

        let record = ClaimRecord {
            lookup_key: lookup_key.clone(),
            wallet_address: claim.wallet.address,
            wallet_credential: claim.wallet.credential,
            recipient: claim.recipient,
            amount: claim.amount,
            currency: claim.currency,
            status: ClaimStatus::Pending,
            created_at: now,
            expires_at,
            redeemed_at: None,
            funding_transaction_id,
            funding_mode,
            explorer_url,
            sender_name: claim.metadata.sender_name,
            message: claim.metadata.message,
            claimed_by: None,
            forward_history: BTreeSet::new(),
            last_acknowledged_at: None,
        };

        let issued = IssuedClaim {
            token,
            lookup_key: lookup_key.clone(),
            expires_at,
            wallet_address: record.wallet_address.clone(),
            funding_transaction_id: record.funding_transaction_id.clone(),
            funding_mode: record.funding_mode,
            explorer_url: record.explorer_url.clone(),
        };

        self.commit(record);
        tracing::info!(lookup_key = %lookup_key.short(), %expires_at, "Claim created");

        issued
    }

    /// Look up a pending, unexpired claim without mutating it
    ///
    /// Redeemed, expired and unknown tokens are all `NotFound`. Expired
    /// records are evicted when no mutation holds their key.
    pub fn verify(&self, token: &SecretToken) -> Result<ClaimView> {
        let lookup_key = LookupKey::derive(token);
        let record = self
            .index
            .read()
            .get(&lookup_key)
            .cloned()
            .ok_or(Error::NotFound)?;

        if record.is_redeemed() {
            return Err(Error::NotFound);
        }

        if record.is_expired(Utc::now()) {
            self.try_evict(&lookup_key);
            return Err(Error::NotFound);
        }

        Ok(record.view())
    }

    /// Like `verify`, but redeemed claims are returned too
    pub fn snapshot(&self, token: &SecretToken) -> Result<ClaimView> {
        let lookup_key = LookupKey::derive(token);
        let record = self
            .index
            .read()
            .get(&lookup_key)
            .cloned()
            .ok_or(Error::NotFound)?;

        if !record.is_redeemed() && record.is_expired(Utc::now()) {
            self.try_evict(&lookup_key);
            return Err(Error::NotFound);
        }

        Ok(record.view())
    }

    /// Record that the recipient looked at a claim without redeeming it
    pub async fn acknowledge(&self, token: &SecretToken) -> Result<ClaimView> {
        let lookup_key = LookupKey::derive(token);
        let _key = KeyGuard::acquire(&self.key_locks, &lookup_key).await;

        self.acknowledge_locked(&lookup_key)
    }

    /// Audit a non-redeeming preference (keep, withdraw, cash out) and
    /// acknowledge the claim
    ///
    /// Forwards go through [`ClaimLedger::forward`].
    pub async fn record_action(
        &self,
        token: &SecretToken,
        payload: ActionPayload,
        logs: Vec<String>,
    ) -> Result<(uuid::Uuid, ClaimView)> {
        if matches!(payload, ActionPayload::Forward(_)) {
            return Err(Error::Validation(
                "Forward actions must go through forward".to_string(),
            ));
        }

        let lookup_key = LookupKey::derive(token);
        let _key = KeyGuard::acquire(&self.key_locks, &lookup_key).await;

        let view = self.acknowledge_locked(&lookup_key)?;

        let event = match &payload {
            ActionPayload::Withdraw(w) => TransactionEvent::now(TransactionEventKind::WithdrawRequest)
                .with("bank_name", &w.bank_name)
                .with("masked_account", &w.masked_account),
            ActionPayload::CashOut(c) => TransactionEvent::now(TransactionEventKind::CashoutRequest)
                .with("country", &c.country),
            _ => TransactionEvent::now(TransactionEventKind::Keep),
        };
        self.history.append_event(
            &lookup_key,
            event
                .with("amount", view.amount)
                .with("currency", view.currency),
        );

        let action_id = self.actions.append(&lookup_key, payload, logs);
        Ok((action_id, view))
    }

    fn acknowledge_locked(&self, lookup_key: &LookupKey) -> Result<ClaimView> {
        let now = Utc::now();
        let mut record = self.load_pending(lookup_key, now)?;
        record.last_acknowledged_at = Some(now);
        let view = record.view();
        self.commit(record);

        self.history.append_event(
            lookup_key,
            TransactionEvent::now(TransactionEventKind::Acknowledged)
                .with("recipient", &view.recipient),
        );

        Ok(view)
    }

    /// Move the claim's funds to `destination` (the claim wallet itself when
    /// absent) and mark the claim redeemed
    ///
    /// A mover failure or timeout leaves the claim pending.
    pub async fn redeem_to_self(
        &self,
        token: &SecretToken,
        destination: Option<&str>,
    ) -> Result<RedemptionResult> {
        let started = Instant::now();
        let lookup_key = LookupKey::derive(token);
        let _key = KeyGuard::acquire(&self.key_locks, &lookup_key).await;

        let mut record = self.load_pending(&lookup_key, Utc::now())?;
        let destination = destination
            .map(str::trim)
            .filter(|d| !d.is_empty())
            .unwrap_or(record.wallet_address.as_str())
            .to_string();

        let transfer = self
            .bounded(self.active_mover().move_funds(
                &record.wallet_credential,
                &destination,
                record.amount,
                record.currency,
            ))
            .await?;

        record.mark_redeemed(destination.clone(), Utc::now())?;
        let result = RedemptionResult {
            transaction_id: transfer.transaction_id.clone(),
            explorer_url: transfer.explorer_url.clone(),
            claimed_by: destination.clone(),
            wallet_address: record.wallet_address.clone(),
            amount: record.amount,
            currency: record.currency,
            mode: transfer.mode,
        };
        self.commit(record);

        if let Err(e) = self.history.mark_claimed(
            &lookup_key,
            Some(transfer.transaction_id.clone()),
            &destination,
        ) {
            tracing::debug!(lookup_key = %lookup_key.short(), error = %e, "No history entry to mark claimed");
        }
        self.history.append_event(
            &lookup_key,
            TransactionEvent::now(TransactionEventKind::ClaimTransfer)
                .with("destination", &destination)
                .with("transaction_id", &transfer.transaction_id)
                .with("mode", transfer.mode),
        );

        self.metrics.record_redeemed(started.elapsed().as_secs_f64());
        tracing::info!(
            lookup_key = %lookup_key.short(),
            transaction_id = %result.transaction_id,
            mode = %result.mode,
            "Claim redeemed"
        );

        Ok(result)
    }

    /// Move the claim's funds into a brand-new claim for `new_recipient`
    ///
    /// The successor is persisted before the original is marked redeemed with
    /// `claimed_by = "forward:" + new_recipient`. It always gets a fresh TTL.
    pub async fn forward(
        &self,
        token: &SecretToken,
        new_recipient: &str,
        options: ForwardOptions,
    ) -> Result<ForwardResult> {
        let new_recipient = new_recipient.trim();
        if new_recipient.is_empty() {
            return Err(Error::Validation("Forward recipient is required".to_string()));
        }

        let lookup_key = LookupKey::derive(token);
        let _key = KeyGuard::acquire(&self.key_locks, &lookup_key).await;

        let mut original = self.load_pending(&lookup_key, Utc::now())?;

        let mover = self.active_mover();
        let wallet = self.bounded(mover.create_wallet(new_recipient)).await?;
        let transfer = self
            .bounded(mover.move_funds(
                &original.wallet_credential,
                &wallet.address,
                original.amount,
                original.currency,
            ))
            .await?;

        let message = options
            .message
            .map(|m| m.trim().to_string())
            .filter(|m| !m.is_empty())
            .or_else(|| original.message.clone());

        let successor = self.insert_record(
            SecretToken::generate(),
            NewClaim {
                recipient: new_recipient.to_string(),
                wallet,
                amount: original.amount,
                currency: original.currency,
                metadata: ClaimMetadata {
                    sender_name: original.sender_name.clone(),
                    message: message.clone(),
                },
                funding: Some(transfer.clone()),
            },
        );

        let claimed_by = format!("{}{}", FORWARD_MARKER, new_recipient);
        original.forward_history.insert(new_recipient.to_string());
        original.mark_redeemed(claimed_by.clone(), Utc::now())?;
        let (amount, currency, sender_name) =
            (original.amount, original.currency, original.sender_name.clone());
        self.commit(original);

        self.history.record(NewTransaction {
            lookup_key: successor.lookup_key.clone(),
            recipient: new_recipient.to_string(),
            amount,
            currency,
            wallet_address: successor.wallet_address.clone(),
            transaction_id: Some(transfer.transaction_id.clone()),
            mode: transfer.mode,
            sender_name: sender_name.clone(),
        });
        if let Err(e) =
            self.history
                .mark_claimed(&lookup_key, Some(transfer.transaction_id.clone()), &claimed_by)
        {
            tracing::debug!(lookup_key = %lookup_key.short(), error = %e, "No history entry to mark claimed");
        }
        self.history.append_event(
            &lookup_key,
            TransactionEvent::now(TransactionEventKind::Forwarded)
                .with("recipient", new_recipient)
                .with("transaction_id", &transfer.transaction_id),
        );

        let action_id = self.actions.append(
            &lookup_key,
            ActionPayload::Forward(ForwardNote {
                recipient: new_recipient.to_string(),
                message: message.clone(),
                successor: successor.lookup_key.clone(),
            }),
            vec![format!(
                "Forwarded {} {} to {}",
                amount, currency, new_recipient
            )],
        );

        self.metrics.record_forwarded();
        tracing::info!(
            lookup_key = %lookup_key.short(),
            successor = %successor.lookup_key.short(),
            transaction_id = %transfer.transaction_id,
            "Claim forwarded"
        );

        Ok(ForwardResult {
            token: successor.token,
            lookup_key: successor.lookup_key,
            expires_at: successor.expires_at,
            recipient: new_recipient.to_string(),
            wallet_address: successor.wallet_address,
            amount,
            currency,
            transaction_id: transfer.transaction_id,
            explorer_url: transfer.explorer_url,
            mode: transfer.mode,
            sender_name,
            message,
            action_id,
        })
    }

    /// Must be called with the key lock held
    fn load_pending(&self, lookup_key: &LookupKey, now: chrono::DateTime<Utc>) -> Result<ClaimRecord> {
        let record = self
            .index
            .read()
            .get(lookup_key)
            .cloned()
            .ok_or(Error::NotFound)?;

        if record.is_redeemed() {
            return Err(Error::AlreadyRedeemed);
        }

        if record.is_expired(now) {
            self.remove(lookup_key);
            return Err(Error::Expired);
        }

        Ok(record)
    }

    fn try_evict(&self, lookup_key: &LookupKey) {
        let Some(_key) = KeyGuard::try_acquire(&self.key_locks, lookup_key) else {
            return;
        };

        let still_expired = self
            .index
            .read()
            .get(lookup_key)
            .map(|r| !r.is_redeemed() && r.is_expired(Utc::now()))
            .unwrap_or(false);

        if still_expired {
            self.remove(lookup_key);
        }
    }

    fn remove(&self, lookup_key: &LookupKey) {
        {
            let mut index = self.index.write();
            if index.remove(lookup_key).is_none() {
                return;
            }
            self.store.save(DOC_CLAIMS, &*index);
        }
        tracing::info!(lookup_key = %lookup_key.short(), "Expired claim evicted");
    }

    fn commit(&self, record: ClaimRecord) {
        let mut index = self.index.write();
        index.insert(record.lookup_key.clone(), record);
        self.store.save(DOC_CLAIMS, &*index);
    }

    async fn bounded<T, F>(&self, call: F) -> Result<T>
    where
        F: Future<Output = Result<T>>,
    {
        let timeout = self.config.mover_timeout();
        match tokio::time::timeout(timeout, call).await {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(e)) => {
                self.metrics.record_mover_failure();
                tracing::warn!(error = %e, "Funds mover call failed");
                Err(match e {
                    Error::MoverUnavailable(reason) => Error::MoverUnavailable(reason),
                    other => Error::MoverUnavailable(other.to_string()),
                })
            }
            Err(_) => {
                self.metrics.record_mover_failure();
                tracing::warn!(timeout_ms = timeout.as_millis() as u64, "Funds mover call timed out");
                Err(Error::MoverUnavailable(format!(
                    "timed out after {}ms",
                    timeout.as_millis()
                )))
            }
        }
    }
}
