//! Magic Claims Ledger
//!
//! Single-use "magic link" claims: a sender funds a claim wallet, the
//! recipient redeems, forwards or withdraws it exactly once.
//!
//! # Architecture
//!
//! - **Token codec**: 256-bit tokens, stored only as SHA-256 lookup keys
//! - **Per-key writer**: one async mutex per lookup key serializes mutations
//! - **Durable store**: whole-document JSON with atomic replace, memory fallback
//! - **Funds mover**: pluggable transfer backend (simulated, sandbox, testnet),
//!   switchable at runtime
//!
//! # Invariants
//!
//! - A claim moves `pending -> redeemed` at most once
//! - An expired claim is never usable, whatever its status
//! - `claimed_by` is set if and only if the claim is redeemed
//! - Persisted documents never contain a usable token

#![forbid(unsafe_code)]
#![warn(
    missing_docs,
    rust_2018_idioms,
    missing_debug_implementations,
    clippy::all
)]

pub mod actions;
pub mod config;
pub mod error;
pub mod history;
pub mod ledger;
pub mod metrics;
pub mod mover;
pub mod notifier;
pub mod rate_limit;
pub mod service;
pub mod storage;
pub mod token;
pub mod types;

// Re-exports
pub use actions::{ActionKind, ActionPayload, ClaimActionLog, ClaimActionRecord};
pub use config::{
    Config, MoverConfig, MoverMode, NetworkSettings, RateBudget, RateLimitConfig, MAX_CLAIM_TTL_SECS,
};
pub use error::{Error, Result};
pub use history::{TransactionEntry, TransactionHistory, TransactionStatus};
pub use ledger::{ClaimLedger, ForwardOptions, IssueRequest, NewClaim};
pub use metrics::Metrics;
pub use mover::{
    build_mover, is_valid_address, mover_for_mode, FundsMover, SimulatedMover, Transfer, WalletKeys,
};
pub use notifier::{NoopNotifier, Notifier, TracingNotifier};
pub use rate_limit::{RateLimitDecision, RateLimiter};
pub use service::{
    ActionReceipt, ClaimService, CreateClaimRequest, CreatedClaim, ForwardedClaim, PreferenceAction,
};
pub use storage::{DurableStore, StoreBackend};
pub use token::{LookupKey, SecretToken};
pub use types::{
    ClaimMetadata, ClaimRecord, ClaimStatus, ClaimView, Currency, ExecutionMode, ForwardResult,
    IssuedClaim, RedemptionResult, RuntimeDetails, WalletCredential,
};
