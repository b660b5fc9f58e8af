//! HTTP boundary for the magic claims ledger
//!
//! Request models, error translation, per-client rate limiting and route
//! wiring. All claim state lives in [`claim_ledger::ClaimService`], which the
//! binary constructs once and hands to every worker.

pub mod config;
pub mod errors;
pub mod handlers;
pub mod models;

pub use errors::{ApiError, ApiResult};
pub use handlers::configure_routes;
