//! Notifier boundary
//!
//! Delivery of claim links is fire-and-forget: failures are logged and never
//! turn into a claim failure.

use crate::error::Result;
use crate::types::Currency;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use std::sync::Arc;

/// Why a recipient is being notified
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationKind {
    /// A sender created a claim
    NewClaim,
    /// An existing claim was forwarded
    Forwarded,
}

/// One delivery request
#[derive(Debug, Clone)]
pub struct Notification {
    /// Email or phone
    pub recipient: String,
    /// Public claim link (contains the token)
    pub claim_url: String,
    /// Amount
    pub amount: Decimal,
    /// Asset
    pub currency: Currency,
    /// Sender display name
    pub sender_name: Option<String>,
    /// Link expiry
    pub expires_at: DateTime<Utc>,
    /// Context
    pub kind: NotificationKind,
}

impl Notification {
    /// Only email recipients have a delivery channel
    pub fn is_deliverable(&self) -> bool {
        self.recipient.contains('@')
    }
}

/// Outbound delivery channel
#[async_trait]
pub trait Notifier: Send + Sync + std::fmt::Debug {
    /// Deliver a claim link
    async fn notify(&self, notification: &Notification) -> Result<()>;
}

/// Deliver and swallow failures
pub async fn dispatch(notifier: &Arc<dyn Notifier>, notification: Notification) {
    if !notification.is_deliverable() {
        tracing::info!(kind = ?notification.kind, "Recipient has no email channel, skipping notification");
        return;
    }

    if let Err(e) = notifier.notify(&notification).await {
        tracing::warn!(kind = ?notification.kind, error = %e, "Failed to deliver claim notification");
    }
}

/// Logs delivery requests instead of sending them
#[derive(Debug, Clone, Default)]
pub struct TracingNotifier;

#[async_trait]
impl Notifier for TracingNotifier {
    async fn notify(&self, notification: &Notification) -> Result<()> {
        tracing::info!(
            recipient = %notification.recipient,
            amount = %notification.amount,
            currency = %notification.currency,
            expires_at = %notification.expires_at,
            kind = ?notification.kind,
            "Claim notification queued"
        );
        Ok(())
    }
}

/// Drops every notification
#[derive(Debug, Clone, Default)]
pub struct NoopNotifier;

#[async_trait]
impl Notifier for NoopNotifier {
    async fn notify(&self, _notification: &Notification) -> Result<()> {
        Ok(())
    }
}
