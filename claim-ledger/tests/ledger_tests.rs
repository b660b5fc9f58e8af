//! Integration tests for the claim ledger
//!
//! Exercises the ledger through its public API against both store backends,
//! with instrumented funds movers for concurrency and failure cases.

use async_trait::async_trait;
use claim_ledger::{
    history::TransactionStatus, ClaimLedger, ClaimMetadata, ClaimStatus, Config, Currency,
    DurableStore, Error, ExecutionMode, ForwardOptions, FundsMover, IssueRequest, Result,
    SecretToken, SimulatedMover, Transfer, WalletCredential, WalletKeys,
};
use rust_decimal::Decimal;
use std::str::FromStr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Counts transfers and optionally fails the first few of them
#[derive(Debug, Default)]
struct CountingMover {
    transfers: AtomicUsize,
    fail_first: usize,
    delay: Duration,
}

impl CountingMover {
    fn failing(fail_first: usize) -> Self {
        Self {
            fail_first,
            ..Default::default()
        }
    }

    fn slow(delay: Duration) -> Self {
        Self {
            delay,
            ..Default::default()
        }
    }

    fn transfers(&self) -> usize {
        self.transfers.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl FundsMover for CountingMover {
    fn mode(&self) -> ExecutionMode {
        ExecutionMode::Simulated
    }

    async fn create_wallet(&self, _owner_hint: &str) -> Result<WalletKeys> {
        Ok(WalletKeys::random())
    }

    async fn move_funds(
        &self,
        _source: &WalletCredential,
        destination: &str,
        _amount: Decimal,
        _currency: Currency,
    ) -> Result<Transfer> {
        let n = self.transfers.fetch_add(1, Ordering::SeqCst);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        if n < self.fail_first {
            return Err(Error::MoverUnavailable("network unreachable".to_string()));
        }
        Ok(Transfer {
            transaction_id: format!("tx-{}-{}", n, destination),
            explorer_url: None,
            mode: ExecutionMode::Simulated,
        })
    }
}

fn request(amount: &str, currency: Currency) -> IssueRequest {
    IssueRequest {
        recipient: "alice@example.com".to_string(),
        amount: Decimal::from_str(amount).unwrap(),
        currency,
        metadata: ClaimMetadata {
            sender_name: Some("Bob".to_string()),
            message: Some("Enjoy".to_string()),
        },
    }
}

fn memory_ledger(mover: Arc<dyn FundsMover>, config: Config) -> ClaimLedger {
    ClaimLedger::new(config, Arc::new(DurableStore::memory()), mover).unwrap()
}

#[tokio::test]
async fn test_scenario_create_verify_redeem() {
    let ledger = memory_ledger(Arc::new(SimulatedMover::default()), Config::default());
    let issued = ledger.issue(request("100", Currency::USDC)).await.unwrap();

    let view = ledger.verify(&issued.token).unwrap();
    assert_eq!(view.amount.to_string(), "100");
    assert_eq!(view.currency, Currency::USDC);
    assert_eq!(view.status, ClaimStatus::Pending);

    let result = ledger
        .redeem_to_self(&issued.token, Some("GABCDEFDESTINATION"))
        .await
        .unwrap();
    assert!(!result.transaction_id.is_empty());

    assert!(matches!(ledger.verify(&issued.token), Err(Error::NotFound)));
    assert!(matches!(
        ledger.redeem_to_self(&issued.token, Some("GABCDEFDESTINATION")).await,
        Err(Error::AlreadyRedeemed)
    ));

    let entry = ledger.history().get(&issued.lookup_key).unwrap();
    assert_eq!(entry.status, TransactionStatus::Claimed);
    assert_eq!(entry.claimed_by.as_deref(), Some("GABCDEFDESTINATION"));
    assert_eq!(
        entry.claim_transaction_id.as_deref(),
        Some(result.transaction_id.as_str())
    );
}

#[tokio::test]
async fn test_concurrent_redemptions_succeed_once() {
    let mover = Arc::new(CountingMover::slow(Duration::from_millis(20)));
    let ledger = Arc::new(memory_ledger(mover.clone(), Config::default()));
    let issued = ledger.issue(request("10", Currency::XLM)).await.unwrap();
    let after_issue = mover.transfers();

    let mut handles = Vec::new();
    for _ in 0..16 {
        let ledger = ledger.clone();
        let token = issued.token.clone();
        handles.push(tokio::spawn(async move {
            ledger.redeem_to_self(&token, Some("GDESTINATION")).await
        }));
    }

    let mut successes = 0;
    let mut rejected = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(_) => successes += 1,
            Err(Error::AlreadyRedeemed) | Err(Error::NotFound) => rejected += 1,
            Err(e) => panic!("unexpected error: {}", e),
        }
    }

    assert_eq!(successes, 1);
    assert_eq!(rejected, 15);
    assert_eq!(mover.transfers() - after_issue, 1);
}

#[tokio::test]
async fn test_concurrent_forward_and_redeem() {
    let mover = Arc::new(CountingMover::slow(Duration::from_millis(10)));
    let ledger = Arc::new(memory_ledger(mover.clone(), Config::default()));
    let issued = ledger.issue(request("50", Currency::XLM)).await.unwrap();

    let redeem = {
        let ledger = ledger.clone();
        let token = issued.token.clone();
        tokio::spawn(async move { ledger.redeem_to_self(&token, None).await.is_ok() })
    };
    let forward = {
        let ledger = ledger.clone();
        let token = issued.token.clone();
        tokio::spawn(async move {
            ledger
                .forward(&token, "bob@example.com", ForwardOptions::default())
                .await
                .is_ok()
        })
    };

    let outcomes = [redeem.await.unwrap(), forward.await.unwrap()];
    assert_eq!(outcomes.iter().filter(|ok| **ok).count(), 1);
}

#[tokio::test]
async fn test_different_tokens_do_not_wait_on_each_other() {
    let mover = Arc::new(CountingMover::slow(Duration::from_millis(200)));
    let ledger = Arc::new(memory_ledger(mover, Config::default()));
    let first = ledger.issue(request("1", Currency::XLM)).await.unwrap();
    let second = ledger.issue(request("2", Currency::XLM)).await.unwrap();

    let started = std::time::Instant::now();
    let (a, b) = tokio::join!(
        ledger.redeem_to_self(&first.token, None),
        ledger.redeem_to_self(&second.token, None)
    );
    a.unwrap();
    b.unwrap();

    assert!(started.elapsed() < Duration::from_millis(390));
}

#[tokio::test]
async fn test_expired_claim_is_not_found() {
    let config = Config {
        claim_ttl_secs: 0,
        ..Config::default()
    };
    let ledger = memory_ledger(Arc::new(SimulatedMover::default()), config);
    let issued = ledger.issue(request("5", Currency::USDC)).await.unwrap();
    tokio::time::sleep(Duration::from_millis(5)).await;

    assert!(matches!(ledger.verify(&issued.token), Err(Error::NotFound)));
    assert!(matches!(ledger.verify(&issued.token), Err(Error::NotFound)));
    assert!(matches!(
        ledger.redeem_to_self(&issued.token, None).await,
        Err(Error::NotFound)
    ));
}

#[tokio::test]
async fn test_forward_chain_independence() {
    let ledger = memory_ledger(Arc::new(SimulatedMover::default()), Config::default());
    let issued = ledger.issue(request("50", Currency::XLM)).await.unwrap();
    let before = chrono::Utc::now();

    let forwarded = ledger
        .forward(&issued.token, "new@example.com", ForwardOptions::default())
        .await
        .unwrap();

    assert!(matches!(ledger.verify(&issued.token), Err(Error::NotFound)));
    assert!(matches!(
        ledger
            .forward(&issued.token, "other@example.com", ForwardOptions::default())
            .await,
        Err(Error::AlreadyRedeemed)
    ));

    let successor = ledger.verify(&forwarded.token).unwrap();
    assert_eq!(successor.amount.to_string(), "50");
    assert_eq!(successor.currency, Currency::XLM);
    assert_ne!(successor.lookup_key, issued.lookup_key);
    assert!(successor.expires_at >= before + ledger.config().claim_ttl());

    // Successor is a full claim of its own
    let redeemed = ledger.redeem_to_self(&forwarded.token, None).await.unwrap();
    assert_eq!(redeemed.amount, Decimal::from(50));

    let original_entry = ledger.history().get(&issued.lookup_key).unwrap();
    assert_eq!(original_entry.status, TransactionStatus::Claimed);
    assert_eq!(
        original_entry.claimed_by.as_deref(),
        Some("forward:new@example.com")
    );
    let successor_entry = ledger.history().get(&forwarded.lookup_key).unwrap();
    assert_eq!(successor_entry.status, TransactionStatus::Claimed);
}

#[tokio::test]
async fn test_issue_failure_recorded_in_history() {
    let mover = Arc::new(CountingMover::failing(1));
    let ledger = memory_ledger(mover, Config::default());

    let failed = ledger.issue(request("20", Currency::PYUSD)).await;
    assert!(matches!(failed, Err(Error::MoverUnavailable(_))));
    assert!(ledger.is_empty());

    let entries = ledger.history().list();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].status, TransactionStatus::Failed);
    assert!(entries[0].failure_reason.is_some());
    assert!(!entries[0].wallet_address.is_empty());

    // Next send goes through
    let issued = ledger.issue(request("20", Currency::PYUSD)).await.unwrap();
    assert_eq!(
        ledger.verify(&issued.token).unwrap().status,
        ClaimStatus::Pending
    );
    assert_eq!(ledger.history().list().len(), 2);
}

#[tokio::test]
async fn test_redeem_retry_after_mover_failure() {
    // Transfer 0 funds the claim, transfer 1 (first redeem) fails
    let mover = Arc::new(FlakyRedeemMover::default());
    let ledger = memory_ledger(mover.clone(), Config::default());
    let issued = ledger.issue(request("20", Currency::USDC)).await.unwrap();

    let first = ledger.redeem_to_self(&issued.token, Some("GDEST")).await;
    assert!(matches!(first, Err(Error::MoverUnavailable(_))));

    let view = ledger.verify(&issued.token).unwrap();
    assert_eq!(view.status, ClaimStatus::Pending);
    assert!(view.claimed_by.is_none());

    let retried = ledger.redeem_to_self(&issued.token, Some("GDEST")).await.unwrap();
    assert_eq!(retried.claimed_by, "GDEST");
    assert_eq!(ledger.metrics().mover_failures.get(), 1);
}

#[tokio::test]
async fn test_forward_failure_leaves_original_pending() {
    let mover = Arc::new(FlakyRedeemMover::default());
    let ledger = memory_ledger(mover, Config::default());
    let issued = ledger.issue(request("20", Currency::USDC)).await.unwrap();

    let forwarded = ledger
        .forward(&issued.token, "new@example.com", ForwardOptions::default())
        .await;
    assert!(matches!(forwarded, Err(Error::MoverUnavailable(_))));

    assert_eq!(ledger.len(), 1);
    assert_eq!(
        ledger.verify(&issued.token).unwrap().status,
        ClaimStatus::Pending
    );
}

#[tokio::test]
async fn test_mover_timeout_is_retryable() {
    let mut config = Config::default();
    config.mover.timeout_ms = 50;
    let slow = Arc::new(CountingMover::slow(Duration::from_millis(500)));
    let ledger = memory_ledger(slow, config);

    let issued = ledger.issue(request("1", Currency::XLM)).await;
    let err = issued.unwrap_err();
    assert!(matches!(err, Error::MoverUnavailable(_)));
    assert!(err.is_retryable());
    assert!(ledger.is_empty());
}

#[tokio::test]
async fn test_claims_survive_restart() {
    let dir = tempfile::tempdir().unwrap();
    let token: SecretToken;
    {
        let store = Arc::new(DurableStore::directory(dir.path()).unwrap());
        let ledger =
            ClaimLedger::new(Config::default(), store, Arc::new(SimulatedMover::default())).unwrap();
        token = ledger.issue(request("42", Currency::USDC)).await.unwrap().token;
    }

    let store = Arc::new(DurableStore::directory(dir.path()).unwrap());
    let ledger =
        ClaimLedger::new(Config::default(), store, Arc::new(SimulatedMover::default())).unwrap();

    let view = ledger.verify(&token).unwrap();
    assert_eq!(view.amount, Decimal::from(42));
    assert_eq!(ledger.history().list().len(), 1);

    ledger.redeem_to_self(&token, None).await.unwrap();
    assert!(matches!(
        ledger.redeem_to_self(&token, None).await,
        Err(Error::AlreadyRedeemed)
    ));
}

#[tokio::test]
async fn test_store_contents_hold_no_usable_token() {
    let dir = tempfile::tempdir().unwrap();
    let store = Arc::new(DurableStore::directory(dir.path()).unwrap());
    let ledger =
        ClaimLedger::new(Config::default(), store, Arc::new(SimulatedMover::default())).unwrap();

    let issued = ledger.issue(request("7", Currency::USDC)).await.unwrap();
    let forwarded = ledger
        .forward(&issued.token, "new@example.com", ForwardOptions::default())
        .await
        .unwrap();

    let mut dump = String::new();
    for entry in std::fs::read_dir(dir.path()).unwrap() {
        dump.push_str(&std::fs::read_to_string(entry.unwrap().path()).unwrap());
    }

    assert!(dump.contains(issued.lookup_key.as_str()));
    assert!(!dump.contains(issued.token.expose()));
    assert!(!dump.contains(forwarded.token.expose()));

    // The stored key itself does not work as a token
    let key_as_token = SecretToken::parse(issued.lookup_key.as_str()).unwrap();
    assert!(matches!(ledger.verify(&key_as_token), Err(Error::NotFound)));
    let successor_key = SecretToken::parse(forwarded.lookup_key.as_str()).unwrap();
    assert!(matches!(ledger.verify(&successor_key), Err(Error::NotFound)));
}

#[tokio::test]
async fn test_memory_backend_is_not_durable() {
    let ledger = memory_ledger(Arc::new(SimulatedMover::default()), Config::default());
    let issued = ledger.issue(request("3", Currency::XLM)).await.unwrap();
    assert!(ledger.verify(&issued.token).is_ok());

    let fresh = memory_ledger(Arc::new(SimulatedMover::default()), Config::default());
    assert!(matches!(fresh.verify(&issued.token), Err(Error::NotFound)));
}

/// Funds every claim, fails the first transfer out of a claim wallet
#[derive(Debug, Default)]
struct FlakyRedeemMover {
    transfers: AtomicUsize,
}

#[async_trait]
impl FundsMover for FlakyRedeemMover {
    fn mode(&self) -> ExecutionMode {
        ExecutionMode::Simulated
    }

    async fn create_wallet(&self, _owner_hint: &str) -> Result<WalletKeys> {
        Ok(WalletKeys::random())
    }

    async fn move_funds(
        &self,
        _source: &WalletCredential,
        _destination: &str,
        _amount: Decimal,
        _currency: Currency,
    ) -> Result<Transfer> {
        if self.transfers.fetch_add(1, Ordering::SeqCst) == 1 {
            return Err(Error::MoverUnavailable("relay returned 503".to_string()));
        }
        Ok(Transfer {
            transaction_id: SecretToken::generate().expose().to_string(),
            explorer_url: None,
            mode: ExecutionMode::Simulated,
        })
    }
}
