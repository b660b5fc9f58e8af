//! Property-based tests for ledger invariants
//!
//! These tests use proptest to verify critical invariants:
//! - Lookup keys: deterministic, one-way, collision free in practice
//! - Amounts: any positive amount within precision survives issue/verify
//! - Single use: sequential redemptions succeed exactly once
//! - Rate limiting: a budget of N admits exactly N requests per window

use claim_ledger::{
    service::validate_amount, ClaimLedger, ClaimMetadata, Config, Currency, DurableStore, Error,
    IssueRequest, LookupKey, RateLimiter, SecretToken, SimulatedMover,
};
use proptest::prelude::*;
use rust_decimal::Decimal;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

/// Strategy for generating supported currencies
fn currency_strategy() -> impl Strategy<Value = Currency> {
    prop_oneof![Just(Currency::USDC), Just(Currency::PYUSD), Just(Currency::XLM),]
}

/// Strategy for generating valid amounts (positive, two decimal places)
fn amount_strategy() -> impl Strategy<Value = Decimal> {
    (1i64..1_000_000_00i64).prop_map(|cents| Decimal::new(cents, 2))
}

/// Create test ledger backed by a temp directory
fn create_test_ledger(dir: &tempfile::TempDir) -> ClaimLedger {
    let store = Arc::new(DurableStore::directory(dir.path()).unwrap());
    ClaimLedger::new(
        Config::default(),
        store,
        Arc::new(SimulatedMover::default()),
    )
    .unwrap()
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    /// Property: lookup key is a pure function of the token
    #[test]
    fn prop_lookup_key_deterministic(raw in "[A-Za-z0-9_-]{1,128}") {
        let token = SecretToken::parse(&raw).unwrap();
        let key1 = LookupKey::derive(&token);
        let key2 = LookupKey::derive(&SecretToken::parse(&raw).unwrap());

        prop_assert_eq!(&key1, &key2);
        prop_assert_eq!(key1.as_str().len(), 64);
        prop_assert!(key1.as_str().chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
    }

    /// Property: distinct tokens give distinct keys
    #[test]
    fn prop_distinct_tokens_distinct_keys(a in "[a-f0-9]{64}", b in "[a-f0-9]{64}") {
        prop_assume!(a != b);
        let ka = LookupKey::derive(&SecretToken::parse(&a).unwrap());
        let kb = LookupKey::derive(&SecretToken::parse(&b).unwrap());
        prop_assert_ne!(ka, kb);
    }

    /// Property: amounts within precision are accepted unchanged
    #[test]
    fn prop_valid_amounts_accepted(amount in amount_strategy(), currency in currency_strategy()) {
        let parsed = validate_amount(&amount.to_string(), currency).unwrap();
        prop_assert_eq!(parsed, amount);
    }

    /// Property: one decimal place beyond precision is rejected
    #[test]
    fn prop_excess_precision_rejected(units in 1i64..1_000_000i64, currency in currency_strategy()) {
        let scale = currency.precision() + 1;
        let amount = Decimal::new(units * 10 + 1, scale);
        prop_assert!(matches!(
            validate_amount(&amount.to_string(), currency),
            Err(Error::Validation(_))
        ));
    }

    /// Property: issued claims verify with the same amount and currency
    #[test]
    fn prop_issue_then_verify(amount in amount_strategy(), currency in currency_strategy()) {
        let rt = tokio::runtime::Runtime::new().unwrap();
        rt.block_on(async {
            let dir = tempfile::tempdir().unwrap();
            let ledger = create_test_ledger(&dir);

            let issued = ledger.issue(IssueRequest {
                recipient: "alice@example.com".to_string(),
                amount,
                currency,
                metadata: ClaimMetadata::default(),
            }).await.unwrap();

            let view = ledger.verify(&issued.token).unwrap();
            prop_assert_eq!(view.amount, amount);
            prop_assert_eq!(view.currency, currency);
            prop_assert!(view.expires_at > view.created_at);
            Ok(())
        })?;
    }

    /// Property: sequential redemptions succeed exactly once
    #[test]
    fn prop_single_use(attempts in 2usize..8) {
        let rt = tokio::runtime::Runtime::new().unwrap();
        rt.block_on(async {
            let dir = tempfile::tempdir().unwrap();
            let ledger = create_test_ledger(&dir);

            let issued = ledger.issue(IssueRequest {
                recipient: "alice@example.com".to_string(),
                amount: Decimal::new(100, 0),
                currency: Currency::USDC,
                metadata: ClaimMetadata::default(),
            }).await.unwrap();

            let mut successes = 0;
            for _ in 0..attempts {
                match ledger.redeem_to_self(&issued.token, None).await {
                    Ok(_) => successes += 1,
                    Err(Error::AlreadyRedeemed) => {}
                    Err(e) => prop_assert!(false, "unexpected error: {}", e),
                }
            }

            prop_assert_eq!(successes, 1);
            Ok(())
        })?;
    }

    /// Property: a budget of N admits exactly N requests in one window
    #[test]
    fn prop_rate_limit_budget(limit in 1u32..50, extra in 1u32..10) {
        let limiter = RateLimiter::new();
        let window = Duration::from_secs(60);

        let allowed = (0..limit + extra)
            .filter(|_| limiter.check("client", limit, window).allowed)
            .count();

        prop_assert_eq!(allowed, limit as usize);
        prop_assert!(limiter.check("other-client", limit, window).allowed);
    }
}

#[cfg(test)]
mod integration_tests {
    use super::*;

    #[test]
    fn test_generated_tokens_unique() {
        let keys: HashSet<LookupKey> = (0..1_000)
            .map(|_| LookupKey::derive(&SecretToken::generate()))
            .collect();
        assert_eq!(keys.len(), 1_000);
    }
}
