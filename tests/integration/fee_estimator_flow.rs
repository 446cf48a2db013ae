//! Debounced fee estimation against a scripted node.

use std::{sync::Arc, time::Duration};

use tokio::time::sleep;
use xcore_wallet::{
    domain::{
        amount::COIN,
        delegation::{FeeTier, ValidationError},
        fee_estimator::FeeEstimator,
    },
    infra::node_api::{ApiError, MaxBalance, NodeApi},
};

use super::{
    DEBOUNCE, HOT_ADDRESS, WALLET, estimator_settings, form,
    stub_node::{Call, StubNode},
};

/// Estimator with ten spendable coins and a 0.0001 coin starting fee.
fn funded_estimator(node: &Arc<StubNode>) -> FeeEstimator {
    let estimator = FeeEstimator::new(node.clone(), estimator_settings());
    estimator.apply_balance(MaxBalance {
        max_spendable_amount: 10 * COIN,
        fee: 10_000,
    });
    estimator
}

/// Let the quiescence window elapse and any instant replies land.
async fn settle() {
    sleep(DEBOUNCE + Duration::from_millis(100)).await;
}

#[tokio::test(start_paused = true)]
async fn test_burst_of_edits_issues_one_estimate() {
    let node = StubNode::new();
    node.fee.reply(Ok(25_000));
    let mut estimator = funded_estimator(&node);

    estimator.on_form_changed(form(HOT_ADDRESS, "1"));
    sleep(Duration::from_millis(100)).await;
    estimator.on_form_changed(form(HOT_ADDRESS, "1.5"));
    sleep(Duration::from_millis(100)).await;
    estimator.on_form_changed(form(HOT_ADDRESS, "2"));
    assert!(node.estimate_calls().is_empty());

    settle().await;

    let calls = node.estimate_calls();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].recipients[0].destination_address, HOT_ADDRESS);
    assert_eq!(calls[0].recipients[0].amount, "2");
    assert_eq!(calls[0].wallet_name, WALLET);
    assert_eq!(calls[0].fee_type, FeeTier::Medium);
    assert!(calls[0].is_cold_staking);
    assert!(calls[0].allow_unconfirmed);

    assert_eq!(estimator.snapshot().fee, 25_000);
    assert_eq!(estimator.max_amount(), 10 * COIN - 25_000);
    assert_eq!(estimator.last_error(), None);
}

#[tokio::test(start_paused = true)]
async fn test_quiet_form_issues_nothing() {
    let node = StubNode::new();
    let _estimator = funded_estimator(&node);

    sleep(Duration::from_secs(5)).await;
    assert!(node.calls().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_late_reply_to_older_estimate_is_dropped() {
    let node = StubNode::new();
    node.fee.reply_after(Duration::from_secs(2), Ok(50_000));
    node.fee.reply_after(Duration::from_millis(100), Ok(20_000));
    let mut estimator = funded_estimator(&node);

    // #1 goes out at 300ms and answers at 2.3s
    estimator.on_form_changed(form(HOT_ADDRESS, "1"));
    settle().await;
    // #2 goes out at 700ms and answers at 800ms, checked at 850ms
    estimator.on_form_changed(form(HOT_ADDRESS, "2"));
    settle().await;
    sleep(Duration::from_millis(50)).await;

    assert_eq!(estimator.issued(), 2);
    assert_eq!(estimator.snapshot().fee, 20_000);

    sleep(Duration::from_secs(3)).await;
    assert_eq!(node.estimate_calls().len(), 2);
    assert_eq!(estimator.snapshot().fee, 20_000);
}

#[tokio::test(start_paused = true)]
async fn test_in_flight_estimate_survives_later_edits() {
    let node = StubNode::new();
    node.fee.reply_after(Duration::from_secs(1), Ok(40_000));
    let mut estimator = funded_estimator(&node);

    estimator.on_form_changed(form(HOT_ADDRESS, "1"));
    settle().await;
    assert_eq!(node.estimate_calls().len(), 1);

    // Edit that fails the preconditions: restarts the timer, issues nothing
    estimator.on_form_changed(form("short", "1"));
    sleep(Duration::from_secs(2)).await;

    assert_eq!(node.estimate_calls().len(), 1);
    assert_eq!(estimator.snapshot().fee, 40_000);
}

#[tokio::test(start_paused = true)]
async fn test_invalid_form_never_reaches_node() {
    let node = StubNode::new();
    let mut estimator = funded_estimator(&node);
    let before = estimator.snapshot();

    for (address, amount) in [
        ("", "1"),
        ("tooShortAddress", "1"),
        (HOT_ADDRESS, ""),
        (HOT_ADDRESS, "0"),
        (HOT_ADDRESS, "0.000001"),
        (HOT_ADDRESS, "1.123456789"),
        (HOT_ADDRESS, "-1"),
        (HOT_ADDRESS, "abc"),
        (HOT_ADDRESS, "10"),
    ] {
        estimator.on_form_changed(form(address, amount));
        settle().await;
    }

    assert!(node.calls().is_empty());
    assert_eq!(estimator.snapshot(), before);
    assert_eq!(estimator.issued(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_failed_estimate_keeps_last_fee() {
    let node = StubNode::new();
    node.fee.reply(Err(ApiError::node("Insufficient funds")));
    node.fee.reply(Ok(30_000));
    let mut estimator = funded_estimator(&node);
    let mut errors = estimator.errors();

    estimator.on_form_changed(form(HOT_ADDRESS, "9.9999"));
    settle().await;

    assert!(errors.has_changed().unwrap());
    assert_eq!(
        errors.borrow_and_update().as_deref(),
        Some("Insufficient funds")
    );
    assert_eq!(estimator.snapshot().fee, 10_000);

    estimator.on_form_changed(form(HOT_ADDRESS, "5"));
    settle().await;

    assert_eq!(estimator.last_error(), None);
    assert_eq!(estimator.snapshot().fee, 30_000);
}

#[tokio::test(start_paused = true)]
async fn test_estimate_timeout_is_reported() {
    let node = StubNode::new();
    node.fee.reply_after(Duration::from_secs(120), Ok(99_000));
    let mut estimator = funded_estimator(&node);

    estimator.on_form_changed(form(HOT_ADDRESS, "1"));
    sleep(Duration::from_secs(61)).await;

    assert_eq!(estimator.last_error().as_deref(), Some("request timed out"));
    assert_eq!(estimator.snapshot().fee, 10_000);
    assert!(estimator.is_settled());
}

#[tokio::test(start_paused = true)]
async fn test_balance_moves_the_amount_bound() {
    let node = StubNode::new();
    node.balance.reply(Ok(MaxBalance {
        max_spendable_amount: COIN,
        fee: 10_000,
    }));
    let mut estimator = FeeEstimator::new(node.clone(), estimator_settings());

    let balance = node.max_balance(WALLET, "account 0", FeeTier::Medium).await.unwrap();
    estimator.apply_balance(balance);
    assert_eq!(estimator.max_amount(), COIN - 10_000);

    estimator.on_form_changed(form(HOT_ADDRESS, "1.5"));
    settle().await;
    assert!(node.estimate_calls().is_empty());

    let balance = node.max_balance(WALLET, "account 0", FeeTier::Medium).await.unwrap();
    estimator.apply_balance(balance);
    assert_eq!(estimator.max_amount(), 10 * COIN - 10_000);

    estimator.on_form_changed(form(HOT_ADDRESS, "1.5"));
    settle().await;
    assert_eq!(node.estimate_calls().len(), 1);
    assert!(matches!(node.calls()[0], Call::MaxBalance { .. }));
}

#[tokio::test(start_paused = true)]
async fn test_balance_does_not_override_estimated_fee() {
    let node = StubNode::new();
    node.fee.reply(Ok(25_000));
    let mut estimator = funded_estimator(&node);

    estimator.on_form_changed(form(HOT_ADDRESS, "1"));
    settle().await;

    estimator.apply_balance(MaxBalance {
        max_spendable_amount: 20 * COIN,
        fee: 1_000,
    });
    let estimate = estimator.snapshot();
    assert_eq!(estimate.fee, 25_000);
    assert_eq!(estimate.max_spendable_amount, 20 * COIN);
}

#[tokio::test(start_paused = true)]
async fn test_settled_snapshot_waits_for_refresh() {
    let node = StubNode::new();
    node.fee.reply_after(Duration::from_secs(1), Ok(15_000));
    let mut estimator = funded_estimator(&node);
    let mut updates = estimator.subscribe();
    updates.borrow_and_update();

    estimator.on_form_changed(form(HOT_ADDRESS, "1"));
    assert_eq!(
        estimator.settled_snapshot(),
        Err(ValidationError::EstimatePending)
    );

    // Timer fired, request still in flight
    settle().await;
    assert!(!estimator.is_settled());
    assert_eq!(
        estimator.settled_snapshot(),
        Err(ValidationError::EstimatePending)
    );

    updates.changed().await.unwrap();
    sleep(Duration::from_millis(10)).await;
    let estimate = estimator.settled_snapshot().unwrap();
    assert_eq!(estimate.fee, 15_000);
    assert_eq!(*updates.borrow(), estimate);
}
