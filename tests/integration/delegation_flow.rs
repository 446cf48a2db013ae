//! End-to-end delegation runs against a scripted node.

use std::time::Duration;

use tokio::time::sleep;
use xcore_wallet::{
    domain::{
        delegation::{DelegationRequest, ValidationError},
        pipeline::{DelegationError, DelegationPipeline, PipelineState, Stage},
    },
    infra::node_api::{ApiError, SentTransaction, ValidatedAddress},
};

use super::{
    ACCOUNT, HOT_ADDRESS, WALLET, form, funded_estimate, pipeline_settings,
    stub_node::{COLD_ADDRESS, Call, StubNode, TRANSACTION_HEX, TRANSACTION_ID},
};

fn request(amount: &str) -> DelegationRequest {
    DelegationRequest::from_form(&form(HOT_ADDRESS, amount), &funded_estimate()).unwrap()
}

fn witness_address() -> ValidatedAddress {
    ValidatedAddress {
        is_valid: true,
        address: Some(HOT_ADDRESS.to_string()),
        is_witness: true,
    }
}

#[tokio::test(start_paused = true)]
async fn test_delegation_runs_every_stage_in_order() {
    let node = StubNode::new();
    node.validate.reply(Ok(witness_address()));
    let pipeline = DelegationPipeline::new(node.clone(), pipeline_settings());

    let state = pipeline.submit(request("1.5"), 10_000).await.unwrap();

    assert_eq!(
        state,
        PipelineState {
            stage: Stage::Succeeded,
            is_sending: false,
            error_message: None,
            transaction_id: Some(TRANSACTION_ID.to_string()),
        }
    );
    assert_eq!(pipeline.current(), state);
    assert!(!pipeline.is_sending());

    assert_eq!(
        node.calls(),
        vec![
            Call::ValidateAddress(HOT_ADDRESS.to_string()),
            Call::CreateColdStakingAccount {
                wallet: WALLET.to_string(),
                is_cold_wallet: true,
            },
            Call::GetColdStakingAddress {
                wallet: WALLET.to_string(),
                is_cold_wallet: true,
                is_witness: true,
            },
            Call::CreateColdStaking {
                hot_wallet_address: HOT_ADDRESS.to_string(),
                cold_wallet_address: COLD_ADDRESS.to_string(),
                amount: "1.5".to_string(),
                fees: "0.0001".to_string(),
                wallet_account: ACCOUNT.to_string(),
            },
            Call::SendTransaction(TRANSACTION_HEX.to_string()),
        ]
    );
}

#[tokio::test(start_paused = true)]
async fn test_legacy_address_derives_legacy_cold_address() {
    let node = StubNode::new();
    let pipeline = DelegationPipeline::new(node.clone(), pipeline_settings());

    pipeline.submit(request("2"), 10_000).await.unwrap();

    assert!(node.calls().contains(&Call::GetColdStakingAddress {
        wallet: WALLET.to_string(),
        is_cold_wallet: true,
        is_witness: false,
    }));
}

#[tokio::test(start_paused = true)]
async fn test_invalid_address_stops_at_first_stage() {
    let node = StubNode::new();
    node.validate.reply(Ok(ValidatedAddress {
        is_valid: false,
        address: None,
        is_witness: false,
    }));
    let pipeline = DelegationPipeline::new(node.clone(), pipeline_settings());

    let state = pipeline.submit(request("1.5"), 10_000).await.unwrap();

    assert_eq!(state.stage, Stage::Failed);
    assert!(!state.is_sending);
    assert_eq!(
        state.error_message.as_deref(),
        Some("Invalid hot wallet address.")
    );
    assert_eq!(
        node.calls(),
        vec![Call::ValidateAddress(HOT_ADDRESS.to_string())]
    );
}

#[tokio::test(start_paused = true)]
async fn test_build_failure_stops_before_broadcast() {
    let node = StubNode::new();
    node.build.reply(Err(ApiError::node("insufficient funds")));
    let pipeline = DelegationPipeline::new(node.clone(), pipeline_settings());

    let state = pipeline.submit(request("1.5"), 10_000).await.unwrap();

    assert_eq!(state.stage, Stage::Failed);
    assert!(!state.is_sending);
    assert_eq!(state.error_message.as_deref(), Some("insufficient funds"));
    assert_eq!(state.transaction_id, None);
    assert_eq!(node.sent_transactions(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_address_failure_skips_build_and_broadcast() {
    let node = StubNode::new();
    node.cold_address
        .reply(Err(ApiError::node("Cold staking account not found")));
    let pipeline = DelegationPipeline::new(node.clone(), pipeline_settings());

    let state = pipeline.submit(request("1.5"), 10_000).await.unwrap();

    assert_eq!(state.stage, Stage::Failed);
    assert_eq!(
        state.error_message.as_deref(),
        Some("Cold staking account not found")
    );
    assert!(
        !node
            .calls()
            .iter()
            .any(|call| matches!(call, Call::CreateColdStaking { .. } | Call::SendTransaction(_)))
    );
}

#[tokio::test(start_paused = true)]
async fn test_second_submission_rejected_while_sending() {
    let node = StubNode::new();
    node.broadcast.reply_after(
        Duration::from_secs(5),
        Ok(SentTransaction {
            transaction_id: TRANSACTION_ID.to_string(),
        }),
    );
    let pipeline = DelegationPipeline::new(node.clone(), pipeline_settings());

    let run = pipeline.begin(request("1.5"), 10_000).unwrap();
    let handle = tokio::spawn(run.run());
    sleep(Duration::from_secs(1)).await;

    let in_flight = pipeline.current();
    assert_eq!(in_flight.stage, Stage::Broadcasting);
    assert!(in_flight.is_sending);

    let second = pipeline.begin(request("3"), 10_000);
    assert!(matches!(second, Err(DelegationError::SubmissionInProgress)));
    assert_eq!(pipeline.current(), in_flight);

    let state = handle.await.unwrap();
    assert_eq!(state.stage, Stage::Succeeded);
    assert_eq!(node.sent_transactions(), 1);

    // Free again once the first run is over
    assert!(pipeline.begin(request("3"), 10_000).is_ok());
}

#[tokio::test(start_paused = true)]
async fn test_stalled_stage_times_out() {
    let node = StubNode::new();
    node.broadcast.reply_after(
        Duration::from_secs(120),
        Ok(SentTransaction {
            transaction_id: TRANSACTION_ID.to_string(),
        }),
    );
    let pipeline = DelegationPipeline::new(node.clone(), pipeline_settings());

    let state = pipeline.submit(request("1.5"), 10_000).await.unwrap();

    assert_eq!(state.stage, Stage::Failed);
    assert!(!state.is_sending);
    assert_eq!(
        state.error_message.as_deref(),
        Some("Broadcasting transaction timed out after 60s.")
    );
}

#[tokio::test(start_paused = true)]
async fn test_abandoned_run_releases_pipeline() {
    let node = StubNode::new();
    let pipeline = DelegationPipeline::new(node.clone(), pipeline_settings());

    let run = pipeline.begin(request("1.5"), 10_000).unwrap();
    assert!(pipeline.is_sending());
    drop(run);

    let state = pipeline.current();
    assert_eq!(state.stage, Stage::Failed);
    assert_eq!(
        state.error_message.as_deref(),
        Some("Delegation was interrupted.")
    );
    assert!(!pipeline.is_sending());
    assert!(node.calls().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_state_updates_reach_subscribers() {
    let node = StubNode::new();
    let pipeline = DelegationPipeline::new(node.clone(), pipeline_settings());
    let mut updates = pipeline.state();
    assert_eq!(updates.borrow_and_update().stage, Stage::Idle);

    pipeline.submit(request("1.5"), 10_000).await.unwrap();

    assert!(updates.has_changed().unwrap());
    assert_eq!(updates.borrow_and_update().stage, Stage::Succeeded);
}

#[test]
fn test_request_rejects_amount_above_snapshot_bound() {
    let fields = form(HOT_ADDRESS, "10");
    let err = DelegationRequest::from_form(&fields, &funded_estimate()).unwrap_err();
    assert_eq!(err, ValidationError::AmountExceedsBalance);

    let mut fields = form(HOT_ADDRESS, "1");
    fields.password.clear();
    let err = DelegationRequest::from_form(&fields, &funded_estimate()).unwrap_err();
    assert_eq!(err, ValidationError::PasswordRequired);
}
