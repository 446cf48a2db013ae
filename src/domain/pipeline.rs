//! Cold staking delegation pipeline.
//!
//! A delegation is five dependent node calls run strictly in order:
//!
//! 1. validate the hot wallet address (learns whether it is a witness address)
//! 2. make sure the cold staking account exists
//! 3. derive a cold staking address in the matching format
//! 4. build the delegation transaction with the caller's fee snapshot
//! 5. broadcast it
//!
//! The first failing call ends the run as [`Stage::Failed`] with the node's
//! message. Only one run may be in flight per pipeline.

use std::{
    future::Future,
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
    time::Duration,
};

use strum::Display;
use thiserror::Error;
use tokio::sync::watch;
use tracing::{info, warn};

use super::{
    amount::format_coins,
    delegation::{DelegationRequest, ValidationError},
};
use crate::{
    config::Config,
    infra::node_api::{ApiError, ColdStakingSetup, NodeApi},
};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Display)]
#[strum(serialize_all = "snake_case")]
pub enum Stage {
    #[default]
    Idle,
    ValidatingAddress,
    ProvisioningColdAccount,
    DerivingColdAddress,
    BuildingTransaction,
    Broadcasting,
    Succeeded,
    Failed,
}

impl Stage {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Stage::Succeeded | Stage::Failed)
    }

    /// Human readable progress text.
    pub fn label(&self) -> &'static str {
        match self {
            Stage::Idle => "Ready",
            Stage::ValidatingAddress => "Validating hot wallet address",
            Stage::ProvisioningColdAccount => "Preparing cold staking account",
            Stage::DerivingColdAddress => "Deriving cold staking address",
            Stage::BuildingTransaction => "Building delegation transaction",
            Stage::Broadcasting => "Broadcasting transaction",
            Stage::Succeeded => "Delegation sent",
            Stage::Failed => "Delegation failed",
        }
    }
}

/// Progress of one delegation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PipelineState {
    pub stage: Stage,
    pub is_sending: bool,
    pub error_message: Option<String>,
    pub transaction_id: Option<String>,
}

impl PipelineState {
    fn submitted() -> Self {
        Self {
            stage: Stage::ValidatingAddress,
            is_sending: true,
            error_message: None,
            transaction_id: None,
        }
    }

    fn succeed(&mut self, transaction_id: String) {
        self.stage = Stage::Succeeded;
        self.is_sending = false;
        self.transaction_id = Some(transaction_id);
    }

    fn fail(&mut self, message: String) {
        self.stage = Stage::Failed;
        self.is_sending = false;
        self.error_message = Some(message);
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DelegationError {
    /// The form was rejected locally
    #[error(transparent)]
    Validation(#[from] ValidationError),
    /// Another delegation from this pipeline has not finished yet
    #[error("A delegation is already being sent.")]
    SubmissionInProgress,
    /// A node call failed; `message` is the node's own diagnostic
    #[error("{message}")]
    Stage { stage: Stage, message: String },
    /// A node call did not answer in time
    #[error("{} timed out after {}s.", .stage.label(), .after.as_secs())]
    Timeout { stage: Stage, after: Duration },
}

#[derive(Debug, Clone)]
pub struct PipelineSettings {
    pub wallet: String,
    pub account: String,
    pub timeout: Duration,
}

impl PipelineSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            wallet: config.wallet.name.clone(),
            account: config.wallet.account.clone(),
            timeout: config.fees.request_timeout(),
        }
    }
}

/// Runs delegations against a node, one at a time.
#[derive(Debug)]
pub struct DelegationPipeline {
    api: Arc<dyn NodeApi>,
    settings: PipelineSettings,
    sending: Arc<AtomicBool>,
    state: Arc<watch::Sender<PipelineState>>,
}

impl DelegationPipeline {
    pub fn new(api: Arc<dyn NodeApi>, settings: PipelineSettings) -> Self {
        let (state, _) = watch::channel(PipelineState::default());
        Self {
            api,
            settings,
            sending: Arc::new(AtomicBool::new(false)),
            state: Arc::new(state),
        }
    }

    /// Admit a delegation. Rejected without touching the live state while
    /// another run is still sending.
    ///
    /// `fee` is the estimate, in satoshis, the transaction will be built
    /// with; it is not refreshed during the run.
    pub fn begin(
        &self,
        request: DelegationRequest,
        fee: u64,
    ) -> Result<PipelineRun, DelegationError> {
        if self
            .sending
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            warn!("Rejected delegation: another one is in progress");
            return Err(DelegationError::SubmissionInProgress);
        }

        self.state.send_replace(PipelineState::submitted());
        info!(
            "Delegating {} sat to {} (fee {} sat, {} tier)",
            request.amount(),
            request.hot_wallet_address(),
            fee,
            request.fee_tier()
        );

        Ok(PipelineRun {
            api: self.api.clone(),
            settings: self.settings.clone(),
            request,
            fee,
            state: self.state.clone(),
            guard: SendingGuard {
                sending: self.sending.clone(),
                state: self.state.clone(),
            },
        })
    }

    /// Admit and run a delegation to completion.
    pub async fn submit(
        &self,
        request: DelegationRequest,
        fee: u64,
    ) -> Result<PipelineState, DelegationError> {
        let run = self.begin(request, fee)?;
        Ok(run.run().await)
    }

    pub fn is_sending(&self) -> bool {
        self.sending.load(Ordering::SeqCst)
    }

    /// Current state of the latest delegation.
    pub fn current(&self) -> PipelineState {
        self.state.borrow().clone()
    }

    /// Change notifications for the latest delegation.
    pub fn state(&self) -> watch::Receiver<PipelineState> {
        self.state.subscribe()
    }
}

/// Clears the in-progress flag however a run ends, including when its
/// future is dropped half way.
#[derive(Debug)]
struct SendingGuard {
    sending: Arc<AtomicBool>,
    state: Arc<watch::Sender<PipelineState>>,
}

impl Drop for SendingGuard {
    fn drop(&mut self) {
        self.state.send_if_modified(|state| {
            if state.stage.is_terminal() {
                return false;
            }
            state.fail("Delegation was interrupted.".to_string());
            true
        });
        self.sending.store(false, Ordering::SeqCst);
    }
}

/// An admitted delegation, ready to run. Owns everything it needs so it can
/// be moved onto a task.
#[derive(Debug)]
pub struct PipelineRun {
    api: Arc<dyn NodeApi>,
    settings: PipelineSettings,
    request: DelegationRequest,
    fee: u64,
    state: Arc<watch::Sender<PipelineState>>,
    guard: SendingGuard,
}

impl PipelineRun {
    /// Drive every stage in order and return the terminal state.
    pub async fn run(self) -> PipelineState {
        let outcome = self.drive().await;

        self.state.send_modify(|state| match outcome {
            Ok(transaction_id) => {
                info!("Delegation broadcast: {}", transaction_id);
                state.succeed(transaction_id);
            }
            Err(e) => {
                warn!("Delegation failed: {}", e);
                state.fail(e.to_string());
            }
        });
        let final_state = self.state.borrow().clone();
        drop(self.guard);
        final_state
    }

    async fn drive(&self) -> Result<String, DelegationError> {
        let wallet = self.settings.wallet.as_str();
        let request = &self.request;

        let address = self
            .step(
                Stage::ValidatingAddress,
                self.api.validate_address(request.hot_wallet_address()),
            )
            .await?;
        if !address.is_valid {
            return Err(DelegationError::Stage {
                stage: Stage::ValidatingAddress,
                message: "Invalid hot wallet address.".to_string(),
            });
        }

        self.step(
            Stage::ProvisioningColdAccount,
            self.api
                .create_cold_staking_account(wallet, request.wallet_password(), true),
        )
        .await?;

        let cold = self
            .step(
                Stage::DerivingColdAddress,
                self.api
                    .get_cold_staking_address(wallet, true, address.is_witness),
            )
            .await?;

        let setup = ColdStakingSetup {
            hot_wallet_address: request.hot_wallet_address(),
            cold_wallet_address: &cold.address,
            amount: format_coins(request.amount()),
            wallet_name: wallet,
            wallet_password: request.wallet_password(),
            wallet_account: &self.settings.account,
            fees: format_coins(self.fee),
        };
        let built = self
            .step(
                Stage::BuildingTransaction,
                self.api.create_cold_staking(&setup),
            )
            .await?;

        let sent = self
            .step(
                Stage::Broadcasting,
                self.api.send_transaction(&built.transaction_hex),
            )
            .await?;

        Ok(sent.transaction_id)
    }

    async fn step<T>(
        &self,
        stage: Stage,
        call: impl Future<Output = Result<T, ApiError>>,
    ) -> Result<T, DelegationError> {
        self.state.send_modify(|state| state.stage = stage);
        info!("{}", stage.label());

        match tokio::time::timeout(self.settings.timeout, call).await {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(e)) => Err(DelegationError::Stage {
                stage,
                message: e.user_message(),
            }),
            Err(_) => Err(DelegationError::Timeout {
                stage,
                after: self.settings.timeout,
            }),
        }
    }
}
