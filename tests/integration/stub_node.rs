//! Scripted [`NodeApi`] that records every call.

use std::{
    collections::VecDeque,
    sync::{Arc, Mutex},
    time::Duration,
};

use async_trait::async_trait;
use xcore_wallet::{
    domain::{amount::COIN, delegation::FeeTier},
    infra::node_api::{
        ApiError, BuiltTransaction, ColdStakingAccount, ColdStakingAddress, ColdStakingSetup,
        FeeEstimationRequest, MaxBalance, NodeApi, SentTransaction, ValidatedAddress,
    },
};

pub const COLD_ADDRESS: &str = "cs1qcoldstakingaddressxxxxxxxxxxxxxxxx";
pub const TRANSACTION_HEX: &str = "abcd";
pub const TRANSACTION_ID: &str = "tx123";

/// A recorded node call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    ValidateAddress(String),
    CreateColdStakingAccount {
        wallet: String,
        is_cold_wallet: bool,
    },
    GetColdStakingAddress {
        wallet: String,
        is_cold_wallet: bool,
        is_witness: bool,
    },
    CreateColdStaking {
        hot_wallet_address: String,
        cold_wallet_address: String,
        amount: String,
        fees: String,
        wallet_account: String,
    },
    SendTransaction(String),
    EstimateFee(FeeEstimationRequest),
    MaxBalance {
        wallet: String,
        account: String,
        fee_tier: FeeTier,
    },
}

/// Queue of replies for one operation. Once drained, every call gets the
/// fallback value immediately.
#[derive(Debug)]
pub struct Script<T> {
    queue: Mutex<VecDeque<(Duration, Result<T, ApiError>)>>,
    fallback: T,
}

impl<T: Clone> Script<T> {
    fn new(fallback: T) -> Self {
        Self {
            queue: Mutex::new(VecDeque::new()),
            fallback,
        }
    }

    pub fn reply(&self, result: Result<T, ApiError>) {
        self.reply_after(Duration::ZERO, result);
    }

    pub fn reply_after(&self, delay: Duration, result: Result<T, ApiError>) {
        self.queue.lock().unwrap().push_back((delay, result));
    }

    async fn next(&self) -> Result<T, ApiError> {
        let next = self.queue.lock().unwrap().pop_front();
        let (delay, result) = next.unwrap_or_else(|| (Duration::ZERO, Ok(self.fallback.clone())));
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        result
    }
}

#[derive(Debug)]
pub struct StubNode {
    calls: Mutex<Vec<Call>>,
    pub validate: Script<ValidatedAddress>,
    pub account: Script<ColdStakingAccount>,
    pub cold_address: Script<ColdStakingAddress>,
    pub build: Script<BuiltTransaction>,
    pub broadcast: Script<SentTransaction>,
    pub fee: Script<u64>,
    pub balance: Script<MaxBalance>,
}

impl StubNode {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            calls: Mutex::new(Vec::new()),
            validate: Script::new(ValidatedAddress {
                is_valid: true,
                address: None,
                is_witness: false,
            }),
            account: Script::new(ColdStakingAccount {
                account_name: "coldStakingColdAddresses".to_string(),
            }),
            cold_address: Script::new(ColdStakingAddress {
                address: COLD_ADDRESS.to_string(),
            }),
            build: Script::new(BuiltTransaction {
                transaction_hex: TRANSACTION_HEX.to_string(),
            }),
            broadcast: Script::new(SentTransaction {
                transaction_id: TRANSACTION_ID.to_string(),
            }),
            fee: Script::new(10_000),
            balance: Script::new(MaxBalance {
                max_spendable_amount: 10 * COIN,
                fee: 10_000,
            }),
        })
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub fn estimate_calls(&self) -> Vec<FeeEstimationRequest> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                Call::EstimateFee(request) => Some(request),
                _ => None,
            })
            .collect()
    }

    pub fn sent_transactions(&self) -> usize {
        self.calls()
            .iter()
            .filter(|call| matches!(call, Call::SendTransaction(_)))
            .count()
    }

    fn record(&self, call: Call) {
        self.calls.lock().unwrap().push(call);
    }
}

#[async_trait]
impl NodeApi for StubNode {
    async fn validate_address(&self, address: &str) -> Result<ValidatedAddress, ApiError> {
        self.record(Call::ValidateAddress(address.to_string()));
        self.validate.next().await
    }

    async fn create_cold_staking_account(
        &self,
        wallet: &str,
        _password: &str,
        is_cold_wallet: bool,
    ) -> Result<ColdStakingAccount, ApiError> {
        self.record(Call::CreateColdStakingAccount {
            wallet: wallet.to_string(),
            is_cold_wallet,
        });
        self.account.next().await
    }

    async fn get_cold_staking_address(
        &self,
        wallet: &str,
        is_cold_wallet: bool,
        is_witness: bool,
    ) -> Result<ColdStakingAddress, ApiError> {
        self.record(Call::GetColdStakingAddress {
            wallet: wallet.to_string(),
            is_cold_wallet,
            is_witness,
        });
        self.cold_address.next().await
    }

    async fn create_cold_staking(
        &self,
        setup: &ColdStakingSetup<'_>,
    ) -> Result<BuiltTransaction, ApiError> {
        self.record(Call::CreateColdStaking {
            hot_wallet_address: setup.hot_wallet_address.to_string(),
            cold_wallet_address: setup.cold_wallet_address.to_string(),
            amount: setup.amount.clone(),
            fees: setup.fees.clone(),
            wallet_account: setup.wallet_account.to_string(),
        });
        self.build.next().await
    }

    async fn send_transaction(&self, transaction_hex: &str) -> Result<SentTransaction, ApiError> {
        self.record(Call::SendTransaction(transaction_hex.to_string()));
        self.broadcast.next().await
    }

    async fn estimate_fee(&self, request: &FeeEstimationRequest) -> Result<u64, ApiError> {
        self.record(Call::EstimateFee(request.clone()));
        self.fee.next().await
    }

    async fn max_balance(
        &self,
        wallet: &str,
        account: &str,
        fee_tier: FeeTier,
    ) -> Result<MaxBalance, ApiError> {
        self.record(Call::MaxBalance {
            wallet: wallet.to_string(),
            account: account.to_string(),
            fee_tier,
        });
        self.balance.next().await
    }
}
