//! Node REST API surface used by the wallet.
//!
//! The wallet never talks to the node directly from domain code; everything
//! goes through [`NodeApi`] so the delegation pipeline and the fee estimator
//! can be driven by a scripted node in tests.

use std::fmt;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::delegation::FeeTier;

/// A single entry of the node's error list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorDetail {
    #[serde(default)]
    pub status: u16,
    pub message: String,
    #[serde(default)]
    pub description: Option<String>,
}

impl ErrorDetail {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            status: 400,
            message: message.into(),
            description: None,
        }
    }
}

/// Failure payload returned by the node on non-2xx responses.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ErrorResponse {
    #[serde(default)]
    pub errors: Vec<ErrorDetail>,
}

/// Errors returned by [`NodeApi`] calls.
#[derive(Debug, Clone, Error)]
pub enum ApiError {
    /// The node answered with an error list
    #[error("node error ({status}): {}", summarize(.errors))]
    Node { status: u16, errors: Vec<ErrorDetail> },
    /// The request never produced a response
    #[error("transport error: {0}")]
    Transport(String),
    /// The request did not complete in time
    #[error("request timed out")]
    Timeout,
    /// The response body could not be decoded
    #[error("unexpected response: {0}")]
    Decode(String),
}

impl ApiError {
    /// Shorthand for a node rejection carrying one message.
    pub fn node(message: impl Into<String>) -> Self {
        Self::Node {
            status: 400,
            errors: vec![ErrorDetail::new(message)],
        }
    }

    /// The diagnostic shown to the user: the node's first error message when
    /// there is one, otherwise the error itself.
    pub fn user_message(&self) -> String {
        match self {
            Self::Node { errors, .. } if !errors.is_empty() => errors[0].message.clone(),
            other => other.to_string(),
        }
    }
}

fn summarize(errors: &[ErrorDetail]) -> String {
    errors
        .first()
        .map(|e| e.message.clone())
        .unwrap_or_else(|| "no error details".to_string())
}

/// Result of `validateaddress`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidatedAddress {
    #[serde(rename = "isvalid", default)]
    pub is_valid: bool,
    #[serde(default)]
    pub address: Option<String>,
    #[serde(rename = "iswitness", default)]
    pub is_witness: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ColdStakingAccount {
    pub account_name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColdStakingAddress {
    pub address: String,
}

/// Body of `setup-cold-staking`. Amounts are coin strings.
#[derive(Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ColdStakingSetup<'a> {
    pub hot_wallet_address: &'a str,
    pub cold_wallet_address: &'a str,
    pub amount: String,
    pub wallet_name: &'a str,
    pub wallet_password: &'a str,
    pub wallet_account: &'a str,
    pub fees: String,
}

impl fmt::Debug for ColdStakingSetup<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ColdStakingSetup")
            .field("hot_wallet_address", &self.hot_wallet_address)
            .field("cold_wallet_address", &self.cold_wallet_address)
            .field("amount", &self.amount)
            .field("wallet_name", &self.wallet_name)
            .field("wallet_password", &"<redacted>")
            .field("wallet_account", &self.wallet_account)
            .field("fees", &self.fees)
            .finish()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BuiltTransaction {
    pub transaction_hex: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SentTransaction {
    pub transaction_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Recipient {
    pub destination_address: String,
    pub amount: String,
}

/// Body of `estimate-txfee`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeeEstimationRequest {
    pub wallet_name: String,
    pub account_name: String,
    pub recipients: Vec<Recipient>,
    pub fee_type: FeeTier,
    pub allow_unconfirmed: bool,
    pub is_cold_staking: bool,
}

/// Spendable balance for an account, in satoshis.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MaxBalance {
    pub max_spendable_amount: u64,
    pub fee: u64,
}

/// Interface that connects the wallet to a node. Typically an
/// [`HttpNodeApi`](crate::infra::http::HttpNodeApi).
#[async_trait]
pub trait NodeApi: fmt::Debug + Send + Sync {
    /// Syntactic and semantic check of an address.
    async fn validate_address(&self, address: &str) -> Result<ValidatedAddress, ApiError>;

    /// Ensure a cold staking account exists. Idempotent on the node side.
    async fn create_cold_staking_account(
        &self,
        wallet: &str,
        password: &str,
        is_cold_wallet: bool,
    ) -> Result<ColdStakingAccount, ApiError>;

    /// Derive a receive address from the cold staking account.
    async fn get_cold_staking_address(
        &self,
        wallet: &str,
        is_cold_wallet: bool,
        is_witness: bool,
    ) -> Result<ColdStakingAddress, ApiError>;

    /// Build the delegation transaction.
    async fn create_cold_staking(
        &self,
        setup: &ColdStakingSetup<'_>,
    ) -> Result<BuiltTransaction, ApiError>;

    /// Relay a transaction to the network.
    async fn send_transaction(&self, transaction_hex: &str) -> Result<SentTransaction, ApiError>;

    /// Fee in satoshis for the described transaction.
    async fn estimate_fee(&self, request: &FeeEstimationRequest) -> Result<u64, ApiError>;

    /// Spendable balance of an account.
    async fn max_balance(
        &self,
        wallet: &str,
        account: &str,
        fee_tier: FeeTier,
    ) -> Result<MaxBalance, ApiError>;
}
