//! reqwest-backed [`NodeApi`] talking to the node's REST API.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{RequestBuilder, Response};
use serde::{Serialize, de::DeserializeOwned};
use tracing::debug;
use url::Url;

use super::node_api::{
    ApiError, BuiltTransaction, ColdStakingAccount, ColdStakingAddress, ColdStakingSetup,
    ErrorDetail, ErrorResponse, FeeEstimationRequest, MaxBalance, NodeApi, SentTransaction,
    ValidatedAddress,
};
use crate::{config::Config, domain::delegation::FeeTier};

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ColdStakingAccountRequest<'a> {
    wallet_name: &'a str,
    wallet_password: &'a str,
    is_cold_wallet_account: bool,
}

#[derive(Serialize)]
struct SendTransactionRequest<'a> {
    hex: &'a str,
}

/// HTTP client for a wallet node.
#[derive(Debug, Clone)]
pub struct HttpNodeApi {
    base_url: Url,
    inner: reqwest::Client,
}

impl HttpNodeApi {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, ApiError> {
        // A trailing slash keeps `join` from dropping the last path segment.
        let base = format!("{}/", base_url.trim_end_matches('/'));
        let base_url = Url::parse(&base).map_err(|e| ApiError::Transport(e.to_string()))?;
        let inner = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ApiError::Transport(e.to_string()))?;
        Ok(Self { base_url, inner })
    }

    pub fn from_config(config: &Config) -> Result<Self, ApiError> {
        Self::new(&config.network.api_url, config.fees.request_timeout())
    }

    fn endpoint(&self, path: &str) -> Result<Url, ApiError> {
        self.base_url
            .join(path)
            .map_err(|e| ApiError::Transport(e.to_string()))
    }

    async fn get<R>(&self, path: &str, query: &[(&str, &str)]) -> Result<R, ApiError>
    where
        R: DeserializeOwned,
    {
        let url = self.endpoint(path)?;
        debug!("GET {}", url.path());
        self.execute(self.inner.get(url).query(query)).await
    }

    async fn post<B, R>(&self, path: &str, body: &B) -> Result<R, ApiError>
    where
        B: Serialize + ?Sized,
        R: DeserializeOwned,
    {
        let url = self.endpoint(path)?;
        debug!("POST {}", url.path());
        self.execute(self.inner.post(url).json(body)).await
    }

    async fn execute<R>(&self, request: RequestBuilder) -> Result<R, ApiError>
    where
        R: DeserializeOwned,
    {
        let response = request.send().await.map_err(transport_error)?;
        let response = check_status(response).await?;
        response
            .json::<R>()
            .await
            .map_err(|e| ApiError::Decode(e.to_string()))
    }
}

fn transport_error(err: reqwest::Error) -> ApiError {
    if err.is_timeout() {
        ApiError::Timeout
    } else {
        ApiError::Transport(err.to_string())
    }
}

async fn check_status(response: Response) -> Result<Response, ApiError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    let errors = match serde_json::from_str::<ErrorResponse>(&body) {
        Ok(parsed) if !parsed.errors.is_empty() => parsed.errors,
        _ => {
            let message = if body.trim().is_empty() {
                status
                    .canonical_reason()
                    .unwrap_or("request failed")
                    .to_string()
            } else {
                body
            };
            vec![ErrorDetail {
                status: status.as_u16(),
                message,
                description: None,
            }]
        }
    };

    Err(ApiError::Node {
        status: status.as_u16(),
        errors,
    })
}

fn flag(value: bool) -> &'static str {
    if value { "true" } else { "false" }
}

#[async_trait]
impl NodeApi for HttpNodeApi {
    async fn validate_address(&self, address: &str) -> Result<ValidatedAddress, ApiError> {
        self.get("api/Node/validateaddress", &[("address", address)])
            .await
    }

    async fn create_cold_staking_account(
        &self,
        wallet: &str,
        password: &str,
        is_cold_wallet: bool,
    ) -> Result<ColdStakingAccount, ApiError> {
        let body = ColdStakingAccountRequest {
            wallet_name: wallet,
            wallet_password: password,
            is_cold_wallet_account: is_cold_wallet,
        };
        self.post("api/ColdStaking/cold-staking-account", &body)
            .await
    }

    async fn get_cold_staking_address(
        &self,
        wallet: &str,
        is_cold_wallet: bool,
        is_witness: bool,
    ) -> Result<ColdStakingAddress, ApiError> {
        self.get(
            "api/ColdStaking/cold-staking-address",
            &[
                ("WalletName", wallet),
                ("IsColdWalletAddress", flag(is_cold_wallet)),
                ("Segwit", flag(is_witness)),
            ],
        )
        .await
    }

    async fn create_cold_staking(
        &self,
        setup: &ColdStakingSetup<'_>,
    ) -> Result<BuiltTransaction, ApiError> {
        self.post("api/ColdStaking/setup-cold-staking", setup).await
    }

    async fn send_transaction(&self, transaction_hex: &str) -> Result<SentTransaction, ApiError> {
        let body = SendTransactionRequest {
            hex: transaction_hex,
        };
        self.post("api/Wallet/send-transaction", &body).await
    }

    async fn estimate_fee(&self, request: &FeeEstimationRequest) -> Result<u64, ApiError> {
        self.post("api/Wallet/estimate-txfee", request).await
    }

    async fn max_balance(
        &self,
        wallet: &str,
        account: &str,
        fee_tier: FeeTier,
    ) -> Result<MaxBalance, ApiError> {
        let fee_type = fee_tier.to_string();
        self.get(
            "api/Wallet/maxbalance",
            &[
                ("WalletName", wallet),
                ("AccountName", account),
                ("FeeType", fee_type.as_str()),
                ("AllowUnconfirmed", "true"),
            ],
        )
        .await
    }
}
