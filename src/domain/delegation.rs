//! Delegation form input and the immutable request built from it.

use std::fmt;

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};
use thiserror::Error;
use zeroize::Zeroizing;

use super::{
    amount::{MIN_AMOUNT, parse_coins},
    fee_estimator::FeeEstimate,
};

/// Minimum length of a hot wallet address.
pub const MIN_ADDRESS_LEN: usize = 26;

/// Fee priority passed to the node.
#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum FeeTier {
    Low,
    #[default]
    Medium,
    High,
}

impl FeeTier {
    pub fn next(&self) -> Self {
        match self {
            FeeTier::Low => FeeTier::Medium,
            FeeTier::Medium => FeeTier::High,
            FeeTier::High => FeeTier::Low,
        }
    }
}

/// Local, pre-flight rejections. None of these ever reach the node.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("A delegated staking address is required.")]
    AddressRequired,
    #[error("A delegated staking address is at least 26 characters long.")]
    AddressTooShort,
    #[error("An amount is required.")]
    AmountRequired,
    #[error(
        "Enter a valid transaction amount. Only positive numbers and no more than 8 decimals are allowed."
    )]
    AmountFormat,
    #[error("The amount has to be more or equal to 0.00001.")]
    AmountTooSmall,
    #[error("The total transaction amount exceeds your spendable balance.")]
    AmountExceedsBalance,
    #[error("Your password is required.")]
    PasswordRequired,
    #[error("The fee estimate is still updating. Try again in a moment.")]
    EstimatePending,
}

/// Check a hot wallet address and return it trimmed.
pub fn validate_address(address: &str) -> Result<&str, ValidationError> {
    let address = address.trim();
    if address.is_empty() {
        Err(ValidationError::AddressRequired)
    } else if address.chars().count() < MIN_ADDRESS_LEN {
        Err(ValidationError::AddressTooShort)
    } else {
        Ok(address)
    }
}

/// Check an amount against the spendable bound (satoshis) and return it in
/// satoshis.
pub fn validate_amount(amount: &str, max_amount: u64) -> Result<u64, ValidationError> {
    if amount.trim().is_empty() {
        return Err(ValidationError::AmountRequired);
    }
    let satoshis = parse_coins(amount).ok_or(ValidationError::AmountFormat)?;
    if satoshis < MIN_AMOUNT {
        Err(ValidationError::AmountTooSmall)
    } else if satoshis > max_amount {
        Err(ValidationError::AmountExceedsBalance)
    } else {
        Ok(satoshis)
    }
}

/// Raw values of the delegation form as typed by the user.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct FormFields {
    pub hot_wallet_address: String,
    pub amount: String,
    pub password: String,
    pub fee_tier: FeeTier,
}

impl fmt::Debug for FormFields {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FormFields")
            .field("hot_wallet_address", &self.hot_wallet_address)
            .field("amount", &self.amount)
            .field("fee_tier", &self.fee_tier)
            .finish_non_exhaustive()
    }
}

impl FormFields {
    pub fn new(hot_wallet_address: &str, amount: &str, password: &str, fee_tier: FeeTier) -> Self {
        Self {
            hot_wallet_address: hot_wallet_address.to_string(),
            amount: amount.to_string(),
            password: password.to_string(),
            fee_tier,
        }
    }

    /// Per-field messages for display, empty fields are only reported once
    /// they have been edited (`dirty`).
    pub fn field_errors(&self, max_amount: u64, dirty: bool) -> FieldErrors {
        let message = |r: Result<(), ValidationError>| r.err().map(|e| e.to_string());
        if !dirty {
            return FieldErrors::default();
        }
        FieldErrors {
            hot_wallet_address: message(validate_address(&self.hot_wallet_address).map(|_| ())),
            amount: message(validate_amount(&self.amount, max_amount).map(|_| ())),
            password: message(if self.password.is_empty() {
                Err(ValidationError::PasswordRequired)
            } else {
                Ok(())
            }),
        }
    }
}

/// Validation messages keyed by form field.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FieldErrors {
    pub hot_wallet_address: Option<String>,
    pub amount: Option<String>,
    pub password: Option<String>,
}

impl FieldErrors {
    pub fn is_empty(&self) -> bool {
        self.hot_wallet_address.is_none() && self.amount.is_none() && self.password.is_none()
    }
}

/// A validated intent to delegate stake. Built once per submission and never
/// mutated afterwards.
pub struct DelegationRequest {
    hot_wallet_address: String,
    amount: u64,
    wallet_password: Zeroizing<String>,
    fee_tier: FeeTier,
}

impl DelegationRequest {
    /// Validate the form against the fee snapshot that will be used for the
    /// transaction.
    pub fn from_form(fields: &FormFields, estimate: &FeeEstimate) -> Result<Self, ValidationError> {
        let hot_wallet_address = validate_address(&fields.hot_wallet_address)?.to_string();
        let amount = validate_amount(&fields.amount, estimate.max_amount())?;
        if fields.password.is_empty() {
            return Err(ValidationError::PasswordRequired);
        }

        Ok(Self {
            hot_wallet_address,
            amount,
            wallet_password: Zeroizing::new(fields.password.clone()),
            fee_tier: fields.fee_tier,
        })
    }

    pub fn hot_wallet_address(&self) -> &str {
        &self.hot_wallet_address
    }

    /// Amount in satoshis.
    pub fn amount(&self) -> u64 {
        self.amount
    }

    pub fn wallet_password(&self) -> &str {
        &self.wallet_password
    }

    pub fn fee_tier(&self) -> FeeTier {
        self.fee_tier
    }
}

impl fmt::Debug for DelegationRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DelegationRequest")
            .field("hot_wallet_address", &self.hot_wallet_address)
            .field("amount", &self.amount)
            .field("wallet_password", &"<redacted>")
            .field("fee_tier", &self.fee_tier)
            .finish()
    }
}
