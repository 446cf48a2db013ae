//! Debounced fee estimation for the delegation form.
//!
//! Every edit restarts a quiescence timer. When the timer fires and the form
//! holds a plausible recipient and amount, one `estimate_fee` call is issued,
//! tagged with a sequence number. Only the response to the most recently
//! issued call may replace the shared [`FeeEstimate`]; anything older is
//! dropped whenever it arrives.

use std::{
    sync::{
        Arc,
        atomic::{AtomicU64, AtomicUsize, Ordering},
    },
    time::Duration,
};

use tokio::{sync::watch, task::JoinHandle};
use tracing::{debug, warn};

use super::{
    amount::format_coins,
    delegation::{FormFields, ValidationError, validate_address, validate_amount},
};
use crate::{
    config::Config,
    infra::node_api::{ApiError, FeeEstimationRequest, MaxBalance, NodeApi, Recipient},
};

/// Last known fee and spendable balance, in satoshis.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FeeEstimate {
    pub fee: u64,
    pub max_spendable_amount: u64,
    /// Logical timestamp, bumped on every replacement.
    pub computed_at: u64,
}

impl FeeEstimate {
    /// Upper bound for the amount field: balance minus the estimated fee.
    pub fn max_amount(&self) -> u64 {
        self.max_spendable_amount.saturating_sub(self.fee)
    }
}

#[derive(Debug, Clone)]
pub struct EstimatorSettings {
    pub wallet: String,
    pub account: String,
    pub debounce: Duration,
    pub timeout: Duration,
}

impl EstimatorSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            wallet: config.wallet.name.clone(),
            account: config.wallet.account.clone(),
            debounce: config.fees.debounce(),
            timeout: config.fees.request_timeout(),
        }
    }
}

/// State shared with the timer and request tasks.
#[derive(Debug)]
struct Shared {
    api: Arc<dyn NodeApi>,
    settings: EstimatorSettings,
    estimate: watch::Sender<FeeEstimate>,
    error: watch::Sender<Option<String>>,
    latest_issued: AtomicU64,
    revision: AtomicU64,
    in_flight: AtomicUsize,
}

impl Shared {
    /// Build the node request if the form passes the local preconditions.
    fn prepare(&self, fields: &FormFields) -> Result<FeeEstimationRequest, ValidationError> {
        let recipient = validate_address(&fields.hot_wallet_address)?;
        let max_amount = self.estimate.borrow().max_amount();
        let amount = validate_amount(&fields.amount, max_amount)?;

        Ok(FeeEstimationRequest {
            wallet_name: self.settings.wallet.clone(),
            account_name: self.settings.account.clone(),
            recipients: vec![Recipient {
                destination_address: recipient.to_string(),
                amount: format_coins(amount),
            }],
            fee_type: fields.fee_tier,
            allow_unconfirmed: true,
            is_cold_staking: true,
        })
    }

    fn next_revision(&self) -> u64 {
        self.revision.fetch_add(1, Ordering::SeqCst) + 1
    }

    async fn request(self: Arc<Self>, seq: u64, request: FeeEstimationRequest) {
        let result = tokio::time::timeout(self.settings.timeout, self.api.estimate_fee(&request))
            .await
            .unwrap_or(Err(ApiError::Timeout));
        self.apply(seq, result);
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
    }

    fn apply(&self, seq: u64, result: Result<u64, ApiError>) {
        let latest = self.latest_issued.load(Ordering::SeqCst);
        if seq != latest {
            debug!("Discarding fee estimate #{} (latest issued #{})", seq, latest);
            return;
        }

        match result {
            Ok(fee) => {
                let revision = self.next_revision();
                self.estimate.send_modify(|estimate| {
                    estimate.fee = fee;
                    estimate.computed_at = revision;
                });
                self.error.send_replace(None);
                debug!("Fee estimate #{}: {} sat", seq, fee);
            }
            Err(e) => {
                let message = e.user_message();
                warn!("Fee estimate #{} failed: {}", seq, message);
                self.error.send_replace(Some(message));
            }
        }
    }
}

/// Keeps a [`FeeEstimate`] in step with the delegation form.
#[derive(Debug)]
pub struct FeeEstimator {
    shared: Arc<Shared>,
    pending: Option<JoinHandle<()>>,
}

impl FeeEstimator {
    pub fn new(api: Arc<dyn NodeApi>, settings: EstimatorSettings) -> Self {
        let (estimate, _) = watch::channel(FeeEstimate::default());
        let (error, _) = watch::channel(None);
        Self {
            shared: Arc::new(Shared {
                api,
                settings,
                estimate,
                error,
                latest_issued: AtomicU64::new(0),
                revision: AtomicU64::new(0),
                in_flight: AtomicUsize::new(0),
            }),
            pending: None,
        }
    }

    /// Feed a form edit. Restarts the quiescence window; the estimate is
    /// requested only once the form has been stable for the whole window.
    pub fn on_form_changed(&mut self, fields: FormFields) {
        if let Some(pending) = self.pending.take() {
            pending.abort();
        }

        let shared = self.shared.clone();
        self.pending = Some(tokio::spawn(async move {
            tokio::time::sleep(shared.settings.debounce).await;

            let request = match shared.prepare(&fields) {
                Ok(request) => request,
                Err(e) => {
                    debug!("Skipping fee estimate: {}", e);
                    return;
                }
            };

            let seq = shared.latest_issued.fetch_add(1, Ordering::SeqCst) + 1;
            shared.in_flight.fetch_add(1, Ordering::SeqCst);
            debug!("Issuing fee estimate #{}", seq);
            // Detached so a later edit cannot cancel a request already sent.
            tokio::spawn(shared.request(seq, request));
        }));
    }

    /// Record a fresh spendable balance from the node, which moves the
    /// amount bound. The node's fee is adopted only until the first
    /// estimate has been requested.
    pub fn apply_balance(&self, balance: MaxBalance) {
        let adopt_fee = self.shared.latest_issued.load(Ordering::SeqCst) == 0;
        let revision = self.shared.next_revision();
        self.shared.estimate.send_if_modified(|estimate| {
            let fee_changed = adopt_fee && estimate.fee != balance.fee;
            if estimate.max_spendable_amount == balance.max_spendable_amount && !fee_changed {
                return false;
            }
            estimate.max_spendable_amount = balance.max_spendable_amount;
            if adopt_fee {
                estimate.fee = balance.fee;
            }
            estimate.computed_at = revision;
            true
        });
        debug!(
            "Spendable balance: {} sat (bound {} sat)",
            balance.max_spendable_amount,
            self.max_amount()
        );
    }

    /// Current estimate.
    pub fn snapshot(&self) -> FeeEstimate {
        *self.shared.estimate.borrow()
    }

    /// Largest amount, in satoshis, the form currently accepts.
    pub fn max_amount(&self) -> u64 {
        self.snapshot().max_amount()
    }

    /// Change notifications for the estimate.
    pub fn subscribe(&self) -> watch::Receiver<FeeEstimate> {
        self.shared.estimate.subscribe()
    }

    /// Change notifications for the last fee estimation error.
    pub fn errors(&self) -> watch::Receiver<Option<String>> {
        self.shared.error.subscribe()
    }

    pub fn last_error(&self) -> Option<String> {
        self.shared.error.borrow().clone()
    }

    /// Number of estimate calls issued so far.
    pub fn issued(&self) -> u64 {
        self.shared.latest_issued.load(Ordering::SeqCst)
    }

    /// True when no debounce timer is pending and no estimate is in flight.
    pub fn is_settled(&self) -> bool {
        let timer_pending = self.pending.as_ref().is_some_and(|h| !h.is_finished());
        !timer_pending && self.shared.in_flight.load(Ordering::SeqCst) == 0
    }

    /// The estimate to submit with, refused while a refresh is still on its
    /// way so a delegation never goes out with a fee computed for older form
    /// values.
    pub fn settled_snapshot(&self) -> Result<FeeEstimate, ValidationError> {
        if self.is_settled() {
            Ok(self.snapshot())
        } else {
            Err(ValidationError::EstimatePending)
        }
    }
}

impl Drop for FeeEstimator {
    fn drop(&mut self) {
        if let Some(pending) = self.pending.take() {
            pending.abort();
        }
    }
}
