use serde::{Deserialize, Serialize};
use strum::Display;

use crate::infra::node_api::MaxBalance;

/// Actions that can be triggered by user input or internal events.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Display)]
#[strum(serialize_all = "snake_case")]
pub enum Action {
    Tick,
    Render,
    Resize(u16, u16),
    Suspend,
    Quit,
    Error(String),

    // Tab switching
    TabSettings,
    TabColdStaking,

    // Settings
    SwitchNetwork(String),
    ToggleAddressType,

    // Delegation form
    FormChanged,
    UseMaxBalance,
    SendDelegation,
    DelegationFinished,

    // Node polling
    RefreshBalance,
    BalanceUpdated { network: String, balance: MaxBalance },
    BalanceUnavailable { network: String, message: String },
}
