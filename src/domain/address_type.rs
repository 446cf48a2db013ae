use serde::{Deserialize, Serialize};
use strum::Display;

/// Receive address format preferred by the user.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, Display)]
pub enum AddressType {
    Classic,
    #[default]
    Segwit,
}

impl AddressType {
    pub fn is_segwit(&self) -> bool {
        matches!(self, AddressType::Segwit)
    }

    /// Address encoding the node uses for this type.
    pub fn encoding(&self) -> &'static str {
        if self.is_segwit() { "bech32" } else { "base58" }
    }

    pub fn toggled(&self) -> Self {
        match self {
            AddressType::Classic => AddressType::Segwit,
            AddressType::Segwit => AddressType::Classic,
        }
    }
}
