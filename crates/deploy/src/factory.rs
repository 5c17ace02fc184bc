//! The component creation boundary.

use std::future::Future;

use alloy_core::primitives::{Address, B256, U256};
use anyhow::Result;
use serde::{Deserialize, Serialize};

/// A literal constructor argument.
///
/// Every variant is a static ABI type and encodes to exactly one 32-byte word.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, derive_more::Display)]
pub enum ArgValue {
    #[display("{_0}")]
    Address(Address),
    #[display("{_0}")]
    Uint(U256),
    #[display("{_0}")]
    Bool(bool),
}

impl ArgValue {
    /// ABI-encode the argument as a single 32-byte word.
    pub fn abi_word(&self) -> B256 {
        match self {
            ArgValue::Address(address) => address.into_word(),
            ArgValue::Uint(value) => B256::from(value.to_be_bytes::<32>()),
            ArgValue::Bool(value) => B256::with_last_byte(u8::from(*value)),
        }
    }
}

impl From<Address> for ArgValue {
    fn from(address: Address) -> Self {
        ArgValue::Address(address)
    }
}

impl From<u64> for ArgValue {
    fn from(value: u64) -> Self {
        ArgValue::Uint(U256::from(value))
    }
}

impl From<bool> for ArgValue {
    fn from(value: bool) -> Self {
        ArgValue::Bool(value)
    }
}

/// Static execution parameters applied to every creation call of a run.
///
/// Unset fields are left to the node.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Overrides {
    /// Gas price ceiling, in wei.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gas_price: Option<u64>,
    /// Gas limit of a creation transaction.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gas_limit: Option<u64>,
}

impl Overrides {
    pub fn is_empty(&self) -> bool {
        self.gas_price.is_none() && self.gas_limit.is_none()
    }
}

/// Creates contract instances on the target network.
///
/// Creation is not idempotent: every successful call yields a new instance with a
/// distinct address, so implementations must not retry a creation on their own.
pub trait ComponentFactory: Send + Sync {
    /// Create one instance of `contract` with the given constructor arguments and
    /// return its address.
    fn create(
        &self,
        contract: &str,
        args: &[ArgValue],
        overrides: &Overrides,
    ) -> impl Future<Output = Result<Address>> + Send;
}
