//! Wire-level request and response types.

use alloy_primitives::{Address, Bytes};
use serde::{Deserialize, Deserializer, Serialize};

use crate::RunStats;

/// Kind of an operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperationKind {
    /// Contract creation
    Create,
    /// Message call
    Call,
}

/// Request to deploy a contract.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateRequest {
    /// Deployer account
    pub sender: Address,
    /// Init code followed by ABI-encoded constructor arguments
    #[serde(default)]
    pub code_and_input: Bytes,
    /// Gas limit, replaced by the block gas limit when the genesis sets one
    #[serde(default)]
    pub gas: u64,
    /// Gas price in wei, as a decimal integer
    #[serde(default = "zero", deserialize_with = "decimal")]
    pub gas_price: String,
    /// Endowment in wei, as a decimal integer
    #[serde(default = "zero", deserialize_with = "decimal")]
    pub value: String,
}

/// Request to call a contract.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CallRequest {
    /// Calling account
    pub sender: Address,
    /// Called account
    pub receiver: Address,
    /// Call data
    #[serde(default)]
    pub input: Bytes,
    /// Gas limit, replaced by the block gas limit when the genesis sets one
    #[serde(default)]
    pub gas: u64,
    /// Gas price in wei, as a decimal integer
    #[serde(default = "zero", deserialize_with = "decimal")]
    pub gas_price: String,
    /// Value in wei, as a decimal integer
    #[serde(default = "zero", deserialize_with = "decimal")]
    pub value: String,
}

/// A deploy or a call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OperationRequest {
    /// Deploy
    Create(CreateRequest),
    /// Call
    Call(CallRequest),
}

impl OperationRequest {
    /// Returns the kind of the operation.
    pub const fn kind(&self) -> OperationKind {
        match self {
            Self::Create(_) => OperationKind::Create,
            Self::Call(_) => OperationKind::Call,
        }
    }

    /// Returns the originating account.
    pub const fn sender(&self) -> Address {
        match self {
            Self::Create(req) => req.sender,
            Self::Call(req) => req.sender,
        }
    }

    /// Returns the called account, `None` for creates.
    pub const fn receiver(&self) -> Option<Address> {
        match self {
            Self::Create(_) => None,
            Self::Call(req) => Some(req.receiver),
        }
    }

    /// Returns the init code or the call data.
    pub const fn data(&self) -> &Bytes {
        match self {
            Self::Create(req) => &req.code_and_input,
            Self::Call(req) => &req.input,
        }
    }

    /// Returns the requested gas limit.
    pub const fn gas(&self) -> u64 {
        match self {
            Self::Create(req) => req.gas,
            Self::Call(req) => req.gas,
        }
    }

    /// Returns the unparsed gas price.
    pub fn gas_price(&self) -> &str {
        match self {
            Self::Create(req) => &req.gas_price,
            Self::Call(req) => &req.gas_price,
        }
    }

    /// Returns the unparsed value.
    pub fn value(&self) -> &str {
        match self {
            Self::Create(req) => &req.value,
            Self::Call(req) => &req.value,
        }
    }
}

impl From<CreateRequest> for OperationRequest {
    fn from(req: CreateRequest) -> Self {
        Self::Create(req)
    }
}

impl From<CallRequest> for OperationRequest {
    fn from(req: CallRequest) -> Self {
        Self::Call(req)
    }
}

/// Result of an executed operation. Engine failures are reported in-band through `err_msg`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OperationResponse {
    /// Address of the created contract. Creates only; reported even when creation failed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub addr: Option<Address>,
    /// Return data of the execution
    #[serde(default)]
    pub result: Bytes,
    /// Decoded failure, empty on success
    #[serde(default)]
    pub err_msg: String,
    /// Gas consumed, as seen from the effective gas limit
    #[serde(default)]
    pub gas_used: u64,
    /// Timing and allocation statistics, when measured
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stats: Option<RunStats>,
}

impl OperationResponse {
    /// Returns `true` if the operation executed without failure.
    pub fn is_success(&self) -> bool {
        self.err_msg.is_empty()
    }
}

fn zero() -> String {
    "0".to_string()
}

/// Accepts decimal integers written either as JSON strings or as JSON numbers. Validation of the
/// string form happens when the execution context is built.
fn decimal<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Decimal {
        Number(u64),
        Text(String),
    }

    Ok(match Decimal::deserialize(deserializer)? {
        Decimal::Number(n) => n.to_string(),
        Decimal::Text(s) => s,
    })
}
