//! Execution context assembly.
//!
//! Block-level parameters come from the genesis configuration only; the request contributes the
//! sender, payload, gas and value.

use std::str::FromStr;

use alloy_genesis::{ChainConfig, Genesis};
use alloy_primitives::{Address, Bytes, B256, U256};
use revm::{
    context::{block::BlockEnv, cfg::CfgEnv, tx::TxEnv},
    primitives::{eip4844, hardfork::SpecId, TxKind},
};
use tracing::{debug, trace};

use crate::{ConfigError, LabConfig, OperationKind, OperationRequest, ValidationError};

/// Spec used when the genesis does not pin any fork.
pub const LATEST_SPEC: SpecId = SpecId::PRAGUE;

/// Static chain and block parameters, derived once from the genesis configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChainEnv {
    /// Rule set the engine executes under
    pub spec: SpecId,
    /// Chain id
    pub chain_id: u64,
    /// Block number
    pub block_number: u64,
    /// Block timestamp
    pub timestamp: u64,
    /// Block beneficiary
    pub coinbase: Address,
    /// Block difficulty
    pub difficulty: U256,
    /// Prevrandao, taken from the genesis mix hash
    pub prevrandao: B256,
    /// Base fee per gas
    pub basefee: u64,
    /// Excess blob gas, for Cancun and later
    pub excess_blob_gas: u64,
    /// Block gas limit. Non-zero values override the gas limit of every request.
    pub gas_limit: u64,
}

impl Default for ChainEnv {
    fn default() -> Self {
        Self {
            spec: LATEST_SPEC,
            chain_id: 1,
            block_number: 0,
            timestamp: 0,
            coinbase: Address::ZERO,
            difficulty: U256::ZERO,
            prevrandao: B256::ZERO,
            basefee: 0,
            excess_blob_gas: 0,
            gas_limit: 0,
        }
    }
}

impl ChainEnv {
    /// Creates the chain environment described by the service configuration.
    pub fn from_config(config: &LabConfig) -> Result<Self, ConfigError> {
        let mut chain = config.genesis.as_ref().map(Self::from_genesis).transpose()?.unwrap_or_default();
        if let Some(hardfork) = &config.hardfork {
            chain.spec = SpecId::from_str(hardfork)
                .map_err(|_| ConfigError::UnknownHardfork(hardfork.clone()))?;
        }
        debug!(spec = ?chain.spec, chain_id = chain.chain_id, gas_limit = chain.gas_limit, "Chain environment ready");
        Ok(chain)
    }

    /// Creates the chain environment of a genesis block.
    pub fn from_genesis(genesis: &Genesis) -> Result<Self, ConfigError> {
        let block_number = genesis.number.unwrap_or_default();
        let basefee = genesis
            .base_fee_per_gas
            .map(u64::try_from)
            .transpose()
            .map_err(|_| ConfigError::Genesis("base fee does not fit in 64 bits".to_string()))?
            .unwrap_or_default();
        Ok(Self {
            spec: spec_at(&genesis.config, block_number, genesis.timestamp, genesis.difficulty),
            chain_id: genesis.config.chain_id,
            block_number,
            timestamp: genesis.timestamp,
            coinbase: genesis.coinbase,
            difficulty: genesis.difficulty,
            prevrandao: genesis.mix_hash,
            basefee,
            excess_blob_gas: genesis.excess_blob_gas.unwrap_or_default(),
            gas_limit: genesis.gas_limit,
        })
    }

    /// Creates the engine configuration.
    pub fn cfg_env(&self) -> CfgEnv {
        let mut cfg = CfgEnv::default();
        cfg.chain_id = self.chain_id;
        cfg.spec = self.spec;
        // Requests carry no nonce; the sender's current nonce is always used.
        cfg.disable_nonce_check = true;
        // Fees are never charged, so a zero gas price must pass under any base fee.
        cfg.disable_base_fee = true;
        cfg
    }

    /// Creates the block environment.
    pub fn block_env(&self) -> BlockEnv {
        let mut block = BlockEnv {
            number: U256::from(self.block_number),
            beneficiary: self.coinbase,
            timestamp: U256::from(self.timestamp),
            gas_limit: if self.gas_limit == 0 { u64::MAX } else { self.gas_limit },
            basefee: self.basefee,
            difficulty: self.difficulty,
            prevrandao: Some(self.prevrandao),
            blob_excess_gas_and_price: None,
        };

        if self.spec.is_enabled_in(SpecId::CANCUN) {
            let update_fraction = if self.spec.is_enabled_in(SpecId::PRAGUE) {
                eip4844::BLOB_BASE_FEE_UPDATE_FRACTION_PRAGUE
            } else {
                eip4844::BLOB_BASE_FEE_UPDATE_FRACTION_CANCUN
            };
            block.set_blob_excess_gas_and_price(self.excess_blob_gas, update_fraction);
        }

        block
    }
}

/// Returns the newest fork of `config` active at the given block.
///
/// A chain config that names no fork at all stands for "every protocol change" and maps to
/// [`LATEST_SPEC`].
pub fn spec_at(config: &ChainConfig, block: u64, timestamp: u64, difficulty: U256) -> SpecId {
    let at_block = |fork: Option<u64>| fork.is_some_and(|activation| activation <= block);
    let at_time = |fork: Option<u64>| fork.is_some_and(|activation| activation <= timestamp);

    let block_forks = [
        config.homestead_block,
        config.dao_fork_block,
        config.eip150_block,
        config.eip158_block,
        config.byzantium_block,
        config.constantinople_block,
        config.petersburg_block,
        config.istanbul_block,
        config.muir_glacier_block,
        config.berlin_block,
        config.london_block,
        config.arrow_glacier_block,
        config.gray_glacier_block,
        config.merge_netsplit_block,
    ];
    let time_forks = [config.shanghai_time, config.cancun_time, config.prague_time, config.osaka_time];
    if block_forks.iter().chain(&time_forks).all(Option::is_none) &&
        config.terminal_total_difficulty.is_none()
    {
        return LATEST_SPEC;
    }

    let merged = config.terminal_total_difficulty_passed ||
        at_block(config.merge_netsplit_block) ||
        config.terminal_total_difficulty.is_some_and(|ttd| difficulty >= ttd);

    let forks = [
        (at_time(config.osaka_time), SpecId::OSAKA),
        (at_time(config.prague_time), SpecId::PRAGUE),
        (at_time(config.cancun_time), SpecId::CANCUN),
        (at_time(config.shanghai_time), SpecId::SHANGHAI),
        (merged, SpecId::MERGE),
        (at_block(config.gray_glacier_block), SpecId::GRAY_GLACIER),
        (at_block(config.arrow_glacier_block), SpecId::ARROW_GLACIER),
        (at_block(config.london_block), SpecId::LONDON),
        (at_block(config.berlin_block), SpecId::BERLIN),
        (at_block(config.muir_glacier_block), SpecId::MUIR_GLACIER),
        (at_block(config.istanbul_block), SpecId::ISTANBUL),
        (at_block(config.petersburg_block), SpecId::PETERSBURG),
        (at_block(config.constantinople_block), SpecId::CONSTANTINOPLE),
        (at_block(config.byzantium_block), SpecId::BYZANTIUM),
        (at_block(config.eip158_block), SpecId::SPURIOUS_DRAGON),
        (at_block(config.eip150_block), SpecId::TANGERINE),
        (at_block(config.dao_fork_block), SpecId::DAO_FORK),
        (at_block(config.homestead_block), SpecId::HOMESTEAD),
    ];
    forks.into_iter().find_map(|(active, spec)| active.then_some(spec)).unwrap_or(SpecId::FRONTIER)
}

/// Everything the engine needs to run one operation.
#[derive(Debug, Clone)]
pub struct ExecutionContext {
    /// Operation kind
    pub kind: OperationKind,
    /// Transaction origin
    pub origin: Address,
    /// Call target, `None` for creates
    pub receiver: Option<Address>,
    /// Init code with constructor arguments, or call data
    pub data: Bytes,
    /// Effective gas limit
    pub gas_limit: u64,
    /// Gas price in wei
    pub gas_price: u128,
    /// Value transferred in wei
    pub value: U256,
    /// Engine configuration
    pub cfg: CfgEnv,
    /// Block environment
    pub block: BlockEnv,
}

impl ExecutionContext {
    /// Returns the transaction environment for a sender currently at `nonce`. The engine runs it
    /// as a message, so the nonce only matters to creates.
    pub fn tx_env(&self, nonce: u64) -> TxEnv {
        let kind = match self.receiver {
            Some(receiver) => TxKind::Call(receiver),
            None => TxKind::Create,
        };
        TxEnv {
            caller: self.origin,
            gas_limit: self.gas_limit,
            gas_price: self.gas_price,
            kind,
            value: self.value,
            data: self.data.clone(),
            nonce,
            chain_id: Some(self.cfg.chain_id),
            ..Default::default()
        }
    }
}

/// Builds [`ExecutionContext`]s from requests against a fixed [`ChainEnv`].
#[derive(Debug, Clone, Copy)]
pub struct ExecutionContextBuilder<'a> {
    chain: &'a ChainEnv,
}

impl<'a> ExecutionContextBuilder<'a> {
    /// Creates a builder for `chain`.
    pub const fn new(chain: &'a ChainEnv) -> Self {
        Self { chain }
    }

    /// Validates the numeric fields of `request` and assembles its context.
    ///
    /// A non-zero block gas limit replaces the gas limit of the request.
    pub fn build(&self, request: &OperationRequest) -> Result<ExecutionContext, ValidationError> {
        let gas_price = parse_gas_price(request.gas_price())?;
        let value = parse_value(request.value())?;

        let gas_limit = if self.chain.gas_limit != 0 {
            trace!(requested = request.gas(), block = self.chain.gas_limit, "Block gas limit overrides request");
            self.chain.gas_limit
        } else {
            request.gas()
        };

        Ok(ExecutionContext {
            kind: request.kind(),
            origin: request.sender(),
            receiver: request.receiver(),
            data: request.data().clone(),
            gas_limit,
            gas_price,
            value,
            cfg: self.chain.cfg_env(),
            block: self.chain.block_env(),
        })
    }
}

/// Parses a non-negative decimal integer of at most 256 bits.
fn parse_decimal(s: &str) -> Option<U256> {
    let s = s.trim();
    if s.is_empty() || !s.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    U256::from_str_radix(s, 10).ok()
}

/// Parses a gas price. The engine prices gas in 128 bits.
pub fn parse_gas_price(s: &str) -> Result<u128, ValidationError> {
    parse_decimal(s)
        .and_then(|price| u128::try_from(price).ok())
        .ok_or_else(|| ValidationError::GasPrice(s.to_string()))
}

/// Parses a transferred value.
pub fn parse_value(s: &str) -> Result<U256, ValidationError> {
    parse_decimal(s).ok_or_else(|| ValidationError::Value(s.to_string()))
}
