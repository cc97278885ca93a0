//! The world state owned by the gateway.

use std::collections::BTreeMap;

use alloy_genesis::Genesis;
use alloy_primitives::{keccak256, Address, Bytes, B256, U256};
use alloy_rlp::{Encodable, Header};
use alloy_trie::{HashBuilder, Nibbles, EMPTY_ROOT_HASH};
use revm::{
    database::{AccountState as DbAccountState, CacheDB, DbAccount, EmptyDB},
    primitives::KECCAK_EMPTY,
    state::{AccountInfo, Bytecode, EvmState},
    DatabaseCommit,
};
use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

use crate::ConfigError;

/// Backing database of the world state. Every account lives in the cache; the empty backend only
/// answers for accounts that were never created.
pub type StateDb = CacheDB<EmptyDB>;

/// Accounts, balances, nonces, code and storage mutated by executions.
///
/// Changes reach the database only through [`WorldState::apply`]; the state root is recomputed
/// by [`WorldState::commit`].
#[derive(Debug, Clone)]
pub struct WorldState {
    db: StateDb,
    root: B256,
}

impl Default for WorldState {
    fn default() -> Self {
        Self::new()
    }
}

impl WorldState {
    /// Creates an empty world state.
    pub fn new() -> Self {
        Self { db: StateDb::default(), root: EMPTY_ROOT_HASH }
    }

    /// Creates the world state described by the genesis allocation.
    pub fn from_genesis(genesis: &Genesis) -> Result<Self, ConfigError> {
        let mut state = Self::new();
        for (address, account) in &genesis.alloc {
            let bytecode = match &account.code {
                Some(code) if !code.is_empty() => Bytecode::new_raw_checked(code.clone())
                    .map_err(|e| ConfigError::Genesis(format!("code of {address}: {e}")))?,
                _ => Bytecode::default(),
            };
            let info = AccountInfo::new(
                account.balance,
                account.nonce.unwrap_or_default(),
                bytecode.hash_slow(),
                bytecode,
            );
            state.db.insert_account_info(*address, info);

            for (slot, value) in account.storage.iter().flatten() {
                state
                    .db
                    .insert_account_storage(
                        *address,
                        U256::from_be_bytes(slot.0),
                        U256::from_be_bytes(value.0),
                    )
                    .unwrap_or_else(|never| match never {});
            }
            trace!(%address, "Loaded genesis account");
        }
        state.commit();
        debug!(accounts = genesis.alloc.len(), root = %state.root, "World state initialized from genesis");
        Ok(state)
    }

    /// Returns the state root computed by the last commit.
    pub const fn root(&self) -> B256 {
        self.root
    }

    /// Returns the account at `address`, if it exists.
    pub fn account(&self, address: Address) -> Option<&AccountInfo> {
        self.live_account(address).map(|account| &account.info)
    }

    /// Returns the nonce of `address`, 0 for missing accounts.
    pub fn nonce(&self, address: Address) -> u64 {
        self.account(address).map_or(0, |info| info.nonce)
    }

    /// Returns the balance of `address`, 0 for missing accounts.
    pub fn balance(&self, address: Address) -> U256 {
        self.account(address).map_or(U256::ZERO, |info| info.balance)
    }

    /// Returns the runtime code of `address`, empty for missing accounts.
    pub fn code(&self, address: Address) -> Bytes {
        self.account(address)
            .and_then(|info| info.code.as_ref())
            .map(|code| code.original_bytes())
            .unwrap_or_default()
    }

    /// Returns the storage value of `address` at `slot`.
    pub fn storage(&self, address: Address, slot: U256) -> U256 {
        self.live_account(address)
            .and_then(|account| account.storage.get(&slot).copied())
            .unwrap_or_default()
    }

    /// Applies the state changes produced by one execution.
    pub fn apply(&mut self, changes: EvmState) {
        trace!(accounts = changes.len(), "Applying state changes");
        self.db.commit(changes);
    }

    /// Recomputes the state root over all live accounts and returns it.
    pub fn commit(&mut self) -> B256 {
        self.root = self.compute_root();
        debug!(root = %self.root, "World state committed");
        self.root
    }

    /// Serializes every live account and the current root.
    pub fn dump(&self) -> StateDump {
        let accounts = self
            .live_accounts()
            .map(|(address, account)| (*address, AccountDump::from_db_account(account)))
            .collect();
        StateDump { root: self.root, accounts }
    }

    pub(crate) fn db_mut(&mut self) -> &mut StateDb {
        &mut self.db
    }

    fn live_account(&self, address: Address) -> Option<&DbAccount> {
        self.db
            .cache
            .accounts
            .get(&address)
            .filter(|account| !matches!(account.account_state, DbAccountState::NotExisting))
    }

    fn live_accounts(&self) -> impl Iterator<Item = (&Address, &DbAccount)> {
        self.db.cache.accounts.iter().filter(|(_, account)| {
            !matches!(account.account_state, DbAccountState::NotExisting) && !is_empty(account)
        })
    }

    fn compute_root(&self) -> B256 {
        let mut leaves: Vec<(B256, Vec<u8>)> = self
            .live_accounts()
            .map(|(address, account)| (keccak256(address), encode_account(account)))
            .collect();
        trie_root(&mut leaves)
    }
}

/// Empty per EIP-161: no nonce, no balance, no code. Such accounts do not enter the trie.
fn is_empty(account: &DbAccount) -> bool {
    account.info.nonce == 0 &&
        account.info.balance.is_zero() &&
        account.info.code_hash == KECCAK_EMPTY &&
        account.storage.values().all(|value| value.is_zero())
}

fn storage_root(account: &DbAccount) -> B256 {
    let mut leaves: Vec<(B256, Vec<u8>)> = account
        .storage
        .iter()
        .filter(|(_, value)| !value.is_zero())
        .map(|(slot, value)| (keccak256(slot.to_be_bytes::<32>()), alloy_rlp::encode(value)))
        .collect();
    trie_root(&mut leaves)
}

fn encode_account(account: &DbAccount) -> Vec<u8> {
    let storage_root = storage_root(account);
    let code_hash =
        if account.info.code_hash == B256::ZERO { KECCAK_EMPTY } else { account.info.code_hash };
    let payload_length = account.info.nonce.length() +
        account.info.balance.length() +
        storage_root.length() +
        code_hash.length();

    let mut out = Vec::with_capacity(payload_length + 4);
    Header { list: true, payload_length }.encode(&mut out);
    account.info.nonce.encode(&mut out);
    account.info.balance.encode(&mut out);
    storage_root.encode(&mut out);
    code_hash.encode(&mut out);
    out
}

fn trie_root(leaves: &mut [(B256, Vec<u8>)]) -> B256 {
    if leaves.is_empty() {
        return EMPTY_ROOT_HASH;
    }
    leaves.sort_unstable_by(|a, b| a.0.cmp(&b.0));
    let mut builder = HashBuilder::default();
    for (key, value) in leaves.iter() {
        builder.add_leaf(Nibbles::unpack(key), value);
    }
    builder.root()
}

/// Full dump of the world state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateDump {
    /// State root at the time of the dump
    pub root: B256,
    /// Live accounts, ordered by address
    pub accounts: BTreeMap<Address, AccountDump>,
}

/// One account of a [`StateDump`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountDump {
    /// Account balance
    pub balance: U256,
    /// Account nonce
    #[serde(with = "alloy_serde::quantity")]
    pub nonce: u64,
    /// Runtime code
    pub code: Bytes,
    /// Hash of the runtime code
    pub code_hash: B256,
    /// Non-zero storage slots
    pub storage: BTreeMap<U256, U256>,
}

impl AccountDump {
    fn from_db_account(account: &DbAccount) -> Self {
        let code = account.info.code.as_ref().map(|c| c.original_bytes()).unwrap_or_default();
        let storage = account
            .storage
            .iter()
            .filter(|(_, value)| !value.is_zero())
            .map(|(slot, value)| (*slot, *value))
            .collect();
        Self {
            balance: account.info.balance,
            nonce: account.info.nonce,
            code,
            code_hash: account.info.code_hash,
            storage,
        }
    }
}
