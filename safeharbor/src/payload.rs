//! Reconciliation of the on-chain agreement against the desired state.
//!
//! The result is an ordered list of agreement calls. Chain removals come
//! first, then chain additions, then per-chain account changes. Account
//! changes address chains and accounts by their position in the on-chain
//! lists, so the order inside a chain is significant:
//!
//! 1. `setAccounts` replaces removed accounts in place, paired with additions.
//! 2. `removeAccount` drops the leftovers from the highest index down.
//! 3. `addAccounts` appends the remaining additions in one batch.

use alloy::{
    primitives::{Bytes, U256},
    sol_types::SolCall,
};
use serde::{ser::SerializeStruct, Serialize, Serializer};
use serde_json::{json, Value};

use crate::{
    bindings::{AccountEntry, AgreementV2, ChainEntry},
    config::ChainTable,
    diff::find_differences,
    error::SafeHarborError,
    state::{Account, AccountRecord, ChainGroups, ChainRecord, OnChainChain},
};

/// A single agreement call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Operation {
    AddChains { chains: Vec<ChainRecord> },
    RemoveChain { chain_id: u64 },
    AddAccounts {
        chain_index: usize,
        accounts: Vec<AccountRecord>,
    },
    RemoveAccount {
        chain_index: usize,
        account_index: usize,
    },
    SetAccounts {
        chain_index: usize,
        account_indices: Vec<usize>,
        accounts: Vec<AccountRecord>,
    },
}

impl Operation {
    pub fn function(&self) -> &'static str {
        match self {
            Self::AddChains { .. } => "addChains",
            Self::RemoveChain { .. } => "removeChain",
            Self::AddAccounts { .. } => "addAccounts",
            Self::RemoveAccount { .. } => "removeAccount",
            Self::SetAccounts { .. } => "setAccounts",
        }
    }

    /// Positional arguments, shaped like the ABI inputs.
    pub fn args(&self) -> Value {
        match self {
            Self::AddChains { chains } => json!([chains]),
            Self::RemoveChain { chain_id } => json!([chain_id]),
            Self::AddAccounts {
                chain_index,
                accounts,
            } => json!([chain_index, accounts]),
            Self::RemoveAccount {
                chain_index,
                account_index,
            } => json!([chain_index, account_index]),
            Self::SetAccounts {
                chain_index,
                account_indices,
                accounts,
            } => json!([chain_index, account_indices, accounts]),
        }
    }

    pub fn calldata(&self) -> Bytes {
        let encoded = match self {
            Self::AddChains { chains } => AgreementV2::addChainsCall {
                chains: chains.iter().map(ChainEntry::from).collect(),
            }
            .abi_encode(),
            Self::RemoveChain { chain_id } => AgreementV2::removeChainCall {
                chainId: U256::from(*chain_id),
            }
            .abi_encode(),
            Self::AddAccounts {
                chain_index,
                accounts,
            } => AgreementV2::addAccountsCall {
                chainId: U256::from(*chain_index),
                accounts: accounts.iter().map(AccountEntry::from).collect(),
            }
            .abi_encode(),
            Self::RemoveAccount {
                chain_index,
                account_index,
            } => AgreementV2::removeAccountCall {
                chainId: U256::from(*chain_index),
                accountId: U256::from(*account_index),
            }
            .abi_encode(),
            Self::SetAccounts {
                chain_index,
                account_indices,
                accounts,
            } => AgreementV2::setAccountsCall {
                chainId: U256::from(*chain_index),
                accountIds: account_indices
                    .iter()
                    .map(|index| U256::from(*index))
                    .collect(),
                accounts: accounts.iter().map(AccountEntry::from).collect(),
            }
            .abi_encode(),
        };
        encoded.into()
    }
}

/// An operation together with its encoded calldata.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Update {
    pub operation: Operation,
    pub calldata: Bytes,
}

impl From<Operation> for Update {
    fn from(operation: Operation) -> Self {
        let calldata = operation.calldata();
        Self { operation, calldata }
    }
}

impl Serialize for Update {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut state = serializer.serialize_struct("Update", 3)?;
        state.serialize_field("function", self.operation.function())?;
        state.serialize_field("args", &self.operation.args())?;
        state.serialize_field("calldata", &self.calldata)?;
        state.end()
    }
}

/// Ids of the desired chains, in sheet order.
fn desired_chain_ids(
    table: &ChainTable,
    desired: &ChainGroups,
) -> Result<Vec<u64>, SafeHarborError> {
    desired
        .names()
        .map(|name| table.require_id(name))
        .collect()
}

/// `removeChain` for chains that should go, `addChains` for chains that are missing.
pub fn chain_operations(
    table: &ChainTable,
    current: &[OnChainChain],
    desired: &ChainGroups,
) -> Result<Vec<Operation>, SafeHarborError> {
    let current_ids: Vec<u64> = current.iter().map(|chain| chain.id).collect();
    let desired_ids = desired_chain_ids(table, desired)?;
    let diff = find_differences(&current_ids, &desired_ids);

    let mut operations: Vec<Operation> = diff
        .to_remove
        .into_iter()
        .map(|chain_id| Operation::RemoveChain { chain_id })
        .collect();

    for (name, accounts) in desired.iter() {
        let id = table.require_id(name)?;
        if !diff.to_add.contains(&id) {
            continue;
        }
        let chain = ChainRecord {
            asset_recovery_address: table.asset_recovery_address(name)?.to_string(),
            accounts: accounts.iter().map(Account::record).collect(),
            id,
        };
        operations.push(Operation::AddChains {
            chains: vec![chain],
        });
    }

    Ok(operations)
}

/// Account changes for one chain that exists both on-chain and in the sheet.
pub fn account_operations(
    chain_index: usize,
    current: &[Account],
    desired: &[Account],
) -> Vec<Operation> {
    let current_keys: Vec<String> = current.iter().map(Account::key).collect();
    let desired_keys: Vec<String> = desired.iter().map(Account::key).collect();
    let diff = find_differences(&current_keys, &desired_keys);
    if diff.is_empty() {
        return Vec::new();
    }

    let position = |key: &String| current_keys.iter().position(|current| current == key);
    let record = |key: &String| {
        desired
            .iter()
            .find(|account| &account.key() == key)
            .map(Account::record)
    };

    let mut operations = Vec::new();
    let paired = diff.to_remove.len().min(diff.to_add.len());

    let (account_indices, accounts): (Vec<usize>, Vec<AccountRecord>) = diff.to_remove[..paired]
        .iter()
        .zip(&diff.to_add[..paired])
        .filter_map(|(removed, added)| Some((position(removed)?, record(added)?)))
        .unzip();
    if !account_indices.is_empty() {
        operations.push(Operation::SetAccounts {
            chain_index,
            account_indices,
            accounts,
        });
    }

    let mut leftover: Vec<usize> = diff.to_remove[paired..]
        .iter()
        .filter_map(|key| position(key))
        .collect();
    leftover.sort_unstable_by(|a, b| b.cmp(a));
    for account_index in leftover {
        operations.push(Operation::RemoveAccount {
            chain_index,
            account_index,
        });
    }

    let additions: Vec<AccountRecord> = diff.to_add[paired..]
        .iter()
        .filter_map(|key| record(key))
        .collect();
    if !additions.is_empty() {
        operations.push(Operation::AddAccounts {
            chain_index,
            accounts: additions,
        });
    }

    operations
}

/// Every call needed to bring the agreement in line with the sheet.
pub fn plan(
    table: &ChainTable,
    current: &[OnChainChain],
    desired: &ChainGroups,
) -> Result<Vec<Update>, SafeHarborError> {
    let mut operations = chain_operations(table, current, desired)?;

    let desired_by_id = desired
        .iter()
        .map(|(name, accounts)| Ok((table.require_id(name)?, accounts)))
        .collect::<Result<Vec<_>, SafeHarborError>>()?;

    for (chain_index, chain) in current.iter().enumerate() {
        let Some((_, desired_accounts)) = desired_by_id.iter().find(|(id, _)| *id == chain.id)
        else {
            continue;
        };
        operations.extend(account_operations(
            chain_index,
            &chain.accounts,
            desired_accounts,
        ));
    }

    Ok(operations.into_iter().map(Update::from).collect())
}
