//! Desired and on-chain representations of the agreement's chains and accounts.

use serde::Serialize;

/// `childContractScope` value for accounts whose child contracts are in scope.
pub const FACTORY_SCOPE: u8 = 3;

/// `childContractScope` value for plain contracts.
pub const CONTRACT_SCOPE: u8 = 0;

/// A single account covered by the agreement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Account {
    pub address: String,
    pub factory: bool,
}

impl Account {
    pub fn new(address: impl Into<String>, factory: bool) -> Self {
        Self {
            address: address.into(),
            factory,
        }
    }

    pub fn from_scope(address: String, scope: u8) -> Self {
        Self {
            address,
            factory: scope == FACTORY_SCOPE,
        }
    }

    pub fn scope(&self) -> u8 {
        if self.factory {
            FACTORY_SCOPE
        } else {
            CONTRACT_SCOPE
        }
    }

    /// Identity used when comparing desired and on-chain accounts.
    pub fn key(&self) -> String {
        normalize_address(&self.address)
    }

    pub fn record(&self) -> AccountRecord {
        AccountRecord {
            account_address: self.address.clone(),
            child_contract_scope: self.scope(),
        }
    }
}

/// Lower-cases EVM hex addresses so checksummed and plain spellings match.
///
/// Anything that is not a `0x`-prefixed 20 byte hex string (Solana base58 for
/// instance) is case-sensitive and returned untouched.
pub fn normalize_address(address: &str) -> String {
    let trimmed = address.trim();
    let is_hex = trimmed.len() == 42
        && (trimmed.starts_with("0x") || trimmed.starts_with("0X"))
        && trimmed[2..].chars().all(|c| c.is_ascii_hexdigit());

    if is_hex {
        trimmed.to_ascii_lowercase()
    } else {
        trimmed.to_string()
    }
}

/// Account as passed to the agreement contract.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountRecord {
    pub account_address: String,
    pub child_contract_scope: u8,
}

/// Chain as passed to `addChains`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChainRecord {
    pub asset_recovery_address: String,
    pub accounts: Vec<AccountRecord>,
    pub id: u64,
}

/// A chain entry as currently stored in the agreement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OnChainChain {
    pub id: u64,
    pub accounts: Vec<Account>,
}

/// Accounts grouped by chain name, in first-seen order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChainGroups {
    groups: Vec<(String, Vec<Account>)>,
}

impl ChainGroups {
    pub fn push(&mut self, chain: &str, account: Account) {
        match self.groups.iter_mut().find(|(name, _)| name == chain) {
            Some((_, accounts)) => accounts.push(account),
            None => self.groups.push((chain.to_string(), vec![account])),
        }
    }

    pub fn get(&self, chain: &str) -> Option<&[Account]> {
        self.groups
            .iter()
            .find(|(name, _)| name == chain)
            .map(|(_, accounts)| accounts.as_slice())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &[Account])> {
        self.groups
            .iter()
            .map(|(name, accounts)| (name.as_str(), accounts.as_slice()))
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.groups.iter().map(|(name, _)| name.as_str())
    }

    pub fn len(&self) -> usize {
        self.groups.len()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }
}

impl<'a> FromIterator<(&'a str, Account)> for ChainGroups {
    fn from_iter<I: IntoIterator<Item = (&'a str, Account)>>(iter: I) -> Self {
        let mut groups = Self::default();
        for (chain, account) in iter {
            groups.push(chain, account);
        }
        groups
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test_case("0xAbCdEf0000000000000000000000000000000001", "0xabcdef0000000000000000000000000000000001"; "checksummed hex")]
    #[test_case(" 0xabcdef0000000000000000000000000000000001 ", "0xabcdef0000000000000000000000000000000001"; "surrounding whitespace")]
    #[test_case("STTUVCMPuNbk21y1J6nqEGXSQ8HKvFmFBKnCvKHTrWn", "STTUVCMPuNbk21y1J6nqEGXSQ8HKvFmFBKnCvKHTrWn"; "base58 kept verbatim")]
    #[test_case("0xABC", "0xABC"; "short hex is not an address")]
    fn normalizes_addresses(input: &str, expected: &str) {
        assert_eq!(normalize_address(input), expected);
    }

    #[test]
    fn groups_keep_first_seen_order() {
        let groups: ChainGroups = [
            ("BASE", Account::new("0x1", false)),
            ("ETHEREUM", Account::new("0x2", true)),
            ("BASE", Account::new("0x3", false)),
        ]
        .into_iter()
        .collect();

        assert_eq!(groups.names().collect::<Vec<_>>(), ["BASE", "ETHEREUM"]);
        assert_eq!(
            groups.get("BASE").unwrap(),
            [Account::new("0x1", false), Account::new("0x3", false)]
        );
        assert_eq!(groups.get("ETHEREUM").unwrap()[0].scope(), FACTORY_SCOPE);
    }
}
