use alloy::{primitives::U256, sol};

use crate::state::{Account, AccountRecord, ChainRecord, OnChainChain};

sol! {
    #![sol(all_derives)]

    struct Contact {
        string name;
        string contact;
    }

    struct AccountEntry {
        string accountAddress;
        uint8 childContractScope;
    }

    struct ChainEntry {
        string assetRecoveryAddress;
        AccountEntry[] accounts;
        uint256 id;
    }

    struct BountyTerms {
        uint256 bountyPercentage;
        uint256 bountyCapUSD;
        bool retainable;
        uint8 identity;
        string diligenceRequirements;
    }

    struct AgreementDetailsV2 {
        string protocolName;
        Contact[] contactDetails;
        ChainEntry[] chains;
        BountyTerms bountyTerms;
        string agreementURI;
    }

    #[sol(rpc)]
    interface AgreementV2 {
        function getDetails() external view returns (AgreementDetailsV2 memory details);
        function addChains(ChainEntry[] memory chains) external;
        function setChains(uint256[] memory chainIds, ChainEntry[] memory chains) external;
        function removeChain(uint256 chainId) external;
        function addAccounts(uint256 chainId, AccountEntry[] memory accounts) external;
        function setAccounts(uint256 chainId, uint256[] memory accountIds, AccountEntry[] memory accounts) external;
        function removeAccount(uint256 chainId, uint256 accountId) external;
    }

    #[sol(rpc)]
    interface AgreementFactory {
        function create(AgreementDetailsV2 memory details, address owner) external returns (address agreementAddress);
    }
}

impl From<&AccountRecord> for AccountEntry {
    fn from(record: &AccountRecord) -> Self {
        Self {
            accountAddress: record.account_address.clone(),
            childContractScope: record.child_contract_scope,
        }
    }
}

impl From<&ChainRecord> for ChainEntry {
    fn from(record: &ChainRecord) -> Self {
        Self {
            assetRecoveryAddress: record.asset_recovery_address.clone(),
            accounts: record.accounts.iter().map(Into::into).collect(),
            id: U256::from(record.id),
        }
    }
}

impl TryFrom<ChainEntry> for OnChainChain {
    type Error = eyre::Error;

    fn try_from(entry: ChainEntry) -> Result<Self, Self::Error> {
        let id = u64::try_from(entry.id)
            .map_err(|_| eyre::eyre!("on-chain chain id {} does not fit in u64", entry.id))?;

        let accounts = entry
            .accounts
            .into_iter()
            .map(|account| Account::from_scope(account.accountAddress, account.childContractScope))
            .collect();
        Ok(Self { id, accounts })
    }
}
