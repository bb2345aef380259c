//! Static lookup tables and agreement defaults.
//!
//! Nothing in here is global: the reconciliation functions receive a
//! [`ChainTable`] explicitly so alternate tables can be loaded with `--chains`.

use std::path::Path;

use alloy::primitives::{address, Address, U256};
use eyre::WrapErr;
use serde::Deserialize;

use crate::{
    bindings::{AgreementDetailsV2, BountyTerms, Contact},
    error::SafeHarborError,
};

/// The deployed Safe Harbor agreement owned by Sky.
pub const AGREEMENT_ADDRESS: Address = address!("A3E1b36D112a5cE365546F53Fa3af3e1310d6b5A");

/// The Safe Harbor agreement factory.
pub const FACTORY_ADDRESS: Address = address!("9d211CaC1ce390F676d1cB1D2Eb681410EC47E47");

/// Owner of newly created agreements.
pub const OWNER_ADDRESS: Address = address!("195a7d8610edd06e0C27c006b6970319133Cb19A");

/// "Sky Contracts" sheet export.
pub const SKY_CONTRACTS_CSV: &str = "https://docs.google.com/spreadsheets/d/1slHR9VbZOC3wp2ZQu7YbQEQh8N57ePfVvv0w35nz60Q/export?format=csv&gid=1121763694";

/// "Spark Contracts" sheet export.
pub const SPARK_CONTRACTS_CSV: &str = "https://docs.google.com/spreadsheets/d/1slHR9VbZOC3wp2ZQu7YbQEQh8N57ePfVvv0w35nz60Q/export?format=csv&gid=92820546";

const DILIGENCE_REQUIREMENTS: &str = "KYC and Sanctions Screening. Sky and Stars require all eligible whitehats to undergo Know Your Customer (KYC) verification and be screened against global sanctions lists, including OFAC, UK, and EU regulations. This ensures that bounty recipients meet legal and regulatory standards before qualifying for payment. The verification process shall be conducted by a trusted third-party provider at Sky and Stars discretion, and all data is deleted, if successful, within 30 days post-verification.";

/// One row of the chain table.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChainInfo {
    /// Symbolic name as used in the `Chain` column of the sheet.
    pub name: String,
    pub id: u64,
    /// Where recovered funds are returned on this chain, if the chain can be added.
    #[serde(default)]
    pub asset_recovery_address: Option<String>,
}

/// Chain id ↔ name mapping plus per-chain asset recovery addresses.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(transparent)]
pub struct ChainTable {
    chains: Vec<ChainInfo>,
}

impl ChainTable {
    pub fn new(chains: Vec<ChainInfo>) -> Self {
        Self { chains }
    }

    /// Reads a JSON array of [`ChainInfo`].
    pub fn load(path: &Path) -> eyre::Result<Self> {
        let raw = std::fs::read_to_string(path)
            .wrap_err_with(|| format!("failed to read chain table {}", path.display()))?;
        serde_json::from_str(&raw)
            .wrap_err_with(|| format!("failed to parse chain table {}", path.display()))
    }

    pub fn id_of(&self, name: &str) -> Option<u64> {
        self.chains
            .iter()
            .find(|chain| chain.name == name)
            .map(|chain| chain.id)
    }

    pub fn name_of(&self, id: u64) -> Option<&str> {
        self.chains
            .iter()
            .find(|chain| chain.id == id)
            .map(|chain| chain.name.as_str())
    }

    /// Name for log output. Unknown ids keep their id so they never collapse together.
    pub fn display_name(&self, id: u64) -> String {
        self.name_of(id)
            .map(str::to_string)
            .unwrap_or_else(|| format!("UNKNOWN({id})"))
    }

    pub fn require_id(&self, name: &str) -> Result<u64, SafeHarborError> {
        self.id_of(name)
            .ok_or_else(|| SafeHarborError::UnmappedChain(name.to_string()))
    }

    pub fn asset_recovery_address(&self, name: &str) -> Result<&str, SafeHarborError> {
        self.chains
            .iter()
            .find(|chain| chain.name == name)
            .and_then(|chain| chain.asset_recovery_address.as_deref())
            .ok_or_else(|| SafeHarborError::UnmappedChain(name.to_string()))
    }
}

impl Default for ChainTable {
    fn default() -> Self {
        let chain = |name: &str, id, recovery: Option<&str>| ChainInfo {
            name: name.to_string(),
            id,
            asset_recovery_address: recovery.map(str::to_string),
        };

        Self::new(vec![
            // PauseProxy
            chain("ETHEREUM", 1, Some("0xBE8E3e3618f7474F8cB1d074A26afFef007E98FB")),
            // GovRelay
            chain("BASE", 8453, Some("0xdD0BCc201C9E47c6F6eE68E4dB05b652Bb6aC255")),
            chain("GNOSIS", 100, None),
            // GovRelay
            chain("ARBITRUM", 42161, Some("0x10E6593CDda8c58a1d0f14C5164B376352a55f2F")),
            // TODO: replace with the Solana governance relay once it is deployed
            chain("SOLANA", 555, Some("STTUVCMPuNbk21y1J6nqEGXSQ8HKvFmFBKnCvKHTrWn")),
        ])
    }
}

/// Terms used when bootstrapping a new agreement through the factory.
#[derive(Debug, Clone)]
pub struct AgreementTerms {
    pub protocol_name: String,
    pub contact_name: String,
    pub contact: String,
    /// Bounty percentage with 6 decimals, `10_000_000` is 10%.
    pub bounty_percentage: U256,
    pub bounty_cap_usd: U256,
    pub retainable: bool,
    /// `IdentityRequirements` enum value, 2 is `Named`.
    pub identity: u8,
    pub diligence_requirements: String,
    pub agreement_uri: String,
}

impl Default for AgreementTerms {
    fn default() -> Self {
        Self {
            protocol_name: "Sky".to_string(),
            contact_name: "Contact Name".to_string(),
            contact: "Contact@Info".to_string(),
            bounty_percentage: U256::from(10_000_000u64),
            bounty_cap_usd: U256::ZERO,
            retainable: false,
            identity: 2,
            diligence_requirements: DILIGENCE_REQUIREMENTS.to_string(),
            agreement_uri: "Agreement URI".to_string(),
        }
    }
}

impl AgreementTerms {
    /// Agreement details without any chain, chains are added in a follow-up call.
    pub fn empty_details(&self) -> AgreementDetailsV2 {
        AgreementDetailsV2 {
            protocolName: self.protocol_name.clone(),
            contactDetails: vec![Contact {
                name: self.contact_name.clone(),
                contact: self.contact.clone(),
            }],
            chains: Vec::new(),
            bountyTerms: BountyTerms {
                bountyPercentage: self.bounty_percentage,
                bountyCapUSD: self.bounty_cap_usd,
                retainable: self.retainable,
                identity: self.identity,
                diligenceRequirements: self.diligence_requirements.clone(),
            },
            agreementURI: self.agreement_uri.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_table_maps_both_ways() {
        let table = ChainTable::default();
        assert_eq!(table.id_of("BASE"), Some(8453));
        assert_eq!(table.name_of(42161), Some("ARBITRUM"));
        assert_eq!(table.id_of("POLYGON"), None);
        assert_eq!(table.display_name(137), "UNKNOWN(137)");
    }

    #[test]
    fn chain_without_recovery_address_is_unmapped() {
        let table = ChainTable::default();
        assert_eq!(
            table.asset_recovery_address("GNOSIS"),
            Err(SafeHarborError::UnmappedChain("GNOSIS".to_string()))
        );
        assert!(table.asset_recovery_address("ETHEREUM").is_ok());
    }

    #[test]
    fn parses_json_table() {
        let table: ChainTable = serde_json::from_value(serde_json::json!([
            { "name": "ETHEREUM", "id": 1, "assetRecoveryAddress": "0x01" },
            { "name": "GNOSIS", "id": 100 }
        ]))
        .unwrap();

        assert_eq!(table.asset_recovery_address("ETHEREUM"), Ok("0x01"));
        assert_eq!(table.id_of("GNOSIS"), Some(100));
    }

    #[test]
    fn empty_details_have_no_chains() {
        let details = AgreementTerms::default().empty_details();
        assert!(details.chains.is_empty());
        assert_eq!(details.protocolName, "Sky");
        assert_eq!(details.bountyTerms.identity, 2);
    }
}
