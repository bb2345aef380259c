//! On-chain agreement reads and the deployment payloads for a new agreement.

use alloy::{
    network::Network,
    primitives::{Address, Bytes},
    providers::Provider,
    sol_types::SolCall,
    transports::Transport,
};
use eyre::WrapErr;
use serde::Serialize;
use serde_json::{json, Value};

use crate::{
    bindings::{AgreementDetailsV2, AgreementFactory, AgreementV2, ChainEntry},
    config::{AgreementTerms, ChainTable},
    error::SafeHarborError,
    state::{Account, ChainGroups, ChainRecord, OnChainChain},
};

/// Reads the full agreement details.
pub async fn fetch_details<P, T, N>(
    provider: P,
    agreement: Address,
) -> eyre::Result<AgreementDetailsV2>
where
    P: Provider<T, N>,
    T: Transport + Clone,
    N: Network,
{
    let agreement = AgreementV2::new(agreement, provider);
    let details = agreement
        .getDetails()
        .call()
        .await
        .wrap_err_with(|| format!("failed to read details of agreement {}", agreement.address()))?
        .details;
    Ok(details)
}

/// The chains currently registered in the agreement, in storage order.
pub fn on_chain_state(details: &AgreementDetailsV2) -> eyre::Result<Vec<OnChainChain>> {
    details
        .chains
        .iter()
        .cloned()
        .map(OnChainChain::try_from)
        .collect()
}

/// JSON dump of the registry state.
pub fn details_json(agreement: Address, details: &AgreementDetailsV2) -> Value {
    let chains: Vec<Value> = details
        .chains
        .iter()
        .map(|chain| {
            let accounts: Vec<Value> = chain
                .accounts
                .iter()
                .map(|account| {
                    json!({
                        "accountAddress": account.accountAddress,
                        "childContractScope": account.childContractScope,
                    })
                })
                .collect();
            json!({
                "assetRecoveryAddress": chain.assetRecoveryAddress,
                "accounts": accounts,
                "id": chain.id,
            })
        })
        .collect();
    let contacts: Vec<Value> = details
        .contactDetails
        .iter()
        .map(|contact| json!({ "name": contact.name, "contact": contact.contact }))
        .collect();
    let terms = &details.bountyTerms;

    json!({
        "agreementAddress": agreement,
        "protocolName": details.protocolName,
        "contactDetails": contacts,
        "chains": chains,
        "bountyTerms": {
            "bountyPercentage": terms.bountyPercentage,
            "bountyCapUSD": terms.bountyCapUSD,
            "retainable": terms.retainable,
            "identity": terms.identity,
            "diligenceRequirements": terms.diligenceRequirements,
        },
        "agreementURI": details.agreementURI,
    })
}

/// A call to submit, with its target.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Payload {
    pub target: Address,
    pub calldata: Bytes,
}

/// Payloads that bootstrap a new agreement: an empty `create` on the factory,
/// then one `addChains` with every chain from the sheet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeploymentPayload {
    pub create_payload: Payload,
    pub add_chains_payload: Payload,
    #[serde(skip)]
    pub chains: Vec<ChainRecord>,
}

pub fn deployment_payload(
    table: &ChainTable,
    terms: &AgreementTerms,
    desired: &ChainGroups,
    factory: Address,
    agreement: Address,
    owner: Address,
) -> Result<DeploymentPayload, SafeHarborError> {
    let chains = desired
        .iter()
        .map(|(name, accounts)| {
            Ok(ChainRecord {
                asset_recovery_address: table.asset_recovery_address(name)?.to_string(),
                accounts: accounts.iter().map(Account::record).collect(),
                id: table.require_id(name)?,
            })
        })
        .collect::<Result<Vec<_>, SafeHarborError>>()?;

    let create = AgreementFactory::createCall {
        details: terms.empty_details(),
        owner,
    };
    let add_chains = AgreementV2::addChainsCall {
        chains: chains.iter().map(ChainEntry::from).collect(),
    };

    Ok(DeploymentPayload {
        create_payload: Payload {
            target: factory,
            calldata: create.abi_encode().into(),
        },
        add_chains_payload: Payload {
            target: agreement,
            calldata: add_chains.abi_encode().into(),
        },
        chains,
    })
}
