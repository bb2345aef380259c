use crate::{
    config::ChainTable,
    diff::find_differences,
    state::{Account, ChainGroups, OnChainChain},
};

fn factory_note(account: &Account) -> &'static str {
    if account.factory {
        " (Factory)"
    } else {
        ""
    }
}

/// Human readable summary of what the update payload changes.
///
/// Chains whose sheet name is not in the table are reported by name and treated
/// as missing on-chain, the payload builder rejects them later.
pub fn describe(
    table: &ChainTable,
    current: &[OnChainChain],
    desired: &ChainGroups,
) -> Vec<String> {
    let mut lines = Vec::new();

    for (name, accounts) in desired.iter() {
        let on_chain = table
            .id_of(name)
            .and_then(|id| current.iter().find(|chain| chain.id == id));
        let Some(chain) = on_chain else {
            lines.push(format!(
                "Add chain {name} with {} accounts:",
                accounts.len()
            ));
            for account in accounts {
                lines.push(format!(
                    "  - Add {}{}",
                    account.address,
                    factory_note(account)
                ));
            }
            continue;
        };

        let current_keys: Vec<String> = chain.accounts.iter().map(Account::key).collect();
        let desired_keys: Vec<String> = accounts.iter().map(Account::key).collect();
        let diff = find_differences(&current_keys, &desired_keys);
        if diff.is_empty() {
            continue;
        }

        for key in &diff.to_add {
            if let Some(account) = accounts.iter().find(|account| &account.key() == key) {
                lines.push(format!(
                    "Add {}{} to {name}",
                    account.address,
                    factory_note(account)
                ));
            }
        }
        for key in &diff.to_remove {
            if let Some(account) = chain.accounts.iter().find(|account| &account.key() == key) {
                lines.push(format!("Remove {} from {name}", account.address));
            }
        }
    }

    for chain in current {
        let name = table.display_name(chain.id);
        if desired.get(&name).is_none() {
            lines.push(format!(
                "Remove chain {name} with {} accounts",
                chain.accounts.len()
            ));
        }
    }

    lines
}
