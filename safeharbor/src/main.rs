//! Safe Harbor agreement maintenance.
//!
//! Compares the contract sheet with the on-chain Safe Harbor agreement and
//! prints the calldata that reconciles them. Nothing is sent on-chain.

use std::path::PathBuf;

use alloy::{primitives::Address, providers::ProviderBuilder};
use clap::{Parser, Subcommand, ValueEnum};
use tracing::{info, level_filters::LevelFilter, warn};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};
use url::Url;

use config::{
    AgreementTerms, ChainTable, AGREEMENT_ADDRESS, FACTORY_ADDRESS, OWNER_ADDRESS,
    SKY_CONTRACTS_CSV, SPARK_CONTRACTS_CSV,
};
use state::ChainGroups;

mod agreement;
mod bindings;
mod config;
mod diff;
mod error;
mod payload;
mod report;
mod sheet;
mod state;

#[derive(Debug, Parser)]
#[command(author, about = "Safe Harbor agreement payload generator", long_about = None)]
struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Compute the calls that bring the on-chain agreement in line with the contract sheet.
    Update {
        #[command(flatten)]
        sheet: SheetArgs,
        #[command(flatten)]
        rpc: RpcArgs,
        /// Write the ordered updates to this JSON file.
        #[arg(long, short, value_name = "FILE")]
        output: Option<PathBuf>,
    },
    /// Print the payloads that bootstrap a new agreement from the contract sheet.
    Deploy {
        #[command(flatten)]
        sheet: SheetArgs,
        /// Factory the agreement is created with.
        #[arg(long, default_value_t = FACTORY_ADDRESS)]
        factory: Address,
        /// Owner of the new agreement.
        #[arg(long, default_value_t = OWNER_ADDRESS)]
        owner: Address,
        /// Address of the created agreement, target of the `addChains` payload.
        #[arg(long, env = "AGREEMENT_ADDRESS", default_value_t = AGREEMENT_ADDRESS)]
        agreement: Address,
    },
    /// Print the current on-chain agreement state.
    State {
        #[command(flatten)]
        rpc: RpcArgs,
    },
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum Sheet {
    Sky,
    Spark,
}

#[derive(Debug, clap::Args)]
struct SheetArgs {
    /// Which tab of the contract spreadsheet to read.
    #[arg(long, value_enum, default_value_t = Sheet::Sky)]
    sheet: Sheet,
    /// CSV URL or local file, overrides `--sheet`.
    #[arg(long, value_name = "SOURCE")]
    csv: Option<String>,
    /// JSON chain table replacing the built-in one.
    #[arg(long, value_name = "FILE")]
    chains: Option<PathBuf>,
}

impl SheetArgs {
    fn source(&self) -> &str {
        match (&self.csv, self.sheet) {
            (Some(csv), _) => csv,
            (None, Sheet::Sky) => SKY_CONTRACTS_CSV,
            (None, Sheet::Spark) => SPARK_CONTRACTS_CSV,
        }
    }

    fn chain_table(&self) -> eyre::Result<ChainTable> {
        match &self.chains {
            Some(path) => ChainTable::load(path),
            None => Ok(ChainTable::default()),
        }
    }

    async fn desired_state(&self) -> eyre::Result<ChainGroups> {
        let source = self.source();
        info!(source, "Downloading contract sheet");
        let text = sheet::load(&reqwest::Client::new(), source).await?;
        let rows = sheet::parse_rows(&text)?;
        let desired = sheet::desired_state(&rows);
        info!(rows = rows.len(), chains = desired.len(), "Parsed contract sheet");
        if desired.is_empty() {
            warn!(source, "Contract sheet has no active contracts");
        }
        Ok(desired)
    }
}

#[derive(Debug, clap::Args)]
struct RpcArgs {
    /// Ethereum mainnet JSON-RPC endpoint.
    #[arg(long, env = "RPC_URL", value_name = "URL")]
    rpc_url: Url,
    /// The Safe Harbor agreement to read.
    #[arg(long, env = "AGREEMENT_ADDRESS", default_value_t = AGREEMENT_ADDRESS)]
    agreement: Address,
}

#[tokio::main]
async fn main() -> eyre::Result<()> {
    let _ = dotenvy::dotenv();

    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(
            EnvFilter::builder()
                .with_default_directive(LevelFilter::INFO.into())
                .from_env_lossy(),
        )
        .init();

    match Args::parse().command {
        Command::Update { sheet, rpc, output } => update(sheet, rpc, output).await?,
        Command::Deploy {
            sheet,
            factory,
            owner,
            agreement,
        } => deploy(sheet, factory, owner, agreement).await?,
        Command::State { rpc } => dump_state(rpc).await?,
    }

    Ok(())
}

async fn update(sheet: SheetArgs, rpc: RpcArgs, output: Option<PathBuf>) -> eyre::Result<()> {
    let table = sheet.chain_table()?;
    let desired = sheet.desired_state().await?;

    info!(agreement = %rpc.agreement, "Fetching on-chain state");
    let provider = ProviderBuilder::new().on_http(rpc.rpc_url);
    let details = agreement::fetch_details(&provider, rpc.agreement).await?;
    let current = agreement::on_chain_state(&details)?;

    println!("\nChanges to be made:");
    for line in report::describe(&table, &current, &desired) {
        println!("{line}");
    }

    let updates = payload::plan(&table, &current, &desired)?;

    println!("\nGenerated payload:");
    for (index, update) in updates.iter().enumerate() {
        println!("\nUpdate {}:", index + 1);
        println!("Function: {}", update.operation.function());
        println!(
            "Arguments: {}",
            serde_json::to_string_pretty(&update.operation.args())?
        );
        println!("Calldata: {}", update.calldata);
    }

    if let Some(path) = output {
        std::fs::write(&path, serde_json::to_string_pretty(&updates)?)?;
        info!(path = %path.display(), updates = updates.len(), "Updates saved");
    }

    info!(updates = updates.len(), "Payload generation completed successfully");
    Ok(())
}

async fn deploy(
    sheet: SheetArgs,
    factory: Address,
    owner: Address,
    agreement: Address,
) -> eyre::Result<()> {
    let table = sheet.chain_table()?;
    let desired = sheet.desired_state().await?;
    let terms = AgreementTerms::default();

    let payload =
        agreement::deployment_payload(&table, &terms, &desired, factory, agreement, owner)?;

    println!("\n1. Initial Contract Creation Payload:");
    println!("{}", serde_json::to_string_pretty(&payload.create_payload)?);
    println!("\n2. Add All Chains Payload:");
    println!("{}", serde_json::to_string_pretty(&payload.add_chains_payload)?);

    println!("\nConfiguration used:");
    println!("Protocol Name: {}", terms.protocol_name);
    println!("\nChains and Accounts:");
    for chain in &payload.chains {
        println!("\nChain ID: {}", chain.id);
        for account in &chain.accounts {
            println!(
                "  - {} (Factory: {})",
                account.account_address,
                account.child_contract_scope == state::FACTORY_SCOPE
            );
        }
    }

    Ok(())
}

async fn dump_state(rpc: RpcArgs) -> eyre::Result<()> {
    let provider = ProviderBuilder::new().on_http(rpc.rpc_url);
    let details = agreement::fetch_details(&provider, rpc.agreement).await?;

    println!("\nRegistry State:");
    let state = agreement::details_json(rpc.agreement, &details);
    println!("{}", serde_json::to_string_pretty(&state)?);

    Ok(())
}
