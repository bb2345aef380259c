//! Casts a pending Sky governance spell on a Tenderly simulation and shares the result.

use alloy::{
    primitives::{Address, U256},
    providers::{Provider, ProviderBuilder},
};
use clap::Parser;
use eyre::OptionExt;
use tracing::{info, level_filters::LevelFilter};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};
use url::Url;

use spell::{unix_now, Caster};
use tenderly::{Mode, TenderlyClient, API_BASE};

mod bindings;
mod error;
mod oracle;
mod spell;
mod tenderly;
#[cfg(test)]
mod testing;

/// Chain id exposed by virtual testnets, distinct from mainnet so wallets never confuse them.
const DEFAULT_TESTNET_CHAIN_ID: u64 = 314_311;

#[derive(Debug, Parser)]
#[command(author, about = "Casts a spell on a Tenderly fork or virtual testnet", long_about = None)]
struct Args {
    /// Address of the spell to cast.
    #[arg(value_name = "SPELL")]
    spell: Address,
    /// Kind of simulation to create.
    #[arg(long, value_enum, default_value_t = Mode::Testnet)]
    mode: Mode,
    #[arg(long, env = "TENDERLY_API_URL", value_name = "URL", default_value = API_BASE)]
    tenderly_api_url: Url,
    #[arg(long, env = "TENDERLY_USER", value_name = "USER")]
    tenderly_user: String,
    #[arg(long, env = "TENDERLY_PROJECT", value_name = "PROJECT")]
    tenderly_project: String,
    #[arg(long, env = "TENDERLY_ACCESS_KEY", value_name = "KEY", hide_env_values = true)]
    tenderly_access_key: String,
    /// Network the simulation is forked from.
    #[arg(long, default_value_t = 1)]
    network_id: u64,
    /// Chain id of the virtual testnet.
    #[arg(long, default_value_t = DEFAULT_TESTNET_CHAIN_ID)]
    chain_id: u64,
    /// Sender of `schedule` and `cast`. Defaults to the first unlocked account of the simulation.
    #[arg(long, value_name = "ADDRESS")]
    from: Option<Address>,
    /// Oracle whose packed price age is refreshed after the time warp.
    #[arg(long, value_name = "ADDRESS")]
    oracle: Option<Address>,
    /// Storage slot of the packed `(uint128 value, uint32 age)` price.
    #[arg(long, value_name = "SLOT", default_value_t = U256::from(4))]
    oracle_slot: U256,
    /// Seconds added on top of the warped chain time for the refreshed age.
    #[arg(long, value_name = "SECONDS", default_value_t = 86_400)]
    oracle_extension: u64,
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

    let args = Args::parse();
    let tenderly = TenderlyClient::new(
        args.tenderly_api_url.clone(),
        args.tenderly_user.clone(),
        args.tenderly_project.clone(),
        args.tenderly_access_key.clone(),
    );

    let simulation = match args.mode {
        Mode::Fork => tenderly.create_fork(args.network_id).await?,
        Mode::Testnet => {
            let created = unix_now()?;
            let slug = format!("spell-{}-{created}", args.spell).to_lowercase();
            let display_name = format!("Spell {} ({created})", args.spell);
            tenderly
                .create_testnet(args.network_id, args.chain_id, &slug, &display_name)
                .await?
        }
    };
    info!(id = %simulation.id, url = %simulation.dashboard_url, "Private simulation created");

    let provider = ProviderBuilder::new().on_http(simulation.rpc_url.clone());
    let from = match args.from {
        Some(from) => from,
        None => provider
            .get_accounts()
            .await?
            .first()
            .copied()
            .ok_or_eyre("simulation has no unlocked account, pass --from")?,
    };

    let caster = Caster::new(&provider, args.spell, from);
    let outcome = caster.run().await?;

    if let Some(oracle) = args.oracle {
        let age = outcome.chain_time + args.oracle_extension;
        let price = caster.refresh_oracle(oracle, args.oracle_slot, age).await?;
        info!(%oracle, value = price.value, age = price.age, "Oracle price refreshed");
    }

    let url = match simulation.mode {
        Mode::Fork => {
            let transaction = caster.latest_transaction().await?;
            tenderly
                .share_fork_transaction(&simulation.id, &transaction)
                .await?
        }
        Mode::Testnet => tenderly.publish_testnet(&simulation.id).await?,
    };
    info!(
        %url,
        scheduled = outcome.scheduled,
        cast = outcome.cast.is_some(),
        "Publicly sharable simulation"
    );

    Ok(())
}
