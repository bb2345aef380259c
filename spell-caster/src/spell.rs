use std::{
    marker::PhantomData,
    time::{SystemTime, UNIX_EPOCH},
};

use alloy::{
    network::{Ethereum, ReceiptResponse},
    primitives::{Address, TxHash, B256, U256},
    providers::{PendingTransactionBuilder, Provider},
    transports::Transport,
};
use eyre::WrapErr;
use serde_json::Value;
use tracing::{debug, error, info, warn};

use crate::{
    bindings::{bytes32_string, Chainlog, Chief, Spell, CHAINLOG_ADDRESS, CHIEF_KEY},
    error::SpellError,
    oracle::PackedPrice,
};

/// Storage slot of `hat` in the chief.
pub const CHIEF_HAT_SLOT: u64 = 12;

/// Gas for `schedule` and `cast`, high enough for any spell.
const GAS_LIMIT: u64 = 1_000_000_000;

/// What happened while casting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CastOutcome {
    pub scheduled: bool,
    pub cast: Option<TxHash>,
    /// Chain time after warping, in unix seconds.
    pub chain_time: u64,
}

pub fn unix_now() -> eyre::Result<u64> {
    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .wrap_err("system clock before unix epoch")?;
    Ok(now.as_secs())
}

/// Seconds to add to the chain clock so that `target` has passed, if any.
pub fn warp_delta(now: u64, target: u64) -> Option<u64> {
    (now < target).then(|| target - now + 1)
}

fn storage_key(index: u64) -> B256 {
    B256::from(U256::from(index).to_be_bytes::<32>())
}

async fn confirm<T>(pending: PendingTransactionBuilder<T, Ethereum>) -> eyre::Result<TxHash>
where
    T: Transport + Clone,
{
    let receipt = pending.get_receipt().await?;
    if !receipt.status() {
        eyre::bail!("transaction {} reverted", receipt.transaction_hash);
    }
    Ok(receipt.transaction_hash)
}

/// Drives a spell through schedule and cast on a simulation RPC.
pub struct Caster<P, T> {
    provider: P,
    spell: Address,
    from: Address,
    _phantom: PhantomData<T>,
}

impl<P, T> Caster<P, T>
where
    P: Provider<T, Ethereum>,
    T: Transport + Clone,
{
    pub fn new(provider: P, spell: Address, from: Address) -> Self {
        Self {
            provider,
            spell,
            from,
            _phantom: PhantomData,
        }
    }

    /// Overwrites a storage slot through the simulation RPC.
    pub async fn set_storage(&self, address: Address, slot: B256, value: B256) -> eyre::Result<()> {
        self.provider
            .raw_request::<_, Value>("tenderly_setStorageAt".into(), (address, slot, value))
            .await
            .wrap_err_with(|| format!("failed to set storage {slot} of {address}"))?;
        Ok(())
    }

    pub async fn chief(&self) -> eyre::Result<Address> {
        let chainlog = Chainlog::new(CHAINLOG_ADDRESS, &self.provider);
        let key = bytes32_string(CHIEF_KEY)?;
        let chief = chainlog.getAddress(key).call().await?._0;
        Ok(chief)
    }

    /// Makes the spell the chief's hat and checks that it stuck.
    pub async fn give_hat(&self, chief: Address) -> eyre::Result<()> {
        info!(%chief, "Overwriting the hat");
        let slot = storage_key(CHIEF_HAT_SLOT);
        self.set_storage(chief, slot, self.spell.into_word()).await?;

        info!("Checking the hat");
        let hat = Chief::new(chief, &self.provider).hat().call().await?._0;
        if hat != self.spell {
            return Err(SpellError::HatNotSet {
                spell: self.spell,
                hat,
            }
            .into());
        }
        Ok(())
    }

    pub async fn schedule(&self) -> eyre::Result<TxHash> {
        let spell = Spell::new(self.spell, &self.provider);
        let pending = spell
            .schedule()
            .from(self.from)
            .gas(GAS_LIMIT)
            .send()
            .await?;
        confirm(pending).await
    }

    pub async fn cast(&self) -> eyre::Result<TxHash> {
        let spell = Spell::new(self.spell, &self.provider);
        let pending = spell.cast().from(self.from).gas(GAS_LIMIT).send().await?;
        confirm(pending).await
    }

    /// Earliest time the spell can be cast. Spells without office hours only expose `eta`.
    pub async fn next_cast_time(&self) -> eyre::Result<u64> {
        let spell = Spell::new(self.spell, &self.provider);
        let time = match spell.nextCastTime().call().await {
            Ok(time) => time._0,
            Err(err) => {
                debug!(%err, "nextCastTime unavailable, falling back to eta");
                spell.eta().call().await?._0
            }
        };
        u64::try_from(time)
            .map_err(|_| eyre::eyre!("cast time {time} out of range"))
    }

    /// Moves the chain clock past `target` and returns the resulting chain time.
    pub async fn warp(&self, target: u64) -> eyre::Result<u64> {
        let now = unix_now()?;
        let Some(delta) = warp_delta(now, target) else {
            return Ok(now);
        };

        info!(target, delta, "Warping the time");
        self.provider
            .raw_request::<_, Value>("evm_increaseTime".into(), (U256::from(delta),))
            .await
            .wrap_err("failed to increase time")?;
        Ok(now + delta)
    }

    /// Id of the most recent simulated transaction.
    pub async fn latest_transaction(&self) -> eyre::Result<String> {
        let id = self
            .provider
            .raw_request::<_, String>("evm_getLatest".into(), ())
            .await
            .wrap_err("failed to read the latest transaction")?;
        Ok(id)
    }

    /// Sets the age of a packed oracle price so it is fresh at `age`.
    pub async fn refresh_oracle(
        &self,
        oracle: Address,
        slot: U256,
        age: u64,
    ) -> eyre::Result<PackedPrice> {
        let word = self.provider.get_storage_at(oracle, slot).await?;
        let price = PackedPrice::unpack(word).with_age(age)?;
        debug!(%oracle, %slot, old = %word, value = price.value, age, "Repacking oracle price");

        let key = B256::from(slot.to_be_bytes::<32>());
        let packed = B256::from(price.pack().to_be_bytes::<32>());
        self.set_storage(oracle, key, packed).await?;
        Ok(price)
    }

    /// Hat, schedule, warp and cast. Only a missing hat aborts.
    pub async fn run(&self) -> eyre::Result<CastOutcome> {
        let spell = Spell::new(self.spell, &self.provider);
        match spell.description().call().await {
            Ok(description) => {
                info!(spell = %self.spell, description = %description._0, "Casting spell")
            }
            Err(err) => warn!(spell = %self.spell, %err, "Could not read spell description"),
        }

        info!("Fetching the chief address from the chainlog");
        let chief = self.chief().await?;
        self.give_hat(chief).await?;

        info!("Scheduling spell");
        let scheduled = match self.schedule().await {
            Ok(tx) => {
                info!(%tx, "Spell scheduled");
                true
            }
            Err(err) => {
                warn!(%err, "Scheduling failed, the spell may already be scheduled");
                false
            }
        };

        info!("Fetching the time when the spell will be castable");
        let cast_time = self.next_cast_time().await?;
        let chain_time = self.warp(cast_time).await?;

        info!("Casting spell");
        let cast = match self.cast().await {
            Ok(tx) => {
                info!(%tx, "Successfully cast");
                Some(tx)
            }
            Err(err) => {
                error!(%err, "Casting failed");
                None
            }
        };

        Ok(CastOutcome {
            scheduled,
            cast,
            chain_time,
        })
    }
}
