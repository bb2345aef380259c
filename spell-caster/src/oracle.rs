//! Packed oracle price slot.
//!
//! Warping the clock to the spell's cast time leaves oracle prices older than
//! their staleness limit. The price word packs `uint128 val` in the low bits
//! and a `uint32 age` right above it; bumping the age makes the price fresh
//! again without touching the value.

use alloy::primitives::U256;

use crate::error::SpellError;

const AGE_OFFSET: usize = 128;
const HIGH_OFFSET: usize = 160;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PackedPrice {
    pub value: u128,
    pub age: u32,
    /// Bits above the age, kept as they are.
    pub high: U256,
}

impl PackedPrice {
    pub fn unpack(word: U256) -> Self {
        let value = (word & U256::from(u128::MAX)).to::<u128>();
        let age = ((word >> AGE_OFFSET) & U256::from(u32::MAX)).to::<u32>();
        let high = word >> HIGH_OFFSET;
        Self { value, age, high }
    }

    pub fn pack(&self) -> U256 {
        (self.high << HIGH_OFFSET) | (U256::from(self.age) << AGE_OFFSET) | U256::from(self.value)
    }

    pub fn with_age(self, age: u64) -> Result<Self, SpellError> {
        let age = u32::try_from(age).map_err(|_| SpellError::AgeOverflow(age))?;
        Ok(Self { age, ..self })
    }
}
