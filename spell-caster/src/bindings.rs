use alloy::{
    primitives::{address, Address, B256},
    sol,
};

use crate::error::SpellError;

/// Sky/Maker chainlog on Ethereum mainnet.
pub const CHAINLOG_ADDRESS: Address = address!("dA0Ab1e0017DEbCd72Be8599041a2aa3bA7e740F");

/// Chainlog key of the governance chief.
pub const CHIEF_KEY: &str = "MCD_ADM";

sol! {
    #[sol(rpc)]
    interface Chainlog {
        function getAddress(bytes32 key) external view returns (address);
    }

    #[sol(rpc)]
    interface Chief {
        function hat() external view returns (address);
    }

    #[sol(rpc)]
    interface Spell {
        function description() external view returns (string memory);
        function schedule() external;
        function cast() external;
        function eta() external view returns (uint256);
        function nextCastTime() external view returns (uint256);
    }
}

/// Right-padded `bytes32` string, as produced by `formatBytes32String`.
pub fn bytes32_string(value: &str) -> Result<B256, SpellError> {
    if value.len() > 31 {
        return Err(SpellError::KeyTooLong(value.to_string()));
    }
    Ok(B256::right_padding_from(value.as_bytes()))
}
