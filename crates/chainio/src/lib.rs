//! `ChainIO` is a library for interacting with on-chain agent registries.

use alloy::{
    providers::{RootProvider, fillers::FillProvider, utils::JoinedRecommendedFillers},
    sol,
};
use alloy_primitives::{Address, Bytes, U256};
use alloy_sol_types::SolCall;
use eyre::{Result, WrapErr};

/// Alias to the default provider with all recommended fillers (read-only).
pub type DefaultProvider = FillProvider<JoinedRecommendedFillers, RootProvider>;

sol! {
    #[allow(missing_docs)]
    #[derive(Debug)]
    /// Enumerable ERC-721 views shared by the ERC-8004 identity registry and the BAP-578 NFA
    /// contract.
    interface IAgentRegistry {
        function totalSupply() external view returns (uint256);
        function ownerOf(uint256 tokenId) external view returns (address);
        function tokenURI(uint256 tokenId) external view returns (string);
    }
}

use IAgentRegistry::{ownerOfCall, tokenURICall, totalSupplyCall};

/// Call data for `totalSupply()`.
pub fn encode_total_supply() -> Bytes {
    totalSupplyCall {}.abi_encode().into()
}

/// Call data for `ownerOf(tokenId)`.
pub fn encode_owner_of(token_id: u64) -> Bytes {
    ownerOfCall { tokenId: U256::from(token_id) }.abi_encode().into()
}

/// Call data for `tokenURI(tokenId)`.
pub fn encode_token_uri(token_id: u64) -> Bytes {
    tokenURICall { tokenId: U256::from(token_id) }.abi_encode().into()
}

/// Decode a `totalSupply()` return, saturating at `u64::MAX`.
pub fn decode_total_supply(output: &[u8]) -> Result<u64> {
    let supply = totalSupplyCall::abi_decode_returns(output)
        .wrap_err("failed to decode totalSupply return")?;
    Ok(supply.saturating_to())
}

/// Decode an `ownerOf(uint256)` return.
pub fn decode_owner_of(output: &[u8]) -> Result<Address> {
    ownerOfCall::abi_decode_returns(output).wrap_err("failed to decode ownerOf return")
}

/// Decode a `tokenURI(uint256)` return.
pub fn decode_token_uri(output: &[u8]) -> Result<String> {
    tokenURICall::abi_decode_returns(output).wrap_err("failed to decode tokenURI return")
}

/// ABI-encoded single return values, used to script registry responses.
pub mod returns {
    use alloy_primitives::{Address, Bytes, U256};
    use alloy_sol_types::SolValue;

    /// Encoded `uint256`.
    pub fn uint(value: u64) -> Bytes {
        U256::from(value).abi_encode().into()
    }

    /// Encoded `address`.
    pub fn address(value: Address) -> Bytes {
        value.abi_encode().into()
    }

    /// Encoded dynamic `string`.
    pub fn string(value: &str) -> Bytes {
        value.abi_encode().into()
    }
}
