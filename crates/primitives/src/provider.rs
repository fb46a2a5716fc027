//! The upstream data source consumed by the sync pipeline.
//!
//! Everything crossing this boundary is already decoded: the implementations parse
//! JSON-RPC and explorer payloads once, and the core only ever sees these types.

use alloy_primitives::{Address, B256, Bytes, U256};
use async_trait::async_trait;
use eyre::Result;
use serde::{Deserialize, Serialize};

/// A block with its full transactions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChainBlock {
    /// Block height
    pub number: u64,
    /// Block hash
    pub hash: B256,
    /// Parent block hash
    pub parent_hash: B256,
    /// Fee recipient
    pub miner: Address,
    /// Gas used by all transactions
    pub gas_used: u64,
    /// Block gas limit
    pub gas_limit: u64,
    /// Unix seconds
    pub timestamp: u64,
    /// Full transactions, in block order
    pub transactions: Vec<ChainTransaction>,
}

/// A transaction as included in a block.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChainTransaction {
    /// Transaction hash
    pub hash: B256,
    /// Sender
    pub from: Address,
    /// `None` for contract creations
    pub to: Option<Address>,
    /// Native value in wei
    pub value: U256,
    /// Gas limit of the transaction
    pub gas: u64,
    /// Gas price in wei
    pub gas_price: u128,
    /// Call data
    pub input: Bytes,
}

impl ChainTransaction {
    /// Recipient of a call carrying non-empty call data.
    pub fn called_contract(&self) -> Option<Address> {
        self.to.filter(|_| !self.input.is_empty())
    }
}

/// Verified source information published on the explorer.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContractSource {
    /// Flattened source, empty when unverified
    pub source_code: String,
    /// Contract name
    pub contract_name: String,
    /// Compiler version string
    pub compiler_version: String,
    /// Optimizer was enabled
    pub optimization_used: bool,
    /// Raw ABI JSON as published
    pub abi: String,
    /// SPDX license name
    pub license_type: String,
    /// Implementation behind a proxy, when the explorer knows it
    pub implementation: Option<Address>,
    /// The explorer flags the contract as a proxy
    pub is_proxy: bool,
}

/// A transaction from the explorer's per-address history.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExplorerTransaction {
    /// Transaction hash
    pub hash: B256,
    /// Inclusion height
    pub block_number: u64,
    /// Unix seconds
    pub timestamp: u64,
    /// Sender
    pub from: Address,
    /// `None` for contract creations
    pub to: Option<Address>,
    /// Native value in wei
    pub value: U256,
    /// Gas limit
    pub gas: u64,
    /// Gas consumed
    pub gas_used: u64,
    /// Gas price in wei
    pub gas_price: u128,
    /// Hex call data
    pub input: String,
    /// Execution reverted
    pub is_error: bool,
    /// `true` when the receipt status is success
    pub succeeded: bool,
    /// Decoded function signature, when the explorer knows it
    pub function_name: String,
    /// `0x`-prefixed selector
    pub method_id: String,
    /// Raw log payload when the explorer includes one
    pub logs: String,
}

/// Ordering of a transaction history page.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SortOrder {
    #[allow(missing_docs)]
    Asc,
    #[allow(missing_docs)]
    #[default]
    Desc,
}

impl SortOrder {
    /// Query parameter value.
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Asc => "asc",
            Self::Desc => "desc",
        }
    }
}

/// Page request for [`ChainDataProvider::transaction_history`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TxHistoryQuery {
    /// First height, inclusive
    pub start_block: u64,
    /// Last height, inclusive
    pub end_block: u64,
    /// 1-based page number
    pub page: u32,
    /// Page size
    pub offset: u32,
    /// Ordering by height
    pub sort: SortOrder,
}

impl Default for TxHistoryQuery {
    fn default() -> Self {
        Self { start_block: 0, end_block: 99_999_999, page: 1, offset: 50, sort: SortOrder::Desc }
    }
}

impl TxHistoryQuery {
    /// Newest `offset` transactions.
    pub fn latest(offset: u32) -> Self {
        Self { offset, ..Self::default() }
    }
}

/// Read access to the chain and its explorer.
///
/// Any method may fail transiently; callers pick their own fallback per call.
#[async_trait]
pub trait ChainDataProvider: Send + Sync {
    /// Current chain head.
    async fn latest_height(&self) -> Result<u64>;

    /// Block with full transactions, `None` if the node does not have it.
    async fn block_by_height(&self, height: u64) -> Result<Option<ChainBlock>>;

    /// Native balance in wei.
    async fn balance(&self, address: Address) -> Result<U256>;

    /// Deployed runtime bytecode, empty for accounts without code.
    async fn runtime_bytecode(&self, address: Address) -> Result<Bytes>;

    /// Verified source, `None` when the contract is not verified.
    async fn verified_source(&self, address: Address) -> Result<Option<ContractSource>>;

    /// One page of the address's transaction history.
    async fn transaction_history(
        &self,
        address: Address,
        query: TxHistoryQuery,
    ) -> Result<Vec<ExplorerTransaction>>;

    /// JSON document behind a token URI, `None` when unreachable or not JSON.
    async fn fetch_offchain_metadata(&self, uri: &str) -> Result<Option<serde_json::Value>>;

    /// Read-only `eth_call`. Reverts surface as errors.
    async fn call_contract(&self, address: Address, data: Bytes) -> Result<Bytes>;
}
