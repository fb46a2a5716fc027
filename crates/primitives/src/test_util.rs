//! Canned [`ChainDataProvider`] for pipeline tests.

use std::{
    collections::HashMap,
    sync::{
        Mutex,
        atomic::{AtomicU64, Ordering},
    },
    time::Duration,
};

use alloy_primitives::{Address, Bytes, U256};
use async_trait::async_trait;
use eyre::{Result, eyre};

use crate::provider::{
    ChainBlock, ChainDataProvider, ContractSource, ExplorerTransaction, TxHistoryQuery,
};

/// Provider answering from in-memory tables. Missing entries behave like an empty chain:
/// no block, zero balance, no code, unverified, no history, and reverting calls.
#[derive(Debug, Default)]
pub struct StaticProvider {
    latest: AtomicU64,
    blocks: HashMap<u64, ChainBlock>,
    failing_blocks: Vec<u64>,
    balances: HashMap<Address, U256>,
    bytecode: HashMap<Address, Bytes>,
    sources: HashMap<Address, ContractSource>,
    histories: HashMap<Address, Vec<ExplorerTransaction>>,
    metadata: HashMap<String, serde_json::Value>,
    calls: HashMap<(Address, Bytes), Bytes>,
    block_delay: Option<Duration>,
    block_requests: Mutex<Vec<u64>>,
    call_count: AtomicU64,
}

impl StaticProvider {
    #[allow(missing_docs)]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the chain head.
    pub fn with_latest(self, height: u64) -> Self {
        self.latest.store(height, Ordering::SeqCst);
        self
    }

    #[allow(missing_docs)]
    pub fn with_block(mut self, block: ChainBlock) -> Self {
        self.blocks.insert(block.number, block);
        self
    }

    /// Make fetching `height` fail.
    pub fn with_failing_block(mut self, height: u64) -> Self {
        self.failing_blocks.push(height);
        self
    }

    #[allow(missing_docs)]
    pub fn with_balance(mut self, address: Address, wei: U256) -> Self {
        self.balances.insert(address, wei);
        self
    }

    #[allow(missing_docs)]
    pub fn with_bytecode(mut self, address: Address, code: Bytes) -> Self {
        self.bytecode.insert(address, code);
        self
    }

    #[allow(missing_docs)]
    pub fn with_source(mut self, address: Address, source: ContractSource) -> Self {
        self.sources.insert(address, source);
        self
    }

    #[allow(missing_docs)]
    pub fn with_history(mut self, address: Address, txs: Vec<ExplorerTransaction>) -> Self {
        self.histories.insert(address, txs);
        self
    }

    #[allow(missing_docs)]
    pub fn with_metadata(mut self, uri: impl Into<String>, doc: serde_json::Value) -> Self {
        self.metadata.insert(uri.into(), doc);
        self
    }

    /// Answer `eth_call(address, data)` with `output`.
    pub fn with_call(mut self, address: Address, data: Bytes, output: Bytes) -> Self {
        self.calls.insert((address, data), output);
        self
    }

    /// Delay every block fetch, to keep a pass busy.
    pub fn with_block_delay(mut self, delay: Duration) -> Self {
        self.block_delay = Some(delay);
        self
    }

    /// Move the chain head.
    pub fn set_latest(&self, height: u64) {
        self.latest.store(height, Ordering::SeqCst);
    }

    /// Heights requested through [`ChainDataProvider::block_by_height`], in order.
    pub fn block_requests(&self) -> Vec<u64> {
        self.block_requests.lock().map(|r| r.clone()).unwrap_or_default()
    }

    /// Number of `eth_call`s served, including reverts.
    pub fn call_count(&self) -> u64 {
        self.call_count.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ChainDataProvider for StaticProvider {
    async fn latest_height(&self) -> Result<u64> {
        Ok(self.latest.load(Ordering::SeqCst))
    }

    async fn block_by_height(&self, height: u64) -> Result<Option<ChainBlock>> {
        if let Ok(mut requests) = self.block_requests.lock() {
            requests.push(height);
        }
        if let Some(delay) = self.block_delay {
            tokio::time::sleep(delay).await;
        }
        if self.failing_blocks.contains(&height) {
            return Err(eyre!("upstream unavailable for block {height}"));
        }
        Ok(self.blocks.get(&height).cloned())
    }

    async fn balance(&self, address: Address) -> Result<U256> {
        Ok(self.balances.get(&address).copied().unwrap_or_default())
    }

    async fn runtime_bytecode(&self, address: Address) -> Result<Bytes> {
        Ok(self.bytecode.get(&address).cloned().unwrap_or_default())
    }

    async fn verified_source(&self, address: Address) -> Result<Option<ContractSource>> {
        Ok(self.sources.get(&address).cloned())
    }

    async fn transaction_history(
        &self,
        address: Address,
        query: TxHistoryQuery,
    ) -> Result<Vec<ExplorerTransaction>> {
        let txs = self.histories.get(&address).cloned().unwrap_or_default();
        Ok(txs.into_iter().take(query.offset as usize).collect())
    }

    async fn fetch_offchain_metadata(&self, uri: &str) -> Result<Option<serde_json::Value>> {
        Ok(self.metadata.get(uri).cloned())
    }

    async fn call_contract(&self, address: Address, data: Bytes) -> Result<Bytes> {
        self.call_count.fetch_add(1, Ordering::SeqCst);
        self.calls
            .get(&(address, data))
            .cloned()
            .ok_or_else(|| eyre!("execution reverted"))
    }
}
