//! Per-block discovery of contract calls.

use std::sync::Arc;

use alloy_primitives::Address;
use eyre::Result;
use primitives::{
    AgentEvent, AgentProfile, AgentReceipt, AgentStore, BlockRecord, ChainBlock,
    ChainDataProvider, ChainTransaction, TxStatus, is_duplicate_error,
    records::{EVENT_KIND_TRANSACTION, RECEIPT_ACTION_CONTRACT_CALL},
    selectors::method_name_from_calldata,
    units::{format_value, gwei_from_wei},
};
use tracing::{debug, warn};

/// Bounds on the work done for a single block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WalkerLimits {
    /// Distinct contracts that get events recorded
    pub max_contracts_per_block: usize,
    /// Leading transactions of the block that are inspected
    pub max_txs_per_block: usize,
}

impl Default for WalkerLimits {
    fn default() -> Self {
        Self { max_contracts_per_block: 5, max_txs_per_block: 50 }
    }
}

impl From<&config::SyncOpts> for WalkerLimits {
    fn from(opts: &config::SyncOpts) -> Self {
        Self {
            max_contracts_per_block: opts.max_contracts_per_block,
            max_txs_per_block: opts.max_txs_per_block,
        }
    }
}

/// Result of walking one height.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BlockOutcome {
    /// Every called contract, in order of first appearance
    pub contract_addresses: Vec<Address>,
    /// Transactions in the block
    pub tx_count: usize,
}

/// Walks blocks, recording events and receipts against the contracts they call.
#[derive(Clone)]
pub struct BlockWalker {
    provider: Arc<dyn ChainDataProvider>,
    store: Arc<dyn AgentStore>,
    limits: WalkerLimits,
}

impl std::fmt::Debug for BlockWalker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BlockWalker").field("limits", &self.limits).finish_non_exhaustive()
    }
}

fn block_record(block: &ChainBlock, agent_count: u32) -> BlockRecord {
    BlockRecord {
        number: block.number,
        hash: block.hash,
        parent_hash: block.parent_hash,
        validator: block.miner,
        gas_used: block.gas_used,
        gas_limit: block.gas_limit,
        event_count: u32::try_from(block.transactions.len()).unwrap_or(u32::MAX),
        agent_count,
        timestamp: block.timestamp,
    }
}

impl BlockWalker {
    #[allow(missing_docs)]
    pub fn new(
        provider: Arc<dyn ChainDataProvider>,
        store: Arc<dyn AgentStore>,
        limits: WalkerLimits,
    ) -> Self {
        Self { provider, store, limits }
    }

    /// Process `height`. Safe to repeat: blocks are upserted and known transactions skipped.
    pub async fn process_block(&self, height: u64) -> Result<BlockOutcome> {
        let Some(block) = self.provider.block_by_height(height).await? else {
            debug!(block_number = height, "Block not available yet");
            return Ok(BlockOutcome::default());
        };

        self.store.upsert_block(block_record(&block, 0)).await?;

        let mut contracts: Vec<Address> = Vec::new();
        let mut contract_calls = 0u32;
        for to in block.transactions.iter().filter_map(ChainTransaction::called_contract) {
            contract_calls += 1;
            if !contracts.contains(&to) {
                contracts.push(to);
            }
        }

        let eligible = &contracts[..contracts.len().min(self.limits.max_contracts_per_block)];
        for tx in block.transactions.iter().take(self.limits.max_txs_per_block) {
            let Some(to) = tx.to.filter(|to| eligible.contains(to)) else {
                continue;
            };
            if let Err(e) = self.record_transaction(block.number, to, tx).await {
                if !is_duplicate_error(&e) {
                    warn!(block_number = block.number, tx_hash = %tx.hash, err = %e, "Failed to record transaction");
                }
            }
        }

        self.store.upsert_block(block_record(&block, contract_calls)).await?;

        Ok(BlockOutcome { contract_addresses: contracts, tx_count: block.transactions.len() })
    }

    async fn record_transaction(
        &self,
        block_number: u64,
        agent: Address,
        tx: &ChainTransaction,
    ) -> Result<()> {
        if self.store.event_exists(tx.hash).await? {
            return Ok(());
        }
        if self.store.get_agent_by_address(agent).await?.is_none() {
            self.store.upsert_agent(AgentProfile::placeholder(agent, tx.from)).await?;
        }

        let value = format_value(tx.value);
        self.store
            .create_event(AgentEvent {
                agent,
                kind: EVENT_KIND_TRANSACTION.to_owned(),
                tx_hash: tx.hash,
                block_number,
                from: tx.from,
                to: tx.to,
                value: value.clone(),
                gas_used: tx.gas,
                gas_price: gwei_from_wei(tx.gas_price),
                status: TxStatus::Confirmed,
                method: method_name_from_calldata(&tx.input),
                details: None,
            })
            .await?;

        let receipt = AgentReceipt {
            agent,
            action: RECEIPT_ACTION_CONTRACT_CALL.to_owned(),
            tx_hash: tx.hash,
            from: tx.from,
            to: tx.to.unwrap_or(tx.from),
            value,
            status: TxStatus::Confirmed,
            block_number,
            gas_used: tx.gas,
        };
        if let Err(e) = self.store.create_receipt(receipt).await {
            if !is_duplicate_error(&e) {
                warn!(block_number, tx_hash = %tx.hash, err = %e, "Failed to record receipt");
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy_primitives::{B256, Bytes, U256};
    use primitives::{AgentType, MemoryStore, test_util::StaticProvider};

    fn tx(n: u8, to: Option<Address>, input: &[u8]) -> ChainTransaction {
        ChainTransaction {
            hash: B256::repeat_byte(n),
            from: Address::repeat_byte(0xee),
            to,
            value: U256::from(10_000_000_000_000_000u128),
            gas: 21_000,
            gas_price: 3_000_000_000,
            input: Bytes::copy_from_slice(input),
        }
    }

    fn block(number: u64, transactions: Vec<ChainTransaction>) -> ChainBlock {
        ChainBlock {
            number,
            hash: B256::repeat_byte(0xb0),
            parent_hash: B256::repeat_byte(0xaf),
            miner: Address::repeat_byte(0x11),
            gas_used: 100_000,
            gas_limit: 140_000_000,
            timestamp: 1_700_000_000,
            transactions,
        }
    }

    fn walker(provider: StaticProvider, store: &MemoryStore, limits: WalkerLimits) -> BlockWalker {
        BlockWalker::new(Arc::new(provider), Arc::new(store.clone()), limits)
    }

    const TRANSFER: &[u8] = &[0xa9, 0x05, 0x9c, 0xbb, 0, 0];

    #[tokio::test]
    async fn missing_block_is_empty() {
        let store = MemoryStore::new();
        let outcome = walker(StaticProvider::new(), &store, WalkerLimits::default())
            .process_block(7)
            .await
            .unwrap();
        assert_eq!(outcome, BlockOutcome::default());
        assert!(store.blocks().is_empty());
    }

    #[tokio::test]
    async fn records_calls_and_placeholder_agents() {
        let contract = Address::repeat_byte(0xc1);
        let b = block(
            10,
            vec![
                tx(1, Some(contract), TRANSFER),
                tx(2, Some(Address::repeat_byte(0x99)), &[]),
                tx(3, None, &[0x60, 0x80]),
            ],
        );
        let store = MemoryStore::new();
        let outcome = walker(StaticProvider::new().with_block(b), &store, WalkerLimits::default())
            .process_block(10)
            .await
            .unwrap();

        assert_eq!(outcome.contract_addresses, vec![contract]);
        assert_eq!(outcome.tx_count, 3);

        let blocks = store.blocks();
        assert_eq!(blocks[0].agent_count, 1);
        assert_eq!(blocks[0].event_count, 3);

        let agent = store.get_agent_by_address(contract).await.unwrap().unwrap();
        assert_eq!(agent.name, "Contract 0xc1c1c1c1...");
        assert_eq!(agent.owner, Address::repeat_byte(0xee));
        assert_eq!(agent.agent_type, AgentType::JsonLight);

        let events = store.events();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].method, "transfer");
        assert_eq!(events[0].value, "0.010000 BNB");
        assert_eq!(events[0].gas_price, "3.00 Gwei");
        assert_eq!(store.receipts().len(), 1);
    }

    #[tokio::test]
    async fn contract_and_tx_caps_bound_the_work() {
        let txs: Vec<_> =
            (1..=8).map(|n| tx(n, Some(Address::repeat_byte(n)), TRANSFER)).collect();
        let store = MemoryStore::new();
        let limits = WalkerLimits { max_contracts_per_block: 3, max_txs_per_block: 2 };
        let outcome = walker(StaticProvider::new().with_block(block(5, txs)), &store, limits)
            .process_block(5)
            .await
            .unwrap();

        // discovery is not capped, recording is
        assert_eq!(outcome.contract_addresses.len(), 8);
        assert_eq!(store.events().len(), 2);
        assert_eq!(store.agents().len(), 2);
        assert_eq!(store.blocks()[0].agent_count, 8);
    }
}
