//! In-memory [`AgentStore`] used for dry runs and tests.

use std::sync::Arc;

use alloy_primitives::{Address, B256};
use async_trait::async_trait;
use chrono::Utc;
use dashmap::{DashMap, DashSet};
use eyre::Result;
use tokio::sync::RwLock;

use crate::{
    agent::{Agent, AgentProfile},
    records::{AgentEvent, AgentReceipt, BlockRecord, Permission, Snapshot, StoreStats, SyncState},
    store::{AgentStore, duplicate_error},
};

/// Process-local store. Clones share the same data.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    inner: Arc<Inner>,
}

#[derive(Debug, Default)]
struct Inner {
    blocks: DashMap<u64, BlockRecord>,
    agents: DashMap<Address, Agent>,
    events: DashMap<(Address, B256), AgentEvent>,
    event_hashes: DashSet<B256>,
    receipts: DashMap<(Address, B256), AgentReceipt>,
    permissions: DashMap<Address, Vec<Permission>>,
    snapshots: DashMap<Address, Vec<Snapshot>>,
    sync_state: RwLock<SyncState>,
}

impl MemoryStore {
    /// Empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// All blocks ordered by height.
    pub fn blocks(&self) -> Vec<BlockRecord> {
        let mut blocks: Vec<_> = self.inner.blocks.iter().map(|b| b.value().clone()).collect();
        blocks.sort_by_key(|b| b.number);
        blocks
    }

    /// All agents ordered by address.
    pub fn agents(&self) -> Vec<Agent> {
        let mut agents: Vec<_> = self.inner.agents.iter().map(|a| a.value().clone()).collect();
        agents.sort_by_key(|a| a.address);
        agents
    }

    /// All events ordered by block, then hash.
    pub fn events(&self) -> Vec<AgentEvent> {
        let mut events: Vec<_> = self.inner.events.iter().map(|e| e.value().clone()).collect();
        events.sort_by_key(|e| (e.block_number, e.tx_hash));
        events
    }

    /// All receipts ordered by block, then hash.
    pub fn receipts(&self) -> Vec<AgentReceipt> {
        let mut receipts: Vec<_> = self.inner.receipts.iter().map(|r| r.value().clone()).collect();
        receipts.sort_by_key(|r| (r.block_number, r.tx_hash));
        receipts
    }
}

#[async_trait]
impl AgentStore for MemoryStore {
    async fn upsert_block(&self, block: BlockRecord) -> Result<()> {
        self.inner.blocks.insert(block.number, block);
        Ok(())
    }

    async fn upsert_agent(&self, profile: AgentProfile) -> Result<Agent> {
        let mut entry = self
            .inner
            .agents
            .entry(profile.address)
            .or_insert_with(|| Agent::new(profile.clone(), Utc::now()));
        entry.merge(profile);
        Ok(entry.value().clone())
    }

    async fn get_agent_by_address(&self, address: Address) -> Result<Option<Agent>> {
        Ok(self.inner.agents.get(&address).map(|a| a.value().clone()))
    }

    async fn event_exists(&self, tx_hash: B256) -> Result<bool> {
        Ok(self.inner.event_hashes.contains(&tx_hash))
    }

    async fn create_event(&self, event: AgentEvent) -> Result<()> {
        let key = (event.agent, event.tx_hash);
        if self.inner.events.contains_key(&key) {
            return Err(duplicate_error("event", event.tx_hash));
        }
        if let Some(mut agent) = self.inner.agents.get_mut(&event.agent) {
            agent.total_events += 1;
        }
        self.inner.event_hashes.insert(event.tx_hash);
        self.inner.events.insert(key, event);
        Ok(())
    }

    async fn create_receipt(&self, receipt: AgentReceipt) -> Result<()> {
        let key = (receipt.agent, receipt.tx_hash);
        if self.inner.receipts.contains_key(&key) {
            return Err(duplicate_error("receipt", receipt.tx_hash));
        }
        if let Some(mut agent) = self.inner.agents.get_mut(&receipt.agent) {
            agent.total_receipts += 1;
        }
        self.inner.receipts.insert(key, receipt);
        Ok(())
    }

    async fn create_permission(&self, permission: Permission) -> Result<()> {
        self.inner.permissions.entry(permission.agent).or_default().push(permission);
        Ok(())
    }

    async fn permissions_for_agent(&self, agent: Address) -> Result<Vec<Permission>> {
        Ok(self.inner.permissions.get(&agent).map(|p| p.value().clone()).unwrap_or_default())
    }

    async fn create_snapshot(&self, snapshot: Snapshot) -> Result<()> {
        let mut chain = self.inner.snapshots.entry(snapshot.agent).or_default();
        snapshot.check_acyclic(chain.iter().map(|s| &s.root))?;
        chain.push(snapshot);
        Ok(())
    }

    async fn snapshots_for_agent(&self, agent: Address) -> Result<Vec<Snapshot>> {
        Ok(self.inner.snapshots.get(&agent).map(|s| s.value().clone()).unwrap_or_default())
    }

    async fn sync_state(&self) -> Result<SyncState> {
        Ok(self.inner.sync_state.read().await.clone())
    }

    async fn set_last_synced_height(&self, height: u64) -> Result<()> {
        let mut state = self.inner.sync_state.write().await;
        *state = SyncState { last_synced_block: height, last_sync_time: Some(Utc::now()), is_live: true };
        Ok(())
    }

    async fn clear_all(&self) -> Result<()> {
        self.inner.blocks.clear();
        self.inner.agents.clear();
        self.inner.events.clear();
        self.inner.event_hashes.clear();
        self.inner.receipts.clear();
        self.inner.permissions.clear();
        self.inner.snapshots.clear();
        *self.inner.sync_state.write().await = SyncState::default();
        Ok(())
    }

    async fn stats(&self) -> Result<StoreStats> {
        let agents = self.agents();
        let mut stats = StoreStats {
            total_blocks: self.inner.blocks.len() as u64,
            total_events: self.inner.events.len() as u64,
            total_receipts: self.inner.receipts.len() as u64,
            total_snapshots: self.inner.snapshots.iter().map(|s| s.len() as u64).sum(),
            ..Default::default()
        };
        stats.add_agents(&agents);
        Ok(stats)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        records::{EVENT_KIND_TRANSACTION, TxStatus},
        store::is_duplicate_error,
    };

    fn event(agent: Address, hash: u8) -> AgentEvent {
        AgentEvent {
            agent,
            kind: EVENT_KIND_TRANSACTION.to_owned(),
            tx_hash: B256::repeat_byte(hash),
            block_number: 1,
            from: Address::repeat_byte(9),
            to: Some(agent),
            value: "0 BNB".to_owned(),
            gas_used: 21_000,
            gas_price: "1.00 Gwei".to_owned(),
            status: TxStatus::Confirmed,
            method: "transfer".to_owned(),
            details: None,
        }
    }

    #[tokio::test]
    async fn upsert_preserves_counters() {
        let store = MemoryStore::new();
        let addr = Address::repeat_byte(1);
        store.upsert_agent(AgentProfile::placeholder(addr, Address::ZERO)).await.unwrap();
        store.create_event(event(addr, 1)).await.unwrap();

        let mut profile = AgentProfile::placeholder(addr, Address::ZERO);
        profile.name = "Renamed".to_owned();
        let agent = store.upsert_agent(profile).await.unwrap();
        assert_eq!(agent.name, "Renamed");
        assert_eq!(agent.total_events, 1);
        assert_eq!(store.agents().len(), 1);
    }

    #[tokio::test]
    async fn duplicate_event_is_rejected() {
        let store = MemoryStore::new();
        let addr = Address::repeat_byte(1);
        store.create_event(event(addr, 1)).await.unwrap();
        let err = store.create_event(event(addr, 1)).await.unwrap_err();
        assert!(is_duplicate_error(&err));
        assert!(store.event_exists(B256::repeat_byte(1)).await.unwrap());
        assert!(!store.event_exists(B256::repeat_byte(2)).await.unwrap());
    }

    #[tokio::test]
    async fn cursor_round_trip_and_clear() {
        let store = MemoryStore::new();
        assert_eq!(store.get_last_synced_height().await.unwrap(), 0);
        store.set_last_synced_height(42).await.unwrap();
        let state = store.sync_state().await.unwrap();
        assert_eq!(state.last_synced_block, 42);
        assert!(state.is_live);

        store.clear_all().await.unwrap();
        assert_eq!(store.get_last_synced_height().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn snapshot_cycles_are_rejected() {
        let store = MemoryStore::new();
        let agent = Address::repeat_byte(1);
        let snap = |root: u8, parent: Option<u8>| Snapshot {
            agent,
            root: B256::repeat_byte(root),
            parent: parent.map(B256::repeat_byte),
            size: 10,
            block_number: 1,
            metadata: None,
            created_at: Utc::now(),
        };
        store.create_snapshot(snap(1, None)).await.unwrap();
        store.create_snapshot(snap(2, Some(1))).await.unwrap();
        assert!(store.create_snapshot(snap(1, Some(2))).await.is_err());
        assert_eq!(store.snapshots_for_agent(agent).await.unwrap().len(), 2);
        assert_eq!(store.stats().await.unwrap().total_snapshots, 2);
    }
}
