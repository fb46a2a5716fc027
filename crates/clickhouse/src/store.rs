//! [`AgentStore`] backed by `ClickHouse`.

use std::sync::{
    Arc,
    atomic::{AtomicU64, Ordering},
};

use alloy_primitives::{Address, B256};
use async_trait::async_trait;
use chrono::Utc;
use eyre::Result;
use primitives::{
    Agent, AgentEvent, AgentProfile, AgentReceipt, AgentStore, BlockRecord, Permission, Snapshot,
    StoreStats, SyncState, store::duplicate_error,
};
use url::Url;

use crate::{
    conversions::from_millis,
    models::{AgentRow, BlockRow, EventRow, PermissionRow, ReceiptRow, SnapshotRow, SyncStateRow},
    reader::ClickhouseReader,
    types::AddressBytes,
    writer::ClickhouseWriter,
};

/// Persistent store. Upserts rely on `ReplacingMergeTree` and reads use `FINAL`.
#[derive(Clone, Debug)]
pub struct ClickhouseStore {
    writer: ClickhouseWriter,
    reader: ClickhouseReader,
    last_version: Arc<AtomicU64>,
}

impl ClickhouseStore {
    /// Create a new store. Nothing is sent until [`Self::init`] or the first write.
    pub fn new(url: Url, db_name: String, username: String, password: String) -> Result<Self> {
        let writer =
            ClickhouseWriter::new(url.clone(), db_name.clone(), username.clone(), password.clone())?;
        let reader = ClickhouseReader::new(url, db_name, username, password)?;
        Ok(Self { writer, reader, last_version: Arc::new(AtomicU64::new(0)) })
    }

    /// Create the database and tables, dropping existing tables first when `reset` is set.
    pub async fn init(&self, reset: bool) -> Result<()> {
        self.writer.init_db(reset).await
    }

    /// Strictly increasing row version, based on wall-clock micros.
    fn next_version(&self) -> u64 {
        let now = u64::try_from(Utc::now().timestamp_micros()).unwrap_or_default();
        let mut current = self.last_version.load(Ordering::Relaxed);
        loop {
            let next = now.max(current + 1);
            match self.last_version.compare_exchange_weak(
                current,
                next,
                Ordering::AcqRel,
                Ordering::Relaxed,
            ) {
                Ok(_) => return next,
                Err(actual) => current = actual,
            }
        }
    }

    async fn load_agent(&self, row: AgentRow) -> Result<Agent> {
        let (events, receipts) = self.reader.agent_counters(row.address).await?;
        row.into_agent(events, receipts)
    }
}

#[async_trait]
impl AgentStore for ClickhouseStore {
    async fn upsert_block(&self, block: BlockRecord) -> Result<()> {
        self.writer.insert_block(&BlockRow::from_record(&block, self.next_version())).await
    }

    async fn upsert_agent(&self, profile: AgentProfile) -> Result<Agent> {
        let key = AddressBytes::from(profile.address);
        let created_at = match self.reader.get_agent(key).await? {
            Some(existing) => from_millis(existing.created_at_ms),
            None => Utc::now(),
        };
        let row = AgentRow::from_profile(&profile, created_at, self.next_version());
        self.writer.insert_agent(&row).await?;
        self.load_agent(row).await
    }

    async fn get_agent_by_address(&self, address: Address) -> Result<Option<Agent>> {
        match self.reader.get_agent(address.into()).await? {
            Some(row) => Ok(Some(self.load_agent(row).await?)),
            None => Ok(None),
        }
    }

    async fn event_exists(&self, tx_hash: B256) -> Result<bool> {
        self.reader.event_exists(tx_hash.into()).await
    }

    async fn create_event(&self, event: AgentEvent) -> Result<()> {
        if self.reader.agent_event_exists(event.agent.into(), event.tx_hash.into()).await? {
            return Err(duplicate_error("event", event.tx_hash));
        }
        self.writer.insert_event(&EventRow::from_event(&event, self.next_version())).await
    }

    async fn create_receipt(&self, receipt: AgentReceipt) -> Result<()> {
        if self.reader.agent_receipt_exists(receipt.agent.into(), receipt.tx_hash.into()).await? {
            return Err(duplicate_error("receipt", receipt.tx_hash));
        }
        self.writer.insert_receipt(&ReceiptRow::from_receipt(&receipt, self.next_version())).await
    }

    async fn create_permission(&self, permission: Permission) -> Result<()> {
        let row = PermissionRow::from_permission(&permission, self.next_version());
        self.writer.insert_permission(&row).await
    }

    async fn permissions_for_agent(&self, agent: Address) -> Result<Vec<Permission>> {
        let rows = self.reader.get_permissions(agent.into()).await?;
        Ok(rows.into_iter().map(Into::into).collect())
    }

    async fn create_snapshot(&self, snapshot: Snapshot) -> Result<()> {
        let existing = self.reader.get_snapshots(snapshot.agent.into()).await?;
        let roots: Vec<B256> = existing.iter().map(|row| B256::from(row.root)).collect();
        snapshot.check_acyclic(&roots)?;
        self.writer.insert_snapshot(&SnapshotRow::from_snapshot(&snapshot, self.next_version())).await
    }

    async fn snapshots_for_agent(&self, agent: Address) -> Result<Vec<Snapshot>> {
        let rows = self.reader.get_snapshots(agent.into()).await?;
        rows.into_iter().map(Snapshot::try_from).collect()
    }

    async fn sync_state(&self) -> Result<SyncState> {
        Ok(self.reader.get_sync_state().await?.map(Into::into).unwrap_or_default())
    }

    async fn set_last_synced_height(&self, height: u64) -> Result<()> {
        let state =
            SyncState { last_synced_block: height, last_sync_time: Some(Utc::now()), is_live: true };
        self.writer.insert_sync_state(&SyncStateRow::from_state(&state, self.next_version())).await
    }

    async fn clear_all(&self) -> Result<()> {
        self.writer.truncate_all().await
    }

    async fn stats(&self) -> Result<StoreStats> {
        let mut stats = StoreStats {
            total_blocks: self.reader.count_rows("blocks").await?,
            total_events: self.reader.count_rows("agent_events").await?,
            total_receipts: self.reader.count_rows("agent_receipts").await?,
            total_snapshots: self.reader.count_rows("snapshots").await?,
            ..Default::default()
        };
        let agents = self
            .reader
            .get_agents()
            .await?
            .into_iter()
            .map(|row| row.into_agent(0, 0))
            .collect::<Result<Vec<_>>>()?;
        stats.add_agents(&agents);
        Ok(stats)
    }
}
