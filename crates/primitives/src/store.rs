//! Persistence seam of the sync pipeline.

use alloy_primitives::{Address, B256};
use async_trait::async_trait;
use eyre::{Report, Result, eyre};

use crate::{
    agent::{Agent, AgentProfile},
    records::{AgentEvent, AgentReceipt, BlockRecord, Permission, Snapshot, StoreStats, SyncState},
};

/// Marker carried by errors raised on duplicate inserts.
pub const DUPLICATE_MARKER: &str = "duplicate";

/// Error for an insert whose key already exists.
pub fn duplicate_error(what: &str, key: impl std::fmt::Display) -> Report {
    eyre!("{DUPLICATE_MARKER} {what}: {key}")
}

/// Whether the error reports a duplicate insert, which callers treat as success.
pub fn is_duplicate_error(err: &Report) -> bool {
    err.chain().any(|cause| cause.to_string().to_lowercase().contains(DUPLICATE_MARKER))
}

/// Record store with upsert-by-key semantics.
///
/// Blocks are keyed by height, agents by address and the sync state is a singleton. Writes
/// are last-writer-wins; event and receipt de-duplication is best effort.
#[async_trait]
pub trait AgentStore: Send + Sync {
    /// Insert or overwrite the block at `block.number`.
    async fn upsert_block(&self, block: BlockRecord) -> Result<()>;

    /// Insert or overwrite the agent, preserving counters and creation time.
    async fn upsert_agent(&self, profile: AgentProfile) -> Result<Agent>;

    #[allow(missing_docs)]
    async fn get_agent_by_address(&self, address: Address) -> Result<Option<Agent>>;

    /// Whether an event with this transaction hash was already recorded.
    async fn event_exists(&self, tx_hash: B256) -> Result<bool>;

    /// Record an event and bump the agent's event counter.
    async fn create_event(&self, event: AgentEvent) -> Result<()>;

    /// Record a receipt and bump the agent's receipt counter.
    async fn create_receipt(&self, receipt: AgentReceipt) -> Result<()>;

    #[allow(missing_docs)]
    async fn create_permission(&self, permission: Permission) -> Result<()>;

    #[allow(missing_docs)]
    async fn permissions_for_agent(&self, agent: Address) -> Result<Vec<Permission>>;

    /// Record a learning snapshot. Rejects roots that would make the agent's chain cyclic.
    async fn create_snapshot(&self, snapshot: Snapshot) -> Result<()>;

    #[allow(missing_docs)]
    async fn snapshots_for_agent(&self, agent: Address) -> Result<Vec<Snapshot>>;

    /// Full sync state, default when never written.
    async fn sync_state(&self) -> Result<SyncState>;

    /// Last height covered by a completed pass, `0` when never synced.
    async fn get_last_synced_height(&self) -> Result<u64> {
        Ok(self.sync_state().await?.last_synced_block)
    }

    /// Persist the resume cursor and mark the store live.
    async fn set_last_synced_height(&self, height: u64) -> Result<()>;

    /// Delete every record.
    async fn clear_all(&self) -> Result<()>;

    /// Aggregate counts.
    async fn stats(&self) -> Result<StoreStats>;
}
