use clickhouse::Row;
use serde::{Deserialize, Serialize};

use crate::types::{AddressBytes, HashBytes};

/// Block row
#[derive(Debug, Clone, Row, Serialize, Deserialize, PartialEq, Eq)]
pub struct BlockRow {
    pub block_number: u64,
    pub block_hash: HashBytes,
    pub parent_hash: HashBytes,
    pub validator: AddressBytes,
    pub gas_used: u64,
    pub gas_limit: u64,
    pub event_count: u32,
    pub agent_count: u32,
    pub block_ts: u64,
    pub version: u64,
}

/// Agent row. Counters are derived from the event and receipt tables on read.
#[derive(Debug, Clone, Row, Serialize, Deserialize, PartialEq, Eq)]
pub struct AgentRow {
    pub address: AddressBytes,
    pub name: String,
    pub description: String,
    pub owner: AddressBytes,
    pub status: String,
    pub agent_version: String,
    pub logic_address: Option<AddressBytes>,
    pub metadata_uri: Option<String>,
    pub learning_root: Option<HashBytes>,
    pub compiler: Option<String>,
    pub license: Option<String>,
    pub verified: bool,
    pub balance: Option<String>,
    pub agent_type: String,
    pub erc8004_id: Option<String>,
    pub learning_model: Option<String>,
    pub chain_support: Vec<String>,
    pub mint_fee: Option<String>,
    /// Unix millis of the first insert
    pub created_at_ms: u64,
    pub version: u64,
}

/// Agent event row
#[derive(Debug, Clone, Row, Serialize, Deserialize, PartialEq, Eq)]
pub struct EventRow {
    pub agent: AddressBytes,
    pub kind: String,
    pub tx_hash: HashBytes,
    pub block_number: u64,
    pub sender: AddressBytes,
    pub recipient: Option<AddressBytes>,
    pub value: String,
    pub gas_used: u64,
    pub gas_price: String,
    pub status: String,
    pub method: String,
    /// JSON text
    pub details: Option<String>,
    pub version: u64,
}

/// Agent receipt row
#[derive(Debug, Clone, Row, Serialize, Deserialize, PartialEq, Eq)]
pub struct ReceiptRow {
    pub agent: AddressBytes,
    pub action: String,
    pub tx_hash: HashBytes,
    pub sender: AddressBytes,
    pub recipient: AddressBytes,
    pub value: String,
    pub status: String,
    pub block_number: u64,
    pub gas_used: u64,
    pub version: u64,
}

/// Permission row
#[derive(Debug, Clone, Row, Serialize, Deserialize, PartialEq, Eq)]
pub struct PermissionRow {
    pub agent: AddressBytes,
    pub name: String,
    pub grantee: AddressBytes,
    pub scope: String,
    pub active: bool,
    pub granted_at_ms: u64,
    pub version: u64,
}

/// Learning snapshot row
#[derive(Debug, Clone, Row, Serialize, Deserialize, PartialEq, Eq)]
pub struct SnapshotRow {
    pub agent: AddressBytes,
    pub root: HashBytes,
    pub parent: Option<HashBytes>,
    pub size: u64,
    pub block_number: u64,
    /// JSON text
    pub metadata: Option<String>,
    pub created_at_ms: u64,
    pub version: u64,
}

/// Singleton sync cursor row
#[derive(Debug, Clone, Row, Serialize, Deserialize, PartialEq, Eq)]
pub struct SyncStateRow {
    /// Always [`SYNC_STATE_ID`]
    pub id: u8,
    pub last_synced_block: u64,
    pub last_sync_ms: Option<u64>,
    pub is_live: bool,
    pub version: u64,
}

/// Key of the only sync state row.
pub const SYNC_STATE_ID: u8 = 1;

/// Single `count()` column.
#[derive(Debug, Clone, Copy, Row, Serialize, Deserialize, PartialEq, Eq)]
pub struct CountRow {
    pub count: u64,
}
