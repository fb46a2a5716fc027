//! Response types of the nfascope operational endpoints.
//!
//! Kept in their own crate so monitoring tooling can deserialize them without pulling in the
//! indexer.

#![allow(missing_docs)]

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
}

/// Where the indexed data comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DataSource {
    /// At least one pass completed against the chain
    Live,
    None,
}

/// Totals per record kind.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordTotals {
    pub agents: u64,
    pub blocks: u64,
    pub events: u64,
    pub receipts: u64,
    pub snapshots: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncStatusResponse {
    pub last_synced_block: u64,
    pub last_sync_time: Option<DateTime<Utc>>,
    /// `None` when the chain head could not be fetched
    pub chain_head: Option<u64>,
    /// Blocks behind the head, saturating at zero
    pub lag: Option<u64>,
    pub source: DataSource,
    pub totals: RecordTotals,
    pub agent_types: BTreeMap<String, u64>,
    pub erc8004_registered: u64,
    pub learning_models: BTreeMap<String, u64>,
    pub chain_coverage: BTreeMap<String, u64>,
    pub trust_levels: BTreeMap<String, u64>,
}

/// Body of a failed request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}
