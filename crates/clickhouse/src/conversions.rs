//! Conversions between stored rows and pipeline records.

use chrono::{DateTime, TimeZone, Utc};
use eyre::{Result, WrapErr};
use primitives::{
    Agent, AgentEvent, AgentProfile, AgentReceipt, BlockRecord, Permission, Snapshot, SyncState,
    TxStatus,
};

use crate::models::{
    AgentRow, BlockRow, EventRow, PermissionRow, ReceiptRow, SYNC_STATE_ID, SnapshotRow,
    SyncStateRow,
};

/// Unix millis, clamped at zero.
pub fn to_millis(ts: DateTime<Utc>) -> u64 {
    u64::try_from(ts.timestamp_millis()).unwrap_or_default()
}

/// Inverse of [`to_millis`], epoch for out-of-range values.
pub fn from_millis(ms: u64) -> DateTime<Utc> {
    i64::try_from(ms)
        .ok()
        .and_then(|ms| Utc.timestamp_millis_opt(ms).single())
        .unwrap_or_default()
}

fn json_text(value: Option<&serde_json::Value>) -> Option<String> {
    value.map(serde_json::Value::to_string)
}

fn parse_json(text: Option<String>) -> Result<Option<serde_json::Value>> {
    text.map(|t| serde_json::from_str(&t).wrap_err("stored JSON column is malformed")).transpose()
}

impl BlockRow {
    /// Row for `block` at `version`.
    pub fn from_record(block: &BlockRecord, version: u64) -> Self {
        Self {
            block_number: block.number,
            block_hash: block.hash.into(),
            parent_hash: block.parent_hash.into(),
            validator: block.validator.into(),
            gas_used: block.gas_used,
            gas_limit: block.gas_limit,
            event_count: block.event_count,
            agent_count: block.agent_count,
            block_ts: block.timestamp,
            version,
        }
    }
}

impl From<BlockRow> for BlockRecord {
    fn from(row: BlockRow) -> Self {
        Self {
            number: row.block_number,
            hash: row.block_hash.into(),
            parent_hash: row.parent_hash.into(),
            validator: row.validator.into(),
            gas_used: row.gas_used,
            gas_limit: row.gas_limit,
            event_count: row.event_count,
            agent_count: row.agent_count,
            timestamp: row.block_ts,
        }
    }
}

impl AgentRow {
    /// Row for `profile`, first seen at `created_at`.
    pub fn from_profile(profile: &AgentProfile, created_at: DateTime<Utc>, version: u64) -> Self {
        Self {
            address: profile.address.into(),
            name: profile.name.clone(),
            description: profile.description.clone(),
            owner: profile.owner.into(),
            status: profile.status.as_str().to_owned(),
            agent_version: profile.version.clone(),
            logic_address: profile.logic_address.map(Into::into),
            metadata_uri: profile.metadata_uri.clone(),
            learning_root: profile.learning_root.map(Into::into),
            compiler: profile.compiler.clone(),
            license: profile.license.clone(),
            verified: profile.verified,
            balance: profile.balance.clone(),
            agent_type: profile.agent_type.as_str().to_owned(),
            erc8004_id: profile.erc8004_id.clone(),
            learning_model: profile.learning_model.map(|m| m.as_str().to_owned()),
            chain_support: profile.chain_support.clone(),
            mint_fee: profile.mint_fee.clone(),
            created_at_ms: to_millis(created_at),
            version,
        }
    }

    /// Rebuild the agent with counters read from the event and receipt tables.
    pub fn into_agent(self, total_events: u64, total_receipts: u64) -> Result<Agent> {
        let profile = AgentProfile {
            address: self.address.into(),
            name: self.name,
            description: self.description,
            owner: self.owner.into(),
            status: self.status.parse()?,
            version: self.agent_version,
            logic_address: self.logic_address.map(Into::into),
            metadata_uri: self.metadata_uri,
            learning_root: self.learning_root.map(Into::into),
            compiler: self.compiler,
            license: self.license,
            verified: self.verified,
            balance: self.balance,
            agent_type: self.agent_type.parse()?,
            erc8004_id: self.erc8004_id,
            learning_model: self.learning_model.map(|m| m.parse()).transpose()?,
            chain_support: self.chain_support,
            mint_fee: self.mint_fee,
        };
        Ok(Agent { profile, total_events, total_receipts, created_at: from_millis(self.created_at_ms) })
    }
}

impl EventRow {
    #[allow(missing_docs)]
    pub fn from_event(event: &AgentEvent, version: u64) -> Self {
        Self {
            agent: event.agent.into(),
            kind: event.kind.clone(),
            tx_hash: event.tx_hash.into(),
            block_number: event.block_number,
            sender: event.from.into(),
            recipient: event.to.map(Into::into),
            value: event.value.clone(),
            gas_used: event.gas_used,
            gas_price: event.gas_price.clone(),
            status: event.status.as_str().to_owned(),
            method: event.method.clone(),
            details: json_text(event.details.as_ref()),
            version,
        }
    }
}

impl TryFrom<EventRow> for AgentEvent {
    type Error = eyre::Report;

    fn try_from(row: EventRow) -> Result<Self> {
        Ok(Self {
            agent: row.agent.into(),
            kind: row.kind,
            tx_hash: row.tx_hash.into(),
            block_number: row.block_number,
            from: row.sender.into(),
            to: row.recipient.map(Into::into),
            value: row.value,
            gas_used: row.gas_used,
            gas_price: row.gas_price,
            status: TxStatus::from_str_lossy(&row.status),
            method: row.method,
            details: parse_json(row.details)?,
        })
    }
}

impl ReceiptRow {
    #[allow(missing_docs)]
    pub fn from_receipt(receipt: &AgentReceipt, version: u64) -> Self {
        Self {
            agent: receipt.agent.into(),
            action: receipt.action.clone(),
            tx_hash: receipt.tx_hash.into(),
            sender: receipt.from.into(),
            recipient: receipt.to.into(),
            value: receipt.value.clone(),
            status: receipt.status.as_str().to_owned(),
            block_number: receipt.block_number,
            gas_used: receipt.gas_used,
            version,
        }
    }
}

impl PermissionRow {
    #[allow(missing_docs)]
    pub fn from_permission(permission: &Permission, version: u64) -> Self {
        Self {
            agent: permission.agent.into(),
            name: permission.name.clone(),
            grantee: permission.grantee.into(),
            scope: permission.scope.clone(),
            active: permission.active,
            granted_at_ms: to_millis(permission.granted_at),
            version,
        }
    }
}

impl From<PermissionRow> for Permission {
    fn from(row: PermissionRow) -> Self {
        Self {
            agent: row.agent.into(),
            name: row.name,
            grantee: row.grantee.into(),
            scope: row.scope,
            active: row.active,
            granted_at: from_millis(row.granted_at_ms),
        }
    }
}

impl SnapshotRow {
    #[allow(missing_docs)]
    pub fn from_snapshot(snapshot: &Snapshot, version: u64) -> Self {
        Self {
            agent: snapshot.agent.into(),
            root: snapshot.root.into(),
            parent: snapshot.parent.map(Into::into),
            size: snapshot.size,
            block_number: snapshot.block_number,
            metadata: json_text(snapshot.metadata.as_ref()),
            created_at_ms: to_millis(snapshot.created_at),
            version,
        }
    }
}

impl TryFrom<SnapshotRow> for Snapshot {
    type Error = eyre::Report;

    fn try_from(row: SnapshotRow) -> Result<Self> {
        Ok(Self {
            agent: row.agent.into(),
            root: row.root.into(),
            parent: row.parent.map(Into::into),
            size: row.size,
            block_number: row.block_number,
            metadata: parse_json(row.metadata)?,
            created_at: from_millis(row.created_at_ms),
        })
    }
}

impl SyncStateRow {
    #[allow(missing_docs)]
    pub fn from_state(state: &SyncState, version: u64) -> Self {
        Self {
            id: SYNC_STATE_ID,
            last_synced_block: state.last_synced_block,
            last_sync_ms: state.last_sync_time.map(to_millis),
            is_live: state.is_live,
            version,
        }
    }
}

impl From<SyncStateRow> for SyncState {
    fn from(row: SyncStateRow) -> Self {
        Self {
            last_synced_block: row.last_synced_block,
            last_sync_time: row.last_sync_ms.map(from_millis),
            is_live: row.is_live,
        }
    }
}
