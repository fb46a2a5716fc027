//! Block, event, receipt and bookkeeping records persisted by the pipeline.

use std::collections::BTreeMap;

use alloy_primitives::{Address, B256};
use chrono::{DateTime, Utc};
use eyre::{Result, eyre};
use serde::{Deserialize, Serialize};

use crate::agent::{Agent, AgentType};

/// Event kind written for every indexed transaction.
pub const EVENT_KIND_TRANSACTION: &str = "transaction";
/// Receipt action written for every indexed contract call.
pub const RECEIPT_ACTION_CONTRACT_CALL: &str = "contract_call";

/// Outcome of a transaction.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TxStatus {
    #[allow(missing_docs)]
    #[default]
    Confirmed,
    #[allow(missing_docs)]
    Failed,
    #[allow(missing_docs)]
    Pending,
}

impl TxStatus {
    /// Persisted string form.
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Confirmed => "confirmed",
            Self::Failed => "failed",
            Self::Pending => "pending",
        }
    }

    /// Parse the persisted form, unknown values read back as pending.
    pub fn from_str_lossy(s: &str) -> Self {
        match s {
            "confirmed" => Self::Confirmed,
            "failed" => Self::Failed,
            _ => Self::Pending,
        }
    }
}

/// A block as stored. Keyed by `number`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockRecord {
    /// Block height
    pub number: u64,
    /// Block hash
    pub hash: B256,
    /// Parent block hash
    pub parent_hash: B256,
    /// Block producer
    pub validator: Address,
    /// Gas used by all transactions
    pub gas_used: u64,
    /// Block gas limit
    pub gas_limit: u64,
    /// Number of transactions in the block
    pub event_count: u32,
    /// Number of contract-call recipients recorded for the block
    pub agent_count: u32,
    /// Unix seconds
    pub timestamp: u64,
}

/// A transaction attributed to an agent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentEvent {
    /// Agent the event is attributed to
    pub agent: Address,
    /// Event kind, e.g. `transaction`
    pub kind: String,
    /// Transaction hash
    pub tx_hash: B256,
    /// Inclusion height
    pub block_number: u64,
    /// Sender
    pub from: Address,
    /// Recipient, `None` for contract creations
    pub to: Option<Address>,
    /// Display value, e.g. `0.010000 BNB`
    pub value: String,
    /// Gas consumed
    pub gas_used: u64,
    /// Display gas price, e.g. `3.00 Gwei`
    pub gas_price: String,
    /// Execution status
    pub status: TxStatus,
    /// Human readable method name
    pub method: String,
    /// Extra structured data
    pub details: Option<serde_json::Value>,
}

/// An internal call attributed to an agent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentReceipt {
    /// Agent the call is attributed to
    pub agent: Address,
    /// Method name of the call
    pub action: String,
    /// Parent transaction hash
    pub tx_hash: B256,
    /// Caller
    pub from: Address,
    /// Callee
    pub to: Address,
    /// Display value
    pub value: String,
    /// Execution status
    pub status: TxStatus,
    /// Inclusion height
    pub block_number: u64,
    /// Gas consumed
    pub gas_used: u64,
}

/// A capability granted by an agent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Permission {
    /// Granting agent
    pub agent: Address,
    /// Permission name
    pub name: String,
    /// Receiving address
    pub grantee: Address,
    /// What the grant covers
    pub scope: String,
    /// Not yet revoked
    pub active: bool,
    /// Grant time
    pub granted_at: DateTime<Utc>,
}

/// A claimed learning-state commitment. Never verified.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Snapshot {
    /// Owning agent
    pub agent: Address,
    /// Claimed Merkle root
    pub root: B256,
    /// Previous root in the chain
    pub parent: Option<B256>,
    /// Claimed tree size
    pub size: u64,
    /// Height the claim was made at
    pub block_number: u64,
    /// Extra structured data
    pub metadata: Option<serde_json::Value>,
    /// Record time
    pub created_at: DateTime<Utc>,
}

impl Snapshot {
    /// Reject snapshots that would close a cycle in the agent's root chain.
    ///
    /// Parents always point at roots recorded earlier, so a chain stays acyclic as long as
    /// every new root is unseen for the agent and differs from its own parent.
    pub fn check_acyclic<'a>(&self, existing_roots: impl IntoIterator<Item = &'a B256>) -> Result<()> {
        if self.parent == Some(self.root) {
            return Err(eyre!("snapshot root {} references itself as parent", self.root));
        }
        if existing_roots.into_iter().any(|root| *root == self.root) {
            return Err(eyre!(
                "duplicate snapshot root {} for agent {}",
                self.root,
                self.agent
            ));
        }
        Ok(())
    }
}

/// Resume cursor of the sync scheduler.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncState {
    /// Highest fully walked height, `0` before the first pass
    pub last_synced_block: u64,
    /// When the cursor last moved
    pub last_sync_time: Option<DateTime<Utc>>,
    /// At least one pass completed against the live chain
    pub is_live: bool,
}

/// Aggregate counts over the store.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreStats {
    /// Stored agents
    pub total_agents: u64,
    /// Stored blocks
    pub total_blocks: u64,
    /// Stored events
    pub total_events: u64,
    /// Stored receipts
    pub total_receipts: u64,
    /// Stored snapshots
    pub total_snapshots: u64,
    /// Agents classified as Merkle learning
    pub merkle_learning_agents: u64,
    /// Agents classified as JSON light
    pub json_light_agents: u64,
    /// Agents with an ERC-8004 id
    pub erc8004_registered: u64,
    /// Agents per learning model
    pub learning_models: BTreeMap<String, u64>,
    /// Agents per supported chain
    pub chain_coverage: BTreeMap<String, u64>,
    /// Agents per trust level
    pub trust_levels: BTreeMap<String, u64>,
}

impl StoreStats {
    /// Fold per-agent breakdowns into the stats.
    pub fn add_agents<'a>(&mut self, agents: impl IntoIterator<Item = &'a Agent>) {
        for agent in agents {
            self.total_agents += 1;
            match agent.agent_type {
                AgentType::MerkleLearning => self.merkle_learning_agents += 1,
                AgentType::JsonLight => self.json_light_agents += 1,
            }
            if agent.erc8004_id.is_some() {
                self.erc8004_registered += 1;
            }
            if let Some(model) = agent.learning_model {
                *self.learning_models.entry(model.to_string()).or_default() += 1;
            }
            for chain in &agent.chain_support {
                *self.chain_coverage.entry(chain.clone()).or_default() += 1;
            }
            *self.trust_levels.entry(agent.trust_level().to_string()).or_default() += 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::{AgentProfile, LearningModel};

    fn snapshot(root: u8, parent: Option<u8>) -> Snapshot {
        Snapshot {
            agent: Address::repeat_byte(1),
            root: B256::repeat_byte(root),
            parent: parent.map(B256::repeat_byte),
            size: 1,
            block_number: 1,
            metadata: None,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn snapshot_chain_rejects_cycles() {
        let existing = [B256::repeat_byte(1), B256::repeat_byte(2)];
        assert!(snapshot(3, Some(2)).check_acyclic(&existing).is_ok());
        assert!(snapshot(1, Some(2)).check_acyclic(&existing).is_err());
        assert!(snapshot(4, Some(4)).check_acyclic(&existing).is_err());
        // unknown parents are claims, not errors
        assert!(snapshot(5, Some(9)).check_acyclic(&existing).is_ok());
    }

    #[test]
    fn stats_fold_breakdowns() {
        let mut merkle = AgentProfile::placeholder(Address::repeat_byte(1), Address::ZERO);
        merkle.agent_type = AgentType::MerkleLearning;
        merkle.learning_model = Some(LearningModel::Mcp);
        merkle.erc8004_id = Some("erc8004:bsc:1".to_owned());
        let light = AgentProfile::placeholder(Address::repeat_byte(2), Address::ZERO);
        let agents = [Agent::new(merkle, Utc::now()), Agent::new(light, Utc::now())];

        let mut stats = StoreStats::default();
        stats.add_agents(&agents);
        assert_eq!(stats.total_agents, 2);
        assert_eq!(stats.merkle_learning_agents, 1);
        assert_eq!(stats.json_light_agents, 1);
        assert_eq!(stats.erc8004_registered, 1);
        assert_eq!(stats.learning_models.get("mcp"), Some(&1));
        assert_eq!(stats.chain_coverage.get("bsc_mainnet"), Some(&2));
    }

    #[test]
    fn unknown_status_reads_as_pending() {
        assert_eq!(TxStatus::from_str_lossy("failed"), TxStatus::Failed);
        assert_eq!(TxStatus::from_str_lossy("???"), TxStatus::Pending);
    }
}
