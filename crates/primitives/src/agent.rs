//! Agent records and their classification enums.

use std::{fmt, str::FromStr};

use alloy_primitives::{Address, B256};
use chrono::{DateTime, Utc};
use derive_more::{Deref, DerefMut};
use eyre::{Result, eyre};
use serde::{Deserialize, Serialize};

/// Agent version written by the pipeline.
pub const DEFAULT_AGENT_VERSION: &str = "1.0.0";
/// Chain tag attached to every agent discovered on BSC mainnet.
pub const BSC_MAINNET: &str = "bsc_mainnet";

/// Address prefix of agents minted in the ERC-8004 identity registry.
pub const ERC8004_TAG: &[u8] = &[0x80, 0x04];
/// Address prefix of agents that only exist as BAP-578 NFA tokens.
pub const NFA_TAG: &[u8] = &[0xba, 0x57, 0x8a];

/// Lifecycle status of an agent.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AgentStatus {
    /// Agent accepts actions
    #[default]
    Active,
    /// Agent is paused by its owner
    Paused,
    /// Agent is terminated
    Inactive,
}

/// Storage flavour of an agent's learning state.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentType {
    /// Learning state committed on-chain as a Merkle root
    MerkleLearning,
    /// Plain JSON metadata, no learning commitments
    #[default]
    JsonLight,
}

/// Learning approach advertised by an agent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LearningModel {
    #[allow(missing_docs)]
    Reinforcement,
    #[allow(missing_docs)]
    FineTuning,
    /// Retrieval augmented generation
    Rag,
    #[allow(missing_docs)]
    Hybrid,
    /// Model context protocol
    Mcp,
}

macro_rules! str_enum {
    ($ty:ty { $($variant:ident => $s:literal),+ $(,)? }) => {
        impl $ty {
            /// Canonical string form, as persisted.
            pub const fn as_str(&self) -> &'static str {
                match self {
                    $(Self::$variant => $s,)+
                }
            }
        }

        impl fmt::Display for $ty {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl FromStr for $ty {
            type Err = eyre::Report;

            fn from_str(s: &str) -> Result<Self> {
                match s {
                    $($s => Ok(Self::$variant),)+
                    other => Err(eyre!("unknown {} value: {other}", stringify!($ty))),
                }
            }
        }
    };
}

str_enum!(AgentStatus { Active => "active", Paused => "paused", Inactive => "inactive" });
str_enum!(AgentType { MerkleLearning => "merkle_learning", JsonLight => "json_light" });
str_enum!(LearningModel {
    Reinforcement => "reinforcement",
    FineTuning => "fine_tuning",
    Rag => "rag",
    Hybrid => "hybrid",
    Mcp => "mcp",
});

/// Writable attributes of an agent. Upserts replace all of them at once.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentProfile {
    /// Agent identity
    pub address: Address,
    /// Display name
    pub name: String,
    /// Display description
    pub description: String,
    /// Owner or deployer
    pub owner: Address,
    /// Lifecycle status
    pub status: AgentStatus,
    /// Profile version
    pub version: String,
    /// Implementation contract behind a proxy
    pub logic_address: Option<Address>,
    /// Off-chain registration document
    pub metadata_uri: Option<String>,
    /// Latest claimed learning Merkle root
    pub learning_root: Option<B256>,
    /// Compiler or registry label
    pub compiler: Option<String>,
    /// License name
    pub license: Option<String>,
    /// Source code is published on the explorer
    pub verified: bool,
    /// Native balance, formatted for display
    pub balance: Option<String>,
    /// Classification result
    pub agent_type: AgentType,
    /// `erc8004:<chain>:<token id>` when registered in the identity registry
    pub erc8004_id: Option<String>,
    /// Learning model, when the agent learns
    pub learning_model: Option<LearningModel>,
    /// Chains the agent runs on
    pub chain_support: Vec<String>,
    /// Display mint fee
    pub mint_fee: Option<String>,
}

impl AgentProfile {
    /// Minimal profile for a contract seen in a block but not enriched yet.
    pub fn placeholder(address: Address, owner: Address) -> Self {
        Self {
            address,
            name: placeholder_name(address),
            description: String::new(),
            owner,
            status: AgentStatus::Active,
            version: DEFAULT_AGENT_VERSION.to_owned(),
            logic_address: None,
            metadata_uri: None,
            learning_root: None,
            compiler: None,
            license: None,
            verified: false,
            balance: None,
            agent_type: AgentType::JsonLight,
            erc8004_id: None,
            learning_model: None,
            chain_support: vec![BSC_MAINNET.to_owned()],
            mint_fee: None,
        }
    }

    /// Heuristic trust score in `0..=100`.
    pub fn trust_score(&self) -> u8 {
        let mut score = 0;
        if self.verified {
            score += 30;
        }
        if self.erc8004_id.is_some() {
            score += 25;
        }
        if self.agent_type == AgentType::MerkleLearning {
            score += 20;
        }
        if self.learning_root.is_some() {
            score += 10;
        }
        if self.learning_model.is_some() {
            score += 10;
        }
        if !self.chain_support.is_empty() {
            score += 5;
        }
        score
    }

    /// Bucket of [`Self::trust_score`].
    pub fn trust_level(&self) -> TrustLevel {
        TrustLevel::from_score(self.trust_score())
    }
}

/// Coarse trust bucket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrustLevel {
    #[allow(missing_docs)]
    Low,
    #[allow(missing_docs)]
    Medium,
    #[allow(missing_docs)]
    High,
}

impl TrustLevel {
    /// `>= 70` is high, `>= 40` medium, anything else low.
    pub const fn from_score(score: u8) -> Self {
        if score >= 70 {
            Self::High
        } else if score >= 40 {
            Self::Medium
        } else {
            Self::Low
        }
    }
}

str_enum!(TrustLevel { Low => "low", Medium => "medium", High => "high" });

/// A persisted agent: the profile plus store-maintained counters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Deref, DerefMut)]
pub struct Agent {
    /// Writable attributes
    #[deref]
    #[deref_mut]
    #[serde(flatten)]
    pub profile: AgentProfile,
    /// Number of events recorded against this agent
    pub total_events: u64,
    /// Number of receipts recorded against this agent
    pub total_receipts: u64,
    /// First insert time
    pub created_at: DateTime<Utc>,
}

impl Agent {
    /// A freshly inserted agent with zeroed counters.
    pub fn new(profile: AgentProfile, created_at: DateTime<Utc>) -> Self {
        Self { profile, total_events: 0, total_receipts: 0, created_at }
    }

    /// Replace the profile, keeping counters and creation time.
    pub fn merge(&mut self, profile: AgentProfile) {
        self.profile = profile;
    }
}

/// `Contract 0x12345678...` for an address without a verified name.
pub fn placeholder_name(address: Address) -> String {
    let hex = format!("{address:#x}");
    format!("Contract {}...", &hex[..10])
}

/// Stable pseudo-address for a registry token that has no contract of its own.
///
/// The tag occupies the leading bytes and the token id the trailing eight, big-endian.
pub fn synthetic_address(tag: &[u8], token_id: u64) -> Address {
    let mut bytes = [0u8; 20];
    let tag_len = tag.len().min(12);
    bytes[..tag_len].copy_from_slice(&tag[..tag_len]);
    bytes[12..].copy_from_slice(&token_id.to_be_bytes());
    Address::from(bytes)
}

/// Canonical ERC-8004 identifier on BSC.
pub fn erc8004_id(token_id: u64) -> String {
    format!("erc8004:bsc:{token_id}")
}
