//! Core primitives for the nfascope indexer.
/// Agent records and classification enums
pub mod agent;
/// In-memory record store
pub mod memory;
/// Global request pacing
pub mod pacer;
/// Upstream chain data seam
pub mod provider;
/// Block, event and bookkeeping records
pub mod records;
/// Retry policies for JSON-RPC and HTTP calls
pub mod retries;
/// Function selector registry
pub mod selectors;
/// Persistence seam
pub mod store;
/// Native amount formatting
pub mod units;

/// Canned providers for tests
#[cfg(any(test, feature = "test-util"))]
pub mod test_util;

pub use agent::{
    Agent, AgentProfile, AgentStatus, AgentType, LearningModel, TrustLevel, synthetic_address,
};
pub use memory::MemoryStore;
pub use provider::{
    ChainBlock, ChainDataProvider, ChainTransaction, ContractSource, ExplorerTransaction,
    SortOrder, TxHistoryQuery,
};
pub use records::{
    AgentEvent, AgentReceipt, BlockRecord, Permission, Snapshot, StoreStats, SyncState, TxStatus,
};
pub use store::{AgentStore, is_duplicate_error};
