//! nfascope sync pipeline.
//!
//! Walks recent blocks for contract calls, classifies the called contracts against BAP-578 and
//! enumerates the ERC-8004 and NFA registries, writing everything through an
//! [`primitives::AgentStore`].
#![allow(clippy::uninlined_format_args)]
#![allow(clippy::cognitive_complexity)]

pub mod classifier;
pub mod discovery;
pub mod driver;
pub mod enricher;
pub mod scheduler;
pub mod walker;

pub use classifier::{Compliance, classify};
pub use discovery::{AgentDiscovery, DiscoveryConfig, DiscoveryReport};
pub use driver::Driver;
pub use enricher::ContractEnricher;
pub use scheduler::{PassOutcome, SchedulerConfig, SkipReason, SyncScheduler};
pub use walker::{BlockOutcome, BlockWalker, WalkerLimits};
