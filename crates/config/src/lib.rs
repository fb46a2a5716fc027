//! Nfascope configuration
use std::{net::IpAddr, time::Duration};

use alloy_primitives::Address;
use clap::Parser;
use url::Url;

/// Default BSC public JSON-RPC endpoint.
pub const DEFAULT_RPC_URL: &str = "https://bsc-dataseed.binance.org";
/// Default Etherscan v2 multichain API endpoint.
pub const DEFAULT_EXPLORER_API_URL: &str = "https://api.etherscan.io/v2/api";
/// Default public IPFS gateway used for `ipfs://` metadata URIs.
pub const DEFAULT_IPFS_GATEWAY: &str = "https://ipfs.io/ipfs/";

/// Clickhouse database configuration options
#[derive(Debug, Clone, Parser)]
pub struct ClickhouseOpts {
    /// Clickhouse URL
    #[clap(long, env = "CLICKHOUSE_URL", default_value = "http://localhost:8123")]
    pub url: Url,
    /// Clickhouse database
    #[clap(long, env = "CLICKHOUSE_DB", default_value = "nfascope")]
    pub db: String,
    /// Clickhouse username
    #[clap(long, env = "CLICKHOUSE_USERNAME", default_value = "default")]
    pub username: String,
    /// Clickhouse password
    #[clap(long, env = "CLICKHOUSE_PASSWORD", default_value = "")]
    pub password: String,
}

/// RPC endpoint configuration options
#[derive(Debug, Clone, Parser)]
pub struct RpcOpts {
    /// HTTP JSON-RPC URL of the chain being indexed
    #[clap(long, env = "RPC_URL", default_value = DEFAULT_RPC_URL)]
    pub rpc_url: Url,
}

/// Block explorer API configuration options
#[derive(Debug, Clone, Parser)]
pub struct ExplorerOpts {
    /// Etherscan-compatible explorer API URL
    #[clap(long, env = "EXPLORER_API_URL", default_value = DEFAULT_EXPLORER_API_URL)]
    pub explorer_api_url: Url,
    /// Explorer API key
    #[clap(long, env = "BSCSCAN_API_KEY", default_value = "")]
    pub explorer_api_key: String,
    /// Chain id passed to the multichain explorer API
    #[clap(long, env = "EXPLORER_CHAIN_ID", default_value = "56")]
    pub chain_id: u64,
    /// Minimum spacing between two explorer requests, in milliseconds
    #[clap(long, env = "EXPLORER_REQUEST_INTERVAL_MS", default_value = "220")]
    pub request_interval_ms: u64,
    /// Gateway prefix that replaces `ipfs://` in metadata URIs
    #[clap(long, env = "IPFS_GATEWAY", default_value = DEFAULT_IPFS_GATEWAY)]
    pub ipfs_gateway: String,
    /// Timeout for off-chain metadata fetches, in seconds
    #[clap(long, env = "METADATA_TIMEOUT_SECS", default_value = "8")]
    pub metadata_timeout_secs: u64,
}

impl ExplorerOpts {
    /// Minimum spacing between explorer requests.
    pub const fn request_interval(&self) -> Duration {
        Duration::from_millis(self.request_interval_ms)
    }

    /// Metadata fetch timeout.
    pub const fn metadata_timeout(&self) -> Duration {
        Duration::from_secs(self.metadata_timeout_secs)
    }
}

/// Agent registry contract addresses
#[derive(Debug, Clone, Parser)]
pub struct RegistryOpts {
    /// ERC-8004 identity registry
    #[clap(
        long,
        env = "IDENTITY_REGISTRY_ADDRESS",
        default_value = "0xBE6745f74DF1427a073154345040a37558059eBb"
    )]
    pub identity_registry: Address,
    /// ERC-8004 reputation registry
    #[clap(
        long,
        env = "REPUTATION_REGISTRY_ADDRESS",
        default_value = "0x0dEe18C860514147518604911166E034e4C83623"
    )]
    pub reputation_registry: Address,
    /// BAP-578 non-fungible agent contract
    #[clap(
        long,
        env = "NFA_CONTRACT_ADDRESS",
        default_value = "0xf2954d349D7FF9E0d4322d750c7c2921b0445fdf"
    )]
    pub nfa_contract: Address,
    /// BAP-578 agent marketplace
    #[clap(
        long,
        env = "NFA_MARKETPLACE_ADDRESS",
        default_value = "0x0260A2fa1d0Ea88F8165f5B0b61349F7735e4250"
    )]
    pub nfa_marketplace: Address,
}

/// Block walking and scheduling configuration
#[derive(Debug, Clone, Parser)]
pub struct SyncOpts {
    /// Number of blocks walked by the initial catch-up pass
    #[clap(long, env = "BLOCKS_PER_SYNC", default_value = "20")]
    pub blocks_per_sync: u64,
    /// Interval between periodic passes, in seconds
    #[clap(long, env = "SYNC_INTERVAL_SECS", default_value = "60")]
    pub sync_interval_secs: u64,
    /// Maximum number of distinct contracts recorded per block
    #[clap(long, env = "MAX_CONTRACTS_PER_BLOCK", default_value = "5")]
    pub max_contracts_per_block: usize,
    /// Maximum number of transactions scanned per block
    #[clap(long, env = "MAX_TXS_PER_BLOCK", default_value = "50")]
    pub max_txs_per_block: usize,
    /// Maximum number of contracts enriched after the initial pass
    #[clap(long, env = "INITIAL_ENRICH_LIMIT", default_value = "15")]
    pub initial_enrich_limit: usize,
    /// Maximum number of blocks walked by a periodic pass
    #[clap(long, env = "PERIODIC_BLOCKS", default_value = "5")]
    pub periodic_blocks: u64,
    /// Maximum number of contracts enriched after a periodic pass
    #[clap(long, env = "PERIODIC_ENRICH_LIMIT", default_value = "5")]
    pub periodic_enrich_limit: usize,
}

impl SyncOpts {
    /// Interval between periodic passes.
    pub const fn sync_interval(&self) -> Duration {
        Duration::from_secs(self.sync_interval_secs)
    }
}

/// Registry enumeration configuration
#[derive(Debug, Clone, Parser)]
pub struct DiscoveryOpts {
    /// Highest NFA token id probed
    #[clap(long, env = "NFA_MAX_PROBE_ID", default_value = "200")]
    pub max_probe_id: u64,
    /// Consecutive missing NFA ids after which probing stops
    #[clap(long, env = "NFA_MAX_CONSECUTIVE_MISSING", default_value = "20")]
    pub max_consecutive_missing: u64,
    /// Pause between token reads, in milliseconds
    #[clap(long, env = "PROBE_DELAY_MS", default_value = "100")]
    pub probe_delay_ms: u64,
    /// Pause after a missing token id, in milliseconds
    #[clap(long, env = "MISS_DELAY_MS", default_value = "50")]
    pub miss_delay_ms: u64,
    /// Number of registry transactions imported per registry
    #[clap(long, env = "REGISTRY_HISTORY_LIMIT", default_value = "100")]
    pub registry_history_limit: u32,
    /// Pause between two registry history imports, in milliseconds
    #[clap(long, env = "REGISTRY_HISTORY_DELAY_MS", default_value = "300")]
    pub registry_history_delay_ms: u64,
}

/// Health server configuration options
#[derive(Debug, Clone, Parser)]
pub struct HealthOpts {
    /// Health server host
    #[clap(long = "health-host", env = "HEALTH_HOST", default_value = "0.0.0.0")]
    pub host: IpAddr,
    /// Health server port
    #[clap(long = "health-port", env = "HEALTH_PORT", default_value = "8080")]
    pub port: u16,
}

/// CLI options for nfascope
#[derive(Debug, Clone, Parser)]
pub struct Opts {
    /// Clickhouse database configuration
    #[clap(flatten)]
    pub clickhouse: ClickhouseOpts,

    /// RPC endpoint configuration
    #[clap(flatten)]
    pub rpc: RpcOpts,

    /// Explorer API configuration
    #[clap(flatten)]
    pub explorer: ExplorerOpts,

    /// Registry contract addresses
    #[clap(flatten)]
    pub registries: RegistryOpts,

    /// Sync scheduler configuration
    #[clap(flatten)]
    pub sync: SyncOpts,

    /// Registry enumeration configuration
    #[clap(flatten)]
    pub discovery: DiscoveryOpts,

    /// Health server configuration
    #[clap(flatten)]
    pub health: HealthOpts,

    /// If set, drop & re-create all tables (local/dev only)
    #[clap(long)]
    pub reset_db: bool,

    /// Keep all records in memory instead of writing them to Clickhouse
    #[clap(long, env = "DRY_RUN")]
    pub dry_run: bool,

    /// Skip the one-shot registry enumeration after the initial pass
    #[clap(long, env = "SKIP_AGENT_DISCOVERY")]
    pub skip_agent_discovery: bool,
}
