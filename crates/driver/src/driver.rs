//! nfascope driver: wires the provider and store into the sync pipeline and runs it.

use std::{net::SocketAddr, sync::Arc};

use clickhouse::ClickhouseStore;
use config::Opts;
use extractor::{ChainClient, Extractor};
use eyre::{Context, Result};
use network::{ExplorerClient, MetadataClient};
use primitives::{AgentStore, ChainDataProvider, MemoryStore, pacer::RequestPacer};
use runtime::{
    health::{self, HealthState},
    shutdown::ShutdownSignal,
};
use tokio::{sync::oneshot, task::JoinHandle};
use tracing::{error, info, warn};

use crate::{
    discovery::{AgentDiscovery, DiscoveryConfig},
    enricher::ContractEnricher,
    scheduler::{PassOutcome, SchedulerConfig, SyncScheduler},
    walker::{BlockWalker, WalkerLimits},
};

/// Owns the long-running parts of the indexer.
pub struct Driver {
    provider: Arc<dyn ChainDataProvider>,
    store: Arc<dyn AgentStore>,
    scheduler: SyncScheduler,
    discovery: AgentDiscovery,
    health_addr: SocketAddr,
    skip_agent_discovery: bool,
}

impl std::fmt::Debug for Driver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Driver")
            .field("scheduler", &self.scheduler)
            .field("discovery", &self.discovery)
            .field("health_addr", &self.health_addr)
            .field("skip_agent_discovery", &self.skip_agent_discovery)
            .finish_non_exhaustive()
    }
}

/// Build the production provider from the command line.
pub fn chain_client(opts: &Opts) -> Result<ChainClient> {
    let pacer = RequestPacer::new(opts.explorer.request_interval());
    let explorer = ExplorerClient::new(
        opts.explorer.explorer_api_url.clone(),
        opts.explorer.explorer_api_key.clone(),
        opts.explorer.chain_id,
        pacer,
    )
    .wrap_err("Failed to build explorer client")?;
    let metadata =
        MetadataClient::new(opts.explorer.ipfs_gateway.clone(), opts.explorer.metadata_timeout())
            .wrap_err("Failed to build metadata client")?;
    let extractor = Extractor::new(opts.rpc.rpc_url.clone());
    Ok(ChainClient::new(extractor, explorer, metadata))
}

impl Driver {
    /// Create a new driver with the given configuration.
    ///
    /// Initializes the database schema unless `dry_run` is set, in which case records are
    /// kept in memory.
    pub async fn new(opts: Opts) -> Result<Self> {
        info!("Initializing driver");

        let provider: Arc<dyn ChainDataProvider> = Arc::new(chain_client(&opts)?);

        let store: Arc<dyn AgentStore> = if opts.dry_run {
            info!("Dry-run mode: records are kept in memory and lost on exit");
            Arc::new(MemoryStore::new())
        } else {
            if opts.clickhouse.db.is_empty() {
                return Err(eyre::eyre!("ClickHouse database name is required"));
            }
            let store = ClickhouseStore::new(
                opts.clickhouse.url.clone(),
                opts.clickhouse.db.clone(),
                opts.clickhouse.username.clone(),
                opts.clickhouse.password.clone(),
            )?;
            info!("Running database migrations");
            store.init(opts.reset_db).await.wrap_err("Failed to initialize database")?;
            Arc::new(store)
        };

        let cursor = store.get_last_synced_height().await?;
        if cursor == 0 {
            info!("No sync cursor found, clearing stale records");
            store.clear_all().await?;
        } else {
            info!(last_synced_block = cursor, "Resuming from stored cursor");
        }

        Ok(Self::from_parts(provider, store, &opts))
    }

    /// Assemble a driver around an existing provider and store.
    pub fn from_parts(
        provider: Arc<dyn ChainDataProvider>,
        store: Arc<dyn AgentStore>,
        opts: &Opts,
    ) -> Self {
        let walker =
            BlockWalker::new(provider.clone(), store.clone(), WalkerLimits::from(&opts.sync));
        let enricher = ContractEnricher::new(provider.clone(), store.clone());
        let scheduler = SyncScheduler::new(
            provider.clone(),
            store.clone(),
            walker,
            enricher,
            SchedulerConfig::from(&opts.sync),
        );
        let discovery = AgentDiscovery::new(
            provider.clone(),
            store.clone(),
            DiscoveryConfig::new(&opts.registries, &opts.discovery),
        );

        Self {
            provider,
            store,
            scheduler,
            discovery,
            health_addr: SocketAddr::new(opts.health.host, opts.health.port),
            skip_agent_discovery: opts.skip_agent_discovery,
        }
    }

    /// The sync scheduler, for callers that drive passes themselves.
    pub const fn scheduler(&self) -> &SyncScheduler {
        &self.scheduler
    }

    /// Run until SIGINT or SIGTERM.
    pub async fn start(self) -> Result<()> {
        let shutdown = ShutdownSignal::new().wrap_err("Failed to install signal handlers")?;
        self.start_with_shutdown(shutdown).await
    }

    /// Run until `shutdown` resolves.
    ///
    /// Order: health server, initial sync, periodic sync, then discovery in the background.
    pub async fn start_with_shutdown<F>(self, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()> + Send,
    {
        info!("Starting driver");

        let (health_tx, health_rx) = oneshot::channel::<()>();
        let health_state = HealthState::new(self.provider.clone(), self.store.clone());
        let addr = self.health_addr;
        let health_handle = tokio::spawn(async move {
            let stop = async move {
                let _ = health_rx.await;
            };
            if let Err(e) = health::serve(addr, health_state, stop).await {
                error!(err = %e, "Health server failed");
            }
        });

        match self.scheduler.run_initial_sync().await {
            Ok(PassOutcome::Completed { start, end, contracts, enriched }) => {
                info!(start, end, contracts, enriched, "Initial sync complete");
            }
            Ok(PassOutcome::Skipped(reason)) => info!(?reason, "Initial sync skipped"),
            Err(e) => error!(err = %e, "Initial sync failed"),
        }

        self.scheduler.start_periodic();

        let discovery_handle = self.spawn_discovery();

        shutdown.await;
        info!("Shutdown signal received, stopping driver");

        self.scheduler.stop_periodic();
        if let Some(handle) = discovery_handle {
            handle.abort();
        }
        let _ = health_tx.send(());
        if let Err(e) = health_handle.await {
            warn!(err = %e, "Health server task ended abnormally");
        }
        Ok(())
    }

    fn spawn_discovery(&self) -> Option<JoinHandle<()>> {
        if self.skip_agent_discovery {
            info!("Agent discovery disabled via configuration");
            return None;
        }
        let discovery = self.discovery.clone();
        Some(tokio::spawn(async move {
            if let Err(e) = discovery.run().await {
                error!(err = %e, "Agent discovery failed");
            }
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;
    use primitives::test_util::StaticProvider;

    fn opts() -> Opts {
        Opts::try_parse_from([
            "nfascope",
            "--health-host",
            "127.0.0.1",
            "--health-port",
            "0",
            "--skip-agent-discovery",
        ])
        .unwrap()
    }

    #[tokio::test]
    async fn start_runs_initial_sync_and_stops_on_shutdown() {
        let provider = Arc::new(StaticProvider::new().with_latest(30));
        let store = MemoryStore::new();
        let driver = Driver::from_parts(provider.clone(), Arc::new(store.clone()), &opts());
        let scheduler = driver.scheduler().clone();

        driver.start_with_shutdown(async {}).await.unwrap();

        assert_eq!(store.get_last_synced_height().await.unwrap(), 29);
        assert_eq!(provider.block_requests(), (10..=29).collect::<Vec<_>>());
        assert!(!scheduler.is_periodic_running());
    }
}
