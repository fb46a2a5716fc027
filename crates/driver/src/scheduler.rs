//! Initial catch-up and periodic incremental sync passes.

use std::{
    sync::{
        Arc, Mutex, PoisonError,
        atomic::{AtomicBool, Ordering},
    },
    time::Duration,
};

use alloy_primitives::Address;
use eyre::Result;
use primitives::{AgentStore, ChainDataProvider};
use tokio::{task::JoinHandle, time::MissedTickBehavior};
use tracing::{error, info, warn};

use crate::{enricher::ContractEnricher, walker::BlockWalker};

/// Pass sizes and cadence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SchedulerConfig {
    /// Heights walked by the initial pass
    pub blocks_per_sync: u64,
    /// Contracts enriched after the initial pass
    pub initial_enrich_limit: usize,
    /// Heights walked by one periodic pass at most
    pub periodic_blocks: u64,
    /// Contracts enriched after a periodic pass
    pub periodic_enrich_limit: usize,
    /// Delay between periodic passes
    pub interval: Duration,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            blocks_per_sync: 20,
            initial_enrich_limit: 15,
            periodic_blocks: 5,
            periodic_enrich_limit: 5,
            interval: Duration::from_secs(60),
        }
    }
}

impl From<&config::SyncOpts> for SchedulerConfig {
    fn from(opts: &config::SyncOpts) -> Self {
        Self {
            blocks_per_sync: opts.blocks_per_sync,
            initial_enrich_limit: opts.initial_enrich_limit,
            periodic_blocks: opts.periodic_blocks,
            periodic_enrich_limit: opts.periodic_enrich_limit,
            interval: opts.sync_interval(),
        }
    }
}

/// Why a pass did nothing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// Another pass is in flight
    Busy,
    /// The cursor already covers the chain head
    AtHead,
}

/// Observable result of one pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PassOutcome {
    /// Nothing was walked
    Skipped(SkipReason),
    /// Heights `start..=end` were walked and the cursor now points at `end`
    Completed {
        /// First walked height
        start: u64,
        /// Last walked height
        end: u64,
        /// Distinct contracts seen in the range
        contracts: usize,
        /// Contracts enriched after the walk
        enriched: usize,
    },
}

/// Marks the scheduler busy until dropped.
struct BusyGuard<'a>(&'a AtomicBool);

impl<'a> BusyGuard<'a> {
    fn acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire).ok().map(|_| Self(flag))
    }
}

impl Drop for BusyGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Drives block walking and enrichment. At most one pass runs at a time; a pass requested
/// while another is running returns [`SkipReason::Busy`] instead of waiting.
#[derive(Clone)]
pub struct SyncScheduler {
    provider: Arc<dyn ChainDataProvider>,
    store: Arc<dyn AgentStore>,
    walker: BlockWalker,
    enricher: ContractEnricher,
    config: SchedulerConfig,
    busy: Arc<AtomicBool>,
    periodic: Arc<Mutex<Option<JoinHandle<()>>>>,
}

impl std::fmt::Debug for SyncScheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SyncScheduler")
            .field("config", &self.config)
            .field("busy", &self.is_busy())
            .finish_non_exhaustive()
    }
}

impl SyncScheduler {
    #[allow(missing_docs)]
    pub fn new(
        provider: Arc<dyn ChainDataProvider>,
        store: Arc<dyn AgentStore>,
        walker: BlockWalker,
        enricher: ContractEnricher,
        config: SchedulerConfig,
    ) -> Self {
        Self {
            provider,
            store,
            walker,
            enricher,
            config,
            busy: Arc::new(AtomicBool::new(false)),
            periodic: Arc::new(Mutex::new(None)),
        }
    }

    /// Whether a pass is currently running.
    pub fn is_busy(&self) -> bool {
        self.busy.load(Ordering::Acquire)
    }

    /// Catch up on a fixed window: right after the cursor, or the latest blocks on first run.
    pub async fn run_initial_sync(&self) -> Result<PassOutcome> {
        let Some(_guard) = BusyGuard::acquire(&self.busy) else {
            return Ok(PassOutcome::Skipped(SkipReason::Busy));
        };

        let cursor = self.store.get_last_synced_height().await?;
        let head = self.provider.latest_height().await?;
        info!(head, cursor, "Starting initial sync");

        let batch = self.config.blocks_per_sync.max(1);
        let start = if cursor > 0 { cursor + 1 } else { head.saturating_sub(batch) };
        let end = (start + batch - 1).min(head);
        if start > end {
            info!(head, cursor, "Cursor already at chain head");
            return Ok(PassOutcome::Skipped(SkipReason::AtHead));
        }

        self.run_pass(start, end, self.config.initial_enrich_limit).await
    }

    /// Walk a few new heights past the cursor.
    pub async fn run_periodic_pass(&self) -> Result<PassOutcome> {
        let Some(_guard) = BusyGuard::acquire(&self.busy) else {
            return Ok(PassOutcome::Skipped(SkipReason::Busy));
        };

        let cursor = self.store.get_last_synced_height().await?;
        let head = self.provider.latest_height().await?;
        if head <= cursor {
            return Ok(PassOutcome::Skipped(SkipReason::AtHead));
        }

        let start = cursor + 1;
        let end = start + (head - cursor).min(self.config.periodic_blocks.max(1)) - 1;
        self.run_pass(start, end, self.config.periodic_enrich_limit).await
    }

    async fn run_pass(&self, start: u64, end: u64, enrich_limit: usize) -> Result<PassOutcome> {
        let mut discovered: Vec<Address> = Vec::new();
        for height in start..=end {
            match self.walker.process_block(height).await {
                Ok(outcome) => {
                    info!(
                        block_number = height,
                        txs = outcome.tx_count,
                        contracts = outcome.contract_addresses.len(),
                        "Synced block"
                    );
                    for address in outcome.contract_addresses {
                        if !discovered.contains(&address) {
                            discovered.push(address);
                        }
                    }
                }
                Err(e) => warn!(block_number = height, err = %e, "Failed to sync block, skipping"),
            }
        }

        let targets = &discovered[..discovered.len().min(enrich_limit)];
        info!(discovered = discovered.len(), enriching = targets.len(), "Enriching contracts");
        let enriched = self.enricher.enrich_all(targets).await;

        self.store.set_last_synced_height(end).await?;
        info!(start, end, contracts = discovered.len(), enriched, "Sync pass complete");

        Ok(PassOutcome::Completed { start, end, contracts: discovered.len(), enriched })
    }

    /// Run [`Self::run_periodic_pass`] every configured interval. No-op if already started.
    pub fn start_periodic(&self) {
        let mut slot = self.periodic.lock().unwrap_or_else(PoisonError::into_inner);
        if slot.is_some() {
            return;
        }

        let scheduler = self.clone();
        let period = self.config.interval;
        info!(interval_secs = period.as_secs(), "Starting periodic sync");
        *slot = Some(tokio::spawn(async move {
            let mut interval = tokio::time::interval_at(tokio::time::Instant::now() + period, period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

            loop {
                interval.tick().await;
                match scheduler.run_periodic_pass().await {
                    Ok(PassOutcome::Completed { start, end, contracts, .. }) => {
                        info!(start, end, contracts, "Periodic sync pass complete");
                    }
                    Ok(PassOutcome::Skipped(_)) => {}
                    Err(e) => error!(err = %e, "Periodic sync pass failed"),
                }
            }
        }));
    }

    /// Stop the periodic task. A pass that is already running is cancelled at its next
    /// suspension point; the cursor only ever reflects completed passes.
    pub fn stop_periodic(&self) {
        let handle = self.periodic.lock().unwrap_or_else(PoisonError::into_inner).take();
        if let Some(handle) = handle {
            handle.abort();
            info!("Periodic sync stopped");
        }
    }

    /// Whether the periodic task is running.
    pub fn is_periodic_running(&self) -> bool {
        self.periodic
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .is_some_and(|handle| !handle.is_finished())
    }
}
