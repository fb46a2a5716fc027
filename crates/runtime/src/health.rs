//! Operational HTTP endpoints: liveness and sync progress.

use std::{net::SocketAddr, sync::Arc};

use api_types::{DataSource, ErrorResponse, HealthResponse, RecordTotals, SyncStatusResponse};
use axum::{Json, Router, extract::State, http::StatusCode, routing::get};
use eyre::Result;
use primitives::{AgentStore, ChainDataProvider, StoreStats, SyncState};
use tower_http::trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer};
use tracing::{Level, error, info, warn};

/// Handles shared by the endpoints.
#[derive(Clone)]
pub struct HealthState {
    provider: Arc<dyn ChainDataProvider>,
    store: Arc<dyn AgentStore>,
}

impl std::fmt::Debug for HealthState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HealthState").finish_non_exhaustive()
    }
}

impl HealthState {
    pub fn new(provider: Arc<dyn ChainDataProvider>, store: Arc<dyn AgentStore>) -> Self {
        Self { provider, store }
    }
}

/// Health check handler returning `{ "status": "ok" }`.
pub async fn handler() -> Json<HealthResponse> {
    Json(HealthResponse { status: "ok".to_owned() })
}

type ApiError = (StatusCode, Json<ErrorResponse>);

fn internal_error(e: &eyre::Report) -> ApiError {
    error!(err = %e, "Failed to read sync status");
    (StatusCode::INTERNAL_SERVER_ERROR, Json(ErrorResponse { error: e.to_string() }))
}

/// Assemble the sync status body. `head` is `None` when the chain could not be reached.
pub fn sync_status(state: SyncState, head: Option<u64>, stats: StoreStats) -> SyncStatusResponse {
    let agent_types = [
        ("merkle_learning".to_owned(), stats.merkle_learning_agents),
        ("json_light".to_owned(), stats.json_light_agents),
    ]
    .into_iter()
    .collect();

    SyncStatusResponse {
        last_synced_block: state.last_synced_block,
        last_sync_time: state.last_sync_time,
        chain_head: head,
        lag: head.map(|h| h.saturating_sub(state.last_synced_block)),
        source: if state.is_live { DataSource::Live } else { DataSource::None },
        totals: RecordTotals {
            agents: stats.total_agents,
            blocks: stats.total_blocks,
            events: stats.total_events,
            receipts: stats.total_receipts,
            snapshots: stats.total_snapshots,
        },
        agent_types,
        erc8004_registered: stats.erc8004_registered,
        learning_models: stats.learning_models,
        chain_coverage: stats.chain_coverage,
        trust_levels: stats.trust_levels,
    }
}

async fn sync_status_handler(
    State(state): State<HealthState>,
) -> Result<Json<SyncStatusResponse>, ApiError> {
    let sync = state.store.sync_state().await.map_err(|e| internal_error(&e))?;
    let stats = state.store.stats().await.map_err(|e| internal_error(&e))?;
    let head = match state.provider.latest_height().await {
        Ok(head) => Some(head),
        Err(e) => {
            warn!(err = %e, "Chain head unavailable for sync status");
            None
        }
    };
    Ok(Json(sync_status(sync, head, stats)))
}

/// Router exposing `/health` and `/sync-status`.
pub fn router(state: HealthState) -> Router {
    let trace = TraceLayer::new_for_http()
        .make_span_with(DefaultMakeSpan::new().level(Level::DEBUG))
        .on_response(DefaultOnResponse::new().level(Level::DEBUG));

    Router::new()
        .route("/health", get(handler))
        .route("/sync-status", get(sync_status_handler))
        .with_state(state)
        .layer(trace)
}

/// Serve the operational endpoints until `shutdown` resolves.
pub async fn serve<F>(addr: SocketAddr, state: HealthState, shutdown: F) -> Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let app = router(state);

    info!("Starting health server on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app.into_make_service()).with_graceful_shutdown(shutdown).await?;
    Ok(())
}
