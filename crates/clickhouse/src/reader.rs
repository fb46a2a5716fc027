//! `ClickHouse` reader functionality
//! Handles read-only lookups over the deduplicated (`FINAL`) tables

use clickhouse::{Client, Row};
use derive_more::Debug;
use eyre::{Context, Result};
use serde::Deserialize;
use std::time::Instant;
use tracing::{debug, error};
use url::Url;

use crate::{
    models::{AgentRow, CountRow, PermissionRow, SYNC_STATE_ID, SnapshotRow, SyncStateRow},
    types::{AddressBytes, HashBytes},
};

/// `ClickHouse` reader client (read-only operations)
#[derive(Clone, Debug)]
pub struct ClickhouseReader {
    /// Base client
    #[debug(skip)]
    base: Client,
    /// Database name
    db_name: String,
}

impl ClickhouseReader {
    /// Create a new `ClickHouse` reader client
    pub fn new(url: Url, db_name: String, username: String, password: String) -> Result<Self> {
        let client = Client::default()
            .with_url(url)
            .with_database(db_name.clone())
            .with_user(username)
            .with_password(password);

        Ok(Self { base: client, db_name })
    }

    async fn execute<R>(&self, query: &str) -> Result<Vec<R>>
    where
        R: Row + for<'b> Deserialize<'b>,
    {
        let client = self.base.clone();
        let start = Instant::now();

        let result = client.query(query).fetch_all::<R>().await;

        let duration_ms = start.elapsed().as_millis();
        match &result {
            Ok(rows) => {
                debug!(query = %query, duration_ms, rows = rows.len(), "ClickHouse query executed")
            }
            Err(e) => error!(query = %query, duration_ms, error = %e, "ClickHouse query failed"),
        }
        result.map_err(Into::into)
    }

    async fn count(&self, table: &str, filter: Option<String>) -> Result<u64> {
        let mut query = format!("SELECT count() AS count FROM {}.{} FINAL", self.db_name, table);
        if let Some(filter) = filter {
            query.push_str(&format!(" WHERE {filter}"));
        }
        let rows = self
            .execute::<CountRow>(&query)
            .await
            .wrap_err_with(|| format!("counting {table} failed"))?;
        Ok(rows.first().map(|r| r.count).unwrap_or_default())
    }

    /// Number of rows in `table` after deduplication.
    pub async fn count_rows(&self, table: &str) -> Result<u64> {
        self.count(table, None).await
    }

    /// Latest row of the agent at `address`.
    pub async fn get_agent(&self, address: AddressBytes) -> Result<Option<AgentRow>> {
        let query = format!(
            "SELECT ?fields FROM {}.agents FINAL WHERE address = {} LIMIT 1",
            self.db_name,
            address.sql()
        );
        let rows = self.execute::<AgentRow>(&query).await.wrap_err("fetching agent failed")?;
        Ok(rows.into_iter().next())
    }

    /// Every agent, ordered by address.
    pub async fn get_agents(&self) -> Result<Vec<AgentRow>> {
        let query = format!("SELECT ?fields FROM {}.agents FINAL ORDER BY address", self.db_name);
        self.execute::<AgentRow>(&query).await.wrap_err("fetching agents failed")
    }

    /// Event and receipt counts of one agent.
    pub async fn agent_counters(&self, address: AddressBytes) -> Result<(u64, u64)> {
        let filter = format!("agent = {}", address.sql());
        let events = self.count("agent_events", Some(filter.clone())).await?;
        let receipts = self.count("agent_receipts", Some(filter)).await?;
        Ok((events, receipts))
    }

    /// Whether any agent has an event for `tx_hash`.
    pub async fn event_exists(&self, tx_hash: HashBytes) -> Result<bool> {
        Ok(self.count("agent_events", Some(format!("tx_hash = {}", tx_hash.sql()))).await? > 0)
    }

    /// Whether `agent` already has an event for `tx_hash`.
    pub async fn agent_event_exists(&self, agent: AddressBytes, tx_hash: HashBytes) -> Result<bool> {
        let filter = format!("agent = {} AND tx_hash = {}", agent.sql(), tx_hash.sql());
        Ok(self.count("agent_events", Some(filter)).await? > 0)
    }

    /// Whether `agent` already has a receipt for `tx_hash`.
    pub async fn agent_receipt_exists(
        &self,
        agent: AddressBytes,
        tx_hash: HashBytes,
    ) -> Result<bool> {
        let filter = format!("agent = {} AND tx_hash = {}", agent.sql(), tx_hash.sql());
        Ok(self.count("agent_receipts", Some(filter)).await? > 0)
    }

    /// Permissions granted by `agent`, oldest first.
    pub async fn get_permissions(&self, agent: AddressBytes) -> Result<Vec<PermissionRow>> {
        let query = format!(
            "SELECT ?fields FROM {}.permissions FINAL WHERE agent = {} ORDER BY granted_at_ms",
            self.db_name,
            agent.sql()
        );
        self.execute::<PermissionRow>(&query).await.wrap_err("fetching permissions failed")
    }

    /// Learning snapshots of `agent`, oldest first.
    pub async fn get_snapshots(&self, agent: AddressBytes) -> Result<Vec<SnapshotRow>> {
        let query = format!(
            "SELECT ?fields FROM {}.snapshots FINAL WHERE agent = {} \
             ORDER BY block_number, created_at_ms",
            self.db_name,
            agent.sql()
        );
        self.execute::<SnapshotRow>(&query).await.wrap_err("fetching snapshots failed")
    }

    /// The sync cursor, `None` before the first completed pass.
    pub async fn get_sync_state(&self) -> Result<Option<SyncStateRow>> {
        let query = format!(
            "SELECT ?fields FROM {}.sync_state FINAL WHERE id = {SYNC_STATE_ID} LIMIT 1",
            self.db_name
        );
        let rows =
            self.execute::<SyncStateRow>(&query).await.wrap_err("fetching sync state failed")?;
        Ok(rows.into_iter().next())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clickhouse::test::{Mock, handlers};

    fn reader(mock: &Mock) -> ClickhouseReader {
        let url = Url::parse(mock.url()).unwrap();
        ClickhouseReader::new(url, "db".to_owned(), "user".into(), "pass".into()).unwrap()
    }

    #[tokio::test]
    async fn missing_sync_state_reads_as_none() {
        let mock = Mock::new();
        mock.add(handlers::provide(Vec::<SyncStateRow>::new()));

        assert_eq!(reader(&mock).get_sync_state().await.unwrap(), None);
    }

    #[tokio::test]
    async fn event_exists_counts_rows() {
        let mock = Mock::new();
        mock.add(handlers::provide(vec![CountRow { count: 1 }]));
        mock.add(handlers::provide(vec![CountRow { count: 0 }]));

        let reader = reader(&mock);
        assert!(reader.event_exists(HashBytes([1u8; 32])).await.unwrap());
        assert!(!reader.event_exists(HashBytes([2u8; 32])).await.unwrap());
    }

    #[tokio::test]
    async fn agent_counters_read_both_tables() {
        let mock = Mock::new();
        mock.add(handlers::provide(vec![CountRow { count: 3 }]));
        mock.add(handlers::provide(vec![CountRow { count: 2 }]));

        let counters = reader(&mock).agent_counters(AddressBytes([9u8; 20])).await.unwrap();
        assert_eq!(counters, (3, 2));
    }
}
