//! `ClickHouse` writer functionality for nfascope
//! Handles database initialization and row insertion

use clickhouse::{Client, Row};
use derive_more::Debug;
use eyre::{Context, Result};
use serde::Serialize;
use tracing::info;
use url::Url;

use crate::{
    models::{AgentRow, BlockRow, EventRow, PermissionRow, ReceiptRow, SnapshotRow, SyncStateRow},
    schema::{TABLE_SCHEMAS, TABLES, TableSchema},
};

/// `ClickHouse` writer client for nfascope (inserts and schema management)
#[derive(Clone, Debug)]
pub struct ClickhouseWriter {
    /// Base client
    #[debug(skip)]
    base: Client,
    /// Database name
    db_name: String,
}

impl ClickhouseWriter {
    /// Create a new `ClickHouse` writer client
    pub fn new(url: Url, db_name: String, username: String, password: String) -> Result<Self> {
        let client = Client::default()
            .with_url(url)
            .with_database(db_name.clone())
            .with_user(username)
            .with_password(password);

        Ok(Self { base: client, db_name })
    }

    /// Create a table with the given schema
    async fn create_table(&self, schema: &TableSchema) -> Result<()> {
        let query = format!(
            "CREATE TABLE IF NOT EXISTS {}.{} (
                {}
            ) ENGINE = ReplacingMergeTree(version)
            ORDER BY ({})",
            self.db_name, schema.name, schema.columns, schema.order_by
        );

        self.base
            .query(&query)
            .execute()
            .await
            .wrap_err_with(|| format!("Failed to create {} table", schema.name))
    }

    /// Drop a table if it exists
    async fn drop_table(&self, table_name: &str) -> Result<()> {
        self.base
            .query(&format!("DROP TABLE IF EXISTS {}.{}", self.db_name, table_name))
            .execute()
            .await
            .wrap_err_with(|| format!("Failed to drop {table_name} table"))
    }

    /// Initialize database and optionally reset
    pub async fn init_db(&self, reset: bool) -> Result<()> {
        self.base
            .query(&format!("CREATE DATABASE IF NOT EXISTS {}", self.db_name))
            .execute()
            .await
            .wrap_err("Failed to create database")?;

        if reset {
            for table in TABLES {
                self.drop_table(table).await?;
            }
            info!(db_name = %self.db_name, "Database reset complete");
        }

        self.init_schema().await
    }

    /// Initialize schema
    pub async fn init_schema(&self) -> Result<()> {
        for schema in TABLE_SCHEMAS {
            self.create_table(schema).await?;
        }
        Ok(())
    }

    /// Delete every row of every table, keeping the schema.
    pub async fn truncate_all(&self) -> Result<()> {
        for table in TABLES {
            self.base
                .query(&format!("TRUNCATE TABLE IF EXISTS {}.{}", self.db_name, table))
                .execute()
                .await
                .wrap_err_with(|| format!("Failed to truncate {table} table"))?;
        }
        info!(db_name = %self.db_name, "All tables truncated");
        Ok(())
    }

    async fn insert_row<R>(&self, table: &str, row: &R) -> Result<()>
    where
        R: Row + Serialize,
    {
        let client = self.base.clone().with_database(&self.db_name);
        let mut insert = client.insert(table)?;
        insert.write(row).await?;
        insert.end().await.wrap_err_with(|| format!("Failed to insert into {table}"))
    }

    /// Insert block row
    pub async fn insert_block(&self, row: &BlockRow) -> Result<()> {
        self.insert_row("blocks", row).await
    }

    /// Insert agent row
    pub async fn insert_agent(&self, row: &AgentRow) -> Result<()> {
        self.insert_row("agents", row).await
    }

    /// Insert agent event row
    pub async fn insert_event(&self, row: &EventRow) -> Result<()> {
        self.insert_row("agent_events", row).await
    }

    /// Insert agent receipt row
    pub async fn insert_receipt(&self, row: &ReceiptRow) -> Result<()> {
        self.insert_row("agent_receipts", row).await
    }

    /// Insert permission row
    pub async fn insert_permission(&self, row: &PermissionRow) -> Result<()> {
        self.insert_row("permissions", row).await
    }

    /// Insert snapshot row
    pub async fn insert_snapshot(&self, row: &SnapshotRow) -> Result<()> {
        self.insert_row("snapshots", row).await
    }

    /// Insert sync state row
    pub async fn insert_sync_state(&self, row: &SyncStateRow) -> Result<()> {
        self.insert_row("sync_state", row).await
    }
}
