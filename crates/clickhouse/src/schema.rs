//! Schema definitions for ClickHouse tables
//!
//! Every table is a `ReplacingMergeTree` versioned by the `version` column, so re-inserting
//! a key overwrites it once parts merge. Reads use `FINAL` to see the latest row per key.

/// Table schema definition
pub struct TableSchema {
    pub name: &'static str,
    pub columns: &'static str,
    pub order_by: &'static str,
}

/// Names of all tables
pub const TABLES: &[&str] =
    &["blocks", "agents", "agent_events", "agent_receipts", "permissions", "snapshots", "sync_state"];

/// Schema definitions for tables
pub const TABLE_SCHEMAS: &[TableSchema] = &[
    TableSchema {
        name: "blocks",
        columns: "block_number UInt64,
                 block_hash FixedString(32),
                 parent_hash FixedString(32),
                 validator FixedString(20),
                 gas_used UInt64,
                 gas_limit UInt64,
                 event_count UInt32,
                 agent_count UInt32,
                 block_ts UInt64,
                 version UInt64,
                 inserted_at DateTime64(3) DEFAULT now64()",
        order_by: "block_number",
    },
    TableSchema {
        name: "agents",
        columns: "address FixedString(20),
                 name String,
                 description String,
                 owner FixedString(20),
                 status String,
                 agent_version String,
                 logic_address Nullable(FixedString(20)),
                 metadata_uri Nullable(String),
                 learning_root Nullable(FixedString(32)),
                 compiler Nullable(String),
                 license Nullable(String),
                 verified Bool,
                 balance Nullable(String),
                 agent_type String,
                 erc8004_id Nullable(String),
                 learning_model Nullable(String),
                 chain_support Array(String),
                 mint_fee Nullable(String),
                 created_at_ms UInt64,
                 version UInt64,
                 inserted_at DateTime64(3) DEFAULT now64()",
        order_by: "address",
    },
    TableSchema {
        name: "agent_events",
        columns: "agent FixedString(20),
                 kind String,
                 tx_hash FixedString(32),
                 block_number UInt64,
                 sender FixedString(20),
                 recipient Nullable(FixedString(20)),
                 value String,
                 gas_used UInt64,
                 gas_price String,
                 status String,
                 method String,
                 details Nullable(String),
                 version UInt64,
                 inserted_at DateTime64(3) DEFAULT now64()",
        order_by: "agent, tx_hash",
    },
    TableSchema {
        name: "agent_receipts",
        columns: "agent FixedString(20),
                 action String,
                 tx_hash FixedString(32),
                 sender FixedString(20),
                 recipient FixedString(20),
                 value String,
                 status String,
                 block_number UInt64,
                 gas_used UInt64,
                 version UInt64,
                 inserted_at DateTime64(3) DEFAULT now64()",
        order_by: "agent, tx_hash",
    },
    TableSchema {
        name: "permissions",
        columns: "agent FixedString(20),
                 name String,
                 grantee FixedString(20),
                 scope String,
                 active Bool,
                 granted_at_ms UInt64,
                 version UInt64,
                 inserted_at DateTime64(3) DEFAULT now64()",
        order_by: "agent, name, grantee",
    },
    TableSchema {
        name: "snapshots",
        columns: "agent FixedString(20),
                 root FixedString(32),
                 parent Nullable(FixedString(32)),
                 size UInt64,
                 block_number UInt64,
                 metadata Nullable(String),
                 created_at_ms UInt64,
                 version UInt64,
                 inserted_at DateTime64(3) DEFAULT now64()",
        order_by: "agent, root",
    },
    TableSchema {
        name: "sync_state",
        columns: "id UInt8,
                 last_synced_block UInt64,
                 last_sync_ms Nullable(UInt64),
                 is_live Bool,
                 version UInt64,
                 inserted_at DateTime64(3) DEFAULT now64()",
        order_by: "id",
    },
];
