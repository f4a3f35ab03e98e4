//! Database schema definitions

use rusqlite::Connection;
use tracing::info;

use crate::error::{LedgerError, Result};

/// Current schema version for migrations
pub const SCHEMA_VERSION: i32 = 1;

/// Initialize the database schema
pub fn init_schema(conn: &Connection) -> Result<()> {
    let current_version = get_schema_version(conn)?;

    if current_version == 0 {
        info!("Creating new database schema v{}", SCHEMA_VERSION);
        create_tables(conn)?;
        set_schema_version(conn, SCHEMA_VERSION)?;
    } else if current_version < SCHEMA_VERSION {
        info!("Migrating schema from v{} to v{}", current_version, SCHEMA_VERSION);
        migrate_schema(conn, current_version)?;
    } else {
        info!("Database schema is up to date (v{})", current_version);
    }

    Ok(())
}

/// Get current schema version (0 if not initialized)
fn get_schema_version(conn: &Connection) -> Result<i32> {
    conn.execute(
        "CREATE TABLE IF NOT EXISTS schema_version (version INTEGER NOT NULL)",
        [],
    )
    .map_err(|e| LedgerError::Store(format!("Failed to create schema_version table: {}", e)))?;

    let version: i32 = conn
        .query_row("SELECT version FROM schema_version LIMIT 1", [], |row| row.get(0))
        .unwrap_or(0);

    Ok(version)
}

/// Set schema version
fn set_schema_version(conn: &Connection, version: i32) -> Result<()> {
    conn.execute("DELETE FROM schema_version", [])
        .map_err(|e| LedgerError::Store(format!("Failed to clear schema_version: {}", e)))?;
    conn.execute("INSERT INTO schema_version (version) VALUES (?)", [version])
        .map_err(|e| LedgerError::Store(format!("Failed to set schema_version: {}", e)))?;
    Ok(())
}

/// Create all tables
fn create_tables(conn: &Connection) -> Result<()> {
    conn.execute_batch(HIERARCHY_SCHEMA)
        .map_err(|e| LedgerError::Store(format!("Failed to create hierarchy tables: {}", e)))?;

    conn.execute_batch(LEDGER_SCHEMA)
        .map_err(|e| LedgerError::Store(format!("Failed to create ledger tables: {}", e)))?;

    conn.execute_batch(INDEXES_SCHEMA)
        .map_err(|e| LedgerError::Store(format!("Failed to create indexes: {}", e)))?;

    Ok(())
}

/// Migrate schema from older version
fn migrate_schema(conn: &Connection, from_version: i32) -> Result<()> {
    match from_version {
        // 1 -> 2 migration would go here
        _ => {}
    }

    set_schema_version(conn, SCHEMA_VERSION)?;
    Ok(())
}

/// Physical market layout and the people occupying it.
/// All ids are assigned by the remote ledger; rows are refreshed by sync only.
const HIERARCHY_SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS markets (
    id INTEGER PRIMARY KEY NOT NULL,
    name TEXT NOT NULL,
    commune TEXT
);

CREATE TABLE IF NOT EXISTS zones (
    id INTEGER PRIMARY KEY NOT NULL,
    market_id INTEGER NOT NULL,
    name TEXT NOT NULL,
    FOREIGN KEY (market_id) REFERENCES markets(id)
);

CREATE TABLE IF NOT EXISTS halls (
    id INTEGER PRIMARY KEY NOT NULL,
    market_id INTEGER NOT NULL,
    zone_id INTEGER,
    name TEXT NOT NULL,
    FOREIGN KEY (market_id) REFERENCES markets(id),
    FOREIGN KEY (zone_id) REFERENCES zones(id)
);

CREATE TABLE IF NOT EXISTS merchants (
    id INTEGER PRIMARY KEY NOT NULL,
    first_name TEXT NOT NULL,
    last_name TEXT NOT NULL,
    phone TEXT,
    payment_status TEXT NOT NULL DEFAULT 'current'
);

CREATE TABLE IF NOT EXISTS stalls (
    id INTEGER PRIMARY KEY NOT NULL,
    number TEXT NOT NULL,
    status TEXT NOT NULL DEFAULT 'available',
    annual_fee INTEGER NOT NULL DEFAULT 0,
    market_id INTEGER,
    zone_id INTEGER,
    hall_id INTEGER,
    merchant_id INTEGER,
    FOREIGN KEY (market_id) REFERENCES markets(id),
    FOREIGN KEY (zone_id) REFERENCES zones(id),
    FOREIGN KEY (hall_id) REFERENCES halls(id),
    FOREIGN KEY (merchant_id) REFERENCES merchants(id)
);
"#;

/// Collection sessions, payments and receipt tokens.
const LEDGER_SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS sessions (
    id INTEGER PRIMARY KEY NOT NULL,
    agent_id INTEGER NOT NULL,
    status TEXT NOT NULL DEFAULT 'OPEN',
    opened_at TEXT NOT NULL,
    closed_at TEXT
);

-- At most one collection window may be open at a time
CREATE UNIQUE INDEX IF NOT EXISTS idx_sessions_one_open
    ON sessions(status) WHERE status = 'OPEN';

-- receipt_token_id carries no FK: receipt tokens are applied after
-- payments by the sync pass
CREATE TABLE IF NOT EXISTS payments (
    id INTEGER PRIMARY KEY NOT NULL,
    amount INTEGER NOT NULL,
    kind TEXT NOT NULL,
    paid_at TEXT NOT NULL,
    reason TEXT,
    merchant_id INTEGER,
    stall_id INTEGER,
    session_id INTEGER NOT NULL,
    agent_id INTEGER NOT NULL,
    receipt_token_id INTEGER NOT NULL UNIQUE,
    FOREIGN KEY (merchant_id) REFERENCES merchants(id) ON DELETE RESTRICT,
    FOREIGN KEY (stall_id) REFERENCES stalls(id) ON DELETE RESTRICT,
    FOREIGN KEY (session_id) REFERENCES sessions(id) ON DELETE RESTRICT
);

-- payment_id is set if and only if status = 'CONSUMED'
CREATE TABLE IF NOT EXISTS receipt_tokens (
    id INTEGER PRIMARY KEY NOT NULL,
    label TEXT NOT NULL,
    status TEXT NOT NULL DEFAULT 'AVAILABLE',
    consumed_at TEXT,
    payment_id INTEGER,
    FOREIGN KEY (payment_id) REFERENCES payments(id)
);

CREATE TABLE IF NOT EXISTS sync_metadata (
    id INTEGER PRIMARY KEY CHECK (id = 1),
    last_sync TEXT,
    status TEXT NOT NULL,
    error TEXT
);
"#;

/// Index definitions for fast queries
const INDEXES_SCHEMA: &str = r#"
CREATE INDEX IF NOT EXISTS idx_zones_market ON zones(market_id);
CREATE INDEX IF NOT EXISTS idx_halls_market ON halls(market_id);
CREATE INDEX IF NOT EXISTS idx_halls_zone ON halls(zone_id);

CREATE INDEX IF NOT EXISTS idx_merchants_status ON merchants(payment_status);
CREATE INDEX IF NOT EXISTS idx_merchants_name ON merchants(last_name, first_name);

CREATE INDEX IF NOT EXISTS idx_stalls_market ON stalls(market_id);
CREATE INDEX IF NOT EXISTS idx_stalls_merchant ON stalls(merchant_id);
CREATE INDEX IF NOT EXISTS idx_stalls_status ON stalls(status);

CREATE INDEX IF NOT EXISTS idx_payments_session ON payments(session_id);
CREATE INDEX IF NOT EXISTS idx_payments_merchant ON payments(merchant_id);
CREATE INDEX IF NOT EXISTS idx_payments_paid_at ON payments(paid_at);

CREATE INDEX IF NOT EXISTS idx_receipt_tokens_status ON receipt_tokens(status);
"#;
