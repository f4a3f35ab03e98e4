//! Singleton sync-outcome row
//!
//! One logical row recording the last successful sync timestamp, the last
//! outcome and the last error message. Overwrite-on-write; consulted by
//! the staleness check and surfaced for UI display.

use rusqlite::{params, Connection};
use serde::{Deserialize, Serialize};

use crate::error::{LedgerError, Result};

/// Outcome of the most recent sync attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SyncStatus {
    Success,
    Error,
}

impl SyncStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SyncStatus::Success => "success",
            SyncStatus::Error => "error",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "success" => Some(SyncStatus::Success),
            "error" => Some(SyncStatus::Error),
            _ => None,
        }
    }
}

/// Sync metadata singleton
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyncMetadata {
    /// Timestamp of the last successful sync (RFC 3339)
    pub last_sync: Option<String>,
    pub status: SyncStatus,
    pub error: Option<String>,
}

/// Read the singleton row; `None` before the first sync attempt
pub fn read(conn: &Connection) -> Result<Option<SyncMetadata>> {
    let mut stmt = conn
        .prepare("SELECT last_sync, status, error FROM sync_metadata WHERE id = 1")
        .map_err(|e| LedgerError::Store(format!("Prepare failed: {}", e)))?;

    let mut rows = stmt
        .query_map([], |row| {
            let status: String = row.get("status")?;
            Ok(SyncMetadata {
                last_sync: row.get("last_sync")?,
                status: SyncStatus::parse(&status).unwrap_or(SyncStatus::Error),
                error: row.get("error")?,
            })
        })
        .map_err(|e| LedgerError::Store(format!("Query failed: {}", e)))?;

    rows.next()
        .transpose()
        .map_err(|e| LedgerError::Store(format!("Row parse failed: {}", e)))
}

/// Overwrite the singleton row
pub fn write(conn: &Connection, meta: &SyncMetadata) -> Result<()> {
    conn.execute(
        r#"
        INSERT INTO sync_metadata (id, last_sync, status, error)
        VALUES (1, ?, ?, ?)
        ON CONFLICT(id) DO UPDATE SET
            last_sync = excluded.last_sync,
            status = excluded.status,
            error = excluded.error
        "#,
        params![meta.last_sync, meta.status.as_str(), meta.error],
    )
    .map_err(|e| LedgerError::Store(format!("Sync metadata write failed: {}", e)))?;
    Ok(())
}
