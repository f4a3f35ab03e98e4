//! SQLite mirror of the remote ledger dataset
//!
//! Holds a normalized local copy of markets, zones, halls, merchants,
//! stalls, sessions, payments and receipt tokens, plus one row of sync
//! metadata.
//!
//! ## Write discipline
//!
//! UI code never writes here directly. Synced entities are refreshed by the
//! sync engine's upsert passes; payments and receipt tokens transition only
//! through the payment coordinator. All writes from one logical operation
//! compose into a single rusqlite transaction via `with_conn_mut`.
//!
//! ## Tables
//!
//! - `markets`, `zones`, `halls` - physical layout hierarchy
//! - `merchants` - identity + arrears classification
//! - `stalls` - places, their fee and occupant
//! - `sessions` - collection windows (at most one OPEN)
//! - `payments` - transactional records keyed by remote id
//! - `receipt_tokens` - single-use tokens, AVAILABLE or CONSUMED
//! - `sync_metadata` - singleton last-sync outcome row

pub mod markets;
pub mod merchants;
pub mod payments;
pub mod receipts;
pub mod schema;
pub mod sessions;
pub mod stalls;
pub mod sync_meta;

use std::path::Path;
use std::sync::Mutex;

use rusqlite::Connection;
use tracing::{debug, info};

use crate::error::{LedgerError, Result};

/// Local SQLite store for the ledger mirror
pub struct LocalDb {
    conn: Mutex<Connection>,
}

impl LocalDb {
    /// Open or create the local store
    pub fn open<P: AsRef<Path>>(db_path: P) -> Result<Self> {
        let db_path = db_path.as_ref();
        info!("Opening SQLite database at {:?}", db_path);

        if let Some(parent) = db_path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let conn = Connection::open(db_path)
            .map_err(|e| LedgerError::Store(format!("Failed to open SQLite: {}", e)))?;

        // WAL for concurrent reads, FK enforcement for referential integrity
        conn.execute_batch(
            "PRAGMA journal_mode=WAL; PRAGMA synchronous=NORMAL; PRAGMA foreign_keys=ON;",
        )
        .map_err(|e| LedgerError::Store(format!("Failed to set PRAGMA: {}", e)))?;

        let db = Self {
            conn: Mutex::new(conn),
        };

        db.init_schema()?;

        Ok(db)
    }

    /// Open an in-memory database (for testing)
    pub fn open_in_memory() -> Result<Self> {
        debug!("Opening in-memory SQLite database");

        let conn = Connection::open_in_memory()
            .map_err(|e| LedgerError::Store(format!("Failed to open in-memory SQLite: {}", e)))?;

        conn.execute_batch("PRAGMA foreign_keys=ON;")
            .map_err(|e| LedgerError::Store(format!("Failed to set PRAGMA: {}", e)))?;

        let db = Self {
            conn: Mutex::new(conn),
        };

        db.init_schema()?;

        Ok(db)
    }

    /// Initialize database schema
    fn init_schema(&self) -> Result<()> {
        let conn = self
            .conn
            .lock()
            .map_err(|e| LedgerError::Store(format!("Lock poisoned: {}", e)))?;

        schema::init_schema(&conn)?;

        Ok(())
    }

    /// Run a read operation against the connection
    pub fn with_conn<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&Connection) -> Result<T>,
    {
        let conn = self
            .conn
            .lock()
            .map_err(|e| LedgerError::Store(format!("Lock poisoned: {}", e)))?;
        f(&conn)
    }

    /// Run a write operation with exclusive access (for transactions)
    pub fn with_conn_mut<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&mut Connection) -> Result<T>,
    {
        let mut conn = self
            .conn
            .lock()
            .map_err(|e| LedgerError::Store(format!("Lock poisoned: {}", e)))?;
        f(&mut conn)
    }

    /// Get row counts for UI display
    pub fn stats(&self) -> Result<DbStats> {
        self.with_conn(|conn| {
            let count = |table: &str| -> Result<u64> {
                let n: i64 = conn
                    .query_row(&format!("SELECT COUNT(*) FROM {}", table), [], |row| row.get(0))
                    .map_err(|e| LedgerError::Store(format!("Query failed: {}", e)))?;
                Ok(n as u64)
            };

            Ok(DbStats {
                markets: count("markets")?,
                zones: count("zones")?,
                halls: count("halls")?,
                merchants: count("merchants")?,
                stalls: count("stalls")?,
                sessions: count("sessions")?,
                payments: count("payments")?,
                receipt_tokens: count("receipt_tokens")?,
            })
        })
    }
}

/// Database statistics
#[derive(Debug, Clone, serde::Serialize)]
pub struct DbStats {
    pub markets: u64,
    pub zones: u64,
    pub halls: u64,
    pub merchants: u64,
    pub stalls: u64,
    pub sessions: u64,
    pub payments: u64,
    pub receipt_tokens: u64,
}

// Re-exports
pub use markets::{HallRow, MarketRow, ZoneRow};
pub use merchants::{MerchantRow, PaymentStanding};
pub use payments::{PaymentRow, SessionTotals};
pub use receipts::{ReceiptTokenRow, TokenStatus};
pub use sessions::{SessionRow, SessionStatus};
pub use stalls::{StallFilter, StallRow, StallStatus};
pub use sync_meta::{SyncMetadata, SyncStatus};
