//! Synchronization engine
//!
//! Pulls a full dataset snapshot from the remote ledger and upserts it into
//! the local store in strict dependency order: markets -> zones -> halls ->
//! merchants -> stalls -> sessions -> payments -> receipt tokens. Each
//! table's pass runs in its own transaction; the pass as a whole is
//! deliberately not one global transaction. Every upsert is a same-id full
//! overwrite, so replaying a snapshot is idempotent and the next successful
//! sync self-heals whatever partial state an interrupted pass left behind.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use rusqlite::Connection;
use serde::Serialize;
use tracing::{info, warn};

use crate::client::{DatasetSnapshot, RemoteLedger};
use crate::db::{self, sync_meta, LocalDb, SyncMetadata, SyncStatus};
use crate::error::Result;

/// Per-table applied counts from one sync pass
#[derive(Debug, Clone, Default, Serialize)]
pub struct SyncReport {
    pub generated_at: String,
    pub markets: u64,
    pub zones: u64,
    pub halls: u64,
    pub merchants: u64,
    pub stalls: u64,
    pub sessions: u64,
    pub payments: u64,
    pub receipt_tokens: u64,
}

impl SyncReport {
    /// Total rows applied across all tables
    pub fn total(&self) -> u64 {
        self.markets
            + self.zones
            + self.halls
            + self.merchants
            + self.stalls
            + self.sessions
            + self.payments
            + self.receipt_tokens
    }
}

/// Synchronization orchestrator
pub struct SyncEngine {
    db: Arc<LocalDb>,
    client: Arc<dyn RemoteLedger>,
}

impl SyncEngine {
    pub fn new(db: Arc<LocalDb>, client: Arc<dyn RemoteLedger>) -> Self {
        Self { db, client }
    }

    /// Pull a snapshot and apply it to the local store.
    ///
    /// On failure the outcome is recorded in sync metadata (preserving the
    /// last successful timestamp) and the error is returned; the store is
    /// left in its last coherent, idempotently-replayable state.
    pub async fn perform_sync(&self) -> Result<SyncReport> {
        info!("Starting sync");

        let snapshot = match self.client.fetch_snapshot().await {
            Ok(snapshot) => snapshot,
            Err(e) => {
                warn!("Snapshot fetch failed: {}", e);
                self.record_error(&e.to_string())?;
                return Err(e);
            }
        };

        let report = match self.apply_snapshot(&snapshot) {
            Ok(report) => report,
            Err(e) => {
                warn!("Snapshot apply failed: {}", e);
                self.record_error(&e.to_string())?;
                return Err(e);
            }
        };

        self.db.with_conn(|conn| {
            sync_meta::write(
                conn,
                &SyncMetadata {
                    last_sync: Some(snapshot.generated_at.clone()),
                    status: SyncStatus::Success,
                    error: None,
                },
            )
        })?;

        info!(
            rows = report.total(),
            generated_at = %report.generated_at,
            "Sync complete"
        );
        Ok(report)
    }

    /// Upsert all snapshot tables in dependency order
    fn apply_snapshot(&self, snapshot: &DatasetSnapshot) -> Result<SyncReport> {
        self.db.with_conn_mut(|conn| {
            let mut report = SyncReport {
                generated_at: snapshot.generated_at.clone(),
                ..Default::default()
            };

            report.markets = apply_table(conn, &snapshot.markets, db::markets::upsert_market)?;
            report.zones = apply_table(conn, &snapshot.zones, db::markets::upsert_zone)?;
            report.halls = apply_table(conn, &snapshot.halls, db::markets::upsert_hall)?;
            report.merchants =
                apply_table(conn, &snapshot.merchants, db::merchants::upsert_merchant)?;
            report.stalls = apply_table(conn, &snapshot.stalls, db::stalls::upsert_stall)?;
            report.sessions =
                apply_table(conn, &snapshot.sessions, db::sessions::upsert_session)?;
            report.payments =
                apply_table(conn, &snapshot.payments, db::payments::upsert_payment)?;
            report.receipt_tokens =
                apply_table(conn, &snapshot.receipt_tokens, db::receipts::upsert_token)?;

            Ok(report)
        })
    }

    /// Record a failed sync, keeping the last successful timestamp
    fn record_error(&self, message: &str) -> Result<()> {
        self.db.with_conn(|conn| {
            let last_sync = sync_meta::read(conn)?.and_then(|m| m.last_sync);
            sync_meta::write(
                conn,
                &SyncMetadata {
                    last_sync,
                    status: SyncStatus::Error,
                    error: Some(message.to_string()),
                },
            )
        })
    }

    /// True when no successful sync exists or the last one is older than
    /// `max_age_hours`. Pure staleness check, no side effects.
    pub fn needs_sync(&self, max_age_hours: i64) -> Result<bool> {
        let last_sync = self
            .db
            .with_conn(|conn| sync_meta::read(conn))?
            .and_then(|m| m.last_sync)
            .and_then(|s| DateTime::parse_from_rfc3339(&s).ok())
            .map(|t| t.with_timezone(&Utc));

        Ok(is_stale(last_sync, Utc::now(), max_age_hours))
    }
}

/// Upsert one table's rows inside a single transaction
fn apply_table<T, F>(conn: &mut Connection, rows: &[T], upsert: F) -> Result<u64>
where
    F: Fn(&Connection, &T) -> Result<()>,
{
    let tx = conn
        .transaction()
        .map_err(|e| crate::error::LedgerError::Store(format!("Transaction failed: {}", e)))?;

    for row in rows {
        upsert(&tx, row)?;
    }

    tx.commit()
        .map_err(|e| crate::error::LedgerError::Store(format!("Commit failed: {}", e)))?;

    Ok(rows.len() as u64)
}

/// Staleness comparison with an explicit clock
pub fn is_stale(
    last_success: Option<DateTime<Utc>>,
    now: DateTime<Utc>,
    max_age_hours: i64,
) -> bool {
    match last_success {
        None => true,
        Some(last) => now - last > Duration::hours(max_age_hours),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stale_without_prior_sync() {
        assert!(is_stale(None, Utc::now(), 24));
    }

    #[test]
    fn test_fresh_sync_is_not_stale() {
        let now = Utc::now();
        assert!(!is_stale(Some(now), now, 24));
    }

    #[test]
    fn test_stale_after_threshold() {
        let last = Utc::now();
        let later = last + Duration::hours(25);
        assert!(is_stale(Some(last), later, 24));

        let within = last + Duration::hours(23);
        assert!(!is_stale(Some(last), within, 24));
    }
}
