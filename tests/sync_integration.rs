//! Sync engine integration tests
//!
//! Exercises the full snapshot-apply pass against a real SQLite store with
//! a mock remote ledger:
//! - dependency-ordered upserts with foreign keys enforced
//! - idempotent replay (same snapshot twice, same observable state)
//! - failure recording in sync metadata
//! - staleness checks

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{Duration, Utc};
use market_ledger::db::{
    self, HallRow, MarketRow, MerchantRow, PaymentRow, PaymentStanding, ReceiptTokenRow,
    SessionRow, SessionStatus, StallRow, StallStatus, SyncStatus, TokenStatus, ZoneRow,
};
use market_ledger::sync::is_stale;
use market_ledger::{
    DatasetSnapshot, LedgerError, LocalDb, PaymentAck, PaymentCommand, RemoteLedger, SyncEngine,
};

// =============================================================================
// Mock remote ledgers
// =============================================================================

/// Serves a fixed snapshot
struct StaticLedger {
    snapshot: DatasetSnapshot,
}

#[async_trait]
impl RemoteLedger for StaticLedger {
    async fn fetch_snapshot(&self) -> market_ledger::Result<DatasetSnapshot> {
        Ok(self.snapshot.clone())
    }

    async fn submit_payment(&self, command: &PaymentCommand) -> market_ledger::Result<PaymentAck> {
        Ok(PaymentAck {
            payment_id: 900,
            receipt_token_id: command.receipt_token_id,
            amount: command.amount,
            paid_at: Utc::now().to_rfc3339(),
        })
    }
}

/// Always fails with a transport error
struct UnreachableLedger;

#[async_trait]
impl RemoteLedger for UnreachableLedger {
    async fn fetch_snapshot(&self) -> market_ledger::Result<DatasetSnapshot> {
        Err(LedgerError::Network("connection refused".to_string()))
    }

    async fn submit_payment(&self, _: &PaymentCommand) -> market_ledger::Result<PaymentAck> {
        Err(LedgerError::Network("connection refused".to_string()))
    }
}

// =============================================================================
// Fixtures
// =============================================================================

fn base_snapshot() -> DatasetSnapshot {
    DatasetSnapshot {
        generated_at: Utc::now().to_rfc3339(),
        markets: vec![MarketRow {
            id: 1,
            name: "Grand Marché".to_string(),
            commune: Some("Centre".to_string()),
        }],
        zones: vec![ZoneRow {
            id: 10,
            market_id: 1,
            name: "Zone A".to_string(),
        }],
        halls: vec![],
        merchants: vec![MerchantRow {
            id: 100,
            first_name: "Awa".to_string(),
            last_name: "Diallo".to_string(),
            phone: Some("+223 70 00 00 00".to_string()),
            payment_status: PaymentStanding::Current,
        }],
        stalls: vec![StallRow {
            id: 200,
            number: "A-12".to_string(),
            status: StallStatus::Occupied,
            annual_fee: 60_000,
            market_id: Some(1),
            zone_id: Some(10),
            hall_id: None,
            merchant_id: Some(100),
        }],
        sessions: vec![],
        payments: vec![],
        receipt_tokens: vec![],
    }
}

fn engine_with(snapshot: DatasetSnapshot) -> (Arc<LocalDb>, SyncEngine) {
    let db = Arc::new(LocalDb::open_in_memory().unwrap());
    let engine = SyncEngine::new(Arc::clone(&db), Arc::new(StaticLedger { snapshot }));
    (db, engine)
}

// =============================================================================
// Snapshot application
// =============================================================================

#[tokio::test]
async fn test_sync_empty_store_populates_all_tables() {
    let (db, engine) = engine_with(base_snapshot());

    let report = engine.perform_sync().await.unwrap();
    assert_eq!(report.markets, 1);
    assert_eq!(report.zones, 1);
    assert_eq!(report.merchants, 1);
    assert_eq!(report.stalls, 1);
    assert_eq!(report.payments, 0);

    let stats = db.stats().unwrap();
    assert_eq!(stats.markets, 1);
    assert_eq!(stats.zones, 1);
    assert_eq!(stats.merchants, 1);
    assert_eq!(stats.stalls, 1);

    let meta = db
        .with_conn(|conn| db::sync_meta::read(conn))
        .unwrap()
        .expect("metadata row after sync");
    assert_eq!(meta.status, SyncStatus::Success);
    assert!(meta.last_sync.is_some());
    assert!(meta.error.is_none());
}

#[tokio::test]
async fn test_sync_is_idempotent() {
    let snapshot = base_snapshot();
    let (db, engine) = engine_with(snapshot.clone());

    engine.perform_sync().await.unwrap();
    let first = db
        .with_conn(|conn| db::stalls::get_stall(conn, 200))
        .unwrap()
        .unwrap();

    engine.perform_sync().await.unwrap();
    let second = db
        .with_conn(|conn| db::stalls::get_stall(conn, 200))
        .unwrap()
        .unwrap();

    assert_eq!(first, second);
    let stats = db.stats().unwrap();
    assert_eq!(stats.markets, 1);
    assert_eq!(stats.stalls, 1);
}

#[tokio::test]
async fn test_sync_overwrites_changed_rows_by_id() {
    let mut snapshot = base_snapshot();
    let (db, engine) = engine_with(snapshot.clone());
    engine.perform_sync().await.unwrap();

    // Remote reclassifies the merchant and reassigns the stall fee
    snapshot.merchants[0].payment_status = PaymentStanding::SeriousArrears;
    snapshot.stalls[0].annual_fee = 72_000;
    let engine = SyncEngine::new(
        Arc::clone(&db),
        Arc::new(StaticLedger { snapshot }),
    );
    engine.perform_sync().await.unwrap();

    let merchant = db
        .with_conn(|conn| db::merchants::get_merchant(conn, 100))
        .unwrap()
        .unwrap();
    assert_eq!(merchant.payment_status, PaymentStanding::SeriousArrears);

    let stall = db
        .with_conn(|conn| db::stalls::get_stall(conn, 200))
        .unwrap()
        .unwrap();
    assert_eq!(stall.annual_fee, 72_000);

    let stats = db.stats().unwrap();
    assert_eq!(stats.merchants, 1);
    assert_eq!(stats.stalls, 1);
}

#[tokio::test]
async fn test_sync_order_satisfies_foreign_keys() {
    // Stall referencing a hall that only exists in this same snapshot:
    // applying in dependency order must never trip the FK checks
    let mut snapshot = base_snapshot();
    snapshot.halls = vec![HallRow {
        id: 50,
        market_id: 1,
        zone_id: Some(10),
        name: "Halle aux poissons".to_string(),
    }];
    snapshot.stalls[0].hall_id = Some(50);

    let (db, engine) = engine_with(snapshot);
    engine.perform_sync().await.unwrap();

    let stall = db
        .with_conn(|conn| db::stalls::get_stall(conn, 200))
        .unwrap()
        .unwrap();
    assert_eq!(stall.hall_id, Some(50));
}

#[tokio::test]
async fn test_sync_applies_sessions_payments_and_tokens() {
    let opened = Utc::now().to_rfc3339();
    let mut snapshot = base_snapshot();
    snapshot.sessions = vec![SessionRow {
        id: 300,
        agent_id: 7,
        status: SessionStatus::Closed,
        opened_at: opened.clone(),
        closed_at: Some(opened.clone()),
    }];
    snapshot.payments = vec![PaymentRow {
        id: 400,
        amount: 5_000,
        kind: "daily-fee".to_string(),
        paid_at: opened.clone(),
        reason: None,
        merchant_id: Some(100),
        stall_id: Some(200),
        session_id: 300,
        agent_id: 7,
        receipt_token_id: 500,
    }];
    snapshot.receipt_tokens = vec![ReceiptTokenRow {
        id: 500,
        label: "Q-2026-000500".to_string(),
        status: TokenStatus::Consumed,
        consumed_at: Some(opened.clone()),
        payment_id: Some(400),
    }];

    let (db, engine) = engine_with(snapshot);
    let report = engine.perform_sync().await.unwrap();
    assert_eq!(report.sessions, 1);
    assert_eq!(report.payments, 1);
    assert_eq!(report.receipt_tokens, 1);

    let token = db
        .with_conn(|conn| db::receipts::get_token(conn, 500))
        .unwrap()
        .unwrap();
    assert_eq!(token.status, TokenStatus::Consumed);
    assert_eq!(token.payment_id, Some(400));
}

// =============================================================================
// Failure handling
// =============================================================================

#[tokio::test]
async fn test_fetch_failure_records_error_and_leaves_store_untouched() {
    let db = Arc::new(LocalDb::open_in_memory().unwrap());
    let engine = SyncEngine::new(Arc::clone(&db), Arc::new(UnreachableLedger));

    let err = engine.perform_sync().await.unwrap_err();
    assert!(matches!(err, LedgerError::Network(_)));

    let meta = db
        .with_conn(|conn| db::sync_meta::read(conn))
        .unwrap()
        .expect("metadata row after failed sync");
    assert_eq!(meta.status, SyncStatus::Error);
    assert!(meta.last_sync.is_none());
    assert!(meta.error.unwrap().contains("connection refused"));

    assert_eq!(db.stats().unwrap().markets, 0);
}

#[tokio::test]
async fn test_fetch_failure_preserves_last_successful_timestamp() {
    let (db, engine) = engine_with(base_snapshot());
    engine.perform_sync().await.unwrap();

    let last_sync = db
        .with_conn(|conn| db::sync_meta::read(conn))
        .unwrap()
        .unwrap()
        .last_sync;
    assert!(last_sync.is_some());

    let failing = SyncEngine::new(Arc::clone(&db), Arc::new(UnreachableLedger));
    failing.perform_sync().await.unwrap_err();

    let meta = db
        .with_conn(|conn| db::sync_meta::read(conn))
        .unwrap()
        .unwrap();
    assert_eq!(meta.status, SyncStatus::Error);
    assert_eq!(meta.last_sync, last_sync);
}

// =============================================================================
// Staleness
// =============================================================================

#[tokio::test]
async fn test_needs_sync_before_and_after_first_sync() {
    let (_db, engine) = engine_with(base_snapshot());

    assert!(engine.needs_sync(24).unwrap());

    engine.perform_sync().await.unwrap();
    assert!(!engine.needs_sync(24).unwrap());
}

#[test]
fn test_staleness_threshold_with_explicit_clock() {
    let last = Utc::now();

    assert!(is_stale(None, last, 24));
    assert!(!is_stale(Some(last), last + Duration::hours(23), 24));
    assert!(is_stale(Some(last), last + Duration::hours(25), 24));
}

// =============================================================================
// Snapshot decoding
// =============================================================================

#[test]
fn test_snapshot_decodes_with_missing_arrays() {
    let snapshot: DatasetSnapshot = serde_json::from_str(
        r#"{
            "generated_at": "2026-08-01T06:00:00Z",
            "markets": [{"id": 1, "name": "Grand Marché"}]
        }"#,
    )
    .unwrap();

    assert_eq!(snapshot.markets.len(), 1);
    assert!(snapshot.markets[0].commune.is_none());
    assert!(snapshot.zones.is_empty());
    assert!(snapshot.receipt_tokens.is_empty());
}

#[test]
fn test_snapshot_decodes_entity_statuses() {
    let snapshot: DatasetSnapshot = serde_json::from_str(
        r#"{
            "generated_at": "2026-08-01T06:00:00Z",
            "merchants": [{
                "id": 5, "first_name": "Moussa", "last_name": "Traoré",
                "payment_status": "critical-arrears"
            }],
            "receipt_tokens": [{"id": 9, "label": "Q-9", "status": "AVAILABLE"}]
        }"#,
    )
    .unwrap();

    assert_eq!(
        snapshot.merchants[0].payment_status,
        PaymentStanding::CriticalArrears
    );
    assert_eq!(snapshot.receipt_tokens[0].status, TokenStatus::Available);
}

// =============================================================================
// On-disk store
// =============================================================================

#[tokio::test]
async fn test_sync_on_disk_store_survives_reopen() {
    let dir = tempfile::TempDir::new().unwrap();
    let db_path = dir.path().join("ledger.db");

    {
        let db = Arc::new(LocalDb::open(&db_path).unwrap());
        let engine = SyncEngine::new(
            Arc::clone(&db),
            Arc::new(StaticLedger {
                snapshot: base_snapshot(),
            }),
        );
        engine.perform_sync().await.unwrap();
    }

    let reopened = LocalDb::open(&db_path).unwrap();
    let stats = reopened.stats().unwrap();
    assert_eq!(stats.markets, 1);
    assert_eq!(stats.stalls, 1);

    let meta = reopened
        .with_conn(|conn| db::sync_meta::read(conn))
        .unwrap()
        .unwrap();
    assert_eq!(meta.status, SyncStatus::Success);
}
