//! Market Ledger - offline-first transactional core for market-stall fee
//! collection
//!
//! Field agents keep collecting fees while offline; this library keeps the
//! device reconciled with the central ledger once connectivity returns.
//!
//! ## Architecture
//!
//! - **Local store** (`db`): SQLite mirror of the remote dataset with
//!   referential integrity and WAL durability
//! - **Remote ledger client** (`client`): stateless HTTP client pulling
//!   full snapshots and submitting payment commands
//! - **Sync engine** (`sync`): ordered, idempotent upsert pass plus a
//!   staleness check
//! - **Payment coordinator** (`payment`): atomically records a confirmed
//!   payment and consumes its single-use receipt token
//!
//! ## Write discipline
//!
//! The application layer never writes to the store directly. Synced
//! entities change only through the sync engine; payments and receipt
//! tokens change only through the payment coordinator, and only after the
//! remote ledger has acknowledged the payment.
//!
//! ## Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use market_ledger::{Config, HttpLedgerClient, LocalDb, PaymentCoordinator, SyncEngine};
//!
//! # async fn example() -> market_ledger::Result<()> {
//! let config = Config::default();
//! let db = Arc::new(LocalDb::open(&config.db_path)?);
//! let client = Arc::new(HttpLedgerClient::new(config.remote.clone()));
//!
//! let sync = SyncEngine::new(Arc::clone(&db), client);
//! if sync.needs_sync(config.sync_max_age_hours)? {
//!     sync.perform_sync().await?;
//! }
//!
//! let _coordinator = PaymentCoordinator::new(db);
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod config;
pub mod db;
pub mod error;
pub mod payment;
pub mod sync;

// Re-exports
pub use client::{DatasetSnapshot, HttpLedgerClient, PaymentAck, PaymentCommand, RemoteLedger};
pub use config::{Config, RemoteConfig};
pub use db::{DbStats, LocalDb};
pub use error::{LedgerError, Result};
pub use payment::{NewPayment, PaymentCoordinator, RecordedPayment};
pub use sync::{SyncEngine, SyncReport};
