//! Wire types for the remote ledger API

use serde::{Deserialize, Serialize};

use crate::db::{
    HallRow, MarketRow, MerchantRow, PaymentRow, ReceiptTokenRow, SessionRow, StallRow, ZoneRow,
};

/// Full point-in-time export of the remote ledger's dataset.
/// Entity arrays the server omits decode as empty.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatasetSnapshot {
    /// Snapshot timestamp assigned by the remote ledger (RFC 3339)
    pub generated_at: String,
    #[serde(default)]
    pub markets: Vec<MarketRow>,
    #[serde(default)]
    pub zones: Vec<ZoneRow>,
    #[serde(default)]
    pub halls: Vec<HallRow>,
    #[serde(default)]
    pub merchants: Vec<MerchantRow>,
    #[serde(default)]
    pub stalls: Vec<StallRow>,
    #[serde(default)]
    pub sessions: Vec<SessionRow>,
    #[serde(default)]
    pub payments: Vec<PaymentRow>,
    #[serde(default)]
    pub receipt_tokens: Vec<ReceiptTokenRow>,
}

/// Payment command submitted to the remote ledger.
///
/// Not idempotent server-side: the caller must not resubmit after an
/// ambiguous failure (timeout after possible acceptance).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentCommand {
    pub amount: i64,
    pub kind: String,
    #[serde(default)]
    pub reason: Option<String>,
    #[serde(default)]
    pub merchant_id: Option<i64>,
    #[serde(default)]
    pub stall_id: Option<i64>,
    pub session_id: i64,
    pub agent_id: i64,
    pub receipt_token_id: i64,
}

/// Acknowledgment returned by the remote ledger for an accepted payment
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentAck {
    /// Ledger-assigned payment id
    pub payment_id: i64,
    pub receipt_token_id: i64,
    /// Server-computed amount
    pub amount: i64,
    /// Server-side payment timestamp (RFC 3339)
    pub paid_at: String,
}
