//! Receipt token rows
//!
//! Pre-provisioned, named, single-use tokens. A token is CONSUMED if and
//! only if it is linked to exactly one payment; the transition happens
//! inside the payment coordinator's transaction, never here in isolation.

use rusqlite::{params, Connection, Row};
use serde::{Deserialize, Serialize};

use crate::error::{LedgerError, Result};

/// Consumption state of a receipt token
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum TokenStatus {
    Available,
    Consumed,
}

impl TokenStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TokenStatus::Available => "AVAILABLE",
            TokenStatus::Consumed => "CONSUMED",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "AVAILABLE" => Some(TokenStatus::Available),
            "CONSUMED" => Some(TokenStatus::Consumed),
            _ => None,
        }
    }
}

/// Receipt token row from database
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReceiptTokenRow {
    pub id: i64,
    pub label: String,
    pub status: TokenStatus,
    #[serde(default)]
    pub consumed_at: Option<String>,
    #[serde(default)]
    pub payment_id: Option<i64>,
}

impl ReceiptTokenRow {
    fn from_row(row: &Row) -> std::result::Result<Self, rusqlite::Error> {
        let status: String = row.get("status")?;
        Ok(Self {
            id: row.get("id")?,
            label: row.get("label")?,
            status: TokenStatus::parse(&status).unwrap_or(TokenStatus::Consumed),
            consumed_at: row.get("consumed_at")?,
            payment_id: row.get("payment_id")?,
        })
    }
}

/// Insert or fully overwrite a receipt token by remote id (sync pass only)
pub fn upsert_token(conn: &Connection, token: &ReceiptTokenRow) -> Result<()> {
    conn.execute(
        r#"
        INSERT INTO receipt_tokens (id, label, status, consumed_at, payment_id)
        VALUES (?, ?, ?, ?, ?)
        ON CONFLICT(id) DO UPDATE SET
            label = excluded.label,
            status = excluded.status,
            consumed_at = excluded.consumed_at,
            payment_id = excluded.payment_id
        "#,
        params![
            token.id,
            token.label,
            token.status.as_str(),
            token.consumed_at,
            token.payment_id,
        ],
    )
    .map_err(|e| LedgerError::Store(format!("Receipt token upsert failed: {}", e)))?;
    Ok(())
}

/// Get a receipt token by id
pub fn get_token(conn: &Connection, id: i64) -> Result<Option<ReceiptTokenRow>> {
    let mut stmt = conn
        .prepare("SELECT * FROM receipt_tokens WHERE id = ?")
        .map_err(|e| LedgerError::Store(format!("Prepare failed: {}", e)))?;

    let mut rows = stmt
        .query_map(params![id], ReceiptTokenRow::from_row)
        .map_err(|e| LedgerError::Store(format!("Query failed: {}", e)))?;

    rows.next()
        .transpose()
        .map_err(|e| LedgerError::Store(format!("Row parse failed: {}", e)))
}

/// List tokens still available for use, lowest id first
pub fn list_available_tokens(conn: &Connection, limit: u32) -> Result<Vec<ReceiptTokenRow>> {
    let mut stmt = conn
        .prepare("SELECT * FROM receipt_tokens WHERE status = 'AVAILABLE' ORDER BY id LIMIT ?")
        .map_err(|e| LedgerError::Store(format!("Prepare failed: {}", e)))?;

    let rows = stmt
        .query_map(params![limit], ReceiptTokenRow::from_row)
        .map_err(|e| LedgerError::Store(format!("Query failed: {}", e)))?;

    rows.collect::<std::result::Result<Vec<_>, _>>()
        .map_err(|e| LedgerError::Store(format!("Row parse failed: {}", e)))
}

/// Count tokens by status: (available, consumed)
pub fn count_tokens(conn: &Connection) -> Result<(u64, u64)> {
    let available: i64 = conn
        .query_row(
            "SELECT COUNT(*) FROM receipt_tokens WHERE status = 'AVAILABLE'",
            [],
            |row| row.get(0),
        )
        .map_err(|e| LedgerError::Store(format!("Query failed: {}", e)))?;

    let consumed: i64 = conn
        .query_row(
            "SELECT COUNT(*) FROM receipt_tokens WHERE status = 'CONSUMED'",
            [],
            |row| row.get(0),
        )
        .map_err(|e| LedgerError::Store(format!("Query failed: {}", e)))?;

    Ok((available as u64, consumed as u64))
}

/// Flip a token to CONSUMED, linking it to its payment.
/// Caller must run this inside the same transaction as the payment insert.
pub fn mark_consumed(
    conn: &Connection,
    token_id: i64,
    payment_id: i64,
    consumed_at: &str,
) -> Result<()> {
    let changes = conn
        .execute(
            "UPDATE receipt_tokens
             SET status = 'CONSUMED', consumed_at = ?, payment_id = ?
             WHERE id = ? AND status = 'AVAILABLE'",
            params![consumed_at, payment_id, token_id],
        )
        .map_err(|e| LedgerError::Store(format!("Token update failed: {}", e)))?;

    if changes == 0 {
        return Err(LedgerError::TokenAlreadyConsumed(token_id));
    }
    Ok(())
}

/// Reset a token to AVAILABLE with no consumption timestamp and no payment
/// link (compensating cancellation only)
pub fn reset_token(conn: &Connection, token_id: i64) -> Result<()> {
    let changes = conn
        .execute(
            "UPDATE receipt_tokens
             SET status = 'AVAILABLE', consumed_at = NULL, payment_id = NULL
             WHERE id = ?",
            params![token_id],
        )
        .map_err(|e| LedgerError::Store(format!("Token reset failed: {}", e)))?;

    if changes == 0 {
        return Err(LedgerError::TokenNotFound(token_id));
    }
    Ok(())
}
