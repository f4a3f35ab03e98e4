//! Payment rows and per-session aggregates
//!
//! Payment rows are created exactly once per remote-assigned id. Outside the
//! sync pass they transition only through the payment coordinator.

use rusqlite::{params, Connection, Row};
use serde::{Deserialize, Serialize};

use crate::error::{LedgerError, Result};

/// Payment row from database
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaymentRow {
    pub id: i64,
    pub amount: i64,
    pub kind: String,
    pub paid_at: String,
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

impl PaymentRow {
    fn from_row(row: &Row) -> std::result::Result<Self, rusqlite::Error> {
        Ok(Self {
            id: row.get("id")?,
            amount: row.get("amount")?,
            kind: row.get("kind")?,
            paid_at: row.get("paid_at")?,
            reason: row.get("reason")?,
            merchant_id: row.get("merchant_id")?,
            stall_id: row.get("stall_id")?,
            session_id: row.get("session_id")?,
            agent_id: row.get("agent_id")?,
            receipt_token_id: row.get("receipt_token_id")?,
        })
    }
}

/// Insert or fully overwrite a payment by remote id (sync pass only)
pub fn upsert_payment(conn: &Connection, payment: &PaymentRow) -> Result<()> {
    conn.execute(
        r#"
        INSERT INTO payments
            (id, amount, kind, paid_at, reason, merchant_id, stall_id,
             session_id, agent_id, receipt_token_id)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        ON CONFLICT(id) DO UPDATE SET
            amount = excluded.amount,
            kind = excluded.kind,
            paid_at = excluded.paid_at,
            reason = excluded.reason,
            merchant_id = excluded.merchant_id,
            stall_id = excluded.stall_id,
            session_id = excluded.session_id,
            agent_id = excluded.agent_id,
            receipt_token_id = excluded.receipt_token_id
        "#,
        params![
            payment.id,
            payment.amount,
            payment.kind,
            payment.paid_at,
            payment.reason,
            payment.merchant_id,
            payment.stall_id,
            payment.session_id,
            payment.agent_id,
            payment.receipt_token_id,
        ],
    )
    .map_err(|e| LedgerError::Store(format!("Payment upsert failed: {}", e)))?;
    Ok(())
}

/// Strict insert with the caller-supplied remote-assigned id.
/// A row with the same id surfaces as `DuplicatePaymentId`, giving
/// at-most-once local application on caller retry.
pub fn insert_payment(conn: &Connection, payment: &PaymentRow) -> Result<()> {
    let exists: bool = conn
        .query_row("SELECT 1 FROM payments WHERE id = ?", params![payment.id], |_| Ok(true))
        .unwrap_or(false);

    if exists {
        return Err(LedgerError::DuplicatePaymentId(payment.id));
    }

    conn.execute(
        r#"
        INSERT INTO payments
            (id, amount, kind, paid_at, reason, merchant_id, stall_id,
             session_id, agent_id, receipt_token_id)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
        params![
            payment.id,
            payment.amount,
            payment.kind,
            payment.paid_at,
            payment.reason,
            payment.merchant_id,
            payment.stall_id,
            payment.session_id,
            payment.agent_id,
            payment.receipt_token_id,
        ],
    )
    .map_err(|e| match e {
        // SQLITE_CONSTRAINT_PRIMARYKEY: the id was taken between the
        // exists-check and the insert
        rusqlite::Error::SqliteFailure(err, _) if err.extended_code == 1555 => {
            LedgerError::DuplicatePaymentId(payment.id)
        }
        other => LedgerError::Store(format!("Payment insert failed: {}", other)),
    })?;
    Ok(())
}

/// Delete a payment row (compensating cancellation only)
pub fn delete_payment(conn: &Connection, id: i64) -> Result<bool> {
    let changes = conn
        .execute("DELETE FROM payments WHERE id = ?", params![id])
        .map_err(|e| LedgerError::Store(format!("Payment delete failed: {}", e)))?;
    Ok(changes > 0)
}

/// Get a payment by id
pub fn get_payment(conn: &Connection, id: i64) -> Result<Option<PaymentRow>> {
    let mut stmt = conn
        .prepare("SELECT * FROM payments WHERE id = ?")
        .map_err(|e| LedgerError::Store(format!("Prepare failed: {}", e)))?;

    let mut rows = stmt
        .query_map(params![id], PaymentRow::from_row)
        .map_err(|e| LedgerError::Store(format!("Query failed: {}", e)))?;

    rows.next()
        .transpose()
        .map_err(|e| LedgerError::Store(format!("Row parse failed: {}", e)))
}

/// List payments recorded in a session, newest first
pub fn list_payments_for_session(conn: &Connection, session_id: i64) -> Result<Vec<PaymentRow>> {
    let mut stmt = conn
        .prepare("SELECT * FROM payments WHERE session_id = ? ORDER BY paid_at DESC")
        .map_err(|e| LedgerError::Store(format!("Prepare failed: {}", e)))?;

    let rows = stmt
        .query_map(params![session_id], PaymentRow::from_row)
        .map_err(|e| LedgerError::Store(format!("Query failed: {}", e)))?;

    rows.collect::<std::result::Result<Vec<_>, _>>()
        .map_err(|e| LedgerError::Store(format!("Row parse failed: {}", e)))
}

/// Aggregates for one session, for UI display and submission review
#[derive(Debug, Clone, Serialize)]
pub struct SessionTotals {
    pub session_id: i64,
    pub count: u64,
    pub total_amount: i64,
    pub by_kind: Vec<KindTotal>,
}

/// Per-payment-kind subtotal
#[derive(Debug, Clone, Serialize)]
pub struct KindTotal {
    pub kind: String,
    pub count: u64,
    pub amount: i64,
}

/// Compute count and amount totals for a session, broken down by kind
pub fn session_totals(conn: &Connection, session_id: i64) -> Result<SessionTotals> {
    let (count, total_amount): (i64, i64) = conn
        .query_row(
            "SELECT COUNT(*), COALESCE(SUM(amount), 0) FROM payments WHERE session_id = ?",
            params![session_id],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )
        .map_err(|e| LedgerError::Store(format!("Query failed: {}", e)))?;

    let mut stmt = conn
        .prepare(
            "SELECT kind, COUNT(*), COALESCE(SUM(amount), 0)
             FROM payments WHERE session_id = ?
             GROUP BY kind ORDER BY kind",
        )
        .map_err(|e| LedgerError::Store(format!("Prepare failed: {}", e)))?;

    let by_kind = stmt
        .query_map(params![session_id], |row| {
            Ok(KindTotal {
                kind: row.get(0)?,
                count: row.get::<_, i64>(1)? as u64,
                amount: row.get(2)?,
            })
        })
        .map_err(|e| LedgerError::Store(format!("Query failed: {}", e)))?
        .collect::<std::result::Result<Vec<_>, _>>()
        .map_err(|e| LedgerError::Store(format!("Row parse failed: {}", e)))?;

    Ok(SessionTotals {
        session_id,
        count: count as u64,
        total_amount,
        by_kind,
    })
}
