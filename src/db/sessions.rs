//! Collection session rows
//!
//! A session is a bounded collection window during which an agent records
//! payments before submitting them for validation. Sessions are created
//! locally only after the remote ledger confirms creation, then refreshed
//! by the sync pass like every other synced entity.

use rusqlite::{params, Connection, Row};
use serde::{Deserialize, Serialize};

use crate::error::{LedgerError, Result};

/// Lifecycle status of a collection session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum SessionStatus {
    Open,
    Closed,
    Submitted,
    Validated,
}

impl SessionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionStatus::Open => "OPEN",
            SessionStatus::Closed => "CLOSED",
            SessionStatus::Submitted => "SUBMITTED",
            SessionStatus::Validated => "VALIDATED",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "OPEN" => Some(SessionStatus::Open),
            "CLOSED" => Some(SessionStatus::Closed),
            "SUBMITTED" => Some(SessionStatus::Submitted),
            "VALIDATED" => Some(SessionStatus::Validated),
            _ => None,
        }
    }
}

/// Session row from database
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionRow {
    pub id: i64,
    pub agent_id: i64,
    pub status: SessionStatus,
    pub opened_at: String,
    #[serde(default)]
    pub closed_at: Option<String>,
}

impl SessionRow {
    fn from_row(row: &Row) -> std::result::Result<Self, rusqlite::Error> {
        let status: String = row.get("status")?;
        Ok(Self {
            id: row.get("id")?,
            agent_id: row.get("agent_id")?,
            status: SessionStatus::parse(&status).unwrap_or(SessionStatus::Closed),
            opened_at: row.get("opened_at")?,
            closed_at: row.get("closed_at")?,
        })
    }
}

/// Insert or fully overwrite a session by remote id
pub fn upsert_session(conn: &Connection, session: &SessionRow) -> Result<()> {
    conn.execute(
        r#"
        INSERT INTO sessions (id, agent_id, status, opened_at, closed_at)
        VALUES (?, ?, ?, ?, ?)
        ON CONFLICT(id) DO UPDATE SET
            agent_id = excluded.agent_id,
            status = excluded.status,
            opened_at = excluded.opened_at,
            closed_at = excluded.closed_at
        "#,
        params![
            session.id,
            session.agent_id,
            session.status.as_str(),
            session.opened_at,
            session.closed_at,
        ],
    )
    .map_err(|e| LedgerError::Store(format!("Session upsert failed: {}", e)))?;
    Ok(())
}

/// Insert a newly opened session (strict insert, remote-confirmed id).
/// Fails if another session is currently OPEN.
pub fn insert_session(conn: &Connection, session: &SessionRow) -> Result<()> {
    conn.execute(
        "INSERT INTO sessions (id, agent_id, status, opened_at, closed_at)
         VALUES (?, ?, ?, ?, ?)",
        params![
            session.id,
            session.agent_id,
            session.status.as_str(),
            session.opened_at,
            session.closed_at,
        ],
    )
    .map_err(|e| LedgerError::Store(format!("Session insert failed: {}", e)))?;
    Ok(())
}

/// Get a session by id
pub fn get_session(conn: &Connection, id: i64) -> Result<Option<SessionRow>> {
    let mut stmt = conn
        .prepare("SELECT * FROM sessions WHERE id = ?")
        .map_err(|e| LedgerError::Store(format!("Prepare failed: {}", e)))?;

    let mut rows = stmt
        .query_map(params![id], SessionRow::from_row)
        .map_err(|e| LedgerError::Store(format!("Query failed: {}", e)))?;

    rows.next()
        .transpose()
        .map_err(|e| LedgerError::Store(format!("Row parse failed: {}", e)))
}

/// Get the currently open session, if any.
/// The schema's partial unique index guarantees at most one.
pub fn current_open_session(conn: &Connection) -> Result<Option<SessionRow>> {
    let mut stmt = conn
        .prepare("SELECT * FROM sessions WHERE status = 'OPEN' LIMIT 1")
        .map_err(|e| LedgerError::Store(format!("Prepare failed: {}", e)))?;

    let mut rows = stmt
        .query_map([], SessionRow::from_row)
        .map_err(|e| LedgerError::Store(format!("Query failed: {}", e)))?;

    rows.next()
        .transpose()
        .map_err(|e| LedgerError::Store(format!("Row parse failed: {}", e)))
}

/// Close a session locally when the agent submits it for validation
pub fn close_session(
    conn: &Connection,
    id: i64,
    closed_at: &str,
    status: SessionStatus,
) -> Result<()> {
    let changes = conn
        .execute(
            "UPDATE sessions SET status = ?, closed_at = ? WHERE id = ?",
            params![status.as_str(), closed_at, id],
        )
        .map_err(|e| LedgerError::Store(format!("Session close failed: {}", e)))?;

    if changes == 0 {
        return Err(LedgerError::Store(format!("Session not found: {}", id)));
    }
    Ok(())
}
