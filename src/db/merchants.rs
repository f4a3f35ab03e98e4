//! Merchant rows and arrears classification

use rusqlite::{params, Connection, Row};
use serde::{Deserialize, Serialize};

use crate::error::{LedgerError, Result};

/// Payment-standing classification computed by the remote ledger
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PaymentStanding {
    Current,
    MinorArrears,
    ModerateArrears,
    SeriousArrears,
    CriticalArrears,
}

impl PaymentStanding {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentStanding::Current => "current",
            PaymentStanding::MinorArrears => "minor-arrears",
            PaymentStanding::ModerateArrears => "moderate-arrears",
            PaymentStanding::SeriousArrears => "serious-arrears",
            PaymentStanding::CriticalArrears => "critical-arrears",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "current" => Some(PaymentStanding::Current),
            "minor-arrears" => Some(PaymentStanding::MinorArrears),
            "moderate-arrears" => Some(PaymentStanding::ModerateArrears),
            "serious-arrears" => Some(PaymentStanding::SeriousArrears),
            "critical-arrears" => Some(PaymentStanding::CriticalArrears),
            _ => None,
        }
    }
}

/// Merchant row from database
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MerchantRow {
    pub id: i64,
    pub first_name: String,
    pub last_name: String,
    #[serde(default)]
    pub phone: Option<String>,
    pub payment_status: PaymentStanding,
}

impl MerchantRow {
    fn from_row(row: &Row) -> std::result::Result<Self, rusqlite::Error> {
        let status: String = row.get("payment_status")?;
        Ok(Self {
            id: row.get("id")?,
            first_name: row.get("first_name")?,
            last_name: row.get("last_name")?,
            phone: row.get("phone")?,
            payment_status: PaymentStanding::parse(&status)
                .unwrap_or(PaymentStanding::Current),
        })
    }
}

/// Insert or fully overwrite a merchant by remote id
pub fn upsert_merchant(conn: &Connection, merchant: &MerchantRow) -> Result<()> {
    conn.execute(
        r#"
        INSERT INTO merchants (id, first_name, last_name, phone, payment_status)
        VALUES (?, ?, ?, ?, ?)
        ON CONFLICT(id) DO UPDATE SET
            first_name = excluded.first_name,
            last_name = excluded.last_name,
            phone = excluded.phone,
            payment_status = excluded.payment_status
        "#,
        params![
            merchant.id,
            merchant.first_name,
            merchant.last_name,
            merchant.phone,
            merchant.payment_status.as_str(),
        ],
    )
    .map_err(|e| LedgerError::Store(format!("Merchant upsert failed: {}", e)))?;
    Ok(())
}

/// Get a merchant by id
pub fn get_merchant(conn: &Connection, id: i64) -> Result<Option<MerchantRow>> {
    let mut stmt = conn
        .prepare("SELECT * FROM merchants WHERE id = ?")
        .map_err(|e| LedgerError::Store(format!("Prepare failed: {}", e)))?;

    let mut rows = stmt
        .query_map(params![id], MerchantRow::from_row)
        .map_err(|e| LedgerError::Store(format!("Query failed: {}", e)))?;

    rows.next()
        .transpose()
        .map_err(|e| LedgerError::Store(format!("Row parse failed: {}", e)))
}

/// List merchants ordered by name
pub fn list_merchants(conn: &Connection, limit: u32, offset: u32) -> Result<Vec<MerchantRow>> {
    let mut stmt = conn
        .prepare("SELECT * FROM merchants ORDER BY last_name, first_name LIMIT ? OFFSET ?")
        .map_err(|e| LedgerError::Store(format!("Prepare failed: {}", e)))?;

    let rows = stmt
        .query_map(params![limit, offset], MerchantRow::from_row)
        .map_err(|e| LedgerError::Store(format!("Query failed: {}", e)))?;

    rows.collect::<std::result::Result<Vec<_>, _>>()
        .map_err(|e| LedgerError::Store(format!("Row parse failed: {}", e)))
}

/// Search merchants by name fragment
pub fn search_merchants(conn: &Connection, name: &str, limit: u32) -> Result<Vec<MerchantRow>> {
    let pattern = format!("%{}%", name);
    let mut stmt = conn
        .prepare(
            "SELECT * FROM merchants
             WHERE first_name LIKE ? OR last_name LIKE ?
             ORDER BY last_name, first_name LIMIT ?",
        )
        .map_err(|e| LedgerError::Store(format!("Prepare failed: {}", e)))?;

    let rows = stmt
        .query_map(params![pattern, pattern, limit], MerchantRow::from_row)
        .map_err(|e| LedgerError::Store(format!("Query failed: {}", e)))?;

    rows.collect::<std::result::Result<Vec<_>, _>>()
        .map_err(|e| LedgerError::Store(format!("Row parse failed: {}", e)))
}
