//! Stall rows: places in the market layout, their fee and occupant

use rusqlite::{params, Connection, Row};
use serde::{Deserialize, Serialize};

use crate::error::{LedgerError, Result};

/// Occupancy status of a stall
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StallStatus {
    Available,
    Occupied,
    Reserved,
}

impl StallStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            StallStatus::Available => "available",
            StallStatus::Occupied => "occupied",
            StallStatus::Reserved => "reserved",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "available" => Some(StallStatus::Available),
            "occupied" => Some(StallStatus::Occupied),
            "reserved" => Some(StallStatus::Reserved),
            _ => None,
        }
    }
}

/// Stall row from database
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StallRow {
    pub id: i64,
    pub number: String,
    pub status: StallStatus,
    pub annual_fee: i64,
    #[serde(default)]
    pub market_id: Option<i64>,
    #[serde(default)]
    pub zone_id: Option<i64>,
    #[serde(default)]
    pub hall_id: Option<i64>,
    #[serde(default)]
    pub merchant_id: Option<i64>,
}

impl StallRow {
    fn from_row(row: &Row) -> std::result::Result<Self, rusqlite::Error> {
        let status: String = row.get("status")?;
        Ok(Self {
            id: row.get("id")?,
            number: row.get("number")?,
            status: StallStatus::parse(&status).unwrap_or(StallStatus::Available),
            annual_fee: row.get("annual_fee")?,
            market_id: row.get("market_id")?,
            zone_id: row.get("zone_id")?,
            hall_id: row.get("hall_id")?,
            merchant_id: row.get("merchant_id")?,
        })
    }
}

/// Filters for listing stalls
#[derive(Debug, Clone, Default)]
pub struct StallFilter {
    pub market_id: Option<i64>,
    pub zone_id: Option<i64>,
    pub hall_id: Option<i64>,
    pub merchant_id: Option<i64>,
    pub status: Option<StallStatus>,
}

/// Insert or fully overwrite a stall by remote id
pub fn upsert_stall(conn: &Connection, stall: &StallRow) -> Result<()> {
    conn.execute(
        r#"
        INSERT INTO stalls (id, number, status, annual_fee, market_id, zone_id, hall_id, merchant_id)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?)
        ON CONFLICT(id) DO UPDATE SET
            number = excluded.number,
            status = excluded.status,
            annual_fee = excluded.annual_fee,
            market_id = excluded.market_id,
            zone_id = excluded.zone_id,
            hall_id = excluded.hall_id,
            merchant_id = excluded.merchant_id
        "#,
        params![
            stall.id,
            stall.number,
            stall.status.as_str(),
            stall.annual_fee,
            stall.market_id,
            stall.zone_id,
            stall.hall_id,
            stall.merchant_id,
        ],
    )
    .map_err(|e| LedgerError::Store(format!("Stall upsert failed: {}", e)))?;
    Ok(())
}

/// Get a stall by id
pub fn get_stall(conn: &Connection, id: i64) -> Result<Option<StallRow>> {
    let mut stmt = conn
        .prepare("SELECT * FROM stalls WHERE id = ?")
        .map_err(|e| LedgerError::Store(format!("Prepare failed: {}", e)))?;

    let mut rows = stmt
        .query_map(params![id], StallRow::from_row)
        .map_err(|e| LedgerError::Store(format!("Query failed: {}", e)))?;

    rows.next()
        .transpose()
        .map_err(|e| LedgerError::Store(format!("Row parse failed: {}", e)))
}

/// List stalls matching a filter
pub fn list_stalls(conn: &Connection, filter: &StallFilter) -> Result<Vec<StallRow>> {
    let mut sql = String::from("SELECT * FROM stalls");
    let mut params: Vec<Box<dyn rusqlite::ToSql>> = vec![];
    let mut conditions = vec![];

    if let Some(market_id) = filter.market_id {
        conditions.push("market_id = ?".to_string());
        params.push(Box::new(market_id));
    }
    if let Some(zone_id) = filter.zone_id {
        conditions.push("zone_id = ?".to_string());
        params.push(Box::new(zone_id));
    }
    if let Some(hall_id) = filter.hall_id {
        conditions.push("hall_id = ?".to_string());
        params.push(Box::new(hall_id));
    }
    if let Some(merchant_id) = filter.merchant_id {
        conditions.push("merchant_id = ?".to_string());
        params.push(Box::new(merchant_id));
    }
    if let Some(status) = filter.status {
        conditions.push("status = ?".to_string());
        params.push(Box::new(status.as_str()));
    }

    if !conditions.is_empty() {
        sql.push_str(" WHERE ");
        sql.push_str(&conditions.join(" AND "));
    }

    sql.push_str(" ORDER BY number");

    let mut stmt = conn
        .prepare(&sql)
        .map_err(|e| LedgerError::Store(format!("Prepare failed: {}", e)))?;

    let param_refs: Vec<&dyn rusqlite::ToSql> = params.iter().map(|p| p.as_ref()).collect();

    let rows = stmt
        .query_map(param_refs.as_slice(), StallRow::from_row)
        .map_err(|e| LedgerError::Store(format!("Query failed: {}", e)))?;

    rows.collect::<std::result::Result<Vec<_>, _>>()
        .map_err(|e| LedgerError::Store(format!("Row parse failed: {}", e)))
}
