//! Market hierarchy rows: markets, zones, halls
//!
//! Immutable from the agent's perspective; refreshed only by the sync pass.

use rusqlite::{params, Connection, Row};
use serde::{Deserialize, Serialize};

use crate::error::{LedgerError, Result};

/// Market row from database
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarketRow {
    pub id: i64,
    pub name: String,
    #[serde(default)]
    pub commune: Option<String>,
}

impl MarketRow {
    fn from_row(row: &Row) -> std::result::Result<Self, rusqlite::Error> {
        Ok(Self {
            id: row.get("id")?,
            name: row.get("name")?,
            commune: row.get("commune")?,
        })
    }
}

/// Zone row from database
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ZoneRow {
    pub id: i64,
    pub market_id: i64,
    pub name: String,
}

impl ZoneRow {
    fn from_row(row: &Row) -> std::result::Result<Self, rusqlite::Error> {
        Ok(Self {
            id: row.get("id")?,
            market_id: row.get("market_id")?,
            name: row.get("name")?,
        })
    }
}

/// Hall row from database
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HallRow {
    pub id: i64,
    pub market_id: i64,
    #[serde(default)]
    pub zone_id: Option<i64>,
    pub name: String,
}

impl HallRow {
    fn from_row(row: &Row) -> std::result::Result<Self, rusqlite::Error> {
        Ok(Self {
            id: row.get("id")?,
            market_id: row.get("market_id")?,
            zone_id: row.get("zone_id")?,
            name: row.get("name")?,
        })
    }
}

/// Insert or fully overwrite a market by remote id
pub fn upsert_market(conn: &Connection, market: &MarketRow) -> Result<()> {
    conn.execute(
        r#"
        INSERT INTO markets (id, name, commune) VALUES (?, ?, ?)
        ON CONFLICT(id) DO UPDATE SET
            name = excluded.name,
            commune = excluded.commune
        "#,
        params![market.id, market.name, market.commune],
    )
    .map_err(|e| LedgerError::Store(format!("Market upsert failed: {}", e)))?;
    Ok(())
}

/// Insert or fully overwrite a zone by remote id
pub fn upsert_zone(conn: &Connection, zone: &ZoneRow) -> Result<()> {
    conn.execute(
        r#"
        INSERT INTO zones (id, market_id, name) VALUES (?, ?, ?)
        ON CONFLICT(id) DO UPDATE SET
            market_id = excluded.market_id,
            name = excluded.name
        "#,
        params![zone.id, zone.market_id, zone.name],
    )
    .map_err(|e| LedgerError::Store(format!("Zone upsert failed: {}", e)))?;
    Ok(())
}

/// Insert or fully overwrite a hall by remote id
pub fn upsert_hall(conn: &Connection, hall: &HallRow) -> Result<()> {
    conn.execute(
        r#"
        INSERT INTO halls (id, market_id, zone_id, name) VALUES (?, ?, ?, ?)
        ON CONFLICT(id) DO UPDATE SET
            market_id = excluded.market_id,
            zone_id = excluded.zone_id,
            name = excluded.name
        "#,
        params![hall.id, hall.market_id, hall.zone_id, hall.name],
    )
    .map_err(|e| LedgerError::Store(format!("Hall upsert failed: {}", e)))?;
    Ok(())
}

/// Get a market by id
pub fn get_market(conn: &Connection, id: i64) -> Result<Option<MarketRow>> {
    let mut stmt = conn
        .prepare("SELECT * FROM markets WHERE id = ?")
        .map_err(|e| LedgerError::Store(format!("Prepare failed: {}", e)))?;

    let mut rows = stmt
        .query_map(params![id], MarketRow::from_row)
        .map_err(|e| LedgerError::Store(format!("Query failed: {}", e)))?;

    rows.next()
        .transpose()
        .map_err(|e| LedgerError::Store(format!("Row parse failed: {}", e)))
}

/// List all markets ordered by name
pub fn list_markets(conn: &Connection) -> Result<Vec<MarketRow>> {
    let mut stmt = conn
        .prepare("SELECT * FROM markets ORDER BY name")
        .map_err(|e| LedgerError::Store(format!("Prepare failed: {}", e)))?;

    let rows = stmt
        .query_map([], MarketRow::from_row)
        .map_err(|e| LedgerError::Store(format!("Query failed: {}", e)))?;

    rows.collect::<std::result::Result<Vec<_>, _>>()
        .map_err(|e| LedgerError::Store(format!("Row parse failed: {}", e)))
}

/// List zones belonging to a market
pub fn list_zones(conn: &Connection, market_id: i64) -> Result<Vec<ZoneRow>> {
    let mut stmt = conn
        .prepare("SELECT * FROM zones WHERE market_id = ? ORDER BY name")
        .map_err(|e| LedgerError::Store(format!("Prepare failed: {}", e)))?;

    let rows = stmt
        .query_map(params![market_id], ZoneRow::from_row)
        .map_err(|e| LedgerError::Store(format!("Query failed: {}", e)))?;

    rows.collect::<std::result::Result<Vec<_>, _>>()
        .map_err(|e| LedgerError::Store(format!("Row parse failed: {}", e)))
}

/// List halls belonging to a market
pub fn list_halls(conn: &Connection, market_id: i64) -> Result<Vec<HallRow>> {
    let mut stmt = conn
        .prepare("SELECT * FROM halls WHERE market_id = ? ORDER BY name")
        .map_err(|e| LedgerError::Store(format!("Prepare failed: {}", e)))?;

    let rows = stmt
        .query_map(params![market_id], HallRow::from_row)
        .map_err(|e| LedgerError::Store(format!("Query failed: {}", e)))?;

    rows.collect::<std::result::Result<Vec<_>, _>>()
        .map_err(|e| LedgerError::Store(format!("Row parse failed: {}", e)))
}
