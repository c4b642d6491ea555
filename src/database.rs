use crate::types::{PROVIDER, Trkpt};
use anyhow::{Context, Result};
use rusqlite::{Connection, Transaction, params};
use std::path::Path;

/// Opens (or creates) the trkpt database and makes sure the `trkpt` table exists.
pub fn open_trkpt_db(path: &Path) -> Result<Connection> {
    let display = path.display();
    let conn = Connection::open(path).with_context(|| format!("Opening SQLite DB: {display}"))?;
    ensure_schema(&conn)?;
    Ok(conn)
}

/// Same layout the trkpt app creates. Existing tables are left alone.
pub fn ensure_schema(conn: &Connection) -> Result<()> {
    if table_exists(conn, "trkpt")? {
        tracing::debug!("trkpt table already exists");
        return Ok(());
    }

    tracing::info!("creating trkpt table");
    conn.execute_batch(
        r"
        CREATE TABLE IF NOT EXISTS trkpt(
          device_id INTEGER NOT NULL,
          time      INTEGER NOT NULL,
          lat       REAL NOT NULL,
          lon       REAL NOT NULL,
          provider  TEXT,
          accuracy  REAL,
          ele       INTEGER,
          sat       INTEGER,
          PRIMARY KEY(device_id, time)
        );

        CREATE INDEX IF NOT EXISTS index_trkpt_device_id_time ON trkpt(device_id, time);
        ",
    )
    .context("Ensuring trkpt schema")?;

    Ok(())
}

/// Inserts one point. Returns `false` when a row with the same key already exists.
///
/// Only uniqueness conflicts are skipped; every other failure is an error.
pub fn insert_if_absent(tx: &Transaction<'_>, device_id: &str, p: &Trkpt) -> Result<bool> {
    let mut stmt = tx
        .prepare_cached(
            "INSERT INTO trkpt (device_id, time, lat, lon, provider, accuracy, ele, sat)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
             ON CONFLICT DO NOTHING",
        )
        .context("Preparing trkpt insert")?;

    let changed = stmt
        .execute(params![
            device_id, p.time, p.lat, p.lon, PROVIDER, p.accuracy, p.ele, p.sat
        ])
        .with_context(|| format!("Inserting trkpt device_id={device_id} time={}", p.time))?;

    Ok(changed > 0)
}

fn table_exists(conn: &Connection, table: &str) -> Result<bool> {
    let mut stmt =
        conn.prepare("SELECT 1 FROM sqlite_master WHERE type='table' AND name=?1 LIMIT 1")?;
    let mut rows = stmt.query([table])?;
    Ok(rows.next()?.is_some())
}
