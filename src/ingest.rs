use crate::database::insert_if_absent;
use crate::dlog;
use crate::gpx::parse_gpx_file;
use crate::types::ImportStats;
use anyhow::{Context, Result};
use rusqlite::Connection;
use std::path::{Path, PathBuf};

/// Imports every trackpoint of every file, skipping rows that already exist.
///
/// All inserts share one transaction that is committed after the last file,
/// so an error anywhere leaves the database untouched.
pub fn import_files(conn: &mut Connection, files: &[PathBuf]) -> Result<ImportStats> {
    let tx = conn
        .transaction()
        .context("Starting import transaction")?;

    let mut stats = ImportStats::default();

    for path in files {
        println!("{}", absolute_display(path).display());

        let gpx = parse_gpx_file(path)?;
        dlog!(
            "parsed path={} device_id={} points={}",
            path.display(),
            gpx.device_id,
            gpx.points.len()
        );

        let mut inserted = 0usize;
        for p in &gpx.points {
            if insert_if_absent(&tx, &gpx.device_id, p)? {
                inserted += 1;
            }
        }

        let duplicates = gpx.points.len() - inserted;
        tracing::info!(
            path = %path.display(),
            device_id = %gpx.device_id,
            inserted,
            duplicates,
            "imported file"
        );

        stats.files += 1;
        stats.points += gpx.points.len();
        stats.inserted += inserted;
        stats.duplicates += duplicates;
    }

    tx.commit().context("Committing import transaction")?;

    tracing::info!(
        files = stats.files,
        points = stats.points,
        inserted = stats.inserted,
        duplicates = stats.duplicates,
        "import done"
    );

    Ok(stats)
}

/// Progress lines name files by absolute path, whatever the pattern looked like.
fn absolute_display(path: &Path) -> PathBuf {
    std::path::absolute(path).unwrap_or_else(|_| path.to_path_buf())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::ensure_schema;
    use std::fs;
    use tempfile::TempDir;

    fn write_gpx(
        dir: &TempDir,
        name: &str,
        device: Option<&str>,
        points: &[(i64, &str)],
    ) -> PathBuf {
        let metadata = device
            .map(|d| format!("<metadata><device>{d}</device></metadata>"))
            .unwrap_or_default();
        let trkpts: String = points
            .iter()
            .map(|(unix, lat)| {
                format!(r#"<trkpt lat="{lat}" lon="-70.0"><unix>{unix}</unix></trkpt>"#)
            })
            .collect();
        let path = dir.path().join(name);
        fs::write(
            &path,
            format!(
                r#"<?xml version="1.0"?><gpx version="1.1">{metadata}<trk><trkseg>{trkpts}</trkseg></trk></gpx>"#
            ),
        )
        .unwrap();
        path
    }

    fn db() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        ensure_schema(&conn).unwrap();
        conn
    }

    fn count(conn: &Connection) -> i64 {
        conn.query_row("SELECT COUNT(*) FROM trkpt", [], |r| r.get(0))
            .unwrap()
    }

    #[test]
    fn scenario_row() {
        let dir = tempfile::tempdir().unwrap();
        let f = write_gpx(&dir, "one.gpx", None, &[(1000, "40.0")]);
        let mut conn = db();

        let stats = import_files(&mut conn, &[f]).unwrap();
        assert_eq!(
            stats,
            ImportStats {
                files: 1,
                points: 1,
                inserted: 1,
                duplicates: 0
            }
        );

        type Row = (String, i64, f64, f64, String, f64, Option<f64>, Option<i64>);
        let row: Row = conn
            .query_row(
                "SELECT device_id, time, lat, lon, provider, accuracy, ele, sat FROM trkpt",
                [],
                |r| {
                    Ok((
                        r.get(0)?,
                        r.get(1)?,
                        r.get(2)?,
                        r.get(3)?,
                        r.get(4)?,
                        r.get(5)?,
                        r.get(6)?,
                        r.get(7)?,
                    ))
                },
            )
            .unwrap();
        assert_eq!(
            row,
            (
                "import_gpx".to_string(),
                1000,
                40.0,
                -70.0,
                "gps".to_string(),
                0.0,
                None,
                None
            )
        );
    }

    #[test]
    fn reimport_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let f = write_gpx(&dir, "a.gpx", Some("Garmin123"), &[(1, "1"), (2, "2"), (3, "3")]);
        let mut conn = db();

        import_files(&mut conn, std::slice::from_ref(&f)).unwrap();
        assert_eq!(count(&conn), 3);

        let again = import_files(&mut conn, &[f]).unwrap();
        assert_eq!(again.inserted, 0);
        assert_eq!(again.duplicates, 3);
        assert_eq!(count(&conn), 3);

        let device: String = conn
            .query_row("SELECT DISTINCT device_id FROM trkpt", [], |r| r.get(0))
            .unwrap();
        assert_eq!(device, "Garmin123");
    }

    #[test]
    fn files_are_aggregated() {
        let dir = tempfile::tempdir().unwrap();
        let a = write_gpx(&dir, "a.gpx", None, &[(1, "1"), (2, "2")]);
        let b = write_gpx(&dir, "b.gpx", None, &[(3, "3"), (4, "4"), (5, "5")]);
        let mut conn = db();

        let stats = import_files(&mut conn, &[a, b]).unwrap();
        assert_eq!(stats.files, 2);
        assert_eq!(stats.inserted, 5);
        assert_eq!(count(&conn), 5);
    }

    #[test]
    fn duplicates_within_one_run() {
        let dir = tempfile::tempdir().unwrap();
        let a = write_gpx(&dir, "a.gpx", None, &[(1, "1"), (2, "2")]);
        let b = write_gpx(&dir, "b.gpx", None, &[(2, "9"), (3, "3")]);
        let mut conn = db();

        let stats = import_files(&mut conn, &[a, b]).unwrap();
        assert_eq!(stats.points, 4);
        assert_eq!(stats.inserted, 3);
        assert_eq!(stats.duplicates, 1);
        assert_eq!(count(&conn), 3);
    }

    #[test]
    fn malformed_file_rolls_back_everything() {
        let dir = tempfile::tempdir().unwrap();
        let good = write_gpx(&dir, "good.gpx", None, &[(1, "1")]);
        let bad = write_gpx(&dir, "bad.gpx", None, &[(2, "north")]);
        let mut conn = db();

        let err = import_files(&mut conn, &[good, bad]).unwrap_err();
        let msg = format!("{err:#}");
        assert!(msg.contains("bad.gpx"), "{msg}");
        assert!(msg.contains("invalid lat attribute"), "{msg}");
        assert_eq!(count(&conn), 0);
    }

    #[test]
    fn progress_paths_are_absolute() {
        let shown = absolute_display(Path::new("tracks/walk.gpx"));
        assert!(shown.is_absolute());
        assert!(shown.ends_with("tracks/walk.gpx"));

        let already = Path::new("/data/walk.gpx");
        assert_eq!(absolute_display(already), already);
    }

    #[test]
    fn missing_file_is_an_error() {
        let mut conn = db();
        let err = import_files(&mut conn, &[Path::new("/nonexistent/x.gpx").to_path_buf()]);
        assert!(err.is_err());
    }
}
