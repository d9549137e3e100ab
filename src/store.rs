//! Central store: a single generic `items(pk, sk, payload, ttl_expires_at)`
//! table backing the keyed/TTL/range-read contract every component shares.
//! Probes write `CHECK#`/`LATENCY#` rows, the aggregator writes
//! `STATE#`/`INCIDENT#`/`STATE#GLOBAL` rows; nobody else writes either's key
//! space.

use rusqlite::{params, Connection, OptionalExtension, Result};
use serde::{de::DeserializeOwned, Serialize};
use std::sync::Mutex;

pub struct CentralStore {
    conn: Mutex<Connection>,
}

impl CentralStore {
    pub fn open(path: &str) -> Result<Self> {
        let conn = Connection::open(path)?;
        conn.execute_batch(
            "PRAGMA journal_mode=WAL; PRAGMA busy_timeout=5000; PRAGMA synchronous=NORMAL;",
        )?;
        let store = CentralStore {
            conn: Mutex::new(conn),
        };
        store.migrate()?;
        Ok(store)
    }

    fn migrate(&self) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS items (
                pk TEXT NOT NULL,
                sk TEXT NOT NULL,
                payload TEXT NOT NULL,
                ttl_expires_at INTEGER,
                PRIMARY KEY (pk, sk)
            );
            CREATE INDEX IF NOT EXISTS idx_items_pk_sk ON items(pk, sk);",
        )
    }

    /// Serialize `value` and upsert it at `(pk, sk)`. `ttl_expires_at_ms` is
    /// an epoch-millisecond expiry; `None` means the item never expires.
    pub fn put<T: Serialize>(
        &self,
        pk: &str,
        sk: &str,
        value: &T,
        ttl_expires_at_ms: Option<u64>,
    ) -> Result<()> {
        let payload = serde_json::to_string(value)
            .map_err(|e| rusqlite::Error::ToSqlConversionFailure(Box::new(e)))?;
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT INTO items (pk, sk, payload, ttl_expires_at) VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT(pk, sk) DO UPDATE SET payload = excluded.payload, ttl_expires_at = excluded.ttl_expires_at",
            params![pk, sk, payload, ttl_expires_at_ms.map(|v| v as i64)],
        )?;
        Ok(())
    }

    /// Conditional write for `STATE#`-shaped rows: only overwrite if the
    /// stored payload's `last_check_ms` is absent or older than the
    /// incoming one. Guards against two overlapping aggregator ticks
    /// clobbering each other out of order.
    pub fn put_if_newer<T>(&self, pk: &str, sk: &str, value: &T, now_field_ms: u64) -> Result<bool>
    where
        T: Serialize + DeserializeOwned,
    {
        let conn = self.conn.lock().unwrap();
        let existing: Option<String> = conn
            .query_row(
                "SELECT payload FROM items WHERE pk = ?1 AND sk = ?2",
                params![pk, sk],
                |row| row.get(0),
            )
            .optional()?;

        if let Some(raw) = &existing {
            if let Ok(existing_ms) = extract_last_check_ms(raw) {
                if existing_ms >= now_field_ms {
                    return Ok(false);
                }
            }
        }

        let payload = serde_json::to_string(value)
            .map_err(|e| rusqlite::Error::ToSqlConversionFailure(Box::new(e)))?;
        conn.execute(
            "INSERT INTO items (pk, sk, payload, ttl_expires_at) VALUES (?1, ?2, ?3, NULL)
             ON CONFLICT(pk, sk) DO UPDATE SET payload = excluded.payload",
            params![pk, sk, payload],
        )?;
        Ok(true)
    }

    pub fn get<T: DeserializeOwned>(&self, pk: &str, sk: &str, now_ms: u64) -> Result<Option<T>> {
        let conn = self.conn.lock().unwrap();
        let row: Option<(String, Option<i64>)> = conn
            .query_row(
                "SELECT payload, ttl_expires_at FROM items WHERE pk = ?1 AND sk = ?2",
                params![pk, sk],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()?;
        match row {
            Some((payload, ttl)) if !expired(ttl, now_ms) => Ok(serde_json::from_str(&payload).ok()),
            _ => Ok(None),
        }
    }

    /// Range read: all items under `pk` whose `sk` starts with `prefix`, in
    /// ascending `sk` order (chronological, given zero-padded timestamp keys).
    pub fn query_prefix<T: DeserializeOwned>(
        &self,
        pk: &str,
        prefix: &str,
        now_ms: u64,
        limit: Option<usize>,
    ) -> Result<Vec<T>> {
        let conn = self.conn.lock().unwrap();
        let upper = prefix_upper_bound(prefix);
        let mut stmt = conn.prepare(
            "SELECT payload, ttl_expires_at FROM items
             WHERE pk = ?1 AND sk >= ?2 AND sk < ?3
             ORDER BY sk ASC",
        )?;
        let rows = stmt.query_map(params![pk, prefix, upper], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, Option<i64>>(1)?))
        })?;

        let mut out = Vec::new();
        for row in rows {
            let (payload, ttl) = row?;
            if expired(ttl, now_ms) {
                continue;
            }
            if let Ok(value) = serde_json::from_str::<T>(&payload) {
                out.push(value);
            }
            if let Some(limit) = limit {
                if out.len() >= limit {
                    break;
                }
            }
        }
        Ok(out)
    }

    /// Delete every row that has expired as of `now_ms`. Called
    /// opportunistically by the aggregator, mirroring a retention sweep.
    pub fn sweep_expired(&self, now_ms: u64) -> Result<usize> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "DELETE FROM items WHERE ttl_expires_at IS NOT NULL AND ttl_expires_at <= ?1",
            params![now_ms as i64],
        )
    }
}

fn expired(ttl_expires_at: Option<i64>, now_ms: u64) -> bool {
    match ttl_expires_at {
        Some(exp) => exp <= now_ms as i64,
        None => false,
    }
}

/// Exclusive upper bound for a prefix range scan: increment the last byte.
/// Relies on sort keys being printable ASCII (true for every key this crate
/// builds — see `crate::keys`).
fn prefix_upper_bound(prefix: &str) -> String {
    let mut bytes = prefix.as_bytes().to_vec();
    for i in (0..bytes.len()).rev() {
        if bytes[i] < 0xff {
            bytes[i] += 1;
            bytes.truncate(i + 1);
            return String::from_utf8(bytes).unwrap_or_else(|_| format!("{prefix}\u{10ffff}"));
        }
    }
    format!("{prefix}\u{10ffff}")
}

fn extract_last_check_ms(payload: &str) -> std::result::Result<u64, ()> {
    serde_json::from_str::<serde_json::Value>(payload)
        .ok()
        .and_then(|v| v.get("last_check_ms").and_then(|f| f.as_u64()))
        .ok_or(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, Serialize, Deserialize, PartialEq)]
    struct Point {
        value: u64,
    }

    fn temp_store() -> CentralStore {
        let path = format!("/tmp/pulsegrid_store_test_{}.db", std::process::id());
        let _ = std::fs::remove_file(&path);
        CentralStore::open(&path).unwrap()
    }

    #[test]
    fn put_then_get_roundtrips() {
        let store = temp_store();
        store.put("MONITOR#m1", "CHECK#us-east#0000000001000", &Point { value: 42 }, None).unwrap();
        let got: Option<Point> = store.get("MONITOR#m1", "CHECK#us-east#0000000001000", 2_000).unwrap();
        assert_eq!(got, Some(Point { value: 42 }));
    }

    #[test]
    fn expired_items_are_invisible() {
        let store = temp_store();
        store
            .put("MONITOR#m1", "CHECK#us-east#0000000001000", &Point { value: 1 }, Some(1_500))
            .unwrap();
        let got: Option<Point> = store.get("MONITOR#m1", "CHECK#us-east#0000000001000", 2_000).unwrap();
        assert_eq!(got, None);
    }

    #[test]
    fn query_prefix_respects_region_scoping_and_order() {
        let store = temp_store();
        store.put("MONITOR#m1", "CHECK#us-east#0000000001000", &Point { value: 1 }, None).unwrap();
        store.put("MONITOR#m1", "CHECK#us-east#0000000002000", &Point { value: 2 }, None).unwrap();
        store.put("MONITOR#m1", "CHECK#eu-west#0000000001500", &Point { value: 3 }, None).unwrap();

        let us: Vec<Point> = store.query_prefix("MONITOR#m1", "CHECK#us-east#", 10_000, None).unwrap();
        assert_eq!(us, vec![Point { value: 1 }, Point { value: 2 }]);
    }

    #[test]
    fn put_if_newer_rejects_stale_writes() {
        let store = temp_store();
        #[derive(Serialize, Deserialize)]
        struct State {
            last_check_ms: u64,
        }
        let wrote = store.put_if_newer("MONITOR#m1", "STATE#", &State { last_check_ms: 5_000 }, 5_000).unwrap();
        assert!(wrote);
        let stale = store.put_if_newer("MONITOR#m1", "STATE#", &State { last_check_ms: 4_000 }, 4_000).unwrap();
        assert!(!stale);
        let fresh = store.put_if_newer("MONITOR#m1", "STATE#", &State { last_check_ms: 6_000 }, 6_000).unwrap();
        assert!(fresh);
    }

    #[test]
    fn sweep_expired_removes_only_expired_rows() {
        let store = temp_store();
        store.put("MONITOR#m1", "CHECK#us-east#1", &Point { value: 1 }, Some(1_000)).unwrap();
        store.put("MONITOR#m1", "CHECK#us-east#2", &Point { value: 2 }, None).unwrap();
        let removed = store.sweep_expired(2_000).unwrap();
        assert_eq!(removed, 1);
        let remaining: Vec<Point> = store.query_prefix("MONITOR#m1", "CHECK#us-east#", 2_000, None).unwrap();
        assert_eq!(remaining, vec![Point { value: 2 }]);
    }
}
