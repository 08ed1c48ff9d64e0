//! SQLite-backed [`RecordStore`].
//!
//! One connection guarded by a mutex; every call runs on the blocking pool.
//! Upsert and soft delete open an IMMEDIATE transaction so the lookup and the
//! write see the same snapshot even when several processes share the file.

use std::{
    path::Path,
    sync::{Arc, Mutex},
};

use async_trait::async_trait;
use carelog_core::{
    domain::{CareRecord, Category, PreviousValues, RecordId, StoredRecord},
    store::{
        port::{day_bounds, group_by_category},
        DailyRecords, DeleteOutcome, RecordQuery, RecordStore, UpsertOutcome,
    },
    Error, Result,
};
use chrono::NaiveDateTime;
use rusqlite::{params, Connection, OptionalExtension, TransactionBehavior};

const TS_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

const SCHEMA_SQL: &str = "
CREATE TABLE IF NOT EXISTS care_records (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    record_time TEXT NOT NULL,
    category TEXT NOT NULL,
    amount TEXT,
    amount_unit TEXT,
    description TEXT NOT NULL DEFAULT '',
    is_deleted INTEGER NOT NULL DEFAULT 0,
    created_at TEXT NOT NULL
);

CREATE UNIQUE INDEX IF NOT EXISTS idx_care_records_active_key
    ON care_records(record_time, category) WHERE is_deleted = 0;
CREATE INDEX IF NOT EXISTS idx_care_records_time ON care_records(record_time);
";

const SELECT_COLUMNS: &str =
    "id, record_time, category, amount, amount_unit, description, is_deleted, created_at";

#[derive(Clone)]
pub struct SqliteStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteStore {
    /// Open or create a database file with full schema.
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(path).map_err(store_err)?;
        conn.execute_batch(
            "PRAGMA journal_mode = WAL;
             PRAGMA synchronous = NORMAL;
             PRAGMA busy_timeout = 5000;",
        )
        .map_err(store_err)?;
        tracing::info!(path = %path.display(), "opened sqlite store");
        Self::with_schema(conn)
    }

    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().map_err(store_err)?;
        Self::with_schema(conn)
    }

    fn with_schema(conn: Connection) -> Result<Self> {
        conn.execute_batch(SCHEMA_SQL).map_err(store_err)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    async fn with_conn<T, F>(&self, f: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&mut Connection) -> Result<T> + Send + 'static,
    {
        let conn = self.conn.clone();
        tokio::task::spawn_blocking(move || {
            let mut guard = conn
                .lock()
                .map_err(|_| Error::Store("sqlite connection lock poisoned".to_string()))?;
            f(&mut guard)
        })
        .await
        .map_err(|e| Error::Store(format!("sqlite task failed: {e}")))?
    }
}

#[async_trait]
impl RecordStore for SqliteStore {
    async fn upsert(&self, record: &CareRecord) -> Result<UpsertOutcome> {
        let record = record.clone();
        self.with_conn(move |conn| {
            let tx = conn
                .transaction_with_behavior(TransactionBehavior::Immediate)
                .map_err(store_err)?;
            let time = fmt_ts(record.time);

            let existing = tx
                .query_row(
                    "SELECT id, amount, amount_unit, description FROM care_records
                     WHERE record_time = ?1 AND category = ?2 AND is_deleted = 0",
                    params![time, record.category.code()],
                    |row| {
                        Ok((
                            row.get::<_, i64>(0)?,
                            PreviousValues {
                                amount: row.get(1)?,
                                unit: row.get(2)?,
                                description: row.get(3)?,
                            },
                        ))
                    },
                )
                .optional()
                .map_err(store_err)?;

            let outcome = match existing {
                Some((id, previous)) => {
                    tx.execute(
                        "UPDATE care_records SET amount = ?1, amount_unit = ?2, description = ?3
                         WHERE id = ?4",
                        params![record.amount, record.unit, record.description, id],
                    )
                    .map_err(store_err)?;
                    UpsertOutcome {
                        id: RecordId(id),
                        was_update: true,
                        previous: Some(previous),
                    }
                }
                None => {
                    tx.execute(
                        "INSERT INTO care_records
                         (record_time, category, amount, amount_unit, description, is_deleted, created_at)
                         VALUES (?1, ?2, ?3, ?4, ?5, 0, ?6)",
                        params![
                            time,
                            record.category.code(),
                            record.amount,
                            record.unit,
                            record.description,
                            fmt_ts(record.created_at),
                        ],
                    )
                    .map_err(store_err)?;
                    UpsertOutcome {
                        id: RecordId(tx.last_insert_rowid()),
                        was_update: false,
                        previous: None,
                    }
                }
            };

            tx.commit().map_err(store_err)?;
            Ok(outcome)
        })
        .await
    }

    async fn soft_delete(&self, time: NaiveDateTime, category: Category) -> Result<DeleteOutcome> {
        self.with_conn(move |conn| {
            let tx = conn
                .transaction_with_behavior(TransactionBehavior::Immediate)
                .map_err(store_err)?;

            let existing = tx
                .query_row(
                    "SELECT id, amount, amount_unit, description FROM care_records
                     WHERE record_time = ?1 AND category = ?2 AND is_deleted = 0",
                    params![fmt_ts(time), category.code()],
                    |row| {
                        Ok((
                            row.get::<_, i64>(0)?,
                            PreviousValues {
                                amount: row.get(1)?,
                                unit: row.get(2)?,
                                description: row.get(3)?,
                            },
                        ))
                    },
                )
                .optional()
                .map_err(store_err)?;

            let Some((id, previous)) = existing else {
                return Ok(DeleteOutcome::NotFound);
            };

            tx.execute(
                "UPDATE care_records SET is_deleted = 1 WHERE id = ?1",
                params![id],
            )
            .map_err(store_err)?;
            tx.commit().map_err(store_err)?;

            Ok(DeleteOutcome::Deleted {
                id: RecordId(id),
                previous,
            })
        })
        .await
    }

    async fn query(&self, filter: &RecordQuery) -> Result<Vec<StoredRecord>> {
        let start = filter.start.map(|d| fmt_ts(day_bounds(d).0));
        let end = filter.end.map(|d| fmt_ts(day_bounds(d).1));
        let category = filter.category.map(Category::code);
        let limit = i64::try_from(filter.limit).unwrap_or(i64::MAX);

        self.with_conn(move |conn| {
            let sql = format!(
                "SELECT {SELECT_COLUMNS} FROM care_records
                 WHERE is_deleted = 0
                   AND (?1 IS NULL OR record_time >= ?1)
                   AND (?2 IS NULL OR record_time <= ?2)
                   AND (?3 IS NULL OR category = ?3)
                 ORDER BY record_time DESC, id DESC
                 LIMIT ?4"
            );
            let mut stmt = conn.prepare(&sql).map_err(store_err)?;
            let rows = stmt
                .query_map(params![start, end, category, limit], RawRow::read)
                .map_err(store_err)?
                .collect::<std::result::Result<Vec<_>, _>>()
                .map_err(store_err)?;
            rows.into_iter().map(RawRow::into_stored).collect()
        })
        .await
    }

    async fn query_by_date(&self, date: chrono::NaiveDate) -> Result<DailyRecords> {
        let (start, end) = day_bounds(date);
        let (start, end) = (fmt_ts(start), fmt_ts(end));

        let rows = self
            .with_conn(move |conn| {
                let sql = format!(
                    "SELECT {SELECT_COLUMNS} FROM care_records
                     WHERE is_deleted = 0 AND record_time >= ?1 AND record_time <= ?2
                     ORDER BY record_time, id"
                );
                let mut stmt = conn.prepare(&sql).map_err(store_err)?;
                let rows = stmt
                    .query_map(params![start, end], RawRow::read)
                    .map_err(store_err)?
                    .collect::<std::result::Result<Vec<_>, _>>()
                    .map_err(store_err)?;
                rows.into_iter()
                    .map(RawRow::into_stored)
                    .collect::<Result<Vec<_>>>()
            })
            .await?;

        Ok(group_by_category(rows))
    }
}

/// Column values as stored, before timestamp and category decoding.
struct RawRow {
    id: i64,
    record_time: String,
    category: String,
    amount: Option<String>,
    unit: Option<String>,
    description: String,
    is_deleted: bool,
    created_at: String,
}

impl RawRow {
    fn read(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            record_time: row.get(1)?,
            category: row.get(2)?,
            amount: row.get(3)?,
            unit: row.get(4)?,
            description: row.get(5)?,
            is_deleted: row.get::<_, i64>(6)? != 0,
            created_at: row.get(7)?,
        })
    }

    fn into_stored(self) -> Result<StoredRecord> {
        Ok(StoredRecord {
            id: RecordId(self.id),
            record: CareRecord {
                time: parse_ts(&self.record_time)?,
                category: self.category.parse()?,
                amount: self.amount,
                unit: self.unit,
                description: self.description,
                is_deleted: self.is_deleted,
                created_at: parse_ts(&self.created_at)?,
            },
        })
    }
}

fn fmt_ts(t: NaiveDateTime) -> String {
    t.format(TS_FORMAT).to_string()
}

fn parse_ts(s: &str) -> Result<NaiveDateTime> {
    NaiveDateTime::parse_from_str(s, TS_FORMAT)
        .map_err(|e| Error::Store(format!("bad timestamp {s:?} in care_records: {e}")))
}

fn store_err(e: rusqlite::Error) -> Error {
    Error::Store(e.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn at(d: u32, h: u32, m: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2026, 3, d)
            .unwrap()
            .and_hms_opt(h, m, 0)
            .unwrap()
    }

    fn rec(time: NaiveDateTime, category: Category, amount: Option<&str>, desc: &str) -> CareRecord {
        CareRecord {
            time,
            category,
            amount: amount.map(str::to_string),
            unit: amount.map(|_| "ml".to_string()),
            description: desc.to_string(),
            is_deleted: false,
            created_at: time,
        }
    }

    #[tokio::test]
    async fn upsert_updates_in_place() {
        let store = SqliteStore::open_in_memory().unwrap();
        let first = store
            .upsert(&rec(at(14, 9, 0), Category::Feeding, Some("90"), "9点喝奶90"))
            .await
            .unwrap();
        assert!(!first.was_update);

        let second = store
            .upsert(&rec(at(14, 9, 0), Category::Feeding, Some("120"), "9点喝奶120"))
            .await
            .unwrap();
        assert!(second.was_update);
        assert_eq!(second.id, first.id);
        let prev = second.previous.unwrap();
        assert_eq!(prev.amount.as_deref(), Some("90"));
        assert_eq!(prev.description.as_deref(), Some("9点喝奶90"));

        let all = store.query(&RecordQuery::default()).await.unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].record.amount.as_deref(), Some("120"));
        assert_eq!(all[0].record.unit.as_deref(), Some("ml"));
        assert_eq!(all[0].record.time, at(14, 9, 0));
    }

    #[tokio::test]
    async fn delete_then_recreate() {
        let store = SqliteStore::open_in_memory().unwrap();
        let r = rec(at(14, 9, 30), Category::Stool, Some("1"), "拉屎一坨");
        let created = store.upsert(&r).await.unwrap();

        let DeleteOutcome::Deleted { id, previous } =
            store.soft_delete(r.time, r.category).await.unwrap()
        else {
            panic!("expected a deletion");
        };
        assert_eq!(id, created.id);
        assert_eq!(previous.amount.as_deref(), Some("1"));

        assert_eq!(
            store.soft_delete(r.time, r.category).await.unwrap(),
            DeleteOutcome::NotFound
        );

        let again = store.upsert(&r).await.unwrap();
        assert!(!again.was_update);
        assert_ne!(again.id, created.id);
        assert_eq!(store.query(&RecordQuery::default()).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn query_applies_inclusive_day_bounds_and_limit() {
        let store = SqliteStore::open_in_memory().unwrap();
        store.upsert(&rec(at(13, 23, 59), Category::Feeding, None, "a")).await.unwrap();
        store.upsert(&rec(at(14, 0, 0), Category::Feeding, None, "b")).await.unwrap();
        store.upsert(&rec(at(14, 23, 59), Category::Sleep, None, "c")).await.unwrap();
        store.upsert(&rec(at(15, 0, 0), Category::Feeding, None, "d")).await.unwrap();

        let day = NaiveDate::from_ymd_opt(2026, 3, 14).unwrap();
        let got = store
            .query(&RecordQuery {
                start: Some(day),
                end: Some(day),
                ..RecordQuery::default()
            })
            .await
            .unwrap();
        let descs: Vec<_> = got.iter().map(|r| r.record.description.as_str()).collect();
        assert_eq!(descs, vec!["c", "b"]);

        let feeding = store
            .query(&RecordQuery {
                category: Some(Category::Feeding),
                limit: 2,
                ..RecordQuery::default()
            })
            .await
            .unwrap();
        let descs: Vec<_> = feeding.iter().map(|r| r.record.description.as_str()).collect();
        assert_eq!(descs, vec!["d", "b"]);
    }

    #[tokio::test]
    async fn query_by_date_groups_active_records() {
        let store = SqliteStore::open_in_memory().unwrap();
        store.upsert(&rec(at(14, 18, 0), Category::Sleep, None, "s2")).await.unwrap();
        store.upsert(&rec(at(14, 7, 0), Category::Feeding, None, "f1")).await.unwrap();
        store.upsert(&rec(at(14, 9, 0), Category::Sleep, None, "s1")).await.unwrap();
        store.soft_delete(at(14, 18, 0), Category::Sleep).await.unwrap();

        let day = store
            .query_by_date(NaiveDate::from_ymd_opt(2026, 3, 14).unwrap())
            .await
            .unwrap();
        let cats: Vec<_> = day.keys().copied().collect();
        assert_eq!(cats, vec![Category::Feeding, Category::Sleep]);
        assert_eq!(day[&Category::Sleep][0].record.description, "s1");
        assert_eq!(day[&Category::Sleep].len(), 1);
    }

    #[tokio::test]
    async fn concurrent_upserts_of_one_key_leave_one_record() {
        let store = Arc::new(SqliteStore::open_in_memory().unwrap());
        let r = rec(at(14, 9, 0), Category::Urine, None, "尿了");

        let mut handles = Vec::new();
        for _ in 0..8 {
            let store = store.clone();
            let r = r.clone();
            handles.push(tokio::spawn(async move { store.upsert(&r).await.unwrap() }));
        }
        let mut created = 0;
        for h in handles {
            if !h.await.unwrap().was_update {
                created += 1;
            }
        }
        assert_eq!(created, 1);
        assert_eq!(store.query(&RecordQuery::default()).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn file_store_survives_reopen() {
        let dir = std::env::temp_dir().join(format!("carelog-sqlite-{}", std::process::id()));
        let path = dir.join("care.db");
        let _ = std::fs::remove_file(&path);

        {
            let store = SqliteStore::open(&path).unwrap();
            store
                .upsert(&rec(at(14, 8, 0), Category::Temperature, Some("37.5"), "体温37.5度"))
                .await
                .unwrap();
        }
        let store = SqliteStore::open(&path).unwrap();
        let all = store.query(&RecordQuery::default()).await.unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].record.category, Category::Temperature);

        let _ = std::fs::remove_dir_all(&dir);
    }
}
