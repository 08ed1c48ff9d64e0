use async_trait::async_trait;
use chrono::{NaiveDate, NaiveDateTime};
use tokio::sync::Mutex;

use crate::{
    domain::{CareRecord, Category, PreviousValues, RecordId, StoredRecord},
    store::port::{
        day_bounds, group_by_category, DailyRecords, DeleteOutcome, RecordQuery, RecordStore,
        UpsertOutcome,
    },
    Result,
};

#[derive(Debug, Default)]
struct MemoryState {
    next_id: i64,
    records: Vec<StoredRecord>,
}

impl MemoryState {
    fn active_mut(&mut self, time: NaiveDateTime, category: Category) -> Option<&mut StoredRecord> {
        self.records
            .iter_mut()
            .find(|r| !r.record.is_deleted && r.record.key() == (time, category))
    }
}

/// Process-local store. A single lock covers every check-then-act.
#[derive(Debug, Default)]
pub struct MemoryStore {
    state: Mutex<MemoryState>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every record ever written, deleted ones included.
    pub async fn snapshot(&self) -> Vec<StoredRecord> {
        self.state.lock().await.records.clone()
    }
}

#[async_trait]
impl RecordStore for MemoryStore {
    async fn upsert(&self, record: &CareRecord) -> Result<UpsertOutcome> {
        let mut st = self.state.lock().await;

        if let Some(existing) = st.active_mut(record.time, record.category) {
            let previous = PreviousValues {
                amount: existing.record.amount.take(),
                unit: existing.record.unit.take(),
                description: Some(std::mem::take(&mut existing.record.description)),
            };
            existing.record.amount = record.amount.clone();
            existing.record.unit = record.unit.clone();
            existing.record.description = record.description.clone();
            return Ok(UpsertOutcome {
                id: existing.id,
                was_update: true,
                previous: Some(previous),
            });
        }

        st.next_id += 1;
        let id = RecordId(st.next_id);
        st.records.push(StoredRecord {
            id,
            record: CareRecord {
                is_deleted: false,
                ..record.clone()
            },
        });
        Ok(UpsertOutcome {
            id,
            was_update: false,
            previous: None,
        })
    }

    async fn soft_delete(&self, time: NaiveDateTime, category: Category) -> Result<DeleteOutcome> {
        let mut st = self.state.lock().await;
        let Some(existing) = st.active_mut(time, category) else {
            return Ok(DeleteOutcome::NotFound);
        };
        existing.record.is_deleted = true;
        Ok(DeleteOutcome::Deleted {
            id: existing.id,
            previous: PreviousValues {
                amount: existing.record.amount.clone(),
                unit: existing.record.unit.clone(),
                description: Some(existing.record.description.clone()),
            },
        })
    }

    async fn query(&self, filter: &RecordQuery) -> Result<Vec<StoredRecord>> {
        let st = self.state.lock().await;
        let mut out: Vec<StoredRecord> = st
            .records
            .iter()
            .filter(|r| filter.matches(&r.record))
            .cloned()
            .collect();
        out.sort_by(|a, b| b.record.time.cmp(&a.record.time).then(b.id.cmp(&a.id)));
        out.truncate(filter.limit);
        Ok(out)
    }

    async fn query_by_date(&self, date: NaiveDate) -> Result<DailyRecords> {
        let (start, end) = day_bounds(date);
        let st = self.state.lock().await;
        Ok(group_by_category(
            st.records
                .iter()
                .filter(|r| !r.record.is_deleted && r.record.time >= start && r.record.time <= end)
                .cloned(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

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
    async fn upsert_twice_keeps_one_active_record() {
        let store = MemoryStore::new();
        let r = rec(at(14, 9, 0), Category::Feeding, Some("120"), "9点喝奶120毫升");

        let first = store.upsert(&r).await.unwrap();
        assert!(!first.was_update);
        assert_eq!(first.previous, None);

        let second = store.upsert(&r).await.unwrap();
        assert!(second.was_update);
        assert_eq!(second.id, first.id);
        let prev = second.previous.unwrap();
        assert_eq!(prev.amount.as_deref(), Some("120"));
        assert_eq!(prev.description.as_deref(), Some("9点喝奶120毫升"));

        let all = store.query(&RecordQuery::default()).await.unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].record.amount.as_deref(), Some("120"));
    }

    #[tokio::test]
    async fn upsert_overwrites_values_in_place() {
        let store = MemoryStore::new();
        let first = store
            .upsert(&rec(at(14, 9, 0), Category::Feeding, Some("90"), "a"))
            .await
            .unwrap();
        let second = store
            .upsert(&rec(at(14, 9, 0), Category::Feeding, Some("120"), "b"))
            .await
            .unwrap();
        assert_eq!(first.id, second.id);
        assert_eq!(second.previous.unwrap().amount.as_deref(), Some("90"));

        let all = store.snapshot().await;
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].record.amount.as_deref(), Some("120"));
        assert_eq!(all[0].record.description, "b");
    }

    #[tokio::test]
    async fn same_time_different_category_are_distinct() {
        let store = MemoryStore::new();
        store.upsert(&rec(at(14, 9, 0), Category::Feeding, None, "a")).await.unwrap();
        let out = store.upsert(&rec(at(14, 9, 0), Category::Urine, None, "b")).await.unwrap();
        assert!(!out.was_update);
        assert_eq!(store.query(&RecordQuery::default()).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn delete_then_upsert_creates_new_identity() {
        let store = MemoryStore::new();
        let r = rec(at(14, 9, 0), Category::Stool, Some("1"), "拉屎");
        let created = store.upsert(&r).await.unwrap();

        let deleted = store.soft_delete(r.time, r.category).await.unwrap();
        let DeleteOutcome::Deleted { id, previous } = deleted else {
            panic!("expected a deletion");
        };
        assert_eq!(id, created.id);
        assert_eq!(previous.amount.as_deref(), Some("1"));

        assert!(store.query(&RecordQuery::default()).await.unwrap().is_empty());

        let again = store.upsert(&r).await.unwrap();
        assert!(!again.was_update);
        assert_ne!(again.id, created.id);

        let all = store.snapshot().await;
        assert_eq!(all.len(), 2);
        assert!(all.iter().any(|s| s.id == created.id && s.record.is_deleted));
    }

    #[tokio::test]
    async fn delete_missing_is_not_found() {
        let store = MemoryStore::new();
        let out = store.soft_delete(at(14, 9, 0), Category::Sleep).await.unwrap();
        assert_eq!(out, DeleteOutcome::NotFound);
        assert!(store.snapshot().await.is_empty());
    }

    #[tokio::test]
    async fn query_filters_and_orders_newest_first() {
        let store = MemoryStore::new();
        store.upsert(&rec(at(13, 8, 0), Category::Feeding, None, "a")).await.unwrap();
        store.upsert(&rec(at(14, 7, 0), Category::Feeding, None, "b")).await.unwrap();
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
    async fn query_by_date_groups_by_category_then_time() {
        let store = MemoryStore::new();
        store.upsert(&rec(at(14, 18, 0), Category::Sleep, None, "s2")).await.unwrap();
        store.upsert(&rec(at(14, 12, 0), Category::Feeding, None, "f2")).await.unwrap();
        store.upsert(&rec(at(14, 9, 0), Category::Sleep, None, "s1")).await.unwrap();
        store.upsert(&rec(at(14, 7, 0), Category::Feeding, None, "f1")).await.unwrap();
        store.upsert(&rec(at(15, 7, 0), Category::Feeding, None, "tomorrow")).await.unwrap();
        store.soft_delete(at(14, 18, 0), Category::Sleep).await.unwrap();

        let day = store
            .query_by_date(NaiveDate::from_ymd_opt(2026, 3, 14).unwrap())
            .await
            .unwrap();
        let cats: Vec<_> = day.keys().copied().collect();
        assert_eq!(cats, vec![Category::Feeding, Category::Sleep]);
        let feeding: Vec<_> = day[&Category::Feeding]
            .iter()
            .map(|r| r.record.description.as_str())
            .collect();
        assert_eq!(feeding, vec!["f1", "f2"]);
        assert_eq!(day[&Category::Sleep].len(), 1);
    }

    #[tokio::test]
    async fn concurrent_upserts_of_one_key_leave_one_record() {
        let store = Arc::new(MemoryStore::new());
        let r = rec(at(14, 9, 0), Category::Urine, None, "尿了");

        let mut handles = Vec::new();
        for _ in 0..16 {
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
        assert_eq!(store.snapshot().await.len(), 1);
    }
}
