use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use serde::Serialize;

use crate::{
    domain::{CareRecord, Category, PreviousValues, RecordId, StoredRecord},
    Result,
};

pub const DEFAULT_QUERY_LIMIT: usize = 100;

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct UpsertOutcome {
    pub id: RecordId,
    pub was_update: bool,
    /// Present only when an active record was overwritten.
    pub previous: Option<PreviousValues>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum DeleteOutcome {
    Deleted {
        id: RecordId,
        previous: PreviousValues,
    },
    NotFound,
}

/// Filter for [`RecordStore::query`]. Date bounds are inclusive whole days.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RecordQuery {
    pub start: Option<NaiveDate>,
    pub end: Option<NaiveDate>,
    pub category: Option<Category>,
    pub limit: usize,
}

impl Default for RecordQuery {
    fn default() -> Self {
        Self {
            start: None,
            end: None,
            category: None,
            limit: DEFAULT_QUERY_LIMIT,
        }
    }
}

impl RecordQuery {
    pub fn matches(&self, record: &CareRecord) -> bool {
        if record.is_deleted {
            return false;
        }
        if let Some(start) = self.start {
            if record.time < day_bounds(start).0 {
                return false;
            }
        }
        if let Some(end) = self.end {
            if record.time > day_bounds(end).1 {
                return false;
            }
        }
        self.category.map_or(true, |c| c == record.category)
    }
}

/// Active records of one day, keyed by category (category order), each list
/// ordered by time ascending.
pub type DailyRecords = BTreeMap<Category, Vec<StoredRecord>>;

/// Reconciliation contract over (time, category).
///
/// Implementations must make the lookup-then-write of `upsert` and
/// `soft_delete` atomic per natural key: two concurrent upserts of the same
/// key must leave exactly one active record.
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Overwrite the active record with the same key, or insert a new one.
    async fn upsert(&self, record: &CareRecord) -> Result<UpsertOutcome>;

    /// Flag the active record with this key as deleted.
    async fn soft_delete(&self, time: NaiveDateTime, category: Category) -> Result<DeleteOutcome>;

    /// Active records, newest first.
    async fn query(&self, filter: &RecordQuery) -> Result<Vec<StoredRecord>>;

    async fn query_by_date(&self, date: NaiveDate) -> Result<DailyRecords>;
}

/// First and last second of `date`.
pub fn day_bounds(date: NaiveDate) -> (NaiveDateTime, NaiveDateTime) {
    let end = NaiveTime::from_hms_opt(23, 59, 59).unwrap_or(NaiveTime::MIN);
    (date.and_time(NaiveTime::MIN), date.and_time(end))
}

pub fn group_by_category(records: impl IntoIterator<Item = StoredRecord>) -> DailyRecords {
    let mut grouped = DailyRecords::new();
    for r in records {
        grouped.entry(r.record.category).or_default().push(r);
    }
    for list in grouped.values_mut() {
        list.sort_by(|a, b| a.record.time.cmp(&b.record.time).then(a.id.cmp(&b.id)));
    }
    grouped
}
