use std::{fmt, str::FromStr};

use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

use crate::{errors::Error, Result};

/// Chat-platform sender id (opaque string, already authenticated upstream).
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SenderId(pub String);

/// Store-assigned record identity.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RecordId(pub i64);

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Care categories. Declaration order is the report order.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    Feeding,
    Stool,
    Urine,
    Sleep,
    Temperature,
    Medication,
    Other,
}

impl Category {
    pub const ALL: [Category; 7] = [
        Category::Feeding,
        Category::Stool,
        Category::Urine,
        Category::Sleep,
        Category::Temperature,
        Category::Medication,
        Category::Other,
    ];

    /// Stable storage code.
    pub fn code(self) -> &'static str {
        match self {
            Self::Feeding => "feeding",
            Self::Stool => "stool",
            Self::Urine => "urine",
            Self::Sleep => "sleep",
            Self::Temperature => "temperature",
            Self::Medication => "medication",
            Self::Other => "other",
        }
    }

    /// Name shown to chat users.
    pub fn display_name(self) -> &'static str {
        match self {
            Self::Feeding => "吃",
            Self::Stool => "大便",
            Self::Urine => "小便",
            Self::Sleep => "睡",
            Self::Temperature => "体温",
            Self::Medication => "吃药",
            Self::Other => "其他",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display_name())
    }
}

impl FromStr for Category {
    type Err = Error;

    /// Accepts either the storage code or the display name.
    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim();
        Category::ALL
            .into_iter()
            .find(|c| c.code().eq_ignore_ascii_case(s) || c.display_name() == s)
            .ok_or_else(|| Error::Config(format!("unknown category: {s}")))
    }
}

/// A structured care event.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CareRecord {
    /// Minute precision.
    pub time: NaiveDateTime,
    pub category: Category,
    pub amount: Option<String>,
    pub unit: Option<String>,
    /// The message text as received.
    pub description: String,
    pub is_deleted: bool,
    pub created_at: NaiveDateTime,
}

impl CareRecord {
    /// Natural key among non-deleted records.
    pub fn key(&self) -> (NaiveDateTime, Category) {
        (self.time, self.category)
    }

    /// Amount joined with its unit, e.g. `120ml` or `左侧`.
    pub fn quantity(&self) -> Option<String> {
        format_quantity(self.amount.as_deref(), self.unit.as_deref())
    }
}

pub fn format_quantity(amount: Option<&str>, unit: Option<&str>) -> Option<String> {
    let amount = amount?;
    Some(format!("{amount}{}", unit.unwrap_or("")))
}

/// A record as held by a store.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredRecord {
    pub id: RecordId,
    #[serde(flatten)]
    pub record: CareRecord,
}

/// Classified purpose of a message.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "date", rename_all = "snake_case")]
pub enum Intent {
    CreateOrUpdate,
    Delete,
    ReportQuery(NaiveDate),
}

/// Output of the record builder for one message.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParsedMessage {
    pub intent: Intent,
    pub record: CareRecord,
}

/// Values overwritten or retired by a reconciliation step, echoed back in
/// confirmations.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PreviousValues {
    pub amount: Option<String>,
    pub unit: Option<String>,
    pub description: Option<String>,
}

impl PreviousValues {
    pub fn quantity(&self) -> Option<String> {
        format_quantity(self.amount.as_deref(), self.unit.as_deref())
    }
}
