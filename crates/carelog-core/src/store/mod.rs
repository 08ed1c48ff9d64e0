//! Reconciliation store port and the in-process implementation.

pub mod memory;
pub mod port;

pub use memory::MemoryStore;
pub use port::{DailyRecords, DeleteOutcome, RecordQuery, RecordStore, UpsertOutcome};
