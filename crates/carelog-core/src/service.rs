use std::sync::Arc;

use chrono::{NaiveDate, NaiveDateTime};

use crate::{
    domain::{CareRecord, Intent, PreviousValues, RecordId},
    formatting::render_outcome,
    messaging::{port::ReplyPort, types::IncomingText},
    parser::Engine,
    store::{DailyRecords, DeleteOutcome, RecordStore, UpsertOutcome},
    utils::{now_local, truncate_text},
    Result,
};

/// Result of reconciling one message.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Outcome {
    Recorded {
        record: CareRecord,
        upsert: UpsertOutcome,
    },
    Deleted {
        record: CareRecord,
        id: RecordId,
        previous: PreviousValues,
    },
    NotFound {
        record: CareRecord,
    },
    Report {
        date: NaiveDate,
        records: DailyRecords,
    },
}

/// Message intake: parse → reconcile → reply.
///
/// Holds only shared immutable tables plus the two ports; each message is an
/// independent unit of work.
pub struct CareLogService {
    engine: Arc<Engine>,
    store: Arc<dyn RecordStore>,
    replies: Arc<dyn ReplyPort>,
}

impl CareLogService {
    pub fn new(
        engine: Arc<Engine>,
        store: Arc<dyn RecordStore>,
        replies: Arc<dyn ReplyPort>,
    ) -> Self {
        Self {
            engine,
            store,
            replies,
        }
    }

    pub fn engine(&self) -> &Engine {
        &self.engine
    }

    pub fn store(&self) -> &Arc<dyn RecordStore> {
        &self.store
    }

    /// Parse and reconcile. `Ok(None)` for messages too short to parse.
    ///
    /// Store failures propagate; everything else is an `Outcome`.
    pub async fn process(&self, text: &str, received_at: NaiveDateTime) -> Result<Option<Outcome>> {
        let Some(parsed) = self.engine.parse(text, received_at) else {
            return Ok(None);
        };
        let record = parsed.record;

        let outcome = match parsed.intent {
            Intent::CreateOrUpdate => {
                let upsert = self.store.upsert(&record).await?;
                tracing::info!(
                    id = %upsert.id,
                    updated = upsert.was_update,
                    category = record.category.code(),
                    time = %record.time,
                    "record saved"
                );
                Outcome::Recorded { record, upsert }
            }
            Intent::Delete => match self.store.soft_delete(record.time, record.category).await? {
                DeleteOutcome::Deleted { id, previous } => {
                    tracing::info!(%id, category = record.category.code(), time = %record.time, "record deleted");
                    Outcome::Deleted {
                        record,
                        id,
                        previous,
                    }
                }
                DeleteOutcome::NotFound => {
                    tracing::info!(category = record.category.code(), time = %record.time, "nothing to delete");
                    Outcome::NotFound { record }
                }
            },
            Intent::ReportQuery(date) => {
                let records = self.store.query_by_date(date).await?;
                tracing::info!(%date, categories = records.len(), "report requested");
                Outcome::Report { date, records }
            }
        };

        Ok(Some(outcome))
    }

    /// Transport entry point. Never fails: the sender only notices a problem
    /// through a missing confirmation.
    pub async fn handle(&self, msg: IncomingText) {
        self.handle_at(msg, now_local()).await
    }

    pub async fn handle_at(&self, msg: IncomingText, received_at: NaiveDateTime) {
        tracing::debug!(sender = %msg.sender.0, text = %truncate_text(&msg.text, 80), "incoming message");

        let outcome = match self.process(&msg.text, received_at).await {
            Ok(Some(outcome)) => outcome,
            Ok(None) => {
                tracing::debug!(sender = %msg.sender.0, "message too short; ignored");
                return;
            }
            Err(e) => {
                tracing::error!(sender = %msg.sender.0, error = %e, "failed to reconcile message");
                return;
            }
        };

        let reply = render_outcome(&outcome);
        if let Err(e) = self.replies.send_text(&msg.sender, &reply).await {
            tracing::warn!(sender = %msg.sender.0, error = %e, "failed to send reply");
        }
    }
}
