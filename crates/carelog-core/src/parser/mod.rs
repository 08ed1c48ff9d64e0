//! Free-text extraction pipeline.
//!
//! raw text → [`Normalizer`] → {intent, time, category, amount} → [`ParsedMessage`].
//!
//! All tables and compiled patterns are built once in [`Engine::new`] and only
//! read afterwards, so one `Engine` can be shared across tasks.

pub mod amount;
pub mod category;
pub mod intent;
pub mod normalize;
pub mod time;

use chrono::NaiveDateTime;

use crate::{
    domain::{CareRecord, ParsedMessage},
    errors::Error,
    Result,
};

use amount::AmountExtractor;
use category::{CategoryClassifier, KeywordTable};
use intent::IntentClassifier;
use normalize::Normalizer;
use time::TimeResolver;

#[derive(Clone, Debug)]
pub struct ParserConfig {
    /// Messages with fewer characters are ignored.
    pub min_message_chars: usize,
    /// Volume credited per breast side (ml).
    pub breast_side_ml: u32,
    /// Require time + category after a delete verb.
    pub strict_delete: bool,
}

impl Default for ParserConfig {
    fn default() -> Self {
        Self {
            min_message_chars: 3,
            breast_side_ml: 40,
            strict_delete: false,
        }
    }
}

pub struct Engine {
    cfg: ParserConfig,
    normalizer: Normalizer,
    intents: IntentClassifier,
    times: TimeResolver,
    categories: CategoryClassifier,
    amounts: AmountExtractor,
}

impl Engine {
    pub fn new(cfg: ParserConfig) -> Result<Self> {
        Self::with_keywords(cfg, KeywordTable::default())
    }

    pub fn with_keywords(cfg: ParserConfig, table: KeywordTable) -> Result<Self> {
        if cfg.min_message_chars == 0 {
            return Err(Error::Config("min_message_chars must be positive".to_string()));
        }
        if cfg.breast_side_ml == 0 {
            return Err(Error::Config("breast_side_ml must be positive".to_string()));
        }

        Ok(Self {
            normalizer: Normalizer::new()?,
            intents: IntentClassifier::new(&table, cfg.strict_delete)?,
            times: TimeResolver::new()?,
            amounts: AmountExtractor::new(&table, cfg.breast_side_ml)?,
            categories: CategoryClassifier::new(table),
            cfg,
        })
    }

    pub fn config(&self) -> &ParserConfig {
        &self.cfg
    }

    /// Build a record + intent from one message. `None` for too-short input.
    pub fn parse(&self, text: &str, received_at: NaiveDateTime) -> Option<ParsedMessage> {
        if text.trim().chars().count() < self.cfg.min_message_chars {
            return None;
        }

        let normalized = self.normalizer.normalize(text);
        let intent = self.intents.classify(&normalized, received_at.date());
        let time = self.times.resolve(&normalized, received_at);
        let category = self.categories.classify(&normalized);
        let quantity = self
            .amounts
            .extract_raw(&self.normalizer, category, &normalized);

        tracing::debug!(
            ?intent,
            %time,
            category = category.code(),
            amount = quantity.as_ref().map(|q| q.amount.as_str()),
            "parsed message"
        );

        let (amount, unit) = match quantity {
            Some(q) => (Some(q.amount), q.unit),
            None => (None, None),
        };

        Some(ParsedMessage {
            intent,
            record: CareRecord {
                time,
                category,
                amount,
                unit,
                description: text.to_string(),
                is_deleted: false,
                created_at: received_at,
            },
        })
    }
}
