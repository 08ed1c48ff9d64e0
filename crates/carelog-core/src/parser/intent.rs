use chrono::{Datelike, Days, NaiveDate};
use regex::{Captures, Regex};

use crate::{
    domain::Intent,
    parser::{category::KeywordTable, time::DAY_PERIOD},
    Result,
};

const DELETE_VERBS: &str = "删除|去除|删掉|去掉";
const QUERY_VERBS: &str = "查询|获取|看看|查看|显示";
const REPORT_NOUNS: &str = "记录|日报|报告|情况";

/// Decides Delete > ReportQuery > CreateOrUpdate.
pub struct IntentClassifier {
    delete_structured: Regex,
    delete_keyword: Regex,
    report: Regex,
    strict_delete: bool,
}

impl IntentClassifier {
    /// With `strict_delete`, a bare delete verb is not enough: the message
    /// must also carry a time and a category keyword after the verb.
    pub fn new(table: &KeywordTable, strict_delete: bool) -> Result<Self> {
        let kws = KeywordTable::alternation(table.all_keywords());
        Ok(Self {
            delete_structured: Regex::new(&format!(
                r"(?:{DELETE_VERBS}).*?(?:今天|今日|昨天|前天)?.*?(?:{DAY_PERIOD})?\s*\d{{1,2}}\s*[点时:：].*?(?:{kws})"
            ))?,
            delete_keyword: Regex::new(DELETE_VERBS)?,
            report: Regex::new(&format!(
                r"(?:{QUERY_VERBS})\s*(?:(今天|今日|昨天|前天)|(\d{{4}})\s*[-/.]\s*(\d{{1,2}})\s*[-/.]\s*(\d{{1,2}})|(\d{{1,2}})\s*月\s*(\d{{1,2}})\s*[日号]?)(?:\s*的?\s*(?:{REPORT_NOUNS}))?"
            ))?,
            strict_delete,
        })
    }

    pub fn classify(&self, text: &str, today: NaiveDate) -> Intent {
        if self.is_delete(text) {
            return Intent::Delete;
        }
        if let Some(date) = self.report_date(text, today) {
            return Intent::ReportQuery(date);
        }
        Intent::CreateOrUpdate
    }

    fn is_delete(&self, text: &str) -> bool {
        if self.delete_structured.is_match(text) {
            return true;
        }
        if !self.strict_delete && self.delete_keyword.is_match(text) {
            tracing::debug!("delete verb without time/category; treating as delete");
            return true;
        }
        false
    }

    /// First report expression whose date actually exists.
    pub fn report_date(&self, text: &str, today: NaiveDate) -> Option<NaiveDate> {
        self.report
            .captures_iter(text)
            .find_map(|caps| resolve_date(&caps, today))
    }
}

fn resolve_date(caps: &Captures<'_>, today: NaiveDate) -> Option<NaiveDate> {
    if let Some(rel) = caps.get(1) {
        let days_back = match rel.as_str() {
            "昨天" => 1,
            "前天" => 2,
            _ => 0,
        };
        return today.checked_sub_days(Days::new(days_back));
    }
    if let (Some(y), Some(m), Some(d)) = (caps.get(2), caps.get(3), caps.get(4)) {
        return NaiveDate::from_ymd_opt(
            y.as_str().parse().ok()?,
            m.as_str().parse().ok()?,
            d.as_str().parse().ok()?,
        );
    }
    let (m, d) = (caps.get(5)?, caps.get(6)?);
    NaiveDate::from_ymd_opt(today.year(), m.as_str().parse().ok()?, d.as_str().parse().ok()?)
}
