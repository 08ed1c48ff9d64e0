//! Plain-text confirmations and reports.
//!
//! Output is deterministic for a given outcome and carries no transport
//! markup; adapters may wrap it as they see fit.

use chrono::NaiveDateTime;

use crate::{
    domain::{CareRecord, StoredRecord},
    service::Outcome,
    utils::truncate_text,
};

const REPORT_DESCRIPTION_MAX: usize = 30;

pub fn render_outcome(outcome: &Outcome) -> String {
    match outcome {
        Outcome::Recorded { record, upsert } => {
            let verb = if upsert.was_update { "更新" } else { "添加" };
            let mut out = format!("记录{verb}成功！{}", record_lines(record));
            if let Some(qty) = record.quantity() {
                out.push_str(&format!("\n数量：{qty}"));
            }
            if let Some(prev) = upsert.previous.as_ref().filter(|_| upsert.was_update) {
                out.push_str("\n\n覆盖了之前的记录：");
                if let Some(qty) = prev.quantity() {
                    out.push_str(&format!("\n原数量：{qty}"));
                }
                if let Some(desc) = prev
                    .description
                    .as_deref()
                    .filter(|d| *d != record.description)
                {
                    out.push_str(&format!("\n原描述：{desc}"));
                }
            }
            out
        }
        Outcome::Deleted {
            record, previous, ..
        } => {
            let mut out = format!("记录删除成功！{}", record_lines(record));
            if let Some(qty) = previous.quantity() {
                out.push_str(&format!("\n数量：{qty}"));
            }
            out
        }
        Outcome::NotFound { record } => {
            format!("未找到要删除的记录！{}", record_lines(record))
        }
        Outcome::Report { date, records } => {
            let date = date.format("%Y-%m-%d");
            if records.values().all(Vec::is_empty) {
                return format!("{date} 没有找到记录");
            }
            let mut out = format!("{date} 记录：");
            for (category, list) in records {
                out.push_str(&format!("\n\n【{category}】{}条", list.len()));
                for r in list {
                    out.push('\n');
                    out.push_str(&report_line(r));
                }
            }
            out
        }
    }
}

fn record_lines(record: &CareRecord) -> String {
    format!(
        "\n时间：{}\n类型：{}",
        format_minute(record.time),
        record.category
    )
}

fn report_line(r: &StoredRecord) -> String {
    let detail = r
        .record
        .quantity()
        .unwrap_or_else(|| truncate_text(&r.record.description, REPORT_DESCRIPTION_MAX));
    format!("{} {detail}", r.record.time.format("%H:%M"))
}

pub fn format_minute(t: NaiveDateTime) -> String {
    t.format("%Y-%m-%d %H:%M").to_string()
}
