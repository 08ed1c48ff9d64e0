use chrono::{Local, NaiveDateTime};

// ============== Timestamp Helpers ==============

/// Local wall-clock time; receipt timestamps and stored times are local.
pub fn now_local() -> NaiveDateTime {
    Local::now().naive_local()
}

// ============== Text Helpers ==============

/// Truncate to `max_chars` characters, appending `...` when cut.
pub fn truncate_text(s: &str, max_chars: usize) -> String {
    if s.chars().count() <= max_chars {
        return s.to_string();
    }
    let mut out = s.chars().take(max_chars).collect::<String>();
    out.push_str("...");
    out
}
