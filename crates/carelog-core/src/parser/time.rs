//! Clock-time resolution.
//!
//! An ordered list of rules is tried top to bottom; the first rule whose
//! pattern matches *and* yields a valid clock time wins. The date is always
//! the receipt day.

use chrono::{NaiveDate, NaiveDateTime, NaiveTime, Timelike};
use regex::{Captures, Regex};

use crate::Result;

pub(crate) const DAY_PERIOD: &str = "今天|今日|上午|早上|早晨|下午|傍晚|晚上|夜里|夜间";

/// Characters that turn trailing digits into an amount instead of minutes.
const MINUTE_STOP: &str = "个次遍回坨块团片边毫升度℃钟小时秒泡下mMlL";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum DayPeriod {
    /// 今天/今日 and the morning words: hour taken as stated.
    AsStated,
    /// 下午/傍晚/晚上/夜里/夜间: hour shifted into the afternoon.
    Afternoon,
}

impl DayPeriod {
    fn from_word(word: &str) -> Self {
        match word {
            "下午" | "傍晚" | "晚上" | "夜里" | "夜间" => Self::Afternoon,
            _ => Self::AsStated,
        }
    }

    fn apply(self, hour: u32) -> u32 {
        match self {
            Self::Afternoon if hour < 12 => hour + 12,
            _ => hour,
        }
    }
}

#[derive(Clone, Copy, Debug)]
struct ClockReading {
    period: DayPeriod,
    hour: u32,
    minute: u32,
}

type Extract = fn(&Captures<'_>) -> Option<ClockReading>;

struct TimeRule {
    name: &'static str,
    pattern: Regex,
    extract: Extract,
}

pub struct TimeResolver {
    rules: Vec<TimeRule>,
}

impl TimeResolver {
    pub fn new() -> Result<Self> {
        let rules = vec![
            // 3点半 must win over 3点 + a stray 半.
            TimeRule {
                name: "half_hour",
                pattern: Regex::new(&format!(r"({DAY_PERIOD})?\s*(\d{{1,2}})\s*[点时]半"))?,
                extract: |caps| {
                    Some(ClockReading {
                        period: period_of(caps),
                        hour: caps.get(2)?.as_str().parse().ok()?,
                        minute: 30,
                    })
                },
            },
            // Minutes must follow the marker directly and must not be the
            // start of an amount ("9点 120ml", "3点2次").
            TimeRule {
                name: "hour_minute",
                pattern: Regex::new(&format!(
                    r"({DAY_PERIOD})?\s*(\d{{1,2}})\s*[点时:：](?:(\d{{1,2}})(?:分|$|[^\d.{MINUTE_STOP}]))?"
                ))?,
                extract: |caps| {
                    let minute = match caps.get(3) {
                        Some(m) => m.as_str().parse().ok()?,
                        None => 0,
                    };
                    Some(ClockReading {
                        period: period_of(caps),
                        hour: caps.get(2)?.as_str().parse().ok()?,
                        minute,
                    })
                },
            },
        ];
        Ok(Self { rules })
    }

    /// Clock time stated in `text`, placed on `date`.
    pub fn find(&self, text: &str, date: NaiveDate) -> Option<NaiveDateTime> {
        for rule in &self.rules {
            for caps in rule.pattern.captures_iter(text) {
                let Some(reading) = (rule.extract)(&caps) else {
                    continue;
                };
                let hour = reading.period.apply(reading.hour);
                let Some(time) = NaiveTime::from_hms_opt(hour, reading.minute, 0) else {
                    tracing::debug!(rule = rule.name, hour, minute = reading.minute, "clock out of range");
                    continue;
                };
                tracing::debug!(rule = rule.name, %time, "resolved clock time");
                return Some(date.and_time(time));
            }
        }
        None
    }

    /// Stated time, or the receipt time (minute precision) when none is found.
    pub fn resolve(&self, text: &str, received_at: NaiveDateTime) -> NaiveDateTime {
        self.find(text, received_at.date())
            .unwrap_or_else(|| truncate_to_minute(received_at))
    }
}

fn period_of(caps: &Captures<'_>) -> DayPeriod {
    caps.get(1)
        .map(|m| DayPeriod::from_word(m.as_str()))
        .unwrap_or(DayPeriod::AsStated)
}

pub fn truncate_to_minute(t: NaiveDateTime) -> NaiveDateTime {
    t.with_second(0)
        .and_then(|t| t.with_nanosecond(0))
        .unwrap_or(t)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn received() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2026, 3, 14)
            .unwrap()
            .and_hms_opt(16, 42, 57)
            .unwrap()
    }

    fn at(h: u32, m: u32) -> NaiveDateTime {
        received().date().and_hms_opt(h, m, 0).unwrap()
    }

    fn resolve(text: &str) -> NaiveDateTime {
        TimeResolver::new().unwrap().resolve(text, received())
    }

    #[test]
    fn half_hour_beats_general_form() {
        assert_eq!(resolve("下午3点半吃奶"), at(15, 30));
        assert_eq!(resolve("8时半睡觉"), at(8, 30));
    }

    #[test]
    fn afternoon_shift_only_below_noon() {
        assert_eq!(resolve("下午2点"), at(14, 0));
        assert_eq!(resolve("下午12点"), at(12, 0));
        assert_eq!(resolve("晚上11点"), at(23, 0));
        assert_eq!(resolve("傍晚6:15"), at(18, 15));
        assert_eq!(resolve("夜里1点"), at(13, 0));
    }

    #[test]
    fn morning_and_today_keep_hour() {
        assert_eq!(resolve("早上8点体温37.5度"), at(8, 0));
        assert_eq!(resolve("今日9点30分拉屎一坨"), at(9, 30));
        assert_eq!(resolve("今天 10：05 喝水"), at(10, 5));
    }

    #[test]
    fn today_prefix_before_afternoon_word() {
        assert_eq!(resolve("今天下午3点吃药2次"), at(15, 0));
    }

    #[test]
    fn out_of_range_falls_through() {
        // 25点 is invalid; the later 9点 is used.
        assert_eq!(resolve("25点 还是 9点"), at(9, 0));
        assert_eq!(resolve("9点75"), received().with_second(0).unwrap());
    }

    #[test]
    fn amount_after_clock_is_not_minutes() {
        assert_eq!(resolve("晚上9点 120ml奶粉"), at(21, 0));
        assert_eq!(resolve("早上8点 37.5度体温"), at(8, 0));
        assert_eq!(resolve("下午3点 2次拉屎"), at(15, 0));
        assert_eq!(resolve("下午3点2次拉屎"), at(15, 0));
        assert_eq!(resolve("早上8点37.5度"), at(8, 0));
        assert_eq!(resolve("9点120毫升"), at(9, 0));
    }

    #[test]
    fn minutes_still_read_before_text_or_end() {
        assert_eq!(resolve("9点30分喝奶"), at(9, 30));
        assert_eq!(resolve("9点30喝奶"), at(9, 30));
        assert_eq!(resolve("喝奶 9:05"), at(9, 5));
    }

    #[test]
    fn no_time_falls_back_to_receipt_minute() {
        assert_eq!(resolve("宝宝拉了大便"), at(16, 42));
    }
}
