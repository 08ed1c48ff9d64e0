//! Numeral normalization.
//!
//! Downstream patterns only understand ASCII digits, so Chinese numerals are
//! rewritten first. Two independent passes exist:
//! - the time pass (hour numerals before 点/时, minute numerals after them)
//! - the amount pass (numeral runs followed by a quantity word, 两 included)

use regex::{Captures, Regex};

use crate::{parser::time::DAY_PERIOD, Result};

/// Quantity words that trigger the amount pass.
const AMOUNT_UNITS: &str = "个|次|遍|回|坨|块|团|片|边|毫升|分钟|小时|秒|度|泡|下";

pub struct Normalizer {
    hour: Regex,
    minute: Regex,
    amount: Regex,
}

impl Normalizer {
    pub fn new() -> Result<Self> {
        Ok(Self {
            // Longest alternatives first: 二十三 before 十二 before a single digit.
            hour: Regex::new(
                r"(二十[一二三]?|十[一二三四五六七八九]?|[零一二三四五六七八九])([点时])",
            )?,
            minute: Regex::new(
                r"([点时])(零[一二三四五六七八九]|[二三四五]十[一二三四五六七八九]?|十[一二三四五六七八九]?|[一二三四五六七八九])分(钟)?",
            )?,
            amount: Regex::new(&format!(
                r"([零一二三四五六七八九十百两]+)(\s*)({AMOUNT_UNITS})"
            ))?,
        })
    }

    /// Time pass. Output is the same string with clock numerals as digits.
    pub fn normalize(&self, text: &str) -> String {
        let hours = rewrite(&self.hour, text, |caps, before, rest| {
            // 一点点 / 一点儿 mean "a little", not one o'clock.
            if rest.starts_with('点') || rest.starts_with('儿') {
                return None;
            }
            // Bare 一点/一时 is "a bit"/"for a while" (差一点, 喝了一点奶)
            // unless something around it reads as a clock.
            if &caps[1] == "一" && !clock_context(before, rest) {
                return None;
            }
            let value = cn_number(&caps[1])?;
            Some(format!("{value}{}", &caps[2]))
        });

        rewrite(&self.minute, &hours, |caps, _, _| {
            // N分钟 is a duration.
            if caps.get(3).is_some() {
                return None;
            }
            let numeral = &caps[2];
            let value = cn_number(numeral)?;
            if numeral.starts_with('零') {
                Some(format!("{}{value:02}", &caps[1]))
            } else {
                Some(format!("{}{value}", &caps[1]))
            }
        })
    }

    /// Amount pass: numeral runs directly followed by a quantity word.
    pub fn substitute_amount_numerals(&self, text: &str) -> String {
        rewrite(&self.amount, text, |caps, _, _| {
            let value = cn_number(&caps[1])?;
            Some(format!("{value}{}{}", &caps[2], &caps[3]))
        })
    }
}

/// Replace every match of `re` with the output of `f`, which also sees the
/// text before and after the match. `None` keeps the match unchanged.
fn rewrite(
    re: &Regex,
    text: &str,
    mut f: impl FnMut(&Captures<'_>, &str, &str) -> Option<String>,
) -> String {
    let mut out = String::with_capacity(text.len());
    let mut last = 0;
    for caps in re.captures_iter(text) {
        let Some(m) = caps.get(0) else {
            continue;
        };
        out.push_str(&text[last..m.start()]);
        match f(&caps, &text[..m.start()], &text[m.end()..]) {
            Some(rep) => out.push_str(&rep),
            None => out.push_str(m.as_str()),
        }
        last = m.end();
    }
    out.push_str(&text[last..]);
    out
}

/// A day-period word right before, or 半/钟/整/minutes right after.
fn clock_context(before: &str, rest: &str) -> bool {
    let before = before.trim_end();
    if DAY_PERIOD.split('|').any(|w| before.ends_with(w)) {
        return true;
    }
    rest.chars().next().is_some_and(|c| {
        matches!(c, '半' | '钟' | '整' | ':' | '：') || c.is_ascii_digit() || cn_digit(c).is_some()
    })
}

fn cn_digit(ch: char) -> Option<u32> {
    Some(match ch {
        '零' => 0,
        '一' => 1,
        '二' | '两' => 2,
        '三' => 3,
        '四' => 4,
        '五' => 5,
        '六' => 6,
        '七' => 7,
        '八' => 8,
        '九' => 9,
        _ => return None,
    })
}

/// Parse a Chinese numeral below one thousand (`二十一`, `一百二十`, `两`).
pub fn cn_number(s: &str) -> Option<u32> {
    if s.is_empty() {
        return None;
    }

    let mut total = 0u32;
    let mut digit: Option<u32> = None;
    // Multipliers must strictly decrease (百 then 十).
    let mut last_multiplier = u32::MAX;

    for ch in s.chars() {
        let multiplier = match ch {
            '百' => 100,
            '十' => 10,
            '零' => {
                if digit.is_some() {
                    return None;
                }
                continue;
            }
            other => {
                if digit.is_some() {
                    return None;
                }
                digit = Some(cn_digit(other)?);
                continue;
            }
        };
        if multiplier >= last_multiplier {
            return None;
        }
        last_multiplier = multiplier;
        total += digit.take().unwrap_or(1) * multiplier;
    }

    Some(total + digit.unwrap_or(0))
}
