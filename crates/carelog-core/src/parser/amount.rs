//! Category-specific amount and unit extraction.
//!
//! Each category owns an ordered rule list; the first rule that matches and
//! extracts wins. Rules run over amount-normalized text (see
//! [`Normalizer::substitute_amount_numerals`]).

use std::collections::HashMap;

use regex::{Captures, Regex};

use crate::{
    domain::Category,
    parser::{category::KeywordTable, normalize::Normalizer},
    Result,
};

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Quantity {
    pub amount: String,
    pub unit: Option<String>,
}

impl Quantity {
    fn new(amount: impl Into<String>, unit: Option<&str>) -> Self {
        Self {
            amount: amount.into(),
            unit: unit.map(str::to_string),
        }
    }
}

#[derive(Clone, Copy, Debug)]
struct ExtractCtx {
    breast_side_ml: u32,
}

type Extract = fn(&Captures<'_>, ExtractCtx) -> Option<Quantity>;

struct AmountRule {
    pattern: Regex,
    extract: Extract,
}

impl AmountRule {
    fn new(pattern: &str, extract: Extract) -> Result<Self> {
        Ok(Self {
            pattern: Regex::new(pattern)?,
            extract,
        })
    }
}

pub struct AmountExtractor {
    rules: HashMap<Category, Vec<AmountRule>>,
    ctx: ExtractCtx,
}

impl AmountExtractor {
    pub fn new(table: &KeywordTable, breast_side_ml: u32) -> Result<Self> {
        let mut rules = HashMap::new();
        rules.insert(Category::Feeding, feeding_rules()?);
        rules.insert(Category::Stool, excretion_rules(table, Category::Stool)?);
        rules.insert(Category::Urine, excretion_rules(table, Category::Urine)?);
        rules.insert(Category::Sleep, sleep_rules()?);
        rules.insert(Category::Temperature, temperature_rules()?);

        Ok(Self {
            rules,
            ctx: ExtractCtx { breast_side_ml },
        })
    }

    /// `text` must already have gone through the amount numeral pass.
    pub fn extract(&self, category: Category, text: &str) -> Option<Quantity> {
        let rules = self.rules.get(&category)?;
        rules.iter().find_map(|rule| {
            rule.pattern
                .captures_iter(text)
                .find_map(|caps| (rule.extract)(&caps, self.ctx))
        })
    }

    /// Convenience for callers holding raw text.
    pub fn extract_raw(
        &self,
        normalizer: &Normalizer,
        category: Category,
        text: &str,
    ) -> Option<Quantity> {
        self.extract(category, &normalizer.substitute_amount_numerals(text))
    }
}

fn feeding_rules() -> Result<Vec<AmountRule>> {
    Ok(vec![
        // 妈奶/母乳 N边, N边 妈奶/母乳, bare N边: each side is a fixed volume.
        AmountRule::new(
            r"(?:妈奶|母乳)\s*(\d+)\s*边|(\d+)\s*边\s*(?:妈奶|母乳)|(\d+)\s*边",
            |caps, ctx| {
                let sides: u32 = (1..=3)
                    .find_map(|i| caps.get(i))?
                    .as_str()
                    .parse()
                    .ok()?;
                let ml = sides.checked_mul(ctx.breast_side_ml)?;
                Some(Quantity::new(ml.to_string(), Some("ml")))
            },
        )?,
        AmountRule::new(r"(\d+)\s*(?:毫升|(?i:ml))", |caps, _| {
            Some(Quantity::new(&caps[1], Some("ml")))
        })?,
        AmountRule::new(r"(一侧|左侧|右侧|一边|左边|右边)", |caps, _| {
            Some(Quantity::new(&caps[1], None))
        })?,
        AmountRule::new(r"(\d+)\s*(?:次|遍|回)", |caps, _| {
            Some(Quantity::new(&caps[1], Some("次")))
        })?,
    ])
}

fn excretion_rules(table: &KeywordTable, category: Category) -> Result<Vec<AmountRule>> {
    let kws = KeywordTable::alternation(table.keywords(category).iter().map(String::as_str));

    let mut rules = vec![
        AmountRule::new(r"(\d+)\s*(次|遍|回|坨|块|团)", |caps, _| {
            let unit = match &caps[2] {
                "遍" | "回" => "次",
                other => other,
            };
            Some(Quantity::new(&caps[1], Some(unit)))
        })?,
        AmountRule::new(r"(\d+|[半整])\s*(坨|块|团|次|片)", |caps, _| {
            let amount = match &caps[1] {
                "半" => "0.5",
                "整" => "1",
                n => n,
            };
            Some(Quantity::new(amount, Some(&caps[2])))
        })?,
    ];

    // Category-qualified counts ("尿了3泡", "2下大便") only when the category has keywords.
    if !kws.is_empty() {
        rules.push(AmountRule::new(
            &format!(r"(?:{kws})\s*了?\s*(\d+)\s*(?:下|泡|次)|(\d+)\s*(?:下|泡|次)\s*(?:{kws})"),
            |caps, _| {
                let n = caps.get(1).or_else(|| caps.get(2))?;
                Some(Quantity::new(n.as_str(), Some("次")))
            },
        )?);
    }

    Ok(rules)
}

fn sleep_rules() -> Result<Vec<AmountRule>> {
    Ok(vec![
        // 1个半小时
        AmountRule::new(r"(\d+)\s*个?半\s*(小时|分钟)", |caps, _| {
            Some(Quantity::new(format!("{}.5", &caps[1]), Some(&caps[2])))
        })?,
        AmountRule::new(r"(\d+(?:\.\d+)?)\s*个?\s*(分钟|小时|秒)", |caps, _| {
            Some(Quantity::new(&caps[1], Some(&caps[2])))
        })?,
        AmountRule::new(r"半\s*个?\s*(小时)", |caps, _| {
            Some(Quantity::new("0.5", Some(&caps[1])))
        })?,
    ])
}

fn temperature_rules() -> Result<Vec<AmountRule>> {
    Ok(vec![AmountRule::new(
        r"(\d+(?:\.\d+)?)\s*(?:度|℃)",
        |caps, _| Some(Quantity::new(&caps[1], Some("℃"))),
    )?])
}
