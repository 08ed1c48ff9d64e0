use crate::domain::Category;

/// Immutable per-category keyword sets.
#[derive(Clone, Debug)]
pub struct KeywordTable {
    entries: Vec<(Category, Vec<String>)>,
}

impl Default for KeywordTable {
    fn default() -> Self {
        Self::new(vec![
            (
                Category::Feeding,
                vec![
                    "吃", "喝", "奶", "母乳", "妈奶", "吃奶", "奶粉", "辅食", "饭", "餐", "牛奶", "水",
                ],
            ),
            (
                Category::Stool,
                vec![
                    "大便", "拉", "拉屎", "便便", "屎", "排便", "粑粑", "臭臭", "拉了", "便秘",
                ],
            ),
            (
                Category::Urine,
                vec!["小便", "尿", "尿尿", "尿布", "撒尿", "尿了"],
            ),
            (Category::Sleep, vec!["睡", "睡觉", "午睡", "小睡", "休息"]),
            (Category::Temperature, vec!["体温", "温度", "发热", "发烧"]),
            (Category::Medication, vec!["吃药", "药", "服药", "用药"]),
        ])
    }
}

impl KeywordTable {
    pub fn new(entries: Vec<(Category, Vec<&str>)>) -> Self {
        Self {
            entries: entries
                .into_iter()
                .map(|(c, kws)| (c, kws.into_iter().map(str::to_string).collect()))
                .collect(),
        }
    }

    pub fn keywords(&self, category: Category) -> &[String] {
        self.entries
            .iter()
            .find(|(c, _)| *c == category)
            .map(|(_, kws)| kws.as_slice())
            .unwrap_or(&[])
    }

    pub fn all_keywords(&self) -> impl Iterator<Item = &str> {
        self.entries
            .iter()
            .flat_map(|(_, kws)| kws.iter().map(String::as_str))
    }

    /// Regex alternation over `keywords`, longest first.
    pub fn alternation<'a>(keywords: impl Iterator<Item = &'a str>) -> String {
        let mut kws: Vec<&str> = keywords.collect();
        kws.sort_by(|a, b| b.chars().count().cmp(&a.chars().count()).then(a.cmp(b)));
        kws.dedup();
        kws.into_iter()
            .map(regex::escape)
            .collect::<Vec<_>>()
            .join("|")
    }
}

/// Earliest keyword occurrence wins.
///
/// Ties on the same offset go to the longer keyword (吃药 over 吃), then to
/// table order.
pub struct CategoryClassifier {
    table: KeywordTable,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
struct Hit {
    offset: usize,
    neg_len: isize,
    rank: usize,
}

impl CategoryClassifier {
    pub fn new(table: KeywordTable) -> Self {
        Self { table }
    }

    pub fn classify(&self, text: &str) -> Category {
        self.table
            .entries
            .iter()
            .enumerate()
            .filter_map(|(rank, (category, kws))| {
                earliest_hit(text, kws, rank).map(|hit| (hit, *category))
            })
            .min_by_key(|(hit, _)| *hit)
            .map(|(_, category)| category)
            .unwrap_or(Category::Other)
    }
}

fn earliest_hit(text: &str, keywords: &[String], rank: usize) -> Option<Hit> {
    keywords
        .iter()
        .filter(|kw| !kw.is_empty())
        .filter_map(|kw| {
            let byte = text.find(kw.as_str())?;
            Some(Hit {
                offset: text[..byte].chars().count(),
                neg_len: -(kw.chars().count() as isize),
                rank,
            })
        })
        .min()
}
