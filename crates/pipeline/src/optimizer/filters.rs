//! Token-level filters: the Hebrew-only pre-filter and stop-word removal.

use std::collections::HashSet;

/// Hebrew function words: articles, conjunctions, prepositions, pronouns,
/// auxiliaries and a handful of high-frequency adverbs.
pub const HEBREW_STOP_WORDS: &[&str] = &[
    // article
    "ה",
    // conjunctions
    "ו", "או", "אבל", "כי",
    // prepositions
    "ב", "ל", "כ", "על", "עם", "לפני", "אחרי", "מתחת", "מעל", "בין", "אצל",
    // pronouns
    "אני", "אתה", "את", "הוא", "היא", "אנחנו", "אתם", "אתן", "הם", "הן",
    // auxiliaries
    "היה", "היו", "להיות", "יש", "אין",
    // other
    "מה", "מי", "זה", "זאת", "כל", "שום", "כן", "לא", "מאוד", "רק", "גם", "כבר",
    "אם", "שם", "כאן", "עכשיו", "בבקשה",
];

fn is_hebrew_letter(c: char) -> bool {
    ('\u{05D0}'..='\u{05EA}').contains(&c)
}

/// Replace every character that is neither a Hebrew letter nor whitespace with
/// a space, then collapse runs of whitespace.
pub fn keep_hebrew(text: &str) -> String {
    let replaced: String = text
        .chars()
        .map(|c| {
            if is_hebrew_letter(c) || c.is_whitespace() {
                c
            } else {
                ' '
            }
        })
        .collect();
    replaced.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Removes whole tokens that appear in a stop-word list.
#[derive(Debug, Clone)]
pub struct StopWordFilter {
    words: HashSet<String>,
}

impl StopWordFilter {
    /// Built-in Hebrew list plus `extra` words.
    pub fn new(extra: &[String]) -> Self {
        let words = HEBREW_STOP_WORDS
            .iter()
            .map(|w| w.to_string())
            .chain(extra.iter().cloned())
            .collect();
        Self { words }
    }

    pub fn filter(&self, text: &str) -> String {
        text.split_whitespace()
            .filter(|token| !self.words.contains(*token))
            .collect::<Vec<_>>()
            .join(" ")
    }

    /// The word list, sorted.
    pub fn words(&self) -> Vec<&str> {
        let mut words: Vec<&str> = self.words.iter().map(String::as_str).collect();
        words.sort_unstable();
        words
    }
}

impl Default for StopWordFilter {
    fn default() -> Self {
        Self::new(&[])
    }
}
