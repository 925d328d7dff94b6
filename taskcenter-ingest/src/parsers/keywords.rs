//! Domain keyword extraction, used to give the classifier some context.

use anyhow::Result;
use regex::Regex;

/// Abbreviations from the health-records domain the task lists come from.
pub const DOMAIN_ABBREVIATIONS: [&str; 8] = ["ФЛК", "СЭМД", "ГИСЗ", "РЭМД", "МИС", "ЕГИСЗ", "ЭМД", "СНИЛС"];

/// Max capitalized words taken per text.
const MAX_WORDS: usize = 5;

#[derive(Debug, Clone)]
pub struct KeywordExtractor {
    word_re: Regex,
}

impl KeywordExtractor {
    pub fn new() -> Result<Self> {
        Ok(Self {
            word_re: Regex::new(r"\b[А-ЯЁ][а-яё]{3,}\b")?,
        })
    }

    /// Abbreviations present (case-insensitive) followed by up to five
    /// capitalized words of 4+ letters. First occurrence wins on duplicates.
    pub fn extract(&self, text: &str) -> Vec<String> {
        let upper = text.to_uppercase();
        let mut out: Vec<String> = DOMAIN_ABBREVIATIONS
            .iter()
            .filter(|a| upper.contains(*a))
            .map(|a| a.to_string())
            .collect();

        for m in self.word_re.find_iter(text).take(MAX_WORDS) {
            let w = m.as_str().to_string();
            if !out.contains(&w) {
                out.push(w);
            }
        }
        out
    }
}

/// Collapse whitespace runs and trim.
pub fn clean_text(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}
