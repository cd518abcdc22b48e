//! Full-text keyword search used by the filter stage.
//!
//! Search is case-insensitive substring matching, except for keywords that
//! collide with common longer words (`organ` in `organization`), which are
//! matched as whole words with an optional plural `s`.

use std::collections::HashSet;
use std::sync::LazyLock;

use regex::Regex;

use nimescreen_shared::{KeywordsConfig, NimeScreenError, Result};

/// Truncate `text` at the last references/citations section header.
///
/// A header is `references` or `citations` alone on its line (surrounding
/// whitespace allowed, any case). A header at the very start of the text is
/// ignored.
pub fn strip_references(text: &str) -> &str {
    static HEADER_RES: LazyLock<[Regex; 2]> = LazyLock::new(|| {
        [
            Regex::new(r"(?i)\n\s*references\s*\n").expect("valid regex"),
            Regex::new(r"(?i)\n\s*citations\s*\n").expect("valid regex"),
        ]
    });

    let last = HEADER_RES
        .iter()
        .filter_map(|re| re.find_iter(text).last().map(|m| m.start()))
        .max();

    match last {
        Some(pos) if pos > 0 => &text[..pos],
        _ => text,
    }
}

enum Pattern {
    Substring,
    WholeWord(Regex),
}

struct KeywordPattern {
    keyword: String,
    pattern: Pattern,
}

/// Keyword table with the instrument/dependent roles used by classification.
pub struct KeywordMatcher {
    patterns: Vec<KeywordPattern>,
    instruments: HashSet<String>,
    dependent: HashSet<String>,
}

impl KeywordMatcher {
    /// Build a matcher from the `[keywords]` config. Duplicate targets are dropped.
    pub fn new(config: &KeywordsConfig) -> Result<Self> {
        let mut seen = HashSet::new();
        let mut patterns = Vec::new();

        for keyword in &config.targets {
            if !seen.insert(keyword.as_str()) {
                continue;
            }
            let pattern = if config.whole_word.contains(keyword) {
                let re = Regex::new(&format!(r"\b{}s?\b", regex::escape(keyword))).map_err(|e| {
                    NimeScreenError::config(format!("bad whole-word keyword '{keyword}': {e}"))
                })?;
                Pattern::WholeWord(re)
            } else {
                Pattern::Substring
            };
            patterns.push(KeywordPattern {
                keyword: keyword.clone(),
                pattern,
            });
        }

        Ok(Self {
            patterns,
            instruments: config.instruments.iter().cloned().collect(),
            dependent: config.dependent.iter().cloned().collect(),
        })
    }

    /// Keywords found in `text`, lowercase, in keyword-table order.
    pub fn search(&self, text: &str) -> Vec<String> {
        let lowered = text.to_lowercase();
        self.patterns
            .iter()
            .filter(|p| match &p.pattern {
                Pattern::Substring => lowered.contains(p.keyword.as_str()),
                Pattern::WholeWord(re) => re.is_match(&lowered),
            })
            .map(|p| p.keyword.clone())
            .collect()
    }

    pub fn is_instrument(&self, keyword: &str) -> bool {
        self.instruments.contains(keyword)
    }

    pub fn is_dependent(&self, keyword: &str) -> bool {
        self.dependent.contains(keyword)
    }
}
