//! Paper-level priority scoring for KWIC screening.
//!
//! The score is advisory: it only orders papers for manual review. Every
//! constant comes from [`ScoringConfig`] and the defaults reproduce the tuned
//! heuristic exactly.

use std::collections::{BTreeMap, HashSet};

use regex::Regex;

use nimescreen_shared::{NimeScreenError, Result, ScoringConfig};

// ---------------------------------------------------------------------------
// IDF
// ---------------------------------------------------------------------------

/// `log10(total_docs / docs_with_keyword)`, or 0 when no document has the keyword.
pub fn idf(total_docs: usize, docs_with_keyword: usize) -> f64 {
    if total_docs == 0 || docs_with_keyword == 0 {
        return 0.0;
    }
    (total_docs as f64 / docs_with_keyword as f64).log10()
}

/// IDF weight per keyword, in keyword-table order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct IdfTable {
    weights: Vec<(String, f64)>,
}

impl IdfTable {
    /// Build from per-keyword document frequencies. Keywords missing from
    /// `docs_with_keyword` get weight 0.
    pub fn new(
        keywords: &[String],
        total_docs: usize,
        docs_with_keyword: &BTreeMap<String, usize>,
    ) -> Self {
        let mut seen = HashSet::new();
        let weights = keywords
            .iter()
            .filter(|kw| seen.insert(kw.as_str()))
            .map(|kw| {
                let df = docs_with_keyword.get(kw).copied().unwrap_or(0);
                (kw.clone(), idf(total_docs, df))
            })
            .collect();
        Self { weights }
    }

    pub fn weight(&self, keyword: &str) -> f64 {
        self.weights
            .iter()
            .find(|(kw, _)| kw == keyword)
            .map(|(_, w)| *w)
            .unwrap_or(0.0)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, f64)> {
        self.weights.iter().map(|(kw, w)| (kw.as_str(), *w))
    }
}

// ---------------------------------------------------------------------------
// Context vocabulary
// ---------------------------------------------------------------------------

/// Word-bounded counters for the musical and false-positive vocabularies.
pub struct ContextTerms {
    musical: Vec<Regex>,
    false_positive: Vec<Regex>,
}

impl ContextTerms {
    pub fn new(config: &ScoringConfig) -> Result<Self> {
        Ok(Self {
            musical: compile_terms(&config.musical_terms)?,
            false_positive: compile_terms(&config.false_positive_terms)?,
        })
    }

    /// Musical-term occurrences in a lowercase blob.
    pub fn musical_count(&self, blob: &str) -> usize {
        count_all(&self.musical, blob)
    }

    /// False-positive-term occurrences in a lowercase blob.
    pub fn false_positive_count(&self, blob: &str) -> usize {
        count_all(&self.false_positive, blob)
    }
}

fn compile_terms(terms: &[String]) -> Result<Vec<Regex>> {
    terms
        .iter()
        .map(|term| {
            Regex::new(&format!(r"\b{}\b", regex::escape(term)))
                .map_err(|e| NimeScreenError::config(format!("bad scoring term '{term}': {e}")))
        })
        .collect()
}

fn count_all(patterns: &[Regex], blob: &str) -> usize {
    patterns.iter().map(|re| re.find_iter(blob).count()).sum()
}

// ---------------------------------------------------------------------------
// Score
// ---------------------------------------------------------------------------

/// Everything the score depends on for one paper.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ScoreInputs {
    pub hit_count: usize,
    /// Occurrences per keyword.
    pub keyword_counts: BTreeMap<String, usize>,
    pub musical_term_count: usize,
    pub false_positive_count: usize,
}

/// The score split into its components. `total` is their signed sum.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ScoreBreakdown {
    pub volume: f64,
    pub rarity: f64,
    pub instrument_bonus: f64,
    pub musical_context: f64,
    pub false_positive_penalty: f64,
    pub total: f64,
}

pub fn score_paper(
    inputs: &ScoreInputs,
    idf: &IdfTable,
    boosted: &[String],
    config: &ScoringConfig,
) -> ScoreBreakdown {
    let volume = (inputs.hit_count as f64 + 1.0).log2() * config.volume_weight;

    let mut rarity = 0.0;
    let mut instrument_bonus = 0.0;
    for (keyword, &count) in &inputs.keyword_counts {
        let count = count as f64;
        rarity += idf.weight(keyword) * config.idf_weight * count;
        if boosted.contains(keyword) {
            instrument_bonus += config.instrument_bonus * count;
        }
    }

    let musical_context = config.musical_term_weight * inputs.musical_term_count as f64;
    let false_positive_penalty = config.false_positive_weight * inputs.false_positive_count as f64;

    ScoreBreakdown {
        volume,
        rarity,
        instrument_bonus,
        musical_context,
        false_positive_penalty,
        total: volume + rarity + instrument_bonus + musical_context - false_positive_penalty,
    }
}

// ---------------------------------------------------------------------------
// Preview
// ---------------------------------------------------------------------------

/// The last `n` characters of `s`.
pub(crate) fn last_chars(s: &str, n: usize) -> &str {
    if n == 0 {
        return "";
    }
    let start = s.char_indices().rev().nth(n - 1).map(|(i, _)| i).unwrap_or(0);
    &s[start..]
}

/// The first `n` characters of `s`.
pub(crate) fn first_chars(s: &str, n: usize) -> &str {
    let end = s.char_indices().nth(n).map(|(i, _)| i).unwrap_or(s.len());
    &s[..end]
}

/// Render one occurrence as `...before [WORD] after...`.
pub fn snippet(before: &str, matched_word: &str, after: &str, chars: usize) -> String {
    format!(
        "...{} [{}] {}...",
        last_chars(before, chars),
        matched_word.to_uppercase(),
        first_chars(after, chars)
    )
}

/// Join up to `max` distinct snippets, first occurrence first.
pub fn build_preview(snippets: impl IntoIterator<Item = String>, max: usize) -> String {
    let mut seen = HashSet::new();
    let unique: Vec<String> = snippets
        .into_iter()
        .filter(|s| seen.insert(s.clone()))
        .take(max)
        .collect();
    unique.join(" \n\n ")
}
