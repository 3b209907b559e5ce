//! Token-based fuzzy ranking across breadcrumb kinds.
//!
//! Each query token is scored against an item's primary text with a fixed
//! ladder (whole word 1.0, substring 0.7, ordered subsequence 0.4). Secondary
//! text and scope can only raise a token's score, capped at 0.6/0.4/0.2 and
//! 0.3. Items that miss some tokens are penalized by
//! `matched / total * 0.5` before averaging.

use serde::Serialize;

use crate::model::types::{BreadcrumbKind, DeadEnd, Finding, Unknown};

const WORD_SCORE: f64 = 1.0;
const SUBSTRING_SCORE: f64 = 0.7;
const SUBSEQUENCE_SCORE: f64 = 0.4;
const SECONDARY_WORD_SCORE: f64 = 0.6;
const SECONDARY_SUBSTRING_SCORE: f64 = 0.4;
const SECONDARY_SUBSEQUENCE_SCORE: f64 = 0.2;
const SCOPE_SCORE: f64 = 0.3;
const PARTIAL_MATCH_PENALTY: f64 = 0.5;

/// Something to rank.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchItem {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: BreadcrumbKind,
    pub text: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub secondary_text: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub scope: String,
}

impl From<&Finding> for SearchItem {
    fn from(f: &Finding) -> Self {
        Self {
            id: f.id.clone(),
            kind: BreadcrumbKind::Finding,
            text: f.finding.clone(),
            secondary_text: String::new(),
            scope: f.subject.clone().unwrap_or_default(),
        }
    }
}

impl From<&Unknown> for SearchItem {
    fn from(u: &Unknown) -> Self {
        Self {
            id: u.id.clone(),
            kind: BreadcrumbKind::Unknown,
            text: u.unknown.clone(),
            secondary_text: String::new(),
            scope: u.subject.clone().unwrap_or_default(),
        }
    }
}

impl From<&DeadEnd> for SearchItem {
    fn from(d: &DeadEnd) -> Self {
        Self {
            id: d.id.clone(),
            kind: BreadcrumbKind::DeadEnd,
            text: d.approach.clone(),
            secondary_text: d.why_failed.clone(),
            scope: d.subject.clone().unwrap_or_default(),
        }
    }
}

/// A ranked match.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RankedResult {
    #[serde(flatten)]
    pub item: SearchItem,
    pub score: f64,
}

/// Rank `items` against `query`, dropping scores below `threshold`.
///
/// Sorted by score descending; ties keep input order. An empty query, or one
/// with no alphanumeric characters, matches nothing.
pub fn fuzzy_search(query: &str, items: &[SearchItem], threshold: f64) -> Vec<RankedResult> {
    let tokens = tokenize(query);
    if tokens.is_empty() {
        return Vec::new();
    }

    let mut results: Vec<RankedResult> = items
        .iter()
        .filter_map(|item| {
            let score = score_item(&tokens, item);
            (score >= threshold).then(|| RankedResult {
                item: item.clone(),
                score,
            })
        })
        .collect();

    results.sort_by(|a, b| b.score.total_cmp(&a.score));
    results
}

/// Lower-cased runs of alphanumeric characters.
pub fn tokenize(s: &str) -> Vec<String> {
    s.to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(str::to_string)
        .collect()
}

/// Normalized score of one item against pre-tokenized query terms.
pub fn score_item(tokens: &[String], item: &SearchItem) -> f64 {
    if tokens.is_empty() {
        return 0.0;
    }

    let text = item.text.to_lowercase();
    let secondary = item.secondary_text.to_lowercase();
    let scope = item.scope.to_lowercase();

    let mut total = 0.0;
    let mut matched = 0usize;
    for token in tokens {
        let s = score_token(token, &text, &secondary, &scope);
        if s > 0.0 {
            matched += 1;
            total += s;
        }
    }

    let count = tokens.len() as f64;
    if matched < tokens.len() {
        total *= matched as f64 / count * PARTIAL_MATCH_PENALTY;
    }
    total / count
}

fn score_token(token: &str, text: &str, secondary: &str, scope: &str) -> f64 {
    let mut score = if contains_word(text, token) {
        WORD_SCORE
    } else if text.contains(token) {
        SUBSTRING_SCORE
    } else if subsequence_match(text, token) {
        SUBSEQUENCE_SCORE
    } else {
        0.0
    };

    if !secondary.is_empty() {
        let s = if contains_word(secondary, token) {
            SECONDARY_WORD_SCORE
        } else if secondary.contains(token) {
            SECONDARY_SUBSTRING_SCORE
        } else if subsequence_match(secondary, token) {
            SECONDARY_SUBSEQUENCE_SCORE
        } else {
            0.0
        };
        score = score.max(s);
    }

    if !scope.is_empty() && scope.contains(token) {
        score = score.max(SCOPE_SCORE);
    }

    score
}

/// Whole-word test on the first occurrence of `word` only.
fn contains_word(text: &str, word: &str) -> bool {
    let Some(idx) = text.find(word) else {
        return false;
    };
    let before_ok = text[..idx]
        .chars()
        .next_back()
        .is_none_or(|c| !c.is_alphanumeric());
    let after_ok = text[idx + word.len()..]
        .chars()
        .next()
        .is_none_or(|c| !c.is_alphanumeric());
    before_ok && after_ok
}

/// Characters of `pattern` appear in order in `text`, with at most
/// `pattern.len()` consecutive misses after the first hit.
fn subsequence_match(text: &str, pattern: &str) -> bool {
    let pattern: Vec<char> = pattern.chars().collect();
    if pattern.is_empty() {
        return true;
    }
    let max_gap = pattern.len();
    let mut pos = 0;
    let mut gap = 0;
    for c in text.chars() {
        if pos == pattern.len() {
            break;
        }
        if c == pattern[pos] {
            pos += 1;
            gap = 0;
        } else if pos > 0 {
            gap += 1;
            if gap > max_gap {
                return false;
            }
        }
    }
    pos == pattern.len()
}
