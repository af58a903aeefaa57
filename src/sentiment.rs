//! Sentiment trend analysis
//!
//! Lexicon scoring of free-text diary notes. Two-word phrases are matched
//! before single tokens, and a negator flips the polarity of the token right
//! after it. Per-entry scores are then summarized into a chronological trend.

use crate::config::{LexiconConfig, SentimentSettings};
use crate::types::{DiaryEntry, EntryKind, ModuleOutcome};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use tracing::debug;

/// Polarity of a single entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Label {
    Positive,
    Neutral,
    Negative,
}

impl Label {
    pub fn from_score(score: i32) -> Self {
        match score {
            s if s > 0 => Label::Positive,
            s if s < 0 => Label::Negative,
            _ => Label::Neutral,
        }
    }
}

/// Direction of the sentiment trend
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Trend {
    Improving,
    Stable,
    Declining,
}

/// Score of one diary note
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScoredEntry {
    pub date: DateTime<Utc>,
    pub kind: EntryKind,
    pub score: i32,
    /// Score per token
    pub comparative: f64,
    pub label: Label,
    pub token_count: usize,
    /// Lexicon terms that matched, in text order
    pub matched_terms: Vec<String>,
}

/// Aggregate over all scored entries
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SentimentTrend {
    pub average_score: f64,
    pub trend: Trend,
    pub dominant_mood: Label,
    pub negative_streak: usize,
    pub warning_signals: Vec<String>,
    pub entry_count: usize,
    /// Mean of the most recent third minus mean of the earliest third
    pub recent_vs_previous: f64,
    pub no_text_data: bool,
}

impl SentimentTrend {
    /// Well-formed trend for a history without any note text
    pub fn empty() -> Self {
        Self {
            average_score: 0.0,
            trend: Trend::Stable,
            dominant_mood: Label::Neutral,
            negative_streak: 0,
            warning_signals: Vec::new(),
            entry_count: 0,
            recent_vs_previous: 0.0,
            no_text_data: true,
        }
    }
}

/// Output of the sentiment analyzer
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SentimentReport {
    pub entries: Vec<ScoredEntry>,
    pub trend: SentimentTrend,
}

/// Normalized polarity lexicon
#[derive(Debug, Clone, Default)]
pub struct Lexicon {
    unigrams: BTreeMap<String, i32>,
    bigrams: BTreeMap<String, i32>,
    negators: BTreeSet<String>,
}

impl Lexicon {
    pub fn new(config: &LexiconConfig) -> Self {
        let mut lexicon = Lexicon::default();
        for (term, score) in &config.terms {
            let words = tokenize(term);
            match words.as_slice() {
                [word] => {
                    lexicon.unigrams.insert(word.clone(), *score);
                }
                [first, second] => {
                    lexicon.bigrams.insert(format!("{first} {second}"), *score);
                }
                _ => {}
            }
        }
        lexicon.negators = config.negators.iter().flat_map(|n| tokenize(n)).collect();
        lexicon
    }

    pub fn len(&self) -> usize {
        self.unigrams.len() + self.bigrams.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Score a text, returning the total and the matched terms
    pub fn score(&self, tokens: &[String]) -> (i32, Vec<String>) {
        let mut total = 0;
        let mut matched = Vec::new();
        let mut negate = false;
        let mut i = 0;

        while i < tokens.len() {
            if let Some(next) = tokens.get(i + 1) {
                let phrase = format!("{} {}", tokens[i], next);
                if let Some(score) = self.bigrams.get(&phrase) {
                    total += if negate { -score } else { *score };
                    matched.push(phrase);
                    negate = false;
                    i += 2;
                    continue;
                }
            }

            let token = &tokens[i];
            if let Some(score) = self.unigrams.get(token) {
                total += if negate { -score } else { *score };
                matched.push(token.clone());
                negate = false;
            } else {
                negate = self.negators.contains(token);
            }
            i += 1;
        }
        (total, matched)
    }
}

/// Lowercase, fold `ё` into `е` and split on anything not alphanumeric
pub fn tokenize(text: &str) -> Vec<String> {
    text.to_lowercase()
        .replace('ё', "е")
        .split(|c: char| !c.is_alphanumeric())
        .filter(|token| !token.is_empty())
        .map(str::to_string)
        .collect()
}

/// Lexicon-based sentiment analyzer
#[derive(Debug, Clone)]
pub struct SentimentAnalyzer {
    lexicon: Lexicon,
    settings: SentimentSettings,
}

impl SentimentAnalyzer {
    pub fn new(lexicon: &LexiconConfig, settings: SentimentSettings) -> Self {
        Self {
            lexicon: Lexicon::new(lexicon),
            settings,
        }
    }

    pub fn lexicon(&self) -> &Lexicon {
        &self.lexicon
    }

    /// Score a single note
    pub fn score_entry(&self, entry: &DiaryEntry, text: &str) -> ScoredEntry {
        let tokens = tokenize(text);
        let (score, matched_terms) = self.lexicon.score(&tokens);
        let comparative = if tokens.is_empty() {
            0.0
        } else {
            score as f64 / tokens.len() as f64
        };
        ScoredEntry {
            date: entry.date,
            kind: entry.kind,
            score,
            comparative: round2(comparative),
            label: Label::from_score(score),
            token_count: tokens.len(),
            matched_terms,
        }
    }

    /// Analyze the notes of chronologically ordered entries
    pub fn analyze(&self, entries: &[DiaryEntry]) -> ModuleOutcome<SentimentReport> {
        let mut scored: Vec<ScoredEntry> = entries
            .iter()
            .filter_map(|entry| entry.note_text().map(|text| self.score_entry(entry, text)))
            .collect();
        if scored.is_empty() {
            return ModuleOutcome::insufficient("no diary entries with note text");
        }
        scored.sort_by_key(|e| e.date);

        let trend = self.summarize(&scored);
        debug!(
            entries = trend.entry_count,
            trend = ?trend.trend,
            warnings = trend.warning_signals.len(),
            "analyzed sentiment"
        );
        ModuleOutcome::Ready(SentimentReport {
            entries: scored,
            trend,
        })
    }

    /// Summarize chronologically ordered scores into a trend
    pub fn summarize(&self, scored: &[ScoredEntry]) -> SentimentTrend {
        if scored.is_empty() {
            return SentimentTrend::empty();
        }
        let n = scored.len();
        let scores: Vec<f64> = scored.iter().map(|e| e.score as f64).collect();

        let third = (n / 3).max(1);
        let earliest = mean(&scores[..third]);
        let recent = mean(&scores[n - third..]);
        let delta = recent - earliest;
        let trend = if delta > self.settings.trend_delta {
            Trend::Improving
        } else if delta < -self.settings.trend_delta {
            Trend::Declining
        } else {
            Trend::Stable
        };

        let negative_streak = scored
            .iter()
            .rev()
            .take_while(|e| e.label == Label::Negative)
            .count();
        let dominant_mood = dominant_label(scored);

        let s = &self.settings;
        let mut warning_signals = Vec::new();
        if negative_streak >= s.negative_streak_warning {
            warning_signals.push(format!(
                "{negative_streak} negative diary entries in a row"
            ));
        }
        if trend == Trend::Declining && n >= s.min_entries_for_trend_warning {
            warning_signals.push("Diary sentiment is declining".to_string());
        }
        if dominant_mood == Label::Negative && n >= s.min_entries_for_trend_warning {
            warning_signals.push("Negative mood dominates recent diary entries".to_string());
        }
        if recent < s.strong_negative_mean {
            warning_signals.push("Recent diary entries are strongly negative".to_string());
        }

        SentimentTrend {
            average_score: round2(mean(&scores)),
            trend,
            dominant_mood,
            negative_streak,
            warning_signals,
            entry_count: n,
            recent_vs_previous: round2(delta),
            no_text_data: false,
        }
    }
}

/// Most frequent label; ties go to negative, then neutral
fn dominant_label(scored: &[ScoredEntry]) -> Label {
    let count = |label: Label| scored.iter().filter(|e| e.label == label).count();
    [Label::Negative, Label::Neutral, Label::Positive]
        .into_iter()
        .fold((Label::Neutral, 0), |(best, best_count), label| {
            let c = count(label);
            if c > best_count {
                (label, c)
            } else {
                (best, best_count)
            }
        })
        .0
}

fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        0.0
    } else {
        values.iter().sum::<f64>() / values.len() as f64
    }
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
