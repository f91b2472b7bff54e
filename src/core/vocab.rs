/// Auxiliary vocabulary files: the preposition allow-list, frequency
/// counters, and stop predicates.
use rustc_hash::FxHashSet;
use std::io::Write;
use std::path::Path;
use thiserror::Error;

use crate::schema::Counter;

#[derive(Debug, Error)]
pub enum VocabError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("malformed counter line {line}: {text:?}")]
    MalformedCounter { line: usize, text: String },
}

const DEFAULT_PREP_VOCAB: &str = include_str!("../../data/prep_vocab_list.txt");

/// Predicates too generic to carry script knowledge.
pub const STOP_PREDICATES: &[&str] = &[
    "have", "say", "do", "go", "get", "make", "take", "come", "see", "know", "give", "use",
];

pub fn is_stop_predicate(pred: &str) -> bool {
    STOP_PREDICATES.contains(&pred)
}

/// One entry per non-empty line; `#` starts a comment line.
pub fn parse_vocab_list(text: &str) -> FxHashSet<String> {
    text.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(str::to_string)
        .collect()
}

pub fn read_vocab_list(path: &Path) -> Result<FxHashSet<String>, VocabError> {
    Ok(parse_vocab_list(&std::fs::read_to_string(path)?))
}

/// The built-in preposition allow-list.
pub fn default_prep_vocab() -> FxHashSet<String> {
    parse_vocab_list(DEFAULT_PREP_VOCAB)
}

/// Parse `key count` lines. The count is the last whitespace-separated field.
pub fn parse_counter(text: &str) -> Result<Counter, VocabError> {
    let mut counter = Counter::default();
    for (line_no, line) in text.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let malformed = || VocabError::MalformedCounter {
            line: line_no + 1,
            text: line.to_string(),
        };
        let (key, count) = line.rsplit_once(char::is_whitespace).ok_or_else(malformed)?;
        let count: usize = count.parse().map_err(|_| malformed())?;
        *counter.entry(key.trim().to_string()).or_default() += count;
    }
    Ok(counter)
}

pub fn read_counter(path: &Path) -> Result<Counter, VocabError> {
    parse_counter(&std::fs::read_to_string(path)?)
}

/// Write `key count` lines, most frequent first, ties broken by key.
pub fn write_counter<W: Write>(writer: &mut W, counter: &Counter) -> Result<(), VocabError> {
    let mut entries: Vec<(&String, &usize)> = counter.iter().collect();
    entries.sort_by(|a, b| b.1.cmp(a.1).then_with(|| a.0.cmp(b.0)));
    for (key, count) in entries {
        writeln!(writer, "{} {}", key, count)?;
    }
    Ok(())
}

/// Add every count of `other` into `total`.
pub fn merge_counter(total: &mut Counter, other: &Counter) {
    for (key, count) in other {
        *total.entry(key.clone()).or_default() += count;
    }
}
