//! Text segmentation for chunked synthesis
//!
//! Splits request text into units no longer than a character bound,
//! preferring paragraph, then sentence, then clause, then word boundaries.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use once_cell::sync::Lazy;
use parking_lot::Mutex;
use regex::Regex;
use soulgate_core::TextUnit;

static PARAGRAPH_BREAK: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\n[ \t\r\f\v]*\n\s*").unwrap());

const PARAGRAPH_SEPARATOR: &str = "\n\n";
const WORD_SEPARATOR: &str = " ";

/// A piece of text plus the separator that joins it to the previous piece
struct Fragment<'a> {
    separator: &'static str,
    text: &'a str,
}

/// Split `text` into ordered units of at most `max_chars` characters.
///
/// Whitespace-only input yields no units. A single word longer than the
/// bound is returned whole as its own unit.
pub fn segment(text: &str, max_chars: usize) -> Vec<TextUnit> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Vec::new();
    }

    let max_chars = max_chars.max(1);
    if char_len(trimmed) <= max_chars {
        return vec![TextUnit::new(0, trimmed)];
    }

    let mut fragments = Vec::new();
    let paragraphs = PARAGRAPH_BREAK
        .split(trimmed)
        .map(str::trim)
        .filter(|p| !p.is_empty());

    for (p_idx, paragraph) in paragraphs.enumerate() {
        for (f_idx, piece) in split_to_fit(paragraph, max_chars).into_iter().enumerate() {
            let separator = if p_idx > 0 && f_idx == 0 {
                PARAGRAPH_SEPARATOR
            } else {
                WORD_SEPARATOR
            };
            fragments.push(Fragment {
                separator,
                text: piece,
            });
        }
    }

    pack(fragments, max_chars)
}

/// Break one paragraph into pieces that each fit, where possible
fn split_to_fit(paragraph: &str, max_chars: usize) -> Vec<&str> {
    if char_len(paragraph) <= max_chars {
        return vec![paragraph];
    }

    let mut pieces = Vec::new();
    for sentence in split_after(paragraph, |c| matches!(c, '.' | '!' | '?')) {
        if char_len(sentence) <= max_chars {
            pieces.push(sentence);
            continue;
        }

        for clause in split_after(sentence, |c| c == ',') {
            if char_len(clause) <= max_chars {
                pieces.push(clause);
            } else {
                pieces.extend(clause.split_whitespace());
            }
        }
    }

    pieces
}

/// Split after every boundary character that is followed by whitespace.
/// Returned slices are trimmed and non-empty.
fn split_after(text: &str, is_boundary: impl Fn(char) -> bool) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut start = 0;
    let mut chars = text.char_indices().peekable();

    while let Some((idx, c)) = chars.next() {
        if !is_boundary(c) {
            continue;
        }
        let followed_by_space = chars.peek().map_or(false, |(_, next)| next.is_whitespace());
        if followed_by_space {
            let end = idx + c.len_utf8();
            parts.push(&text[start..end]);
            start = end;
        }
    }
    parts.push(&text[start..]);

    parts
        .into_iter()
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .collect()
}

/// Greedily join fragments while the running length stays within the bound
fn pack(fragments: Vec<Fragment<'_>>, max_chars: usize) -> Vec<TextUnit> {
    let mut units: Vec<TextUnit> = Vec::new();
    let mut current = String::new();
    let mut current_len = 0;

    for fragment in fragments {
        let fragment_len = char_len(fragment.text);

        if current.is_empty() {
            current.push_str(fragment.text);
            current_len = fragment_len;
            continue;
        }

        let joined_len = current_len + fragment.separator.len() + fragment_len;
        if joined_len <= max_chars {
            current.push_str(fragment.separator);
            current.push_str(fragment.text);
            current_len = joined_len;
        } else {
            let index = units.len();
            units.push(TextUnit::new(index, std::mem::take(&mut current)));
            current.push_str(fragment.text);
            current_len = fragment_len;
        }
    }

    if !current.is_empty() {
        let index = units.len();
        units.push(TextUnit::new(index, current));
    }

    units
}

fn char_len(text: &str) -> usize {
    text.chars().count()
}

/// Segmentation with a bounded memo keyed by (text, bound).
///
/// Oldest memo entries are dropped first once `capacity` is reached.
pub struct Segmenter {
    capacity: usize,
    memo: Mutex<Memo>,
}

#[derive(Default)]
struct Memo {
    entries: HashMap<(String, usize), Arc<Vec<TextUnit>>>,
    order: VecDeque<(String, usize)>,
}

impl Segmenter {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            memo: Mutex::new(Memo::default()),
        }
    }

    /// Segment `text`, reusing an earlier result for the same input
    pub fn segment(&self, text: &str, max_chars: usize) -> Arc<Vec<TextUnit>> {
        let key = (text.to_string(), max_chars);

        if let Some(units) = self.memo.lock().entries.get(&key) {
            return Arc::clone(units);
        }

        let units = Arc::new(segment(text, max_chars));
        if self.capacity == 0 {
            return units;
        }

        let mut memo = self.memo.lock();
        if !memo.entries.contains_key(&key) {
            while memo.entries.len() >= self.capacity {
                match memo.order.pop_front() {
                    Some(oldest) => {
                        memo.entries.remove(&oldest);
                    }
                    None => break,
                }
            }
            memo.order.push_back(key.clone());
            memo.entries.insert(key, Arc::clone(&units));
        }

        units
    }

    /// Drop every memoized segmentation
    pub fn clear(&self) {
        let mut memo = self.memo.lock();
        memo.entries.clear();
        memo.order.clear();
        memo.entries.shrink_to_fit();
        memo.order.shrink_to_fit();
    }

    pub fn len(&self) -> usize {
        self.memo.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
