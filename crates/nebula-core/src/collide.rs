//! Collision engine: stitch lines from several fragments into one remix.
//!
//! Pool every usable line, shuffle, seed with the first one, then walk the
//! pool greedily: the next line is the first remaining one that shares a
//! significant word with the current line, or simply the first remaining
//! line when nothing overlaps. First match, not best match: the shuffle
//! already decided the tie-breaks.

use std::collections::VecDeque;

use rand::Rng;
use rand::seq::{IndexedRandom, SliceRandom};
use serde::{Deserialize, Serialize};

use crate::constants::{
    MAX_COLLISION_SOURCES, MAX_REMIX_LINES, MIN_COLLISION_SOURCES, MIN_REMIX_LINES, VOID_TEXT,
};
use crate::field::FieldNode;
use crate::fragment::Fragment;
use crate::tokenizer::{shares_vocabulary, significant_words, split_lines};

/// Anything with an id and text that a collision can draw from.
pub trait RemixSource {
    fn source_id(&self) -> &str;
    fn source_text(&self) -> &str;
}

impl RemixSource for Fragment {
    fn source_id(&self) -> &str {
        &self.id
    }

    fn source_text(&self) -> &str {
        &self.content
    }
}

impl RemixSource for FieldNode {
    fn source_id(&self) -> &str {
        &self.id
    }

    fn source_text(&self) -> &str {
        &self.content
    }
}

/// Outcome of one collision.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemixResult {
    pub lines: Vec<String>,
    /// Ids of the fragments that fed the pool, in the order they were picked.
    pub source_ids: Vec<String>,
}

impl RemixResult {
    pub fn text(&self) -> String {
        self.lines.join("\n")
    }
}

/// Build the remix line sequence, or `None` when no input line survives
/// the pool filter.
pub fn remix_lines<S: AsRef<str>>(texts: &[S], rng: &mut impl Rng) -> Option<Vec<String>> {
    let mut pool: Vec<String> = texts
        .iter()
        .flat_map(|text| split_lines(text.as_ref()))
        .collect();
    if pool.is_empty() {
        return None;
    }
    pool.shuffle(rng);

    let target = rng.random_range(MIN_REMIX_LINES..=MAX_REMIX_LINES);
    Some(chain_lines(VecDeque::from(pool), target))
}

/// Walk an already ordered pool: the front line seeds the chain, and each
/// step takes the first remaining line that shares a significant word with
/// the current one, falling back to the front of the pool. Stops at
/// `target` lines or when the pool runs dry.
pub fn chain_lines(mut pool: VecDeque<String>, target: usize) -> Vec<String> {
    let Some(mut current) = pool.pop_front() else {
        return Vec::new();
    };
    let mut output = Vec::with_capacity(target);
    output.push(current.clone());

    while output.len() < target {
        let words = significant_words(&current);
        let next = match pool
            .iter()
            .position(|candidate| shares_vocabulary(&words, candidate))
        {
            Some(i) => pool.remove(i),
            None => pool.pop_front(),
        };
        let Some(next) = next else { break };
        output.push(next.clone());
        current = next;
    }

    output
}

/// Remix `texts` into newline-joined text. An empty pool yields
/// [`VOID_TEXT`] rather than an error.
pub fn remix<S: AsRef<str>>(texts: &[S], rng: &mut impl Rng) -> String {
    match remix_lines(texts, rng) {
        Some(lines) => lines.join("\n"),
        None => VOID_TEXT.to_string(),
    }
}

/// Pick between 3 and 5 distinct sources at random and remix them.
/// Returns `None` while fewer than three sources exist.
pub fn collide<S: RemixSource>(sources: &[S], rng: &mut impl Rng) -> Option<RemixResult> {
    if sources.len() < MIN_COLLISION_SOURCES {
        return None;
    }
    let count = rng
        .random_range(MIN_COLLISION_SOURCES..=MAX_COLLISION_SOURCES)
        .min(sources.len());
    let picked: Vec<&S> = sources.choose_multiple(rng, count).collect();

    let texts: Vec<&str> = picked.iter().map(|s| s.source_text()).collect();
    let lines = remix_lines(&texts, rng).unwrap_or_else(|| vec![VOID_TEXT.to_string()]);
    let source_ids = picked.iter().map(|s| s.source_id().to_string()).collect();

    Some(RemixResult { lines, source_ids })
}
