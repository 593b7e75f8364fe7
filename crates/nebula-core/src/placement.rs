//! Deterministic id → viewport coordinate mapping.
//!
//! The hash must agree bit-for-bit with the browser client so that a node
//! lands on the same pixel no matter which front end draws it. That client
//! evaluates `hash = c + ((hash << 5) - hash)` on doubles: only the shift
//! operand is truncated to a signed 32-bit integer, the subtraction and the
//! addition are exact. We keep the accumulator in an `i64`, which is exact
//! for any id shorter than two billion code units.

use serde::{Deserialize, Serialize};

use crate::constants::{PLACEMENT_BUCKETS, Y_SEED_SUFFIX};

/// Drawing surface size in pixels.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Viewport {
    pub width: f64,
    pub height: f64,
}

impl Viewport {
    pub fn new(width: f64, height: f64) -> Self {
        Self { width, height }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    pub fn distance(self, other: Point) -> f64 {
        (self.x - other.x).hypot(self.y - other.y)
    }
}

/// Non-cryptographic string hash over UTF-16 code units.
pub fn string_hash(s: &str) -> u64 {
    let mut hash: i64 = 0;
    for unit in s.encode_utf16() {
        let shifted = (hash as i32).wrapping_shl(5) as i64;
        hash = unit as i64 + (shifted - hash);
    }
    hash.unsigned_abs()
}

/// Scale a hash bucket into `[0, extent)`.
fn scale(hash: u64, extent: f64) -> f64 {
    (hash % PLACEMENT_BUCKETS) as f64 / PLACEMENT_BUCKETS as f64 * extent
}

/// Position of `id` inside `viewport`. The y seed is the id with a fixed
/// suffix so the two axes are not correlated.
pub fn place(id: &str, viewport: Viewport) -> Point {
    let x = scale(string_hash(id), viewport.width);
    let y_seed = format!("{id}{Y_SEED_SUFFIX}");
    let y = scale(string_hash(&y_seed), viewport.height);
    Point::new(x, y)
}
