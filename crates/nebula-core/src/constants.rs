use crate::color::Color;

/// Lines shorter than this (in chars) never enter the remix pool.
pub const MIN_LINE_CHARS: usize = 6;

/// Minimum length of a significant word.
pub const MIN_WORD_LEN: usize = 3;

/// Inclusive bounds for the per-invocation remix target length.
pub const MIN_REMIX_LINES: usize = 3;
pub const MAX_REMIX_LINES: usize = 8;

/// Inclusive bounds for how many fragments one collision draws from.
pub const MIN_COLLISION_SOURCES: usize = 3;
pub const MAX_COLLISION_SOURCES: usize = 5;

/// Returned when a collision has no usable lines to work with.
pub const VOID_TEXT: &str = "The void is silent.";

/// Placement hash is reduced modulo this before scaling to the viewport.
pub const PLACEMENT_BUCKETS: u64 = 1000;

/// Appended to a fragment id to derive its independent y-coordinate seed.
pub const Y_SEED_SUFFIX: &str = "y";

/// Pointer hit radius in pixels (strict: distance must be below this).
pub const HIT_RADIUS: f64 = 15.0;

/// Per-frame chance of trying to ignite a glimmer.
pub const GLIMMER_CHANCE: f64 = 0.1;

/// Glimmer life lost on every frame it is drawn.
pub const GLIMMER_DECAY: f64 = 0.02;

/// Most recent fragments kept in a feed snapshot.
pub const FEED_LIMIT: usize = 2000;

/// Tag attached to every submitted fragment.
pub const SUBMISSION_SOURCE: &str = "anonymous";

pub const BACKGROUND: Color = Color::rgb(0x00, 0x00, 0x00);
pub const NEUTRAL: Color = Color::rgb(0xff, 0xff, 0xff);
pub const ACCENT: Color = Color::rgb(0xfa, 0xcc, 0x15);
pub const DIMMED: Color = Color::rgb(0x33, 0x33, 0x33);

/// Warm/alert palette a glimmer picks its color from.
pub const GLIMMER_PALETTE: [Color; 4] = [
    Color::rgb(0xfa, 0xcc, 0x15),
    Color::rgb(0xff, 0xff, 0xff),
    Color::rgb(0xfb, 0x92, 0x3c),
    Color::rgb(0xef, 0x44, 0x44),
];

pub const CONSTELLATION_WIDTH: f64 = 0.5;
pub const CONSTELLATION_ALPHA: f64 = 0.6;
