//! Idea Nebula engine.
//!
//! Anonymous fragments become points of light in a shared field. Positions
//! come from a string hash of the fragment id, a collision stitches lines
//! from several fragments into a remix by chaining shared vocabulary, and
//! each animation frame composes node visuals from the viewer's interaction
//! state. Starred texts live in a dedup-by-text favorites set.
//!
//! Zero I/O: persistence, transport and scheduling live in the other crates.

pub mod collide;
pub mod color;
pub mod constants;
pub mod favorites;
pub mod field;
pub mod fragment;
pub mod frame;
pub mod interaction;
pub mod placement;
pub mod serde_compat;
pub mod session;
pub mod time;
pub mod tokenizer;

pub use collide::{RemixResult, RemixSource, chain_lines, collide, remix, remix_lines};
pub use color::Color;
pub use constants::{FEED_LIMIT, HIT_RADIUS, SUBMISSION_SOURCE, VOID_TEXT};
pub use favorites::{
    FavoriteEntry, FavoriteKind, FavoriteStats, Favorites, ImportReport, KindFilter, Toggle,
};
pub use field::{Field, FieldNode, Glimmer, GlimmerPolicy, matches_filter};
pub use fragment::{Fragment, Snapshot};
pub use frame::{Canvas, DrawCommand, FrameReport, NodeStyle, Recorder, Stroke, render_frame};
pub use interaction::Interaction;
pub use placement::{Point, Viewport, place, string_hash};
pub use serde_compat::{Backup, ImportError, ImportRecord, parse_import};
pub use session::{Identity, SubmitError, Submission, prepare_submission};
