//! One animation frame: glimmer ignition, per-node visual rules, painting.
//!
//! Rule order is load-bearing: focus beats hover, hover beats search, a
//! search dims everything it does not match, and only nodes nobody is
//! looking at get to glimmer. A glimmer only burns down on frames where it
//! is actually the thing being drawn.

use rand::Rng;

use crate::color::Color;
use crate::constants::{
    ACCENT, BACKGROUND, CONSTELLATION_ALPHA, CONSTELLATION_WIDTH, DIMMED, NEUTRAL,
};
use crate::field::{Field, FieldNode, matches_filter};
use crate::interaction::Interaction;
use crate::placement::Point;

const LARGE_RADIUS: f64 = 4.0;
const MEDIUM_RADIUS: f64 = 3.0;
const BASE_RADIUS: f64 = 2.0;
const STRONG_GLOW: f64 = 15.0;
const MEDIUM_GLOW: f64 = 10.0;

/// Which visual rule won for a node this frame.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Rule {
    /// Selected, or one of the current remix sources.
    Focused,
    Hovered,
    SearchHit,
    Dimmed,
    Glimmering,
    Resting,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct NodeStyle {
    pub color: Color,
    pub radius: f64,
    pub glow: f64,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Stroke {
    pub color: Color,
    pub width: f64,
    pub alpha: f64,
    /// Join the last point back to the first.
    pub closed: bool,
}

/// Paint target for frames.
pub trait Canvas {
    fn clear(&mut self, color: Color);
    fn fill_circle(&mut self, center: Point, style: NodeStyle);
    fn stroke_polyline(&mut self, points: &[Point], stroke: Stroke);
}

/// First matching rule, evaluated in priority order.
pub fn classify(node: &FieldNode, ix: &Interaction) -> Rule {
    if ix.is_selected(&node.id) || ix.is_remix_source(&node.id) {
        Rule::Focused
    } else if ix.is_hovered(&node.id) {
        Rule::Hovered
    } else if matches_filter(node, &ix.search) {
        Rule::SearchHit
    } else if ix.search_active() {
        Rule::Dimmed
    } else if node.glimmer().is_some() {
        Rule::Glimmering
    } else {
        Rule::Resting
    }
}

impl Rule {
    /// Style for this rule. `glimmer` is only consulted by `Glimmering`.
    pub fn style(self, glimmer: Option<Color>) -> NodeStyle {
        let (color, radius, glow) = match self {
            Rule::Focused => (ACCENT, LARGE_RADIUS, STRONG_GLOW),
            Rule::Hovered => (ACCENT, MEDIUM_RADIUS, MEDIUM_GLOW),
            Rule::SearchHit => (ACCENT, MEDIUM_RADIUS, 0.0),
            Rule::Dimmed => (DIMMED, BASE_RADIUS, 0.0),
            Rule::Glimmering => (glimmer.unwrap_or(NEUTRAL), MEDIUM_RADIUS, MEDIUM_GLOW),
            Rule::Resting => (NEUTRAL, BASE_RADIUS, 0.0),
        };
        NodeStyle {
            color,
            radius,
            glow,
        }
    }
}

/// What happened while drawing one frame.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct FrameReport {
    pub drawn: usize,
    pub ignited: Option<usize>,
    pub constellation: usize,
}

/// Positions of the remix sources still present in the field, in source order.
pub fn constellation_points(field: &Field, ix: &Interaction) -> Vec<Point> {
    ix.remix_sources
        .iter()
        .filter_map(|id| field.get(id).map(|n| n.position))
        .collect()
}

/// Draw one full frame of `field` onto `canvas`.
pub fn render_frame(
    field: &mut Field,
    ix: &Interaction,
    canvas: &mut impl Canvas,
    rng: &mut impl Rng,
) -> FrameReport {
    canvas.clear(BACKGROUND);

    let ignited = field.try_ignite(rng);

    for index in 0..field.len() {
        let node = &field.nodes()[index];
        let rule = classify(node, ix);
        let center = node.position;
        let glimmer = match rule {
            Rule::Glimmering => field.burn_glimmer(index),
            _ => None,
        };
        canvas.fill_circle(center, rule.style(glimmer));
    }

    let points = constellation_points(field, ix);
    let constellation = if points.len() >= 2 {
        canvas.stroke_polyline(
            &points,
            Stroke {
                color: ACCENT,
                width: CONSTELLATION_WIDTH,
                alpha: CONSTELLATION_ALPHA,
                closed: true,
            },
        );
        points.len()
    } else {
        0
    };

    FrameReport {
        drawn: field.len(),
        ignited,
        constellation,
    }
}

/// A recorded paint call.
#[derive(Clone, Debug, PartialEq)]
pub enum DrawCommand {
    Clear(Color),
    Circle { center: Point, style: NodeStyle },
    Polyline { points: Vec<Point>, stroke: Stroke },
}

/// Canvas that just remembers what it was asked to paint.
#[derive(Clone, Debug, Default)]
pub struct Recorder {
    pub commands: Vec<DrawCommand>,
}

impl Recorder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn circles(&self) -> impl Iterator<Item = (Point, NodeStyle)> + '_ {
        self.commands.iter().filter_map(|c| match c {
            DrawCommand::Circle { center, style } => Some((*center, *style)),
            _ => None,
        })
    }

    pub fn polylines(&self) -> impl Iterator<Item = (&[Point], Stroke)> + '_ {
        self.commands.iter().filter_map(|c| match c {
            DrawCommand::Polyline { points, stroke } => Some((points.as_slice(), *stroke)),
            _ => None,
        })
    }

    pub fn reset(&mut self) {
        self.commands.clear();
    }
}

impl Canvas for Recorder {
    fn clear(&mut self, color: Color) {
        self.commands.push(DrawCommand::Clear(color));
    }

    fn fill_circle(&mut self, center: Point, style: NodeStyle) {
        self.commands.push(DrawCommand::Circle { center, style });
    }

    fn stroke_polyline(&mut self, points: &[Point], stroke: Stroke) {
        self.commands.push(DrawCommand::Polyline {
            points: points.to_vec(),
            stroke,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::GLIMMER_PALETTE;
    use crate::fragment::Fragment;
    use crate::placement::Viewport;
    use rand::SeedableRng;
    use rand::rngs::SmallRng;

    fn rng() -> SmallRng {
        SmallRng::seed_from_u64(42)
    }

    fn field(contents: &[(&str, &str)]) -> Field {
        let vp = Viewport::new(1000.0, 1000.0);
        let frags: Vec<Fragment> = contents
            .iter()
            .map(|(id, content)| Fragment {
                id: id.to_string(),
                content: content.to_string(),
                created_at: 0,
            })
            .collect();
        let mut field = Field::new(vp);
        field.sync(&frags, vp);
        field
    }

    /// Light every node so the glimmer rule is in play everywhere.
    fn ignite_all(field: &mut Field) {
        let mut rng = rng();
        while field.glimmer_count() < field.len() {
            field.try_ignite(&mut rng);
        }
    }

    fn node<'a>(field: &'a Field, id: &str) -> &'a FieldNode {
        field.get(id).unwrap()
    }

    #[test]
    fn test_focus_beats_everything() {
        let mut f = field(&[("a", "electric dream")]);
        ignite_all(&mut f);
        let ix = Interaction {
            selected: Some("a".into()),
            hovered: Some("a".into()),
            search: "nothing matches".into(),
            ..Default::default()
        };
        assert_eq!(classify(node(&f, "a"), &ix), Rule::Focused);
    }

    #[test]
    fn test_remix_source_is_focused() {
        let f = field(&[("a", "x")]);
        let ix = Interaction {
            remix_sources: vec!["a".into()],
            ..Default::default()
        };
        assert_eq!(classify(node(&f, "a"), &ix), Rule::Focused);
    }

    #[test]
    fn test_hover_beats_search() {
        let f = field(&[("a", "electric dream")]);
        let ix = Interaction {
            hovered: Some("a".into()),
            search: "dream".into(),
            ..Default::default()
        };
        assert_eq!(classify(node(&f, "a"), &ix), Rule::Hovered);
    }

    #[test]
    fn test_search_hit_and_dim() {
        let f = field(&[("a", "electric dream"), ("b", "quiet river")]);
        let ix = Interaction {
            search: "DREAM".into(),
            ..Default::default()
        };
        assert_eq!(classify(node(&f, "a"), &ix), Rule::SearchHit);
        assert_eq!(classify(node(&f, "b"), &ix), Rule::Dimmed);
    }

    #[test]
    fn test_search_suppresses_glimmer() {
        let mut f = field(&[("a", "quiet river")]);
        ignite_all(&mut f);
        let ix = Interaction {
            search: "dream".into(),
            ..Default::default()
        };
        assert_eq!(classify(node(&f, "a"), &ix), Rule::Dimmed);
    }

    #[test]
    fn test_glimmer_then_rest() {
        let mut f = field(&[("a", "x")]);
        let ix = Interaction::default();
        assert_eq!(classify(node(&f, "a"), &ix), Rule::Resting);
        ignite_all(&mut f);
        assert_eq!(classify(node(&f, "a"), &ix), Rule::Glimmering);
    }

    #[test]
    fn test_rule_styles() {
        assert_eq!(
            Rule::Focused.style(None),
            NodeStyle { color: ACCENT, radius: 4.0, glow: 15.0 }
        );
        assert_eq!(
            Rule::Hovered.style(None),
            NodeStyle { color: ACCENT, radius: 3.0, glow: 10.0 }
        );
        assert_eq!(
            Rule::SearchHit.style(None),
            NodeStyle { color: ACCENT, radius: 3.0, glow: 0.0 }
        );
        assert_eq!(
            Rule::Dimmed.style(None),
            NodeStyle { color: DIMMED, radius: 2.0, glow: 0.0 }
        );
        let ember = GLIMMER_PALETTE[2];
        assert_eq!(
            Rule::Glimmering.style(Some(ember)),
            NodeStyle { color: ember, radius: 3.0, glow: 10.0 }
        );
        assert_eq!(
            Rule::Resting.style(None),
            NodeStyle { color: NEUTRAL, radius: 2.0, glow: 0.0 }
        );
    }

    #[test]
    fn test_frame_clears_then_draws_every_node() {
        let mut f = field(&[("a", "x"), ("b", "y"), ("c", "z")]);
        let mut canvas = Recorder::new();
        let report = render_frame(&mut f, &Interaction::default(), &mut canvas, &mut rng());
        assert_eq!(canvas.commands[0], DrawCommand::Clear(BACKGROUND));
        assert_eq!(canvas.circles().count(), 3);
        assert_eq!(report.drawn, 3);
        assert_eq!(report.constellation, 0);
    }

    #[test]
    fn test_frame_draws_in_node_order() {
        let mut f = field(&[("a", "x"), ("b", "y")]);
        let mut canvas = Recorder::new();
        render_frame(&mut f, &Interaction::default(), &mut canvas, &mut rng());
        let centers: Vec<Point> = canvas.circles().map(|(c, _)| c).collect();
        assert_eq!(centers, vec![node(&f, "a").position, node(&f, "b").position]);
    }

    #[test]
    fn test_glimmer_only_decays_when_drawn_as_glimmer() {
        let mut f = field(&[("a", "x")]);
        ignite_all(&mut f);
        let hovered = Interaction {
            hovered: Some("a".into()),
            ..Default::default()
        };
        let mut canvas = Recorder::new();
        let mut rng = rng();
        for _ in 0..10 {
            render_frame(&mut f, &hovered, &mut canvas, &mut rng);
        }
        let life = node(&f, "a").glimmer().unwrap().life;
        assert!((life - 1.0).abs() < f64::EPSILON, "hover must not burn glimmer");

        render_frame(&mut f, &Interaction::default(), &mut canvas, &mut rng);
        let life = node(&f, "a").glimmer().unwrap().life;
        assert!((life - 0.98).abs() < 1e-9);
    }

    #[test]
    fn test_glimmering_node_painted_in_its_color() {
        let mut f = field(&[("a", "x")]);
        ignite_all(&mut f);
        let color = node(&f, "a").glimmer().unwrap().color;
        let mut canvas = Recorder::new();
        render_frame(&mut f, &Interaction::default(), &mut canvas, &mut rng());
        let (_, style) = canvas.circles().next().unwrap();
        assert_eq!(style.color, color);
        assert_eq!(style.radius, 3.0);
    }

    #[test]
    fn test_constellation_follows_source_order() {
        let mut f = field(&[("a", "x"), ("b", "y"), ("c", "z")]);
        let ix = Interaction {
            remix_sources: vec!["c".into(), "a".into(), "gone".into(), "b".into()],
            ..Default::default()
        };
        let mut canvas = Recorder::new();
        let report = render_frame(&mut f, &ix, &mut canvas, &mut rng());
        let (points, stroke) = canvas.polylines().next().unwrap();
        assert_eq!(
            points,
            &[node(&f, "c").position, node(&f, "a").position, node(&f, "b").position]
        );
        assert!(stroke.closed);
        assert_eq!(stroke.color, ACCENT);
        assert!((stroke.alpha - 0.6).abs() < f64::EPSILON);
        assert_eq!(report.constellation, 3);
    }

    #[test]
    fn test_single_source_draws_no_constellation() {
        let mut f = field(&[("a", "x"), ("b", "y")]);
        let ix = Interaction {
            remix_sources: vec!["a".into(), "missing".into()],
            ..Default::default()
        };
        let mut canvas = Recorder::new();
        render_frame(&mut f, &ix, &mut canvas, &mut rng());
        assert_eq!(canvas.polylines().count(), 0);
    }

    #[test]
    fn test_constellation_drawn_after_nodes() {
        let mut f = field(&[("a", "x"), ("b", "y")]);
        let ix = Interaction {
            remix_sources: vec!["a".into(), "b".into()],
            ..Default::default()
        };
        let mut canvas = Recorder::new();
        render_frame(&mut f, &ix, &mut canvas, &mut rng());
        assert!(matches!(canvas.commands.last(), Some(DrawCommand::Polyline { .. })));
    }

    #[test]
    fn test_empty_field_frame() {
        let mut f = field(&[]);
        let mut canvas = Recorder::new();
        let report = render_frame(&mut f, &Interaction::default(), &mut canvas, &mut rng());
        assert_eq!(canvas.commands, vec![DrawCommand::Clear(BACKGROUND)]);
        assert_eq!(report, FrameReport::default());
    }
}
