//! The live set of positioned nodes derived from the fragment feed.
//!
//! `Field` owns every `FieldNode` and is the only writer of glimmer state.
//! A feed update rebuilds the node vector and swaps it in whole, so a reader
//! never sees half of one snapshot and half of another.

use std::collections::HashMap;

use rand::Rng;
use rand::seq::IndexedRandom;
use serde::{Deserialize, Serialize};

use crate::color::Color;
use crate::constants::{GLIMMER_CHANCE, GLIMMER_DECAY, GLIMMER_PALETTE, HIT_RADIUS};
use crate::fragment::Fragment;
use crate::placement::{Point, Viewport, place};
use crate::tokenizer::contains_ignore_case;

/// Transient highlight that fades over successive frames.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Glimmer {
    pub color: Color,
    /// Remaining life in (0, 1].
    pub life: f64,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct FieldNode {
    pub id: String,
    pub content: String,
    pub created_at: i64,
    pub position: Point,
    glimmer: Option<Glimmer>,
}

impl FieldNode {
    fn from_fragment(fragment: &Fragment, viewport: Viewport) -> Self {
        Self {
            id: fragment.id.clone(),
            content: fragment.content.clone(),
            created_at: fragment.created_at,
            position: place(&fragment.id, viewport),
            glimmer: None,
        }
    }

    pub fn glimmer(&self) -> Option<&Glimmer> {
        self.glimmer.as_ref()
    }
}

/// What happens to in-flight glimmers when a new snapshot replaces the field.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GlimmerPolicy {
    /// Every node starts dark again.
    #[default]
    Reset,
    /// Nodes that survive the update keep their glimmer by id.
    Carry,
}

/// Case-insensitive substring match of `term` in the node's content.
/// An empty term matches nothing.
pub fn matches_filter(node: &FieldNode, term: &str) -> bool {
    contains_ignore_case(&node.content, term)
}

#[derive(Clone, Debug)]
pub struct Field {
    nodes: Vec<FieldNode>,
    viewport: Viewport,
    policy: GlimmerPolicy,
}

impl Field {
    pub fn new(viewport: Viewport) -> Self {
        Self::with_policy(viewport, GlimmerPolicy::default())
    }

    pub fn with_policy(viewport: Viewport, policy: GlimmerPolicy) -> Self {
        Self {
            nodes: Vec::new(),
            viewport,
            policy,
        }
    }

    /// Replace the node set with `fragments`, placed in `viewport`.
    pub fn sync(&mut self, fragments: &[Fragment], viewport: Viewport) {
        let carried: HashMap<&str, Glimmer> = match self.policy {
            GlimmerPolicy::Reset => HashMap::new(),
            GlimmerPolicy::Carry => self
                .nodes
                .iter()
                .filter_map(|n| n.glimmer.map(|g| (n.id.as_str(), g)))
                .collect(),
        };

        let nodes: Vec<FieldNode> = fragments
            .iter()
            .map(|fragment| {
                let mut node = FieldNode::from_fragment(fragment, viewport);
                node.glimmer = carried.get(fragment.id.as_str()).copied();
                node
            })
            .collect();

        self.nodes = nodes;
        self.viewport = viewport;
    }

    /// Re-place every node for a new viewport, keeping node identity.
    pub fn resize(&mut self, viewport: Viewport) {
        for node in &mut self.nodes {
            node.position = place(&node.id, viewport);
        }
        self.viewport = viewport;
    }

    pub fn nodes(&self) -> &[FieldNode] {
        &self.nodes
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn viewport(&self) -> Viewport {
        self.viewport
    }

    pub fn get(&self, id: &str) -> Option<&FieldNode> {
        self.nodes.iter().find(|n| n.id == id)
    }

    /// Topmost node strictly within `HIT_RADIUS` of the point. Later nodes
    /// are drawn over earlier ones, so the scan runs back to front.
    pub fn hit_test(&self, px: f64, py: f64) -> Option<&FieldNode> {
        let pointer = Point::new(px, py);
        self.nodes
            .iter()
            .rev()
            .find(|n| n.position.distance(pointer) < HIT_RADIUS)
    }

    /// Roll for a new glimmer: with `GLIMMER_CHANCE`, pick one node at random
    /// and ignite it unless it is already glimmering. Returns the ignited index.
    pub fn try_ignite(&mut self, rng: &mut impl Rng) -> Option<usize> {
        if self.nodes.is_empty() || !rng.random_bool(GLIMMER_CHANCE) {
            return None;
        }
        let index = rng.random_range(0..self.nodes.len());
        let node = &mut self.nodes[index];
        if node.glimmer.is_some() {
            return None;
        }
        let color = *GLIMMER_PALETTE.choose(rng)?;
        node.glimmer = Some(Glimmer { color, life: 1.0 });
        Some(index)
    }

    /// Spend one frame of the node's glimmer. Returns the color to draw with
    /// this frame, or `None` if the node is not glimmering.
    pub fn burn_glimmer(&mut self, index: usize) -> Option<Color> {
        let node = self.nodes.get_mut(index)?;
        let glimmer = node.glimmer.as_mut()?;
        let color = glimmer.color;
        glimmer.life -= GLIMMER_DECAY;
        if glimmer.life <= 0.0 {
            node.glimmer = None;
        }
        Some(color)
    }

    /// Number of nodes currently glimmering.
    pub fn glimmer_count(&self) -> usize {
        self.nodes.iter().filter(|n| n.glimmer.is_some()).count()
    }
}
