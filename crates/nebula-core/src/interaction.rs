use serde::{Deserialize, Serialize};

use crate::collide::RemixResult;
use crate::field::Field;

/// Everything the viewer is doing to the field right now. Passed by value
/// into frame composition instead of living in globals.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Interaction {
    pub hovered: Option<String>,
    pub selected: Option<String>,
    pub search: String,
    /// Ids of the current remix's sources, in pick order.
    pub remix_sources: Vec<String>,
}

impl Interaction {
    /// Update hover from a pointer position.
    pub fn pointer_move(&mut self, field: &Field, x: f64, y: f64) {
        self.hovered = field.hit_test(x, y).map(|n| n.id.clone());
    }

    /// Click selects the hovered node; clicking empty space clears the
    /// selection and the constellation.
    pub fn click(&mut self) {
        match &self.hovered {
            Some(id) => self.selected = Some(id.clone()),
            None => {
                self.selected = None;
                self.remix_sources.clear();
            }
        }
    }

    pub fn set_search(&mut self, term: impl Into<String>) {
        self.search = term.into();
    }

    pub fn search_active(&self) -> bool {
        !self.search.is_empty()
    }

    pub fn show_remix(&mut self, result: &RemixResult) {
        self.remix_sources = result.source_ids.clone();
    }

    pub fn is_selected(&self, id: &str) -> bool {
        self.selected.as_deref() == Some(id)
    }

    pub fn is_hovered(&self, id: &str) -> bool {
        self.hovered.as_deref() == Some(id)
    }

    pub fn is_remix_source(&self, id: &str) -> bool {
        self.remix_sources.iter().any(|s| s == id)
    }
}
