//! Pointer input for `watch`, given as terminal cells on the command line.

use nebula_core::{Field, Fragment, Interaction, Viewport};

/// Parse a `COLUMN,ROW` cell.
pub fn parse_cell(s: &str) -> Result<(f64, f64), String> {
    let (col, row) = s
        .split_once(',')
        .ok_or_else(|| format!("expected COLUMN,ROW, got {s:?}"))?;
    let col: u16 = col.trim().parse().map_err(|e| format!("bad column {col:?}: {e}"))?;
    let row: u16 = row.trim().parse().map_err(|e| format!("bad row {row:?}: {e}"))?;
    Ok((f64::from(col), f64::from(row)))
}

/// Clicks replayed in order, then an optional resting pointer.
#[derive(Clone, Debug, Default)]
pub struct PointerScript {
    pub clicks: Vec<(f64, f64)>,
    pub pointer: Option<(f64, f64)>,
}

impl PointerScript {
    pub fn is_empty(&self) -> bool {
        self.clicks.is_empty() && self.pointer.is_none()
    }

    /// Apply every click, then leave the pointer at rest.
    pub fn replay(&self, ix: &mut Interaction, fragments: &[Fragment], viewport: Viewport) {
        if self.is_empty() {
            return;
        }
        let field = placed(fragments, viewport);
        for &(x, y) in &self.clicks {
            ix.pointer_move(&field, x, y);
            ix.click();
        }
        self.rest(ix, &field);
    }

    /// Recompute hover after the nodes moved. Selection is by id and stays.
    pub fn rehover(&self, ix: &mut Interaction, fragments: &[Fragment], viewport: Viewport) {
        if self.is_empty() {
            return;
        }
        self.rest(ix, &placed(fragments, viewport));
    }

    fn rest(&self, ix: &mut Interaction, field: &Field) {
        match self.pointer.or_else(|| self.clicks.last().copied()) {
            Some((x, y)) => ix.pointer_move(field, x, y),
            None => ix.hovered = None,
        }
    }
}

fn placed(fragments: &[Fragment], viewport: Viewport) -> Field {
    let mut field = Field::new(viewport);
    field.sync(fragments, viewport);
    field
}
