//! Character-grid canvas. One viewport unit is one terminal cell.

use std::io::{self, Write};

use nebula_core::{Canvas, Color, NodeStyle, Point, Stroke, Viewport};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
struct Cell {
    glyph: char,
    color: Color,
    /// Node glyphs are never overdrawn by constellation lines.
    node: bool,
}

pub struct TerminalCanvas {
    width: usize,
    height: usize,
    cells: Vec<Cell>,
    background: Color,
    ansi: bool,
}

impl TerminalCanvas {
    pub fn new(viewport: Viewport, ansi: bool) -> Self {
        let mut canvas = Self {
            width: 0,
            height: 0,
            cells: Vec::new(),
            background: Color::rgb(0, 0, 0),
            ansi,
        };
        canvas.resize(viewport);
        canvas
    }

    pub fn resize(&mut self, viewport: Viewport) {
        self.width = viewport.width.max(1.0) as usize;
        self.height = viewport.height.max(1.0) as usize;
        self.cells = vec![self.blank(); self.width * self.height];
    }

    #[cfg(test)]
    pub fn size(&self) -> (usize, usize) {
        (self.width, self.height)
    }

    fn blank(&self) -> Cell {
        Cell {
            glyph: ' ',
            color: self.background,
            node: false,
        }
    }

    fn index(&self, p: Point) -> Option<usize> {
        if p.x < 0.0 || p.y < 0.0 {
            return None;
        }
        let (x, y) = (p.x as usize, p.y as usize);
        (x < self.width && y < self.height).then(|| y * self.width + x)
    }

    #[cfg(test)]
    pub fn glyph_at(&self, x: usize, y: usize) -> Option<char> {
        (x < self.width && y < self.height).then(|| self.cells[y * self.width + x].glyph)
    }

    fn line(&mut self, from: Point, to: Point, color: Color) {
        let (mut x0, mut y0) = (from.x as i64, from.y as i64);
        let (x1, y1) = (to.x as i64, to.y as i64);
        let dx = (x1 - x0).abs();
        let dy = -(y1 - y0).abs();
        let sx = if x0 < x1 { 1 } else { -1 };
        let sy = if y0 < y1 { 1 } else { -1 };
        let mut err = dx + dy;
        loop {
            if let Some(i) = self.index(Point::new(x0 as f64, y0 as f64))
                && !self.cells[i].node
            {
                self.cells[i] = Cell {
                    glyph: '·',
                    color,
                    node: false,
                };
            }
            if x0 == x1 && y0 == y1 {
                break;
            }
            let e2 = 2 * err;
            if e2 >= dy {
                err += dy;
                x0 += sx;
            }
            if e2 <= dx {
                err += dx;
                y0 += sy;
            }
        }
    }

    /// The grid as text, one line per row.
    pub fn render(&self) -> String {
        let mut out = String::with_capacity(self.cells.len() * 4);
        for row in self.cells.chunks(self.width) {
            let mut current: Option<Color> = None;
            for cell in row {
                if self.ansi && cell.glyph != ' ' && current != Some(cell.color) {
                    let Color { r, g, b } = cell.color;
                    out.push_str(&format!("\x1b[38;2;{r};{g};{b}m"));
                    current = Some(cell.color);
                }
                out.push(cell.glyph);
            }
            if self.ansi && current.is_some() {
                out.push_str("\x1b[0m");
            }
            out.push('\n');
        }
        out
    }

    /// Write the frame to stdout, repainting from the top-left corner.
    pub fn present(&self) -> io::Result<()> {
        let mut stdout = io::stdout().lock();
        if self.ansi {
            stdout.write_all(b"\x1b[H")?;
        }
        stdout.write_all(self.render().as_bytes())?;
        stdout.flush()
    }
}

/// Size of the terminal attached to stdout, one row short so the last
/// newline does not scroll.
#[cfg(unix)]
pub fn terminal_size() -> Option<Viewport> {
    let ws = rustix::termios::tcgetwinsize(io::stdout()).ok()?;
    viewport_for(ws.ws_col, ws.ws_row)
}

#[cfg(any(unix, test))]
fn viewport_for(cols: u16, rows: u16) -> Option<Viewport> {
    (cols > 0 && rows > 0)
        .then(|| Viewport::new(f64::from(cols), f64::from(rows.saturating_sub(1).max(1))))
}

#[cfg(not(unix))]
pub fn terminal_size() -> Option<Viewport> {
    None
}

/// Terminal window-size changes. Never fires where they cannot be observed.
pub struct ResizeEvents {
    #[cfg(unix)]
    signal: Option<tokio::signal::unix::Signal>,
}

impl ResizeEvents {
    #[cfg(unix)]
    pub fn new() -> Self {
        use tokio::signal::unix::{SignalKind, signal};
        let signal = match signal(SignalKind::window_change()) {
            Ok(s) => Some(s),
            Err(e) => {
                tracing::warn!("cannot watch terminal resizes: {e}");
                None
            }
        };
        Self { signal }
    }

    #[cfg(not(unix))]
    pub fn new() -> Self {
        Self {}
    }

    pub async fn next(&mut self) {
        #[cfg(unix)]
        {
            if let Some(signal) = self.signal.as_mut()
                && signal.recv().await.is_some()
            {
                return;
            }
        }
        std::future::pending::<()>().await
    }
}

impl Default for ResizeEvents {
    fn default() -> Self {
        Self::new()
    }
}

fn glyph_for(style: NodeStyle) -> char {
    match (style.radius as u32, style.glow > 0.0) {
        (4.., _) => '@',
        (3, true) => '*',
        (3, false) => '+',
        _ => '.',
    }
}

impl Canvas for TerminalCanvas {
    fn clear(&mut self, color: Color) {
        self.background = color;
        let blank = self.blank();
        self.cells.fill(blank);
    }

    fn fill_circle(&mut self, center: Point, style: NodeStyle) {
        if let Some(i) = self.index(center) {
            self.cells[i] = Cell {
                glyph: glyph_for(style),
                color: style.color,
                node: true,
            };
        }
    }

    fn stroke_polyline(&mut self, points: &[Point], stroke: Stroke) {
        for pair in points.windows(2) {
            self.line(pair[0], pair[1], stroke.color);
        }
        if stroke.closed
            && points.len() > 2
            && let (Some(&last), Some(&first)) = (points.last(), points.first())
        {
            self.line(last, first, stroke.color);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nebula_core::constants::{ACCENT, NEUTRAL};

    fn style(radius: f64, glow: f64) -> NodeStyle {
        NodeStyle {
            color: NEUTRAL,
            radius,
            glow,
        }
    }

    #[test]
    fn test_glyphs_by_weight() {
        assert_eq!(glyph_for(style(4.0, 15.0)), '@');
        assert_eq!(glyph_for(style(3.0, 10.0)), '*');
        assert_eq!(glyph_for(style(3.0, 0.0)), '+');
        assert_eq!(glyph_for(style(2.0, 0.0)), '.');
    }

    #[test]
    fn test_plot_and_clear() {
        let mut c = TerminalCanvas::new(Viewport::new(10.0, 5.0), false);
        c.fill_circle(Point::new(3.7, 2.2), style(2.0, 0.0));
        assert_eq!(c.glyph_at(3, 2), Some('.'));
        c.clear(Color::rgb(0, 0, 0));
        assert_eq!(c.glyph_at(3, 2), Some(' '));
    }

    #[test]
    fn test_out_of_bounds_ignored() {
        let mut c = TerminalCanvas::new(Viewport::new(4.0, 4.0), false);
        c.fill_circle(Point::new(-1.0, 2.0), style(2.0, 0.0));
        c.fill_circle(Point::new(4.0, 2.0), style(2.0, 0.0));
        assert!(!c.render().contains('.'));
    }

    #[test]
    fn test_constellation_does_not_cover_nodes() {
        let mut c = TerminalCanvas::new(Viewport::new(10.0, 3.0), false);
        let a = Point::new(0.0, 1.0);
        let b = Point::new(9.0, 1.0);
        c.fill_circle(a, style(4.0, 15.0));
        c.fill_circle(b, style(4.0, 15.0));
        c.stroke_polyline(
            &[a, b],
            Stroke {
                color: ACCENT,
                width: 0.5,
                alpha: 0.6,
                closed: true,
            },
        );
        let row = c.render().lines().nth(1).unwrap().to_string();
        assert_eq!(row, "@········@");
    }

    #[test]
    fn test_render_dimensions_and_colors() {
        let mut c = TerminalCanvas::new(Viewport::new(6.0, 2.0), true);
        c.fill_circle(Point::new(1.0, 0.0), style(2.0, 0.0));
        let out = c.render();
        assert_eq!(out.lines().count(), 2);
        assert!(out.contains("\x1b[38;2;255;255;255m."));
        assert!(out.lines().nth(1).unwrap().chars().all(|ch| ch == ' '));
    }

    #[test]
    fn test_viewport_leaves_last_row_free() {
        assert_eq!(viewport_for(80, 24), Some(Viewport::new(80.0, 23.0)));
        assert_eq!(viewport_for(80, 1), Some(Viewport::new(80.0, 1.0)));
        assert_eq!(viewport_for(0, 24), None);
        assert_eq!(viewport_for(80, 0), None);
    }

    #[test]
    fn test_resize() {
        let mut c = TerminalCanvas::new(Viewport::new(6.0, 2.0), false);
        c.resize(Viewport::new(20.0, 8.0));
        assert_eq!(c.size(), (20, 8));
        assert_eq!(c.render().lines().count(), 8);
    }
}
