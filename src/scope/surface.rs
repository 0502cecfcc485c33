//! Drawing seam between frame composition and the terminal painter.
//!
//! Renderers emit primitives in pixel coordinates, origin top-left and
//! y growing downward; whoever implements [`Surface`] decides how those
//! pixels are painted. [`DrawList`] records the calls verbatim, which
//! keeps frame composition testable without a terminal.

/// Stroke classes a surface may style differently.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Pen {
    /// The signal itself.
    Trace,
    /// Grid lines and axes.
    Grid,
}

/// Pixel-level drawing primitives.
pub trait Surface {
    fn clear(&mut self);
    fn draw_line(&mut self, x0: i64, y0: i64, x1: i64, y1: i64, pen: Pen);
    fn draw_filled_rect(&mut self, x: i64, y: i64, w: i64, h: i64, pen: Pen);
    fn draw_text(&mut self, x: i64, y: i64, text: &str);
}

/// One recorded drawing call.
#[derive(Debug, Clone, PartialEq)]
pub enum DrawOp {
    Clear,
    Line {
        x0: i64,
        y0: i64,
        x1: i64,
        y1: i64,
        pen: Pen,
    },
    FilledRect {
        x: i64,
        y: i64,
        w: i64,
        h: i64,
        pen: Pen,
    },
    Text {
        x: i64,
        y: i64,
        text: String,
    },
}

/// Surface that records every call instead of painting.
#[derive(Default)]
pub struct DrawList {
    pub ops: Vec<DrawOp>,
}

impl DrawList {
    pub fn new() -> Self {
        DrawList { ops: Vec::new() }
    }

    #[allow(dead_code)]
    pub fn lines(&self, pen: Pen) -> impl Iterator<Item = &DrawOp> + '_ {
        self.ops.iter().filter(move |op| matches!(op, DrawOp::Line { pen: p, .. } if *p == pen))
    }

    #[allow(dead_code)]
    pub fn rects(&self, pen: Pen) -> impl Iterator<Item = &DrawOp> + '_ {
        self.ops
            .iter()
            .filter(move |op| matches!(op, DrawOp::FilledRect { pen: p, .. } if *p == pen))
    }

    #[allow(dead_code)]
    pub fn texts(&self) -> impl Iterator<Item = &DrawOp> + '_ {
        self.ops.iter().filter(|op| matches!(op, DrawOp::Text { .. }))
    }
}

impl Surface for DrawList {
    fn clear(&mut self) {
        self.ops.push(DrawOp::Clear);
    }

    fn draw_line(&mut self, x0: i64, y0: i64, x1: i64, y1: i64, pen: Pen) {
        self.ops.push(DrawOp::Line { x0, y0, x1, y1, pen });
    }

    fn draw_filled_rect(&mut self, x: i64, y: i64, w: i64, h: i64, pen: Pen) {
        self.ops.push(DrawOp::FilledRect { x, y, w, h, pen });
    }

    fn draw_text(&mut self, x: i64, y: i64, text: &str) {
        self.ops.push(DrawOp::Text {
            x,
            y,
            text: text.to_string(),
        });
    }
}
