//! Terminal UI for the signal viewer.
//!
//! Owns the alternate screen, translates key and mouse events into
//! viewer commands, and renders a [`DrawList`] onto a braille canvas.
//! The canvas gives a 2x4 pixel grid per terminal cell, so a terminal
//! of `cols x rows` cells exposes a `2*cols x 4*(rows-1)` pixel surface
//! above a one-line status footer.

use crossterm::{
    event::{
        self, DisableMouseCapture, EnableMouseCapture, Event, KeyCode, KeyModifiers, MouseButton,
        MouseEventKind,
    },
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{
    prelude::*,
    symbols::Marker,
    widgets::{
        canvas::{Canvas, Context, Line as CanvasLine},
        Paragraph,
    },
};
use std::io::{self, Stdout};
use std::time::Duration;

use crate::scope::surface::{DrawList, DrawOp, Pen};

/// Rows reserved below the graph for the status footer.
const FOOTER_ROWS: u16 = 1;

/// Input poll timeout; keeps the loop responsive between render ticks.
const POLL_INTERVAL: Duration = Duration::from_millis(10);

const KEY_HINTS: &str = "space pause | m mode | +/- zoom | l log | click closeup | q quit";

/// Commands produced by user input in the viewer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ViewerCommand {
    /// No actionable input this poll.
    Continue,
    /// Exit the viewer.
    Quit,
    /// Freeze or resume the display.
    ToggleRun,
    /// Switch between frequency and time display.
    ToggleMode,
    /// Halve the visible frequency span.
    ZoomIn,
    /// Double the visible frequency span.
    ZoomOut,
    /// Switch the amplitude axis between linear and logarithmic.
    ToggleLog,
    /// Left click at a terminal cell, for the closeup jump.
    Click { column: u16, row: u16 },
}

/// Terminal UI handler for the viewer.
pub struct ScopeTui {
    terminal: Terminal<CrosstermBackend<Stdout>>,
}

impl ScopeTui {
    /// Creates the TUI, entering raw mode, the alternate screen, and
    /// mouse capture.
    ///
    /// # Errors
    /// - If the terminal cannot be initialized
    /// - If raw mode cannot be enabled
    pub fn new() -> anyhow::Result<Self> {
        enable_raw_mode()?;
        let mut stdout = io::stdout();
        execute!(stdout, EnterAlternateScreen, EnableMouseCapture)?;

        let backend = CrosstermBackend::new(stdout);
        let terminal = Terminal::new(backend)?;

        Ok(ScopeTui { terminal })
    }

    /// Current graph surface size in braille pixels.
    ///
    /// Either dimension may be zero on a degenerate terminal; callers
    /// should skip rendering in that case.
    ///
    /// # Errors
    /// - If the terminal size cannot be queried
    pub fn graph_size(&self) -> anyhow::Result<(u32, u32)> {
        let size = self.terminal.size()?;
        let rows = size.height.saturating_sub(FOOTER_ROWS);
        Ok((u32::from(size.width) * 2, u32::from(rows) * 4))
    }

    /// Rows of the graph area, for hit-testing mouse clicks.
    ///
    /// # Errors
    /// - If the terminal size cannot be queried
    pub fn graph_rows(&self) -> anyhow::Result<u16> {
        let size = self.terminal.size()?;
        Ok(size.height.saturating_sub(FOOTER_ROWS))
    }

    /// Polls for user input and maps it to a viewer command.
    ///
    /// Returns [`ViewerCommand::Continue`] when no event arrives within
    /// the poll interval.
    ///
    /// # Errors
    /// - If event reading fails
    pub fn handle_input(&mut self) -> anyhow::Result<ViewerCommand> {
        if event::poll(POLL_INTERVAL)? {
            match event::read()? {
                Event::Key(key) => match key.code {
                    KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => {
                        tracing::debug!("Ctrl+C pressed, quitting");
                        return Ok(ViewerCommand::Quit);
                    }
                    KeyCode::Char('q') | KeyCode::Esc => {
                        tracing::debug!("Quit key pressed");
                        return Ok(ViewerCommand::Quit);
                    }
                    KeyCode::Char(' ') => {
                        tracing::debug!("Space pressed, toggling run state");
                        return Ok(ViewerCommand::ToggleRun);
                    }
                    KeyCode::Char('m') => {
                        tracing::debug!("Mode key pressed");
                        return Ok(ViewerCommand::ToggleMode);
                    }
                    KeyCode::Char('+') | KeyCode::Char('=') => {
                        tracing::debug!("Zoom in key pressed");
                        return Ok(ViewerCommand::ZoomIn);
                    }
                    KeyCode::Char('-') | KeyCode::Char('_') => {
                        tracing::debug!("Zoom out key pressed");
                        return Ok(ViewerCommand::ZoomOut);
                    }
                    KeyCode::Char('l') => {
                        tracing::debug!("Log scale key pressed");
                        return Ok(ViewerCommand::ToggleLog);
                    }
                    _ => {}
                },
                Event::Mouse(mouse) => {
                    if let MouseEventKind::Down(MouseButton::Left) = mouse.kind {
                        tracing::debug!(
                            "Left click at column {} row {}",
                            mouse.column,
                            mouse.row
                        );
                        return Ok(ViewerCommand::Click {
                            column: mouse.column,
                            row: mouse.row,
                        });
                    }
                }
                _ => {}
            }
        }
        Ok(ViewerCommand::Continue)
    }

    /// Renders one frame: the draw list on the graph canvas plus the
    /// status footer.
    ///
    /// # Errors
    /// - If terminal rendering fails
    pub fn draw(&mut self, scene: &DrawList, status: &str) -> anyhow::Result<()> {
        self.terminal.draw(|frame| {
            let area = frame.area();
            if area.height <= FOOTER_ROWS || area.width == 0 {
                return;
            }

            let graph_area = Rect {
                height: area.height - FOOTER_ROWS,
                ..area
            };
            let pixel_width = u32::from(graph_area.width) * 2;
            let pixel_height = u32::from(graph_area.height) * 4;

            let canvas = Canvas::default()
                .marker(Marker::Braille)
                .x_bounds([0.0, f64::from(pixel_width - 1)])
                .y_bounds([0.0, f64::from(pixel_height - 1)])
                .paint(|ctx| paint_scene(ctx, scene, pixel_height));
            frame.render_widget(canvas, graph_area);

            let footer = Line::from(vec![
                Span::styled(status.to_string(), Style::default().fg(Color::White)),
                Span::raw("  "),
                Span::styled(KEY_HINTS, Style::default().fg(Color::DarkGray)),
            ]);
            let footer_area = Rect {
                y: area.y + area.height - FOOTER_ROWS,
                height: FOOTER_ROWS,
                ..area
            };
            frame.render_widget(Paragraph::new(footer), footer_area);
        })?;
        Ok(())
    }

    /// Cleans up terminal state: leaves the alternate screen, disables
    /// raw mode and mouse capture, and restores the cursor.
    ///
    /// # Errors
    /// - If raw mode cannot be disabled
    pub fn cleanup(&mut self) -> anyhow::Result<()> {
        disable_raw_mode()?;
        execute!(
            self.terminal.backend_mut(),
            DisableMouseCapture,
            LeaveAlternateScreen
        )?;
        self.terminal.show_cursor()?;
        Ok(())
    }
}

impl Drop for ScopeTui {
    fn drop(&mut self) {
        let _ = self.cleanup();
    }
}

fn pen_color(pen: Pen) -> Color {
    match pen {
        Pen::Trace => Color::Green,
        Pen::Grid => Color::DarkGray,
    }
}

/// Paints a draw list onto the canvas context.
///
/// Surface coordinates run top-down while the canvas runs bottom-up,
/// so every y is flipped here. Filled rectangles become vertical line
/// sweeps; the braille canvas has no filled-shape primitive.
fn paint_scene(ctx: &mut Context, scene: &DrawList, pixel_height: u32) {
    let flip = |y: i64| f64::from(pixel_height.saturating_sub(1)) - y as f64;

    for op in &scene.ops {
        match op {
            DrawOp::Clear => {}
            DrawOp::Line { x0, y0, x1, y1, pen } => {
                ctx.draw(&CanvasLine {
                    x1: *x0 as f64,
                    y1: flip(*y0),
                    x2: *x1 as f64,
                    y2: flip(*y1),
                    color: pen_color(*pen),
                });
            }
            DrawOp::FilledRect { x, y, w, h, pen } => {
                for dx in 0..*w {
                    ctx.draw(&CanvasLine {
                        x1: (*x + dx) as f64,
                        y1: flip(*y),
                        x2: (*x + dx) as f64,
                        y2: flip(*y + *h - 1),
                        color: pen_color(*pen),
                    });
                }
            }
            DrawOp::Text { x, y, text } => {
                ctx.print(
                    *x as f64,
                    flip(*y),
                    Line::from(Span::styled(
                        text.clone(),
                        Style::default().fg(Color::Gray),
                    )),
                );
            }
        }
    }
}
