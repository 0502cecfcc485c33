//! Full-screen error display for fatal failures.
//!
//! Replaces the viewer with a red screen carrying the error text, so a
//! capture or terminal failure never leaves a half-drawn scope behind.

use crossterm::{
    event::{self, Event},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{
    prelude::*,
    widgets::{Paragraph, Wrap},
};
use std::io::{self, Stdout};

/// Error screen for displaying human-readable error messages.
///
/// Fills the terminal with a red background, centers the message in
/// white, and waits for any key press to dismiss.
pub struct ErrorScreen {
    terminal: Terminal<CrosstermBackend<Stdout>>,
}

impl ErrorScreen {
    /// Creates a new error screen and enters alternate screen mode.
    ///
    /// # Errors
    /// - If the terminal cannot be initialized
    /// - If raw mode cannot be enabled
    /// - If the alternate screen cannot be entered
    pub fn new() -> anyhow::Result<Self> {
        enable_raw_mode()?;
        let mut stdout = io::stdout();
        execute!(stdout, EnterAlternateScreen)?;

        let backend = CrosstermBackend::new(stdout);
        let terminal = Terminal::new(backend)?;

        Ok(ErrorScreen { terminal })
    }

    /// Displays an error message and blocks until any key is pressed.
    ///
    /// The message wraps to 80% of the screen width; a dismiss hint is
    /// shown near the bottom.
    ///
    /// # Errors
    /// - If terminal rendering fails
    pub fn show_error(&mut self, error_message: &str) -> anyhow::Result<()> {
        loop {
            self.terminal.draw(|frame| {
                let area = frame.area();
                let background = Style::default().bg(Color::Rgb(255, 0, 0));

                for y in area.y..area.y + area.height {
                    for x in area.x..area.x + area.width {
                        frame.buffer_mut().set_string(x, y, " ", background);
                    }
                }

                let padding_x = area.width / 10;
                let text_width = (area.width * 80) / 100;

                let message = Paragraph::new(Line::from(Span::styled(
                    error_message,
                    background.fg(Color::Rgb(255, 255, 255)),
                )))
                .alignment(Alignment::Center)
                .wrap(Wrap { trim: true });

                let message_area = Rect {
                    x: area.x + padding_x,
                    y: area.y + area.height / 2,
                    width: text_width,
                    height: area.height / 2,
                };
                frame.render_widget(message, message_area);

                if area.height > 2 {
                    let hint = Paragraph::new(Line::from(Span::styled(
                        "press any key to exit",
                        background.fg(Color::Rgb(255, 180, 180)),
                    )))
                    .alignment(Alignment::Center);

                    let hint_area = Rect {
                        x: area.x + padding_x,
                        y: area.y + area.height - 2,
                        width: text_width,
                        height: 1,
                    };
                    frame.render_widget(hint, hint_area);
                }
            })?;

            if event::poll(std::time::Duration::from_millis(100))? {
                if let Event::Key(_) = event::read()? {
                    break;
                }
            }
        }

        Ok(())
    }

    /// Cleans up terminal state and exits alternate screen mode.
    ///
    /// # Errors
    /// - If raw mode cannot be disabled
    /// - If the cursor cannot be shown
    pub fn cleanup(&mut self) -> anyhow::Result<()> {
        disable_raw_mode()?;
        execute!(self.terminal.backend_mut(), LeaveAlternateScreen)?;
        self.terminal.show_cursor()?;
        Ok(())
    }
}

impl Drop for ErrorScreen {
    fn drop(&mut self) {
        let _ = self.cleanup();
    }
}
