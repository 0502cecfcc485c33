//! View state and the transitions driven by user input.
//!
//! All mutable display parameters live here and change only through the
//! transition methods, so every frame reads one consistent set of
//! values. The closeup transition stashes the exact prior view and
//! restores it bit for bit on exit.

use serde::Deserialize;

use crate::scope::mapper::{CoordinateMapper, CLOSEUP_ZOOM, ZOOM_MAX, ZOOM_MIN};

/// Display mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    Frequency,
    Time,
}

/// The complete user-adjustable display state.
pub struct ViewState {
    mode: Mode,
    running: bool,
    /// log2 pixels per channel.
    zoom: i32,
    /// Lower edge of the visible frequency range in Hz.
    f_lo: f64,
    log_scale: bool,
    closeup: bool,
    saved_f_lo: f64,
    saved_zoom: i32,
}

impl ViewState {
    pub fn new(mode: Mode, log_scale: bool) -> Self {
        ViewState {
            mode,
            running: true,
            zoom: 0,
            f_lo: 0.0,
            log_scale,
            closeup: false,
            saved_f_lo: 0.0,
            saved_zoom: 0,
        }
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    pub fn running(&self) -> bool {
        self.running
    }

    pub fn zoom(&self) -> i32 {
        self.zoom
    }

    pub fn f_lo(&self) -> f64 {
        self.f_lo
    }

    pub fn log_scale(&self) -> bool {
        self.log_scale
    }

    pub fn closeup(&self) -> bool {
        self.closeup
    }

    /// Flips between running and frozen, returning the new value so the
    /// caller can pause or resume capture.
    pub fn toggle_run(&mut self) -> bool {
        self.running = !self.running;
        self.running
    }

    /// Swaps frequency and time mode. The caller resets autoscale state,
    /// the two modes have unrelated scales.
    pub fn toggle_mode(&mut self) {
        self.mode = match self.mode {
            Mode::Frequency => Mode::Time,
            Mode::Time => Mode::Frequency,
        };
    }

    /// Steps zoom in, returning false when already at the bound.
    pub fn zoom_in(&mut self) -> bool {
        if self.zoom >= ZOOM_MAX {
            return false;
        }
        self.zoom += 1;
        true
    }

    /// Steps zoom out, returning false when already at the bound.
    pub fn zoom_out(&mut self) -> bool {
        if self.zoom <= ZOOM_MIN {
            return false;
        }
        self.zoom -= 1;
        true
    }

    /// Flips log/linear amplitude display. Only meaningful for the
    /// spectrum, so time mode rejects it.
    pub fn toggle_log_scale(&mut self) -> bool {
        if self.mode != Mode::Frequency {
            return false;
        }
        self.log_scale = !self.log_scale;
        true
    }

    /// Handles a click on the graph at pixel column `x`.
    ///
    /// Outside closeup this zooms to a fixed high zoom recentered so the
    /// clicked frequency sits at mid-width. Inside closeup it restores
    /// the exact view the closeup was entered from. Returns whether the
    /// view changed; time mode ignores clicks.
    pub fn click_graph(&mut self, x: i64, width: u32, nyquist: f64, channels: usize) -> bool {
        if self.mode != Mode::Frequency {
            return false;
        }
        if self.closeup {
            self.f_lo = self.saved_f_lo;
            self.zoom = self.saved_zoom;
            self.closeup = false;
            return true;
        }

        let mapper = CoordinateMapper::new(self.f_lo, self.zoom, width, 1, nyquist, channels);
        let clicked = mapper.chan_at_pixel(x);
        let f_center = clicked as f64 * mapper.hz_per_chan();

        self.saved_f_lo = self.f_lo;
        self.saved_zoom = self.zoom;
        self.zoom = CLOSEUP_ZOOM;
        let half_span_hz =
            0.5 * nyquist * (width as f64 / f64::from(1 << CLOSEUP_ZOOM)) / channels as f64;
        self.f_lo = (f_center - half_span_hz).clamp(0.0, nyquist - mapper.hz_per_chan());
        self.closeup = true;
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const NYQUIST: f64 = 22050.0;
    const CHANNELS: usize = 8192;
    const WIDTH: u32 = 640;

    #[test]
    fn test_initial_state() {
        let view = ViewState::new(Mode::Frequency, false);
        assert_eq!(view.mode(), Mode::Frequency);
        assert!(view.running());
        assert!(!view.closeup());
        assert_eq!(view.zoom(), 0);
        assert_eq!(view.f_lo(), 0.0);
    }

    #[test]
    fn test_toggle_run_flips_both_ways() {
        let mut view = ViewState::new(Mode::Frequency, false);
        assert!(!view.toggle_run());
        assert!(!view.running());
        assert!(view.toggle_run());
        assert!(view.running());
    }

    #[test]
    fn test_toggle_mode_swaps() {
        let mut view = ViewState::new(Mode::Frequency, false);
        view.toggle_mode();
        assert_eq!(view.mode(), Mode::Time);
        view.toggle_mode();
        assert_eq!(view.mode(), Mode::Frequency);
    }

    #[test]
    fn test_zoom_clamps_at_bounds() {
        let mut view = ViewState::new(Mode::Frequency, false);
        for _ in 0..ZOOM_MAX {
            assert!(view.zoom_in());
        }
        assert_eq!(view.zoom(), ZOOM_MAX);
        assert!(!view.zoom_in());
        assert_eq!(view.zoom(), ZOOM_MAX);

        for _ in 0..(ZOOM_MAX - ZOOM_MIN) {
            assert!(view.zoom_out());
        }
        assert_eq!(view.zoom(), ZOOM_MIN);
        assert!(!view.zoom_out());
        assert_eq!(view.zoom(), ZOOM_MIN);
    }

    #[test]
    fn test_log_toggle_rejected_in_time_mode() {
        let mut view = ViewState::new(Mode::Time, false);
        assert!(!view.toggle_log_scale());
        assert!(!view.log_scale());

        view.toggle_mode();
        assert!(view.toggle_log_scale());
        assert!(view.log_scale());
    }

    #[test]
    fn test_click_ignored_in_time_mode() {
        let mut view = ViewState::new(Mode::Time, false);
        assert!(!view.click_graph(320, WIDTH, NYQUIST, CHANNELS));
        assert!(!view.closeup());
    }

    #[test]
    fn test_closeup_round_trip_is_bit_exact() {
        let mut view = ViewState::new(Mode::Frequency, false);
        // Walk to an odd view first so the restore has something to do.
        view.zoom_out();
        view.zoom_out();
        assert!(view.click_graph(100, WIDTH, NYQUIST, CHANNELS));
        let f_lo_inside = view.f_lo();
        assert!(view.closeup());
        assert_eq!(view.zoom(), CLOSEUP_ZOOM);

        assert!(view.click_graph(400, WIDTH, NYQUIST, CHANNELS));
        assert!(!view.closeup());
        assert_eq!(view.zoom(), -2);
        assert_eq!(view.f_lo().to_bits(), 0.0_f64.to_bits());
        assert_ne!(f_lo_inside, view.f_lo());
    }

    #[test]
    fn test_closeup_centers_clicked_frequency() {
        let mut view = ViewState::new(Mode::Frequency, false);
        assert!(view.click_graph(320, WIDTH, NYQUIST, CHANNELS));

        // At z = 0 the click hit channel 320. Half the closeup span is
        // 640 / 16 / 2 = 20 channels, so the view starts at channel 300
        // and the clicked channel sits at pixel 320 again.
        let hz = NYQUIST / CHANNELS as f64;
        assert!((view.f_lo() - 300.0 * hz).abs() < 1e-9);
        let mapper = CoordinateMapper::new(view.f_lo(), view.zoom(), WIDTH, 1, NYQUIST, CHANNELS);
        assert_eq!(mapper.chan_lo(), 300);
        assert_eq!(mapper.scale_x((320 - 300) as i64), 320);
    }

    #[test]
    fn test_closeup_clamps_f_lo_at_zero() {
        let mut view = ViewState::new(Mode::Frequency, false);
        assert!(view.click_graph(3, WIDTH, NYQUIST, CHANNELS));
        assert_eq!(view.f_lo(), 0.0);
    }
}
