//! Channel-to-pixel geometry for the frequency display.
//!
//! A mapper is built fresh each frame from the current view parameters,
//! so all of its methods are pure. Zoom works in powers of two via
//! integer shifts; because shifting right loses bits, the visible
//! channel span cannot be recovered by division and is found by a short
//! linear search instead.

/// Zoom bounds in log2 pixels per channel.
pub const ZOOM_MIN: i32 = -3;
pub const ZOOM_MAX: i32 = 6;

/// Fixed zoom used while in closeup.
pub const CLOSEUP_ZOOM: i32 = 4;

/// Per-frame geometry: which channels are visible and where they land.
pub struct CoordinateMapper {
    z: i32,
    chan_lo: usize,
    span: usize,
    height: i64,
    hz_per_chan: f64,
    f_lo: f64,
}

impl CoordinateMapper {
    /// Builds the mapping for one frame.
    ///
    /// `channels` is the full channel resolution of the ring window
    /// (window length in samples); the frequency axis runs `[0, nyquist)`
    /// across it. The visible span may extend past the spectrum's last
    /// channel when zoomed far out; consumers clamp.
    pub fn new(f_lo: f64, z: i32, width: u32, height: u32, nyquist: f64, channels: usize) -> Self {
        let hz_per_chan = nyquist / channels as f64;
        let chan_lo = (f_lo / nyquist * channels as f64).floor() as usize;
        let span = visible_span(z, width as i64);
        CoordinateMapper {
            z,
            chan_lo,
            span,
            height: height as i64,
            hz_per_chan,
            f_lo,
        }
    }

    /// Horizontal pixel offset of a channel offset from `chan_lo`.
    pub fn scale_x(&self, chan_offset: i64) -> i64 {
        shift(chan_offset, self.z)
    }

    /// Height above the baseline for a display unit in `[0, 1]`.
    pub fn scale_y(&self, unit: f64) -> i64 {
        (unit.clamp(0.0, 1.0) * (self.height - 1) as f64).round() as i64
    }

    /// First visible channel.
    pub fn chan_lo(&self) -> usize {
        self.chan_lo
    }

    /// One past the last visible channel. May exceed the spectrum length.
    pub fn chan_hi(&self) -> usize {
        self.chan_lo + self.span
    }

    /// The channel under pixel column `x`.
    pub fn chan_at_pixel(&self, x: i64) -> usize {
        self.chan_lo + shift(x.max(0), -self.z) as usize
    }

    pub fn hz_per_chan(&self) -> f64 {
        self.hz_per_chan
    }

    pub fn f_lo(&self) -> f64 {
        self.f_lo
    }

    /// Upper edge of the visible frequency range.
    pub fn f_hi(&self) -> f64 {
        self.f_lo + self.span as f64 * self.hz_per_chan
    }
}

/// `value` shifted by the zoom exponent, left for positive `z`.
fn shift(value: i64, z: i32) -> i64 {
    if z >= 0 {
        value << z
    } else {
        value >> -z
    }
}

/// Largest channel span whose scaled width still fits in `width` pixels.
///
/// Starts from the inverse shift and walks, since `shift` discards low
/// bits for negative `z`.
fn visible_span(z: i32, width: i64) -> usize {
    let mut span = shift(width, -z);
    while span > 0 && shift(span, z) > width {
        span -= 1;
    }
    while shift(span + 1, z) <= width {
        span += 1;
    }
    span as usize
}

/// Grid interval of the form {1,2,5}x10^n for a frequency range,
/// aiming for a line count near 30.
///
/// Each candidate mantissa is judged by normalizing its implied line
/// count into the decade `[30/sqrt(10), 30*sqrt(10)]` and scoring the
/// normalized count against 10; the winner is then scaled by tens until
/// the real line count lands in that same decade.
pub fn optimal_grid_spacing(range: f64) -> f64 {
    if !(range > 0.0) || !range.is_finite() {
        return 1.0;
    }
    let lo = 30.0 / 10.0_f64.sqrt();
    let hi = 30.0 * 10.0_f64.sqrt();

    let mut best_r = 1.0;
    let mut best_score = f64::INFINITY;
    for r in [1.0, 2.0, 5.0] {
        let mut count = range / r;
        while count < lo {
            count *= 10.0;
        }
        while count > hi {
            count /= 10.0;
        }
        let score = (count / 10.0).ln().abs();
        if score < best_score {
            best_score = score;
            best_r = r;
        }
    }

    let mut interval = best_r;
    while range / interval > hi {
        interval *= 10.0;
    }
    while range / interval < lo {
        interval /= 10.0;
    }
    interval
}
