//! Frame composition: turns analyzed data into surface primitives.
//!
//! Everything here works in pixel coordinates against the [`Surface`]
//! trait, so composition stays independent of the terminal painter and
//! runs headless under test.

use crate::scope::mapper::{optimal_grid_spacing, CoordinateMapper};
use crate::scope::ring::RingWindow;
use crate::scope::spectrum::AutoscaleState;
use crate::scope::surface::{Pen, Surface};

/// Sample count of the running mean removed in time mode.
const DC_WINDOW: usize = 16;
/// Minimum horizontal gap between frequency labels.
const LABEL_GAP: i64 = 48;

/// Draws one spectrum frame: grid, labels, and one bar per visible
/// channel. Bars start at the baseline, so channels sharing a pixel
/// column at far zoom-out overlay to their maximum.
pub fn frequency_frame(
    surface: &mut dyn Surface,
    mapper: &CoordinateMapper,
    scale: &AutoscaleState,
    power: &[f64],
    log_scale: bool,
    width: u32,
    height: u32,
) {
    surface.clear();
    let w = width as i64;
    let h = height as i64;

    draw_grid(surface, mapper, w, h);

    let chan_lo = mapper.chan_lo();
    let chan_hi = mapper.chan_hi().min(power.len());
    for chan in chan_lo..chan_hi {
        let offset = (chan - chan_lo) as i64;
        let x = mapper.scale_x(offset);
        if x >= w {
            break;
        }
        let bar_w = (mapper.scale_x(offset + 1) - x).clamp(1, w - x);
        let bar_h = mapper.scale_y(scale.unit(power[chan], log_scale));
        surface.draw_filled_rect(x, h - 1 - bar_h, bar_w, bar_h + 1, Pen::Trace);
    }
}

/// Diagnostic shown in frequency mode when the transform is missing.
pub fn unavailable_frame(surface: &mut dyn Surface, width: u32, height: u32) {
    surface.clear();
    let text = "spectrum unavailable: built without fft support";
    let x = ((width as i64 - 2 * text.len() as i64) / 2).max(0);
    surface.draw_text(x, height as i64 / 2, text);
}

/// Draws one waveform frame as a staircase, two pixels per sample.
///
/// Each sample first has a running mean of the 16 preceding samples
/// subtracted, wrapping around the window, so a DC offset sits on the
/// midline instead of pushing the trace off-screen. The vertical scale
/// is fixed at one pixel per eight counts.
pub fn time_frame(surface: &mut dyn Surface, snapshot: RingWindow<'_>, width: u32, height: u32) {
    surface.clear();
    let w = width as i64;
    let h = height as i64;
    let cap = snapshot.len();
    if cap == 0 {
        return;
    }
    let count = (w as usize / 2).min(cap);
    let wrap = |i: i64| i.rem_euclid(cap as i64) as usize;

    let mut sum: i32 = (1..=DC_WINDOW)
        .map(|k| snapshot.get(wrap(-(k as i64))) as i32)
        .sum();

    let mut prev: Option<(i64, i64)> = None;
    for i in 0..count {
        let mean = sum / DC_WINDOW as i32;
        let filtered = snapshot.get(i) as i32 - mean;
        let x = 2 * i as i64;
        let y = h / 2 - (filtered >> 3) as i64;
        if let Some((px, py)) = prev {
            surface.draw_line(px, py, x, py, Pen::Trace);
            surface.draw_line(x, py, x, y, Pen::Trace);
        }
        prev = Some((x, y));
        sum += snapshot.get(i) as i32 - snapshot.get(wrap(i as i64 - DC_WINDOW as i64)) as i32;
    }
}

fn draw_grid(surface: &mut dyn Surface, mapper: &CoordinateMapper, w: i64, h: i64) {
    let f_lo = mapper.f_lo();
    let f_hi = mapper.f_hi();
    let interval = optimal_grid_spacing(f_hi - f_lo);
    let hz = mapper.hz_per_chan();
    let chan_lo = mapper.chan_lo() as i64;

    let mut k = (f_lo / interval).ceil();
    let mut last_label_x = i64::MIN;
    loop {
        let f = k * interval;
        if f >= f_hi {
            return;
        }
        let chan = (f / hz).round() as i64;
        let x = mapper.scale_x(chan - chan_lo);
        if (0..w).contains(&x) {
            surface.draw_line(x, 0, x, h - 1, Pen::Grid);
            if x.saturating_sub(last_label_x) >= LABEL_GAP {
                surface.draw_text(x + 2, 2, &format_freq(f));
                last_label_x = x;
            }
        }
        k += 1.0;
    }
}

/// Short frequency label for grid lines.
pub fn format_freq(hz: f64) -> String {
    if hz >= 999.95 {
        format!("{:.1}k", hz / 1000.0)
    } else if hz >= 100.0 {
        format!("{hz:.0}")
    } else {
        format!("{hz:.1}")
    }
}
