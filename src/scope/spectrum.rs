//! Power spectrum computation and adaptive vertical autoscaling.
//!
//! The transform itself lives behind the `fft` cargo feature; a build
//! without it still runs, with frequency mode showing a diagnostic
//! instead of a graph. Everything downstream of the transform works on
//! plain power-per-channel slices, so the autoscale code is independent
//! of the feature.
//!
//! Autoscaling aims the noise floor at a small fixed fraction of full
//! scale while guaranteeing the strongest peak never clips, then blends
//! the result toward the previous frame's scale so the display does not
//! twitch with every burst.

use std::time::Instant;

use crate::scope::ring::RingWindow;

#[cfg(feature = "fft")]
use rustfft::{num_complex::Complex, FftPlanner};

/// Forward FFT plus scratch buffers, reused across frames.
#[cfg(feature = "fft")]
pub struct PowerSpectrum {
    planner: FftPlanner<f64>,
    buf: Vec<Complex<f64>>,
    power: Vec<f64>,
}

#[cfg(feature = "fft")]
impl PowerSpectrum {
    pub fn new() -> Self {
        PowerSpectrum {
            planner: FftPlanner::new(),
            buf: Vec::new(),
            power: Vec::new(),
        }
    }

    /// Transforms the window into `len/2 + 1` power values, one per
    /// frequency channel from DC up to nyquist.
    pub fn compute(&mut self, window: RingWindow<'_>) -> &[f64] {
        let n = window.len();
        self.buf.clear();
        self.buf.extend(window.iter().map(|s| Complex {
            re: s as f64,
            im: 0.0,
        }));
        let fft = self.planner.plan_fft_forward(n);
        fft.process(&mut self.buf);

        self.power.clear();
        self.power
            .extend(self.buf[..=n / 2].iter().map(|c| c.norm_sqr()));
        &self.power
    }
}

#[cfg(feature = "fft")]
impl Default for PowerSpectrum {
    fn default() -> Self {
        Self::new()
    }
}

/// Capability check for the spectral transform, resolved at build time.
pub enum SpectrumEngine {
    #[cfg(feature = "fft")]
    Available(PowerSpectrum),
    #[cfg(not(feature = "fft"))]
    Unavailable,
}

impl SpectrumEngine {
    #[cfg(feature = "fft")]
    pub fn detect() -> Self {
        SpectrumEngine::Available(PowerSpectrum::new())
    }

    #[cfg(not(feature = "fft"))]
    pub fn detect() -> Self {
        SpectrumEngine::Unavailable
    }

    pub fn is_available(&self) -> bool {
        cfg!(feature = "fft")
    }

    /// Computes the power spectrum of the window, or `None` when the
    /// transform is not compiled in.
    #[cfg(feature = "fft")]
    pub fn compute(&mut self, window: RingWindow<'_>) -> Option<&[f64]> {
        let SpectrumEngine::Available(transform) = self;
        Some(transform.compute(window))
    }

    #[cfg(not(feature = "fft"))]
    pub fn compute(&mut self, _window: RingWindow<'_>) -> Option<&[f64]> {
        None
    }
}

/// Vertical scale state carried between frequency-mode frames.
pub struct AutoscaleState {
    y_scale: f64,
    noise: f64,
    last_update: Option<Instant>,
}

impl AutoscaleState {
    pub fn new() -> Self {
        AutoscaleState {
            y_scale: 1.0,
            noise: 1.0,
            last_update: None,
        }
    }

    /// Forgets the timestamp so the next update adopts fresh values
    /// without blending. Called when the display mode changes.
    pub fn reset(&mut self) {
        self.last_update = None;
    }

    pub fn y_scale(&self) -> f64 {
        self.y_scale
    }

    pub fn noise_floor(&self) -> f64 {
        self.noise
    }

    /// Re-measures scale and noise floor over the visible channel range
    /// `[chan_lo, chan_hi)` and blends toward the measurement.
    ///
    /// The blend factor is `min(1, 1.5 * dt)`, so after two thirds of a
    /// second without updates the old scale has fully decayed. The first
    /// update after `new` or [`reset`] adopts the measurement as-is.
    ///
    /// [`reset`]: AutoscaleState::reset
    pub fn update(&mut self, power: &[f64], chan_lo: usize, chan_hi: usize, now: Instant) {
        let chan_hi = chan_hi.min(power.len());
        let chan_lo = chan_lo.min(chan_hi);
        let (max, noise) = measure(power, chan_lo, chan_hi);

        // Keep noise at 1 or above, it feeds a logarithm later.
        let noise = noise.max(1.0);
        let mut y_scale = 1.0 / (100.0 * (noise + 1.0).sqrt());
        let overload = max.sqrt() * y_scale;
        if overload > 1.0 {
            y_scale /= overload;
        }

        let decay = match self.last_update {
            Some(prev) => (1.5 * now.duration_since(prev).as_secs_f64()).min(1.0),
            None => 1.0,
        };
        self.y_scale = (1.0 - decay) * self.y_scale + decay * y_scale;
        self.noise = (1.0 - decay) * self.noise + decay * noise;
        self.last_update = Some(now);
    }

    /// Maps a power value to a display unit, nominally in `[0, 1]`.
    ///
    /// Linear mode is a straight `sqrt(power) * y_scale`. Log mode pins
    /// a tenth of the noise floor to 0 and full scale to 1, showing
    /// nothing below the pin.
    pub fn unit(&self, power: f64, log_scale: bool) -> f64 {
        let raw = power.sqrt() * self.y_scale;
        if !log_scale {
            return raw;
        }
        let bottom = (self.noise / 10.0).sqrt() * self.y_scale;
        if raw <= bottom {
            return 0.0;
        }
        let log_bottom = bottom.ln();
        (raw.ln() - log_bottom) / (-log_bottom)
    }
}

impl Default for AutoscaleState {
    fn default() -> Self {
        Self::new()
    }
}

/// Peak and noise-floor measurement over `[chan_lo, chan_hi)`.
///
/// Both use the weighting `power[k] * k`, which zeroes out the large
/// DC artifact in channel 0. The reported values are the unweighted
/// powers at the chosen channels.
fn measure(power: &[f64], chan_lo: usize, chan_hi: usize) -> (f64, f64) {
    let range = chan_hi - chan_lo;
    if range == 0 {
        return (0.0, 1.0);
    }

    let mut max = 0.0;
    let mut best_weighted = -1.0;
    for k in chan_lo..chan_hi {
        let weighted = power[k] * k as f64;
        if weighted > best_weighted {
            best_weighted = weighted;
            max = power[k];
        }
    }

    // Sample sparsely, then take the power at the 25th-percentile rank
    // of the weighted ordering as the noise floor.
    let mut step = 7;
    while step > 1 && range.div_ceil(step) < 100 {
        step -= 1;
    }
    let mut picks: Vec<(f64, f64)> = (chan_lo..chan_hi)
        .step_by(step)
        .map(|k| (power[k] * k as f64, power[k]))
        .collect();
    picks.sort_by(|a, b| a.0.total_cmp(&b.0));
    let noise = picks[picks.len() / 4].1;

    (max, noise)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    const FULL_DECAY: Duration = Duration::from_secs(1);

    #[test]
    fn test_all_zero_spectrum_yields_quiet_baseline() {
        // Chunk length 8 in one chunk: 5 channels, all silent.
        let power = vec![0.0; 5];
        let mut scale = AutoscaleState::new();
        scale.update(&power, 0, power.len(), Instant::now());

        assert_eq!(scale.noise_floor(), 1.0);
        let expected = 1.0 / (100.0 * 2.0_f64.sqrt());
        assert!((scale.y_scale() - expected).abs() < 1e-12);
        assert!((expected - 0.00707).abs() < 1e-5);

        // Nothing to draw and nothing for log mode to clip.
        assert_eq!(scale.unit(0.0, false), 0.0);
        assert_eq!(scale.unit(0.0, true), 0.0);
    }

    #[test]
    fn test_zero_dt_keeps_previous_scale() {
        let now = Instant::now();
        let mut scale = AutoscaleState::new();
        scale.update(&vec![100.0; 128], 0, 128, now);
        let y = scale.y_scale();
        let noise = scale.noise_floor();

        scale.update(&vec![1.0e9; 128], 0, 128, now);
        assert_eq!(scale.y_scale(), y);
        assert_eq!(scale.noise_floor(), noise);
    }

    #[test]
    fn test_full_dt_adopts_fresh_values() {
        let now = Instant::now();
        let loud = vec![1.0e9; 128];

        let mut blended = AutoscaleState::new();
        blended.update(&vec![100.0; 128], 0, 128, now);
        blended.update(&loud, 0, 128, now + FULL_DECAY);

        let mut fresh = AutoscaleState::new();
        fresh.update(&loud, 0, 128, now + FULL_DECAY);

        assert_eq!(blended.y_scale(), fresh.y_scale());
        assert_eq!(blended.noise_floor(), fresh.noise_floor());
    }

    #[test]
    fn test_reset_forces_unblended_update() {
        let now = Instant::now();
        let loud = vec![1.0e9; 128];

        let mut scale = AutoscaleState::new();
        scale.update(&vec![100.0; 128], 0, 128, now);
        scale.reset();
        scale.update(&loud, 0, 128, now + Duration::from_millis(1));

        let mut fresh = AutoscaleState::new();
        fresh.update(&loud, 0, 128, now);
        assert_eq!(scale.y_scale(), fresh.y_scale());
    }

    #[test]
    fn test_peak_never_overloads() {
        let spectra: [Vec<f64>; 3] = [
            {
                let mut p = vec![5.0; 512];
                p[300] = 4.0e12;
                p
            },
            vec![1.0e15; 512],
            (0..512).map(|k| (k * k) as f64).collect(),
        ];
        for power in &spectra {
            let mut scale = AutoscaleState::new();
            scale.update(power, 0, power.len(), Instant::now());
            let max = power.iter().cloned().fold(0.0, f64::max);
            assert!(max.sqrt() * scale.y_scale() <= 1.0 + 1e-9);
        }
    }

    #[test]
    fn test_weighting_suppresses_dc_peak() {
        // Channel 0 is huge but weighted to zero; channel 3 wins.
        let mut power = vec![0.0; 16];
        power[0] = 1.0e12;
        power[3] = 400.0;
        let mut scale = AutoscaleState::new();
        scale.update(&power, 0, 16, Instant::now());

        // overload = sqrt(400) * y_scale stays below 1, so y_scale is
        // the plain noise-derived value, not rescaled by the DC spike.
        let expected = 1.0 / (100.0 * 2.0_f64.sqrt());
        assert!((scale.y_scale() - expected).abs() < 1e-12);
    }

    #[test]
    fn test_noise_sampling_step_shrinks_for_narrow_ranges() {
        // 50 channels sampled every 7th would give 8 picks; the step
        // drops to 1 so all 50 count. power[k] = k makes the weighted
        // order equal the channel order, putting rank 50/4 = 12 at the
        // 25th percentile.
        let power: Vec<f64> = (0..50).map(|k| k as f64).collect();
        let mut scale = AutoscaleState::new();
        scale.update(&power, 0, 50, Instant::now());
        assert_eq!(scale.noise_floor(), 12.0);
    }

    #[test]
    fn test_unit_mapping_linear_and_log() {
        // Flat spectrum of 99: noise = 99, so y_scale = 1/1000.
        let power = vec![99.0; 128];
        let mut scale = AutoscaleState::new();
        scale.update(&power, 0, 128, Instant::now());
        assert!((scale.y_scale() - 1.0e-3).abs() < 1e-12);

        assert!((scale.unit(4.0e6, false) - 2.0).abs() < 1e-9);
        assert_eq!(scale.unit(0.0, false), 0.0);

        let bottom = (99.0 / 10.0_f64).sqrt() * 1.0e-3;
        let raw = 0.5_f64;
        let expected = (raw.ln() - bottom.ln()) / (-bottom.ln());
        assert!((scale.unit(0.25e6, true) - expected).abs() < 1e-9);
        // At or below a tenth of the noise floor nothing shows.
        assert_eq!(scale.unit(bottom * bottom * 1.0e5, true), 0.0);
    }

    #[cfg(feature = "fft")]
    mod transform {
        use super::super::*;
        use crate::scope::ring::SampleRing;

        #[test]
        fn test_constant_signal_lands_in_channel_zero() {
            let mut ring = SampleRing::new(1, 8);
            ring.accept(&[100; 8]);
            let mut transform = PowerSpectrum::new();
            let power = transform.compute(ring.snapshot());

            assert_eq!(power.len(), 5);
            assert!((power[0] - 640_000.0).abs() < 1e-6);
            for &p in &power[1..] {
                assert!(p < 1.0);
            }
        }

        #[test]
        fn test_sine_lands_in_its_channel() {
            // Two cycles across 8 samples: amplitude A at channel 2 with
            // power (A * N/2)^2.
            let mut ring = SampleRing::new(1, 8);
            ring.accept(&[0, 10_000, 0, -10_000, 0, 10_000, 0, -10_000]);
            let mut transform = PowerSpectrum::new();
            let power = transform.compute(ring.snapshot());

            assert!((power[2] - 1.6e9).abs() < 1.0);
            for (k, &p) in power.iter().enumerate() {
                if k != 2 {
                    assert!(p < 1.0, "leakage at channel {k}: {p}");
                }
            }
        }

        #[test]
        fn test_engine_reports_available() {
            let mut engine = SpectrumEngine::detect();
            assert!(engine.is_available());

            let mut ring = SampleRing::new(1, 8);
            ring.accept(&[0; 8]);
            assert!(engine.compute(ring.snapshot()).is_some());
        }
    }
}
