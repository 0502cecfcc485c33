//! Live signal viewing.
//!
//! Wires the capture worker, sample ring, spectrum engine, and terminal
//! UI into the viewer loop: poll input, drain the chunk handoff, and on
//! each frame tick analyze the window and paint it.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::capture::{CaptureError, CaptureSource, CaptureWorker, CpalSource};
use crate::config::SigscopeConfig;
use crate::scope::{
    render, AutoscaleState, CoordinateMapper, DrawList, Mode, SampleRing, ScopeTui,
    SpectrumEngine, ViewState, ViewerCommand,
};
use crate::ui::ErrorScreen;

/// Runs the live signal viewer.
///
/// Loads configuration, starts the capture worker on its own thread,
/// and drives the render loop until the user quits or a fatal capture
/// error surfaces. A device given on the command line overrides the
/// configured one.
pub async fn handle_view(device_override: Option<String>) -> Result<(), anyhow::Error> {
    tracing::info!("=== sigscope Signal Viewer Started ===");

    let mut config = match SigscopeConfig::load_or_default() {
        Ok(config) => config,
        Err(err) => {
            tracing::error!("Failed to load configuration: {err}");
            let error_message = format!(
                "Configuration Error:\n\n{err}\n\nPlease check your ~/.config/sigscope/sigscope.toml file and try again."
            );
            let mut error_screen = ErrorScreen::new()?;
            error_screen.show_error(&error_message)?;
            error_screen.cleanup()?;
            return Err(anyhow::anyhow!("Configuration error: {err}"));
        }
    };

    if let Some(device) = device_override {
        config.audio.device = device;
    }

    tracing::info!(
        "Configuration loaded: device={}, sample_rate={}Hz, chunk_len={}, ring_chunks={}",
        config.audio.device,
        config.audio.sample_rate,
        config.audio.chunk_len,
        config.audio.ring_chunks
    );

    let device_spec = config.audio.device.clone();
    let requested_rate = config.audio.sample_rate;
    let worker = match CaptureWorker::spawn(config.audio.chunk_len, move || {
        let source = CpalSource::open(&device_spec, requested_rate)?;
        Ok(Box::new(source) as Box<dyn CaptureSource>)
    }) {
        Ok(worker) => worker,
        Err(e) => {
            tracing::error!("Failed to start capture: {}", e);
            let error_message = format!(
                "Capture Error:\n\n{e}\n\nRun 'sigscope list-devices' to see available devices, then check your audio configuration."
            );
            let mut error_screen = ErrorScreen::new()?;
            error_screen.show_error(&error_message)?;
            error_screen.cleanup()?;
            return Err(e.into());
        }
    };

    // The device may have refused the requested rate; all analysis
    // dimensions assume the configured one, so a mismatch is fatal.
    if worker.sample_rate() != config.audio.sample_rate {
        let err = CaptureError::RateMismatch {
            requested: config.audio.sample_rate,
            actual: worker.sample_rate(),
        };
        tracing::error!("{err}");
        worker.shutdown();
        let error_message = format!(
            "Capture Error:\n\n{err}\n\nSet audio.sample_rate in ~/.config/sigscope/sigscope.toml to a rate the device supports."
        );
        let mut error_screen = ErrorScreen::new()?;
        error_screen.show_error(&error_message)?;
        error_screen.cleanup()?;
        return Err(err.into());
    }

    let mut tui = ScopeTui::new().map_err(|e| anyhow::anyhow!("Failed to initialize UI: {e}"))?;

    let interrupted = Arc::new(AtomicBool::new(false));
    let interrupted_flag = interrupted.clone();
    ctrlc::set_handler(move || interrupted_flag.store(true, Ordering::Relaxed))
        .map_err(|e| anyhow::anyhow!("Failed to register signal handler: {e}"))?;

    let result = run_view_loop(&mut tui, &worker, &config, &interrupted);

    tui.cleanup()
        .map_err(|e| anyhow::anyhow!("Cleanup failed: {e}"))?;
    if let Some(detail) = worker.shutdown() {
        tracing::warn!("Capture worker reported on shutdown: {detail}");
    }

    if let Err(err) = result {
        tracing::error!("Viewer stopped: {err}");
        let mut error_screen = ErrorScreen::new()?;
        error_screen.show_error(&format!("Viewer Error:\n\n{err}"))?;
        error_screen.cleanup()?;
        return Err(err);
    }

    tracing::info!("=== sigscope Signal Viewer Exited Successfully ===");
    Ok(())
}

/// The viewer loop proper. Returns `Ok(())` on a user quit and an error
/// for fatal runtime failures; the caller restores the terminal either
/// way.
fn run_view_loop(
    tui: &mut ScopeTui,
    worker: &CaptureWorker,
    config: &SigscopeConfig,
    interrupted: &AtomicBool,
) -> anyhow::Result<()> {
    let nyquist = config.nyquist();
    let channels = config.window_len();
    let sample_rate = config.audio.sample_rate;
    let window_ms = channels as f64 / f64::from(sample_rate) * 1000.0;
    let frame_interval = Duration::from_millis(config.display.frame_interval_ms);

    let mut consumer = worker.consumer();
    let mut ring = SampleRing::new(config.audio.ring_chunks, config.audio.chunk_len);
    let mut engine = SpectrumEngine::detect();
    let mut autoscale = AutoscaleState::new();
    let mut state = ViewState::new(config.display.mode, config.display.log_scale);

    if !engine.is_available() {
        tracing::warn!("Built without the fft feature; frequency mode shows a diagnostic");
    }

    tracing::debug!(
        "Entering view loop: {} channels across 0..{} Hz, frame interval {:?}",
        channels,
        nyquist,
        frame_interval
    );

    // First frame draws the empty scope before any chunk arrives.
    let mut force_render = true;
    let mut pending_chunk = false;
    let mut next_frame = Instant::now();
    let mut frames_rendered = 0u64;

    loop {
        if interrupted.load(Ordering::Relaxed) {
            tracing::info!("Received interrupt signal, exiting");
            return Ok(());
        }

        if worker.is_finished() {
            let detail = worker
                .fatal_error()
                .unwrap_or_else(|| "capture thread exited".to_string());
            return Err(anyhow::anyhow!("Capture stopped: {detail}"));
        }

        match tui.handle_input()? {
            ViewerCommand::Continue => {}
            ViewerCommand::Quit => {
                tracing::debug!("Quit requested");
                return Ok(());
            }
            ViewerCommand::ToggleRun => {
                if state.toggle_run() {
                    worker.resume();
                } else {
                    worker.pause();
                }
                force_render = true;
            }
            ViewerCommand::ToggleMode => {
                state.toggle_mode();
                autoscale.reset();
                force_render = true;
            }
            ViewerCommand::ZoomIn => {
                if state.zoom_in() {
                    force_render = true;
                }
            }
            ViewerCommand::ZoomOut => {
                if state.zoom_out() {
                    force_render = true;
                }
            }
            ViewerCommand::ToggleLog => {
                if state.toggle_log_scale() {
                    force_render = true;
                }
            }
            ViewerCommand::Click { column, row } => {
                if row < tui.graph_rows()? {
                    let (width, _) = tui.graph_size()?;
                    let x = i64::from(column) * 2;
                    if state.click_graph(x, width, nyquist, channels) {
                        force_render = true;
                    }
                }
            }
        }

        if state.running() {
            if let Some(chunk) = consumer.poll(worker.store())? {
                ring.accept(chunk);
                pending_chunk = true;
            }
        }

        let now = Instant::now();
        if now < next_frame && !force_render {
            continue;
        }
        // Missed ticks are skipped, never queued.
        next_frame = now + frame_interval;

        if !should_render(state.mode(), force_render, ring.is_full(), pending_chunk) {
            continue;
        }

        let (width, height) = tui.graph_size()?;
        if width == 0 || height == 0 {
            continue;
        }
        force_render = false;
        pending_chunk = false;

        let mapper = CoordinateMapper::new(state.f_lo(), state.zoom(), width, height, nyquist, channels);
        let mut scene = DrawList::new();

        match state.mode() {
            Mode::Frequency => {
                if let Some(power) = engine.compute(ring.snapshot()) {
                    autoscale.update(power, mapper.chan_lo(), mapper.chan_hi(), Instant::now());
                    render::frequency_frame(
                        &mut scene,
                        &mapper,
                        &autoscale,
                        power,
                        state.log_scale(),
                        width,
                        height,
                    );
                } else {
                    render::unavailable_frame(&mut scene, width, height);
                }
            }
            Mode::Time => {
                render::time_frame(&mut scene, ring.snapshot(), width, height);
            }
        }
        ring.reset();

        let status = status_line(&state, sample_rate, mapper.f_lo(), mapper.f_hi(), window_ms);
        tui.draw(&scene, &status)?;

        frames_rendered += 1;
        if frames_rendered.is_multiple_of(100) {
            tracing::debug!(
                "Rendered {} frames, y_scale={:.6}, noise_floor={:.1}",
                frames_rendered,
                autoscale.y_scale(),
                autoscale.noise_floor()
            );
        }
    }
}

/// Whether this frame tick produces a frame.
///
/// Frequency frames wait for a complete analysis window so the spectrum
/// never mixes old and new chunks; time frames follow the chunk cadence.
/// A forced render bypasses both gates.
fn should_render(mode: Mode, force_render: bool, ring_full: bool, pending_chunk: bool) -> bool {
    match mode {
        Mode::Frequency => force_render || ring_full,
        Mode::Time => force_render || pending_chunk,
    }
}

/// Builds the footer status text for the current view state.
fn status_line(
    state: &ViewState,
    sample_rate: u32,
    f_lo: f64,
    f_hi: f64,
    window_ms: f64,
) -> String {
    let mut status = match state.mode() {
        Mode::Frequency => {
            let axis = if state.log_scale() { "log" } else { "lin" };
            let mut s = format!(
                "freq {}..{} Hz  zoom {:+}  {}",
                render::format_freq(f_lo),
                render::format_freq(f_hi),
                state.zoom(),
                axis
            );
            if state.closeup() {
                s.push_str("  closeup");
            }
            s
        }
        Mode::Time => format!("time {window_ms:.0} ms window  {sample_rate} Hz"),
    };
    if !state.running() {
        status.push_str("  FROZEN");
    }
    status
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_gating_per_mode() {
        // Frequency waits for a full window; a lone fresh chunk is not
        // enough. Time is the reverse. Force overrides both.
        assert!(!should_render(Mode::Frequency, false, false, true));
        assert!(should_render(Mode::Frequency, false, true, false));
        assert!(should_render(Mode::Frequency, true, false, false));
        assert!(should_render(Mode::Time, false, false, true));
        assert!(!should_render(Mode::Time, false, true, false));
        assert!(should_render(Mode::Time, true, false, false));
    }

    #[test]
    fn test_status_line_frequency() {
        let state = ViewState::new(Mode::Frequency, false);
        let status = status_line(&state, 44100, 0.0, 22050.0, 186.0);
        assert_eq!(status, "freq 0.0..22.1k Hz  zoom +0  lin");
    }

    #[test]
    fn test_status_line_frozen_time() {
        let mut state = ViewState::new(Mode::Time, false);
        state.toggle_run();
        let status = status_line(&state, 44100, 0.0, 0.0, 185.8);
        assert_eq!(status, "time 186 ms window  44100 Hz  FROZEN");
    }
}
