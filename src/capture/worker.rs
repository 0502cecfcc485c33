//! Capture worker thread: the acquisition loop that feeds the slot store.
//!
//! cpal streams are not `Send`, so the worker thread opens the device
//! itself via a factory closure and reports the outcome over a one-shot
//! startup handshake. After that the loop is simple: read a chunk, bump
//! the stamp, publish. A publish that loses the slot race drops that
//! chunk; the viewer only ever wants the freshest one.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;
use std::time::Duration;

use crate::capture::slot::{BufferConsumer, PublishOutcome, SlotStore};
use crate::capture::source::{CaptureError, CaptureSource};

/// How often the loop re-checks the pause flag while paused.
const PAUSE_POLL: Duration = Duration::from_millis(50);

/// Flags shared between the worker thread and its owner.
struct CaptureControl {
    pause: AtomicBool,
    shutdown: AtomicBool,
    fatal: Mutex<Option<String>>,
}

impl CaptureControl {
    fn new() -> Self {
        CaptureControl {
            pause: AtomicBool::new(false),
            shutdown: AtomicBool::new(false),
            fatal: Mutex::new(None),
        }
    }

    fn fail(&self, message: String) {
        tracing::error!("Capture worker failed: {}", message);
        if let Ok(mut slot) = self.fatal.lock() {
            slot.get_or_insert(message);
        }
    }
}

/// Handle to the capture thread.
///
/// Dropping the handle asks the thread to stop and joins it; a blocked
/// chunk read delays that by at most one read timeout.
pub struct CaptureWorker {
    handle: Option<JoinHandle<()>>,
    control: Arc<CaptureControl>,
    store: Arc<SlotStore>,
    sample_rate: u32,
}

impl CaptureWorker {
    /// Spawns the capture thread and waits for it to open its source.
    ///
    /// The factory runs on the new thread because capture streams cannot
    /// cross threads. Spawn only returns once the source is open and its
    /// actual sample rate is known, so configuration failures surface
    /// here instead of as a dead thread later.
    ///
    /// # Errors
    /// - Whatever the factory reports while opening the source
    /// - If the capture thread cannot be spawned or dies during startup
    pub fn spawn<F>(chunk_len: usize, factory: F) -> Result<Self, CaptureError>
    where
        F: FnOnce() -> Result<Box<dyn CaptureSource>, CaptureError> + Send + 'static,
    {
        let store = Arc::new(SlotStore::new(chunk_len));
        let control = Arc::new(CaptureControl::new());
        let thread_store = Arc::clone(&store);
        let thread_control = Arc::clone(&control);
        let (ready_tx, ready_rx) = std::sync::mpsc::channel();

        let handle = std::thread::Builder::new()
            .name("capture".into())
            .spawn(move || {
                let mut source = match factory() {
                    Ok(source) => source,
                    Err(e) => {
                        let _ = ready_tx.send(Err(e));
                        return;
                    }
                };
                let _ = ready_tx.send(Ok(source.sample_rate()));
                run_loop(source.as_mut(), &thread_store, &thread_control, chunk_len);
                tracing::debug!("Capture worker exited");
            })
            .map_err(|e| CaptureError::DeviceOpen(format!("failed to spawn capture thread: {e}")))?;

        let sample_rate = ready_rx
            .recv()
            .map_err(|_| CaptureError::DeviceOpen("capture thread died during startup".into()))??;

        tracing::info!("Capture worker running at {}Hz", sample_rate);
        Ok(CaptureWorker {
            handle: Some(handle),
            control,
            store,
            sample_rate,
        })
    }

    /// The rate the source actually runs at.
    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// A consumer sized for this worker's chunks, starting before the
    /// first published chunk.
    pub fn consumer(&self) -> BufferConsumer {
        BufferConsumer::new(self.store.chunk_len())
    }

    pub fn store(&self) -> &Arc<SlotStore> {
        &self.store
    }

    /// Asks the worker to stop reading and pause the device.
    pub fn pause(&self) {
        self.control.pause.store(true, Ordering::Release);
    }

    /// Asks the worker to resume reading.
    pub fn resume(&self) {
        self.control.pause.store(false, Ordering::Release);
    }

    /// True once the capture thread has exited, cleanly or otherwise.
    pub fn is_finished(&self) -> bool {
        self.handle.as_ref().is_none_or(|h| h.is_finished())
    }

    /// The error that killed the worker, if it died.
    pub fn fatal_error(&self) -> Option<String> {
        self.control.fatal.lock().ok().and_then(|slot| slot.clone())
    }

    /// Stops the worker and joins it, returning its fatal error if any.
    pub fn shutdown(mut self) -> Option<String> {
        self.control.shutdown.store(true, Ordering::Release);
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
        self.fatal_error()
    }
}

impl Drop for CaptureWorker {
    fn drop(&mut self) {
        self.control.shutdown.store(true, Ordering::Release);
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

/// The acquisition loop. Runs until shutdown or a fatal source error.
fn run_loop(
    source: &mut dyn CaptureSource,
    store: &SlotStore,
    control: &CaptureControl,
    chunk_len: usize,
) {
    let mut chunk = vec![0i16; chunk_len];
    let mut stamp: u64 = 0;
    let mut paused = false;

    loop {
        if control.shutdown.load(Ordering::Acquire) {
            return;
        }

        let want_pause = control.pause.load(Ordering::Acquire);
        if want_pause != paused {
            let result = if want_pause {
                source.pause()
            } else {
                source.resume()
            };
            if let Err(e) = result {
                control.fail(e.to_string());
                return;
            }
            paused = want_pause;
        }
        if paused {
            std::thread::sleep(PAUSE_POLL);
            continue;
        }

        if let Err(e) = source.read_chunk(&mut chunk) {
            control.fail(e.to_string());
            return;
        }

        stamp += 1;
        match store.publish(stamp, &chunk) {
            Ok(PublishOutcome::Published) => {}
            Ok(PublishOutcome::Contended) => {
                // Reader held the slot; this chunk is simply lost.
                tracing::debug!("Dropped chunk {}: slot busy", stamp);
            }
            Err(e) => {
                control.fail(e.to_string());
                return;
            }
        }
    }
}
