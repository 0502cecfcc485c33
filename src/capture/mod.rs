//! Real-time audio capture: device access, the double-buffered handoff,
//! and the worker thread that ties them together.

pub mod slot;
pub mod source;
pub mod worker;

pub use source::{CaptureError, CaptureSource, CpalSource};
pub use worker::CaptureWorker;
