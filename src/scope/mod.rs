//! Signal analysis and display.
//!
//! The scope turns captured sample windows into rendered frames: the
//! ring assembles chunks into an analysis window, the spectrum engine
//! transforms and autoscales it, the mapper handles zoom and frequency
//! placement, and the renderer emits draw lists for the terminal UI.

pub mod mapper;
pub mod render;
pub mod ring;
pub mod spectrum;
pub mod state;
pub mod surface;
pub mod ui;

pub use mapper::CoordinateMapper;
pub use ring::SampleRing;
pub use spectrum::{AutoscaleState, SpectrumEngine};
pub use state::{Mode, ViewState};
pub use surface::DrawList;
pub use ui::{ScopeTui, ViewerCommand};
