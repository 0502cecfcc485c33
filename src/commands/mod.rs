//! Application command handlers for sigscope.
//!
//! This module organizes command handling into separate submodules, each
//! responsible for a specific application command.
//!
//! # Commands
//! - `view`: Live signal viewer (the default command)
//! - `list_devices`: List available audio input devices
//! - `logs`: Display recent log entries

pub mod list_devices;
pub mod logs;
pub mod view;

pub use list_devices::handle_list_devices;
pub use logs::handle_logs;
pub use view::handle_view;
