//! Configuration management for sigscope.
//!
//! This module handles loading application configuration from TOML files
//! in the user's config directory.

pub mod file;

pub use file::SigscopeConfig;
