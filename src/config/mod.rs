//! # Configuration Module
//!
//! Configuration structures, layering and validation for the studio.

pub mod config;

pub use config::{RetrySettings, ScannerSettings, StudioConfig, VideoSettings};
