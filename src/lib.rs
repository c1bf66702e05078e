//! Solocast - single-broadcaster live signaling and recording server
//!
//! This crate coordinates one live broadcaster with many watchers over a
//! WebSocket signaling channel, ingests uploaded recordings of the
//! broadcast, converts them to MP4 in the background, and expires old
//! recordings after a retention window.

pub mod config;
pub mod error;
pub mod recordings;
pub mod signaling;
pub mod state;
pub mod transcode;
pub mod web;

pub use error::{AppError, Result};
