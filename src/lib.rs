//! Subkeeper - subtitle acquisition and track normalization
//!
//! This library crate exposes the core functionality for integration testing.

pub mod arr;
pub mod config;
pub mod fingerprint;
pub mod normalize;
pub mod opensubtitles;
pub mod pipeline;
