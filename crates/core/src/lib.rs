//! Core types and configuration for the trialsync system.
//!
//! This crate provides shared types used across all other crates:
//! - Trial, marker and timestamp series types
//! - Configuration structures
//! - Common error types
//! - Unix epoch and session-relative time helpers

pub mod config;
pub mod error;
pub mod time;
pub mod types;

pub use config::Config;
pub use error::{Error, Result};
pub use types::*;
