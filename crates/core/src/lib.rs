//! Core types and configuration for the event normalizer.
//!
//! This crate provides shared types used across all other crates:
//! - Resolved input records and canonical output records
//! - Configuration structures (currency rate table)
//! - Common error types

pub mod config;
pub mod error;
pub mod types;

pub use config::{Config, FxConfig};
pub use error::{Error, Result};
pub use types::*;
