//! Record ingestion and normalization for the event normalizer.
//!
//! This crate handles:
//! - Record filtering (missing id, missing timestamp)
//! - Field alias resolution over loosely-typed JSON records
//! - Timestamp unification (ISO passthrough, epoch seconds formatting)
//! - Currency conversion into the base currency

pub mod normalizer;
pub mod record;

pub use normalizer::{
    format_epoch_seconds, normalize_events, NormalizationReport, NormalizationStats, Normalizer,
};
pub use record::{resolve, Resolution};
