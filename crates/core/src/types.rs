//! Core data types for the event normalizer.

use serde::{Deserialize, Serialize};

/// Seconds since Unix epoch (UTC).
pub type EpochSeconds = i64;

/// strftime pattern of the canonical timestamp: `YYYY-MM-DDTHH:MM:SSZ`.
pub const CANONICAL_TS_FORMAT: &str = "%Y-%m-%dT%H:%M:%SZ";

/// Where a record's timestamp came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventTime {
    /// ISO-8601 string from `timestamp`, passed through untouched.
    Iso(String),
    /// Epoch seconds from `ts`.
    Epoch(EpochSeconds),
}

/// Where a record's monetary amount came from.
#[derive(Debug, Clone, PartialEq)]
pub enum AmountSource {
    /// `amount_eur`: already in the base currency.
    Base(f64),
    /// `amount` + `currency`: needs conversion through the rate table.
    Foreign {
        /// Amount in `currency` units.
        amount: f64,
        /// Currency code, exactly as sent.
        currency: String,
    },
    /// No amount information on the record.
    Absent,
}

/// Why a record was excluded from the output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DropReason {
    /// No usable `event_id`.
    MissingEventId,
    /// Neither `timestamp` nor `ts` resolves (or `timestamp` is null).
    MissingTimestamp,
}

impl DropReason {
    /// Short label for logs.
    pub fn as_str(self) -> &'static str {
        match self {
            DropReason::MissingEventId => "missing_event_id",
            DropReason::MissingTimestamp => "missing_timestamp",
        }
    }
}

/// A record after alias resolution: strict fields, no conversion applied yet.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedEvent {
    /// Event identifier.
    pub event_id: String,
    /// Timestamp source.
    pub time: EventTime,
    /// Event type as sent (`type` or `eventType`), not yet lowercased.
    pub event_type: Option<String>,
    /// User identifier (`user_id` or `user.id`).
    pub user_id: Option<String>,
    /// Product identifier (`product_id` or `product.sku`).
    pub product_id: Option<String>,
    /// Amount source.
    pub amount: AmountSource,
}

/// Canonical output record. Serializes with all six keys present.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CanonicalEvent {
    pub event_id: String,
    pub user_id: Option<String>,
    /// ISO-8601 UTC, `YYYY-MM-DDTHH:MM:SSZ`.
    pub ts: String,
    /// Lowercase event type; empty when the input had none.
    pub event_type: String,
    pub product_id: Option<String>,
    /// Amount in the base currency.
    pub amount_eur: Option<f64>,
}
