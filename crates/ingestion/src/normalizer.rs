//! Batch normalization into the canonical event schema.
//!
//! Filters records, unifies timestamps, lowercases event types and converts
//! amounts into the base currency. Output order follows input order.

use chrono::{DateTime, Datelike};
use event_core::{
    AmountSource, CanonicalEvent, DropReason, EpochSeconds, Error, EventTime, FxConfig,
    ResolvedEvent, Result, CANONICAL_TS_FORMAT,
};
use serde_json::Value;
use tracing::{debug, info};

use crate::record::{resolve, Resolution};

/// Statistics about a normalization pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NormalizationStats {
    /// Records seen.
    pub total_records: u64,
    /// Records emitted.
    pub kept_records: u64,
    /// Records dropped for lacking an `event_id`.
    pub dropped_missing_id: u64,
    /// Records dropped for lacking a timestamp.
    pub dropped_missing_ts: u64,
    /// Amounts converted through the rate table.
    pub converted_amounts: u64,
    /// Amounts already in the base currency.
    pub base_amounts: u64,
}

impl NormalizationStats {
    /// Total dropped records.
    pub fn dropped(&self) -> u64 {
        self.dropped_missing_id + self.dropped_missing_ts
    }

    /// Fraction of records that survived filtering.
    pub fn kept_frac(&self) -> f64 {
        if self.total_records > 0 {
            self.kept_records as f64 / self.total_records as f64
        } else {
            0.0
        }
    }

    fn record_drop(&mut self, reason: DropReason) {
        match reason {
            DropReason::MissingEventId => self.dropped_missing_id += 1,
            DropReason::MissingTimestamp => self.dropped_missing_ts += 1,
        }
    }
}

/// Events plus the statistics of the pass that produced them.
#[derive(Debug, Clone, PartialEq)]
pub struct NormalizationReport {
    pub events: Vec<CanonicalEvent>,
    pub stats: NormalizationStats,
}

/// Normalizer over a fixed rate table.
///
/// Holds no mutable state; one instance can serve any number of batches,
/// including from several threads at once.
#[derive(Debug, Clone, Default)]
pub struct Normalizer {
    fx: FxConfig,
}

impl Normalizer {
    /// Create a normalizer with the given rate table.
    pub fn new(fx: FxConfig) -> Self {
        Self { fx }
    }

    /// Rate table in use.
    pub fn fx(&self) -> &FxConfig {
        &self.fx
    }

    /// Normalize a batch, failing on the first record with unresolvable data.
    pub fn normalize(&self, records: &[Value]) -> Result<Vec<CanonicalEvent>> {
        self.normalize_with_stats(records).map(|report| report.events)
    }

    /// Normalize a batch and report what was kept, dropped and converted.
    pub fn normalize_with_stats(&self, records: &[Value]) -> Result<NormalizationReport> {
        let mut stats = NormalizationStats::default();
        let mut events = Vec::with_capacity(records.len());

        for (index, record) in records.iter().enumerate() {
            stats.total_records += 1;

            let resolved = match resolve(record)? {
                Resolution::Admitted(resolved) => resolved,
                Resolution::Dropped(reason) => {
                    debug!(index, reason = reason.as_str(), "dropping record");
                    stats.record_drop(reason);
                    continue;
                }
            };

            match resolved.amount {
                AmountSource::Base(_) => stats.base_amounts += 1,
                AmountSource::Foreign { .. } => stats.converted_amounts += 1,
                AmountSource::Absent => {}
            }

            events.push(self.canonicalize(resolved)?);
            stats.kept_records += 1;
        }

        info!(
            total = stats.total_records,
            kept = stats.kept_records,
            dropped = stats.dropped(),
            "normalized event batch"
        );

        Ok(NormalizationReport { events, stats })
    }

    /// Parse a JSON array of records and normalize it.
    pub fn normalize_json(&self, json: &str) -> Result<Vec<CanonicalEvent>> {
        let records: Vec<Value> = serde_json::from_str(json)?;
        self.normalize(&records)
    }

    /// Normalize a single record. `Ok(None)` means the record was filtered out.
    pub fn normalize_record(&self, record: &Value) -> Result<Option<CanonicalEvent>> {
        match resolve(record)? {
            Resolution::Admitted(resolved) => self.canonicalize(resolved).map(Some),
            Resolution::Dropped(_) => Ok(None),
        }
    }

    /// Map a resolved record onto the canonical schema.
    fn canonicalize(&self, event: ResolvedEvent) -> Result<CanonicalEvent> {
        let ts = match event.time {
            EventTime::Iso(ts) => ts,
            EventTime::Epoch(secs) => format_epoch_seconds(secs).ok_or_else(|| {
                Error::data(
                    &event.event_id,
                    "ts",
                    format!("epoch {secs} is out of range"),
                )
            })?,
        };

        let amount_eur = self.amount_in_base(&event.event_id, &event.amount)?;

        Ok(CanonicalEvent {
            event_type: event
                .event_type
                .map(|t| t.to_lowercase())
                .unwrap_or_default(),
            event_id: event.event_id,
            user_id: event.user_id,
            ts,
            product_id: event.product_id,
            amount_eur,
        })
    }

    /// Convert an amount into the base currency.
    ///
    /// Unknown currency codes are an error; there is no fallback rate.
    fn amount_in_base(&self, event_id: &str, amount: &AmountSource) -> Result<Option<f64>> {
        match amount {
            AmountSource::Base(value) => Ok(Some(*value)),
            AmountSource::Foreign { amount, currency } => {
                let rate = self.fx.rate(currency).ok_or_else(|| {
                    Error::data(
                        event_id,
                        "currency",
                        format!("has no rate for `{currency}` into {}", self.fx.base_currency),
                    )
                })?;
                let converted = amount * rate;
                debug!(event_id, currency = currency.as_str(), rate, converted, "converted amount");
                Ok(Some(converted))
            }
            AmountSource::Absent => Ok(None),
        }
    }
}

/// Normalize a batch against a rate table.
pub fn normalize_events(records: &[Value], fx: &FxConfig) -> Result<Vec<CanonicalEvent>> {
    Normalizer::new(fx.clone()).normalize(records)
}

/// Render UTC epoch seconds as `YYYY-MM-DDTHH:MM:SSZ`.
///
/// Returns `None` outside years 0001-9999, where the four-digit year no
/// longer holds.
pub fn format_epoch_seconds(secs: EpochSeconds) -> Option<String> {
    DateTime::from_timestamp(secs, 0)
        .filter(|dt| (1..=9999).contains(&dt.year()))
        .map(|dt| dt.format(CANONICAL_TS_FORMAT).to_string())
}
