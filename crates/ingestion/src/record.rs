//! Schema-on-read alias resolution.
//!
//! Maps a loosely-typed upstream record onto a [`ResolvedEvent`]. The drop
//! filter (missing id, missing timestamp) is evaluated first, so a record
//! that gets dropped never reaches the field checks that can fail.

use event_core::{AmountSource, DropReason, Error, EventTime, ResolvedEvent, Result};
use serde_json::{Map, Value};

/// Outcome of resolving one input record.
#[derive(Debug, Clone, PartialEq)]
pub enum Resolution {
    /// Record passed the filter.
    Admitted(ResolvedEvent),
    /// Record is excluded from the output.
    Dropped(DropReason),
}

/// Resolve field aliases on a single record.
///
/// Returns `Ok(Resolution::Dropped(_))` for records that fail the filter and
/// an [`Error::Data`] for admitted records holding a field of the wrong shape.
pub fn resolve(record: &Value) -> Result<Resolution> {
    // A non-object has no event_id.
    let Some(fields) = record.as_object() else {
        return Ok(Resolution::Dropped(DropReason::MissingEventId));
    };

    let Some(event_id) = fields.get("event_id").and_then(identifier) else {
        return Ok(Resolution::Dropped(DropReason::MissingEventId));
    };

    let Some(time) = event_time(fields, &event_id)? else {
        return Ok(Resolution::Dropped(DropReason::MissingTimestamp));
    };

    let event_type = event_type(fields, &event_id)?;
    let user_id = user_id(fields);
    let product_id = product_id(fields);
    let amount = amount_source(fields, &event_id)?;

    Ok(Resolution::Admitted(ResolvedEvent {
        event_id,
        time,
        event_type,
        user_id,
        product_id,
        amount,
    }))
}

/// Value under `key`, treating explicit null as absent.
fn present<'a>(fields: &'a Map<String, Value>, key: &str) -> Option<&'a Value> {
    fields.get(key).filter(|v| !v.is_null())
}

/// Identifiers are strings; integer ids are rendered as their digits.
fn identifier(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) if n.is_i64() || n.is_u64() => Some(n.to_string()),
        _ => None,
    }
}

/// `outer.inner` on a nested object.
fn nested(fields: &Map<String, Value>, outer: &str, inner: &str) -> Option<String> {
    fields
        .get(outer)
        .and_then(Value::as_object)
        .and_then(|nested| nested.get(inner))
        .and_then(identifier)
}

/// `timestamp` wins over `ts`. An explicit null `timestamp` is unresolvable
/// even when `ts` is set.
fn event_time(fields: &Map<String, Value>, event_id: &str) -> Result<Option<EventTime>> {
    match fields.get("timestamp") {
        Some(Value::Null) => return Ok(None),
        Some(Value::String(s)) => return Ok(Some(EventTime::Iso(s.clone()))),
        Some(other) => {
            return Err(Error::data(
                event_id,
                "timestamp",
                format!("must be an ISO-8601 string, got {other}"),
            ))
        }
        None => {}
    }

    match present(fields, "ts") {
        None => Ok(None),
        Some(value) => epoch_seconds(value)
            .map(|secs| Some(EventTime::Epoch(secs)))
            .ok_or_else(|| {
                Error::data(
                    event_id,
                    "ts",
                    format!("must be integer epoch seconds, got {value}"),
                )
            }),
    }
}

/// Integer seconds; whole-valued floats are accepted.
fn epoch_seconds(value: &Value) -> Option<i64> {
    value.as_i64().or_else(|| {
        value
            .as_f64()
            .filter(|f| f.fract() == 0.0 && *f >= i64::MIN as f64 && *f < i64::MAX as f64)
            .map(|f| f as i64)
    })
}

fn event_type(fields: &Map<String, Value>, event_id: &str) -> Result<Option<String>> {
    for key in ["type", "eventType"] {
        match present(fields, key) {
            Some(Value::String(s)) => return Ok(Some(s.clone())),
            Some(other) => {
                return Err(Error::data(
                    event_id,
                    key,
                    format!("must be a string, got {other}"),
                ))
            }
            None => continue,
        }
    }
    Ok(None)
}

/// An explicit null `user_id` is a resolved value and stops alias lookup.
/// Other non-identifier values count as absent.
fn user_id(fields: &Map<String, Value>) -> Option<String> {
    match fields.get("user_id") {
        Some(Value::Null) => None,
        Some(value) => identifier(value).or_else(|| nested(fields, "user", "id")),
        None => nested(fields, "user", "id"),
    }
}

fn product_id(fields: &Map<String, Value>) -> Option<String> {
    present(fields, "product_id")
        .and_then(identifier)
        .or_else(|| nested(fields, "product", "sku"))
}

fn amount_source(fields: &Map<String, Value>, event_id: &str) -> Result<AmountSource> {
    if let Some(value) = present(fields, "amount_eur") {
        return Ok(AmountSource::Base(number(value, event_id, "amount_eur")?));
    }

    match (present(fields, "amount"), present(fields, "currency")) {
        (Some(amount), Some(currency)) => {
            let amount = number(amount, event_id, "amount")?;
            let currency = currency.as_str().ok_or_else(|| {
                Error::data(
                    event_id,
                    "currency",
                    format!("must be a currency code string, got {currency}"),
                )
            })?;
            Ok(AmountSource::Foreign {
                amount,
                currency: currency.to_string(),
            })
        }
        _ => Ok(AmountSource::Absent),
    }
}

/// JSON numbers, or strings holding a decimal number (e.g. `"10.00"`).
fn number(value: &Value, event_id: &str, field: &str) -> Result<f64> {
    let parsed = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    };

    parsed
        .filter(|f| f.is_finite())
        .ok_or_else(|| Error::data(event_id, field, format!("is not a number: {value}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn admitted(record: Value) -> ResolvedEvent {
        match resolve(&record).unwrap() {
            Resolution::Admitted(event) => event,
            Resolution::Dropped(reason) => panic!("unexpected drop: {reason:?}"),
        }
    }

    fn dropped(record: Value) -> DropReason {
        match resolve(&record).unwrap() {
            Resolution::Dropped(reason) => reason,
            Resolution::Admitted(event) => panic!("unexpected admit: {event:?}"),
        }
    }

    #[test]
    fn test_missing_event_id_dropped() {
        let reason = dropped(json!({"timestamp": "2026-02-10T12:00:00Z", "type": "purchase"}));
        assert_eq!(reason, DropReason::MissingEventId);

        let reason = dropped(json!({"event_id": null, "ts": 1770724800}));
        assert_eq!(reason, DropReason::MissingEventId);
    }

    #[test]
    fn test_non_object_dropped() {
        assert_eq!(dropped(json!("e1")), DropReason::MissingEventId);
        assert_eq!(dropped(json!([1, 2])), DropReason::MissingEventId);
    }

    #[test]
    fn test_missing_timestamp_dropped() {
        assert_eq!(dropped(json!({"event_id": "e1"})), DropReason::MissingTimestamp);
        assert_eq!(
            dropped(json!({"event_id": "e1", "ts": null})),
            DropReason::MissingTimestamp
        );
    }

    #[test]
    fn test_null_timestamp_dropped_even_with_ts() {
        let reason = dropped(json!({"event_id": "e4", "timestamp": null, "ts": 1770724800}));
        assert_eq!(reason, DropReason::MissingTimestamp);
    }

    #[test]
    fn test_filter_runs_before_field_checks() {
        // Bad currency and bad amount, but no id: dropped, not an error.
        let reason = dropped(json!({
            "timestamp": "2026-02-10T12:00:00Z",
            "amount": "lots",
            "currency": 42
        }));
        assert_eq!(reason, DropReason::MissingEventId);
    }

    #[test]
    fn test_iso_timestamp_takes_precedence() {
        let event = admitted(json!({
            "event_id": "e1",
            "timestamp": "2026-02-10T10:00:00Z",
            "ts": 1770724800,
        }));
        assert_eq!(event.time, EventTime::Iso("2026-02-10T10:00:00Z".to_string()));
    }

    #[test]
    fn test_epoch_timestamp() {
        let event = admitted(json!({"event_id": "e2", "ts": 1770724800}));
        assert_eq!(event.time, EventTime::Epoch(1770724800));

        let event = admitted(json!({"event_id": "e2", "ts": 1770724800.0}));
        assert_eq!(event.time, EventTime::Epoch(1770724800));
    }

    #[test]
    fn test_bad_timestamp_types_are_errors() {
        let err = resolve(&json!({"event_id": "e1", "timestamp": 17})).unwrap_err();
        assert!(matches!(err, Error::Data { ref field, .. } if field == "timestamp"));

        let err = resolve(&json!({"event_id": "e1", "ts": "yesterday"})).unwrap_err();
        assert!(matches!(err, Error::Data { ref field, .. } if field == "ts"));

        let err = resolve(&json!({"event_id": "e1", "ts": 1.5})).unwrap_err();
        assert!(err.is_data());
    }

    #[test]
    fn test_integer_event_id() {
        let event = admitted(json!({"event_id": 17, "ts": 0}));
        assert_eq!(event.event_id, "17");
    }

    #[test]
    fn test_event_type_aliases() {
        let event = admitted(json!({"event_id": "e1", "ts": 0, "type": "Purchase"}));
        assert_eq!(event.event_type.as_deref(), Some("Purchase"));

        let event = admitted(json!({"event_id": "e1", "ts": 0, "eventType": "VIEW"}));
        assert_eq!(event.event_type.as_deref(), Some("VIEW"));

        let event = admitted(json!({"event_id": "e1", "ts": 0, "type": null, "eventType": "VIEW"}));
        assert_eq!(event.event_type.as_deref(), Some("VIEW"));

        let event = admitted(json!({"event_id": "e1", "ts": 0}));
        assert_eq!(event.event_type, None);
    }

    #[test]
    fn test_user_id_aliases() {
        let event = admitted(json!({"event_id": "e2", "ts": 0, "user": {"id": "u2"}}));
        assert_eq!(event.user_id.as_deref(), Some("u2"));

        let event = admitted(json!({"event_id": "e1", "ts": 0, "user_id": "u1", "user": {"id": "u2"}}));
        assert_eq!(event.user_id.as_deref(), Some("u1"));
    }

    #[test]
    fn test_explicit_null_user_id_is_resolved() {
        let event = admitted(json!({"event_id": "e3", "ts": 0, "user_id": null, "user": {"id": "u2"}}));
        assert_eq!(event.user_id, None);
    }

    #[test]
    fn test_wrong_typed_ids_fall_through_to_nested() {
        let event = admitted(json!({"event_id": "e2", "ts": 0, "user_id": true, "user": {"id": "u2"}}));
        assert_eq!(event.user_id.as_deref(), Some("u2"));

        let event = admitted(json!({"event_id": "e2", "ts": 0, "product_id": true, "product": {"sku": "p2"}}));
        assert_eq!(event.product_id.as_deref(), Some("p2"));

        let event = admitted(json!({"event_id": "e2", "ts": 0, "user_id": ["u1"]}));
        assert_eq!(event.user_id, None);
    }

    #[test]
    fn test_product_id_aliases() {
        let event = admitted(json!({"event_id": "e1", "ts": 0, "product": {"sku": "p1"}}));
        assert_eq!(event.product_id.as_deref(), Some("p1"));

        let event = admitted(json!({"event_id": "e2", "ts": 0, "product_id": "p2"}));
        assert_eq!(event.product_id.as_deref(), Some("p2"));

        let event = admitted(json!({"event_id": "e2", "ts": 0, "product": {"name": "x"}}));
        assert_eq!(event.product_id, None);
    }

    #[test]
    fn test_amount_sources() {
        let event = admitted(json!({"event_id": "e5", "ts": 0, "amount_eur": -10.0}));
        assert_eq!(event.amount, AmountSource::Base(-10.0));

        let event = admitted(json!({"event_id": "e3", "ts": 0, "amount": 12, "currency": "USD"}));
        assert_eq!(
            event.amount,
            AmountSource::Foreign { amount: 12.0, currency: "USD".to_string() }
        );

        let event = admitted(json!({"event_id": "e1", "ts": 0, "amount": "10.00", "currency": "EUR"}));
        assert_eq!(
            event.amount,
            AmountSource::Foreign { amount: 10.0, currency: "EUR".to_string() }
        );
    }

    #[test]
    fn test_amount_eur_wins_over_pair() {
        let event = admitted(json!({
            "event_id": "e1", "ts": 0,
            "amount_eur": 3, "amount": 12, "currency": "USD"
        }));
        assert_eq!(event.amount, AmountSource::Base(3.0));
    }

    #[test]
    fn test_incomplete_amount_is_absent() {
        let event = admitted(json!({"event_id": "e1", "ts": 0, "amount": 12}));
        assert_eq!(event.amount, AmountSource::Absent);

        let event = admitted(json!({"event_id": "e1", "ts": 0, "currency": "USD"}));
        assert_eq!(event.amount, AmountSource::Absent);

        let event = admitted(json!({"event_id": "e1", "ts": 0, "amount_eur": null}));
        assert_eq!(event.amount, AmountSource::Absent);
    }

    #[test]
    fn test_malformed_amount_is_error() {
        let err = resolve(&json!({"event_id": "e7", "ts": 0, "amount": "ten", "currency": "EUR"}))
            .unwrap_err();
        match err {
            Error::Data { event_id, field, .. } => {
                assert_eq!(event_id, "e7");
                assert_eq!(field, "amount");
            }
            other => panic!("unexpected error: {other}"),
        }

        let err = resolve(&json!({"event_id": "e7", "ts": 0, "amount": 1, "currency": 978}))
            .unwrap_err();
        assert!(matches!(err, Error::Data { ref field, .. } if field == "currency"));
    }
}
