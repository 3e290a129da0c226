//! PyO3 bindings for the event normalizer.
//!
//! Exposes the Rust normalizer to Python:
//! - Batch normalization of heterogeneous event dicts
//! - Configurable currency rate table
//! - Normalization statistics
//! - Log output through `tracing-subscriber`

use std::collections::HashMap;

use pyo3::exceptions::{PyIOError, PyRuntimeError, PyValueError};
use pyo3::prelude::*;
use pyo3::types::{PyBool, PyDict, PyFloat, PyInt, PyList, PyString, PyTuple};
use serde_json::{Map, Number, Value};
use tracing_subscriber::EnvFilter;

use event_core::{
    CanonicalEvent as RustCanonicalEvent, Error as RustError, FxConfig as RustFxConfig,
};
use event_ingestion::{NormalizationStats as RustNormalizationStats, Normalizer};

// ============================================================================
// Conversions
// ============================================================================

fn to_py_err(err: RustError) -> PyErr {
    match err {
        RustError::Io(_) => PyIOError::new_err(err.to_string()),
        RustError::Data { .. } | RustError::Config(_) | RustError::Json(_) => {
            PyValueError::new_err(err.to_string())
        }
    }
}

/// Convert a Python object (dict/list/str/int/float/bool/None) into JSON.
fn py_to_json(obj: &Bound<'_, PyAny>) -> PyResult<Value> {
    if obj.is_none() {
        return Ok(Value::Null);
    }
    // bool before int: Python bools are ints.
    if let Ok(b) = obj.downcast::<PyBool>() {
        return Ok(Value::Bool(b.is_true()));
    }
    if obj.is_instance_of::<PyInt>() {
        if let Ok(i) = obj.extract::<i64>() {
            return Ok(Value::from(i));
        }
        if let Ok(u) = obj.extract::<u64>() {
            return Ok(Value::from(u));
        }
        return Err(PyValueError::new_err("integer out of 64-bit range"));
    }
    if let Ok(f) = obj.downcast::<PyFloat>() {
        return Number::from_f64(f.value())
            .map(Value::Number)
            .ok_or_else(|| PyValueError::new_err("non-finite float in record"));
    }
    if let Ok(s) = obj.downcast::<PyString>() {
        return Ok(Value::String(s.to_str()?.to_string()));
    }
    if let Ok(dict) = obj.downcast::<PyDict>() {
        let mut map = Map::new();
        for (key, value) in dict.iter() {
            map.insert(key.str()?.to_str()?.to_string(), py_to_json(&value)?);
        }
        return Ok(Value::Object(map));
    }
    if let Ok(list) = obj.downcast::<PyList>() {
        return list
            .iter()
            .map(|item| py_to_json(&item))
            .collect::<PyResult<Vec<_>>>()
            .map(Value::Array);
    }
    if let Ok(tuple) = obj.downcast::<PyTuple>() {
        return tuple
            .iter()
            .map(|item| py_to_json(&item))
            .collect::<PyResult<Vec<_>>>()
            .map(Value::Array);
    }

    Err(PyValueError::new_err(format!(
        "unsupported value in record: {}",
        obj.get_type().name()?
    )))
}

fn records_from_py(records: &Bound<'_, PyAny>) -> PyResult<Vec<Value>> {
    records
        .iter()?
        .map(|item| py_to_json(&item?))
        .collect()
}

fn fx_from_py(rates: Option<HashMap<String, f64>>, base_currency: &str) -> PyResult<RustFxConfig> {
    let fx = match rates {
        Some(rates) => RustFxConfig::new(base_currency, rates),
        None => RustFxConfig::default(),
    };
    fx.validate().map_err(to_py_err)?;
    Ok(fx)
}

// ============================================================================
// Python-exposed Types
// ============================================================================

/// A normalized event in the canonical schema.
#[pyclass]
#[derive(Clone)]
pub struct CanonicalEvent {
    #[pyo3(get)]
    pub event_id: String,
    #[pyo3(get)]
    pub user_id: Option<String>,
    #[pyo3(get)]
    pub ts: String,
    #[pyo3(get)]
    pub event_type: String,
    #[pyo3(get)]
    pub product_id: Option<String>,
    #[pyo3(get)]
    pub amount_eur: Option<f64>,
}

#[pymethods]
impl CanonicalEvent {
    /// Plain dict with the six canonical keys.
    fn to_dict<'py>(&self, py: Python<'py>) -> PyResult<Bound<'py, PyDict>> {
        let dict = PyDict::new_bound(py);
        dict.set_item("event_id", &self.event_id)?;
        dict.set_item("user_id", &self.user_id)?;
        dict.set_item("ts", &self.ts)?;
        dict.set_item("event_type", &self.event_type)?;
        dict.set_item("product_id", &self.product_id)?;
        dict.set_item("amount_eur", self.amount_eur)?;
        Ok(dict)
    }

    fn __repr__(&self) -> String {
        format!(
            "CanonicalEvent(event_id={:?}, ts={:?}, event_type={:?}, amount_eur={:?})",
            self.event_id, self.ts, self.event_type, self.amount_eur
        )
    }
}

impl From<RustCanonicalEvent> for CanonicalEvent {
    fn from(e: RustCanonicalEvent) -> Self {
        CanonicalEvent {
            event_id: e.event_id,
            user_id: e.user_id,
            ts: e.ts,
            event_type: e.event_type,
            product_id: e.product_id,
            amount_eur: e.amount_eur,
        }
    }
}

/// Counters from one normalization pass.
#[pyclass]
#[derive(Clone)]
pub struct NormalizationStats {
    #[pyo3(get)]
    pub total_records: u64,
    #[pyo3(get)]
    pub kept_records: u64,
    #[pyo3(get)]
    pub dropped_missing_id: u64,
    #[pyo3(get)]
    pub dropped_missing_ts: u64,
    #[pyo3(get)]
    pub converted_amounts: u64,
    #[pyo3(get)]
    pub base_amounts: u64,
}

#[pymethods]
impl NormalizationStats {
    #[getter]
    fn dropped(&self) -> u64 {
        self.dropped_missing_id + self.dropped_missing_ts
    }

    fn __repr__(&self) -> String {
        format!(
            "NormalizationStats(total={}, kept={}, dropped={})",
            self.total_records,
            self.kept_records,
            self.dropped()
        )
    }
}

impl From<RustNormalizationStats> for NormalizationStats {
    fn from(s: RustNormalizationStats) -> Self {
        NormalizationStats {
            total_records: s.total_records,
            kept_records: s.kept_records,
            dropped_missing_id: s.dropped_missing_id,
            dropped_missing_ts: s.dropped_missing_ts,
            converted_amounts: s.converted_amounts,
            base_amounts: s.base_amounts,
        }
    }
}

// ============================================================================
// Normalizer
// ============================================================================

/// Normalizer bound to a currency rate table.
#[pyclass(name = "Normalizer")]
pub struct PyNormalizer {
    inner: Normalizer,
}

#[pymethods]
impl PyNormalizer {
    /// Create a normalizer. Without `rates` the EUR/USD/GBP reference table is used.
    #[new]
    #[pyo3(signature = (rates=None, base_currency="EUR"))]
    fn new(rates: Option<HashMap<String, f64>>, base_currency: &str) -> PyResult<Self> {
        Ok(PyNormalizer {
            inner: Normalizer::new(fx_from_py(rates, base_currency)?),
        })
    }

    /// Normalize an iterable of record dicts.
    fn normalize(&self, records: &Bound<'_, PyAny>) -> PyResult<Vec<CanonicalEvent>> {
        let records = records_from_py(records)?;
        let events = self.inner.normalize(&records).map_err(to_py_err)?;
        Ok(events.into_iter().map(Into::into).collect())
    }

    /// Normalize and also return the pass statistics.
    fn normalize_with_stats(
        &self,
        records: &Bound<'_, PyAny>,
    ) -> PyResult<(Vec<CanonicalEvent>, NormalizationStats)> {
        let records = records_from_py(records)?;
        let report = self.inner.normalize_with_stats(&records).map_err(to_py_err)?;
        Ok((
            report.events.into_iter().map(Into::into).collect(),
            report.stats.into(),
        ))
    }

    /// Normalize a JSON array string, returning a JSON array string.
    fn normalize_json(&self, json: &str) -> PyResult<String> {
        let events = self.inner.normalize_json(json).map_err(to_py_err)?;
        serde_json::to_string(&events).map_err(|e| to_py_err(e.into()))
    }

    /// Rate table as a dict.
    #[getter]
    fn rates(&self) -> HashMap<String, f64> {
        self.inner
            .fx()
            .rates
            .iter()
            .map(|(code, rate)| (code.clone(), *rate))
            .collect()
    }

    #[getter]
    fn base_currency(&self) -> String {
        self.inner.fx().base_currency.clone()
    }
}

/// Normalize a list of record dicts into a list of canonical dicts.
#[pyfunction]
#[pyo3(signature = (records, rates=None, base_currency="EUR"))]
fn normalize_events<'py>(
    py: Python<'py>,
    records: &Bound<'py, PyAny>,
    rates: Option<HashMap<String, f64>>,
    base_currency: &str,
) -> PyResult<Vec<Bound<'py, PyDict>>> {
    let normalizer = Normalizer::new(fx_from_py(rates, base_currency)?);
    let records = records_from_py(records)?;
    let events = normalizer.normalize(&records).map_err(to_py_err)?;

    events
        .into_iter()
        .map(|e| CanonicalEvent::from(e).to_dict(py))
        .collect()
}

/// Install a `tracing` subscriber printing normalizer logs to stderr.
#[pyfunction]
#[pyo3(signature = (filter="event_ingestion=info"))]
fn init_logging(filter: &str) -> PyResult<()> {
    let filter = EnvFilter::try_new(filter).map_err(|e| PyValueError::new_err(e.to_string()))?;
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init()
        .map_err(|e| PyRuntimeError::new_err(e.to_string()))
}

// ============================================================================
// Module Definition
// ============================================================================

/// Event Normalizer - canonical event records for Python.
#[pymodule]
fn event_normalizer(m: &Bound<'_, PyModule>) -> PyResult<()> {
    // Types
    m.add_class::<CanonicalEvent>()?;
    m.add_class::<NormalizationStats>()?;

    // Engine classes
    m.add_class::<PyNormalizer>()?;

    // Functions
    m.add_function(wrap_pyfunction!(normalize_events, m)?)?;
    m.add_function(wrap_pyfunction!(init_logging, m)?)?;

    Ok(())
}
