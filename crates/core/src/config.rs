//! Configuration structures for the event normalizer.

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Main configuration for the normalizer.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Currency conversion configuration.
    #[serde(default)]
    pub fx: FxConfig,
}

impl Config {
    /// Parse and validate a configuration from a JSON document.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: Config = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Load and validate a configuration from a JSON file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_json_str(&contents)
    }

    /// Validate all sections.
    pub fn validate(&self) -> Result<()> {
        self.fx.validate()
    }
}

/// Static currency-to-base rate table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FxConfig {
    /// Currency every amount is normalized into (e.g., "EUR").
    pub base_currency: String,
    /// Multiplier converting one unit of a currency into the base currency.
    /// Keys are matched exactly (case-sensitive).
    pub rates: BTreeMap<String, f64>,
}

impl Default for FxConfig {
    fn default() -> Self {
        let rates = [("EUR", 1.0), ("USD", 0.9), ("GBP", 1.15)]
            .into_iter()
            .map(|(code, rate)| (code.to_string(), rate))
            .collect();

        Self {
            base_currency: "EUR".to_string(),
            rates,
        }
    }
}

impl FxConfig {
    /// Create a table from a base currency and (code, rate) pairs.
    pub fn new<I, S>(base_currency: impl Into<String>, rates: I) -> Self
    where
        I: IntoIterator<Item = (S, f64)>,
        S: Into<String>,
    {
        Self {
            base_currency: base_currency.into(),
            rates: rates.into_iter().map(|(c, r)| (c.into(), r)).collect(),
        }
    }

    /// Look up the rate for a currency code.
    #[inline]
    pub fn rate(&self, currency: &str) -> Option<f64> {
        self.rates.get(currency).copied()
    }

    /// Check that the table can be used for conversion.
    pub fn validate(&self) -> Result<()> {
        for (code, rate) in &self.rates {
            if !rate.is_finite() || *rate <= 0.0 {
                return Err(Error::config(format!(
                    "rate for {code} must be a positive finite number, got {rate}"
                )));
            }
        }

        match self.rate(&self.base_currency) {
            Some(rate) if rate == 1.0 => Ok(()),
            Some(rate) => Err(Error::config(format!(
                "base currency {} must have rate 1.0, got {rate}",
                self.base_currency
            ))),
            None => Err(Error::config(format!(
                "base currency {} is missing from the rate table",
                self.base_currency
            ))),
        }
    }
}
