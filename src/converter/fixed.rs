//! In-process rate table.
//!
//! Used by the `fixed` converter kind and by tests that need a deterministic
//! or deliberately failing rate source.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use rust_decimal::Decimal;
use tracing::debug;

use super::{apply_rate, checked_rate, ConversionError, CurrencyConverter};
use crate::account::CurrencyCode;
use crate::money::Money;

#[derive(Debug, Default)]
pub struct FixedRateConverter {
    rates: HashMap<(String, String), Decimal>,
    failure: Option<String>,
    calls: AtomicUsize,
}

impl FixedRateConverter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Converter whose every call fails, simulating an unreachable provider.
    pub fn failing(reason: impl Into<String>) -> Self {
        Self {
            failure: Some(reason.into()),
            ..Self::default()
        }
    }

    pub fn with_rate(mut self, from: &str, to: &str, rate: Decimal) -> Self {
        self.rates.insert((from.to_string(), to.to_string()), rate);
        self
    }

    /// Build from a config table keyed `FROM_TO`, e.g. `USD_EUR: 0.90`.
    pub fn from_table(table: &HashMap<String, Decimal>) -> Result<Self, ConversionError> {
        let mut converter = Self::new();
        for (pair, rate) in table {
            let (from, to) = pair
                .split_once('_')
                .and_then(|(f, t)| {
                    Some((CurrencyCode::new(f).ok()?, CurrencyCode::new(t).ok()?))
                })
                .ok_or_else(|| {
                    ConversionError::Malformed(format!(
                        "rate key '{}' must look like USD_EUR",
                        pair
                    ))
                })?;
            converter
                .rates
                .insert((from.into_string(), to.into_string()), *rate);
        }
        Ok(converter)
    }

    /// Number of `convert` calls served so far, failed ones included.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CurrencyConverter for FixedRateConverter {
    async fn convert(
        &self,
        from: &CurrencyCode,
        to: &CurrencyCode,
        amount: Money,
    ) -> Result<Money, ConversionError> {
        self.calls.fetch_add(1, Ordering::SeqCst);

        if let Some(reason) = &self.failure {
            return Err(ConversionError::Unavailable(reason.clone()));
        }
        if from == to {
            return Ok(amount);
        }

        let rate = self
            .rates
            .get(&(from.to_string(), to.to_string()))
            .copied();
        let rate = checked_rate(from, to, rate)?;
        debug!(from = %from, to = %to, rate = %rate, "Fixed rate applied");
        apply_rate(from, to, amount, rate)
    }
}
