use std::collections::BTreeMap;

use polars::prelude::*;
use serde::{Deserialize, Serialize};

use crate::error::DashResult;
use crate::normalize::{coerce_numeric_columns, normalize_fuel};
use crate::schema::sales;

/// Which way an amount crosses the exchange rate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// Multiply by the rate (transaction currency to meticais).
    ToLocal,
    /// Divide by the rate (transaction currency to dollars).
    ToHard,
}

/// Convert `amount` with a per-record exchange `rate`.
///
/// A rate that is not a positive finite number converts to 0.
pub fn convert_currency(amount: f64, rate: f64, direction: Direction) -> f64 {
    if !(rate.is_finite() && rate > 0.0) {
        return 0.0;
    }
    match direction {
        Direction::ToLocal => amount * rate,
        Direction::ToHard => amount / rate,
    }
}

/// Add `<field>_MT` and `<field>_USD` next to every monetary field present.
///
/// Monetary fields and the rate are cleaned to Float64 first. Without a rate
/// column nothing is derived.
pub fn with_currency_columns(
    df: DataFrame,
    fields: &[&str],
    rate_column: &str,
) -> DashResult<DataFrame> {
    let present: Vec<&str> = fields
        .iter()
        .copied()
        .filter(|f| df.column(f).is_ok())
        .collect();
    if present.is_empty() {
        return Ok(df);
    }
    if df.column(rate_column).is_err() {
        tracing::warn!(rate_column, "exchange rate column missing, currency columns not derived");
        return Ok(df);
    }

    let mut numeric = present.clone();
    numeric.push(rate_column);
    let df = coerce_numeric_columns(df, &numeric)?;

    let valid_rate = col(rate_column).gt(lit(0.0));
    let mut exprs = Vec::with_capacity(present.len() * 2);
    for field in &present {
        exprs.push(
            when(valid_rate.clone())
                .then(col(*field) * col(rate_column))
                .otherwise(lit(0.0))
                .alias(format!("{field}{}", sales::LOCAL_SUFFIX)),
        );
        exprs.push(
            when(valid_rate.clone())
                .then(col(*field) / col(rate_column))
                .otherwise(lit(0.0))
                .alias(format!("{field}{}", sales::HARD_SUFFIX)),
        );
    }

    Ok(df.lazy().with_columns(exprs).collect()?)
}

/// Density (tonnes per cubic metre) per canonical fuel name.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FuelDensities(BTreeMap<String, f64>);

impl Default for FuelDensities {
    fn default() -> Self {
        let mut map = BTreeMap::new();
        map.insert("Gasolina".to_string(), 0.73);
        map.insert("Jet A1".to_string(), 0.79);
        map.insert("Gasóleo".to_string(), 0.84);
        map.insert("Diesel".to_string(), 0.84);
        Self(map)
    }
}

impl FuelDensities {
    pub fn new(map: BTreeMap<String, f64>) -> Self {
        Self(map)
    }

    /// Density for an arbitrary fuel spelling, if known and usable.
    pub fn density(&self, fuel: &str) -> Option<f64> {
        self.0
            .get(&normalize_fuel(fuel))
            .copied()
            .filter(|d| d.is_finite() && *d > 0.0)
    }
}

/// Tonnes to cubic metres for `fuel`. Zero mass, unknown fuel or an
/// unusable density all give 0.
pub fn mass_to_volume(mass: f64, fuel: &str, densities: &FuelDensities) -> f64 {
    if mass == 0.0 || !mass.is_finite() {
        return 0.0;
    }
    match densities.density(fuel) {
        Some(d) => mass / d,
        None => 0.0,
    }
}
