use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::convert::FuelDensities;
use crate::error::{DashError, DashResult};

/// Variance-percentage thresholds splitting a row into the four status bands.
///
/// A row is `Excess` at or above `excess`, `OnPlan` at or above `on_plan`,
/// `Attention` at or above `attention` and `Critical` below that.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StatusBands {
    pub excess: f64,
    pub on_plan: f64,
    pub attention: f64,
}

impl StatusBands {
    /// Thresholds used for the individual business lines.
    pub const LINE: StatusBands = StatusBands {
        excess: 10.0,
        on_plan: -5.0,
        attention: -15.0,
    };

    /// Thresholds used for the grand-total row.
    pub const TOTAL: StatusBands = StatusBands {
        excess: 5.0,
        on_plan: -5.0,
        attention: -10.0,
    };
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DashboardConfig {
    /// Directory the source spreadsheets are resolved against.
    pub base_path: PathBuf,
    pub sales_files: Vec<String>,
    pub plan_files: Vec<String>,
    pub lookup_file: String,
    pub import_file: String,
    pub densities: FuelDensities,
    pub competitors: Vec<String>,
    pub port_order: Vec<String>,
    pub business_lines: Vec<String>,
    pub cache_ttl_secs: u64,
    pub default_range_start: NaiveDate,
    pub line_bands: StatusBands,
    pub total_bands: StatusBands,
    pub filter_value_limit: usize,
}

impl Default for DashboardConfig {
    fn default() -> Self {
        Self {
            base_path: PathBuf::from("."),
            sales_files: strings(&[
                "Vds_2023_Comb_.xlsx",
                "Vds_2024_Comb_.xlsx",
                "Vds_2025_Comb_.xlsx",
            ]),
            plan_files: strings(&[
                "PlanComb_2023.xlsx",
                "PlanComb_2024.xlsx",
                "PlanComb_2025.xlsx",
            ]),
            lookup_file: "v_loock_up.xlsx".to_string(),
            import_file: "ImportacaoMZ.xlsx".to_string(),
            densities: FuelDensities::default(),
            competitors: strings(&[
                "AFR PETR", "B ENERGY", "BP", "CAC", "CAMEL", "DALBIT", "ENER", "EXOR",
                "GLENCORE", "GTS", "IPM", "I2A", "LAKE OIL", "LIBERTY", "MCCI", "MITRA",
                "MOUMERU", "MOZTOP", "NGUVU L", "PETRODA", "PETROGAL", "PESS", "PUMA",
                "RUR", "TOP ENERGY", "TOTAL", "UNION", "VIVO",
            ]),
            port_order: strings(&["Maputo", "Beira", "Nacala", "Pemba"]),
            business_lines: strings(&[
                "Vulcan",
                "Consumidores",
                "Revendedores",
                "Bunkers",
                "Aviacao",
                "Reexportacao",
                "Armazenagem",
            ]),
            cache_ttl_secs: 3600,
            default_range_start: NaiveDate::from_ymd_opt(2025, 1, 1).unwrap_or_default(),
            line_bands: StatusBands::LINE,
            total_bands: StatusBands::TOTAL,
            filter_value_limit: 100,
        }
    }
}

impl DashboardConfig {
    /// Defaults rooted at `base_path`.
    pub fn with_base_path(base_path: impl Into<PathBuf>) -> Self {
        Self {
            base_path: base_path.into(),
            ..Self::default()
        }
    }

    /// Parse a JSON override document; absent keys keep their defaults.
    pub fn from_json_str(json: &str) -> DashResult<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> DashResult<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)?;
        let config = Self::from_json_str(&text)?;
        config.validate()?;
        tracing::info!(path = %path.display(), "dashboard config loaded");
        Ok(config)
    }

    /// Reject configurations the aggregations cannot work with.
    pub fn validate(&self) -> DashResult<()> {
        for (name, bands) in [("line_bands", &self.line_bands), ("total_bands", &self.total_bands)] {
            if !(bands.excess >= bands.on_plan && bands.on_plan >= bands.attention) {
                return Err(DashError::Validation(format!(
                    "{name} thresholds must be descending (excess >= on_plan >= attention)"
                )));
            }
        }
        if self.cache_ttl_secs == 0 {
            return Err(DashError::Validation("cache_ttl_secs must be positive".into()));
        }
        Ok(())
    }

    pub fn resolve(&self, file: &str) -> PathBuf {
        self.base_path.join(file)
    }
}

fn strings(values: &[&str]) -> Vec<String> {
    values.iter().map(|s| s.to_string()).collect()
}
