//! Field normalization: dates, numbers and fuel names as they arrive from
//! hand-maintained spreadsheets. Nothing in here fails; malformed input
//! degrades to `None` / `0.0`.

use chrono::{Duration, NaiveDate, NaiveDateTime};
use polars::prelude::*;

use crate::error::DashResult;

/// Formats tried, in order, by [`parse_date`].
const DATE_FORMATS: [&str; 5] = ["%Y-%m-%d", "%d/%m/%Y", "%d-%m-%Y", "%Y/%m/%d", "%d.%m.%Y"];

const DATETIME_FORMATS: [&str; 4] = [
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M:%S",
    "%d/%m/%Y %H:%M:%S",
    "%Y-%m-%d %H:%M:%S%.f",
];

/// Spreadsheet serial dates count days from this epoch.
const SERIAL_EPOCH: (i32, u32, u32) = (1899, 12, 30);

// Serial numbers below this are more likely years or codes than dates.
const SERIAL_MIN: f64 = 10_000.0;
const SERIAL_MAX: f64 = 2_958_465.0;

/// Parse a date in any of the accepted layouts.
pub fn parse_date(raw: &str) -> Option<NaiveDate> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    for format in DATE_FORMATS {
        if let Ok(d) = NaiveDate::parse_from_str(raw, format) {
            return Some(d);
        }
    }
    for format in DATETIME_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(raw, format) {
            return Some(dt.date());
        }
    }
    parse_serial(raw)
}

/// Parse with one explicit format.
///
/// Typed date cells are rendered as ISO text by the loader, so the ISO
/// layouts are still accepted after `format` fails.
pub fn parse_date_with(raw: &str, format: &str) -> Option<NaiveDate> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    NaiveDate::parse_from_str(raw, format)
        .ok()
        .or_else(|| NaiveDateTime::parse_from_str(raw, format).ok().map(|dt| dt.date()))
        .or_else(|| NaiveDate::parse_from_str(raw, "%Y-%m-%d").ok())
        .or_else(|| {
            NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S")
                .ok()
                .map(|dt| dt.date())
        })
}

fn parse_serial(raw: &str) -> Option<NaiveDate> {
    let serial: f64 = raw.parse().ok()?;
    if !(SERIAL_MIN..=SERIAL_MAX).contains(&serial) {
        return None;
    }
    let (y, m, d) = SERIAL_EPOCH;
    NaiveDate::from_ymd_opt(y, m, d)?.checked_add_signed(Duration::days(serial.trunc() as i64))
}

/// Clean a numeric string into an `f64`.
///
/// Whitespace is removed, a decimal comma becomes a dot and anything outside
/// digits, sign and dot is dropped. Empty, dot-only or still unparsable
/// results are 0.
pub fn clean_numeric(raw: &str) -> f64 {
    let cleaned: String = raw
        .trim()
        .chars()
        .filter(|c| !c.is_whitespace())
        .map(|c| if c == ',' { '.' } else { c })
        .filter(|c| c.is_ascii_digit() || *c == '.' || *c == '-')
        .collect();
    if cleaned.is_empty() || cleaned == "." {
        return 0.0;
    }
    match cleaned.parse::<f64>() {
        Ok(v) if v.is_finite() => v,
        _ => 0.0,
    }
}

/// Canonical fuel name: trimmed, title-cased, synonyms folded.
pub fn normalize_fuel(raw: &str) -> String {
    let titled = title_case(raw.trim());
    match titled.to_lowercase().as_str() {
        "jet" | "jet a1" | "jet-a1" => "Jet A1".to_string(),
        "diesel" | "" => "Gasóleo".to_string(),
        _ => titled,
    }
}

/// Uppercase the first letter of every alphabetic run, lowercase the rest.
fn title_case(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut prev_alpha = false;
    for c in s.chars() {
        if c.is_alphabetic() {
            if prev_alpha {
                out.extend(c.to_lowercase());
            } else {
                out.extend(c.to_uppercase());
            }
            prev_alpha = true;
        } else {
            out.push(c);
            prev_alpha = false;
        }
    }
    out
}

// ── Column helpers ──────────────────────────────────────────────────────────

/// Re-type `column` as a Date column. Missing columns are left alone.
///
/// With `format` the strict single-format parse is used, otherwise every
/// layout [`parse_date`] knows. Unparseable cells become null.
pub fn parse_date_column(
    mut df: DataFrame,
    column: &str,
    format: Option<&str>,
) -> DashResult<DataFrame> {
    let parsed = match df.column(column) {
        Ok(c) => date_series(c.as_materialized_series(), format)?,
        Err(_) => return Ok(df),
    };
    df.with_column(parsed)?;
    Ok(df)
}

fn date_series(s: &Series, format: Option<&str>) -> DashResult<Series> {
    match s.dtype() {
        DataType::Date => Ok(s.clone()),
        DataType::Datetime(_, _) => Ok(s.cast(&DataType::Date)?),
        DataType::String => {
            let values: Vec<Option<NaiveDate>> = s
                .str()?
                .into_iter()
                .map(|v| {
                    v.and_then(|raw| match format {
                        Some(f) => parse_date_with(raw, f),
                        None => parse_date(raw),
                    })
                })
                .collect();
            Ok(Series::new(s.name().clone(), values))
        }
        _ => {
            let values: Vec<Option<NaiveDate>> = vec![None; s.len()];
            Ok(Series::new(s.name().clone(), values))
        }
    }
}

/// Dates of a Date column, or of a text column run through [`parse_date`].
pub fn date_values(s: &Series) -> DashResult<Vec<Option<NaiveDate>>> {
    match s.dtype() {
        DataType::Date => Ok(s.date()?.as_date_iter().collect()),
        DataType::String => Ok(s.str()?.into_iter().map(|v| v.and_then(parse_date)).collect()),
        _ => {
            let cast = s.cast(&DataType::String)?;
            Ok(cast.str()?.into_iter().map(|v| v.and_then(parse_date)).collect())
        }
    }
}

/// Re-type each present column as Float64 via [`clean_numeric`]; nulls become 0.
pub fn coerce_numeric_columns(mut df: DataFrame, columns: &[&str]) -> DashResult<DataFrame> {
    for &name in columns {
        let cleaned = match df.column(name) {
            Ok(c) => numeric_series(c.as_materialized_series())?,
            Err(_) => continue,
        };
        df.with_column(cleaned)?;
    }
    Ok(df)
}

/// Float64 copy of `s` with stray formatting removed.
pub fn numeric_series(s: &Series) -> DashResult<Series> {
    let values: Vec<f64> = match s.dtype() {
        DataType::String => s
            .str()?
            .into_iter()
            .map(|v| v.map(clean_numeric).unwrap_or(0.0))
            .collect(),
        _ => s
            .cast(&DataType::Float64)?
            .f64()?
            .into_iter()
            .map(|v| v.filter(|x| x.is_finite()).unwrap_or(0.0))
            .collect(),
    };
    Ok(Series::new(s.name().clone(), values))
}

/// Column sum after numeric cleanup; 0 for a missing column.
pub fn clean_sum(df: &DataFrame, column: &str) -> DashResult<f64> {
    match df.column(column) {
        Ok(c) => Ok(numeric_series(c.as_materialized_series())?
            .f64()?
            .into_no_null_iter()
            .sum()),
        Err(_) => Ok(0.0),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ymd(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn parses_common_layouts() {
        assert_eq!(parse_date("2025-03-15"), Some(ymd(2025, 3, 15)));
        assert_eq!(parse_date("15/03/2025"), Some(ymd(2025, 3, 15)));
        assert_eq!(parse_date("2025-03-15 08:30:00"), Some(ymd(2025, 3, 15)));
        assert_eq!(parse_date(" 15.03.2025 "), Some(ymd(2025, 3, 15)));
        assert_eq!(parse_date("45731"), Some(ymd(2025, 3, 15)));
    }

    #[test]
    fn garbage_dates_are_none() {
        assert_eq!(parse_date(""), None);
        assert_eq!(parse_date("n/a"), None);
        assert_eq!(parse_date("31/02/2025"), None);
        assert_eq!(parse_date("2025"), None);
    }

    #[test]
    fn strict_format_still_accepts_iso_cells() {
        assert_eq!(parse_date_with("01/02/2024", "%d/%m/%Y"), Some(ymd(2024, 2, 1)));
        assert_eq!(parse_date_with("2024-02-01", "%d/%m/%Y"), Some(ymd(2024, 2, 1)));
        assert_eq!(parse_date_with("02-01-2024", "%d/%m/%Y"), None);
    }

    #[test]
    fn numeric_cleanup() {
        assert_eq!(clean_numeric(" 1 234,5 "), 1234.5);
        assert_eq!(clean_numeric("-12.5 TM"), -12.5);
        assert_eq!(clean_numeric(""), 0.0);
        assert_eq!(clean_numeric("."), 0.0);
        assert_eq!(clean_numeric("nan"), 0.0);
        assert_eq!(clean_numeric("1.234,56"), 0.0);
    }

    #[test]
    fn fuel_synonyms() {
        assert_eq!(normalize_fuel("  jet "), "Jet A1");
        assert_eq!(normalize_fuel("JET-A1"), "Jet A1");
        assert_eq!(normalize_fuel("diesel"), "Gasóleo");
        assert_eq!(normalize_fuel(""), "Gasóleo");
        assert_eq!(normalize_fuel("GASOLINA"), "Gasolina");
        assert_eq!(normalize_fuel("gasóleo"), "Gasóleo");
        assert_eq!(normalize_fuel("fuel oil"), "Fuel Oil");
    }

    #[test]
    fn numeric_columns_are_coerced() {
        let df = df!(
            "q" => ["1,5", "", "x"],
            "n" => [Some(2.0), None, Some(3.0)],
        )
        .unwrap();
        let df = coerce_numeric_columns(df, &["q", "n", "absent"]).unwrap();
        let q: Vec<f64> = df.column("q").unwrap().f64().unwrap().into_no_null_iter().collect();
        let n: Vec<f64> = df.column("n").unwrap().f64().unwrap().into_no_null_iter().collect();
        assert_eq!(q, vec![1.5, 0.0, 0.0]);
        assert_eq!(n, vec![2.0, 0.0, 3.0]);
        assert_eq!(clean_sum(&df, "q").unwrap(), 1.5);
        assert_eq!(clean_sum(&df, "absent").unwrap(), 0.0);
    }

    #[test]
    fn date_column_nulls_bad_cells() {
        let df = df!("d" => ["15/03/2025", "bogus"]).unwrap();
        let df = parse_date_column(df, "d", Some("%d/%m/%Y")).unwrap();
        let col = df.column("d").unwrap();
        assert_eq!(col.dtype(), &DataType::Date);
        assert_eq!(col.null_count(), 1);
    }
}
