//! Download helpers: semicolon CSV with decimal commas and single-sheet xlsx.

use std::io::Write;
use std::path::Path;

use chrono::NaiveDateTime;
use polars::prelude::*;
use rust_xlsxwriter::Workbook;
use tracing::info;

use crate::error::{DashError, DashResult};

pub const SHEET_NAME: &str = "Dados";

/// `<description>_<YYYYmmdd_HHMM>.<ext>`
pub fn export_file_name(description: &str, ext: &str, now: NaiveDateTime) -> String {
    format!("{}_{}.{}", description, now.format("%Y%m%d_%H%M"), ext)
}

fn ensure_rows(df: &DataFrame) -> DashResult<()> {
    if df.height() == 0 {
        return Err(DashError::InvalidData("nothing to export".into()));
    }
    Ok(())
}

/// CSV with `;` separators, `,` decimals and a header row.
pub fn write_csv<W: Write>(df: &DataFrame, writer: W) -> DashResult<()> {
    ensure_rows(df)?;
    let mut df = df.clone();
    CsvWriter::new(writer)
        .include_header(true)
        .with_separator(b';')
        .with_decimal_comma(true)
        .finish(&mut df)?;
    Ok(())
}

/// Single `Dados` sheet workbook.
pub fn write_xlsx(df: &DataFrame, path: &Path) -> DashResult<()> {
    write_xlsx_sheets(&[(SHEET_NAME, df)], path)
}

/// One sheet per frame, in order. Numeric columns are written as numbers,
/// everything else as text; nulls are left blank.
#[tracing::instrument(skip(sheets), fields(path = %path.display(), sheets = sheets.len()))]
pub fn write_xlsx_sheets(sheets: &[(&str, &DataFrame)], path: &Path) -> DashResult<()> {
    if sheets.is_empty() {
        return Err(DashError::InvalidData("no sheets to export".into()));
    }

    let mut workbook = Workbook::new();
    for (name, df) in sheets {
        ensure_rows(df)?;
        let worksheet = workbook.add_worksheet();
        worksheet.set_name(*name)?;

        for (idx, column) in df.get_columns().iter().enumerate() {
            let col = u16::try_from(idx)
                .map_err(|_| DashError::InvalidData(format!("too many columns in sheet {name}")))?;
            worksheet.write_string(0, col, column.name().as_str())?;

            let series = column.as_materialized_series();
            if series.dtype().is_float() || series.dtype().is_integer() {
                let values = series.cast(&DataType::Float64)?;
                for (row, value) in values.f64()?.into_iter().enumerate() {
                    if let Some(v) = value {
                        worksheet.write_number(sheet_row(row)?, col, v)?;
                    }
                }
            } else {
                let values = series.cast(&DataType::String)?;
                for (row, value) in values.str()?.into_iter().enumerate() {
                    if let Some(v) = value {
                        worksheet.write_string(sheet_row(row)?, col, v)?;
                    }
                }
            }
        }
    }

    workbook.save(path)?;
    info!("workbook written");
    Ok(())
}

// Row 0 holds the header.
fn sheet_row(row: usize) -> DashResult<u32> {
    u32::try_from(row + 1).map_err(|_| DashError::InvalidData("too many rows for a sheet".into()))
}
