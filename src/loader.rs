//! Source loading. Every table comes back with all columns as strings and is
//! typed afterwards by the normalize helpers.

use std::path::Path;

use calamine::{open_workbook_auto, Data, DataType as _, Range, Reader};
use polars::prelude::*;
use tracing::{error, info, warn};

use crate::config::DashboardConfig;
use crate::convert::with_currency_columns;
use crate::error::{DashError, DashResult, EmptyReason, Outcome};
use crate::normalize::{coerce_numeric_columns, parse_date_column};
use crate::schema::{import, lookup, plan, sales};

// ── Raw readers ─────────────────────────────────────────────────────────────

/// Read the first sheet of a workbook, or a CSV file.
pub fn read_table(path: &Path) -> DashResult<DataFrame> {
    read_sheet(path, 0)
}

/// Read sheet `index` of a workbook. CSV files only have sheet 0.
pub fn read_sheet(path: &Path, index: usize) -> DashResult<DataFrame> {
    if is_csv(path) {
        if index != 0 {
            return Err(DashError::InvalidData(format!(
                "{}: csv sources have a single sheet, #{index} requested",
                path.display()
            )));
        }
        return read_csv_as_strings(path);
    }
    let mut workbook = open_workbook_auto(path)?;
    let names = workbook.sheet_names().to_vec();
    let name = names.get(index).ok_or_else(|| {
        DashError::InvalidData(format!(
            "{}: no sheet #{index} ({} sheets)",
            path.display(),
            names.len()
        ))
    })?;
    let range = workbook.worksheet_range(name)?;
    range_to_frame(&range)
}

fn is_csv(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| e.eq_ignore_ascii_case("csv"))
        .unwrap_or(false)
}

/// Read a CSV file with all columns as String dtype and trimmed header names.
fn read_csv_as_strings(path: &Path) -> DashResult<DataFrame> {
    let mut df = CsvReadOptions::default()
        .with_has_header(true)
        .with_infer_schema_length(Some(0)) // all columns as String
        .try_into_reader_with_file_path(Some(path.to_path_buf()))?
        .finish()?;

    let trimmed: Vec<String> = df
        .get_column_names_str()
        .iter()
        .map(|c| c.trim().to_string())
        .collect();
    df.set_column_names(trimmed.as_slice())?;
    Ok(df)
}

/// Render a spreadsheet cell as text. Typed dates become ISO strings so the
/// date parsers see one layout regardless of how the sheet stored them.
pub fn cell_to_string(cell: &Data) -> Option<String> {
    let text = match cell {
        Data::Empty => return None,
        Data::String(v) => v.trim().to_string(),
        Data::Float(v) => v.to_string(),
        Data::Int(v) => v.to_string(),
        Data::Bool(v) => v.to_string(),
        Data::DateTime(_) => match cell.as_datetime() {
            Some(dt) if dt.time() == chrono::NaiveTime::MIN => dt.format("%Y-%m-%d").to_string(),
            Some(dt) => dt.format("%Y-%m-%d %H:%M:%S").to_string(),
            None => return None,
        },
        Data::DateTimeIso(v) => v.to_string(),
        Data::DurationIso(v) => v.to_string(),
        Data::Error(_) => return None,
    };
    if text.is_empty() {
        None
    } else {
        Some(text)
    }
}

/// First row is the header; fully blank rows are skipped.
fn range_to_frame(range: &Range<Data>) -> DashResult<DataFrame> {
    let mut rows = range.rows();
    let Some(header_row) = rows.next() else {
        return Ok(DataFrame::empty());
    };

    let headers = unique_headers(header_row);
    let mut cells: Vec<Vec<Option<String>>> = vec![Vec::new(); headers.len()];

    for row in rows {
        let values: Vec<Option<String>> = (0..headers.len())
            .map(|i| row.get(i).and_then(cell_to_string))
            .collect();
        if values.iter().all(Option::is_none) {
            continue;
        }
        for (column, value) in cells.iter_mut().zip(values) {
            column.push(value);
        }
    }

    let columns: Vec<Column> = headers
        .iter()
        .zip(cells)
        .map(|(name, values)| Series::new(name.as_str().into(), values).into())
        .collect();
    Ok(DataFrame::new(columns)?)
}

/// Trimmed header names; blanks get positional names and repeats a suffix.
fn unique_headers(row: &[Data]) -> Vec<String> {
    let mut seen: Vec<String> = Vec::with_capacity(row.len());
    for (i, cell) in row.iter().enumerate() {
        let base = cell_to_string(cell).unwrap_or_else(|| format!("column_{i}"));
        let mut name = base.clone();
        let mut n = 1;
        while seen.contains(&name) {
            name = format!("{base}_{n}");
            n += 1;
        }
        seen.push(name);
    }
    seen
}

// ── Dataset loaders ─────────────────────────────────────────────────────────

/// Read and concatenate `files` (resolved against `base`) in listed order.
///
/// Missing, unreadable and empty files are logged and skipped. Columns are
/// unioned across files; cells a file lacks are null.
#[tracing::instrument(skip(base, files))]
pub fn load_dataset(base: &Path, files: &[String], kind: &str) -> DashResult<Outcome<DataFrame>> {
    let mut frames = Vec::new();
    let mut found = 0usize;

    for file in files {
        let path = base.join(file);
        if !path.exists() {
            warn!(file = %path.display(), "source file not found");
            continue;
        }
        found += 1;
        match read_table(&path) {
            Ok(df) if df.height() == 0 => warn!(file = %path.display(), "source file is empty"),
            Ok(df) => {
                info!(file = %path.display(), rows = df.height(), "source file loaded");
                frames.push(df);
            }
            Err(e) => error!(file = %path.display(), error = %e, "failed to read source file"),
        }
    }

    if frames.is_empty() {
        let reason = if found == 0 {
            EmptyReason::NoSourceFiles
        } else {
            EmptyReason::SourcesEmpty
        };
        warn!(%reason, "dataset {kind} has no data");
        return Ok(Outcome::Empty(reason));
    }

    let df = concat_frames(frames)?;
    info!(rows = df.height(), "dataset {kind} consolidated");
    Ok(Outcome::Ready(df))
}

fn concat_frames(mut frames: Vec<DataFrame>) -> DashResult<DataFrame> {
    if frames.len() == 1 {
        return Ok(frames.remove(0));
    }
    let lazy: Vec<LazyFrame> = frames.into_iter().map(|df| df.lazy()).collect();
    Ok(concat_lf_diagonal(lazy, UnionArgs::default())?.collect()?)
}

/// Which expected columns a dataset lacks.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SchemaReport {
    pub dataset: String,
    pub rows: usize,
    pub missing: Vec<String>,
}

impl SchemaReport {
    /// Check `df` for `required` columns, logging the result. Never fails.
    pub fn check(df: &DataFrame, required: &[&str], dataset: &str) -> Self {
        let missing: Vec<String> = required
            .iter()
            .filter(|c| df.column(c).is_err())
            .map(|c| c.to_string())
            .collect();
        if df.height() == 0 {
            warn!(dataset, "dataset is empty");
        } else if !missing.is_empty() {
            warn!(dataset, ?missing, "dataset is missing expected columns");
        } else {
            info!(dataset, rows = df.height(), "dataset validated");
        }
        Self {
            dataset: dataset.to_string(),
            rows: df.height(),
            missing,
        }
    }

    pub fn is_valid(&self) -> bool {
        self.rows > 0 && self.missing.is_empty()
    }
}

/// Sales files with currency columns, typed invoice date, `Ano` and `Mes`.
#[tracing::instrument(skip(config))]
pub fn load_sales(config: &DashboardConfig) -> DashResult<Outcome<DataFrame>> {
    load_dataset(&config.base_path, &config.sales_files, "sales")?.and_then(|df| {
        let df = prepare_sales(df)?;
        SchemaReport::check(&df, &sales::REQUIRED, "sales");
        Ok(Outcome::Ready(df))
    })
}

/// Type a raw sales frame.
pub fn prepare_sales(df: DataFrame) -> DashResult<DataFrame> {
    let df = with_currency_columns(df, &sales::MONETARY, sales::RATE)?;
    let mut numeric = vec![sales::QUANTITY];
    numeric.extend(sales::REALIZED_CANDIDATES);
    let df = coerce_numeric_columns(df, &numeric)?;
    let df = parse_date_column(df, sales::INVOICE_DATE, None)?;

    if df.column(sales::INVOICE_DATE).is_err() {
        return Ok(df);
    }
    Ok(df
        .lazy()
        .with_columns([
            col(sales::INVOICE_DATE)
                .dt()
                .year()
                .cast(DataType::Int32)
                .fill_null(lit(0))
                .alias(sales::YEAR),
            col(sales::INVOICE_DATE)
                .dt()
                .month()
                .cast(DataType::Int32)
                .fill_null(lit(0))
                .alias(sales::MONTH),
        ])
        .collect()?)
}

/// Plan files with the invoice date parsed as `dd/mm/yyyy`.
#[tracing::instrument(skip(config))]
pub fn load_plan(config: &DashboardConfig) -> DashResult<Outcome<DataFrame>> {
    load_dataset(&config.base_path, &config.plan_files, "plan")?
        .and_then(|df| Ok(Outcome::Ready(prepare_plan(df)?)))
}

pub fn prepare_plan(df: DataFrame) -> DashResult<DataFrame> {
    let df = parse_date_column(df, sales::INVOICE_DATE, Some(plan::DATE_FORMAT))?;
    coerce_numeric_columns(df, &plan::PLANNED_CANDIDATES)
}

/// Import workbook with `NOR` / `Data_Descarga` parsed as dates and
/// `Ano` / `Mes` derived from them when absent.
#[tracing::instrument(skip(config))]
pub fn load_imports(config: &DashboardConfig) -> DashResult<Outcome<DataFrame>> {
    let files = [config.import_file.clone()];
    load_dataset(&config.base_path, &files, "import")?
        .and_then(|df| Ok(Outcome::Ready(prepare_imports(df)?)))
}

pub fn prepare_imports(df: DataFrame) -> DashResult<DataFrame> {
    let mut df = df;
    for column in import::DATE_COLUMNS {
        df = parse_date_column(df, column, None)?;
    }

    let Some(date_col) = import::DATE_COLUMNS
        .iter()
        .copied()
        .find(|c| matches!(df.column(c), Ok(c) if c.dtype() == &DataType::Date))
    else {
        return Ok(df);
    };
    let mut derived = Vec::new();
    if df.column(sales::YEAR).is_err() {
        derived.push(col(date_col).dt().year().cast(DataType::Int32).alias(sales::YEAR));
    }
    if df.column(sales::MONTH).is_err() {
        derived.push(col(date_col).dt().month().cast(DataType::Int32).alias(sales::MONTH));
    }
    if derived.is_empty() {
        return Ok(df);
    }
    Ok(df.lazy().with_columns(derived).collect()?)
}

/// The six lookup sheets, by the key each one joins on.
#[derive(Debug, Clone, Default)]
pub struct LookupTables {
    /// Sheet 0, keyed by issuer; carries the customer creation date.
    pub customer: DataFrame,
    /// Sheet 1, keyed by destination.
    pub destination: DataFrame,
    /// Sheet 2, loaded for completeness; no join uses it.
    pub auxiliary: DataFrame,
    /// Sheet 3, keyed by the sector/customer code.
    pub sector: DataFrame,
    /// Sheet 4, keyed by document type.
    pub doc_type: DataFrame,
    /// Sheet 5, keyed by material.
    pub material: DataFrame,
}

impl LookupTables {
    pub fn from_sheets(mut sheets: Vec<DataFrame>) -> Self {
        sheets.resize_with(lookup::SHEET_COUNT, DataFrame::empty);
        let mut it = sheets.into_iter();
        let mut next = || it.next().unwrap_or_default();
        Self {
            customer: next(),
            destination: next(),
            auxiliary: next(),
            sector: next(),
            doc_type: next(),
            material: next(),
        }
    }

    pub fn all(&self) -> [&DataFrame; lookup::SHEET_COUNT] {
        [
            &self.customer,
            &self.destination,
            &self.auxiliary,
            &self.sector,
            &self.doc_type,
            &self.material,
        ]
    }

    pub fn is_empty(&self) -> bool {
        self.all().iter().all(|df| df.height() == 0)
    }
}

/// Load the six lookup sheets.
///
/// A sheet that cannot be read is logged and left empty; the other sheets
/// are still returned. A missing workbook is `Empty`, an unopenable one is
/// an error.
#[tracing::instrument(skip(config))]
pub fn load_lookup_tables(config: &DashboardConfig) -> DashResult<Outcome<LookupTables>> {
    let path = config.resolve(&config.lookup_file);
    if !path.exists() {
        warn!(file = %path.display(), "lookup workbook not found");
        return Ok(Outcome::Empty(EmptyReason::NoSourceFiles));
    }

    let sheets: Vec<DataFrame> = if is_csv(&path) {
        vec![read_csv_as_strings(&path)?]
    } else {
        let mut workbook = open_workbook_auto(&path)?;
        let names = workbook.sheet_names().to_vec();
        (0..lookup::SHEET_COUNT)
            .map(|i| {
                let sheet = names
                    .get(i)
                    .ok_or_else(|| DashError::InvalidData(format!("no sheet #{i}")))
                    .and_then(|name| Ok(workbook.worksheet_range(name)?))
                    .and_then(|range| range_to_frame(&range));
                match sheet {
                    Ok(df) => df,
                    Err(e) => {
                        warn!(sheet = i, error = %e, "lookup sheet unreadable, using empty table");
                        DataFrame::empty()
                    }
                }
            })
            .collect()
    };

    let mut tables = LookupTables::from_sheets(sheets);
    tables.customer = parse_date_column(
        tables.customer,
        lookup::CUSTOMER_CREATED,
        Some(lookup::CUSTOMER_CREATED_FORMAT),
    )?;

    if tables.is_empty() {
        return Ok(Outcome::Empty(EmptyReason::SourcesEmpty));
    }
    info!(
        rows = ?tables.all().map(|df| df.height()),
        "lookup tables loaded"
    );
    Ok(Outcome::Ready(tables))
}
