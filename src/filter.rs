//! User filter selections and the options offered for them.

use std::collections::{BTreeMap, BTreeSet};

use chrono::NaiveDate;
use polars::prelude::*;
use tracing::debug;

use crate::error::{DashResult, EmptyReason, Outcome};
use crate::normalize::{date_values, parse_date_column};
use crate::schema::{import, sales};

/// Columns a dataset is filtered on, declared up front.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FilterSchema {
    pub name: &'static str,
    /// Date columns in order of preference; the first present one is used.
    pub date_columns: &'static [&'static str],
    /// Categorical filter columns in display order.
    pub categorical: &'static [&'static str],
}

impl FilterSchema {
    pub const SALES: FilterSchema = FilterSchema {
        name: "sales",
        date_columns: &[sales::INVOICE_DATE],
        categorical: &[
            sales::YEAR,
            sales::FUEL,
            sales::BUSINESS_LINE,
            sales::PROMOTER,
            sales::INSTALLATION,
            sales::PROVINCE,
        ],
    };

    pub const IMPORT: FilterSchema = FilterSchema {
        name: "import",
        date_columns: &[import::NOR_DATE, import::DISCHARGE_DATE],
        categorical: &[
            sales::YEAR,
            import::DISCHARGE_STATUS,
            import::PORT,
            import::FUEL,
            sales::MONTH,
        ],
    };

    pub fn date_column(&self, df: &DataFrame) -> Option<&'static str> {
        self.date_columns.iter().copied().find(|c| df.column(c).is_ok())
    }
}

/// An inclusive date interval with `start <= end`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateRange {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DateRange {
    /// Reversed bounds are swapped.
    pub fn new(start: NaiveDate, end: NaiveDate) -> Self {
        if start > end {
            Self { start: end, end: start }
        } else {
            Self { start, end }
        }
    }

    /// Clamp into `[min, max]`. A range lying wholly outside it becomes
    /// `[min, max]`.
    pub fn clamp(self, min: NaiveDate, max: NaiveDate) -> Self {
        let bounds = Self::new(min, max);
        let start = self.start.max(bounds.start);
        let end = self.end.min(bounds.end);
        if start > end {
            bounds
        } else {
            Self { start, end }
        }
    }

    pub fn days(&self) -> i64 {
        (self.end - self.start).num_days()
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        self.start <= date && date <= self.end
    }
}

/// Distinct values offered for one categorical column.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CategoryOptions {
    pub column: String,
    pub values: Vec<String>,
}

/// What a dataset offers to filter on.
#[derive(Debug, Clone, PartialEq)]
pub struct FilterOptions {
    pub date_column: Option<&'static str>,
    pub min_date: NaiveDate,
    pub max_date: NaiveDate,
    pub categories: Vec<CategoryOptions>,
}

impl FilterOptions {
    /// Observed date bounds (the upper one capped at `today`) and sorted
    /// distinct values of every declared column. Without dates the range is
    /// `default_start..=today`.
    pub fn from_frame(
        df: &DataFrame,
        schema: &FilterSchema,
        today: NaiveDate,
        default_start: NaiveDate,
    ) -> DashResult<Self> {
        let date_column = schema.date_column(df);
        let bounds = date_bounds(df, schema, today, default_start)?;
        let (min_date, max_date) = (bounds.start, bounds.end);

        let mut categories = Vec::new();
        for column in schema.categorical {
            let Ok(c) = df.column(column) else { continue };
            let values = distinct_values(c.as_materialized_series())?;
            if !values.is_empty() {
                categories.push(CategoryOptions {
                    column: column.to_string(),
                    values,
                });
            }
        }

        Ok(Self {
            date_column,
            min_date,
            max_date,
            categories,
        })
    }

    pub fn full_range(&self) -> DateRange {
        DateRange::new(self.min_date, self.max_date)
    }

    pub fn values(&self, column: &str) -> Option<&[String]> {
        self.categories
            .iter()
            .find(|c| c.column == column)
            .map(|c| c.values.as_slice())
    }
}

/// Observed dates on the schema's first present date column, the upper
/// bound capped at `today`; `default_start..=today` without dates.
pub fn date_bounds(
    df: &DataFrame,
    schema: &FilterSchema,
    today: NaiveDate,
    default_start: NaiveDate,
) -> DashResult<DateRange> {
    let dates: Vec<NaiveDate> = match schema.date_column(df) {
        Some(c) => date_values(df.column(c)?.as_materialized_series())?
            .into_iter()
            .flatten()
            .collect(),
        None => Vec::new(),
    };
    Ok(match (dates.iter().min(), dates.iter().max()) {
        (Some(min), Some(max)) => DateRange::new(*min, (*max).min(today)),
        _ => DateRange::new(default_start, today),
    })
}

/// Distinct non-empty values as text; numerically ordered when every value
/// is an integer.
fn distinct_values(s: &Series) -> DashResult<Vec<String>> {
    let text = s.cast(&DataType::String)?;
    let set: BTreeSet<&str> = text
        .str()?
        .into_iter()
        .flatten()
        .filter(|v| !v.is_empty())
        .collect();
    let mut values: Vec<String> = set.into_iter().map(str::to_string).collect();
    if values.iter().all(|v| v.parse::<i64>().is_ok()) {
        values.sort_by_key(|v| v.parse::<i64>().unwrap_or_default());
    }
    Ok(values)
}

/// Columns with between 1 and `limit` distinct non-null values.
///
/// Opt-in only; the declared [`FilterSchema`] is what the dashboard uses.
pub fn discover_filter_columns(df: &DataFrame, limit: usize) -> DashResult<Vec<String>> {
    let mut found = Vec::new();
    for c in df.get_columns() {
        let distinct = c.as_materialized_series().drop_nulls().n_unique()?;
        if (1..=limit).contains(&distinct) {
            found.push(c.name().to_string());
        }
    }
    Ok(found)
}

/// A user's current choice of date interval and categorical values.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FilterSelection {
    pub date_range: Option<DateRange>,
    pub categories: BTreeMap<String, Vec<String>>,
}

impl FilterSelection {
    pub fn with_date_range(range: DateRange) -> Self {
        Self {
            date_range: Some(range),
            ..Self::default()
        }
    }

    /// Replace the selected values for `column`; an empty list clears it.
    pub fn select(&mut self, column: impl Into<String>, values: Vec<String>) -> &mut Self {
        let column = column.into();
        if values.is_empty() {
            self.categories.remove(&column);
        } else {
            self.categories.insert(column, values);
        }
        self
    }

    pub fn clear(&mut self) {
        self.date_range = None;
        self.categories.clear();
    }

    pub fn is_empty(&self) -> bool {
        self.date_range.is_none() && self.categories.is_empty()
    }

    /// Keep the rows inside the date range (on the schema's first present
    /// date column) whose values are in every non-empty category set.
    ///
    /// Categorical values are compared as text. Columns the frame lacks are
    /// ignored.
    pub fn apply(&self, df: &DataFrame, schema: &FilterSchema) -> DashResult<Outcome<DataFrame>> {
        if df.height() == 0 {
            return Ok(Outcome::Empty(EmptyReason::UpstreamEmpty(schema.name)));
        }

        let mut frame = df.clone();
        let mut predicates: Vec<Expr> = Vec::new();

        if let (Some(range), Some(date_col)) = (self.date_range, schema.date_column(df)) {
            frame = parse_date_column(frame, date_col, None)?;
            predicates.push(
                col(date_col)
                    .gt_eq(lit(range.start))
                    .and(col(date_col).lt_eq(lit(range.end))),
            );
        }

        for (column, values) in &self.categories {
            if values.is_empty() || frame.column(column).is_err() {
                continue;
            }
            let allowed = Series::new(PlSmallStr::from_static("allowed"), values.clone());
            predicates.push(
                col(column.as_str())
                    .cast(DataType::String)
                    .is_in(lit(allowed), false),
            );
        }

        let Some(predicate) = predicates.into_iter().reduce(|a, b| a.and(b)) else {
            return Ok(Outcome::Ready(frame));
        };
        let filtered = frame.lazy().filter(predicate).collect()?;
        debug!(
            dataset = schema.name,
            before = df.height(),
            after = filtered.height(),
            "filters applied"
        );
        Ok(Outcome::from_frame(filtered, EmptyReason::NoMatchingRows))
    }
}
