//! Dashboard tables built from filtered sales and import frames.

use chrono::{Datelike, Local, NaiveDateTime};
use polars::prelude::*;
use tracing::{debug, warn};

use crate::config::{DashboardConfig, StatusBands};
use crate::convert::mass_to_volume;
use crate::error::{DashResult, EmptyReason, Outcome};
use crate::normalize::{clean_sum, coerce_numeric_columns, date_values, numeric_series};
use crate::schema::{business_line, guarantee, import, monthly, port, sales, TOTAL_ROW};

const DEFAULT_FUEL: &str = "Gasóleo";

const MONTHS_PT: [&str; 12] = [
    "Janeiro", "Fevereiro", "Março", "Abril", "Maio", "Junho", "Julho", "Agosto", "Setembro",
    "Outubro", "Novembro", "Dezembro",
];

/// `part` as a percentage of `total`; 0 unless `total` is positive and finite.
pub fn percentage(part: f64, total: f64) -> f64 {
    if total > 0.0 && total.is_finite() {
        part / total * 100.0
    } else {
        0.0
    }
}

fn round1(v: f64) -> f64 {
    (v * 10.0).round() / 10.0
}

fn first_present<'a>(df: &DataFrame, candidates: &[&'a str]) -> Option<&'a str> {
    candidates.iter().copied().find(|c| df.column(c).is_ok())
}

const FREQUENCY: &str = "frequencia";

/// One-row frame holding the most frequent non-null value of `column`;
/// ties go to the smallest value.
fn most_frequent(frame: LazyFrame, column: &str) -> DashResult<DataFrame> {
    Ok(frame
        .select([col(column)])
        .filter(col(column).is_not_null())
        .group_by([col(column)])
        .agg([len().alias(FREQUENCY)])
        .sort(
            [FREQUENCY, column],
            SortMultipleOptions::default().with_order_descending_multi([true, false]),
        )
        .limit(1)
        .collect()?)
}

/// Most frequent non-null value of `column` as text.
fn mode_of(df: &DataFrame, column: &str) -> DashResult<Option<String>> {
    let text = df.clone().lazy().select([col(column).cast(DataType::String)]);
    let top = most_frequent(text, column)?;
    Ok(top.column(column)?.str()?.get(0).map(str::to_string))
}

// ── Status bands ────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    Excess,
    OnPlan,
    Attention,
    Critical,
}

impl Status {
    pub fn classify(variance_pct: f64, bands: &StatusBands) -> Self {
        if variance_pct >= bands.excess {
            Status::Excess
        } else if variance_pct >= bands.on_plan {
            Status::OnPlan
        } else if variance_pct >= bands.attention {
            Status::Attention
        } else {
            Status::Critical
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Status::Excess => "Excedente",
            Status::OnPlan => "Dentro do Plano",
            Status::Attention => "Atenção",
            Status::Critical => "Crítico",
        }
    }
}

// ── Market share ────────────────────────────────────────────────────────────

/// Company against industry, and release against financial hold, in
/// tonnes and cubic metres.
#[derive(Debug, Clone, PartialEq)]
pub struct MarketShare {
    /// Fuel whose density converts the tonnages.
    pub fuel: String,
    pub company_tm: f64,
    pub competitors_tm: f64,
    pub industry_tm: f64,
    pub release_tm: f64,
    pub financial_hold_tm: f64,
    pub company_m3: f64,
    pub competitors_m3: f64,
    pub industry_m3: f64,
    pub release_m3: f64,
    pub financial_hold_m3: f64,
    pub company_pct: f64,
    pub competitors_pct: f64,
    pub release_pct: f64,
    pub financial_hold_pct: f64,
}

/// Most common fuel in the first fuel column that has any value.
pub fn dominant_fuel(df: &DataFrame) -> DashResult<String> {
    for candidate in import::FUEL_CANDIDATES {
        if df.column(candidate).is_err() {
            continue;
        }
        if let Some(fuel) = mode_of(df, candidate)? {
            return Ok(fuel);
        }
    }
    Ok(DEFAULT_FUEL.to_string())
}

#[tracing::instrument(skip_all, fields(rows = df.height()))]
pub fn market_share(df: &DataFrame, config: &DashboardConfig) -> DashResult<Outcome<MarketShare>> {
    if df.height() == 0 {
        return Ok(Outcome::Empty(EmptyReason::UpstreamEmpty("imports")));
    }

    let has_split = df.column(import::RELEASE_TM).is_ok() && df.column(import::FINANCIAL_HOLD_TM).is_ok();
    let release_tm = clean_sum(df, import::RELEASE_TM)?;
    let financial_hold_tm = clean_sum(df, import::FINANCIAL_HOLD_TM)?;
    let company_tm = if has_split {
        release_tm + financial_hold_tm
    } else {
        clean_sum(df, import::QUANTITY_TM)?
    };

    let mut competitors_tm = 0.0;
    for competitor in &config.competitors {
        competitors_tm += clean_sum(df, competitor)?;
    }
    let industry_tm = company_tm + competitors_tm;

    if industry_tm == 0.0 {
        warn!("no usable quantities for market share");
        return Ok(Outcome::Empty(EmptyReason::UpstreamEmpty("import quantities")));
    }

    let fuel = dominant_fuel(df)?;
    let m3 = |tm: f64| mass_to_volume(tm, &fuel, &config.densities);
    debug!(%fuel, company_tm, competitors_tm, "market share computed");

    Ok(Outcome::Ready(MarketShare {
        company_m3: m3(company_tm),
        competitors_m3: m3(competitors_tm),
        industry_m3: m3(industry_tm),
        release_m3: m3(release_tm),
        financial_hold_m3: m3(financial_hold_tm),
        company_pct: percentage(company_tm, industry_tm),
        competitors_pct: percentage(competitors_tm, industry_tm),
        release_pct: percentage(release_tm, company_tm),
        financial_hold_pct: percentage(financial_hold_tm, company_tm),
        fuel,
        company_tm,
        competitors_tm,
        industry_tm,
        release_tm,
        financial_hold_tm,
    }))
}

// ── Business lines ──────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
pub struct BusinessLineRow {
    pub line: String,
    pub realized: f64,
    pub planned: f64,
}

impl BusinessLineRow {
    pub fn variance(&self) -> f64 {
        self.realized - self.planned
    }

    pub fn variance_pct(&self) -> f64 {
        percentage(self.variance(), self.planned)
    }
}

/// Realized and planned volume per configured business line, in order.
///
/// Lines without rows, and frames without a business-line column, report 0.
pub fn business_line_rows(df: &DataFrame, config: &DashboardConfig) -> DashResult<Vec<BusinessLineRow>> {
    let realized_col = first_present(df, &sales::REALIZED_CANDIDATES);
    let planned_col = first_present(df, &crate::schema::plan::PLANNED_CANDIDATES);
    let has_lines = df.column(sales::BUSINESS_LINE).is_ok();
    if !has_lines {
        warn!("no business-line column, all lines report zero");
    }

    let mut rows = Vec::with_capacity(config.business_lines.len());
    for line in &config.business_lines {
        let (realized, planned) = if has_lines && df.height() > 0 {
            let subset = df
                .clone()
                .lazy()
                .filter(
                    col(sales::BUSINESS_LINE)
                        .cast(DataType::String)
                        .eq(lit(line.as_str())),
                )
                .collect()?;
            let realized = match realized_col {
                Some(c) => clean_sum(&subset, c)?,
                None => 0.0,
            };
            let planned = match planned_col {
                Some(c) => clean_sum(&subset, c)?,
                None => 0.0,
            };
            (realized, planned)
        } else {
            (0.0, 0.0)
        };
        rows.push(BusinessLineRow {
            line: line.clone(),
            realized,
            planned,
        });
    }
    Ok(rows)
}

/// The business-line performance table with its `TOTAL GERAL` row.
#[tracing::instrument(skip_all, fields(rows = df.height()))]
pub fn business_line_table(df: &DataFrame, config: &DashboardConfig) -> DashResult<DataFrame> {
    let rows = business_line_rows(df, config)?;
    render_business_lines(&rows, config)
}

pub fn render_business_lines(rows: &[BusinessLineRow], config: &DashboardConfig) -> DashResult<DataFrame> {
    let total = BusinessLineRow {
        line: TOTAL_ROW.to_string(),
        realized: rows.iter().map(|r| r.realized).sum(),
        planned: rows.iter().map(|r| r.planned).sum(),
    };

    let all = rows.iter().map(|r| (r, &config.line_bands)).chain([(&total, &config.total_bands)]);
    let (mut names, mut realized, mut planned, mut variance, mut pct, mut status) =
        (Vec::new(), Vec::new(), Vec::new(), Vec::new(), Vec::new(), Vec::new());
    for (row, bands) in all {
        names.push(row.line.clone());
        realized.push(row.realized);
        planned.push(row.planned);
        variance.push(row.variance());
        pct.push(row.variance_pct());
        status.push(Status::classify(row.variance_pct(), bands).label());
    }

    Ok(DataFrame::new(vec![
        Series::new(business_line::LINE.into(), names).into(),
        Series::new(business_line::REALIZED.into(), realized).into(),
        Series::new(business_line::PLANNED.into(), planned).into(),
        Series::new(business_line::VARIANCE.into(), variance).into(),
        Series::new(business_line::VARIANCE_PCT.into(), pct).into(),
        Series::new(business_line::STATUS.into(), status).into(),
    ])?)
}

/// Headline figures over the business lines (total row excluded).
#[derive(Debug, Clone, PartialEq)]
pub struct LineSummary {
    pub mean_variance_pct: f64,
    pub lines_above_plan: usize,
    pub line_count: usize,
    pub best_line: Option<String>,
}

pub fn line_summary(rows: &[BusinessLineRow]) -> LineSummary {
    let line_count = rows.len();
    let mean_variance_pct = if line_count == 0 {
        0.0
    } else {
        rows.iter().map(BusinessLineRow::variance_pct).sum::<f64>() / line_count as f64
    };
    let lines_above_plan = rows.iter().filter(|r| r.variance_pct() > 0.0).count();
    // First of equals wins.
    let best_line = rows
        .iter()
        .fold(None::<&BusinessLineRow>, |best, r| match best {
            Some(b) if b.variance_pct() >= r.variance_pct() => Some(b),
            _ => Some(r),
        })
        .map(|r| r.line.clone());
    LineSummary {
        mean_variance_pct,
        lines_above_plan,
        line_count,
        best_line,
    }
}

// ── Monthly series ──────────────────────────────────────────────────────────

pub fn month_label(year: i32, month: u32) -> String {
    match MONTHS_PT.get((month as usize).wrapping_sub(1)) {
        Some(name) => format!("{name} {year}"),
        None => format!("{month} {year}"),
    }
}

/// Realized against planned per calendar month, oldest first, with a
/// `Março 2025` style period label.
#[tracing::instrument(skip_all, fields(rows = df.height()))]
pub fn monthly_sales_vs_plan(df: &DataFrame) -> DashResult<Outcome<DataFrame>> {
    if df.height() == 0 {
        return Ok(Outcome::Empty(EmptyReason::UpstreamEmpty("sales")));
    }
    let realized = first_present(df, &sales::REALIZED_CANDIDATES[..3]);
    let planned = first_present(df, &crate::schema::plan::PLANNED_CANDIDATES);
    let (Some(realized), Some(planned)) = (realized, planned) else {
        return Ok(Outcome::Empty(EmptyReason::MissingColumns(vec![
            "Vendas m³".into(),
            "Plano_m³".into(),
        ])));
    };
    match df.column(sales::INVOICE_DATE) {
        Ok(c) if c.dtype() == &DataType::Date => {}
        _ => {
            return Ok(Outcome::Empty(EmptyReason::MissingColumns(vec![
                sales::INVOICE_DATE.into(),
            ])))
        }
    }

    let frame = df.select([sales::INVOICE_DATE, realized, planned])?;
    let frame = coerce_numeric_columns(frame, &[realized, planned])?;
    let grouped = frame
        .lazy()
        .filter(col(sales::INVOICE_DATE).is_not_null())
        .with_columns([
            col(sales::INVOICE_DATE).dt().year().cast(DataType::Int32).alias(monthly::YEAR),
            col(sales::INVOICE_DATE).dt().month().cast(DataType::Int32).alias(monthly::MONTH),
        ])
        .group_by([col(monthly::YEAR), col(monthly::MONTH)])
        .agg([
            col(realized).sum().alias(monthly::REALIZED),
            col(planned).sum().alias(monthly::PLANNED),
        ])
        .sort([monthly::YEAR, monthly::MONTH], SortMultipleOptions::default())
        .collect()?;

    let years = grouped.column(monthly::YEAR)?.i32()?;
    let months = grouped.column(monthly::MONTH)?.i32()?;
    let labels: Vec<String> = years
        .into_iter()
        .zip(months)
        .map(|(y, m)| month_label(y.unwrap_or_default(), m.unwrap_or_default() as u32))
        .collect();

    let mut grouped = grouped;
    grouped.with_column(Series::new(monthly::PERIOD.into(), labels))?;
    Ok(Outcome::from_frame(grouped, EmptyReason::NoMatchingRows))
}

// ── Ports ───────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
pub struct PortRow {
    pub port: String,
    pub release: f64,
    pub financial_hold: f64,
}

impl PortRow {
    /// Financial hold share of the port's volume, one decimal.
    pub fn financial_hold_pct(&self) -> f64 {
        round1(percentage(self.financial_hold, self.release + self.financial_hold))
    }
}

fn column_with_marker<'a>(df: &'a DataFrame, markers: &[&str]) -> Option<&'a str> {
    df.get_column_names_str().into_iter().find(|name| {
        let upper = name.to_uppercase();
        markers.iter().any(|m| upper.contains(m))
    })
}

/// Release and financial hold per configured port, in order and
/// zero-filled. Ports outside the list are logged and left out.
pub fn port_rows(df: &DataFrame, config: &DashboardConfig) -> DashResult<Outcome<Vec<PortRow>>> {
    if df.height() == 0 {
        return Ok(Outcome::Empty(EmptyReason::UpstreamEmpty("imports")));
    }
    let Some(port_col) = column_with_marker(df, &[import::PORT_MARKER]) else {
        warn!("no port column in imports");
        return Ok(Outcome::Empty(EmptyReason::MissingColumns(vec![import::PORT.into()])));
    };

    let release_col = column_with_marker(df, &import::RELEASE_MARKERS);
    let hold_col = column_with_marker(df, &import::FINANCIAL_HOLD_MARKERS);
    if release_col.is_none() || hold_col.is_none() {
        warn!(?release_col, ?hold_col, "release / financial hold columns incomplete, missing side counts as zero");
    }

    let quantity = |c: Option<&str>, name: &str| -> DashResult<Column> {
        let s = match c {
            Some(c) => numeric_series(df.column(c)?.as_materialized_series())?,
            None => Series::full_null(name.into(), df.height(), &DataType::Float64),
        };
        Ok(s.with_name(name.into()).into())
    };
    let frame = DataFrame::new(vec![
        df.column(port_col)?
            .as_materialized_series()
            .cast(&DataType::String)?
            .with_name(port::PORT.into())
            .into(),
        quantity(release_col, port::RELEASE)?,
        quantity(hold_col, port::FINANCIAL_HOLD)?,
    ])?;
    let grouped = frame
        .lazy()
        .filter(col(port::PORT).is_not_null())
        .group_by([col(port::PORT)])
        .agg([
            col(port::RELEASE).fill_null(lit(0.0)).sum(),
            col(port::FINANCIAL_HOLD).fill_null(lit(0.0)).sum(),
        ])
        .sort([port::PORT], SortMultipleOptions::default())
        .collect()?;

    let names = grouped.column(port::PORT)?.str()?;
    let release = grouped.column(port::RELEASE)?.f64()?;
    let hold = grouped.column(port::FINANCIAL_HOLD)?.f64()?;
    let mut rows: Vec<PortRow> = config
        .port_order
        .iter()
        .map(|p| PortRow {
            port: p.clone(),
            release: 0.0,
            financial_hold: 0.0,
        })
        .collect();
    let mut ignored = Vec::new();
    for i in 0..grouped.height() {
        let name = names.get(i).unwrap_or_default();
        match rows.iter_mut().find(|r| r.port == name) {
            Some(row) => {
                row.release = release.get(i).unwrap_or_default();
                row.financial_hold = hold.get(i).unwrap_or_default();
            }
            None => ignored.push(name.to_string()),
        }
    }
    if !ignored.is_empty() {
        warn!(?ignored, "ports outside the fixed list left out of the port table");
    }
    Ok(Outcome::Ready(rows))
}

fn port_total(rows: &[PortRow]) -> PortRow {
    PortRow {
        port: TOTAL_ROW.to_string(),
        release: rows.iter().map(|r| r.release).sum(),
        financial_hold: rows.iter().map(|r| r.financial_hold).sum(),
    }
}

/// The port table with `% FINANCIAL HOLD` and a `TOTAL GERAL` row.
#[tracing::instrument(skip_all, fields(rows = df.height()))]
pub fn port_table(df: &DataFrame, config: &DashboardConfig) -> DashResult<Outcome<DataFrame>> {
    match port_rows(df, config)? {
        Outcome::Ready(rows) => Ok(Outcome::Ready(render_ports(&rows)?)),
        Outcome::Empty(reason) => Ok(Outcome::Empty(reason)),
    }
}

pub fn render_ports(rows: &[PortRow]) -> DashResult<DataFrame> {
    let total = port_total(rows);
    let all: Vec<&PortRow> = rows.iter().chain([&total]).collect();
    Ok(DataFrame::new(vec![
        Series::new(port::PORT.into(), all.iter().map(|r| r.port.as_str()).collect::<Vec<_>>()).into(),
        Series::new(port::RELEASE.into(), all.iter().map(|r| r.release).collect::<Vec<_>>()).into(),
        Series::new(
            port::FINANCIAL_HOLD.into(),
            all.iter().map(|r| r.financial_hold).collect::<Vec<_>>(),
        )
        .into(),
        Series::new(
            port::FINANCIAL_HOLD_PCT.into(),
            all.iter().map(|r| r.financial_hold_pct()).collect::<Vec<_>>(),
        )
        .into(),
    ])?)
}

/// Imported volume split into release and financial hold.
#[derive(Debug, Clone, PartialEq)]
pub struct ImportTotals {
    pub release: f64,
    pub financial_hold: f64,
    pub total: f64,
    pub release_pct: f64,
    pub financial_hold_pct: f64,
}

pub fn import_totals(rows: &[PortRow]) -> ImportTotals {
    let t = port_total(rows);
    let total = t.release + t.financial_hold;
    ImportTotals {
        release: t.release,
        financial_hold: t.financial_hold,
        total,
        release_pct: percentage(t.release, total),
        financial_hold_pct: percentage(t.financial_hold, total),
    }
}

// ── Bank guarantees ─────────────────────────────────────────────────────────

/// Limit, use and availability per bank, with a `TOTAL GERAL` row.
#[tracing::instrument(skip_all, fields(rows = df.height()))]
pub fn bank_guarantee_table(df: &DataFrame) -> DashResult<Outcome<DataFrame>> {
    let required = [import::BANK, import::GUARANTEE_LIMIT, import::GUARANTEE_USED];
    let missing: Vec<String> = required
        .iter()
        .filter(|c| df.column(c).is_err())
        .map(|c| c.to_string())
        .collect();
    if !missing.is_empty() {
        warn!(?missing, "bank guarantee columns not found");
        return Ok(Outcome::Empty(EmptyReason::MissingColumns(missing)));
    }

    let frame = coerce_numeric_columns(df.select(required)?, &required[1..])?;
    let grouped = frame
        .lazy()
        .filter(col(import::BANK).is_not_null())
        .with_column(col(import::BANK).cast(DataType::String))
        .group_by([col(import::BANK)])
        .agg([
            col(import::GUARANTEE_LIMIT).sum(),
            col(import::GUARANTEE_USED).sum(),
        ])
        .sort([import::BANK], SortMultipleOptions::default())
        .collect()?;
    if grouped.height() == 0 {
        return Ok(Outcome::Empty(EmptyReason::NoMatchingRows));
    }

    let mut banks: Vec<String> = grouped
        .column(import::BANK)?
        .str()?
        .into_iter()
        .map(|b| b.unwrap_or_default().to_string())
        .collect();
    let mut limits: Vec<f64> = grouped.column(import::GUARANTEE_LIMIT)?.f64()?.into_no_null_iter().collect();
    let mut used: Vec<f64> = grouped.column(import::GUARANTEE_USED)?.f64()?.into_no_null_iter().collect();

    let total_limit: f64 = limits.iter().sum();
    let total_used: f64 = used.iter().sum();
    banks.push(TOTAL_ROW.to_string());
    limits.push(total_limit);
    used.push(total_used);

    let available: Vec<f64> = limits.iter().zip(&used).map(|(l, u)| l - u).collect();
    let available_pct: Vec<f64> = available
        .iter()
        .zip(&limits)
        .map(|(a, l)| round1(percentage(*a, *l)))
        .collect();

    Ok(Outcome::Ready(DataFrame::new(vec![
        Series::new(guarantee::BANK.into(), banks).into(),
        Series::new(guarantee::LIMIT.into(), limits).into(),
        Series::new(guarantee::USED.into(), used).into(),
        Series::new(guarantee::AVAILABLE.into(), available).into(),
        Series::new(guarantee::AVAILABLE_PCT.into(), available_pct).into(),
    ])?))
}

// ── Reports and alerts ──────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlertLevel {
    Critical,
    Attention,
    Notice,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Alert {
    pub level: AlertLevel,
    pub message: String,
}

/// Sales-vs-plan performance and data availability warnings.
pub fn check_alerts(sales_df: &DataFrame, imports: &DataFrame) -> DashResult<Vec<Alert>> {
    let mut alerts = Vec::new();

    if sales_df.height() > 0
        && sales_df.column("Plano_m³").is_ok()
        && sales_df.column("Vendas m³").is_ok()
    {
        let realized = clean_sum(sales_df, "Vendas m³")?;
        let planned = clean_sum(sales_df, "Plano_m³")?;
        if planned > 0.0 {
            let performance = realized / planned * 100.0;
            if performance < 80.0 {
                alerts.push(Alert {
                    level: AlertLevel::Critical,
                    message: format!("Desempenho abaixo do esperado: {performance:.1}% do plano"),
                });
            } else if performance < 95.0 {
                alerts.push(Alert {
                    level: AlertLevel::Attention,
                    message: format!("Desempenho próximo do limite: {performance:.1}% do plano"),
                });
            }
        }
    }

    if sales_df.height() == 0 {
        alerts.push(Alert {
            level: AlertLevel::Notice,
            message: "Dados de vendas não disponíveis".into(),
        });
    }
    if imports.height() == 0 {
        alerts.push(Alert {
            level: AlertLevel::Notice,
            message: "Dados de importação não disponíveis".into(),
        });
    }
    Ok(alerts)
}

#[derive(Debug, Clone, PartialEq)]
pub struct ExecutiveReport {
    pub generated_at: NaiveDateTime,
    /// Σ `V_Liquido_MT`, when sales carry it.
    pub total_sales_mt: Option<f64>,
    /// Σ `Quantidade`, when sales carry it.
    pub sales_volume: Option<f64>,
    /// Σ `Quantidade_TM`, when imports carry it.
    pub total_imported_tm: Option<f64>,
    pub alerts: Vec<Alert>,
}

pub fn executive_report(sales_df: &DataFrame, imports: &DataFrame) -> DashResult<ExecutiveReport> {
    let sum_if = |df: &DataFrame, c: &str| -> DashResult<Option<f64>> {
        if df.height() > 0 && df.column(c).is_ok() {
            Ok(Some(clean_sum(df, c)?))
        } else {
            Ok(None)
        }
    };
    let net_local = format!("{}{}", sales::NET_VALUE, sales::LOCAL_SUFFIX);
    Ok(ExecutiveReport {
        generated_at: Local::now().naive_local(),
        total_sales_mt: sum_if(sales_df, &net_local)?,
        sales_volume: sum_if(sales_df, sales::QUANTITY)?,
        total_imported_tm: sum_if(imports, import::QUANTITY_TM)?,
        alerts: check_alerts(sales_df, imports)?,
    })
}

/// Most common year among the first import date column with values;
/// `fallback` when there is none.
pub fn dominant_year(imports: &DataFrame, fallback: i32) -> DashResult<i32> {
    for candidate in [import::NOR_DATE, import::DISCHARGE_DATE, "Data_Importacao", "Data"] {
        let Ok(column) = imports.column(candidate) else {
            continue;
        };
        let years: Vec<i32> = date_values(column.as_materialized_series())?
            .into_iter()
            .flatten()
            .map(|d| d.year())
            .collect();
        if years.is_empty() {
            continue;
        }
        let frame = df!(monthly::YEAR => years)?;
        if let Some(year) = most_frequent(frame.lazy(), monthly::YEAR)?
            .column(monthly::YEAR)?
            .i32()?
            .get(0)
        {
            return Ok(year);
        }
    }
    Ok(fallback)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> DashboardConfig {
        DashboardConfig::default()
    }

    fn f64_col(df: &DataFrame, name: &str) -> Vec<f64> {
        df.column(name).unwrap().f64().unwrap().into_no_null_iter().collect()
    }

    fn str_col(df: &DataFrame, name: &str) -> Vec<String> {
        df.column(name)
            .unwrap()
            .str()
            .unwrap()
            .into_iter()
            .map(|v| v.unwrap_or_default().to_string())
            .collect()
    }

    #[test]
    fn percentage_of_zero_total_is_zero() {
        assert_eq!(percentage(5.0, 0.0), 0.0);
        assert_eq!(percentage(25.0, 100.0), 25.0);
    }

    #[test]
    fn status_bands_per_line_and_total() {
        assert_eq!(Status::classify(12.0, &StatusBands::LINE), Status::Excess);
        assert_eq!(Status::classify(-5.0, &StatusBands::LINE), Status::OnPlan);
        assert_eq!(Status::classify(-10.0, &StatusBands::LINE), Status::Attention);
        assert_eq!(Status::classify(-15.1, &StatusBands::LINE), Status::Critical);
        assert_eq!(Status::classify(-12.0, &StatusBands::TOTAL), Status::Critical);
        assert_eq!(Status::classify(6.0, &StatusBands::TOTAL), Status::Excess);
    }

    #[test]
    fn bunkers_at_ninety_percent_needs_attention() {
        let df = df!(
            "Sector/Sigla" => ["Bunkers", "Bunkers"],
            "Vendas m³" => [40_000.0, 50_000.0],
            "Plano_m³" => [50_000.0, 50_000.0],
        )
        .unwrap();
        let table = business_line_table(&df, &config()).unwrap();
        assert_eq!(table.height(), 8);
        let bunkers = str_col(&table, business_line::LINE)
            .iter()
            .position(|l| l == "Bunkers")
            .unwrap();
        assert_eq!(f64_col(&table, business_line::VARIANCE)[bunkers], -10_000.0);
        assert_eq!(f64_col(&table, business_line::VARIANCE_PCT)[bunkers], -10.0);
        assert_eq!(str_col(&table, business_line::STATUS)[bunkers], "Atenção");
        // Total row uses its own bands: -10% is still Atenção there.
        assert_eq!(str_col(&table, business_line::STATUS)[7], "Atenção");
    }

    #[test]
    fn grand_total_sums_the_lines() {
        let df = df!(
            "Sector/Sigla" => ["Vulcan", "Aviacao", "Outro"],
            "V_Liquido" => [10.0, 20.0, 99.0],
            "Plano" => [5.0, 40.0, 1.0],
        )
        .unwrap();
        let table = business_line_table(&df, &config()).unwrap();
        let realized = f64_col(&table, business_line::REALIZED);
        let planned = f64_col(&table, business_line::PLANNED);
        let n = realized.len() - 1;
        assert_eq!(realized[n], realized[..n].iter().sum::<f64>());
        assert_eq!(planned[n], planned[..n].iter().sum::<f64>());
        assert_eq!(realized[n], 30.0);
    }

    #[test]
    fn no_business_line_column_reports_zeros() {
        let df = df!("V_Liquido" => [1.0]).unwrap();
        let rows = business_line_rows(&df, &config()).unwrap();
        assert_eq!(rows.len(), 7);
        assert!(rows.iter().all(|r| r.realized == 0.0 && r.planned == 0.0));
    }

    #[test]
    fn summary_picks_first_best_line() {
        let rows = vec![
            BusinessLineRow { line: "A".into(), realized: 110.0, planned: 100.0 },
            BusinessLineRow { line: "B".into(), realized: 90.0, planned: 100.0 },
            BusinessLineRow { line: "C".into(), realized: 110.0, planned: 100.0 },
        ];
        let s = line_summary(&rows);
        assert_eq!(s.best_line.as_deref(), Some("A"));
        assert_eq!(s.lines_above_plan, 2);
        assert!((s.mean_variance_pct - 10.0 / 3.0).abs() < 1e-9);
    }

    #[test]
    fn missing_port_is_zero_filled_in_fixed_order() {
        let df = df!(
            "Porto" => ["Beira", "Maputo", "Nacala", "Maputo"],
            "Qtd_Petro_TM" => ["100", "50", "10", "50"],
            "Qtd_FH_( TM)" => ["0", "100", "10", "0"],
        )
        .unwrap();
        let table = port_table(&df, &config()).unwrap().ready().unwrap();
        assert_eq!(
            str_col(&table, port::PORT),
            vec!["Maputo", "Beira", "Nacala", "Pemba", "TOTAL GERAL"]
        );
        assert_eq!(f64_col(&table, port::RELEASE), vec![100.0, 100.0, 10.0, 0.0, 210.0]);
        assert_eq!(f64_col(&table, port::FINANCIAL_HOLD), vec![100.0, 0.0, 10.0, 0.0, 110.0]);
        assert_eq!(
            f64_col(&table, port::FINANCIAL_HOLD_PCT),
            vec![50.0, 0.0, 50.0, 0.0, 34.4]
        );
    }

    #[test]
    fn ports_outside_the_fixed_list_are_left_out() {
        let df = df!(
            "Porto" => ["Quelimane", "Maputo", "Beira", "Nacala"],
            "Qtd_Petro_TM" => ["7", "2", "3", "4"],
            "Qtd_FH_( TM)" => ["1", "0", "0", "0"],
        )
        .unwrap();
        let table = port_table(&df, &config()).unwrap().ready().unwrap();
        assert_eq!(
            str_col(&table, port::PORT),
            vec!["Maputo", "Beira", "Nacala", "Pemba", "TOTAL GERAL"]
        );
        assert_eq!(f64_col(&table, port::RELEASE), vec![2.0, 3.0, 4.0, 0.0, 9.0]);
        assert_eq!(f64_col(&table, port::FINANCIAL_HOLD)[4], 0.0);

        let rows = port_rows(&df, &config()).unwrap().ready().unwrap();
        assert_eq!(import_totals(&rows).total, 9.0);
    }

    #[test]
    fn most_common_fuel_breaks_ties_alphabetically() {
        let df = df!("Combustivel" => [Some("Jet A1"), Some("Gasolina"), None, Some("Jet A1"), Some("Gasolina")]).unwrap();
        assert_eq!(dominant_fuel(&df).unwrap(), "Gasolina");
    }

    #[test]
    fn guarantees_total_equals_column_sums() {
        let df = df!(
            "Banco_GB" => ["BCI", "ABSA", "BCI"],
            "ValorLimite_GB" => ["1000", "500", "1000"],
            "Valor_GB" => ["500", "500", "250"],
        )
        .unwrap();
        let table = bank_guarantee_table(&df).unwrap().ready().unwrap();
        assert_eq!(str_col(&table, guarantee::BANK), vec!["ABSA", "BCI", "TOTAL GERAL"]);
        assert_eq!(f64_col(&table, guarantee::LIMIT), vec![500.0, 2000.0, 2500.0]);
        assert_eq!(f64_col(&table, guarantee::AVAILABLE), vec![0.0, 1250.0, 1250.0]);
        assert_eq!(f64_col(&table, guarantee::AVAILABLE_PCT), vec![0.0, 62.5, 50.0]);
    }

    #[test]
    fn guarantees_without_columns_are_empty() {
        let df = df!("Porto" => ["Beira"]).unwrap();
        let out = bank_guarantee_table(&df).unwrap();
        assert!(matches!(out.empty_reason(), Some(EmptyReason::MissingColumns(m)) if m.len() == 3));
    }

    #[test]
    fn market_share_splits_company_and_competitors() {
        let df = df!(
            "Qtd_Petro_TM" => ["60", "20"],
            "Qtd_FH_( TM)" => ["20", "0"],
            "PUMA" => ["50", "50"],
            "Combustivel" => ["Gasolina", "Gasolina"],
        )
        .unwrap();
        let share = market_share(&df, &config()).unwrap().ready().unwrap();
        assert_eq!(share.company_tm, 100.0);
        assert_eq!(share.competitors_tm, 100.0);
        assert_eq!(share.company_pct, 50.0);
        assert_eq!(share.release_pct, 80.0);
        assert_eq!(share.fuel, "Gasolina");
        assert!((share.company_m3 - 100.0 / 0.73).abs() < 1e-9);
    }

    #[test]
    fn market_share_without_quantities_is_empty() {
        let df = df!("Porto" => ["Beira"]).unwrap();
        assert!(!market_share(&df, &config()).unwrap().is_ready());
    }

    #[test]
    fn monthly_series_is_chronological_with_labels() {
        let df = crate::normalize::parse_date_column(
            df!(
                "Data_Facturacao" => ["2025-04-01", "2025-03-15", "2025-03-20"],
                "Vendas m³" => [5.0, 1.0, 2.0],
                "Plano_m³" => [4.0, 2.0, 2.0],
            )
            .unwrap(),
            "Data_Facturacao",
            None,
        )
        .unwrap();
        let table = monthly_sales_vs_plan(&df).unwrap().ready().unwrap();
        assert_eq!(str_col(&table, monthly::PERIOD), vec!["Março 2025", "Abril 2025"]);
        assert_eq!(f64_col(&table, monthly::REALIZED), vec![3.0, 5.0]);
        assert_eq!(f64_col(&table, monthly::PLANNED), vec![4.0, 4.0]);
    }

    #[test]
    fn alerts_follow_performance() {
        let at = |realized: f64| {
            let df = df!("Vendas m³" => [realized], "Plano_m³" => [100.0]).unwrap();
            check_alerts(&df, &df).unwrap()
        };
        assert_eq!(at(85.0)[0].level, AlertLevel::Attention);
        assert_eq!(at(70.0)[0].level, AlertLevel::Critical);
        assert!(at(99.0).is_empty());

        let notices = check_alerts(&DataFrame::empty(), &DataFrame::empty()).unwrap();
        assert_eq!(notices.len(), 2);
        assert!(notices.iter().all(|a| a.level == AlertLevel::Notice));
    }

    #[test]
    fn dominant_year_uses_first_dated_column() {
        let df = df!("NOR" => ["2024-01-01", "2024-05-01", "2023-02-02"]).unwrap();
        assert_eq!(dominant_year(&df, 2000).unwrap(), 2024);
        assert_eq!(dominant_year(&DataFrame::empty(), 2000).unwrap(), 2000);
    }

    mod properties {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #![proptest_config(ProptestConfig::with_cases(200))]

            #[test]
            fn prop_zero_denominator(part in proptest::num::f64::ANY) {
                prop_assert_eq!(percentage(part, 0.0), 0.0);
            }

            #[test]
            fn prop_port_rows_always_cover_fixed_order(
                picks in proptest::collection::vec((0usize..4, 0.0f64..1000.0, 0.0f64..1000.0), 1..20)
            ) {
                let cfg = DashboardConfig::default();
                let ports: Vec<&str> = picks.iter().map(|(i, _, _)| cfg.port_order[*i].as_str()).collect();
                let release: Vec<f64> = picks.iter().map(|p| p.1).collect();
                let hold: Vec<f64> = picks.iter().map(|p| p.2).collect();
                let df = df!(
                    "Porto" => ports,
                    "Qtd_Petro_TM" => release,
                    "Qtd_FH_( TM)" => hold,
                ).unwrap();
                let table = port_table(&df, &cfg).unwrap().ready().unwrap();
                let names: Vec<String> = str_col(&table, port::PORT);
                prop_assert_eq!(names, vec!["Maputo", "Beira", "Nacala", "Pemba", "TOTAL GERAL"]);
            }
        }
    }
}
