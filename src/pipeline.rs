//! Sales enrichment: currency views, calendar columns, lookup joins, plan
//! join and zero fill, applied strictly in that order.

use polars::prelude::*;
use tracing::{debug, error, info, warn};

use crate::error::{DashError, DashResult, EmptyReason, Outcome};
use crate::loader::LookupTables;
use crate::normalize::parse_date_column;
use crate::schema::{lookup, plan, sales};

/// The three tables the sales side of the dashboard works from.
#[derive(Debug, Clone, Default)]
pub struct SalesViews {
    /// Local-currency view joined with lookups and plan, nulls zero-filled.
    pub enriched: DataFrame,
    /// Sales with the `_USD` columns removed, plus `Ano`/`Mes`/`Dia`.
    pub local: DataFrame,
    /// Sales with the `_MT` columns removed.
    pub hard: DataFrame,
}

impl SalesViews {
    pub fn empty() -> Self {
        Self {
            enriched: DataFrame::empty(),
            local: DataFrame::empty(),
            hard: DataFrame::empty(),
        }
    }
}

/// Run the enrichment pipeline.
///
/// Empty sales give `Outcome::Empty`; any failure aborts the whole run, so
/// a partially enriched table is never returned.
#[tracing::instrument(skip_all, fields(sales_rows = sales.height()))]
pub fn enrich(
    sales: &DataFrame,
    lookups: &LookupTables,
    plan: &DataFrame,
) -> DashResult<Outcome<SalesViews>> {
    if sales.height() == 0 {
        return Ok(Outcome::Empty(EmptyReason::UpstreamEmpty("sales")));
    }

    // 1. currency views
    let (local, hard) = split_currency_views(sales)?;

    // 2. calendar columns
    let local = with_calendar_columns(local)?;

    // 3. lookups, fixed order
    let mut enriched = local.clone();
    for (table, key, name) in [
        (&lookups.sector, sales::SECTOR_KEY, "sector"),
        (&lookups.customer, sales::ISSUER, "customer"),
        (&lookups.material, sales::MATERIAL, "material"),
        (&lookups.doc_type, sales::DOC_TYPE, "doc_type"),
        (&lookups.destination, sales::DESTINATION, "destination"),
    ] {
        enriched = left_join_unique(enriched, table, &[key], name)?;
    }

    // 4. creation date
    enriched = parse_date_column(
        enriched,
        lookup::CUSTOMER_CREATED,
        Some(lookup::CUSTOMER_CREATED_FORMAT),
    )?;

    // 5. columns consumed by the joins
    enriched = drop_columns(enriched, &sales::CONSUMED_BY_JOIN)?;

    // 6. plan
    enriched = left_join_unique(enriched, plan, &plan::KEY, "plan")?;

    // 7. zero fill
    enriched = fill_nulls_with_zero(enriched)?;

    if enriched.height() != sales.height() {
        return Err(DashError::Validation(format!(
            "enrichment changed the row count: {} sales rows became {}",
            sales.height(),
            enriched.height()
        )));
    }

    info!(
        rows = enriched.height(),
        columns = enriched.width(),
        "sales enriched"
    );
    Ok(Outcome::Ready(SalesViews {
        enriched,
        local,
        hard,
    }))
}

/// [`enrich`] with every failure and every empty outcome collapsed into
/// three empty tables.
pub fn enrich_or_empty(sales: &DataFrame, lookups: &LookupTables, plan: &DataFrame) -> SalesViews {
    match enrich(sales, lookups, plan) {
        Ok(Outcome::Ready(views)) => views,
        Ok(Outcome::Empty(reason)) => {
            warn!(%reason, "sales enrichment produced no data");
            SalesViews::empty()
        }
        Err(e) => {
            error!(error = %e, "sales enrichment failed");
            SalesViews::empty()
        }
    }
}

fn derived_names(suffix: &str) -> Vec<String> {
    sales::MONETARY
        .iter()
        .map(|f| format!("{f}{suffix}"))
        .collect()
}

/// Local view drops the `_USD` columns, hard view the `_MT` ones.
pub fn split_currency_views(df: &DataFrame) -> DashResult<(DataFrame, DataFrame)> {
    let hard_names = derived_names(sales::HARD_SUFFIX);
    let local_names = derived_names(sales::LOCAL_SUFFIX);
    let hard_refs: Vec<&str> = hard_names.iter().map(String::as_str).collect();
    let local_refs: Vec<&str> = local_names.iter().map(String::as_str).collect();

    let local = drop_columns(df.clone(), &hard_refs)?;
    let hard = drop_columns(df.clone(), &local_refs)?;
    Ok((local, hard))
}

/// Add `Ano`, `Mes` and `Dia` from the invoice date, when there is one.
pub fn with_calendar_columns(df: DataFrame) -> DashResult<DataFrame> {
    match df.column(sales::INVOICE_DATE) {
        Ok(c) if c.dtype() == &DataType::Date => {}
        _ => {
            warn!("no typed invoice date, calendar columns not derived");
            return Ok(df);
        }
    }
    let date = || col(sales::INVOICE_DATE).dt();
    Ok(df
        .lazy()
        .with_columns([
            date().year().cast(DataType::Int32).alias(sales::YEAR),
            date().month().cast(DataType::Int32).alias(sales::MONTH),
            date().day().cast(DataType::Int32).alias(sales::DAY),
        ])
        .collect()?)
}

/// Remove the named columns that are present.
pub fn drop_columns(df: DataFrame, names: &[&str]) -> DashResult<DataFrame> {
    if !names.iter().any(|n| df.column(n).is_ok()) {
        return Ok(df);
    }
    let keep: Vec<PlSmallStr> = df
        .get_column_names()
        .into_iter()
        .filter(|c| !names.contains(&c.as_str()))
        .cloned()
        .collect();
    Ok(df.select(keep)?)
}

/// Keep the first row for every distinct combination of `keys`.
///
/// Returns the deduplicated frame and the number of rows dropped.
pub fn dedupe_first(df: &DataFrame, keys: &[&str]) -> DashResult<(DataFrame, usize)> {
    let subset: Vec<String> = keys.iter().map(|k| k.to_string()).collect();
    let unique = df.unique_stable(Some(&subset), UniqueKeepStrategy::First, None)?;
    let dropped = df.height() - unique.height();
    Ok((unique, dropped))
}

/// Left-join `right` onto `left` on `keys` without multiplying rows.
///
/// Empty tables and tables missing a key are skipped. Duplicate keys keep
/// their first row. Columns `left` already has are not imported again.
pub fn left_join_unique(
    left: DataFrame,
    right: &DataFrame,
    keys: &[&str],
    table: &str,
) -> DashResult<DataFrame> {
    if right.height() == 0 {
        debug!(table, "lookup table empty, join skipped");
        return Ok(left);
    }
    if let Some(missing) = keys
        .iter()
        .find(|k| left.column(k).is_err() || right.column(k).is_err())
    {
        warn!(table, key = *missing, "join key missing, join skipped");
        return Ok(left);
    }

    let imported: Vec<PlSmallStr> = right
        .get_column_names()
        .into_iter()
        .filter(|c| keys.contains(&c.as_str()) || left.column(c.as_str()).is_err())
        .cloned()
        .collect();
    if imported.len() == keys.len() {
        debug!(table, "lookup adds no new columns, join skipped");
        return Ok(left);
    }
    let right = right.select(imported)?;

    let (right, dropped) = dedupe_first(&right, keys)?;
    if dropped > 0 {
        warn!(table, dropped, "duplicate join keys, keeping first occurrence");
    }

    // Align key dtypes with the left side.
    let casts: Vec<Expr> = keys
        .iter()
        .map(|k| {
            let dtype = left.column(k)?.dtype().clone();
            Ok(col(*k).cast(dtype))
        })
        .collect::<DashResult<_>>()?;

    let on: Vec<Expr> = keys.iter().map(|k| col(*k)).collect();
    let joined = left
        .lazy()
        .join(
            right.lazy().with_columns(casts),
            on.clone(),
            on,
            JoinArgs::new(JoinType::Left),
        )
        .collect()?;
    debug!(table, rows = joined.height(), "joined");
    Ok(joined)
}

/// Numeric nulls become 0 and string nulls "0"; other dtypes keep nulls.
pub fn fill_nulls_with_zero(df: DataFrame) -> DashResult<DataFrame> {
    let exprs: Vec<Expr> = df
        .get_columns()
        .iter()
        .filter(|c| c.null_count() > 0)
        .filter_map(|c| {
            let name = c.name().clone();
            let dtype = c.dtype();
            if dtype.is_float() {
                Some(col(name.clone()).fill_null(lit(0.0)).cast(dtype.clone()))
            } else if dtype.is_integer() {
                Some(col(name.clone()).fill_null(lit(0)).cast(dtype.clone()))
            } else if dtype == &DataType::String {
                Some(col(name.clone()).fill_null(lit("0")))
            } else {
                None
            }
        })
        .collect();
    if exprs.is_empty() {
        return Ok(df);
    }
    Ok(df.lazy().with_columns(exprs).collect()?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::loader::{prepare_plan, prepare_sales};

    fn sales_frame() -> DataFrame {
        let raw = df!(
            "Data_Facturacao" => ["2025-03-15", "2025-04-02"],
            "Emissor" => ["E1", "E2"],
            "CDst" => ["D1", "D9"],
            "Material" => ["M1", "M1"],
            "CE" => ["C1", "C2"],
            "TipFt" => ["F1", "F1"],
            "Doc.fat." => ["100", "101"],
            "Quantidade" => ["100", "50"],
            "V_Liquido" => ["1000", "500"],
            "Cambio" => ["64", "64"],
            "Moeda" => ["USD", "USD"],
        )
        .unwrap();
        prepare_sales(raw).unwrap()
    }

    #[test]
    fn views_are_column_disjoint_on_currency() {
        let (local, hard) = split_currency_views(&sales_frame()).unwrap();
        assert!(local.column("V_Liquido_MT").is_ok());
        assert!(local.column("V_Liquido_USD").is_err());
        assert!(hard.column("V_Liquido_USD").is_ok());
        assert!(hard.column("V_Liquido_MT").is_err());
        assert!(hard.column("Quantidade").is_ok());
    }

    #[test]
    fn duplicate_lookup_keys_do_not_multiply_rows() {
        let sector = df!(
            "CE" => ["C1", "C1", "C2"],
            "Sector/Sigla" => ["Bunkers", "Vulcan", "Aviacao"],
        )
        .unwrap();
        let lookups = LookupTables::from_sheets(vec![
            DataFrame::empty(),
            DataFrame::empty(),
            DataFrame::empty(),
            sector,
        ]);
        let views = enrich(&sales_frame(), &lookups, &DataFrame::empty())
            .unwrap()
            .ready()
            .unwrap();
        assert_eq!(views.enriched.height(), 2);
        let lines: Vec<Option<&str>> = views
            .enriched
            .column("Sector/Sigla")
            .unwrap()
            .str()
            .unwrap()
            .into_iter()
            .collect();
        assert_eq!(lines, vec![Some("Bunkers"), Some("Aviacao")]);
    }

    #[test]
    fn consumed_columns_are_dropped_and_misses_zero_filled() {
        let destination = df!("CDst" => ["D1"], "Provincia" => ["Maputo"]).unwrap();
        let lookups = LookupTables::from_sheets(vec![
            DataFrame::empty(),
            destination,
        ]);
        let views = enrich(&sales_frame(), &lookups, &DataFrame::empty())
            .unwrap()
            .ready()
            .unwrap();
        let df = &views.enriched;
        for gone in sales::CONSUMED_BY_JOIN {
            assert!(df.column(gone).is_err(), "{gone} should be dropped");
        }
        let provinces: Vec<Option<&str>> =
            df.column("Provincia").unwrap().str().unwrap().into_iter().collect();
        assert_eq!(provinces, vec![Some("Maputo"), Some("0")]);
        assert_eq!(df.column("Dia").unwrap().i32().unwrap().get(0), Some(15));
    }

    #[test]
    fn plan_joins_on_composite_key() {
        let plan = prepare_plan(
            df!(
                "Data_Facturacao" => ["15/03/2025", "15/03/2025"],
                "Emissor" => ["E1", "E1"],
                "CDst" => ["D1", "D1"],
                "Material" => ["M1", "M1"],
                "Plano_m³" => ["120", "999"],
            )
            .unwrap(),
        )
        .unwrap();
        let views = enrich(&sales_frame(), &LookupTables::default(), &plan)
            .unwrap()
            .ready()
            .unwrap();
        let planned: Vec<f64> = views
            .enriched
            .column("Plano_m³")
            .unwrap()
            .f64()
            .unwrap()
            .into_no_null_iter()
            .collect();
        assert_eq!(planned, vec![120.0, 0.0]);
    }

    #[test]
    fn empty_sales_is_empty_outcome() {
        let out = enrich(&DataFrame::empty(), &LookupTables::default(), &DataFrame::empty()).unwrap();
        assert_eq!(out.empty_reason(), Some(&EmptyReason::UpstreamEmpty("sales")));
        let views = enrich_or_empty(&DataFrame::empty(), &LookupTables::default(), &DataFrame::empty());
        assert_eq!(views.enriched.height(), 0);
    }

    #[test]
    fn dedupe_keeps_first_per_composite_key() {
        let df = df!("a" => ["x", "x", "y"], "b" => ["1", "1", "1"], "v" => [1, 2, 3]).unwrap();
        let (out, dropped) = dedupe_first(&df, &["a", "b"]).unwrap();
        assert_eq!(dropped, 1);
        let v: Vec<i32> = out.column("v").unwrap().i32().unwrap().into_no_null_iter().collect();
        assert_eq!(v, vec![1, 3]);
    }
}
