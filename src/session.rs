use std::collections::HashMap;
use std::time::Duration;

use chrono::{Datelike, Local, NaiveDate, NaiveDateTime};
use polars::prelude::*;
use tracing::{error, info};

use crate::aggregation::{
    self, Alert, BusinessLineRow, ExecutiveReport, ImportTotals, LineSummary, MarketShare,
};
use crate::cache::TimedCache;
use crate::config::DashboardConfig;
use crate::error::{DashError, DashResult, Outcome};
use crate::filter::{
    date_bounds, discover_filter_columns, DateRange, FilterOptions, FilterSchema, FilterSelection,
};
use crate::loader::{self, LookupTables, SchemaReport};
use crate::pipeline::{self, SalesViews};
use crate::schema::sales;

/// Dashboard sections. Only `Import` and `Sales` are built.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Mode {
    Import,
    Sales,
    Promoters,
    Stock,
    CashAndBanks,
    Kpis,
    Simulations,
}

impl Mode {
    pub const ALL: [Mode; 7] = [
        Mode::Import,
        Mode::Sales,
        Mode::Promoters,
        Mode::Stock,
        Mode::CashAndBanks,
        Mode::Kpis,
        Mode::Simulations,
    ];

    pub fn label(self) -> &'static str {
        match self {
            Mode::Import => "Importação",
            Mode::Sales => "Vendas",
            Mode::Promoters => "Promotores",
            Mode::Stock => "Stock",
            Mode::CashAndBanks => "Caixa_e_Bancos",
            Mode::Kpis => "KPIs",
            Mode::Simulations => "Simulacoes",
        }
    }

    pub fn filter_schema(self) -> Option<&'static FilterSchema> {
        match self {
            Mode::Import => Some(&FilterSchema::IMPORT),
            Mode::Sales => Some(&FilterSchema::SALES),
            _ => None,
        }
    }

    pub fn is_implemented(self) -> bool {
        self.filter_schema().is_some()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum Source {
    Sales,
    Plan,
    Imports,
}

/// Everything the sales section shows.
#[derive(Debug, Clone)]
pub struct SalesReport {
    pub business_lines: DataFrame,
    pub rows: Vec<BusinessLineRow>,
    pub summary: LineSummary,
    pub monthly: Outcome<DataFrame>,
}

/// Everything the import section shows.
#[derive(Debug, Clone)]
pub struct ImportReport {
    pub year: i32,
    pub ports: Outcome<DataFrame>,
    pub totals: Option<ImportTotals>,
    pub guarantees: Outcome<DataFrame>,
    pub market_share: Outcome<MarketShare>,
}

#[derive(Debug, Clone)]
pub enum ModeReport {
    Import(Outcome<ImportReport>),
    Sales(Outcome<SalesReport>),
}

/// Session state for one dashboard user: configuration, cached base tables,
/// the selected mode and a filter selection per mode.
pub struct Dashboard {
    config: DashboardConfig,
    mode: Mode,
    selections: HashMap<Mode, FilterSelection>,
    frames: TimedCache<Source, Outcome<DataFrame>>,
    lookups: TimedCache<(), Outcome<LookupTables>>,
    views: TimedCache<(), Outcome<SalesViews>>,
    sales_schema: Option<SchemaReport>,
    messages: Vec<String>,
    last_refresh: NaiveDateTime,
}

impl Dashboard {
    pub fn new(config: DashboardConfig) -> Self {
        let ttl = Duration::from_secs(config.cache_ttl_secs);
        Self {
            config,
            mode: Mode::Import,
            selections: HashMap::new(),
            frames: TimedCache::new(ttl),
            lookups: TimedCache::new(ttl),
            views: TimedCache::new(ttl),
            sales_schema: None,
            messages: Vec::new(),
            last_refresh: Local::now().naive_local(),
        }
    }

    pub fn config(&self) -> &DashboardConfig {
        &self.config
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    pub fn set_mode(&mut self, mode: Mode) {
        self.mode = mode;
    }

    pub fn last_refresh(&self) -> NaiveDateTime {
        self.last_refresh
    }

    /// Errors shown to the user since the last refresh.
    pub fn messages(&self) -> &[String] {
        &self.messages
    }

    /// Column check of the last sales load.
    pub fn sales_schema(&self) -> Option<&SchemaReport> {
        self.sales_schema.as_ref()
    }

    pub fn selection(&self, mode: Mode) -> FilterSelection {
        self.selections.get(&mode).cloned().unwrap_or_default()
    }

    /// Selection of the current mode, created empty on first use.
    pub fn selection_mut(&mut self) -> &mut FilterSelection {
        self.selections.entry(self.mode).or_default()
    }

    /// Drop every cached table so the next access reloads from disk.
    pub fn refresh(&mut self) {
        self.frames.invalidate_all();
        self.lookups.invalidate_all();
        self.views.invalidate_all();
        self.sales_schema = None;
        self.messages.clear();
        self.last_refresh = Local::now().naive_local();
        info!(at = %self.last_refresh, "dashboard data refreshed");
    }

    pub fn clear_filters(&mut self) {
        self.selections.clear();
    }

    fn base_frame(&mut self, source: Source) -> DashResult<Outcome<DataFrame>> {
        let config = &self.config;
        let loaded = self.frames.get_or_try_insert_with(source, || match source {
            Source::Sales => loader::load_sales(config),
            Source::Plan => loader::load_plan(config),
            Source::Imports => loader::load_imports(config),
        })?;
        Ok(loaded.clone())
    }

    /// Lookup tables; an unreadable workbook is reported and treated as empty.
    fn lookup_tables(&mut self) -> LookupTables {
        let config = &self.config;
        match self
            .lookups
            .get_or_try_insert_with((), || loader::load_lookup_tables(config))
        {
            Ok(Outcome::Ready(tables)) => tables.clone(),
            Ok(Outcome::Empty(_)) => LookupTables::default(),
            Err(e) => {
                error!(error = %e, "lookup workbook unreadable");
                self.messages
                    .push(format!("Erro ao carregar tabelas de referência: {e}"));
                LookupTables::default()
            }
        }
    }

    /// Enriched, local-currency and hard-currency sales.
    pub fn sales_views(&mut self) -> DashResult<Outcome<SalesViews>> {
        if let Some(views) = self.views.get(&()) {
            return Ok(views.clone());
        }

        let views = match self.base_frame(Source::Sales)? {
            Outcome::Ready(sales_df) => {
                self.sales_schema = Some(SchemaReport::check(&sales_df, &sales::REQUIRED, "sales"));
                let plan = self.base_frame(Source::Plan)?.into_frame_or_empty();
                let lookups = self.lookup_tables();
                pipeline::enrich(&sales_df, &lookups, &plan)?
            }
            Outcome::Empty(reason) => Outcome::Empty(reason),
        };
        self.views.insert((), views.clone());
        Ok(views)
    }

    pub fn imports(&mut self) -> DashResult<Outcome<DataFrame>> {
        self.base_frame(Source::Imports)
    }

    /// Enriched sales under the sales selection. Without a chosen date range
    /// the default range applies, clamped to the dates present.
    pub fn filtered_sales(&mut self) -> DashResult<Outcome<DataFrame>> {
        match self.sales_views()? {
            Outcome::Ready(views) => {
                let selection = self.active_selection(Mode::Sales, &views.enriched)?;
                selection.apply(&views.enriched, &FilterSchema::SALES)
            }
            Outcome::Empty(reason) => Ok(Outcome::Empty(reason)),
        }
    }

    pub fn filtered_imports(&mut self) -> DashResult<Outcome<DataFrame>> {
        self.imports()?.and_then(|df| {
            self.active_selection(Mode::Import, &df)?
                .apply(&df, &FilterSchema::IMPORT)
        })
    }

    fn active_selection(&self, mode: Mode, df: &DataFrame) -> DashResult<FilterSelection> {
        let mut selection = self.selection(mode);
        if selection.date_range.is_some() {
            return Ok(selection);
        }
        let Some(schema) = mode.filter_schema() else {
            return Ok(selection);
        };
        let today = Local::now().date_naive();
        let bounds = date_bounds(df, schema, today, self.config.default_range_start)?;
        selection.date_range = Some(self.effective_range(mode, today).clamp(bounds.start, bounds.end));
        Ok(selection)
    }

    /// Filter choices for `mode`, or `None` for modes without data.
    pub fn filter_options(&mut self, mode: Mode) -> DashResult<Option<FilterOptions>> {
        let Some(schema) = mode.filter_schema() else {
            return Ok(None);
        };
        let frame = match mode {
            Mode::Sales => self.sales_views()?.map(|v| v.enriched),
            _ => self.imports()?,
        };
        let Outcome::Ready(df) = frame else {
            return Ok(None);
        };
        let today = Local::now().date_naive();
        Ok(Some(FilterOptions::from_frame(
            &df,
            schema,
            today,
            self.config.default_range_start,
        )?))
    }

    /// Store `range` for the current mode, clamped to the observed dates.
    pub fn set_date_range(&mut self, range: DateRange) -> DashResult<DateRange> {
        let range = match self.filter_options(self.mode)? {
            Some(options) => range.clamp(options.min_date, options.max_date),
            None => range,
        };
        self.selection_mut().date_range = Some(range);
        Ok(range)
    }

    /// Low-cardinality columns of the current mode's data that the declared
    /// filters do not already cover.
    pub fn discovered_filter_columns(&mut self) -> DashResult<Vec<String>> {
        let Some(schema) = self.mode.filter_schema() else {
            return Ok(Vec::new());
        };
        let frame = match self.mode {
            Mode::Sales => self.sales_views()?.map(|v| v.enriched),
            _ => self.imports()?,
        };
        let Outcome::Ready(df) = frame else {
            return Ok(Vec::new());
        };
        let mut columns = discover_filter_columns(&df, self.config.filter_value_limit)?;
        columns.retain(|c| {
            !schema.categorical.contains(&c.as_str()) && !schema.date_columns.contains(&c.as_str())
        });
        Ok(columns)
    }

    #[tracing::instrument(skip(self))]
    pub fn sales_report(&mut self) -> DashResult<Outcome<SalesReport>> {
        let config = self.config.clone();
        self.filtered_sales()?.and_then(|df| {
            let rows = aggregation::business_line_rows(&df, &config)?;
            Ok(Outcome::Ready(SalesReport {
                business_lines: aggregation::render_business_lines(&rows, &config)?,
                summary: aggregation::line_summary(&rows),
                monthly: aggregation::monthly_sales_vs_plan(&df)?,
                rows,
            }))
        })
    }

    #[tracing::instrument(skip(self))]
    pub fn import_report(&mut self) -> DashResult<Outcome<ImportReport>> {
        let config = self.config.clone();
        let fallback_year = Local::now().year();
        self.filtered_imports()?.and_then(|df| {
            let port_rows = aggregation::port_rows(&df, &config)?;
            let totals = port_rows.as_ready().map(|rows| aggregation::import_totals(rows));
            let ports = match port_rows {
                Outcome::Ready(rows) => Outcome::Ready(aggregation::render_ports(&rows)?),
                Outcome::Empty(reason) => Outcome::Empty(reason),
            };
            Ok(Outcome::Ready(ImportReport {
                year: aggregation::dominant_year(&df, fallback_year)?,
                ports,
                totals,
                guarantees: aggregation::bank_guarantee_table(&df)?,
                market_share: aggregation::market_share(&df, &config)?,
            }))
        })
    }

    /// Report for the current mode; unbuilt modes are an error.
    pub fn current_report(&mut self) -> DashResult<ModeReport> {
        match self.mode {
            Mode::Import => Ok(ModeReport::Import(self.import_report()?)),
            Mode::Sales => Ok(ModeReport::Sales(self.sales_report()?)),
            other => Err(DashError::NotImplemented(other.label().to_string())),
        }
    }

    /// Alerts over the currently filtered sales and imports.
    pub fn alerts(&mut self) -> DashResult<Vec<Alert>> {
        let sales_df = self.filtered_sales()?.into_frame_or_empty();
        let imports = self.filtered_imports()?.into_frame_or_empty();
        aggregation::check_alerts(&sales_df, &imports)
    }

    pub fn executive_report(&mut self) -> DashResult<ExecutiveReport> {
        let sales_df = self.filtered_sales()?.into_frame_or_empty();
        let imports = self.filtered_imports()?.into_frame_or_empty();
        aggregation::executive_report(&sales_df, &imports)
    }

    /// Current selection's date range, defaulting to the configured start
    /// through `today`. The filtered views clamp the default to the data.
    pub fn effective_range(&self, mode: Mode, today: NaiveDate) -> DateRange {
        self.selection(mode)
            .date_range
            .unwrap_or_else(|| DateRange::new(self.config.default_range_start, today))
    }
}
