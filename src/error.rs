use polars::prelude::DataFrame;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum DashError {
    #[error("Polars error: {0}")]
    Polars(#[from] polars::error::PolarsError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Spreadsheet error: {0}")]
    Spreadsheet(#[from] calamine::Error),

    #[error("Excel export error: {0}")]
    Xlsx(#[from] rust_xlsxwriter::XlsxError),

    #[error("Config error: {0}")]
    Config(#[from] serde_json::Error),

    #[error("Validation: {0}")]
    Validation(String),

    #[error("InvalidData: {0}")]
    InvalidData(String),

    #[error("Module under development: {0}")]
    NotImplemented(String),
}

pub type DashResult<T> = Result<T, DashError>;

/// Why a stage produced no data even though nothing failed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EmptyReason {
    /// None of the configured source files exist.
    NoSourceFiles,
    /// Files exist but every one of them was empty or unreadable.
    SourcesEmpty,
    /// Filters removed every row.
    NoMatchingRows,
    /// An input this stage depends on was itself empty.
    UpstreamEmpty(&'static str),
    /// The expected columns are not present in the data.
    MissingColumns(Vec<String>),
}

impl std::fmt::Display for EmptyReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EmptyReason::NoSourceFiles => write!(f, "no source files found"),
            EmptyReason::SourcesEmpty => write!(f, "all source files were empty or unreadable"),
            EmptyReason::NoMatchingRows => write!(f, "no rows match the current filters"),
            EmptyReason::UpstreamEmpty(what) => write!(f, "{what} is empty"),
            EmptyReason::MissingColumns(cols) => write!(f, "missing columns: {}", cols.join(", ")),
        }
    }
}

/// Result of a stage that may legitimately yield nothing.
///
/// Failures travel as `Err(DashError)`; `Empty` is a degraded but valid state
/// that carries its reason so callers and tests can tell the two apart.
#[derive(Debug, Clone)]
pub enum Outcome<T> {
    Ready(T),
    Empty(EmptyReason),
}

impl<T> Outcome<T> {
    pub fn is_ready(&self) -> bool {
        matches!(self, Outcome::Ready(_))
    }

    pub fn ready(self) -> Option<T> {
        match self {
            Outcome::Ready(v) => Some(v),
            Outcome::Empty(_) => None,
        }
    }

    pub fn as_ready(&self) -> Option<&T> {
        match self {
            Outcome::Ready(v) => Some(v),
            Outcome::Empty(_) => None,
        }
    }

    pub fn empty_reason(&self) -> Option<&EmptyReason> {
        match self {
            Outcome::Ready(_) => None,
            Outcome::Empty(reason) => Some(reason),
        }
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Outcome<U> {
        match self {
            Outcome::Ready(v) => Outcome::Ready(f(v)),
            Outcome::Empty(reason) => Outcome::Empty(reason),
        }
    }

    pub fn and_then<U>(self, f: impl FnOnce(T) -> DashResult<Outcome<U>>) -> DashResult<Outcome<U>> {
        match self {
            Outcome::Ready(v) => f(v),
            Outcome::Empty(reason) => Ok(Outcome::Empty(reason)),
        }
    }
}

impl Outcome<DataFrame> {
    /// Collapse to a frame, using an empty one for `Empty`.
    pub fn into_frame_or_empty(self) -> DataFrame {
        match self {
            Outcome::Ready(df) => df,
            Outcome::Empty(_) => DataFrame::empty(),
        }
    }

    /// `Ready` for frames with rows, `Empty(reason)` otherwise.
    pub fn from_frame(df: DataFrame, reason: EmptyReason) -> Self {
        if df.height() == 0 {
            Outcome::Empty(reason)
        } else {
            Outcome::Ready(df)
        }
    }
}
