//! Fuel-distribution dashboard back end: loads sales, plan, import and
//! reference workbooks, reconciles them and produces the tables the
//! dashboard renders.

pub mod aggregation;
pub mod cache;
pub mod config;
pub mod convert;
pub mod error;
pub mod export;
pub mod filter;
pub mod loader;
pub mod normalize;
pub mod pipeline;
pub mod schema;
pub mod session;
pub mod telemetry;

pub use config::{DashboardConfig, StatusBands};
pub use error::{DashError, DashResult, EmptyReason, Outcome};
pub use filter::{DateRange, FilterSelection};
pub use session::{Dashboard, Mode, ModeReport};
