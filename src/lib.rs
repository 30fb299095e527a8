//! # Financial Results Engine
//!
//! Turns the loosely-typed JSON a financial calculation backend returns into
//! the canonical statements and derived metrics a dashboard renders.
//!
//! ## Core Concepts
//!
//! - **Canonical statement**: `{years, line_items}` with one value per period per line item
//! - **Breakdown**: category shares of revenue or expenses, resolved from the first source that has data
//! - **Sections**: historical / current / forecast segmentation of the period axis
//! - **Ratios**: DuPont decomposition and a wider ratio set of the base (first) year
//! - **Payback**: first period where cumulative net cash turns non-negative
//! - **Scenarios**: base/best/worst KPIs from the scenario service, with a local base fallback
//!
//! Missing data never fails a derivation: absent figures read as 0, unavailable
//! ratios are flagged, and a missing statement yields empty output.
//!
//! ## Example
//!
//! ```rust,ignore
//! use financial_results_engine::*;
//! use serde_json::json;
//!
//! let result = json!({
//!     "income_statement": {
//!         "years": ["2024", "2025"],
//!         "line_items": [
//!             {"label": "Revenue", "values": [1000000, 1150000]},
//!             {"label": "Net Income", "values": [135000, 160000]}
//!         ]
//!     },
//!     "operating_expenses": {"Rent": 1000, "Payroll": 3000},
//!     "cash_flow": [
//!         {"year": "2024", "net_change_in_cash": -100000},
//!         {"year": "2025", "net_change_in_cash": 140000}
//!     ]
//! });
//!
//! let view = process_result(&result, &EngineConfig::default()).unwrap();
//! assert_eq!(view.payback_label, "2025");
//! ```

pub mod breakdown;
pub mod config;
pub mod error;
pub mod ingestion;
pub mod payback;
pub mod periods;
pub mod ratios;
pub mod scenario;
pub mod schema;
pub mod services;
pub mod session;
pub mod utils;
pub mod view;

pub use breakdown::{category_color, resolve_breakdown, BreakdownKind, BreakdownResolver};
pub use config::*;
pub use error::{DashboardError, Result};
pub use ingestion::*;
pub use payback::*;
pub use periods::{classify_periods, explicit_sections, ClassifiedPeriods, PeriodClassifier};
pub use ratios::*;
pub use scenario::*;
pub use schema::*;
pub use services::*;
pub use session::*;
pub use view::*;

use log::{debug, info};
use serde_json::Value;

pub struct ResultsProcessor;

impl ResultsProcessor {
    pub fn process(result: &Value, config: &EngineConfig) -> Result<DashboardView> {
        config.validate()?;

        info!(
            "Processing calculation result ({} top-level fields)",
            result.as_object().map(|o| o.len()).unwrap_or(0)
        );

        Ok(build_dashboard_view(result, None, config))
    }

    /// Parses a raw response body and processes it. A body that is not JSON is
    /// the only input this rejects.
    pub fn process_json(body: &str, config: &EngineConfig) -> Result<DashboardView> {
        let result: Value = serde_json::from_str(body)?;
        debug!("Parsed calculation result ({} bytes)", body.len());
        Self::process(&result, config)
    }
}

pub fn process_result(result: &Value, config: &EngineConfig) -> Result<DashboardView> {
    ResultsProcessor::process(result, config)
}

pub fn process_result_json(body: &str, config: &EngineConfig) -> Result<DashboardView> {
    ResultsProcessor::process_json(body, config)
}
