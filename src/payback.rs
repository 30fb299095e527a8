use crate::schema::CashFlowPeriod;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;

pub const NOT_AVAILABLE: &str = "N/A";

/// When cumulative net cash first turns non-negative.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(untagged)]
pub enum PaybackPeriod {
    /// Label of the period, when the backend supplied one.
    Year(String),
    /// Periods elapsed after the opening (investment) period.
    Index(usize),
}

impl fmt::Display for PaybackPeriod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Year(year) => f.write_str(year),
            Self::Index(idx) => write!(f, "{}", idx),
        }
    }
}

/// Accumulates `net_change_in_cash` in order and reports the first period whose
/// running total is `>= 0`. `None` means payback is not reached within the horizon.
pub fn payback_period(periods: &[CashFlowPeriod]) -> Option<PaybackPeriod> {
    let mut cumulative = 0.0;
    for (idx, period) in periods.iter().enumerate() {
        cumulative += period.net_change_in_cash;
        if cumulative >= 0.0 {
            return Some(match &period.year {
                Some(year) => PaybackPeriod::Year(year.clone()),
                None => PaybackPeriod::Index(idx),
            });
        }
    }
    None
}

/// Convenience over a bare cash-flow series without period labels.
pub fn payback_from_series(cash_flows: &[f64]) -> Option<PaybackPeriod> {
    let periods: Vec<CashFlowPeriod> = cash_flows
        .iter()
        .map(|&net_change_in_cash| CashFlowPeriod {
            net_change_in_cash,
            ..Default::default()
        })
        .collect();
    payback_period(&periods)
}

pub fn payback_label(payback: Option<&PaybackPeriod>) -> String {
    payback
        .map(ToString::to_string)
        .unwrap_or_else(|| NOT_AVAILABLE.to_string())
}
