use crate::config::PeriodThresholds;
use crate::schema::{CashFlowPeriod, LineItemStatement, Period, Section};
use log::{debug, warn};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::Value;

const REVENUE_LABELS: [&str; 2] = ["Revenue", "Total Revenue"];
const EBITDA_LABELS: [&str; 1] = ["EBITDA"];
const FCF_LABELS: [&str; 3] = ["Free Cash Flow", "FCF", "Cash Flow"];

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct ClassifiedPeriods {
    pub periods: Vec<Period>,
    #[schemars(description = "Sections that occur, always in historical/current/forecast order.")]
    pub sections: Vec<Section>,
}

pub struct PeriodClassifier<'a> {
    thresholds: &'a PeriodThresholds,
}

impl<'a> PeriodClassifier<'a> {
    pub fn new(thresholds: &'a PeriodThresholds) -> Self {
        Self { thresholds }
    }

    /// Builds chart periods from the income statement, falling back to the
    /// cash-flow records for labels and FCF. Upstream `explicit` sections are
    /// used when they cover every period; otherwise the count heuristic applies.
    pub fn classify(
        &self,
        statement: &LineItemStatement,
        cash_flow: &[CashFlowPeriod],
        explicit: Option<&[Section]>,
    ) -> ClassifiedPeriods {
        let labels: Vec<String> = if !statement.years.is_empty() {
            statement.years.clone()
        } else {
            cash_flow
                .iter()
                .enumerate()
                .map(|(idx, cf)| cf.year.clone().unwrap_or_else(|| format!("Year {}", idx + 1)))
                .collect()
        };

        let total = labels.len();
        let sections = match explicit {
            Some(explicit) if explicit.len() == total => {
                debug!("Using {} upstream section labels", total);
                explicit.to_vec()
            }
            Some(explicit) => {
                warn!(
                    "Ignoring {} upstream section labels for {} periods; using count heuristic",
                    explicit.len(),
                    total
                );
                self.segment(total)
            }
            None => self.segment(total),
        };

        let revenue = statement.first_series(&REVENUE_LABELS);
        let ebitda = statement.first_series(&EBITDA_LABELS);
        let fcf = statement.first_series(&FCF_LABELS);
        let at = |series: Option<&[f64]>, idx: usize| series.and_then(|s| s.get(idx).copied());

        let periods: Vec<Period> = labels
            .into_iter()
            .zip(sections.iter().copied())
            .enumerate()
            .map(|(idx, (date, section))| Period {
                date,
                revenue: at(revenue, idx).unwrap_or(0.0),
                ebitda: at(ebitda, idx).unwrap_or(0.0),
                cash_flow: at(fcf, idx)
                    .or_else(|| cash_flow.get(idx).map(|cf| cf.net_change_in_cash))
                    .unwrap_or(0.0),
                section,
            })
            .collect();

        let present = Section::ORDER
            .into_iter()
            .filter(|s| sections.contains(s))
            .collect();

        ClassifiedPeriods {
            periods,
            sections: present,
        }
    }

    /// Section of every index for a series of `total` periods.
    ///
    /// Best-effort: the cut points are inferred from the count alone and can
    /// misplace irregular horizons.
    pub fn segment(&self, total: usize) -> Vec<Section> {
        let t = self.thresholds;
        let (historical, current) = if total >= t.full_history_min {
            (t.fixed_block_len, t.fixed_block_len)
        } else if total >= t.partial_history_min {
            let third = total / 3;
            (third.saturating_sub(1), third)
        } else if total >= t.current_min {
            (0, total / 2)
        } else {
            (0, 0)
        };

        (0..total)
            .map(|idx| {
                if idx < historical {
                    Section::Historical
                } else if idx < historical + current {
                    Section::Current
                } else {
                    Section::Forecast
                }
            })
            .collect()
    }
}

/// Reads upstream section labels from `sections` on the result or on its
/// income statement. Any unknown label invalidates the whole list.
pub fn explicit_sections(result: &Value) -> Option<Vec<Section>> {
    let raw = result
        .get("sections")
        .or_else(|| result.get("income_statement").and_then(|s| s.get("sections")))?
        .as_array()?;

    let parsed: Option<Vec<Section>> = raw
        .iter()
        .map(|v| v.as_str().and_then(Section::parse))
        .collect();

    if parsed.is_none() {
        warn!("Upstream section labels contain unknown values; ignoring them");
    }
    parsed
}

pub fn classify_periods(
    statement: &LineItemStatement,
    cash_flow: &[CashFlowPeriod],
    explicit: Option<&[Section]>,
    thresholds: &PeriodThresholds,
) -> ClassifiedPeriods {
    PeriodClassifier::new(thresholds).classify(statement, cash_flow, explicit)
}
