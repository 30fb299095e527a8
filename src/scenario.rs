//! Base/best/worst scenario merging.
//!
//! The aggregator is a pure function of the locally derived baseline and the
//! scenario service's last accepted response. When the service has no result
//! for `base`, the local baseline stands in; `best` and `worst` have no local
//! fallback and stay empty.

use crate::ingestion::NormalizedStatements;
use crate::utils::{field_f64, optional_f64, period_label, safe_divide, value_as_f64};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum ScenarioName {
    Base,
    Best,
    Worst,
}

impl ScenarioName {
    pub const ALL: [ScenarioName; 3] = [ScenarioName::Base, ScenarioName::Best, ScenarioName::Worst];

    pub fn label(self) -> &'static str {
        match self {
            Self::Base => "Base Case",
            Self::Best => "Best Case",
            Self::Worst => "Worst Case",
        }
    }
}

impl fmt::Display for ScenarioName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let key = match self {
            Self::Base => "base",
            Self::Best => "best",
            Self::Worst => "worst",
        };
        f.write_str(key)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum KpiKey {
    Npv,
    Irr,
    PaybackPeriod,
    CumulativeFcf,
    #[serde(rename = "year_1_revenue")]
    Year1Revenue,
    #[serde(rename = "year_5_revenue")]
    Year5Revenue,
    #[serde(rename = "year_1_gross_margin")]
    Year1GrossMargin,
    #[serde(rename = "year_1_net_margin")]
    Year1NetMargin,
}

impl KpiKey {
    pub const ALL: [KpiKey; 8] = [
        KpiKey::Npv,
        KpiKey::Irr,
        KpiKey::PaybackPeriod,
        KpiKey::CumulativeFcf,
        KpiKey::Year1Revenue,
        KpiKey::Year5Revenue,
        KpiKey::Year1GrossMargin,
        KpiKey::Year1NetMargin,
    ];

    pub fn label(self) -> &'static str {
        match self {
            Self::Npv => "NPV",
            Self::Irr => "IRR",
            Self::PaybackPeriod => "Payback Period",
            Self::CumulativeFcf => "Cumulative FCF",
            Self::Year1Revenue => "Year 1 Revenue",
            Self::Year5Revenue => "Year 5 Revenue",
            Self::Year1GrossMargin => "Year 1 Gross Margin",
            Self::Year1NetMargin => "Year 1 Net Margin",
        }
    }

    /// Payback is the only KPI where a smaller number is the better outcome.
    pub fn higher_is_better(self) -> bool {
        !matches!(self, Self::PaybackPeriod)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct ScenarioKpiSet {
    pub npv: Option<f64>,
    pub irr: Option<f64>,
    pub payback_period: Option<f64>,
    pub cumulative_fcf: Option<f64>,
    pub year_1_revenue: Option<f64>,
    pub year_5_revenue: Option<f64>,
    #[schemars(description = "Percent (0-100), as reported by the scenario service.")]
    pub year_1_gross_margin: Option<f64>,
    #[schemars(description = "Percent (0-100), as reported by the scenario service.")]
    pub year_1_net_margin: Option<f64>,
}

impl ScenarioKpiSet {
    pub fn get(&self, key: KpiKey) -> Option<f64> {
        let value = match key {
            KpiKey::Npv => self.npv,
            KpiKey::Irr => self.irr,
            KpiKey::PaybackPeriod => self.payback_period,
            KpiKey::CumulativeFcf => self.cumulative_fcf,
            KpiKey::Year1Revenue => self.year_1_revenue,
            KpiKey::Year5Revenue => self.year_5_revenue,
            KpiKey::Year1GrossMargin => self.year_1_gross_margin,
            KpiKey::Year1NetMargin => self.year_1_net_margin,
        };
        value.filter(|v| v.is_finite())
    }
}

/// One scenario as returned by the scenario service.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct ScenarioOutcome {
    #[serde(flatten)]
    pub kpis: ScenarioKpiSet,
    #[serde(default)]
    pub free_cash_flows: Vec<f64>,
    #[serde(default)]
    pub adjusted_forecast: Vec<Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct ScenarioResults {
    pub base: Option<ScenarioOutcome>,
    pub best: Option<ScenarioOutcome>,
    pub worst: Option<ScenarioOutcome>,
}

impl ScenarioResults {
    pub fn get(&self, scenario: ScenarioName) -> Option<&ScenarioOutcome> {
        match scenario {
            ScenarioName::Base => self.base.as_ref(),
            ScenarioName::Best => self.best.as_ref(),
            ScenarioName::Worst => self.worst.as_ref(),
        }
    }
}

/// Base-case figures derived from the calculation result alone.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct LocalBaseline {
    pub kpis: ScenarioKpiSet,
    pub years: Vec<String>,
    pub free_cash_flows: Vec<f64>,
}

impl LocalBaseline {
    pub fn from_result(result: &Value, statements: &NormalizedStatements) -> Self {
        let income = statements.income();

        let free_cash_flows = free_cash_flows(result);
        let revenue = series_from(result, "revenue", "revenue")
            .or_else(|| income.series("Revenue").map(<[f64]>::to_vec))
            .unwrap_or_default();

        let years = result
            .get("projections")
            .and_then(|p| p.get("years"))
            .and_then(Value::as_array)
            .map(|years| years.iter().filter_map(period_label).collect::<Vec<_>>())
            .filter(|years| !years.is_empty())
            .or_else(|| {
                result
                    .get("forecast")
                    .and_then(Value::as_array)
                    .map(|rows| rows.iter().filter_map(|r| r.get("year").and_then(period_label)).collect())
            })
            .filter(|years: &Vec<String>| !years.is_empty())
            .unwrap_or_else(|| income.years.clone());

        let valuation = result.get("valuation");
        let valuation_field = |key: &str| valuation.and_then(|v| field_f64(v, key));

        let base_revenue = income.first_present(&["Revenue"]).unwrap_or(0.0);
        let gross_profit = income
            .first_present(&["Gross Profit"])
            .unwrap_or_else(|| base_revenue - income.find_value("Cogs"));
        let margin = |numerator: f64| {
            if base_revenue == 0.0 {
                None
            } else {
                Some(safe_divide(numerator, base_revenue) * 100.0)
            }
        };

        let kpis = ScenarioKpiSet {
            npv: valuation_field("npv"),
            irr: valuation_field("irr"),
            payback_period: valuation_field("payback_period"),
            cumulative_fcf: if free_cash_flows.is_empty() {
                None
            } else {
                Some(free_cash_flows.iter().sum())
            },
            year_1_revenue: revenue.first().copied(),
            year_5_revenue: revenue.get(4).copied(),
            year_1_gross_margin: margin(gross_profit),
            year_1_net_margin: margin(income.find_value("Net Income")),
        };

        Self {
            kpis,
            years,
            free_cash_flows,
        }
    }
}

/// FCF series from `dcf.free_cash_flows`, then `projections.free_cash_flow`,
/// then `forecast[].free_cash_flow`.
pub fn free_cash_flows(result: &Value) -> Vec<f64> {
    result
        .get("dcf")
        .and_then(|d| d.get("free_cash_flows"))
        .and_then(Value::as_array)
        .map(|values| values.iter().map(value_as_f64).collect::<Vec<_>>())
        .filter(|values| !values.is_empty())
        .or_else(|| series_from(result, "free_cash_flow", "free_cash_flow"))
        .unwrap_or_default()
}

/// `projections.<projection_key>` or the `<forecast_key>` column of `forecast`.
fn series_from(result: &Value, projection_key: &str, forecast_key: &str) -> Option<Vec<f64>> {
    result
        .get("projections")
        .and_then(|p| p.get(projection_key))
        .and_then(Value::as_array)
        .map(|values| values.iter().map(value_as_f64).collect::<Vec<_>>())
        .filter(|values| !values.is_empty())
        .or_else(|| {
            result
                .get("forecast")
                .and_then(Value::as_array)
                .map(|rows| {
                    rows.iter()
                        .map(|row| row.get(forecast_key).and_then(optional_f64).unwrap_or(0.0))
                        .collect::<Vec<_>>()
                })
                .filter(|values| !values.is_empty())
        })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum KpiSource {
    Service,
    LocalFallback,
    Missing,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct ScenarioChartRow {
    pub scenario: ScenarioName,
    pub label: String,
    pub npv: f64,
    pub irr: f64,
    pub cumulative_fcf: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct FcfComparisonPoint {
    pub year: String,
    pub base: Option<f64>,
    pub best: Option<f64>,
    pub worst: Option<f64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum Highlight {
    None,
    /// Rendered green.
    Favorable,
    /// Rendered red.
    Unfavorable,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct ComparisonCell {
    pub scenario: ScenarioName,
    pub value: Option<f64>,
    pub is_max: bool,
    pub is_min: bool,
    pub highlight: Highlight,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct ComparisonRow {
    pub metric: KpiKey,
    pub label: String,
    pub higher_is_better: bool,
    pub cells: Vec<ComparisonCell>,
}

impl ComparisonRow {
    pub fn cell(&self, scenario: ScenarioName) -> Option<&ComparisonCell> {
        self.cells.iter().find(|c| c.scenario == scenario)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct ScenarioComparison {
    pub sources: Vec<(ScenarioName, KpiSource)>,
    pub chart: Vec<ScenarioChartRow>,
    pub fcf: Vec<FcfComparisonPoint>,
    pub table: Vec<ComparisonRow>,
}

pub struct ScenarioAggregator<'a> {
    local: &'a LocalBaseline,
    external: Option<&'a ScenarioResults>,
}

impl<'a> ScenarioAggregator<'a> {
    pub fn new(local: &'a LocalBaseline, external: Option<&'a ScenarioResults>) -> Self {
        Self { local, external }
    }

    pub fn source(&self, scenario: ScenarioName) -> KpiSource {
        if self.external.and_then(|r| r.get(scenario)).is_some() {
            KpiSource::Service
        } else if scenario == ScenarioName::Base {
            KpiSource::LocalFallback
        } else {
            KpiSource::Missing
        }
    }

    pub fn kpi_set(&self, scenario: ScenarioName) -> Option<&'a ScenarioKpiSet> {
        match self.external.and_then(|r| r.get(scenario)) {
            Some(outcome) => Some(&outcome.kpis),
            None if scenario == ScenarioName::Base => Some(&self.local.kpis),
            None => None,
        }
    }

    pub fn get_scenario_kpi(&self, scenario: ScenarioName, key: KpiKey) -> Option<f64> {
        self.kpi_set(scenario).and_then(|set| set.get(key))
    }

    pub fn fcf_series(&self, scenario: ScenarioName) -> Option<&'a [f64]> {
        let external = self
            .external
            .and_then(|r| r.get(scenario))
            .map(|o| o.free_cash_flows.as_slice())
            .filter(|s| !s.is_empty());
        match external {
            Some(series) => Some(series),
            None if scenario == ScenarioName::Base && !self.local.free_cash_flows.is_empty() => {
                Some(self.local.free_cash_flows.as_slice())
            }
            None => None,
        }
    }

    /// Three rows (base, best, worst); missing KPIs plot as 0.
    pub fn comparison_chart(&self) -> Vec<ScenarioChartRow> {
        ScenarioName::ALL
            .into_iter()
            .map(|scenario| ScenarioChartRow {
                scenario,
                label: scenario.label().to_string(),
                npv: self.get_scenario_kpi(scenario, KpiKey::Npv).unwrap_or(0.0),
                irr: self.get_scenario_kpi(scenario, KpiKey::Irr).unwrap_or(0.0),
                cumulative_fcf: self
                    .get_scenario_kpi(scenario, KpiKey::CumulativeFcf)
                    .unwrap_or(0.0),
            })
            .collect()
    }

    pub fn fcf_comparison(&self) -> Vec<FcfComparisonPoint> {
        let base = self.fcf_series(ScenarioName::Base);
        let best = self.fcf_series(ScenarioName::Best);
        let worst = self.fcf_series(ScenarioName::Worst);
        let len = [base, best, worst]
            .iter()
            .map(|s| s.map(<[f64]>::len).unwrap_or(0))
            .max()
            .unwrap_or(0);
        let at = |series: Option<&[f64]>, idx: usize| series.and_then(|s| s.get(idx).copied());

        (0..len)
            .map(|idx| FcfComparisonPoint {
                year: self
                    .local
                    .years
                    .get(idx)
                    .cloned()
                    .unwrap_or_else(|| format!("Year {}", idx + 1)),
                base: at(base, idx),
                best: at(best, idx),
                worst: at(worst, idx),
            })
            .collect()
    }

    pub fn comparison_table(&self) -> Vec<ComparisonRow> {
        KpiKey::ALL
            .into_iter()
            .map(|metric| {
                let values: Vec<(ScenarioName, Option<f64>)> = ScenarioName::ALL
                    .into_iter()
                    .map(|s| (s, self.get_scenario_kpi(s, metric)))
                    .collect();
                build_row(metric, &values)
            })
            .collect()
    }

    pub fn compare(&self) -> ScenarioComparison {
        ScenarioComparison {
            sources: ScenarioName::ALL
                .into_iter()
                .map(|s| (s, self.source(s)))
                .collect(),
            chart: self.comparison_chart(),
            fcf: self.fcf_comparison(),
            table: self.comparison_table(),
        }
    }
}

/// Flags the row extremes among the finite values. Rows with fewer than two
/// distinct values carry no highlight.
pub fn build_row(metric: KpiKey, values: &[(ScenarioName, Option<f64>)]) -> ComparisonRow {
    let valid: Vec<f64> = values
        .iter()
        .filter_map(|(_, v)| v.filter(|x| x.is_finite()))
        .collect();
    let max = valid.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let min = valid.iter().copied().fold(f64::INFINITY, f64::min);
    let distinct = valid.len() >= 2 && max > min;
    let higher_is_better = metric.higher_is_better();

    let cells = values
        .iter()
        .map(|&(scenario, value)| {
            let finite = value.filter(|x| x.is_finite());
            let is_max = distinct && finite == Some(max);
            let is_min = distinct && finite == Some(min);
            let highlight = match (is_max, is_min, higher_is_better) {
                (true, _, true) | (_, true, false) => Highlight::Favorable,
                (_, true, true) | (true, _, false) => Highlight::Unfavorable,
                _ => Highlight::None,
            };
            ComparisonCell {
                scenario,
                value: finite,
                is_max,
                is_min,
                highlight,
            }
        })
        .collect();

    ComparisonRow {
        metric,
        label: metric.label().to_string(),
        higher_is_better,
        cells,
    }
}

pub fn aggregate_scenarios(
    local: &LocalBaseline,
    external: Option<&ScenarioResults>,
) -> ScenarioComparison {
    ScenarioAggregator::new(local, external).compare()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ingestion::normalize_result;
    use serde_json::json;

    fn outcome(npv: f64, fcf: Vec<f64>) -> ScenarioOutcome {
        ScenarioOutcome {
            kpis: ScenarioKpiSet {
                npv: Some(npv),
                irr: Some(npv / 1000.0),
                cumulative_fcf: Some(fcf.iter().sum()),
                ..Default::default()
            },
            free_cash_flows: fcf,
            adjusted_forecast: Vec::new(),
        }
    }

    fn local() -> LocalBaseline {
        LocalBaseline {
            kpis: ScenarioKpiSet {
                npv: Some(90.0),
                cumulative_fcf: Some(30.0),
                ..Default::default()
            },
            years: vec!["2024".to_string(), "2025".to_string()],
            free_cash_flows: vec![10.0, 20.0],
        }
    }

    #[test]
    fn test_table_highlights_extremes() {
        let local = local();
        let external = ScenarioResults {
            base: Some(outcome(100.0, vec![1.0])),
            best: Some(outcome(200.0, vec![2.0])),
            worst: Some(outcome(50.0, vec![0.5])),
        };
        let aggregator = ScenarioAggregator::new(&local, Some(&external));
        let table = aggregator.comparison_table();
        let npv = table.iter().find(|r| r.metric == KpiKey::Npv).unwrap();

        let best = npv.cell(ScenarioName::Best).unwrap();
        assert!(best.is_max);
        assert_eq!(best.highlight, Highlight::Favorable);

        let worst = npv.cell(ScenarioName::Worst).unwrap();
        assert!(worst.is_min);
        assert_eq!(worst.highlight, Highlight::Unfavorable);

        let base = npv.cell(ScenarioName::Base).unwrap();
        assert!(!base.is_max && !base.is_min);
        assert_eq!(base.highlight, Highlight::None);
    }

    #[test]
    fn test_base_falls_back_to_local() {
        let local = local();
        let aggregator = ScenarioAggregator::new(&local, None);

        assert_eq!(aggregator.get_scenario_kpi(ScenarioName::Base, KpiKey::Npv), Some(90.0));
        assert_eq!(aggregator.get_scenario_kpi(ScenarioName::Best, KpiKey::Npv), None);
        assert_eq!(aggregator.get_scenario_kpi(ScenarioName::Worst, KpiKey::Irr), None);
        assert_eq!(aggregator.source(ScenarioName::Base), KpiSource::LocalFallback);
        assert_eq!(aggregator.source(ScenarioName::Best), KpiSource::Missing);

        let chart = aggregator.comparison_chart();
        assert_eq!(chart.len(), 3);
        assert_eq!(chart[0].npv, 90.0);
        assert_eq!(chart[1].npv, 0.0);
        assert_eq!(chart[2].cumulative_fcf, 0.0);
    }

    #[test]
    fn test_partial_service_response() {
        let local = local();
        let external = ScenarioResults {
            base: None,
            best: Some(outcome(300.0, vec![5.0, 6.0, 7.0])),
            worst: None,
        };
        let aggregator = ScenarioAggregator::new(&local, Some(&external));
        assert_eq!(aggregator.source(ScenarioName::Base), KpiSource::LocalFallback);
        assert_eq!(aggregator.source(ScenarioName::Best), KpiSource::Service);

        let fcf = aggregator.fcf_comparison();
        assert_eq!(fcf.len(), 3);
        assert_eq!(fcf[0].year, "2024");
        assert_eq!(fcf[2].year, "Year 3");
        assert_eq!(fcf[1].base, Some(20.0));
        assert_eq!(fcf[2].base, None);
        assert_eq!(fcf[2].best, Some(7.0));
        assert_eq!(fcf[0].worst, None);

        // base 90 vs best 300: worst column is missing and never flagged
        let table = aggregator.comparison_table();
        let npv = table.iter().find(|r| r.metric == KpiKey::Npv).unwrap();
        assert!(npv.cell(ScenarioName::Best).unwrap().is_max);
        assert!(npv.cell(ScenarioName::Base).unwrap().is_min);
        assert_eq!(npv.cell(ScenarioName::Worst).unwrap().highlight, Highlight::None);
    }

    #[test]
    fn test_nan_and_single_values_not_flagged() {
        let row = build_row(
            KpiKey::Irr,
            &[
                (ScenarioName::Base, Some(f64::NAN)),
                (ScenarioName::Best, Some(0.2)),
                (ScenarioName::Worst, None),
            ],
        );
        assert!(row.cells.iter().all(|c| c.highlight == Highlight::None));
        assert_eq!(row.cells[0].value, None);

        let row = build_row(
            KpiKey::Npv,
            &[
                (ScenarioName::Base, Some(5.0)),
                (ScenarioName::Best, Some(5.0)),
                (ScenarioName::Worst, Some(5.0)),
            ],
        );
        assert!(row.cells.iter().all(|c| !c.is_max && !c.is_min));
    }

    #[test]
    fn test_payback_lower_is_better() {
        let row = build_row(
            KpiKey::PaybackPeriod,
            &[
                (ScenarioName::Base, Some(3.0)),
                (ScenarioName::Best, Some(2.0)),
                (ScenarioName::Worst, Some(4.5)),
            ],
        );
        assert!(!row.higher_is_better);
        assert_eq!(row.cells[1].highlight, Highlight::Favorable);
        assert!(row.cells[1].is_min);
        assert_eq!(row.cells[2].highlight, Highlight::Unfavorable);
    }

    #[test]
    fn test_local_baseline_from_result() {
        let result = json!({
            "income_statement": {
                "years": ["2024", "2025"],
                "line_items": [
                    {"label": "Revenue", "values": [1000, 1100]},
                    {"label": "Gross Profit", "values": [400, 450]},
                    {"label": "Net Income", "values": [100, 120]}
                ]
            },
            "projections": {
                "years": [2024, 2025, 2026, 2027, 2028],
                "revenue": [1000, 1100, 1200, 1300, 1400],
                "free_cash_flow": [-50, 20, 30, 40, 50]
            },
            "valuation": {"npv": 75.5, "irr": 0.18, "payback_period": null}
        });
        let statements = normalize_result(&result);
        let baseline = LocalBaseline::from_result(&result, &statements);

        assert_eq!(baseline.kpis.npv, Some(75.5));
        assert_eq!(baseline.kpis.irr, Some(0.18));
        assert_eq!(baseline.kpis.payback_period, None);
        assert_eq!(baseline.kpis.cumulative_fcf, Some(90.0));
        assert_eq!(baseline.kpis.year_1_revenue, Some(1000.0));
        assert_eq!(baseline.kpis.year_5_revenue, Some(1400.0));
        assert!((baseline.kpis.year_1_gross_margin.unwrap() - 40.0).abs() < 1e-9);
        assert!((baseline.kpis.year_1_net_margin.unwrap() - 10.0).abs() < 1e-9);
        assert_eq!(baseline.years.len(), 5);
        assert_eq!(baseline.years[4], "2028");
    }

    #[test]
    fn test_fcf_priority() {
        let result = json!({
            "dcf": {"free_cash_flows": [1, 2]},
            "projections": {"free_cash_flow": [9, 9, 9]},
            "forecast": [{"free_cash_flow": 7}]
        });
        assert_eq!(free_cash_flows(&result), vec![1.0, 2.0]);

        let result = json!({"forecast": [{"year": 2024, "free_cash_flow": 7}, {"year": 2025}]});
        assert_eq!(free_cash_flows(&result), vec![7.0, 0.0]);
        assert!(free_cash_flows(&json!({})).is_empty());
    }

    #[test]
    fn test_service_response_deserializes() {
        let raw = json!({
            "base": {"npv": 100.0, "irr": null, "payback_period": 2.5, "free_cash_flows": [1, 2]},
            "best": {"npv": 200.0, "adjusted_forecast": [{"year": 2024}]}
        });
        let results: ScenarioResults = serde_json::from_value(raw).unwrap();
        let base = results.base.unwrap();
        assert_eq!(base.kpis.npv, Some(100.0));
        assert_eq!(base.kpis.irr, None);
        assert_eq!(base.kpis.payback_period, Some(2.5));
        assert_eq!(base.free_cash_flows, vec![1.0, 2.0]);
        assert_eq!(results.best.unwrap().adjusted_forecast.len(), 1);
        assert!(results.worst.is_none());
    }
}
