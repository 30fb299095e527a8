use crate::config::ScenarioDefaults;
use crate::scenario::{free_cash_flows, ScenarioResults};
use crate::utils::{optional_f64, period_label};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

/// Percentage-point slider offsets applied to the base forecast.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase", default)]
pub struct ScenarioAdjustments {
    pub revenue_growth: f64,
    pub operating_margin: f64,
    pub capex: f64,
    pub working_capital_days: f64,
    pub tax_rate: f64,
    pub wacc: f64,
    pub terminal_growth: f64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct SensitivityRange {
    pub low: f64,
    pub high: f64,
}

impl SensitivityRange {
    pub const fn new(low: f64, high: f64) -> Self {
        Self { low, high }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct ScenarioConfigs {
    pub best: ScenarioAdjustments,
    pub worst: ScenarioAdjustments,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct ScenarioRequest {
    pub base_forecast: Vec<Value>,
    pub scenario_configs: ScenarioConfigs,
    pub base_discount_rate: f64,
    pub base_terminal_growth: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct SensitivityRequest {
    pub base_forecast: Vec<Value>,
    pub sensitivity_ranges: BTreeMap<String, SensitivityRange>,
    pub base_discount_rate: f64,
    pub base_terminal_growth: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct MonteCarloRequest {
    pub free_cash_flows: Vec<f64>,
    pub discount_rate_range: [f64; 2],
    pub terminal_growth_range: [f64; 2],
    pub runs: u32,
}

/// Discount rate and terminal growth from the result's DCF block, with the
/// configured defaults for whatever is missing.
pub fn base_rates(result: &Value, defaults: &ScenarioDefaults) -> (f64, f64) {
    let dcf = result.get("dcf");
    let read = |key: &str| dcf.and_then(|d| d.get(key)).and_then(optional_f64);
    (
        read("discount_rate").unwrap_or(defaults.discount_rate),
        read("terminal_growth").unwrap_or(defaults.terminal_growth),
    )
}

/// Per-year forecast records. Uses `forecast` as is, otherwise pivots the
/// column-wise `projections` block into one object per year.
pub fn base_forecast(result: &Value) -> Vec<Value> {
    if let Some(rows) = result.get("forecast").and_then(Value::as_array) {
        if !rows.is_empty() {
            return rows.clone();
        }
    }

    let Some(projections) = result.get("projections").and_then(Value::as_object) else {
        return Vec::new();
    };
    let years: Vec<String> = projections
        .get("years")
        .and_then(Value::as_array)
        .map(|years| years.iter().filter_map(period_label).collect())
        .unwrap_or_default();

    let columns: Vec<(&String, &Vec<Value>)> = projections
        .iter()
        .filter(|(key, _)| key.as_str() != "years")
        .filter_map(|(key, value)| value.as_array().map(|values| (key, values)))
        .collect();
    let len = columns
        .iter()
        .map(|(_, values)| values.len())
        .max()
        .unwrap_or(0)
        .max(years.len());

    (0..len)
        .map(|idx| {
            let mut record = Map::new();
            let year = years
                .get(idx)
                .cloned()
                .unwrap_or_else(|| format!("Year {}", idx + 1));
            record.insert("year".to_string(), Value::String(year));
            for (key, values) in &columns {
                let value = values
                    .get(idx)
                    .and_then(optional_f64)
                    .map(Value::from)
                    .unwrap_or(Value::from(0.0));
                record.insert(key.to_string(), value);
            }
            Value::Object(record)
        })
        .collect()
}

impl ScenarioRequest {
    pub fn from_result(
        result: &Value,
        best: &ScenarioAdjustments,
        worst: &ScenarioAdjustments,
        defaults: &ScenarioDefaults,
    ) -> Self {
        let (base_discount_rate, base_terminal_growth) = base_rates(result, defaults);
        Self {
            base_forecast: base_forecast(result),
            scenario_configs: ScenarioConfigs {
                best: best.clone(),
                worst: worst.clone(),
            },
            base_discount_rate,
            base_terminal_growth,
        }
    }
}

impl SensitivityRequest {
    pub fn from_result(result: &Value, defaults: &ScenarioDefaults) -> Self {
        let (base_discount_rate, base_terminal_growth) = base_rates(result, defaults);
        Self {
            base_forecast: base_forecast(result),
            sensitivity_ranges: defaults.sensitivity_ranges.clone(),
            base_discount_rate,
            base_terminal_growth,
        }
    }
}

impl MonteCarloRequest {
    pub fn from_result(result: &Value, defaults: &ScenarioDefaults) -> Self {
        let mc = &defaults.monte_carlo;
        Self {
            free_cash_flows: free_cash_flows(result),
            discount_rate_range: [mc.discount_rate_range.0, mc.discount_rate_range.1],
            terminal_growth_range: [mc.terminal_growth_range.0, mc.terminal_growth_range.1],
            runs: mc.runs,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct ScenarioResponse {
    #[serde(default)]
    pub scenarios: ScenarioResults,
    pub base_discount_rate: Option<f64>,
    pub base_terminal_growth: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct TornadoBar {
    pub variable: String,
    #[schemars(description = "Percent change of NPV versus base at the low end of the range.")]
    pub low_impact: f64,
    pub high_impact: f64,
    pub low_npv: f64,
    pub high_npv: f64,
    pub base_npv: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct SensitivityCell {
    pub growth: f64,
    pub dcf: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct SensitivityRow {
    pub wacc: f64,
    #[serde(default)]
    pub values: Vec<SensitivityCell>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct SensitivityResponse {
    pub tornado_data: Vec<TornadoBar>,
    pub sensitivity_matrix: Vec<SensitivityRow>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct HistogramBin {
    pub bin: String,
    pub count: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct MonteCarloResponse {
    #[serde(rename = "npvDistribution", default)]
    pub npv_distribution: Vec<HistogramBin>,
}

impl MonteCarloResponse {
    pub fn total_runs(&self) -> u64 {
        self.npv_distribution.iter().map(|b| b.count).sum()
    }
}
