use crate::error::{DashboardError, Result};
use crate::ratios::RatioKind;
use crate::services::types::{ScenarioAdjustments, SensitivityRange};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

/// Every tunable constant the engine uses. Missing fields fall back to defaults,
/// so `{}` is a valid configuration document.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct EngineConfig {
    pub periods: PeriodThresholds,
    pub colors: ColorConfig,
    pub ratio_thresholds: RatioThresholds,
    pub scenario: ScenarioDefaults,
    pub service: ServiceConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct PeriodThresholds {
    #[schemars(description = "Series at least this long get the fixed historical/current/forecast split.")]
    pub full_history_min: usize,

    #[schemars(description = "Series at least this long (and below `full_history_min`) are split in thirds.")]
    pub partial_history_min: usize,

    #[schemars(description = "Series at least this long (and below `partial_history_min`) get current/forecast halves.")]
    pub current_min: usize,

    #[schemars(description = "Length of the historical and of the current block in the fixed split.")]
    pub fixed_block_len: usize,
}

impl Default for PeriodThresholds {
    fn default() -> Self {
        Self {
            full_history_min: 9,
            partial_history_min: 6,
            current_min: 2,
            fixed_block_len: 4,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct ColorConfig {
    #[schemars(description = "HSL saturation (percent) for derived category colours.")]
    pub saturation: u8,

    #[schemars(description = "HSL lightness (percent) for derived category colours.")]
    pub lightness: u8,
}

impl Default for ColorConfig {
    fn default() -> Self {
        Self {
            saturation: 65,
            lightness: 55,
        }
    }
}

/// Two cut-offs per ratio. For regular ratios `value >= good` is Good and
/// `value >= caution` is Caution; inverted ratios flip both comparisons.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct RatioThreshold {
    pub good: f64,
    pub caution: f64,
    #[serde(default)]
    pub inverted: bool,
}

impl RatioThreshold {
    pub const fn higher(good: f64, caution: f64) -> Self {
        Self {
            good,
            caution,
            inverted: false,
        }
    }

    pub const fn lower(good: f64, caution: f64) -> Self {
        Self {
            good,
            caution,
            inverted: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct RatioThresholds {
    pub net_profit_margin: RatioThreshold,
    pub operating_margin: RatioThreshold,
    pub gross_profit_ratio: RatioThreshold,
    pub return_on_equity: RatioThreshold,
    pub return_on_assets: RatioThreshold,
    pub roce: RatioThreshold,
    pub current_ratio: RatioThreshold,
    pub quick_ratio: RatioThreshold,
    pub cash_ratio: RatioThreshold,
    pub debt_to_equity: RatioThreshold,
    pub interest_coverage: RatioThreshold,
    pub inventory_turnover: RatioThreshold,
    pub receivables_turnover: RatioThreshold,
    pub payables_turnover: RatioThreshold,
}

impl Default for RatioThresholds {
    fn default() -> Self {
        Self {
            net_profit_margin: RatioThreshold::higher(0.10, 0.05),
            operating_margin: RatioThreshold::higher(0.15, 0.05),
            gross_profit_ratio: RatioThreshold::higher(0.40, 0.20),
            return_on_equity: RatioThreshold::higher(0.15, 0.08),
            return_on_assets: RatioThreshold::higher(0.05, 0.02),
            roce: RatioThreshold::higher(0.15, 0.08),
            current_ratio: RatioThreshold::higher(1.5, 1.0),
            quick_ratio: RatioThreshold::higher(1.0, 0.7),
            cash_ratio: RatioThreshold::higher(0.5, 0.2),
            debt_to_equity: RatioThreshold::lower(1.0, 2.0),
            interest_coverage: RatioThreshold::higher(3.0, 1.5),
            inventory_turnover: RatioThreshold::higher(6.0, 3.0),
            receivables_turnover: RatioThreshold::higher(8.0, 4.0),
            payables_turnover: RatioThreshold::higher(6.0, 3.0),
        }
    }
}

impl RatioThresholds {
    pub fn for_kind(&self, kind: RatioKind) -> RatioThreshold {
        match kind {
            RatioKind::NetProfitMargin => self.net_profit_margin,
            RatioKind::OperatingMargin => self.operating_margin,
            RatioKind::GrossProfitRatio => self.gross_profit_ratio,
            RatioKind::ReturnOnEquity => self.return_on_equity,
            RatioKind::ReturnOnAssets => self.return_on_assets,
            RatioKind::Roce => self.roce,
            RatioKind::CurrentRatio => self.current_ratio,
            RatioKind::QuickRatio => self.quick_ratio,
            RatioKind::CashRatio => self.cash_ratio,
            RatioKind::DebtToEquity => self.debt_to_equity,
            RatioKind::InterestCoverage => self.interest_coverage,
            RatioKind::InventoryTurnover => self.inventory_turnover,
            RatioKind::ReceivablesTurnover => self.receivables_turnover,
            RatioKind::PayablesTurnover => self.payables_turnover,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct MonteCarloDefaults {
    pub discount_rate_range: (f64, f64),
    pub terminal_growth_range: (f64, f64),
    pub runs: u32,
}

impl Default for MonteCarloDefaults {
    fn default() -> Self {
        Self {
            discount_rate_range: (0.08, 0.12),
            terminal_growth_range: (0.01, 0.03),
            runs: 1000,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct ScenarioDefaults {
    #[schemars(description = "Discount rate used when the calculation result carries no DCF block.")]
    pub discount_rate: f64,

    #[schemars(description = "Terminal growth used when the calculation result carries no DCF block.")]
    pub terminal_growth: f64,

    pub best: ScenarioAdjustments,
    pub worst: ScenarioAdjustments,

    #[schemars(description = "Per-variable low/high flex sent to the sensitivity service.")]
    pub sensitivity_ranges: BTreeMap<String, SensitivityRange>,

    pub monte_carlo: MonteCarloDefaults,
}

impl Default for ScenarioDefaults {
    fn default() -> Self {
        let mut sensitivity_ranges = BTreeMap::new();
        sensitivity_ranges.insert("revenueGrowth".to_string(), SensitivityRange::new(-20.0, 20.0));
        sensitivity_ranges.insert("operatingMargin".to_string(), SensitivityRange::new(-10.0, 10.0));
        sensitivity_ranges.insert("wacc".to_string(), SensitivityRange::new(-2.0, 2.0));
        sensitivity_ranges.insert("terminalGrowth".to_string(), SensitivityRange::new(-1.0, 1.0));

        Self {
            discount_rate: 0.10,
            terminal_growth: 0.02,
            best: ScenarioAdjustments {
                revenue_growth: 10.0,
                operating_margin: 5.0,
                ..Default::default()
            },
            worst: ScenarioAdjustments {
                revenue_growth: -10.0,
                operating_margin: -5.0,
                ..Default::default()
            },
            sensitivity_ranges,
            monte_carlo: MonteCarloDefaults::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct ServiceConfig {
    #[schemars(description = "Base URL of the calculation backend's model routes.")]
    pub base_url: String,

    pub timeout_secs: u64,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8000/api/v1/models".to_string(),
            timeout_secs: 30,
        }
    }
}

impl EngineConfig {
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        Self::from_json_str(&raw)
    }

    pub fn validate(&self) -> Result<()> {
        let p = &self.periods;
        if p.current_min < 1 || p.partial_history_min < 1 || p.full_history_min < 1 {
            return Err(DashboardError::InvalidConfig(
                "period thresholds must be at least 1".to_string(),
            ));
        }
        if !(p.current_min <= p.partial_history_min && p.partial_history_min <= p.full_history_min) {
            return Err(DashboardError::InvalidConfig(format!(
                "period thresholds must be ordered current_min <= partial_history_min <= full_history_min (got {}, {}, {})",
                p.current_min, p.partial_history_min, p.full_history_min
            )));
        }
        if p.fixed_block_len * 2 > p.full_history_min {
            return Err(DashboardError::InvalidConfig(format!(
                "fixed_block_len {} leaves no forecast room below full_history_min {}",
                p.fixed_block_len, p.full_history_min
            )));
        }

        if self.colors.saturation > 100 || self.colors.lightness > 100 {
            return Err(DashboardError::InvalidConfig(format!(
                "colour saturation/lightness must be within 0..=100 (got {}/{})",
                self.colors.saturation, self.colors.lightness
            )));
        }

        for kind in RatioKind::ALL {
            let t = self.ratio_thresholds.for_kind(kind);
            if !t.good.is_finite() || !t.caution.is_finite() {
                return Err(DashboardError::InvalidThresholds {
                    ratio: kind.key().to_string(),
                    details: "cut-offs must be finite".to_string(),
                });
            }
            let ordered = if t.inverted {
                t.good <= t.caution
            } else {
                t.good >= t.caution
            };
            if !ordered {
                return Err(DashboardError::InvalidThresholds {
                    ratio: kind.key().to_string(),
                    details: format!(
                        "good cut-off {} is on the wrong side of caution cut-off {}",
                        t.good, t.caution
                    ),
                });
            }
        }

        let mc = &self.scenario.monte_carlo;
        if mc.discount_rate_range.0 > mc.discount_rate_range.1
            || mc.terminal_growth_range.0 > mc.terminal_growth_range.1
        {
            return Err(DashboardError::InvalidConfig(
                "Monte Carlo ranges must be given as (min, max)".to_string(),
            ));
        }

        Ok(())
    }

    pub fn schema_as_json() -> std::result::Result<String, serde_json::Error> {
        let schema = schemars::schema_for!(EngineConfig);
        serde_json::to_string_pretty(&schema)
    }
}
