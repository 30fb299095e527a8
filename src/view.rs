use crate::breakdown::{BreakdownKind, BreakdownResolver};
use crate::config::EngineConfig;
use crate::ingestion::normalize_result;
use crate::payback::{payback_label, payback_period, PaybackPeriod};
use crate::periods::{explicit_sections, PeriodClassifier};
use crate::ratios::{dupont, DuPontRatios, RatioEngine, RatioReading};
use crate::scenario::{LocalBaseline, ScenarioAggregator, ScenarioComparison, ScenarioResults};
use crate::schema::{BreakdownEntry, CashFlowPeriod, LineItemStatement, Period, Section};
use log::info;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Everything a dashboard renders for one calculation result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct DashboardView {
    pub income_statement: Option<LineItemStatement>,
    pub balance_sheet: Option<LineItemStatement>,
    pub cash_flow: Vec<CashFlowPeriod>,
    pub cash_flow_statement: Option<LineItemStatement>,

    pub revenue_breakdown: Vec<BreakdownEntry>,
    pub expense_breakdown: Vec<BreakdownEntry>,

    pub periods: Vec<Period>,
    pub sections: Vec<Section>,

    pub dupont: DuPontRatios,
    pub ratios: Vec<RatioReading>,

    pub payback: Option<PaybackPeriod>,
    #[schemars(description = "Payback rendered for display; 'N/A' when not reached.")]
    pub payback_label: String,

    pub baseline: LocalBaseline,
    pub scenarios: ScenarioComparison,
}

impl DashboardView {
    pub fn schema_as_json() -> std::result::Result<String, serde_json::Error> {
        let schema = schemars::schema_for!(DashboardView);
        serde_json::to_string_pretty(&schema)
    }
}

/// Runs every derivation over `result`. `scenario_results` is the scenario
/// service's last accepted response, if any.
pub fn build_dashboard_view(
    result: &Value,
    scenario_results: Option<&ScenarioResults>,
    config: &EngineConfig,
) -> DashboardView {
    let statements = normalize_result(result);
    let income = statements.income();
    let balance = statements.balance();

    let breakdowns = BreakdownResolver::new(&config.colors);
    let revenue_breakdown = breakdowns.resolve(result, BreakdownKind::Revenue);
    let expense_breakdown = breakdowns.resolve(result, BreakdownKind::Expense);

    let explicit = explicit_sections(result);
    let classified = PeriodClassifier::new(&config.periods).classify(
        &income,
        &statements.cash_flow,
        explicit.as_deref(),
    );

    let payback = payback_period(&statements.cash_flow);
    let baseline = LocalBaseline::from_result(result, &statements);
    let scenarios = ScenarioAggregator::new(&baseline, scenario_results).compare();

    info!(
        "Built dashboard view: {} periods, {} revenue / {} expense categories, payback {}",
        classified.periods.len(),
        revenue_breakdown.len(),
        expense_breakdown.len(),
        payback_label(payback.as_ref())
    );

    DashboardView {
        dupont: dupont(&income, &balance),
        ratios: RatioEngine::new(&config.ratio_thresholds).extended(&income, &balance),
        payback_label: payback_label(payback.as_ref()),
        payback,
        income_statement: statements.income_statement,
        balance_sheet: statements.balance_sheet,
        cash_flow: statements.cash_flow,
        cash_flow_statement: statements.cash_flow_statement,
        revenue_breakdown,
        expense_breakdown,
        periods: classified.periods,
        sections: classified.sections,
        baseline,
        scenarios,
    }
}
