//! Dashboard state across remote fetches.
//!
//! Each remote analysis owns a [`FetchSlot`]. Starting a fetch hands out a new
//! generation; a response is applied only if its generation is still the
//! latest, so a slow reply can never overwrite the result of a newer request.

use crate::config::EngineConfig;
use crate::error::{DashboardError, Result};
use crate::scenario::{ScenarioName, ScenarioResults};
use crate::services::types::*;
use crate::view::{build_dashboard_view, DashboardView};
use chrono::{DateTime, Utc};
use log::{debug, warn};
use serde::Serialize;
use serde_json::Value;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum FetchState<T> {
    Idle,
    Loading {
        generation: u64,
    },
    Loaded {
        generation: u64,
        data: T,
        fetched_at: DateTime<Utc>,
    },
    Failed {
        generation: u64,
        message: String,
    },
}

#[derive(Debug, Clone)]
pub struct FetchSlot<T> {
    service: &'static str,
    latest: u64,
    state: FetchState<T>,
}

impl<T> FetchSlot<T> {
    pub fn new(service: &'static str) -> Self {
        Self {
            service,
            latest: 0,
            state: FetchState::Idle,
        }
    }

    /// Marks the slot loading and returns the generation the response must carry.
    pub fn begin(&mut self) -> u64 {
        self.latest += 1;
        self.state = FetchState::Loading {
            generation: self.latest,
        };
        debug!("{} fetch started (generation {})", self.service, self.latest);
        self.latest
    }

    /// Applies a response. Responses from superseded generations are dropped
    /// and reported as [`DashboardError::StaleResponse`].
    pub fn complete(&mut self, generation: u64, outcome: Result<T>) -> Result<()> {
        if generation != self.latest {
            warn!(
                "Discarding stale {} response (generation {}, latest {})",
                self.service, generation, self.latest
            );
            return Err(DashboardError::StaleResponse {
                service: self.service.to_string(),
                generation,
            });
        }

        self.state = match outcome {
            Ok(data) => FetchState::Loaded {
                generation,
                data,
                fetched_at: Utc::now(),
            },
            Err(e) => {
                warn!("{} fetch failed: {}", self.service, e);
                FetchState::Failed {
                    generation,
                    message: e.to_string(),
                }
            }
        };
        Ok(())
    }

    /// Back to idle; any response still in flight becomes stale.
    pub fn reset(&mut self) {
        self.latest += 1;
        self.state = FetchState::Idle;
    }

    pub fn state(&self) -> &FetchState<T> {
        &self.state
    }

    pub fn latest_generation(&self) -> u64 {
        self.latest
    }

    pub fn is_loading(&self) -> bool {
        matches!(self.state, FetchState::Loading { .. })
    }

    pub fn data(&self) -> Option<&T> {
        match &self.state {
            FetchState::Loaded { data, .. } => Some(data),
            _ => None,
        }
    }

    pub fn error(&self) -> Option<&str> {
        match &self.state {
            FetchState::Failed { message, .. } => Some(message.as_str()),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SliderField {
    RevenueGrowth,
    OperatingMargin,
    Capex,
    WorkingCapitalDays,
    TaxRate,
    Wacc,
    TerminalGrowth,
}

/// Best/worst slider positions plus a counter bumped on every edit.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScenarioSliders {
    pub best: ScenarioAdjustments,
    pub worst: ScenarioAdjustments,
    pub recalculation_trigger: u64,
}

impl ScenarioSliders {
    pub fn new(best: ScenarioAdjustments, worst: ScenarioAdjustments) -> Self {
        Self {
            best,
            worst,
            recalculation_trigger: 0,
        }
    }

    /// Sets one slider. The trigger advances even when the value is unchanged;
    /// the base case has no sliders and is left alone.
    pub fn set(&mut self, scenario: ScenarioName, field: SliderField, value: f64) -> bool {
        let adjustments = match scenario {
            ScenarioName::Best => &mut self.best,
            ScenarioName::Worst => &mut self.worst,
            ScenarioName::Base => return false,
        };
        let slot = match field {
            SliderField::RevenueGrowth => &mut adjustments.revenue_growth,
            SliderField::OperatingMargin => &mut adjustments.operating_margin,
            SliderField::Capex => &mut adjustments.capex,
            SliderField::WorkingCapitalDays => &mut adjustments.working_capital_days,
            SliderField::TaxRate => &mut adjustments.tax_rate,
            SliderField::Wacc => &mut adjustments.wacc,
            SliderField::TerminalGrowth => &mut adjustments.terminal_growth,
        };
        *slot = value;
        self.bump();
        true
    }

    pub fn bump(&mut self) -> u64 {
        self.recalculation_trigger += 1;
        self.recalculation_trigger
    }
}

/// One calculation result plus the remote analyses fetched for it.
pub struct DashboardSession {
    config: EngineConfig,
    result: Value,
    pub sliders: ScenarioSliders,
    pub scenarios: FetchSlot<ScenarioResponse>,
    pub sensitivity: FetchSlot<SensitivityResponse>,
    pub monte_carlo: FetchSlot<MonteCarloResponse>,
    requested_trigger: Option<u64>,
}

impl DashboardSession {
    pub fn new(result: Value, config: EngineConfig) -> Self {
        let sliders = ScenarioSliders::new(
            config.scenario.best.clone(),
            config.scenario.worst.clone(),
        );
        Self {
            config,
            result,
            sliders,
            scenarios: FetchSlot::new("scenario"),
            sensitivity: FetchSlot::new("sensitivity"),
            monte_carlo: FetchSlot::new("monte-carlo"),
            requested_trigger: None,
        }
    }

    pub fn result(&self) -> &Value {
        &self.result
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Swaps in a new calculation result. In-flight fetches for the old result
    /// are invalidated by advancing every slot's generation.
    pub fn replace_result(&mut self, result: Value) {
        self.result = result;
        self.scenarios.reset();
        self.sensitivity.reset();
        self.monte_carlo.reset();
        self.requested_trigger = None;
    }

    /// True when the sliders moved since the last scenario request.
    pub fn needs_scenario_refresh(&self) -> bool {
        self.requested_trigger != Some(self.sliders.recalculation_trigger)
    }

    pub fn begin_scenarios(&mut self) -> (u64, ScenarioRequest) {
        self.requested_trigger = Some(self.sliders.recalculation_trigger);
        let request = ScenarioRequest::from_result(
            &self.result,
            &self.sliders.best,
            &self.sliders.worst,
            &self.config.scenario,
        );
        (self.scenarios.begin(), request)
    }

    pub fn begin_sensitivity(&mut self) -> (u64, SensitivityRequest) {
        let request = SensitivityRequest::from_result(&self.result, &self.config.scenario);
        (self.sensitivity.begin(), request)
    }

    pub fn begin_monte_carlo(&mut self) -> (u64, MonteCarloRequest) {
        let request = MonteCarloRequest::from_result(&self.result, &self.config.scenario);
        (self.monte_carlo.begin(), request)
    }

    pub fn scenario_results(&self) -> Option<&ScenarioResults> {
        self.scenarios.data().map(|r| &r.scenarios)
    }

    pub fn view(&self) -> DashboardView {
        build_dashboard_view(&self.result, self.scenario_results(), &self.config)
    }

    /// Fetches all three analyses concurrently. Each outcome lands in its own
    /// slot; one failing never affects the others.
    #[cfg(feature = "remote")]
    pub async fn refresh_remote(&mut self, client: &crate::services::ServiceClient) {
        let (scenario_gen, scenario_req) = self.begin_scenarios();
        let (sensitivity_gen, sensitivity_req) = self.begin_sensitivity();
        let (monte_carlo_gen, monte_carlo_req) = self.begin_monte_carlo();

        let (scenarios, sensitivity, monte_carlo) = futures::join!(
            client.calculate_scenarios(&scenario_req),
            client.sensitivity_analysis(&sensitivity_req),
            client.monte_carlo(&monte_carlo_req)
        );

        for applied in [
            self.scenarios.complete(scenario_gen, scenarios),
            self.sensitivity.complete(sensitivity_gen, sensitivity),
            self.monte_carlo.complete(monte_carlo_gen, monte_carlo),
        ] {
            if let Err(e) = applied {
                debug!("{}", e);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn service_error() -> DashboardError {
        DashboardError::Service {
            service: "monte-carlo".to_string(),
            status: 500,
            message: "boom".to_string(),
        }
    }

    #[test]
    fn test_stale_response_is_discarded() {
        let mut slot: FetchSlot<u32> = FetchSlot::new("scenario");
        let first = slot.begin();
        let second = slot.begin();

        assert!(matches!(
            slot.complete(first, Ok(1)),
            Err(DashboardError::StaleResponse { generation: 1, .. })
        ));
        assert!(slot.is_loading());

        slot.complete(second, Ok(2)).unwrap();
        assert_eq!(slot.data(), Some(&2));

        // a late reply to the first request still cannot overwrite
        assert!(slot.complete(first, Ok(1)).is_err());
        assert_eq!(slot.data(), Some(&2));
    }

    #[test]
    fn test_failure_is_per_slot() {
        let mut session = DashboardSession::new(json!({}), EngineConfig::default());
        let (s_gen, _) = session.begin_scenarios();
        let (m_gen, _) = session.begin_monte_carlo();

        session
            .scenarios
            .complete(s_gen, Ok(ScenarioResponse::default()))
            .unwrap();
        session.monte_carlo.complete(m_gen, Err(service_error())).unwrap();

        assert!(session.scenarios.data().is_some());
        assert!(session.monte_carlo.error().unwrap().contains("boom"));
        assert_eq!(session.sensitivity.state(), &FetchState::Idle);
    }

    #[test]
    fn test_slider_edits_bump_trigger() {
        let mut sliders = ScenarioSliders::new(Default::default(), Default::default());
        assert!(sliders.set(ScenarioName::Best, SliderField::RevenueGrowth, 12.0));
        assert!(sliders.set(ScenarioName::Best, SliderField::RevenueGrowth, 12.0));
        assert_eq!(sliders.recalculation_trigger, 2);
        assert_eq!(sliders.best.revenue_growth, 12.0);

        assert!(!sliders.set(ScenarioName::Base, SliderField::Wacc, 1.0));
        assert_eq!(sliders.recalculation_trigger, 2);
    }

    #[test]
    fn test_scenario_refresh_tracking() {
        let mut session = DashboardSession::new(json!({}), EngineConfig::default());
        assert!(session.needs_scenario_refresh());

        let (_, request) = session.begin_scenarios();
        assert_eq!(request.scenario_configs.best.revenue_growth, 10.0);
        assert!(!session.needs_scenario_refresh());

        session
            .sliders
            .set(ScenarioName::Worst, SliderField::OperatingMargin, -8.0);
        assert!(session.needs_scenario_refresh());
        let (_, request) = session.begin_scenarios();
        assert_eq!(request.scenario_configs.worst.operating_margin, -8.0);
    }

    #[test]
    fn test_replace_result_invalidates_in_flight() {
        let mut session = DashboardSession::new(json!({}), EngineConfig::default());
        let (generation, _) = session.begin_sensitivity();
        session.replace_result(json!({"valuation": {"npv": 1.0}}));

        assert!(session
            .sensitivity
            .complete(generation, Ok(SensitivityResponse::default()))
            .is_err());
        assert_eq!(session.sensitivity.state(), &FetchState::Idle);
    }

    #[test]
    fn test_view_uses_loaded_scenarios() {
        let mut session = DashboardSession::new(
            json!({"valuation": {"npv": 90.0}}),
            EngineConfig::default(),
        );
        assert_eq!(session.view().scenarios.chart[0].npv, 90.0);

        let (generation, _) = session.begin_scenarios();
        let response: ScenarioResponse = serde_json::from_value(json!({
            "scenarios": {"base": {"npv": 100.0}, "best": {"npv": 200.0}, "worst": {"npv": 50.0}}
        }))
        .unwrap();
        session.scenarios.complete(generation, Ok(response)).unwrap();

        let chart = session.view().scenarios.chart;
        assert_eq!(chart[0].npv, 100.0);
        assert_eq!(chart[1].npv, 200.0);
        assert_eq!(chart[2].npv, 50.0);
    }
}
