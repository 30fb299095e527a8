use crate::config::ServiceConfig;
use crate::error::{DashboardError, Result};
use crate::services::types::*;
use log::{debug, warn};
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::time::Duration;

const SCENARIO_ROUTE: &str = "scenario-calculate";
const SENSITIVITY_ROUTE: &str = "sensitivity-analysis";
const MONTE_CARLO_ROUTE: &str = "monte-carlo";

/// HTTP client for the scenario, sensitivity and Monte Carlo model routes.
#[derive(Clone)]
pub struct ServiceClient {
    client: Client,
    base_url: String,
}

impl ServiceClient {
    pub fn new(config: &ServiceConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn with_client(client: Client, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub async fn calculate_scenarios(&self, request: &ScenarioRequest) -> Result<ScenarioResponse> {
        self.post(SCENARIO_ROUTE, request).await
    }

    pub async fn sensitivity_analysis(
        &self,
        request: &SensitivityRequest,
    ) -> Result<SensitivityResponse> {
        self.post(SENSITIVITY_ROUTE, request).await
    }

    pub async fn monte_carlo(&self, request: &MonteCarloRequest) -> Result<MonteCarloResponse> {
        self.post(MONTE_CARLO_ROUTE, request).await
    }

    async fn post<Req, Resp>(&self, route: &str, body: &Req) -> Result<Resp>
    where
        Req: Serialize + ?Sized,
        Resp: DeserializeOwned,
    {
        let url = format!("{}/{}", self.base_url, route);
        debug!("POST {}", url);

        let res = self.client.post(&url).json(body).send().await?;
        let status = res.status();
        let text = res.text().await?;

        if !status.is_success() {
            let message = error_message(&text);
            warn!("{} failed (status {}): {}", route, status, message);
            return Err(DashboardError::Service {
                service: route.to_string(),
                status: status.as_u16(),
                message,
            });
        }

        Ok(serde_json::from_str(&text)?)
    }
}

/// The backend reports failures as `{"error": "..."}`; anything else is passed through.
fn error_message(body: &str) -> String {
    serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|v| v.get("error").and_then(|e| e.as_str()).map(str::to_string))
        .unwrap_or_else(|| body.trim().to_string())
}
