//! HTTP client for the pile simulator

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::application::ports::SimulatorClient;
use crate::domain::{ChargingMode, DomainError, DomainResult};

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct AssignRequest<'a> {
    pile_id: &'a str,
    user_id: &'a str,
    requested_capacity: f64,
    /// `fast` or `trickle`
    charging_mode: &'a str,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AssignResponse {
    #[allow(dead_code)]
    code: Option<i32>,
    message: Option<String>,
    /// Authoritative charging start time (RFC 3339)
    start_time: Option<DateTime<Utc>>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct StopRequest<'a> {
    pile_id: &'a str,
    user_id: &'a str,
    reason: &'a str,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    message: Option<String>,
}

/// Simulator client speaking the JSON-over-HTTP dispatch protocol.
pub struct HttpSimulatorClient {
    client: Client,
    base_url: String,
}

impl HttpSimulatorClient {
    pub fn new(base_url: impl Into<String>, timeout_secs: u64) -> Self {
        Self {
            client: Client::builder()
                .timeout(Duration::from_secs(timeout_secs))
                .build()
                .unwrap_or_default(),
            base_url: base_url.into(),
        }
    }

    async fn error_from(resp: reqwest::Response) -> DomainError {
        let status = resp.status();
        let message = resp
            .json::<ErrorBody>()
            .await
            .ok()
            .and_then(|b| b.message)
            .unwrap_or_default();
        if message.is_empty() {
            DomainError::Downstream(format!("simulator returned {}", status))
        } else {
            DomainError::Downstream(format!("simulator returned {}: {}", status, message))
        }
    }
}

#[async_trait]
impl SimulatorClient for HttpSimulatorClient {
    async fn assign(
        &self,
        pile_id: &str,
        user_id: &str,
        requested_capacity: f64,
        mode: ChargingMode,
    ) -> DomainResult<DateTime<Utc>> {
        let url = format!("{}/api/simulator/charging/assign", self.base_url);
        let body = AssignRequest {
            pile_id,
            user_id,
            requested_capacity,
            charging_mode: mode.simulator_mode(),
        };

        let resp = self
            .client
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(|e| DomainError::Downstream(e.to_string()))?;

        if !resp.status().is_success() {
            return Err(Self::error_from(resp).await);
        }

        let parsed: AssignResponse = resp
            .json()
            .await
            .map_err(|e| DomainError::Downstream(format!("invalid assign response: {}", e)))?;

        debug!(pile_id, user_id, start_time = ?parsed.start_time, "assign acknowledged");

        parsed.start_time.ok_or_else(|| {
            DomainError::Downstream(format!(
                "assign response missing start time: {}",
                parsed.message.unwrap_or_default()
            ))
        })
    }

    async fn stop(&self, pile_id: &str, user_id: &str, reason: &str) -> DomainResult<()> {
        let url = format!("{}/api/simulator/charging/stop", self.base_url);
        let body = StopRequest {
            pile_id,
            user_id,
            reason,
        };

        let resp = self
            .client
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(|e| DomainError::Downstream(e.to_string()))?;

        if !resp.status().is_success() {
            return Err(Self::error_from(resp).await);
        }
        Ok(())
    }
}
