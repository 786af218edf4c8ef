//! Outbound result delivery to the orchestrator.
//!
//! Fire-and-forget: the worker reports the outcome in its logs and never
//! retries. The orchestrator owns idempotency on its side.

use tracing::{info, warn};

use cw_core::types::BatchResult;

use crate::config::OrchestratorConfig;

const SUBMIT_PATH: &str = "/api/evaluate/container-submit";

#[derive(Clone)]
pub struct OrchestratorClient {
    client: reqwest::Client,
    address: String,
    api_header_name: String,
    api_key: String,
}

impl OrchestratorClient {
    pub fn new(config: &OrchestratorConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            address: config.address.trim_end_matches('/').to_string(),
            api_header_name: config.api_header_name.clone(),
            api_key: config.api_key.clone(),
        }
    }

    /// Deliver one batch result. Called exactly once per accepted job.
    pub async fn submit(&self, result: &BatchResult) {
        let url = format!("{}{}", self.address, SUBMIT_PATH);
        let response = self
            .client
            .post(&url)
            .header(&self.api_header_name, &self.api_key)
            .json(result)
            .send()
            .await;

        match response {
            Ok(response) if response.status().is_success() => {
                info!(
                    submission_id = result.submission_id,
                    status = %response.status(),
                    "delivered batch result"
                );
            }
            Ok(response) => {
                warn!(
                    submission_id = result.submission_id,
                    status = %response.status(),
                    "orchestrator rejected batch result"
                );
            }
            Err(error) => {
                warn!(
                    submission_id = result.submission_id,
                    %error,
                    "failed to deliver batch result"
                );
            }
        }
    }
}
