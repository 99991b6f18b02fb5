//! HTTP client for the external traffic calculator
//!
//! POSTs the order's lines to the calculator, which answers immediately and
//! reports the total later through the traffic-result callback.

use crate::config::TrafficConfig;
use crate::domain::traffic::{DispatchError, TrafficDispatcher, TrafficRequest};
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use std::time::Duration;
use tracing::{debug, warn};

/// Pause before a retry
const RETRY_DELAY: Duration = Duration::from_millis(200);

pub struct HttpTrafficDispatcher {
    client: Client,
    endpoint: String,
    max_retries: u32,
}

impl HttpTrafficDispatcher {
    pub fn new(config: &TrafficConfig) -> Result<Self, DispatchError> {
        if config.calculator_url.trim().is_empty() {
            return Err(DispatchError::Config(
                "calculator_url is not configured".to_string(),
            ));
        }

        let client = Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| DispatchError::Config(e.to_string()))?;

        Ok(Self {
            client,
            endpoint: config.calculator_url.clone(),
            max_retries: config.max_retries,
        })
    }

    /// Transport errors and server errors are worth another attempt
    fn is_retryable(err: &DispatchError) -> bool {
        match err {
            DispatchError::Network(_) => true,
            DispatchError::Status(code) => StatusCode::from_u16(*code)
                .map(|s| s.is_server_error())
                .unwrap_or(false),
            DispatchError::Config(_) => false,
        }
    }

    async fn post(&self, request: &TrafficRequest) -> Result<(), DispatchError> {
        let response = self
            .client
            .post(&self.endpoint)
            .json(request)
            .send()
            .await
            .map_err(|e| DispatchError::Network(e.to_string()))?;

        let status = response.status();
        if status.is_success() {
            debug!(
                endpoint = %self.endpoint,
                order_id = request.order_id,
                "traffic calculation accepted"
            );
            Ok(())
        } else {
            Err(DispatchError::Status(status.as_u16()))
        }
    }
}

#[async_trait]
impl TrafficDispatcher for HttpTrafficDispatcher {
    async fn dispatch(&self, request: &TrafficRequest) -> Result<(), DispatchError> {
        let mut attempt = 0;
        loop {
            match self.post(request).await {
                Ok(()) => return Ok(()),
                Err(e) if attempt < self.max_retries && Self::is_retryable(&e) => {
                    attempt += 1;
                    warn!(
                        endpoint = %self.endpoint,
                        order_id = request.order_id,
                        attempt,
                        error = %e,
                        "traffic calculation dispatch failed, retrying"
                    );
                    tokio::time::sleep(RETRY_DELAY).await;
                }
                Err(e) => return Err(e),
            }
        }
    }
}
