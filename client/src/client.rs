use crate::breaker::CircuitBreaker;
use crate::envelope::{Envelope, QuotaTelemetry};
use crate::governor::{AcquireError, RateGovernor};
use chrono::{DateTime, Utc};
use log::{debug, warn};
use miette::Diagnostic;
use reqwest::StatusCode;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio_util::sync::CancellationToken;

#[derive(Debug, Error, Diagnostic)]
pub enum ClientError {
    #[error("rate governor refused to grant a token")]
    Governed(#[from] AcquireError),

    #[error("error building upstream request")]
    RequestBuild(#[source] reqwest::Error),

    #[error("error executing upstream request")]
    RequestExecute(#[source] reqwest::Error),

    #[error("error reading upstream response body")]
    ResponseBody(#[source] reqwest::Error),

    #[error("circuit breaker is open for endpoint {0}")]
    BreakerOpen(String),

    #[error("exhausted retry budget for endpoint {endpoint}")]
    RetriesExhausted { endpoint: String },
}

/// Outcome classification, per §4.3.
#[derive(Debug)]
pub enum Outcome {
    Ok(RawResponse),
    RateLimited,
    AuthFailed,
    ClientError(StatusCode),
    ServerError,
    EnvelopeError(RawResponse),
}

/// The raw bytes of a successful-or-envelope-error response, ready for the Raw Archive
/// Writer. Kept separate from any typed projection -- only the archive needs the bytes.
#[derive(Debug, Clone)]
pub struct RawResponse {
    pub status: StatusCode,
    pub response_headers: serde_json::Value,
    pub body: String,
    pub fetched_at: DateTime<Utc>,
}

impl RawResponse {
    pub fn envelope<T: serde::de::DeserializeOwned>(&self) -> Result<Envelope<T>, serde_json::Error> {
        serde_json::from_str(&self.body)
    }
}

#[derive(Debug, Clone)]
pub struct UpstreamConfig {
    pub base_url: String,
    pub api_key_header: String,
    pub api_key: String,
    pub request_timeout: Duration,
    pub max_retries: u32,
    pub backoff_base: Duration,
    pub backoff_cap: Duration,
}

/// `GET`-only HTTP client with a single authentication header, per §4.3.
pub struct UpstreamClient {
    http: reqwest::Client,
    config: UpstreamConfig,
    governor: Arc<RateGovernor>,
    breaker: CircuitBreaker,
}

impl UpstreamClient {
    pub fn new(config: UpstreamConfig, governor: Arc<RateGovernor>) -> Result<Self, ClientError> {
        let http = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(ClientError::RequestBuild)?;

        Ok(Self {
            http,
            config,
            governor,
            breaker: CircuitBreaker::new(5, Duration::from_secs(60)),
        })
    }

    /// Issues a single authenticated `GET`, retrying `rate_limited`/`server_error` outcomes
    /// with exponential backoff capped at `backoff_cap`. The Rate Governor is consulted
    /// before every attempt, including retries.
    pub async fn get(
        &self,
        endpoint: &str,
        params: &[(&str, String)],
        cancel: &CancellationToken,
    ) -> Result<Outcome, ClientError> {
        if !self.breaker.allow(endpoint) {
            return Err(ClientError::BreakerOpen(endpoint.to_string()));
        }

        let mut attempt = 0u32;
        loop {
            self.governor.acquire(cancel).await?;

            let outcome = self.fetch_once(endpoint, params).await?;

            match &outcome {
                Outcome::Ok(_) => {
                    self.breaker.record_success(endpoint);
                    return Ok(outcome);
                }
                Outcome::EnvelopeError(_) | Outcome::ClientError(_) | Outcome::AuthFailed => {
                    // Deterministic outcomes: no retry, and not attributed to the breaker.
                    return Ok(outcome);
                }
                Outcome::RateLimited => {
                    debug!("{endpoint} rate limited, backing off");
                    self.governor.observe_rate_limited();
                    attempt += 1;
                    if attempt > self.config.max_retries {
                        return Err(ClientError::RetriesExhausted { endpoint: endpoint.to_string() });
                    }
                    self.sleep_backoff(attempt, cancel).await;
                }
                Outcome::ServerError => {
                    warn!("{endpoint} server error, attempt {attempt}");
                    self.breaker.record_failure(endpoint);
                    attempt += 1;
                    if attempt > self.config.max_retries {
                        return Err(ClientError::RetriesExhausted { endpoint: endpoint.to_string() });
                    }
                    self.sleep_backoff(attempt, cancel).await;
                }
            }
        }
    }

    async fn fetch_once(
        &self,
        endpoint: &str,
        params: &[(&str, String)],
    ) -> Result<Outcome, ClientError> {
        let url = format!("{}{}", self.config.base_url, endpoint);
        let request = self
            .http
            .get(&url)
            .header(&self.config.api_key_header, &self.config.api_key)
            .query(params)
            .build()
            .map_err(ClientError::RequestBuild)?;

        let response = match self.http.execute(request).await {
            Ok(response) => response,
            Err(err) if err.is_timeout() => return Ok(Outcome::ServerError),
            Err(err) => return Err(ClientError::RequestExecute(err)),
        };

        let status = response.status();
        let telemetry = QuotaTelemetry::from_headers(response.headers());
        self.governor.observe(telemetry);

        if status == StatusCode::UNAUTHORIZED {
            return Ok(Outcome::AuthFailed);
        }
        if status == StatusCode::TOO_MANY_REQUESTS {
            return Ok(Outcome::RateLimited);
        }
        if status.is_server_error() {
            return Ok(Outcome::ServerError);
        }

        let headers_json = headers_to_json(response.headers());

        if status.is_client_error() {
            return Ok(Outcome::ClientError(status));
        }

        let body = response.text().await.map_err(ClientError::ResponseBody)?;
        let raw = RawResponse {
            status,
            response_headers: headers_json,
            body: body.clone(),
            fetched_at: Utc::now(),
        };

        let envelope: Envelope<serde_json::Value> = match serde_json::from_str(&body) {
            Ok(envelope) => envelope,
            Err(_) => {
                // Malformed body on a 2xx is treated as a server-side hiccup -- retry it.
                return Ok(Outcome::ServerError);
            }
        };

        if envelope.has_rate_limit_error() {
            return Ok(Outcome::RateLimited);
        }
        if envelope.has_errors() {
            return Ok(Outcome::EnvelopeError(raw));
        }

        Ok(Outcome::Ok(raw))
    }

    async fn sleep_backoff(&self, attempt: u32, cancel: &CancellationToken) {
        let exponent = attempt.saturating_sub(1).min(16);
        let wait = self
            .config
            .backoff_base
            .saturating_mul(1u32 << exponent)
            .min(self.config.backoff_cap);

        tokio::select! {
            biased;
            _ = cancel.cancelled() => {}
            _ = tokio::time::sleep(wait) => {}
        }
    }
}

fn headers_to_json(headers: &reqwest::header::HeaderMap) -> serde_json::Value {
    let mut map = serde_json::Map::new();
    for (name, value) in headers.iter() {
        if let Ok(value) = value.to_str() {
            map.insert(name.to_string(), serde_json::Value::String(value.to_string()));
        }
    }
    serde_json::Value::Object(map)
}
