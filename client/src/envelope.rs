use serde::{Deserialize, Serialize};

/// The standard upstream response envelope: `{get, parameters, errors, results, paging, response}`.
///
/// `errors` is modeled as raw JSON because the provider returns either `[]` (no errors) or
/// an object keyed by error kind (e.g. `{"rateLimit": "..."}`) depending on what went wrong.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Envelope<T = serde_json::Value> {
    pub get: String,
    #[serde(default)]
    pub parameters: serde_json::Value,
    #[serde(default)]
    pub errors: serde_json::Value,
    pub results: u64,
    #[serde(default)]
    pub paging: Option<Paging>,
    pub response: T,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Paging {
    pub current: u32,
    pub total: u32,
}

impl<T> Envelope<T> {
    pub fn has_errors(&self) -> bool {
        match &self.errors {
            serde_json::Value::Null => false,
            serde_json::Value::Array(items) => !items.is_empty(),
            serde_json::Value::Object(fields) => !fields.is_empty(),
            _ => true,
        }
    }

    /// `errors.rateLimit` must be treated identically to HTTP 429 for quota accounting.
    pub fn has_rate_limit_error(&self) -> bool {
        matches!(&self.errors, serde_json::Value::Object(fields) if fields.contains_key("rateLimit"))
    }
}

/// Quota telemetry parsed from response headers, per §4.2/§6.1.
#[derive(Debug, Clone, Copy, Default)]
pub struct QuotaTelemetry {
    pub daily_limit: Option<i64>,
    pub daily_remaining: Option<i64>,
    pub minute_limit: Option<u32>,
    pub minute_remaining: Option<u32>,
}

impl QuotaTelemetry {
    pub fn from_headers(headers: &reqwest::header::HeaderMap) -> Self {
        let parse = |name: &str| -> Option<i64> {
            headers.get(name)?.to_str().ok()?.trim().parse().ok()
        };

        Self {
            daily_limit: parse("x-ratelimit-requests-limit"),
            daily_remaining: parse("x-ratelimit-requests-remaining"),
            minute_limit: parse("x-ratelimit-limit").map(|v| v as u32),
            minute_remaining: parse("x-ratelimit-remaining").map(|v| v as u32),
        }
    }
}
