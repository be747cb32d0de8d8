use matchfeed_client::{ClientError, Envelope, Outcome, UpstreamClient};
use matchfeed_db::queries::raw::insert_envelope;
use miette::Diagnostic;
use thiserror::Error;
use tokio_util::sync::CancellationToken;

/// Errors that abort a job run outright, as opposed to a per-row skip recorded in a
/// `JobOutcome`. Per §7: auth failures are "fatal for process until resolved".
#[derive(Debug, Error, Diagnostic)]
pub enum PipelineError {
    #[error(transparent)]
    Client(#[from] ClientError),

    #[error(transparent)]
    Db(#[from] matchfeed_db::QueryError),

    #[error("malformed envelope body")]
    MalformedEnvelope(#[from] serde_json::Error),

    #[error("upstream authentication failed")]
    AuthFailed,
}

/// What a caller should do after a single upstream call, per §4.3/§4.4: RAW is always
/// written before any downstream step runs, and `envelope_error`/`client_error` never
/// reach the Transform/Upsert Engine.
pub enum PipelineOutcome {
    Proceed { response: serde_json::Value },
    Skip { reason: &'static str },
}

/// Issues one call, archives it verbatim (`ok`/`envelope_error` only -- the two outcomes
/// that carry a body), and tells the caller whether to continue to the Transform/Upsert
/// Engine. Grounded on the RAW-before-CORE ordering invariant in §5 and the outcome
/// classification in §4.3.
pub async fn fetch_and_archive(
    client: &UpstreamClient,
    conn: &mut diesel::PgConnection,
    endpoint: &str,
    params: &[(&str, String)],
    cancel: &CancellationToken,
) -> Result<PipelineOutcome, PipelineError> {
    let outcome = client.get(endpoint, params, cancel).await?;

    match outcome {
        Outcome::Ok(raw) => {
            let envelope: Envelope<serde_json::Value> = raw.envelope()?;
            let body: serde_json::Value = serde_json::from_str(&raw.body)?;
            insert_envelope(
                conn,
                endpoint,
                canonical_params(params),
                raw.status.as_u16() as i32,
                raw.response_headers.clone(),
                body,
                envelope.errors.clone(),
                envelope.results as i32,
                raw.fetched_at,
            )?;
            Ok(PipelineOutcome::Proceed {
                response: envelope.response,
            })
        }
        Outcome::EnvelopeError(raw) => {
            let envelope: Envelope<serde_json::Value> = raw.envelope()?;
            let body: serde_json::Value = serde_json::from_str(&raw.body)?;
            insert_envelope(
                conn,
                endpoint,
                canonical_params(params),
                raw.status.as_u16() as i32,
                raw.response_headers.clone(),
                body,
                envelope.errors.clone(),
                envelope.results as i32,
                raw.fetched_at,
            )?;
            Ok(PipelineOutcome::Skip {
                reason: "envelope_error",
            })
        }
        Outcome::AuthFailed => Err(PipelineError::AuthFailed),
        Outcome::ClientError(_) => Ok(PipelineOutcome::Skip {
            reason: "client_error",
        }),
        Outcome::RateLimited | Outcome::ServerError => {
            // The client retries these internally until success or `RetriesExhausted`,
            // which surfaces as `Err` above -- a bare `Outcome` of this shape never
            // reaches here.
            Ok(PipelineOutcome::Skip {
                reason: "transient_after_retry",
            })
        }
    }
}

/// Query parameters in a stable, sorted JSON object form, for reproducible RAW rows.
fn canonical_params(params: &[(&str, String)]) -> serde_json::Value {
    let mut sorted = params.to_vec();
    sorted.sort_by(|a, b| a.0.cmp(b.0));
    let mut map = serde_json::Map::new();
    for (key, value) in sorted {
        map.insert(key.to_string(), serde_json::Value::String(value));
    }
    serde_json::Value::Object(map)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn canonical_params_sorts_keys() {
        let params = vec![("season", "2026".to_string()), ("league", "39".to_string())];
        let json = canonical_params(&params);
        let keys: Vec<&str> = json.as_object().unwrap().keys().map(|k| k.as_str()).collect();
        assert_eq!(keys, vec!["league", "season"]);
    }
}
