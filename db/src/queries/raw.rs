use crate::error::QueryResult;
use crate::models::NewEnvelope;
use chrono::{DateTime, NaiveDateTime, Utc};
use diesel::prelude::*;
use diesel::PgConnection;

/// Appends one row to the RAW archive. Never mutates, never rejects duplicates -- this is
/// the provenance audit log described in §4.4.
pub fn insert_envelope(
    conn: &mut PgConnection,
    endpoint: &str,
    requested_params: serde_json::Value,
    status_code: i32,
    response_headers: serde_json::Value,
    body: serde_json::Value,
    errors: serde_json::Value,
    results: i32,
    fetched_at: DateTime<Utc>,
) -> QueryResult<i64> {
    use crate::schema::raw::envelopes::dsl;

    let new_envelope = NewEnvelope {
        endpoint,
        requested_params,
        status_code,
        response_headers,
        body,
        errors,
        results,
        fetched_at: fetched_at.naive_utc(),
    };

    let id = diesel::insert_into(dsl::envelopes)
        .values(&new_envelope)
        .returning(dsl::id)
        .get_result(conn)?;

    Ok(id)
}

/// Raw-archive-derived counters the Coverage Calculator uses for pipeline coverage.
pub fn raw_count_since(
    conn: &mut PgConnection,
    endpoint: &str,
    since: NaiveDateTime,
) -> QueryResult<i64> {
    use crate::schema::raw::envelopes::dsl;

    let count = dsl::envelopes
        .filter(dsl::endpoint.eq(endpoint))
        .filter(dsl::fetched_at.ge(since))
        .count()
        .get_result(conn)?;

    Ok(count)
}
