use crate::config::ConfigSnapshot;
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use diesel::PgConnection;
use matchfeed_db::queries::coverage::{
    fixture_count_coverage_inputs, latest_fixture_update, upsert_coverage_status,
};
use matchfeed_db::queries::raw::raw_count_since;
use matchfeed_db::{NewCoverageStatus, QueryResult};

/// Endpoints the standalone coverage-refresh job recomputes for every tracked league,
/// independent of whatever a daily ingest run happened to touch that cycle.
const TRACKED_ENDPOINTS: [&str; 2] = ["/fixtures", "/standings"];

const FRESHNESS_WEIGHT: f64 = 0.3;
const PIPELINE_WEIGHT: f64 = 0.2;
const COUNT_WEIGHT: f64 = 0.5;

/// Computes the three coverage dimensions for a (league, season, endpoint) tuple and
/// writes the resulting MART row, per §4.7.
///
/// Renormalization when count coverage is N/A (Open Question #2, resolved in
/// `DESIGN.md`): the remaining weights are scaled up proportionally so they still sum to
/// 1 -- freshness keeps 0.3/(0.3+0.2) = 60% of the total weight, pipeline keeps 40%. This
/// preserves the fixed 3:2 ratio between freshness and pipeline while dropping count
/// cleanly out of the average instead of silently counting it as zero.
pub fn recompute(
    conn: &mut PgConnection,
    league_id: i64,
    season: i32,
    endpoint: &str,
    max_lag_minutes: Option<f64>,
    expected_count: Option<i64>,
    pipeline_window_hours: i64,
    now: DateTime<Utc>,
) -> QueryResult<NewCoverageStatus> {
    let latest_update = latest_fixture_update(conn, league_id, season)?;
    let lag_minutes = latest_update.map(|updated_at| {
        (now.naive_utc() - updated_at).num_seconds() as f64 / 60.0
    });

    let freshness_coverage = freshness_coverage(lag_minutes, max_lag_minutes);

    let since = (now - ChronoDuration::hours(pipeline_window_hours)).naive_utc();
    let raw_count = raw_count_since(conn, endpoint, since)?;
    let (core_count, total_fixtures) = fixture_count_coverage_inputs(conn, league_id, season)?;
    let pipeline_coverage = pipeline_coverage(core_count, raw_count);

    let count_coverage = expected_count.and_then(|expected| {
        if expected <= 0 {
            None
        } else {
            Some(((total_fixtures as f64 / expected as f64) * 100.0).clamp(0.0, 100.0))
        }
    });

    let overall_coverage = overall_coverage(freshness_coverage, pipeline_coverage, count_coverage);

    let flags = serde_json::json!({ "no_matches_scheduled": no_matches_scheduled(total_fixtures) });

    let row = NewCoverageStatus {
        league_id,
        season,
        endpoint: endpoint.to_string(),
        freshness_coverage,
        pipeline_coverage,
        count_coverage,
        overall_coverage,
        lag_minutes,
        flags,
        computed_at: now.naive_utc(),
    };

    upsert_coverage_status(conn, &row)?;
    Ok(row)
}

/// Standalone coverage-refresh job body: recomputes coverage for every tracked league
/// across [`TRACKED_ENDPOINTS`], independent of the daily ingest cadence.
pub fn run_coverage_refresh(
    conn: &mut PgConnection,
    config: &ConfigSnapshot,
    now: DateTime<Utc>,
) -> QueryResult<()> {
    for league in &config.tracked_leagues {
        for endpoint in TRACKED_ENDPOINTS {
            recompute(
                conn,
                league.id,
                league.season,
                endpoint,
                config.coverage.max_lag_minutes,
                config.coverage.expected_counts.get(endpoint).copied(),
                config.coverage.pipeline_window_hours,
                now,
            )?;
        }
    }

    Ok(())
}

/// Monotone-decreasing in lag: `100` at zero lag, `0` at or beyond `max_lag_minutes`.
/// Never negative. Absent a configured ceiling or any observed update, freshness is
/// reported as fully covered rather than penalized for silence.
fn freshness_coverage(lag_minutes: Option<f64>, max_lag_minutes: Option<f64>) -> f64 {
    match (lag_minutes, max_lag_minutes) {
        (Some(lag), Some(max_lag)) if max_lag > 0.0 => {
            (100.0 * (1.0 - (lag / max_lag))).clamp(0.0, 100.0)
        }
        _ => 100.0,
    }
}

fn pipeline_coverage(core_count: i64, raw_count: i64) -> f64 {
    if raw_count == 0 {
        return 100.0;
    }
    ((core_count as f64 / raw_count as f64) * 100.0).clamp(0.0, 100.0)
}

/// An empty league/season calendar is a distinct condition from poor coverage of a
/// populated one -- flagged separately so a 100% score on zero fixtures doesn't read as
/// a fully-covered season.
fn no_matches_scheduled(total_fixtures: i64) -> bool {
    total_fixtures == 0
}

fn overall_coverage(freshness: f64, pipeline: f64, count: Option<f64>) -> f64 {
    let overall = match count {
        Some(count) => COUNT_WEIGHT * count + FRESHNESS_WEIGHT * freshness + PIPELINE_WEIGHT * pipeline,
        None => {
            let total = FRESHNESS_WEIGHT + PIPELINE_WEIGHT;
            (FRESHNESS_WEIGHT / total) * freshness + (PIPELINE_WEIGHT / total) * pipeline
        }
    };
    overall.clamp(0.0, 100.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn overall_coverage_stays_in_bounds() {
        assert!((0.0..=100.0).contains(&overall_coverage(100.0, 100.0, Some(100.0))));
        assert!((0.0..=100.0).contains(&overall_coverage(0.0, 0.0, None)));
    }

    #[test]
    fn overall_coverage_matches_weighted_mean_with_count() {
        let overall = overall_coverage(80.0, 60.0, Some(90.0));
        let expected = 0.5 * 90.0 + 0.3 * 80.0 + 0.2 * 60.0;
        assert!((overall - expected).abs() < 1e-9);
    }

    #[test]
    fn overall_coverage_renormalizes_when_count_unavailable() {
        let overall = overall_coverage(80.0, 60.0, None);
        // 0.3:0.2 ratio preserved, rescaled to sum to 1 -> 0.6/0.4
        let expected = 0.6 * 80.0 + 0.4 * 60.0;
        assert!((overall - expected).abs() < 1e-9);
    }

    #[test]
    fn freshness_is_full_without_a_configured_ceiling() {
        assert_eq!(freshness_coverage(Some(500.0), None), 100.0);
    }

    #[test]
    fn pipeline_is_full_when_raw_is_empty() {
        assert_eq!(pipeline_coverage(0, 0), 100.0);
    }

    #[test]
    fn no_matches_scheduled_flags_an_empty_calendar_only() {
        assert!(no_matches_scheduled(0));
        assert!(!no_matches_scheduled(1));
    }
}
