use crate::config::{ConfigSnapshot, JobDef, TrackedLeague};
use crate::coverage;
use crate::dependency::ingest_fixtures_response;
use crate::jobs::JobOutcome;
use crate::pipeline::{fetch_and_archive, PipelineError, PipelineOutcome};
use crate::scope;
use crate::transform;
use chrono::Utc;
use diesel::PgConnection;
use matchfeed_client::UpstreamClient;
use matchfeed_db::queries::bootstrap::get_league;
use matchfeed_db::queries::fixtures::teams_for_league_season;
use matchfeed_db::queries::standings::{advance_standings_cursor, get_standings_refresh_progress};
use tokio_util::sync::CancellationToken;

/// Endpoints a daily run touches for every tracked league, beyond `/fixtures` and its
/// sub-endpoints (handled per-fixture below). Each is gated through [`scope::decide`]
/// before any call is issued. `/standings` is deliberately excluded here: unlike
/// topscorers/injuries it is paced across runs by [`run_standings_rotation`], per §3's
/// `StandingsRefreshProgress` entity.
const SEASON_SCOPED_ENDPOINTS: [&str; 2] = ["/players/topscorers", "/injuries"];

/// Tracked (league, season) pairs refreshed per daily run when no `mode.batch_size` is
/// configured for the job -- conservative by default since standings calls compete with
/// fixtures/injuries for the same daily quota.
const DEFAULT_STANDINGS_BATCH_SIZE: usize = 1;

/// Runs one daily ingest job across every tracked league/season pair named in the job's
/// filters (or the global tracked set), per §4.1's daily ingest cadence and §4.8's scope
/// gate. Fetches `/fixtures` for the templated date window, resolves dependencies and
/// writes fixture rows (via [`ingest_fixtures_response`]), pulls each written fixture's
/// sub-endpoints, then the season-scoped endpoints, then recomputes coverage.
pub async fn run_daily_ingest(
    client: &UpstreamClient,
    conn: &mut PgConnection,
    cancel: &CancellationToken,
    config: &ConfigSnapshot,
    job: &JobDef,
    outcome: &mut JobOutcome,
) -> Result<(), PipelineError> {
    let leagues = job
        .filters
        .tracked_leagues
        .clone()
        .unwrap_or_else(|| config.tracked_leagues.clone());
    let today = Utc::now().format("%Y-%m-%d").to_string();

    for league in &leagues {
        if cancel.is_cancelled() {
            return Ok(());
        }

        ingest_fixtures_for_league(client, conn, cancel, job, league, &today, outcome).await?;

        let league_type = get_league(conn, league.id)?.map(|l| l.league_type);

        for endpoint in SEASON_SCOPED_ENDPOINTS {
            let decision = scope::decide(config, league.id, league.season, league_type.as_deref(), endpoint);
            if !decision.in_scope {
                continue;
            }
            ingest_season_scoped_endpoint(client, conn, cancel, league, endpoint, outcome).await?;
        }

        let team_stats_decision =
            scope::decide(config, league.id, league.season, league_type.as_deref(), "/teams/statistics");
        if team_stats_decision.in_scope {
            ingest_team_statistics(client, conn, cancel, league, outcome).await?;
        }

        coverage::recompute(
            conn,
            league.id,
            league.season,
            "/fixtures",
            config.coverage.max_lag_minutes,
            config.coverage.expected_counts.get("/fixtures").copied(),
            config.coverage.pipeline_window_hours,
            Utc::now(),
        )
        .map_err(PipelineError::Db)?;
    }

    if !cancel.is_cancelled() {
        run_standings_rotation(client, conn, cancel, config, job, &leagues, outcome).await?;
    }

    Ok(())
}

/// Pages through `leagues` `batch_size` at a time per run using a persisted cursor
/// (`StandingsRefreshProgress`, §3), rather than re-fetching every tracked league's
/// standings every day. The cursor wraps to the front once the whole tracked set has been
/// covered in a lap, bumping `lap_count`.
async fn run_standings_rotation(
    client: &UpstreamClient,
    conn: &mut PgConnection,
    cancel: &CancellationToken,
    config: &ConfigSnapshot,
    job: &JobDef,
    leagues: &[TrackedLeague],
    outcome: &mut JobOutcome,
) -> Result<(), PipelineError> {
    if leagues.is_empty() {
        return Ok(());
    }

    let progress = get_standings_refresh_progress(conn, &job.id)?;
    let mut index = progress
        .as_ref()
        .and_then(|p| match (p.cursor_league_id, p.cursor_season) {
            (Some(league_id), Some(season)) => {
                leagues.iter().position(|l| l.id == league_id && l.season == season)
            }
            _ => None,
        })
        .unwrap_or(0);

    let batch_size = job.mode.batch_size.unwrap_or(DEFAULT_STANDINGS_BATCH_SIZE).max(1);
    let mut wrapped = false;

    for _ in 0..batch_size.min(leagues.len()) {
        if cancel.is_cancelled() {
            break;
        }

        let league = &leagues[index];
        let league_type = get_league(conn, league.id)?.map(|l| l.league_type);
        let decision = scope::decide(config, league.id, league.season, league_type.as_deref(), "/standings");
        if decision.in_scope {
            ingest_season_scoped_endpoint(client, conn, cancel, league, "/standings", outcome).await?;
        }

        index += 1;
        if index >= leagues.len() {
            index = 0;
            wrapped = true;
        }
    }

    let next_cursor = Some((leagues[index].id, leagues[index].season));
    advance_standings_cursor(conn, &job.id, leagues.len() as i32, next_cursor, wrapped, Utc::now())?;

    Ok(())
}

async fn ingest_fixtures_for_league(
    client: &UpstreamClient,
    conn: &mut PgConnection,
    cancel: &CancellationToken,
    job: &JobDef,
    league: &TrackedLeague,
    today: &str,
    outcome: &mut JobOutcome,
) -> Result<(), PipelineError> {
    let mut params: Vec<(&str, String)> = vec![
        ("league", league.id.to_string()),
        ("season", league.season.to_string()),
    ];
    for (key, value) in &job.params {
        params.push((key.as_str(), value.replace("{today_utc}", today)));
    }
    if !job.params.contains_key("date") {
        params.push(("date", today.to_string()));
    }

    let PipelineOutcome::Proceed { response } =
        fetch_and_archive(client, conn, "/fixtures", &params, cancel).await?
    else {
        outcome.record_skip("daily_fixtures_fetch_skipped");
        return Ok(());
    };

    let written = ingest_fixtures_response(client, conn, cancel, response, outcome).await?;

    for fields in &written {
        for (endpoint, applier) in fixture_sub_endpoint_appliers() {
            let sub_params = vec![("fixture", fields.id.to_string())];
            match fetch_and_archive(client, conn, endpoint, &sub_params, cancel).await {
                Ok(PipelineOutcome::Proceed { response }) => {
                    applier(conn, fields.id, response, Utc::now())?;
                }
                Ok(PipelineOutcome::Skip { reason }) => outcome.record_skip(reason),
                Err(err) => return Err(err),
            }
        }
    }

    Ok(())
}

type SubEndpointApplier = fn(&mut PgConnection, i64, serde_json::Value, chrono::DateTime<Utc>) -> matchfeed_db::QueryResult<()>;

fn fixture_sub_endpoint_appliers() -> [(&'static str, SubEndpointApplier); 4] {
    [
        ("/fixtures/events", |conn, id, response, now| {
            transform::apply_events_response(conn, id, response, now).map(|_| ())
        }),
        ("/fixtures/statistics", transform::apply_statistics_response),
        ("/fixtures/lineups", transform::apply_lineups_response),
        ("/fixtures/players", transform::apply_players_response),
    ]
}

async fn ingest_season_scoped_endpoint(
    client: &UpstreamClient,
    conn: &mut PgConnection,
    cancel: &CancellationToken,
    league: &TrackedLeague,
    endpoint: &str,
    outcome: &mut JobOutcome,
) -> Result<(), PipelineError> {
    let params = vec![
        ("league", league.id.to_string()),
        ("season", league.season.to_string()),
    ];

    let PipelineOutcome::Proceed { response } = fetch_and_archive(client, conn, endpoint, &params, cancel).await?
    else {
        outcome.record_skip("season_scoped_fetch_skipped");
        return Ok(());
    };

    let now = Utc::now();
    match endpoint {
        "/standings" => transform::apply_standings_response(conn, league.id, league.season, response, now)?,
        "/players/topscorers" => {
            transform::apply_topscorers_response(conn, league.id, league.season, response, now)?
        }
        "/injuries" => transform::apply_injuries_response(conn, league.id, league.season, response, now)?,
        _ => {}
    }

    Ok(())
}

async fn ingest_team_statistics(
    client: &UpstreamClient,
    conn: &mut PgConnection,
    cancel: &CancellationToken,
    league: &TrackedLeague,
    outcome: &mut JobOutcome,
) -> Result<(), PipelineError> {
    let team_ids = teams_for_league_season(conn, league.id, league.season).map_err(PipelineError::Db)?;

    for team_id in team_ids {
        let params = vec![
            ("league", league.id.to_string()),
            ("season", league.season.to_string()),
            ("team", team_id.to_string()),
        ];

        match fetch_and_archive(client, conn, "/teams/statistics", &params, cancel).await? {
            PipelineOutcome::Proceed { response } => {
                transform::apply_team_statistics_response(
                    conn,
                    league.id,
                    league.season,
                    team_id,
                    response,
                    Utc::now(),
                )?;
            }
            PipelineOutcome::Skip { reason } => outcome.record_skip(reason),
        }
    }

    Ok(())
}

