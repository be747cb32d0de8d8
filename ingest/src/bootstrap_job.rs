use crate::config::{JobDef, TrackedLeague};
use crate::jobs::JobOutcome;
use crate::pipeline::{fetch_and_archive, PipelineError, PipelineOutcome};
use crate::transform;
use chrono::Utc;
use diesel::PgConnection;
use matchfeed_client::UpstreamClient;
use matchfeed_db::queries::bootstrap::mark_team_bootstrap_completed;
use tokio_util::sync::CancellationToken;

/// Static bootstrap job: seeds leagues and teams for every tracked (league, season) pair
/// up front, so the Dependency Resolver's per-fixture fallback path rarely fires during
/// steady-state daily ingest. Reuses `job.filters.tracked_leagues`, already resolved at
/// config-load time to inherit from the daily job when omitted (§4.1).
pub async fn run_static_bootstrap(
    client: &UpstreamClient,
    conn: &mut PgConnection,
    cancel: &CancellationToken,
    job: &JobDef,
    outcome: &mut JobOutcome,
) -> Result<(), PipelineError> {
    let leagues = job.filters.tracked_leagues.clone().unwrap_or_default();

    for league in &leagues {
        if cancel.is_cancelled() {
            return Ok(());
        }
        bootstrap_league(client, conn, cancel, league, outcome).await?;
    }

    Ok(())
}

async fn bootstrap_league(
    client: &UpstreamClient,
    conn: &mut PgConnection,
    cancel: &CancellationToken,
    league: &TrackedLeague,
    outcome: &mut JobOutcome,
) -> Result<(), PipelineError> {
    let league_params = vec![("id", league.id.to_string())];
    match fetch_and_archive(client, conn, "/leagues", &league_params, cancel).await? {
        PipelineOutcome::Proceed { response } => {
            transform::apply_leagues_response(conn, response, Utc::now())?;
        }
        PipelineOutcome::Skip { reason } => outcome.record_skip(reason),
    }

    let team_params = vec![
        ("league", league.id.to_string()),
        ("season", league.season.to_string()),
    ];
    match fetch_and_archive(client, conn, "/teams", &team_params, cancel).await? {
        PipelineOutcome::Proceed { response } => {
            transform::apply_teams_response(conn, response, Utc::now())?;
            mark_team_bootstrap_completed(conn, league.id, league.season)?;
        }
        PipelineOutcome::Skip { reason } => outcome.record_skip(reason),
    }

    Ok(())
}
