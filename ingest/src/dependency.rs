use crate::jobs::JobOutcome;
use crate::pipeline::{fetch_and_archive, PipelineError, PipelineOutcome};
use crate::transform::{self, FixtureFields};
use chrono::Utc;
use diesel::PgConnection;
use matchfeed_client::UpstreamClient;
use matchfeed_db::queries::bootstrap::{league_exists, team_bootstrap_completed, teams_missing};
use tokio_util::sync::CancellationToken;

/// Guarantees referenced leagues/teams exist in CORE before a fixture UPSERT runs, per
/// §4.5. Emits structured telemetry (via `JobOutcome::dependency_fallbacks`) on which
/// fallbacks fired.
pub async fn ensure_fixture_dependencies(
    client: &UpstreamClient,
    conn: &mut PgConnection,
    cancel: &CancellationToken,
    league_id: i64,
    season: i32,
    team_ids: &[i64],
    outcome: &mut JobOutcome,
) -> Result<(), PipelineError> {
    if !league_exists(conn, league_id)? {
        outcome.dependency_fallbacks += 1;
        let params = vec![("id", league_id.to_string())];
        if let PipelineOutcome::Proceed { response } =
            fetch_and_archive(client, conn, "/leagues", &params, cancel).await?
        {
            transform::apply_leagues_response(conn, response, Utc::now())?;
        }
    }

    if !team_bootstrap_completed(conn, league_id, season)? {
        outcome.dependency_fallbacks += 1;
        let params = vec![
            ("league", league_id.to_string()),
            ("season", season.to_string()),
        ];
        if let PipelineOutcome::Proceed { response } =
            fetch_and_archive(client, conn, "/teams", &params, cancel).await?
        {
            transform::apply_teams_response(conn, response, Utc::now())?;
            matchfeed_db::queries::bootstrap::mark_team_bootstrap_completed(conn, league_id, season)?;
        }
    }

    let missing = teams_missing(conn, team_ids)?;
    for team_id in missing {
        outcome.dependency_fallbacks += 1;
        let params = vec![("id", team_id.to_string())];
        if let PipelineOutcome::Proceed { response } =
            fetch_and_archive(client, conn, "/teams", &params, cancel).await?
        {
            transform::apply_teams_response(conn, response, Utc::now())?;
        }
    }

    Ok(())
}

/// Projects every fixture in a `/fixtures*` response, resolving each one's league/team
/// dependencies before writing the fixture row -- the ordering §4.5 requires ("before any
/// fixture UPSERT, ensures..."). Entries that fail to project (missing required fields)
/// are counted as row-level skips rather than aborting the whole response.
pub async fn ingest_fixtures_response(
    client: &UpstreamClient,
    conn: &mut PgConnection,
    cancel: &CancellationToken,
    response: serde_json::Value,
    outcome: &mut JobOutcome,
) -> Result<Vec<FixtureFields>, PipelineError> {
    let mut written = Vec::new();
    let Some(entries) = response.as_array() else {
        return Ok(written);
    };

    for entry in entries {
        let Some(fields) = transform::project_fixture(entry) else {
            outcome.record_skip("malformed_fixture_entry");
            continue;
        };

        ensure_fixture_dependencies(
            client,
            conn,
            cancel,
            fields.league_id,
            fields.season,
            &[fields.home_team_id, fields.away_team_id],
            outcome,
        )
        .await?;

        transform::apply_fixture(conn, &fields, Utc::now())?;
        outcome.rows_written += 1;
        written.push(fields);
    }

    Ok(written)
}
