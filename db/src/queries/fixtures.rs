use crate::error::QueryResult;
use crate::models::{
    DbFixture, NewFixture, NewFixtureEvent, NewFixtureLineup, NewFixturePlayers,
    NewFixtureStatistics,
};
use chrono::{DateTime, NaiveDateTime, Utc};
use diesel::prelude::*;
use diesel::PgConnection;

/// Terminal statuses per §3/§4.6: a fixture row must never regress out of these into
/// `NS`/`TBD` from a stale response.
pub const FINISHED_STATUSES: [&str; 3] = ["FT", "AET", "PEN"];
const REGRESSING_STATUSES: [&str; 2] = ["NS", "TBD"];

/// Live-ish statuses the auto-finish and stale-live-refresh reconciler jobs watch, per §4.10.
pub const LIVE_STATUSES: [&str; 8] = ["1H", "2H", "HT", "ET", "BT", "P", "LIVE", "SUSP"];
pub const INTERMEDIATE_STATUSES: [&str; 1] = ["INT"];

pub struct FixtureUpsert<'a> {
    pub id: i64,
    pub league_id: i64,
    pub season: i32,
    pub kickoff: DateTime<Utc>,
    pub venue_id: Option<i64>,
    pub home_team_id: i64,
    pub away_team_id: i64,
    pub status_short: &'a str,
    pub status_long: &'a str,
    pub elapsed: Option<i32>,
    pub goals_home: Option<i32>,
    pub goals_away: Option<i32>,
    pub score: serde_json::Value,
    pub referee: Option<&'a str>,
}

pub fn get_fixture(conn: &mut PgConnection, id: i64) -> QueryResult<Option<DbFixture>> {
    use crate::schema::core::fixtures::dsl;

    let fixture = dsl::fixtures
        .filter(dsl::id.eq(id))
        .select(DbFixture::as_select())
        .first(conn)
        .optional()?;

    Ok(fixture)
}

/// Upserts a fixture, refusing to let a stale `NS`/`TBD` response regress a terminal status.
/// This is the idempotent RAW→CORE projection at the heart of §4.6: applying the same
/// envelope twice leaves the row unchanged on the second application.
pub fn upsert_fixture(
    conn: &mut PgConnection,
    input: FixtureUpsert<'_>,
    now: DateTime<Utc>,
) -> QueryResult<()> {
    use crate::schema::core::fixtures::dsl;

    let existing = get_fixture(conn, input.id)?;

    let (status_short, status_long, elapsed) = match &existing {
        Some(existing)
            if FINISHED_STATUSES.contains(&existing.status_short.as_str())
                && REGRESSING_STATUSES.contains(&input.status_short) =>
        {
            (
                existing.status_short.clone(),
                existing.status_long.clone(),
                existing.elapsed,
            )
        }
        _ => (
            input.status_short.to_string(),
            input.status_long.to_string(),
            input.elapsed,
        ),
    };

    let row = NewFixture {
        id: input.id,
        league_id: input.league_id,
        season: input.season,
        kickoff: input.kickoff.naive_utc(),
        venue_id: input.venue_id,
        home_team_id: input.home_team_id,
        away_team_id: input.away_team_id,
        status_short: &status_short,
        status_long: &status_long,
        elapsed,
        goals_home: input.goals_home,
        goals_away: input.goals_away,
        score: input.score,
        referee: input.referee,
        updated_at: now.naive_utc(),
    };

    diesel::insert_into(dsl::fixtures)
        .values(&row)
        .on_conflict(dsl::id)
        .do_update()
        .set(&row)
        .execute(conn)?;

    Ok(())
}

pub fn insert_fixture_event(
    conn: &mut PgConnection,
    row: &NewFixtureEvent<'_>,
) -> QueryResult<usize> {
    use crate::schema::core::fixture_events::dsl;

    let affected = diesel::insert_into(dsl::fixture_events)
        .values(row)
        .on_conflict((dsl::fixture_id, dsl::event_key))
        .do_nothing()
        .execute(conn)?;

    Ok(affected)
}

pub fn upsert_fixture_statistics(
    conn: &mut PgConnection,
    row: &NewFixtureStatistics,
) -> QueryResult<()> {
    use crate::schema::core::fixture_statistics::dsl;

    diesel::insert_into(dsl::fixture_statistics)
        .values(row)
        .on_conflict((dsl::fixture_id, dsl::team_id))
        .do_update()
        .set(row)
        .execute(conn)?;

    Ok(())
}

pub fn upsert_fixture_lineup(
    conn: &mut PgConnection,
    row: &NewFixtureLineup<'_>,
) -> QueryResult<()> {
    use crate::schema::core::fixture_lineups::dsl;

    diesel::insert_into(dsl::fixture_lineups)
        .values(row)
        .on_conflict((dsl::fixture_id, dsl::team_id))
        .do_update()
        .set(row)
        .execute(conn)?;

    Ok(())
}

pub fn upsert_fixture_players(
    conn: &mut PgConnection,
    row: &NewFixturePlayers,
) -> QueryResult<()> {
    use crate::schema::core::fixture_players::dsl;

    diesel::insert_into(dsl::fixture_players)
        .values(row)
        .on_conflict((dsl::fixture_id, dsl::team_id, dsl::player_id))
        .do_update()
        .set(row)
        .execute(conn)?;

    Ok(())
}

// ---- reconciler queries -----------------------------------------------------------------

/// Fixtures in live-ish or not-started statuses whose kickoff is old enough and whose row
/// hasn't been touched recently enough for auto-finish to consider them stuck, per §4.10.1.
pub fn fixtures_needing_auto_finish(
    conn: &mut PgConnection,
    league_ids: &[i64],
    kickoff_before: NaiveDateTime,
    updated_before: NaiveDateTime,
    limit: i64,
) -> QueryResult<Vec<DbFixture>> {
    use crate::schema::core::fixtures::dsl;

    let mut watched_statuses: Vec<&str> = LIVE_STATUSES.to_vec();
    watched_statuses.extend_from_slice(&INTERMEDIATE_STATUSES);
    watched_statuses.extend_from_slice(&REGRESSING_STATUSES);

    dsl::fixtures
        .filter(dsl::league_id.eq_any(league_ids))
        .filter(dsl::status_short.eq_any(watched_statuses))
        .filter(dsl::kickoff.lt(kickoff_before))
        .filter(dsl::updated_at.lt(updated_before))
        .order_by(dsl::kickoff.asc())
        .limit(limit)
        .select(DbFixture::as_select())
        .get_results(conn)
        .map_err(Into::into)
}

/// Force-finalizes a fixture without an upstream call: sets status to `FT` and flags it for
/// later score verification. Never overwrites goals, since none were observed.
pub fn force_finish_fixture(conn: &mut PgConnection, id: i64, now: DateTime<Utc>) -> QueryResult<()> {
    use crate::schema::core::fixtures::dsl;

    diesel::update(dsl::fixtures.filter(dsl::id.eq(id)))
        .set((
            dsl::status_short.eq("FT"),
            dsl::status_long.eq("Match Finished"),
            dsl::needs_score_verification.eq(true),
            dsl::verification_state.eq("pending"),
            dsl::updated_at.eq(now.naive_utc()),
        ))
        .execute(conn)?;

    Ok(())
}

pub fn fixtures_needing_verification(
    conn: &mut PgConnection,
    cooldown_before: NaiveDateTime,
    limit: i64,
) -> QueryResult<Vec<DbFixture>> {
    use crate::schema::core::fixtures::dsl;

    dsl::fixtures
        .filter(dsl::needs_score_verification.eq(true))
        .filter(dsl::verification_state.eq("pending"))
        .filter(
            dsl::verification_last_attempt_at
                .is_null()
                .or(dsl::verification_last_attempt_at.lt(cooldown_before)),
        )
        .order_by(dsl::kickoff.asc())
        .limit(limit)
        .select(DbFixture::as_select())
        .get_results(conn)
        .map_err(Into::into)
}

/// Records a verification attempt regardless of outcome, per the monotone
/// `pending -> (verified | not_found)` state machine in §3/§4.10.
pub fn record_verification_attempt(
    conn: &mut PgConnection,
    id: i64,
    outcome: VerificationOutcome,
    now: DateTime<Utc>,
) -> QueryResult<()> {
    use crate::schema::core::fixtures::dsl;

    let target = dsl::fixtures.filter(dsl::id.eq(id));
    let attempted_at = Some(now.naive_utc());

    match outcome {
        VerificationOutcome::Verified => {
            diesel::update(target)
                .set((
                    dsl::verification_attempt_count.eq(dsl::verification_attempt_count + 1),
                    dsl::verification_last_attempt_at.eq(attempted_at),
                    dsl::verification_state.eq("verified"),
                    dsl::needs_score_verification.eq(false),
                ))
                .execute(conn)?;
        }
        VerificationOutcome::NotFound => {
            diesel::update(target)
                .set((
                    dsl::verification_attempt_count.eq(dsl::verification_attempt_count + 1),
                    dsl::verification_last_attempt_at.eq(attempted_at),
                    dsl::verification_state.eq("not_found"),
                    dsl::needs_score_verification.eq(false),
                ))
                .execute(conn)?;
        }
        VerificationOutcome::StillPending => {
            diesel::update(target)
                .set((
                    dsl::verification_attempt_count.eq(dsl::verification_attempt_count + 1),
                    dsl::verification_last_attempt_at.eq(attempted_at),
                ))
                .execute(conn)?;
        }
    }

    Ok(())
}

#[derive(Debug, Clone, Copy)]
pub enum VerificationOutcome {
    Verified,
    NotFound,
    StillPending,
}

pub fn live_fixtures_stale_since(
    conn: &mut PgConnection,
    league_ids: &[i64],
    updated_before: NaiveDateTime,
    limit: i64,
) -> QueryResult<Vec<DbFixture>> {
    use crate::schema::core::fixtures::dsl;

    dsl::fixtures
        .filter(dsl::league_id.eq_any(league_ids))
        .filter(dsl::status_short.eq_any(LIVE_STATUSES))
        .filter(dsl::updated_at.lt(updated_before))
        .order_by(dsl::updated_at.asc())
        .limit(limit)
        .select(DbFixture::as_select())
        .get_results(conn)
        .map_err(Into::into)
}

/// Distinct team ids that have played a fixture in (league, season), used to drive
/// per-team endpoints (e.g. `/teams/statistics`) that have no dedicated membership table.
pub fn teams_for_league_season(conn: &mut PgConnection, league_id: i64, season: i32) -> QueryResult<Vec<i64>> {
    use crate::schema::core::fixtures::dsl;

    let homes: Vec<i64> = dsl::fixtures
        .filter(dsl::league_id.eq(league_id))
        .filter(dsl::season.eq(season))
        .select(dsl::home_team_id)
        .distinct()
        .get_results(conn)?;
    let aways: Vec<i64> = dsl::fixtures
        .filter(dsl::league_id.eq(league_id))
        .filter(dsl::season.eq(season))
        .select(dsl::away_team_id)
        .distinct()
        .get_results(conn)?;

    let mut ids = homes;
    for id in aways {
        if !ids.contains(&id) {
            ids.push(id);
        }
    }
    Ok(ids)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn finished_statuses_do_not_include_regressing_ones() {
        for status in FINISHED_STATUSES {
            assert!(!REGRESSING_STATUSES.contains(&status));
        }
    }
}
