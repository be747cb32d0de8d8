use crate::error::QueryResult;
use crate::models::{
    DbLeague, DbTeamBootstrapProgress, DbTeam, NewCountry, NewLeague, NewTeam, NewTimezone, NewVenue,
};
use chrono::{DateTime, Utc};
use diesel::prelude::*;
use diesel::PgConnection;

pub fn upsert_country(conn: &mut PgConnection, code: &str, name: &str, flag: Option<&str>) -> QueryResult<()> {
    use crate::schema::core::countries::dsl;

    diesel::insert_into(dsl::countries)
        .values(&NewCountry { code, name, flag })
        .on_conflict(dsl::code)
        .do_update()
        .set((dsl::name.eq(name), dsl::flag.eq(flag)))
        .execute(conn)?;

    Ok(())
}

pub fn upsert_timezone(conn: &mut PgConnection, name: &str) -> QueryResult<()> {
    use crate::schema::core::timezones::dsl;

    diesel::insert_into(dsl::timezones)
        .values(&NewTimezone { name })
        .on_conflict(dsl::name)
        .do_nothing()
        .execute(conn)?;

    Ok(())
}

pub fn league_exists(conn: &mut PgConnection, league_id: i64) -> QueryResult<bool> {
    use crate::schema::core::leagues::dsl;

    let count: i64 = dsl::leagues
        .filter(dsl::id.eq(league_id))
        .count()
        .get_result(conn)?;

    Ok(count > 0)
}

pub fn get_league(conn: &mut PgConnection, id: i64) -> QueryResult<Option<DbLeague>> {
    use crate::schema::core::leagues::dsl;

    let league = dsl::leagues
        .filter(dsl::id.eq(id))
        .select(DbLeague::as_select())
        .first(conn)
        .optional()?;

    Ok(league)
}

pub fn upsert_league(
    conn: &mut PgConnection,
    id: i64,
    name: &str,
    league_type: &str,
    country_code: Option<&str>,
    seasons: serde_json::Value,
    now: DateTime<Utc>,
) -> QueryResult<()> {
    use crate::schema::core::leagues::dsl;

    let row = NewLeague {
        id,
        name,
        league_type,
        country_code,
        seasons,
        updated_at: now.naive_utc(),
    };

    diesel::insert_into(dsl::leagues)
        .values(&row)
        .on_conflict(dsl::id)
        .do_update()
        .set(&row)
        .execute(conn)?;

    Ok(())
}

pub fn team_exists(conn: &mut PgConnection, team_id: i64) -> QueryResult<bool> {
    use crate::schema::core::teams::dsl;

    let count: i64 = dsl::teams.filter(dsl::id.eq(team_id)).count().get_result(conn)?;
    Ok(count > 0)
}

pub fn teams_missing(conn: &mut PgConnection, ids: &[i64]) -> QueryResult<Vec<i64>> {
    use crate::schema::core::teams::dsl;

    let existing: Vec<i64> = dsl::teams
        .filter(dsl::id.eq_any(ids))
        .select(dsl::id)
        .get_results(conn)?;

    Ok(ids.iter().copied().filter(|id| !existing.contains(id)).collect())
}

/// Upserts a venue. If `venue_id` is `0` or `None`, does nothing -- callers map that to a
/// null fixture venue ref per §4.5.
pub fn upsert_venue(
    conn: &mut PgConnection,
    id: i64,
    name: &str,
    city: Option<&str>,
    country: Option<&str>,
    capacity: Option<i32>,
    surface: Option<&str>,
    now: DateTime<Utc>,
) -> QueryResult<()> {
    use crate::schema::core::venues::dsl;

    let row = NewVenue {
        id,
        name,
        city,
        country,
        capacity,
        surface,
        updated_at: now.naive_utc(),
    };

    diesel::insert_into(dsl::venues)
        .values(&row)
        .on_conflict(dsl::id)
        .do_update()
        .set(&row)
        .execute(conn)?;

    Ok(())
}

pub fn upsert_team(
    conn: &mut PgConnection,
    id: i64,
    name: &str,
    country: Option<&str>,
    founded: Option<i32>,
    venue_id: Option<i64>,
    now: DateTime<Utc>,
) -> QueryResult<()> {
    use crate::schema::core::teams::dsl;

    let row = NewTeam {
        id,
        name,
        country,
        founded,
        venue_id,
        updated_at: now.naive_utc(),
    };

    diesel::insert_into(dsl::teams)
        .values(&row)
        .on_conflict(dsl::id)
        .do_update()
        .set(&row)
        .execute(conn)?;

    Ok(())
}

pub fn get_team(conn: &mut PgConnection, id: i64) -> QueryResult<Option<DbTeam>> {
    use crate::schema::core::teams::dsl;

    let team = dsl::teams
        .filter(dsl::id.eq(id))
        .select(DbTeam::as_select())
        .first(conn)
        .optional()?;

    Ok(team)
}

pub fn team_bootstrap_completed(
    conn: &mut PgConnection,
    league_id: i64,
    season: i32,
) -> QueryResult<bool> {
    use crate::schema::core::team_bootstrap_progress::dsl;

    let row: Option<DbTeamBootstrapProgress> = dsl::team_bootstrap_progress
        .filter(dsl::league_id.eq(league_id))
        .filter(dsl::season.eq(season))
        .select(DbTeamBootstrapProgress::as_select())
        .first(conn)
        .optional()?;

    Ok(row.is_some_and(|r| r.completed))
}

pub fn mark_team_bootstrap_completed(
    conn: &mut PgConnection,
    league_id: i64,
    season: i32,
) -> QueryResult<()> {
    use crate::schema::core::team_bootstrap_progress::dsl;

    diesel::insert_into(dsl::team_bootstrap_progress)
        .values((dsl::league_id.eq(league_id), dsl::season.eq(season), dsl::completed.eq(true)))
        .on_conflict((dsl::league_id, dsl::season))
        .do_update()
        .set(dsl::completed.eq(true))
        .execute(conn)?;

    Ok(())
}
