use crate::error::QueryResult;
use crate::models::{DbCoverageStatus, NewCoverageStatus};
use diesel::prelude::*;
use diesel::PgConnection;

pub fn upsert_coverage_status(conn: &mut PgConnection, row: &NewCoverageStatus) -> QueryResult<()> {
    use crate::schema::mart::coverage_status::dsl;

    diesel::insert_into(dsl::coverage_status)
        .values(row)
        .on_conflict((dsl::league_id, dsl::season, dsl::endpoint))
        .do_update()
        .set(row)
        .execute(conn)?;

    Ok(())
}

pub fn get_coverage_status(
    conn: &mut PgConnection,
    league_id: i64,
    season: i32,
    endpoint: &str,
) -> QueryResult<Option<DbCoverageStatus>> {
    use crate::schema::mart::coverage_status::dsl;

    let row = dsl::coverage_status
        .filter(dsl::league_id.eq(league_id))
        .filter(dsl::season.eq(season))
        .filter(dsl::endpoint.eq(endpoint))
        .select(DbCoverageStatus::as_select())
        .first(conn)
        .optional()?;

    Ok(row)
}

pub fn coverage_status_for_league(
    conn: &mut PgConnection,
    league_id: i64,
    season: i32,
) -> QueryResult<Vec<DbCoverageStatus>> {
    use crate::schema::mart::coverage_status::dsl;

    dsl::coverage_status
        .filter(dsl::league_id.eq(league_id))
        .filter(dsl::season.eq(season))
        .select(DbCoverageStatus::as_select())
        .get_results(conn)
        .map_err(Into::into)
}

/// Number of distinct fixtures in a (league, season) with a non-null final score,
/// and the total tracked fixture count -- the two inputs to count coverage in §4.7.
pub fn fixture_count_coverage_inputs(
    conn: &mut PgConnection,
    league_id: i64,
    season: i32,
) -> QueryResult<(i64, i64)> {
    use crate::schema::core::fixtures::dsl;

    let total: i64 = dsl::fixtures
        .filter(dsl::league_id.eq(league_id))
        .filter(dsl::season.eq(season))
        .count()
        .get_result(conn)?;

    let with_score: i64 = dsl::fixtures
        .filter(dsl::league_id.eq(league_id))
        .filter(dsl::season.eq(season))
        .filter(dsl::goals_home.is_not_null())
        .filter(dsl::goals_away.is_not_null())
        .count()
        .get_result(conn)?;

    Ok((with_score, total))
}

/// Most recent `updated_at` among a league/season's fixtures, the basis for freshness
/// coverage (lag since the last observed write).
pub fn latest_fixture_update(
    conn: &mut PgConnection,
    league_id: i64,
    season: i32,
) -> QueryResult<Option<chrono::NaiveDateTime>> {
    use crate::schema::core::fixtures::dsl;

    let latest = dsl::fixtures
        .filter(dsl::league_id.eq(league_id))
        .filter(dsl::season.eq(season))
        .select(diesel::dsl::max(dsl::updated_at))
        .first(conn)?;

    Ok(latest)
}
