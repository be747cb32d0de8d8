use crate::error::QueryResult;
use crate::models::{DbStandingsRefreshProgress, NewStanding};
use chrono::{DateTime, Utc};
use diesel::prelude::*;
use diesel::PgConnection;

/// Replaces every standings row for a (league, season) pair atomically: the upstream
/// standings table is always returned whole, so there is no per-row upsert key worth
/// tracking, only a delete-then-insert within one transaction.
pub fn replace_standings(
    conn: &mut PgConnection,
    league_id: i64,
    season: i32,
    rows: &[NewStanding],
) -> QueryResult<()> {
    use crate::schema::core::standings::dsl;

    conn.transaction(|conn| {
        diesel::delete(
            dsl::standings
                .filter(dsl::league_id.eq(league_id))
                .filter(dsl::season.eq(season)),
        )
        .execute(conn)?;

        if !rows.is_empty() {
            diesel::insert_into(dsl::standings)
                .values(rows)
                .execute(conn)?;
        }

        Ok(())
    })
}

pub fn get_standings_refresh_progress(
    conn: &mut PgConnection,
    job_id: &str,
) -> QueryResult<Option<DbStandingsRefreshProgress>> {
    use crate::schema::core::standings_refresh_progress::dsl;

    let row = dsl::standings_refresh_progress
        .filter(dsl::job_id.eq(job_id))
        .select(DbStandingsRefreshProgress::as_select())
        .first(conn)
        .optional()?;

    Ok(row)
}

/// Advances the rotation cursor to the next (league, season) pair, wrapping to `None` and
/// bumping `lap_count` once every tracked pair has been refreshed this lap.
pub fn advance_standings_cursor(
    conn: &mut PgConnection,
    job_id: &str,
    total_pairs: i32,
    next_cursor: Option<(i64, i32)>,
    wrapped: bool,
    now: DateTime<Utc>,
) -> QueryResult<()> {
    use crate::schema::core::standings_refresh_progress::dsl;

    let (cursor_league_id, cursor_season) = match next_cursor {
        Some((league_id, season)) => (Some(league_id), Some(season)),
        None => (None, None),
    };

    diesel::insert_into(dsl::standings_refresh_progress)
        .values((
            dsl::job_id.eq(job_id),
            dsl::cursor_league_id.eq(cursor_league_id),
            dsl::cursor_season.eq(cursor_season),
            dsl::total_pairs.eq(total_pairs),
            dsl::lap_count.eq(if wrapped { 1 } else { 0 }),
            dsl::last_full_pass.eq(if wrapped { Some(now.naive_utc()) } else { None }),
        ))
        .on_conflict(dsl::job_id)
        .do_update()
        .set((
            dsl::cursor_league_id.eq(cursor_league_id),
            dsl::cursor_season.eq(cursor_season),
            dsl::total_pairs.eq(total_pairs),
            dsl::lap_count.eq(dsl::lap_count + if wrapped { 1 } else { 0 }),
        ))
        .execute(conn)?;

    if wrapped {
        diesel::update(dsl::standings_refresh_progress.filter(dsl::job_id.eq(job_id)))
            .set(dsl::last_full_pass.eq(Some(now.naive_utc())))
            .execute(conn)?;
    }

    Ok(())
}
