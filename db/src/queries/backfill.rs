use crate::error::QueryResult;
use crate::models::{DbBackfillProgress, NewBackfillProgress};
use chrono::{DateTime, Utc};
use diesel::prelude::*;
use diesel::PgConnection;

pub fn get_backfill_progress(
    conn: &mut PgConnection,
    job_id: &str,
    league_id: i64,
    season: i32,
) -> QueryResult<Option<DbBackfillProgress>> {
    use crate::schema::core::backfill_progress::dsl;

    let row = dsl::backfill_progress
        .filter(dsl::job_id.eq(job_id))
        .filter(dsl::league_id.eq(league_id))
        .filter(dsl::season.eq(season))
        .select(DbBackfillProgress::as_select())
        .first(conn)
        .optional()?;

    Ok(row)
}

/// Creates a fresh cursor at window 0 if one doesn't already exist for this
/// (job, league, season) triple. A no-op if backfill was already started or finished, so
/// restarts resume rather than rewind.
pub fn ensure_backfill_started(
    conn: &mut PgConnection,
    job_id: &str,
    league_id: i64,
    season: i32,
) -> QueryResult<()> {
    use crate::schema::core::backfill_progress::dsl;

    diesel::insert_into(dsl::backfill_progress)
        .values(&NewBackfillProgress {
            job_id,
            league_id,
            season,
            next_window_index: 0,
            completed: false,
            last_error: None,
            last_run: None,
        })
        .on_conflict((dsl::job_id, dsl::league_id, dsl::season))
        .do_nothing()
        .execute(conn)?;

    Ok(())
}

/// Advances the window cursor after a window's rows are committed. Never called on
/// failure -- the cursor only moves forward on confirmed success, per §4.9.
pub fn advance_backfill_cursor(
    conn: &mut PgConnection,
    job_id: &str,
    league_id: i64,
    season: i32,
    next_window_index: i32,
    now: DateTime<Utc>,
) -> QueryResult<()> {
    use crate::schema::core::backfill_progress::dsl;

    diesel::update(
        dsl::backfill_progress
            .filter(dsl::job_id.eq(job_id))
            .filter(dsl::league_id.eq(league_id))
            .filter(dsl::season.eq(season)),
    )
    .set((
        dsl::next_window_index.eq(next_window_index),
        dsl::last_error.eq(None::<String>),
        dsl::last_run.eq(Some(now.naive_utc())),
    ))
    .execute(conn)?;

    Ok(())
}

pub fn mark_backfill_completed(
    conn: &mut PgConnection,
    job_id: &str,
    league_id: i64,
    season: i32,
    now: DateTime<Utc>,
) -> QueryResult<()> {
    use crate::schema::core::backfill_progress::dsl;

    diesel::update(
        dsl::backfill_progress
            .filter(dsl::job_id.eq(job_id))
            .filter(dsl::league_id.eq(league_id))
            .filter(dsl::season.eq(season)),
    )
    .set((
        dsl::completed.eq(true),
        dsl::last_error.eq(None::<String>),
        dsl::last_run.eq(Some(now.naive_utc())),
    ))
    .execute(conn)?;

    Ok(())
}

/// Records a window failure without moving the cursor, so the next run retries the same
/// window instead of skipping it.
pub fn record_backfill_error(
    conn: &mut PgConnection,
    job_id: &str,
    league_id: i64,
    season: i32,
    error: &str,
    now: DateTime<Utc>,
) -> QueryResult<()> {
    use crate::schema::core::backfill_progress::dsl;

    diesel::update(
        dsl::backfill_progress
            .filter(dsl::job_id.eq(job_id))
            .filter(dsl::league_id.eq(league_id))
            .filter(dsl::season.eq(season)),
    )
    .set((
        dsl::last_error.eq(Some(error)),
        dsl::last_run.eq(Some(now.naive_utc())),
    ))
    .execute(conn)?;

    Ok(())
}

pub fn incomplete_backfills(conn: &mut PgConnection, job_id: &str) -> QueryResult<Vec<DbBackfillProgress>> {
    use crate::schema::core::backfill_progress::dsl;

    dsl::backfill_progress
        .filter(dsl::job_id.eq(job_id))
        .filter(dsl::completed.eq(false))
        .select(DbBackfillProgress::as_select())
        .get_results(conn)
        .map_err(Into::into)
}
