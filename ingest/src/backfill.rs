use crate::dependency::ingest_fixtures_response;
use crate::jobs::JobOutcome;
use crate::pipeline::{fetch_and_archive, PipelineError, PipelineOutcome};
use chrono::{Duration, NaiveDate, Utc};
use diesel::PgConnection;
use matchfeed_client::UpstreamClient;
use matchfeed_db::queries::backfill::{
    advance_backfill_cursor, ensure_backfill_started, get_backfill_progress, mark_backfill_completed,
    record_backfill_error,
};
use tokio_util::sync::CancellationToken;

/// Default fixture backfill window, per §4.9 ("default 30 days, recommended 14 in
/// production").
pub const DEFAULT_WINDOW_DAYS: i64 = 30;

pub struct BackfillTask {
    pub job_id: String,
    pub league_id: i64,
    pub season: i32,
    pub season_start: NaiveDate,
    pub season_end: NaiveDate,
}

/// Processes up to `max_windows_per_task` windows of one task's resumable fixture
/// backfill. The cursor only advances on confirmed success; a failed window is retried
/// on the next run rather than skipped, per §4.9.
pub async fn run_fixture_backfill_task(
    client: &UpstreamClient,
    conn: &mut PgConnection,
    cancel: &CancellationToken,
    task: &BackfillTask,
    window_days: i64,
    max_windows_per_task: usize,
    outcome: &mut JobOutcome,
) -> Result<(), PipelineError> {
    ensure_backfill_started(conn, &task.job_id, task.league_id, task.season)?;

    for _ in 0..max_windows_per_task {
        let Some(progress) = get_backfill_progress(conn, &task.job_id, task.league_id, task.season)? else {
            break;
        };
        if progress.completed {
            break;
        }

        let window_start = task.season_start + Duration::days(progress.next_window_index as i64 * window_days);
        if window_start > task.season_end {
            mark_backfill_completed(conn, &task.job_id, task.league_id, task.season, Utc::now())?;
            break;
        }
        let window_end = std::cmp::min(
            window_start + Duration::days(window_days - 1),
            task.season_end,
        );

        let params = vec![
            ("league", task.league_id.to_string()),
            ("season", task.season.to_string()),
            ("from", window_start.format("%Y-%m-%d").to_string()),
            ("to", window_end.format("%Y-%m-%d").to_string()),
        ];

        match fetch_and_archive(client, conn, "/fixtures", &params, cancel).await {
            Ok(PipelineOutcome::Proceed { response }) => {
                ingest_fixtures_response(client, conn, cancel, response, outcome).await?;
                advance_backfill_cursor(
                    conn,
                    &task.job_id,
                    task.league_id,
                    task.season,
                    progress.next_window_index + 1,
                    Utc::now(),
                )?;
            }
            Ok(PipelineOutcome::Skip { reason }) => {
                outcome.record_skip(reason);
                record_backfill_error(conn, &task.job_id, task.league_id, task.season, reason, Utc::now())?;
                break;
            }
            Err(err) => {
                record_backfill_error(
                    conn,
                    &task.job_id,
                    task.league_id,
                    task.season,
                    &err.to_string(),
                    Utc::now(),
                )?;
                return Err(err);
            }
        }
    }

    Ok(())
}

/// Runs up to `max_tasks_per_run` not-completed backfill tasks, per §4.9. Tasks are
/// processed independently; one task's failure doesn't block the others in the batch.
pub async fn run_fixture_backfill(
    client: &UpstreamClient,
    conn: &mut PgConnection,
    cancel: &CancellationToken,
    tasks: &[BackfillTask],
    window_days: i64,
    max_tasks_per_run: usize,
    max_windows_per_task: usize,
    outcome: &mut JobOutcome,
) -> Result<(), PipelineError> {
    for task in tasks.iter().take(max_tasks_per_run) {
        if cancel.is_cancelled() {
            break;
        }
        if let Err(err) =
            run_fixture_backfill_task(client, conn, cancel, task, window_days, max_windows_per_task, outcome)
                .await
        {
            outcome.record_skip("backfill_task_error");
            log::warn!(
                "backfill task '{}' league={} season={} failed: {err}",
                task.job_id, task.league_id, task.season
            );
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn window_size_one_day_and_window_size_n_days_cover_the_same_season_span() {
        let season_start = NaiveDate::from_ymd_opt(2026, 8, 1).unwrap();
        let season_end = NaiveDate::from_ymd_opt(2026, 8, 10).unwrap();

        let windows_of = |window_days: i64| {
            let mut windows = Vec::new();
            let mut index = 0i64;
            loop {
                let start = season_start + Duration::days(index * window_days);
                if start > season_end {
                    break;
                }
                let end = std::cmp::min(start + Duration::days(window_days - 1), season_end);
                windows.push((start, end));
                index += 1;
            }
            windows
        };

        let daily = windows_of(1);
        let bulk = windows_of(30);

        assert_eq!(daily.first().unwrap().0, bulk.first().unwrap().0);
        assert_eq!(daily.last().unwrap().1, bulk.last().unwrap().1);
    }
}
