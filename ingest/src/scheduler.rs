use crate::backfill::{run_fixture_backfill, BackfillTask, DEFAULT_WINDOW_DAYS};
use crate::bootstrap_job::run_static_bootstrap;
use crate::config::{ConfigSnapshot, JobDef};
use crate::coverage::run_coverage_refresh;
use crate::daily::run_daily_ingest;
use crate::jobs::{JobKind, JobOutcome, Trigger};
use crate::pipeline::PipelineError;
use crate::reconcile::{run_auto_finish, run_stale_live_refresh, run_verifier, ReconcileConfig};
use chrono::{NaiveDate, Utc};
use log::{info, warn};
use matchfeed_client::{RateGovernor, UpstreamClient};
use matchfeed_db::queries::backfill::incomplete_backfills;
use matchfeed_db::{ConnectionPool, QueryError};
use miette::Diagnostic;
use std::sync::Arc;
use thiserror::Error;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

#[derive(Debug, Error, Diagnostic)]
pub enum SchedulerError {
    #[error(transparent)]
    Pipeline(#[from] PipelineError),

    #[error(transparent)]
    Db(#[from] QueryError),
}

struct ScheduledJob {
    def: JobDef,
    kind: JobKind,
    trigger: Trigger,
    next_fire: Instant,
}

/// Single cooperative event loop, per §4.11: each job is bound to its trigger, fires in
/// turn, and the Rate Governor -- not this loop -- is what serialises upstream work.
/// Shutdown is cooperative: `cancel` is checked between jobs and passed down so in-flight
/// suspension points (HTTP, DB, token acquisition) unwind promptly.
pub struct Scheduler {
    client: Arc<UpstreamClient>,
    governor: Arc<RateGovernor>,
    pool: ConnectionPool,
    config: ConfigSnapshot,
    jobs: Vec<ScheduledJob>,
}

impl Scheduler {
    pub fn new(client: Arc<UpstreamClient>, governor: Arc<RateGovernor>, pool: ConnectionPool, config: ConfigSnapshot) -> Self {
        let now = Instant::now();
        let jobs = config
            .jobs
            .iter()
            .filter(|job| job.enabled)
            .filter_map(|job| {
                let kind = JobKind::parse(&job.kind).or_else(|| {
                    warn!("job '{}' has unrecognized kind '{}', skipping", job.id, job.kind);
                    None
                })?;
                let trigger = Trigger::from_job_def(job);
                Some(ScheduledJob {
                    def: job.clone(),
                    kind,
                    next_fire: next_fire_instant(&trigger, now),
                    trigger,
                })
            })
            .collect();

        Self {
            client,
            governor,
            pool,
            config,
            jobs,
        }
    }

    /// Runs until `cancel` fires. Stops scheduling new work immediately on cancellation;
    /// any job already dispatched is allowed to reach its next suspension point and
    /// unwind there, per §4.11's graceful-shutdown contract.
    pub async fn run(mut self, cancel: CancellationToken) {
        if self.jobs.is_empty() {
            warn!("scheduler started with no enabled jobs");
        }

        loop {
            let Some(index) = self.earliest_job_index() else {
                info!("no enabled jobs remain, scheduler exiting");
                return;
            };

            let wake_at = self.jobs[index].next_fire;

            tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    info!("scheduler received shutdown signal, stopping");
                    return;
                }
                _ = tokio::time::sleep_until(wake_at) => {}
            }

            if cancel.is_cancelled() {
                return;
            }

            self.fire(index, &cancel).await;

            let now = Instant::now();
            self.jobs[index].next_fire = next_fire_instant(&self.jobs[index].trigger, now);
        }
    }

    fn earliest_job_index(&self) -> Option<usize> {
        self.jobs
            .iter()
            .enumerate()
            .min_by_key(|(_, job)| job.next_fire)
            .map(|(index, _)| index)
    }

    async fn fire(&self, index: usize, cancel: &CancellationToken) {
        let job = &self.jobs[index];
        let job_id = job.def.id.clone();

        let mut conn = match self.pool.get() {
            Ok(conn) => conn,
            Err(err) => {
                warn!("job '{job_id}' could not check out a database connection: {err}");
                return;
            }
        };

        let mut outcome = JobOutcome::default();
        let result = match job.kind {
            JobKind::StaticBootstrap => {
                run_static_bootstrap(&self.client, &mut conn, cancel, &job.def, &mut outcome)
                    .await
                    .map_err(SchedulerError::from)
            }
            JobKind::DailyIngest => {
                run_daily_ingest(&self.client, &mut conn, cancel, &self.config, &job.def, &mut outcome)
                    .await
                    .map_err(SchedulerError::from)
            }
            JobKind::Backfill => self.run_backfill(&mut conn, cancel, &job.def, &mut outcome).await,
            JobKind::ReconcileAutoFinish => {
                self.run_reconcile_auto_finish(&mut conn, cancel, &job.def, &mut outcome).await
            }
            JobKind::Verifier => self.run_reconcile_verifier(&mut conn, cancel, &job.def, &mut outcome).await,
            JobKind::StaleLiveRefresh => {
                self.run_reconcile_stale_live(&mut conn, cancel, &job.def, &mut outcome).await
            }
            JobKind::CoverageRefresh => {
                run_coverage_refresh(&mut conn, &self.config, Utc::now()).map_err(SchedulerError::from)
            }
        };

        match result {
            Ok(()) => info!(
                "job '{job_id}' finished: {} written, {} skipped, {} dependency fallbacks",
                outcome.rows_written, outcome.rows_skipped, outcome.dependency_fallbacks
            ),
            Err(err) => warn!("job '{job_id}' failed: {err}"),
        }

        if !outcome.sampled_skip_reasons.is_empty() {
            info!("job '{job_id}' sampled skip reasons: {:?}", outcome.sampled_skip_reasons);
        }
    }

    async fn run_backfill(
        &self,
        conn: &mut diesel::PgConnection,
        cancel: &CancellationToken,
        job: &JobDef,
        outcome: &mut JobOutcome,
    ) -> Result<(), SchedulerError> {
        let window_days = job.mode.window_days.unwrap_or(DEFAULT_WINDOW_DAYS as u32) as i64;
        let max_tasks_per_run = job.mode.max_tasks_per_run.unwrap_or(5);
        let max_windows_per_task = job.mode.max_windows_per_task.unwrap_or(1);

        let leagues = job.filters.tracked_leagues.clone().unwrap_or_default();
        let existing = incomplete_backfills(conn, &job.id)?;

        let mut tasks = Vec::new();
        for league in &leagues {
            let already_tracked = existing
                .iter()
                .any(|p| p.league_id == league.id && p.season == league.season);
            if !already_tracked {
                tasks.push(season_window_task(job, league.id, league.season));
            }
        }
        for progress in &existing {
            tasks.push(BackfillTask {
                job_id: job.id.clone(),
                league_id: progress.league_id,
                season: progress.season,
                season_start: season_start(progress.season),
                season_end: season_end(progress.season),
            });
        }

        run_fixture_backfill(
            &self.client,
            conn,
            cancel,
            &tasks,
            window_days,
            max_tasks_per_run,
            max_windows_per_task,
            outcome,
        )
        .await?;

        Ok(())
    }

    async fn run_reconcile_auto_finish(
        &self,
        conn: &mut diesel::PgConnection,
        cancel: &CancellationToken,
        job: &JobDef,
        outcome: &mut JobOutcome,
    ) -> Result<(), SchedulerError> {
        let league_ids = tracked_league_ids(job, &self.config);
        let config = reconcile_config(job);
        run_auto_finish(&self.client, conn, cancel, &league_ids, &config, Utc::now(), outcome).await?;
        Ok(())
    }

    async fn run_reconcile_verifier(
        &self,
        conn: &mut diesel::PgConnection,
        cancel: &CancellationToken,
        job: &JobDef,
        outcome: &mut JobOutcome,
    ) -> Result<(), SchedulerError> {
        let config = reconcile_config(job);
        let cooldown_minutes = job.mode.stale_after_minutes.unwrap_or(60);
        run_verifier(
            &self.client,
            &self.governor,
            conn,
            cancel,
            cooldown_minutes,
            &config,
            Utc::now(),
            outcome,
        )
        .await?;
        Ok(())
    }

    async fn run_reconcile_stale_live(
        &self,
        conn: &mut diesel::PgConnection,
        cancel: &CancellationToken,
        job: &JobDef,
        outcome: &mut JobOutcome,
    ) -> Result<(), SchedulerError> {
        let league_ids = tracked_league_ids(job, &self.config);
        let config = reconcile_config(job);
        run_stale_live_refresh(&self.client, conn, cancel, &league_ids, &config, Utc::now(), outcome).await?;
        Ok(())
    }
}

fn tracked_league_ids(job: &JobDef, config: &ConfigSnapshot) -> Vec<i64> {
    job.filters
        .tracked_leagues
        .clone()
        .unwrap_or_else(|| config.tracked_leagues.clone())
        .into_iter()
        .map(|l| l.id)
        .collect()
}

fn reconcile_config(job: &JobDef) -> ReconcileConfig {
    ReconcileConfig {
        threshold_hours: job.mode.threshold_hours.unwrap_or(3),
        safety_lag_hours: job.mode.safety_lag_hours.unwrap_or(1),
        try_fetch_first: job.mode.try_fetch_first.unwrap_or(true),
        max_fixtures_per_run: job.mode.max_fixtures_per_run.unwrap_or(200) as i64,
        dry_run: job.mode.dry_run.unwrap_or(false),
        batch_size: job.mode.batch_size.unwrap_or(20),
        min_daily_quota: job.mode.min_daily_quota.unwrap_or(50_000),
        stale_after_minutes: job.mode.stale_after_minutes.unwrap_or(15),
    }
}

fn season_window_task(job: &JobDef, league_id: i64, season: i32) -> BackfillTask {
    BackfillTask {
        job_id: job.id.clone(),
        league_id,
        season,
        season_start: season_start(season),
        season_end: season_end(season),
    }
}

/// A football season nominally runs August of `season` through July of the following
/// calendar year; this bound is intentionally generous since the backfill window is
/// clamped at the real CORE state by the resolver, not by this date range.
fn season_start(season: i32) -> NaiveDate {
    NaiveDate::from_ymd_opt(season, 7, 1).unwrap_or_else(|| NaiveDate::from_ymd_opt(season, 1, 1).unwrap())
}

fn season_end(season: i32) -> NaiveDate {
    NaiveDate::from_ymd_opt(season + 1, 6, 30).unwrap_or_else(|| NaiveDate::from_ymd_opt(season, 12, 31).unwrap())
}

fn next_fire_instant(trigger: &Trigger, now: Instant) -> Instant {
    match trigger {
        Trigger::Interval(period) => now + *period,
        Trigger::Cron(schedule) => {
            let wall_now = Utc::now();
            match schedule.upcoming(Utc).next() {
                Some(next) => {
                    let delay = (next - wall_now).to_std().unwrap_or(std::time::Duration::ZERO);
                    now + delay
                }
                None => now + std::time::Duration::from_secs(3600),
            }
        }
    }
}
