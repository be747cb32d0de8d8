use crate::config::JobDef;
use std::time::Duration;

/// Closed sum of job types per §9's redesign guidance: "Represent job types as a closed
/// sum ... each variant owns its runner. New job types are additions to the sum, not
/// subclasses."
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobKind {
    StaticBootstrap,
    DailyIngest,
    Backfill,
    ReconcileAutoFinish,
    Verifier,
    StaleLiveRefresh,
    CoverageRefresh,
}

impl JobKind {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "static_bootstrap" => Some(Self::StaticBootstrap),
            "daily_ingest" => Some(Self::DailyIngest),
            "backfill" => Some(Self::Backfill),
            "reconcile_auto_finish" => Some(Self::ReconcileAutoFinish),
            "verifier" => Some(Self::Verifier),
            "stale_live_refresh" => Some(Self::StaleLiveRefresh),
            "coverage_refresh" => Some(Self::CoverageRefresh),
            _ => None,
        }
    }
}

#[derive(Debug, Clone)]
pub enum Trigger {
    Cron(cron::Schedule),
    Interval(Duration),
}

impl Trigger {
    pub fn from_job_def(def: &JobDef) -> Self {
        match def.interval.kind {
            crate::config::IntervalType::Cron => {
                let spec = def
                    .interval
                    .cron
                    .as_deref()
                    .expect("validated at config load time");
                Trigger::Cron(
                    spec.parse()
                        .expect("validated at config load time"),
                )
            }
            crate::config::IntervalType::Interval => Trigger::Interval(Duration::from_secs(
                def.interval.seconds.expect("validated at config load time"),
            )),
        }
    }
}

/// Accumulated per-run results. Row-level faults never bubble out of a job as
/// `Result::Err`; they're tallied here alongside a handful of sampled reasons for
/// operator visibility.
#[derive(Debug, Default)]
pub struct JobOutcome {
    pub rows_written: usize,
    pub rows_skipped: usize,
    pub dependency_fallbacks: usize,
    pub sampled_skip_reasons: Vec<String>,
}

impl JobOutcome {
    const MAX_SAMPLED_REASONS: usize = 20;

    pub fn record_skip(&mut self, reason: impl Into<String>) {
        self.rows_skipped += 1;
        if self.sampled_skip_reasons.len() < Self::MAX_SAMPLED_REASONS {
            self.sampled_skip_reasons.push(reason.into());
        }
    }

    pub fn merge(&mut self, other: JobOutcome) {
        self.rows_written += other.rows_written;
        self.rows_skipped += other.rows_skipped;
        self.dependency_fallbacks += other.dependency_fallbacks;
        self.sampled_skip_reasons.extend(other.sampled_skip_reasons);
        self.sampled_skip_reasons.truncate(Self::MAX_SAMPLED_REASONS);
    }
}
