use figment::providers::{Env, Format, Serialized, Yaml};
use figment::Figment;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use thiserror::Error;

/// Declarative configuration, assembled from a directory of YAML documents plus
/// `MATCHFEED_`-prefixed environment overrides, layered with
/// `Figment::from(Serialized::defaults(..)).merge(..).merge(Env::prefixed(..))`. Merges
/// job definitions, scope policy, coverage targets, overrides, and tracked leagues from
/// across the YAML documents in the config directory.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RawConfig {
    pub upstream: UpstreamSection,
    #[serde(default)]
    pub rate_limits: RateLimitsSection,
    #[serde(default)]
    pub tracked_leagues: Vec<TrackedLeague>,
    #[serde(default)]
    pub jobs: Vec<JobDef>,
    #[serde(default)]
    pub scope: ScopeSection,
    #[serde(default)]
    pub coverage: CoverageSection,
    #[serde(default)]
    pub overrides: Vec<ScopeOverride>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct UpstreamSection {
    pub base_url: String,
    pub api_key_header: String,
    pub api_key: String,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_backoff_base_ms")]
    pub backoff_base_ms: u64,
    #[serde(default = "default_backoff_cap_ms")]
    pub backoff_cap_ms: u64,
}

fn default_request_timeout_secs() -> u64 {
    10
}
fn default_max_retries() -> u32 {
    5
}
fn default_backoff_base_ms() -> u64 {
    500
}
fn default_backoff_cap_ms() -> u64 {
    60_000
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RateLimitsSection {
    pub capacity_per_minute: f64,
    pub emergency_stop_threshold: i64,
    pub circuit_breaker_trip_threshold: u32,
    pub circuit_breaker_cooldown_secs: u64,
}

impl Default for RateLimitsSection {
    fn default() -> Self {
        Self {
            capacity_per_minute: 300.0,
            emergency_stop_threshold: 7500,
            circuit_breaker_trip_threshold: 5,
            circuit_breaker_cooldown_secs: 60,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TrackedLeague {
    pub id: i64,
    pub season: i32,
    #[serde(default)]
    pub name: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum IntervalType {
    Cron,
    Interval,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct IntervalSpec {
    #[serde(rename = "type")]
    pub kind: IntervalType,
    pub cron: Option<String>,
    pub seconds: Option<u64>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct JobModeKnobs {
    #[serde(default)]
    pub batch_size: Option<usize>,
    #[serde(default)]
    pub window_days: Option<u32>,
    #[serde(default)]
    pub max_tasks_per_run: Option<usize>,
    #[serde(default)]
    pub max_windows_per_task: Option<usize>,
    #[serde(default)]
    pub try_fetch_first: Option<bool>,
    #[serde(default)]
    pub threshold_hours: Option<i64>,
    #[serde(default)]
    pub safety_lag_hours: Option<i64>,
    #[serde(default)]
    pub stale_after_minutes: Option<i64>,
    #[serde(default)]
    pub min_daily_quota: Option<i64>,
    #[serde(default)]
    pub max_fixtures_per_run: Option<usize>,
    #[serde(default)]
    pub dry_run: Option<bool>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct JobDef {
    pub id: String,
    pub kind: String,
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default)]
    pub endpoint: Option<String>,
    #[serde(default)]
    pub params: HashMap<String, String>,
    pub interval: IntervalSpec,
    #[serde(default)]
    pub filters: JobFilters,
    #[serde(default)]
    pub mode: JobModeKnobs,
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct JobFilters {
    #[serde(default)]
    pub tracked_leagues: Option<Vec<TrackedLeague>>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct ScopeSection {
    #[serde(default = "default_baseline")]
    pub baseline: Vec<String>,
}

fn default_baseline() -> Vec<String> {
    vec![
        "/fixtures".to_string(),
        "/fixtures/events".to_string(),
        "/fixtures/statistics".to_string(),
        "/fixtures/lineups".to_string(),
        "/fixtures/players".to_string(),
        "/injuries".to_string(),
    ]
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ScopeOverride {
    pub league_id: i64,
    pub season: i32,
    pub endpoint: String,
    pub in_scope: bool,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct CoverageSection {
    #[serde(default)]
    pub max_lag_minutes: Option<f64>,
    #[serde(default)]
    pub expected_counts: HashMap<String, i64>,
    #[serde(default = "default_pipeline_window_hours")]
    pub pipeline_window_hours: i64,
}

fn default_pipeline_window_hours() -> i64 {
    24
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to load configuration from {dir}")]
    Load {
        dir: String,
        #[source]
        source: figment::Error,
    },

    #[error("job '{job_id}' has malformed interval: {reason}")]
    MalformedInterval { job_id: String, reason: String },

    #[error("static job '{job_id}' has no tracked_leagues and no daily job to inherit from")]
    UnresolvedInheritance { job_id: String },
}

/// Validated, immutable snapshot handed to the Scheduler. Built once at startup; never
/// mutated afterward (per §4.1, "emits a validated, immutable configuration snapshot").
#[derive(Debug, Clone)]
pub struct ConfigSnapshot {
    pub upstream: UpstreamSection,
    pub rate_limits: RateLimitsSection,
    pub tracked_leagues: Vec<TrackedLeague>,
    pub jobs: Vec<JobDef>,
    pub scope: ScopeSection,
    pub coverage: CoverageSection,
    pub overrides: Vec<ScopeOverride>,
}

/// Loads every `*.yaml`/`*.yml` file directly under `config_dir`, merged in directory
/// order, then layers `MATCHFEED_`-prefixed environment variables on top for
/// deployment-specific overrides (database URL is handled separately via `POSTGRES_*`,
/// read by `matchfeed_db::url`).
pub fn load(config_dir: &Path) -> Result<ConfigSnapshot, ConfigError> {
    let mut figment = Figment::from(Serialized::defaults(empty_defaults()));

    let mut entries: Vec<_> = std::fs::read_dir(config_dir)
        .map_err(|e| ConfigError::Load {
            dir: config_dir.display().to_string(),
            source: figment::Error::from(e.to_string()),
        })?
        .filter_map(|e| e.ok())
        .map(|e| e.path())
        .filter(|p| {
            matches!(
                p.extension().and_then(|e| e.to_str()),
                Some("yaml") | Some("yml")
            )
        })
        .collect();
    entries.sort();

    for path in entries {
        figment = figment.merge(Yaml::file(path));
    }

    figment = figment.merge(Env::prefixed("MATCHFEED_").split("__"));

    let raw: RawConfig = figment.extract().map_err(|source| ConfigError::Load {
        dir: config_dir.display().to_string(),
        source,
    })?;

    validate_and_resolve(raw)
}

#[derive(Debug, Serialize)]
struct EmptyDefaults {}

fn empty_defaults() -> EmptyDefaults {
    EmptyDefaults {}
}

fn validate_and_resolve(raw: RawConfig) -> Result<ConfigSnapshot, ConfigError> {
    let daily_leagues = raw
        .jobs
        .iter()
        .find(|j| j.kind == "daily_ingest")
        .and_then(|j| j.filters.tracked_leagues.clone())
        .unwrap_or_else(|| raw.tracked_leagues.clone());

    let mut jobs = Vec::with_capacity(raw.jobs.len());
    for mut job in raw.jobs {
        match job.interval.kind {
            IntervalType::Cron => {
                let spec = job.interval.cron.clone().ok_or_else(|| {
                    ConfigError::MalformedInterval {
                        job_id: job.id.clone(),
                        reason: "type=cron requires `cron`".to_string(),
                    }
                })?;
                spec.parse::<cron::Schedule>()
                    .map_err(|e| ConfigError::MalformedInterval {
                        job_id: job.id.clone(),
                        reason: e.to_string(),
                    })?;
            }
            IntervalType::Interval => {
                if job.interval.seconds.is_none() {
                    return Err(ConfigError::MalformedInterval {
                        job_id: job.id.clone(),
                        reason: "type=interval requires `seconds`".to_string(),
                    });
                }
            }
        }

        if job.kind == "static_bootstrap" && job.filters.tracked_leagues.is_none() {
            if daily_leagues.is_empty() {
                return Err(ConfigError::UnresolvedInheritance { job_id: job.id });
            }
            job.filters.tracked_leagues = Some(daily_leagues.clone());
        }

        jobs.push(job);
    }

    Ok(ConfigSnapshot {
        upstream: raw.upstream,
        rate_limits: raw.rate_limits,
        tracked_leagues: raw.tracked_leagues,
        jobs,
        scope: raw.scope,
        coverage: raw.coverage,
        overrides: raw.overrides,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_baseline_covers_fixtures_and_injuries() {
        let scope = ScopeSection::default();
        assert!(scope.baseline.contains(&"/fixtures".to_string()));
        assert!(scope.baseline.contains(&"/injuries".to_string()));
    }
}
