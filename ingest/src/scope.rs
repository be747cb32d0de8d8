use crate::config::{ConfigSnapshot, ScopeOverride};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScopeDecision {
    pub in_scope: bool,
    pub reason: &'static str,
}

impl ScopeDecision {
    fn baseline() -> Self {
        Self {
            in_scope: true,
            reason: "baseline",
        }
    }

    fn override_enabled() -> Self {
        Self {
            in_scope: true,
            reason: "override_enabled",
        }
    }

    fn override_disabled() -> Self {
        Self {
            in_scope: false,
            reason: "override_disabled",
        }
    }

    fn type_cup_disabled() -> Self {
        Self {
            in_scope: false,
            reason: "type_Cup_disabled",
        }
    }

    fn type_default() -> Self {
        Self {
            in_scope: true,
            reason: "type_default",
        }
    }

    fn unknown_type_fail_open() -> Self {
        Self {
            in_scope: true,
            reason: "unknown_type_fail_open",
        }
    }
}

/// Endpoints a `Cup`-type league never calls absent an override, per §4.8 step 3.
const CUP_DISABLED_ENDPOINTS: [&str; 3] = ["/standings", "/players/topscorers", "/teams/statistics"];

/// Pure, deterministic fail-open decision procedure per §4.8. Scope affects job
/// selection only -- it never touches rate-limit behaviour.
pub fn decide(
    config: &ConfigSnapshot,
    league_id: i64,
    season: i32,
    league_type: Option<&str>,
    endpoint: &str,
) -> ScopeDecision {
    if config.scope.baseline.iter().any(|b| b == endpoint) {
        return ScopeDecision::baseline();
    }

    if let Some(over) = find_override(&config.overrides, league_id, season, endpoint) {
        return if over.in_scope {
            ScopeDecision::override_enabled()
        } else {
            ScopeDecision::override_disabled()
        };
    }

    match league_type {
        Some("Cup") if CUP_DISABLED_ENDPOINTS.contains(&endpoint) => {
            ScopeDecision::type_cup_disabled()
        }
        Some(_) => ScopeDecision::type_default(),
        None => ScopeDecision::unknown_type_fail_open(),
    }
}

fn find_override<'a>(
    overrides: &'a [ScopeOverride],
    league_id: i64,
    season: i32,
    endpoint: &str,
) -> Option<&'a ScopeOverride> {
    overrides.iter().find(|o| {
        o.league_id == league_id && o.season == season && o.endpoint == endpoint
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{
        CoverageSection, RateLimitsSection, ScopeSection, UpstreamSection,
    };

    fn empty_config() -> ConfigSnapshot {
        ConfigSnapshot {
            upstream: UpstreamSection {
                base_url: "https://example.test".to_string(),
                api_key_header: "x-apisports-key".to_string(),
                api_key: "k".to_string(),
                request_timeout_secs: 10,
                max_retries: 3,
                backoff_base_ms: 100,
                backoff_cap_ms: 1000,
            },
            rate_limits: RateLimitsSection::default(),
            tracked_leagues: vec![],
            jobs: vec![],
            scope: ScopeSection::default(),
            coverage: CoverageSection::default(),
            overrides: vec![],
        }
    }

    #[test]
    fn cup_league_disables_standings_but_not_fixtures() {
        let config = empty_config();

        let standings = decide(&config, 1, 2026, Some("Cup"), "/standings");
        assert_eq!(
            standings,
            ScopeDecision {
                in_scope: false,
                reason: "type_Cup_disabled",
            }
        );

        let fixtures = decide(&config, 1, 2026, Some("Cup"), "/fixtures");
        assert_eq!(
            fixtures,
            ScopeDecision {
                in_scope: true,
                reason: "baseline",
            }
        );
    }

    #[test]
    fn override_takes_precedence_over_league_type_default() {
        let mut config = empty_config();
        config.overrides.push(ScopeOverride {
            league_id: 1,
            season: 2026,
            endpoint: "/standings".to_string(),
            in_scope: true,
        });

        let decision = decide(&config, 1, 2026, Some("Cup"), "/standings");
        assert!(decision.in_scope);
        assert_eq!(decision.reason, "override_enabled");
    }

    #[test]
    fn unknown_league_type_fails_open() {
        let config = empty_config();
        let decision = decide(&config, 1, 2026, None, "/standings");
        assert_eq!(
            decision,
            ScopeDecision {
                in_scope: true,
                reason: "unknown_type_fail_open",
            }
        );
    }

    #[test]
    fn decision_is_a_pure_function_of_its_inputs() {
        let config = empty_config();
        let a = decide(&config, 5, 2025, Some("League"), "/standings");
        let b = decide(&config, 5, 2025, Some("League"), "/standings");
        assert_eq!(a, b);
    }
}
