//! Pure envelope -> CORE row projections, per §4.6. Every `apply_*` function is a pure
//! function of its input and current CORE state: replaying the same envelope leaves CORE
//! unchanged on the second application (§8's replay law).

use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
use diesel::PgConnection;
use matchfeed_db::queries::bootstrap::{upsert_country, upsert_league, upsert_team, upsert_venue};
use matchfeed_db::queries::fixtures::{
    insert_fixture_event, upsert_fixture, upsert_fixture_lineup, upsert_fixture_players,
    upsert_fixture_statistics, FixtureUpsert,
};
use matchfeed_db::queries::season_entities::{upsert_injury, upsert_team_statistics, upsert_top_scorer};
use matchfeed_db::queries::standings::replace_standings;
use matchfeed_db::{
    NewFixtureEvent, NewFixtureLineup, NewFixturePlayers, NewFixtureStatistics, NewInjury,
    NewStanding, NewTeamStatistics, NewTopScorer,
};
use matchfeed_db::QueryResult;
use serde_json::Value;
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

// ---- defensive scalar extraction -------------------------------------------------------

fn str_at<'a>(v: &'a Value, key: &str) -> Option<&'a str> {
    v.get(key).and_then(Value::as_str)
}

/// Parses a field that may arrive as a JSON number or, less often, a numeric string.
/// Anything else (including genuinely non-numeric text) becomes `None` per §4.6's
/// "numeric fields parsed defensively (non-numeric -> null)".
fn i64_at(v: &Value, key: &str) -> Option<i64> {
    match v.get(key) {
        Some(Value::Number(n)) => n.as_i64(),
        Some(Value::String(s)) => s.trim().parse().ok(),
        _ => None,
    }
}

fn i32_at(v: &Value, key: &str) -> Option<i32> {
    i64_at(v, key).and_then(|n| i32::try_from(n).ok())
}

fn nested<'a>(v: &'a Value, path: &[&str]) -> Option<&'a Value> {
    let mut cur = v;
    for segment in path {
        cur = cur.get(segment)?;
    }
    Some(cur)
}

fn parse_kickoff(v: &Value) -> Option<DateTime<Utc>> {
    let timestamp = nested(v, &["fixture", "timestamp"]).and_then(Value::as_i64)?;
    Utc.timestamp_opt(timestamp, 0).single()
}

fn hash_hex(parts: &[&str]) -> String {
    let mut hasher = DefaultHasher::new();
    for part in parts {
        part.hash(&mut hasher);
        0u8.hash(&mut hasher); // separator, prevents ("ab","c") colliding with ("a","bc")
    }
    format!("{:016x}", hasher.finish())
}

/// Deterministic key for a fixture event: hash of (minute, extra, team, player, type,
/// detail), per §4.6/§9.
pub fn event_key(minute: i32, extra: Option<i32>, team: Option<i64>, player: Option<i64>, kind: &str, detail: &str) -> String {
    hash_hex(&[
        &minute.to_string(),
        &extra.map(|e| e.to_string()).unwrap_or_default(),
        &team.map(|t| t.to_string()).unwrap_or_default(),
        &player.map(|p| p.to_string()).unwrap_or_default(),
        kind,
        detail,
    ])
}

/// Deterministic key for an injury report: hash of (team, player, type, reason, date),
/// per §4.6/§9.
pub fn injury_key(team: i64, player: i64, kind: &str, reason: &str, date: &str) -> String {
    hash_hex(&[&team.to_string(), &player.to_string(), kind, reason, date])
}

// ---- static bootstrap --------------------------------------------------------------------

pub fn apply_leagues_response(
    conn: &mut PgConnection,
    response: Value,
    now: DateTime<Utc>,
) -> QueryResult<()> {
    let Some(entries) = response.as_array() else {
        return Ok(());
    };

    for entry in entries {
        let Some(league) = entry.get("league") else { continue };
        let Some(id) = i64_at(league, "id") else { continue };
        let name = str_at(league, "name").unwrap_or_default();
        let league_type = str_at(league, "type").unwrap_or("League");

        let country_code = if let Some(country) = entry.get("country") {
            let code = str_at(country, "code");
            if let Some(code) = code {
                upsert_country(conn, code, str_at(country, "name").unwrap_or(code), str_at(country, "flag"))?;
            }
            code
        } else {
            None
        };

        let seasons = entry.get("seasons").cloned().unwrap_or(Value::Array(vec![]));
        upsert_league(conn, id, name, league_type, country_code, seasons, now)?;
    }

    Ok(())
}

pub fn apply_teams_response(
    conn: &mut PgConnection,
    response: Value,
    now: DateTime<Utc>,
) -> QueryResult<()> {
    let Some(entries) = response.as_array() else {
        return Ok(());
    };

    for entry in entries {
        let Some(team) = entry.get("team") else { continue };
        let Some(id) = i64_at(team, "id") else { continue };
        let name = str_at(team, "name").unwrap_or_default();
        let country = str_at(team, "country");
        let founded = i32_at(team, "founded");

        let mut venue_id = None;
        if let Some(venue) = entry.get("venue") {
            if let Some(vid) = i64_at(venue, "id").filter(|id| *id != 0) {
                upsert_venue(
                    conn,
                    vid,
                    str_at(venue, "name").unwrap_or_default(),
                    str_at(venue, "city"),
                    str_at(venue, "country").or(country),
                    i32_at(venue, "capacity"),
                    str_at(venue, "surface"),
                    now,
                )?;
                venue_id = Some(vid);
            }
        }

        upsert_team(conn, id, name, country, founded, venue_id, now)?;
    }

    Ok(())
}

// ---- fixtures and sub-entities ----------------------------------------------------------

/// Projects one `/fixtures` response entry and upserts it. Returns the fixture id and the
/// (home, away) team ids so the caller's Dependency Resolver step can act on them -- this
/// function never fetches anything itself, staying a pure projection per §9.
pub fn project_fixture(entry: &Value) -> Option<FixtureFields> {
    let fixture = entry.get("fixture")?;
    let id = i64_at(fixture, "id")?;
    let league = entry.get("league")?;
    let league_id = i64_at(league, "id")?;
    let season = i32_at(league, "season")?;
    let kickoff = parse_kickoff(entry)?;

    let teams = entry.get("teams")?;
    let home_team_id = nested(teams, &["home"]).and_then(|h| i64_at(h, "id"))?;
    let away_team_id = nested(teams, &["away"]).and_then(|a| i64_at(a, "id"))?;

    let venue = nested(fixture, &["venue"]);
    let venue_id = venue.and_then(|v| i64_at(v, "id")).filter(|id| *id != 0);

    let status = fixture.get("status").cloned().unwrap_or(Value::Null);
    let status_short = str_at(&status, "short").unwrap_or("NS").to_string();
    let status_long = str_at(&status, "long").unwrap_or("Not Started").to_string();
    let elapsed = i32_at(&status, "elapsed");

    let goals = entry.get("goals").cloned().unwrap_or(Value::Null);
    let goals_home = i32_at(&goals, "home");
    let goals_away = i32_at(&goals, "away");

    let score = entry.get("score").cloned().unwrap_or(Value::Null);
    let referee = str_at(fixture, "referee").map(str::to_string);

    Some(FixtureFields {
        id,
        league_id,
        season,
        kickoff,
        venue_id,
        venue: venue.cloned(),
        home_team_id,
        away_team_id,
        status_short,
        status_long,
        elapsed,
        goals_home,
        goals_away,
        score,
        referee,
    })
}

pub struct FixtureFields {
    pub id: i64,
    pub league_id: i64,
    pub season: i32,
    pub kickoff: DateTime<Utc>,
    pub venue_id: Option<i64>,
    pub venue: Option<Value>,
    pub home_team_id: i64,
    pub away_team_id: i64,
    pub status_short: String,
    pub status_long: String,
    pub elapsed: Option<i32>,
    pub goals_home: Option<i32>,
    pub goals_away: Option<i32>,
    pub score: Value,
    pub referee: Option<String>,
}

/// Opportunistically upserts the venue carried in the fixture payload, per §4.5 -- a
/// fixture should never reference a venue CORE has not seen yet, and `/fixtures` often
/// reaches a venue before any `/teams` bootstrap does.
fn upsert_fixture_venue(conn: &mut PgConnection, venue: &Value, now: DateTime<Utc>) -> QueryResult<()> {
    let Some(id) = i64_at(venue, "id").filter(|id| *id != 0) else {
        return Ok(());
    };

    upsert_venue(
        conn,
        id,
        str_at(venue, "name").unwrap_or_default(),
        str_at(venue, "city"),
        str_at(venue, "country"),
        i32_at(venue, "capacity"),
        str_at(venue, "surface"),
        now,
    )
}

pub fn apply_fixture(conn: &mut PgConnection, fields: &FixtureFields, now: DateTime<Utc>) -> QueryResult<()> {
    if let Some(venue) = &fields.venue {
        upsert_fixture_venue(conn, venue, now)?;
    }

    upsert_fixture(
        conn,
        FixtureUpsert {
            id: fields.id,
            league_id: fields.league_id,
            season: fields.season,
            kickoff: fields.kickoff,
            venue_id: fields.venue_id,
            home_team_id: fields.home_team_id,
            away_team_id: fields.away_team_id,
            status_short: &fields.status_short,
            status_long: &fields.status_long,
            elapsed: fields.elapsed,
            goals_home: fields.goals_home,
            goals_away: fields.goals_away,
            score: fields.score.clone(),
            referee: fields.referee.as_deref(),
        },
        now,
    )
}

pub fn apply_fixtures_response(
    conn: &mut PgConnection,
    response: Value,
    now: DateTime<Utc>,
) -> QueryResult<Vec<FixtureFields>> {
    let mut applied = Vec::new();
    let Some(entries) = response.as_array() else {
        return Ok(applied);
    };

    for entry in entries {
        if let Some(fields) = project_fixture(entry) {
            apply_fixture(conn, &fields, now)?;
            applied.push(fields);
        }
    }

    Ok(applied)
}

pub fn apply_events_response(
    conn: &mut PgConnection,
    fixture_id: i64,
    response: Value,
    now: DateTime<Utc>,
) -> QueryResult<usize> {
    let Some(entries) = response.as_array() else {
        return Ok(0);
    };

    let mut inserted = 0;
    for entry in entries {
        let minute = nested(entry, &["time", "elapsed"]).and_then(Value::as_i64).unwrap_or(0) as i32;
        let extra = nested(entry, &["time", "extra"]).and_then(|v| v.as_i64()).map(|v| v as i32);
        let team = nested(entry, &["team"]).and_then(|t| i64_at(t, "id"));
        let player = nested(entry, &["player"]).and_then(|p| i64_at(p, "id"));
        let event_type = str_at(entry, "type").unwrap_or("Unknown").to_string();
        let detail = str_at(entry, "detail").unwrap_or_default().to_string();

        let key = event_key(minute, extra, team, player, &event_type, &detail);

        let row = NewFixtureEvent {
            fixture_id,
            event_key: &key,
            minute,
            extra,
            event_type: &event_type,
            detail: Some(&detail),
            team_id: team,
            player_id: player,
            updated_at: now.naive_utc(),
        };

        inserted += insert_fixture_event(conn, &row)?;
    }

    Ok(inserted)
}

pub fn apply_statistics_response(
    conn: &mut PgConnection,
    fixture_id: i64,
    response: Value,
    now: DateTime<Utc>,
) -> QueryResult<()> {
    let Some(entries) = response.as_array() else {
        return Ok(());
    };

    for entry in entries {
        let Some(team_id) = nested(entry, &["team"]).and_then(|t| i64_at(t, "id")) else {
            continue;
        };
        let stats = entry.get("statistics").cloned().unwrap_or(Value::Array(vec![]));

        upsert_fixture_statistics(
            conn,
            &NewFixtureStatistics {
                fixture_id,
                team_id,
                stats,
                updated_at: now.naive_utc(),
            },
        )?;
    }

    Ok(())
}

pub fn apply_lineups_response(
    conn: &mut PgConnection,
    fixture_id: i64,
    response: Value,
    now: DateTime<Utc>,
) -> QueryResult<()> {
    let Some(entries) = response.as_array() else {
        return Ok(());
    };

    for entry in entries {
        let Some(team) = entry.get("team") else { continue };
        let Some(team_id) = i64_at(team, "id") else { continue };
        let formation = str_at(entry, "formation").map(str::to_string);

        upsert_fixture_lineup(
            conn,
            &NewFixtureLineup {
                fixture_id,
                team_id,
                formation: formation.as_deref(),
                start_xi: entry.get("startXI").cloned().unwrap_or(Value::Array(vec![])),
                substitutes: entry.get("substitutes").cloned().unwrap_or(Value::Array(vec![])),
                coach: entry.get("coach").cloned().unwrap_or(Value::Null),
                colors: team.get("colors").cloned().unwrap_or(Value::Null),
                updated_at: now.naive_utc(),
            },
        )?;
    }

    Ok(())
}

pub fn apply_players_response(
    conn: &mut PgConnection,
    fixture_id: i64,
    response: Value,
    now: DateTime<Utc>,
) -> QueryResult<()> {
    let Some(team_entries) = response.as_array() else {
        return Ok(());
    };

    for team_entry in team_entries {
        let Some(team) = team_entry.get("team") else { continue };
        let Some(team_id) = i64_at(team, "id") else { continue };
        let Some(players) = team_entry.get("players").and_then(Value::as_array) else {
            continue;
        };

        for player_entry in players {
            let Some(player) = player_entry.get("player") else { continue };
            let Some(player_id) = i64_at(player, "id") else { continue };
            let stats = player_entry
                .get("statistics")
                .cloned()
                .unwrap_or(Value::Array(vec![]));

            upsert_fixture_players(
                conn,
                &NewFixturePlayers {
                    fixture_id,
                    team_id,
                    player_id,
                    stats,
                    updated_at: now.naive_utc(),
                },
            )?;
        }
    }

    Ok(())
}

// ---- season-scoped entities ---------------------------------------------------------------

pub fn apply_standings_response(
    conn: &mut PgConnection,
    league_id: i64,
    season: i32,
    response: Value,
    now: DateTime<Utc>,
) -> QueryResult<()> {
    let ranks = nested(&response, &["league", "standings"])
        .and_then(Value::as_array)
        .into_iter()
        .flatten()
        .flat_map(|group| group.as_array().cloned().unwrap_or_default())
        .collect::<Vec<_>>();

    let mut rows = Vec::with_capacity(ranks.len());
    for entry in &ranks {
        let Some(team_id) = nested(entry, &["team"]).and_then(|t| i64_at(t, "id")) else {
            continue;
        };
        let Some(rank) = i32_at(entry, "rank") else { continue };
        let points = i32_at(entry, "points").unwrap_or(0);
        let goals_diff = i32_at(entry, "goalsDiff").unwrap_or(0);

        rows.push(NewStanding {
            league_id,
            season,
            team_id,
            rank,
            points,
            goals_diff,
            all_stats: entry.get("all").cloned().unwrap_or(Value::Null),
            home_stats: entry.get("home").cloned().unwrap_or(Value::Null),
            away_stats: entry.get("away").cloned().unwrap_or(Value::Null),
            updated_at: now.naive_utc(),
        });
    }

    replace_standings(conn, league_id, season, &rows)
}

pub fn apply_injuries_response(
    conn: &mut PgConnection,
    league_id: i64,
    season: i32,
    response: Value,
    now: DateTime<Utc>,
) -> QueryResult<()> {
    let Some(entries) = response.as_array() else {
        return Ok(());
    };

    for entry in entries {
        let Some(team_id) = nested(entry, &["team"]).and_then(|t| i64_at(t, "id")) else {
            continue;
        };
        let Some(player_id) = nested(entry, &["player"]).and_then(|p| i64_at(p, "id")) else {
            continue;
        };
        let kind = nested(entry, &["player"]).and_then(|p| str_at(p, "type")).unwrap_or("");
        let reason = nested(entry, &["player"]).and_then(|p| str_at(p, "reason")).unwrap_or("");
        let date = nested(entry, &["fixture"]).and_then(|f| str_at(f, "date")).unwrap_or("");

        let key = injury_key(team_id, player_id, kind, reason, date);
        let injury_date = NaiveDateTime::parse_from_str(date, "%Y-%m-%dT%H:%M:%S%z").ok();

        upsert_injury(
            conn,
            &NewInjury {
                league_id,
                season,
                injury_key: &key,
                team_id,
                player_id,
                injury_type: Some(kind).filter(|s| !s.is_empty()),
                reason: Some(reason).filter(|s| !s.is_empty()),
                injury_date,
                updated_at: now.naive_utc(),
            },
        )?;
    }

    Ok(())
}

pub fn apply_topscorers_response(
    conn: &mut PgConnection,
    league_id: i64,
    season: i32,
    response: Value,
    now: DateTime<Utc>,
) -> QueryResult<()> {
    let Some(entries) = response.as_array() else {
        return Ok(());
    };

    for (index, entry) in entries.iter().enumerate() {
        let Some(player_id) = nested(entry, &["player"]).and_then(|p| i64_at(p, "id")) else {
            continue;
        };
        let Some(statistics) = entry.get("statistics").and_then(Value::as_array).and_then(|s| s.first()) else {
            continue;
        };
        let Some(team_id) = nested(statistics, &["team"]).and_then(|t| i64_at(t, "id")) else {
            continue;
        };
        let goals = nested(statistics, &["goals"]).and_then(|g| i32_at(g, "total")).unwrap_or(0);
        let assists = nested(statistics, &["goals"]).and_then(|g| i32_at(g, "assists"));

        upsert_top_scorer(
            conn,
            &NewTopScorer {
                league_id,
                season,
                player_id,
                rank: index as i32 + 1,
                team_id,
                goals,
                assists,
                updated_at: now.naive_utc(),
            },
        )?;
    }

    Ok(())
}

pub fn apply_team_statistics_response(
    conn: &mut PgConnection,
    league_id: i64,
    season: i32,
    team_id: i64,
    response: Value,
    now: DateTime<Utc>,
) -> QueryResult<()> {
    upsert_team_statistics(
        conn,
        &NewTeamStatistics {
            league_id,
            season,
            team_id,
            profile: response,
            updated_at: now.naive_utc(),
        },
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn event_key_is_deterministic_and_order_sensitive() {
        let a = event_key(10, None, Some(1), Some(2), "Goal", "Normal Goal");
        let b = event_key(10, None, Some(1), Some(2), "Goal", "Normal Goal");
        assert_eq!(a, b);

        let c = event_key(10, None, Some(1), Some(2), "Card", "Yellow Card");
        assert_ne!(a, c);
    }

    #[test]
    fn project_fixture_defensively_parses_numeric_strings() {
        let entry = json!({
            "fixture": {
                "id": 1001,
                "timestamp": 1_700_000_000,
                "status": {"short": "FT", "long": "Match Finished", "elapsed": "90"},
                "venue": {"id": 0}
            },
            "league": {"id": 39, "season": 2026},
            "teams": {"home": {"id": 1}, "away": {"id": 2}},
            "goals": {"home": 2, "away": "1"},
            "score": {}
        });

        let fields = project_fixture(&entry).expect("fixture should project");
        assert_eq!(fields.id, 1001);
        assert_eq!(fields.status_short, "FT");
        assert_eq!(fields.elapsed, Some(90));
        assert_eq!(fields.goals_home, Some(2));
        assert_eq!(fields.goals_away, Some(1));
        assert_eq!(fields.venue_id, None);
    }

    #[test]
    fn project_fixture_returns_none_on_non_numeric_goal() {
        let entry = json!({
            "fixture": {"id": 1002, "timestamp": 1_700_000_000, "status": {"short": "NS", "long": "Not Started"}},
            "league": {"id": 39, "season": 2026},
            "teams": {"home": {"id": 1}, "away": {"id": 2}},
            "goals": {"home": "unknown", "away": null},
            "score": {}
        });

        let fields = project_fixture(&entry).expect("fixture should still project");
        assert_eq!(fields.goals_home, None);
        assert_eq!(fields.goals_away, None);
    }
}
