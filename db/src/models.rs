use chrono::NaiveDateTime;
use diesel::prelude::*;

// ---- raw --------------------------------------------------------------------------

#[derive(Debug, Insertable)]
#[diesel(table_name = crate::schema::raw::envelopes)]
pub struct NewEnvelope<'a> {
    pub endpoint: &'a str,
    pub requested_params: serde_json::Value,
    pub status_code: i32,
    pub response_headers: serde_json::Value,
    pub body: serde_json::Value,
    pub errors: serde_json::Value,
    pub results: i32,
    pub fetched_at: NaiveDateTime,
}

#[derive(Debug, Queryable, Selectable, Identifiable)]
#[diesel(table_name = crate::schema::raw::envelopes)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct DbEnvelope {
    pub id: i64,
    pub endpoint: String,
    pub requested_params: serde_json::Value,
    pub status_code: i32,
    pub response_headers: serde_json::Value,
    pub body: serde_json::Value,
    pub errors: serde_json::Value,
    pub results: i32,
    pub fetched_at: NaiveDateTime,
}

// ---- static bootstrap ---------------------------------------------------------------

#[derive(Debug, Insertable, AsChangeset)]
#[diesel(table_name = crate::schema::core::countries)]
pub struct NewCountry<'a> {
    pub code: &'a str,
    pub name: &'a str,
    pub flag: Option<&'a str>,
}

#[derive(Debug, Queryable, Selectable, Identifiable)]
#[diesel(table_name = crate::schema::core::countries)]
#[diesel(primary_key(code))]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct DbCountry {
    pub code: String,
    pub name: String,
    pub flag: Option<String>,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = crate::schema::core::timezones)]
pub struct NewTimezone<'a> {
    pub name: &'a str,
}

// ---- leagues / venues / teams ---------------------------------------------------------

#[derive(Debug, Insertable, AsChangeset)]
#[diesel(table_name = crate::schema::core::leagues)]
pub struct NewLeague<'a> {
    pub id: i64,
    pub name: &'a str,
    pub league_type: &'a str,
    pub country_code: Option<&'a str>,
    pub seasons: serde_json::Value,
    pub updated_at: NaiveDateTime,
}

#[derive(Debug, Queryable, Selectable, Identifiable)]
#[diesel(table_name = crate::schema::core::leagues)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct DbLeague {
    pub id: i64,
    pub name: String,
    pub league_type: String,
    pub country_code: Option<String>,
    pub seasons: serde_json::Value,
    pub updated_at: NaiveDateTime,
}

#[derive(Debug, Insertable, AsChangeset)]
#[diesel(table_name = crate::schema::core::venues)]
pub struct NewVenue<'a> {
    pub id: i64,
    pub name: &'a str,
    pub city: Option<&'a str>,
    pub country: Option<&'a str>,
    pub capacity: Option<i32>,
    pub surface: Option<&'a str>,
    pub updated_at: NaiveDateTime,
}

#[derive(Debug, Insertable, AsChangeset)]
#[diesel(table_name = crate::schema::core::teams)]
pub struct NewTeam<'a> {
    pub id: i64,
    pub name: &'a str,
    pub country: Option<&'a str>,
    pub founded: Option<i32>,
    pub venue_id: Option<i64>,
    pub updated_at: NaiveDateTime,
}

#[derive(Debug, Queryable, Selectable, Identifiable)]
#[diesel(table_name = crate::schema::core::teams)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct DbTeam {
    pub id: i64,
    pub name: String,
    pub country: Option<String>,
    pub founded: Option<i32>,
    pub venue_id: Option<i64>,
    pub updated_at: NaiveDateTime,
}

// ---- fixtures and sub-entities --------------------------------------------------------

#[derive(Debug, Insertable, AsChangeset)]
#[diesel(table_name = crate::schema::core::fixtures)]
pub struct NewFixture<'a> {
    pub id: i64,
    pub league_id: i64,
    pub season: i32,
    pub kickoff: NaiveDateTime,
    pub venue_id: Option<i64>,
    pub home_team_id: i64,
    pub away_team_id: i64,
    pub status_short: &'a str,
    pub status_long: &'a str,
    pub elapsed: Option<i32>,
    pub goals_home: Option<i32>,
    pub goals_away: Option<i32>,
    pub score: serde_json::Value,
    pub referee: Option<&'a str>,
    pub updated_at: NaiveDateTime,
}

#[derive(Debug, Queryable, Selectable, Identifiable, Clone)]
#[diesel(table_name = crate::schema::core::fixtures)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct DbFixture {
    pub id: i64,
    pub league_id: i64,
    pub season: i32,
    pub kickoff: NaiveDateTime,
    pub venue_id: Option<i64>,
    pub home_team_id: i64,
    pub away_team_id: i64,
    pub status_short: String,
    pub status_long: String,
    pub elapsed: Option<i32>,
    pub goals_home: Option<i32>,
    pub goals_away: Option<i32>,
    pub score: serde_json::Value,
    pub referee: Option<String>,
    pub needs_score_verification: bool,
    pub verification_state: String,
    pub verification_attempt_count: i32,
    pub verification_last_attempt_at: Option<NaiveDateTime>,
    pub updated_at: NaiveDateTime,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = crate::schema::core::fixture_events)]
pub struct NewFixtureEvent<'a> {
    pub fixture_id: i64,
    pub event_key: &'a str,
    pub minute: i32,
    pub extra: Option<i32>,
    pub event_type: &'a str,
    pub detail: Option<&'a str>,
    pub team_id: Option<i64>,
    pub player_id: Option<i64>,
    pub updated_at: NaiveDateTime,
}

#[derive(Debug, Insertable, AsChangeset)]
#[diesel(table_name = crate::schema::core::fixture_statistics)]
pub struct NewFixtureStatistics {
    pub fixture_id: i64,
    pub team_id: i64,
    pub stats: serde_json::Value,
    pub updated_at: NaiveDateTime,
}

#[derive(Debug, Insertable, AsChangeset)]
#[diesel(table_name = crate::schema::core::fixture_lineups)]
pub struct NewFixtureLineup<'a> {
    pub fixture_id: i64,
    pub team_id: i64,
    pub formation: Option<&'a str>,
    pub start_xi: serde_json::Value,
    pub substitutes: serde_json::Value,
    pub coach: serde_json::Value,
    pub colors: serde_json::Value,
    pub updated_at: NaiveDateTime,
}

#[derive(Debug, Insertable, AsChangeset)]
#[diesel(table_name = crate::schema::core::fixture_players)]
pub struct NewFixturePlayers {
    pub fixture_id: i64,
    pub team_id: i64,
    pub player_id: i64,
    pub stats: serde_json::Value,
    pub updated_at: NaiveDateTime,
}

// ---- standings / injuries / top scorers / team statistics -----------------------------

#[derive(Debug, Insertable)]
#[diesel(table_name = crate::schema::core::standings)]
pub struct NewStanding {
    pub league_id: i64,
    pub season: i32,
    pub team_id: i64,
    pub rank: i32,
    pub points: i32,
    pub goals_diff: i32,
    pub all_stats: serde_json::Value,
    pub home_stats: serde_json::Value,
    pub away_stats: serde_json::Value,
    pub updated_at: NaiveDateTime,
}

#[derive(Debug, Insertable, AsChangeset)]
#[diesel(table_name = crate::schema::core::injuries)]
pub struct NewInjury<'a> {
    pub league_id: i64,
    pub season: i32,
    pub injury_key: &'a str,
    pub team_id: i64,
    pub player_id: i64,
    pub injury_type: Option<&'a str>,
    pub reason: Option<&'a str>,
    pub injury_date: Option<NaiveDateTime>,
    pub updated_at: NaiveDateTime,
}

#[derive(Debug, Insertable, AsChangeset)]
#[diesel(table_name = crate::schema::core::top_scorers)]
pub struct NewTopScorer {
    pub league_id: i64,
    pub season: i32,
    pub player_id: i64,
    pub rank: i32,
    pub team_id: i64,
    pub goals: i32,
    pub assists: Option<i32>,
    pub updated_at: NaiveDateTime,
}

#[derive(Debug, Insertable, AsChangeset)]
#[diesel(table_name = crate::schema::core::team_statistics)]
pub struct NewTeamStatistics {
    pub league_id: i64,
    pub season: i32,
    pub team_id: i64,
    pub profile: serde_json::Value,
    pub updated_at: NaiveDateTime,
}

// ---- progress tracking ----------------------------------------------------------------

#[derive(Debug, Queryable, Selectable, Clone)]
#[diesel(table_name = crate::schema::core::backfill_progress)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct DbBackfillProgress {
    pub job_id: String,
    pub league_id: i64,
    pub season: i32,
    pub next_window_index: i32,
    pub completed: bool,
    pub last_error: Option<String>,
    pub last_run: Option<NaiveDateTime>,
}

#[derive(Debug, Insertable, AsChangeset)]
#[diesel(table_name = crate::schema::core::backfill_progress)]
pub struct NewBackfillProgress<'a> {
    pub job_id: &'a str,
    pub league_id: i64,
    pub season: i32,
    pub next_window_index: i32,
    pub completed: bool,
    pub last_error: Option<&'a str>,
    pub last_run: Option<NaiveDateTime>,
}

#[derive(Debug, Queryable, Selectable, Clone, Copy)]
#[diesel(table_name = crate::schema::core::team_bootstrap_progress)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct DbTeamBootstrapProgress {
    pub league_id: i64,
    pub season: i32,
    pub completed: bool,
}

#[derive(Debug, Queryable, Selectable, Clone)]
#[diesel(table_name = crate::schema::core::standings_refresh_progress)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct DbStandingsRefreshProgress {
    pub job_id: String,
    pub cursor_league_id: Option<i64>,
    pub cursor_season: Option<i32>,
    pub total_pairs: i32,
    pub lap_count: i32,
    pub last_full_pass: Option<NaiveDateTime>,
}

// ---- coverage (mart) --------------------------------------------------------------------

#[derive(Debug, Insertable, AsChangeset)]
#[diesel(table_name = crate::schema::mart::coverage_status)]
pub struct NewCoverageStatus {
    pub league_id: i64,
    pub season: i32,
    pub endpoint: String,
    pub freshness_coverage: f64,
    pub pipeline_coverage: f64,
    pub count_coverage: Option<f64>,
    pub overall_coverage: f64,
    pub lag_minutes: Option<f64>,
    pub flags: serde_json::Value,
    pub computed_at: NaiveDateTime,
}

#[derive(Debug, Queryable, Selectable, Clone)]
#[diesel(table_name = crate::schema::mart::coverage_status)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct DbCoverageStatus {
    pub league_id: i64,
    pub season: i32,
    pub endpoint: String,
    pub freshness_coverage: f64,
    pub pipeline_coverage: f64,
    pub count_coverage: Option<f64>,
    pub overall_coverage: f64,
    pub lag_minutes: Option<f64>,
    pub flags: serde_json::Value,
    pub computed_at: NaiveDateTime,
}
