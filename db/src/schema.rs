// Hand-written diesel schema for the three logical namespaces described in §6.2:
// raw.* (append-only archive), core.* (normalised entities), mart.* (coverage + views).
// In production this would be regenerated by `diesel print-schema` against the migrations
// under migrations/; it is hand-written here because this pack ships no DDL (out of scope
// per §1 -- "the SQL DDL for schemas" is an external collaborator).

pub mod raw {
    diesel::table! {
        raw.envelopes (id) {
            id -> Int8,
            endpoint -> Text,
            requested_params -> Jsonb,
            status_code -> Int4,
            response_headers -> Jsonb,
            body -> Jsonb,
            errors -> Jsonb,
            results -> Int4,
            fetched_at -> Timestamp,
        }
    }
}

pub mod core {
    diesel::table! {
        core.countries (code) {
            code -> Text,
            name -> Text,
            flag -> Nullable<Text>,
        }
    }

    diesel::table! {
        core.timezones (name) {
            name -> Text,
        }
    }

    diesel::table! {
        core.leagues (id) {
            id -> Int8,
            name -> Text,
            league_type -> Text,
            country_code -> Nullable<Text>,
            seasons -> Jsonb,
            updated_at -> Timestamp,
        }
    }

    diesel::table! {
        core.venues (id) {
            id -> Int8,
            name -> Text,
            city -> Nullable<Text>,
            country -> Nullable<Text>,
            capacity -> Nullable<Int4>,
            surface -> Nullable<Text>,
            updated_at -> Timestamp,
        }
    }

    diesel::table! {
        core.teams (id) {
            id -> Int8,
            name -> Text,
            country -> Nullable<Text>,
            founded -> Nullable<Int4>,
            venue_id -> Nullable<Int8>,
            updated_at -> Timestamp,
        }
    }

    diesel::table! {
        core.fixtures (id) {
            id -> Int8,
            league_id -> Int8,
            season -> Int4,
            kickoff -> Timestamp,
            venue_id -> Nullable<Int8>,
            home_team_id -> Int8,
            away_team_id -> Int8,
            status_short -> Text,
            status_long -> Text,
            elapsed -> Nullable<Int4>,
            goals_home -> Nullable<Int4>,
            goals_away -> Nullable<Int4>,
            score -> Jsonb,
            referee -> Nullable<Text>,
            needs_score_verification -> Bool,
            verification_state -> Text,
            verification_attempt_count -> Int4,
            verification_last_attempt_at -> Nullable<Timestamp>,
            updated_at -> Timestamp,
        }
    }

    diesel::table! {
        core.fixture_events (id) {
            id -> Int8,
            fixture_id -> Int8,
            event_key -> Text,
            minute -> Int4,
            extra -> Nullable<Int4>,
            event_type -> Text,
            detail -> Nullable<Text>,
            team_id -> Nullable<Int8>,
            player_id -> Nullable<Int8>,
            updated_at -> Timestamp,
        }
    }

    diesel::table! {
        core.fixture_statistics (fixture_id, team_id) {
            fixture_id -> Int8,
            team_id -> Int8,
            stats -> Jsonb,
            updated_at -> Timestamp,
        }
    }

    diesel::table! {
        core.fixture_lineups (fixture_id, team_id) {
            fixture_id -> Int8,
            team_id -> Int8,
            formation -> Nullable<Text>,
            start_xi -> Jsonb,
            substitutes -> Jsonb,
            coach -> Jsonb,
            colors -> Jsonb,
            updated_at -> Timestamp,
        }
    }

    diesel::table! {
        core.fixture_players (fixture_id, team_id, player_id) {
            fixture_id -> Int8,
            team_id -> Int8,
            player_id -> Int8,
            stats -> Jsonb,
            updated_at -> Timestamp,
        }
    }

    diesel::table! {
        core.standings (league_id, season, team_id) {
            league_id -> Int8,
            season -> Int4,
            team_id -> Int8,
            rank -> Int4,
            points -> Int4,
            goals_diff -> Int4,
            all_stats -> Jsonb,
            home_stats -> Jsonb,
            away_stats -> Jsonb,
            updated_at -> Timestamp,
        }
    }

    diesel::table! {
        core.injuries (league_id, season, injury_key) {
            league_id -> Int8,
            season -> Int4,
            injury_key -> Text,
            team_id -> Int8,
            player_id -> Int8,
            injury_type -> Nullable<Text>,
            reason -> Nullable<Text>,
            injury_date -> Nullable<Timestamp>,
            updated_at -> Timestamp,
        }
    }

    diesel::table! {
        core.top_scorers (league_id, season, player_id) {
            league_id -> Int8,
            season -> Int4,
            player_id -> Int8,
            rank -> Int4,
            team_id -> Int8,
            goals -> Int4,
            assists -> Nullable<Int4>,
            updated_at -> Timestamp,
        }
    }

    diesel::table! {
        core.team_statistics (league_id, season, team_id) {
            league_id -> Int8,
            season -> Int4,
            team_id -> Int8,
            profile -> Jsonb,
            updated_at -> Timestamp,
        }
    }

    diesel::table! {
        core.backfill_progress (job_id, league_id, season) {
            job_id -> Text,
            league_id -> Int8,
            season -> Int4,
            next_window_index -> Int4,
            completed -> Bool,
            last_error -> Nullable<Text>,
            last_run -> Nullable<Timestamp>,
        }
    }

    diesel::table! {
        core.team_bootstrap_progress (league_id, season) {
            league_id -> Int8,
            season -> Int4,
            completed -> Bool,
        }
    }

    diesel::table! {
        core.standings_refresh_progress (job_id) {
            job_id -> Text,
            cursor_league_id -> Nullable<Int8>,
            cursor_season -> Nullable<Int4>,
            total_pairs -> Int4,
            lap_count -> Int4,
            last_full_pass -> Nullable<Timestamp>,
        }
    }
}

pub mod mart {
    diesel::table! {
        mart.coverage_status (league_id, season, endpoint) {
            league_id -> Int8,
            season -> Int4,
            endpoint -> Text,
            freshness_coverage -> Float8,
            pipeline_coverage -> Float8,
            count_coverage -> Nullable<Float8>,
            overall_coverage -> Float8,
            lag_minutes -> Nullable<Float8>,
            flags -> Jsonb,
            computed_at -> Timestamp,
        }
    }
}
