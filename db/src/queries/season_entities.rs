use crate::error::QueryResult;
use crate::models::{NewInjury, NewTeamStatistics, NewTopScorer};
use diesel::prelude::*;
use diesel::PgConnection;

/// Upserts one injury row, keyed on the deterministic `injury_key` computed by the
/// transform layer from (team, player, injury type, date) so repeated fetches of the same
/// report are idempotent even though the upstream API exposes no injury id.
pub fn upsert_injury(conn: &mut PgConnection, row: &NewInjury<'_>) -> QueryResult<()> {
    use crate::schema::core::injuries::dsl;

    diesel::insert_into(dsl::injuries)
        .values(row)
        .on_conflict((dsl::league_id, dsl::season, dsl::injury_key))
        .do_update()
        .set(row)
        .execute(conn)?;

    Ok(())
}

pub fn upsert_top_scorer(conn: &mut PgConnection, row: &NewTopScorer) -> QueryResult<()> {
    use crate::schema::core::top_scorers::dsl;

    diesel::insert_into(dsl::top_scorers)
        .values(row)
        .on_conflict((dsl::league_id, dsl::season, dsl::player_id))
        .do_update()
        .set(row)
        .execute(conn)?;

    Ok(())
}

pub fn upsert_team_statistics(conn: &mut PgConnection, row: &NewTeamStatistics) -> QueryResult<()> {
    use crate::schema::core::team_statistics::dsl;

    diesel::insert_into(dsl::team_statistics)
        .values(row)
        .on_conflict((dsl::league_id, dsl::season, dsl::team_id))
        .do_update()
        .set(row)
        .execute(conn)?;

    Ok(())
}
