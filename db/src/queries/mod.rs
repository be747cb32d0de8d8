pub mod backfill;
pub mod bootstrap;
pub mod coverage;
pub mod fixtures;
pub mod raw;
pub mod season_entities;
pub mod standings;
