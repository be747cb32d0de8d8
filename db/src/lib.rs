mod error;
mod migrations;
mod models;
mod pool;
mod schema;
mod url;

pub mod queries;

pub(crate) use schema::*;

pub use error::{QueryError, QueryResult};
pub use migrations::{run_migrations, MigrationError};
pub use models::*;
pub use pool::{get_pool, ConnectionPool};
pub use url::*;

pub use diesel::{Connection, PgConnection};
