pub mod entities;
pub mod models;
pub mod schema;
pub mod services;

use sea_orm::{ConnectOptions, Database, DatabaseConnection, DbErr};
use tracing::info;

/// Opens the connection pool and makes sure the tables exist.
pub async fn connect(database_url: &str, max_connections: u32) -> Result<DatabaseConnection, DbErr> {
    let mut opt = ConnectOptions::new(database_url.to_owned());
    opt.max_connections(max_connections).sqlx_logging(false);

    let db = Database::connect(opt).await?;
    schema::create_tables(&db).await?;
    info!(max_connections, "Database connection pool ready.");
    Ok(db)
}

#[cfg(test)]
pub(crate) async fn test_db() -> DatabaseConnection {
    // A single connection keeps every query on the same in-memory database.
    connect("sqlite::memory:", 1)
        .await
        .expect("in-memory sqlite should open")
}
