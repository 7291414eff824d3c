use sea_orm::{ConnectionTrait, DbErr, EntityTrait, Schema};
use tracing::debug;

use crate::db::entities::{snippet, snippet_favourite, snippet_tag, tag};

/// Creates every table from its entity definition, skipping tables that exist.
/// Parents come before the join tables that reference them.
pub async fn create_tables<C: ConnectionTrait>(db: &C) -> Result<(), DbErr> {
    create_table(db, snippet::Entity).await?;
    create_table(db, tag::Entity).await?;
    create_table(db, snippet_tag::Entity).await?;
    create_table(db, snippet_favourite::Entity).await?;
    Ok(())
}

async fn create_table<C, E>(db: &C, entity: E) -> Result<(), DbErr>
where
    C: ConnectionTrait,
    E: EntityTrait,
{
    let backend = db.get_database_backend();
    let schema = Schema::new(backend);
    let mut statement = schema.create_table_from_entity(entity);
    statement.if_not_exists();

    db.execute(backend.build(&statement)).await?;
    debug!(table = entity.table_name(), "Ensured table exists.");
    Ok(())
}
