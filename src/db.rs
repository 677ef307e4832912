// Database connection

use sea_orm::{
    ConnectOptions, ConnectionTrait, Database, DatabaseConnection, DbErr, EntityTrait, Schema,
};
use std::time::Duration;
use tracing::info;

use crate::models::{accounts, users};

/// Connects and pings, so the handle is ready before any query is issued
pub async fn establish_connection(database_url: &str) -> Result<DatabaseConnection, DbErr> {
    let mut options = ConnectOptions::new(database_url.to_string());
    options
        .connect_timeout(Duration::from_secs(10))
        .sqlx_logging(false);

    let db = Database::connect(options).await?;
    db.ping().await?;
    info!(backend = ?db.get_database_backend(), "database connected");

    Ok(db)
}

/// Creates the `users` and `accounts` tables when they do not exist yet
pub async fn ensure_schema(db: &DatabaseConnection) -> Result<(), DbErr> {
    create_table(db, users::Entity).await?;
    create_table(db, accounts::Entity).await?;
    Ok(())
}

async fn create_table<E: EntityTrait>(db: &DatabaseConnection, entity: E) -> Result<(), DbErr> {
    let backend = db.get_database_backend();
    let mut statement = Schema::new(backend).create_table_from_entity(entity);
    statement.if_not_exists();

    db.execute(backend.build(&statement)).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::test_support::memory_db;
    use sea_orm::PaginatorTrait;

    #[tokio::test]
    async fn test_ensure_schema_is_idempotent() {
        let db = memory_db().await;
        ensure_schema(&db).await.unwrap();

        assert_eq!(users::Entity::find().count(&db).await.unwrap(), 0);
        assert_eq!(accounts::Entity::find().count(&db).await.unwrap(), 0);
    }
}
