pub mod models;
pub mod writer;

use sqlx::sqlite::SqlitePoolOptions;

use crate::error::Result;

/// Opens (creating if needed) the SQLite file and applies migrations.
pub async fn connect(db_path: &str) -> Result<sqlx::SqlitePool> {
    let pool = SqlitePoolOptions::new()
        .max_connections(4)
        .connect(&format!("sqlite:{db_path}?mode=rwc"))
        .await?;
    sqlx::migrate!("./migrations").run(&pool).await?;
    Ok(pool)
}
