//! Database migrations.

use tator_core::config::AppConfig;
use tator_core::error::AppError;
use tator_database::DatabasePool;
use tator_database::migration::run_migrations;

use crate::output;

/// Execute the migrate command
pub async fn execute(config: AppConfig) -> Result<(), AppError> {
    if config.database.provider != "postgres" {
        return Err(AppError::configuration(format!(
            "Migrations need the postgres provider, not '{}'",
            config.database.provider
        )));
    }

    println!("Running database migrations...");
    let pool = DatabasePool::connect(&config.database).await?;
    run_migrations(pool.pool()).await?;
    pool.close().await;
    output::print_success("All migrations applied successfully.");
    Ok(())
}
